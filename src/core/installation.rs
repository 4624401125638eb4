//! Installation records
//!
//! An installation is a physical utility service point. Records are only
//! ever created by a full sync and are treated as immutable afterwards.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// A single installation record as cached and displayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installation {
    /// Stable unique identifier (primary key in the cache)
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,

    /// Human-facing identifier used for exact and partial lookup
    #[serde(deserialize_with = "lenient_string")]
    pub installation_number: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub address: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub street: String,

    /// Client-reported position (optional)
    #[serde(default)]
    pub client_lat: Option<f64>,
    #[serde(default)]
    pub client_lng: Option<f64>,

    /// Authoritative installation position
    pub pee_lat: f64,
    pub pee_lng: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Reasons a record is refused by the cache
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRecord {
    #[error("record has an empty id")]
    MissingId,

    #[error("record {id} has an empty installation number")]
    MissingNumber { id: String },

    #[error("record {id} has non-finite installation coordinates ({lat}, {lng})")]
    BadPosition { id: String, lat: f64, lng: f64 },

    #[error("record {id} has non-finite client coordinates")]
    BadClientPosition { id: String },
}

impl Installation {
    /// Check the invariants every cached record must satisfy
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        if self.id.trim().is_empty() {
            return Err(InvalidRecord::MissingId);
        }
        if self.installation_number.trim().is_empty() {
            return Err(InvalidRecord::MissingNumber {
                id: self.id.clone(),
            });
        }
        if !self.pee_lat.is_finite() || !self.pee_lng.is_finite() {
            return Err(InvalidRecord::BadPosition {
                id: self.id.clone(),
                lat: self.pee_lat,
                lng: self.pee_lng,
            });
        }
        let client_ok = [self.client_lat, self.client_lng]
            .iter()
            .flatten()
            .all(|v| v.is_finite());
        if !client_ok {
            return Err(InvalidRecord::BadClientPosition {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Address for display: the address line, else the street, else nothing
    pub fn display_address(&self) -> Option<&str> {
        [self.address.as_str(), self.street.as_str()]
            .into_iter()
            .find(|s| !s.trim().is_empty())
    }

    /// Authoritative (lat, lng) position
    pub fn position(&self) -> (f64, f64) {
        (self.pee_lat, self.pee_lng)
    }

    /// Client position, only when both parts are present
    pub fn client_position(&self) -> Option<(f64, f64)> {
        match (self.client_lat, self.client_lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// Turn-by-turn directions to the installation
    pub fn directions_url(&self) -> String {
        format!(
            "https://www.google.com/maps/dir/?api=1&destination={},{}",
            self.pee_lat, self.pee_lng
        )
    }

    /// Map pin for the installation
    pub fn map_url(&self) -> String {
        format!(
            "https://www.google.com/maps/search/?api=1&query={},{}",
            self.pee_lat, self.pee_lng
        )
    }
}

/// Accept strings, numbers and null where text is expected.
///
/// Backends populated from spreadsheets frequently store numeric-looking
/// identifiers as numbers and empty cells as null.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Text(s)) => s,
        Some(Lenient::Int(i)) => i.to_string(),
        Some(Lenient::Float(f)) => f.to_string(),
        Some(Lenient::Bool(b)) => b.to_string(),
        None => String::new(),
    })
}

#[cfg(test)]
pub(crate) fn sample(id: &str, number: &str, name: &str) -> Installation {
    Installation {
        id: id.to_string(),
        installation_number: number.to_string(),
        name: name.to_string(),
        address: String::new(),
        street: String::new(),
        client_lat: None,
        client_lng: None,
        pee_lat: -23.55,
        pee_lng: -46.63,
        created_at: None,
    }
}
