//! `georescue completions` command - Shell completion scripts
//!
//! ```bash
//! source <(georescue completions bash)       # ~/.bashrc
//! source <(georescue completions zsh)        # ~/.zshrc
//! georescue completions fish > ~/.config/fish/completions/georescue.fish
//! georescue completions powershell >> $PROFILE
//! ```

use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use miette::Result;

use crate::cli::Cli;

/// Binary name the scripts complete for
const BIN_NAME: &str = "georescue";

#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(args: CompletionsArgs) -> Result<()> {
    write_completions(args.shell, &mut io::stdout().lock());
    Ok(())
}

/// Render the completion script for `shell` into `out`
pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, BIN_NAME, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_cover_subcommands() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell] {
            let mut buf = Vec::new();
            write_completions(shell, &mut buf);
            let script = String::from_utf8(buf).unwrap();
            assert!(script.contains(BIN_NAME), "{shell}: missing binary name");
            assert!(script.contains("sync"), "{shell}: missing sync");
            assert!(script.contains("search"), "{shell}: missing search");
        }
    }
}
