use clap::Parser;
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use georescue::cli::{Cli, Commands, GlobalOpts};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(&global);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Sync(args) => georescue::cli::commands::sync::run(args, &global).await,
            Commands::Search(args) => georescue::cli::commands::search::run(args, &global).await,
            Commands::Show(args) => georescue::cli::commands::show::run(args, &global).await,
            Commands::Cache(cmd) => georescue::cli::commands::cache::run(cmd, &global).await,
            Commands::Completions(args) => georescue::cli::commands::completions::run(args),
        }
    })
}

/// Logs go to stderr; `RUST_LOG` wins over `--verbose`
fn init_logging(global: &GlobalOpts) {
    let default = if global.verbose { "georescue=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
