use anyhow::Result;
use clap::Parser;
use perimeter::cli::{Cli, Commands};
use perimeter::config::AppSettings;
use perimeter::output;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Scan(cmd) => {
            let settings = AppSettings::load_or_default(cli.config.as_deref())?;
            cmd.execute(settings, cli.quiet).await?;
        }
        Commands::Config(cmd) => cmd.execute(cli.config.as_deref(), cli.quiet)?,
    }
    Ok(())
}

/// Logs go to stderr so report output on stdout stays machine-readable.
fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        "perimeter=debug"
    } else if quiet {
        "perimeter=warn"
    } else {
        "perimeter=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
