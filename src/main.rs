use clap::Parser;

use graphkeep::Settings;
use graphkeep::cli::{Cli, Commands};
use graphkeep::cli::commands::{index, init, query, serve};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Init { .. }) {
        let Commands::Init { force } = cli.command else { unreachable!() };
        init::run_init(force);
        return;
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        Settings::default()
    });

    graphkeep::logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Config => init::run_config(&settings),
        Commands::Index { path } => index::run_index(&settings, &path),
        Commands::Add { workspace, paths } => index::run_add(&settings, &workspace, &paths),
        Commands::Remove { workspace, paths } => index::run_remove(&settings, &workspace, &paths),
        Commands::Rename { workspace, src, dst } => index::run_rename(&settings, &workspace, &src, &dst),
        Commands::Clean { workspace } => index::run_clean(&settings, &workspace),
        Commands::Query { query: q } => query::run(&settings, q),
        Commands::Serve => serve::run(settings).await,
    }
}
