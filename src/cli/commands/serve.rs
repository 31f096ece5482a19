//! `serve` command: bind the HTTP API and run until shutdown.

use crate::config::Settings;

pub async fn run(settings: Settings) {
    if let Err(e) = crate::http::serve(settings).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
