//! Cookiescan CLI entry point.

use clap::Parser;
use cookiescan_cli::{init_tracing, run, Cli};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(summary) => {
            for path in &summary.reports {
                println!("Report saved in {}", path.display());
            }
            if !summary.skipped.is_empty() {
                println!("Skipped site configs: {}", summary.skipped.join(", "));
            }
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "cookiescan failed");
            eprintln!("cookiescan error: {e:#}");
            process::exit(1);
        }
    }
}
