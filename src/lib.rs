pub mod channel;
pub mod cli;
pub mod clock;
pub mod correlation;
pub mod error;
pub mod host;
pub mod models;
pub mod recognition;
pub mod session;
pub mod settings;
pub mod utils;
pub mod video;

use clap::Parser;

pub use error::{LagError, Result};

pub fn run() -> anyhow::Result<()> {
    let debug_mode = std::env::var("KEYLAG_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    // RUST_LOG, when set, overrides the level chosen here.
    env_logger::Builder::new()
        .filter_level(if debug_mode {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let cli = cli::Cli::parse();
    log::info!("keylag starting up...");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(cli::execute(cli))
}
