//! Entry point for the Fator R Engine binary.
//!
//! Running this binary starts an HTTP server exposing the calculation
//! engine.  Settings come from environment variables (see
//! [`fator_r_engine::config`]); log filtering follows `RUST_LOG` and
//! defaults to `info`.

use fator_r_engine::config::Settings;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            error!("invalid configuration: {:#}", err);
            std::process::exit(2);
        }
    };
    info!(?settings, "starting Fator R engine");

    if let Err(err) = fator_r_engine::api::serve(settings).await {
        error!("error running server: {:#}", err);
        std::process::exit(1);
    }
}
