//! bellhop-convert: example worker
//!
//! Serves the placeholder "convert" unit and registers it with a gateway.
//!
//! ## Environment
//! - PORT: port to listen on (default 9100, 0 for an ephemeral port)
//! - FUNCTION_NAME: function to register for (default "convert")
//! - GATEWAY_ADDRESS: gateway to register with, e.g. "http://localhost:8003/"
//!   (registration is skipped when unset)
//! - SERVICE_HOST: host the gateway reaches this worker at (default "localhost")
//!
//! Logging is controlled by `BELLHOP_LOG` (default "info").

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use bellhop::handlers::convert::{register_with_gateway, serve, worker_address, ConvertWorker};
use bellhop::utils::bootstrap::init_tracing;

const DEFAULT_PORT: u16 = 9100;
const DEFAULT_FUNCTION: &str = "convert";
const DEFAULT_HOST: &str = "localhost";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let function_name =
        std::env::var("FUNCTION_NAME").unwrap_or_else(|_| DEFAULT_FUNCTION.to_string());
    let host = std::env::var("SERVICE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    let address = worker_address(&host, listener.local_addr()?);
    let worker = Arc::new(ConvertWorker::new(function_name.clone()));

    let server = tokio::spawn(serve(worker, listener));

    match std::env::var("GATEWAY_ADDRESS") {
        Ok(gateway) => {
            let client = reqwest::Client::new();
            register_with_gateway(&client, &gateway, &function_name, &address).await?;
        }
        Err(_) => warn!("GATEWAY_ADDRESS not set, not registering"),
    }

    info!(address = %address, function = %function_name, "bellhop-convert ready");

    server
        .await?
        .map_err(|e| e as Box<dyn std::error::Error>)?;
    Ok(())
}
