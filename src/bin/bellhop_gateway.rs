//! bellhop-gateway: API gateway
//!
//! Fronts a pool of workers that register themselves per function name.
//!
//! ```text
//! [Client] --POST/PUT/GET--> [bellhop-gateway] --least loaded--> [worker]
//!                                   |
//!                                   v
//!                        [Redis coordination store]
//! ```
//!
//! ## Configuration
//! Read from `bellhop.yaml`, the file named by `BELLHOP_CONFIG`, and
//! `BELLHOP__`-prefixed environment variables:
//! - server.host / server.port: bind address (default 0.0.0.0:8003)
//! - server.worker_threads: request-handling threads
//! - storage.type: "redis" or "memory"
//! - storage.redis.uri: Redis URI (default redis://localhost:6379)
//! - outbound.timeout_ms: timeout of calls to workers
//! - cache.enabled: serve repeated GETs from the result cache
//!
//! Logging is controlled by `BELLHOP_LOG` (default "info").

use std::sync::Arc;

use tracing::{error, info};

use bellhop::clients::HttpOutboundClient;
use bellhop::config::Config;
use bellhop::handlers::gateway::{serve, Gateway};
use bellhop::storage::init_storage;
use bellhop::utils::bootstrap::{build_runtime, init_tracing};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let runtime = build_runtime(config.server.worker_threads)?;
    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        storage = ?config.storage.storage_type,
        cache = config.cache.enabled,
        "Starting bellhop-gateway"
    );

    let store = init_storage(&config.storage).await?;
    let outbound = Arc::new(HttpOutboundClient::new(config.outbound.timeout())?);
    let gateway = Arc::new(Gateway::new(store, outbound, &config.cache));

    serve(gateway, &config.server.bind_address())
        .await
        .map_err(|e| e as Box<dyn std::error::Error>)?;

    info!("bellhop-gateway shut down");
    Ok(())
}
