//! Broadcast fan-out and response aggregation.
//!
//! A broadcast is delivered to every worker of one function (or of every
//! function this gateway has seen registered), except the worker that sent
//! it. Delivery is best effort: failed deliveries are logged and skipped.
//! Successful replies are joined with [`BROADCAST_DELIMITER`].

use std::sync::Arc;

use futures::future::join_all;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clients::OutboundClient;
use crate::discovery::ServiceRegistry;
use crate::storage::Result;

/// Separator between aggregated broadcast replies.
pub const BROADCAST_DELIMITER: &str = "~~~";

/// Header value prefix announcing a broadcast request.
pub const BROADCAST_PREFIX: &str = "broadcast:";

/// Sentinel target meaning every observed function.
const ALL_FUNCTIONS: &str = "all";

/// Which functions a broadcast is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastTarget {
    All,
    Function(String),
}

impl BroadcastTarget {
    /// Parse a `Service-Call` header value of the form `broadcast:<target>`.
    ///
    /// Returns `None` when the value is not a broadcast annotation or names
    /// no target.
    pub fn from_header(value: &str) -> Option<Self> {
        let target = value.trim().strip_prefix(BROADCAST_PREFIX)?.trim();
        match target {
            "" => None,
            ALL_FUNCTIONS => Some(BroadcastTarget::All),
            name => Some(BroadcastTarget::Function(name.to_string())),
        }
    }
}

/// Identity of the broadcast initiator, used for self-exclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Originator {
    /// Port the initiating worker listens on.
    pub port: Option<u16>,
    /// Registered address of the initiating worker, when it announces one.
    pub address: Option<String>,
}

impl Originator {
    /// Whether a worker at `address` is the initiator itself.
    pub fn excludes(&self, address: &str) -> bool {
        if self.address.as_deref() == Some(address) {
            return true;
        }
        match self.port {
            Some(port) => worker_port(address) == Some(port),
            None => false,
        }
    }
}

/// Port encoded in a worker address, or the scheme's default port.
fn worker_port(address: &str) -> Option<u16> {
    Url::parse(address).ok()?.port_or_known_default()
}

/// Fans broadcasts out to registered workers.
pub struct BroadcastCoordinator {
    registry: Arc<ServiceRegistry>,
    outbound: Arc<dyn OutboundClient>,
}

impl BroadcastCoordinator {
    pub fn new(registry: Arc<ServiceRegistry>, outbound: Arc<dyn OutboundClient>) -> Self {
        Self { registry, outbound }
    }

    /// Deliver `payload` to every target worker and join the replies.
    ///
    /// The aggregate lives for this call only, so concurrent broadcasts never
    /// see each other's replies. Only coordination store failures are errors.
    pub async fn broadcast(
        &self,
        target: &BroadcastTarget,
        payload: &Value,
        originator: &Originator,
    ) -> Result<String> {
        let functions = match target {
            BroadcastTarget::All => self.registry.observed_functions().await,
            BroadcastTarget::Function(name) => vec![name.clone()],
        };

        let mut aggregate: Vec<String> = Vec::new();
        for function in &functions {
            let workers = self.registry.list_workers(function).await?;
            let recipients: Vec<String> = workers
                .into_iter()
                .filter(|address| {
                    let own = originator.excludes(address);
                    if own {
                        debug!(function = %function, address = %address, "Skipping broadcast originator");
                    }
                    !own
                })
                .collect();

            let replies = join_all(
                recipients
                    .iter()
                    .map(|address| self.outbound.broadcast(address, payload)),
            )
            .await;

            for (address, reply) in recipients.iter().zip(replies) {
                match reply {
                    Ok(value) => aggregate.push(value.to_string()),
                    Err(e) => {
                        warn!(
                            function = %function,
                            address = %address,
                            error = %e,
                            "Broadcast delivery failed, skipping"
                        );
                    }
                }
            }
        }

        info!(
            functions = functions.len(),
            replies = aggregate.len(),
            "Broadcast complete"
        );

        Ok(aggregate.join(BROADCAST_DELIMITER))
    }
}
