use crate::iface::{self, DiscoveryError, InterfaceSource};
use crate::wol::{MacAddress, PacketSender, ParseMacError};
use lazy_static::lazy_static;
use log::{info, warn};
use prometheus::{register_int_counter_vec, IntCounterVec};
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;

lazy_static! {
    static ref WAKE_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "wolweb_wake_requests_total",
        "Wake requests by broadcast mode and result",
        &["mode", "result"]
    )
    .unwrap();
    static ref MAGIC_PACKETS: IntCounterVec = register_int_counter_vec!(
        "wolweb_magic_packets_total",
        "Magic packet sends by result",
        &["result"]
    )
    .unwrap();
}

#[derive(thiserror::Error, Debug)]
#[error("{target}: {source}")]
pub struct SendFailure {
    pub target: String,
    #[source]
    pub source: io::Error,
}

#[derive(thiserror::Error, Debug)]
pub enum WakeError {
    #[error(transparent)]
    InvalidMacAddress(#[from] ParseMacError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("could not send magic packet to {0}")]
    Transport(SendFailure),
    #[error(
        "{} of {attempted} magic packet sends failed: {}",
        .failures.len(),
        join_failures(.failures)
    )]
    Fanout {
        attempted: usize,
        failures: Vec<SendFailure>,
    },
}

fn join_failures(failures: &[SendFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Clone)]
pub struct WakeDispatcher {
    sender: Arc<dyn PacketSender>,
    interfaces: Arc<dyn InterfaceSource>,
}

impl WakeDispatcher {
    pub fn new(sender: Arc<dyn PacketSender>, interfaces: Arc<dyn InterfaceSource>) -> Self {
        Self { sender, interfaces }
    }

    pub fn discover_broadcast_addresses(&self) -> Result<Vec<Ipv4Addr>, DiscoveryError> {
        iface::discover_broadcast_addresses(self.interfaces.as_ref())
    }

    // An empty or absent `broadcast` fans out to every local broadcast address.
    pub async fn wake(&self, mac: &str, broadcast: Option<&str>) -> Result<(), WakeError> {
        let mode = match broadcast {
            Some(b) if !b.is_empty() => "explicit",
            _ => "discovery",
        };
        let result = self.dispatch(mac, broadcast).await;
        let label = match &result {
            Ok(()) => "ok",
            Err(WakeError::InvalidMacAddress(_)) => "invalid_mac",
            Err(_) => "error",
        };
        WAKE_REQUESTS.with_label_values(&[mode, label]).inc();
        result
    }

    async fn dispatch(&self, mac: &str, broadcast: Option<&str>) -> Result<(), WakeError> {
        let mac: MacAddress = mac.parse()?;

        if let Some(target) = broadcast.filter(|b| !b.is_empty()) {
            info!("waking {} via {}", mac, target);
            return match self.sender.send(&mac, target).await {
                Ok(()) => {
                    MAGIC_PACKETS.with_label_values(&["ok"]).inc();
                    Ok(())
                }
                Err(source) => {
                    MAGIC_PACKETS.with_label_values(&["error"]).inc();
                    Err(WakeError::Transport(SendFailure {
                        target: target.to_string(),
                        source,
                    }))
                }
            };
        }

        let broadcasts = self.discover_broadcast_addresses()?;
        info!(
            "waking {} via {} discovered broadcast addresses",
            mac,
            broadcasts.len()
        );

        let handles: Vec<_> = broadcasts
            .into_iter()
            .map(|addr| {
                let target = addr.to_string();
                let sender = self.sender.clone();
                let task_target = target.clone();
                let handle =
                    tokio::spawn(async move { sender.send(&mac, &task_target).await });
                (target, handle)
            })
            .collect();

        let attempted = handles.len();
        let mut failures = Vec::new();
        // Every task has been spawned, so awaiting in order never blocks a send.
        for (target, handle) in handles {
            let source = match handle.await {
                Ok(Ok(())) => {
                    MAGIC_PACKETS.with_label_values(&["ok"]).inc();
                    continue;
                }
                Ok(Err(e)) => e,
                Err(e) => io::Error::new(io::ErrorKind::Other, e),
            };
            MAGIC_PACKETS.with_label_values(&["error"]).inc();
            warn!("magic packet for {} to {} failed: {}", mac, target, source);
            failures.push(SendFailure { target, source });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WakeError::Fanout {
                attempted,
                failures,
            })
        }
    }
}
