pub mod icmp;

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::debug;
use prometheus::{register_int_counter_vec, IntCounterVec};
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

lazy_static! {
    static ref PINGS: IntCounterVec = register_int_counter_vec!(
        "wolweb_pings_total",
        "Liveness probes by result",
        &["result"]
    )
    .unwrap();
}

#[derive(thiserror::Error, Debug)]
pub enum PingError {
    #[error("could not resolve {host}: {source}")]
    Resolution {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("ping failed: {0}")]
    Transport(#[from] io::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProbeStats {
    pub sent: usize,
    pub received: usize,
}

impl ProbeStats {
    // 0 when nothing was sent.
    pub fn packet_loss(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        (self.sent - self.received.min(self.sent)) as f64 * 100.0 / self.sent as f64
    }
}

// Lost replies are counted in the stats, not returned as errors.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(
        &self,
        addr: IpAddr,
        count: usize,
        timeout: Duration,
    ) -> Result<ProbeStats, PingError>;
}

#[derive(Clone)]
pub struct LivenessChecker {
    prober: Arc<dyn Prober>,
    timeout: Duration,
}

impl LivenessChecker {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            prober,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(prober: Arc<dyn Prober>, timeout: Duration) -> Self {
        Self { prober, timeout }
    }

    pub async fn ping(&self, host: &str) -> Result<bool, PingError> {
        let result = self.probe_once(host).await;
        let label = match &result {
            Ok(true) => "reachable",
            Ok(false) => "unreachable",
            Err(PingError::Resolution { .. }) => "resolution_error",
            Err(PingError::Transport(_)) => "transport_error",
        };
        PINGS.with_label_values(&[label]).inc();
        result
    }

    async fn probe_once(&self, host: &str) -> Result<bool, PingError> {
        let addr = self.resolve(host).await?;
        let stats = self.prober.probe(addr, 1, self.timeout).await?;
        debug!(
            "ping {} ({}): {}/{} replies",
            host, addr, stats.received, stats.sent
        );
        Ok(stats.packet_loss() == 0.0)
    }

    async fn resolve(&self, host: &str) -> Result<IpAddr, PingError> {
        if let Ok(addr) = host.parse() {
            return Ok(addr);
        }
        let resolution_error = |source| PingError::Resolution {
            host: host.to_string(),
            source,
        };
        let addrs = tokio::time::timeout(self.timeout, tokio::net::lookup_host((host, 0)))
            .await
            .map_err(|_| {
                resolution_error(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "name resolution timed out",
                ))
            })?
            .map_err(resolution_error)?;
        let addrs: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| {
                resolution_error(io::Error::new(io::ErrorKind::NotFound, "no addresses"))
            })
    }
}
