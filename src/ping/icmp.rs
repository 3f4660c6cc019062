use crate::ping::{PingError, ProbeStats, Prober};
use async_trait::async_trait;
use log::debug;
use socket2::Type;
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError, ICMP};

const PAYLOAD: [u8; 56] = [0; 56];

// Raw sockets need root or CAP_NET_RAW. Datagram sockets need the gid to be
// inside net.ipv4.ping_group_range.
pub struct IcmpProber {
    privileged: bool,
}

impl IcmpProber {
    pub fn new(privileged: bool) -> Self {
        Self { privileged }
    }

    fn sock_type(&self) -> Type {
        if self.privileged {
            Type::RAW
        } else {
            Type::DGRAM
        }
    }

    fn config(&self, addr: IpAddr) -> Config {
        let kind = if addr.is_ipv4() { ICMP::V4 } else { ICMP::V6 };
        Config::builder()
            .kind(kind)
            .sock_type_hint(self.sock_type())
            .build()
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn probe(
        &self,
        addr: IpAddr,
        count: usize,
        timeout: Duration,
    ) -> Result<ProbeStats, PingError> {
        let client = Client::new(&self.config(addr))?;
        let mut pinger = client.pinger(addr, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        let mut stats = ProbeStats::default();
        for seq in 0..count {
            stats.sent += 1;
            match pinger.ping(PingSequence(seq as u16), &PAYLOAD).await {
                Ok((_, rtt)) => {
                    debug!("reply from {} in {:?}", addr, rtt);
                    stats.received += 1;
                }
                Err(SurgeError::Timeout { .. }) => debug!("no reply from {}", addr),
                Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e).into()),
            }
        }
        Ok(stats)
    }
}
