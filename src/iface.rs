pub mod ifaddrs;

use log::debug;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

#[derive(thiserror::Error, Debug)]
#[error("could not enumerate network interfaces")]
pub struct DiscoveryError(#[from] pub io::Error);

#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceAddr {
    pub ip: IpAddr,
    pub netmask: Option<IpAddr>,
}

impl InterfaceAddr {
    pub fn v4(ip: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self {
            ip: IpAddr::V4(ip),
            netmask: Some(IpAddr::V4(netmask)),
        }
    }
}

#[derive(Debug)]
pub struct NetworkInterface {
    pub name: String,
    // Reading one interface's addresses can fail without the whole listing failing.
    pub addresses: io::Result<Vec<InterfaceAddr>>,
}

pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> io::Result<Vec<NetworkInterface>>;
}

pub fn broadcast_address(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(netmask))
}

// No deduplication: interfaces sharing a subnet each yield its broadcast.
pub fn discover_broadcast_addresses(
    source: &dyn InterfaceSource,
) -> Result<Vec<Ipv4Addr>, DiscoveryError> {
    let mut broadcasts = Vec::new();
    for iface in source.interfaces()? {
        let addresses = match iface.addresses {
            Ok(addresses) => addresses,
            Err(e) => {
                debug!("skipping interface {}: {}", iface.name, e);
                continue;
            }
        };
        for addr in addresses {
            if let (IpAddr::V4(ip), Some(IpAddr::V4(mask))) = (addr.ip, addr.netmask) {
                broadcasts.push(broadcast_address(ip, mask));
            }
        }
    }
    Ok(broadcasts)
}
