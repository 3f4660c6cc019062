use crate::iface::{InterfaceAddr, InterfaceSource, NetworkInterface};
use nix::sys::socket::SockaddrStorage;
use std::io;
use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};

pub struct SystemInterfaces;

fn to_ip(addr: &SockaddrStorage) -> Option<IpAddr> {
    if let Some(sin) = addr.as_sockaddr_in() {
        return Some(IpAddr::V4(*SocketAddrV4::from(*sin).ip()));
    }
    if let Some(sin6) = addr.as_sockaddr_in6() {
        return Some(IpAddr::V6(*SocketAddrV6::from(*sin6).ip()));
    }
    None
}

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> io::Result<Vec<NetworkInterface>> {
        let mut interfaces: Vec<NetworkInterface> = Vec::new();
        for ifaddr in nix::ifaddrs::getifaddrs().map_err(io::Error::from)? {
            let index = match interfaces
                .iter()
                .position(|i| i.name == ifaddr.interface_name)
            {
                Some(index) => index,
                None => {
                    interfaces.push(NetworkInterface {
                        name: ifaddr.interface_name.clone(),
                        addresses: Ok(Vec::new()),
                    });
                    interfaces.len() - 1
                }
            };
            // Link-layer entries carry no IP address.
            let Some(ip) = ifaddr.address.as_ref().and_then(to_ip) else {
                continue;
            };
            let netmask = ifaddr.netmask.as_ref().and_then(to_ip);
            if let Ok(addresses) = &mut interfaces[index].addresses {
                addresses.push(InterfaceAddr { ip, netmask });
            }
        }
        Ok(interfaces)
    }
}

#[cfg(test)]
mod tests {
    use crate::iface::ifaddrs::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_system_interfaces_include_loopback() {
        let interfaces = SystemInterfaces.interfaces().unwrap();
        let loopback = interfaces.iter().flat_map(|i| match &i.addresses {
            Ok(addresses) => addresses.clone(),
            Err(_) => Vec::new(),
        });
        assert!(loopback
            .into_iter()
            .any(|a| a.ip == IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }
}
