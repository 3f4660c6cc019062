pub mod noop;

use async_trait::async_trait;
use log::debug;
use std::fmt;
use std::io;
use std::str::FromStr;
use tokio::net::UdpSocket;

const SYNCHRONIZATION_SCHEME: [u8; 6] = [0xff; 6];
const MAC_REPETITIONS: usize = 16;
pub const MAGIC_PACKET_LEN: usize = SYNCHRONIZATION_SCHEME.len() + 6 * MAC_REPETITIONS;

// Discard port, the conventional destination for magic packets.
pub const DEFAULT_PORT: u16 = 9;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("invalid MAC address {0:?}")]
pub struct ParseMacError(pub String);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn magic_packet(&self) -> [u8; MAGIC_PACKET_LEN] {
        let mut packet = [0u8; MAGIC_PACKET_LEN];
        packet[..SYNCHRONIZATION_SCHEME.len()].copy_from_slice(&SYNCHRONIZATION_SCHEME);
        for chunk in packet[SYNCHRONIZATION_SCHEME.len()..].chunks_exact_mut(6) {
            chunk.copy_from_slice(&self.0);
        }
        packet
    }
}

// Either `:` or `-` between octets, never a mix of both.
impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMacError(s.to_string());
        let delimiter = if s.contains(':') { ':' } else { '-' };
        let mut octets = [0u8; 6];
        let mut parts = s.split(delimiter);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(err)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(err());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| err())?;
        }
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

// `target` is a host or IP address with an optional `:port`.
#[async_trait]
pub trait PacketSender: Send + Sync {
    async fn send(&self, mac: &MacAddress, target: &str) -> io::Result<()>;
}

pub struct UdpSender {
    port: u16,
}

impl UdpSender {
    pub fn new() -> Self {
        Self { port: DEFAULT_PORT }
    }

    pub fn with_port(port: u16) -> Self {
        Self { port }
    }
}

impl Default for UdpSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PacketSender for UdpSender {
    async fn send(&self, mac: &MacAddress, target: &str) -> io::Result<()> {
        let (host, port) = split_target(target, self.port);
        let addr = tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {target}"))
            })?;
        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.set_broadcast(true)?;
        let sent = socket.send_to(&mac.magic_packet(), addr).await?;
        debug!("sent {sent} byte magic packet for {mac} to {addr}");
        Ok(())
    }
}

fn split_target(target: &str, default_port: u16) -> (&str, u16) {
    if let Some(rest) = target.strip_prefix('[') {
        if let Some((host, port)) = rest.split_once("]:") {
            if let Ok(port) = port.parse() {
                return (host, port);
            }
        }
        return (rest.trim_end_matches(']'), default_port);
    }
    match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host, port),
            Err(_) => (target, default_port),
        },
        _ => (target, default_port),
    }
}


#[cfg(test)]
mod tests {
    use crate::wol::*;

    #[test]
    fn test_parse_colon_delimited() {
        let mac: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(mac.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn test_parse_hyphen_delimited() {
        let mac: MacAddress = "24-4b-fe-55-78-94".parse().unwrap();
        assert_eq!(mac.octets(), [0x24, 0x4b, 0xfe, 0x55, 0x78, 0x94]);
        assert_eq!(mac.to_string(), "24:4b:fe:55:78:94");
    }

    #[test]
    fn test_parse_invalid() {
        for s in [
            "not-a-mac",
            "",
            "aa:bb:cc:dd:ee",
            "aa:bb:cc:dd:ee:ff:00",
            "aa:bb-cc:dd:ee:ff",
            "aaa:bb:cc:dd:ee:f",
            "gg:bb:cc:dd:ee:ff",
            "+a:+b:+c:+d:+e:+f",
            "aa:bb:cc:dd:ee:+f",
        ] {
            assert_eq!(
                s.parse::<MacAddress>(),
                Err(ParseMacError(s.to_string())),
                "{s}"
            );
        }
    }

    #[test]
    fn test_magic_packet() {
        let mac = MacAddress::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let packet = mac.magic_packet();
        assert_eq!(packet.len(), 102);
        assert_eq!(&packet[..6], &[0xff; 6]);
        for chunk in packet[6..].chunks(6) {
            assert_eq!(chunk, &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        }
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("192.168.1.255", 9), ("192.168.1.255", 9));
        assert_eq!(split_target("192.168.1.255:7", 9), ("192.168.1.255", 7));
        assert_eq!(split_target("nas.local:7", 9), ("nas.local", 7));
        assert_eq!(split_target("nas.local", 9), ("nas.local", 9));
        assert_eq!(split_target("ff02::1", 9), ("ff02::1", 9));
        assert_eq!(split_target("[ff02::1]:7", 9), ("ff02::1", 7));
    }

    #[tokio::test]
    async fn test_udp_sender_delivers_packet() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();

        UdpSender::with_port(port)
            .send(&mac, "127.0.0.1")
            .await
            .unwrap();

        let mut buf = [0u8; 256];
        let len = listener.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &mac.magic_packet());
    }
}
