use crate::wol::{MacAddress, ParseMacError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config")]
    Parse(#[from] serde_yaml::Error),
    #[error("machine {name:?} has an invalid MAC address")]
    InvalidMac {
        name: String,
        #[source]
        source: ParseMacError,
    },
    #[error("machine name {0:?} is configured more than once")]
    DuplicateName(String),
    #[error("MAC address {0:?} is configured more than once")]
    DuplicateMac(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MachineEntry {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(rename = "address", alias = "Address", alias = "mac_address")]
    pub mac_address: String,
    #[serde(default, alias = "Host", skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(
        default,
        alias = "broadcastaddress",
        alias = "BroadcastAddress",
        skip_serializing_if = "Option::is_none"
    )]
    pub broadcast_address: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AddressBook {
    entries: Vec<MachineEntry>,
}

impl AddressBook {
    pub fn new(entries: Vec<MachineEntry>) -> Result<Self, ConfigError> {
        let mut names = HashSet::new();
        let mut macs = HashSet::new();
        for entry in &entries {
            let mac: MacAddress =
                entry
                    .mac_address
                    .parse()
                    .map_err(|source| ConfigError::InvalidMac {
                        name: entry.name.clone(),
                        source,
                    })?;
            if !names.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateName(entry.name.clone()));
            }
            if !macs.insert(mac) {
                return Err(ConfigError::DuplicateMac(entry.mac_address.clone()));
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[MachineEntry] {
        &self.entries
    }

    pub fn find_by_name(&self, name: &str) -> Option<&MachineEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    // Case and `:` versus `-` delimiters are ignored.
    pub fn find_by_mac(&self, address: &str) -> Option<&MachineEntry> {
        let address: MacAddress = address.parse().ok()?;
        self.entries
            .iter()
            .find(|e| e.mac_address.parse::<MacAddress>().ok() == Some(address))
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default, alias = "macaddresses", alias = "macAddresses", alias = "MacAddresses")]
    mac_addresses: Vec<MachineEntry>,
    #[serde(default, alias = "privilegedping", alias = "privilegedPing", alias = "PrivilegedPing")]
    privileged_ping: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub address_book: AddressBook,
    // Raw ICMP sockets instead of unprivileged datagram ones.
    pub privileged_ping: bool,
}

impl Config {
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(contents)?;
        Ok(Self {
            address_book: AddressBook::new(file.mac_addresses)?,
            privileged_ping: file.privileged_ping,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    // The command line can turn privileged ping on but never off.
    pub fn use_privileged_ping(&self, forced: bool) -> bool {
        forced || self.privileged_ping
    }
}

#[cfg(test)]
mod tests {
    use crate::config::*;

    const CONFIG: &str = r#"
privileged_ping: true
mac_addresses:
  - name: nas
    address: "AA:BB:CC:DD:EE:FF"
    host: 192.168.1.50
  - name: desktop
    address: 24-4b-fe-55-78-94
    broadcast_address: 192.168.1.255
"#;

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(CONFIG).unwrap();
        assert!(config.privileged_ping);
        assert_eq!(
            config.address_book.entries(),
            &[
                MachineEntry {
                    name: "nas".to_string(),
                    mac_address: "AA:BB:CC:DD:EE:FF".to_string(),
                    host: Some("192.168.1.50".to_string()),
                    broadcast_address: None,
                },
                MachineEntry {
                    name: "desktop".to_string(),
                    mac_address: "24-4b-fe-55-78-94".to_string(),
                    host: None,
                    broadcast_address: Some("192.168.1.255".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_from_yaml_legacy_keys() {
        let config = Config::from_yaml(
            "PrivilegedPing: true\nMacAddresses:\n  - Name: nas\n    Address: aa:bb:cc:dd:ee:ff\n    Host: nas.local\n",
        )
        .unwrap();
        assert!(config.privileged_ping);
        let nas = config.address_book.find_by_name("nas").unwrap();
        assert_eq!(nas.host.as_deref(), Some("nas.local"));
    }

    #[test]
    fn test_from_yaml_empty() {
        let config = Config::from_yaml("{}").unwrap();
        assert!(!config.privileged_ping);
        assert!(config.address_book.entries().is_empty());
    }

    #[test]
    fn test_rejects_duplicates() {
        let dup_name = "mac_addresses:\n  - {name: a, address: 'aa:bb:cc:dd:ee:ff'}\n  - {name: a, address: 'aa:bb:cc:dd:ee:00'}\n";
        assert!(matches!(
            Config::from_yaml(dup_name),
            Err(ConfigError::DuplicateName(name)) if name == "a"
        ));
        let dup_mac = "mac_addresses:\n  - {name: a, address: 'aa:bb:cc:dd:ee:ff'}\n  - {name: b, address: 'AA-BB-CC-DD-EE-FF'}\n";
        assert!(matches!(
            Config::from_yaml(dup_mac),
            Err(ConfigError::DuplicateMac(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_mac() {
        assert!(matches!(
            Config::from_yaml("mac_addresses:\n  - {name: a, address: nope}\n"),
            Err(ConfigError::InvalidMac { name, .. }) if name == "a"
        ));
    }

    #[test]
    fn test_rejects_signed_octets() {
        assert!(matches!(
            Config::from_yaml("mac_addresses:\n  - {name: a, address: '+a:+b:+c:+d:+e:+f'}\n"),
            Err(ConfigError::InvalidMac { name, .. }) if name == "a"
        ));
    }

    #[test]
    fn test_use_privileged_ping() {
        let unprivileged = Config::from_yaml("privileged_ping: false").unwrap();
        assert!(!unprivileged.use_privileged_ping(false));
        assert!(unprivileged.use_privileged_ping(true));
        let privileged = Config::from_yaml("privileged_ping: true").unwrap();
        assert!(privileged.use_privileged_ping(false));
        assert!(privileged.use_privileged_ping(true));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/wolweb.yaml"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_find() {
        let book = Config::from_yaml(CONFIG).unwrap().address_book;
        assert_eq!(book.find_by_name("nas").unwrap().mac_address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(book.find_by_name("unknown"), None);
        assert_eq!(book.find_by_name("NAS"), None);
        assert_eq!(book.find_by_mac("aa-bb-cc-dd-ee-ff").unwrap().name, "nas");
        assert_eq!(book.find_by_mac("24:4B:FE:55:78:94").unwrap().name, "desktop");
        assert_eq!(book.find_by_mac("00:00:00:00:00:00"), None);
        assert_eq!(book.find_by_mac("not-a-mac"), None);
        assert_eq!(AddressBook::default().find_by_name("unknown"), None);
    }
}
