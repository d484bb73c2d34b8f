// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Parses port mappings like "8080:80", "127.0.0.1:8080:80/udp" and "80".

use serde::Deserialize;
use std::fmt;

/// A published container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: String,
}

impl PortMapping {
    pub fn parse(input: &str) -> Result<Self, String> {
        let (ports, protocol) = match input.split_once('/') {
            Some((ports, proto @ ("tcp" | "udp" | "sctp"))) => (ports, proto),
            Some((_, proto)) => return Err(format!("unknown protocol '{}' in {}", proto, input)),
            None => (input, "tcp"),
        };

        let port = |s: &str| {
            s.parse::<u16>()
                .map_err(|_| format!("invalid port '{}' in {}", s, input))
        };

        let parts: Vec<&str> = ports.split(':').collect();
        let (host_ip, host_port, container_port) = match parts.as_slice() {
            [container] => (None, None, port(container)?),
            [host, container] => (None, Some(port(host)?), port(container)?),
            [ip, host, container] => (
                Some(ip.to_string()),
                if host.is_empty() { None } else { Some(port(host)?) },
                port(container)?,
            ),
            _ => return Err(format!("invalid port mapping: {}", input)),
        };

        Ok(Self {
            host_ip,
            host_port,
            container_port,
            protocol: protocol.to_string(),
        })
    }

    /// Key used by `ExposedPorts` and `PortBindings`, e.g. `80/tcp`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ip) = &self.host_ip {
            write!(f, "{}:", ip)?;
        }
        if let Some(port) = self.host_port {
            write!(f, "{}:", port)?;
        }
        write!(f, "{}", self.key())
    }
}

pub fn deserialize_ports<'de, D>(deserializer: D) -> Result<Vec<PortMapping>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<PortEntry> = Vec::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|entry| match entry {
            PortEntry::Text(s) => PortMapping::parse(&s),
            PortEntry::Number(n) => Ok(PortMapping {
                host_ip: None,
                host_port: None,
                container_port: n,
                protocol: "tcp".to_string(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortEntry {
    Number(u16),
    Text(String),
}
