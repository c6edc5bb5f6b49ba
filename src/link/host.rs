//! Host link implementation
//!
//! On a host the operating system owns the radio association, so "associating"
//! means acquiring a route to the broker: a UDP socket is connected (no packets
//! are sent) and the local address the kernel picks is the device address.
//! The link counts as lost when that route disappears or the address changes.

use super::traits::{LinkDriver, LinkError};
use crate::config::LinkCredentials;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, warn};

/// Fallback identity when no hardware address can be read
const UNKNOWN_HARDWARE_ID: &str = "00:00:00:00:00:00";

pub struct HostLink {
    /// `host:port` the route is probed towards
    probe: String,
    interface: String,
    hardware_override: Option<String>,
    resolved: Option<SocketAddr>,
    address: Option<IpAddr>,
    hardware_id: String,
}

impl HostLink {
    pub fn new(probe: String, interface: String, hardware_override: Option<String>) -> Self {
        Self {
            probe,
            interface,
            hardware_override,
            resolved: None,
            address: None,
            hardware_id: UNKNOWN_HARDWARE_ID.into(),
        }
    }

    fn read_hardware_id(&self) -> String {
        if let Some(id) = &self.hardware_override {
            return id.to_uppercase();
        }

        let path = PathBuf::from("/sys/class/net")
            .join(&self.interface)
            .join("address");
        match std::fs::read_to_string(&path) {
            Ok(raw) => normalize_hardware_id(&raw),
            Err(e) => {
                warn!(
                    "Cannot read hardware address of {}: {}, using {}",
                    self.interface, e, UNKNOWN_HARDWARE_ID
                );
                UNKNOWN_HARDWARE_ID.into()
            }
        }
    }
}

/// Normalize `aa:bb:...\n` to `AA:BB:...`
fn normalize_hardware_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Local address the kernel would use to reach `target`
async fn route_address(target: SocketAddr) -> std::io::Result<IpAddr> {
    let bind = if target.is_ipv4() {
        SocketAddr::from(([0u8; 4], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.connect(target).await?;
    Ok(socket.local_addr()?.ip())
}

#[async_trait]
impl LinkDriver for HostLink {
    async fn associate(&mut self, credentials: &LinkCredentials) -> Result<(), LinkError> {
        debug!(
            "Host networking is OS-managed; ssid {} is informational",
            credentials.ssid
        );

        let target = lookup_host(self.probe.as_str())
            .await?
            .next()
            .ok_or_else(|| LinkError::AssociationFailed(format!("cannot resolve {}", self.probe)))?;

        let address = route_address(target).await?;
        if address.is_unspecified() {
            return Err(LinkError::AssociationFailed(format!(
                "no route to {}",
                target
            )));
        }

        self.resolved = Some(target);
        self.address = Some(address);
        self.hardware_id = self.read_hardware_id();
        Ok(())
    }

    async fn is_up(&mut self) -> bool {
        let Some(target) = self.resolved else {
            return false;
        };
        match route_address(target).await {
            Ok(address) => Some(address) == self.address,
            Err(e) => {
                debug!("Route probe to {} failed: {}", target, e);
                false
            }
        }
    }

    fn local_address(&self) -> Option<IpAddr> {
        self.address
    }

    fn hardware_identity(&self) -> String {
        self.hardware_id.clone()
    }

    fn name(&self) -> &'static str {
        "host"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> LinkCredentials {
        LinkCredentials {
            ssid: "lab".into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn test_normalize_hardware_id() {
        assert_eq!(normalize_hardware_id("aa:bb:cc:dd:ee:ff\n"), "AA:BB:CC:DD:EE:FF");
    }

    #[tokio::test]
    async fn test_loopback_association() {
        let mut link = HostLink::new(
            "127.0.0.1:1883".into(),
            "lo".into(),
            Some("de:ad:be:ef:00:01".into()),
        );
        assert!(!link.is_up().await);

        link.associate(&credentials()).await.unwrap();
        assert_eq!(link.local_address(), Some(IpAddr::from([127, 0, 0, 1])));
        assert_eq!(link.hardware_identity(), "DE:AD:BE:EF:00:01");
        assert!(link.is_up().await);
    }

    #[tokio::test]
    async fn test_unresolvable_probe_fails() {
        let mut link = HostLink::new("not a host".into(), "lo".into(), None);
        assert!(link.associate(&credentials()).await.is_err());
        assert_eq!(link.local_address(), None);
    }
}
