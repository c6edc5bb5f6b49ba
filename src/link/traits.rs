//! Link driver trait abstraction for pluggable network backends

use crate::config::LinkCredentials;
use async_trait::async_trait;
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Association failed: {0}")]
    AssociationFailed(String),

    #[error("Link not connected after {0:?}")]
    Timeout(Duration),

    #[error("Link I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Network association capability consumed by the [`LinkManager`](super::LinkManager)
#[async_trait]
pub trait LinkDriver: Send {
    /// Perform one association attempt
    async fn associate(&mut self, credentials: &LinkCredentials) -> Result<(), LinkError>;

    /// Whether the association is still alive
    async fn is_up(&mut self) -> bool;

    /// Address acquired by the last successful association
    fn local_address(&self) -> Option<IpAddr>;

    /// Stable per-device identifier (hardware address)
    fn hardware_identity(&self) -> String;

    /// Human-readable name for this link
    fn name(&self) -> &'static str;
}
