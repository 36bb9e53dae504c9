// src/network.rs
use std::time::Duration;

use tokio::net::TcpStream;

/// Answers "is the network usable right now?" for constraint gating.
#[async_trait::async_trait]
pub trait NetworkMonitor: Send + Sync {
    async fn is_available(&self) -> bool;
}

/// No gating at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait::async_trait]
impl NetworkMonitor for AlwaysOnline {
    async fn is_available(&self) -> bool {
        true
    }
}

/// Considers the network available when a TCP connect to `addr` succeeds
/// within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl NetworkMonitor for TcpProbe {
    async fn is_available(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::trace!(addr = %self.addr, error = %e, "network probe refused");
                false
            }
            Err(_) => {
                tracing::trace!(addr = %self.addr, "network probe timed out");
                false
            }
        }
    }
}
