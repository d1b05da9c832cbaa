//! Reachability probes.

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable(String),
}

pub trait Probe {
    /// What is being probed, for logs.
    fn target(&self) -> String;

    fn probe(&self) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Succeeds when a TCP connection to `address` opens within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: &str, timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            timeout,
        }
    }
}

impl Probe for TcpProbe {
    fn target(&self) -> String {
        self.address.clone()
    }

    async fn probe(&self) -> ProbeOutcome {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => ProbeOutcome::Reachable,
            Ok(Err(e)) => ProbeOutcome::Unreachable(e.to_string()),
            Err(_) => ProbeOutcome::Unreachable(format!("connect timed out after {:?}", self.timeout)),
        }
    }
}
