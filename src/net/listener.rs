//! Listen address parsing and TCP binding.
//!
//! # Responsibilities
//! - Parse `host:port` strings as written in configuration
//! - Treat an empty host as "all interfaces"
//! - Bind a Tokio listener at start time, never at construction

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid listen address `{address}`: {reason}")]
    Address { address: String, reason: &'static str },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: ListenAddress,
        #[source]
        source: std::io::Error,
    },
}

/// A validated but unbound `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddress {
    host: String,
    port: u16,
}

impl ListenAddress {
    const ANY: &'static str = "0.0.0.0";

    /// Parse `host:port`, `:port` or `[v6]:port`.
    pub fn parse(address: &str) -> Result<Self, ListenerError> {
        let invalid = |reason| ListenerError::Address {
            address: address.to_string(),
            reason,
        };

        let (host, port) = address.trim().rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        if port.is_empty() {
            return Err(invalid("missing port"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("port must be a number between 0 and 65535"))?;

        let host = match host.strip_prefix('[') {
            Some(inner) => inner.strip_suffix(']').ok_or_else(|| invalid("unterminated IPv6 bracket"))?,
            None if host.contains(':') => return Err(invalid("IPv6 hosts must be bracketed")),
            None => host,
        };
        let host = if host.is_empty() { Self::ANY } else { host };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind a TCP listener. Port `0` picks an ephemeral port.
    pub async fn bind(&self) -> Result<TcpListener, ListenerError> {
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|source| ListenerError::Bind {
                address: self.clone(),
                source,
            })?;

        if let Ok(local) = listener.local_addr() {
            tracing::debug!(address = %self, local = %local, "Listener bound");
        }
        Ok(listener)
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ListenAddress {
    type Err = ListenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
