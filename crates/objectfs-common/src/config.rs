//! Client configuration
//!
//! Options are read from a TOML file; every field has a default so a partial
//! file (or none at all) is valid.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Protocol scheme of plain RPC connections
pub const PROTOCOL_PLAIN: &str = "pbrpc";

/// Protocol scheme of TLS RPC connections
pub const PROTOCOL_TLS: &str = "pbrpcs";

/// Tunables of the client data path
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Tries for requests that are neither reads nor writes
    pub max_tries: u32,
    /// Tries per read operation
    pub max_read_tries: u32,
    /// Tries per write operation
    pub max_write_tries: u32,
    /// Minimum time between two attempts of the same request
    pub retry_delay_s: u64,
    /// Upper bound for a single attempt
    pub request_timeout_s: u64,
    /// Connect to services over TLS
    pub enable_tls: bool,
    /// Largest RPC frame accepted from the network
    pub max_frame_len: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_tries: 40,
            max_read_tries: 40,
            max_write_tries: 40,
            retry_delay_s: 15,
            request_timeout_s: 30,
            enable_tls: false,
            max_frame_len: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl ClientOptions {
    /// Parse options from a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let options: Self =
            toml::from_str(s).map_err(|e| Error::Configuration(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject settings that would make requests unbounded
    pub fn validate(&self) -> Result<()> {
        if self.max_tries == 0 || self.max_read_tries == 0 || self.max_write_tries == 0 {
            return Err(Error::Configuration("try counts must be >= 1".into()));
        }
        if self.request_timeout_s == 0 {
            return Err(Error::Configuration("request_timeout_s must be > 0".into()));
        }
        if self.max_frame_len == 0 {
            return Err(Error::Configuration("max_frame_len must be > 0".into()));
        }
        Ok(())
    }

    /// Protocol scheme the client connects with
    #[must_use]
    pub fn protocol(&self) -> &'static str {
        if self.enable_tls {
            PROTOCOL_TLS
        } else {
            PROTOCOL_PLAIN
        }
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_s)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_s)
    }
}
