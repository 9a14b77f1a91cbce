//! Core type definitions for objectfs
//!
//! Striping policies and replica locations are handed to the client by the
//! metadata service together with the file's credentials. Address mappings
//! come from the directory service. Neither is ever mutated by the data path.

use crate::error::{Error, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Maximum number of shards a single erasure-coded stripe can span
pub const MAX_STRIPE_WIDTH: u32 = 255;

/// Placement scheme of a striping policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum StripingPolicyType {
    /// Plain striping: each object lives on exactly one node per replica
    #[default]
    #[display("RAID0")]
    Raid0,
    /// Every object is split into data shards plus parity shards
    #[display("ERASURECODE")]
    ErasureCode,
}

/// Striping policy of one replica
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StripingPolicy {
    #[serde(default)]
    pub policy_type: StripingPolicyType,
    /// Stripe size in kB (1024 bytes)
    pub stripe_size_kb: u32,
    /// Number of data-bearing nodes
    pub width: u32,
    /// Number of parity nodes (erasure-coded policies only)
    #[serde(default)]
    pub parity_width: Option<u32>,
}

impl StripingPolicy {
    /// Create a RAID0 policy
    #[must_use]
    pub const fn raid0(stripe_size_kb: u32, width: u32) -> Self {
        Self {
            policy_type: StripingPolicyType::Raid0,
            stripe_size_kb,
            width,
            parity_width: None,
        }
    }

    /// Create an erasure-coded policy with `width` data and `parity_width` parity nodes
    #[must_use]
    pub const fn erasure_code(stripe_size_kb: u32, width: u32, parity_width: u32) -> Self {
        Self {
            policy_type: StripingPolicyType::ErasureCode,
            stripe_size_kb,
            width,
            parity_width: Some(parity_width),
        }
    }

    /// Stripe size in bytes
    #[must_use]
    pub const fn stripe_size(&self) -> usize {
        self.stripe_size_kb as usize * 1024
    }

    /// Number of parity nodes, 0 if the policy has none
    #[must_use]
    pub fn parity_width(&self) -> u32 {
        self.parity_width.unwrap_or(0)
    }

    /// Number of nodes a stripe is spread over (data + parity)
    #[must_use]
    pub fn stripe_width(&self) -> u32 {
        self.width + self.parity_width()
    }

    /// Check the policy invariants
    pub fn validate(&self) -> Result<()> {
        if self.stripe_size_kb == 0 {
            return Err(Error::InvalidStripingPolicy(
                "stripe_size must be > 0".into(),
            ));
        }
        if self.width == 0 {
            return Err(Error::InvalidStripingPolicy("width must be >= 1".into()));
        }
        if self.policy_type == StripingPolicyType::ErasureCode {
            if self.parity_width() == 0 {
                return Err(Error::InvalidStripingPolicy(
                    "erasure-coded policy needs parity_width >= 1".into(),
                ));
            }
            if self.stripe_width() > MAX_STRIPE_WIDTH {
                return Err(Error::InvalidStripingPolicy(format!(
                    "stripe width {} exceeds {MAX_STRIPE_WIDTH}",
                    self.stripe_width()
                )));
            }
        }
        Ok(())
    }
}

/// One replica of a file: its striping policy and the OSDs serving each column
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    pub policy: StripingPolicy,
    /// `osd_uuids[i]` serves column `i` of the policy
    pub osd_uuids: Vec<String>,
}

impl Replica {
    pub fn new(policy: StripingPolicy, osd_uuids: Vec<String>) -> Self {
        Self { policy, osd_uuids }
    }
}

/// Replica locations of a file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XLocSet {
    pub version: u32,
    pub replicas: Vec<Replica>,
}

impl XLocSet {
    pub fn new(version: u32, replicas: Vec<Replica>) -> Self {
        Self { version, replicas }
    }

    /// Striping policies of all replicas, in replica order
    #[must_use]
    pub fn policies(&self) -> Vec<StripingPolicy> {
        self.replicas.iter().map(|r| r.policy).collect()
    }

    /// Check that the location set can be used for I/O
    pub fn validate(&self) -> Result<()> {
        let first = self
            .replicas
            .first()
            .ok_or_else(|| Error::invalid_argument("location set has no replicas"))?;

        for (i, replica) in self.replicas.iter().enumerate() {
            replica.policy.validate()?;
            if replica.policy.policy_type != first.policy.policy_type {
                return Err(Error::InvalidStripingPolicy(format!(
                    "replica {i} uses {} but replica 0 uses {}",
                    replica.policy.policy_type, first.policy.policy_type
                )));
            }
            let expected = replica.policy.stripe_width() as usize;
            if replica.osd_uuids.len() != expected {
                return Err(Error::invalid_argument(format!(
                    "replica {i} lists {} OSDs, policy needs {expected}",
                    replica.osd_uuids.len()
                )));
            }
        }
        Ok(())
    }
}

/// Network location of a service as published by the directory service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMapping {
    pub uuid: String,
    pub version: u64,
    /// Protocol scheme, e.g. `pbrpc` or `pbrpcs`
    pub protocol: String,
    pub address: String,
    pub port: u16,
    #[serde(default = "default_match_network")]
    pub match_network: String,
    /// How long a client may cache this mapping
    pub ttl_s: u32,
}

fn default_match_network() -> String {
    "*".to_string()
}

impl AddressMapping {
    pub fn new(
        uuid: impl Into<String>,
        protocol: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        ttl_s: u32,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            version: 0,
            protocol: protocol.into(),
            address: address.into(),
            port,
            match_network: default_match_network(),
            ttl_s,
        }
    }

    /// `address:port`, the form handed to the transport
    #[must_use]
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// `protocol://address:port`
    #[must_use]
    pub fn uri(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.address, self.port)
    }
}

/// Access capability for one file, signed by the metadata service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct XCap {
    pub file_id: String,
    pub access_mode: u32,
    pub client_identity: String,
    /// Absolute expiry, seconds since the epoch
    pub expire_time_s: u64,
    pub expire_timeout_s: u32,
    /// Truncate epoch of the file
    pub epoch: u32,
    pub signature: String,
}

impl XCap {
    pub fn new(file_id: impl Into<String>, expire_time_s: u64, signature: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            access_mode: 0,
            client_identity: String::new(),
            expire_time_s,
            expire_timeout_s: 0,
            epoch: 0,
            signature: signature.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stripe_size_in_bytes() {
        let policy = StripingPolicy::raid0(128, 4);
        assert_eq!(policy.stripe_size(), 128 * 1024);
        assert_eq!(policy.parity_width(), 0);
        assert_eq!(policy.stripe_width(), 4);
    }

    #[test]
    fn test_policy_validation() {
        assert!(StripingPolicy::raid0(64, 1).validate().is_ok());
        assert!(StripingPolicy::raid0(0, 1).validate().is_err());
        assert!(StripingPolicy::raid0(64, 0).validate().is_err());
        assert!(StripingPolicy::erasure_code(64, 4, 2).validate().is_ok());
        assert!(StripingPolicy::erasure_code(64, 4, 0).validate().is_err());
        let no_parity = StripingPolicy {
            parity_width: None,
            ..StripingPolicy::erasure_code(64, 4, 2)
        };
        assert_eq!(no_parity.stripe_width(), 4);
        assert!(no_parity.validate().is_err());
        assert!(StripingPolicy::erasure_code(64, 250, 10).validate().is_err());
    }

    #[test]
    fn test_xlocset_validation() {
        let ok = XLocSet::new(
            1,
            vec![Replica::new(
                StripingPolicy::raid0(64, 2),
                vec!["osd-a".into(), "osd-b".into()],
            )],
        );
        assert!(ok.validate().is_ok());
        assert_eq!(ok.policies(), vec![StripingPolicy::raid0(64, 2)]);

        let short = XLocSet::new(
            1,
            vec![Replica::new(StripingPolicy::raid0(64, 2), vec!["osd-a".into()])],
        );
        assert!(short.validate().is_err());

        let mixed = XLocSet::new(
            1,
            vec![
                Replica::new(StripingPolicy::raid0(64, 1), vec!["osd-a".into()]),
                Replica::new(
                    StripingPolicy::erasure_code(64, 1, 1),
                    vec!["osd-b".into(), "osd-c".into()],
                ),
            ],
        );
        assert!(mixed.validate().is_err());
        assert!(XLocSet::default().validate().is_err());
    }

    #[test]
    fn test_address_mapping_rendering() {
        let mapping = AddressMapping::new("osd-1", "pbrpc", "10.0.0.5", 32640, 3600);
        assert_eq!(mapping.socket_address(), "10.0.0.5:32640");
        assert_eq!(mapping.uri(), "pbrpc://10.0.0.5:32640");
        assert_eq!(mapping.match_network, "*");
    }

    #[test]
    fn test_policy_type_display() {
        assert_eq!(StripingPolicyType::Raid0.to_string(), "RAID0");
        assert_eq!(StripingPolicyType::ErasureCode.to_string(), "ERASURECODE");
    }
}
