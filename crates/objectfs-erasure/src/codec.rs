//! Stripe encoder/decoder
//!
//! [`StripeCodec`] works on whole stripes: it cuts a stripe into `k` data
//! shards of [`StripeCodec::shard_size_for`] bytes, appends `m` parity shards,
//! and rebuilds the stripe from any `k` shards that came back from the
//! storage nodes.

use crate::backend::{ErasureBackend, RustSimdBackend};
use objectfs_common::{Error as CommonError, Result, StripingPolicy, StripingPolicyType};
use std::sync::Arc;
use thiserror::Error;

/// Shard sizes are padded to this many bytes for SIMD
pub const SHARD_ALIGNMENT: usize = 64;

/// Errors specific to erasure coding operations
#[derive(Debug, Error)]
pub enum ErasureError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("decoding failed: {0}")]
    DecodingFailed(String),

    #[error("insufficient shards: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    #[error("shard size mismatch")]
    ShardSizeMismatch,
}

impl From<ErasureError> for CommonError {
    fn from(e: ErasureError) -> Self {
        match e {
            ErasureError::InsufficientShards {
                available,
                required,
            } => Self::InsufficientShards {
                available,
                required,
            },
            other => Self::ErasureCoding(other.to_string()),
        }
    }
}

/// Reed-Solomon codec for one erasure-coded striping policy
#[derive(Clone)]
pub struct StripeCodec {
    backend: Arc<dyn ErasureBackend>,
}

impl std::fmt::Debug for StripeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeCodec")
            .field("backend", &self.backend.capabilities().name)
            .field("data_shards", &self.data_shards())
            .field("parity_shards", &self.parity_shards())
            .finish()
    }
}

impl StripeCodec {
    /// Create a codec with `data_shards` data and `parity_shards` parity shards
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        let backend = RustSimdBackend::new(data_shards, parity_shards)?;
        Ok(Self::with_backend(Arc::new(backend)))
    }

    /// Create a codec on top of an existing backend
    #[must_use]
    pub fn with_backend(backend: Arc<dyn ErasureBackend>) -> Self {
        Self { backend }
    }

    /// Create the codec matching an erasure-coded striping policy
    pub fn for_policy(policy: &StripingPolicy) -> Result<Self> {
        policy.validate()?;
        if policy.policy_type != StripingPolicyType::ErasureCode {
            return Err(CommonError::InvalidStripingPolicy(format!(
                "{} policy has no erasure code",
                policy.policy_type
            )));
        }
        Self::new(policy.width as usize, policy.parity_width() as usize)
    }

    #[must_use]
    pub fn data_shards(&self) -> usize {
        self.backend.data_shards()
    }

    #[must_use]
    pub fn parity_shards(&self) -> usize {
        self.backend.parity_shards()
    }

    #[must_use]
    pub fn total_shards(&self) -> usize {
        self.backend.total_shards()
    }

    /// Size of one shard of a stripe of `stripe_len` bytes split `k` ways
    ///
    /// Rounded up to [`SHARD_ALIGNMENT`], never smaller than one alignment
    /// unit.
    #[must_use]
    pub fn shard_size_for(stripe_len: usize, k: usize) -> usize {
        let per_shard = stripe_len.div_ceil(k.max(1));
        per_shard.next_multiple_of(SHARD_ALIGNMENT).max(SHARD_ALIGNMENT)
    }

    /// Encode one stripe into `k + m` shards of `shard_size` bytes
    ///
    /// A stripe shorter than `k * shard_size` is zero padded.
    pub fn encode(&self, stripe: &[u8], shard_size: usize) -> Result<Vec<Vec<u8>>> {
        let k = self.data_shards();
        if shard_size == 0 {
            return Err(ErasureError::InvalidConfig("shard size must be > 0".into()).into());
        }
        let padded_size = k * shard_size;
        if stripe.len() > padded_size {
            return Err(ErasureError::InvalidConfig(format!(
                "stripe of {} bytes does not fit {k} shards of {shard_size} bytes",
                stripe.len()
            ))
            .into());
        }

        let mut padded = vec![0u8; padded_size];
        padded[..stripe.len()].copy_from_slice(stripe);
        let data_shards: Vec<&[u8]> = padded.chunks_exact(shard_size).collect();

        Ok(self.backend.encode(&data_shards, shard_size)?)
    }

    /// Rebuild a stripe from the shards that are present
    ///
    /// `shards` has one slot per column. Present shards shorter than
    /// `shard_size` are zero padded in place (storage nodes do not store
    /// trailing zeros); missing data shards are filled in after decoding.
    /// Returns the `k * shard_size` data bytes of the stripe.
    pub fn reconstruct(&self, shards: &mut [Option<Vec<u8>>], shard_size: usize) -> Result<Vec<u8>> {
        let k = self.data_shards();
        if shards.len() != self.total_shards() {
            return Err(ErasureError::InvalidConfig(format!(
                "expected {} shard slots, got {}",
                self.total_shards(),
                shards.len()
            ))
            .into());
        }

        for shard in shards.iter_mut().flatten() {
            if shard.len() > shard_size {
                return Err(ErasureError::ShardSizeMismatch.into());
            }
            shard.resize(shard_size, 0);
        }

        if shards[..k].iter().any(Option::is_none) {
            let refs: Vec<Option<&[u8]>> = shards.iter().map(|s| s.as_deref()).collect();
            let data = self.backend.decode_data(&refs, shard_size)?;
            for (slot, restored) in shards[..k].iter_mut().zip(data) {
                if slot.is_none() {
                    *slot = Some(restored);
                }
            }
        }

        let mut stripe = Vec::with_capacity(k * shard_size);
        for shard in shards[..k].iter().flatten() {
            stripe.extend_from_slice(shard);
        }
        Ok(stripe)
    }

    /// Check that parity shards are consistent with the data shards
    pub fn verify(&self, shards: &[Vec<u8>]) -> Result<bool> {
        let refs: Vec<&[u8]> = shards.iter().map(Vec::as_slice).collect();
        Ok(self.backend.verify(&refs)?)
    }
}
