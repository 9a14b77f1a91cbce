//! Erasure coding backend abstraction
//!
//! The stripe codec only needs MDS (Maximum Distance Separable) codes: any
//! `k` shards out of `k + m` rebuild the data shards. Backends implement the
//! raw shard math and know nothing about stripes, padding or objects.

pub mod rust_simd;

pub use rust_simd::RustSimdBackend;

use crate::ErasureError;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, ErasureError>;

/// Capabilities of an erasure coding backend
#[derive(Clone, Debug, Default)]
pub struct BackendCapabilities {
    /// Backend name for identification
    pub name: &'static str,
    /// Largest `k + m` the backend accepts
    pub max_total_shards: usize,
}

/// Core trait for erasure coding backends
pub trait ErasureBackend: Send + Sync {
    fn capabilities(&self) -> BackendCapabilities;

    /// Number of data shards (k)
    fn data_shards(&self) -> usize;

    /// Number of parity shards (m)
    fn parity_shards(&self) -> usize;

    /// Total number of shards (k + m)
    fn total_shards(&self) -> usize {
        self.data_shards() + self.parity_shards()
    }

    /// Compute parity for `k` equally sized data shards
    ///
    /// Returns all `k + m` shards, data first, parity after.
    fn encode(&self, data_shards: &[&[u8]], shard_size: usize) -> BackendResult<Vec<Vec<u8>>>;

    /// Rebuild the `k` data shards from any `k` of the `k + m` shards
    ///
    /// `shards` holds one entry per column, `None` for a missing shard. Every
    /// present shard must be exactly `shard_size` bytes.
    fn decode_data(
        &self,
        shards: &[Option<&[u8]>],
        shard_size: usize,
    ) -> BackendResult<Vec<Vec<u8>>>;

    /// Check that the parity shards match the data shards
    fn verify(&self, shards: &[&[u8]]) -> BackendResult<bool> {
        let k = self.data_shards();
        if shards.len() != self.total_shards() {
            return Ok(false);
        }
        let Some(shard_size) = shards.first().map(|s| s.len()) else {
            return Ok(true);
        };
        if shards.iter().any(|s| s.len() != shard_size) {
            return Ok(false);
        }
        let encoded = self.encode(&shards[..k], shard_size)?;
        Ok(encoded[k..]
            .iter()
            .zip(&shards[k..])
            .all(|(expected, actual)| expected.as_slice() == *actual))
    }
}
