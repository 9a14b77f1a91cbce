//! Pure Rust SIMD backend using reed-solomon-simd
//!
//! `reed-solomon-simd` picks SSE, AVX or NEON at runtime and falls back to
//! scalar code elsewhere.

use super::{BackendCapabilities, BackendResult, ErasureBackend};
use crate::ErasureError;
use reed_solomon_simd::{ReedSolomonDecoder, ReedSolomonEncoder};

/// Largest number of shards in one stripe
const MAX_TOTAL_SHARDS: usize = 255;

/// MDS Reed-Solomon backend using reed-solomon-simd
#[derive(Debug)]
pub struct RustSimdBackend {
    data_shards: usize,
    parity_shards: usize,
}

impl RustSimdBackend {
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self, ErasureError> {
        if data_shards == 0 {
            return Err(ErasureError::InvalidConfig("data_shards must be > 0".into()));
        }
        if parity_shards == 0 {
            return Err(ErasureError::InvalidConfig(
                "parity_shards must be > 0".into(),
            ));
        }
        if data_shards + parity_shards > MAX_TOTAL_SHARDS {
            return Err(ErasureError::InvalidConfig(format!(
                "total shards must be <= {MAX_TOTAL_SHARDS}"
            )));
        }
        Ok(Self {
            data_shards,
            parity_shards,
        })
    }

    fn check_shard_size(shard_size: usize) -> BackendResult<()> {
        if shard_size == 0 || !shard_size.is_multiple_of(2) {
            return Err(ErasureError::InvalidConfig(format!(
                "shard size {shard_size} must be a positive even number"
            )));
        }
        Ok(())
    }
}

impl ErasureBackend for RustSimdBackend {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "rust_simd",
            max_total_shards: MAX_TOTAL_SHARDS,
        }
    }

    fn data_shards(&self) -> usize {
        self.data_shards
    }

    fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    fn encode(&self, data_shards: &[&[u8]], shard_size: usize) -> BackendResult<Vec<Vec<u8>>> {
        let k = self.data_shards;
        let m = self.parity_shards;

        if data_shards.len() != k {
            return Err(ErasureError::InvalidConfig(format!(
                "expected {k} data shards, got {}",
                data_shards.len()
            )));
        }
        Self::check_shard_size(shard_size)?;
        if data_shards.iter().any(|s| s.len() != shard_size) {
            return Err(ErasureError::ShardSizeMismatch);
        }

        let mut encoder = ReedSolomonEncoder::new(k, m, shard_size)
            .map_err(|e| ErasureError::InvalidConfig(e.to_string()))?;
        for shard in data_shards {
            encoder
                .add_original_shard(shard)
                .map_err(|e| ErasureError::EncodingFailed(e.to_string()))?;
        }
        let result = encoder
            .encode()
            .map_err(|e| ErasureError::EncodingFailed(e.to_string()))?;

        let mut shards = Vec::with_capacity(k + m);
        shards.extend(data_shards.iter().map(|s| s.to_vec()));
        shards.extend(result.recovery_iter().map(<[u8]>::to_vec));
        Ok(shards)
    }

    fn decode_data(
        &self,
        shards: &[Option<&[u8]>],
        shard_size: usize,
    ) -> BackendResult<Vec<Vec<u8>>> {
        let k = self.data_shards;
        let m = self.parity_shards;

        if shards.len() != k + m {
            return Err(ErasureError::InvalidConfig(format!(
                "expected {} shards, got {}",
                k + m,
                shards.len()
            )));
        }
        Self::check_shard_size(shard_size)?;
        if shards.iter().flatten().any(|s| s.len() != shard_size) {
            return Err(ErasureError::ShardSizeMismatch);
        }
        let available = shards.iter().filter(|s| s.is_some()).count();
        if available < k {
            return Err(ErasureError::InsufficientShards {
                available,
                required: k,
            });
        }

        // Nothing to rebuild
        if shards[..k].iter().all(Option::is_some) {
            return Ok(shards[..k].iter().flatten().map(|s| s.to_vec()).collect());
        }

        let mut decoder = ReedSolomonDecoder::new(k, m, shard_size)
            .map_err(|e| ErasureError::InvalidConfig(e.to_string()))?;
        for (i, shard) in shards[..k].iter().enumerate() {
            if let Some(data) = shard {
                decoder
                    .add_original_shard(i, data)
                    .map_err(|e| ErasureError::DecodingFailed(e.to_string()))?;
            }
        }
        for (i, shard) in shards[k..].iter().enumerate() {
            if let Some(data) = shard {
                decoder
                    .add_recovery_shard(i, data)
                    .map_err(|e| ErasureError::DecodingFailed(e.to_string()))?;
            }
        }
        let result = decoder
            .decode()
            .map_err(|e| ErasureError::DecodingFailed(e.to_string()))?;

        let mut data = Vec::with_capacity(k);
        for (i, shard) in shards[..k].iter().enumerate() {
            match shard {
                Some(present) => data.push(present.to_vec()),
                None => {
                    let restored = result.restored_original(i).ok_or_else(|| {
                        ErasureError::DecodingFailed(format!("data shard {i} was not restored"))
                    })?;
                    data.push(restored.to_vec());
                }
            }
        }
        Ok(data)
    }
}
