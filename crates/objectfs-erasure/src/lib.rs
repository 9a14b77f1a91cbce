//! objectfs Erasure Coding - Stripe codec for erasure-coded files
//!
//! An erasure-coded stripe of `stripe_size` bytes is cut into `k` equally
//! sized data shards and extended by `m` parity shards. Any `k` of the `k + m`
//! shards are enough to rebuild the stripe.
//!
//! # Example
//!
//! ```
//! use objectfs_erasure::StripeCodec;
//!
//! let codec = StripeCodec::new(4, 2).unwrap();
//! let stripe = vec![42u8; 4096];
//! let shard_size = StripeCodec::shard_size_for(stripe.len(), 4);
//! let shards = codec.encode(&stripe, shard_size).unwrap();
//!
//! let mut received: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
//! received[0] = None;
//! received[3] = None;
//! let rebuilt = codec.reconstruct(&mut received, shard_size).unwrap();
//! assert_eq!(&rebuilt[..stripe.len()], &stripe[..]);
//! ```

pub mod backend;
pub mod codec;

pub use backend::{BackendCapabilities, ErasureBackend, RustSimdBackend};
pub use codec::{ErasureError, StripeCodec};
