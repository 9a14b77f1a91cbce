use super::{
    check_policies, stripe_chunks, ReadOperation, StripeTranslator, WriteOperation,
};
use objectfs_common::{Error, Result, StripingPolicy, StripingPolicyType};
use objectfs_erasure::StripeCodec;
use std::ops::Range;
use tracing::debug;

/// Erasure-coded striping: every stripe spans all data and parity columns
///
/// Only the first policy of the list is consulted.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErasureTranslator;

impl StripeTranslator for ErasureTranslator {
    fn policy_type(&self) -> StripingPolicyType {
        StripingPolicyType::ErasureCode
    }

    fn translate_write_request<'a>(
        &self,
        buf: &'a [u8],
        offset: u64,
        policies: &[StripingPolicy],
    ) -> Result<Vec<WriteOperation<'a>>> {
        let policy = check_policies(policies)?;
        let columns = all_columns(policy);
        Ok(stripe_chunks(buf.len(), offset, policy.stripe_size())
            .map(|chunk| WriteOperation {
                obj_number: chunk.obj_number,
                osd_offsets: columns.clone(),
                req_size: chunk.req_size,
                req_offset: chunk.req_offset,
                buf_offset: chunk.buf_offset,
                data: &buf[chunk.buf_offset..chunk.buf_offset + chunk.req_size],
                is_aux: false,
            })
            .collect())
    }

    fn translate_read_request(
        &self,
        size: usize,
        offset: u64,
        policies: &[StripingPolicy],
    ) -> Result<Vec<ReadOperation>> {
        let policy = check_policies(policies)?;
        let columns = all_columns(policy);
        Ok(stripe_chunks(size, offset, policy.stripe_size())
            .map(|chunk| {
                ReadOperation::new(
                    chunk.obj_number,
                    columns.clone(),
                    chunk.req_size,
                    chunk.req_offset,
                    chunk.buf_offset,
                    false,
                )
            })
            .collect())
    }
}

fn all_columns(policy: &StripingPolicy) -> Vec<usize> {
    (0..policy.stripe_width() as usize).collect()
}

/// How one stripe is cut into shards
///
/// Data shard `i` holds stripe bytes `[i * shard_size, (i + 1) * shard_size)`;
/// the stripe is zero padded to `data_shards * shard_size`. Parity shards
/// follow the data shards in column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardLayout {
    stripe_size: usize,
    data_shards: usize,
    parity_shards: usize,
    shard_size: usize,
}

impl ShardLayout {
    #[must_use]
    pub fn new(policy: &StripingPolicy) -> Self {
        let data_shards = policy.width as usize;
        Self {
            stripe_size: policy.stripe_size(),
            data_shards,
            parity_shards: policy.parity_width() as usize,
            shard_size: StripeCodec::shard_size_for(policy.stripe_size(), data_shards),
        }
    }

    #[must_use]
    pub const fn stripe_size(&self) -> usize {
        self.stripe_size
    }

    #[must_use]
    pub const fn data_shards(&self) -> usize {
        self.data_shards
    }

    #[must_use]
    pub const fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    #[must_use]
    pub const fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    #[must_use]
    pub const fn shard_size(&self) -> usize {
        self.shard_size
    }

    /// Stripe length after padding to whole shards
    #[must_use]
    pub const fn padded_stripe_size(&self) -> usize {
        self.data_shards * self.shard_size
    }

    /// Stripe bytes held by data shard `shard`
    #[must_use]
    pub const fn shard_range(&self, shard: usize) -> Range<usize> {
        shard * self.shard_size..(shard + 1) * self.shard_size
    }

    /// Whether a request rewrites the whole stripe
    #[must_use]
    pub const fn covers_full_stripe(&self, req_offset: usize, req_size: usize) -> bool {
        req_offset == 0 && req_size >= self.stripe_size
    }

    /// Data columns overlapping `[req_offset, req_offset + req_size)`
    #[must_use]
    pub fn needed_shards(&self, req_offset: usize, req_size: usize) -> Vec<usize> {
        if req_size == 0 {
            return Vec::new();
        }
        let first = req_offset / self.shard_size;
        let last = ((req_offset + req_size - 1) / self.shard_size).min(self.data_shards - 1);
        (first..=last).collect()
    }

    /// Columns only fetched when a needed shard is missing
    #[must_use]
    pub fn aux_shards(&self, req_offset: usize, req_size: usize) -> Vec<usize> {
        let needed = self.needed_shards(req_offset, req_size);
        (0..self.total_shards())
            .filter(|column| !needed.contains(column))
            .collect()
    }

    /// Data bytes of the stripe read by `op`, padded to [`Self::padded_stripe_size`]
    ///
    /// Uses the needed shards directly when they are all present and falls
    /// back to reconstruction from any `data_shards` replies otherwise.
    /// Bytes outside the needed shards are zero on the direct path.
    pub fn decode_stripe(&self, op: &ReadOperation, codec: &StripeCodec) -> Result<Vec<u8>> {
        if op.replies().len() != self.total_shards() {
            return Err(Error::invalid_argument(format!(
                "object {} has {} reply slots, stripe has {} shards",
                op.obj_number,
                op.replies().len(),
                self.total_shards()
            )));
        }

        let needed = self.needed_shards(op.req_offset, op.req_size);
        if needed.iter().all(|&column| op.reply(column).is_some()) {
            let mut stripe = vec![0u8; self.padded_stripe_size()];
            for column in needed {
                if let Some(reply) = op.reply(column) {
                    let n = reply.len().min(self.shard_size);
                    let start = self.shard_range(column).start;
                    stripe[start..start + n].copy_from_slice(&reply[..n]);
                }
            }
            return Ok(stripe);
        }

        let available = op.successful_replies();
        if available < self.data_shards {
            return Err(Error::UnrecoverableData {
                object_number: op.obj_number,
                available,
                required: self.data_shards,
            });
        }

        debug!(
            object_number = op.obj_number,
            available,
            required = self.data_shards,
            "reconstructing stripe from parity"
        );
        let mut shards: Vec<Option<Vec<u8>>> = op
            .replies()
            .iter()
            .map(|reply| {
                reply
                    .as_ref()
                    .map(|data| data[..data.len().min(self.shard_size)].to_vec())
            })
            .collect();
        codec.reconstruct(&mut shards, self.shard_size)
    }
}

/// Copy the requested window of every stripe into `buf`
pub(super) fn assemble_stripes(
    ops: &[ReadOperation],
    buf: &mut [u8],
    policy: &StripingPolicy,
) -> Result<usize> {
    let layout = ShardLayout::new(policy);
    let codec = StripeCodec::for_policy(policy)?;

    let mut recovered = 0;
    for op in ops.iter().filter(|op| !op.is_aux) {
        let stripe = layout.decode_stripe(op, &codec)?;
        let window = op.req_offset..op.req_offset + op.req_size;
        let end = op.buf_offset + op.req_size;
        if window.end > stripe.len() || end > buf.len() {
            return Err(Error::invalid_argument(format!(
                "read of object {} does not fit the stripe or the buffer",
                op.obj_number
            )));
        }
        buf[op.buf_offset..end].copy_from_slice(&stripe[window]);
        recovered += op.req_size;
    }
    Ok(recovered)
}
