//! Stripe translation
//!
//! A translator maps a byte range of a file onto per-object operations, one
//! per stripe touched, each naming the column (OSD index) of every replica
//! that serves it. For reads it also puts the replies back together.
//!
//! The set of placement schemes is closed: pick the translator for a policy
//! with [`translator_for`].

mod erasure;
mod raid0;

pub use erasure::{ErasureTranslator, ShardLayout};
pub use raid0::Raid0Translator;

use bytes::Bytes;
use objectfs_common::{Error, Result, StripingPolicy, StripingPolicyType};
use tracing::debug;

/// Write of one slice of the caller's buffer into one object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOperation<'a> {
    pub obj_number: u64,
    /// Column per replica
    pub osd_offsets: Vec<usize>,
    pub req_size: usize,
    /// Offset inside the object
    pub req_offset: usize,
    /// Offset inside the caller's buffer
    pub buf_offset: usize,
    pub data: &'a [u8],
    pub is_aux: bool,
}

/// Read of one object range, plus the replies collected for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadOperation {
    pub obj_number: u64,
    pub osd_offsets: Vec<usize>,
    pub req_size: usize,
    pub req_offset: usize,
    pub buf_offset: usize,
    /// Only fetched to rebuild other data, never copied to the caller
    pub is_aux: bool,
    /// At least one reply was recorded
    pub success: bool,
    /// Bytes received over all reply slots
    pub received: usize,
    replies: Vec<Option<Bytes>>,
}

impl ReadOperation {
    pub fn new(
        obj_number: u64,
        osd_offsets: Vec<usize>,
        req_size: usize,
        req_offset: usize,
        buf_offset: usize,
        is_aux: bool,
    ) -> Self {
        let replies = vec![None; osd_offsets.len()];
        Self {
            obj_number,
            osd_offsets,
            req_size,
            req_offset,
            buf_offset,
            is_aux,
            success: false,
            received: 0,
            replies,
        }
    }

    /// Record the reply for slot `slot` (one slot per `osd_offsets` entry)
    pub fn complete(&mut self, slot: usize, data: Bytes) -> Result<()> {
        let reply = self.replies.get_mut(slot).ok_or_else(|| {
            Error::invalid_argument(format!(
                "object {} has no reply slot {slot}",
                self.obj_number
            ))
        })?;
        if let Some(previous) = reply.replace(data) {
            self.received -= previous.len();
        }
        self.received += reply.as_ref().map_or(0, Bytes::len);
        self.success = true;
        Ok(())
    }

    /// Forget the reply in `slot`, returning it
    pub fn discard(&mut self, slot: usize) -> Option<Bytes> {
        let previous = self.replies.get_mut(slot)?.take()?;
        self.received -= previous.len();
        self.success = self.replies.iter().any(Option::is_some);
        Some(previous)
    }

    #[must_use]
    pub fn reply(&self, slot: usize) -> Option<&Bytes> {
        self.replies.get(slot).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn replies(&self) -> &[Option<Bytes>] {
        &self.replies
    }

    /// Number of slots holding a reply
    #[must_use]
    pub fn successful_replies(&self) -> usize {
        self.replies.iter().filter(|r| r.is_some()).count()
    }

    /// First recorded reply in slot order
    #[must_use]
    pub fn first_reply(&self) -> Option<&Bytes> {
        self.replies.iter().flatten().next()
    }
}

/// Maps file byte ranges onto object operations for one placement scheme
pub trait StripeTranslator: Send + Sync {
    fn policy_type(&self) -> StripingPolicyType;

    /// Split a write of `buf` at file offset `offset` into object writes
    fn translate_write_request<'a>(
        &self,
        buf: &'a [u8],
        offset: u64,
        policies: &[StripingPolicy],
    ) -> Result<Vec<WriteOperation<'a>>>;

    /// Split a read of `size` bytes at file offset `offset` into object reads
    fn translate_read_request(
        &self,
        size: usize,
        offset: u64,
        policies: &[StripingPolicy],
    ) -> Result<Vec<ReadOperation>>;

    /// Copy the replies of `ops` into `buf`, returning the bytes recovered
    ///
    /// Plain reads (`erasure == false`) use the first reply of every
    /// operation. Erasure-coded reads rebuild missing data shards from
    /// parity when needed.
    fn process_reads(
        &self,
        ops: &[ReadOperation],
        buf: &mut [u8],
        offset: u64,
        policies: &[StripingPolicy],
        erasure: bool,
    ) -> Result<usize> {
        let policy = check_policies(policies)?;
        debug!(
            offset,
            operations = ops.len(),
            erasure,
            "assembling read replies"
        );
        if erasure {
            erasure::assemble_stripes(ops, buf, policy)
        } else {
            assemble_objects(ops, buf)
        }
    }
}

/// Translator for a placement scheme
#[must_use]
pub fn translator_for(policy_type: StripingPolicyType) -> &'static dyn StripeTranslator {
    match policy_type {
        StripingPolicyType::Raid0 => &Raid0Translator,
        StripingPolicyType::ErasureCode => &ErasureTranslator,
    }
}

/// One stripe-aligned piece of a file range
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StripeChunk {
    pub obj_number: u64,
    pub req_offset: usize,
    pub req_size: usize,
    pub buf_offset: usize,
}

/// Iterator cutting `[offset, offset + size)` at stripe boundaries
#[derive(Clone, Debug)]
pub struct StripeChunks {
    size: usize,
    offset: u64,
    stripe_size: usize,
    start: usize,
}

impl Iterator for StripeChunks {
    type Item = StripeChunk;

    fn next(&mut self) -> Option<StripeChunk> {
        if self.start >= self.size || self.stripe_size == 0 {
            return None;
        }
        let stripe_size = self.stripe_size as u64;
        let position = self.offset + self.start as u64;
        let req_offset = (position % stripe_size) as usize;
        let req_size = (self.size - self.start).min(self.stripe_size - req_offset);
        let chunk = StripeChunk {
            obj_number: position / stripe_size,
            req_offset,
            req_size,
            buf_offset: self.start,
        };
        self.start += req_size;
        Some(chunk)
    }
}

/// Cut a file range into stripe-aligned chunks in object order
#[must_use]
pub fn stripe_chunks(size: usize, offset: u64, stripe_size: usize) -> StripeChunks {
    StripeChunks {
        size,
        offset,
        stripe_size,
        start: 0,
    }
}

/// Validate the policy list and return the first policy
fn check_policies(policies: &[StripingPolicy]) -> Result<&StripingPolicy> {
    let first = policies
        .first()
        .ok_or_else(|| Error::invalid_argument("no striping policy given"))?;
    for policy in policies {
        policy.validate()?;
    }
    Ok(first)
}

/// Assemble plain object replies
///
/// A short reply followed by an object that returned data is a hole and
/// reads as zeros. A short reply with nothing behind it is the end of the
/// file.
fn assemble_objects(ops: &[ReadOperation], buf: &mut [u8]) -> Result<usize> {
    let mut replies = Vec::with_capacity(ops.len());
    for op in ops.iter().filter(|op| !op.is_aux) {
        let reply = op.first_reply().ok_or_else(|| {
            Error::Io(std::io::Error::other(format!(
                "object {} was not read from any replica",
                op.obj_number
            )))
        })?;
        replies.push((op, reply));
    }

    let mut recovered = 0;
    for (i, (op, reply)) in replies.iter().enumerate() {
        let end = op.buf_offset + op.req_size;
        if end > buf.len() {
            return Err(Error::invalid_argument(format!(
                "object {} ends at buffer offset {end}, buffer holds {}",
                op.obj_number,
                buf.len()
            )));
        }

        let n = reply.len().min(op.req_size);
        buf[op.buf_offset..op.buf_offset + n].copy_from_slice(&reply[..n]);
        if n == op.req_size {
            recovered = end;
            continue;
        }

        let data_follows = replies[i + 1..].iter().any(|(_, r)| !r.is_empty());
        if data_follows {
            buf[op.buf_offset + n..end].fill(0);
            recovered = end;
        } else {
            recovered = op.buf_offset + n;
            break;
        }
    }
    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(obj_number: u64, buf_offset: usize, req_size: usize, data: &[u8]) -> ReadOperation {
        let mut op = ReadOperation::new(obj_number, vec![0], req_size, 0, buf_offset, false);
        op.complete(0, Bytes::copy_from_slice(data)).unwrap();
        op
    }

    #[test]
    fn test_stripe_chunks_split_at_boundaries() {
        let chunks: Vec<_> = stripe_chunks(2500, 1000, 1024).collect();
        assert_eq!(
            chunks,
            vec![
                StripeChunk { obj_number: 0, req_offset: 1000, req_size: 24, buf_offset: 0 },
                StripeChunk { obj_number: 1, req_offset: 0, req_size: 1024, buf_offset: 24 },
                StripeChunk { obj_number: 2, req_offset: 0, req_size: 1024, buf_offset: 1048 },
                StripeChunk { obj_number: 3, req_offset: 0, req_size: 428, buf_offset: 2072 },
            ]
        );
        assert_eq!(stripe_chunks(0, 4096, 1024).count(), 0);
    }

    #[test]
    fn test_complete_tracks_received() {
        let mut op = ReadOperation::new(7, vec![0, 1], 100, 0, 0, false);
        assert!(!op.success);
        op.complete(1, Bytes::from_static(b"abc")).unwrap();
        assert!(op.success);
        assert_eq!(op.received, 3);
        op.complete(1, Bytes::from_static(b"abcdef")).unwrap();
        assert_eq!(op.received, 6);
        assert_eq!(op.first_reply().unwrap().as_ref(), b"abcdef");
        assert!(op.complete(2, Bytes::new()).is_err());
    }

    #[test]
    fn test_discard_forgets_reply() {
        let mut op = ReadOperation::new(7, vec![0, 1], 100, 0, 0, false);
        op.complete(0, Bytes::from_static(b"ab")).unwrap();
        op.complete(1, Bytes::from_static(b"cde")).unwrap();

        assert_eq!(op.discard(0).unwrap().as_ref(), b"ab");
        assert_eq!(op.received, 3);
        assert_eq!(op.successful_replies(), 1);
        assert!(op.success);
        assert!(op.discard(0).is_none());

        op.discard(1);
        assert!(!op.success);
        assert_eq!(op.received, 0);
        assert!(op.discard(5).is_none());
    }

    #[test]
    fn test_translator_for() {
        assert_eq!(
            translator_for(StripingPolicyType::Raid0).policy_type(),
            StripingPolicyType::Raid0
        );
        assert_eq!(
            translator_for(StripingPolicyType::ErasureCode).policy_type(),
            StripingPolicyType::ErasureCode
        );
    }

    #[test]
    fn test_hole_is_zero_filled() {
        let ops = vec![
            completed(0, 0, 4, b"ab"),
            completed(1, 4, 4, b"wxyz"),
        ];
        let mut buf = [0xFFu8; 8];
        let policies = [StripingPolicy::raid0(1, 1)];
        let n = Raid0Translator
            .process_reads(&ops, &mut buf, 0, &policies, false)
            .unwrap();
        assert_eq!(n, 8);
        assert_eq!(&buf, b"ab\0\0wxyz");
    }

    #[test]
    fn test_short_read_at_end_of_file() {
        let ops = vec![
            completed(0, 0, 4, b"abcd"),
            completed(1, 4, 4, b"ef"),
            completed(2, 8, 4, b""),
        ];
        let mut buf = [0u8; 12];
        let policies = [StripingPolicy::raid0(1, 1)];
        let n = Raid0Translator
            .process_reads(&ops, &mut buf, 0, &policies, false)
            .unwrap();
        assert_eq!(n, 6);
        assert_eq!(&buf[..6], b"abcdef");
    }

    #[test]
    fn test_missing_reply_fails_whole_read() {
        let ops = vec![
            completed(0, 0, 4, b"abcd"),
            ReadOperation::new(1, vec![0], 4, 0, 4, false),
        ];
        let mut buf = [0u8; 8];
        let policies = [StripingPolicy::raid0(1, 1)];
        let err = Raid0Translator
            .process_reads(&ops, &mut buf, 0, &policies, false)
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_aux_operations_are_not_copied() {
        let mut aux = ReadOperation::new(1, vec![0], 4, 0, 0, true);
        aux.complete(0, Bytes::from_static(b"zzzz")).unwrap();
        let ops = vec![completed(0, 0, 4, b"abcd"), aux];
        let mut buf = [0u8; 4];
        let policies = [StripingPolicy::raid0(1, 1)];
        let n = Raid0Translator
            .process_reads(&ops, &mut buf, 0, &policies, false)
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn test_empty_policy_list() {
        let mut buf = [0u8; 4];
        assert!(matches!(
            Raid0Translator.process_reads(&[], &mut buf, 0, &[], false),
            Err(Error::InvalidArgument(_))
        ));
    }
}
