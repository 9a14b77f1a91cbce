use super::{
    check_policies, stripe_chunks, ReadOperation, StripeTranslator, WriteOperation,
};
use objectfs_common::{Result, StripingPolicy, StripingPolicyType};

/// Plain striping: object `n` of a replica lives on column `n mod width`
#[derive(Clone, Copy, Debug, Default)]
pub struct Raid0Translator;

impl Raid0Translator {
    fn columns(obj_number: u64, policies: &[StripingPolicy]) -> Vec<usize> {
        policies
            .iter()
            .map(|p| (obj_number % u64::from(p.width)) as usize)
            .collect()
    }
}

impl StripeTranslator for Raid0Translator {
    fn policy_type(&self) -> StripingPolicyType {
        StripingPolicyType::Raid0
    }

    fn translate_write_request<'a>(
        &self,
        buf: &'a [u8],
        offset: u64,
        policies: &[StripingPolicy],
    ) -> Result<Vec<WriteOperation<'a>>> {
        let stripe_size = check_policies(policies)?.stripe_size();
        Ok(stripe_chunks(buf.len(), offset, stripe_size)
            .map(|chunk| WriteOperation {
                obj_number: chunk.obj_number,
                osd_offsets: Self::columns(chunk.obj_number, policies),
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
        let stripe_size = check_policies(policies)?.stripe_size();
        Ok(stripe_chunks(size, offset, stripe_size)
            .map(|chunk| {
                ReadOperation::new(
                    chunk.obj_number,
                    Self::columns(chunk.obj_number, policies),
                    chunk.req_size,
                    chunk.req_offset,
                    chunk.buf_offset,
                    false,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objectfs_common::Error;
    use rand::Rng;

    #[test]
    fn test_write_partitions_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let stripe_kb = rng.gen_range(1..=8u32);
            let stripe_size = stripe_kb as usize * 1024;
            let size = rng.gen_range(0..40_000usize);
            let offset = rng.gen_range(0..100_000u64);
            let buf = vec![0u8; size];

            let ops = Raid0Translator
                .translate_write_request(&buf, offset, &[StripingPolicy::raid0(stripe_kb, 1)])
                .unwrap();

            assert!(ops.len() <= size.div_ceil(stripe_size) + 1);
            assert_eq!(ops.iter().map(|op| op.req_size).sum::<usize>(), size);

            let mut position = offset;
            for (i, op) in ops.iter().enumerate() {
                let start = op.obj_number * stripe_size as u64 + op.req_offset as u64;
                assert_eq!(start, position, "operation {i} leaves a gap or overlaps");
                assert!(op.req_offset + op.req_size <= stripe_size);
                assert!(op.req_size > 0);
                assert_eq!(op.data.len(), op.req_size);
                assert_eq!(op.buf_offset as u64, position - offset);
                assert_eq!(op.osd_offsets, vec![0]);
                position += op.req_size as u64;
            }
        }
    }

    #[test]
    fn test_column_is_object_number_mod_width() {
        for width in 1..=5u32 {
            let policies = [StripingPolicy::raid0(1, width)];
            let objects = u64::from(width) * 3;
            let ops = Raid0Translator
                .translate_read_request(objects as usize * 1024, 0, &policies)
                .unwrap();
            assert_eq!(ops.len() as u64, objects);
            for op in &ops {
                assert_eq!(op.osd_offsets, vec![(op.obj_number % u64::from(width)) as usize]);
            }
        }
    }

    #[test]
    fn test_one_column_per_replica() {
        let policies = [StripingPolicy::raid0(1, 2), StripingPolicy::raid0(1, 3)];
        let ops = Raid0Translator
            .translate_read_request(5 * 1024, 0, &policies)
            .unwrap();
        let columns: Vec<_> = ops.iter().map(|op| op.osd_offsets.clone()).collect();
        assert_eq!(
            columns,
            vec![vec![0, 0], vec![1, 1], vec![0, 2], vec![1, 0], vec![0, 1]]
        );
    }

    #[test]
    fn test_unaligned_write() {
        let buf: Vec<u8> = (0..3000u32).map(|i| i as u8).collect();
        let ops = Raid0Translator
            .translate_write_request(&buf, 1500, &[StripingPolicy::raid0(1, 2)])
            .unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!((ops[0].obj_number, ops[0].req_offset, ops[0].req_size), (1, 476, 548));
        assert_eq!((ops[1].obj_number, ops[1].req_offset, ops[1].req_size), (2, 0, 1024));
        assert_eq!((ops[3].obj_number, ops[3].req_offset, ops[3].req_size), (4, 0, 404));
        assert_eq!(ops[3].data, &buf[2596..]);
    }

    #[test]
    fn test_zero_length_and_bad_policies() {
        let policies = [StripingPolicy::raid0(4, 2)];
        assert!(Raid0Translator.translate_read_request(0, 777, &policies).unwrap().is_empty());
        assert!(Raid0Translator.translate_write_request(&[], 0, &policies).unwrap().is_empty());

        assert!(matches!(
            Raid0Translator.translate_read_request(10, 0, &[]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Raid0Translator.translate_read_request(10, 0, &[StripingPolicy::raid0(4, 0)]),
            Err(Error::InvalidStripingPolicy(_))
        ));
    }
}
