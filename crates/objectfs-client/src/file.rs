//! Striped file I/O
//!
//! [`StripedFile`] is the data path of one open file. A read or write is cut
//! into object operations by the translator of the file's striping policy,
//! every operation is sent through [`SyncRequest`] to the OSD chosen by a
//! per-column [`UuidIterator`], and read replies are put back together by
//! the translator.
//!
//! Erasure-coded files are always written in whole stripes: a write that
//! covers only part of a stripe reads the stripe first, merges the new
//! bytes, and rewrites every shard.
//!
//! Every shard object starts with an 8 byte big-endian stripe version, bumped
//! by each stripe write. A shard that missed a write (its OSD was down) keeps
//! the older version and is dropped on read. Reads wait for `parity + 1`
//! shards, so at least one of them saw the last write that reached `width`
//! shards.

use crate::capability::{XCapHandler, XCapHolder};
use crate::execute::{RequestTarget, RetryPolicy, SyncRequest};
use crate::striping::{translator_for, ReadOperation, ShardLayout, StripeTranslator, WriteOperation};
use crate::uuid_iterator::UuidIterator;
use crate::uuid_resolver::UuidResolver;
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::future::{join_all, try_join_all};
use objectfs_common::{
    ClientOptions, Error, Result, StripingPolicy, StripingPolicyType, XLocSet,
};
use objectfs_erasure::StripeCodec;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Length of the stripe version in front of every shard
const SHARD_HEADER_LEN: usize = 8;

fn encode_shard(version: u64, shard: &[u8]) -> Bytes {
    let mut object = BytesMut::with_capacity(SHARD_HEADER_LEN + shard.len());
    object.put_u64(version);
    object.put_slice(shard);
    object.freeze()
}

/// Split a shard object into its version and payload
///
/// A shard that was never written reads as version 0 with no payload.
fn decode_shard(mut object: Bytes) -> Result<(u64, Bytes)> {
    if object.is_empty() {
        return Ok((0, object));
    }
    if object.len() < SHARD_HEADER_LEN {
        return Err(Error::protocol(format!(
            "shard object of {} bytes has no version header",
            object.len()
        )));
    }
    let version = object.get_u64();
    Ok((version, object))
}

/// Read of a byte range of one object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRead {
    pub file_id: String,
    pub object_number: u64,
    pub offset: usize,
    pub length: usize,
}

/// Write of `data` into one object at `offset`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectWrite {
    pub file_id: String,
    pub object_number: u64,
    pub offset: usize,
    pub data: Bytes,
}

/// Object operations of a storage node
///
/// Reads past the end of an object return the bytes that exist, possibly
/// none.
#[async_trait]
pub trait OsdClient: Send + Sync {
    async fn read_object(&self, target: &RequestTarget, request: &ObjectRead) -> Result<Bytes>;

    async fn write_object(&self, target: &RequestTarget, request: &ObjectWrite) -> Result<()>;
}

/// One open file and the services needed to read and write it
pub struct StripedFile {
    file_id: String,
    xlocs: XLocSet,
    policies: Vec<StripingPolicy>,
    xcap_holder: Arc<XCapHolder>,
    xcap_handler: Option<Arc<dyn XCapHandler>>,
    osd_client: Arc<dyn OsdClient>,
    resolver: Arc<dyn UuidResolver>,
    read_policy: RetryPolicy,
    write_policy: RetryPolicy,
    /// One iterator per column vector, kept so failover state persists
    iterators: Mutex<HashMap<Vec<usize>, Arc<UuidIterator>>>,
}

impl StripedFile {
    /// Open `file_id` located at `xlocs`
    pub fn new(
        file_id: impl Into<String>,
        xlocs: XLocSet,
        xcap_holder: Arc<XCapHolder>,
        osd_client: Arc<dyn OsdClient>,
        resolver: Arc<dyn UuidResolver>,
        options: &ClientOptions,
    ) -> Result<Self> {
        xlocs.validate()?;
        let policies = xlocs.policies();
        Ok(Self {
            file_id: file_id.into(),
            xlocs,
            policies,
            xcap_holder,
            xcap_handler: None,
            osd_client,
            resolver,
            read_policy: RetryPolicy::for_reads(options),
            write_policy: RetryPolicy::for_writes(options),
            iterators: Mutex::new(HashMap::new()),
        })
    }

    /// Renew rejected capabilities through `handler`
    #[must_use]
    pub fn with_capability_handler(mut self, handler: Arc<dyn XCapHandler>) -> Self {
        self.xcap_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    #[must_use]
    pub fn xlocs(&self) -> &XLocSet {
        &self.xlocs
    }

    fn policy_type(&self) -> StripingPolicyType {
        self.policies[0].policy_type
    }

    fn translator(&self) -> &'static dyn StripeTranslator {
        translator_for(self.policy_type())
    }

    /// Write `buf` at file offset `offset`, returning the bytes written
    pub async fn write(&self, buf: &[u8], offset: u64) -> Result<usize> {
        let ops = self
            .translator()
            .translate_write_request(buf, offset, &self.policies)?;
        debug!(
            file_id = %self.file_id,
            offset,
            len = buf.len(),
            operations = ops.len(),
            "writing"
        );

        match self.policy_type() {
            StripingPolicyType::Raid0 => {
                try_join_all(ops.iter().map(|op| {
                    self.write_object(
                        op.osd_offsets.clone(),
                        op.obj_number,
                        op.req_offset,
                        Bytes::copy_from_slice(op.data),
                    )
                }))
                .await?;
            }
            StripingPolicyType::ErasureCode => {
                let policy = &self.policies[0];
                let layout = ShardLayout::new(policy);
                let codec = StripeCodec::for_policy(policy)?;
                try_join_all(ops.iter().map(|op| self.write_stripe(op, &layout, &codec))).await?;
            }
        }
        Ok(buf.len())
    }

    /// Read into `buf` from file offset `offset`, returning the bytes read
    ///
    /// RAID0 reads stop at the end of the file. Erasure-coded reads fill
    /// unwritten ranges with zeros.
    pub async fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let translator = self.translator();
        let mut ops = translator.translate_read_request(buf.len(), offset, &self.policies)?;
        debug!(
            file_id = %self.file_id,
            offset,
            len = buf.len(),
            operations = ops.len(),
            "reading"
        );

        match self.policy_type() {
            StripingPolicyType::Raid0 => {
                let replies = try_join_all(ops.iter().map(|op| {
                    self.read_object(
                        op.osd_offsets.clone(),
                        op.obj_number,
                        op.req_offset,
                        op.req_size,
                    )
                }))
                .await?;
                for (op, (slot, data)) in ops.iter_mut().zip(replies) {
                    op.complete(slot, data)?;
                }
                translator.process_reads(&ops, buf, offset, &self.policies, false)
            }
            StripingPolicyType::ErasureCode => {
                let layout = ShardLayout::new(&self.policies[0]);
                try_join_all(ops.iter_mut().map(|op| self.read_shards(op, &layout))).await?;
                translator.process_reads(&ops, buf, offset, &self.policies, true)
            }
        }
    }

    /// Iterator over the replicas serving `columns`
    fn iterator_for(&self, columns: &[usize]) -> Arc<UuidIterator> {
        let mut iterators = self.iterators.lock();
        let iterator = iterators.entry(columns.to_vec()).or_insert_with(|| {
            Arc::new(UuidIterator::from_uuids(
                self.xlocs
                    .replicas
                    .iter()
                    .zip(columns)
                    .filter_map(|(replica, &column)| replica.osd_uuids.get(column).cloned()),
            ))
        });
        Arc::clone(iterator)
    }

    /// Index of the replica whose OSD for `columns` is `uuid`
    fn replica_slot(&self, columns: &[usize], uuid: &str) -> usize {
        self.xlocs
            .replicas
            .iter()
            .zip(columns)
            .position(|(replica, &column)| {
                replica.osd_uuids.get(column).is_some_and(|osd| osd == uuid)
            })
            .unwrap_or(0)
    }

    /// Columns of every replica for erasure-coded shard `column`
    fn shard_columns(&self, column: usize) -> Vec<usize> {
        vec![column; self.xlocs.replicas.len()]
    }

    fn sync_request<'a>(
        &'a self,
        iterator: &'a UuidIterator,
        policy: &'a RetryPolicy,
    ) -> SyncRequest<'a> {
        let request = SyncRequest::new(iterator, policy).resolver(self.resolver.as_ref());
        match &self.xcap_handler {
            Some(handler) => request.capability(&self.xcap_holder, handler.as_ref()),
            None => request.xcap_holder(&self.xcap_holder),
        }
    }

    async fn write_object(
        &self,
        columns: Vec<usize>,
        object_number: u64,
        offset: usize,
        data: Bytes,
    ) -> Result<()> {
        let iterator = self.iterator_for(&columns);
        let request = ObjectWrite {
            file_id: self.file_id.clone(),
            object_number,
            offset,
            data,
        };
        let request = &request;
        self.sync_request(&iterator, &self.write_policy)
            .execute(move |target| async move {
                self.osd_client.write_object(&target, request).await
            })
            .await
    }

    /// Read an object range, returning the replica slot that served it
    async fn read_object(
        &self,
        columns: Vec<usize>,
        object_number: u64,
        offset: usize,
        length: usize,
    ) -> Result<(usize, Bytes)> {
        let iterator = self.iterator_for(&columns);
        let request = ObjectRead {
            file_id: self.file_id.clone(),
            object_number,
            offset,
            length,
        };
        let request = &request;
        let (uuid, data) = self
            .sync_request(&iterator, &self.read_policy)
            .execute(move |target| async move {
                let data = self.osd_client.read_object(&target, request).await?;
                Ok((target.uuid, data))
            })
            .await?;
        Ok((self.replica_slot(&columns, &uuid), data))
    }

    /// Fetch the shards of `op` and drop replies older than the stripe
    ///
    /// The needed shards are fetched first, topped up with auxiliary shards
    /// to `parity + 1` columns. The remaining columns are only read when a
    /// needed shard failed or is stale. Returns the newest stripe version.
    async fn read_shards(&self, op: &mut ReadOperation, layout: &ShardLayout) -> Result<u64> {
        let quorum = layout.parity_shards() + 1;
        let needed = layout.needed_shards(op.req_offset, op.req_size);
        let mut first = needed.clone();
        first.extend(
            layout
                .aux_shards(op.req_offset, op.req_size)
                .into_iter()
                .take(quorum.saturating_sub(needed.len())),
        );

        let mut versions = vec![None; layout.total_shards()];
        let mut fetched = self.fetch_shards(op, &first, layout, &mut versions).await?;
        let newest = versions.iter().flatten().copied().max().unwrap_or(0);
        let current =
            fetched >= quorum && needed.iter().all(|&column| versions[column] == Some(newest));
        if !current {
            let rest: Vec<usize> = (0..layout.total_shards())
                .filter(|column| !first.contains(column))
                .collect();
            debug!(
                file_id = %self.file_id,
                object_number = op.obj_number,
                fetched,
                "fetching auxiliary shards"
            );
            fetched += self.fetch_shards(op, &rest, layout, &mut versions).await?;
        }

        if fetched < quorum {
            return Err(Error::UnrecoverableData {
                object_number: op.obj_number,
                available: fetched,
                required: quorum,
            });
        }

        let newest = versions.iter().flatten().copied().max().unwrap_or(0);
        for (column, version) in versions.iter().enumerate() {
            if let Some(version) = *version
                && version < newest
            {
                op.discard(column);
                debug!(
                    file_id = %self.file_id,
                    object_number = op.obj_number,
                    column,
                    version,
                    newest,
                    "dropping stale shard"
                );
            }
        }
        Ok(newest)
    }

    /// Read whole shards of `columns` into `op`, returning how many arrived
    ///
    /// Failed shards are left empty; reassembly decides whether the stripe
    /// can still be decoded.
    async fn fetch_shards(
        &self,
        op: &mut ReadOperation,
        columns: &[usize],
        layout: &ShardLayout,
        versions: &mut [Option<u64>],
    ) -> Result<usize> {
        let object_number = op.obj_number;
        let results = join_all(columns.iter().map(|&column| {
            self.read_object(
                self.shard_columns(column),
                object_number,
                0,
                SHARD_HEADER_LEN + layout.shard_size(),
            )
        }))
        .await;

        let mut fetched = 0;
        for (&column, result) in columns.iter().zip(results) {
            match result.and_then(|(_, object)| decode_shard(object)) {
                Ok((version, payload)) => {
                    op.complete(column, payload)?;
                    versions[column] = Some(version);
                    fetched += 1;
                }
                Err(e) => warn!(
                    file_id = %self.file_id,
                    object_number,
                    column,
                    error = %e,
                    "shard read failed"
                ),
            }
        }
        Ok(fetched)
    }

    /// Newest version over the shard headers of a stripe
    async fn stripe_version(&self, object_number: u64, layout: &ShardLayout) -> Result<u64> {
        let results = join_all((0..layout.total_shards()).map(|column| {
            self.read_object(
                self.shard_columns(column),
                object_number,
                0,
                SHARD_HEADER_LEN,
            )
        }))
        .await;

        let versions: Vec<u64> = results
            .into_iter()
            .filter_map(|result| result.and_then(|(_, header)| decode_shard(header)).ok())
            .map(|(version, _)| version)
            .collect();
        let required = layout.parity_shards() + 1;
        if versions.len() < required {
            return Err(Error::InsufficientShards {
                available: versions.len(),
                required,
            });
        }
        Ok(versions.into_iter().max().unwrap_or(0))
    }

    async fn write_stripe(
        &self,
        op: &WriteOperation<'_>,
        layout: &ShardLayout,
        codec: &StripeCodec,
    ) -> Result<()> {
        let (mut stripe, version) = if layout.covers_full_stripe(op.req_offset, op.req_size) {
            let version = self.stripe_version(op.obj_number, layout).await?;
            (vec![0u8; layout.stripe_size()], version)
        } else {
            let mut current = ReadOperation::new(
                op.obj_number,
                (0..layout.total_shards()).collect(),
                layout.stripe_size(),
                0,
                0,
                true,
            );
            let version = self.read_shards(&mut current, layout).await?;
            (layout.decode_stripe(&current, codec)?, version)
        };
        stripe[op.req_offset..op.req_offset + op.req_size].copy_from_slice(op.data);

        let version = version + 1;
        let shards = codec.encode(&stripe[..layout.stripe_size()], layout.shard_size())?;
        let results = join_all(shards.into_iter().enumerate().map(|(column, shard)| {
            self.write_object(
                self.shard_columns(column),
                op.obj_number,
                0,
                encode_shard(version, &shard),
            )
        }))
        .await;

        let mut written = 0;
        for (column, result) in results.into_iter().enumerate() {
            match result {
                Ok(()) => written += 1,
                Err(e) => warn!(
                    file_id = %self.file_id,
                    object_number = op.obj_number,
                    column,
                    version,
                    error = %e,
                    "shard write failed"
                ),
            }
        }

        if written < layout.data_shards() {
            return Err(Error::InsufficientShards {
                available: written,
                required: layout.data_shards(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objectfs_common::{Replica, XCap};
    use rand::Rng;
    use std::collections::HashSet;

    /// OSDs in one process; objects are keyed by OSD UUID and object number
    #[derive(Default)]
    struct MemoryOsds {
        objects: Mutex<HashMap<(String, u64), Vec<u8>>>,
        dead: Mutex<HashSet<String>>,
    }

    impl MemoryOsds {
        fn kill(&self, uuid: &str) {
            self.dead.lock().insert(uuid.to_string());
        }

        fn revive(&self, uuid: &str) {
            self.dead.lock().remove(uuid);
        }

        fn holds(&self, uuid: &str, object_number: u64) -> bool {
            self.objects
                .lock()
                .contains_key(&(uuid.to_string(), object_number))
        }

        fn check_alive(&self, target: &RequestTarget) -> Result<()> {
            if self.dead.lock().contains(&target.uuid) {
                return Err(Error::ConnectionFailed(format!("{} is down", target.address)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl OsdClient for MemoryOsds {
        async fn read_object(&self, target: &RequestTarget, request: &ObjectRead) -> Result<Bytes> {
            self.check_alive(target)?;
            let objects = self.objects.lock();
            let Some(object) = objects.get(&(target.uuid.clone(), request.object_number)) else {
                return Ok(Bytes::new());
            };
            let start = request.offset.min(object.len());
            let end = (request.offset + request.length).min(object.len());
            Ok(Bytes::copy_from_slice(&object[start..end]))
        }

        async fn write_object(&self, target: &RequestTarget, request: &ObjectWrite) -> Result<()> {
            self.check_alive(target)?;
            let mut objects = self.objects.lock();
            let object = objects
                .entry((target.uuid.clone(), request.object_number))
                .or_default();
            let end = request.offset + request.data.len();
            if object.len() < end {
                object.resize(end, 0);
            }
            object[request.offset..end].copy_from_slice(&request.data);
            Ok(())
        }
    }

    struct Loopback;

    #[async_trait]
    impl UuidResolver for Loopback {
        async fn uuid_to_address(&self, uuid: &str) -> Result<String> {
            Ok(format!("{uuid}:32640"))
        }
    }

    fn options() -> ClientOptions {
        ClientOptions {
            max_read_tries: 1,
            max_write_tries: 2,
            retry_delay_s: 0,
            ..ClientOptions::default()
        }
    }

    fn replica(policy: StripingPolicy, prefix: &str) -> Replica {
        let osds = (0..policy.stripe_width())
            .map(|i| format!("{prefix}-{i}"))
            .collect();
        Replica::new(policy, osds)
    }

    fn open(xlocs: XLocSet, osds: &Arc<MemoryOsds>) -> StripedFile {
        let osd_client: Arc<dyn OsdClient> = Arc::clone(osds) as Arc<dyn OsdClient>;
        StripedFile::new(
            "volume:file-1",
            xlocs,
            Arc::new(XCapHolder::new(XCap::new("volume:file-1", 3600, "sig"))),
            osd_client,
            Arc::new(Loopback),
            &options(),
        )
        .unwrap()
    }

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        (0..len).map(|_| rng.r#gen()).collect()
    }

    #[tokio::test]
    async fn test_raid0_round_trip() {
        let osds = Arc::new(MemoryOsds::default());
        let xlocs = XLocSet::new(1, vec![replica(StripingPolicy::raid0(1, 3), "osd")]);
        let file = open(xlocs, &osds);

        let data = random_bytes(5000);
        assert_eq!(file.write(&data, 100).await.unwrap(), 5000);
        // objects 0..=4 spread over the three columns
        assert!(osds.holds("osd-0", 0));
        assert!(osds.holds("osd-1", 1));
        assert!(osds.holds("osd-2", 2));
        assert!(osds.holds("osd-0", 3));

        let mut buf = vec![0u8; 5000];
        assert_eq!(file.read(&mut buf, 100).await.unwrap(), 5000);
        assert_eq!(buf, data);

        let mut head = vec![0xffu8; 100];
        assert_eq!(file.read(&mut head, 0).await.unwrap(), 100);
        assert!(head.iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_raid0_read_stops_at_end_of_file() {
        let osds = Arc::new(MemoryOsds::default());
        let xlocs = XLocSet::new(1, vec![replica(StripingPolicy::raid0(1, 3), "osd")]);
        let file = open(xlocs, &osds);

        let data = random_bytes(5000);
        file.write(&data, 100).await.unwrap();

        let mut buf = vec![0u8; 1000];
        assert_eq!(file.read(&mut buf, 5000).await.unwrap(), 100);
        assert_eq!(&buf[..100], &data[4900..]);
    }

    #[tokio::test]
    async fn test_raid0_fails_over_to_second_replica() {
        let osds = Arc::new(MemoryOsds::default());
        let policy = StripingPolicy::raid0(1, 2);
        let xlocs = XLocSet::new(1, vec![replica(policy, "a"), replica(policy, "b")]);
        let file = open(xlocs, &osds);
        osds.kill("a-0");

        let data = random_bytes(2048);
        file.write(&data, 0).await.unwrap();
        assert!(osds.holds("b-0", 0));
        assert!(osds.holds("a-1", 1));

        let mut buf = vec![0u8; 2048];
        assert_eq!(file.read(&mut buf, 0).await.unwrap(), 2048);
        assert_eq!(buf, data);
    }

    #[tokio::test]
    async fn test_raid0_read_error_propagates() {
        let osds = Arc::new(MemoryOsds::default());
        let xlocs = XLocSet::new(1, vec![replica(StripingPolicy::raid0(1, 2), "osd")]);
        let file = open(xlocs, &osds);
        file.write(&random_bytes(2048), 0).await.unwrap();

        osds.kill("osd-1");
        let mut buf = vec![0u8; 2048];
        assert!(matches!(
            file.read(&mut buf, 0).await,
            Err(Error::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_erasure_round_trip_with_dead_osd() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let osds = Arc::new(MemoryOsds::default());
        let xlocs = XLocSet::new(1, vec![replica(StripingPolicy::erasure_code(4, 4, 2), "osd")]);
        let file = open(xlocs, &osds);

        let data = random_bytes(10_000);
        assert_eq!(file.write(&data, 0).await.unwrap(), 10_000);
        for column in 0..6 {
            assert!(osds.holds(&format!("osd-{column}"), 2));
        }

        let mut buf = vec![0u8; 10_000];
        assert_eq!(file.read(&mut buf, 0).await.unwrap(), 10_000);
        assert_eq!(buf, data);

        osds.kill("osd-1");
        let mut buf = vec![0u8; 10_000];
        assert_eq!(file.read(&mut buf, 0).await.unwrap(), 10_000);
        assert_eq!(buf, data);

        osds.kill("osd-2");
        osds.kill("osd-4");
        let mut buf = vec![0u8; 10_000];
        assert!(matches!(
            file.read(&mut buf, 0).await,
            Err(Error::UnrecoverableData { available: 3, required: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_erasure_partial_write_merges_stripe() {
        let osds = Arc::new(MemoryOsds::default());
        let xlocs = XLocSet::new(1, vec![replica(StripingPolicy::erasure_code(4, 4, 2), "osd")]);
        let file = open(xlocs, &osds);

        let mut expected = random_bytes(4096);
        file.write(&expected, 0).await.unwrap();

        // the merge is written without the parity OSD, which keeps old parity
        osds.kill("osd-5");
        let patch = random_bytes(100);
        assert_eq!(file.write(&patch, 1000).await.unwrap(), 100);
        expected[1000..1100].copy_from_slice(&patch);
        osds.revive("osd-5");

        osds.kill("osd-0");
        let mut buf = vec![0u8; 4096];
        assert_eq!(file.read(&mut buf, 0).await.unwrap(), 4096);
        assert_eq!(buf, expected);
    }

    #[tokio::test]
    async fn test_erasure_shard_missed_by_write_is_not_read() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let osds = Arc::new(MemoryOsds::default());
        let xlocs = XLocSet::new(1, vec![replica(StripingPolicy::erasure_code(4, 4, 2), "osd")]);
        let file = open(xlocs, &osds);

        file.write(&[1u8; 4096], 0).await.unwrap();
        osds.kill("osd-1");
        assert_eq!(file.write(&[2u8; 4096], 0).await.unwrap(), 4096);
        osds.revive("osd-1");

        let mut buf = vec![0u8; 4096];
        assert_eq!(file.read(&mut buf, 0).await.unwrap(), 4096);
        assert!(buf.iter().all(|&b| b == 2));

        let mut window = [0u8; 4];
        assert_eq!(file.read(&mut window, 1024).await.unwrap(), 4);
        assert_eq!(window, [2, 2, 2, 2]);
    }

    #[tokio::test]
    async fn test_erasure_read_needs_parity_plus_one_shards() {
        let osds = Arc::new(MemoryOsds::default());
        let xlocs = XLocSet::new(1, vec![replica(StripingPolicy::erasure_code(4, 4, 2), "osd")]);
        let file = open(xlocs, &osds);
        file.write(&random_bytes(4096), 0).await.unwrap();

        for uuid in ["osd-0", "osd-2", "osd-3", "osd-4"] {
            osds.kill(uuid);
        }
        let mut buf = [0u8; 16];
        assert!(matches!(
            file.read(&mut buf, 1024).await,
            Err(Error::UnrecoverableData { available: 2, required: 3, .. })
        ));
    }

    #[test]
    fn test_shard_header() {
        let object = encode_shard(7, b"abc");
        assert_eq!(object.len(), SHARD_HEADER_LEN + 3);
        assert_eq!(decode_shard(object).unwrap(), (7, Bytes::from_static(b"abc")));
        assert_eq!(decode_shard(Bytes::new()).unwrap(), (0, Bytes::new()));
        assert!(matches!(
            decode_shard(Bytes::from_static(b"abc")),
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_erasure_unwritten_range_reads_zeros() {
        let osds = Arc::new(MemoryOsds::default());
        let xlocs = XLocSet::new(1, vec![replica(StripingPolicy::erasure_code(4, 4, 2), "osd")]);
        let file = open(xlocs, &osds);

        let patch = random_bytes(50);
        file.write(&patch, 5000).await.unwrap();
        assert!(!osds.holds("osd-0", 0));

        let mut buf = vec![0xffu8; 200];
        assert_eq!(file.read(&mut buf, 4950).await.unwrap(), 200);
        assert!(buf[..50].iter().all(|&b| b == 0));
        assert_eq!(&buf[50..100], &patch[..]);
        assert!(buf[100..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_erasure_write_needs_data_width_shards() {
        let osds = Arc::new(MemoryOsds::default());
        let xlocs = XLocSet::new(1, vec![replica(StripingPolicy::erasure_code(4, 4, 2), "osd")]);
        let file = open(xlocs, &osds);
        for uuid in ["osd-0", "osd-3", "osd-5"] {
            osds.kill(uuid);
        }

        assert!(matches!(
            file.write(&random_bytes(4096), 0).await,
            Err(Error::InsufficientShards { available: 3, required: 4 })
        ));
    }

    #[test]
    fn test_rejects_invalid_locations() {
        let osds = Arc::new(MemoryOsds::default());
        let policy = StripingPolicy::raid0(1, 3);
        let xlocs = XLocSet::new(1, vec![Replica::new(policy, vec!["osd-0".into()])]);
        let osd_client: Arc<dyn OsdClient> = osds;
        let result = StripedFile::new(
            "volume:file-1",
            xlocs,
            Arc::new(XCapHolder::new(XCap::new("volume:file-1", 3600, "sig"))),
            osd_client,
            Arc::new(Loopback),
            &options(),
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
