//! Record marker preceding every RPC message on a stream transport
//!
//! ```text
//! +------------+-------------+----------+--------+---------+------+
//! | header_len | message_len | data_len | header | message | data |
//! | 4B (BE)    | 4B (BE)     | 4B (BE)  | var    | var     | var  |
//! +------------+-------------+----------+--------+---------+------+
//! ```

use bytes::{Buf, BufMut};
use objectfs_common::{Error, Result};

/// Length prefix of one RPC frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RecordMarker {
    header_len: u32,
    message_len: u32,
    data_len: u32,
}

impl RecordMarker {
    /// Size of a serialized record marker
    pub const SIZE: usize = 12;

    #[must_use]
    pub const fn new(header_len: u32, message_len: u32, data_len: u32) -> Self {
        Self {
            header_len,
            message_len,
            data_len,
        }
    }

    /// Parse a record marker from the first 12 bytes of `buf`
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::protocol(format!(
                "record marker needs {} bytes, got {}",
                Self::SIZE,
                buf.len()
            )));
        }
        let mut buf = &buf[..Self::SIZE];
        Ok(Self {
            header_len: buf.get_u32(),
            message_len: buf.get_u32(),
            data_len: buf.get_u32(),
        })
    }

    /// Append the marker in network byte order
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.header_len);
        buf.put_u32(self.message_len);
        buf.put_u32(self.data_len);
    }

    #[must_use]
    pub const fn get_size(&self) -> usize {
        Self::SIZE
    }

    #[must_use]
    pub const fn header_len(&self) -> u32 {
        self.header_len
    }

    #[must_use]
    pub const fn message_len(&self) -> u32 {
        self.message_len
    }

    #[must_use]
    pub const fn data_len(&self) -> u32 {
        self.data_len
    }

    /// Length of the three sections following the marker
    #[must_use]
    pub const fn body_len(&self) -> u64 {
        self.header_len as u64 + self.message_len as u64 + self.data_len as u64
    }

    /// Total frame size on the wire, marker included
    #[must_use]
    pub const fn frame_len(&self) -> u64 {
        Self::SIZE as u64 + self.body_len()
    }
}
