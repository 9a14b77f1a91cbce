//! RPC frames on an ordered byte stream
//!
//! A frame is a [`RecordMarker`] followed by the request/response header,
//! the message body and the raw payload. The transport underneath is assumed
//! to deliver bytes in order and without loss.

use crate::record_marker::RecordMarker;
use bytes::{BufMut, Bytes, BytesMut};
use objectfs_common::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// One framed RPC message
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RpcFrame {
    pub header: Bytes,
    pub message: Bytes,
    pub data: Bytes,
}

impl RpcFrame {
    pub fn new(header: impl Into<Bytes>, message: impl Into<Bytes>, data: impl Into<Bytes>) -> Self {
        Self {
            header: header.into(),
            message: message.into(),
            data: data.into(),
        }
    }

    /// Record marker describing this frame
    pub fn record_marker(&self) -> Result<RecordMarker> {
        Ok(RecordMarker::new(
            section_len("header", &self.header)?,
            section_len("message", &self.message)?,
            section_len("data", &self.data)?,
        ))
    }

    /// Serialize marker and sections into one contiguous buffer
    pub fn encode(&self) -> Result<BytesMut> {
        let marker = self.record_marker()?;
        let mut buf = BytesMut::with_capacity(RecordMarker::SIZE + marker.body_len() as usize);
        marker.serialize(&mut buf);
        buf.put_slice(&self.header);
        buf.put_slice(&self.message);
        buf.put_slice(&self.data);
        Ok(buf)
    }

    /// Write the frame and flush the writer
    pub async fn write_frame<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let buf = self.encode()?;
        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read exactly one frame from `reader`
    ///
    /// Frames without a header and frames larger than `max_frame_len` are
    /// rejected before their body is read.
    pub async fn read_frame<R>(reader: &mut R, max_frame_len: usize) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut marker_buf = [0u8; RecordMarker::SIZE];
        reader.read_exact(&mut marker_buf).await?;
        let marker = RecordMarker::parse(&marker_buf)?;

        if marker.header_len() == 0 {
            return Err(Error::protocol("frame has an empty header"));
        }
        if marker.frame_len() > max_frame_len as u64 {
            return Err(Error::protocol(format!(
                "frame of {} bytes exceeds limit of {max_frame_len}",
                marker.frame_len()
            )));
        }

        let header = read_section(reader, marker.header_len()).await?;
        let message = read_section(reader, marker.message_len()).await?;
        let data = read_section(reader, marker.data_len()).await?;

        debug!(
            header_len = marker.header_len(),
            message_len = marker.message_len(),
            data_len = marker.data_len(),
            "received frame"
        );

        Ok(Self {
            header,
            message,
            data,
        })
    }
}

fn section_len(name: &str, section: &Bytes) -> Result<u32> {
    u32::try_from(section.len())
        .map_err(|_| Error::protocol(format!("{name} section of {} bytes is too large", section.len())))
}

async fn read_section<R>(reader: &mut R, len: u32) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::zeroed(len as usize);
    reader.read_exact(&mut buf).await?;
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1024 * 1024;

    #[tokio::test]
    async fn test_frame_over_stream() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let frame = RpcFrame::new(&b"hdr"[..], &b"message"[..], vec![7u8; 1000]);

        frame.write_frame(&mut client).await.unwrap();
        let received = RpcFrame::read_frame(&mut server, LIMIT).await.unwrap();
        assert_eq!(received, frame);
    }

    #[tokio::test]
    async fn test_back_to_back_frames() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let first = RpcFrame::new(&b"a"[..], Bytes::new(), Bytes::new());
        let second = RpcFrame::new(&b"b"[..], &b"body"[..], &b"payload"[..]);
        first.write_frame(&mut client).await.unwrap();
        second.write_frame(&mut client).await.unwrap();

        assert_eq!(RpcFrame::read_frame(&mut server, LIMIT).await.unwrap(), first);
        assert_eq!(RpcFrame::read_frame(&mut server, LIMIT).await.unwrap(), second);
    }

    #[test]
    fn test_encoded_prefix() {
        let frame = RpcFrame::new(&b"hh"[..], &b"mmm"[..], &b"d"[..]);
        let buf = frame.encode().unwrap();
        assert_eq!(buf.len(), 12 + 2 + 3 + 1);
        let marker = RecordMarker::parse(&buf).unwrap();
        assert_eq!(marker, RecordMarker::new(2, 3, 1));
        assert_eq!(&buf[12..], b"hhmmmd");
    }

    #[tokio::test]
    async fn test_rejects_degenerate_frame() {
        let mut wire = Vec::new();
        RecordMarker::new(0, 4, 0).serialize(&mut wire);
        wire.extend_from_slice(b"body");
        let err = RpcFrame::read_frame(&mut wire.as_slice(), LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_rejects_oversize_frame() {
        let mut wire = Vec::new();
        RecordMarker::new(8, 0, 4096).serialize(&mut wire);
        let err = RpcFrame::read_frame(&mut wire.as_slice(), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_truncated_stream() {
        let frame = RpcFrame::new(&b"header"[..], &b"message"[..], Bytes::new());
        let wire = frame.encode().unwrap();
        let mut truncated = &wire[..wire.len() - 3];
        let err = RpcFrame::read_frame(&mut truncated, LIMIT).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
