//! objectfs RPC - Wire framing
//!
//! Every message exchanged with a storage node or the directory service is a
//! [`RpcFrame`]: a fixed 12-byte [`RecordMarker`] carrying the lengths of the
//! header, message and data sections that follow it.

pub mod frame;
pub mod record_marker;

pub use frame::RpcFrame;
pub use record_marker::RecordMarker;
