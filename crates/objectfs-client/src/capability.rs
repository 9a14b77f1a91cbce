//! File capabilities
//!
//! Every OSD request carries the file's [`XCap`]. Capabilities expire; when
//! an OSD rejects one the request executor asks an [`XCapHandler`] for a
//! fresh capability and stores it in the file's [`XCapHolder`].

use async_trait::async_trait;
use objectfs_common::{Result, XCap};
use parking_lot::RwLock;
use tracing::debug;

/// Source of renewed capabilities, usually the metadata service
#[async_trait]
pub trait XCapHandler: Send + Sync {
    /// Obtain a capability replacing `current`
    async fn renew_capability(&self, current: &XCap) -> Result<XCap>;
}

/// Current capability of one open file
#[derive(Debug)]
pub struct XCapHolder {
    xcap: RwLock<XCap>,
}

impl XCapHolder {
    #[must_use]
    pub fn new(xcap: XCap) -> Self {
        Self {
            xcap: RwLock::new(xcap),
        }
    }

    /// Copy of the current capability
    #[must_use]
    pub fn get(&self) -> XCap {
        self.xcap.read().clone()
    }

    #[must_use]
    pub fn expire_time_s(&self) -> u64 {
        self.xcap.read().expire_time_s
    }

    /// Store `xcap` unless the held capability expires later
    ///
    /// Renewals may finish out of order; the newest capability wins.
    pub fn update(&self, xcap: XCap) -> bool {
        let mut current = self.xcap.write();
        if xcap.expire_time_s < current.expire_time_s {
            debug!(
                file_id = %xcap.file_id,
                offered = xcap.expire_time_s,
                held = current.expire_time_s,
                "ignoring older capability"
            );
            return false;
        }
        *current = xcap;
        true
    }
}
