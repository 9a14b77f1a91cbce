//! Synchronous request execution with retries
//!
//! [`SyncRequest`] drives one logical request against the replicas listed in
//! a [`UuidIterator`]. Each attempt resolves the current UUID, attaches the
//! file's capability and awaits the request under a timeout. Depending on
//! the outcome the executor returns, renews the capability, follows a
//! redirect, or fails over to the next replica after the retry delay.

use crate::capability::{XCapHandler, XCapHolder};
use crate::uuid_iterator::UuidIterator;
use crate::uuid_resolver::UuidResolver;
use objectfs_common::{ClientOptions, Error, Result, XCap};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, warn};

/// Retry behaviour of one request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_tries: u32,
    retry_delay: Duration,
    request_timeout: Duration,
    delay_last_attempt: bool,
}

impl RetryPolicy {
    /// `max_tries` of 0 is treated as 1
    #[must_use]
    pub fn new(max_tries: u32, retry_delay: Duration, request_timeout: Duration) -> Self {
        Self {
            max_tries: max_tries.max(1),
            retry_delay,
            request_timeout,
            delay_last_attempt: false,
        }
    }

    /// Also wait out the retry delay after the final failed attempt
    #[must_use]
    pub fn with_delay_last_attempt(mut self, delay_last_attempt: bool) -> Self {
        self.delay_last_attempt = delay_last_attempt;
        self
    }

    /// Policy for requests other than reads and writes
    #[must_use]
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(
            options.max_tries,
            options.retry_delay(),
            options.request_timeout(),
        )
    }

    #[must_use]
    pub fn for_reads(options: &ClientOptions) -> Self {
        Self::new(
            options.max_read_tries,
            options.retry_delay(),
            options.request_timeout(),
        )
    }

    #[must_use]
    pub fn for_writes(options: &ClientOptions) -> Self {
        Self::new(
            options.max_write_tries,
            options.retry_delay(),
            options.request_timeout(),
        )
    }

    #[must_use]
    pub const fn max_tries(&self) -> u32 {
        self.max_tries
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub const fn delay_last_attempt(&self) -> bool {
        self.delay_last_attempt
    }
}

/// Where and with which capability one attempt is sent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestTarget {
    pub uuid: String,
    /// `address:port`, or the UUID itself if the iterator holds addresses
    pub address: String,
    pub xcap: Option<XCap>,
}

/// Builder and driver for one retried request
pub struct SyncRequest<'a> {
    uuid_iterator: &'a UuidIterator,
    policy: &'a RetryPolicy,
    resolver: Option<&'a dyn UuidResolver>,
    xcap_holder: Option<&'a XCapHolder>,
    xcap_handler: Option<&'a dyn XCapHandler>,
    uuid_iterator_has_addresses: bool,
}

impl<'a> SyncRequest<'a> {
    #[must_use]
    pub fn new(uuid_iterator: &'a UuidIterator, policy: &'a RetryPolicy) -> Self {
        Self {
            uuid_iterator,
            policy,
            resolver: None,
            xcap_holder: None,
            xcap_handler: None,
            uuid_iterator_has_addresses: false,
        }
    }

    /// Resolve UUIDs to addresses with `resolver`
    #[must_use]
    pub fn resolver(mut self, resolver: &'a dyn UuidResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Attach the holder's capability to every attempt, without renewal
    #[must_use]
    pub fn xcap_holder(mut self, holder: &'a XCapHolder) -> Self {
        self.xcap_holder = Some(holder);
        self
    }

    /// Attach the holder's capability and renew it through `handler`
    #[must_use]
    pub fn capability(mut self, holder: &'a XCapHolder, handler: &'a dyn XCapHandler) -> Self {
        self.xcap_holder = Some(holder);
        self.xcap_handler = Some(handler);
        self
    }

    /// The iterator holds addresses, not UUIDs
    #[must_use]
    pub fn uuid_iterator_has_addresses(mut self, has_addresses: bool) -> Self {
        self.uuid_iterator_has_addresses = has_addresses;
        self
    }

    /// Run `request` until it succeeds or fails terminally
    ///
    /// Capability renewals and redirects do not use up tries but are each
    /// limited to `max_tries` per call. After the last try the error of that
    /// try is returned as is.
    pub async fn execute<T, F, Fut>(self, mut request: F) -> Result<T>
    where
        F: FnMut(RequestTarget) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.uuid_iterator_has_addresses && self.resolver.is_none() {
            return Err(Error::invalid_argument(
                "a UUID resolver is required unless the iterator holds addresses",
            ));
        }

        let max_tries = self.policy.max_tries;
        let mut attempt = 0u32;
        let mut renewals = 0u32;
        let mut redirects = 0u32;
        let mut retried = false;

        loop {
            attempt += 1;
            let uuid = self.uuid_iterator.get_uuid()?;
            let sent_at = Instant::now();

            let (err, resolver_failed) = match self.target_for(&uuid).await {
                Err(e) => (e, true),
                Ok(target) => match timeout(self.policy.request_timeout, request(target)).await {
                    Ok(Ok(value)) => {
                        if retried {
                            debug!(uuid = %uuid, attempt, "request succeeded after retrying");
                        }
                        return Ok(value);
                    }
                    Ok(Err(e)) => (e, false),
                    Err(_) => (Error::Timeout, false),
                },
            };

            if !resolver_failed && err.is_capability_invalid() {
                match (self.xcap_holder, self.xcap_handler) {
                    (Some(holder), Some(handler)) if renewals < max_tries => {
                        renewals += 1;
                        attempt -= 1;
                        self.renew_capability(holder, handler).await?;
                        continue;
                    }
                    _ => {
                        warn!(uuid = %uuid, error = %err, "capability rejected");
                        return Err(err);
                    }
                }
            }

            if !resolver_failed && let Some(target) = err.redirect_target() {
                if redirects >= max_tries {
                    error!(uuid = %uuid, redirects, "too many redirects");
                    return Err(err);
                }
                redirects += 1;
                attempt -= 1;
                debug!(from = %uuid, to = %target, "following redirect");
                self.uuid_iterator.set_current_uuid(target);
                continue;
            }

            if resolver_failed || err.is_retryable() {
                self.uuid_iterator.mark_uuid_as_failed(&uuid);
                if attempt < max_tries {
                    if retried {
                        debug!(uuid = %uuid, attempt, error = %err, "retrying request");
                    } else {
                        warn!(
                            uuid = %uuid,
                            error = %err,
                            tries_left = max_tries - attempt,
                            "request failed, retrying"
                        );
                        retried = true;
                    }
                    self.wait_retry_delay(sent_at).await;
                    continue;
                }
                if self.policy.delay_last_attempt {
                    self.wait_retry_delay(sent_at).await;
                }
            }

            if let Some(errno) = err.posix_errno() {
                debug!(uuid = %uuid, errno = %errno, error = %err, "request failed");
            } else if attempt > 1 {
                error!(
                    uuid = %uuid,
                    attempts = attempt,
                    error = %err,
                    "request failed after {attempt} attempts"
                );
            } else {
                warn!(uuid = %uuid, error = %err, "request failed");
            }
            return Err(err);
        }
    }

    async fn target_for(&self, uuid: &str) -> Result<RequestTarget> {
        let address = if self.uuid_iterator_has_addresses {
            uuid.to_string()
        } else {
            let resolver = self
                .resolver
                .ok_or_else(|| Error::invalid_argument("no UUID resolver configured"))?;
            resolver.uuid_to_address(uuid).await?
        };
        Ok(RequestTarget {
            uuid: uuid.to_string(),
            address,
            xcap: self.xcap_holder.map(XCapHolder::get),
        })
    }

    async fn renew_capability(&self, holder: &XCapHolder, handler: &dyn XCapHandler) -> Result<()> {
        let current = holder.get();
        let renewed = match timeout(
            self.policy.request_timeout,
            handler.renew_capability(&current),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        };

        match renewed {
            Ok(xcap) => {
                debug!(
                    file_id = %current.file_id,
                    expire_time_s = xcap.expire_time_s,
                    "renewed capability"
                );
                holder.update(xcap);
                Ok(())
            }
            Err(e) => {
                error!(file_id = %current.file_id, error = %e, "capability renewal failed");
                Err(Error::CapabilityRenewal(e.to_string()))
            }
        }
    }

    /// Wait until `retry_delay` has passed since the attempt was sent
    async fn wait_retry_delay(&self, sent_at: Instant) {
        let deadline = sent_at + self.policy.retry_delay;
        if deadline > Instant::now() {
            sleep_until(deadline).await;
        }
    }
}
