//! Exception guard
//!
//! A managed exception only becomes visible to native code through this
//! guard: it reports whether one is pending, optionally describes it, and
//! clears it.

use tracing::warn;

use crate::bridge::FaultPolicy;
use crate::env::Env;
use crate::{BridgeError, BridgeResult};

impl Env {
    /// Whether a managed exception is pending on this thread
    pub fn exception_check(&self) -> bool {
        self.runtime().exception_check(self.raw())
    }

    /// Clear a pending exception. With `describe`, log its description
    /// first. Returns `false` if nothing was pending.
    pub fn suppress_exception(&self, describe: bool) -> bool {
        if !self.exception_check() {
            return false;
        }
        if describe {
            let description = self.runtime().exception_description(self.raw());
            warn!(
                exception = description.as_deref().unwrap_or("<no description>"),
                "managed exception suppressed"
            );
        }
        self.runtime().exception_clear(self.raw());
        true
    }

    /// Take the pending exception's description and clear it
    pub(crate) fn take_exception(&self) -> Option<String> {
        if !self.exception_check() {
            return None;
        }
        let description = self
            .runtime()
            .exception_description(self.raw())
            .unwrap_or_else(|| "<no description>".to_string());
        self.runtime().exception_clear(self.raw());
        Some(description)
    }

    /// Clear whatever a failed lookup left behind, without logging
    pub(crate) fn clear_exception_quietly(&self) {
        if self.exception_check() {
            self.runtime().exception_clear(self.raw());
        }
    }

    /// Apply the bridge's fault policy after a call into `member`.
    ///
    /// `Ok(false)` means the call completed normally; `Ok(true)` means it
    /// faulted and the caller should return the zero value.
    pub(crate) fn check_fault(&self, member: &str) -> BridgeResult<bool> {
        if !self.exception_check() {
            return Ok(false);
        }
        let options = self.bridge().options();
        match options.fault_policy {
            FaultPolicy::Suppress => {
                self.suppress_exception(options.describe_exceptions);
                Ok(true)
            }
            FaultPolicy::Defer => Ok(true),
            FaultPolicy::Propagate => {
                let description = self.take_exception().unwrap_or_default();
                if options.describe_exceptions {
                    warn!(member, exception = description.as_str(), "managed exception propagated");
                }
                Err(BridgeError::ManagedFault {
                    member: member.to_string(),
                    description,
                })
            }
        }
    }
}
