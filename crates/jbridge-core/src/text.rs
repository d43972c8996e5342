//! Text conversion between Rust strings and managed strings
//!
//! Managed strings are UTF-16. Conversion never raises a managed exception;
//! a null result from the runtime means it could not allocate.

use jbridge_sdk::ObjectRef;

use crate::env::Env;
use crate::refs::LocalRef;
use crate::{BridgeError, BridgeResult};

/// Encode a Rust string as UTF-16 code units
pub fn encode_utf16(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

/// Decode UTF-16 code units. Unpaired surrogates become U+FFFD.
pub fn decode_utf16(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

impl Env {
    /// Create a managed string holding `text`.
    ///
    /// The result is a local reference, released when it drops.
    pub fn to_managed_text(&self, text: &str) -> BridgeResult<LocalRef<'_>> {
        let units = encode_utf16(text);
        let raw = self.runtime().new_string(self.raw(), &units);
        // SAFETY: new_string returns a fresh local reference.
        unsafe { self.adopt_local(raw) }.ok_or_else(|| {
            BridgeError::AllocationFailed(format!("managed string of {} code units", units.len()))
        })
    }

    /// Read a managed string. A null reference reads as the empty string.
    pub fn from_managed_text(&self, string: ObjectRef) -> String {
        if string.is_null() {
            return String::new();
        }
        decode_utf16(&self.runtime().string_utf16(self.raw(), string))
    }
}
