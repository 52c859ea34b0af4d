// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use windows::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, NO_ERROR};

const MAX_ATTEMPTS: u32 = 5;

/// The outcome of a single OS query attempt against a grow-only buffer.
pub enum QueryOutcome {
    /// The call succeeded; the buffer holds `size` valid bytes.
    Ok(u32),
    /// The call reported the buffer was too small; `required` is the OS-reported size to grow
    /// to before retrying.
    TooSmall(u32),
    /// Any other failure. The caller gives up immediately rather than retrying.
    Failed,
}

/// A reusable, grow-only buffer for `Get*Table`-style Windows APIs that report their required
/// size back through an in/out parameter.
///
/// Mirrors the retry discipline of the original port-lookup implementation: on
/// `ERROR_INSUFFICIENT_BUFFER`, grow to the requested size plus 25% headroom and retry, up to
/// five attempts total; any other failure short-circuits immediately.
pub struct GrowBuffer {
    bytes: Vec<u8>,
}

impl GrowBuffer {
    /// Create a buffer with a starting capacity that comfortably holds a typical table without
    /// needing to grow on the first call.
    #[must_use]
    pub fn new(initial_capacity: usize) -> Self {
        Self { bytes: vec![0u8; initial_capacity] }
    }

    /// Run `attempt`, growing the buffer and retrying as the buffer-size discipline dictates.
    /// Returns the byte slice holding the populated table on success.
    pub fn query(&mut self, mut attempt: impl FnMut(&mut [u8]) -> QueryOutcome) -> Option<&[u8]> {
        for _ in 0..MAX_ATTEMPTS {
            match attempt(&mut self.bytes) {
                QueryOutcome::Ok(_) => return Some(&self.bytes),
                QueryOutcome::TooSmall(required) => {
                    let grown = required as usize + required as usize / 4;
                    if grown > self.bytes.len() {
                        self.bytes.resize(grown, 0);
                    }
                }
                QueryOutcome::Failed => return None,
            }
        }
        None
    }
}

/// Classify a raw Win32 error code returned by a `Get*Table` call.
#[must_use]
pub fn classify(win32_error: u32, reported_size: u32) -> QueryOutcome {
    if win32_error == NO_ERROR.0 {
        QueryOutcome::Ok(reported_size)
    } else if win32_error == ERROR_INSUFFICIENT_BUFFER.0 {
        QueryOutcome::TooSmall(reported_size)
    } else {
        QueryOutcome::Failed
    }
}
