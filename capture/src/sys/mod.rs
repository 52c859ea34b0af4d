// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Minimal FFI binding to `WinDivert.dll`'s stable C ABI, loaded dynamically via `libloading`
//! rather than linked at build time — the driver is an optional runtime dependency the engine
//! must degrade gracefully without (§7, `NotInstalled`), the same posture this corpus uses for
//! `wintun.dll`.

mod address;

pub use address::WinDivertAddress;

use std::ffi::{CString, c_void};
use std::os::raw::{c_char, c_short};
use std::sync::OnceLock;

use libloading::{Library, Symbol};

/// `WINDIVERT_LAYER_NETWORK`: the only capture layer this engine opens handles at.
pub const LAYER_NETWORK: i32 = 0;

const INVALID_HANDLE: *mut c_void = -1isize as *mut c_void;

type FnOpen =
    unsafe extern "system" fn(*const c_char, i32, c_short, u64) -> *mut c_void;
type FnRecv =
    unsafe extern "system" fn(*mut c_void, *mut u8, u32, *mut u32, *mut u8) -> i32;
type FnSend =
    unsafe extern "system" fn(*mut c_void, *const u8, u32, *mut u32, *const u8) -> i32;
type FnClose = unsafe extern "system" fn(*mut c_void) -> i32;

struct Bindings {
    library: Library,
}

impl Bindings {
    fn load() -> Result<Self, String> {
        // SAFETY: loading an arbitrary system DLL is inherently unsafe (it runs the library's
        // initializer); `WinDivert.dll` is a well-known signed driver-support library and this
        // is the documented way to consume it without a build-time link dependency.
        let library = unsafe { Library::new("WinDivert.dll") }.map_err(|err| {
            tracing::warn!(%err, "WinDivert.dll not found or failed to load");
            format!("WinDivert.dll not found or failed to load: {err}")
        })?;
        Ok(Self { library })
    }

    fn symbol<T>(&self, name: &[u8]) -> Result<Symbol<'_, T>, String> {
        // SAFETY: each symbol name below is a real, stable export of WinDivert.dll's public C
        // API, and `T` is that export's documented signature.
        unsafe { self.library.get::<T>(name) }
            .map_err(|err| format!("WinDivert.dll is missing expected symbol: {err}"))
    }
}

fn bindings() -> Result<&'static Bindings, String> {
    static BINDINGS: OnceLock<Result<Bindings, String>> = OnceLock::new();
    BINDINGS.get_or_init(Bindings::load).as_ref().map_err(Clone::clone)
}

/// A raw `WinDivertOpen` handle. Never null; closed exactly once via [`close`].
pub struct RawHandle(*mut c_void);

// SAFETY: the underlying WinDivert handle is documented as safe to use from any thread, and this
// binding serializes no state of its own around it.
unsafe impl Send for RawHandle {}
unsafe impl Sync for RawHandle {}

/// A failed [`open`], distinguishing "the driver isn't installed" from "the driver rejected this
/// particular open call" so the caller can map each to the right [`crate::CaptureError`] variant.
pub enum OpenError {
    /// `WinDivert.dll` could not be loaded, or is missing an expected export.
    NotInstalled(String),
    /// The driver loaded but rejected the open call (bad filter, permissions, priority clash).
    Rejected(String),
}

/// Open a capture handle with the given filter expression and priority.
///
/// # Errors
///
/// [`OpenError::NotInstalled`] if the driver isn't loadable; [`OpenError::Rejected`] if the open
/// call itself fails (invalid filter, permissions, a handle of that priority already exists).
pub fn open(filter: &str, priority: i16) -> Result<RawHandle, OpenError> {
    let bindings = bindings().map_err(OpenError::NotInstalled)?;
    let open_fn: Symbol<FnOpen> =
        bindings.symbol(b"WinDivertOpen\0").map_err(OpenError::NotInstalled)?;
    let filter_c = CString::new(filter).map_err(|err| OpenError::Rejected(err.to_string()))?;

    // SAFETY: `filter_c` is a valid, NUL-terminated C string for the duration of this call;
    // `WinDivertOpen` does not retain the pointer past returning.
    let handle = unsafe { open_fn(filter_c.as_ptr(), LAYER_NETWORK, priority, 0) };
    if handle == INVALID_HANDLE {
        return Err(OpenError::Rejected(std::io::Error::last_os_error().to_string()));
    }
    Ok(RawHandle(handle))
}

/// `WinDivertRecv` reports a blocked read unblocked by `WinDivertClose` as this OS error, per
/// WinDivert's documented close semantics.
const ERROR_NO_DATA: i32 = 232;

/// A failed `recv`, distinguishing "the handle was closed out from under us" (the expected
/// shutdown path) from any other driver failure.
pub enum RecvError {
    /// The handle was closed while this call was blocked.
    Closed,
    /// Some other driver failure.
    Other(String),
}

/// Block until a packet is available, or the handle is closed.
///
/// # Errors
///
/// Returns [`RecvError::Closed`] if the handle was closed while blocked, or
/// [`RecvError::Other`] for any other driver failure.
pub fn recv(handle: &RawHandle, buf: &mut [u8]) -> Result<(u32, WinDivertAddress), RecvError> {
    let bindings = bindings().map_err(RecvError::Other)?;
    let recv_fn: Symbol<FnRecv> =
        bindings.symbol(b"WinDivertRecv\0").map_err(RecvError::Other)?;
    let mut addr = WinDivertAddress::zeroed();
    let mut recv_len: u32 = 0;

    // SAFETY: `buf` is valid for `buf.len()` bytes and outlives the call; `addr` is a valid
    // 80-byte out-parameter buffer; `recv_len` is a valid `u32` out-parameter.
    let ok = unsafe {
        recv_fn(
            handle.0,
            buf.as_mut_ptr(),
            buf.len() as u32,
            &mut recv_len,
            addr.as_mut_ptr(),
        )
    };
    if ok == 0 {
        let err = std::io::Error::last_os_error();
        return Err(if err.raw_os_error() == Some(ERROR_NO_DATA) {
            RecvError::Closed
        } else {
            RecvError::Other(err.to_string())
        });
    }
    Ok((recv_len, addr))
}

/// Re-inject a packet with the given address metadata.
///
/// # Errors
///
/// Returns a detail string on driver failure.
pub fn send(handle: &RawHandle, buf: &[u8], addr: &WinDivertAddress) -> Result<(), String> {
    let bindings = bindings()?;
    let send_fn: Symbol<FnSend> = bindings.symbol(b"WinDivertSend\0")?;
    let mut sent_len: u32 = 0;

    // SAFETY: `buf` and `addr` are valid for the duration of the call; `sent_len` is a valid
    // out-parameter.
    let ok = unsafe {
        send_fn(handle.0, buf.as_ptr(), buf.len() as u32, &mut sent_len, addr.as_ptr())
    };
    if ok == 0 {
        return Err(std::io::Error::last_os_error().to_string());
    }
    Ok(())
}

/// Close a handle, unblocking any thread parked in [`recv`] on it.
pub fn close(handle: &RawHandle) {
    let Ok(bindings) = bindings() else { return };
    let Ok(close_fn): Result<Symbol<FnClose>, String> = bindings.symbol(b"WinDivertClose\0")
    else {
        return;
    };
    // SAFETY: `handle.0` is a handle returned by a prior successful `open` and not yet closed.
    unsafe {
        close_fn(handle.0);
    }
}
