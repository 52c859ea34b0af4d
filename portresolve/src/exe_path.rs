// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use windows::Win32::Foundation::CloseHandle;
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_NAME_FORMAT, PROCESS_QUERY_LIMITED_INFORMATION,
    QueryFullProcessImageNameW,
};

use crate::pid::Pid;

/// Resolve a PID to the full path of its executable image.
///
/// Opens the process with only `PROCESS_QUERY_LIMITED_INFORMATION`, the least-privileged access
/// right that still permits `QueryFullProcessImageNameW`, so this succeeds against
/// higher-privilege processes a normal user can't fully open. Returns `None` for a process that
/// no longer exists or is protected against even this limited query — both are routine and not
/// logged as errors; the caller treats the PID as not yet resolvable and retries next cycle.
#[must_use]
pub fn resolve_executable_path(pid: Pid) -> Option<String> {
    // SAFETY: `PROCESS_QUERY_LIMITED_INFORMATION` is a read-only access right; the returned
    // handle is closed below in every path.
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid.as_u32()) }
        .ok()?;

    let mut buf = [0u16; 1024];
    let mut size = buf.len() as u32;
    // SAFETY: `buf` is valid for `size` elements; the handle was just opened successfully.
    let result =
        unsafe { QueryFullProcessImageNameW(handle, PROCESS_NAME_FORMAT(0), windows::core::PWSTR(buf.as_mut_ptr()), &mut size) };

    // SAFETY: `handle` was returned by the `OpenProcess` call above and is not used afterwards.
    let _ = unsafe { CloseHandle(handle) };

    result.ok()?;
    if size == 0 {
        return None;
    }
    Some(String::from_utf16_lossy(&buf[..size as usize]))
}
