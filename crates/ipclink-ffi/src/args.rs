//! Checked views over raw C arguments.
//!
//! Each helper records the last error when it rejects an argument and hands
//! back the status the entry point should return, so call sites chain with `?`.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::slice;

use ipclink_transport::TransportError;

use crate::error;
use crate::types::IpcResult;

pub(crate) type Checked<T> = Result<T, IpcResult>;

/// Channel name argument: non-null, NUL-terminated UTF-8.
///
/// # Safety
/// `name` must be null or point to a NUL-terminated C string.
pub(crate) unsafe fn channel_name<'a>(name: *const c_char) -> Checked<&'a str> {
    if name.is_null() {
        return Err(error::set_invalid_argument("name cannot be null"));
    }

    // SAFETY: Non-null and NUL-terminated per the caller contract.
    let raw = unsafe { CStr::from_ptr(name) };
    raw.to_str()
        .map_err(|_| error::set_invalid_argument("name must be valid UTF-8"))
}

/// Outgoing message. `src` may be null only for an empty message.
///
/// # Safety
/// If `len > 0` and `src` is non-null, `src` must be readable for `len` bytes.
pub(crate) unsafe fn message<'a>(src: *const u8, len: usize) -> Checked<&'a [u8]> {
    if len == 0 {
        return Ok(&[]);
    }
    if src.is_null() {
        return Err(error::set_invalid_argument(format!(
            "message pointer is null but length is {len}"
        )));
    }

    // SAFETY: Checked non-null; readable for `len` bytes for the call duration.
    Ok(unsafe { slice::from_raw_parts(src, len) })
}

/// Receive buffer. Zero capacity passes through; the transport rejects it
/// without touching the pending message.
///
/// # Safety
/// If `cap > 0` and `dst` is non-null, `dst` must be writable for `cap` bytes.
pub(crate) unsafe fn receive_buffer<'a>(dst: *mut u8, cap: usize) -> Checked<&'a mut [u8]> {
    if cap == 0 {
        return Ok(&mut []);
    }
    if dst.is_null() {
        return Err(error::set_invalid_argument(format!(
            "receive buffer is null but capacity is {cap}"
        )));
    }

    // SAFETY: Checked non-null; writable for `cap` bytes for the call duration.
    Ok(unsafe { slice::from_raw_parts_mut(dst, cap) })
}

/// Report a byte count through an optional out-pointer.
///
/// # Safety
/// `out` must be null or valid for a `usize` write.
pub(crate) unsafe fn report(out: *mut usize, count: usize) {
    // SAFETY: Null or valid per the caller contract.
    if let Some(slot) = unsafe { out.as_mut() } {
        *slot = count;
    }
}

/// Record a transport failure as the last error.
pub(crate) fn transport(err: TransportError) -> IpcResult {
    error::map_transport_error(&err)
}

/// Status code for a checked call.
pub(crate) fn status(result: Checked<()>) -> IpcResult {
    match result {
        Ok(()) => IpcResult::Ok,
        Err(code) => code,
    }
}
