use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use ipclink_transport::TransportError;

use crate::types::IpcResult;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::default();
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let message = message.into();
    let sanitized = message.replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> IpcResult {
    set_error_message(message);
    IpcResult::InvalidArgument
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_transport_error(err: &TransportError) -> IpcResult {
    set_error_message(err.to_string());
    match err {
        TransportError::InvalidName { .. } | TransportError::PathTooLong { .. } => {
            IpcResult::InvalidArgument
        }
        TransportError::Bind { .. } | TransportError::AlreadyBound => IpcResult::BindFailed,
        TransportError::Connect { .. } => IpcResult::ConnectFailed,
        TransportError::NotBound => IpcResult::NotBound,
        TransportError::InvalidConnection => IpcResult::InvalidConnection,
        TransportError::Unsupported => IpcResult::Unsupported,
        TransportError::Io(source) if source.kind() == std::io::ErrorKind::TimedOut => {
            IpcResult::Timeout
        }
        TransportError::Io(source) if source.kind() == std::io::ErrorKind::InvalidInput => {
            IpcResult::InvalidArgument
        }
        TransportError::Accept(_) | TransportError::Io(_) => IpcResult::TransportError,
    }
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_timeout_code() {
        let err = TransportError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert_eq!(map_transport_error(&err), IpcResult::Timeout);
    }

    #[test]
    fn nul_bytes_are_sanitized() {
        set_error_message("bad\0name");
        // SAFETY: last_error_ptr returns a pointer to a live thread-local CString.
        let text = unsafe { std::ffi::CStr::from_ptr(last_error_ptr()) };
        assert_eq!(text.to_str().unwrap(), "bad?name");
        clear_error_state();
    }
}
