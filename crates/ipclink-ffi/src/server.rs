use ipclink_transport::Server;

use crate::args;
use crate::error;
use crate::types::{ConnectionHandle, IpcConnectionHandle, IpcServerHandle, ServerHandle};

fn with_server_mut<T>(
    handle: IpcServerHandle,
    on_error: T,
    f: impl FnOnce(&mut ServerHandle) -> T,
) -> T {
    if handle.is_null() {
        let _ = error::set_invalid_argument("server handle cannot be null");
        return on_error;
    }

    let server_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &mut *(handle as *mut ServerHandle) }
    };

    f(server_handle)
}

/// Bind a server under channel `name`.
///
/// Returns null on failure; `ipc_last_error` describes the cause.
///
/// # Safety
/// `name` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn ipc_server_bind(name: *const std::os::raw::c_char) -> IpcServerHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        // SAFETY: Null and UTF-8 are checked; the string is valid per the caller contract.
        let Ok(name) = (unsafe { args::channel_name(name) }) else {
            return std::ptr::null_mut();
        };

        match Server::bind(name) {
            Ok(server) => Box::into_raw(Box::new(ServerHandle { server })) as IpcServerHandle,
            Err(err) => {
                let _ = error::map_transport_error(&err);
                std::ptr::null_mut()
            }
        }
    })
}

/// Block until a client connects.
///
/// # Safety
/// `server` must be a valid handle returned by `ipc_server_bind`.
#[no_mangle]
pub unsafe extern "C" fn ipc_server_accept(server: IpcServerHandle) -> IpcConnectionHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        with_server_mut(server, std::ptr::null_mut(), |server_handle| {
            match server_handle.server.accept() {
                Ok(connection) => {
                    Box::into_raw(Box::new(ConnectionHandle { connection })) as IpcConnectionHandle
                }
                Err(err) => {
                    let _ = error::map_transport_error(&err);
                    std::ptr::null_mut()
                }
            }
        })
    })
}

/// Free a server handle and release its listening resource.
///
/// # Safety
/// `server` must be null or a handle previously returned by `ipc_server_bind`.
#[no_mangle]
pub unsafe extern "C" fn ipc_server_free(server: IpcServerHandle) {
    crate::ffi_boundary((), || {
        if server.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by ipc_server_bind.
        unsafe {
            drop(Box::from_raw(server as *mut ServerHandle));
        }
    });
}
