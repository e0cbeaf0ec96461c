use ipclink_transport::Client;

use crate::args;
use crate::error;
use crate::types::{ClientHandle, ConnectionHandle, IpcClientHandle, IpcConnectionHandle, IpcResult};

fn with_client<T>(handle: IpcClientHandle, on_error: T, f: impl FnOnce(&ClientHandle) -> T) -> T {
    if handle.is_null() {
        let _ = error::set_invalid_argument("client handle cannot be null");
        return on_error;
    }

    let client_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &*(handle as *mut ClientHandle) }
    };

    f(client_handle)
}

/// Create a client for channel `name`. No connection is made yet.
///
/// # Safety
/// `name` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn ipc_client_new(name: *const std::os::raw::c_char) -> IpcClientHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        // SAFETY: Null and UTF-8 are checked; the string is valid per the caller contract.
        let Ok(name) = (unsafe { args::channel_name(name) }) else {
            return std::ptr::null_mut();
        };

        match Client::new(name) {
            Ok(client) => Box::into_raw(Box::new(ClientHandle { client })) as IpcClientHandle,
            Err(err) => {
                let _ = error::map_transport_error(&err);
                std::ptr::null_mut()
            }
        }
    })
}

/// Connect to the client's channel.
///
/// Returns a connection handle even when the connect fails; test it with
/// `ipc_connection_is_invalid`. Null only for a null `client`.
///
/// # Safety
/// `client` must be a valid handle returned by `ipc_client_new`.
#[no_mangle]
pub unsafe extern "C" fn ipc_client_connect(client: IpcClientHandle) -> IpcConnectionHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        with_client(client, std::ptr::null_mut(), |client_handle| {
            let connection = match client_handle.client.try_connect() {
                Ok(connection) => connection,
                Err(err) => {
                    let _ = error::map_transport_error(&err);
                    ipclink_transport::Connection::invalid()
                }
            };
            Box::into_raw(Box::new(ConnectionHandle { connection })) as IpcConnectionHandle
        })
    })
}

/// Connect, send `src`, receive one reply into `dst`, disconnect.
///
/// # Safety
/// `client` must be a valid client handle. `dst` must be writable for `dst_size` bytes and
/// `src` readable for `src_size` bytes when the sizes are nonzero. `received` may be null.
#[no_mangle]
pub unsafe extern "C" fn ipc_client_sendrecv(
    client: IpcClientHandle,
    dst: *mut u8,
    dst_size: usize,
    src: *const u8,
    src_size: usize,
    received: *mut usize,
) -> IpcResult {
    crate::ffi_boundary(IpcResult::Internal, || {
        error::clear_error_state();

        args::status(with_client(client, Err(IpcResult::InvalidArgument), |client_handle| {
            // SAFETY: Pointer/size pairings per the caller contract.
            let dst = unsafe { args::receive_buffer(dst, dst_size) }?;
            // SAFETY: As above.
            let src = unsafe { args::message(src, src_size) }?;
            let n = client_handle
                .client
                .sendrecv(dst, src)
                .map_err(args::transport)?;
            // SAFETY: `received` is null or valid per the caller contract.
            unsafe { args::report(received, n) };
            Ok(())
        }))
    })
}

/// Free a client handle.
///
/// # Safety
/// `client` must be null or a handle previously returned by `ipc_client_new`.
#[no_mangle]
pub unsafe extern "C" fn ipc_client_free(client: IpcClientHandle) {
    crate::ffi_boundary((), || {
        if client.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by ipc_client_new.
        unsafe {
            drop(Box::from_raw(client as *mut ClientHandle));
        }
    });
}
