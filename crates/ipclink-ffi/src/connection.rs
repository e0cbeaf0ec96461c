use crate::args;
use crate::error;
use crate::types::{ConnectionHandle, IpcConnectionHandle, IpcResult};

fn with_connection_mut<T>(
    handle: IpcConnectionHandle,
    on_error: T,
    f: impl FnOnce(&mut ConnectionHandle) -> T,
) -> T {
    if handle.is_null() {
        let _ = error::set_invalid_argument("connection handle cannot be null");
        return on_error;
    }

    let connection_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &mut *(handle as *mut ConnectionHandle) }
    };

    f(connection_handle)
}

/// Send `len` bytes from `src` as one message.
///
/// # Safety
/// `conn` must be a valid connection handle. If `len > 0`, `src` must be readable for `len`
/// bytes. `sent` may be null.
#[no_mangle]
pub unsafe extern "C" fn ipc_connection_send(
    conn: IpcConnectionHandle,
    src: *const u8,
    len: usize,
    sent: *mut usize,
) -> IpcResult {
    crate::ffi_boundary(IpcResult::Internal, || {
        error::clear_error_state();

        args::status(with_connection_mut(conn, Err(IpcResult::InvalidArgument), |handle| {
            // SAFETY: Pointer/length pairing per the caller contract.
            let src = unsafe { args::message(src, len) }?;
            let n = handle.connection.send(src).map_err(args::transport)?;
            // SAFETY: `sent` is null or valid per the caller contract.
            unsafe { args::report(sent, n) };
            Ok(())
        }))
    })
}

/// Receive one message into `dst`. A received count of 0 means the peer closed.
///
/// # Safety
/// `conn` must be a valid connection handle. If `cap > 0`, `dst` must be writable for `cap`
/// bytes. `received` may be null.
#[no_mangle]
pub unsafe extern "C" fn ipc_connection_recv(
    conn: IpcConnectionHandle,
    dst: *mut u8,
    cap: usize,
    received: *mut usize,
) -> IpcResult {
    crate::ffi_boundary(IpcResult::Internal, || {
        error::clear_error_state();

        args::status(with_connection_mut(conn, Err(IpcResult::InvalidArgument), |handle| {
            // SAFETY: Pointer/capacity pairing per the caller contract.
            let dst = unsafe { args::receive_buffer(dst, cap) }?;
            let n = handle.connection.recv(dst).map_err(args::transport)?;
            // SAFETY: `received` is null or valid per the caller contract.
            unsafe { args::report(received, n) };
            Ok(())
        }))
    })
}

/// Copy pending data into `dst` without consuming it.
///
/// # Safety
/// `conn` must be a valid connection handle. If `cap > 0`, `dst` must be writable for `cap`
/// bytes. `received` and `available` may be null.
#[no_mangle]
pub unsafe extern "C" fn ipc_connection_peek(
    conn: IpcConnectionHandle,
    dst: *mut u8,
    cap: usize,
    received: *mut usize,
    available: *mut usize,
) -> IpcResult {
    crate::ffi_boundary(IpcResult::Internal, || {
        error::clear_error_state();

        args::status(with_connection_mut(conn, Err(IpcResult::InvalidArgument), |handle| {
            // SAFETY: Pointer/capacity pairing per the caller contract.
            let dst = unsafe { args::receive_buffer(dst, cap) }?;
            let peek = handle.connection.peek(dst).map_err(args::transport)?;
            // SAFETY: Out-pointers are null or valid per the caller contract.
            unsafe {
                args::report(received, peek.received);
                args::report(available, peek.available);
            }
            Ok(())
        }))
    })
}

/// `true` when `conn` is null or holds no live OS handle.
///
/// # Safety
/// `conn` must be null or a valid connection handle.
#[no_mangle]
pub unsafe extern "C" fn ipc_connection_is_invalid(conn: IpcConnectionHandle) -> bool {
    crate::ffi_boundary(true, || {
        if conn.is_null() {
            return true;
        }
        // SAFETY: Pointer validity is guaranteed by the caller.
        let handle = unsafe { &*(conn as *const ConnectionHandle) };
        handle.connection.is_invalid()
    })
}

/// Free a connection handle, closing the connection.
///
/// # Safety
/// `conn` must be null or a handle returned by `ipc_server_accept` or `ipc_client_connect`.
#[no_mangle]
pub unsafe extern "C" fn ipc_connection_free(conn: IpcConnectionHandle) {
    crate::ffi_boundary((), || {
        if conn.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by this library.
        unsafe {
            drop(Box::from_raw(conn as *mut ConnectionHandle));
        }
    });
}
