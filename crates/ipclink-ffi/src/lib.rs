//! ipclink-ffi: C-ABI exports for the ipclink server, client and connection.
//!
//! Handles are opaque pointers owned by the caller and released with the
//! matching `*_free` function. Every call clears the thread-local last error
//! first; on failure `ipc_last_error` describes the cause.

mod args;
mod client;
mod connection;
mod error;
mod server;
mod types;

use std::panic::AssertUnwindSafe;

pub use client::{ipc_client_connect, ipc_client_free, ipc_client_new, ipc_client_sendrecv};
pub use connection::{
    ipc_connection_free, ipc_connection_is_invalid, ipc_connection_peek, ipc_connection_recv,
    ipc_connection_send,
};
pub use server::{ipc_server_accept, ipc_server_bind, ipc_server_free};
pub use types::{
    IpcClientHandle, IpcConnectionHandle, IpcResult, IpcServerHandle, IPC_ERR_BIND_FAILED,
    IPC_ERR_CONNECT_FAILED, IPC_ERR_INTERNAL, IPC_ERR_INVALID_ARGUMENT,
    IPC_ERR_INVALID_CONNECTION, IPC_ERR_NOT_BOUND, IPC_ERR_TIMEOUT, IPC_ERR_TRANSPORT,
    IPC_ERR_UNSUPPORTED, IPC_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

#[no_mangle]
pub extern "C" fn ipc_init() -> IpcResult {
    ffi_boundary(IpcResult::Internal, || {
        error::clear_error_state();
        IpcResult::Ok
    })
}

#[no_mangle]
pub extern "C" fn ipc_cleanup() {
    ffi_boundary((), || {
        error::clear_error_state();
    });
}

#[no_mangle]
pub extern "C" fn ipc_last_error() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}
