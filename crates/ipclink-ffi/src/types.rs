use std::ffi::c_void;

use ipclink_transport::{Client, Connection, Server};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcResult {
    Ok = 0,
    InvalidArgument = 1,
    InvalidConnection = 2,
    TransportError = 3,
    BindFailed = 4,
    ConnectFailed = 5,
    NotBound = 6,
    Timeout = 7,
    Unsupported = 8,
    Internal = 99,
}

pub const IPC_OK: IpcResult = IpcResult::Ok;
pub const IPC_ERR_INVALID_ARGUMENT: IpcResult = IpcResult::InvalidArgument;
pub const IPC_ERR_INVALID_CONNECTION: IpcResult = IpcResult::InvalidConnection;
pub const IPC_ERR_TRANSPORT: IpcResult = IpcResult::TransportError;
pub const IPC_ERR_BIND_FAILED: IpcResult = IpcResult::BindFailed;
pub const IPC_ERR_CONNECT_FAILED: IpcResult = IpcResult::ConnectFailed;
pub const IPC_ERR_NOT_BOUND: IpcResult = IpcResult::NotBound;
pub const IPC_ERR_TIMEOUT: IpcResult = IpcResult::Timeout;
pub const IPC_ERR_UNSUPPORTED: IpcResult = IpcResult::Unsupported;
pub const IPC_ERR_INTERNAL: IpcResult = IpcResult::Internal;

pub type IpcServerHandle = *mut c_void;
pub type IpcClientHandle = *mut c_void;
pub type IpcConnectionHandle = *mut c_void;

pub(crate) struct ServerHandle {
    pub(crate) server: Server,
}

pub(crate) struct ClientHandle {
    pub(crate) client: Client,
}

pub(crate) struct ConnectionHandle {
    pub(crate) connection: Connection,
}
