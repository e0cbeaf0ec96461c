//! Message-mode duplex named-pipe backend (Windows).
//!
//! The listener creates exactly one pipe instance at bind time and keeps it
//! for its whole life, so the name stays reserved to this server. `accept`
//! arms that instance with `ConnectNamedPipe` and lends it to the returned
//! connection; dropping the connection flushes and disconnects the instance
//! so the next `accept` can arm it again. One client is served at a time.

use std::io;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use windows_sys::Win32::Foundation::{
    GetLastError, ERROR_BROKEN_PIPE, ERROR_FILE_NOT_FOUND, ERROR_MORE_DATA, ERROR_NO_DATA,
    ERROR_PIPE_BUSY, ERROR_PIPE_CONNECTED, ERROR_PIPE_NOT_CONNECTED, GENERIC_READ, GENERIC_WRITE, HANDLE,
    INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FlushFileBuffers, ReadFile, WriteFile, FILE_FLAG_FIRST_PIPE_INSTANCE,
    OPEN_EXISTING, PIPE_ACCESS_DUPLEX,
};
use windows_sys::Win32::System::Pipes::{
    CallNamedPipeW, ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, PeekNamedPipe,
    SetNamedPipeHandleState, WaitNamedPipeW, NMPWAIT_USE_DEFAULT_WAIT, PIPE_READMODE_MESSAGE, PIPE_TYPE_MESSAGE,
    PIPE_WAIT,
};

use super::{ConnectionHandle, Connector, Listener};
use crate::config::{ServerConfig, DEFAULT_TRANSACT_TIMEOUT};
use crate::error::{Result, TransportError};

/// Sleep between polls while `peek` waits for a message.
const PEEK_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// How long a client keeps retrying while the instance is busy between accepts.
const BUSY_WAIT: Duration = Duration::from_secs(2);

pub(crate) struct NamedPipe;

/// A pipe instance. Server-side handles share the listener's instance.
pub(crate) struct PipeHandle {
    instance: Arc<OwnedHandle>,
    server_side: bool,
}

pub(crate) struct PipeListener {
    endpoint: PathBuf,
    instance: Arc<OwnedHandle>,
}

fn wide(path: &Path) -> Vec<u16> {
    path.as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

fn raw(handle: &OwnedHandle) -> HANDLE {
    handle.as_raw_handle() as HANDLE
}

fn clamp_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Peer went away: reported as an orderly close.
fn is_disconnect(code: u32) -> bool {
    matches!(
        code,
        ERROR_BROKEN_PIPE | ERROR_PIPE_NOT_CONNECTED | ERROR_NO_DATA
    )
}

fn create_instance(name: &[u16], buffer_size: u32) -> io::Result<OwnedHandle> {
    // SAFETY: `name` is a NUL-terminated UTF-16 string that outlives the call.
    let handle = unsafe {
        CreateNamedPipeW(
            name.as_ptr(),
            PIPE_ACCESS_DUPLEX | FILE_FLAG_FIRST_PIPE_INSTANCE,
            PIPE_TYPE_MESSAGE | PIPE_READMODE_MESSAGE | PIPE_WAIT,
            1,
            buffer_size,
            buffer_size,
            NMPWAIT_USE_DEFAULT_WAIT,
            std::ptr::null(),
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `handle` is a fresh pipe handle owned by nobody else.
    Ok(unsafe { OwnedHandle::from_raw_handle(handle as _) })
}

impl ConnectionHandle for PipeHandle {
    fn send(&self, src: &[u8]) -> io::Result<usize> {
        let mut written = 0u32;
        // SAFETY: `src` is valid for reads of the given length; the handle is open.
        let ok = unsafe {
            WriteFile(
                raw(&self.instance),
                src.as_ptr(),
                clamp_len(src.len()),
                &mut written,
                std::ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(written as usize)
    }

    fn recv(&self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Err(super::empty_buffer());
        }
        let mut read = 0u32;
        // SAFETY: `dst` is valid for writes of the given length; the handle is open.
        let ok = unsafe {
            ReadFile(
                raw(&self.instance),
                dst.as_mut_ptr(),
                clamp_len(dst.len()),
                &mut read,
                std::ptr::null_mut(),
            )
        };
        if ok != 0 {
            return Ok(read as usize);
        }

        // SAFETY: reads thread-local error state only.
        let code = unsafe { GetLastError() };
        if code == ERROR_MORE_DATA {
            debug!(
                buffer_len = dst.len(),
                "partial message read; remainder left in pipe"
            );
            Ok(read as usize)
        } else if is_disconnect(code) {
            Ok(0)
        } else {
            Err(io::Error::from_raw_os_error(code as i32))
        }
    }

    fn peek(&self, dst: &mut [u8]) -> io::Result<(usize, usize)> {
        loop {
            let mut read = 0u32;
            let mut available = 0u32;
            let mut left_in_message = 0u32;
            // SAFETY: `dst` and the count pointers are valid for writes; the handle is open.
            let ok = unsafe {
                PeekNamedPipe(
                    raw(&self.instance),
                    dst.as_mut_ptr().cast(),
                    clamp_len(dst.len()),
                    &mut read,
                    &mut available,
                    &mut left_in_message,
                )
            };
            if ok == 0 {
                // SAFETY: reads thread-local error state only.
                let code = unsafe { GetLastError() };
                if is_disconnect(code) {
                    return Ok((0, 0));
                }
                return Err(io::Error::from_raw_os_error(code as i32));
            }

            // PeekNamedPipe never blocks; wait for a message like recv would.
            if available > 0 || read > 0 {
                return Ok((read as usize, available as usize));
            }
            std::thread::sleep(PEEK_POLL_INTERVAL);
        }
    }
}

impl Drop for PipeHandle {
    fn drop(&mut self) {
        if self.server_side {
            // Let the client drain pending replies, then return the instance
            // to the listening state for the next accept.
            // SAFETY: the handle is a server-side pipe instance kept open by the Arc.
            unsafe {
                FlushFileBuffers(raw(&self.instance));
                DisconnectNamedPipe(raw(&self.instance));
            }
            debug!("disconnected pipe instance");
        }
    }
}

impl Listener for PipeListener {
    type Handle = PipeHandle;

    fn bind(endpoint: &Path, config: &ServerConfig) -> Result<Self> {
        let instance = create_instance(&wide(endpoint), config.pipe_buffer_size).map_err(
            |source| TransportError::Bind {
                endpoint: endpoint.to_path_buf(),
                source,
            },
        )?;
        info!(pipe = ?endpoint, "listening on named pipe");
        Ok(Self {
            endpoint: endpoint.to_path_buf(),
            instance: Arc::new(instance),
        })
    }

    fn accept(&mut self) -> io::Result<PipeHandle> {
        if Arc::strong_count(&self.instance) > 1 {
            return Err(io::Error::other(
                "previous connection on this pipe instance is still open",
            ));
        }

        loop {
            // SAFETY: the instance is a disconnected server-side pipe; no OVERLAPPED.
            let ok = unsafe { ConnectNamedPipe(raw(&self.instance), std::ptr::null_mut()) };
            if ok != 0 {
                break;
            }

            // SAFETY: reads thread-local error state only.
            match unsafe { GetLastError() } {
                // A client that opened the pipe before this call is still a connection.
                ERROR_PIPE_CONNECTED => break,
                // A client came and went before the call; reset and wait again.
                ERROR_NO_DATA => {
                    // SAFETY: the instance is owned by this listener.
                    unsafe { DisconnectNamedPipe(raw(&self.instance)) };
                }
                code => return Err(io::Error::from_raw_os_error(code as i32)),
            }
        }

        debug!(pipe = ?self.endpoint, "accepted connection");
        Ok(PipeHandle {
            instance: Arc::clone(&self.instance),
            server_side: true,
        })
    }
}

/// Open the client end, waiting while the single instance is between accepts.
fn open_client(name: &[u16]) -> io::Result<OwnedHandle> {
    let deadline = Instant::now() + BUSY_WAIT;
    loop {
        // SAFETY: `name` is a NUL-terminated UTF-16 string that outlives the call.
        let handle = unsafe {
            CreateFileW(
                name.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                std::ptr::null(),
                OPEN_EXISTING,
                0,
                std::ptr::null_mut(),
            )
        };
        if handle != INVALID_HANDLE_VALUE {
            // SAFETY: `handle` is a fresh client handle owned by nobody else.
            return Ok(unsafe { OwnedHandle::from_raw_handle(handle as _) });
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(ERROR_PIPE_BUSY as i32) || Instant::now() >= deadline {
            return Err(err);
        }
        // SAFETY: `name` is NUL-terminated; failure just means we retry or time out.
        unsafe { WaitNamedPipeW(name.as_ptr(), 50) };
    }
}

impl Connector for NamedPipe {
    type Handle = PipeHandle;

    const NAME: &'static str = "named-pipe";

    fn connect(endpoint: &Path) -> io::Result<PipeHandle> {
        let handle = open_client(&wide(endpoint))?;

        // Client handles open in byte read mode; switch to message reads.
        let mode = PIPE_READMODE_MESSAGE;
        // SAFETY: `mode` is valid for reads; the other parameters may be null.
        let ok = unsafe {
            SetNamedPipeHandleState(
                raw(&handle),
                &mode,
                std::ptr::null(),
                std::ptr::null(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }

        debug!(pipe = ?endpoint, "connected to named pipe");
        Ok(PipeHandle {
            instance: Arc::new(handle),
            server_side: false,
        })
    }

    fn transact(
        endpoint: &Path,
        dst: &mut [u8],
        src: &[u8],
        timeout: Option<Duration>,
    ) -> Result<usize> {
        let name = wide(endpoint);
        let timeout_ms = timeout
            .unwrap_or(DEFAULT_TRANSACT_TIMEOUT)
            .as_millis()
            .min(u128::from(u32::MAX - 1)) as u32;
        let mut read = 0u32;

        // SAFETY: buffers are valid for the given lengths; `name` is NUL-terminated.
        let ok = unsafe {
            CallNamedPipeW(
                name.as_ptr(),
                src.as_ptr().cast(),
                clamp_len(src.len()),
                dst.as_mut_ptr().cast(),
                clamp_len(dst.len()),
                &mut read,
                timeout_ms,
            )
        };
        if ok != 0 {
            return Ok(read as usize);
        }

        // SAFETY: reads thread-local error state only.
        let code = unsafe { GetLastError() };
        match code {
            ERROR_MORE_DATA => Ok(read as usize),
            ERROR_FILE_NOT_FOUND => Err(TransportError::Connect {
                endpoint: endpoint.to_path_buf(),
                source: io::Error::from_raw_os_error(code as i32),
            }),
            _ => Err(TransportError::Io(io::Error::from_raw_os_error(code as i32))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_endpoint(tag: &str) -> PathBuf {
        PathBuf::from(format!(
            r"\\.\pipe\ipcl-pipe-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ))
    }

    #[test]
    fn name_stays_reserved_between_accepts() {
        let endpoint = unique_endpoint("rearm");
        let mut listener =
            PipeListener::bind(&endpoint, &ServerConfig::default()).expect("bind should succeed");

        for round in 0u8..3 {
            let client_endpoint = endpoint.clone();
            let client = std::thread::spawn(move || {
                let conn = NamedPipe::connect(&client_endpoint).expect("connect should succeed");
                conn.send(&[round]).expect("client send should succeed");
                let mut buf = [0u8; 1];
                assert_eq!(conn.recv(&mut buf).expect("client recv should succeed"), 1);
                buf[0]
            });

            let conn = listener.accept().expect("accept should succeed");
            let mut buf = [0u8; 1];
            assert_eq!(conn.recv(&mut buf).expect("server recv should succeed"), 1);
            conn.send(&[buf[0] + 10]).expect("server send should succeed");
            assert_eq!(client.join().expect("client thread should finish"), round + 10);
            drop(conn);

            // No gap: a second server still cannot claim the name.
            assert!(matches!(
                PipeListener::bind(&endpoint, &ServerConfig::default()),
                Err(TransportError::Bind { .. })
            ));
        }
    }

    #[test]
    fn accept_refuses_while_connection_is_open() {
        let endpoint = unique_endpoint("busy");
        let mut listener =
            PipeListener::bind(&endpoint, &ServerConfig::default()).expect("bind should succeed");

        let client_endpoint = endpoint.clone();
        let client = std::thread::spawn(move || NamedPipe::connect(&client_endpoint));
        let conn = listener.accept().expect("accept should succeed");
        let _client_conn = client
            .join()
            .expect("client thread should finish")
            .expect("connect should succeed");

        assert!(listener.accept().is_err());
        drop(conn);
    }

    #[test]
    fn dropped_listener_frees_the_name() {
        let endpoint = unique_endpoint("free");
        let first = PipeListener::bind(&endpoint, &ServerConfig::default()).expect("first bind");
        drop(first);
        let second = PipeListener::bind(&endpoint, &ServerConfig::default());
        assert!(second.is_ok());
    }

    #[test]
    fn recv_rejects_empty_buffer() {
        let endpoint = unique_endpoint("empty");
        let mut listener =
            PipeListener::bind(&endpoint, &ServerConfig::default()).expect("bind should succeed");

        let client_endpoint = endpoint.clone();
        let client = std::thread::spawn(move || {
            let conn = NamedPipe::connect(&client_endpoint).expect("connect should succeed");
            conn.send(b"payload").expect("client send should succeed");
            let mut buf = [0u8; 1];
            let _ = conn.recv(&mut buf);
        });

        let conn = listener.accept().expect("accept should succeed");
        let err = conn.recv(&mut []).expect_err("empty buffer should be rejected");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let mut buf = [0u8; 16];
        assert_eq!(conn.recv(&mut buf).expect("recv should succeed"), 7);
        conn.send(b"k").expect("server send should succeed");
        client.join().expect("client thread should finish");
    }
}
