//! `AF_UNIX` / `SOCK_SEQPACKET` backend (Linux, Android).
//!
//! Sequenced-packet sockets keep message boundaries at the socket API level,
//! so one `send` is exactly one `recv` on the other side and no framing code
//! is needed. Endpoints are filesystem paths.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ConnectionHandle, Connector, Listener};
use crate::config::ServerConfig;
use crate::error::{Result, TransportError};

/// `sockaddr_un.sun_path` is 108 bytes on Linux, including the NUL.
const MAX_PATH_LEN: usize = 108;

pub(crate) struct Seqpacket;

pub(crate) struct SeqpacketHandle {
    fd: OwnedFd,
}

pub(crate) struct SeqpacketListener {
    fd: OwnedFd,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

fn cvt(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

fn cvt_len(rc: libc::ssize_t) -> io::Result<usize> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

fn retry_interrupted<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match f() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn new_socket() -> io::Result<OwnedFd> {
    // SAFETY: socket(2) with constant arguments has no memory-safety preconditions.
    let fd = cvt(unsafe {
        libc::socket(
            libc::AF_UNIX,
            libc::SOCK_SEQPACKET | libc::SOCK_CLOEXEC,
            0,
        )
    })?;
    // SAFETY: `fd` was just returned by socket(2) and nothing else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn socket_addr(path: &Path) -> io::Result<(libc::sockaddr_un, libc::socklen_t)> {
    let bytes = path.as_os_str().as_bytes();
    // SAFETY: sockaddr_un is plain old data and all-zero is a valid value.
    let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
    if bytes.len() >= addr.sun_path.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "socket path does not fit in sockaddr_un",
        ));
    }

    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
    for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }

    let len = std::mem::size_of::<libc::sa_family_t>() + bytes.len() + 1;
    Ok((addr, len as libc::socklen_t))
}

fn timeval(timeout: Option<Duration>) -> io::Result<libc::timeval> {
    match timeout {
        Some(d) if d.is_zero() => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "cannot set a zero duration timeout",
        )),
        Some(d) => Ok(libc::timeval {
            tv_sec: d.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_usec: d.subsec_micros() as libc::suseconds_t,
        }),
        None => Ok(libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        }),
    }
}

/// Dial `path` without blocking. A socket file whose listener is gone refuses
/// the connection; a live listener accepts it or reports a full backlog.
fn has_live_listener(path: &Path) -> io::Result<bool> {
    let (addr, addr_len) = socket_addr(path)?;
    // SAFETY: socket(2) with constant arguments has no memory-safety preconditions.
    let fd = cvt(unsafe {
        libc::socket(
            libc::AF_UNIX,
            libc::SOCK_SEQPACKET | libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
            0,
        )
    })?;
    // SAFETY: `fd` was just returned by socket(2) and nothing else owns it.
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    let rc = retry_interrupted(|| {
        // SAFETY: `addr` is an initialized sockaddr_un and `addr_len` covers its used prefix.
        cvt(unsafe {
            libc::connect(
                fd.as_raw_fd(),
                (&addr as *const libc::sockaddr_un).cast::<libc::sockaddr>(),
                addr_len,
            )
        })
    });

    match rc {
        Ok(_) => Ok(true),
        Err(err) => match err.raw_os_error() {
            // Full backlog, or a live listener of another socket type.
            Some(libc::EAGAIN) | Some(libc::EINPROGRESS) | Some(libc::EPROTOTYPE) => Ok(true),
            Some(libc::ECONNREFUSED) => Ok(false),
            _ => Err(err),
        },
    }
}

/// Remove a socket left behind by a previous process, but never remove a
/// path that is not a socket.
fn remove_stale_socket(path: &Path) -> Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(TransportError::Bind {
                endpoint: path.to_path_buf(),
                source,
            })
        }
    };

    if !metadata.file_type().is_socket() {
        return Err(TransportError::Bind {
            endpoint: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "existing path is not a unix socket",
            ),
        });
    }

    if has_live_listener(path).map_err(|source| TransportError::Bind {
        endpoint: path.to_path_buf(),
        source,
    })? {
        return Err(TransportError::Bind {
            endpoint: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AddrInUse,
                "another server is listening on this socket",
            ),
        });
    }

    debug!(?path, "removing stale socket");
    std::fs::remove_file(path).map_err(|source| TransportError::Bind {
        endpoint: path.to_path_buf(),
        source,
    })
}

impl ConnectionHandle for SeqpacketHandle {
    fn send(&self, src: &[u8]) -> io::Result<usize> {
        retry_interrupted(|| {
            // SAFETY: `src` is valid for reads of `src.len()` bytes; the fd is open.
            cvt_len(unsafe {
                libc::send(
                    self.fd.as_raw_fd(),
                    src.as_ptr().cast::<libc::c_void>(),
                    src.len(),
                    libc::MSG_NOSIGNAL,
                )
            })
        })
    }

    fn recv(&self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Err(super::empty_buffer());
        }
        // MSG_TRUNC makes the kernel report the full packet length.
        let len = retry_interrupted(|| recv_raw(self.fd.as_raw_fd(), dst, libc::MSG_TRUNC))?;
        if len > dst.len() {
            warn!(
                message_len = len,
                buffer_len = dst.len(),
                "message truncated to receive buffer"
            );
        }
        Ok(len.min(dst.len()))
    }

    fn peek(&self, dst: &mut [u8]) -> io::Result<(usize, usize)> {
        let fd = self.fd.as_raw_fd();
        let len = retry_interrupted(|| recv_raw(fd, dst, libc::MSG_PEEK | libc::MSG_TRUNC))?;

        let mut queued: libc::c_int = 0;
        // SAFETY: FIONREAD writes a single c_int through the provided pointer.
        let available = match cvt(unsafe { libc::ioctl(fd, libc::FIONREAD, &mut queued) }) {
            Ok(_) if queued >= 0 => queued as usize,
            _ => len,
        };

        Ok((len.min(dst.len()), available))
    }

    fn set_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        let tv = timeval(timeout)?;
        for option in [libc::SO_RCVTIMEO, libc::SO_SNDTIMEO] {
            // SAFETY: `tv` is a valid timeval for the duration of the call.
            cvt(unsafe {
                libc::setsockopt(
                    self.fd.as_raw_fd(),
                    libc::SOL_SOCKET,
                    option,
                    (&tv as *const libc::timeval).cast::<libc::c_void>(),
                    std::mem::size_of::<libc::timeval>() as libc::socklen_t,
                )
            })?;
        }
        Ok(())
    }

    fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
        // and the fd is an open Unix socket descriptor owned by this handle.
        let rc = unsafe {
            libc::getsockopt(
                self.fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some((cred.uid, cred.gid, cred.pid as u32))
        } else {
            None
        }
    }
}

fn recv_raw(fd: RawFd, dst: &mut [u8], flags: libc::c_int) -> io::Result<usize> {
    // SAFETY: `dst` is valid for writes of `dst.len()` bytes; with MSG_TRUNC the
    // kernel still copies at most `dst.len()` bytes and only reports the full length.
    cvt_len(unsafe {
        libc::recv(
            fd,
            dst.as_mut_ptr().cast::<libc::c_void>(),
            dst.len(),
            flags,
        )
    })
}

impl Listener for SeqpacketListener {
    type Handle = SeqpacketHandle;

    fn bind(endpoint: &Path, config: &ServerConfig) -> Result<Self> {
        let path = endpoint.to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: MAX_PATH_LEN,
            });
        }

        remove_stale_socket(&path)?;

        let bind_err = |source: io::Error| TransportError::Bind {
            endpoint: endpoint.to_path_buf(),
            source,
        };

        let fd = new_socket().map_err(bind_err)?;
        let (addr, addr_len) = socket_addr(&path).map_err(bind_err)?;
        // SAFETY: `addr` is an initialized sockaddr_un and `addr_len` covers its used prefix.
        cvt(unsafe {
            libc::bind(
                fd.as_raw_fd(),
                (&addr as *const libc::sockaddr_un).cast::<libc::sockaddr>(),
                addr_len,
            )
        })
        .map_err(bind_err)?;

        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;
        // From here on, Drop removes the socket file if a later step fails.
        let listener = Self {
            fd,
            path,
            created_inode: Some((created.dev(), created.ino())),
        };

        std::fs::set_permissions(
            &listener.path,
            std::fs::Permissions::from_mode(config.socket_mode),
        )
        .map_err(bind_err)?;

        // SAFETY: listen(2) on an owned, bound socket descriptor.
        cvt(unsafe { libc::listen(listener.fd.as_raw_fd(), config.backlog) }).map_err(bind_err)?;

        info!(path = ?listener.path, backlog = config.backlog, "listening on seqpacket socket");
        Ok(listener)
    }

    fn accept(&mut self) -> io::Result<SeqpacketHandle> {
        let listen_fd = self.fd.as_raw_fd();
        let fd = retry_interrupted(|| {
            // SAFETY: null address pointers are permitted by accept4(2).
            cvt(unsafe {
                libc::accept4(
                    listen_fd,
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                    libc::SOCK_CLOEXEC,
                )
            })
        })?;
        debug!(path = ?self.path, "accepted connection");
        Ok(SeqpacketHandle {
            // SAFETY: `fd` was just returned by accept4(2) and nothing else owns it.
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }
}

impl Drop for SeqpacketListener {
    fn drop(&mut self) {
        if let Some((expected_dev, expected_ino)) = self.created_inode {
            if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == expected_dev
                    && metadata.ino() == expected_ino
                {
                    debug!(path = ?self.path, "cleaning up socket file");
                    let _ = std::fs::remove_file(&self.path);
                } else {
                    debug!(
                        path = ?self.path,
                        "socket path identity changed; skipping cleanup"
                    );
                }
            }
        }
    }
}

impl Connector for Seqpacket {
    type Handle = SeqpacketHandle;

    const NAME: &'static str = "unix-seqpacket";

    fn connect(endpoint: &Path) -> io::Result<SeqpacketHandle> {
        let (addr, addr_len) = socket_addr(endpoint)?;
        let fd = new_socket()?;
        // SAFETY: `addr` is an initialized sockaddr_un and `addr_len` covers its used prefix.
        cvt(unsafe {
            libc::connect(
                fd.as_raw_fd(),
                (&addr as *const libc::sockaddr_un).cast::<libc::sockaddr>(),
                addr_len,
            )
        })?;
        debug!(path = ?endpoint, "connected to seqpacket socket");
        Ok(SeqpacketHandle { fd })
    }
}
