#![cfg(any(target_os = "linux", target_os = "android"))]

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use ipclink_transport::{Client, ClientConfig, Server, ServerConfig, TransportError};

const CLIENT_MESSAGE: &[u8] = b"Hello server\0";
const SERVER_MESSAGE: &[u8] = b"Hi client\0";
const BUF_SIZE: usize = 20;

fn unique_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/ipcl-it-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn bind(dir: &Path) -> Server {
    Server::bind_with_config("IpcTest", ServerConfig::default().with_socket_dir(dir))
        .expect("server should bind")
}

fn client(dir: &Path) -> Client {
    Client::with_config("IpcTest", ClientConfig::default().with_socket_dir(dir))
        .expect("client should build")
}

/// Server side of scenarios A and B: receive the greeting, reply.
fn serve_one(mut server: Server) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut conn = server.accept().expect("server should accept");
        assert!(!conn.is_invalid());

        let mut buf = [0u8; BUF_SIZE];
        let received = conn.recv(&mut buf).expect("server recv should succeed");
        assert_eq!(received, CLIENT_MESSAGE.len());
        assert_eq!(&buf[..received], CLIENT_MESSAGE);

        let sent = conn.send(SERVER_MESSAGE).expect("server send should succeed");
        assert_eq!(sent, SERVER_MESSAGE.len());
    })
}

#[test]
fn connect_send_recv_round_trip() {
    let dir = unique_dir("connect");
    let server = serve_one(bind(&dir));

    let mut conn = client(&dir).connect();
    assert!(!conn.is_invalid(), "connect should produce a live connection");

    let sent = conn.send(CLIENT_MESSAGE).expect("client send should succeed");
    assert_eq!(sent, 13);

    let mut buf = [0u8; BUF_SIZE];
    let received = conn.recv(&mut buf).expect("client recv should succeed");
    assert_eq!(received, 10);
    assert_eq!(&buf[..received], SERVER_MESSAGE);

    server.join().expect("server thread should finish");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn sendrecv_composes_the_exchange() {
    let dir = unique_dir("sendrecv");
    let server = serve_one(bind(&dir));

    let mut buf = [0u8; BUF_SIZE];
    let received = client(&dir)
        .sendrecv(&mut buf, CLIENT_MESSAGE)
        .expect("sendrecv should succeed");
    assert_eq!(received, 10);
    assert_eq!(&buf[..received], SERVER_MESSAGE);

    server.join().expect("server thread should finish");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn connect_without_server_is_invalid_every_time() {
    let dir = unique_dir("noserver");
    let client = client(&dir);

    let first = client.connect();
    let second = client.connect();
    assert!(first.is_invalid());
    assert!(second.is_invalid());

    let mut buf = [0u8; BUF_SIZE];
    assert!(matches!(
        client.sendrecv(&mut buf, CLIENT_MESSAGE),
        Err(TransportError::Connect { .. })
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn peek_does_not_consume() {
    let dir = unique_dir("peek");
    let mut server = bind(&dir);

    let client_thread = {
        let client = client(&dir);
        thread::spawn(move || {
            let mut conn = client.connect();
            conn.send(CLIENT_MESSAGE).expect("client send should succeed");
            let mut buf = [0u8; BUF_SIZE];
            // Wait for the server to finish before closing.
            let _ = conn.recv(&mut buf);
        })
    };

    let mut conn = server.accept().expect("server should accept");
    let mut buf = [0u8; BUF_SIZE];

    let first = conn.peek(&mut buf).expect("peek should succeed");
    assert_eq!(first.received, CLIENT_MESSAGE.len());
    assert_eq!(&buf[..first.received], CLIENT_MESSAGE);

    let mut small = [0u8; 5];
    let second = conn.peek(&mut small).expect("second peek should succeed");
    assert_eq!(second.received, 5);
    assert_eq!(&small, &CLIENT_MESSAGE[..5]);
    assert_eq!(second.available, first.available);

    let mut recv_buf = [0u8; BUF_SIZE];
    let received = conn.recv(&mut recv_buf).expect("recv should succeed");
    assert_eq!(received, CLIENT_MESSAGE.len());
    assert_eq!(&recv_buf[..first.received], &buf[..first.received]);

    conn.send(SERVER_MESSAGE).expect("server send should succeed");
    client_thread.join().expect("client thread should finish");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn recv_after_peer_close_is_end_of_stream() {
    let dir = unique_dir("eof");
    let mut server = bind(&dir);

    let client = client(&dir);
    let client_thread = thread::spawn(move || {
        let conn = client.connect();
        assert!(!conn.is_invalid());
        drop(conn);
    });

    let mut conn = server.accept().expect("server should accept");
    client_thread.join().expect("client thread should finish");

    let mut buf = [0u8; BUF_SIZE];
    assert_eq!(conn.recv(&mut buf).expect("recv should succeed"), 0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn server_accepts_sequential_peers() {
    let dir = unique_dir("sequential");
    let mut server = bind(&dir);

    let client = client(&dir);
    let client_thread = thread::spawn(move || {
        for round in 0u8..3 {
            let mut buf = [0u8; 1];
            let received = client
                .sendrecv(&mut buf, &[round])
                .expect("sendrecv should succeed");
            assert_eq!(received, 1);
            assert_eq!(buf[0], round + 100);
        }
    });

    for _ in 0..3 {
        let mut conn = server.accept().expect("server should accept");
        let mut buf = [0u8; 1];
        assert_eq!(conn.recv(&mut buf).unwrap(), 1);
        conn.send(&[buf[0] + 100]).unwrap();
    }

    client_thread.join().expect("client thread should finish");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn messages_are_not_coalesced() {
    let dir = unique_dir("boundaries");
    let mut server = bind(&dir);

    let client = client(&dir);
    let client_thread = thread::spawn(move || {
        let mut conn = client.connect();
        conn.send(b"first").unwrap();
        conn.send(b"second").unwrap();
        conn.send(b"third").unwrap();
    });

    let mut conn = server.accept().expect("server should accept");
    client_thread.join().expect("client thread should finish");

    let mut buf = [0u8; 64];
    for expected in [&b"first"[..], b"second", b"third"] {
        let n = conn.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], expected);
    }
    assert_eq!(conn.recv(&mut buf).unwrap(), 0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn closed_connection_rejects_further_io() {
    let dir = unique_dir("closed");
    let mut server = bind(&dir);

    let client = client(&dir);
    let client_thread = thread::spawn(move || client.connect());

    let mut conn = server.accept().expect("server should accept");
    let _peer = client_thread.join().expect("client thread should finish");

    let mut moved = conn.take();
    assert!(conn.is_invalid());
    assert!(matches!(
        conn.send(b"x"),
        Err(TransportError::InvalidConnection)
    ));

    assert!(!moved.is_invalid());
    moved.close();
    assert!(moved.is_invalid());
    assert!(matches!(
        moved.send(b"x"),
        Err(TransportError::InvalidConnection)
    ));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn dropped_server_frees_the_name() {
    let dir = unique_dir("collide");
    let first = bind(&dir);
    let endpoint = first.endpoint().expect("bound endpoint").to_path_buf();
    drop(first);
    assert!(!endpoint.exists(), "drop should remove the socket file");

    let second = bind(&dir);
    assert!(second.is_bound());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn sendrecv_honours_configured_timeout() {
    let dir = unique_dir("timeout");
    let mut server = bind(&dir);

    let client = Client::with_config(
        "IpcTest",
        ClientConfig::default()
            .with_socket_dir(&dir)
            .with_transact_timeout(Some(Duration::from_millis(100))),
    )
    .unwrap();

    let server_thread = thread::spawn(move || {
        // Accept and read, but never reply.
        let mut conn = server.accept().expect("server should accept");
        let mut buf = [0u8; BUF_SIZE];
        let _ = conn.recv(&mut buf);
        thread::sleep(Duration::from_millis(500));
    });

    let mut buf = [0u8; BUF_SIZE];
    let err = client
        .sendrecv(&mut buf, CLIENT_MESSAGE)
        .expect_err("sendrecv should time out");
    assert_eq!(
        err.io_source().map(std::io::Error::kind),
        Some(std::io::ErrorKind::TimedOut)
    );

    server_thread.join().expect("server thread should finish");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn binding_a_live_name_fails() {
    let dir = unique_dir("live");
    let mut first = bind(&dir);

    let err = Server::bind_with_config("IpcTest", ServerConfig::default().with_socket_dir(&dir))
        .expect_err("second bind should fail while the first server listens");
    assert!(matches!(err, TransportError::Bind { .. }));
    assert_eq!(
        err.io_source().map(std::io::Error::kind),
        Some(std::io::ErrorKind::AddrInUse)
    );
    assert!(dir.join("IpcTest").exists());

    let client = client(&dir);
    let client_thread = thread::spawn(move || {
        let mut buf = [0u8; BUF_SIZE];
        let n = client
            .sendrecv(&mut buf, CLIENT_MESSAGE)
            .expect("first server should still answer");
        buf[..n].to_vec()
    });

    // The refused bind's liveness check arrives as a connection that closes at once.
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let mut conn = first.accept().expect("server should accept");
        let n = conn.recv(&mut buf).expect("server recv should succeed");
        if n == 0 {
            continue;
        }
        assert_eq!(&buf[..n], CLIENT_MESSAGE);
        conn.send(SERVER_MESSAGE).expect("server send should succeed");
        break;
    }

    assert_eq!(client_thread.join().expect("client thread should finish"), SERVER_MESSAGE);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn empty_receive_buffer_keeps_the_message() {
    let dir = unique_dir("emptybuf");
    let mut server = bind(&dir);

    let client = client(&dir);
    let client_thread = thread::spawn(move || {
        let mut conn = client.connect();
        conn.send(CLIENT_MESSAGE).expect("client send should succeed");
        let mut buf = [0u8; BUF_SIZE];
        let _ = conn.recv(&mut buf);
    });

    let mut conn = server.accept().expect("server should accept");
    let err = conn.recv(&mut []).expect_err("empty buffer should be rejected");
    assert_eq!(
        err.io_source().map(std::io::Error::kind),
        Some(std::io::ErrorKind::InvalidInput)
    );
    assert!(!conn.is_invalid());

    let mut buf = [0u8; BUF_SIZE];
    let received = conn.recv(&mut buf).expect("recv should succeed");
    assert_eq!(&buf[..received], CLIENT_MESSAGE);

    conn.send(SERVER_MESSAGE).expect("server send should succeed");
    client_thread.join().expect("client thread should finish");
    let _ = std::fs::remove_dir_all(&dir);
}
