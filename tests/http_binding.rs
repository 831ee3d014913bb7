//! HTTP binding tests over raw HTTP/1.1.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use netsocket_rpc::{
    CacheKey, EchoEngine, FileHandle, FileStore, HttpOptions, HttpServer, MemoryFileStore,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// ============================================================================
// Helpers
// ============================================================================

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

async fn start(options: HttpOptions) -> (Arc<HttpServer>, SocketAddr, Arc<MemoryFileStore>) {
    let store = Arc::new(MemoryFileStore::new());
    let server = HttpServer::new(
        options.with_interface("127.0.0.1").with_port(0),
        Arc::new(EchoEngine),
        Arc::clone(&store) as Arc<dyn FileStore>,
    )
    .expect("server");
    let addr = server.start().await.expect("start");
    (server, addr, store)
}

/// Sends one request with `Connection: close` and reads the whole reply.
async fn send(addr: SocketAddr, head: &str, body: &[u8]) -> Reply {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let request = format!(
        "{head}\r\nHost: localhost\r\nConnection: close\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.expect("head");
    stream.write_all(body).await.expect("body");

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.expect("reply");
    parse(&raw)
}

fn parse(raw: &[u8]) -> Reply {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("header terminator");
    let head = std::str::from_utf8(&raw[..split]).expect("utf8 head");
    let mut lines = head.split("\r\n");

    let status = lines
        .next()
        .and_then(|line| line.split(' ').nth(1))
        .and_then(|code| code.parse().ok())
        .expect("status line");
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    Reply {
        status,
        headers,
        body: raw[split + 4..].to_vec(),
    }
}

// ============================================================================
// Service Endpoint
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_service_call_buffered() {
    let (server, addr, _) = start(HttpOptions::default()).await;

    let reply = send(addr, "POST /services/Server HTTP/1.1", b"hello\n").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-length"), Some("6"));
    assert_eq!(reply.header("content-type"), Some("text/plain"));
    assert_eq!(reply.body, b"hello\n");

    server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_service_call_chunked() {
    let (server, addr, _) = start(HttpOptions::default().with_chunked_responses()).await;

    let reply = send(addr, "POST /services/Server HTTP/1.1", b"streamed\n").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("transfer-encoding"), Some("chunked"));
    assert!(reply.header("content-length").is_none());

    let body = String::from_utf8_lossy(&reply.body);
    assert!(body.contains("streamed\n"));
    assert!(body.ends_with("0\r\n\r\n"));

    server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_path_not_found() {
    let (server, addr, _) = start(HttpOptions::default()).await;

    let reply = send(addr, "GET /index.html HTTP/1.1", b"").await;
    assert_eq!(reply.status, 404);

    server.stop();
}

// ============================================================================
// Upload / Download Endpoints
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_requires_file_name() {
    let (server, addr, store) = start(HttpOptions::default()).await;

    let reply = send(addr, "POST /services/Upload HTTP/1.1", b"payload").await;
    assert_eq!(reply.status, 400);
    assert!(store.is_empty());

    server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_then_download() {
    let (server, addr, store) = start(HttpOptions::default()).await;

    let reply = send(
        addr,
        "POST /services/Upload?KEY=report-1 HTTP/1.1\r\n\
         Content-Disposition: attachment; filename=\"report.txt\"",
        b"quarterly numbers",
    )
    .await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, b"report-1");

    let stored = store.get(&CacheKey::new("report-1")).expect("stored");
    assert_eq!(stored.file_name(), Some("report.txt"));

    let reply = send(addr, "GET /services/Download?KEY=report-1 HTTP/1.1", b"").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-type"), Some("text/plain"));
    assert_eq!(reply.header("content-length"), Some("17"));
    assert_eq!(
        reply.header("content-disposition"),
        Some("attachment; filename=\"report.txt\"")
    );
    assert_eq!(reply.body, b"quarterly numbers");

    server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_generates_key() -> anyhow::Result<()> {
    let (server, addr, store) = start(HttpOptions::default()).await;

    let reply = send(
        addr,
        "POST /services/Upload HTTP/1.1\r\nContent-Disposition: form-data; filename=a.bin",
        &[1, 2, 3],
    )
    .await;
    assert_eq!(reply.status, 200);

    let key = CacheKey::new(String::from_utf8(reply.body)?);
    assert!(!key.as_str().is_empty());

    let stored = store.get(&key).context("generated key not stored")?;
    assert_eq!(stored.length()?, 3);

    server.stop();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_download_errors() {
    let (server, addr, _) = start(HttpOptions::default()).await;

    let missing = send(addr, "GET /services/Download HTTP/1.1", b"").await;
    assert_eq!(missing.status, 400);

    let unknown = send(addr, "GET /services/Download?KEY=nope HTTP/1.1", b"").await;
    assert_eq!(unknown.status, 404);

    server.stop();
}
