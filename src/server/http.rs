//! HTTP binding.
//!
//! Maps each HTTP request on the service path to exactly one engine call.
//! There is no worker loop; the call runs on a blocking task and its
//! response is streamed or buffered depending on the transfer encoding.
//!
//! # Endpoints
//!
//! | Path (default) | Behavior |
//! |----------------|----------|
//! | `/services/Server` | One `process()` call per request |
//! | `/services/Upload` | Stores the body; needs a `Content-Disposition` file name |
//! | `/services/Download` | Streams the payload under the `KEY` query parameter |
//!
//! # Response Modes
//!
//! - **Fixed**: the body is accumulated and sent once at close with a
//!   `Content-Length`.
//! - **Chunked**: set `Transfer-Encoding: chunked` (or enable
//!   [`HttpOptions::chunked_responses`]). Headers commit on the first
//!   write; output then flows through a coalescing writer.

// ============================================================================
// Imports
// ============================================================================

use std::convert::Infallible;
use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::mem;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use regex::Regex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::config::HttpOptions;
use crate::engine::{FileStore, RpcEngine, RpcRequest, RpcResponse};
use crate::error::{Error, Result};
use crate::identifiers::CacheKey;
use crate::relay::{ChunkSink, CoalescingWriter, RelaySlot};

use super::adapters::StreamRequest;
use super::lifecycle::{Lifecycle, stopped};

// ============================================================================
// Constants
// ============================================================================

/// Query parameter naming a cache key.
pub const KEY_PARAM: &str = "KEY";

/// Chunks in flight between a blocking producer and the response body.
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Read size when streaming a stored payload.
const DOWNLOAD_CHUNK: usize = 16 * 1024;

// ============================================================================
// Types
// ============================================================================

type HttpBody = UnsyncBoxBody<Bytes, io::Error>;

type BodyChunk = io::Result<Bytes>;

// ============================================================================
// HttpServer
// ============================================================================

/// HTTP server for the RPC engine and the file store.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use netsocket_rpc::{EchoEngine, HttpOptions, HttpServer, MemoryFileStore};
///
/// let server = HttpServer::new(
///     HttpOptions::default().with_port(0),
///     Arc::new(EchoEngine),
///     Arc::new(MemoryFileStore::new()),
/// )?;
/// let addr = server.start().await?;
/// ```
pub struct HttpServer {
    options: HttpOptions,
    engine: Arc<dyn RpcEngine>,
    store: Arc<dyn FileStore>,
    file_name_pattern: Regex,
    lifecycle: Lifecycle,
}

// ============================================================================
// HttpServer - Constructor
// ============================================================================

impl HttpServer {
    /// Creates a server. Nothing is bound until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for invalid options.
    pub fn new(
        options: HttpOptions,
        engine: Arc<dyn RpcEngine>,
        store: Arc<dyn FileStore>,
    ) -> Result<Arc<Self>> {
        options.validate()?;

        let file_name_pattern = Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#)
            .map_err(|e| Error::config(format!("file name pattern: {e}")))?;

        Ok(Arc::new(Self {
            options,
            engine,
            store,
            file_name_pattern,
            lifecycle: Lifecycle::new(),
        }))
    }
}

// ============================================================================
// HttpServer - Public API
// ============================================================================

impl HttpServer {
    /// Returns the options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &HttpOptions {
        &self.options
    }

    /// Returns the bound address once started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.local_addr()
    }

    /// Binds the listener and starts serving.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if already started or stopped
    /// - [`Error::Io`] if binding fails
    pub async fn start(self: &Arc<Self>) -> Result<SocketAddr> {
        self.lifecycle.ensure_startable()?;

        let listener =
            TcpListener::bind((self.options.interface.as_str(), self.options.port)).await?;
        let addr = listener.local_addr()?;
        self.lifecycle.started(addr);

        let server = Arc::clone(self);
        let stop_rx = self.lifecycle.subscribe();
        tokio::spawn(async move {
            server.accept_loop(listener, stop_rx).await;
        });

        info!(%addr, "HTTP server started");
        Ok(addr)
    }

    /// Stops accepting and gracefully closes open connections. Idempotent.
    pub fn stop(&self) {
        if self.lifecycle.stop() {
            info!("HTTP server stopped");
        }
    }

    /// Resolves once [`stop`](Self::stop) was called.
    pub async fn wait(&self) {
        self.lifecycle.wait().await;
    }
}

// ============================================================================
// HttpServer - Connections
// ============================================================================

impl HttpServer {
    async fn accept_loop(self: Arc<Self>, listener: TcpListener, mut stop_rx: watch::Receiver<bool>) {
        debug!("HTTP accept loop started");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let server = Arc::clone(&self);
                            let stop_rx = self.lifecycle.subscribe();
                            tokio::spawn(async move {
                                if let Err(e) = server.serve_connection(stream, stop_rx).await {
                                    debug!(%addr, error = %e, "HTTP connection failed");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Accept failed");
                        }
                    }
                }

                () = stopped(&mut stop_rx) => {
                    break;
                }
            }
        }

        debug!("HTTP accept loop terminated");
    }

    async fn serve_connection(
        self: Arc<Self>,
        stream: TcpStream,
        mut stop_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);

        let service = service_fn(move |request| {
            let server = Arc::clone(&self);
            async move { Ok::<_, Infallible>(server.route(request).await) }
        });

        let connection = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(connection);

        tokio::select! {
            result = connection.as_mut() => result?,
            () = stopped(&mut stop_rx) => {
                connection.as_mut().graceful_shutdown();
                connection.await?;
            }
        }
        Ok(())
    }

    async fn route(self: Arc<Self>, request: Request<Incoming>) -> Response<HttpBody> {
        let path = request.uri().path();
        debug!(method = %request.method(), path, "HTTP request");

        if path == self.options.service_path {
            self.serve_rpc(request).await
        } else if path == self.options.upload_path {
            self.serve_upload(request).await
        } else if path == self.options.download_path {
            self.serve_download(request).await
        } else {
            status_only(StatusCode::NOT_FOUND)
        }
    }
}

// ============================================================================
// HttpServer - Service Endpoint
// ============================================================================

impl HttpServer {
    async fn serve_rpc(&self, request: Request<Incoming>) -> Response<HttpBody> {
        match self.call_engine(request).await {
            Ok(head) => head.into_response(),
            Err(e) => {
                error!(error = %e, "Engine call produced no response");
                status_only(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    async fn call_engine(&self, request: Request<Incoming>) -> Result<ResponseHead> {
        let slot = Arc::new(RelaySlot::new());
        tokio::spawn(pump_body(request.into_body(), Arc::clone(&slot)));

        let (head_tx, head_rx) = oneshot::channel();
        let engine = Arc::clone(&self.engine);
        let chunked = self.options.chunked_responses;

        tokio::task::spawn_blocking(move || {
            let mut request = StreamRequest::new(slot);
            let mut response = HttpResponse::new(head_tx, chunked);

            let result = engine.process(&mut request, &mut response);
            request.close();

            match result {
                Ok(()) => {
                    if let Err(e) = response.close() {
                        debug!(error = %e, "Response not delivered");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Engine call failed");
                    response.fail();
                }
            }
        });

        Ok(head_rx.await?)
    }
}

/// Feeds a request body into a relay slot, then finishes it.
async fn pump_body(mut body: Incoming, slot: Arc<RelaySlot>) {
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Ok(data) = frame.into_data() {
                    slot.append(&data);
                }
            }
            Err(e) => {
                warn!(error = %e, "Request body failed");
                break;
            }
        }
    }
    slot.finish();
}

// ============================================================================
// HttpServer - Upload / Download Endpoints
// ============================================================================

impl HttpServer {
    async fn serve_upload(&self, request: Request<Incoming>) -> Response<HttpBody> {
        let Some(file_name) = self.file_name(request.headers()) else {
            return text(StatusCode::BAD_REQUEST, "missing file name");
        };
        let key = query_param(request.uri(), KEY_PARAM).map(CacheKey::from);

        let body = match request.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(error = %e, "Upload body failed");
                return status_only(StatusCode::BAD_REQUEST);
            }
        };

        let store = Arc::clone(&self.store);
        let length = body.len();
        let stored =
            tokio::task::spawn_blocking(move || store.put(key, Some(&file_name), &mut &body[..]))
                .await;

        match stored {
            Ok(Ok(key)) => {
                info!(key = %key, bytes = length, "HTTP upload stored");
                text(StatusCode::OK, key.into_string())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "HTTP upload failed");
                status_only(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Err(e) => {
                error!(error = %e, "HTTP upload task failed");
                status_only(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    async fn serve_download(&self, request: Request<Incoming>) -> Response<HttpBody> {
        let Some(key) = query_param(request.uri(), KEY_PARAM).map(CacheKey::from) else {
            return text(StatusCode::BAD_REQUEST, "missing KEY");
        };
        let Some(file) = self.store.get(&key) else {
            debug!(key = %key, "HTTP download of unknown key");
            return status_only(StatusCode::NOT_FOUND);
        };

        let name = file.file_name().unwrap_or(key.as_str()).to_string();
        let opened = tokio::task::spawn_blocking(move || {
            let length = file.length()?;
            let reader = file.open()?;
            Ok::<_, io::Error>((length, reader))
        })
        .await;

        let (length, reader) = match opened {
            Ok(Ok(opened)) => opened,
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Stored payload unreadable");
                return status_only(StatusCode::INTERNAL_SERVER_ERROR);
            }
            Err(e) => {
                error!(error = %e, "HTTP download task failed");
                return status_only(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        tokio::task::spawn_blocking(move || stream_payload(reader, &tx));

        debug!(key = %key, bytes = length, "HTTP download started");
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime_for(&name))
            .header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            )
            .header(header::CONTENT_LENGTH, length.to_string())
            .body(channel_body(rx));

        match response {
            Ok(response) => response,
            Err(e) => {
                warn!(key = %key, error = %e, "Download headers rejected");
                status_only(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// File name from the `Content-Disposition` header.
    fn file_name(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(header::CONTENT_DISPOSITION)?.to_str().ok()?;
        let name = self.file_name_pattern.captures(value)?.get(1)?.as_str().trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

/// Copies a payload into a body channel.
fn stream_payload(mut reader: Box<dyn Read + Send>, tx: &mpsc::Sender<BodyChunk>) {
    let mut buf = vec![0u8; DOWNLOAD_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    debug!("Download abandoned by client");
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(error = %e, "Payload read failed");
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer")
            .field("options", &self.options)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

// ============================================================================
// HttpResponse
// ============================================================================

/// Status, headers and body handed from the engine thread to hyper.
struct ResponseHead {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: HttpBody,
}

impl ResponseHead {
    fn into_response(self) -> Response<HttpBody> {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        match builder.body(self.body) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Engine set an invalid header");
                status_only(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// Chunk sink feeding a streamed response body.
struct BodyChannel(mpsc::Sender<BodyChunk>);

impl ChunkSink for BodyChannel {
    fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.0
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "client went away"))
    }
}

enum Output {
    Buffered(Vec<u8>),
    Streaming(CoalescingWriter<BodyChannel>),
}

/// Engine response for one HTTP request. Lives on a blocking thread.
struct HttpResponse {
    /// Taken when the headers commit.
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    headers: Vec<(String, String)>,
    chunked: bool,
    output: Output,
    closed: bool,
}

impl HttpResponse {
    fn new(head_tx: oneshot::Sender<ResponseHead>, chunked: bool) -> Self {
        Self {
            head_tx: Some(head_tx),
            headers: Vec::new(),
            chunked,
            output: Output::Buffered(Vec::new()),
            closed: false,
        }
    }

    fn commit(&mut self, status: StatusCode, body: HttpBody) -> io::Result<()> {
        let Some(head_tx) = self.head_tx.take() else {
            return Ok(());
        };
        let head = ResponseHead {
            status,
            headers: mem::take(&mut self.headers),
            body,
        };
        head_tx
            .send(head)
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "request abandoned"))
    }

    /// Commits the headers and switches to a streamed body.
    fn start_streaming(&mut self) -> io::Result<()> {
        let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        self.commit(StatusCode::OK, channel_body(rx))?;

        let mut writer = CoalescingWriter::new(BodyChannel(tx));
        if let Output::Buffered(pending) = mem::replace(&mut self.output, Output::Buffered(Vec::new())) {
            writer.write_all(&pending)?;
        }
        self.output = Output::Streaming(writer);
        Ok(())
    }

    /// Ends a failed call: 500 if nothing was sent, otherwise an aborted body.
    fn fail(&mut self) {
        self.closed = true;
        match mem::replace(&mut self.output, Output::Buffered(Vec::new())) {
            Output::Buffered(_) => {
                self.headers.clear();
                let _ = self.commit(StatusCode::INTERNAL_SERVER_ERROR, empty_body());
            }
            Output::Streaming(mut writer) => {
                writer.take_buffer();
                let _ = writer
                    .sink_mut()
                    .0
                    .blocking_send(Err(io::Error::other("engine call failed")));
            }
        }
    }
}

impl Write for HttpResponse {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "response closed"));
        }
        if self.chunked && matches!(self.output, Output::Buffered(_)) {
            self.start_streaming()?;
        }
        match &mut self.output {
            Output::Buffered(body) => {
                body.extend_from_slice(buf);
                Ok(buf.len())
            }
            Output::Streaming(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.output {
            Output::Buffered(_) => Ok(()),
            Output::Streaming(writer) => writer.flush(),
        }
    }
}

impl RpcResponse for HttpResponse {
    fn output_stream(&mut self) -> &mut dyn Write {
        self
    }

    fn set_property(&mut self, name: &str, value: &str) {
        if self.head_tx.is_none() {
            debug!(name, "Property set after headers were sent");
            return;
        }
        if name.eq_ignore_ascii_case("transfer-encoding") {
            if value.to_ascii_lowercase().contains("chunked") {
                self.chunked = true;
            }
            return;
        }
        if name.eq_ignore_ascii_case("content-length") {
            return;
        }
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match mem::replace(&mut self.output, Output::Buffered(Vec::new())) {
            Output::Buffered(body) => {
                let body = Full::new(Bytes::from(body))
                    .map_err(|never| match never {})
                    .boxed_unsync();
                self.commit(StatusCode::OK, body)
            }
            Output::Streaming(mut writer) => writer.flush(),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn empty_body() -> HttpBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed_unsync()
}

fn channel_body(rx: mpsc::Receiver<BodyChunk>) -> HttpBody {
    let frames = stream::unfold(rx, |mut rx| async move {
        let chunk = rx.recv().await?;
        Some((chunk.map(Frame::data), rx))
    });
    StreamBody::new(frames).boxed_unsync()
}

fn status_only(status: StatusCode) -> Response<HttpBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = status;
    response
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<HttpBody> {
    let body = Full::new(body.into())
        .map_err(|never| match never {})
        .boxed_unsync();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// First value of a query parameter.
fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Content type guessed from a file extension.
fn mime_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "html" | "htm" => "text/html",
        "txt" | "log" => "text/plain",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::runtime::Runtime;

    use crate::engine::{EchoEngine, MemoryFileStore};

    fn collect(rt: &Runtime, body: HttpBody) -> Vec<u8> {
        rt.block_on(body.collect()).expect("body").to_bytes().to_vec()
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("report.PDF"), "application/pdf");
        assert_eq!(mime_for("a.tar.gz"), "application/gzip");
        assert_eq!(mime_for("noext"), "application/octet-stream");
        assert_eq!(mime_for("page.html"), "text/html");
    }

    #[test]
    fn test_query_param() {
        let uri: Uri = "/services/Download?x=1&KEY=abc%20d".parse().expect("uri");
        assert_eq!(query_param(&uri, "KEY").as_deref(), Some("abc d"));
        assert_eq!(query_param(&uri, "missing"), None);

        let bare: Uri = "/services/Download".parse().expect("uri");
        assert_eq!(query_param(&bare, "KEY"), None);
    }

    #[test]
    fn test_file_name_from_content_disposition() {
        let server = HttpServer::new(
            HttpOptions::default(),
            Arc::new(EchoEngine),
            Arc::new(MemoryFileStore::new()),
        )
        .expect("server");

        let mut headers = HeaderMap::new();
        assert_eq!(server.file_name(&headers), None);

        headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"data.bin\""),
        );
        assert_eq!(server.file_name(&headers).as_deref(), Some("data.bin"));

        headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("form-data; name=file; FILENAME=plain.txt"),
        );
        assert_eq!(server.file_name(&headers).as_deref(), Some("plain.txt"));
    }

    #[test]
    fn test_buffered_response_commits_at_close() {
        let rt = Runtime::new().expect("runtime");
        let (head_tx, mut head_rx) = oneshot::channel();
        let mut response = HttpResponse::new(head_tx, false);

        response.set_property("Content-Type", "text/plain");
        response.set_property("Content-Length", "999");
        response.output_stream().write_all(b"hello ").expect("write");
        response.output_stream().write_all(b"world").expect("write");
        assert!(head_rx.try_recv().is_err());

        response.close().expect("close");
        let head = head_rx.try_recv().expect("committed");
        assert_eq!(head.status, StatusCode::OK);
        assert_eq!(
            head.headers,
            vec![("Content-Type".to_string(), "text/plain".to_string())]
        );
        assert_eq!(collect(&rt, head.body), b"hello world");
    }

    #[test]
    fn test_chunked_response_commits_on_first_write() {
        let rt = Runtime::new().expect("runtime");
        let (head_tx, mut head_rx) = oneshot::channel();
        let mut response = HttpResponse::new(head_tx, false);

        response.set_property("Transfer-Encoding", "chunked");
        response.output_stream().write_all(b"part one, ").expect("write");
        let head = head_rx.try_recv().expect("committed");
        assert!(head.headers.is_empty());

        // Headers are fixed now.
        response.set_property("X-Late", "ignored");
        response.output_stream().write_all(b"part two").expect("write");
        response.close().expect("close");
        drop(response);

        assert_eq!(collect(&rt, head.body), b"part one, part two");
    }

    #[test]
    fn test_failure_before_commit_is_500() {
        let (head_tx, mut head_rx) = oneshot::channel();
        let mut response = HttpResponse::new(head_tx, false);
        response.set_property("Content-Type", "text/plain");
        response.output_stream().write_all(b"partial").expect("write");

        response.fail();
        let head = head_rx.try_recv().expect("committed");
        assert_eq!(head.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(head.headers.is_empty());
        assert!(response.output_stream().write_all(b"more").is_err());
    }
}
