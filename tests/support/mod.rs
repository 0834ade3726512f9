// ABOUTME: Test support utilities.
// ABOUTME: In-process registry stand-ins speaking canned HTTP/1.1 over TCP and unix sockets.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, UnixListener};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("reglist=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A request as seen by the test server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    #[allow(dead_code)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

type Route = Arc<dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync>;

/// Running test registry.
pub struct TestRegistry {
    pub address: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    connections: Arc<AtomicUsize>,
}

impl TestRegistry {
    #[allow(dead_code)]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of connections accepted so far.
    #[allow(dead_code)]
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Canned registry: a catalog, tags for `a`, an erroring and a garbled repository.
#[allow(dead_code)]
pub fn registry_routes(request: &RecordedRequest) -> (u16, String) {
    match request.path.as_str() {
        "/v2/_catalog" => (200, r#"{"repositories":["a","b"]}"#.to_string()),
        "/v2/a/tags/list" => (200, r#"{"name":"a","tags":["1.0","2.0"]}"#.to_string()),
        "/v2/b/tags/list" => (200, r#"{"name":"b","tags":["latest"]}"#.to_string()),
        "/v2/broken/tags/list" => (500, r#"{"errors":[{"code":"UNKNOWN"}]}"#.to_string()),
        "/v2/locked/tags/list" => (401, r#"{"errors":[{"code":"UNAUTHORIZED"}]}"#.to_string()),
        "/v2/garbled/tags/list" => (200, "<html>not json</html>".to_string()),
        "/v2/" => (200, "{}".to_string()),
        _ => (404, r#"{"errors":[{"code":"NAME_UNKNOWN"}]}"#.to_string()),
    }
}

/// Serve `route` on an ephemeral localhost TCP port.
#[allow(dead_code)]
pub async fn spawn_tcp<F>(route: F) -> TestRegistry
where
    F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let route: Route = Arc::new(route);

    let connections = Arc::new(AtomicUsize::new(0));

    let recorded = requests.clone();
    let accepted = connections.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(handle_connection(stream, route.clone(), recorded.clone()));
        }
    });

    TestRegistry {
        address,
        requests,
        connections,
    }
}

/// Serve `route` on a unix socket at `socket_path`.
#[allow(dead_code)]
pub async fn spawn_unix<F>(socket_path: &Path, route: F) -> TestRegistry
where
    F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
{
    let listener = UnixListener::bind(socket_path).unwrap();
    let address = format!("unix://{}", socket_path.display());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let route: Route = Arc::new(route);

    let connections = Arc::new(AtomicUsize::new(0));

    let recorded = requests.clone();
    let accepted = connections.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(handle_connection(stream, route.clone(), recorded.clone()));
        }
    });

    TestRegistry {
        address,
        requests,
        connections,
    }
}

/// Serve requests on one connection until the client closes it.
async fn handle_connection<S>(
    mut stream: S,
    route: Route,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(request) = read_request(&mut stream).await {
        let close = request
            .header("connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"));
        let (status, body) = route(&request);
        requests.lock().unwrap().push(request);

        let response = format!(
            concat!(
                "HTTP/1.1 {} {}\r\n",
                "Content-Type: application/json\r\n",
                "Content-Length: {}\r\n\r\n{}"
            ),
            status,
            reason(status),
            body.len(),
            body
        );
        if stream.write_all(response.as_bytes()).await.is_err() || close {
            break;
        }
    }
    let _ = stream.shutdown().await;
}

/// Read one request head and its body (by Content-Length).
pub async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
