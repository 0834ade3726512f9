// ABOUTME: Request execution and response classification.
// ABOUTME: Sends requests through a pooled HTTP/1.1 client over the client's transport.

use super::Client;
use super::error::{ClientError, Result};
use super::transport::{Connector, Transport};
use bytes::Bytes;
use http_body_util::{BodyExt, Either, Empty, Full};
use hyper::body::{Body, Incoming};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::client::legacy;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

pub(crate) type RequestBody = Either<Full<Bytes>, Empty<Bytes>>;

/// Pooled HTTP/1.1 client. Idle connections are kept and reused between calls.
pub(crate) type HttpClient = legacy::Client<Connector, RequestBody>;

pub(crate) fn http_client(transport: Arc<Transport>) -> HttpClient {
    legacy::Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .build(Connector::new(transport))
}

/// Open body of a successful response.
///
/// Dropping it releases the underlying connection, whether or not it was read.
pub struct ResponseBody {
    status: StatusCode,
    body: Incoming,
}

impl ResponseBody {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Next chunk of data, or `None` once the body is exhausted.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        while let Some(frame) = self.body.frame().await {
            let frame = frame.map_err(body_error)?;
            if let Ok(data) = frame.into_data() {
                return Ok(Some(data));
            }
        }
        Ok(None)
    }

    /// Drain the rest of the body into memory.
    pub async fn bytes(self) -> Result<Bytes> {
        let collected = self.body.collect().await.map_err(body_error)?;
        Ok(collected.to_bytes())
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

fn body_error(e: hyper::Error) -> ClientError {
    ClientError::ConnectionFailed(format!("failed to read response body: {e}"))
}

impl Client {
    /// Execute a request and hand back the open response body.
    ///
    /// `path` is appended to the client's base address. Caller headers are
    /// added after `Content-Type: application/json`.
    pub async fn stream_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<ResponseBody> {
        let body = match body {
            Some(bytes) => Either::Left(Full::new(bytes)),
            None => Either::Right(Empty::new()),
        };

        let url = format!("{}{}", self.transport.base_url(), path);
        let uri: Uri = url
            .parse()
            .map_err(|e| ClientError::InvalidRequest(format!("invalid URL {url:?}: {e}")))?;
        let request = build_request(method, &uri, body, headers)?;

        tracing::debug!("{} {}", request.method(), uri);
        let response = self
            .send(request)
            .await
            .map_err(|e| classify_network_error(&e, self.tls_configured()))?;

        let status = response.status();
        tracing::debug!("{} -> {}", uri, status);

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }
        if status.is_client_error() || status.is_server_error() {
            // Dropping the unread body releases the connection.
            drop(response);
            return Err(ClientError::RequestFailed { status });
        }

        Ok(ResponseBody {
            status,
            body: response.into_body(),
        })
    }

    /// Execute a request and buffer the whole response body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<Bytes> {
        self.stream_request(method, path, body, headers)
            .await?
            .bytes()
            .await
    }

    async fn send(
        &self,
        request: Request<RequestBody>,
    ) -> std::result::Result<Response<Incoming>, legacy::Error> {
        self.http.request(request).await
    }
}

fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

fn build_request(
    method: Method,
    uri: &Uri,
    body: RequestBody,
    headers: Option<&HashMap<String, String>>,
) -> Result<Request<RequestBody>> {
    let authority = uri
        .authority()
        .map(|a| a.as_str())
        .ok_or_else(|| ClientError::InvalidRequest(format!("URL {uri} has no host")))?;

    // hyper writes no length for an empty body, so body-bearing verbs get an
    // explicit zero length instead of an unset body.
    let explicit_empty = carries_body(&method) && body.size_hint().exact() == Some(0);

    let mut builder = Request::builder()
        .method(method)
        .uri(uri.clone())
        .header(HOST, authority)
        .header(CONTENT_TYPE, "application/json");
    if explicit_empty {
        builder = builder.header(CONTENT_LENGTH, "0");
    }

    if let Some(headers) = headers {
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    builder
        .body(body)
        .map_err(|e| ClientError::InvalidRequest(e.to_string()))
}

/// Map a network-level failure onto the error taxonomy.
///
/// Without TLS, a failure that is not a plain refusal is reported as a likely
/// TLS mismatch. This is a best-effort guess based on the error text.
fn classify_network_error(error: &(dyn StdError + 'static), tls_configured: bool) -> ClientError {
    classify_message(error_chain(error), tls_configured)
}

fn classify_message(message: String, tls_configured: bool) -> ClientError {
    let refused = message.to_ascii_lowercase().contains("connection refused");
    if !refused && !tls_configured {
        tracing::warn!(
            "connection failed without TLS configured, registry may require TLS: {}",
            message
        );
        ClientError::LikelyTlsMismatch(message)
    } else {
        ClientError::ConnectionFailed(message)
    }
}

fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
