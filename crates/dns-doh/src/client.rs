//! The HTTP client a query is sent through.

use bytes::Bytes;
use http::{Request, Response};
use std::io::Read;
use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Largest response body read: a DNS message has a 16 bit length
/// everywhere else it is carried.
pub const MAX_BODY_LEN: usize = 65535;

/// The server sent, or announced, a body over `MAX_BODY_LEN` octets.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
#[error("response body is over {MAX_BODY_LEN} octets")]
pub struct BodyTooLarge;

/// Sends one HTTP request and waits for the whole response.
///
/// Implementations own everything below HTTP framing: TLS,
/// connection pooling, redirects, timeouts.
pub trait HttpClient {
    /// # Errors
    ///
    /// If no response could be received.  A response with a non-2xx
    /// status is still a response, and must be returned as `Ok`.
    fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, BoxError>;
}

impl<C: HttpClient + ?Sized> HttpClient for &C {
    fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, BoxError> {
        (**self).execute(request)
    }
}

/// Settings for `ReqwestClient`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ClientConfig {
    /// Limit on the whole request, from connecting to reading the end
    /// of the body.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// `HttpClient` backed by reqwest's blocking client, with rustls for
/// TLS.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// # Errors
    ///
    /// If the TLS backend cannot be initialised.
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, BoxError> {
        let (parts, body) = request.into_parts();

        let mut builder = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers);
        if !body.is_empty() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send()?;
        if response
            .content_length()
            .is_some_and(|len| len > MAX_BODY_LEN as u64)
        {
            return Err(BodyTooLarge.into());
        }

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();

        let mut body = Vec::new();
        response
            .take(MAX_BODY_LEN as u64 + 1)
            .read_to_end(&mut body)?;
        if body.len() > MAX_BODY_LEN {
            return Err(BodyTooLarge.into());
        }

        let mut out = Response::builder().status(status).version(version);
        if let Some(out_headers) = out.headers_mut() {
            *out_headers = headers;
        }
        Ok(out.body(Bytes::from(body))?)
    }
}
