#![warn(clippy::pedantic)]
// Don't care enough to fix
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! A DNS-over-HTTPS (RFC 8484) client.
//!
//! Queries are sent one at a time through an `HttpClient`, and the
//! calling thread blocks until the response has been read and
//! decoded.  Nothing is cached and nothing is retried.

pub mod client;
pub mod error;
pub mod request;

use bytes::Bytes;
use http::header::CONTENT_TYPE;

use dns_types::protocol::types::{DomainName, Message, QueryType, ResourceRecord};

pub use self::client::{
    BodyTooLarge, BoxError, ClientConfig, HttpClient, ReqwestClient, MAX_BODY_LEN,
};
pub use self::error::{DecodeError, EncodeError, Error, TransportError};
pub use self::request::{build_request, Method, MEDIA_TYPE};

/// Encode a recursive query for `hostname` in wire format.
///
/// # Errors
///
/// If `hostname` is not a valid domain name.
pub fn build_query(hostname: &str, qtype: QueryType) -> Result<Bytes, EncodeError> {
    let name = DomainName::from_dotted_string(hostname)?;
    let octets = Message::doh_query(name, qtype).to_octets()?;
    Ok(octets.freeze())
}

/// Send a query to a DoH server and decode the response.
///
/// Any 2xx status counts as success, whatever the RCODE in the
/// response: an NXDOMAIN is an answer, not an error.
///
/// # Errors
///
/// If the query cannot be encoded, the request fails or gets a
/// non-2xx status, or the response body is not a DNS message.
pub fn query<C: HttpClient + ?Sized>(
    client: &C,
    server: &str,
    hostname: &str,
    qtype: QueryType,
    method: Method,
) -> Result<Message, Error> {
    let _span = tracing::error_span!("doh_query", %method, %server, name = %hostname, %qtype)
        .entered();

    let query = build_query(hostname, qtype)?;
    let request = build_request(server, method, query)?;

    tracing::debug!(uri = %request.uri(), "sending request");
    let response = client.execute(request).map_err(TransportError::Request)?;

    let status = response.status();
    tracing::debug!(%status, len = %response.body().len(), "got response");

    if !status.is_success() {
        return Err(TransportError::Status(status).into());
    }

    match response.headers().get(CONTENT_TYPE) {
        Some(content_type) if content_type.as_bytes() == MEDIA_TYPE.as_bytes() => (),
        content_type => tracing::warn!(?content_type, "unexpected content type"),
    }

    let message = Message::from_octets(response.body())?;
    tracing::trace!(
        rcode = %message.header.rcode,
        answers = %message.answers.len(),
        authority = %message.authority.len(),
        additional = %message.additional.len(),
        "decoded response"
    );

    Ok(message)
}

/// Like `query`, but return only the answer section.
///
/// # Errors
///
/// See `query`.
pub fn resolve<C: HttpClient + ?Sized>(
    client: &C,
    server: &str,
    hostname: &str,
    qtype: QueryType,
    method: Method,
) -> Result<Vec<ResourceRecord>, Error> {
    query(client, server, hostname, qtype, method).map(|message| message.answers)
}
