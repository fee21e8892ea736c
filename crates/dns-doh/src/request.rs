//! Framing of a DNS query as an HTTP request (RFC 8484 section 4.1).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Request, Uri};
use std::fmt;
use std::str::FromStr;

use crate::error::TransportError;

/// Media type of a DNS message in wire format, used for both the
/// request and the response.
pub const MEDIA_TYPE: &str = "application/dns-message";

/// Name of the query parameter carrying the message in a GET request.
pub const DNS_QUERY_PARAMETER: &str = "dns";

/// How the query is carried.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Method {
    /// base64url-encoded in the `dns` query parameter.  Friendlier to
    /// HTTP caches.
    #[default]
    Get,

    /// As the request body.  Smaller requests.
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

impl FromStr for Method {
    type Err = MethodFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("GET") {
            Ok(Method::Get)
        } else if s.eq_ignore_ascii_case("POST") {
            Ok(Method::Post)
        } else {
            Err(MethodFromStr(s.to_string()))
        }
    }
}

/// Error returned when a string is neither `GET` nor `POST`.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("unknown method '{0}': use GET or POST")]
pub struct MethodFromStr(String);

/// Build the HTTP request for an encoded query.
///
/// Both methods send `Content-Type` and `Accept` headers of
/// `application/dns-message`.  For GET the query goes in the URI,
/// base64url-encoded without padding, and the body is empty.  For
/// POST the query is the body.
///
/// # Errors
///
/// If the server is not an absolute `http` or `https` URL.
pub fn build_request(
    server: &str,
    method: Method,
    query: Bytes,
) -> Result<Request<Bytes>, TransportError> {
    let server_uri = parse_server(server)?;

    let builder = Request::builder()
        .header(CONTENT_TYPE, MEDIA_TYPE)
        .header(ACCEPT, MEDIA_TYPE);

    let request = match method {
        Method::Get => {
            let separator = if server_uri.query().is_some() { '&' } else { '?' };
            let encoded = URL_SAFE_NO_PAD.encode(&query);
            builder
                .method(http::Method::GET)
                .uri(format!(
                    "{server_uri}{separator}{DNS_QUERY_PARAMETER}={encoded}"
                ))
                .body(Bytes::new())
        }
        Method::Post => builder
            .method(http::Method::POST)
            .uri(server_uri)
            .body(query),
    };

    request.map_err(|err| TransportError::InvalidServerUrl {
        url: server.to_string(),
        reason: err.to_string(),
    })
}

fn parse_server(server: &str) -> Result<Uri, TransportError> {
    let invalid = |reason: &str| TransportError::InvalidServerUrl {
        url: server.to_string(),
        reason: reason.to_string(),
    };

    let uri = Uri::from_str(server).map_err(|err| invalid(&err.to_string()))?;

    match uri.scheme_str() {
        Some("https" | "http") => (),
        Some(_) => return Err(invalid("scheme must be http or https")),
        None => return Err(invalid("URL must be absolute")),
    }
    match uri.host() {
        Some(host) if !host.is_empty() => (),
        _ => return Err(invalid("missing host")),
    }

    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_from_str() {
        assert_eq!(Ok(Method::Get), Method::from_str("GET"));
        assert_eq!(Ok(Method::Get), Method::from_str("get"));
        assert_eq!(Ok(Method::Post), Method::from_str("POST"));
        assert_eq!(Ok(Method::Post), Method::from_str("post"));
        assert!(Method::from_str("PUT").is_err());
    }

    #[test]
    fn method_display_roundtrip() {
        for method in [Method::Get, Method::Post] {
            assert_eq!(Ok(method), Method::from_str(&method.to_string()));
        }
    }

    #[test]
    fn get_encodes_query_in_uri() {
        let request = build_request(
            "https://dns.example/dns-query",
            Method::Get,
            Bytes::from_static(&[0xfb, 0xff, 0x00]),
        )
        .unwrap();

        assert_eq!(http::Method::GET, request.method());
        assert_eq!("https://dns.example/dns-query?dns=-_8A", request.uri().to_string());
        assert!(request.body().is_empty());
    }

    #[test]
    fn get_appends_to_existing_query_string() {
        let request = build_request(
            "https://dns.example/dns-query?ct=1",
            Method::Get,
            Bytes::from_static(b"abc"),
        )
        .unwrap();

        assert_eq!(
            "https://dns.example/dns-query?ct=1&dns=YWJj",
            request.uri().to_string()
        );
    }

    #[test]
    fn post_sends_query_as_body() {
        let request = build_request(
            "https://dns.example/dns-query",
            Method::Post,
            Bytes::from_static(b"abc"),
        )
        .unwrap();

        assert_eq!(http::Method::POST, request.method());
        assert_eq!("https://dns.example/dns-query", request.uri().to_string());
        assert_eq!(&Bytes::from_static(b"abc"), request.body());
    }

    #[test]
    fn both_methods_send_media_type_headers() {
        for method in [Method::Get, Method::Post] {
            let request =
                build_request("https://dns.example/dns-query", method, Bytes::new()).unwrap();

            assert_eq!(Some(MEDIA_TYPE), request.headers()[CONTENT_TYPE].to_str().ok());
            assert_eq!(Some(MEDIA_TYPE), request.headers()[ACCEPT].to_str().ok());
        }
    }

    #[test]
    fn rejects_bad_server_urls() {
        for server in [
            "",
            "dns-query",
            "/dns-query",
            "ftp://dns.example/dns-query",
            "https://dns example/",
        ] {
            assert!(
                matches!(
                    build_request(server, Method::Get, Bytes::new()),
                    Err(TransportError::InvalidServerUrl { .. })
                ),
                "accepted {server:?}"
            );
        }
    }
}
