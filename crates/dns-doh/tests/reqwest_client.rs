use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::StatusCode;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use dns_doh::*;
use dns_types::protocol::types::test_util::*;
use dns_types::protocol::types::*;

/// What a one-shot server saw: the request line and headers as sent,
/// and the body.
struct Received {
    head: String,
    body: Vec<u8>,
}

impl Received {
    fn has_header(&self, name: &str, value: &str) -> bool {
        self.head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .any(|(n, v)| n.eq_ignore_ascii_case(name) && v.trim() == value)
    }
}

/// Accept one connection on a local port, read one request, and reply
/// with `response` verbatim.
fn serve_once(response: Vec<u8>) -> (String, JoinHandle<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut head = String::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line.is_empty() || line == "\r\n" {
                break;
            }
            head.push_str(&line);
        }

        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .map_or(0, |(_, value)| value.trim().parse::<usize>().unwrap());
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).unwrap();

        // the client may hang up early on an oversized response
        let _ = stream.write_all(&response);
        let _ = stream.flush();

        Received { head, body }
    });

    (format!("http://{addr}/dns-query"), handle)
}

fn http_response(status_line: &str, headers: &[&str], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {status_line}\r\nconnection: close\r\n");
    for header in headers {
        out.push_str(header);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");

    let mut out = out.into_bytes();
    out.extend_from_slice(body);
    out
}

fn client() -> ReqwestClient {
    ReqwestClient::new(&ClientConfig::default()).unwrap()
}

fn a() -> QueryType {
    QueryType::Record(RecordType::A)
}

#[test]
fn get_sends_headers_and_no_body() {
    let (server, handle) = serve_once(http_response(
        "200 OK",
        &["content-type: application/dns-message", "content-length: 3"],
        b"abc",
    ));
    let query = build_query("example.com", a()).unwrap();

    let response = client()
        .execute(build_request(&server, Method::Get, query).unwrap())
        .unwrap();
    let received = handle.join().unwrap();

    assert!(
        received.head.starts_with(
            "GET /dns-query?dns=AAABAAABAAAAAAAAB2V4YW1wbGUDY29tAAABAAE HTTP/1.1\r\n"
        ),
        "{}",
        received.head
    );
    assert!(received.has_header("content-type", MEDIA_TYPE));
    assert!(received.has_header("accept", MEDIA_TYPE));
    assert!(!received.has_header("transfer-encoding", "chunked"));
    assert!(received.body.is_empty());

    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(&Bytes::from_static(b"abc"), response.body());
}

#[test]
fn post_sends_query_as_body() {
    let reply = a_query("example.com.").make_response().to_octets().unwrap();
    let content_length = format!("content-length: {}", reply.len());
    let (server, handle) = serve_once(http_response(
        "200 OK",
        &["content-type: application/dns-message", content_length.as_str()],
        &reply,
    ));

    let message = query(&client(), &server, "example.com", a(), Method::Post).unwrap();
    let received = handle.join().unwrap();

    assert!(received.head.starts_with("POST /dns-query HTTP/1.1\r\n"));
    assert!(received.has_header("content-type", MEDIA_TYPE));
    assert!(received.has_header("accept", MEDIA_TYPE));
    assert!(received.has_header("content-length", "29"));
    assert_eq!(build_query("example.com", a()).unwrap(), received.body);

    assert!(message.header.is_response);
    assert_eq!(a_query("example.com.").questions, message.questions);
}

#[test]
fn error_status_is_a_response() {
    let (server, handle) = serve_once(http_response(
        "500 Internal Server Error",
        &["content-type: text/plain", "content-length: 4"],
        b"oops",
    ));
    let query = build_query("example.com", a()).unwrap();

    let response = client()
        .execute(build_request(&server, Method::Get, query).unwrap())
        .unwrap();
    handle.join().unwrap();

    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());
    assert_eq!(Some("text/plain"), response.headers()[CONTENT_TYPE].to_str().ok());
    assert_eq!(&Bytes::from_static(b"oops"), response.body());
}

#[test]
fn closed_port_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let server = format!("http://{addr}/dns-query");
    let query = build_query("example.com", a()).unwrap();

    assert!(client()
        .execute(build_request(&server, Method::Get, query).unwrap())
        .is_err());
}

#[test]
fn announced_oversized_body_is_rejected() {
    let body = vec![0; MAX_BODY_LEN + 1];
    let content_length = format!("content-length: {}", body.len());
    let (server, handle) = serve_once(http_response("200 OK", &[content_length.as_str()], &body));
    let query = build_query("example.com", a()).unwrap();

    let err = client()
        .execute(build_request(&server, Method::Get, query).unwrap())
        .unwrap_err();
    handle.join().unwrap();

    assert!(err.downcast_ref::<BodyTooLarge>().is_some(), "{err}");
}

#[test]
fn unannounced_oversized_body_is_rejected() {
    let body = vec![0; MAX_BODY_LEN + 1];
    let (server, handle) = serve_once(http_response("200 OK", &[], &body));

    let err = query(&client(), &server, "example.com", a(), Method::Get).unwrap_err();
    handle.join().unwrap();

    match err {
        Error::Transport(TransportError::Request(err)) => {
            assert!(err.downcast_ref::<BodyTooLarge>().is_some(), "{err}");
        }
        other => panic!("expected request error, got {other:?}"),
    }
}
