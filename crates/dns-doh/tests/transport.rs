use bytes::Bytes;
use http::{Request, Response, StatusCode};
use std::cell::RefCell;
use std::net::Ipv4Addr;

use dns_doh::*;
use dns_types::protocol::rdata::last_record;
use dns_types::protocol::types::test_util::*;
use dns_types::protocol::types::*;

const SERVER: &str = "https://dns.example/dns-query";

/// Replies to every request with the same canned response, and
/// remembers what it was asked.
struct FakeClient {
    status: StatusCode,
    body: Bytes,
    requests: RefCell<Vec<Request<Bytes>>>,
}

impl FakeClient {
    fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn answering(message: &Message) -> Self {
        Self::new(StatusCode::OK, message.to_octets().unwrap().freeze())
    }

    fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl HttpClient for FakeClient {
    fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, BoxError> {
        self.requests.borrow_mut().push(request);
        Ok(Response::builder()
            .status(self.status)
            .header(http::header::CONTENT_TYPE, MEDIA_TYPE)
            .body(self.body.clone())?)
    }
}

/// Fails every request, like a client which cannot connect.
struct UnreachableClient;

impl HttpClient for UnreachableClient {
    fn execute(&self, _: Request<Bytes>) -> Result<Response<Bytes>, BoxError> {
        Err("connection refused".into())
    }
}

fn a() -> QueryType {
    QueryType::Record(RecordType::A)
}

fn answer(answers: Vec<ResourceRecord>) -> Message {
    let mut response = a_query("example.com.").make_response();
    response.answers = answers;
    response
}

#[test]
fn get_request_carries_query_in_uri() {
    let client = FakeClient::answering(&answer(Vec::new()));

    query(&client, SERVER, "example.com", a(), Method::Get).unwrap();

    let requests = client.requests.borrow();
    assert_eq!(1, requests.len());
    assert_eq!(http::Method::GET, requests[0].method());
    assert_eq!(
        "https://dns.example/dns-query?dns=AAABAAABAAAAAAAAB2V4YW1wbGUDY29tAAABAAE",
        requests[0].uri().to_string()
    );
    assert!(requests[0].body().is_empty());
}

#[test]
fn get_request_for_aaaa() {
    let client = FakeClient::answering(&answer(Vec::new()));

    query(
        &client,
        SERVER,
        "example.com",
        QueryType::Record(RecordType::AAAA),
        Method::Get,
    )
    .unwrap();

    assert_eq!(
        "https://dns.example/dns-query?dns=AAABAAABAAAAAAAAB2V4YW1wbGUDY29tAAAcAAE",
        client.requests.borrow()[0].uri().to_string()
    );
}

#[test]
fn post_request_carries_query_in_body() {
    let client = FakeClient::answering(&answer(Vec::new()));

    query(&client, SERVER, "example.com", a(), Method::Post).unwrap();

    let requests = client.requests.borrow();
    assert_eq!(http::Method::POST, requests[0].method());
    assert_eq!(SERVER, requests[0].uri().to_string());
    assert_eq!(&build_query("example.com", a()).unwrap(), requests[0].body());
    assert_eq!(29, requests[0].body().len());
}

#[test]
fn trailing_dot_makes_no_difference() {
    assert_eq!(
        build_query("example.com", a()).unwrap(),
        build_query("example.com.", a()).unwrap()
    );
}

#[test]
fn name_error_is_an_answer() {
    let mut response = answer(Vec::new());
    response.header.rcode = Rcode::NameError;
    let client = FakeClient::answering(&response);

    let message = query(&client, SERVER, "example.com", a(), Method::Get).unwrap();

    assert_eq!(Rcode::NameError, message.header.rcode);
    assert!(message.answers.is_empty());
}

#[test]
fn non_success_status_is_not_decoded() {
    let client = FakeClient::new(StatusCode::INTERNAL_SERVER_ERROR, "not a dns message");

    match query(&client, SERVER, "example.com", a(), Method::Get) {
        Err(Error::Transport(TransportError::Status(status))) => {
            assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status);
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[test]
fn any_success_status_is_accepted() {
    let body = answer(Vec::new()).to_octets().unwrap().freeze();
    let client = FakeClient::new(StatusCode::NON_AUTHORITATIVE_INFORMATION, body);

    assert!(query(&client, SERVER, "example.com", a(), Method::Get).is_ok());
}

#[test]
fn network_failure_is_a_request_error() {
    assert!(matches!(
        query(&UnreachableClient, SERVER, "example.com", a(), Method::Get),
        Err(Error::Transport(TransportError::Request(_)))
    ));
}

#[test]
fn bad_server_url_sends_nothing() {
    let client = FakeClient::answering(&answer(Vec::new()));

    assert!(matches!(
        query(&client, "not a url", "example.com", a(), Method::Get),
        Err(Error::Transport(TransportError::InvalidServerUrl { .. }))
    ));
    assert_eq!(0, client.request_count());
}

#[test]
fn bad_hostname_sends_nothing() {
    let client = FakeClient::answering(&answer(Vec::new()));
    let hostname = format!("{}.com", "a".repeat(64));

    assert!(matches!(
        query(&client, SERVER, &hostname, a(), Method::Get),
        Err(Error::Encode(_))
    ));
    assert!(matches!(
        query(&client, SERVER, "www..example.com", a(), Method::Post),
        Err(Error::Encode(_))
    ));
    assert_eq!(0, client.request_count());
}

#[test]
fn garbage_body_is_a_decode_error() {
    let client = FakeClient::new(StatusCode::OK, Bytes::from_static(&[0, 1, 2]));

    assert!(matches!(
        query(&client, SERVER, "example.com", a(), Method::Get),
        Err(Error::Decode(_))
    ));
}

#[test]
fn resolve_follows_cname_to_address() {
    let client = FakeClient::answering(&answer(vec![
        cname_record("example.com.", "cdn.example.net."),
        a_record("cdn.example.net.", Ipv4Addr::new(93, 184, 216, 34)),
    ]));

    let rrs = resolve(&client, SERVER, "example.com", a(), Method::Get).unwrap();

    assert_eq!(2, rrs.len());
    let address = last_record(&rrs).unwrap().data().unwrap();
    assert_eq!("93.184.216.34", address.to_string());
}

#[test]
fn one_request_per_call() {
    let client = FakeClient::answering(&answer(Vec::new()));

    for i in 1..=3 {
        resolve(&client, SERVER, "example.com", a(), Method::Post).unwrap();
        assert_eq!(i, client.request_count());
    }
}

#[test]
fn client_config_defaults() {
    let config = ClientConfig::default();

    assert_eq!(std::time::Duration::from_secs(10), config.timeout);
    assert!(config.user_agent.starts_with("dns-doh/"));
}
