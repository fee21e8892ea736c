use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;
use std::net::Ipv4Addr;

use dns_types::protocol::types::*;

#[allow(non_snake_case)]
fn bench__query(c: &mut Criterion) {
    let message = Message::doh_query(domain("www.example.com."), QueryType::Record(RecordType::A));

    c.bench_function("serialise/query", |b| {
        b.iter_batched(
            || message.clone(),
            |message| message.to_octets(),
            BatchSize::SmallInput,
        )
    });

    let serialised = message.to_octets().unwrap();
    c.bench_function("deserialise/query", |b| {
        b.iter(|| Message::from_octets(black_box(&serialised)))
    });
}

#[allow(non_snake_case)]
fn bench__answer__cname_chain(c: &mut Criterion) {
    let mut message =
        Message::doh_query(domain("www.example.com."), QueryType::Record(RecordType::A))
            .make_response();

    message.answers = vec![
        cname_record("www.example.com.", "www.example.com.cdn.example.net."),
        cname_record("www.example.com.cdn.example.net.", "edge.example.net."),
        a_record("edge.example.net.", Ipv4Addr::new(93, 184, 216, 34)),
    ];

    c.bench_function("serialise/answer/cname_chain", |b| {
        b.iter_batched(
            || message.clone(),
            |message| message.to_octets(),
            BatchSize::SmallInput,
        )
    });

    let serialised = message.to_octets().unwrap();
    c.bench_function("deserialise/answer/cname_chain", |b| {
        b.iter(|| Message::from_octets(black_box(&serialised)))
    });

    c.bench_function("interpret/answer/cname_chain", |b| {
        b.iter(|| {
            black_box(&message)
                .answers
                .iter()
                .map(ResourceRecord::data)
                .collect::<Vec<_>>()
        })
    });
}

#[allow(non_snake_case)]
fn bench__answer__big(c: &mut Criterion) {
    let mut message =
        Message::doh_query(domain("www.example.com."), QueryType::Record(RecordType::A))
            .make_response();

    for i in 0..128 {
        message.answers.push(a_record(
            "www.example.com.",
            Ipv4Addr::new(10, 0, (i / 256) as u8, (i % 256) as u8),
        ));
    }

    c.bench_function("serialise/answer/big", |b| {
        b.iter_batched(
            || message.clone(),
            |message| message.to_octets(),
            BatchSize::SmallInput,
        )
    });

    let serialised = message.to_octets().unwrap();
    c.bench_function("deserialise/answer/big", |b| {
        b.iter(|| Message::from_octets(black_box(&serialised)))
    });
}

// test_util is only built with the test-util feature
fn domain(name: &str) -> DomainName {
    DomainName::from_dotted_string(name).unwrap()
}

fn a_record(name: &str, address: Ipv4Addr) -> ResourceRecord {
    ResourceRecord {
        name: domain(name),
        rtype: RecordType::A,
        rclass: RecordClass::IN,
        ttl: 300,
        rdata: Bytes::copy_from_slice(&address.octets()),
    }
}

fn cname_record(name: &str, target_name: &str) -> ResourceRecord {
    let mut rdata = Vec::new();
    for label in &domain(target_name).labels {
        rdata.push(label.len());
        rdata.extend_from_slice(label.octets());
    }

    ResourceRecord {
        name: domain(name),
        rtype: RecordType::CNAME,
        rclass: RecordClass::IN,
        ttl: 300,
        rdata: Bytes::from(rdata),
    }
}

criterion_group!(
    benches,
    bench__query,
    bench__answer__cname_chain,
    bench__answer__big,
);
criterion_main!(benches);
