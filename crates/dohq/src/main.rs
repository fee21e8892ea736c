use clap::Parser;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use dns_doh::{ClientConfig, Method, ReqwestClient};
use dns_types::protocol::rdata::{last_record, RecordData};
use dns_types::protocol::types::{QueryType, Rcode, RecordType, ResourceRecord};

/// RDATA rendered as an address where possible, and as escaped
/// octets otherwise.
fn render_rdata(rr: &ResourceRecord) -> RecordData {
    rr.data().unwrap_or_else(|_| RecordData::Opaque {
        rtype: rr.rtype,
        octets: rr.rdata.clone(),
    })
}

fn print_section(heading: &str, rrs: &[ResourceRecord]) {
    if rrs.is_empty() {
        return;
    }

    println!("\n;; {heading}");
    for rr in rrs {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            rr.name,
            rr.ttl,
            rr.rclass,
            rr.rtype,
            render_rdata(rr)
        );
    }
}

fn begin_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let logger = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        logger.json().init();
    } else {
        logger.init();
    }
}

// the doc comments for this struct turn into the CLI help text
#[derive(Parser)]
/// DNS-over-HTTPS lookup utility
///
/// Sends a single recursive query to a DNS-over-HTTPS server and
/// prints the response.  Set RUST_LOG to see what it is doing.
struct Args {
    /// Domain name to resolve
    #[clap(value_parser)]
    address: String,

    /// Query type to resolve
    #[clap(default_value_t = QueryType::Record(RecordType::A), value_parser)]
    qtype: QueryType,

    /// URL of the DNS-over-HTTPS endpoint
    #[clap(
        short,
        long,
        value_parser,
        env = "DOHQ_SERVER",
        default_value = "https://mozilla.cloudflare-dns.com/dns-query"
    )]
    server: String,

    /// How to send the query: GET or POST
    #[clap(short, long, value_parser, env = "DOHQ_METHOD", default_value_t = Method::Get)]
    method: Method,

    /// Give up on the request after this many seconds
    #[clap(short, long, value_parser, env = "DOHQ_TIMEOUT", default_value_t = 10)]
    timeout: u64,

    /// Log in JSON format
    #[clap(long, action(clap::ArgAction::SetTrue))]
    log_json: bool,
}

fn main() {
    let args = Args::parse();

    begin_logging(args.log_json);

    let config = ClientConfig {
        timeout: Duration::from_secs(args.timeout),
        ..ClientConfig::default()
    };
    let client = match ReqwestClient::new(&config) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("could not create HTTP client: {err}");
            process::exit(1);
        }
    };

    println!(";; QUESTION");
    println!("{}\tIN\t{}", args.address, args.qtype);

    let response = match dns_doh::query(
        &client,
        &args.server,
        &args.address,
        args.qtype,
        args.method,
    ) {
        Ok(response) => response,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    if response.header.rcode != Rcode::NoError {
        println!("\n;; RCODE: {}", response.header.rcode);
    }

    print_section("ANSWER", &response.answers);
    print_section("AUTHORITY", &response.authority);
    print_section("ADDITIONAL", &response.additional);

    println!();
    match last_record(&response.answers) {
        Some(rr) => println!("-> {}", render_rdata(rr)),
        None => println!("-> (no answer)"),
    }
}
