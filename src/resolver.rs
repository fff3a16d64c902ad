//! Direct DNS queries against a single nameserver.
//!
//! Queries bypass the host resolver chain entirely: a fresh UDP socket is
//! connected to the nameserver, one `A` question is sent, and the first
//! matching response before the deadline is used.

use async_trait::async_trait;
use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::opt::{ClientSubnet, EdnsOption};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::error::ProbeError;
use crate::metrics::{self, Timer};
use crate::snapshot::ResolutionOutcome;

/// Standard DNS port.
pub const DNS_PORT: u16 = 53;

/// Source prefix advertised for IPv4 client-subnet hints.
pub const CLIENT_SUBNET_V4_PREFIX: u8 = 24;

/// Source prefix advertised for IPv6 client-subnet hints.
pub const CLIENT_SUBNET_V6_PREFIX: u8 = 56;

const EDNS_PAYLOAD: u16 = 1232;
const RECV_BUFFER: usize = 4096;

/// Something that can resolve a hostname against a specific nameserver.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Resolve the `A` record of `hostname` at `nameserver`.
    ///
    /// `client_ip`, when set, is sent as an EDNS client-subnet hint. Never
    /// fails: timeouts and errors are reported as outcomes.
    async fn resolve(
        &self,
        nameserver: IpAddr,
        hostname: &str,
        client_ip: Option<IpAddr>,
    ) -> ResolutionOutcome;
}

/// UDP resolver with a per-query deadline.
#[derive(Debug, Clone)]
pub struct UdpResolver {
    timeout: Duration,
    port: u16,
}

impl UdpResolver {
    /// Resolver querying port 53.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            port: DNS_PORT,
        }
    }

    /// Query a non-standard port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn exchange(
        &self,
        nameserver: IpAddr,
        request: &Message,
    ) -> Result<Option<Message>, ProbeError> {
        let bind_addr: SocketAddr = match nameserver {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect((nameserver, self.port)).await?;
        socket.send(&request.to_vec()?).await?;

        tokio::time::timeout(self.timeout, recv_response(&socket, request.id()))
            .await
            .map_or(Ok(None), |response| response.map(Some))
    }
}

#[async_trait]
impl Resolve for UdpResolver {
    async fn resolve(
        &self,
        nameserver: IpAddr,
        hostname: &str,
        client_ip: Option<IpAddr>,
    ) -> ResolutionOutcome {
        let timer = Timer::start();

        let outcome = match build_query(hostname, client_ip) {
            Ok(request) => match self.exchange(nameserver, &request).await {
                Ok(Some(response)) => outcome_from_response(&response),
                Ok(None) => ResolutionOutcome::Timeout,
                Err(e) => ResolutionOutcome::Error {
                    reason: e.to_string(),
                },
            },
            Err(e) => ResolutionOutcome::Error {
                reason: e.to_string(),
            },
        };

        metrics::record_dns_request(&outcome, timer.elapsed());
        debug!(
            %nameserver,
            hostname,
            outcome = outcome.kind(),
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "dns query finished"
        );
        outcome
    }
}

/// Read datagrams until one is the response to query `id`.
async fn recv_response(socket: &UdpSocket, id: u16) -> Result<Message, ProbeError> {
    let mut buf = vec![0u8; RECV_BUFFER];
    loop {
        let len = socket.recv(&mut buf).await?;
        match Message::from_vec(&buf[..len]) {
            Ok(response)
                if response.message_type() == MessageType::Response && response.id() == id =>
            {
                return Ok(response);
            }
            Ok(_) => trace!(id, "ignoring unrelated datagram"),
            Err(e) => trace!(id, error = %e, "ignoring undecodable datagram"),
        }
    }
}

/// Build a recursive `A`/`IN` query, optionally carrying a client-subnet hint.
pub fn build_query(hostname: &str, client_ip: Option<IpAddr>) -> Result<Message, ProbeError> {
    let mut name = Name::from_ascii(hostname)?;
    name.set_fqdn(true);

    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);

    let mut msg = Message::new();
    msg.set_id(rand::random());
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    msg.add_query(query);

    if let Some(ip) = client_ip {
        let prefix = match ip {
            IpAddr::V4(_) => CLIENT_SUBNET_V4_PREFIX,
            IpAddr::V6(_) => CLIENT_SUBNET_V6_PREFIX,
        };
        let mut edns = Edns::new();
        edns.set_max_payload(EDNS_PAYLOAD);
        edns.options_mut()
            .insert(EdnsOption::Subnet(ClientSubnet::new(ip, prefix, 0)));
        msg.set_edns(edns);
    }

    Ok(msg)
}

/// Classify a response: first `A` record in answer order, or an error reason.
pub fn outcome_from_response(response: &Message) -> ResolutionOutcome {
    if response.response_code() != ResponseCode::NoError {
        return ResolutionOutcome::Error {
            reason: response.response_code().to_string(),
        };
    }

    response
        .answers()
        .iter()
        .find_map(|record| match record.data() {
            RData::A(a) => Some(ResolutionOutcome::Resolved { ip: a.0 }),
            _ => None,
        })
        .unwrap_or_else(|| ResolutionOutcome::Error {
            reason: "no A record in answer".to_string(),
        })
}
