use crate::{
    domain::{Domain, NameServer},
    error::ProbeError,
    types::{TransferFailure, TransferResult, ZoneRecord},
};
use async_trait::async_trait;
use hickory_proto::{
    error::ProtoError,
    op::{Message, MessageType, OpCode, Query, ResponseCode},
    rr::{Name, Record, RecordType},
    serialize::binary::BinEncodable,
};
use hickory_resolver::TokioAsyncResolver;
use std::{io, net::IpAddr, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::{debug, warn};

pub const DNS_PORT: u16 = 53;

/// Runs a single zone-transfer session against one server.
///
/// Per-server problems come back as `TransferResult::Failure`; an `Err` means
/// the transfer mechanism itself cannot work and the run should stop.
#[async_trait]
pub trait ZoneTransferClient: Send + Sync {
    async fn transfer(
        &self,
        domain: &Domain,
        server: &NameServer,
        timeout: Duration,
    ) -> Result<TransferResult, ProbeError>;
}

/// AXFR over TCP, speaking the DNS wire format directly.
pub struct AxfrClient {
    resolver: TokioAsyncResolver,
    port: u16,
}

impl AxfrClient {
    pub fn new(resolver: TokioAsyncResolver) -> Self {
        Self {
            resolver,
            port: DNS_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn server_addrs(&self, server: &NameServer) -> Result<Vec<IpAddr>, String> {
        if let Ok(ip) = server.host().parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        let lookup = self
            .resolver
            .lookup_ip(server.host())
            .await
            .map_err(|e| format!("cannot resolve {}: {}", server, e))?;
        let addrs: Vec<IpAddr> = lookup.iter().collect();
        if addrs.is_empty() {
            return Err(format!("no addresses for {}", server));
        }
        Ok(addrs)
    }

    async fn connect(&self, addrs: &[IpAddr], timeout: Duration) -> Result<TcpStream, String> {
        let mut last_error = String::from("no address to connect to");
        for addr in addrs {
            match tokio::time::timeout(timeout, TcpStream::connect((*addr, self.port))).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => last_error = format!("connect to {}: {}", addr, e),
                Err(_) => last_error = format!("connect to {} timed out", addr),
            }
        }
        Err(last_error)
    }

    async fn session(&self, domain: &Domain, server: &NameServer, timeout: Duration) -> TransferResult {
        let addrs = match self.server_addrs(server).await {
            Ok(addrs) => addrs,
            Err(reason) => return TransferResult::error(reason),
        };
        let mut stream = match self.connect(&addrs, timeout).await {
            Ok(stream) => stream,
            Err(reason) => return TransferResult::error(reason),
        };

        let (id, query) = match build_axfr_query(domain) {
            Ok(q) => q,
            Err(e) => return TransferResult::error(format!("cannot encode query: {}", e)),
        };
        if let Err(e) = write_frame(&mut stream, &query).await {
            return TransferResult::error(format!("send failed: {}", e));
        }
        debug!("AXFR query {} for {} sent to {}", id, domain, server);

        let mut axfr = AxfrStream::new(id);
        loop {
            let frame = match read_frame(&mut stream).await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    if axfr.has_records() {
                        warn!("{} closed the transfer of {} before the closing SOA", server, domain);
                    }
                    return axfr.finish();
                }
                Err(e) => return TransferResult::error(format!("receive failed: {}", e)),
            };

            let message = match Message::from_vec(&frame) {
                Ok(message) => message,
                Err(e) => return TransferResult::error(format!("malformed response: {}", e)),
            };

            match axfr.accept(&message) {
                Step::Continue => {}
                Step::Complete => return axfr.finish(),
                Step::Fail(failure) => return TransferResult::Failure(failure),
            }
        }
    }
}

#[async_trait]
impl ZoneTransferClient for AxfrClient {
    async fn transfer(
        &self,
        domain: &Domain,
        server: &NameServer,
        timeout: Duration,
    ) -> Result<TransferResult, ProbeError> {
        Ok(self.session(domain, server, timeout).await)
    }
}

pub(crate) fn build_axfr_query(domain: &Domain) -> Result<(u16, Vec<u8>), ProtoError> {
    let name = Name::from_ascii(domain.to_fqdn())?;
    let id = rand::random::<u16>();

    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(false);
    message.add_query(Query::query(name, RecordType::AXFR));

    Ok((id, message.to_vec()?))
}

async fn write_frame(stream: &mut TcpStream, payload: &[u8]) -> io::Result<()> {
    let len = u16::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "DNS message too large"))?;
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    stream.write_all(&frame).await?;
    stream.flush().await
}

/// Reads one length-prefixed message. `None` means the peer closed the
/// connection between messages.
async fn read_frame(stream: &mut TcpStream) -> io::Result<Option<Vec<u8>>> {
    let mut len = [0u8; 2];
    match stream.read_exact(&mut len).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let mut buf = vec![0u8; u16::from_be_bytes(len) as usize];
    stream.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Complete,
    Fail(TransferFailure),
}

/// Accumulates the messages of one AXFR response stream.
pub(crate) struct AxfrStream {
    id: u16,
    records: Vec<ZoneRecord>,
    soa_seen: usize,
}

impl AxfrStream {
    pub(crate) fn new(id: u16) -> Self {
        Self {
            id,
            records: Vec::new(),
            soa_seen: 0,
        }
    }

    pub(crate) fn accept(&mut self, message: &Message) -> Step {
        if message.id() != self.id {
            return Step::Fail(TransferFailure::Error {
                reason: format!("response id {} does not match query id {}", message.id(), self.id),
            });
        }

        match message.response_code() {
            ResponseCode::NoError => {}
            ResponseCode::Refused | ResponseCode::NotAuth => return Step::Fail(TransferFailure::Refused),
            rcode => {
                return Step::Fail(TransferFailure::Error {
                    reason: format!("server answered {}", rcode),
                })
            }
        }

        if message.answers().is_empty() {
            return Step::Complete;
        }

        for record in message.answers() {
            self.records.push(to_zone_record(record));
            if record.record_type() == RecordType::SOA {
                self.soa_seen += 1;
                // The zone is framed by its SOA; the second one closes it.
                if self.soa_seen == 2 {
                    return Step::Complete;
                }
            }
        }

        Step::Continue
    }

    pub(crate) fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    pub(crate) fn finish(self) -> TransferResult {
        TransferResult::from_records(self.records)
    }
}

fn to_zone_record(record: &Record) -> ZoneRecord {
    ZoneRecord {
        name: record.name().to_string(),
        ttl: record.ttl(),
        class: record.dns_class().to_string(),
        rtype: record.record_type().to_string(),
        rdata: record.data().map(|d| d.to_string()).unwrap_or_default(),
    }
}
