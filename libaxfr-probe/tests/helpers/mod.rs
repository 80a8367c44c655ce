#![allow(dead_code)]

use async_trait::async_trait;
use hickory_proto::{
    op::{Message, MessageType, OpCode, ResponseCode},
    rr::{
        rdata::{A, NS, SOA},
        Name, RData, Record,
    },
    serialize::binary::BinEncodable,
};
use libaxfr_probe::{
    Domain, NameServer, NameServerResolver, NameServerSet, ProbeError, TransferResult,
    ZoneTransferClient,
};
use std::{
    collections::{HashMap, VecDeque},
    io,
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, UdpSocket},
};

/// Resolver returning a fixed answer and counting how often it was asked.
pub struct StaticResolver {
    servers: NameServerSet,
    calls: AtomicUsize,
}

impl StaticResolver {
    pub fn new(hosts: &[&str]) -> Self {
        Self {
            servers: hosts.iter().map(|h| NameServer::new(h)).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NameServerResolver for StaticResolver {
    async fn resolve(&self, _domain: &Domain) -> NameServerSet {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.servers.clone()
    }
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Answer(TransferResult),
    /// Answers only after the given delay.
    Delayed(Duration, TransferResult),
    /// Never answers.
    Hang,
    Unavailable,
}

/// Transfer client playing back a per-server script and recording every
/// session it is asked to run.
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    sessions: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, server: &str, steps: Vec<Scripted>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(server.to_string(), steps.into());
        self
    }

    pub fn sessions(&self) -> Vec<String> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn sessions_for(&self, server: &str) -> usize {
        self.sessions().iter().filter(|s| *s == server).count()
    }
}

#[async_trait]
impl ZoneTransferClient for ScriptedClient {
    async fn transfer(
        &self,
        _domain: &Domain,
        server: &NameServer,
        _timeout: Duration,
    ) -> Result<TransferResult, ProbeError> {
        self.sessions.lock().unwrap().push(server.host().to_string());
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(server.host())
            .and_then(|steps| steps.pop_front())
            .unwrap_or(Scripted::Answer(TransferResult::error("no script")));

        match step {
            Scripted::Answer(result) => Ok(result),
            Scripted::Delayed(delay, result) => {
                tokio::time::sleep(delay).await;
                Ok(result)
            }
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(TransferResult::error("hang elapsed"))
            }
            Scripted::Unavailable => Err(ProbeError::BackendUnavailable {
                tool: "dig",
                source: io::Error::new(io::ErrorKind::NotFound, "not found"),
            }),
        }
    }
}

pub fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

pub fn soa() -> Record {
    Record::from_rdata(
        name("example.com."),
        3600,
        RData::SOA(SOA::new(
            name("ns1.example.com."),
            name("hostmaster.example.com."),
            2024010101,
            7200,
            3600,
            1209600,
            300,
        )),
    )
}

pub fn a(host: &str, last_octet: u8) -> Record {
    Record::from_rdata(name(host), 300, RData::A(A::new(192, 0, 2, last_octet)))
}

pub fn ns(host: &str) -> Record {
    Record::from_rdata(name("example.com."), 3600, RData::NS(NS(name(host))))
}

/// How the mock server reacts to the first query on a connection.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Sends one DNS message per inner vector, then closes.
    Transfer(Vec<Vec<Record>>),
    /// Sends a single empty message with this response code.
    Rcode(ResponseCode),
    /// Answers with a different message id.
    WrongId,
    /// Reads the query and never answers.
    Silent,
    /// Reads the query and closes the connection.
    Close,
}

/// Minimal DNS-over-TCP server serving one scripted behaviour per connection.
pub struct MockAxfrServer {
    pub port: u16,
    accepted: Arc<AtomicUsize>,
}

impl MockAxfrServer {
    pub async fn start(behaviour: Behaviour) -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let behaviour = behaviour.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, behaviour).await;
                });
            }
        });

        Ok(Self { port, accepted })
    }

    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

async fn serve(mut stream: TcpStream, behaviour: Behaviour) -> io::Result<()> {
    let mut len = [0u8; 2];
    stream.read_exact(&mut len).await?;
    let mut buf = vec![0u8; u16::from_be_bytes(len) as usize];
    stream.read_exact(&mut buf).await?;
    let query = Message::from_vec(&buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    match behaviour {
        Behaviour::Transfer(batches) => {
            for batch in batches {
                send(&mut stream, &response(query.id(), ResponseCode::NoError, batch)).await?;
            }
        }
        Behaviour::Rcode(rcode) => {
            send(&mut stream, &response(query.id(), rcode, Vec::new())).await?;
        }
        Behaviour::WrongId => {
            send(&mut stream, &response(query.id().wrapping_add(1), ResponseCode::NoError, vec![soa()])).await?;
        }
        Behaviour::Silent => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Behaviour::Close => {}
    }
    Ok(())
}

fn response(id: u16, rcode: ResponseCode, answers: Vec<Record>) -> Message {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_authoritative(true)
        .set_response_code(rcode);
    for answer in answers {
        message.add_answer(answer);
    }
    message
}

async fn send(stream: &mut TcpStream, message: &Message) -> io::Result<()> {
    let bytes = message
        .to_vec()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    stream.write_all(&(bytes.len() as u16).to_be_bytes()).await?;
    stream.write_all(&bytes).await?;
    stream.flush().await
}

/// Recursive resolver stand-in on UDP: answers NS queries for one zone and
/// NXDOMAIN for every other name.
pub struct MockNsServer {
    pub port: u16,
    queries: Arc<AtomicUsize>,
}

impl MockNsServer {
    pub async fn start(zone: &str, hosts: &[&str]) -> io::Result<Self> {
        let socket = UdpSocket::bind(("127.0.0.1", 0)).await?;
        let port = socket.local_addr()?.port();
        let zone = name(zone);
        let answers: Vec<Record> = hosts
            .iter()
            .map(|host| Record::from_rdata(zone.clone(), 3600, RData::NS(NS(name(host)))))
            .collect();
        let queries = Arc::new(AtomicUsize::new(0));
        let counter = queries.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
                counter.fetch_add(1, Ordering::SeqCst);
                let Ok(query) = Message::from_vec(&buf[..len]) else {
                    continue;
                };

                let mut reply = Message::new();
                reply
                    .set_id(query.id())
                    .set_message_type(MessageType::Response)
                    .set_op_code(OpCode::Query)
                    .set_recursion_desired(query.recursion_desired())
                    .set_recursion_available(true);
                reply.add_queries(query.queries().to_vec());

                let asked = query.queries().first().map(|q| q.name().clone());
                if asked.as_ref() == Some(&zone) {
                    reply.set_response_code(ResponseCode::NoError);
                    reply.add_answers(answers.clone());
                } else {
                    reply.set_response_code(ResponseCode::NXDomain);
                }

                if let Ok(bytes) = reply.to_vec() {
                    let _ = socket.send_to(&bytes, peer).await;
                }
            }
        });

        Ok(Self { port, queries })
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

/// A local UDP port with nothing listening on it.
pub async fn unused_udp_port() -> io::Result<u16> {
    let socket = UdpSocket::bind(("127.0.0.1", 0)).await?;
    Ok(socket.local_addr()?.port())
}
