//! Minecraft server list ping.
//!
//! One query opens a fresh TCP connection, sends a handshake and a status
//! request, and decodes the JSON status document from the response. No
//! connection is kept between queries.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{AddressError, QueryError};
use crate::models::{SampledPlayer, ServerStatus};

pub const DEFAULT_PORT: u16 = 25565;

/// Protocol number sent in the handshake. Servers answer status requests for
/// any version, so an old one is fine.
const PROTOCOL_VERSION: i32 = 47;

/// Status documents carry a base64 favicon; anything past this is garbage.
const MAX_PACKET_LEN: usize = 1024 * 1024;

/// Something that can report the current server status.
pub trait StatusSource: Send + Sync + 'static {
    fn query(&self) -> impl Future<Output = Result<ServerStatus, QueryError>> + Send;
}

/// `host` or `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl FromStr for ServerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        match s.rsplit_once(':') {
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(AddressError::Empty);
                }
                let port = port
                    .parse()
                    .map_err(|_| AddressError::InvalidPort(port.to_string()))?;
                Ok(Self {
                    host: host.to_string(),
                    port,
                })
            }
            None => Ok(Self {
                host: s.to_string(),
                port: DEFAULT_PORT,
            }),
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Queries a live server over TCP.
#[derive(Debug, Clone)]
pub struct ServerListPing {
    address: ServerAddress,
    timeout: Duration,
}

impl ServerListPing {
    pub fn new(address: ServerAddress, timeout: Duration) -> Self {
        Self { address, timeout }
    }
}

impl StatusSource for ServerListPing {
    async fn query(&self) -> Result<ServerStatus, QueryError> {
        let ping = async {
            let stream =
                TcpStream::connect((self.address.host.as_str(), self.address.port)).await?;
            exchange(stream, &self.address).await
        };
        tokio::time::timeout(self.timeout, ping)
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))?
    }
}

/// Run the handshake/status exchange over an already connected stream.
pub async fn exchange<S>(mut stream: S, address: &ServerAddress) -> Result<ServerStatus, QueryError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut handshake = Vec::with_capacity(address.host.len() + 16);
    write_varint(&mut handshake, 0x00);
    write_varint(&mut handshake, PROTOCOL_VERSION);
    write_string(&mut handshake, &address.host);
    handshake.extend_from_slice(&address.port.to_be_bytes());
    write_varint(&mut handshake, 1);

    let mut out = Vec::with_capacity(handshake.len() + 8);
    write_frame(&mut out, &handshake);
    write_frame(&mut out, &[0x00]);
    stream.write_all(&out).await?;
    stream.flush().await?;

    let len = read_varint(&mut stream).await?;
    let len = usize::try_from(len).map_err(|_| QueryError::Protocol("negative packet length"))?;
    if len == 0 || len > MAX_PACKET_LEN {
        return Err(QueryError::Protocol("packet length out of range"));
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;

    let mut body = body.as_slice();
    if read_varint(&mut body).await? != 0x00 {
        return Err(QueryError::Protocol("unexpected packet id"));
    }
    let json_len = read_varint(&mut body).await?;
    let json_len =
        usize::try_from(json_len).map_err(|_| QueryError::Protocol("negative string length"))?;
    if json_len > body.len() {
        return Err(QueryError::Protocol("string longer than packet"));
    }

    let status = parse_status(&body[..json_len])?;
    debug!(
        address = %address,
        online = status.online,
        max = status.max,
        sampled = status.players.len(),
        "status query succeeded"
    );
    Ok(status)
}

#[derive(Deserialize)]
struct StatusDocument {
    players: PlayersDocument,
}

#[derive(Deserialize)]
struct PlayersDocument {
    online: u32,
    max: u32,
    #[serde(default)]
    sample: Vec<SampleDocument>,
}

#[derive(Deserialize)]
struct SampleDocument {
    name: String,
    #[serde(default)]
    id: String,
}

fn parse_status(json: &[u8]) -> Result<ServerStatus, QueryError> {
    let doc: StatusDocument = serde_json::from_slice(json)?;
    let players = doc.players.sample.into_iter().map(|p| SampledPlayer {
        name: p.name,
        id: p.id,
    });
    Ok(ServerStatus::new(doc.players.online, doc.players.max, players))
}

fn write_frame(out: &mut Vec<u8>, body: &[u8]) {
    write_varint(out, body.len() as i32);
    out.extend_from_slice(body);
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    write_varint(out, s.len() as i32);
    out.extend_from_slice(s.as_bytes());
}

fn write_varint(out: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7f == 0 {
            out.push(value as u8);
            return;
        }
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, QueryError> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = reader.read_u8().await?;
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(QueryError::Protocol("varint longer than 5 bytes"))
}
