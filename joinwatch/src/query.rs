//! Valve A2S server queries over UDP.
//!
//! Format: [Header:4][Type:1][Payload]. Header `-1` is a whole response,
//! header `-2` is one part of a split response:
//! [Header:4][Id:4][Total:1][Number:1][MaxSize:2][Part]
//!
//! Only the two queries needed for a roster are implemented: `A2S_INFO`
//! for the server name and `A2S_PLAYER` for the player list. Both may be
//! answered with a challenge number that has to be echoed back.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::snapshot::{ServerSnapshot, SnapshotSource};

/// Port used when the configured address does not carry one.
pub const DEFAULT_PORT: u16 = 27015;

const SINGLE_PACKET: i32 = -1;
const SPLIT_PACKET: i32 = -2;

const A2S_INFO: u8 = b'T';
const A2S_INFO_REPLY: u8 = b'I';
const A2S_PLAYER: u8 = b'U';
const A2S_PLAYER_REPLY: u8 = b'D';
const CHALLENGE_REPLY: u8 = b'A';

const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";
const NO_CHALLENGE: [u8; 4] = [0xFF; 4];

/// Servers re-issue a challenge at most a couple of times in practice.
const MAX_CHALLENGE_ROUNDS: usize = 3;

/// Large enough for any single datagram a Source server sends.
const RECV_BUFFER: usize = 4096;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not resolve server address {0}")]
    Resolve(String),

    #[error("server did not answer within {0:?}")]
    Timeout(Duration),

    #[error("response ended early")]
    Truncated,

    #[error("unexpected packet header {0}")]
    InvalidHeader(i32),

    #[error("unexpected response type 0x{0:02x}")]
    UnexpectedType(u8),

    #[error("server kept answering with a new challenge")]
    ChallengeLoop,

    #[error("compressed split responses are not supported")]
    Compressed,

    #[error("split response is inconsistent: {0}")]
    BadSplit(&'static str),
}

/// Append the default query port when the address has none.
pub fn with_default_port(address: &str) -> String {
    let address = address.trim();
    if let Ok(ip) = address.parse::<std::net::Ipv6Addr>() {
        return format!("[{}]:{}", ip, DEFAULT_PORT);
    }
    let has_port = match address.rsplit_once(':') {
        Some((host, port)) => !port.is_empty() && (!host.contains(':') || host.ends_with(']')),
        None => false,
    };
    if has_port {
        address.to_string()
    } else {
        format!("{}:{}", address, DEFAULT_PORT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Info,
    Players,
}

impl Request {
    fn encode(self, challenge: Option<[u8; 4]>) -> Vec<u8> {
        let mut packet = SINGLE_PACKET.to_le_bytes().to_vec();
        match self {
            Request::Info => {
                packet.push(A2S_INFO);
                packet.extend_from_slice(INFO_PAYLOAD);
                if let Some(challenge) = challenge {
                    packet.extend_from_slice(&challenge);
                }
            }
            Request::Players => {
                packet.push(A2S_PLAYER);
                packet.extend_from_slice(&challenge.unwrap_or(NO_CHALLENGE));
            }
        }
        packet
    }

    fn reply_type(self) -> u8 {
        match self {
            Request::Info => A2S_INFO_REPLY,
            Request::Players => A2S_PLAYER_REPLY,
        }
    }
}

/// Little-endian cursor over a response payload.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], QueryError> {
        let end = self.pos.checked_add(n).ok_or(QueryError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(QueryError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], QueryError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, QueryError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, QueryError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, QueryError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32, QueryError> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// NUL-terminated string. Invalid UTF-8 is replaced rather than rejected.
    fn cstring(&mut self) -> Result<String, QueryError> {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(QueryError::Truncated)?;
        let s = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Ok(s)
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }
}

/// The parts of an `A2S_INFO` reply used for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub name: String,
    pub map: String,
    pub players: u8,
    pub max_players: u8,
}

/// Parse an `A2S_INFO` payload (everything after the `I` type byte).
pub fn parse_info(payload: &[u8]) -> Result<ServerInfo, QueryError> {
    let mut r = Reader::new(payload);
    let _protocol = r.u8()?;
    let name = r.cstring()?;
    let map = r.cstring()?;
    let _folder = r.cstring()?;
    let _game = r.cstring()?;
    let _app_id = r.take(2)?;
    let players = r.u8()?;
    let max_players = r.u8()?;
    Ok(ServerInfo {
        name,
        map,
        players,
        max_players,
    })
}

/// One entry of an `A2S_PLAYER` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEntry {
    pub name: String,
    pub score: i32,
    pub duration: f32,
}

/// Parse an `A2S_PLAYER` payload (everything after the `D` type byte).
///
/// Returns the count from the header together with the entries actually
/// present; servers sometimes send fewer entries than they count.
pub fn parse_players(payload: &[u8]) -> Result<(u8, Vec<PlayerEntry>), QueryError> {
    let mut r = Reader::new(payload);
    let count = r.u8()?;
    let mut players = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if r.is_empty() {
            break;
        }
        let _index = r.u8()?;
        let name = r.cstring()?;
        let score = r.i32()?;
        let duration = r.f32()?;
        players.push(PlayerEntry {
            name,
            score,
            duration,
        });
    }
    Ok((count, players))
}

#[derive(Debug)]
struct SplitPart {
    id: i32,
    total: u8,
    number: u8,
    body: Vec<u8>,
}

impl SplitPart {
    /// Parse a split datagram, without its `-2` header.
    fn parse(datagram: &[u8]) -> Result<Self, QueryError> {
        let mut r = Reader::new(datagram);
        let id = r.i32()?;
        if id < 0 {
            // High bit set means bzip2-compressed
            return Err(QueryError::Compressed);
        }
        let total = r.u8()?;
        let number = r.u8()?;
        let _max_size = r.u16()?;
        Ok(Self {
            id,
            total,
            number,
            body: r.rest().to_vec(),
        })
    }
}

/// Collects the parts of one split response, in any arrival order.
#[derive(Debug)]
struct SplitAssembler {
    id: i32,
    parts: Vec<Option<Vec<u8>>>,
}

impl SplitAssembler {
    fn new(first: SplitPart) -> Result<Self, QueryError> {
        if first.total == 0 {
            return Err(QueryError::BadSplit("zero parts"));
        }
        let mut assembler = Self {
            id: first.id,
            parts: vec![None; first.total as usize],
        };
        assembler.push(first)?;
        Ok(assembler)
    }

    fn push(&mut self, part: SplitPart) -> Result<(), QueryError> {
        if part.id != self.id {
            return Err(QueryError::BadSplit("mixed response ids"));
        }
        if part.total as usize != self.parts.len() {
            return Err(QueryError::BadSplit("part total changed"));
        }
        let slot = self
            .parts
            .get_mut(part.number as usize)
            .ok_or(QueryError::BadSplit("part number out of range"))?;
        *slot = Some(part.body);
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.parts.iter().all(Option::is_some)
    }

    fn finish(self) -> Vec<u8> {
        self.parts.into_iter().flatten().flatten().collect()
    }
}

/// Strip the `-1` header from a whole response.
fn single_payload(packet: &[u8]) -> Result<Vec<u8>, QueryError> {
    let mut r = Reader::new(packet);
    match r.i32()? {
        SINGLE_PACKET => Ok(r.rest().to_vec()),
        other => Err(QueryError::InvalidHeader(other)),
    }
}

/// Queries one game server for its roster.
#[derive(Debug, Clone)]
pub struct A2sClient {
    address: String,
    timeout: Duration,
}

impl A2sClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    async fn connect(&self) -> Result<UdpSocket, QueryError> {
        let remote: SocketAddr = tokio::net::lookup_host(&self.address)
            .await?
            .next()
            .ok_or_else(|| QueryError::Resolve(self.address.clone()))?;
        let local = if remote.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;
        Ok(socket)
    }

    async fn recv(&self, socket: &UdpSocket, buf: &mut [u8]) -> Result<usize, QueryError> {
        timeout(self.timeout, socket.recv(buf))
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))?
            .map_err(QueryError::from)
    }

    /// Receive one logical response, reassembling split packets.
    /// Returns the bytes after the `-1` header.
    async fn receive(&self, socket: &UdpSocket) -> Result<Vec<u8>, QueryError> {
        let mut buf = vec![0u8; RECV_BUFFER];
        let len = self.recv(socket, &mut buf).await?;
        let mut r = Reader::new(&buf[..len]);
        match r.i32()? {
            SINGLE_PACKET => Ok(r.rest().to_vec()),
            SPLIT_PACKET => {
                let mut assembler = SplitAssembler::new(SplitPart::parse(r.rest())?)?;
                while !assembler.is_complete() {
                    let len = self.recv(socket, &mut buf).await?;
                    let mut r = Reader::new(&buf[..len]);
                    let header = r.i32()?;
                    if header != SPLIT_PACKET {
                        return Err(QueryError::InvalidHeader(header));
                    }
                    assembler.push(SplitPart::parse(r.rest())?)?;
                }
                debug!(address = %self.address, "reassembled split response");
                single_payload(&assembler.finish())
            }
            other => Err(QueryError::InvalidHeader(other)),
        }
    }

    /// Send a request, answering challenges, until the expected reply arrives.
    /// Returns the reply payload after its type byte.
    async fn request(&self, socket: &UdpSocket, request: Request) -> Result<Vec<u8>, QueryError> {
        let mut challenge = None;
        for _ in 0..MAX_CHALLENGE_ROUNDS {
            socket.send(&request.encode(challenge)).await?;
            let response = self.receive(socket).await?;
            let mut r = Reader::new(&response);
            match r.u8()? {
                CHALLENGE_REPLY => challenge = Some(r.array::<4>()?),
                kind if kind == request.reply_type() => return Ok(r.rest().to_vec()),
                kind => return Err(QueryError::UnexpectedType(kind)),
            }
        }
        Err(QueryError::ChallengeLoop)
    }
}

impl SnapshotSource for A2sClient {
    async fn fetch(&self) -> Result<ServerSnapshot, QueryError> {
        let socket = self.connect().await?;
        let info = parse_info(&self.request(&socket, Request::Info).await?)?;
        let (count, players) = parse_players(&self.request(&socket, Request::Players).await?)?;

        info!(
            address = %self.address,
            server_name = %info.name,
            map = %info.map,
            count,
            "queried server"
        );
        Ok(ServerSnapshot::from_raw(
            info.name,
            u32::from(count),
            players.into_iter().map(|p| p.name),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cstr(s: &str) -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.push(0);
        v
    }

    fn info_payload(name: &str) -> Vec<u8> {
        let mut p = vec![17u8];
        p.extend(cstr(name));
        p.extend(cstr("ctf_2fort"));
        p.extend(cstr("tf"));
        p.extend(cstr("Team Fortress"));
        p.extend(440i16.to_le_bytes());
        p.extend([3u8, 24, 0]);
        p
    }

    fn player_payload(names: &[&str]) -> Vec<u8> {
        let mut p = vec![names.len() as u8];
        for (i, name) in names.iter().enumerate() {
            p.push(i as u8);
            p.extend(cstr(name));
            p.extend(10i32.to_le_bytes());
            p.extend(61.5f32.to_le_bytes());
        }
        p
    }

    fn single(kind: u8, payload: &[u8]) -> Vec<u8> {
        let mut p = SINGLE_PACKET.to_le_bytes().to_vec();
        p.push(kind);
        p.extend_from_slice(payload);
        p
    }

    fn split(id: i32, total: u8, number: u8, body: &[u8]) -> Vec<u8> {
        let mut p = SPLIT_PACKET.to_le_bytes().to_vec();
        p.extend(id.to_le_bytes());
        p.push(total);
        p.push(number);
        p.extend(1248u16.to_le_bytes());
        p.extend_from_slice(body);
        p
    }

    #[test]
    fn test_default_port() {
        assert_eq!(with_default_port("10.0.0.5"), "10.0.0.5:27015");
        assert_eq!(with_default_port("10.0.0.5:27016"), "10.0.0.5:27016");
        assert_eq!(with_default_port("tf.example.com"), "tf.example.com:27015");
        assert_eq!(with_default_port("[::1]:27020"), "[::1]:27020");
        assert_eq!(with_default_port("::1"), "[::1]:27015");
    }

    #[test]
    fn test_request_encoding() {
        let info = Request::Info.encode(None);
        assert_eq!(&info[..5], &[0xFF, 0xFF, 0xFF, 0xFF, b'T']);
        assert!(info.ends_with(b"Source Engine Query\0"));

        let info = Request::Info.encode(Some([1, 2, 3, 4]));
        assert!(info.ends_with(&[0, 1, 2, 3, 4]));

        assert_eq!(
            Request::Players.encode(None),
            vec![0xFF, 0xFF, 0xFF, 0xFF, b'U', 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            Request::Players.encode(Some([9, 8, 7, 6])),
            vec![0xFF, 0xFF, 0xFF, 0xFF, b'U', 9, 8, 7, 6]
        );
    }

    #[test]
    fn test_parse_info() {
        let info = parse_info(&info_payload("Valve Matchmaking #12")).unwrap();
        assert_eq!(info.name, "Valve Matchmaking #12");
        assert_eq!(info.map, "ctf_2fort");
        assert_eq!(info.players, 3);
        assert_eq!(info.max_players, 24);
    }

    #[test]
    fn test_parse_players_keeps_blank_names_and_header_count() {
        let (count, players) = parse_players(&player_payload(&["Scout", "", "Spy"])).unwrap();
        assert_eq!(count, 3);
        let names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Scout", "", "Spy"]);
        assert_eq!(players[0].score, 10);
        assert_eq!(players[0].duration, 61.5);
    }

    #[test]
    fn test_parse_players_short_list() {
        let mut payload = player_payload(&["Scout"]);
        payload[0] = 4;
        let (count, players) = parse_players(&payload).unwrap();
        assert_eq!(count, 4);
        assert_eq!(players.len(), 1);
    }

    #[test]
    fn test_parse_players_truncated_entry() {
        let mut payload = player_payload(&["Scout"]);
        payload.truncate(payload.len() - 2);
        assert!(matches!(parse_players(&payload), Err(QueryError::Truncated)));
    }

    #[test]
    fn test_split_reassembly_out_of_order() {
        let whole = single(A2S_PLAYER_REPLY, &player_payload(&["Heavy", "Medic"]));
        let (a, b) = whole.split_at(7);

        let second = SplitPart::parse(&split(77, 2, 1, b)[4..]).unwrap();
        let first = SplitPart::parse(&split(77, 2, 0, a)[4..]).unwrap();

        let mut assembler = SplitAssembler::new(second).unwrap();
        assert!(!assembler.is_complete());
        assembler.push(first).unwrap();
        assert!(assembler.is_complete());

        assert_eq!(single_payload(&assembler.finish()).unwrap(), whole[4..].to_vec());
    }

    #[test]
    fn test_split_rejects_mixed_ids_and_compression() {
        let first = SplitPart::parse(&split(1, 2, 0, b"ab")[4..]).unwrap();
        let other = SplitPart::parse(&split(2, 2, 1, b"cd")[4..]).unwrap();
        let mut assembler = SplitAssembler::new(first).unwrap();
        assert!(matches!(assembler.push(other), Err(QueryError::BadSplit(_))));

        let compressed = split(i32::MIN | 5, 2, 0, b"ab");
        assert!(matches!(
            SplitPart::parse(&compressed[4..]),
            Err(QueryError::Compressed)
        ));
    }

    /// Answers each query once with a challenge, then with the real reply.
    async fn fake_server(socket: UdpSocket, name: &'static str, players: &'static [&'static str]) {
        let mut buf = [0u8; 1500];
        let challenge = [0x11, 0x22, 0x33, 0x44];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let request = &buf[..len];
            let answered = request.ends_with(&challenge);
            let reply = match (request[4], answered) {
                (_, false) => single(CHALLENGE_REPLY, &challenge),
                (A2S_INFO, true) => single(A2S_INFO_REPLY, &info_payload(name)),
                (A2S_PLAYER, true) => single(A2S_PLAYER_REPLY, &player_payload(players)),
                _ => return,
            };
            let _ = socket.send_to(&reply, peer).await;
        }
    }

    #[tokio::test]
    async fn test_fetch_snapshot_against_local_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = server.local_addr().unwrap().to_string();
        tokio::spawn(fake_server(server, "Local TF2", &["Soldier", "", "Soldier", "Pyro"]));

        let client = A2sClient::new(address, Duration::from_secs(2));
        let snapshot = client.fetch().await.unwrap();

        assert_eq!(snapshot.server_name, "Local TF2");
        assert_eq!(snapshot.count, 4);
        let names: Vec<&str> = snapshot.players.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["Soldier", "Pyro"]);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = server.local_addr().unwrap().to_string();

        let client = A2sClient::new(address, Duration::from_millis(50));
        let result = client.fetch().await;
        assert!(matches!(result, Err(QueryError::Timeout(_))));
        drop(server);
    }
}
