use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 50505;
pub const MAX_DATAGRAM_SIZE: usize = 512;
pub const MAX_PLAYERS: usize = 11;
pub const MIN_PLAYERS: usize = 2;
pub const FIELD_SEPARATOR: char = '|';

const POINT_PREFIX: &str = "POINT|";

pub type PlayerId = u32;

/// Errors produced while decoding a datagram into a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("datagram is not valid UTF-8")]
    InvalidUtf8,

    #[error("empty message")]
    Empty,

    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    #[error("{0} message is missing its payload")]
    MissingPayload(&'static str),

    #[error("malformed point: {0}")]
    MalformedPoint(String),

    #[error("malformed {kind} payload: {payload}")]
    MalformedPayload {
        kind: &'static str,
        payload: String,
    },
}

/// A single canvas coordinate, encoded on the wire as `x:y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

impl FromStr for Point {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ProtocolError::MalformedPoint(s.to_string());
        let (x, y) = s.split_once(':').ok_or_else(malformed)?;
        let x = x.parse().map_err(|_| malformed())?;
        let y = y.parse().map_err(|_| malformed())?;
        Ok(Point { x, y })
    }
}

/// Messages sent by clients to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Connect,
    Guess { text: String },
    Point(Point),
    Check { token: String },
    Disconnect,
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Connect => "CONNECT",
            ClientMessage::Guess { .. } => "GUESS",
            ClientMessage::Point(_) => "POINT",
            ClientMessage::Check { .. } => "CHECK",
            ClientMessage::Disconnect => "DISCONNECT",
        }
    }

    pub fn encode(&self) -> String {
        match self {
            ClientMessage::Connect | ClientMessage::Disconnect => self.kind().to_string(),
            ClientMessage::Guess { text } => join(&[self.kind(), text]),
            ClientMessage::Point(point) => join(&[self.kind(), &point.to_string()]),
            ClientMessage::Check { token } => join(&[self.kind(), token]),
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(data).map_err(|_| ProtocolError::InvalidUtf8)?;
        text.parse()
    }
}

impl FromStr for ClientMessage {
    type Err = ProtocolError;

    /// The kind token is matched case-insensitively. CONNECT and DISCONNECT
    /// ignore any trailing payload.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, payload) = split_kind(s)?;

        match kind.as_str() {
            "CONNECT" => Ok(ClientMessage::Connect),
            "DISCONNECT" => Ok(ClientMessage::Disconnect),
            "GUESS" => {
                let text = payload.ok_or(ProtocolError::MissingPayload("GUESS"))?;
                Ok(ClientMessage::Guess {
                    text: text.to_string(),
                })
            }
            "POINT" => {
                let point = payload.ok_or(ProtocolError::MissingPayload("POINT"))?;
                Ok(ClientMessage::Point(point.parse()?))
            }
            "CHECK" => {
                let token = payload.ok_or(ProtocolError::MissingPayload("CHECK"))?;
                Ok(ClientMessage::Check {
                    token: token.to_string(),
                })
            }
            _ => Err(ProtocolError::UnknownKind(kind)),
        }
    }
}

/// A player's role as reported in a GAMESTATE snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Guessing,
    Drawing { word: String },
    /// Guesser who already found this round's word.
    Correct,
    Waiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEntry {
    pub id: PlayerId,
    pub score: u32,
}

/// Messages sent by the server to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Connected {
        id: PlayerId,
    },
    Chat {
        colored: bool,
        bold: bool,
        text: String,
    },
    Points(Vec<Point>),
    Scores(Vec<ScoreEntry>),
    Drawing {
        word: String,
    },
    Guessing,
    Waiting,
    GameState(Role),
    Check {
        token: String,
    },
}

impl ServerMessage {
    /// Builds a CHAT message. Text that would push the encoded message past
    /// [`MAX_DATAGRAM_SIZE`] is cut at a character boundary.
    pub fn chat(text: impl Into<String>, colored: bool, bold: bool) -> Self {
        let mut text = text.into();
        // "CHAT|" plus the two flag fields and their separators
        let overhead = 7 + 5 * usize::from(colored) + 4 * usize::from(bold);
        truncate_at_char_boundary(&mut text, MAX_DATAGRAM_SIZE - overhead);

        ServerMessage::Chat { colored, bold, text }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connected { .. } => "CONNECTED",
            ServerMessage::Chat { .. } => "CHAT",
            ServerMessage::Points(_) => "POINT",
            ServerMessage::Scores(_) => "SCORES",
            ServerMessage::Drawing { .. } => "DRAWING",
            ServerMessage::Guessing => "GUESSING",
            ServerMessage::Waiting => "WAITING",
            ServerMessage::GameState(_) => "GAMESTATE",
            ServerMessage::Check { .. } => "CHECK",
        }
    }

    pub fn encode(&self) -> String {
        let kind = self.kind();
        match self {
            ServerMessage::Connected { id } => join(&[kind, &id.to_string()]),
            ServerMessage::Chat {
                colored,
                bold,
                text,
            } => join(&[
                kind,
                if *colored { "COLOR" } else { "" },
                if *bold { "BOLD" } else { "" },
                text,
            ]),
            ServerMessage::Points(points) => join(&[kind, &join_list(points.iter())]),
            ServerMessage::Scores(scores) => {
                let list = join_list(scores.iter().map(|s| format!("{}:{}", s.id, s.score)));
                join(&[kind, &list])
            }
            ServerMessage::Drawing { word } => join(&[kind, word]),
            ServerMessage::Guessing | ServerMessage::Waiting => kind.to_string(),
            ServerMessage::GameState(role) => match role {
                Role::Guessing => join(&[kind, "GUESSING"]),
                Role::Drawing { word } => join(&[kind, "DRAWING", word]),
                Role::Correct => join(&[kind, "CORRECT"]),
                Role::Waiting => join(&[kind, "WAITING"]),
            },
            ServerMessage::Check { token } => join(&[kind, token]),
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(data).map_err(|_| ProtocolError::InvalidUtf8)?;
        text.parse()
    }
}

impl FromStr for ServerMessage {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, payload) = split_kind(s)?;

        match kind.as_str() {
            "CONNECTED" => {
                let id = payload.ok_or(ProtocolError::MissingPayload("CONNECTED"))?;
                let id = id.parse().map_err(|_| malformed("CONNECTED", id))?;
                Ok(ServerMessage::Connected { id })
            }
            "CHAT" => {
                let payload = payload.ok_or(ProtocolError::MissingPayload("CHAT"))?;
                let mut fields = payload.splitn(3, FIELD_SEPARATOR);
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(color), Some(bold), Some(text)) => Ok(ServerMessage::Chat {
                        colored: color == "COLOR",
                        bold: bold == "BOLD",
                        text: text.to_string(),
                    }),
                    _ => Err(malformed("CHAT", payload)),
                }
            }
            "POINT" => {
                let payload = payload.ok_or(ProtocolError::MissingPayload("POINT"))?;
                let points = split_list(payload)
                    .map(str::parse)
                    .collect::<Result<Vec<Point>, _>>()?;
                Ok(ServerMessage::Points(points))
            }
            "SCORES" => {
                let payload = payload.ok_or(ProtocolError::MissingPayload("SCORES"))?;
                let scores = split_list(payload)
                    .map(|entry| {
                        entry
                            .split_once(':')
                            .and_then(|(id, score)| {
                                Some(ScoreEntry {
                                    id: id.parse().ok()?,
                                    score: score.parse().ok()?,
                                })
                            })
                            .ok_or_else(|| malformed("SCORES", entry))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ServerMessage::Scores(scores))
            }
            "DRAWING" => {
                let word = payload.ok_or(ProtocolError::MissingPayload("DRAWING"))?;
                Ok(ServerMessage::Drawing {
                    word: word.to_string(),
                })
            }
            "GUESSING" => Ok(ServerMessage::Guessing),
            "WAITING" => Ok(ServerMessage::Waiting),
            "GAMESTATE" => {
                let payload = payload.ok_or(ProtocolError::MissingPayload("GAMESTATE"))?;
                let role = match payload.split_once(FIELD_SEPARATOR) {
                    Some(("DRAWING", word)) => Role::Drawing {
                        word: word.to_string(),
                    },
                    None if payload == "GUESSING" => Role::Guessing,
                    None if payload == "CORRECT" => Role::Correct,
                    None if payload == "WAITING" => Role::Waiting,
                    _ => return Err(malformed("GAMESTATE", payload)),
                };
                Ok(ServerMessage::GameState(role))
            }
            "CHECK" => {
                let token = payload.ok_or(ProtocolError::MissingPayload("CHECK"))?;
                Ok(ServerMessage::Check {
                    token: token.to_string(),
                })
            }
            _ => Err(ProtocolError::UnknownKind(kind)),
        }
    }
}

/// Splits a set of points into POINT payloads that each fit in one datagram,
/// counting the `POINT|` prefix against the budget.
pub fn chunk_points<I>(points: I) -> Vec<Vec<Point>>
where
    I: IntoIterator<Item = Point>,
{
    let budget = MAX_DATAGRAM_SIZE - POINT_PREFIX.len();
    let mut chunks = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    let mut current_len = 0;

    for point in points {
        let point_len = point.to_string().len();
        let separator_len = usize::from(!current.is_empty());

        if !current.is_empty() && current_len + separator_len + point_len > budget {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        current_len += usize::from(!current.is_empty()) + point_len;
        current.push(point);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Shortens `text` to at most `max_len` bytes without splitting a character
pub fn truncate_at_char_boundary(text: &mut String, max_len: usize) {
    if text.len() <= max_len {
        return;
    }

    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

fn split_kind(s: &str) -> Result<(String, Option<&str>), ProtocolError> {
    let (kind, payload) = match s.split_once(FIELD_SEPARATOR) {
        Some((kind, payload)) => (kind, Some(payload)),
        None => (s, None),
    };

    if kind.is_empty() {
        return Err(ProtocolError::Empty);
    }

    Ok((kind.to_uppercase(), payload))
}

fn join(fields: &[&str]) -> String {
    fields.join("|")
}

fn join_list<T: fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Tolerates the trailing comma older servers appended to lists.
fn split_list(payload: &str) -> impl Iterator<Item = &str> {
    payload.split(',').filter(|entry| !entry.is_empty())
}

fn malformed(kind: &'static str, payload: &str) -> ProtocolError {
    ProtocolError::MalformedPayload {
        kind,
        payload: payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_point_parsing() {
        assert_eq!("44:187".parse::<Point>().unwrap(), Point::new(44, 187));
        assert_eq!("-3:0".parse::<Point>().unwrap(), Point::new(-3, 0));
        assert!("44".parse::<Point>().is_err());
        assert!("a:1".parse::<Point>().is_err());
        assert!("1:".parse::<Point>().is_err());
        assert_eq!(Point::new(5, 9).to_string(), "5:9");
    }

    #[test]
    fn test_client_message_kind_is_case_insensitive() {
        assert_eq!("connect".parse::<ClientMessage>(), Ok(ClientMessage::Connect));
        assert_eq!("DisConnect".parse::<ClientMessage>(), Ok(ClientMessage::Disconnect));
        assert_eq!(
            "guess|Apple".parse::<ClientMessage>(),
            Ok(ClientMessage::Guess {
                text: "Apple".to_string()
            })
        );
    }

    #[test]
    fn test_client_message_payloads() {
        assert_eq!(
            "POINT|10:20".parse::<ClientMessage>(),
            Ok(ClientMessage::Point(Point::new(10, 20)))
        );
        assert_eq!(
            "CHECK|abc|def".parse::<ClientMessage>(),
            Ok(ClientMessage::Check {
                token: "abc|def".to_string()
            })
        );
        assert_eq!(
            "GUESS|".parse::<ClientMessage>(),
            Ok(ClientMessage::Guess {
                text: String::new()
            })
        );
        assert_eq!("CONNECT|extra".parse::<ClientMessage>(), Ok(ClientMessage::Connect));
    }

    #[test]
    fn test_client_message_errors() {
        assert_eq!(
            "GUESS".parse::<ClientMessage>(),
            Err(ProtocolError::MissingPayload("GUESS"))
        );
        assert_eq!(
            "POINT|x:1".parse::<ClientMessage>(),
            Err(ProtocolError::MalformedPoint("x:1".to_string()))
        );
        assert_eq!(
            "DANCE|now".parse::<ClientMessage>(),
            Err(ProtocolError::UnknownKind("DANCE".to_string()))
        );
        assert_eq!("".parse::<ClientMessage>(), Err(ProtocolError::Empty));
        assert_eq!(
            ClientMessage::decode(&[0xff, 0xfe]),
            Err(ProtocolError::InvalidUtf8)
        );
    }

    #[test]
    fn test_client_message_encoding() {
        assert_eq!(ClientMessage::Connect.encode(), "CONNECT");
        assert_eq!(ClientMessage::Point(Point::new(1, 2)).encode(), "POINT|1:2");
        assert_eq!(
            ClientMessage::Check {
                token: "tok".to_string()
            }
            .encode(),
            "CHECK|tok"
        );
    }

    #[test]
    fn test_chat_encoding() {
        assert_eq!(
            ServerMessage::chat("Player 1 joined", false, true).encode(),
            "CHAT||BOLD|Player 1 joined"
        );
        assert_eq!(
            ServerMessage::chat("hi", true, false).encode(),
            "CHAT|COLOR||hi"
        );

        let decoded: ServerMessage = "CHAT|||Player 2: a|b".parse().unwrap();
        assert_eq!(decoded, ServerMessage::chat("Player 2: a|b", false, false));
    }

    #[test]
    fn test_long_chat_is_cut_to_datagram_size() {
        for (colored, bold) in [(false, false), (true, false), (false, true), (true, true)] {
            let message = ServerMessage::chat("x".repeat(600), colored, bold);
            assert_eq!(message.encode().len(), MAX_DATAGRAM_SIZE);
        }

        // Never splits a multi-byte character
        let message = ServerMessage::chat("é".repeat(300), false, false);
        let encoded = message.encode();
        assert!(encoded.len() <= MAX_DATAGRAM_SIZE);
        assert_eq!(encoded.len(), MAX_DATAGRAM_SIZE - 1);
        assert_eq!(ServerMessage::decode(encoded.as_bytes()).unwrap(), message);
    }

    #[test]
    fn test_truncate_at_char_boundary() {
        let mut short = "tree".to_string();
        truncate_at_char_boundary(&mut short, 10);
        assert_eq!(short, "tree");

        let mut accented = "aéb".to_string();
        truncate_at_char_boundary(&mut accented, 2);
        assert_eq!(accented, "a");
    }

    #[test]
    fn test_gamestate_encoding() {
        let drawing = ServerMessage::GameState(Role::Drawing {
            word: "tree".to_string(),
        });
        assert_eq!(drawing.encode(), "GAMESTATE|DRAWING|tree");
        assert_eq!(drawing.encode().parse::<ServerMessage>(), Ok(drawing));

        assert_eq!(
            ServerMessage::GameState(Role::Guessing).encode(),
            "GAMESTATE|GUESSING"
        );
        assert_eq!(
            "GAMESTATE|CORRECT".parse::<ServerMessage>(),
            Ok(ServerMessage::GameState(Role::Correct))
        );
        assert!("GAMESTATE|SLEEPING".parse::<ServerMessage>().is_err());
    }

    #[test]
    fn test_scores_encoding() {
        let scores = ServerMessage::Scores(vec![
            ScoreEntry { id: 2, score: 3 },
            ScoreEntry { id: 1, score: 0 },
        ]);
        assert_eq!(scores.encode(), "SCORES|2:3,1:0");
        assert_eq!("SCORES|2:3,1:0,".parse::<ServerMessage>(), Ok(scores));
    }

    #[test]
    fn test_points_decoding_tolerates_trailing_comma() {
        assert_eq!(
            "POINT|1:2,3:4,".parse::<ServerMessage>(),
            Ok(ServerMessage::Points(vec![Point::new(1, 2), Point::new(3, 4)]))
        );
    }

    #[test]
    fn test_chunk_points_empty() {
        assert!(chunk_points(Vec::new()).is_empty());
    }

    #[test]
    fn test_chunk_points_fits_datagram_budget() {
        let points: Vec<Point> = (0..2000).map(|i| Point::new(i, i * 7 - 500)).collect();
        let chunks = chunk_points(points.iter().copied());

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            let encoded = ServerMessage::Points(chunk.clone()).encode();
            assert!(encoded.len() <= MAX_DATAGRAM_SIZE, "chunk of {} bytes", encoded.len());
        }

        let reassembled: HashSet<Point> = chunks.into_iter().flatten().collect();
        let original: HashSet<Point> = points.into_iter().collect();
        assert_eq!(reassembled, original);
    }

    #[test]
    fn test_chunk_points_fills_chunks() {
        // "1000:1000" is 9 bytes, so 50 of them with separators take 499 bytes
        let points: Vec<Point> = (0..51).map(|_| Point::new(1000, 1000)).collect();
        let chunks = chunk_points(points);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 50);
        assert_eq!(chunks[1].len(), 1);
    }
}
