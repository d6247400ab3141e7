use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::{ChunkRange, ProtocolError};

// ---------------------------------------------------------------------------
// Requests (client -> server)
// ---------------------------------------------------------------------------

/// A message sent by a requester.
///
/// ```text
/// DOWNLOAD <filename>                         control port
/// FILE <filename> GET START <s> END <e>       data port
/// FILE <filename> CLOSE                       data port
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Download { filename: String },
    Get { filename: String, range: ChunkRange },
    Close { filename: String },
}

impl Request {
    /// Filename referenced by the request.
    pub fn filename(&self) -> &str {
        match self {
            Self::Download { filename } | Self::Get { filename, .. } | Self::Close { filename } => {
                filename
            }
        }
    }

    /// Wire bytes of the request.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download { filename } => write!(f, "DOWNLOAD {filename}"),
            Self::Get { filename, range } => write!(
                f,
                "FILE {filename} GET START {} END {}",
                range.start(),
                range.end()
            ),
            Self::Close { filename } => write!(f, "FILE {filename} CLOSE"),
        }
    }
}

impl FromStr for Request {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(ProtocolError::Empty);
        }
        let tokens: Vec<&str> = text.split(' ').collect();

        match tokens.as_slice() {
            ["DOWNLOAD", filename] => Ok(Self::Download {
                filename: token(filename)?,
            }),
            ["FILE", filename, "GET", "START", start, "END", end] => Ok(Self::Get {
                filename: token(filename)?,
                range: ChunkRange::new(number(start, "start")?, number(end, "end")?)?,
            }),
            ["FILE", filename, "CLOSE"] => Ok(Self::Close {
                filename: token(filename)?,
            }),
            ["DOWNLOAD", ..] | ["FILE", ..] => Err(ProtocolError::Malformed(text.to_string())),
            [verb, ..] => Err(ProtocolError::UnknownVerb((*verb).to_string())),
            [] => Err(ProtocolError::Empty),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses (server -> client)
// ---------------------------------------------------------------------------

/// Reason carried by an `ERR` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NotAFile,
    ServerFileError,
    /// A kind this implementation does not know, kept verbatim.
    Other(String),
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::NotAFile => "NOT_A_FILE",
            Self::ServerFileError => "SERVER_FILE_ERROR",
            Self::Other(kind) => kind,
        }
    }

    fn from_token(token: &str) -> Self {
        match token {
            "NOT_FOUND" => Self::NotFound,
            "NOT_A_FILE" => Self::NotAFile,
            "SERVER_FILE_ERROR" => Self::ServerFileError,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message sent by the dispatcher or a transfer worker.
///
/// ```text
/// OK <filename> SIZE <n> PORT <p>
/// ERR <filename> <KIND>
/// FILE <filename> OK START <s> END <e> DATA <base64>
/// FILE <filename> CLOSE_OK
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok {
        filename: String,
        size: u64,
        port: u16,
    },
    Err {
        filename: String,
        kind: ErrorKind,
    },
    Chunk {
        filename: String,
        range: ChunkRange,
        data: Vec<u8>,
    },
    CloseOk {
        filename: String,
    },
}

/// Number of tokens before the payload of a chunk reply, `DATA` included.
const CHUNK_HEAD_TOKENS: usize = 8;

impl Response {
    pub fn filename(&self) -> &str {
        match self {
            Self::Ok { filename, .. }
            | Self::Err { filename, .. }
            | Self::Chunk { filename, .. }
            | Self::CloseOk { filename } => filename,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parses a chunk reply.
    ///
    /// The head has a fixed token count; everything after the `DATA`
    /// marker is the payload, whatever characters it contains.
    fn parse_chunk(text: &str) -> Result<Self, ProtocolError> {
        let parts: Vec<&str> = text.splitn(CHUNK_HEAD_TOKENS + 1, ' ').collect();
        let (head, payload) = match parts.len() {
            n if n == CHUNK_HEAD_TOKENS => (&parts[..], ""),
            n if n == CHUNK_HEAD_TOKENS + 1 => (&parts[..CHUNK_HEAD_TOKENS], parts[CHUNK_HEAD_TOKENS]),
            _ => return Err(ProtocolError::Malformed(text.to_string())),
        };

        let ["FILE", filename, "OK", "START", start, "END", end, "DATA"] = head else {
            return Err(ProtocolError::Malformed(text.to_string()));
        };

        Ok(Self::Chunk {
            filename: token(filename)?,
            range: ChunkRange::new(number(start, "start")?, number(end, "end")?)?,
            data: STANDARD.decode(payload)?,
        })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok {
                filename,
                size,
                port,
            } => write!(f, "OK {filename} SIZE {size} PORT {port}"),
            Self::Err { filename, kind } => write!(f, "ERR {filename} {kind}"),
            Self::Chunk {
                filename,
                range,
                data,
            } => write!(
                f,
                "FILE {filename} OK START {} END {} DATA {}",
                range.start(),
                range.end(),
                STANDARD.encode(data)
            ),
            Self::CloseOk { filename } => write!(f, "FILE {filename} CLOSE_OK"),
        }
    }
}

impl FromStr for Response {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, ProtocolError> {
        let text = s.trim();
        if text.is_empty() {
            return Err(ProtocolError::Empty);
        }

        // Chunk replies are the only messages with a free-form tail.
        let mut head = text.splitn(4, ' ');
        if let (Some("FILE"), Some(_), Some("OK")) = (head.next(), head.next(), head.next()) {
            return Self::parse_chunk(text);
        }

        let tokens: Vec<&str> = text.split(' ').collect();
        match tokens.as_slice() {
            ["OK", filename, "SIZE", size, "PORT", port] => Ok(Self::Ok {
                filename: token(filename)?,
                size: number(size, "size")?,
                port: port.parse().map_err(|_| ProtocolError::InvalidNumber {
                    field: "port",
                    value: (*port).to_string(),
                })?,
            }),
            ["ERR", filename, kind] => Ok(Response::Err {
                filename: token(filename)?,
                kind: ErrorKind::from_token(kind),
            }),
            ["FILE", filename, "CLOSE_OK"] => Ok(Self::CloseOk {
                filename: token(filename)?,
            }),
            ["OK", ..] | ["ERR", ..] | ["FILE", ..] => {
                Err(ProtocolError::Malformed(text.to_string()))
            }
            [verb, ..] => Err(ProtocolError::UnknownVerb((*verb).to_string())),
            [] => Err(ProtocolError::Empty),
        }
    }
}

// ---------------------------------------------------------------------------
// Token helpers
// ---------------------------------------------------------------------------

fn token(value: &str) -> Result<String, ProtocolError> {
    if value.is_empty() {
        return Err(ProtocolError::Malformed("empty token".into()));
    }
    Ok(value.to_string())
}

fn number(value: &str, field: &'static str) -> Result<u64, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}
