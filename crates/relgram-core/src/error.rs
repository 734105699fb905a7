use std::{fmt, io};

/// Convenience alias used by all fallible relgram operations.
pub type Result<T> = std::result::Result<T, ErrorKind>;

/// Faults that can occur while decoding a reliable datagram. Framing is
/// stream-like within a datagram, so any of these leaves the remainder
/// unparseable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingErrorKind {
    /// The datagram ended before the 8-byte reliable header.
    HeaderTruncated,
    /// A sub-packet header byte was announced but missing.
    SubHeaderTruncated,
    /// A sub-packet declared a size above the protocol maximum.
    SizeOutOfRange,
    /// A sub-packet declared more payload bytes than the datagram holds.
    PayloadTruncated,
}

impl fmt::Display for DecodingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodingErrorKind::HeaderTruncated => write!(f, "reliable header truncated"),
            DecodingErrorKind::SubHeaderTruncated => write!(f, "sub-packet header truncated"),
            DecodingErrorKind::SizeOutOfRange => write!(f, "sub-packet size out of range"),
            DecodingErrorKind::PayloadTruncated => write!(f, "sub-packet payload truncated"),
        }
    }
}

/// Errors that can occur in the transport.
#[derive(Debug)]
pub enum ErrorKind {
    /// A datagram could not be decoded; the channel is closed in response.
    DecodingError(DecodingErrorKind),
    /// A received sequence skipped past the reconcilable window; the
    /// channel is closed in response.
    WindowSkipped {
        /// Distance of the received sequence ahead of the highest seen.
        jump: u16,
    },
    /// A send was attempted with a payload above the sub-packet maximum.
    SubPacketTooLarge(usize),
    /// A tagged send was attempted with a negative tag.
    InvalidTag(i32),
    /// A send was attempted on a connection that is no longer writable.
    ConnectionClosed,
    /// Wrapped I/O error from the socket layer.
    IoError(io::Error),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::DecodingError(kind) => write!(f, "could not decode datagram: {}", kind),
            ErrorKind::WindowSkipped { jump } => {
                write!(f, "received sequence skipped {} ahead of the history window", jump)
            }
            ErrorKind::SubPacketTooLarge(size) => {
                write!(f, "payload of {} bytes exceeds the sub-packet maximum", size)
            }
            ErrorKind::InvalidTag(tag) => write!(f, "tag must be non-negative, got {}", tag),
            ErrorKind::ConnectionClosed => write!(f, "connection is closed"),
            ErrorKind::IoError(err) => write!(f, "i/o error: {}", err),
        }
    }
}

impl std::error::Error for ErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ErrorKind::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::IoError(err)
    }
}

impl From<DecodingErrorKind> for ErrorKind {
    fn from(kind: DecodingErrorKind) -> Self {
        ErrorKind::DecodingError(kind)
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ErrorKind::DecodingError(a), ErrorKind::DecodingError(b)) => a == b,
            (ErrorKind::WindowSkipped { jump: a }, ErrorKind::WindowSkipped { jump: b }) => a == b,
            (ErrorKind::SubPacketTooLarge(a), ErrorKind::SubPacketTooLarge(b)) => a == b,
            (ErrorKind::InvalidTag(a), ErrorKind::InvalidTag(b)) => a == b,
            (ErrorKind::ConnectionClosed, ErrorKind::ConnectionClosed) => true,
            (ErrorKind::IoError(a), ErrorKind::IoError(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}
