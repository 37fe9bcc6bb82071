use thiserror::Error;

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A code table was requested for zero bytes of training data.
    #[error("empty input: cannot build a code table from zero bytes")]
    EmptyInput,

    /// Encoding hit a byte the code table was not built for.
    #[error("symbol {symbol:#04x} has no code in the table")]
    SymbolNotInTable { symbol: u8 },

    #[error("code for symbol {symbol:#04x} would exceed {max} bits")]
    CodeTooLong { symbol: u8, max: usize },

    /// A size-prefixed field claims more bytes than remain in the archive.
    #[error("truncated archive: {field} needs {needed} bytes, {available} available")]
    TruncatedArchive {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("malformed archive header: {0}")]
    MalformedHeader(String),

    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    /// Wrong password or tampered data. Deliberately carries no detail.
    #[error("authentication failed: wrong password or corrupted archive")]
    AuthenticationFailed,

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    /// The archive is encrypted and no password was supplied.
    #[error("archive is password protected")]
    PasswordRequired,

    #[error("{bytes} unexpected bytes after the last payload block")]
    TrailingData { bytes: usize },

    #[error("{field} is {len} bytes, larger than the 4-byte size prefix allows")]
    FieldTooLarge { field: &'static str, len: usize },

    #[error("invalid entry '{path}': {reason}")]
    InvalidEntry { path: String, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
