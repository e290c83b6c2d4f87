//! Error types for keydion

use thiserror::Error;

/// Result type alias for keydion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in keydion
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key layout error
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    /// MIDI transport error
    #[error("MIDI error: {0}")]
    Transport(#[from] TransportError),

    /// JACK connection error
    #[error("JACK error: {0}")]
    Jack(#[from] jack::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Key layout construction and lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A (row, column) pair outside the layout grid
    #[error("key position out of range: row {row}, column {column}")]
    OutOfRange { row: usize, column: usize },

    /// The row offset table does not have one entry per row
    #[error("layout has {rows} rows but {offsets} row offsets")]
    OffsetCountMismatch { rows: usize, offsets: usize },

    /// A button's note index does not fit the index type
    #[error("note index overflows at row {row}, column {column}")]
    IndexOverflow { row: usize, column: usize },

    /// No rows, or only empty rows
    #[error("layout has no keys")]
    Empty,
}

/// MIDI transport failures.
///
/// Both are recovered locally: the application keeps running and keeps
/// tracking note state, only the outgoing bytes are lost.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The virtual endpoint could not be created
    #[error("MIDI endpoint unavailable: {0}")]
    Unavailable(String),

    /// A message could not be delivered
    #[error("MIDI send failed: {0}")]
    SendFailure(String),
}
