use thiserror::Error;

/// Errors produced while parsing or building Cast wire data.
#[derive(Error, Debug)]
pub enum CastError {
    /// A read ran past the end of the input buffer.
    #[error("parser error: {0}")]
    Parser(String),

    /// The input decoded but is not valid protocol data, or an output
    /// buffer was too small for the packet being built.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Specialized Result type for castio operations.
pub type Result<T> = std::result::Result<T, CastError>;
