use thiserror::Error;

/// Errors produced by the SPDY framing layer.
///
/// On the parse side every variant is terminal: once the framer reports an
/// error it stays in the error state and ignores further input until it is
/// explicitly reset.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpdyError {
    /// Control frame carries a protocol version other than the framer's.
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    /// Structurally invalid control frame (bad size, bad type, bad field).
    #[error("invalid control frame")]
    InvalidControlFrame,
    /// Control frame length exceeds the configured maximum.
    #[error("control frame payload too large")]
    ControlPayloadTooLarge,
    /// Serialized frame does not fit the wire length field.
    #[error("frame too large for this protocol version")]
    FrameTooLarge,
    /// Header block compression failed.
    #[error("header block compression failure")]
    CompressFailure,
    /// Header block decompression failed.
    #[error("header block decompression failure")]
    DecompressFailure,
    /// Data frame carries flags outside the legal set.
    #[error("invalid data frame flags")]
    InvalidDataFrameFlags,
    /// Control frame carries flags outside the legal set for its type.
    #[error("invalid control frame flags")]
    InvalidControlFrameFlags,
    /// Frame received out of sequence (header block continuation violation).
    #[error("unexpected frame")]
    UnexpectedFrame,
    /// Visitor rejected GOAWAY opaque data.
    #[error("GOAWAY frame corrupt")]
    GoAwayFrameCorrupt,
    /// Visitor rejected RST_STREAM opaque data.
    #[error("RST_STREAM frame corrupt")]
    RstStreamFrameCorrupt,
}
