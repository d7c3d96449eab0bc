//! Sans-IO SPDY framing layer.
//!
//! This crate parses and serializes SPDY frames for protocol versions 2, 3,
//! and the draft version 4 wire format, without touching a socket. The caller
//! feeds received bytes into [`SpdyFramer::process_input`] and ships the byte
//! vectors returned by [`SpdyFramer::serialize_frame`].
//!
//! # Architecture
//!
//! ```text
//!   received bytes                       Frame values
//!        |                                    |
//!   +----v----------+                   +----v----------+
//!   | SpdyFramer    |  state machine    | SpdyFramer    |  serializer
//!   | process_input |  FramerVisitor    | serialize     |  wire bytes
//!   +---------------+  callbacks        +---------------+
//!           \              shared header codec             /
//!            +---- zlib streams primed per version -------+
//! ```
//!
//! Parsing is push-based: input can be sliced arbitrarily and the framer
//! buffers only fixed-size frame prefixes, streaming data payloads and
//! decompressed header block bytes to the visitor as they arrive. Header
//! compression state is connection-scoped, so use one framer per direction
//! of one connection.
//!
//! # Example
//!
//! ```rust,ignore
//! use spdy_proto::{Frame, FramerVisitor, HeaderBlock, SpdyFramer, SpdyVersion};
//!
//! let mut framer = SpdyFramer::new(SpdyVersion::V3);
//!
//! // Send a request.
//! let syn = framer.serialize_frame(&Frame::SynStream {
//!     stream_id: 1,
//!     associated_stream_id: 0,
//!     priority: 0,
//!     fin: true,
//!     unidirectional: false,
//!     headers: [(":method", "GET"), (":path", "/")].into_iter().collect(),
//! })?;
//! transport_send(&syn);
//!
//! // Feed received bytes; events arrive on the visitor.
//! let consumed = framer.process_input(&mut visitor, &received);
//! if consumed < received.len() {
//!     eprintln!("framer error: {:?}", framer.error());
//! }
//! ```

pub mod buffer;
pub mod codec;
pub mod dictionary;
pub mod error;
pub mod frame;
pub mod framer;
pub mod protocol;
mod serializer;
pub mod validator;

pub use codec::HeaderBlock;
pub use error::SpdyError;
pub use frame::{Frame, Setting};
pub use framer::{FramerDebugVisitor, FramerVisitor, ParserState, SpdyFramer};
pub use protocol::{
    FrameType, GoAwayStatus, RstStreamStatus, SettingId, SpdyVersion,
};
