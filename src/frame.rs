//! Typed SPDY frames.
//!
//! Pre-v4 frames have a fixed 8-byte header in one of two layouts:
//! ```text
//! +----------------------------------+      +----------------------------------+
//! |C|  Version (15)  |   Type (16)   |      |C|       Stream-ID (31)           |
//! +----------------------------------+      +----------------------------------+
//! | Flags (8) |      Length (24)     |      | Flags (8) |      Length (24)     |
//! +----------------------------------+      +----------------------------------+
//! |        Control payload ...       |      |         Data payload ...         |
//! +----------------------------------+      +----------------------------------+
//! ```
//! v4 unifies both into length (16), type (8), flags (8), stream id (31).
//!
//! The variants here are the post-parse/pre-serialize representation; the
//! parse side of the crate is callback-driven (see [`crate::framer`]) and
//! only the serializer consumes these values whole.

use crate::codec::HeaderBlock;
use crate::protocol::{GoAwayStatus, RstStreamStatus, SettingId};

/// One SETTINGS entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub id: SettingId,
    /// Per-entry persistence flags; meaningful before v4 only.
    pub flags: u8,
    pub value: u32,
}

impl Setting {
    pub fn new(id: SettingId, value: u32) -> Self {
        Setting { id, flags: 0, value }
    }
}

/// A SPDY frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// DATA: stream payload bytes.
    Data {
        stream_id: u32,
        data: Vec<u8>,
        fin: bool,
    },
    /// SYN_STREAM: opens a stream. At v4 this serializes as HEADERS with the
    /// priority flag set.
    SynStream {
        stream_id: u32,
        associated_stream_id: u32,
        priority: u8,
        fin: bool,
        unidirectional: bool,
        headers: HeaderBlock,
    },
    /// SYN_REPLY: response headers on an open stream (pre-v4 only).
    SynReply {
        stream_id: u32,
        fin: bool,
        headers: HeaderBlock,
    },
    /// RST_STREAM: abnormal stream termination.
    RstStream {
        stream_id: u32,
        status: RstStreamStatus,
        /// Opaque diagnostic bytes; carried on v4 only.
        description: Vec<u8>,
    },
    /// SETTINGS: connection configuration entries.
    Settings {
        /// Pre-v4 clear-previously-persisted flag.
        clear_persisted: bool,
        /// v4 acknowledgement; an ACK carries no entries.
        ack: bool,
        entries: Vec<Setting>,
    },
    /// PING: liveness probe. The id is 32 bits before v4.
    Ping { id: u64, ack: bool },
    /// GOAWAY: connection shutdown notice.
    GoAway {
        last_good_stream_id: u32,
        /// Ignored at SPDY/2, which has no status field.
        status: GoAwayStatus,
        /// Opaque diagnostic bytes; carried on v4 only.
        description: Vec<u8>,
    },
    /// HEADERS: additional headers on an open stream.
    Headers {
        stream_id: u32,
        fin: bool,
        /// v4 end-of-header-block flag; implied before v4.
        end_headers: bool,
        /// v4 priority field; emitting it sets the priority flag.
        priority: Option<u32>,
        headers: HeaderBlock,
    },
    /// WINDOW_UPDATE: flow control window increment.
    WindowUpdate { stream_id: u32, delta: u32 },
    /// BLOCKED: flow-control stall notice (v4 only).
    Blocked { stream_id: u32 },
    /// PUSH_PROMISE: reserves a pushed stream (v4 only).
    PushPromise {
        stream_id: u32,
        promised_stream_id: u32,
        end_push_promise: bool,
        headers: HeaderBlock,
    },
    /// CONTINUATION: header block fragment carried past the opening frame
    /// (v4 only).
    Continuation {
        stream_id: u32,
        end_headers: bool,
        headers: HeaderBlock,
    },
    /// NOOP: empty filler frame (SPDY/2 only); receivers discard it.
    Noop,
}
