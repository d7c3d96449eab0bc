//! Incremental SPDY frame parser.
//!
//! [`SpdyFramer`] consumes wire bytes in arbitrary slices and surfaces frame
//! events through a [`FramerVisitor`]. Only fixed-size frame prefixes are
//! buffered internally; data payloads, header block bytes, and GOAWAY /
//! RST_STREAM opaque trailers are forwarded as they arrive. One framer handles
//! one direction of one connection since the header compression context is
//! connection-scoped.

use std::cmp;

use log::{debug, trace, warn};

use crate::buffer::{FrameReader, ReadError};
use crate::codec::{HeaderCodec, HEADER_DATA_CHUNK_MAX_SIZE};
use crate::error::SpdyError;
use crate::protocol::{
    unpack_priority, FrameType, GoAwayStatus, RstStreamStatus, SettingId,
    SettingsFlagsAndId, SpdyVersion, CONTROL_FLAG_FIN, CONTROL_FLAG_MASK,
    CONTROL_FLAG_UNIDIRECTIONAL, DATA_FLAG_FIN, FRAME_HEADER_LEN,
    HEADERS_FLAG_END_HEADERS, HEADERS_FLAG_PRIORITY, INVALID_STREAM_ID,
    PING_FLAG_ACK, PUSH_PROMISE_FLAG_END_PUSH_PROMISE, SETTINGS_FLAG_ACK,
    SETTINGS_FLAG_CLEAR_PREVIOUSLY_PERSISTED_SETTINGS,
    SETTINGS_FLAG_PERSISTED, SETTINGS_FLAG_PLEASE_PERSIST,
};
use crate::validator;

/// Largest control frame the parser accepts, header included. This bounds
/// the compressed header block a peer can make us inflate.
pub const DEFAULT_MAX_CONTROL_FRAME_SIZE: usize = 16 * 1024;

/// A frame whose payload exceeds this is suspicious enough to log about.
const UNLIKELY_FRAME_PAYLOAD_SIZE: usize = 1_000_000;

fn invalid(_: ReadError) -> SpdyError {
    SpdyError::InvalidControlFrame
}

/// Callbacks raised while parsing.
///
/// Header blocks are not reassembled by the framer: the visitor receives the
/// decompressed bytes via `on_control_frame_header_data` in chunks of at most
/// [`HEADER_DATA_CHUNK_MAX_SIZE`], terminated by a `None` delivery, and can
/// decode them with [`crate::codec::parse_header_block`]. Callbacks that
/// return `bool` abort the current frame when they return `false`.
pub trait FramerVisitor {
    /// The framer entered the error state. `process_input` will consume no
    /// further bytes until [`SpdyFramer::reset`].
    fn on_error(&mut self, _error: SpdyError) {}

    fn on_data_frame_header(&mut self, _stream_id: u32, _length: usize, _fin: bool) {}

    /// A slice of data frame payload. A final call with `data == None` and
    /// `fin == true` marks the end of the stream; it is also raised for
    /// header-bearing frames that carry the FIN flag.
    fn on_stream_frame_data(&mut self, _stream_id: u32, _data: Option<&[u8]>, _fin: bool) {}

    /// A chunk of decompressed header block bytes, or `None` once the block
    /// is complete. Returning `false` treats the block as too large.
    fn on_control_frame_header_data(&mut self, _stream_id: u32, _data: Option<&[u8]>) -> bool {
        true
    }

    fn on_syn_stream(
        &mut self,
        _stream_id: u32,
        _associated_stream_id: u32,
        _priority: u8,
        _fin: bool,
        _unidirectional: bool,
    ) {
    }

    fn on_syn_reply(&mut self, _stream_id: u32, _fin: bool) {}

    fn on_headers(&mut self, _stream_id: u32, _fin: bool, _end_headers: bool) {}

    fn on_push_promise(
        &mut self,
        _stream_id: u32,
        _promised_stream_id: u32,
        _end_push_promise: bool,
    ) {
    }

    fn on_continuation(&mut self, _stream_id: u32, _end_headers: bool) {}

    fn on_settings(&mut self, _clear_persisted: bool) {}

    fn on_setting(&mut self, _id: SettingId, _flags: u8, _value: u32) {}

    fn on_settings_ack(&mut self) {}

    fn on_settings_end(&mut self) {}

    fn on_ping(&mut self, _id: u64, _ack: bool) {}

    fn on_go_away(&mut self, _last_good_stream_id: u32, _status: GoAwayStatus) {}

    /// Opaque GOAWAY trailer bytes (v4), terminated by a `None` delivery.
    /// Returning `false` marks the frame corrupt.
    fn on_go_away_frame_data(&mut self, _data: Option<&[u8]>) -> bool {
        true
    }

    fn on_rst_stream(&mut self, _stream_id: u32, _status: RstStreamStatus) {}

    /// Opaque RST_STREAM trailer bytes (v4), terminated by a `None` delivery.
    /// Returning `false` marks the frame corrupt.
    fn on_rst_stream_frame_data(&mut self, _data: Option<&[u8]>) -> bool {
        true
    }

    fn on_window_update(&mut self, _stream_id: u32, _delta: u32) {}

    fn on_blocked(&mut self, _stream_id: u32) {}
}

/// Optional telemetry about compressed header-bearing frames.
pub trait FramerDebugVisitor {
    /// A header-bearing frame was serialized; `payload_len` is the
    /// pre-compression header block size.
    fn on_send_compressed_frame(
        &mut self,
        _stream_id: u32,
        _frame_type: FrameType,
        _payload_len: usize,
        _frame_len: usize,
    ) {
    }

    /// A header-bearing frame arrived; `frame_len` is its on-wire size.
    fn on_receive_compressed_frame(
        &mut self,
        _stream_id: u32,
        _frame_type: FrameType,
        _frame_len: usize,
    ) {
    }
}

/// Parser states. The framer loops through these until it can make no
/// further progress on the bytes at hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Error,
    AutoReset,
    Reset,
    ReadingCommonHeader,
    ControlFrameBeforeHeaderBlock,
    SettingsFramePayload,
    ControlFrameHeaderBlock,
    RstStreamFramePayload,
    GoAwayFramePayload,
    ControlFramePayload,
    IgnoreRemainingPayload,
    ForwardStreamFrame,
}

impl ParserState {
    fn name(self) -> &'static str {
        match self {
            ParserState::Error => "ERROR",
            ParserState::AutoReset => "AUTO_RESET",
            ParserState::Reset => "RESET",
            ParserState::ReadingCommonHeader => "READING_COMMON_HEADER",
            ParserState::ControlFrameBeforeHeaderBlock => {
                "CONTROL_FRAME_BEFORE_HEADER_BLOCK"
            }
            ParserState::SettingsFramePayload => "SETTINGS_FRAME_PAYLOAD",
            ParserState::ControlFrameHeaderBlock => "CONTROL_FRAME_HEADER_BLOCK",
            ParserState::RstStreamFramePayload => "RST_STREAM_FRAME_PAYLOAD",
            ParserState::GoAwayFramePayload => "GOAWAY_FRAME_PAYLOAD",
            ParserState::ControlFramePayload => "CONTROL_FRAME_PAYLOAD",
            ParserState::IgnoreRemainingPayload => "IGNORE_REMAINING_PAYLOAD",
            ParserState::ForwardStreamFrame => "FORWARD_STREAM_FRAME",
        }
    }
}

// Reassembly scratch for SETTINGS entries split across input slices.
#[derive(Default)]
struct SettingsScratch {
    buf: [u8; 8],
    len: usize,
    last_setting_id: u32,
}

impl SettingsScratch {
    fn reset(&mut self) {
        self.len = 0;
        self.last_setting_id = 0;
    }
}

/// Incremental SPDY parser and serializer for a single protocol version.
pub struct SpdyFramer {
    state: ParserState,
    previous_state: ParserState,
    error: Option<SpdyError>,
    // Payload bytes of the current frame not yet processed.
    remaining_data: usize,
    // Fixed prefix bytes still to buffer before the header block starts.
    remaining_control_header: usize,
    // Common header plus at most the fixed type-specific prefix.
    frame_buffer: Vec<u8>,
    current_frame_type: FrameType,
    current_frame_flags: u8,
    current_frame_length: usize,
    current_stream_id: u32,
    // Stream id a CONTINUATION must arrive on, or zero.
    expect_continuation: u32,
    end_stream_when_done: bool,
    settings_scratch: SettingsScratch,
    syn_frame_processed: bool,
    probable_http_response: bool,
    max_control_frame_size: usize,
    pub(crate) version: SpdyVersion,
    pub(crate) enable_compression: bool,
    pub(crate) codec: HeaderCodec,
    pub(crate) debug_visitor: Option<Box<dyn FramerDebugVisitor>>,
}

impl SpdyFramer {
    pub fn new(version: SpdyVersion) -> Self {
        Self::with_compression(version, true)
    }

    pub fn with_compression(version: SpdyVersion, enable_compression: bool) -> Self {
        SpdyFramer {
            state: ParserState::Reset,
            previous_state: ParserState::Reset,
            error: None,
            remaining_data: 0,
            remaining_control_header: 0,
            frame_buffer: Vec::with_capacity(32),
            current_frame_type: FrameType::Data,
            current_frame_flags: 0,
            current_frame_length: 0,
            current_stream_id: INVALID_STREAM_ID,
            expect_continuation: 0,
            end_stream_when_done: false,
            settings_scratch: SettingsScratch::default(),
            syn_frame_processed: false,
            probable_http_response: false,
            max_control_frame_size: DEFAULT_MAX_CONTROL_FRAME_SIZE,
            version,
            enable_compression,
            codec: HeaderCodec::new(version),
            debug_visitor: None,
        }
    }

    pub fn version(&self) -> SpdyVersion {
        self.version
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn error(&self) -> Option<SpdyError> {
        self.error
    }

    pub fn compression_enabled(&self) -> bool {
        self.enable_compression
    }

    /// Latched when the first inbound frame looks like an "HTTP/" response;
    /// useful for diagnosing protocol negotiation failures.
    pub fn probable_http_response(&self) -> bool {
        self.probable_http_response
    }

    pub fn set_max_control_frame_size(&mut self, bytes: usize) {
        self.max_control_frame_size = bytes;
    }

    pub fn set_debug_visitor(&mut self, visitor: Box<dyn FramerDebugVisitor>) {
        self.debug_visitor = Some(visitor);
    }

    /// Return the parser to its initial state. This is the only way out of
    /// the error state; the compression contexts are deliberately left
    /// intact since they span frames.
    pub fn reset(&mut self) {
        self.reset_frame_state();
    }

    fn reset_frame_state(&mut self) {
        self.state = ParserState::Reset;
        self.previous_state = ParserState::Reset;
        self.error = None;
        self.remaining_data = 0;
        self.remaining_control_header = 0;
        self.frame_buffer.clear();
        self.current_frame_type = FrameType::Data;
        self.current_frame_flags = 0;
        self.current_frame_length = 0;
        self.current_stream_id = INVALID_STREAM_ID;
        self.settings_scratch.reset();
    }

    fn change_state(&mut self, new_state: ParserState) {
        debug_assert_ne!(self.state, new_state);
        trace!("changing state {} -> {}", self.state.name(), new_state.name());
        self.state = new_state;
    }

    fn set_error(&mut self, visitor: &mut dyn FramerVisitor, error: SpdyError) {
        self.error = Some(error);
        // Normally cleared at the end of a header block; an error can leave
        // them dangling.
        self.expect_continuation = 0;
        self.end_stream_when_done = false;
        self.change_state(ParserState::Error);
        visitor.on_error(error);
    }

    /// Feed wire bytes to the parser, raising visitor callbacks as frames
    /// complete. Returns the number of bytes consumed; check [`error`] after
    /// a call that consumed less than `data.len()`.
    ///
    /// [`error`]: SpdyFramer::error
    pub fn process_input(
        &mut self,
        visitor: &mut dyn FramerVisitor,
        data: &[u8],
    ) -> usize {
        let original_len = data.len();
        let mut data = data;
        loop {
            self.previous_state = self.state;
            match self.state {
                ParserState::Error => break,
                ParserState::AutoReset | ParserState::Reset => {
                    self.reset_frame_state();
                    if !data.is_empty() {
                        self.change_state(ParserState::ReadingCommonHeader);
                    }
                }
                ParserState::ReadingCommonHeader => {
                    let n = self.process_common_header(visitor, data);
                    data = &data[n..];
                }
                ParserState::ControlFrameBeforeHeaderBlock => {
                    let n = self.process_control_frame_before_header_block(visitor, data);
                    data = &data[n..];
                }
                ParserState::SettingsFramePayload => {
                    let n = self.process_settings_frame_payload(visitor, data);
                    data = &data[n..];
                }
                ParserState::ControlFrameHeaderBlock => {
                    let n = self.process_control_frame_header_block(visitor, data);
                    data = &data[n..];
                }
                ParserState::RstStreamFramePayload => {
                    let n = self.process_rst_stream_frame_payload(visitor, data);
                    data = &data[n..];
                }
                ParserState::GoAwayFramePayload => {
                    let n = self.process_goaway_frame_payload(visitor, data);
                    data = &data[n..];
                }
                ParserState::ControlFramePayload => {
                    let n = self.process_control_frame_payload(visitor, data);
                    data = &data[n..];
                }
                ParserState::IgnoreRemainingPayload | ParserState::ForwardStreamFrame => {
                    let n = self.process_data_frame_payload(visitor, data);
                    data = &data[n..];
                }
            }
            if self.state == self.previous_state {
                break;
            }
        }
        original_len - data.len()
    }

    // -- Common header --

    // Parses the buffered 8-byte header into the current-frame fields and
    // returns (is_control, wire_version, raw_type).
    fn parse_common_header(
        &mut self,
        header: &[u8],
    ) -> Result<(bool, u16, u16), ReadError> {
        let mut reader = FrameReader::new(header);
        if !self.version.has_explicit_frame_type() {
            let version_field = reader.read_u16()?;
            let is_control = version_field & CONTROL_FLAG_MASK != 0;
            let wire_version = version_field & !CONTROL_FLAG_MASK;
            let raw_type = if is_control {
                reader.read_u16()?
            } else {
                reader.rewind();
                self.current_stream_id = reader.read_u31()?;
                0
            };
            self.current_frame_flags = reader.read_u8()?;
            let length_field = reader.read_u24()? as usize;
            self.remaining_data = length_field;
            self.current_frame_length = length_field + reader.bytes_consumed();
            Ok((is_control, wire_version, raw_type))
        } else {
            let length_field = usize::from(reader.read_u16()?);
            self.current_frame_length = length_field;
            let raw_type = u16::from(reader.read_u8()?);
            let is_control = raw_type != FrameType::Data.wire_value();
            self.current_frame_flags = reader.read_u8()?;
            self.current_stream_id = reader.read_u31()?;
            // A length that does not cover the header itself is garbage.
            self.remaining_data = length_field
                .checked_sub(reader.bytes_consumed())
                .ok_or(ReadError)?;
            Ok((is_control, self.version.number(), raw_type))
        }
    }

    fn process_common_header(
        &mut self,
        visitor: &mut dyn FramerVisitor,
        data: &[u8],
    ) -> usize {
        let mut rest = data;
        if self.frame_buffer.len() < FRAME_HEADER_LEN {
            let take = cmp::min(rest.len(), FRAME_HEADER_LEN - self.frame_buffer.len());
            self.frame_buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
        }
        let consumed = data.len() - rest.len();
        if self.frame_buffer.len() < FRAME_HEADER_LEN {
            return consumed;
        }

        let mut header = [0u8; FRAME_HEADER_LEN];
        header.copy_from_slice(&self.frame_buffer[..FRAME_HEADER_LEN]);
        self.current_frame_type = FrameType::Data;
        let (is_control, wire_version, raw_type) =
            match self.parse_common_header(&header) {
                Ok(parsed) => parsed,
                Err(_) => {
                    self.set_error(visitor, SpdyError::InvalidControlFrame);
                    return consumed;
                }
            };

        if self.version.has_explicit_frame_type() {
            // A started header block must run to completion before any other
            // frame is accepted.
            let is_continuation = raw_type == FrameType::Continuation.wire_value();
            if self.expect_continuation != 0 && !is_continuation {
                debug!(
                    "expected CONTINUATION on stream {}, got frame type {}",
                    self.expect_continuation, raw_type
                );
                self.set_error(visitor, SpdyError::UnexpectedFrame);
                return consumed;
            }
            if is_continuation && self.expect_continuation == 0 {
                debug!("unexpected CONTINUATION frame");
                self.set_error(visitor, SpdyError::UnexpectedFrame);
                return consumed;
            }
        }

        if self.remaining_data > UNLIKELY_FRAME_PAYLOAD_SIZE {
            if !self.syn_frame_processed && self.frame_buffer.starts_with(b"HTTP/") {
                warn!("unexpected HTTP response to SPDY request");
                self.probable_http_response = true;
            } else {
                warn!(
                    "unexpectedly large frame ({} bytes); session is likely corrupt",
                    self.remaining_data
                );
            }
        }

        if !is_control {
            if self.current_frame_flags & !DATA_FLAG_FIN != 0 {
                self.set_error(visitor, SpdyError::InvalidDataFrameFlags);
            } else {
                let fin = self.current_frame_flags & DATA_FLAG_FIN != 0;
                visitor.on_data_frame_header(
                    self.current_stream_id,
                    self.remaining_data,
                    fin,
                );
                if self.remaining_data > 0 {
                    self.change_state(ParserState::ForwardStreamFrame);
                } else {
                    // Empty data frame.
                    if fin {
                        visitor.on_stream_frame_data(self.current_stream_id, None, true);
                    }
                    self.change_state(ParserState::AutoReset);
                }
            }
        } else if wire_version != self.version.number() {
            // Version is checked before structure: a version is never
            // invalid, only unsupported.
            debug!(
                "unsupported SPDY version {} (expected {})",
                wire_version,
                self.version.number()
            );
            self.set_error(visitor, SpdyError::UnsupportedVersion);
        } else {
            self.process_control_frame_header(visitor, raw_type);
        }
        consumed
    }

    fn process_control_frame_header(
        &mut self,
        visitor: &mut dyn FramerVisitor,
        raw_type: u16,
    ) {
        let frame_type = match FrameType::from_wire(raw_type) {
            Some(t) if t != FrameType::Data => t,
            _ => {
                self.set_error(visitor, SpdyError::InvalidControlFrame);
                return;
            }
        };
        self.current_frame_type = frame_type;

        if frame_type == FrameType::Noop {
            debug!("NOOP control frame found, ignoring");
            self.change_state(ParserState::AutoReset);
            return;
        }
        if frame_type == FrameType::Credential {
            debug!("CREDENTIAL control frame found, ignoring");
            self.change_state(ParserState::IgnoreRemainingPayload);
            return;
        }

        if let Err(e) = validator::validate_control_frame(
            frame_type,
            self.current_frame_flags,
            self.current_frame_length,
            self.version,
        ) {
            self.set_error(visitor, e);
            return;
        }

        if self.current_frame_length > self.max_control_frame_size {
            warn!(
                "control frame too large: {} bytes (limit {})",
                self.current_frame_length, self.max_control_frame_size
            );
            self.set_error(visitor, SpdyError::ControlPayloadTooLarge);
            return;
        }

        if frame_type == FrameType::GoAway {
            self.change_state(ParserState::GoAwayFramePayload);
            return;
        }
        if frame_type == FrameType::RstStream {
            self.change_state(ParserState::RstStreamFramePayload);
            return;
        }

        // Frames with variable-length tails buffer their fixed prefix first.
        let fixed_prefix = match frame_type {
            FrameType::SynStream | FrameType::SynReply => {
                self.syn_frame_processed = true;
                Some(validator::minimum_size(frame_type, self.version))
            }
            FrameType::Settings
            | FrameType::PushPromise
            | FrameType::Continuation => {
                Some(validator::minimum_size(frame_type, self.version))
            }
            FrameType::Headers => {
                let mut size = validator::minimum_size(frame_type, self.version);
                if self.version.has_explicit_frame_type()
                    && self.current_frame_flags & HEADERS_FLAG_PRIORITY != 0
                {
                    size += 4;
                }
                Some(size)
            }
            _ => None,
        };

        match fixed_prefix {
            Some(prefix) => {
                self.remaining_control_header = prefix - self.frame_buffer.len();
                self.change_state(ParserState::ControlFrameBeforeHeaderBlock);
            }
            None => self.change_state(ParserState::ControlFramePayload),
        }
    }

    // -- Fixed prefix of header-bearing frames and SETTINGS --

    fn process_control_frame_before_header_block(
        &mut self,
        visitor: &mut dyn FramerVisitor,
        data: &[u8],
    ) -> usize {
        let mut rest = data;
        if self.remaining_control_header > 0 {
            let take = cmp::min(rest.len(), self.remaining_control_header);
            self.frame_buffer.extend_from_slice(&rest[..take]);
            self.remaining_control_header -= take;
            self.remaining_data -= take;
            rest = &rest[take..];
        }
        let consumed = data.len() - rest.len();
        if self.remaining_control_header == 0 {
            if let Err(e) = self.finish_control_frame_prefix(visitor) {
                self.set_error(visitor, e);
            }
        }
        consumed
    }

    fn finish_control_frame_prefix(
        &mut self,
        visitor: &mut dyn FramerVisitor,
    ) -> Result<(), SpdyError> {
        let mut prefix = [0u8; 24];
        let n = self.frame_buffer.len();
        prefix[..n].copy_from_slice(&self.frame_buffer);
        let mut reader = FrameReader::new(&prefix[..n]);
        reader.seek(FRAME_HEADER_LEN).map_err(invalid)?;

        let fin = self.current_frame_flags & CONTROL_FLAG_FIN != 0;
        match self.current_frame_type {
            FrameType::SynStream => {
                self.current_stream_id = reader.read_u31().map_err(invalid)?;
                if self.current_stream_id == INVALID_STREAM_ID {
                    return Err(SpdyError::InvalidControlFrame);
                }
                let associated_stream_id = reader.read_u31().map_err(invalid)?;
                let priority =
                    unpack_priority(self.version, reader.read_u8().map_err(invalid)?);
                // Unused byte, formerly the SPDY/3 credential slot.
                reader.seek(1).map_err(invalid)?;
                if let Some(dv) = self.debug_visitor.as_mut() {
                    dv.on_receive_compressed_frame(
                        self.current_stream_id,
                        self.current_frame_type,
                        self.current_frame_length,
                    );
                }
                visitor.on_syn_stream(
                    self.current_stream_id,
                    associated_stream_id,
                    priority,
                    fin,
                    self.current_frame_flags & CONTROL_FLAG_UNIDIRECTIONAL != 0,
                );
                self.change_state(ParserState::ControlFrameHeaderBlock);
            }
            FrameType::Settings => {
                if self.version.has_explicit_frame_type()
                    && self.current_frame_flags & SETTINGS_FLAG_ACK != 0
                {
                    visitor.on_settings_ack();
                    self.change_state(ParserState::AutoReset);
                } else {
                    // The pre-v4 entry count prefix is buffered but not
                    // consulted; entries are validated individually.
                    visitor.on_settings(
                        self.current_frame_flags
                            & SETTINGS_FLAG_CLEAR_PREVIOUSLY_PERSISTED_SETTINGS
                            != 0,
                    );
                    self.change_state(ParserState::SettingsFramePayload);
                }
            }
            FrameType::SynReply | FrameType::Headers => {
                if !self.version.has_explicit_frame_type() {
                    self.current_stream_id = reader.read_u31().map_err(invalid)?;
                }
                if self.current_stream_id == INVALID_STREAM_ID {
                    return Err(SpdyError::InvalidControlFrame);
                }
                if self.version < SpdyVersion::V3 {
                    // Two unused bytes in SPDY/2.
                    reader.seek(2).map_err(invalid)?;
                }
                if self.version.has_explicit_frame_type()
                    && self.current_frame_flags & HEADERS_FLAG_END_HEADERS == 0
                    && self.current_frame_type == FrameType::Headers
                {
                    self.expect_continuation = self.current_stream_id;
                    self.end_stream_when_done = fin;
                }
                let has_priority =
                    self.current_frame_flags & HEADERS_FLAG_PRIORITY != 0;
                let mut priority = 0;
                if self.version.has_explicit_frame_type() && has_priority {
                    priority = reader.read_u31().map_err(invalid)?;
                }
                if let Some(dv) = self.debug_visitor.as_mut() {
                    // v4 reports HEADERS with priority as SYN_STREAM.
                    let reported_type = if has_priority
                        && self.version.has_explicit_frame_type()
                    {
                        FrameType::SynStream
                    } else {
                        self.current_frame_type
                    };
                    dv.on_receive_compressed_frame(
                        self.current_stream_id,
                        reported_type,
                        self.current_frame_length,
                    );
                }
                if self.current_frame_type == FrameType::SynReply {
                    visitor.on_syn_reply(self.current_stream_id, fin);
                } else if self.version.has_explicit_frame_type() && has_priority {
                    // v4 has no SYN_STREAM on the wire; surface the
                    // equivalent callback so consumers see one API.
                    visitor.on_syn_stream(
                        self.current_stream_id,
                        INVALID_STREAM_ID,
                        priority as u8,
                        fin,
                        false,
                    );
                } else {
                    visitor.on_headers(
                        self.current_stream_id,
                        fin,
                        self.expect_continuation == 0,
                    );
                }
                self.change_state(ParserState::ControlFrameHeaderBlock);
            }
            FrameType::PushPromise => {
                if self.current_stream_id == INVALID_STREAM_ID {
                    return Err(SpdyError::InvalidControlFrame);
                }
                let promised_stream_id = reader.read_u31().map_err(invalid)?;
                if promised_stream_id == INVALID_STREAM_ID {
                    return Err(SpdyError::InvalidControlFrame);
                }
                let end_push_promise = self.current_frame_flags
                    & PUSH_PROMISE_FLAG_END_PUSH_PROMISE
                    != 0;
                if !end_push_promise {
                    self.expect_continuation = self.current_stream_id;
                }
                if let Some(dv) = self.debug_visitor.as_mut() {
                    dv.on_receive_compressed_frame(
                        self.current_stream_id,
                        self.current_frame_type,
                        self.current_frame_length,
                    );
                }
                visitor.on_push_promise(
                    self.current_stream_id,
                    promised_stream_id,
                    end_push_promise,
                );
                self.change_state(ParserState::ControlFrameHeaderBlock);
            }
            FrameType::Continuation => {
                // The continuation must stay on the stream that opened the
                // header block; a hop is a sequencing violation, not a
                // malformed frame.
                if self.current_stream_id != self.expect_continuation {
                    return Err(SpdyError::UnexpectedFrame);
                }
                let end_headers =
                    self.current_frame_flags & HEADERS_FLAG_END_HEADERS != 0;
                if end_headers {
                    self.expect_continuation = 0;
                }
                if let Some(dv) = self.debug_visitor.as_mut() {
                    dv.on_receive_compressed_frame(
                        self.current_stream_id,
                        self.current_frame_type,
                        self.current_frame_length,
                    );
                }
                visitor.on_continuation(self.current_stream_id, end_headers);
                self.change_state(ParserState::ControlFrameHeaderBlock);
            }
            _ => return Err(SpdyError::InvalidControlFrame),
        }
        Ok(())
    }

    // -- Header block bytes --

    fn process_control_frame_header_block(
        &mut self,
        visitor: &mut dyn FramerVisitor,
        data: &[u8],
    ) -> usize {
        let data_len = data.len();
        let process_bytes = cmp::min(data_len, self.remaining_data);
        let mut ok = true;
        if process_bytes > 0 {
            let stream_id = self.current_stream_id;
            if self.enable_compression {
                let result =
                    self.codec.decompress_chunk(&data[..process_bytes], &mut |chunk| {
                        visitor.on_control_frame_header_data(stream_id, Some(chunk))
                    });
                match result {
                    Ok(true) => {}
                    Ok(false) => {
                        // The visitor gave up; assume the block was too big
                        // for it.
                        ok = false;
                        self.set_error(visitor, SpdyError::ControlPayloadTooLarge);
                    }
                    Err(e) => {
                        ok = false;
                        self.set_error(visitor, e);
                    }
                }
            } else {
                for chunk in data[..process_bytes].chunks(HEADER_DATA_CHUNK_MAX_SIZE) {
                    if !visitor.on_control_frame_header_data(stream_id, Some(chunk)) {
                        ok = false;
                        self.set_error(visitor, SpdyError::ControlPayloadTooLarge);
                        break;
                    }
                }
            }
            self.remaining_data -= process_bytes;
        }

        if self.remaining_data == 0 && ok {
            if self.expect_continuation == 0 {
                // Signal the end of the header block.
                visitor.on_control_frame_header_data(self.current_stream_id, None);
                if self.current_frame_flags & CONTROL_FLAG_FIN != 0
                    || self.end_stream_when_done
                {
                    self.end_stream_when_done = false;
                    visitor.on_stream_frame_data(self.current_stream_id, None, true);
                }
            }
            self.change_state(ParserState::AutoReset);
        }

        if ok {
            process_bytes
        } else {
            data_len
        }
    }

    // -- SETTINGS entries --

    fn process_settings_frame_payload(
        &mut self,
        visitor: &mut dyn FramerVisitor,
        data: &[u8],
    ) -> usize {
        let entry_size = validator::settings_entry_size(self.version);
        let mut unprocessed = cmp::min(data.len(), self.remaining_data);
        let mut processed = 0;

        while unprocessed > 0 {
            let processing =
                cmp::min(unprocessed, entry_size - self.settings_scratch.len);
            if processing == entry_size {
                // A whole entry is available in the input; parse it in place.
                if !self.process_setting(visitor, &data[processed..processed + entry_size])
                {
                    self.set_error(visitor, SpdyError::InvalidControlFrame);
                    return processed;
                }
            } else {
                let len = self.settings_scratch.len;
                self.settings_scratch.buf[len..len + processing]
                    .copy_from_slice(&data[processed..processed + processing]);
                self.settings_scratch.len += processing;
                if self.settings_scratch.len == entry_size {
                    let entry = self.settings_scratch.buf;
                    if !self.process_setting(visitor, &entry[..entry_size]) {
                        self.set_error(visitor, SpdyError::InvalidControlFrame);
                        return processed;
                    }
                    self.settings_scratch.len = 0;
                }
            }
            unprocessed -= processing;
            processed += processing;
        }

        self.remaining_data -= processed;
        if self.remaining_data == 0 {
            visitor.on_settings_end();
            self.change_state(ParserState::AutoReset);
        }
        processed
    }

    fn process_setting(&mut self, visitor: &mut dyn FramerVisitor, entry: &[u8]) -> bool {
        let (raw_id, flags, value) = if !self.version.has_explicit_frame_type() {
            let word = SettingsFlagsAndId::from_wire(
                self.version,
                [entry[0], entry[1], entry[2], entry[3]],
            );
            let value =
                u32::from_be_bytes([entry[4], entry[5], entry[6], entry[7]]);
            (word.id, word.flags, value)
        } else {
            let value =
                u32::from_be_bytes([entry[1], entry[2], entry[3], entry[4]]);
            (u32::from(entry[0]), 0, value)
        };

        let id = match SettingId::from_wire(raw_id) {
            Some(id) => id,
            None => {
                warn!("unknown SETTINGS id {raw_id}");
                return false;
            }
        };

        if !self.version.has_explicit_frame_type() {
            // Entries must arrive in strictly increasing id order; this also
            // rejects duplicates.
            if raw_id <= self.settings_scratch.last_setting_id {
                warn!(
                    "SETTINGS id {} out of order (last was {})",
                    raw_id, self.settings_scratch.last_setting_id
                );
                return false;
            }
            self.settings_scratch.last_setting_id = raw_id;

            let legal = SETTINGS_FLAG_PLEASE_PERSIST | SETTINGS_FLAG_PERSISTED;
            if flags & !legal != 0 {
                warn!("unknown SETTINGS flags {flags:#x} for id {raw_id}");
                return false;
            }
        }

        visitor.on_setting(id, flags, value);
        true
    }

    // -- Small fixed-size payloads (PING, WINDOW_UPDATE, BLOCKED) --

    fn process_control_frame_payload(
        &mut self,
        visitor: &mut dyn FramerVisitor,
        data: &[u8],
    ) -> usize {
        let take = cmp::min(data.len(), self.remaining_data);
        self.frame_buffer.extend_from_slice(&data[..take]);
        self.remaining_data -= take;
        if self.remaining_data == 0 {
            match self.finish_control_frame_payload(visitor) {
                Ok(()) => self.change_state(ParserState::IgnoreRemainingPayload),
                Err(e) => self.set_error(visitor, e),
            }
        }
        take
    }

    fn finish_control_frame_payload(
        &mut self,
        visitor: &mut dyn FramerVisitor,
    ) -> Result<(), SpdyError> {
        let mut payload = [0u8; 16];
        let n = self.frame_buffer.len();
        payload[..n].copy_from_slice(&self.frame_buffer);
        let mut reader = FrameReader::new(&payload[..n]);
        reader.seek(FRAME_HEADER_LEN).map_err(invalid)?;

        match self.current_frame_type {
            FrameType::Ping => {
                let (id, ack) = if !self.version.has_explicit_frame_type() {
                    (u64::from(reader.read_u32().map_err(invalid)?), false)
                } else {
                    (
                        reader.read_u64().map_err(invalid)?,
                        self.current_frame_flags & PING_FLAG_ACK != 0,
                    )
                };
                visitor.on_ping(id, ack);
            }
            FrameType::WindowUpdate => {
                if !self.version.has_explicit_frame_type() {
                    self.current_stream_id = reader.read_u31().map_err(invalid)?;
                }
                let delta = reader.read_u32().map_err(invalid)?;
                visitor.on_window_update(self.current_stream_id, delta);
            }
            FrameType::Blocked => {
                visitor.on_blocked(self.current_stream_id);
            }
            _ => return Err(SpdyError::InvalidControlFrame),
        }
        Ok(())
    }

    // -- GOAWAY / RST_STREAM with streamed opaque trailers --

    fn process_goaway_frame_payload(
        &mut self,
        visitor: &mut dyn FramerVisitor,
        data: &[u8],
    ) -> usize {
        if data.is_empty() {
            return 0;
        }
        let len = cmp::min(data.len(), self.remaining_data);
        let mut rest = &data[..len];

        let header_size = validator::minimum_size(FrameType::GoAway, self.version);
        if self.frame_buffer.len() < header_size {
            let take = cmp::min(rest.len(), header_size - self.frame_buffer.len());
            self.frame_buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.frame_buffer.len() == header_size {
                if let Err(e) = self.finish_goaway_header(visitor) {
                    self.set_error(visitor, e);
                    return len;
                }
            }
        }

        let mut ok = true;
        if !rest.is_empty() {
            ok = visitor.on_go_away_frame_data(Some(rest));
        }
        self.remaining_data -= len;
        if !ok {
            self.set_error(visitor, SpdyError::GoAwayFrameCorrupt);
        } else if self.remaining_data == 0 {
            // Signal the end of the opaque data.
            visitor.on_go_away_frame_data(None);
            self.change_state(ParserState::AutoReset);
        }
        len
    }

    fn finish_goaway_header(
        &mut self,
        visitor: &mut dyn FramerVisitor,
    ) -> Result<(), SpdyError> {
        let mut payload = [0u8; 16];
        let n = self.frame_buffer.len();
        payload[..n].copy_from_slice(&self.frame_buffer);
        let mut reader = FrameReader::new(&payload[..n]);
        reader.seek(FRAME_HEADER_LEN).map_err(invalid)?;

        self.current_stream_id = reader.read_u31().map_err(invalid)?;
        let mut status = GoAwayStatus::Ok;
        if self.version >= SpdyVersion::V3 {
            let raw = reader.read_u32().map_err(invalid)?;
            // Stay liberal about unknown status codes.
            status = GoAwayStatus::from_wire(raw);
        }
        visitor.on_go_away(self.current_stream_id, status);
        Ok(())
    }

    fn process_rst_stream_frame_payload(
        &mut self,
        visitor: &mut dyn FramerVisitor,
        data: &[u8],
    ) -> usize {
        if data.is_empty() {
            return 0;
        }
        let len = cmp::min(data.len(), self.remaining_data);
        let mut rest = &data[..len];

        let header_size = validator::minimum_size(FrameType::RstStream, self.version);
        if self.frame_buffer.len() < header_size {
            let take = cmp::min(rest.len(), header_size - self.frame_buffer.len());
            self.frame_buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.frame_buffer.len() == header_size {
                if let Err(e) = self.finish_rst_stream_header(visitor) {
                    self.set_error(visitor, e);
                    return len;
                }
            }
        }

        let mut ok = true;
        if !rest.is_empty() {
            ok = visitor.on_rst_stream_frame_data(Some(rest));
        }
        self.remaining_data -= len;
        if !ok {
            self.set_error(visitor, SpdyError::RstStreamFrameCorrupt);
        } else if self.remaining_data == 0 {
            visitor.on_rst_stream_frame_data(None);
            self.change_state(ParserState::AutoReset);
        }
        len
    }

    fn finish_rst_stream_header(
        &mut self,
        visitor: &mut dyn FramerVisitor,
    ) -> Result<(), SpdyError> {
        let mut payload = [0u8; 16];
        let n = self.frame_buffer.len();
        payload[..n].copy_from_slice(&self.frame_buffer);
        let mut reader = FrameReader::new(&payload[..n]);
        reader.seek(FRAME_HEADER_LEN).map_err(invalid)?;

        if !self.version.has_explicit_frame_type() {
            self.current_stream_id = reader.read_u31().map_err(invalid)?;
        }
        let raw = reader.read_u32().map_err(invalid)?;
        // Stay liberal about unknown status codes.
        let status = RstStreamStatus::from_wire(raw);
        visitor.on_rst_stream(self.current_stream_id, status);
        Ok(())
    }

    // -- Data payloads and ignored remainders --

    fn process_data_frame_payload(
        &mut self,
        visitor: &mut dyn FramerVisitor,
        data: &[u8],
    ) -> usize {
        let mut rest = data;
        if self.remaining_data > 0 {
            let amount = cmp::min(self.remaining_data, rest.len());
            if amount > 0 && self.state != ParserState::IgnoreRemainingPayload {
                visitor.on_stream_frame_data(
                    self.current_stream_id,
                    Some(&rest[..amount]),
                    false,
                );
            }
            rest = &rest[amount..];
            self.remaining_data -= amount;

            // Signal EOF via an empty delivery once the payload is drained.
            if self.remaining_data == 0 && self.current_frame_flags & DATA_FLAG_FIN != 0 {
                visitor.on_stream_frame_data(self.current_stream_id, None, true);
            }
        }
        if self.remaining_data == 0 {
            self.change_state(ParserState::AutoReset);
        }
        data.len() - rest.len()
    }
}
