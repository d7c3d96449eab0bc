//! Frame serialization.
//!
//! Serialization shares the framer's [`HeaderCodec`] with the parse side, so
//! a framer that serializes header-bearing frames keeps one deflate stream
//! across its lifetime. Frames whose final size depends on compression are
//! written with their uncompressed size and backpatched afterwards.
//!
//! [`HeaderCodec`]: crate::codec::HeaderCodec

use log::warn;

use crate::buffer::FrameWriter;
use crate::codec::{self, HeaderBlock};
use crate::error::SpdyError;
use crate::frame::{Frame, Setting};
use crate::framer::SpdyFramer;
use crate::protocol::{
    pack_priority, FrameType, SettingsFlagsAndId, SpdyVersion,
    CONTROL_FLAG_FIN, CONTROL_FLAG_UNIDIRECTIONAL, DATA_FLAG_FIN,
    FRAME_HEADER_LEN, HEADERS_FLAG_END_HEADERS, HEADERS_FLAG_PRIORITY,
    PING_FLAG_ACK, PUSH_PROMISE_FLAG_END_PUSH_PROMISE, SETTINGS_FLAG_ACK,
    SETTINGS_FLAG_CLEAR_PREVIOUSLY_PERSISTED_SETTINGS,
};
use crate::validator;

impl SpdyFramer {
    /// Serialize `frame` to wire bytes. Fails if the frame type does not
    /// exist in this framer's protocol version.
    pub fn serialize_frame(&mut self, frame: &Frame) -> Result<Vec<u8>, SpdyError> {
        let bytes = match frame {
            Frame::Data {
                stream_id,
                data,
                fin,
            } => {
                let flags = if *fin { DATA_FLAG_FIN } else { 0 };
                let mut w =
                    FrameWriter::new(self.version, FRAME_HEADER_LEN + data.len());
                w.write_data_frame_header(*stream_id, flags, data.len());
                w.write_bytes(data);
                Ok(w.into_bytes())
            }
            Frame::SynStream {
                stream_id,
                associated_stream_id,
                priority,
                fin,
                unidirectional,
                headers,
            } => self.serialize_syn_stream(
                *stream_id,
                *associated_stream_id,
                *priority,
                *fin,
                *unidirectional,
                headers,
            ),
            Frame::SynReply {
                stream_id,
                fin,
                headers,
            } => self.serialize_syn_reply(*stream_id, *fin, headers),
            Frame::RstStream {
                stream_id,
                status,
                description,
            } => {
                let mut w = FrameWriter::new(self.version, 32);
                if !self.version.has_explicit_frame_type() {
                    w.write_control_frame_header(FrameType::RstStream, 0, 16);
                    w.write_u32(*stream_id);
                    w.write_u32(*status as u32);
                } else {
                    w.write_frame_prefix(
                        FrameType::RstStream,
                        0,
                        *stream_id,
                        12 + description.len(),
                    );
                    w.write_u32(*status as u32);
                    w.write_bytes(description);
                }
                Ok(w.into_bytes())
            }
            Frame::Settings {
                clear_persisted,
                ack,
                entries,
            } => self.serialize_settings(*clear_persisted, *ack, entries),
            Frame::Ping { id, ack } => {
                let mut w = FrameWriter::new(self.version, 16);
                if !self.version.has_explicit_frame_type() {
                    // The id is 32 bits on the wire before v4.
                    let id = u32::try_from(*id)
                        .map_err(|_| SpdyError::InvalidControlFrame)?;
                    w.write_control_frame_header(FrameType::Ping, 0, 12);
                    w.write_u32(id);
                } else {
                    let flags = if *ack { PING_FLAG_ACK } else { 0 };
                    w.write_frame_prefix(FrameType::Ping, flags, 0, 16);
                    w.write_u64(*id);
                }
                Ok(w.into_bytes())
            }
            Frame::GoAway {
                last_good_stream_id,
                status,
                description,
            } => {
                let mut w = FrameWriter::new(self.version, 32);
                if !self.version.has_explicit_frame_type() {
                    let total =
                        validator::minimum_size(FrameType::GoAway, self.version);
                    w.write_control_frame_header(FrameType::GoAway, 0, total);
                    w.write_u32(*last_good_stream_id);
                    if self.version >= SpdyVersion::V3 {
                        w.write_u32(*status as u32);
                    }
                } else {
                    w.write_frame_prefix(
                        FrameType::GoAway,
                        0,
                        0,
                        16 + description.len(),
                    );
                    w.write_u32(*last_good_stream_id);
                    w.write_u32(*status as u32);
                    w.write_bytes(description);
                }
                Ok(w.into_bytes())
            }
            Frame::Headers {
                stream_id,
                fin,
                end_headers,
                priority,
                headers,
            } => self.serialize_headers(
                *stream_id,
                *fin,
                *end_headers,
                *priority,
                headers,
            ),
            Frame::WindowUpdate { stream_id, delta } => {
                let mut w = FrameWriter::new(self.version, 16);
                if !self.version.has_explicit_frame_type() {
                    w.write_control_frame_header(FrameType::WindowUpdate, 0, 16);
                    w.write_u32(*stream_id);
                } else {
                    w.write_frame_prefix(FrameType::WindowUpdate, 0, *stream_id, 12);
                }
                w.write_u32(*delta);
                Ok(w.into_bytes())
            }
            Frame::Blocked { stream_id } => {
                if !self.version.has_explicit_frame_type() {
                    return Err(SpdyError::InvalidControlFrame);
                }
                let mut w = FrameWriter::new(self.version, FRAME_HEADER_LEN);
                w.write_frame_prefix(FrameType::Blocked, 0, *stream_id, 8);
                Ok(w.into_bytes())
            }
            Frame::PushPromise {
                stream_id,
                promised_stream_id,
                end_push_promise,
                headers,
            } => self.serialize_push_promise(
                *stream_id,
                *promised_stream_id,
                *end_push_promise,
                headers,
            ),
            Frame::Continuation {
                stream_id,
                end_headers,
                headers,
            } => self.serialize_continuation(*stream_id, *end_headers, headers),
            Frame::Noop => {
                if self.version.has_explicit_frame_type() {
                    return Err(SpdyError::InvalidControlFrame);
                }
                let mut w = FrameWriter::new(self.version, FRAME_HEADER_LEN);
                w.write_control_frame_header(FrameType::Noop, 0, FRAME_HEADER_LEN);
                Ok(w.into_bytes())
            }
        }?;
        // The v4 length field is 16 bits and counts the header; a frame that
        // does not fit must be refused rather than written with a wrapped
        // length the peer would misframe on.
        if bytes.len() > self.version.frame_maximum_size() {
            return Err(SpdyError::FrameTooLarge);
        }
        Ok(bytes)
    }

    /// Serialize just a data frame header, for callers that splice payload
    /// bytes in from elsewhere.
    pub fn serialize_data_frame_header(
        &self,
        stream_id: u32,
        payload_len: usize,
        fin: bool,
    ) -> Vec<u8> {
        let flags = if fin { DATA_FLAG_FIN } else { 0 };
        let mut w = FrameWriter::new(self.version, FRAME_HEADER_LEN);
        w.write_data_frame_header(stream_id, flags, payload_len);
        w.into_bytes()
    }

    fn serialize_syn_stream(
        &mut self,
        stream_id: u32,
        associated_stream_id: u32,
        mut priority: u8,
        fin: bool,
        unidirectional: bool,
        headers: &HeaderBlock,
    ) -> Result<Vec<u8>, SpdyError> {
        if priority > self.version.lowest_priority() {
            warn!(
                "priority {} out of range for this version, clamping to {}",
                priority,
                self.version.lowest_priority()
            );
            priority = self.version.lowest_priority();
        }

        let block_len =
            codec::uncompressed_serialized_length(self.version, headers, true);
        let mut w = FrameWriter::new(self.version, 64 + block_len);
        if !self.version.has_explicit_frame_type() {
            let mut flags = 0;
            if fin {
                flags |= CONTROL_FLAG_FIN;
            }
            if unidirectional {
                flags |= CONTROL_FLAG_UNIDIRECTIONAL;
            }
            let total =
                validator::minimum_size(FrameType::SynStream, self.version)
                    + block_len;
            w.write_control_frame_header(FrameType::SynStream, flags, total);
            w.write_u32(stream_id);
            w.write_u32(associated_stream_id);
            w.write_u8(pack_priority(self.version, priority));
            w.write_u8(0); // unused
        } else {
            // v4 has no SYN_STREAM; it goes out as HEADERS carrying the
            // priority field.
            let mut flags = HEADERS_FLAG_PRIORITY | HEADERS_FLAG_END_HEADERS;
            if fin {
                flags |= CONTROL_FLAG_FIN;
            }
            let total = FRAME_HEADER_LEN + 4 + block_len;
            w.write_frame_prefix(FrameType::Headers, flags, stream_id, total);
            w.write_u32(u32::from(priority));
        }
        self.serialize_name_value_block(
            &mut w,
            stream_id,
            FrameType::SynStream,
            headers,
            true,
        )?;
        Ok(w.into_bytes())
    }

    fn serialize_syn_reply(
        &mut self,
        stream_id: u32,
        fin: bool,
        headers: &HeaderBlock,
    ) -> Result<Vec<u8>, SpdyError> {
        if self.version.has_explicit_frame_type() {
            // v4 response headers travel as HEADERS.
            return Err(SpdyError::InvalidControlFrame);
        }
        let flags = if fin { CONTROL_FLAG_FIN } else { 0 };
        let block_len =
            codec::uncompressed_serialized_length(self.version, headers, true);
        let total =
            validator::minimum_size(FrameType::SynReply, self.version) + block_len;
        let mut w = FrameWriter::new(self.version, total);
        w.write_control_frame_header(FrameType::SynReply, flags, total);
        w.write_u32(stream_id);
        if self.version < SpdyVersion::V3 {
            w.write_u16(0); // unused
        }
        self.serialize_name_value_block(
            &mut w,
            stream_id,
            FrameType::SynReply,
            headers,
            true,
        )?;
        Ok(w.into_bytes())
    }

    fn serialize_settings(
        &mut self,
        clear_persisted: bool,
        ack: bool,
        entries: &[Setting],
    ) -> Result<Vec<u8>, SpdyError> {
        let entry_size = validator::settings_entry_size(self.version);
        if !self.version.has_explicit_frame_type() {
            let flags = if clear_persisted {
                SETTINGS_FLAG_CLEAR_PREVIOUSLY_PERSISTED_SETTINGS
            } else {
                0
            };
            let total = validator::minimum_size(FrameType::Settings, self.version)
                + entry_size * entries.len();
            // Pre-v4 receivers require ids in increasing order within a
            // frame, so emit entries sorted regardless of caller order.
            let mut ordered: Vec<&Setting> = entries.iter().collect();
            ordered.sort_by_key(|entry| entry.id);
            let mut w = FrameWriter::new(self.version, total);
            w.write_control_frame_header(FrameType::Settings, flags, total);
            w.write_u32(entries.len() as u32);
            for entry in ordered {
                let word =
                    SettingsFlagsAndId::new(entry.flags, entry.id.wire_value());
                w.write_bytes(&word.to_wire(self.version));
                w.write_u32(entry.value);
            }
            Ok(w.into_bytes())
        } else {
            let flags = if ack { SETTINGS_FLAG_ACK } else { 0 };
            // An ACK never carries entries.
            let total = if ack {
                FRAME_HEADER_LEN
            } else {
                FRAME_HEADER_LEN + entry_size * entries.len()
            };
            let mut w = FrameWriter::new(self.version, total);
            w.write_frame_prefix(FrameType::Settings, flags, 0, total);
            if !ack {
                for entry in entries {
                    w.write_u8(entry.id.wire_value() as u8);
                    w.write_u32(entry.value);
                }
            }
            Ok(w.into_bytes())
        }
    }

    fn serialize_headers(
        &mut self,
        stream_id: u32,
        fin: bool,
        end_headers: bool,
        priority: Option<u32>,
        headers: &HeaderBlock,
    ) -> Result<Vec<u8>, SpdyError> {
        let block_len =
            codec::uncompressed_serialized_length(self.version, headers, true);
        let mut w = FrameWriter::new(self.version, 64 + block_len);
        if !self.version.has_explicit_frame_type() {
            let flags = if fin { CONTROL_FLAG_FIN } else { 0 };
            let total =
                validator::minimum_size(FrameType::Headers, self.version)
                    + block_len;
            w.write_control_frame_header(FrameType::Headers, flags, total);
            w.write_u32(stream_id);
            if self.version < SpdyVersion::V3 {
                w.write_u16(0); // unused
            }
        } else {
            let mut flags = 0;
            if fin {
                flags |= CONTROL_FLAG_FIN;
            }
            if end_headers {
                flags |= HEADERS_FLAG_END_HEADERS;
            }
            if priority.is_some() {
                flags |= HEADERS_FLAG_PRIORITY;
            }
            let priority_len = if priority.is_some() { 4 } else { 0 };
            let total = FRAME_HEADER_LEN + priority_len + block_len;
            w.write_frame_prefix(FrameType::Headers, flags, stream_id, total);
            if let Some(priority) = priority {
                w.write_u32(priority);
            }
        }
        self.serialize_name_value_block(
            &mut w,
            stream_id,
            FrameType::Headers,
            headers,
            true,
        )?;
        Ok(w.into_bytes())
    }

    fn serialize_push_promise(
        &mut self,
        stream_id: u32,
        promised_stream_id: u32,
        end_push_promise: bool,
        headers: &HeaderBlock,
    ) -> Result<Vec<u8>, SpdyError> {
        if !self.version.has_explicit_frame_type() {
            return Err(SpdyError::InvalidControlFrame);
        }
        let flags = if end_push_promise {
            PUSH_PROMISE_FLAG_END_PUSH_PROMISE
        } else {
            0
        };
        let block_len =
            codec::uncompressed_serialized_length(self.version, headers, true);
        let total = FRAME_HEADER_LEN + 4 + block_len;
        let mut w = FrameWriter::new(self.version, total);
        w.write_frame_prefix(FrameType::PushPromise, flags, stream_id, total);
        w.write_u32(promised_stream_id);
        self.serialize_name_value_block(
            &mut w,
            stream_id,
            FrameType::PushPromise,
            headers,
            true,
        )?;
        Ok(w.into_bytes())
    }

    fn serialize_continuation(
        &mut self,
        stream_id: u32,
        end_headers: bool,
        headers: &HeaderBlock,
    ) -> Result<Vec<u8>, SpdyError> {
        if !self.version.has_explicit_frame_type() {
            return Err(SpdyError::InvalidControlFrame);
        }
        let flags = if end_headers { HEADERS_FLAG_END_HEADERS } else { 0 };
        // Continuation fragments never restate the entry count.
        let block_len =
            codec::uncompressed_serialized_length(self.version, headers, false);
        let total = FRAME_HEADER_LEN + block_len;
        let mut w = FrameWriter::new(self.version, total);
        w.write_frame_prefix(FrameType::Continuation, flags, stream_id, total);
        self.serialize_name_value_block(
            &mut w,
            stream_id,
            FrameType::Continuation,
            headers,
            false,
        )?;
        Ok(w.into_bytes())
    }

    /// Append `block` to `writer`, compressed if this framer compresses, and
    /// fix up the frame length to match what was actually written.
    fn serialize_name_value_block(
        &mut self,
        writer: &mut FrameWriter,
        stream_id: u32,
        reported_type: FrameType,
        block: &HeaderBlock,
        begin_block: bool,
    ) -> Result<(), SpdyError> {
        if !self.enable_compression {
            codec::write_uncompressed(writer, self.version, block, begin_block);
            return Ok(());
        }
        let payload_len =
            codec::uncompressed_serialized_length(self.version, block, begin_block);
        let mut compressed = Vec::with_capacity(payload_len / 2 + 128);
        self.codec.compress_block(block, begin_block, &mut compressed)?;
        writer.write_bytes(&compressed);
        writer.rewrite_length();
        if let Some(dv) = self.debug_visitor.as_mut() {
            dv.on_send_compressed_frame(
                stream_id,
                reported_type,
                payload_len,
                writer.len(),
            );
        }
        Ok(())
    }
}
