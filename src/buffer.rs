//! Cursor-based structured reads and writes over frame buffers.
//!
//! All multi-byte fields are network byte order. Reads return `Result` and
//! never advance past the end of the buffer; a failed read leaves the cursor
//! untouched so callers can surface a parse error instead of panicking.

use crate::protocol::{
    FrameType, SpdyVersion, CONTROL_FLAG_MASK, FRAME_HEADER_LEN,
};

/// A structured read ran past the end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("read past end of frame buffer")]
pub struct ReadError;

/// Forward-only cursor over a borrowed frame buffer, with one level of
/// rewind (back to the start of the most recent successful read).
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
    previous_pos: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        FrameReader {
            buf,
            pos: 0,
            previous_pos: 0,
        }
    }

    pub fn bytes_consumed(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_done(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// Rewind to the start of the most recent read.
    pub fn rewind(&mut self) {
        self.pos = self.previous_pos;
    }

    /// Skip `n` bytes without interpreting them.
    pub fn seek(&mut self, n: usize) -> Result<(), ReadError> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        if self.remaining() < n {
            return Err(ReadError);
        }
        self.previous_pos = self.pos;
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        let b = self.read_bytes(1)?;
        Ok(b[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        let b = self.read_bytes(2)?;
        Ok((u16::from(b[0]) << 8) | u16::from(b[1]))
    }

    pub fn read_u24(&mut self) -> Result<u32, ReadError> {
        let b = self.read_bytes(3)?;
        Ok((u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        let b = self.read_bytes(4)?;
        Ok((u32::from(b[0]) << 24)
            | (u32::from(b[1]) << 16)
            | (u32::from(b[2]) << 8)
            | u32::from(b[3]))
    }

    pub fn read_u64(&mut self) -> Result<u64, ReadError> {
        let hi = self.read_u32()?;
        let lo = match self.read_u32() {
            Ok(lo) => lo,
            Err(e) => {
                // Undo the high half so the failed read is atomic.
                self.pos -= 4;
                return Err(e);
            }
        };
        Ok((u64::from(hi) << 32) | u64::from(lo))
    }

    /// Read a 32-bit field and clear the reserved high bit (stream ids,
    /// last-good-stream ids, window deltas).
    pub fn read_u31(&mut self) -> Result<u32, ReadError> {
        Ok(self.read_u32()? & 0x7fff_ffff)
    }

    /// Read a length-prefixed byte string; prefix width follows the header
    /// block rules for `version`.
    pub fn read_length_prefixed(
        &mut self,
        version: SpdyVersion,
    ) -> Result<&'a [u8], ReadError> {
        let mark = self.pos;
        let len = if version.header_block_length_width() == 2 {
            usize::from(self.read_u16()?)
        } else {
            self.read_u32()? as usize
        };
        match self.read_bytes(len) {
            Ok(bytes) => {
                self.previous_pos = mark;
                Ok(bytes)
            }
            Err(e) => {
                self.pos = mark;
                Err(e)
            }
        }
    }
}

/// Growable output buffer with the frame header helpers the serializer
/// needs, including length backpatching for frames whose final size is only
/// known after header block compression.
pub struct FrameWriter {
    buf: Vec<u8>,
    version: SpdyVersion,
}

impl FrameWriter {
    pub fn new(version: SpdyVersion, capacity: usize) -> Self {
        FrameWriter {
            buf: Vec::with_capacity(capacity),
            version,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u24(&mut self, v: u32) {
        self.buf.push((v >> 16) as u8);
        self.buf.push((v >> 8) as u8);
        self.buf.push(v as u8);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_length_prefixed(&mut self, bytes: &[u8]) {
        if self.version.header_block_length_width() == 2 {
            self.write_u16(bytes.len() as u16);
        } else {
            self.write_u32(bytes.len() as u32);
        }
        self.write_bytes(bytes);
    }

    /// Write an 8-byte control frame header. `total_len` is the final frame
    /// length including the header; call [`rewrite_length`] afterwards if it
    /// is only an estimate.
    ///
    /// [`rewrite_length`]: FrameWriter::rewrite_length
    pub fn write_control_frame_header(
        &mut self,
        frame_type: FrameType,
        flags: u8,
        total_len: usize,
    ) {
        debug_assert!(!self.version.has_explicit_frame_type());
        self.write_u16(CONTROL_FLAG_MASK | self.version.number());
        self.write_u16(frame_type.wire_value());
        self.write_u8(flags);
        self.write_u24((total_len - FRAME_HEADER_LEN) as u32);
    }

    /// Write an 8-byte v4 frame prefix (length, type, flags, stream id).
    pub fn write_frame_prefix(
        &mut self,
        frame_type: FrameType,
        flags: u8,
        stream_id: u32,
        total_len: usize,
    ) {
        debug_assert!(self.version.has_explicit_frame_type());
        self.write_u16(total_len as u16);
        self.write_u8(frame_type.wire_value() as u8);
        self.write_u8(flags);
        self.write_u32(stream_id & 0x7fff_ffff);
    }

    /// Write a data frame header for `payload_len` bytes of payload.
    pub fn write_data_frame_header(
        &mut self,
        stream_id: u32,
        flags: u8,
        payload_len: usize,
    ) {
        if self.version.has_explicit_frame_type() {
            self.write_frame_prefix(
                FrameType::Data,
                flags,
                stream_id,
                payload_len + FRAME_HEADER_LEN,
            );
        } else {
            self.write_u32(stream_id & 0x7fff_ffff);
            self.write_u8(flags);
            self.write_u24(payload_len as u32);
        }
    }

    /// Backpatch the length field at the start of the buffer to match the
    /// bytes written so far.
    pub fn rewrite_length(&mut self) {
        let total = self.buf.len();
        if self.version.has_explicit_frame_type() {
            self.buf[0] = (total >> 8) as u8;
            self.buf[1] = total as u8;
        } else {
            let payload = total - FRAME_HEADER_LEN;
            self.buf[5] = (payload >> 16) as u8;
            self.buf[6] = (payload >> 8) as u8;
            self.buf[7] = payload as u8;
        }
    }
}
