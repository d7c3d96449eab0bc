//! Header block wire codec.
//!
//! A header block is serialized as an entry count (u16 before SPDY/3, u32
//! from SPDY/3 on) followed by length-prefixed name/value pairs, then run
//! through a per-connection deflate stream primed with the version's static
//! dictionary. One sync flush terminates each block so the receiver can
//! inflate frame-by-frame; the streams live as long as the framer because
//! later blocks back-reference earlier ones.

use flate2::{
    Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status,
};

use crate::buffer::{FrameReader, FrameWriter};
use crate::dictionary;
use crate::error::SpdyError;
use crate::protocol::SpdyVersion;

/// Decompressed header bytes are surfaced to the visitor in chunks of at
/// most this size.
pub const HEADER_DATA_CHUNK_MAX_SIZE: usize = 1024;

/// An ordered set of header name/value byte pairs with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl HeaderBlock {
    pub fn new() -> Self {
        HeaderBlock::default()
    }

    /// Insert a header, replacing the value if the name is already present.
    pub fn insert(&mut self, name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        let name = name.into();
        let value = value.into();
        for entry in &mut self.entries {
            if entry.0 == name {
                entry.1 = value;
                return;
            }
        }
        self.entries.push((name, value));
    }

    pub fn contains(&self, name: &[u8]) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.iter().map(|(n, v)| (n.as_slice(), v.as_slice()))
    }
}

impl<N: Into<Vec<u8>>, V: Into<Vec<u8>>> FromIterator<(N, V)> for HeaderBlock {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut block = HeaderBlock::new();
        for (n, v) in iter {
            block.insert(n, v);
        }
        block
    }
}

/// Size of `block` in uncompressed wire form.
pub fn uncompressed_serialized_length(
    version: SpdyVersion,
    block: &HeaderBlock,
    begin_block: bool,
) -> usize {
    let width = version.header_block_length_width();
    let mut total = if begin_block { width } else { 0 };
    for (name, value) in block.iter() {
        total += width + name.len() + width + value.len();
    }
    total
}

/// Write `block` in uncompressed wire form. `begin_block` controls whether
/// the leading entry count is emitted; continuation fragments omit it.
pub fn write_uncompressed(
    writer: &mut FrameWriter,
    version: SpdyVersion,
    block: &HeaderBlock,
    begin_block: bool,
) {
    if begin_block {
        if version.header_block_length_width() == 2 {
            writer.write_u16(block.len() as u16);
        } else {
            writer.write_u32(block.len() as u32);
        }
    }
    for (name, value) in block.iter() {
        writer.write_length_prefixed(name);
        writer.write_length_prefixed(value);
    }
}

/// Parse an uncompressed header block from the start of `data`, returning
/// the block and the number of bytes consumed. Truncated input and
/// duplicate names both fail.
pub fn parse_header_block(
    version: SpdyVersion,
    data: &[u8],
) -> Result<(HeaderBlock, usize), SpdyError> {
    let mut reader = FrameReader::new(data);
    let count = if version.header_block_length_width() == 2 {
        reader.read_u16().map(u32::from)
    } else {
        reader.read_u32()
    }
    .map_err(|_| SpdyError::InvalidControlFrame)?;

    let mut block = HeaderBlock::new();
    for _ in 0..count {
        let name = reader
            .read_length_prefixed(version)
            .map_err(|_| SpdyError::InvalidControlFrame)?;
        let value = reader
            .read_length_prefixed(version)
            .map_err(|_| SpdyError::InvalidControlFrame)?;
        if block.contains(name) {
            return Err(SpdyError::InvalidControlFrame);
        }
        block.insert(name, value);
    }
    Ok((block, reader.bytes_consumed()))
}

/// Stateful compressor/decompressor pair for one framer.
///
/// Both directions are created lazily so a framer that only parses never
/// allocates a deflate stream, and vice versa.
pub struct HeaderCodec {
    version: SpdyVersion,
    compressor: Option<Compress>,
    decompressor: Option<Decompress>,
}

impl HeaderCodec {
    pub fn new(version: SpdyVersion) -> Self {
        HeaderCodec {
            version,
            compressor: None,
            decompressor: None,
        }
    }

    /// Cookie-isolating (class-segregated) compression needs per-byte data
    /// class hints from the deflate implementation, which the streaming
    /// deflate in use does not expose. Callers that require cookie crumbling
    /// must check this before relying on it.
    pub fn supports_class_segregation() -> bool {
        false
    }

    /// Serialize `block` and append its compressed form to `out`, ending
    /// with a sync flush.
    pub fn compress_block(
        &mut self,
        block: &HeaderBlock,
        begin_block: bool,
        out: &mut Vec<u8>,
    ) -> Result<(), SpdyError> {
        let version = self.version;
        let mut plain = FrameWriter::new(
            version,
            uncompressed_serialized_length(version, block, begin_block),
        );
        write_uncompressed(&mut plain, version, block, begin_block);
        let input = plain.into_bytes();

        if self.compressor.is_none() {
            // The encoder side primes its dictionary up front; the wire
            // stream then carries the dictionary's adler32 id.
            let mut c = Compress::new(Compression::best(), true);
            c.set_dictionary(dictionary::dictionary_for(version))
                .map_err(|_| SpdyError::CompressFailure)?;
            self.compressor = Some(c);
        }
        let Some(compressor) = self.compressor.as_mut() else {
            return Err(SpdyError::CompressFailure);
        };

        let mut consumed = 0;
        loop {
            out.reserve(input.len() / 2 + 128);
            let before_in = compressor.total_in();
            compressor
                .compress_vec(&input[consumed..], out, FlushCompress::Sync)
                .map_err(|_| SpdyError::CompressFailure)?;
            consumed += (compressor.total_in() - before_in) as usize;
            // The flush is complete once all input is consumed and the last
            // call left spare output capacity.
            if consumed == input.len() && out.len() < out.capacity() {
                return Ok(());
            }
        }
    }

    /// Inflate one frame's worth of compressed header bytes, handing each
    /// decompressed chunk (at most [`HEADER_DATA_CHUNK_MAX_SIZE`] bytes) to
    /// `sink`. Returns `Ok(false)` if the sink refused a chunk.
    pub fn decompress_chunk(
        &mut self,
        input: &[u8],
        sink: &mut dyn FnMut(&[u8]) -> bool,
    ) -> Result<bool, SpdyError> {
        let version = self.version;
        let decompressor = self
            .decompressor
            .get_or_insert_with(|| Decompress::new(true));

        let mut buf = [0u8; HEADER_DATA_CHUNK_MAX_SIZE];
        let mut pos = 0;
        loop {
            let before_in = decompressor.total_in();
            let before_out = decompressor.total_out();
            match decompressor.decompress(
                &input[pos..],
                &mut buf,
                FlushDecompress::Sync,
            ) {
                Ok(status) => {
                    let consumed =
                        (decompressor.total_in() - before_in) as usize;
                    let produced =
                        (decompressor.total_out() - before_out) as usize;
                    pos += consumed;
                    if produced > 0 && !sink(&buf[..produced]) {
                        return Ok(false);
                    }
                    if status == Status::StreamEnd {
                        break;
                    }
                    if consumed == 0 && produced == 0 {
                        // No forward progress: the stream needs bytes from a
                        // later frame.
                        break;
                    }
                    if pos >= input.len() && produced < buf.len() {
                        break;
                    }
                }
                Err(e) => match e.needs_dictionary() {
                    Some(id) if dictionary::id_matches(version, id) => {
                        pos += (decompressor.total_in() - before_in) as usize;
                        decompressor
                            .set_dictionary(dictionary::dictionary_for(version))
                            .map_err(|_| SpdyError::DecompressFailure)?;
                    }
                    _ => return Err(SpdyError::DecompressFailure),
                },
            }
        }
        Ok(true)
    }
}
