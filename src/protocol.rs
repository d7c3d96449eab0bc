//! SPDY wire constants and the per-version policy surface.
//!
//! All version-dependent wire rules (field widths, priority packing, the
//! SPDY/2 settings byte-order quirk) live here or in [`crate::validator`];
//! the rest of the crate asks these types instead of comparing version
//! numbers inline.

/// Size of the common frame header, identical for every version and for both
/// data and control frames.
pub const FRAME_HEADER_LEN: usize = 8;

/// High bit of the leading u16 marks a control frame (pre-v4 layout).
pub const CONTROL_FLAG_MASK: u16 = 0x8000;

/// A stream id is never zero; zero marks "no stream".
pub const INVALID_STREAM_ID: u32 = 0;

// Data frame flags.
pub const DATA_FLAG_FIN: u8 = 0x01;

// Control frame flags.
pub const CONTROL_FLAG_FIN: u8 = 0x01;
pub const CONTROL_FLAG_UNIDIRECTIONAL: u8 = 0x02;

// PING flags (v4).
pub const PING_FLAG_ACK: u8 = 0x01;

// SETTINGS frame flags: pre-v4 clear-persisted, v4 ack.
pub const SETTINGS_FLAG_CLEAR_PREVIOUSLY_PERSISTED_SETTINGS: u8 = 0x01;
pub const SETTINGS_FLAG_ACK: u8 = 0x01;

// Per-entry SETTINGS flags (pre-v4 only).
pub const SETTINGS_FLAG_PLEASE_PERSIST: u8 = 0x01;
pub const SETTINGS_FLAG_PERSISTED: u8 = 0x02;

// HEADERS / PUSH_PROMISE / CONTINUATION flags (v4).
pub const HEADERS_FLAG_END_HEADERS: u8 = 0x04;
pub const HEADERS_FLAG_PRIORITY: u8 = 0x08;
pub const PUSH_PROMISE_FLAG_END_PUSH_PROMISE: u8 = 0x04;

/// Protocol versions understood by the framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpdyVersion {
    V2,
    V3,
    V4,
}

impl SpdyVersion {
    /// Version number as carried in the pre-v4 control frame header.
    pub fn number(self) -> u16 {
        match self {
            SpdyVersion::V2 => 2,
            SpdyVersion::V3 => 3,
            SpdyVersion::V4 => 4,
        }
    }

    pub fn from_number(v: u16) -> Option<Self> {
        match v {
            2 => Some(SpdyVersion::V2),
            3 => Some(SpdyVersion::V3),
            4 => Some(SpdyVersion::V4),
            _ => None,
        }
    }

    /// v4 moved the frame type into its own byte and dropped the control bit.
    pub fn has_explicit_frame_type(self) -> bool {
        self >= SpdyVersion::V4
    }

    /// Width in bytes of the header block entry count and of each
    /// length-prefixed name/value.
    pub fn header_block_length_width(self) -> usize {
        if self < SpdyVersion::V3 {
            2
        } else {
            4
        }
    }

    /// Largest frame the wire format can express. Pre-v4 this is the 24-bit
    /// payload length; v4's 16-bit length counts the header too.
    pub fn frame_maximum_size(self) -> usize {
        if self < SpdyVersion::V4 {
            0xff_ffff + FRAME_HEADER_LEN
        } else {
            0xffff
        }
    }

    /// Numerically largest (least urgent) priority value.
    pub fn lowest_priority(self) -> u8 {
        if self < SpdyVersion::V3 {
            3
        } else {
            7
        }
    }

    /// Bit position of the priority field inside its byte (pre-v4 wire form).
    pub fn priority_shift(self) -> u32 {
        if self < SpdyVersion::V3 {
            6
        } else {
            5
        }
    }
}

/// Pack a priority value into the high bits of the wire byte.
pub fn pack_priority(version: SpdyVersion, priority: u8) -> u8 {
    priority << version.priority_shift()
}

/// Extract a priority value from the wire byte.
pub fn unpack_priority(version: SpdyVersion, raw: u8) -> u8 {
    raw >> version.priority_shift()
}

/// Control frame types across all supported versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data,
    SynStream,
    SynReply,
    RstStream,
    Settings,
    Noop,
    Ping,
    GoAway,
    Headers,
    WindowUpdate,
    Credential,
    Blocked,
    PushPromise,
    Continuation,
}

impl FrameType {
    pub fn from_wire(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(FrameType::Data),
            1 => Some(FrameType::SynStream),
            2 => Some(FrameType::SynReply),
            3 => Some(FrameType::RstStream),
            4 => Some(FrameType::Settings),
            5 => Some(FrameType::Noop),
            6 => Some(FrameType::Ping),
            7 => Some(FrameType::GoAway),
            8 => Some(FrameType::Headers),
            9 => Some(FrameType::WindowUpdate),
            10 => Some(FrameType::Credential),
            11 => Some(FrameType::Blocked),
            12 => Some(FrameType::PushPromise),
            13 => Some(FrameType::Continuation),
            _ => None,
        }
    }

    pub fn wire_value(self) -> u16 {
        match self {
            FrameType::Data => 0,
            FrameType::SynStream => 1,
            FrameType::SynReply => 2,
            FrameType::RstStream => 3,
            FrameType::Settings => 4,
            FrameType::Noop => 5,
            FrameType::Ping => 6,
            FrameType::GoAway => 7,
            FrameType::Headers => 8,
            FrameType::WindowUpdate => 9,
            FrameType::Credential => 10,
            FrameType::Blocked => 11,
            FrameType::PushPromise => 12,
            FrameType::Continuation => 13,
        }
    }

    /// Types that carry a (possibly compressed) header block after their
    /// fixed fields.
    pub fn has_header_block(self) -> bool {
        matches!(
            self,
            FrameType::SynStream
                | FrameType::SynReply
                | FrameType::Headers
                | FrameType::PushPromise
                | FrameType::Continuation
        )
    }
}

/// RST_STREAM status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RstStreamStatus {
    Invalid = 0,
    ProtocolError = 1,
    InvalidStream = 2,
    RefusedStream = 3,
    UnsupportedVersion = 4,
    Cancel = 5,
    InternalError = 6,
    FlowControlError = 7,
    StreamInUse = 8,
    StreamAlreadyClosed = 9,
    InvalidCredentials = 10,
    FrameTooLarge = 11,
}

impl RstStreamStatus {
    /// Maps out-of-range wire values to `Invalid`.
    pub fn from_wire(v: u32) -> Self {
        match v {
            1 => Self::ProtocolError,
            2 => Self::InvalidStream,
            3 => Self::RefusedStream,
            4 => Self::UnsupportedVersion,
            5 => Self::Cancel,
            6 => Self::InternalError,
            7 => Self::FlowControlError,
            8 => Self::StreamInUse,
            9 => Self::StreamAlreadyClosed,
            10 => Self::InvalidCredentials,
            11 => Self::FrameTooLarge,
            _ => Self::Invalid,
        }
    }
}

/// GOAWAY status codes (v3+; SPDY/2 GOAWAY has no status field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GoAwayStatus {
    Ok = 0,
    ProtocolError = 1,
    InternalError = 2,
}

impl GoAwayStatus {
    /// Maps out-of-range wire values to `Ok`, matching the liberal receive
    /// policy for this field.
    pub fn from_wire(v: u32) -> Self {
        match v {
            1 => Self::ProtocolError,
            2 => Self::InternalError,
            _ => Self::Ok,
        }
    }
}

/// SETTINGS entry identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
pub enum SettingId {
    UploadBandwidth = 1,
    DownloadBandwidth = 2,
    RoundTripTime = 3,
    MaxConcurrentStreams = 4,
    CurrentCwnd = 5,
    DownloadRetransRate = 6,
    InitialWindowSize = 7,
}

impl SettingId {
    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::UploadBandwidth),
            2 => Some(Self::DownloadBandwidth),
            3 => Some(Self::RoundTripTime),
            4 => Some(Self::MaxConcurrentStreams),
            5 => Some(Self::CurrentCwnd),
            6 => Some(Self::DownloadRetransRate),
            7 => Some(Self::InitialWindowSize),
            _ => None,
        }
    }

    pub fn wire_value(self) -> u32 {
        self as u32
    }
}

/// The pre-v4 per-entry SETTINGS id/flags word.
///
/// SPDY/2 stored this word with the id in the low three bytes little-endian
/// and the flags in the last byte; SPDY/3 fixed it to a flags byte followed
/// by a 24-bit big-endian id. Both layouts are reproduced here so the rest
/// of the crate never sees the quirk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsFlagsAndId {
    pub flags: u8,
    pub id: u32,
}

impl SettingsFlagsAndId {
    pub fn new(flags: u8, id: u32) -> Self {
        debug_assert!(id <= 0xff_ffff, "setting id exceeds 24 bits");
        SettingsFlagsAndId { flags, id }
    }

    pub fn from_wire(version: SpdyVersion, bytes: [u8; 4]) -> Self {
        if version < SpdyVersion::V3 {
            SettingsFlagsAndId {
                flags: bytes[3],
                id: u32::from(bytes[0])
                    | (u32::from(bytes[1]) << 8)
                    | (u32::from(bytes[2]) << 16),
            }
        } else {
            SettingsFlagsAndId {
                flags: bytes[0],
                id: (u32::from(bytes[1]) << 16)
                    | (u32::from(bytes[2]) << 8)
                    | u32::from(bytes[3]),
            }
        }
    }

    pub fn to_wire(self, version: SpdyVersion) -> [u8; 4] {
        if version < SpdyVersion::V3 {
            [
                self.id as u8,
                (self.id >> 8) as u8,
                (self.id >> 16) as u8,
                self.flags,
            ]
        } else {
            [
                self.flags,
                (self.id >> 16) as u8,
                (self.id >> 8) as u8,
                self.id as u8,
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_numbers_round_trip() {
        for v in [SpdyVersion::V2, SpdyVersion::V3, SpdyVersion::V4] {
            assert_eq!(SpdyVersion::from_number(v.number()), Some(v));
        }
        assert_eq!(SpdyVersion::from_number(1), None);
        assert_eq!(SpdyVersion::from_number(5), None);
    }

    #[test]
    fn priority_packing() {
        // SPDY/2: two bits, SPDY/3: three bits.
        assert_eq!(pack_priority(SpdyVersion::V2, 3), 0xc0);
        assert_eq!(unpack_priority(SpdyVersion::V2, 0xc0), 3);
        assert_eq!(pack_priority(SpdyVersion::V3, 7), 0xe0);
        assert_eq!(unpack_priority(SpdyVersion::V3, 0xe0), 7);
        assert_eq!(unpack_priority(SpdyVersion::V3, 0x20), 1);
    }

    #[test]
    fn settings_word_spdy2_is_byte_reversed() {
        let w = SettingsFlagsAndId::new(SETTINGS_FLAG_PLEASE_PERSIST, 4);
        assert_eq!(w.to_wire(SpdyVersion::V2), [0x04, 0x00, 0x00, 0x01]);
        assert_eq!(w.to_wire(SpdyVersion::V3), [0x01, 0x00, 0x00, 0x04]);
        for v in [SpdyVersion::V2, SpdyVersion::V3] {
            assert_eq!(SettingsFlagsAndId::from_wire(v, w.to_wire(v)), w);
        }
    }

    #[test]
    fn frame_type_wire_values() {
        for raw in 0..=13 {
            let t = FrameType::from_wire(raw).unwrap();
            assert_eq!(t.wire_value(), raw);
        }
        assert_eq!(FrameType::from_wire(14), None);
    }

    #[test]
    fn status_codes_from_wire() {
        assert_eq!(RstStreamStatus::from_wire(5), RstStreamStatus::Cancel);
        assert_eq!(RstStreamStatus::from_wire(0), RstStreamStatus::Invalid);
        assert_eq!(RstStreamStatus::from_wire(12), RstStreamStatus::Invalid);
        assert_eq!(GoAwayStatus::from_wire(1), GoAwayStatus::ProtocolError);
        assert_eq!(GoAwayStatus::from_wire(99), GoAwayStatus::Ok);
    }
}
