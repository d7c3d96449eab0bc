//! Structural validation of control frames.
//!
//! Size and flag legality are pure functions of `(frame_type, version)`.
//! All sizes count whole frames, common header included; fixed-layout
//! frames must match their size exactly, variable ones set a floor.

use crate::error::SpdyError;
use crate::protocol::{
    FrameType, SpdyVersion, CONTROL_FLAG_FIN, CONTROL_FLAG_UNIDIRECTIONAL,
    FRAME_HEADER_LEN, HEADERS_FLAG_END_HEADERS, HEADERS_FLAG_PRIORITY,
    PING_FLAG_ACK, PUSH_PROMISE_FLAG_END_PUSH_PROMISE, SETTINGS_FLAG_ACK,
    SETTINGS_FLAG_CLEAR_PREVIOUSLY_PERSISTED_SETTINGS,
};

/// Whether `frame_type` exists at all in `version`'s wire vocabulary.
pub fn type_allowed(frame_type: FrameType, version: SpdyVersion) -> bool {
    match frame_type {
        FrameType::SynStream
        | FrameType::SynReply
        | FrameType::Noop
        | FrameType::Credential => version < SpdyVersion::V4,
        FrameType::Blocked
        | FrameType::PushPromise
        | FrameType::Continuation => version >= SpdyVersion::V4,
        _ => true,
    }
}

/// Size of one SETTINGS entry on the wire.
pub fn settings_entry_size(version: SpdyVersion) -> usize {
    if version < SpdyVersion::V4 {
        8 // 4-byte id/flags word + 4-byte value
    } else {
        5 // 1-byte id + 4-byte value
    }
}

/// Smallest legal frame of this type, header included.
pub fn minimum_size(frame_type: FrameType, version: SpdyVersion) -> usize {
    let h = FRAME_HEADER_LEN;
    match frame_type {
        FrameType::Data | FrameType::Noop | FrameType::Credential => h,
        // Stream id, associated stream id, priority byte, unused byte.
        FrameType::SynStream => h + 10,
        FrameType::SynReply => {
            if version < SpdyVersion::V3 {
                h + 6 // stream id + 2 unused bytes
            } else {
                h + 4
            }
        }
        FrameType::RstStream => {
            if version < SpdyVersion::V4 {
                h + 8 // stream id + status
            } else {
                h + 4 // status only; stream id lives in the header
            }
        }
        FrameType::Settings => {
            if version < SpdyVersion::V4 {
                h + 4 // entry count
            } else {
                h
            }
        }
        FrameType::Ping => {
            if version < SpdyVersion::V4 {
                h + 4
            } else {
                h + 8
            }
        }
        FrameType::GoAway => {
            if version < SpdyVersion::V3 {
                h + 4 // last-good stream id
            } else {
                h + 8 // + status
            }
        }
        FrameType::Headers => {
            if version < SpdyVersion::V3 {
                h + 6 // stream id + 2 unused bytes
            } else if version < SpdyVersion::V4 {
                h + 4
            } else {
                h
            }
        }
        FrameType::WindowUpdate => {
            if version < SpdyVersion::V4 {
                h + 8 // stream id + delta
            } else {
                h + 4
            }
        }
        FrameType::Blocked => h,
        FrameType::PushPromise => h + 4, // promised stream id
        FrameType::Continuation => h,
    }
}

/// For fixed-layout frames, the only legal size.
pub fn exact_size(
    frame_type: FrameType,
    version: SpdyVersion,
) -> Option<usize> {
    let fixed = match frame_type {
        FrameType::Ping | FrameType::WindowUpdate | FrameType::Blocked => true,
        FrameType::RstStream | FrameType::GoAway => version < SpdyVersion::V4,
        FrameType::Noop => true,
        _ => false,
    };
    fixed.then(|| minimum_size(frame_type, version))
}

/// Flag bits a frame of this type may legally carry.
pub fn legal_flags(frame_type: FrameType, version: SpdyVersion) -> u8 {
    match frame_type {
        FrameType::SynStream => CONTROL_FLAG_FIN | CONTROL_FLAG_UNIDIRECTIONAL,
        FrameType::SynReply => CONTROL_FLAG_FIN,
        FrameType::Settings => {
            if version < SpdyVersion::V4 {
                SETTINGS_FLAG_CLEAR_PREVIOUSLY_PERSISTED_SETTINGS
            } else {
                SETTINGS_FLAG_ACK
            }
        }
        FrameType::Ping => {
            if version < SpdyVersion::V4 {
                0
            } else {
                PING_FLAG_ACK
            }
        }
        FrameType::Headers => {
            if version < SpdyVersion::V4 {
                CONTROL_FLAG_FIN
            } else {
                CONTROL_FLAG_FIN
                    | HEADERS_FLAG_END_HEADERS
                    | HEADERS_FLAG_PRIORITY
            }
        }
        FrameType::PushPromise => PUSH_PROMISE_FLAG_END_PUSH_PROMISE,
        FrameType::Continuation => HEADERS_FLAG_END_HEADERS,
        FrameType::RstStream
        | FrameType::GoAway
        | FrameType::WindowUpdate
        | FrameType::Blocked
        | FrameType::Noop
        | FrameType::Credential
        | FrameType::Data => 0,
    }
}

/// Check a control frame's type, total length, and flags against the rules
/// for `version`. Size violations win over flag violations, matching the
/// order errors are reported in.
pub fn validate_control_frame(
    frame_type: FrameType,
    flags: u8,
    total_len: usize,
    version: SpdyVersion,
) -> Result<(), SpdyError> {
    if !type_allowed(frame_type, version) {
        return Err(SpdyError::InvalidControlFrame);
    }

    if let Some(exact) = exact_size(frame_type, version) {
        if total_len != exact {
            return Err(SpdyError::InvalidControlFrame);
        }
    } else {
        let mut min = minimum_size(frame_type, version);
        if frame_type == FrameType::Headers
            && version >= SpdyVersion::V4
            && flags & HEADERS_FLAG_PRIORITY != 0
        {
            min += 4;
        }
        if total_len < min {
            return Err(SpdyError::InvalidControlFrame);
        }
        if frame_type == FrameType::Settings {
            let payload = total_len - min;
            if payload % settings_entry_size(version) != 0 {
                return Err(SpdyError::InvalidControlFrame);
            }
            if version >= SpdyVersion::V4
                && flags & SETTINGS_FLAG_ACK != 0
                && payload != 0
            {
                return Err(SpdyError::InvalidControlFrame);
            }
        }
    }

    if flags & !legal_flags(frame_type, version) != 0 {
        return Err(SpdyError::InvalidControlFrameFlags);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_table() {
        assert_eq!(minimum_size(FrameType::SynStream, SpdyVersion::V2), 18);
        assert_eq!(minimum_size(FrameType::SynReply, SpdyVersion::V2), 14);
        assert_eq!(minimum_size(FrameType::SynReply, SpdyVersion::V3), 12);
        assert_eq!(exact_size(FrameType::RstStream, SpdyVersion::V3), Some(16));
        assert_eq!(exact_size(FrameType::RstStream, SpdyVersion::V4), None);
        assert_eq!(minimum_size(FrameType::RstStream, SpdyVersion::V4), 12);
        assert_eq!(exact_size(FrameType::Ping, SpdyVersion::V3), Some(12));
        assert_eq!(exact_size(FrameType::Ping, SpdyVersion::V4), Some(16));
        assert_eq!(exact_size(FrameType::GoAway, SpdyVersion::V2), Some(12));
        assert_eq!(exact_size(FrameType::GoAway, SpdyVersion::V3), Some(16));
        assert_eq!(minimum_size(FrameType::GoAway, SpdyVersion::V4), 16);
        assert_eq!(
            exact_size(FrameType::WindowUpdate, SpdyVersion::V3),
            Some(16)
        );
        assert_eq!(
            exact_size(FrameType::WindowUpdate, SpdyVersion::V4),
            Some(12)
        );
        assert_eq!(minimum_size(FrameType::Headers, SpdyVersion::V2), 14);
        assert_eq!(minimum_size(FrameType::Headers, SpdyVersion::V3), 12);
        assert_eq!(minimum_size(FrameType::Headers, SpdyVersion::V4), 8);
        assert_eq!(exact_size(FrameType::Blocked, SpdyVersion::V4), Some(8));
    }

    #[test]
    fn type_vocabulary_per_version() {
        assert!(type_allowed(FrameType::SynStream, SpdyVersion::V3));
        assert!(!type_allowed(FrameType::SynStream, SpdyVersion::V4));
        assert!(!type_allowed(FrameType::Continuation, SpdyVersion::V3));
        assert!(type_allowed(FrameType::Continuation, SpdyVersion::V4));
        assert!(type_allowed(FrameType::Ping, SpdyVersion::V2));
        assert!(type_allowed(FrameType::Ping, SpdyVersion::V4));
    }

    #[test]
    fn flag_legality() {
        assert_eq!(
            validate_control_frame(FrameType::SynStream, 0x04, 18, SpdyVersion::V3),
            Err(SpdyError::InvalidControlFrameFlags)
        );
        assert!(validate_control_frame(
            FrameType::SynStream,
            CONTROL_FLAG_FIN | CONTROL_FLAG_UNIDIRECTIONAL,
            18,
            SpdyVersion::V3
        )
        .is_ok());
        assert_eq!(
            validate_control_frame(FrameType::Ping, PING_FLAG_ACK, 12, SpdyVersion::V3),
            Err(SpdyError::InvalidControlFrameFlags)
        );
        assert!(
            validate_control_frame(FrameType::Ping, PING_FLAG_ACK, 16, SpdyVersion::V4)
                .is_ok()
        );
    }

    #[test]
    fn settings_alignment() {
        // One 8-byte entry after the 4-byte count.
        assert!(validate_control_frame(
            FrameType::Settings,
            0,
            12 + 8,
            SpdyVersion::V3
        )
        .is_ok());
        assert_eq!(
            validate_control_frame(FrameType::Settings, 0, 12 + 7, SpdyVersion::V3),
            Err(SpdyError::InvalidControlFrame)
        );
        // v4: 5-byte entries, ACK must be empty.
        assert!(
            validate_control_frame(FrameType::Settings, 0, 8 + 10, SpdyVersion::V4)
                .is_ok()
        );
        assert_eq!(
            validate_control_frame(
                FrameType::Settings,
                SETTINGS_FLAG_ACK,
                8 + 5,
                SpdyVersion::V4
            ),
            Err(SpdyError::InvalidControlFrame)
        );
        assert!(validate_control_frame(
            FrameType::Settings,
            SETTINGS_FLAG_ACK,
            8,
            SpdyVersion::V4
        )
        .is_ok());
    }

    #[test]
    fn headers_priority_raises_minimum() {
        assert!(
            validate_control_frame(FrameType::Headers, 0, 8, SpdyVersion::V4).is_ok()
        );
        assert_eq!(
            validate_control_frame(
                FrameType::Headers,
                HEADERS_FLAG_PRIORITY,
                8,
                SpdyVersion::V4
            ),
            Err(SpdyError::InvalidControlFrame)
        );
        assert!(validate_control_frame(
            FrameType::Headers,
            HEADERS_FLAG_PRIORITY,
            12,
            SpdyVersion::V4
        )
        .is_ok());
    }
}
