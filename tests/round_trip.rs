//! End-to-end serialize/parse tests over a recording visitor.

use spdy_proto::{
    Frame, FramerVisitor, GoAwayStatus, HeaderBlock, RstStreamStatus, Setting,
    SettingId, SpdyError, SpdyFramer, SpdyVersion,
};

use spdy_proto::buffer::FrameWriter;
use spdy_proto::codec::parse_header_block;
use spdy_proto::framer::ParserState;
use spdy_proto::protocol::SettingsFlagsAndId;
use spdy_proto::FrameType;

const ALL_VERSIONS: [SpdyVersion; 3] =
    [SpdyVersion::V2, SpdyVersion::V3, SpdyVersion::V4];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Error(SpdyError),
    DataHeader(u32, usize, bool),
    StreamData(u32, Vec<u8>),
    StreamEnd(u32),
    HeaderData(u32, Vec<u8>),
    HeaderBlockEnd(u32),
    SynStream {
        stream_id: u32,
        associated_stream_id: u32,
        priority: u8,
        fin: bool,
        unidirectional: bool,
    },
    SynReply(u32, bool),
    Headers(u32, bool, bool),
    PushPromise(u32, u32, bool),
    Continuation(u32, bool),
    Settings(bool),
    Setting(SettingId, u8, u32),
    SettingsAck,
    SettingsEnd,
    Ping(u64, bool),
    GoAway(u32, GoAwayStatus),
    GoAwayData(Vec<u8>),
    GoAwayEnd,
    RstStream(u32, RstStreamStatus),
    RstStreamData(Vec<u8>),
    RstStreamEnd,
    WindowUpdate(u32, u32),
    Blocked(u32),
}

#[derive(Default)]
struct RecordingVisitor {
    events: Vec<Event>,
    refuse_header_data: bool,
    refuse_goaway_data: bool,
    refuse_rst_data: bool,
}

impl RecordingVisitor {
    /// Events with adjacent data deliveries coalesced, so assertions are
    /// independent of how the input was chunked.
    fn normalized(&self) -> Vec<Event> {
        let mut out: Vec<Event> = Vec::new();
        for ev in &self.events {
            match (out.last_mut(), ev) {
                (Some(Event::StreamData(sid, acc)), Event::StreamData(s, d))
                    if *sid == *s =>
                {
                    acc.extend_from_slice(d)
                }
                (Some(Event::HeaderData(sid, acc)), Event::HeaderData(s, d))
                    if *sid == *s =>
                {
                    acc.extend_from_slice(d)
                }
                (Some(Event::GoAwayData(acc)), Event::GoAwayData(d)) => {
                    acc.extend_from_slice(d)
                }
                (Some(Event::RstStreamData(acc)), Event::RstStreamData(d)) => {
                    acc.extend_from_slice(d)
                }
                _ => out.push(ev.clone()),
            }
        }
        out
    }

    /// Concatenated header block bytes for `stream_id`.
    fn header_bytes(&self, stream_id: u32) -> Vec<u8> {
        let mut out = Vec::new();
        for ev in &self.events {
            if let Event::HeaderData(sid, d) = ev {
                if *sid == stream_id {
                    out.extend_from_slice(d);
                }
            }
        }
        out
    }
}

impl FramerVisitor for RecordingVisitor {
    fn on_error(&mut self, error: SpdyError) {
        self.events.push(Event::Error(error));
    }

    fn on_data_frame_header(&mut self, stream_id: u32, length: usize, fin: bool) {
        self.events.push(Event::DataHeader(stream_id, length, fin));
    }

    fn on_stream_frame_data(&mut self, stream_id: u32, data: Option<&[u8]>, fin: bool) {
        match data {
            Some(d) => self.events.push(Event::StreamData(stream_id, d.to_vec())),
            None => {
                assert!(fin);
                self.events.push(Event::StreamEnd(stream_id));
            }
        }
    }

    fn on_control_frame_header_data(
        &mut self,
        stream_id: u32,
        data: Option<&[u8]>,
    ) -> bool {
        match data {
            Some(d) => {
                if self.refuse_header_data {
                    return false;
                }
                self.events.push(Event::HeaderData(stream_id, d.to_vec()));
            }
            None => self.events.push(Event::HeaderBlockEnd(stream_id)),
        }
        true
    }

    fn on_syn_stream(
        &mut self,
        stream_id: u32,
        associated_stream_id: u32,
        priority: u8,
        fin: bool,
        unidirectional: bool,
    ) {
        self.events.push(Event::SynStream {
            stream_id,
            associated_stream_id,
            priority,
            fin,
            unidirectional,
        });
    }

    fn on_syn_reply(&mut self, stream_id: u32, fin: bool) {
        self.events.push(Event::SynReply(stream_id, fin));
    }

    fn on_headers(&mut self, stream_id: u32, fin: bool, end_headers: bool) {
        self.events.push(Event::Headers(stream_id, fin, end_headers));
    }

    fn on_push_promise(
        &mut self,
        stream_id: u32,
        promised_stream_id: u32,
        end_push_promise: bool,
    ) {
        self.events
            .push(Event::PushPromise(stream_id, promised_stream_id, end_push_promise));
    }

    fn on_continuation(&mut self, stream_id: u32, end_headers: bool) {
        self.events.push(Event::Continuation(stream_id, end_headers));
    }

    fn on_settings(&mut self, clear_persisted: bool) {
        self.events.push(Event::Settings(clear_persisted));
    }

    fn on_setting(&mut self, id: SettingId, flags: u8, value: u32) {
        self.events.push(Event::Setting(id, flags, value));
    }

    fn on_settings_ack(&mut self) {
        self.events.push(Event::SettingsAck);
    }

    fn on_settings_end(&mut self) {
        self.events.push(Event::SettingsEnd);
    }

    fn on_ping(&mut self, id: u64, ack: bool) {
        self.events.push(Event::Ping(id, ack));
    }

    fn on_go_away(&mut self, last_good_stream_id: u32, status: GoAwayStatus) {
        self.events.push(Event::GoAway(last_good_stream_id, status));
    }

    fn on_go_away_frame_data(&mut self, data: Option<&[u8]>) -> bool {
        match data {
            Some(d) => {
                if self.refuse_goaway_data {
                    return false;
                }
                self.events.push(Event::GoAwayData(d.to_vec()));
            }
            None => self.events.push(Event::GoAwayEnd),
        }
        true
    }

    fn on_rst_stream(&mut self, stream_id: u32, status: RstStreamStatus) {
        self.events.push(Event::RstStream(stream_id, status));
    }

    fn on_rst_stream_frame_data(&mut self, data: Option<&[u8]>) -> bool {
        match data {
            Some(d) => {
                if self.refuse_rst_data {
                    return false;
                }
                self.events.push(Event::RstStreamData(d.to_vec()));
            }
            None => self.events.push(Event::RstStreamEnd),
        }
        true
    }

    fn on_window_update(&mut self, stream_id: u32, delta: u32) {
        self.events.push(Event::WindowUpdate(stream_id, delta));
    }

    fn on_blocked(&mut self, stream_id: u32) {
        self.events.push(Event::Blocked(stream_id));
    }
}

fn parse_all(framer: &mut SpdyFramer, bytes: &[u8]) -> RecordingVisitor {
    let mut visitor = RecordingVisitor::default();
    let consumed = framer.process_input(&mut visitor, bytes);
    if framer.error().is_none() {
        assert_eq!(consumed, bytes.len());
    }
    visitor
}

fn parse_chunked(
    framer: &mut SpdyFramer,
    bytes: &[u8],
    chunk_size: usize,
) -> RecordingVisitor {
    let mut visitor = RecordingVisitor::default();
    for chunk in bytes.chunks(chunk_size) {
        let consumed = framer.process_input(&mut visitor, chunk);
        if framer.error().is_some() {
            break;
        }
        assert_eq!(consumed, chunk.len());
    }
    visitor
}

fn sample_headers() -> HeaderBlock {
    [(&b"host"[..], &b"www.example.org"[..]), (b"method", b"GET")]
        .into_iter()
        .collect()
}

#[test]
fn ping_round_trip() {
    for version in ALL_VERSIONS {
        let mut tx = SpdyFramer::new(version);
        let mut rx = SpdyFramer::new(version);
        let bytes = tx
            .serialize_frame(&Frame::Ping { id: 0x1234, ack: false })
            .unwrap();
        let visitor = parse_all(&mut rx, &bytes);
        assert_eq!(visitor.events, vec![Event::Ping(0x1234, false)]);
    }

    // The ack flag only exists from v4 on.
    let mut tx = SpdyFramer::new(SpdyVersion::V4);
    let mut rx = SpdyFramer::new(SpdyVersion::V4);
    let bytes = tx.serialize_frame(&Frame::Ping { id: 9, ack: true }).unwrap();
    let visitor = parse_all(&mut rx, &bytes);
    assert_eq!(visitor.events, vec![Event::Ping(9, true)]);
}

#[test]
fn data_round_trip_is_chunking_invariant() {
    for version in ALL_VERSIONS {
        let mut tx = SpdyFramer::new(version);
        let payload: Vec<u8> = (0..200u16).map(|i| i as u8).collect();
        let bytes = tx
            .serialize_frame(&Frame::Data {
                stream_id: 3,
                data: payload.clone(),
                fin: true,
            })
            .unwrap();

        let expected = vec![
            Event::DataHeader(3, payload.len(), true),
            Event::StreamData(3, payload.clone()),
            Event::StreamEnd(3),
        ];

        let mut rx = SpdyFramer::new(version);
        assert_eq!(parse_all(&mut rx, &bytes).normalized(), expected);

        let mut rx = SpdyFramer::new(version);
        assert_eq!(parse_chunked(&mut rx, &bytes, 1).normalized(), expected);
    }
}

#[test]
fn empty_data_frame_with_fin_delivers_once() {
    let mut tx = SpdyFramer::new(SpdyVersion::V3);
    let mut rx = SpdyFramer::new(SpdyVersion::V3);
    let bytes = tx
        .serialize_frame(&Frame::Data {
            stream_id: 1,
            data: Vec::new(),
            fin: true,
        })
        .unwrap();
    let visitor = parse_all(&mut rx, &bytes);
    assert_eq!(
        visitor.events,
        vec![Event::DataHeader(1, 0, true), Event::StreamEnd(1)]
    );
}

#[test]
fn syn_stream_round_trip_compressed() {
    for version in [SpdyVersion::V2, SpdyVersion::V3] {
        let mut tx = SpdyFramer::new(version);
        let mut rx = SpdyFramer::new(version);
        let headers = sample_headers();
        let bytes = tx
            .serialize_frame(&Frame::SynStream {
                stream_id: 1,
                associated_stream_id: 0,
                priority: 2,
                fin: false,
                unidirectional: true,
                headers: headers.clone(),
            })
            .unwrap();

        let visitor = parse_all(&mut rx, &bytes);
        let events = visitor.normalized();
        assert_eq!(
            events[0],
            Event::SynStream {
                stream_id: 1,
                associated_stream_id: 0,
                priority: 2,
                fin: false,
                unidirectional: true,
            }
        );
        assert_eq!(*events.last().unwrap(), Event::HeaderBlockEnd(1));

        let (parsed, _) =
            parse_header_block(version, &visitor.header_bytes(1)).unwrap();
        assert_eq!(parsed, headers);
    }
}

#[test]
fn syn_stream_fin_closes_stream_after_header_block() {
    let mut tx = SpdyFramer::new(SpdyVersion::V3);
    let mut rx = SpdyFramer::new(SpdyVersion::V3);
    let bytes = tx
        .serialize_frame(&Frame::SynStream {
            stream_id: 5,
            associated_stream_id: 0,
            priority: 0,
            fin: true,
            unidirectional: false,
            headers: sample_headers(),
        })
        .unwrap();
    let visitor = parse_all(&mut rx, &bytes);
    let events = visitor.normalized();
    assert_eq!(events[events.len() - 2], Event::HeaderBlockEnd(5));
    assert_eq!(events[events.len() - 1], Event::StreamEnd(5));
}

#[test]
fn syn_stream_at_v4_travels_as_headers_with_priority() {
    let mut tx = SpdyFramer::new(SpdyVersion::V4);
    let mut rx = SpdyFramer::new(SpdyVersion::V4);
    let headers = sample_headers();
    let bytes = tx
        .serialize_frame(&Frame::SynStream {
            stream_id: 1,
            associated_stream_id: 0,
            priority: 3,
            fin: false,
            unidirectional: false,
            headers: headers.clone(),
        })
        .unwrap();

    let visitor = parse_all(&mut rx, &bytes);
    let events = visitor.normalized();
    // The receiver still sees a SYN_STREAM even though the wire frame is
    // HEADERS with the priority flag.
    assert_eq!(
        events[0],
        Event::SynStream {
            stream_id: 1,
            associated_stream_id: 0,
            priority: 3,
            fin: false,
            unidirectional: false,
        }
    );
    let (parsed, _) =
        parse_header_block(SpdyVersion::V4, &visitor.header_bytes(1)).unwrap();
    assert_eq!(parsed, headers);
}

#[test]
fn syn_reply_and_headers_round_trip() {
    for version in [SpdyVersion::V2, SpdyVersion::V3] {
        let mut tx = SpdyFramer::new(version);
        let mut rx = SpdyFramer::new(version);
        let reply = tx
            .serialize_frame(&Frame::SynReply {
                stream_id: 1,
                fin: false,
                headers: sample_headers(),
            })
            .unwrap();
        let more = tx
            .serialize_frame(&Frame::Headers {
                stream_id: 1,
                fin: true,
                end_headers: true,
                priority: None,
                headers: [(&b"trailer"[..], &b"x"[..])].into_iter().collect(),
            })
            .unwrap();

        let mut input = reply;
        input.extend_from_slice(&more);
        let visitor = parse_all(&mut rx, &input);
        let events = visitor.normalized();
        assert_eq!(events[0], Event::SynReply(1, false));
        assert!(events.contains(&Event::Headers(1, true, true)));
        // FIN on the HEADERS frame ends the stream.
        assert_eq!(*events.last().unwrap(), Event::StreamEnd(1));
    }
}

#[test]
fn settings_round_trip() {
    for version in ALL_VERSIONS {
        let mut tx = SpdyFramer::new(version);
        let mut rx = SpdyFramer::new(version);
        let bytes = tx
            .serialize_frame(&Frame::Settings {
                clear_persisted: false,
                ack: false,
                entries: vec![
                    Setting::new(SettingId::MaxConcurrentStreams, 100),
                    Setting::new(SettingId::InitialWindowSize, 65536),
                ],
            })
            .unwrap();
        let visitor = parse_all(&mut rx, &bytes);
        assert_eq!(
            visitor.events,
            vec![
                Event::Settings(false),
                Event::Setting(SettingId::MaxConcurrentStreams, 0, 100),
                Event::Setting(SettingId::InitialWindowSize, 0, 65536),
                Event::SettingsEnd,
            ]
        );
    }
}

#[test]
fn settings_ack_round_trip() {
    let mut tx = SpdyFramer::new(SpdyVersion::V4);
    let mut rx = SpdyFramer::new(SpdyVersion::V4);
    let bytes = tx
        .serialize_frame(&Frame::Settings {
            clear_persisted: false,
            ack: true,
            entries: Vec::new(),
        })
        .unwrap();
    let visitor = parse_all(&mut rx, &bytes);
    assert_eq!(visitor.events, vec![Event::SettingsAck]);
}

#[test]
fn settings_entries_must_be_ordered_before_v4() {
    // The serializer always emits entries in id order, so build the
    // out-of-order frame by hand: CURRENT_CWND (5) before
    // DOWNLOAD_BANDWIDTH (2).
    let version = SpdyVersion::V3;
    let mut w = FrameWriter::new(version, 28);
    w.write_control_frame_header(FrameType::Settings, 0, 28);
    w.write_u32(2); // entry count
    w.write_bytes(&SettingsFlagsAndId::new(0, 5).to_wire(version));
    w.write_u32(10);
    w.write_bytes(&SettingsFlagsAndId::new(0, 2).to_wire(version));
    w.write_u32(20);
    let bytes = w.into_bytes();

    let mut rx = SpdyFramer::new(version);
    let visitor = parse_all(&mut rx, &bytes);
    // The first entry is delivered, the out-of-order one kills the frame.
    assert_eq!(
        visitor.events,
        vec![
            Event::Settings(false),
            Event::Setting(SettingId::CurrentCwnd, 0, 10),
            Event::Error(SpdyError::InvalidControlFrame),
        ]
    );
}

#[test]
fn unsorted_settings_input_round_trips_before_v4() {
    // Caller order is not wire order: the serializer sorts by id, so the
    // receiver sees a legal strictly-increasing frame.
    let mut tx = SpdyFramer::new(SpdyVersion::V3);
    let mut rx = SpdyFramer::new(SpdyVersion::V3);
    let bytes = tx
        .serialize_frame(&Frame::Settings {
            clear_persisted: false,
            ack: false,
            entries: vec![
                Setting::new(SettingId::CurrentCwnd, 10),
                Setting::new(SettingId::DownloadBandwidth, 20),
            ],
        })
        .unwrap();
    let visitor = parse_all(&mut rx, &bytes);
    assert_eq!(
        visitor.events,
        vec![
            Event::Settings(false),
            Event::Setting(SettingId::DownloadBandwidth, 0, 20),
            Event::Setting(SettingId::CurrentCwnd, 0, 10),
            Event::SettingsEnd,
        ]
    );
}

#[test]
fn duplicate_settings_id_is_rejected_before_v4() {
    let mut tx = SpdyFramer::new(SpdyVersion::V2);
    let mut rx = SpdyFramer::new(SpdyVersion::V2);
    let bytes = tx
        .serialize_frame(&Frame::Settings {
            clear_persisted: false,
            ack: false,
            entries: vec![
                Setting::new(SettingId::RoundTripTime, 1),
                Setting::new(SettingId::RoundTripTime, 2),
            ],
        })
        .unwrap();
    let visitor = parse_all(&mut rx, &bytes);
    assert_eq!(
        *visitor.events.last().unwrap(),
        Event::Error(SpdyError::InvalidControlFrame)
    );
}

#[test]
fn goaway_round_trip() {
    let mut tx = SpdyFramer::new(SpdyVersion::V2);
    let mut rx = SpdyFramer::new(SpdyVersion::V2);
    let bytes = tx
        .serialize_frame(&Frame::GoAway {
            last_good_stream_id: 7,
            status: GoAwayStatus::Ok,
            description: Vec::new(),
        })
        .unwrap();
    let visitor = parse_all(&mut rx, &bytes);
    assert_eq!(
        visitor.events,
        vec![Event::GoAway(7, GoAwayStatus::Ok), Event::GoAwayEnd]
    );

    let mut tx = SpdyFramer::new(SpdyVersion::V3);
    let mut rx = SpdyFramer::new(SpdyVersion::V3);
    let bytes = tx
        .serialize_frame(&Frame::GoAway {
            last_good_stream_id: 7,
            status: GoAwayStatus::InternalError,
            description: Vec::new(),
        })
        .unwrap();
    let visitor = parse_all(&mut rx, &bytes);
    assert_eq!(
        visitor.events,
        vec![
            Event::GoAway(7, GoAwayStatus::InternalError),
            Event::GoAwayEnd
        ]
    );
}

#[test]
fn goaway_v4_streams_description() {
    let mut tx = SpdyFramer::new(SpdyVersion::V4);
    let bytes = tx
        .serialize_frame(&Frame::GoAway {
            last_good_stream_id: 9,
            status: GoAwayStatus::ProtocolError,
            description: b"went away".to_vec(),
        })
        .unwrap();

    let mut rx = SpdyFramer::new(SpdyVersion::V4);
    let visitor = parse_chunked(&mut rx, &bytes, 3);
    assert_eq!(
        visitor.normalized(),
        vec![
            Event::GoAway(9, GoAwayStatus::ProtocolError),
            Event::GoAwayData(b"went away".to_vec()),
            Event::GoAwayEnd,
        ]
    );

    // A visitor that refuses the opaque data marks the frame corrupt.
    let mut rx = SpdyFramer::new(SpdyVersion::V4);
    let mut visitor = RecordingVisitor {
        refuse_goaway_data: true,
        ..Default::default()
    };
    rx.process_input(&mut visitor, &bytes);
    assert_eq!(rx.error(), Some(SpdyError::GoAwayFrameCorrupt));
}

#[test]
fn rst_stream_round_trip() {
    for version in ALL_VERSIONS {
        let mut tx = SpdyFramer::new(version);
        let mut rx = SpdyFramer::new(version);
        let bytes = tx
            .serialize_frame(&Frame::RstStream {
                stream_id: 5,
                status: RstStreamStatus::Cancel,
                description: Vec::new(),
            })
            .unwrap();
        let visitor = parse_all(&mut rx, &bytes);
        assert_eq!(
            visitor.events,
            vec![
                Event::RstStream(5, RstStreamStatus::Cancel),
                Event::RstStreamEnd
            ]
        );
    }
}

#[test]
fn rst_stream_v4_streams_description() {
    let mut tx = SpdyFramer::new(SpdyVersion::V4);
    let bytes = tx
        .serialize_frame(&Frame::RstStream {
            stream_id: 5,
            status: RstStreamStatus::ProtocolError,
            description: b"bad peer".to_vec(),
        })
        .unwrap();

    let mut rx = SpdyFramer::new(SpdyVersion::V4);
    let visitor = parse_chunked(&mut rx, &bytes, 2);
    assert_eq!(
        visitor.normalized(),
        vec![
            Event::RstStream(5, RstStreamStatus::ProtocolError),
            Event::RstStreamData(b"bad peer".to_vec()),
            Event::RstStreamEnd,
        ]
    );

    let mut rx = SpdyFramer::new(SpdyVersion::V4);
    let mut visitor = RecordingVisitor {
        refuse_rst_data: true,
        ..Default::default()
    };
    rx.process_input(&mut visitor, &bytes);
    assert_eq!(rx.error(), Some(SpdyError::RstStreamFrameCorrupt));
}

#[test]
fn window_update_round_trip() {
    for version in ALL_VERSIONS {
        let mut tx = SpdyFramer::new(version);
        let mut rx = SpdyFramer::new(version);
        let bytes = tx
            .serialize_frame(&Frame::WindowUpdate {
                stream_id: 3,
                delta: 0x1_0000,
            })
            .unwrap();
        let visitor = parse_all(&mut rx, &bytes);
        assert_eq!(visitor.events, vec![Event::WindowUpdate(3, 0x1_0000)]);
    }
}

#[test]
fn blocked_round_trip_v4() {
    let mut tx = SpdyFramer::new(SpdyVersion::V4);
    let mut rx = SpdyFramer::new(SpdyVersion::V4);
    let bytes = tx.serialize_frame(&Frame::Blocked { stream_id: 11 }).unwrap();
    let visitor = parse_all(&mut rx, &bytes);
    assert_eq!(visitor.events, vec![Event::Blocked(11)]);
}

#[test]
fn push_promise_round_trip_v4() {
    let mut tx = SpdyFramer::with_compression(SpdyVersion::V4, false);
    let mut rx = SpdyFramer::with_compression(SpdyVersion::V4, false);
    let headers = sample_headers();
    let bytes = tx
        .serialize_frame(&Frame::PushPromise {
            stream_id: 1,
            promised_stream_id: 2,
            end_push_promise: true,
            headers: headers.clone(),
        })
        .unwrap();
    let visitor = parse_all(&mut rx, &bytes);
    let events = visitor.normalized();
    assert_eq!(events[0], Event::PushPromise(1, 2, true));
    assert_eq!(*events.last().unwrap(), Event::HeaderBlockEnd(1));
    let (parsed, _) =
        parse_header_block(SpdyVersion::V4, &visitor.header_bytes(1)).unwrap();
    assert_eq!(parsed, headers);
}

#[test]
fn continuation_completes_a_header_block() {
    let mut tx = SpdyFramer::with_compression(SpdyVersion::V4, false);
    let mut rx = SpdyFramer::with_compression(SpdyVersion::V4, false);
    let headers = sample_headers();

    let mut input = tx
        .serialize_frame(&Frame::Headers {
            stream_id: 1,
            fin: true,
            end_headers: false,
            priority: None,
            headers: headers.clone(),
        })
        .unwrap();
    input.extend_from_slice(
        &tx.serialize_frame(&Frame::Continuation {
            stream_id: 1,
            end_headers: true,
            headers: HeaderBlock::new(),
        })
        .unwrap(),
    );

    let visitor = parse_all(&mut rx, &input);
    let events = visitor.normalized();
    assert_eq!(events[0], Event::Headers(1, true, false));
    assert!(events.contains(&Event::Continuation(1, true)));
    // The block terminator and the deferred FIN both arrive only once the
    // continuation closes the block.
    assert_eq!(events[events.len() - 2], Event::HeaderBlockEnd(1));
    assert_eq!(events[events.len() - 1], Event::StreamEnd(1));
    let (parsed, _) =
        parse_header_block(SpdyVersion::V4, &visitor.header_bytes(1)).unwrap();
    assert_eq!(parsed, headers);
}

#[test]
fn interleaved_frame_during_header_block_is_rejected() {
    let mut tx = SpdyFramer::with_compression(SpdyVersion::V4, false);
    let mut rx = SpdyFramer::with_compression(SpdyVersion::V4, false);

    let mut input = tx
        .serialize_frame(&Frame::Headers {
            stream_id: 1,
            fin: false,
            end_headers: false,
            priority: None,
            headers: sample_headers(),
        })
        .unwrap();
    input.extend_from_slice(
        &tx.serialize_frame(&Frame::Ping { id: 1, ack: false }).unwrap(),
    );

    let visitor = parse_all(&mut rx, &input);
    assert_eq!(
        *visitor.events.last().unwrap(),
        Event::Error(SpdyError::UnexpectedFrame)
    );
}

#[test]
fn continuation_without_open_block_is_rejected() {
    let mut tx = SpdyFramer::with_compression(SpdyVersion::V4, false);
    let mut rx = SpdyFramer::with_compression(SpdyVersion::V4, false);
    let bytes = tx
        .serialize_frame(&Frame::Continuation {
            stream_id: 1,
            end_headers: true,
            headers: HeaderBlock::new(),
        })
        .unwrap();
    let visitor = parse_all(&mut rx, &bytes);
    assert_eq!(
        visitor.events,
        vec![Event::Error(SpdyError::UnexpectedFrame)]
    );
}

#[test]
fn continuation_on_wrong_stream_is_rejected() {
    let mut tx = SpdyFramer::with_compression(SpdyVersion::V4, false);
    let mut rx = SpdyFramer::with_compression(SpdyVersion::V4, false);

    let mut input = tx
        .serialize_frame(&Frame::Headers {
            stream_id: 1,
            fin: false,
            end_headers: false,
            priority: None,
            headers: sample_headers(),
        })
        .unwrap();
    input.extend_from_slice(
        &tx.serialize_frame(&Frame::Continuation {
            stream_id: 3,
            end_headers: true,
            headers: HeaderBlock::new(),
        })
        .unwrap(),
    );

    let visitor = parse_all(&mut rx, &input);
    assert_eq!(
        *visitor.events.last().unwrap(),
        Event::Error(SpdyError::UnexpectedFrame)
    );
}

#[test]
fn oversized_control_frame_is_rejected() {
    let mut tx = SpdyFramer::with_compression(SpdyVersion::V3, false);
    let mut rx = SpdyFramer::with_compression(SpdyVersion::V3, false);
    rx.set_max_control_frame_size(64);

    let headers: HeaderBlock =
        [(&b"filler"[..], &[b'x'; 200][..])].into_iter().collect();
    let bytes = tx
        .serialize_frame(&Frame::SynStream {
            stream_id: 1,
            associated_stream_id: 0,
            priority: 0,
            fin: false,
            unidirectional: false,
            headers,
        })
        .unwrap();
    assert!(bytes.len() > 64);

    let visitor = parse_all(&mut rx, &bytes);
    assert_eq!(
        visitor.events,
        vec![Event::Error(SpdyError::ControlPayloadTooLarge)]
    );
}

#[test]
fn visitor_refusing_header_data_is_payload_too_large() {
    let mut tx = SpdyFramer::new(SpdyVersion::V3);
    let bytes = tx
        .serialize_frame(&Frame::SynReply {
            stream_id: 1,
            fin: false,
            headers: sample_headers(),
        })
        .unwrap();

    let mut rx = SpdyFramer::new(SpdyVersion::V3);
    let mut visitor = RecordingVisitor {
        refuse_header_data: true,
        ..Default::default()
    };
    rx.process_input(&mut visitor, &bytes);
    assert_eq!(rx.error(), Some(SpdyError::ControlPayloadTooLarge));
}

#[test]
fn garbage_header_block_fails_decompression() {
    let mut tx = SpdyFramer::new(SpdyVersion::V3);
    let mut bytes = tx
        .serialize_frame(&Frame::SynReply {
            stream_id: 1,
            fin: false,
            headers: sample_headers(),
        })
        .unwrap();
    // Corrupt the deflate stream past the fixed prefix.
    for b in &mut bytes[14..] {
        *b = !*b;
    }

    let mut rx = SpdyFramer::new(SpdyVersion::V3);
    let mut visitor = RecordingVisitor::default();
    rx.process_input(&mut visitor, &bytes);
    assert_eq!(rx.error(), Some(SpdyError::DecompressFailure));
}

#[test]
fn syn_stream_survives_three_byte_chunks() {
    let mut tx = SpdyFramer::new(SpdyVersion::V2);
    let headers = sample_headers();
    let bytes = tx
        .serialize_frame(&Frame::SynStream {
            stream_id: 1,
            associated_stream_id: 0,
            priority: 1,
            fin: false,
            unidirectional: false,
            headers: headers.clone(),
        })
        .unwrap();

    let mut rx = SpdyFramer::new(SpdyVersion::V2);
    let visitor = parse_chunked(&mut rx, &bytes, 3);
    assert!(rx.error().is_none());
    let events = visitor.normalized();
    assert_eq!(
        events[0],
        Event::SynStream {
            stream_id: 1,
            associated_stream_id: 0,
            priority: 1,
            fin: false,
            unidirectional: false,
        }
    );
    let (parsed, _) =
        parse_header_block(SpdyVersion::V2, &visitor.header_bytes(1)).unwrap();
    assert_eq!(parsed, headers);
}

#[test]
fn byte_at_a_time_matches_whole_buffer() {
    let mut tx = SpdyFramer::new(SpdyVersion::V3);
    let mut input = Vec::new();
    input.extend_from_slice(
        &tx.serialize_frame(&Frame::Settings {
            clear_persisted: false,
            ack: false,
            entries: vec![Setting::new(SettingId::InitialWindowSize, 1 << 16)],
        })
        .unwrap(),
    );
    input.extend_from_slice(
        &tx.serialize_frame(&Frame::SynStream {
            stream_id: 1,
            associated_stream_id: 0,
            priority: 0,
            fin: false,
            unidirectional: false,
            headers: sample_headers(),
        })
        .unwrap(),
    );
    input.extend_from_slice(
        &tx.serialize_frame(&Frame::Data {
            stream_id: 1,
            data: b"request body".to_vec(),
            fin: true,
        })
        .unwrap(),
    );
    input.extend_from_slice(
        &tx.serialize_frame(&Frame::Ping { id: 2, ack: false }).unwrap(),
    );

    let mut whole = SpdyFramer::new(SpdyVersion::V3);
    let mut bytewise = SpdyFramer::new(SpdyVersion::V3);
    let expected = parse_all(&mut whole, &input).normalized();
    let actual = parse_chunked(&mut bytewise, &input, 1).normalized();
    assert_eq!(actual, expected);
    assert!(whole.error().is_none());
    assert!(bytewise.error().is_none());
}

#[test]
fn reset_recovers_from_error_state() {
    let mut rx = SpdyFramer::new(SpdyVersion::V3);
    let mut visitor = RecordingVisitor::default();

    // A control frame claiming version 9 is unsupported.
    let bad = [0x80, 0x09, 0x00, 0x06, 0x00, 0x00, 0x00, 0x04, 0, 0, 0, 1];
    rx.process_input(&mut visitor, &bad);
    assert_eq!(rx.error(), Some(SpdyError::UnsupportedVersion));
    assert_eq!(rx.state(), ParserState::Error);

    rx.reset();
    assert!(rx.error().is_none());

    let mut tx = SpdyFramer::new(SpdyVersion::V3);
    let good = tx.serialize_frame(&Frame::Ping { id: 3, ack: false }).unwrap();
    let consumed = rx.process_input(&mut visitor, &good);
    assert_eq!(consumed, good.len());
    assert_eq!(*visitor.events.last().unwrap(), Event::Ping(3, false));
}
