//! Producer pipeline tests against a scripted in-process broker.

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

use svr_client::{Comm, Source};
use svr_core::{Frame, FrameProperties, Status};
use svr_encodings::Encoding;
use svr_protocol::{Message, verbs, wire};

/// A minimal scripted broker: answers every control message through the
/// supplied behavior and records everything it receives.
struct MockBroker {
    addr: std::net::SocketAddr,
    received: Arc<Mutex<Vec<Message>>>,
}

type Behavior = dyn Fn(&Message) -> Message + Send + Sync;

impl MockBroker {
    fn spawn(behavior: impl Fn(&Message) -> Message + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock broker");
        let addr = listener.local_addr().expect("local addr");
        let received = Arc::new(Mutex::new(Vec::new()));
        let behavior: Arc<Behavior> = Arc::new(behavior);

        let log = Arc::clone(&received);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let log = Arc::clone(&log);
                let behavior = Arc::clone(&behavior);
                thread::spawn(move || {
                    let mut reader = std::io::BufReader::new(
                        stream.try_clone().expect("clone mock stream"),
                    );
                    let mut writer = stream;
                    while let Ok(message) = wire::read_message(&mut reader) {
                        let is_data = message.verb() == Some(verbs::DATA);
                        log.lock().unwrap().push(message.clone());
                        if !is_data {
                            let reply = behavior(&message);
                            if wire::write_message(&mut writer, &reply).is_err() {
                                break;
                            }
                        }
                    }
                });
            }
        });

        Self { addr, received }
    }

    fn connect(&self) -> Arc<Comm> {
        Arc::new(Comm::connect(self.addr).expect("connect to mock broker"))
    }

    fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }

    fn count_verb(&self, verb: &str) -> usize {
        self.received()
            .iter()
            .filter(|m| m.verb() == Some(verb))
            .count()
    }
}

fn accept_all(_: &Message) -> Message {
    Message::response(Status::Success, [])
}

/// Accepts everything except `Source.setEncoding` descriptors whose leading
/// name is in `rejected`.
fn reject_encodings(rejected: &'static [&'static str]) -> impl Fn(&Message) -> Message {
    move |message| {
        if message.verb() == Some(verbs::SOURCE_SET_ENCODING) {
            let descriptor = message.component(2).unwrap_or_default();
            let name = descriptor.split(';').next().unwrap_or_default();
            if rejected.contains(&name) {
                return Message::response(Status::NoSuchEncoding, []);
            }
        }
        Message::response(Status::Success, [])
    }
}

fn small_props() -> FrameProperties {
    FrameProperties::new(16, 8, 8, 3).unwrap()
}

#[test]
fn first_frame_locks_properties_and_emits_data() {
    let broker = MockBroker::spawn(accept_all);
    let comm = broker.connect();
    let source = Source::open(&comm, "cam1").unwrap();

    assert_eq!(source.encoding(), Some(Encoding::Jpeg));
    source.send_frame(&Frame::filled(small_props(), 120)).unwrap();

    // A synchronous request after the fire-and-forget data flushes the
    // ordered channel, so the log below is complete.
    svr_client::sources_list(&comm).unwrap();

    let received = broker.received();
    let verbs_seen: Vec<&str> = received.iter().filter_map(Message::verb).collect();
    assert!(verbs_seen.contains(&verbs::SOURCE_OPEN));
    assert!(verbs_seen.contains(&verbs::SOURCE_SET_ENCODING));
    assert!(verbs_seen.contains(&verbs::SOURCE_SET_FRAME_PROPERTIES));
    assert!(verbs_seen.contains(&verbs::DATA));

    let props_request = received
        .iter()
        .find(|m| m.verb() == Some(verbs::SOURCE_SET_FRAME_PROPERTIES))
        .expect("properties negotiated");
    assert_eq!(props_request.component(1), Some("cam1"));
    assert_eq!(props_request.component(2), Some("16,8,8,3"));

    let data = received
        .iter()
        .find(|m| m.verb() == Some(verbs::DATA))
        .expect("data emitted");
    assert_eq!(data.component(1), Some("cam1"));
    assert!(data.payload().is_some_and(|p| !p.is_empty()));
}

#[test]
fn jpeg_refusal_falls_back_to_raw() {
    let broker = MockBroker::spawn(reject_encodings(&["jpeg"]));
    let comm = broker.connect();
    let source = Source::open(&comm, "cam1").unwrap();

    assert_eq!(source.encoding(), Some(Encoding::Raw));
    let options = source.encoding_options().expect("options installed");
    assert_eq!(options.name(), "raw");
}

#[test]
fn all_defaults_refused_leaves_no_encoding() {
    let broker = MockBroker::spawn(reject_encodings(&["jpeg", "raw"]));
    let comm = broker.connect();
    let source = Source::open(&comm, "cam1").unwrap();

    assert_eq!(source.encoding(), None);
    let err = source
        .send_frame(&Frame::filled(small_props(), 0))
        .unwrap_err();
    assert_eq!(err.status(), Status::InvalidState);
}

#[test]
fn broker_rejection_preserves_prior_encoding() {
    let broker = MockBroker::spawn(reject_encodings(&["ffv1"]));
    let comm = broker.connect();
    let source = Source::open(&comm, "cam1").unwrap();

    let before_encoding = source.encoding();
    let before_options = source.encoding_options().map(|o| o.descriptor());

    let err = source.set_encoding("ffv1;gop=5").unwrap_err();
    assert_eq!(err.status(), Status::NoSuchEncoding);

    assert_eq!(source.encoding(), before_encoding);
    assert_eq!(
        source.encoding_options().map(|o| o.descriptor()),
        before_options
    );
}

#[test]
fn unknown_encoding_is_refused_without_a_round_trip() {
    let broker = MockBroker::spawn(accept_all);
    let comm = broker.connect();
    let source = Source::open(&comm, "cam1").unwrap();
    let negotiations_before = broker.count_verb(verbs::SOURCE_SET_ENCODING);

    let err = source.set_encoding("bogus;q=90").unwrap_err();
    assert_eq!(err.status(), Status::NoSuchEncoding);

    // The local registry refused the name; the broker saw no new request.
    assert_eq!(
        broker.count_verb(verbs::SOURCE_SET_ENCODING),
        negotiations_before
    );
    assert_eq!(source.encoding(), Some(Encoding::Jpeg));
}

#[test]
fn malformed_descriptor_reports_byte_position() {
    let broker = MockBroker::spawn(accept_all);
    let comm = broker.connect();
    let source = Source::open(&comm, "cam1").unwrap();

    let err = source.set_encoding(";;;").unwrap_err();
    assert_eq!(err.status(), Status::ParseError);
    match err {
        svr_client::SourceError::Parse(parse) => assert_eq!(parse.position(), 0),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn mismatched_frame_is_refused_without_data() {
    let broker = MockBroker::spawn(accept_all);
    let comm = broker.connect();
    let source = Source::open(&comm, "cam1").unwrap();

    source.set_frame_properties(small_props()).unwrap();
    let other = FrameProperties::new(8, 8, 8, 3).unwrap();
    let err = source.send_frame(&Frame::filled(other, 3)).unwrap_err();
    assert_eq!(err.status(), Status::InvalidArgument);

    assert_eq!(broker.count_verb(verbs::DATA), 0);
}

#[test]
fn built_encoder_does_not_observe_an_encoding_change() {
    let broker = MockBroker::spawn(accept_all);
    let comm = broker.connect();
    let source = Source::open(&comm, "cam1").unwrap();

    // Build the encoder under the jpeg negotiation.
    source.send_frame(&Frame::filled(small_props(), 10)).unwrap();

    // Renegotiate to raw. The handle's encoding changes, but the encoder
    // built above stays in place, so the next frame is still jpeg bytes.
    source.set_encoding("raw").unwrap();
    assert_eq!(source.encoding(), Some(Encoding::Raw));
    source.send_frame(&Frame::filled(small_props(), 10)).unwrap();
    svr_client::sources_list(&comm).unwrap();

    let data: Vec<Message> = broker
        .received()
        .into_iter()
        .filter(|m| m.verb() == Some(verbs::DATA))
        .collect();
    let last = data.last().expect("second frame emitted");
    let payload = last.payload().expect("payload present");
    // Length-framed jpeg, not a raw pixel dump.
    let len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    assert_eq!(len + 4, payload.len());
    assert_eq!(&payload[4..6], &[0xFF, 0xD8]);
}

#[test]
fn close_releases_the_name_for_reuse() {
    let broker = MockBroker::spawn(accept_all);
    let comm = broker.connect();

    let source = Source::open(&comm, "cam1").unwrap();
    source.close().unwrap();
    assert_eq!(broker.count_verb(verbs::SOURCE_CLOSE), 1);

    // The mock broker accepts the reopened name, as the real one must after
    // eviction.
    let reopened = Source::open(&comm, "cam1").unwrap();
    drop(reopened);
    assert_eq!(broker.count_verb(verbs::SOURCE_CLOSE), 2);
}

#[test]
fn concurrent_send_frame_serializes_whole_payloads() {
    let broker = MockBroker::spawn(reject_encodings(&["jpeg"]));
    let comm = broker.connect();
    let props = FrameProperties::new(2, 2, 8, 1).unwrap();
    let source = Arc::new(Source::open(&comm, "cam1").unwrap());
    assert_eq!(source.encoding(), Some(Encoding::Raw));

    let threads: usize = 4;
    let frames_per_thread: usize = 5;
    let mut handles = Vec::new();
    for thread_index in 0..threads {
        let source = Arc::clone(&source);
        handles.push(thread::spawn(move || {
            let fill = 0x10 * (thread_index as u8 + 1);
            for _ in 0..frames_per_thread {
                source.send_frame(&Frame::filled(props, fill)).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    svr_client::sources_list(&comm).unwrap();

    let data: Vec<Message> = broker
        .received()
        .into_iter()
        .filter(|m| m.verb() == Some(verbs::DATA))
        .collect();
    assert_eq!(data.len(), threads * frames_per_thread);

    // Every payload is one whole frame: uniform fill, never interleaved.
    for message in &data {
        let payload = message.payload().expect("payload present");
        assert_eq!(payload.len(), props.frame_size());
        let first = payload[0];
        assert!(payload.iter().all(|&b| b == first));
    }
}
