//! End-to-end routing tests: a real broker on loopback, the producer API
//! on one side, and a raw wire-level subscriber on the other.

use std::io::BufReader;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use svr_broker::{Broker, BrokerConfig};
use svr_client::{Comm, Source, close_server_source, open_server_source, sources_list};
use svr_core::{Frame, FrameProperties, Status};
use svr_protocol::{Message, parse_response, verbs, wire};

fn start_broker() -> SocketAddr {
    let broker = Broker::bind(&BrokerConfig::new("127.0.0.1:0")).expect("bind broker");
    let addr = broker.local_addr().expect("local addr");
    thread::spawn(move || {
        let _ = broker.run();
    });
    addr
}

/// A wire-level subscriber connection.
struct Subscriber {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Subscriber {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect subscriber");
        stream.set_nodelay(true).expect("nodelay");
        Self {
            reader: BufReader::new(stream.try_clone().expect("clone subscriber stream")),
            writer: stream,
        }
    }

    fn request(&mut self, verb: &str, args: &[&str]) -> Status {
        let message = Message::request(verb, args.iter().copied());
        wire::write_message(&mut self.writer, &message).expect("write request");
        let reply = wire::read_message(&mut self.reader).expect("read reply");
        parse_response(&reply).expect("parse reply status")
    }

    fn read_message(&mut self) -> Message {
        wire::read_message(&mut self.reader).expect("read pushed message")
    }
}

#[test]
fn sources_list_reports_client_and_server_kinds() {
    let addr = start_broker();
    let comm = Arc::new(Comm::connect(addr).expect("connect"));

    let source = Source::open(&comm, "a").expect("open client source");
    open_server_source(&comm, "b", "test;width=16;height=16;fps=1").expect("open server source");

    let mut listed = sources_list(&comm).expect("list sources");
    listed.sort();
    assert_eq!(listed, ["c:a", "s:b"]);

    source.close().expect("close client source");
    close_server_source(&comm, "b").expect("close server source");
    assert!(sources_list(&comm).expect("list again").is_empty());
}

#[test]
fn duplicate_names_clash_until_closed() {
    let addr = start_broker();
    let comm = Arc::new(Comm::connect(addr).expect("connect"));

    let first = Source::open(&comm, "cam").expect("first open");
    let err = Source::open(&comm, "cam").expect_err("duplicate refused");
    assert_eq!(err.status(), Status::NameClash);

    first.close().expect("close");
    let reopened = Source::open(&comm, "cam").expect("name reusable after close");
    reopened.close().expect("close reopened");
}

#[test]
fn raw_stream_receives_whole_frames_then_orphan_notice() {
    let addr = start_broker();
    let comm = Arc::new(Comm::connect(addr).expect("connect producer"));
    let props = FrameProperties::new(4, 4, 8, 1).unwrap();

    let source = Source::open(&comm, "cam").expect("open source");
    source.set_encoding("raw").expect("negotiate raw");
    // Lock properties up front so the subscriber can attach before data.
    source.set_frame_properties(props).expect("lock properties");

    let mut subscriber = Subscriber::connect(addr);
    assert_eq!(subscriber.request(verbs::STREAM_OPEN, &["view"]), Status::Success);
    assert_eq!(
        subscriber.request(verbs::STREAM_ATTACH, &["view", "cam"]),
        Status::Success
    );

    let frames: Vec<Frame> = (1u8..=2).map(|fill| Frame::filled(props, fill)).collect();
    for frame in &frames {
        source.send_frame(frame).expect("send frame");
    }

    for expected in &frames {
        let message = subscriber.read_message();
        assert_eq!(message.verb(), Some(verbs::DATA));
        assert_eq!(message.component(1), Some("view"));
        assert_eq!(message.payload(), Some(expected.data()));
    }

    // Closing the producer orphans the stream; the subscriber observes the
    // terminal notice instead of blocking forever.
    source.close().expect("close source");
    let notice = subscriber.read_message();
    assert_eq!(notice.verb(), Some(verbs::STREAM_ORPHANED));
    assert_eq!(notice.component(1), Some("view"));
    assert_eq!(
        notice.component(2),
        Some(Status::SourceClosed.to_string().as_str())
    );
}

#[test]
fn jpeg_stream_transcodes_raw_source_frames() {
    let addr = start_broker();
    let comm = Arc::new(Comm::connect(addr).expect("connect producer"));
    let props = FrameProperties::new(16, 8, 8, 3).unwrap();

    let source = Source::open(&comm, "cam").expect("open source");
    source.set_encoding("raw").expect("negotiate raw");
    source.set_frame_properties(props).expect("lock properties");

    let mut subscriber = Subscriber::connect(addr);
    assert_eq!(subscriber.request(verbs::STREAM_OPEN, &["view"]), Status::Success);
    assert_eq!(
        subscriber.request(verbs::STREAM_SET_ENCODING, &["view", "jpeg;quality=90"]),
        Status::Success
    );
    assert_eq!(
        subscriber.request(verbs::STREAM_ATTACH, &["view", "cam"]),
        Status::Success
    );

    source
        .send_frame(&Frame::filled(props, 128))
        .expect("send frame");

    let message = subscriber.read_message();
    assert_eq!(message.verb(), Some(verbs::DATA));
    let payload = message.payload().expect("payload present").to_vec();

    let mut decoder = svr_encodings::jpeg::JpegDecoder::new(props).expect("decoder");
    use svr_encodings::Decoder as _;
    decoder.decode(&payload).expect("decode delivered jpeg");
    let frame = decoder.take_frame().expect("whole frame delivered");
    assert_eq!(frame.properties(), props);

    source.close().expect("close source");
}

#[test]
fn server_source_feeds_attached_streams() {
    let addr = start_broker();
    let comm = Arc::new(Comm::connect(addr).expect("connect"));

    open_server_source(&comm, "gen", "test;width=8;height=8;fps=30;encoding=raw")
        .expect("open server source");

    let props = FrameProperties::new(8, 8, 8, 3).unwrap();
    let mut subscriber = Subscriber::connect(addr);
    assert_eq!(subscriber.request(verbs::STREAM_OPEN, &["view"]), Status::Success);
    assert_eq!(
        subscriber.request(verbs::STREAM_ATTACH, &["view", "gen"]),
        Status::Success
    );

    let message = subscriber.read_message();
    assert_eq!(message.verb(), Some(verbs::DATA));
    assert_eq!(message.component(1), Some("view"));
    let payload = message.payload().expect("payload present");
    assert_eq!(payload.len(), props.frame_size());

    close_server_source(&comm, "gen").expect("close server source");
    // Delivery drains, then the orphan notice arrives.
    loop {
        let message = subscriber.read_message();
        if message.verb() == Some(verbs::STREAM_ORPHANED) {
            break;
        }
        assert_eq!(message.verb(), Some(verbs::DATA));
    }
}

#[test]
fn unknown_source_attach_is_refused() {
    let addr = start_broker();
    let mut subscriber = Subscriber::connect(addr);
    assert_eq!(subscriber.request(verbs::STREAM_OPEN, &["view"]), Status::Success);
    assert_eq!(
        subscriber.request(verbs::STREAM_ATTACH, &["view", "ghost"]),
        Status::NoSuchSource
    );
}

#[test]
fn disconnecting_producer_orphans_its_streams() {
    let addr = start_broker();

    // A wire-level producer, so the connection can vanish without the
    // clean close an owned handle would perform.
    let mut producer = Subscriber::connect(addr);
    assert_eq!(
        producer.request(verbs::SOURCE_OPEN, &["client", "cam"]),
        Status::Success
    );
    assert_eq!(
        producer.request(verbs::SOURCE_SET_ENCODING, &["cam", "raw"]),
        Status::Success
    );
    assert_eq!(
        producer.request(verbs::SOURCE_SET_FRAME_PROPERTIES, &["cam", "4,4,8,1"]),
        Status::Success
    );

    let mut subscriber = Subscriber::connect(addr);
    assert_eq!(subscriber.request(verbs::STREAM_OPEN, &["view"]), Status::Success);
    assert_eq!(
        subscriber.request(verbs::STREAM_ATTACH, &["view", "cam"]),
        Status::Success
    );

    drop(producer);

    // Allow the broker's reader thread to observe the disconnect.
    thread::sleep(Duration::from_millis(100));
    let notice = subscriber.read_message();
    assert_eq!(notice.verb(), Some(verbs::STREAM_ORPHANED));
}
