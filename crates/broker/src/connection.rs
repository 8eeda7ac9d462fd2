//! Per-connection message handling.
//!
//! Each accepted connection gets a reader loop that decodes frames and
//! dispatches on the verb. Control messages are answered in order with
//! exactly one response; `Data` messages are fire-and-forget. Outgoing
//! writes from the reader loop and from stream delivery pumps share one
//! locked writer so frames never interleave mid-message.

use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;

use svr_core::{FrameProperties, Lockable, Status, options::parse_option_string};
use svr_encodings::Encoding;
use svr_protocol::{Message, verbs, wire};
use tracing::{debug, info, warn};

use crate::ingest;
use crate::registry::{Registry, RegistryError, SourceKind, StreamEvent};

pub(crate) struct ConnectionWriter {
    inner: Lockable<BufWriter<TcpStream>>,
}

impl ConnectionWriter {
    fn new(stream: TcpStream) -> Self {
        Self {
            inner: Lockable::new(BufWriter::new(stream)),
        }
    }

    fn send_message(&self, message: &Message) -> Result<(), wire::WireError> {
        let mut writer = self.inner.lock();
        wire::write_message(&mut *writer, message)?;
        writer.flush().map_err(wire::WireError::Io)
    }

    fn send_data(&self, name: &str, payload: &[u8]) -> Result<(), wire::WireError> {
        let mut writer = self.inner.lock();
        wire::write_frame(&mut *writer, &[verbs::DATA, name], payload)?;
        writer.flush().map_err(wire::WireError::Io)
    }
}

fn status_reply(status: Status) -> Message {
    Message::response(status, [])
}

fn registry_status(err: &RegistryError) -> Status {
    match err {
        RegistryError::NameClash(_) => Status::NameClash,
        RegistryError::Unknown(_) => Status::NoSuchSource,
    }
}

/// Runs the reader loop for one accepted connection until it disconnects,
/// then tears down everything the connection owned.
pub(crate) fn handle_connection(
    registry: Arc<Registry>,
    stream: TcpStream,
    connection_id: u64,
) {
    let peer = stream
        .peer_addr()
        .map_or_else(|_| "unknown".to_string(), |addr| addr.to_string());
    let _ = stream.set_nodelay(true);

    let writer = match stream.try_clone() {
        Ok(clone) => Arc::new(ConnectionWriter::new(clone)),
        Err(err) => {
            warn!(%peer, error = %err, "failed to clone connection stream");
            return;
        }
    };
    let mut reader = BufReader::new(stream);
    info!(%peer, connection_id, "connection established");

    loop {
        let message = match wire::read_message(&mut reader) {
            Ok(message) => message,
            Err(err) => {
                debug!(%peer, connection_id, error = %err, "connection closed");
                break;
            }
        };

        match message.verb() {
            Some(verbs::DATA) => handle_data(&registry, &message),
            Some(verb) => {
                let reply = dispatch(&registry, &writer, connection_id, verb, &message);
                if writer.send_message(&reply).is_err() {
                    break;
                }
            }
            None => {
                if writer.send_message(&status_reply(Status::InvalidArgument)).is_err() {
                    break;
                }
            }
        }
    }

    registry.close_owned_by(connection_id);
    info!(%peer, connection_id, "connection torn down");
}

fn handle_data(registry: &Registry, message: &Message) {
    let Some(name) = message.component(1) else {
        debug!("data frame without a source name");
        return;
    };
    let Some(payload) = message.payload() else {
        return;
    };
    // Fire-and-forget: an unknown name is dropped silently on the wire and
    // only observable out of band.
    let Some(record) = registry.source(name) else {
        debug!(source = name, "data for unknown source dropped");
        return;
    };
    registry.dispatch_payload(&record, payload);
}

fn dispatch(
    registry: &Arc<Registry>,
    writer: &Arc<ConnectionWriter>,
    connection_id: u64,
    verb: &str,
    message: &Message,
) -> Message {
    match verb {
        verbs::SOURCE_OPEN => source_open(registry, connection_id, message),
        verbs::SOURCE_CLOSE => source_close(registry, message),
        verbs::SOURCE_SET_ENCODING => source_set_encoding(registry, message),
        verbs::SOURCE_SET_FRAME_PROPERTIES => source_set_frame_properties(registry, message),
        verbs::SOURCE_GET_SOURCES_LIST => {
            Message::response(Status::Success, registry.list_sources())
        }
        verbs::STREAM_OPEN => stream_open(registry, writer, connection_id, message),
        verbs::STREAM_ATTACH => stream_attach(registry, message),
        verbs::STREAM_SET_ENCODING => stream_set_encoding(registry, message),
        verbs::STREAM_CLOSE => stream_close(registry, message),
        other => {
            debug!(verb = other, "unrecognized command");
            Message::response(Status::InvalidArgument, [other.to_string()])
        }
    }
}

fn source_open(registry: &Arc<Registry>, connection_id: u64, message: &Message) -> Message {
    let (Some(kind), Some(name)) = (message.component(1), message.component(2)) else {
        return status_reply(Status::InvalidArgument);
    };

    match kind {
        "client" => match registry.open_source(name, SourceKind::Client, connection_id) {
            Ok(_) => {
                info!(source = name, connection_id, "client source opened");
                status_reply(Status::Success)
            }
            Err(err) => status_reply(registry_status(&err)),
        },
        "server" => {
            let Some(descriptor) = message.component(3) else {
                return status_reply(Status::InvalidArgument);
            };
            open_server_source(registry, name, descriptor)
        }
        _ => status_reply(Status::InvalidArgument),
    }
}

fn open_server_source(registry: &Arc<Registry>, name: &str, descriptor: &str) -> Message {
    let options = match parse_option_string(descriptor) {
        Ok(options) => options,
        Err(err) => {
            debug!(descriptor, position = err.position(), "server source descriptor parse error");
            return status_reply(Status::ParseError);
        }
    };

    let spec = match ingest::parse_ingest_descriptor(&options) {
        Ok(spec) => spec,
        Err(err) => return status_reply(err.status()),
    };

    // Server sources are broker-owned: they survive the requesting
    // connection and are closed only by an explicit Source.close.
    let record = match registry.open_source(name, SourceKind::Server, 0) {
        Ok(record) => record,
        Err(err) => return status_reply(registry_status(&err)),
    };

    {
        let mut state = record.state.lock();
        state.encoding = Some(spec.encoding);
        state.options = Some(spec.encoding_options.clone());
        state.frame_properties = Some(spec.properties);
    }

    info!(source = name, encoding = %spec.encoding, "server source opened");
    ingest::spawn_ingest(Arc::clone(registry), record, spec);
    status_reply(Status::Success)
}

fn source_close(registry: &Registry, message: &Message) -> Message {
    let Some(name) = message.component(1) else {
        return status_reply(Status::InvalidArgument);
    };
    match registry.close_source(name) {
        Ok(()) => {
            info!(source = name, "source closed");
            status_reply(Status::Success)
        }
        Err(err) => status_reply(registry_status(&err)),
    }
}

fn source_set_encoding(registry: &Registry, message: &Message) -> Message {
    let (Some(name), Some(descriptor)) = (message.component(1), message.component(2)) else {
        return status_reply(Status::InvalidArgument);
    };
    let Some(record) = registry.source(name) else {
        return status_reply(Status::NoSuchSource);
    };

    let options = match parse_option_string(descriptor) {
        Ok(options) => options,
        Err(err) => {
            debug!(descriptor, position = err.position(), "encoding descriptor parse error");
            return status_reply(Status::ParseError);
        }
    };
    let Some(encoding) = Encoding::lookup(options.name()) else {
        return status_reply(Status::NoSuchEncoding);
    };

    {
        let mut state = record.state.lock();
        state.encoding = Some(encoding);
        state.options = Some(options);
    }
    registry.rebuild_attached(&record);
    status_reply(Status::Success)
}

fn source_set_frame_properties(registry: &Registry, message: &Message) -> Message {
    let (Some(name), Some(descriptor)) = (message.component(1), message.component(2)) else {
        return status_reply(Status::InvalidArgument);
    };
    let Some(record) = registry.source(name) else {
        return status_reply(Status::NoSuchSource);
    };
    let Ok(properties) = descriptor.parse::<FrameProperties>() else {
        return status_reply(Status::InvalidArgument);
    };

    record.state.lock().frame_properties = Some(properties);
    registry.rebuild_attached(&record);
    status_reply(Status::Success)
}

fn stream_open(
    registry: &Registry,
    writer: &Arc<ConnectionWriter>,
    connection_id: u64,
    message: &Message,
) -> Message {
    let Some(name) = message.component(1) else {
        return status_reply(Status::InvalidArgument);
    };

    let (sender, receiver) = crossbeam_channel::unbounded();
    match registry.open_stream(name, connection_id, sender) {
        Ok(record) => {
            let writer = Arc::clone(writer);
            let stream_name = record.name().to_string();
            thread::Builder::new()
                .name(format!("svr-stream-{stream_name}"))
                .spawn(move || deliver_stream(&writer, &stream_name, &receiver))
                .map_or_else(
                    |err| {
                        warn!(stream = name, error = %err, "failed to spawn delivery pump");
                        status_reply(Status::CommFailure)
                    },
                    |_| status_reply(Status::Success),
                )
        }
        Err(err) => status_reply(registry_status(&err)),
    }
}

/// Drains a stream's event queue into the subscriber connection.
fn deliver_stream(
    writer: &ConnectionWriter,
    name: &str,
    receiver: &crossbeam_channel::Receiver<StreamEvent>,
) {
    for event in receiver {
        match event {
            StreamEvent::Payload(payload) => {
                if writer.send_data(name, &payload).is_err() {
                    return;
                }
            }
            StreamEvent::Orphaned => {
                let notice = Message::request(
                    verbs::STREAM_ORPHANED,
                    [name, Status::SourceClosed.to_string().as_str()],
                );
                let _ = writer.send_message(&notice);
                return;
            }
        }
    }
}

fn stream_attach(registry: &Registry, message: &Message) -> Message {
    let (Some(stream), Some(source)) = (message.component(1), message.component(2)) else {
        return status_reply(Status::InvalidArgument);
    };
    match registry.attach(stream, source) {
        Ok(()) => {
            info!(stream, source, "stream attached");
            status_reply(Status::Success)
        }
        Err(err) => status_reply(registry_status(&err)),
    }
}

fn stream_set_encoding(registry: &Registry, message: &Message) -> Message {
    let (Some(name), Some(descriptor)) = (message.component(1), message.component(2)) else {
        return status_reply(Status::InvalidArgument);
    };

    let options = match parse_option_string(descriptor) {
        Ok(options) => options,
        Err(err) => {
            debug!(descriptor, position = err.position(), "encoding descriptor parse error");
            return status_reply(Status::ParseError);
        }
    };
    let Some(encoding) = Encoding::lookup(options.name()) else {
        return status_reply(Status::NoSuchEncoding);
    };

    match registry.set_stream_encoding(name, encoding, options) {
        Ok(()) => status_reply(Status::Success),
        Err(err) => status_reply(registry_status(&err)),
    }
}

fn stream_close(registry: &Registry, message: &Message) -> Message {
    let Some(name) = message.component(1) else {
        return status_reply(Status::InvalidArgument);
    };
    match registry.close_stream(name) {
        Ok(()) => status_reply(Status::Success),
        Err(err) => status_reply(registry_status(&err)),
    }
}
