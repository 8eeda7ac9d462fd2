//! Broker-side source and stream registries.
//!
//! The registry maps names to records and owns the fan-out path: a payload
//! arriving for a source is pushed through every attached stream's
//! reencoder and queued on the stream's delivery channel. Closing a source
//! evicts it and orphans its streams atomically: each stream flips to the
//! orphaned state under its lock and its channel receives a final
//! [`StreamEvent::Orphaned`], so a blocked reader wakes and observes the
//! closure instead of waiting forever.

use std::sync::Arc;

use crossbeam_channel::Sender;
use rustc_hash::FxHashMap;
use svr_core::{FrameProperties, Lockable, OptionString};
use svr_encodings::Encoding;
use thiserror::Error;
use tracing::{debug, warn};

use crate::reencoder::Reencoder;

/// Whether a source is fed by a client connection or by the broker itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SourceKind {
    /// Published by a client through `Data` messages.
    Client,
    /// Ingested by a broker-owned task.
    Server,
}

impl SourceKind {
    /// The listing prefix (`c` or `s`).
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Client => 'c',
            Self::Server => 's',
        }
    }
}

/// Registry failures, mapped onto the wire status taxonomy by dispatch.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RegistryError {
    /// The name is already taken.
    #[error("name {0:?} is already in use")]
    NameClash(String),

    /// No record exists under the name.
    #[error("no such source or stream: {0:?}")]
    Unknown(String),
}

/// Events delivered to a stream's subscriber connection.
#[derive(Debug)]
pub enum StreamEvent {
    /// One reencoded payload chunk.
    Payload(Vec<u8>),
    /// The backing source was closed; no further payloads will follow.
    Orphaned,
}

#[derive(Debug)]
pub(crate) struct SourceShared {
    pub encoding: Option<Encoding>,
    pub options: Option<OptionString>,
    pub frame_properties: Option<FrameProperties>,
    pub streams: Vec<Arc<StreamRecord>>,
    pub closed: bool,
}

/// One registered source.
#[derive(Debug)]
pub struct SourceRecord {
    name: String,
    kind: SourceKind,
    owner: u64,
    pub(crate) state: Lockable<SourceShared>,
}

impl SourceRecord {
    /// The source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Client or server source.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Reports whether the record was closed and evicted.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[derive(Debug)]
pub(crate) struct StreamShared {
    pub encoding: Option<Encoding>,
    pub options: Option<OptionString>,
    pub source: Option<String>,
    pub reencoder: Option<Reencoder>,
    pub orphaned: bool,
}

/// One subscriber stream.
#[derive(Debug)]
pub struct StreamRecord {
    name: String,
    owner: u64,
    sender: Sender<StreamEvent>,
    pub(crate) state: Lockable<StreamShared>,
}

impl StreamRecord {
    /// The stream name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reports whether the stream lost its source.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        self.state.lock().orphaned
    }
}

/// Name-to-record maps for every source and stream the broker knows.
#[derive(Default)]
pub struct Registry {
    sources: Lockable<FxHashMap<String, Arc<SourceRecord>>>,
    streams: Lockable<FxHashMap<String, Arc<StreamRecord>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source, rejecting duplicate names.
    pub fn open_source(
        &self,
        name: &str,
        kind: SourceKind,
        owner: u64,
    ) -> Result<Arc<SourceRecord>, RegistryError> {
        let mut sources = self.sources.lock();
        if sources.contains_key(name) {
            return Err(RegistryError::NameClash(name.to_string()));
        }
        let record = Arc::new(SourceRecord {
            name: name.to_string(),
            kind,
            owner,
            state: Lockable::new(SourceShared {
                encoding: None,
                options: None,
                frame_properties: None,
                streams: Vec::new(),
                closed: false,
            }),
        });
        sources.insert(name.to_string(), Arc::clone(&record));
        Ok(record)
    }

    /// Looks up a source by name.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<Arc<SourceRecord>> {
        self.sources.lock().get(name).cloned()
    }

    /// Evicts a source and orphans every attached stream.
    ///
    /// The name becomes reusable as soon as this returns.
    pub fn close_source(&self, name: &str) -> Result<(), RegistryError> {
        let record = self
            .sources
            .lock()
            .remove(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;

        let streams = {
            let mut state = record.state.lock();
            state.closed = true;
            std::mem::take(&mut state.streams)
        };
        record.state.notify_all();

        for stream in streams {
            {
                let mut state = stream.state.lock();
                state.orphaned = true;
                state.reencoder = None;
                state.source = None;
            }
            stream.state.notify_all();
            // A dropped receiver just means the subscriber is already gone.
            let _ = stream.sender.send(StreamEvent::Orphaned);
            debug!(stream = stream.name(), source = name, "stream orphaned");
        }
        Ok(())
    }

    /// Registers a stream, rejecting duplicate names.
    ///
    /// Streams start with the `raw` delivery encoding until renegotiated.
    pub fn open_stream(
        &self,
        name: &str,
        owner: u64,
        sender: Sender<StreamEvent>,
    ) -> Result<Arc<StreamRecord>, RegistryError> {
        let mut streams = self.streams.lock();
        if streams.contains_key(name) {
            return Err(RegistryError::NameClash(name.to_string()));
        }
        let record = Arc::new(StreamRecord {
            name: name.to_string(),
            owner,
            sender,
            state: Lockable::new(StreamShared {
                encoding: Some(Encoding::Raw),
                options: Some(OptionString::from_parts("raw", Default::default())),
                source: None,
                reencoder: None,
                orphaned: false,
            }),
        });
        streams.insert(name.to_string(), Arc::clone(&record));
        Ok(record)
    }

    /// Looks up a stream by name.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<Arc<StreamRecord>> {
        self.streams.lock().get(name).cloned()
    }

    /// Removes a stream, detaching it from its source.
    pub fn close_stream(&self, name: &str) -> Result<(), RegistryError> {
        let record = self
            .streams
            .lock()
            .remove(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;

        let attached = record.state.lock().source.take();
        if let Some(source_name) = attached {
            if let Some(source) = self.source(&source_name) {
                source
                    .state
                    .lock()
                    .streams
                    .retain(|s| s.name() != record.name());
            }
        }
        Ok(())
    }

    /// Binds a stream to a source and builds its reencoder.
    pub fn attach(&self, stream_name: &str, source_name: &str) -> Result<(), RegistryError> {
        let source = self
            .source(source_name)
            .ok_or_else(|| RegistryError::Unknown(source_name.to_string()))?;
        let stream = self
            .stream(stream_name)
            .ok_or_else(|| RegistryError::Unknown(stream_name.to_string()))?;

        let mut source_state = source.state.lock();
        {
            let mut stream_state = stream.state.lock();
            stream_state.source = Some(source_name.to_string());
            stream_state.orphaned = false;
            build_reencoder(&source_state, &mut stream_state, stream.name());
        }
        source_state.streams.push(Arc::clone(&stream));
        Ok(())
    }

    /// Renegotiates a stream's delivery encoding.
    pub fn set_stream_encoding(
        &self,
        name: &str,
        encoding: Encoding,
        options: OptionString,
    ) -> Result<(), RegistryError> {
        let stream = self
            .stream(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;

        let attached = {
            let mut state = stream.state.lock();
            state.encoding = Some(encoding);
            state.options = Some(options);
            state.reencoder = None;
            state.source.clone()
        };

        if let Some(source_name) = attached {
            if let Some(source) = self.source(&source_name) {
                let source_state = source.state.lock();
                let mut stream_state = stream.state.lock();
                build_reencoder(&source_state, &mut stream_state, stream.name());
            }
        }
        Ok(())
    }

    /// Rebuilds the reencoder of every stream attached to `record`, after
    /// the source's encoding or frame properties changed.
    pub(crate) fn rebuild_attached(&self, record: &SourceRecord) {
        let state = record.state.lock();
        for stream in &state.streams {
            let mut stream_state = stream.state.lock();
            stream_state.reencoder = None;
            build_reencoder(&state, &mut stream_state, stream.name());
        }
    }

    /// Fans one source payload out to every attached stream.
    pub fn dispatch_payload(&self, record: &SourceRecord, payload: &[u8]) {
        let streams = record.state.lock().streams.clone();
        for stream in streams {
            let event = {
                let mut state = stream.state.lock();
                if state.orphaned {
                    continue;
                }
                let Some(reencoder) = state.reencoder.as_mut() else {
                    continue;
                };
                match reencoder.reencode(payload) {
                    Ok(0) => continue,
                    Ok(_) => StreamEvent::Payload(reencoder.take_output()),
                    Err(err) => {
                        warn!(
                            stream = stream.name(),
                            source = record.name(),
                            error = %err,
                            "reencode failed, dropping payload"
                        );
                        continue;
                    }
                }
            };
            let _ = stream.sender.send(event);
        }
    }

    /// Lists every source as `c:<name>` / `s:<name>` entries.
    #[must_use]
    pub fn list_sources(&self) -> Vec<String> {
        self.sources
            .lock()
            .values()
            .map(|record| format!("{}:{}", record.kind().prefix(), record.name()))
            .collect()
    }

    /// Tears down everything a disconnected connection owned.
    pub fn close_owned_by(&self, owner: u64) {
        let source_names: Vec<String> = self
            .sources
            .lock()
            .values()
            .filter(|record| record.owner == owner)
            .map(|record| record.name.clone())
            .collect();
        for name in source_names {
            let _ = self.close_source(&name);
        }

        let stream_names: Vec<String> = self
            .streams
            .lock()
            .values()
            .filter(|record| record.owner == owner)
            .map(|record| record.name.clone())
            .collect();
        for name in stream_names {
            let _ = self.close_stream(&name);
        }
    }
}

/// Builds a stream's reencoder when both sides are fully negotiated.
fn build_reencoder(source: &SourceShared, stream: &mut StreamShared, stream_name: &str) {
    let (Some(source_encoding), Some(source_options), Some(properties)) = (
        source.encoding,
        source.options.as_ref(),
        source.frame_properties,
    ) else {
        return;
    };
    let (Some(stream_encoding), Some(stream_options)) =
        (stream.encoding, stream.options.as_ref())
    else {
        return;
    };

    match Reencoder::select(
        source_encoding,
        source_options,
        properties,
        stream_encoding,
        stream_options,
    ) {
        Ok(reencoder) => {
            debug!(
                stream = stream_name,
                variant = reencoder.variant(),
                "reencoder selected"
            );
            stream.reencoder = Some(reencoder);
        }
        Err(err) => {
            warn!(stream = stream_name, error = %err, "reencoder unavailable");
            stream.reencoder = None;
        }
    }
}
