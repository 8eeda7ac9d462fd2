//! Server-source ingestion.
//!
//! A server source is fed by a broker-owned thread instead of a client
//! connection. The one built-in ingestion type is `test`: a synthetic
//! moving-gradient pattern useful for exercising the fabric without a
//! camera. The ingestion thread's lifetime is bounded by its source
//! record: closing the source stops the generator within one frame period.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use svr_core::{Frame, FrameProperties, OptionString, Status};
use svr_encodings::Encoding;
use thiserror::Error;
use tracing::{debug, warn};

use crate::registry::{Registry, SourceRecord};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 10;

/// Failures while interpreting a server-source descriptor.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum IngestError {
    /// The descriptor named an ingestion type the broker does not provide.
    #[error("no such ingestion type: {0:?}")]
    UnknownType(String),

    /// An option value was out of range or unparsable.
    #[error("invalid value {value:?} for option {key:?}")]
    InvalidOption {
        /// Option key.
        key: &'static str,
        /// Supplied value.
        value: String,
    },
}

impl IngestError {
    /// Maps the failure onto the wire status taxonomy.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::UnknownType(_) => Status::NoSuchEncoding,
            Self::InvalidOption { .. } => Status::InvalidArgument,
        }
    }
}

/// A validated server-source configuration.
#[derive(Debug)]
pub(crate) struct IngestSpec {
    pub properties: FrameProperties,
    pub fps: u32,
    pub encoding: Encoding,
    pub encoding_options: OptionString,
}

fn parse_u32(options: &OptionString, key: &'static str, default: u32) -> Result<u32, IngestError> {
    match options.get(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u32>() {
            Ok(value) if value >= 1 => Ok(value),
            _ => Err(IngestError::InvalidOption {
                key,
                value: raw.to_string(),
            }),
        },
    }
}

/// Interprets a parsed server-source descriptor.
pub(crate) fn parse_ingest_descriptor(options: &OptionString) -> Result<IngestSpec, IngestError> {
    if options.name() != "test" {
        return Err(IngestError::UnknownType(options.name().to_string()));
    }

    let width = parse_u32(options, "width", DEFAULT_WIDTH)?;
    let height = parse_u32(options, "height", DEFAULT_HEIGHT)?;
    let fps = parse_u32(options, "fps", DEFAULT_FPS)?.min(240);

    let encoding_name = options.get("encoding").unwrap_or("raw");
    let encoding =
        Encoding::lookup(encoding_name).ok_or_else(|| IngestError::InvalidOption {
            key: "encoding",
            value: encoding_name.to_string(),
        })?;

    let properties = FrameProperties::new(width, height, 8, 3).map_err(|_| {
        IngestError::InvalidOption {
            key: "width",
            value: format!("{width}x{height}"),
        }
    })?;

    Ok(IngestSpec {
        properties,
        fps,
        encoding,
        encoding_options: OptionString::from_parts(encoding.name(), Default::default()),
    })
}

/// Renders one frame of the moving-gradient pattern.
fn test_pattern(properties: FrameProperties, tick: u64) -> Frame {
    let width = properties.width() as usize;
    let height = properties.height() as usize;
    let channels = properties.channels() as usize;
    let shift = (tick * 4) as usize;

    let mut data = Vec::with_capacity(properties.frame_size());
    for y in 0..height {
        for x in 0..width {
            for channel in 0..channels {
                data.push(((x + y + shift + channel * 85) & 0xFF) as u8);
            }
        }
    }
    // Geometry is 8-bit by construction, so the size always matches.
    Frame::new(properties, data).unwrap_or_else(|_| Frame::filled(properties, 0))
}

/// Spawns the generator thread for an opened server source.
pub(crate) fn spawn_ingest(registry: Arc<Registry>, record: Arc<SourceRecord>, spec: IngestSpec) {
    let source_name = record.name().to_string();
    let spawned = thread::Builder::new()
        .name(format!("svr-ingest-{source_name}"))
        .spawn(move || {
            let mut encoder = match spec.encoding.encoder(&spec.encoding_options, spec.properties)
            {
                Ok(encoder) => encoder,
                Err(err) => {
                    warn!(source = record.name(), error = %err, "ingestion encoder unavailable");
                    return;
                }
            };

            let period = Duration::from_secs(1).div_f64(f64::from(spec.fps));
            let mut chunk = vec![0u8; 4096];
            let mut tick = 0u64;

            while !record.is_closed() {
                let frame = test_pattern(spec.properties, tick);
                if let Err(err) = encoder.encode(&frame) {
                    warn!(source = record.name(), error = %err, "ingestion encode failed");
                    break;
                }
                while encoder.data_ready() > 0 {
                    let filled = encoder.read_data(&mut chunk);
                    registry.dispatch_payload(&record, &chunk[..filled]);
                }
                tick += 1;
                thread::sleep(period);
            }
            debug!(source = record.name(), "ingestion stopped");
        });

    if let Err(err) = spawned {
        warn!(source = %source_name, error = %err, "failed to spawn ingestion thread");
    }
}
