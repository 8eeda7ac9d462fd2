//! Intra/inter frame container coding.
//!
//! The `ffv1` encoding wraps each frame in a small container record:
//!
//! ```text
//! u8   frame tag: 'I' (intra) or 'P' (predicted)
//! u32  compressed body length (big endian)
//! ...  deflate-compressed body
//! ```
//!
//! Intra bodies hold the packed pixel bytes; predicted bodies hold the
//! byte-wise difference against the previous frame, which deflate squeezes
//! well for mostly-static scenes. The `gop` option sets the key-frame
//! interval. The broker's interframe-preserving reencode path leans on this
//! container: records can be re-framed without touching the entropy-coded
//! body, keeping the intra/inter structure intact.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use svr_core::{Frame, FrameProperties, OptionString};

use crate::codec::{CodecError, Decoder, DrainBuffer, Encoder};
use crate::encoding::EncodingError;

const DEFAULT_GOP: u32 = 30;

/// Container frame tag for intra (key) frames.
pub const TAG_INTRA: u8 = b'I';

/// Container frame tag for predicted (delta) frames.
pub const TAG_PREDICTED: u8 = b'P';

/// Container record header size: tag byte plus body length.
pub const RECORD_HEADER_LEN: usize = 5;

fn parse_gop(options: &OptionString) -> Result<u32, EncodingError> {
    match options.get("gop") {
        None => Ok(DEFAULT_GOP),
        Some(raw) => match raw.parse::<u32>() {
            Ok(gop) if gop >= 1 => Ok(gop),
            _ => Err(EncodingError::InvalidOption {
                key: "gop",
                value: raw.to_string(),
                reason: "expected an integer key-frame interval of at least 1",
            }),
        },
    }
}

fn deflate(body: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body)?;
    Ok(encoder.finish()?)
}

fn inflate(body: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
    let mut decoded = Vec::with_capacity(expected_len);
    DeflateDecoder::new(body).read_to_end(&mut decoded)?;
    Ok(decoded)
}

/// Encoder producing the intra/inter container stream.
#[derive(Debug)]
pub struct Ffv1Encoder {
    properties: FrameProperties,
    gop: u32,
    since_key: u32,
    previous: Option<Vec<u8>>,
    buffer: DrainBuffer,
}

impl Ffv1Encoder {
    /// Builds an encoder, validating the `gop` option.
    pub fn new(
        options: &OptionString,
        properties: FrameProperties,
    ) -> Result<Self, EncodingError> {
        Ok(Self {
            properties,
            gop: parse_gop(options)?,
            since_key: 0,
            previous: None,
            buffer: DrainBuffer::new(),
        })
    }

    /// The key-frame interval in effect.
    #[must_use]
    pub const fn gop(&self) -> u32 {
        self.gop
    }
}

impl Encoder for Ffv1Encoder {
    fn encode(&mut self, frame: &Frame) -> Result<(), CodecError> {
        if frame.properties() != self.properties {
            return Err(CodecError::GeometryMismatch {
                expected: self.properties,
                actual: frame.properties(),
            });
        }

        let intra = self.since_key == 0 || self.previous.is_none();
        let body = if intra {
            deflate(frame.data())?
        } else {
            // Predicted body: byte-wise difference against the previous
            // frame, wrapping so reconstruction is exact.
            let previous = self.previous.as_deref().unwrap_or_default();
            let delta: Vec<u8> = frame
                .data()
                .iter()
                .zip(previous)
                .map(|(cur, prev)| cur.wrapping_sub(*prev))
                .collect();
            deflate(&delta)?
        };

        self.buffer
            .extend(&[if intra { TAG_INTRA } else { TAG_PREDICTED }]);
        self.buffer.extend(&(body.len() as u32).to_be_bytes());
        self.buffer.extend(&body);

        self.previous = Some(frame.data().to_vec());
        self.since_key = (self.since_key + 1) % self.gop;
        Ok(())
    }

    fn data_ready(&self) -> usize {
        self.buffer.len()
    }

    fn read_data(&mut self, buf: &mut [u8]) -> usize {
        self.buffer.drain_into(buf)
    }
}

/// Decoder reconstructing frames from the container stream.
pub struct Ffv1Decoder {
    properties: FrameProperties,
    scanner: RecordScanner,
    previous: Option<Vec<u8>>,
    frames: std::collections::VecDeque<Frame>,
}

impl Ffv1Decoder {
    /// Builds a decoder for the given locked geometry.
    #[must_use]
    pub fn new(properties: FrameProperties) -> Self {
        Self {
            properties,
            scanner: RecordScanner::new(),
            previous: None,
            frames: std::collections::VecDeque::new(),
        }
    }

    fn reconstruct(&mut self, tag: u8, body: &[u8]) -> Result<Frame, CodecError> {
        let frame_size = self.properties.frame_size();
        let decoded = inflate(body, frame_size)?;
        if decoded.len() != frame_size {
            return Err(CodecError::CorruptStream {
                encoding: "ffv1",
                reason: format!(
                    "record decompressed to {} bytes, geometry requires {frame_size}",
                    decoded.len()
                ),
            });
        }

        let bytes = match tag {
            TAG_INTRA => decoded,
            TAG_PREDICTED => {
                let previous =
                    self.previous
                        .as_deref()
                        .ok_or_else(|| CodecError::CorruptStream {
                            encoding: "ffv1",
                            reason: "predicted record with no preceding intra frame".to_string(),
                        })?;
                decoded
                    .iter()
                    .zip(previous)
                    .map(|(delta, prev)| prev.wrapping_add(*delta))
                    .collect()
            }
            other => {
                return Err(CodecError::CorruptStream {
                    encoding: "ffv1",
                    reason: format!("unknown record tag {other:#04x}"),
                });
            }
        };

        self.previous = Some(bytes.clone());
        Frame::new(self.properties, bytes).map_err(|err| CodecError::CorruptStream {
            encoding: "ffv1",
            reason: err.to_string(),
        })
    }
}

impl Decoder for Ffv1Decoder {
    fn decode(&mut self, data: &[u8]) -> Result<(), CodecError> {
        self.scanner.push(data);
        while let Some(record) = self.scanner.next_record()? {
            let frame = self.reconstruct(record.tag(), record.body())?;
            self.frames.push_back(frame);
        }
        Ok(())
    }

    fn frame_ready(&self) -> bool {
        !self.frames.is_empty()
    }

    fn take_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}

/// One complete container record, header included.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    bytes: Vec<u8>,
}

impl Record {
    /// The frame tag ([`TAG_INTRA`] or [`TAG_PREDICTED`]).
    #[must_use]
    pub fn tag(&self) -> u8 {
        self.bytes[0]
    }

    /// The compressed body, without the header.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.bytes[RECORD_HEADER_LEN..]
    }

    /// The whole record as it appeared on the wire.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Splits a chunked container stream into whole records without touching
/// the compressed bodies.
///
/// This is the piece the broker's interframe-preserving reencode path uses:
/// records cross chunk boundaries on the way in and come out one-per-call,
/// intra/inter structure untouched.
#[derive(Debug, Default)]
pub struct RecordScanner {
    pending: Vec<u8>,
}

impl RecordScanner {
    /// Creates an empty scanner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds stream bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Removes and returns the next complete record, if one is assembled.
    pub fn next_record(&mut self) -> Result<Option<Record>, CodecError> {
        if self.pending.len() < RECORD_HEADER_LEN {
            return Ok(None);
        }
        let tag = self.pending[0];
        if tag != TAG_INTRA && tag != TAG_PREDICTED {
            return Err(CodecError::CorruptStream {
                encoding: "ffv1",
                reason: format!("unknown record tag {tag:#04x}"),
            });
        }
        let body_len = u32::from_be_bytes([
            self.pending[1],
            self.pending[2],
            self.pending[3],
            self.pending[4],
        ]) as usize;
        let record_len = RECORD_HEADER_LEN + body_len;
        if self.pending.len() < record_len {
            return Ok(None);
        }
        let rest = self.pending.split_off(record_len);
        let bytes = std::mem::replace(&mut self.pending, rest);
        Ok(Some(Record { bytes }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svr_core::options::parse_option_string;

    fn props() -> FrameProperties {
        FrameProperties::new(8, 8, 8, 1).unwrap()
    }

    fn options(descriptor: &str) -> OptionString {
        parse_option_string(descriptor).unwrap()
    }

    fn gradient_frame(shift: u8) -> Frame {
        let size = props().frame_size();
        let data = (0..size).map(|i| (i as u8).wrapping_add(shift)).collect();
        Frame::new(props(), data).unwrap()
    }

    fn drain(encoder: &mut dyn Encoder) -> Vec<u8> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 11];
        while encoder.data_ready() > 0 {
            let n = encoder.read_data(&mut chunk);
            out.extend_from_slice(&chunk[..n]);
        }
        out
    }

    #[test]
    fn gop_controls_key_frame_cadence() {
        let mut encoder = Ffv1Encoder::new(&options("ffv1;gop=3"), props()).unwrap();
        assert_eq!(encoder.gop(), 3);

        for shift in 0..6 {
            encoder.encode(&gradient_frame(shift)).unwrap();
        }
        let stream = drain(&mut encoder);

        let mut scanner = RecordScanner::new();
        scanner.push(&stream);
        let mut tags = Vec::new();
        while let Some(record) = scanner.next_record().unwrap() {
            tags.push(record.tag());
        }
        assert_eq!(
            tags,
            [
                TAG_INTRA,
                TAG_PREDICTED,
                TAG_PREDICTED,
                TAG_INTRA,
                TAG_PREDICTED,
                TAG_PREDICTED
            ]
        );
    }

    #[test]
    fn round_trip_restores_changing_frames() {
        let mut encoder = Ffv1Encoder::new(&options("ffv1;gop=4"), props()).unwrap();
        let frames: Vec<Frame> = (0..9).map(gradient_frame).collect();
        for frame in &frames {
            encoder.encode(frame).unwrap();
        }

        let stream = drain(&mut encoder);
        let mut decoder = Ffv1Decoder::new(props());
        // Feed in deliberately awkward chunk sizes.
        for chunk in stream.chunks(13) {
            decoder.decode(chunk).unwrap();
        }

        for expected in &frames {
            assert_eq!(&decoder.take_frame().unwrap(), expected);
        }
        assert!(!decoder.frame_ready());
    }

    #[test]
    fn predicted_record_without_intra_is_corrupt() {
        let mut encoder = Ffv1Encoder::new(&options("ffv1;gop=2"), props()).unwrap();
        encoder.encode(&gradient_frame(0)).unwrap();
        encoder.encode(&gradient_frame(1)).unwrap();
        let stream = drain(&mut encoder);

        // Skip the intra record and feed only the predicted one.
        let mut scanner = RecordScanner::new();
        scanner.push(&stream);
        let intra = scanner.next_record().unwrap().unwrap();
        let predicted_offset = intra.as_bytes().len();

        let mut decoder = Ffv1Decoder::new(props());
        let err = decoder.decode(&stream[predicted_offset..]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::CorruptStream {
                encoding: "ffv1",
                ..
            }
        ));
    }

    #[test]
    fn unknown_tag_is_corrupt() {
        let mut decoder = Ffv1Decoder::new(props());
        let err = decoder.decode(&[b'X', 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, CodecError::CorruptStream { .. }));
    }

    #[test]
    fn scanner_reassembles_records_across_chunks() {
        let mut encoder = Ffv1Encoder::new(&options("ffv1"), props()).unwrap();
        encoder.encode(&gradient_frame(3)).unwrap();
        let stream = drain(&mut encoder);

        let mut scanner = RecordScanner::new();
        let (head, tail) = stream.split_at(3);
        scanner.push(head);
        assert!(scanner.next_record().unwrap().is_none());
        scanner.push(tail);
        let record = scanner.next_record().unwrap().unwrap();
        assert_eq!(record.tag(), TAG_INTRA);
        assert_eq!(record.as_bytes(), &stream[..]);
    }
}
