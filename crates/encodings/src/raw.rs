//! Uncompressed packed-pixel streaming.
//!
//! The `raw` encoding carries frames as their packed pixel bytes with no
//! header at all: both sides know the locked frame geometry, so the frame
//! boundary falls every [`FrameProperties::frame_size`] bytes.

use svr_core::{Frame, FrameProperties};

use crate::codec::{CodecError, Decoder, DrainBuffer, Encoder};

/// Pass-through encoder for the `raw` encoding.
#[derive(Debug)]
pub struct RawEncoder {
    properties: FrameProperties,
    buffer: DrainBuffer,
}

impl RawEncoder {
    /// Creates an encoder for the given locked geometry.
    #[must_use]
    pub fn new(properties: FrameProperties) -> Self {
        Self {
            properties,
            buffer: DrainBuffer::new(),
        }
    }
}

impl Encoder for RawEncoder {
    fn encode(&mut self, frame: &Frame) -> Result<(), CodecError> {
        if frame.properties() != self.properties {
            return Err(CodecError::GeometryMismatch {
                expected: self.properties,
                actual: frame.properties(),
            });
        }
        self.buffer.extend(frame.data());
        Ok(())
    }

    fn data_ready(&self) -> usize {
        self.buffer.len()
    }

    fn read_data(&mut self, buf: &mut [u8]) -> usize {
        self.buffer.drain_into(buf)
    }
}

/// Frame reassembler for the `raw` encoding.
#[derive(Debug)]
pub struct RawDecoder {
    properties: FrameProperties,
    pending: Vec<u8>,
    frames: std::collections::VecDeque<Frame>,
}

impl RawDecoder {
    /// Creates a decoder for the given locked geometry.
    #[must_use]
    pub fn new(properties: FrameProperties) -> Self {
        Self {
            properties,
            pending: Vec::new(),
            frames: std::collections::VecDeque::new(),
        }
    }
}

impl Decoder for RawDecoder {
    fn decode(&mut self, data: &[u8]) -> Result<(), CodecError> {
        self.pending.extend_from_slice(data);
        let frame_size = self.properties.frame_size();
        while self.pending.len() >= frame_size {
            let rest = self.pending.split_off(frame_size);
            let bytes = std::mem::replace(&mut self.pending, rest);
            let frame = Frame::new(self.properties, bytes).map_err(|err| {
                CodecError::CorruptStream {
                    encoding: "raw",
                    reason: err.to_string(),
                }
            })?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn props() -> FrameProperties {
        FrameProperties::new(4, 2, 8, 3).unwrap()
    }

    #[test]
    fn encode_then_drain_yields_pixel_bytes() {
        let mut encoder = RawEncoder::new(props());
        let frame = Frame::filled(props(), 9);
        encoder.encode(&frame).unwrap();

        assert_eq!(encoder.data_ready(), props().frame_size());
        let mut out = vec![0u8; props().frame_size()];
        assert_eq!(encoder.read_data(&mut out), out.len());
        assert_eq!(out, frame.data());
        assert_eq!(encoder.data_ready(), 0);
    }

    #[test]
    fn mismatched_frame_is_rejected() {
        let mut encoder = RawEncoder::new(props());
        let other = FrameProperties::new(2, 2, 8, 3).unwrap();
        let err = encoder.encode(&Frame::filled(other, 0)).unwrap_err();
        assert!(matches!(err, CodecError::GeometryMismatch { .. }));
        assert_eq!(encoder.data_ready(), 0);
    }

    #[test]
    fn decoder_reassembles_across_chunk_boundaries() {
        let frame = Frame::filled(props(), 7);
        let mut decoder = RawDecoder::new(props());

        let bytes = frame.data();
        let (head, tail) = bytes.split_at(5);
        decoder.decode(head).unwrap();
        assert!(!decoder.frame_ready());
        decoder.decode(tail).unwrap();
        assert!(decoder.frame_ready());
        assert_eq!(decoder.take_frame().unwrap(), frame);
        assert!(decoder.take_frame().is_none());
    }

    proptest! {
        /// Encoding then decoding restores the input frames exactly.
        #[test]
        fn round_trip_restores_frames(
            fills in proptest::collection::vec(any::<u8>(), 1..4),
            chunk in 1usize..64,
        ) {
            let mut encoder = RawEncoder::new(props());
            let mut decoder = RawDecoder::new(props());
            let frames: Vec<Frame> = fills
                .iter()
                .map(|fill| Frame::filled(props(), *fill))
                .collect();

            for frame in &frames {
                encoder.encode(frame).unwrap();
            }

            let mut buf = vec![0u8; chunk];
            while encoder.data_ready() > 0 {
                let n = encoder.read_data(&mut buf);
                decoder.decode(&buf[..n]).unwrap();
            }

            for expected in &frames {
                prop_assert_eq!(&decoder.take_frame().unwrap(), expected);
            }
            prop_assert!(!decoder.frame_ready());
        }

        /// Total drainable bytes equal the sum of successive reads.
        #[test]
        fn drain_total_matches_data_ready(chunk in 1usize..97) {
            let mut encoder = RawEncoder::new(props());
            encoder.encode(&Frame::filled(props(), 1)).unwrap();
            encoder.encode(&Frame::filled(props(), 2)).unwrap();

            let announced = encoder.data_ready();
            let mut drained = 0usize;
            let mut buf = vec![0u8; chunk];
            while encoder.data_ready() > 0 {
                drained += encoder.read_data(&mut buf);
            }
            prop_assert_eq!(drained, announced);
        }
    }
}
