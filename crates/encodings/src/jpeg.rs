//! Per-frame JPEG coding.
//!
//! Each frame becomes one JPEG image preceded by a 32-bit big-endian length,
//! so the decoder can slice the stream back into frames without sniffing
//! entropy-coded data for markers. Only 8-bit luma and RGB layouts are
//! representable; the factory rejects anything else up front.

use image::{GenericImageView, ImageFormat};
use jpeg_encoder::ColorType;
use svr_core::{Frame, FrameProperties, OptionString};

use crate::codec::{CodecError, Decoder, DrainBuffer, Encoder};
use crate::encoding::EncodingError;

const DEFAULT_QUALITY: u8 = 80;

/// Largest dimension the JPEG format can address.
const MAX_DIMENSION: u32 = u16::MAX as u32;

fn color_type(properties: FrameProperties) -> Result<ColorType, EncodingError> {
    if properties.depth() != 8 {
        return Err(EncodingError::UnsupportedGeometry {
            encoding: "jpeg",
            properties,
            reason: "only 8-bit channels are representable",
        });
    }
    if properties.width() > MAX_DIMENSION || properties.height() > MAX_DIMENSION {
        return Err(EncodingError::UnsupportedGeometry {
            encoding: "jpeg",
            properties,
            reason: "dimensions exceed the 16-bit JPEG limit",
        });
    }
    match properties.channels() {
        1 => Ok(ColorType::Luma),
        3 => Ok(ColorType::Rgb),
        _ => Err(EncodingError::UnsupportedGeometry {
            encoding: "jpeg",
            properties,
            reason: "only 1-channel and 3-channel frames are representable",
        }),
    }
}

fn parse_quality(options: &OptionString) -> Result<u8, EncodingError> {
    match options.get("quality") {
        None => Ok(DEFAULT_QUALITY),
        Some(raw) => {
            let quality: u8 = raw.parse().map_err(|_| EncodingError::InvalidOption {
                key: "quality",
                value: raw.to_string(),
                reason: "expected an integer between 1 and 100",
            })?;
            if (1..=100).contains(&quality) {
                Ok(quality)
            } else {
                Err(EncodingError::InvalidOption {
                    key: "quality",
                    value: raw.to_string(),
                    reason: "expected an integer between 1 and 100",
                })
            }
        }
    }
}

/// JPEG encoder with length-framed output.
#[derive(Debug)]
pub struct JpegEncoder {
    properties: FrameProperties,
    color: ColorType,
    quality: u8,
    buffer: DrainBuffer,
}

impl JpegEncoder {
    /// Builds an encoder, validating geometry and the `quality` option.
    pub fn new(
        options: &OptionString,
        properties: FrameProperties,
    ) -> Result<Self, EncodingError> {
        Ok(Self {
            properties,
            color: color_type(properties)?,
            quality: parse_quality(options)?,
            buffer: DrainBuffer::new(),
        })
    }

    /// The quality setting in effect.
    #[must_use]
    pub const fn quality(&self) -> u8 {
        self.quality
    }
}

impl Encoder for JpegEncoder {
    fn encode(&mut self, frame: &Frame) -> Result<(), CodecError> {
        if frame.properties() != self.properties {
            return Err(CodecError::GeometryMismatch {
                expected: self.properties,
                actual: frame.properties(),
            });
        }

        let mut compressed = Vec::new();
        let encoder = jpeg_encoder::Encoder::new(&mut compressed, self.quality);
        encoder
            .encode(
                frame.data(),
                self.properties.width() as u16,
                self.properties.height() as u16,
                self.color,
            )
            .map_err(|err| CodecError::EncodeFailed {
                encoding: "jpeg",
                reason: err.to_string(),
            })?;

        self.buffer.extend(&(compressed.len() as u32).to_be_bytes());
        self.buffer.extend(&compressed);
        Ok(())
    }

    fn data_ready(&self) -> usize {
        self.buffer.len()
    }

    fn read_data(&mut self, buf: &mut [u8]) -> usize {
        self.buffer.drain_into(buf)
    }
}

/// JPEG decoder for length-framed streams.
pub struct JpegDecoder {
    properties: FrameProperties,
    pending: Vec<u8>,
    frames: std::collections::VecDeque<Frame>,
}

impl JpegDecoder {
    /// Builds a decoder; the geometry must be JPEG-representable.
    pub fn new(properties: FrameProperties) -> Result<Self, EncodingError> {
        color_type(properties)?;
        Ok(Self {
            properties,
            pending: Vec::new(),
            frames: std::collections::VecDeque::new(),
        })
    }

    fn decode_image(&self, bytes: &[u8]) -> Result<Frame, CodecError> {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
            .map_err(|err| CodecError::CorruptStream {
                encoding: "jpeg",
                reason: err.to_string(),
            })?;

        if decoded.width() != self.properties.width()
            || decoded.height() != self.properties.height()
        {
            return Err(CodecError::CorruptStream {
                encoding: "jpeg",
                reason: format!(
                    "image is {}x{}, geometry requires {}x{}",
                    decoded.width(),
                    decoded.height(),
                    self.properties.width(),
                    self.properties.height()
                ),
            });
        }

        let data = match self.properties.channels() {
            1 => decoded.to_luma8().into_raw(),
            _ => decoded.to_rgb8().into_raw(),
        };
        Frame::new(self.properties, data).map_err(|err| CodecError::CorruptStream {
            encoding: "jpeg",
            reason: err.to_string(),
        })
    }
}

impl Decoder for JpegDecoder {
    fn decode(&mut self, data: &[u8]) -> Result<(), CodecError> {
        self.pending.extend_from_slice(data);
        loop {
            if self.pending.len() < 4 {
                return Ok(());
            }
            let len =
                u32::from_be_bytes([self.pending[0], self.pending[1], self.pending[2], self.pending[3]])
                    as usize;
            if self.pending.len() < 4 + len {
                return Ok(());
            }
            let frame = self.decode_image(&self.pending[4..4 + len])?;
            self.pending.drain(..4 + len);
            self.frames.push_back(frame);
        }
    }

    fn frame_ready(&self) -> bool {
        !self.frames.is_empty()
    }

    fn take_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}
