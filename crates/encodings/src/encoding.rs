//! The encoding registry: name lookup and codec factories.

use std::fmt;
use std::str::FromStr;

use svr_core::{FrameProperties, OptionString};
use thiserror::Error;

use crate::codec::{Decoder, Encoder};
use crate::{ffv1, jpeg, raw};

/// Encodings registered with the router.
///
/// Each variant is a factory for [`Encoder`] and [`Decoder`] instances
/// parameterized by an option mapping and locked frame geometry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Encoding {
    /// Uncompressed packed pixel bytes with headerless framing: the frame
    /// boundary falls every `frame_size()` bytes.
    Raw,
    /// Per-frame JPEG, each preceded by a 32-bit length.
    Jpeg,
    /// Intra/inter frame container with a deflate entropy stage.
    Ffv1,
}

impl Encoding {
    /// Returns the canonical registry name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Jpeg => "jpeg",
            Self::Ffv1 => "ffv1",
        }
    }

    /// Returns every encoding available in this build.
    #[must_use]
    pub const fn available() -> &'static [Self] {
        &[Self::Raw, Self::Jpeg, Self::Ffv1]
    }

    /// Looks an encoding up by name, case-insensitively.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        Self::available()
            .iter()
            .copied()
            .find(|encoding| encoding.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Builds an encoder for this encoding.
    ///
    /// `options` is the parsed descriptor that named the encoding; codec
    /// parameters are validated here so a misconfigured source fails before
    /// any frame is accepted.
    pub fn encoder(
        self,
        options: &OptionString,
        properties: FrameProperties,
    ) -> Result<Box<dyn Encoder>, EncodingError> {
        match self {
            Self::Raw => Ok(Box::new(raw::RawEncoder::new(properties))),
            Self::Jpeg => Ok(Box::new(jpeg::JpegEncoder::new(options, properties)?)),
            Self::Ffv1 => Ok(Box::new(ffv1::Ffv1Encoder::new(options, properties)?)),
        }
    }

    /// Builds a decoder for this encoding.
    pub fn decoder(
        self,
        options: &OptionString,
        properties: FrameProperties,
    ) -> Result<Box<dyn Decoder>, EncodingError> {
        let _ = options;
        match self {
            Self::Raw => Ok(Box::new(raw::RawDecoder::new(properties))),
            Self::Jpeg => Ok(Box::new(jpeg::JpegDecoder::new(properties)?)),
            Self::Ffv1 => Ok(Box::new(ffv1::Ffv1Decoder::new(properties))),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when looking up an unregistered encoding name.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("no such encoding: {name:?}")]
pub struct UnknownEncoding {
    name: String,
}

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| UnknownEncoding {
            name: s.to_string(),
        })
    }
}

/// Errors raised while constructing a codec from a descriptor.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum EncodingError {
    /// An option value was out of range or unparsable.
    #[error("invalid value {value:?} for option {key:?}: {reason}")]
    InvalidOption {
        /// Option key.
        key: &'static str,
        /// Supplied value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The encoding cannot represent frames with the given geometry.
    #[error("encoding {encoding} does not support geometry {properties}: {reason}")]
    UnsupportedGeometry {
        /// Encoding name.
        encoding: &'static str,
        /// Offending geometry.
        properties: FrameProperties,
        /// What the encoding requires.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use svr_core::options::parse_option_string;

    #[test]
    fn lookup_finds_registered_encodings() {
        assert_eq!(Encoding::lookup("raw"), Some(Encoding::Raw));
        assert_eq!(Encoding::lookup("jpeg"), Some(Encoding::Jpeg));
        assert_eq!(Encoding::lookup("ffv1"), Some(Encoding::Ffv1));
        assert_eq!(Encoding::lookup("JPEG"), Some(Encoding::Jpeg));
        assert_eq!(Encoding::lookup(" raw "), Some(Encoding::Raw));
    }

    #[test]
    fn lookup_rejects_unknown_names() {
        assert_eq!(Encoding::lookup("bogus"), None);
        assert!("bogus".parse::<Encoding>().is_err());
    }

    #[test]
    fn available_covers_all_names() {
        let names: Vec<&str> = Encoding::available().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["raw", "jpeg", "ffv1"]);
    }

    #[test]
    fn factories_validate_options() {
        let props = FrameProperties::new(4, 4, 8, 3).unwrap();
        let bad = parse_option_string("jpeg;quality=0").unwrap();
        assert!(matches!(
            Encoding::Jpeg.encoder(&bad, props).unwrap_err(),
            EncodingError::InvalidOption { key: "quality", .. }
        ));

        let bad_gop = parse_option_string("ffv1;gop=0").unwrap();
        assert!(matches!(
            Encoding::Ffv1.encoder(&bad_gop, props).unwrap_err(),
            EncodingError::InvalidOption { key: "gop", .. }
        ));
    }

    #[test]
    fn jpeg_rejects_deep_frames() {
        let deep = FrameProperties::new(4, 4, 16, 3).unwrap();
        let options = parse_option_string("jpeg").unwrap();
        assert!(matches!(
            Encoding::Jpeg.encoder(&options, deep).unwrap_err(),
            EncodingError::UnsupportedGeometry {
                encoding: "jpeg",
                ..
            }
        ));
    }
}
