//! Value codecs used by the typed front ends.
//!
//! A [`ValueCodec`] turns cached values into the bytes stored on disk and
//! back. Front ends treat every [`CodecError`] as a cache miss.
//!
//! | Codec         | Value             | Bytes                          |
//! |---------------|-------------------|--------------------------------|
//! | `BytesCodec`  | `Vec<u8>`         | identity                       |
//! | `JsonCodec<T>`| `T: Serialize + DeserializeOwned` | JSON (`json` feature) |
//! | `PngCodec`    | [`DecodedImage`]  | PNG, RGBA8                     |

use std::fmt;
use std::io::Cursor;
#[cfg(feature = "json")]
use std::marker::PhantomData;

use image::{ImageFormat, RgbaImage};

use crate::error::CodecError;

pub trait ValueCodec<V>: Send + Sync + 'static {
    fn encode(&self, value: &V) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<V, CodecError>;
}

/// Identity codec for raw byte blobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl ValueCodec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}

/// Serde codec for structured objects.
#[cfg(feature = "json")]
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

#[cfg(feature = "json")]
impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

#[cfg(feature = "json")]
impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "json")]
impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonCodec")
    }
}

#[cfg(feature = "json")]
impl<T> ValueCodec<T> for JsonCodec<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + 'static,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|err| CodecError::Encode(err.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|err| CodecError::Decode(err.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// Decoded raster image, 8-bit RGBA, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Returns `None` unless `pixels` holds exactly `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        (pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Byte size of the pixel buffer, a natural memory-tier cost.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Encodes decoded media to a storable byte format and back.
pub trait MediaCodec: Send + Sync + 'static {
    fn encode_image(&self, image: &DecodedImage) -> Result<Vec<u8>, CodecError>;
    fn decode_image(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError>;
}

/// Adapts any [`MediaCodec`] to the [`ValueCodec`] interface.
#[derive(Debug, Clone, Default)]
pub struct Media<M>(pub M);

impl<M: MediaCodec> ValueCodec<DecodedImage> for Media<M> {
    fn encode(&self, value: &DecodedImage) -> Result<Vec<u8>, CodecError> {
        self.0.encode_image(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        self.0.decode_image(bytes)
    }
}

/// PNG via the `image` crate, 8-bit RGBA in and out.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl MediaCodec for PngCodec {
    fn encode_image(&self, image: &DecodedImage) -> Result<Vec<u8>, CodecError> {
        // `from_raw` accepts oversized buffers, so check the exact length first.
        let buffer = DecodedImage::new(image.width, image.height, image.pixels.clone())
            .and_then(|exact| RgbaImage::from_raw(exact.width, exact.height, exact.pixels))
            .ok_or_else(|| CodecError::Encode("pixel buffer does not match dimensions".into()))?;
        let mut out = Cursor::new(Vec::new());
        buffer
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|err| CodecError::Encode(err.to_string()))?;
        Ok(out.into_inner())
    }

    fn decode_image(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        let rgba = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(|err| CodecError::Decode(err.to_string()))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();
        DecodedImage::new(width, height, rgba.into_raw())
            .ok_or_else(|| CodecError::Decode("pixel data length mismatch".into()))
    }
}
