//! JPEG 2000 codec implementation.
//!
//! Decoding goes through OpenJPEG via the `jpeg2k` crate. The codestream
//! header is also parsed directly so declared record dimensions can be
//! cross-checked without a full decode.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

use jpeg2k::{Image as J2kImage, ImagePixelData};

use crate::error::{BdirError, Result};
use crate::Raster;

use super::traits::{CodecInfo, ImageCodec};
use super::ImageKind;

/// Start of codestream marker.
const SOC: u16 = 0xFF4F;
/// Image and tile size marker.
const SIZ: u16 = 0xFF51;

/// Image geometry from the SIZ marker segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizSegment {
    /// Reference grid width minus the image offset.
    pub width: u32,
    /// Reference grid height minus the image offset.
    pub height: u32,
    /// Number of components.
    pub components: u16,
    /// Bit depth of the first component.
    pub bit_depth: u8,
}

/// Parse the SIZ segment of a raw codestream.
///
/// JP2 containers return `None`; only bare codestreams are inspected.
pub fn parse_siz(data: &[u8]) -> Option<SizSegment> {
    let mut cursor = Cursor::new(data);
    if cursor.read_u16::<BigEndian>().ok()? != SOC || cursor.read_u16::<BigEndian>().ok()? != SIZ {
        return None;
    }

    let _lsiz = cursor.read_u16::<BigEndian>().ok()?;
    let _rsiz = cursor.read_u16::<BigEndian>().ok()?;
    let xsiz = cursor.read_u32::<BigEndian>().ok()?;
    let ysiz = cursor.read_u32::<BigEndian>().ok()?;
    let x_offset = cursor.read_u32::<BigEndian>().ok()?;
    let y_offset = cursor.read_u32::<BigEndian>().ok()?;
    // tile size and tile offset
    for _ in 0..4 {
        cursor.read_u32::<BigEndian>().ok()?;
    }
    let components = cursor.read_u16::<BigEndian>().ok()?;
    let ssiz = cursor.read_u8().ok()?;

    Some(SizSegment {
        width: xsiz.checked_sub(x_offset)?,
        height: ysiz.checked_sub(y_offset)?,
        components,
        bit_depth: (ssiz & 0x7F) + 1,
    })
}

/// JPEG 2000 codec using OpenJPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jpeg2000Codec;

impl Jpeg2000Codec {
    /// Create a new JPEG 2000 codec instance.
    pub fn new() -> Self {
        Self
    }

    fn decode_error(cause: impl Into<String>) -> BdirError {
        BdirError::ImageDecode {
            kind: ImageKind::Jpeg2000,
            cause: cause.into(),
        }
    }

    /// Decode a JP2 container or raw codestream to an 8-bit raster.
    fn decode_j2k(&self, data: &[u8]) -> Result<Raster> {
        let image = J2kImage::from_bytes(data).map_err(|e| Self::decode_error(e.to_string()))?;

        let width = image.width();
        let height = image.height();
        let num_components = image.num_components();
        let precision = image
            .components()
            .first()
            .map(|component| component.precision())
            .unwrap_or(8);

        if precision > 8 {
            return Err(Self::decode_error(format!(
                "unsupported component precision {} (only 8-bit images are carried)",
                precision
            )));
        }
        if num_components != 1 && num_components != 3 {
            return Err(Self::decode_error(format!(
                "unsupported component count {}",
                num_components
            )));
        }

        let pixels = image
            .get_pixels(None)
            .map_err(|e| Self::decode_error(format!("pixel extraction: {}", e)))?;
        let pixel_data = match pixels.data {
            ImagePixelData::L8(data) | ImagePixelData::Rgb8(data) => data,
            ImagePixelData::La8(_) | ImagePixelData::Rgba8(_) => {
                return Err(Self::decode_error("images with an alpha channel are not carried"))
            }
            _ => {
                return Err(Self::decode_error(
                    "16-bit samples are not carried (only 8-bit images)",
                ))
            }
        };

        let raster = Raster::new(width, height, num_components as u8, pixel_data);
        raster.validate()?;

        log::debug!(
            "Decoded JPEG 2000 image: {}x{}, {} component(s)",
            width,
            height,
            num_components
        );

        Ok(raster)
    }
}

impl ImageCodec for Jpeg2000Codec {
    fn info(&self) -> CodecInfo {
        CodecInfo {
            name: "JPEG 2000",
            kind: ImageKind::Jpeg2000,
            lossless: true,
            can_decode: true,
            can_encode: false,
        }
    }

    fn decode(&self, data: &[u8]) -> Result<Raster> {
        self.decode_j2k(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tiny_j2k_codestream, tiny_jp2};

    #[test]
    fn test_parse_siz() {
        let siz = parse_siz(&tiny_j2k_codestream()).unwrap();
        assert_eq!(siz.width, 10);
        assert_eq!(siz.height, 10);
        assert_eq!(siz.components, 1);
        assert_eq!(siz.bit_depth, 8);
    }

    #[test]
    fn test_parse_siz_rejects_other_data() {
        assert!(parse_siz(&[0xFF, 0xD8, 0xFF, 0xE0]).is_none());
        assert!(parse_siz(&[0xFF, 0x4F, 0xFF, 0x51, 0x00]).is_none());
    }

    #[test]
    fn test_decode_tiny_codestream() {
        let raster = Jpeg2000Codec::new().decode(&tiny_j2k_codestream()).unwrap();
        assert_eq!(raster.width, 10);
        assert_eq!(raster.height, 10);
        assert_eq!(raster.channels, 1);
        assert_eq!(raster.pixels.len(), 100);
    }

    #[test]
    fn test_decode_jp2_container() {
        let raster = Jpeg2000Codec::new().decode(&tiny_jp2()).unwrap();
        assert_eq!((raster.width, raster.height, raster.channels), (10, 10, 1));
        assert_eq!(raster.pixels, Jpeg2000Codec::new().decode(&tiny_j2k_codestream()).unwrap().pixels);
        assert!(parse_siz(&tiny_jp2()).is_none());
        assert!(crate::codec::sniff::is_jpeg2000(&tiny_jp2()));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = Jpeg2000Codec::new().decode(&[0xFF, 0x4F, 0xFF, 0x51, 0x00]).unwrap_err();
        assert!(matches!(err, BdirError::ImageDecode { kind: ImageKind::Jpeg2000, .. }));
    }
}
