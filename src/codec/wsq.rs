//! WSQ container support.
//!
//! Pixel reconstruction is delegated to an [`ImageCodec`] supplied by the
//! application (for example an NBIS binding). This module only walks the
//! marker segments of the container.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{BdirError, Result};
use crate::Raster;

use super::traits::{CodecInfo, ImageCodec};
use super::ImageKind;

/// Start of image.
pub const SOI: u16 = 0xFFA0;
/// End of image.
pub const EOI: u16 = 0xFFA1;
/// Start of frame.
pub const SOF: u16 = 0xFFA2;
/// Start of block.
pub const SOB: u16 = 0xFFA3;
/// Define transform table.
pub const DTT: u16 = 0xFFA4;
/// Define quantization table.
pub const DQT: u16 = 0xFFA5;
/// Define Huffman table.
pub const DHT: u16 = 0xFFA6;
/// Define restart interval.
pub const DRT: u16 = 0xFFA7;
/// Comment.
pub const COM: u16 = 0xFFA8;

/// Check for the WSQ start-of-image marker.
pub fn has_start_of_image(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && u16::from_be_bytes([bytes[0], bytes[1]]) == SOI
}

/// Frame parameters carried by the SOF segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Black calibration value.
    pub black: u8,
    /// White calibration value.
    pub white: u8,
    /// Image width in pixels.
    pub width: u16,
    /// Image height in pixels.
    pub height: u16,
}

/// Walk table segments up to the frame header and return it.
///
/// Returns `None` when the bytes are not a WSQ container or the marker
/// sequence is broken before a frame header is reached.
pub fn frame_header(bytes: &[u8]) -> Option<FrameHeader> {
    let mut cursor = Cursor::new(bytes);
    if cursor.read_u16::<BigEndian>().ok()? != SOI {
        return None;
    }

    loop {
        let marker = cursor.read_u16::<BigEndian>().ok()?;
        let length = cursor.read_u16::<BigEndian>().ok()?;
        if length < 2 {
            return None;
        }
        match marker {
            SOF => {
                let black = cursor.read_u8().ok()?;
                let white = cursor.read_u8().ok()?;
                let height = cursor.read_u16::<BigEndian>().ok()?;
                let width = cursor.read_u16::<BigEndian>().ok()?;
                return Some(FrameHeader {
                    black,
                    white,
                    width,
                    height,
                });
            }
            DTT | DQT | DHT | DRT | COM => {
                let next = cursor.position() + u64::from(length) - 2;
                if next > bytes.len() as u64 {
                    return None;
                }
                cursor.set_position(next);
            }
            _ => return None,
        }
    }
}

/// Placeholder used when no WSQ decoder has been configured.
///
/// Every decode fails, so WSQ payloads are never recognised and never
/// transcoded until a real decoder is plugged into the transcoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableWsqCodec;

impl ImageCodec for UnavailableWsqCodec {
    fn info(&self) -> CodecInfo {
        CodecInfo {
            name: "WSQ (unavailable)",
            kind: ImageKind::Wsq,
            lossless: false,
            can_decode: false,
            can_encode: false,
        }
    }

    fn decode(&self, data: &[u8]) -> Result<Raster> {
        let cause = match frame_header(data) {
            Some(frame) => format!(
                "no WSQ decoder configured for {}x{} frame",
                frame.width, frame.height
            ),
            None => "no WSQ decoder configured".to_string(),
        };
        Err(BdirError::ImageDecode {
            kind: ImageKind::Wsq,
            cause,
        })
    }
}
