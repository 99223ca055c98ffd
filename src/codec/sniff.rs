//! Image signature sniffing.
//!
//! Magic-byte checks run first; WSQ has no reliable signature beyond its
//! start-of-image marker and is only confirmed by a full decode, so it is
//! always the last sniffer tried.

use super::traits::ImageCodec;
use super::{wsq, ImageKind};

/// Words of the 12-byte JP2 signature box, in file order.
const JP2_SIGNATURE_BOX: [[u8; 4]; 3] = [
    [0x00, 0x00, 0x00, 0x0C],
    [0x6A, 0x50, 0x20, 0x20],
    [0x0D, 0x0A, 0x87, 0x0A],
];

/// SOC marker followed by the SIZ marker of a raw codestream.
const J2K_CODESTREAM_START: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

/// Signature box payload seen without its box header.
const JP2_ALT_SIGNATURE: [u8; 4] = [0x0D, 0x0A, 0x87, 0x0A];

const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

type Sniffer = fn(&[u8]) -> bool;

/// Cheap signature sniffers, in the order they are tried.
const MAGIC_SNIFFERS: [(ImageKind, Sniffer); 3] = [
    (ImageKind::Jpeg2000, is_jpeg2000),
    (ImageKind::Jpeg, is_jpeg),
    (ImageKind::Png, is_png),
];

/// Check for one of the JPEG 2000 signatures.
///
/// Reads successive 4-byte words and stops at the first match or mismatch.
pub fn is_jpeg2000(bytes: &[u8]) -> bool {
    let mut words = bytes.chunks_exact(4);
    let first = match words.next() {
        Some(word) => word,
        None => return false,
    };

    if first == JP2_SIGNATURE_BOX[0] {
        return JP2_SIGNATURE_BOX[1..]
            .iter()
            .all(|expected| words.next() == Some(&expected[..]));
    }

    first == J2K_CODESTREAM_START || first == JP2_ALT_SIGNATURE
}

/// Check for the JPEG start-of-image marker.
pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.starts_with(&JPEG_SOI)
}

/// Check for the PNG file signature.
pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

/// Check whether the bytes are WSQ by decoding them.
///
/// The start-of-image marker gates the decode attempt; only a decode that
/// yields a non-empty pixel buffer counts.
pub fn is_wsq(bytes: &[u8], decoder: &dyn ImageCodec) -> bool {
    if !wsq::has_start_of_image(bytes) {
        return false;
    }

    match decoder.decode(bytes) {
        Ok(raster) => !raster.pixels.is_empty(),
        Err(e) => {
            log::debug!("WSQ decoder rejected {} bytes: {}", bytes.len(), e);
            false
        }
    }
}

/// Classify bytes as one of the known image kinds.
pub fn classify(bytes: &[u8], wsq_decoder: &dyn ImageCodec) -> Option<ImageKind> {
    MAGIC_SNIFFERS
        .iter()
        .find(|(_, sniff)| sniff(bytes))
        .map(|(kind, _)| *kind)
        .or_else(|| is_wsq(bytes, wsq_decoder).then_some(ImageKind::Wsq))
}
