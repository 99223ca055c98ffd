//! Biometric Record Conversion Library
//!
//! Decodes and encodes ISO/IEC 19794 biometric data interchange records
//! (finger, face and iris, 2011 editions) and transcodes the image embedded
//! in them from JPEG 2000 or WSQ to JPEG or PNG, rebuilding a byte-exact
//! record around the new image.
//!
//! # Features
//!
//! - **Record codecs**: lossless decode/encode of 19794-4, -5 and -6 records
//! - **Image sniffing**: JPEG 2000, JPEG and PNG signatures, WSQ by decode
//! - **Transcoding**: JPEG 2000 via OpenJPEG, JPEG/PNG via `image`, WSQ through
//!   an application-supplied decoder
//! - **Validation**: capture date/time ranges and the purpose policy
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bdir_transcode::{convert_iso_image_type, ImageType, Modality};
//!
//! // url-safe base64 record in, url-safe base64 record out
//! let converted = convert_iso_image_type(&record_b64, Modality::Face, ImageType::Jpeg)?;
//! ```
//!
//! # WSQ
//!
//! Fingerprint records commonly carry WSQ images. Plug a decoder in with
//! [`ConversionPipeline::with_wsq_decoder`]; without one, WSQ images are
//! never recognised and converting them fails with an image decode error.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod validation;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use codec::{CodecInfo, ImageCodec, ImageKind, ImageTranscoder};
pub use config::{
    ConversionConfig, ImageType, IrisJpegPolicy, Modality, Purpose, TargetFormat, ValidationPolicy,
};
pub use error::{BdirError, Result};
pub use pipeline::{ConversionPipeline, ConversionRequest, ConversionResult, PipelineBuilder};
pub use record::{Bdir, BiometricRecord, FaceBdir, FingerBdir, IrisBdir};
pub use validation::{is_valid_capture_date_time, RecordValidator, ValidationReport};

use std::sync::Arc;

/// Decoded 8-bit image samples, interleaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Samples per pixel (1 for gray, 3 for RGB).
    pub channels: u8,
    /// Pixel samples, row-major.
    pub pixels: Vec<u8>,
}

impl Raster {
    /// Create a new raster.
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    /// Create an 8-bit gray raster.
    pub fn gray(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self::new(width, height, 1, pixels)
    }

    /// Calculate the expected size of the pixel buffer in bytes.
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Validate geometry, channel count and buffer size.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BdirError::Validation(format!(
                "Empty raster: {}x{}",
                self.width, self.height
            )));
        }
        if self.channels != 1 && self.channels != 3 {
            return Err(BdirError::Validation(format!(
                "Unsupported channel count: {}",
                self.channels
            )));
        }
        let expected = self.expected_size();
        if self.pixels.len() != expected {
            return Err(BdirError::Validation(format!(
                "Pixel data size mismatch: expected {} bytes, got {}",
                expected,
                self.pixels.len()
            )));
        }
        Ok(())
    }
}

/// Convert the image of a url-safe base64 record to `target`, returning the
/// rebuilt record as url-safe base64.
///
/// Uses the default configuration and no WSQ decoder; see
/// [`convert_iso_image_type_with`] to supply one.
pub fn convert_iso_image_type(record: &str, modality: Modality, target: ImageType) -> Result<String> {
    convert_iso_image_type_with(&ConversionPipeline::default(), record, modality, target)
}

/// Like [`convert_iso_image_type`], through a configured pipeline.
pub fn convert_iso_image_type_with(
    pipeline: &ConversionPipeline,
    record: &str,
    modality: Modality,
    target: ImageType,
) -> Result<String> {
    let request = ConversionRequest::new(modality, Purpose::Auth, target, record);
    Ok(pipeline.convert(&request)?.record)
}

/// Check that the image format is acceptable for the purpose.
///
/// Without a WSQ decoder only JPEG 2000 passes; use
/// [`is_valid_image_data_with`] to accept WSQ for authentication.
pub fn is_valid_image_data(purpose: Purpose, modality: Modality, bytes: &[u8]) -> bool {
    RecordValidator::new().is_valid_image_data(purpose, modality, bytes)
}

/// Like [`is_valid_image_data`], recognising WSQ with `wsq_decoder`.
pub fn is_valid_image_data_with(
    purpose: Purpose,
    modality: Modality,
    bytes: &[u8],
    wsq_decoder: Arc<dyn ImageCodec>,
) -> bool {
    RecordValidator::new()
        .with_wsq_decoder(wsq_decoder)
        .is_valid_image_data(purpose, modality, bytes)
}

/// Check for a JPEG 2000 signature.
pub fn is_jp2000(bytes: &[u8]) -> bool {
    codec::sniff::is_jpeg2000(bytes)
}

/// Check for WSQ with the default (absent) decoder.
///
/// Always `false`; use [`is_wsq_with`] to check with a decoder.
pub fn is_wsq(bytes: &[u8]) -> bool {
    is_wsq_with(bytes, &codec::UnavailableWsqCodec)
}

/// Check whether `wsq_decoder` accepts `bytes` as WSQ.
pub fn is_wsq_with(bytes: &[u8], wsq_decoder: &dyn ImageCodec) -> bool {
    codec::sniff::is_wsq(bytes, wsq_decoder)
}

/// Library version information.
pub mod version {
    /// Library version string.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Library name.
    pub const NAME: &str = env!("CARGO_PKG_NAME");

    /// Get full version string.
    pub fn full_version() -> String {
        format!("{} {}", NAME, VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        face_record_bytes, finger_record_bytes, tiny_j2k_codestream, FakeWsqCodec, FAKE_WSQ,
    };

    #[test]
    fn test_raster_expected_size() {
        let raster = Raster::new(10, 4, 3, vec![0; 120]);
        assert_eq!(raster.expected_size(), 120);
        assert!(raster.validate().is_ok());
    }

    #[test]
    fn test_raster_validation() {
        assert!(Raster::gray(4, 4, vec![0; 15]).validate().is_err());
        assert!(Raster::gray(0, 4, Vec::new()).validate().is_err());
        assert!(Raster::new(2, 2, 2, vec![0; 8]).validate().is_err());
    }

    #[test]
    fn test_root_sniffers() {
        assert!(is_jp2000(&tiny_j2k_codestream()));
        assert!(!is_jp2000(&[0u8; 16]));
        assert!(!is_wsq(FAKE_WSQ));
    }

    #[test]
    fn test_convert_iso_image_type() {
        let input = pipeline::encode_record(&face_record_bytes());
        let output = convert_iso_image_type(&input, Modality::Face, ImageType::Png).unwrap();
        let record = Bdir::decode(Modality::Face, &pipeline::decode_record(&output).unwrap()).unwrap();
        assert_eq!(record.primary_image().unwrap().compression, record::ImageCompression::Png);
    }

    #[test]
    fn test_root_entry_points_with_wsq_decoder() {
        assert!(is_wsq_with(FAKE_WSQ, &FakeWsqCodec));
        assert!(!is_wsq_with(&tiny_j2k_codestream(), &FakeWsqCodec));

        let decoder: Arc<dyn ImageCodec> = Arc::new(FakeWsqCodec);
        assert!(is_valid_image_data_with(Purpose::Auth, Modality::Face, FAKE_WSQ, decoder.clone()));
        assert!(!is_valid_image_data_with(
            Purpose::Registration,
            Modality::Finger,
            FAKE_WSQ,
            decoder.clone()
        ));
        assert!(!is_valid_image_data(Purpose::Auth, Modality::Finger, FAKE_WSQ));

        let pipeline = ConversionPipeline::default().with_wsq_decoder(decoder);
        let input = pipeline::encode_record(&finger_record_bytes());
        let output =
            convert_iso_image_type_with(&pipeline, &input, Modality::Finger, ImageType::Png).unwrap();
        let record =
            Bdir::decode(Modality::Finger, &pipeline::decode_record(&output).unwrap()).unwrap();
        assert_eq!(record.primary_image().unwrap().compression, record::ImageCompression::Png);
        assert!(convert_iso_image_type(&input, Modality::Finger, ImageType::Png).is_err());
    }

    #[test]
    fn test_convert_rejects_unspecified_modality() {
        let input = pipeline::encode_record(&face_record_bytes());
        assert!(matches!(
            convert_iso_image_type(&input, Modality::UnSpecified, ImageType::Jpeg),
            Err(BdirError::InputContract(_))
        ));
    }

    #[test]
    fn test_version() {
        assert!(version::full_version().starts_with("bdir_transcode"));
    }
}
