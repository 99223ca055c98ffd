//! Conversion pipeline module.
//!
//! This module orchestrates record conversion: base64 decode, record decode,
//! validation, image transcoding, record rebuild and encode. Batches are
//! spread over the rayon thread pool.

use std::sync::Arc;
use std::time::Instant;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use rayon::prelude::*;
use serde::Serialize;

use crate::codec::{ImageCodec, ImageKind, ImageTranscoder};
use crate::config::{ConversionConfig, ImageType, Modality, Purpose, TargetFormat, ValidationPolicy};
use crate::error::{BdirError, Result};
use crate::record::{Bdir, ImageCompression};
use crate::validation::RecordValidator;
use crate::Raster;

/// Url-safe base64 without padding on output; padded input is accepted.
pub const RECORD_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode record bytes as url-safe base64.
pub fn encode_record(bytes: &[u8]) -> String {
    RECORD_BASE64.encode(bytes)
}

/// Decode url-safe base64 record text. Surrounding whitespace is ignored.
pub fn decode_record(text: &str) -> Result<Vec<u8>> {
    Ok(RECORD_BASE64.decode(text.trim())?)
}

/// Which embedded images are decoded and re-encoded.
///
/// Anything not listed is left untouched, compression code included.
pub const TRANSCODE_POLICY: &[(Modality, ImageCompression, ImageKind)] = &[
    (Modality::Face, ImageCompression::Jpeg2000Lossless, ImageKind::Jpeg2000),
    (Modality::Iris, ImageCompression::Jpeg2000Lossless, ImageKind::Jpeg2000),
    (Modality::Iris, ImageCompression::Jpeg2000Lossy, ImageKind::Jpeg2000),
    (Modality::Finger, ImageCompression::Jpeg2000Lossless, ImageKind::Jpeg2000),
    (Modality::Finger, ImageCompression::Wsq, ImageKind::Wsq),
];

/// Source format to decode from, if the image must be transcoded.
pub fn transcode_source(modality: Modality, compression: ImageCompression) -> Option<ImageKind> {
    TRANSCODE_POLICY
        .iter()
        .find(|(m, c, _)| *m == modality && *c == compression)
        .map(|(_, _, kind)| *kind)
}

/// One conversion job.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Record modality.
    pub modality: Modality,
    /// Declared purpose of the record.
    pub purpose: Purpose,
    /// Requested image type (JPEG or PNG).
    pub target: ImageType,
    /// Url-safe base64 record.
    pub record: String,
}

impl ConversionRequest {
    /// Create a new request.
    pub fn new(
        modality: Modality,
        purpose: Purpose,
        target: ImageType,
        record: impl Into<String>,
    ) -> Self {
        Self {
            modality,
            purpose,
            target,
            record: record.into(),
        }
    }
}

/// Rebuilt record bytes and what happened to its image.
#[derive(Debug, Clone)]
pub struct ConvertedRecord {
    /// Encoded record.
    pub bytes: Vec<u8>,
    /// Whether the image was decoded and re-encoded.
    pub transcoded: bool,
    /// Declared compression before conversion.
    pub source_compression: ImageCompression,
    /// Declared compression after conversion.
    pub output_compression: ImageCompression,
    /// Validation findings and policy notes.
    pub warnings: Vec<String>,
}

/// Result of a conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    /// Url-safe base64 output record.
    pub record: String,
    /// Record modality.
    pub modality: Modality,
    /// Whether the image was transcoded.
    pub transcoded: bool,
    /// Declared compression of the input image.
    pub source_compression: ImageCompression,
    /// Declared compression of the output image.
    pub output_compression: ImageCompression,
    /// Input record size in bytes.
    pub original_size: usize,
    /// Output record size in bytes.
    pub converted_size: usize,
    /// Time taken in milliseconds.
    pub conversion_time_ms: u64,
    /// Any warnings generated.
    pub warnings: Vec<String>,
}

impl ConversionResult {
    /// Output size relative to the input, as a percentage change.
    pub fn size_change_percent(&self) -> f64 {
        if self.original_size == 0 {
            0.0
        } else {
            (self.converted_size as f64 / self.original_size as f64 - 1.0) * 100.0
        }
    }
}

/// Conversion pipeline for biometric records.
#[derive(Debug, Clone)]
pub struct ConversionPipeline {
    config: ConversionConfig,
    transcoder: ImageTranscoder,
    validator: RecordValidator,
}

impl ConversionPipeline {
    /// Create a new pipeline with the given configuration and no WSQ decoder.
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            transcoder: ImageTranscoder::new().with_jpeg_quality(config.jpeg_quality),
            validator: RecordValidator::new(),
            config,
        }
    }

    /// Plug in a WSQ decoder, used for both sniffing and transcoding.
    pub fn with_wsq_decoder(mut self, decoder: Arc<dyn ImageCodec>) -> Self {
        self.transcoder = self.transcoder.with_wsq_decoder(decoder.clone());
        self.validator = self.validator.with_wsq_decoder(decoder);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// The image transcoder.
    pub fn transcoder(&self) -> &ImageTranscoder {
        &self.transcoder
    }

    /// The record validator.
    pub fn validator(&self) -> &RecordValidator {
        &self.validator
    }

    /// Convert one base64 record.
    pub fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        let start = Instant::now();
        let target = TargetFormat::try_from(request.target)?;
        let input = decode_record(&request.record)?;

        let converted = self.convert_bytes(request.modality, request.purpose, target, &input)?;
        let record = encode_record(&converted.bytes);
        let conversion_time_ms = start.elapsed().as_millis() as u64;

        log::info!(
            "Converted {} record: {} -> {} ({} -> {} bytes, {} ms)",
            request.modality,
            converted.source_compression,
            converted.output_compression,
            input.len(),
            converted.bytes.len(),
            conversion_time_ms
        );

        Ok(ConversionResult {
            record,
            modality: request.modality,
            transcoded: converted.transcoded,
            source_compression: converted.source_compression,
            output_compression: converted.output_compression,
            original_size: input.len(),
            converted_size: converted.bytes.len(),
            conversion_time_ms,
            warnings: converted.warnings,
        })
    }

    /// Convert raw record bytes.
    pub fn convert_bytes(
        &self,
        modality: Modality,
        purpose: Purpose,
        target: TargetFormat,
        bytes: &[u8],
    ) -> Result<ConvertedRecord> {
        let mut record = Bdir::decode(modality, bytes)?;
        let mut warnings = self.validate(&record, purpose)?;

        let (source_compression, transcoded_image) = {
            let image = record.primary_image().ok_or_else(|| {
                BdirError::Validation(format!("{} record has no representation", modality))
            })?;

            let transcoded = match transcode_source(modality, image.compression) {
                Some(kind) => {
                    self.config.check_target(modality, target)?;
                    Some(self.transcode_image(image.data, kind, target)?)
                }
                None => {
                    if image.compression.image_kind() != Some(ImageKind::from(target)) {
                        warnings.push(format!(
                            "{} image left as {}; only JPEG 2000 and WSQ sources are converted",
                            modality, image.compression
                        ));
                    }
                    None
                }
            };
            (image.compression, transcoded)
        };

        let transcoded = transcoded_image.is_some();
        if let Some(data) = transcoded_image {
            record.replace_primary_image(data, target)?;
        }
        let output_compression = record
            .primary_image()
            .map(|image| image.compression)
            .unwrap_or(source_compression);

        for warning in &warnings {
            log::warn!("{}", warning);
        }

        Ok(ConvertedRecord {
            bytes: record.encode()?,
            transcoded,
            source_compression,
            output_compression,
            warnings,
        })
    }

    /// Convert many records in parallel. Results keep the request order.
    pub fn convert_all(&self, requests: &[ConversionRequest]) -> Vec<Result<ConversionResult>> {
        let start = Instant::now();
        let results: Vec<_> = requests
            .par_iter()
            .map(|request| self.convert(request))
            .collect();

        let failed = results.iter().filter(|result| result.is_err()).count();
        log::info!(
            "Converted {} of {} records in {} ms",
            results.len() - failed,
            results.len(),
            start.elapsed().as_millis()
        );
        results
    }

    /// Apply the validation policy, returning findings to report.
    fn validate(&self, record: &Bdir, purpose: Purpose) -> Result<Vec<String>> {
        if self.config.validation == ValidationPolicy::Off {
            return Ok(Vec::new());
        }

        let report = self.validator.validate_record(record, purpose);
        let issues: Vec<String> = report.issues.iter().map(ToString::to_string).collect();

        if self.config.validation == ValidationPolicy::Enforce && !issues.is_empty() {
            return Err(BdirError::Validation(format!(
                "{} record failed validation for {}: {}",
                report.modality,
                purpose,
                issues.join("; ")
            )));
        }
        Ok(issues)
    }

    fn transcode_image(&self, data: &[u8], from: ImageKind, to: TargetFormat) -> Result<Vec<u8>> {
        let raster = self.transcoder.decode(data, from)?;
        let encoded = self.transcoder.encode(&raster, to)?;

        if self.config.verify_lossless && to.is_lossless() {
            self.verify_lossless(&encoded, &raster)?;
        }

        log::debug!(
            "Transcoded {}x{} {} image ({} bytes) to {} ({} bytes)",
            raster.width,
            raster.height,
            from,
            data.len(),
            to,
            encoded.len()
        );
        Ok(encoded)
    }

    /// Verify lossless output by decoding it again.
    fn verify_lossless(&self, encoded: &[u8], original: &Raster) -> Result<()> {
        let decoded = self.transcoder.decode(encoded, ImageKind::Png)?;

        if decoded != *original {
            return Err(BdirError::Validation(
                "Lossless verification failed: decoded data differs from original".into(),
            ));
        }

        log::debug!("Lossless verification passed");
        Ok(())
    }
}

impl Default for ConversionPipeline {
    fn default() -> Self {
        Self::new(ConversionConfig::default())
    }
}

/// Builder for creating conversion pipelines with custom settings.
#[derive(Default)]
pub struct PipelineBuilder {
    config: ConversionConfig,
    wsq_decoder: Option<Arc<dyn ImageCodec>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the conversion configuration.
    pub fn config(mut self, config: ConversionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the WSQ decoder.
    pub fn wsq_decoder(mut self, decoder: Arc<dyn ImageCodec>) -> Self {
        self.wsq_decoder = Some(decoder);
        self
    }

    /// Validate the configuration and build the pipeline.
    pub fn build(self) -> Result<ConversionPipeline> {
        self.config.validate()?;
        let pipeline = ConversionPipeline::new(self.config);
        Ok(match self.wsq_decoder {
            Some(decoder) => pipeline.with_wsq_decoder(decoder),
            None => pipeline,
        })
    }
}
