//! Configuration types for conversion settings and the tags exchanged at the API boundary.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BdirError, Result};

/// Biometric modality of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    /// No modality given; never accepted by the conversion path.
    UnSpecified,
    /// ISO/IEC 19794-4 finger image record.
    Finger,
    /// ISO/IEC 19794-5 face image record.
    Face,
    /// ISO/IEC 19794-6 iris image record.
    Iris,
}

impl Modality {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Modality::UnSpecified => "UnSpecified",
            Modality::Finger => "Finger",
            Modality::Face => "Face",
            Modality::Iris => "Iris",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Modality {
    type Err = BdirError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finger" => Ok(Modality::Finger),
            "face" => Ok(Modality::Face),
            "iris" => Ok(Modality::Iris),
            "unspecified" => Ok(Modality::UnSpecified),
            other => Err(BdirError::InputContract(format!(
                "unknown modality '{}'",
                other
            ))),
        }
    }
}

/// Image types named at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageType {
    /// JPEG 2000 codestream or JP2 container.
    Jpeg2000,
    /// Wavelet Scalar Quantization (fingerprint).
    Wsq,
    /// Baseline JPEG.
    Jpeg,
    /// PNG.
    Png,
    /// Reserved, never produced by the conversion path.
    Webp,
}

impl ImageType {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            ImageType::Jpeg2000 => "JPEG2000",
            ImageType::Wsq => "WSQ",
            ImageType::Jpeg => "JPEG",
            ImageType::Png => "PNG",
            ImageType::Webp => "WEBP",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageType {
    type Err = BdirError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg2000" | "jp2000" | "jp2" | "j2k" => Ok(ImageType::Jpeg2000),
            "wsq" => Ok(ImageType::Wsq),
            "jpeg" | "jpg" => Ok(ImageType::Jpeg),
            "png" => Ok(ImageType::Png),
            "webp" => Ok(ImageType::Webp),
            other => Err(BdirError::InputContract(format!(
                "unknown image type '{}'",
                other
            ))),
        }
    }
}

/// Output formats the transcoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetFormat {
    /// Baseline JPEG (lossy).
    Jpeg,
    /// PNG (lossless).
    Png,
}

impl TargetFormat {
    /// Whether the format preserves pixels exactly.
    pub fn is_lossless(&self) -> bool {
        matches!(self, TargetFormat::Png)
    }
}

impl From<TargetFormat> for ImageType {
    fn from(target: TargetFormat) -> Self {
        match target {
            TargetFormat::Jpeg => ImageType::Jpeg,
            TargetFormat::Png => ImageType::Png,
        }
    }
}

impl TryFrom<ImageType> for TargetFormat {
    type Error = BdirError;

    fn try_from(image_type: ImageType) -> Result<Self> {
        match image_type {
            ImageType::Jpeg => Ok(TargetFormat::Jpeg),
            ImageType::Png => Ok(TargetFormat::Png),
            other => Err(BdirError::InputContract(format!(
                "{} is not a supported conversion target (expected JPEG or PNG)",
                other
            ))),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ImageType::from(*self).fmt(f)
    }
}

/// Declared intent of a record, driving which compressions are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    /// Authentication: lossy WSQ is acceptable alongside JPEG 2000.
    Auth,
    /// Registration (enrolment): only JPEG 2000 is acceptable.
    Registration,
}

impl Purpose {
    /// Whether the purpose tolerates lossy image payloads.
    pub fn allows_lossy(&self) -> bool {
        matches!(self, Purpose::Auth)
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Purpose::Auth => f.write_str("Auth"),
            Purpose::Registration => f.write_str("Registration"),
        }
    }
}

impl FromStr for Purpose {
    type Err = BdirError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auth" => Ok(Purpose::Auth),
            "registration" => Ok(Purpose::Registration),
            other => Err(BdirError::InputContract(format!(
                "unknown purpose '{}' (expected Auth or Registration)",
                other
            ))),
        }
    }
}

/// What to do when ISO 19794-6 iris records are asked to carry JPEG output.
///
/// The standard's image format table lists JPEG codes, yet some profiles treat
/// JPEG iris images as non-conformant. The choice is left to the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IrisJpegPolicy {
    /// Produce JPEG iris images and log a warning.
    #[default]
    Allow,
    /// Refuse the conversion with `BdirError::UnsupportedTarget`.
    Reject,
}

/// How the pipeline treats failed validator predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Skip record validation entirely.
    Off,
    /// Validate, log and report issues, but convert anyway.
    #[default]
    Warn,
    /// Abort the conversion on the first report with issues.
    Enforce,
}

/// Configuration for a conversion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// JPEG encoder quality (1-100).
    pub jpeg_quality: u8,
    /// Iris JPEG output policy.
    pub iris_jpeg_policy: IrisJpegPolicy,
    /// Record validation policy.
    pub validation: ValidationPolicy,
    /// Decode lossless outputs again and compare them with the source raster.
    pub verify_lossless: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            iris_jpeg_policy: IrisJpegPolicy::Allow,
            validation: ValidationPolicy::Warn,
            verify_lossless: true,
        }
    }
}

impl ConversionConfig {
    /// Parse a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ConversionConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded configuration from {}", path.as_ref().display());
        Self::from_toml_str(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(BdirError::Config(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    /// Check whether a modality may carry the given output format.
    pub fn check_target(&self, modality: Modality, target: TargetFormat) -> Result<()> {
        if modality == Modality::Iris && target == TargetFormat::Jpeg {
            match self.iris_jpeg_policy {
                IrisJpegPolicy::Allow => {
                    log::warn!("Writing JPEG image into an ISO 19794-6 iris record");
                }
                IrisJpegPolicy::Reject => {
                    return Err(BdirError::UnsupportedTarget {
                        modality,
                        format: target.into(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_tags_parse_case_insensitively() {
        assert_eq!("FACE".parse::<Modality>().unwrap(), Modality::Face);
        assert_eq!("Registration".parse::<Purpose>().unwrap(), Purpose::Registration);
        assert_eq!("AUTH".parse::<Purpose>().unwrap(), Purpose::Auth);
        assert_eq!("jpg".parse::<ImageType>().unwrap(), ImageType::Jpeg);
    }

    #[test]
    fn test_unknown_tags_fail_loudly() {
        assert!(matches!(
            "Enrolment".parse::<Purpose>(),
            Err(BdirError::InputContract(_))
        ));
        assert!(matches!(
            "palm".parse::<Modality>(),
            Err(BdirError::InputContract(_))
        ));
    }

    #[test]
    fn test_target_format_rejects_source_only_types() {
        assert_eq!(TargetFormat::try_from(ImageType::Png).unwrap(), TargetFormat::Png);
        assert!(TargetFormat::try_from(ImageType::Jpeg2000).is_err());
        assert!(TargetFormat::try_from(ImageType::Webp).is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config = ConversionConfig::from_toml_str(
            "jpeg_quality = 75\niris_jpeg_policy = \"reject\"\nvalidation = \"enforce\"\n",
        )
        .unwrap();
        assert_eq!(config.jpeg_quality, 75);
        assert_eq!(config.iris_jpeg_policy, IrisJpegPolicy::Reject);
        assert_eq!(config.validation, ValidationPolicy::Enforce);
        assert!(config.verify_lossless);

        assert!(ConversionConfig::from_toml_str("jpeg_quality = 0").is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "verify_lossless = false").unwrap();

        let config = ConversionConfig::from_toml_file(file.path()).unwrap();
        assert!(!config.verify_lossless);
        assert_eq!(config.jpeg_quality, 90);
    }

    #[test]
    fn test_iris_jpeg_policy() {
        let mut config = ConversionConfig::default();
        assert!(config.check_target(Modality::Iris, TargetFormat::Jpeg).is_ok());

        config.iris_jpeg_policy = IrisJpegPolicy::Reject;
        assert!(matches!(
            config.check_target(Modality::Iris, TargetFormat::Jpeg),
            Err(BdirError::UnsupportedTarget { .. })
        ));
        assert!(config.check_target(Modality::Iris, TargetFormat::Png).is_ok());
        assert!(config.check_target(Modality::Face, TargetFormat::Jpeg).is_ok());
    }
}
