//! Record validation.
//!
//! The predicates here never fail: they answer `true` or `false` and leave
//! the consequence to the caller. [`RecordValidator::validate_record`]
//! collects every failed predicate of a decoded record into a report.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::codec::{parse_siz, sniff, ImageCodec, ImageKind, UnavailableWsqCodec};
use crate::config::{Modality, Purpose};
use crate::record::Bdir;

/// Check every capture date/time field against its range.
///
/// Fields are checked in order and the first failing one ends the check.
pub fn is_valid_capture_date_time(
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    millisecond: u16,
) -> bool {
    year >= 1
        && (1..=12).contains(&month)
        && (1..=31).contains(&day)
        && hour <= 23
        && minute <= 59
        && second <= 59
        && millisecond <= 999
}

/// Check that the declared image length equals the bytes present.
pub fn is_valid_image_data_length(bytes: &[u8], declared: u32) -> bool {
    bytes.len() as u64 == u64::from(declared)
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Representation the issue was found in.
    pub representation: usize,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "representation {}: {}", self.representation, self.message)
    }
}

/// Outcome of validating a whole record.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Record modality.
    pub modality: Modality,
    /// Purpose the record was checked for.
    pub purpose: Purpose,
    /// Failed checks, in representation order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Whether every check passed.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Applies the purpose policy and record-level checks.
#[derive(Clone)]
pub struct RecordValidator {
    wsq: Arc<dyn ImageCodec>,
}

impl RecordValidator {
    /// Create a validator without a WSQ decoder; WSQ images then never pass.
    pub fn new() -> Self {
        Self {
            wsq: Arc::new(UnavailableWsqCodec),
        }
    }

    /// Use `decoder` to recognise WSQ images.
    pub fn with_wsq_decoder(mut self, decoder: Arc<dyn ImageCodec>) -> Self {
        self.wsq = decoder;
        self
    }

    /// Check that the image format is acceptable for the purpose.
    ///
    /// Authentication accepts JPEG 2000 or WSQ; registration accepts JPEG
    /// 2000 only.
    pub fn is_valid_image_data(&self, purpose: Purpose, modality: Modality, bytes: &[u8]) -> bool {
        let valid = sniff::is_jpeg2000(bytes)
            || (purpose.allows_lossy() && sniff::is_wsq(bytes, self.wsq.as_ref()));
        if !valid {
            log::debug!(
                "{} image of {} bytes not accepted for {}",
                modality,
                bytes.len(),
                purpose
            );
        }
        valid
    }

    /// Run every check over every representation of a decoded record.
    pub fn validate_record(&self, record: &Bdir, purpose: Purpose) -> ValidationReport {
        let modality = record.modality();
        let mut issues = Vec::new();

        for view in record.representations() {
            let mut issue = |message: String| {
                issues.push(ValidationIssue {
                    representation: view.index,
                    message,
                })
            };
            let image = view.image;

            if !view.capture_date_time.is_valid() {
                issue(format!(
                    "capture date/time {} out of range",
                    view.capture_date_time
                ));
            }

            if image.width == 0 || image.height == 0 {
                issue(format!(
                    "declared dimensions {}x{} are empty",
                    image.width, image.height
                ));
            }

            if !self.is_valid_image_data(purpose, modality, image.data) {
                issue(format!(
                    "{} image not accepted for {}",
                    image.compression, purpose
                ));
            }

            if image.compression.image_kind() == Some(ImageKind::Jpeg2000) {
                if let Some(siz) = parse_siz(image.data) {
                    if (siz.width, siz.height) != (u32::from(image.width), u32::from(image.height))
                    {
                        issue(format!(
                            "declared dimensions {}x{} differ from codestream {}x{}",
                            image.width, image.height, siz.width, siz.height
                        ));
                    }
                }
            }
        }

        ValidationReport {
            modality,
            purpose,
            issues,
        }
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordValidator")
            .field("wsq", &self.wsq.info().name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::BiometricRecord;
    use crate::test_support::{
        face_record_bytes, finger_record_bytes, tiny_j2k_codestream, FakeWsqCodec, FAKE_WSQ,
    };

    #[test]
    fn test_capture_date_time_boundaries() {
        assert!(is_valid_capture_date_time(2023, 1, 1, 0, 0, 0, 0));
        assert!(is_valid_capture_date_time(2023, 12, 31, 23, 59, 59, 999));
        assert!(is_valid_capture_date_time(65535, 6, 15, 12, 30, 30, 500));

        assert!(!is_valid_capture_date_time(2023, 0, 1, 0, 0, 0, 0));
        assert!(!is_valid_capture_date_time(2023, 13, 1, 0, 0, 0, 0));
        assert!(!is_valid_capture_date_time(2023, 1, 32, 0, 0, 0, 0));
        assert!(!is_valid_capture_date_time(2023, 1, 0, 0, 0, 0, 0));
        assert!(!is_valid_capture_date_time(2023, 1, 1, 24, 0, 0, 0));
        assert!(!is_valid_capture_date_time(2023, 1, 1, 0, 60, 0, 0));
        assert!(!is_valid_capture_date_time(2023, 1, 1, 0, 0, 60, 0));
        assert!(!is_valid_capture_date_time(2023, 1, 1, 0, 0, 0, 1000));
        assert!(!is_valid_capture_date_time(0, 1, 1, 0, 0, 0, 0));
    }

    #[test]
    fn test_image_data_length() {
        let data = [0u8; 10];
        assert!(is_valid_image_data_length(&data, 10));
        assert!(!is_valid_image_data_length(&data, 9));
        assert!(!is_valid_image_data_length(&data, 11));
    }

    #[test]
    fn test_purpose_policy() {
        let validator = RecordValidator::new().with_wsq_decoder(Arc::new(FakeWsqCodec));
        let j2k = tiny_j2k_codestream();

        assert!(validator.is_valid_image_data(Purpose::Registration, Modality::Face, &j2k));
        assert!(validator.is_valid_image_data(Purpose::Auth, Modality::Face, &j2k));
        assert!(validator.is_valid_image_data(Purpose::Auth, Modality::Finger, FAKE_WSQ));
        assert!(!validator.is_valid_image_data(Purpose::Registration, Modality::Finger, FAKE_WSQ));
        assert!(!validator.is_valid_image_data(Purpose::Auth, Modality::Face, &[0xFF, 0xD8, 0xFF]));
    }

    #[test]
    fn test_wsq_needs_a_decoder() {
        let validator = RecordValidator::new();
        assert!(!validator.is_valid_image_data(Purpose::Auth, Modality::Finger, FAKE_WSQ));
    }

    #[test]
    fn test_validate_clean_record() {
        let record = Bdir::decode(Modality::Face, &face_record_bytes()).unwrap();
        let report = RecordValidator::new().validate_record(&record, Purpose::Registration);
        assert!(report.is_valid(), "{:?}", report.issues);
    }

    #[test]
    fn test_validate_reports_each_issue() {
        let mut face = crate::record::FaceBdir::decode(&face_record_bytes()).unwrap();
        face.representations[0].header.capture_date_time.month = 13;
        face.representations[0].header.image_information.width = 12;
        let record = Bdir::Face(face);

        let report = RecordValidator::new().validate_record(&record, Purpose::Auth);
        assert_eq!(report.issues.len(), 2);
        assert!(report.issues[0].message.contains("capture date/time"));
        assert!(report.issues[1].message.contains("12x10"));
    }

    #[test]
    fn test_validate_finger_for_registration() {
        let record = Bdir::decode(Modality::Finger, &finger_record_bytes()).unwrap();
        let validator = RecordValidator::new().with_wsq_decoder(Arc::new(FakeWsqCodec));

        assert!(validator.validate_record(&record, Purpose::Auth).is_valid());
        let report = validator.validate_record(&record, Purpose::Registration);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].message.contains("WSQ"));
    }
}
