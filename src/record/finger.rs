//! ISO/IEC 19794-4:2011 finger image records.
//!
//! Unlike face and iris, the image data is followed by an extended data
//! block, and a certification block is present in every representation when
//! the general header's certification flag is set.

use serde::Serialize;

use crate::config::{Modality, TargetFormat};
use crate::error::{BdirError, Result};

use super::{
    assemble_record, fit, frame_representation, missing_representation, read_image_data,
    read_prelude, read_quality_blocks, read_representations, write_prelude, write_quality_blocks,
    BiometricRecord, CaptureDateTime, CaptureDevice, EmbeddedImage, HeaderInfo, ImageCompression,
    QualityBlock, RecordReader, RecordWriter, RepresentationView,
};

/// `FIR\0`
pub const FORMAT_IDENTIFIER: u32 = 0x4649_5200;
/// `020\0`
pub const VERSION: u32 = 0x3032_3000;

const GENERAL_HEADER_LEN: usize = 16;

/// Extended data area holding segmentation data.
pub const SEGMENTATION_AREA: u16 = 0x0001;
/// Extended data area holding annotations.
pub const ANNOTATION_AREA: u16 = 0x0002;
/// Extended data area holding a comment.
pub const COMMENT_AREA: u16 = 0x0003;

/// Compression algorithm codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum FingerCompression {
    /// Uncompressed, no bit packing.
    Uncompressed = 0,
    /// Uncompressed, bit packed.
    UncompressedBitPacked = 1,
    /// WSQ.
    Wsq = 2,
    /// JPEG.
    Jpeg = 3,
    /// JPEG 2000, lossy.
    Jpeg2000Lossy = 4,
    /// JPEG 2000, lossless.
    Jpeg2000Lossless = 5,
    /// PNG.
    Png = 6,
}

impl FingerCompression {
    /// Generic compression class.
    pub fn compression(&self) -> ImageCompression {
        match self {
            FingerCompression::Uncompressed => ImageCompression::Raw,
            FingerCompression::UncompressedBitPacked => ImageCompression::RawBitPacked,
            FingerCompression::Wsq => ImageCompression::Wsq,
            FingerCompression::Jpeg => ImageCompression::Jpeg,
            FingerCompression::Jpeg2000Lossy => ImageCompression::Jpeg2000Lossy,
            FingerCompression::Jpeg2000Lossless => ImageCompression::Jpeg2000Lossless,
            FingerCompression::Png => ImageCompression::Png,
        }
    }

    /// Code recorded for a transcoded image.
    pub fn for_target(target: TargetFormat) -> Self {
        match target {
            TargetFormat::Jpeg => FingerCompression::Jpeg,
            TargetFormat::Png => FingerCompression::Png,
        }
    }
}

impl TryFrom<u8> for FingerCompression {
    type Error = BdirError;

    fn try_from(code: u8) -> Result<Self> {
        Ok(match code {
            0 => FingerCompression::Uncompressed,
            1 => FingerCompression::UncompressedBitPacked,
            2 => FingerCompression::Wsq,
            3 => FingerCompression::Jpeg,
            4 => FingerCompression::Jpeg2000Lossy,
            5 => FingerCompression::Jpeg2000Lossless,
            6 => FingerCompression::Png,
            _ => {
                return Err(BdirError::UnsupportedCompressionType {
                    modality: Modality::Finger,
                    code,
                })
            }
        })
    }
}

/// Finger general header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerGeneralHeader {
    /// Version number (`020\0`).
    pub version: u32,
    /// Certification flag. Non-zero means every representation carries
    /// a certification block.
    pub certification_flag: u8,
    /// Number of distinct finger positions.
    pub finger_positions: u8,
}

/// One certification entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CertificationBlock {
    /// Certification authority identifier.
    pub authority_id: u16,
    /// Certification scheme identifier.
    pub scheme_id: u8,
}

/// Point of a segmentation outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentationPoint {
    /// X coordinate.
    pub x: u16,
    /// Y coordinate.
    pub y: u16,
}

/// Outline of one segmented finger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentedFinger {
    /// Finger position.
    pub position: u8,
    /// Outline points.
    pub points: Vec<SegmentationPoint>,
}

/// Segmentation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segmentation {
    /// Segmentation algorithm owner.
    pub owner: u16,
    /// Segmentation algorithm identifier.
    pub algorithm: u16,
    /// Segmented fingers.
    pub fingers: Vec<SegmentedFinger>,
}

/// Annotation of an amputated or bandaged finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Annotation {
    /// Finger position.
    pub position: u8,
    /// Annotation code.
    pub code: u8,
}

/// One extended data area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum ExtendedDataArea {
    /// Type 0x0001.
    Segmentation(Segmentation),
    /// Type 0x0002.
    Annotation {
        /// Annotated positions.
        annotations: Vec<Annotation>,
    },
    /// Type 0x0003.
    Comment {
        /// Comment bytes.
        text: Vec<u8>,
    },
    /// Any other type code, carried as-is.
    Vendor {
        /// Type code.
        type_code: u16,
        /// Area data.
        data: Vec<u8>,
    },
}

impl ExtendedDataArea {
    /// Type code written for the area.
    pub fn type_code(&self) -> u16 {
        match self {
            ExtendedDataArea::Segmentation(_) => SEGMENTATION_AREA,
            ExtendedDataArea::Annotation { .. } => ANNOTATION_AREA,
            ExtendedDataArea::Comment { .. } => COMMENT_AREA,
            ExtendedDataArea::Vendor { type_code, .. } => *type_code,
        }
    }

    fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
        let type_code = reader.u16("extended data type code")?;
        let length = reader.u16("extended data area length")?;
        let mut area = reader.sub_reader(length as usize, "extended data area")?;

        let parsed = match type_code {
            SEGMENTATION_AREA => {
                let owner = area.u16("segmentation owner")?;
                let algorithm = area.u16("segmentation algorithm")?;
                let count = area.u8("number of segmented fingers")?;
                let fingers = (0..count)
                    .map(|_| {
                        let position = area.u8("segmented finger position")?;
                        let points = area.u8("number of segmentation points")?;
                        let points = (0..points)
                            .map(|_| {
                                Ok(SegmentationPoint {
                                    x: area.u16("segmentation point x")?,
                                    y: area.u16("segmentation point y")?,
                                })
                            })
                            .collect::<Result<Vec<_>>>()?;
                        Ok(SegmentedFinger { position, points })
                    })
                    .collect::<Result<Vec<_>>>()?;
                ExtendedDataArea::Segmentation(Segmentation {
                    owner,
                    algorithm,
                    fingers,
                })
            }
            ANNOTATION_AREA => {
                let count = area.u8("number of annotations")?;
                let annotations = (0..count)
                    .map(|_| {
                        Ok(Annotation {
                            position: area.u8("annotated finger position")?,
                            code: area.u8("annotation code")?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                ExtendedDataArea::Annotation { annotations }
            }
            COMMENT_AREA => ExtendedDataArea::Comment {
                text: area.bytes(area.remaining(), "comment")?.to_vec(),
            },
            _ => ExtendedDataArea::Vendor {
                type_code,
                data: area.bytes(area.remaining(), "vendor extended data")?.to_vec(),
            },
        };

        area.finish("end of extended data area")?;
        Ok(parsed)
    }

    fn write(&self, writer: &mut RecordWriter) -> Result<()> {
        let mut body = RecordWriter::new();
        match self {
            ExtendedDataArea::Segmentation(segmentation) => {
                body.u16(segmentation.owner)?;
                body.u16(segmentation.algorithm)?;
                body.u8(fit(segmentation.fingers.len(), "number of segmented fingers")?)?;
                for finger in &segmentation.fingers {
                    body.u8(finger.position)?;
                    body.u8(fit(finger.points.len(), "number of segmentation points")?)?;
                    for point in &finger.points {
                        body.u16(point.x)?;
                        body.u16(point.y)?;
                    }
                }
            }
            ExtendedDataArea::Annotation { annotations } => {
                body.u8(fit(annotations.len(), "number of annotations")?)?;
                for annotation in annotations {
                    body.u8(annotation.position)?;
                    body.u8(annotation.code)?;
                }
            }
            ExtendedDataArea::Comment { text } => body.bytes(text),
            ExtendedDataArea::Vendor { data, .. } => body.bytes(data),
        }

        let body = body.into_inner();
        writer.u16(self.type_code())?;
        writer.u16(fit(body.len(), "extended data area length")?)?;
        writer.bytes(&body);
        Ok(())
    }
}

/// Finger representation header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerRepresentationHeader {
    /// Capture date and time.
    pub capture_date_time: CaptureDateTime,
    /// Capture device identifiers.
    pub capture_device: CaptureDevice,
    /// Quality blocks.
    pub quality_blocks: Vec<QualityBlock>,
    /// Certification blocks, only present when the record is certified.
    pub certification_blocks: Vec<CertificationBlock>,
    /// Finger or palm position.
    pub finger_position: u8,
    /// Representation number.
    pub representation_number: u8,
    /// Scale units (inch or cm).
    pub scale_units: u8,
    /// Capture device sampling rate, horizontal.
    pub capture_sampling_rate_horizontal: u16,
    /// Capture device sampling rate, vertical.
    pub capture_sampling_rate_vertical: u16,
    /// Image sampling rate, horizontal.
    pub image_sampling_rate_horizontal: u16,
    /// Image sampling rate, vertical.
    pub image_sampling_rate_vertical: u16,
    /// Bits per pixel.
    pub bit_depth: u8,
    /// Compression algorithm.
    pub compression: FingerCompression,
    /// Impression type.
    pub impression_type: u8,
    /// Horizontal line length (width).
    pub horizontal_line_length: u16,
    /// Vertical line length (height).
    pub vertical_line_length: u16,
}

/// Finger representation body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerRepresentationBody {
    /// Embedded image bytes.
    #[serde(rename = "image_data_length", serialize_with = "super::serialize_len")]
    pub image_data: Vec<u8>,
    /// Extended data areas.
    pub extended_data: Vec<ExtendedDataArea>,
}

/// One finger sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerRepresentation {
    /// Header fields.
    pub header: FingerRepresentationHeader,
    /// Image payload and extended data.
    pub body: FingerRepresentationBody,
}

impl FingerRepresentation {
    fn read(reader: &mut RecordReader<'_>, certified: bool) -> Result<Self> {
        let capture_date_time = CaptureDateTime::read(reader)?;
        let capture_device = CaptureDevice::read(reader)?;
        let quality_blocks = read_quality_blocks(reader)?;

        let certification_blocks = if certified {
            let count = reader.u8("number of certification blocks")?;
            (0..count)
                .map(|_| {
                    Ok(CertificationBlock {
                        authority_id: reader.u16("certification authority identifier")?,
                        scheme_id: reader.u8("certification scheme identifier")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let finger_position = reader.u8("finger position")?;
        let representation_number = reader.u8("representation number")?;
        let scale_units = reader.u8("scale units")?;
        let capture_sampling_rate_horizontal = reader.u16("capture sampling rate horizontal")?;
        let capture_sampling_rate_vertical = reader.u16("capture sampling rate vertical")?;
        let image_sampling_rate_horizontal = reader.u16("image sampling rate horizontal")?;
        let image_sampling_rate_vertical = reader.u16("image sampling rate vertical")?;
        let bit_depth = reader.u8("bit depth")?;
        let compression = FingerCompression::try_from(reader.u8("compression algorithm")?)?;
        let impression_type = reader.u8("impression type")?;

        let width_offset = reader.offset();
        let horizontal_line_length = reader.u16("horizontal line length")?;
        let vertical_line_length = reader.u16("vertical line length")?;
        if horizontal_line_length == 0 || vertical_line_length == 0 {
            return Err(BdirError::parse(
                Modality::Finger,
                width_offset,
                format!(
                    "non-zero image dimensions (found {}x{})",
                    horizontal_line_length, vertical_line_length
                ),
            ));
        }

        // the extended data length field always follows the image
        let image_data = read_image_data(reader, 2)?;
        let extended_length = reader.u16("extended data length")?;
        let mut extended = reader.sub_reader(extended_length as usize, "extended data")?;
        let mut extended_data = Vec::new();
        while extended.remaining() > 0 {
            extended_data.push(ExtendedDataArea::read(&mut extended)?);
        }

        Ok(Self {
            header: FingerRepresentationHeader {
                capture_date_time,
                capture_device,
                quality_blocks,
                certification_blocks,
                finger_position,
                representation_number,
                scale_units,
                capture_sampling_rate_horizontal,
                capture_sampling_rate_vertical,
                image_sampling_rate_horizontal,
                image_sampling_rate_vertical,
                bit_depth,
                compression,
                impression_type,
                horizontal_line_length,
                vertical_line_length,
            },
            body: FingerRepresentationBody {
                image_data,
                extended_data,
            },
        })
    }

    fn write(&self, certified: bool) -> Result<Vec<u8>> {
        let header = &self.header;
        let mut writer = RecordWriter::new();
        header.capture_date_time.write(&mut writer)?;
        header.capture_device.write(&mut writer)?;
        write_quality_blocks(&mut writer, &header.quality_blocks)?;

        if certified {
            writer.u8(fit(
                header.certification_blocks.len(),
                "number of certification blocks",
            )?)?;
            for block in &header.certification_blocks {
                writer.u16(block.authority_id)?;
                writer.u8(block.scheme_id)?;
            }
        } else if !header.certification_blocks.is_empty() {
            return Err(BdirError::Validation(
                "certification blocks present but the certification flag is clear".into(),
            ));
        }

        writer.u8(header.finger_position)?;
        writer.u8(header.representation_number)?;
        writer.u8(header.scale_units)?;
        writer.u16(header.capture_sampling_rate_horizontal)?;
        writer.u16(header.capture_sampling_rate_vertical)?;
        writer.u16(header.image_sampling_rate_horizontal)?;
        writer.u16(header.image_sampling_rate_vertical)?;
        writer.u8(header.bit_depth)?;
        writer.u8(header.compression as u8)?;
        writer.u8(header.impression_type)?;
        writer.u16(header.horizontal_line_length)?;
        writer.u16(header.vertical_line_length)?;
        writer.u32(fit(self.body.image_data.len(), "image data length")?)?;
        writer.bytes(&self.body.image_data);

        let mut extended = RecordWriter::new();
        for area in &self.body.extended_data {
            area.write(&mut extended)?;
        }
        let extended = extended.into_inner();
        writer.u16(fit(extended.len(), "extended data length")?)?;
        writer.bytes(&extended);

        frame_representation(writer)
    }
}

/// Decoded finger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerBdir {
    /// General header.
    pub general_header: FingerGeneralHeader,
    /// Representations, in record order.
    pub representations: Vec<FingerRepresentation>,
}

impl FingerBdir {
    fn certified(&self) -> bool {
        self.general_header.certification_flag != 0
    }
}

impl BiometricRecord for FingerBdir {
    const MODALITY: Modality = Modality::Finger;

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = RecordReader::new(bytes, Modality::Finger);
        let prelude = read_prelude(&mut reader, FORMAT_IDENTIFIER, VERSION)?;
        let general_header = FingerGeneralHeader {
            version: prelude.version,
            certification_flag: prelude.certification_flag,
            finger_positions: reader.u8("number of finger positions")?,
        };

        let certified = general_header.certification_flag != 0;
        let representations =
            read_representations(&mut reader, prelude.representation_count, |body| {
                FingerRepresentation::read(body, certified)
            })?;
        reader.finish("end of record")?;

        Ok(Self {
            general_header,
            representations,
        })
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let certified = self.certified();
        let representations = self
            .representations
            .iter()
            .map(|representation| representation.write(certified))
            .collect::<Result<Vec<_>>>()?;

        assemble_record(GENERAL_HEADER_LEN, representations, |writer, length, count| {
            write_prelude(
                writer,
                FORMAT_IDENTIFIER,
                self.general_header.version,
                length,
                count,
                self.general_header.certification_flag,
            )?;
            writer.u8(self.general_header.finger_positions)
        })
    }

    fn header_info(&self) -> HeaderInfo {
        HeaderInfo {
            format_identifier: FORMAT_IDENTIFIER,
            version: self.general_header.version,
            certification_flag: self.general_header.certification_flag,
        }
    }

    fn representations(&self) -> Vec<RepresentationView<'_>> {
        self.representations
            .iter()
            .enumerate()
            .map(|(index, representation)| {
                let header = &representation.header;
                RepresentationView {
                    index,
                    capture_date_time: header.capture_date_time,
                    image: EmbeddedImage {
                        data: &representation.body.image_data,
                        compression: header.compression.compression(),
                        code: header.compression as u8,
                        width: header.horizontal_line_length,
                        height: header.vertical_line_length,
                    },
                }
            })
            .collect()
    }

    fn replace_primary_image(&mut self, data: Vec<u8>, target: TargetFormat) -> Result<()> {
        let representation = self
            .representations
            .first_mut()
            .ok_or_else(|| missing_representation(Modality::Finger))?;
        representation.header.compression = FingerCompression::for_target(target);
        representation.body.image_data = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{finger_record_bytes, FAKE_WSQ};

    #[test]
    fn test_decode_fields() {
        let record = FingerBdir::decode(&finger_record_bytes()).unwrap();
        assert_eq!(record.general_header.certification_flag, 1);
        assert_eq!(record.general_header.finger_positions, 1);

        let representation = &record.representations[0];
        assert_eq!(
            representation.header.certification_blocks,
            vec![CertificationBlock {
                authority_id: 0x0101,
                scheme_id: 0x01
            }]
        );
        assert_eq!(representation.header.finger_position, 2);
        assert_eq!(representation.header.compression, FingerCompression::Wsq);
        assert_eq!(representation.header.horizontal_line_length, 2);
        assert_eq!(representation.body.image_data, FAKE_WSQ);

        let areas = &representation.body.extended_data;
        assert_eq!(areas.len(), 3);
        match &areas[0] {
            ExtendedDataArea::Segmentation(segmentation) => {
                assert_eq!(segmentation.fingers.len(), 1);
                assert_eq!(segmentation.fingers[0].points.len(), 2);
                assert_eq!(segmentation.fingers[0].points[1], SegmentationPoint { x: 1, y: 1 });
            }
            other => panic!("unexpected area: {:?}", other),
        }
        assert_eq!(
            areas[1],
            ExtendedDataArea::Comment {
                text: b"ok".to_vec()
            }
        );
        assert_eq!(areas[2].type_code(), 0x00F0);
    }

    #[test]
    fn test_round_trip() {
        let bytes = finger_record_bytes();
        assert_eq!(FingerBdir::decode(&bytes).unwrap().encode().unwrap(), bytes);
    }

    #[test]
    fn test_uncertified_record_has_no_certification_blocks() {
        let mut record = FingerBdir::decode(&finger_record_bytes()).unwrap();
        record.general_header.certification_flag = 0;
        assert!(record.encode().is_err());

        record.representations[0].header.certification_blocks.clear();
        let encoded = record.encode().unwrap();
        // count byte and one 3-byte block dropped
        assert_eq!(encoded.len(), finger_record_bytes().len() - 4);
        assert_eq!(FingerBdir::decode(&encoded).unwrap(), record);
    }

    #[test]
    fn test_extended_area_overrun_rejected() {
        let mut record = FingerBdir::decode(&finger_record_bytes()).unwrap();
        record.representations[0].body.extended_data.clear();
        let mut bytes = record.encode().unwrap();
        // claim two bytes of extended data that are not there
        let end = bytes.len();
        bytes[end - 2..].copy_from_slice(&2u16.to_be_bytes());
        assert!(matches!(
            FingerBdir::decode(&bytes),
            Err(BdirError::RecordParse {
                modality: Modality::Finger,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_compression_code() {
        assert!(matches!(
            FingerCompression::try_from(7),
            Err(BdirError::UnsupportedCompressionType { code: 7, .. })
        ));
    }

    #[test]
    fn test_replace_primary_image() {
        let mut record = FingerBdir::decode(&finger_record_bytes()).unwrap();
        record.replace_primary_image(vec![9; 4], TargetFormat::Png).unwrap();
        let image = record.primary_image().unwrap();
        assert_eq!(image.code, 6);
        assert_eq!(image.compression, ImageCompression::Png);
        assert_eq!(record.representations[0].body.extended_data.len(), 3);
    }
}
