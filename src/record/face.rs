//! ISO/IEC 19794-5:2011 face image records.

use serde::Serialize;

use crate::config::{Modality, TargetFormat};
use crate::error::{BdirError, Result};

use super::{
    assemble_record, fit, frame_representation, missing_representation, read_image_data,
    read_prelude, read_quality_blocks, read_representations, write_prelude, write_quality_blocks,
    BiometricRecord, CaptureDateTime, CaptureDevice, EmbeddedImage, HeaderInfo, ImageCompression,
    QualityBlock, RecordReader, RecordWriter, RepresentationView,
};

/// `FAC\0`
pub const FORMAT_IDENTIFIER: u32 = 0x4641_4300;
/// `030\0`
pub const VERSION: u32 = 0x3033_3000;

const GENERAL_HEADER_LEN: usize = 17;

/// Face image kinds at or above this value carry 3D blocks.
const FIRST_3D_IMAGE_KIND: u8 = 0x80;

/// Face image data type (compression) codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum FaceImageDataType {
    /// Baseline JPEG.
    Jpeg = 0x00,
    /// JPEG 2000, lossy.
    Jpeg2000Lossy = 0x01,
    /// JPEG 2000, lossless.
    Jpeg2000Lossless = 0x02,
    /// PNG.
    Png = 0x03,
}

impl FaceImageDataType {
    /// Generic compression class.
    pub fn compression(&self) -> ImageCompression {
        match self {
            FaceImageDataType::Jpeg => ImageCompression::Jpeg,
            FaceImageDataType::Jpeg2000Lossy => ImageCompression::Jpeg2000Lossy,
            FaceImageDataType::Jpeg2000Lossless => ImageCompression::Jpeg2000Lossless,
            FaceImageDataType::Png => ImageCompression::Png,
        }
    }

    /// Code recorded for a transcoded image.
    pub fn for_target(target: TargetFormat) -> Self {
        match target {
            TargetFormat::Jpeg => FaceImageDataType::Jpeg,
            TargetFormat::Png => FaceImageDataType::Png,
        }
    }
}

impl TryFrom<u8> for FaceImageDataType {
    type Error = BdirError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(FaceImageDataType::Jpeg),
            0x01 => Ok(FaceImageDataType::Jpeg2000Lossy),
            0x02 => Ok(FaceImageDataType::Jpeg2000Lossless),
            0x03 => Ok(FaceImageDataType::Png),
            _ => Err(BdirError::UnsupportedCompressionType {
                modality: Modality::Face,
                code,
            }),
        }
    }
}

/// Face general header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaceGeneralHeader {
    /// Version number (`030\0`).
    pub version: u32,
    /// Certification flag.
    pub certification_flag: u8,
    /// Temporal semantics of the representation sequence.
    pub temporal_semantics: u16,
}

/// Facial information block (15 bytes, landmark count excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FacialInformation {
    /// Gender code.
    pub gender: u8,
    /// Eye colour code.
    pub eye_colour: u8,
    /// Hair colour code.
    pub hair_colour: u8,
    /// Subject height in cm.
    pub subject_height: u8,
    /// Property mask (24 bits).
    pub property_mask: u32,
    /// Expression mask.
    pub expression_mask: u16,
    /// Pose angle yaw, pitch, roll.
    pub pose_angle: [u8; 3],
    /// Pose angle uncertainty yaw, pitch, roll.
    pub pose_angle_uncertainty: [u8; 3],
}

impl FacialInformation {
    fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
        Ok(Self {
            gender: reader.u8("gender")?,
            eye_colour: reader.u8("eye colour")?,
            hair_colour: reader.u8("hair colour")?,
            subject_height: reader.u8("subject height")?,
            property_mask: reader.u24("property mask")?,
            expression_mask: reader.u16("expression mask")?,
            pose_angle: [
                reader.u8("pose angle yaw")?,
                reader.u8("pose angle pitch")?,
                reader.u8("pose angle roll")?,
            ],
            pose_angle_uncertainty: [
                reader.u8("pose angle uncertainty yaw")?,
                reader.u8("pose angle uncertainty pitch")?,
                reader.u8("pose angle uncertainty roll")?,
            ],
        })
    }

    fn write(&self, writer: &mut RecordWriter) -> Result<()> {
        writer.u8(self.gender)?;
        writer.u8(self.eye_colour)?;
        writer.u8(self.hair_colour)?;
        writer.u8(self.subject_height)?;
        writer.u24(self.property_mask)?;
        writer.u16(self.expression_mask)?;
        for value in self.pose_angle.iter().chain(&self.pose_angle_uncertainty) {
            writer.u8(*value)?;
        }
        Ok(())
    }
}

/// Landmark point (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LandmarkPoint {
    /// Landmark point type.
    pub landmark_type: u8,
    /// Landmark point code.
    pub code: u8,
    /// X coordinate.
    pub x: u16,
    /// Y coordinate.
    pub y: u16,
    /// Z coordinate.
    pub z: u16,
}

/// Image information block (11 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaceImageInformation {
    /// Face image kind (basic, full frontal, token frontal).
    pub face_image_kind: u8,
    /// Compression of the image data.
    pub image_data_type: FaceImageDataType,
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
    /// Spatial sampling rate level.
    pub spatial_sampling_rate_level: u8,
    /// Post-acquisition processing bit field.
    pub post_acquisition_processing: u16,
    /// Cross reference.
    pub cross_reference: u8,
    /// Image colour space.
    pub image_colour_space: u8,
}

impl FaceImageInformation {
    fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
        let kind_offset = reader.offset();
        let face_image_kind = reader.u8("face image kind")?;
        if face_image_kind >= FIRST_3D_IMAGE_KIND {
            return Err(BdirError::parse(
                Modality::Face,
                kind_offset,
                format!("2D face image kind (found {:#04x})", face_image_kind),
            ));
        }
        let image_data_type = FaceImageDataType::try_from(reader.u8("image data type")?)?;
        let width_offset = reader.offset();
        let width = reader.u16("image width")?;
        let height = reader.u16("image height")?;
        if width == 0 || height == 0 {
            return Err(BdirError::parse(
                Modality::Face,
                width_offset,
                format!("non-zero image dimensions (found {}x{})", width, height),
            ));
        }

        Ok(Self {
            face_image_kind,
            image_data_type,
            width,
            height,
            spatial_sampling_rate_level: reader.u8("spatial sampling rate level")?,
            post_acquisition_processing: reader.u16("post-acquisition processing")?,
            cross_reference: reader.u8("cross reference")?,
            image_colour_space: reader.u8("image colour space")?,
        })
    }

    fn write(&self, writer: &mut RecordWriter) -> Result<()> {
        writer.u8(self.face_image_kind)?;
        writer.u8(self.image_data_type as u8)?;
        writer.u16(self.width)?;
        writer.u16(self.height)?;
        writer.u8(self.spatial_sampling_rate_level)?;
        writer.u16(self.post_acquisition_processing)?;
        writer.u8(self.cross_reference)?;
        writer.u8(self.image_colour_space)
    }
}

/// Face representation header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaceRepresentationHeader {
    /// Capture date and time.
    pub capture_date_time: CaptureDateTime,
    /// Capture device identifiers.
    pub capture_device: CaptureDevice,
    /// Quality blocks.
    pub quality_blocks: Vec<QualityBlock>,
    /// Facial information.
    pub facial_information: FacialInformation,
    /// Landmark points.
    pub landmark_points: Vec<LandmarkPoint>,
    /// Image information.
    pub image_information: FaceImageInformation,
}

/// Face representation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaceRepresentationData {
    /// Embedded image bytes.
    #[serde(rename = "image_data_length", serialize_with = "super::serialize_len")]
    pub image_data: Vec<u8>,
}

/// One face sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaceRepresentation {
    /// Header fields.
    pub header: FaceRepresentationHeader,
    /// Image payload.
    pub data: FaceRepresentationData,
}

impl FaceRepresentation {
    fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
        let capture_date_time = CaptureDateTime::read(reader)?;
        let capture_device = CaptureDevice::read(reader)?;
        let quality_blocks = read_quality_blocks(reader)?;
        let landmark_count = reader.u16("number of landmark points")?;
        let facial_information = FacialInformation::read(reader)?;
        let landmark_points = (0..landmark_count)
            .map(|_| {
                Ok(LandmarkPoint {
                    landmark_type: reader.u8("landmark point type")?,
                    code: reader.u8("landmark point code")?,
                    x: reader.u16("landmark x")?,
                    y: reader.u16("landmark y")?,
                    z: reader.u16("landmark z")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let image_information = FaceImageInformation::read(reader)?;
        let image_data = read_image_data(reader, 0)?;

        Ok(Self {
            header: FaceRepresentationHeader {
                capture_date_time,
                capture_device,
                quality_blocks,
                facial_information,
                landmark_points,
                image_information,
            },
            data: FaceRepresentationData { image_data },
        })
    }

    fn write(&self) -> Result<Vec<u8>> {
        let header = &self.header;
        let mut writer = RecordWriter::new();
        header.capture_date_time.write(&mut writer)?;
        header.capture_device.write(&mut writer)?;
        write_quality_blocks(&mut writer, &header.quality_blocks)?;
        writer.u16(fit(header.landmark_points.len(), "number of landmark points")?)?;
        header.facial_information.write(&mut writer)?;
        for point in &header.landmark_points {
            writer.u8(point.landmark_type)?;
            writer.u8(point.code)?;
            writer.u16(point.x)?;
            writer.u16(point.y)?;
            writer.u16(point.z)?;
        }
        header.image_information.write(&mut writer)?;
        writer.u32(fit(self.data.image_data.len(), "image data length")?)?;
        writer.bytes(&self.data.image_data);
        frame_representation(writer)
    }
}

/// Decoded face record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaceBdir {
    /// General header.
    pub general_header: FaceGeneralHeader,
    /// Representations, in record order.
    pub representations: Vec<FaceRepresentation>,
}

impl BiometricRecord for FaceBdir {
    const MODALITY: Modality = Modality::Face;

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = RecordReader::new(bytes, Modality::Face);
        let prelude = read_prelude(&mut reader, FORMAT_IDENTIFIER, VERSION)?;
        let general_header = FaceGeneralHeader {
            version: prelude.version,
            certification_flag: prelude.certification_flag,
            temporal_semantics: reader.u16("temporal semantics")?,
        };

        let representations =
            read_representations(&mut reader, prelude.representation_count, FaceRepresentation::read)?;
        reader.finish("end of record")?;

        Ok(Self {
            general_header,
            representations,
        })
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let representations = self
            .representations
            .iter()
            .map(FaceRepresentation::write)
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
            writer.u16(self.general_header.temporal_semantics)
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
                let info = &representation.header.image_information;
                RepresentationView {
                    index,
                    capture_date_time: representation.header.capture_date_time,
                    image: EmbeddedImage {
                        data: &representation.data.image_data,
                        compression: info.image_data_type.compression(),
                        code: info.image_data_type as u8,
                        width: info.width,
                        height: info.height,
                    },
                }
            })
            .collect()
    }

    fn replace_primary_image(&mut self, data: Vec<u8>, target: TargetFormat) -> Result<()> {
        let representation = self
            .representations
            .first_mut()
            .ok_or_else(|| missing_representation(Modality::Face))?;
        representation.header.image_information.image_data_type =
            FaceImageDataType::for_target(target);
        representation.data.image_data = data;
        Ok(())
    }
}
