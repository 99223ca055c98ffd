//! ISO/IEC 19794-6:2011 iris image records.

use serde::Serialize;

use crate::config::{Modality, TargetFormat};
use crate::error::{BdirError, Result};

use super::{
    assemble_record, fit, frame_representation, missing_representation, read_image_data,
    read_prelude, read_quality_blocks, read_representations, write_prelude, write_quality_blocks,
    BiometricRecord, CaptureDateTime, CaptureDevice, EmbeddedImage, HeaderInfo, ImageCompression,
    QualityBlock, RecordReader, RecordWriter, RepresentationView,
};

/// `IIR\0`
pub const FORMAT_IDENTIFIER: u32 = 0x4949_5200;
/// `020\0`
pub const VERSION: u32 = 0x3032_3000;

const GENERAL_HEADER_LEN: usize = 16;

/// Iris image format codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum IrisImageFormat {
    /// Monochrome, uncompressed.
    MonoRaw = 0x02,
    /// RGB, uncompressed.
    RgbRaw = 0x04,
    /// Monochrome JPEG.
    MonoJpeg = 0x06,
    /// RGB JPEG.
    RgbJpeg = 0x08,
    /// Monochrome JPEG-LS.
    MonoJpegLs = 0x0A,
    /// RGB JPEG-LS.
    RgbJpegLs = 0x0C,
    /// Monochrome PNG.
    MonoPng = 0x0E,
    /// RGB PNG.
    RgbPng = 0x10,
    /// Monochrome JPEG 2000.
    MonoJpeg2000 = 0x12,
    /// RGB JPEG 2000.
    RgbJpeg2000 = 0x14,
}

impl IrisImageFormat {
    /// Whether the format carries colour samples.
    pub fn is_rgb(&self) -> bool {
        matches!(
            self,
            IrisImageFormat::RgbRaw
                | IrisImageFormat::RgbJpeg
                | IrisImageFormat::RgbJpegLs
                | IrisImageFormat::RgbPng
                | IrisImageFormat::RgbJpeg2000
        )
    }

    /// Same colour family, re-encoded to `target`.
    pub fn for_target(&self, target: TargetFormat) -> Self {
        match (self.is_rgb(), target) {
            (false, TargetFormat::Jpeg) => IrisImageFormat::MonoJpeg,
            (true, TargetFormat::Jpeg) => IrisImageFormat::RgbJpeg,
            (false, TargetFormat::Png) => IrisImageFormat::MonoPng,
            (true, TargetFormat::Png) => IrisImageFormat::RgbPng,
        }
    }

    /// Generic compression class. JPEG 2000 is split on the compression history.
    pub fn compression(&self, history: CompressionHistory) -> ImageCompression {
        match self {
            IrisImageFormat::MonoRaw | IrisImageFormat::RgbRaw => ImageCompression::Raw,
            IrisImageFormat::MonoJpeg | IrisImageFormat::RgbJpeg => ImageCompression::Jpeg,
            IrisImageFormat::MonoJpegLs | IrisImageFormat::RgbJpegLs => ImageCompression::JpegLs,
            IrisImageFormat::MonoPng | IrisImageFormat::RgbPng => ImageCompression::Png,
            IrisImageFormat::MonoJpeg2000 | IrisImageFormat::RgbJpeg2000 => match history {
                CompressionHistory::LosslessOrNone => ImageCompression::Jpeg2000Lossless,
                _ => ImageCompression::Jpeg2000Lossy,
            },
        }
    }
}

impl TryFrom<u8> for IrisImageFormat {
    type Error = BdirError;

    fn try_from(code: u8) -> Result<Self> {
        Ok(match code {
            0x02 => IrisImageFormat::MonoRaw,
            0x04 => IrisImageFormat::RgbRaw,
            0x06 => IrisImageFormat::MonoJpeg,
            0x08 => IrisImageFormat::RgbJpeg,
            0x0A => IrisImageFormat::MonoJpegLs,
            0x0C => IrisImageFormat::RgbJpegLs,
            0x0E => IrisImageFormat::MonoPng,
            0x10 => IrisImageFormat::RgbPng,
            0x12 => IrisImageFormat::MonoJpeg2000,
            0x14 => IrisImageFormat::RgbJpeg2000,
            _ => {
                return Err(BdirError::UnsupportedCompressionType {
                    modality: Modality::Iris,
                    code,
                })
            }
        })
    }
}

/// Compression history (image properties bits 6-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompressionHistory {
    /// Not recorded.
    Undefined,
    /// Lossless compression or none.
    LosslessOrNone,
    /// Lossy compression.
    Lossy,
    /// Reserved value 3.
    Reserved,
}

impl CompressionHistory {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => CompressionHistory::Undefined,
            1 => CompressionHistory::LosslessOrNone,
            2 => CompressionHistory::Lossy,
            _ => CompressionHistory::Reserved,
        }
    }

    fn bits(&self) -> u8 {
        match self {
            CompressionHistory::Undefined => 0,
            CompressionHistory::LosslessOrNone => 1,
            CompressionHistory::Lossy => 2,
            CompressionHistory::Reserved => 3,
        }
    }

    /// History of an image transcoded to `target`. A lossy past survives a
    /// lossless target.
    fn after_transcode(self, target: TargetFormat) -> Self {
        if target.is_lossless() && self != CompressionHistory::Lossy {
            CompressionHistory::LosslessOrNone
        } else {
            CompressionHistory::Lossy
        }
    }
}

/// Image properties bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IrisImageProperties {
    /// Horizontal orientation (bits 0-1).
    pub horizontal_orientation: u8,
    /// Vertical orientation (bits 2-3).
    pub vertical_orientation: u8,
    /// Reserved bits 4-5, kept as read.
    pub reserved: u8,
    /// Compression history (bits 6-7).
    pub compression_history: CompressionHistory,
}

impl IrisImageProperties {
    /// Split a properties byte into its fields.
    pub fn from_byte(byte: u8) -> Self {
        Self {
            horizontal_orientation: byte & 0b11,
            vertical_orientation: (byte >> 2) & 0b11,
            reserved: (byte >> 4) & 0b11,
            compression_history: CompressionHistory::from_bits(byte >> 6),
        }
    }

    /// Pack the fields back into one byte.
    pub fn to_byte(&self) -> u8 {
        (self.horizontal_orientation & 0b11)
            | (self.vertical_orientation & 0b11) << 2
            | (self.reserved & 0b11) << 4
            | self.compression_history.bits() << 6
    }
}

/// Iris general header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IrisGeneralHeader {
    /// Version number (`020\0`).
    pub version: u32,
    /// Certification flag.
    pub certification_flag: u8,
    /// Number of eyes represented.
    pub eyes_represented: u8,
}

/// Iris geometry fields following the image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IrisGeometry {
    /// Camera-to-subject range.
    pub range: u16,
    /// Roll angle of the eye.
    pub roll_angle: u16,
    /// Roll angle uncertainty.
    pub roll_angle_uncertainty: u16,
    /// Iris centre smallest X.
    pub centre_smallest_x: u16,
    /// Iris centre largest X.
    pub centre_largest_x: u16,
    /// Iris centre smallest Y.
    pub centre_smallest_y: u16,
    /// Iris centre largest Y.
    pub centre_largest_y: u16,
    /// Smallest iris diameter.
    pub diameter_smallest: u16,
    /// Largest iris diameter.
    pub diameter_largest: u16,
}

impl IrisGeometry {
    fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
        Ok(Self {
            range: reader.u16("range")?,
            roll_angle: reader.u16("roll angle")?,
            roll_angle_uncertainty: reader.u16("roll angle uncertainty")?,
            centre_smallest_x: reader.u16("iris centre smallest x")?,
            centre_largest_x: reader.u16("iris centre largest x")?,
            centre_smallest_y: reader.u16("iris centre smallest y")?,
            centre_largest_y: reader.u16("iris centre largest y")?,
            diameter_smallest: reader.u16("iris diameter smallest")?,
            diameter_largest: reader.u16("iris diameter largest")?,
        })
    }

    fn write(&self, writer: &mut RecordWriter) -> Result<()> {
        for value in [
            self.range,
            self.roll_angle,
            self.roll_angle_uncertainty,
            self.centre_smallest_x,
            self.centre_largest_x,
            self.centre_smallest_y,
            self.centre_largest_y,
            self.diameter_smallest,
            self.diameter_largest,
        ] {
            writer.u16(value)?;
        }
        Ok(())
    }
}

/// Iris representation header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IrisRepresentationHeader {
    /// Capture date and time.
    pub capture_date_time: CaptureDateTime,
    /// Capture device identifiers.
    pub capture_device: CaptureDevice,
    /// Quality blocks.
    pub quality_blocks: Vec<QualityBlock>,
    /// Representation number.
    pub representation_number: u16,
    /// Eye label.
    pub eye_label: u8,
    /// Image type (uncropped, VGA, cropped, cropped and masked).
    pub image_type: u8,
    /// Image format.
    pub image_format: IrisImageFormat,
    /// Image properties.
    pub image_properties: IrisImageProperties,
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
    /// Bits per pixel.
    pub bit_depth: u8,
    /// Range, roll and iris location.
    pub geometry: IrisGeometry,
}

/// Iris representation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IrisRepresentationData {
    /// Embedded image bytes.
    #[serde(rename = "image_data_length", serialize_with = "super::serialize_len")]
    pub image_data: Vec<u8>,
}

/// One iris sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IrisRepresentation {
    /// Header fields.
    pub header: IrisRepresentationHeader,
    /// Image payload.
    pub data: IrisRepresentationData,
}

impl IrisRepresentation {
    fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
        let capture_date_time = CaptureDateTime::read(reader)?;
        let capture_device = CaptureDevice::read(reader)?;
        let quality_blocks = read_quality_blocks(reader)?;
        let representation_number = reader.u16("representation number")?;
        let eye_label = reader.u8("eye label")?;
        let image_type = reader.u8("image type")?;
        let image_format = IrisImageFormat::try_from(reader.u8("image format")?)?;
        let image_properties = IrisImageProperties::from_byte(reader.u8("image properties")?);

        let width_offset = reader.offset();
        let width = reader.u16("image width")?;
        let height = reader.u16("image height")?;
        if width == 0 || height == 0 {
            return Err(BdirError::parse(
                Modality::Iris,
                width_offset,
                format!("non-zero image dimensions (found {}x{})", width, height),
            ));
        }
        let bit_depth = reader.u8("bit depth")?;
        let geometry = IrisGeometry::read(reader)?;
        let image_data = read_image_data(reader, 0)?;

        Ok(Self {
            header: IrisRepresentationHeader {
                capture_date_time,
                capture_device,
                quality_blocks,
                representation_number,
                eye_label,
                image_type,
                image_format,
                image_properties,
                width,
                height,
                bit_depth,
                geometry,
            },
            data: IrisRepresentationData { image_data },
        })
    }

    fn write(&self) -> Result<Vec<u8>> {
        let header = &self.header;
        let mut writer = RecordWriter::new();
        header.capture_date_time.write(&mut writer)?;
        header.capture_device.write(&mut writer)?;
        write_quality_blocks(&mut writer, &header.quality_blocks)?;
        writer.u16(header.representation_number)?;
        writer.u8(header.eye_label)?;
        writer.u8(header.image_type)?;
        writer.u8(header.image_format as u8)?;
        writer.u8(header.image_properties.to_byte())?;
        writer.u16(header.width)?;
        writer.u16(header.height)?;
        writer.u8(header.bit_depth)?;
        header.geometry.write(&mut writer)?;
        writer.u32(fit(self.data.image_data.len(), "image data length")?)?;
        writer.bytes(&self.data.image_data);
        frame_representation(writer)
    }
}

/// Decoded iris record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IrisBdir {
    /// General header.
    pub general_header: IrisGeneralHeader,
    /// Representations, in record order.
    pub representations: Vec<IrisRepresentation>,
}

impl BiometricRecord for IrisBdir {
    const MODALITY: Modality = Modality::Iris;

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = RecordReader::new(bytes, Modality::Iris);
        let prelude = read_prelude(&mut reader, FORMAT_IDENTIFIER, VERSION)?;
        let general_header = IrisGeneralHeader {
            version: prelude.version,
            certification_flag: prelude.certification_flag,
            eyes_represented: reader.u8("number of eyes represented")?,
        };

        let representations =
            read_representations(&mut reader, prelude.representation_count, IrisRepresentation::read)?;
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
            .map(IrisRepresentation::write)
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
            writer.u8(self.general_header.eyes_represented)
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
                        data: &representation.data.image_data,
                        compression: header
                            .image_format
                            .compression(header.image_properties.compression_history),
                        code: header.image_format as u8,
                        width: header.width,
                        height: header.height,
                    },
                }
            })
            .collect()
    }

    fn replace_primary_image(&mut self, data: Vec<u8>, target: TargetFormat) -> Result<()> {
        let representation = self
            .representations
            .first_mut()
            .ok_or_else(|| missing_representation(Modality::Iris))?;
        let header = &mut representation.header;
        header.image_format = header.image_format.for_target(target);
        header.image_properties.compression_history =
            header.image_properties.compression_history.after_transcode(target);
        representation.data.image_data = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::iris_record_bytes;

    // representation starts after the 16-byte header and its 4-byte length
    const FORMAT_OFFSET: usize = 16 + 4 + 9 + 5 + 1 + 5 + 2 + 1 + 1;

    #[test]
    fn test_decode_fields() {
        let record = IrisBdir::decode(&iris_record_bytes()).unwrap();
        assert_eq!(record.general_header.eyes_represented, 1);

        let header = &record.representations[0].header;
        assert_eq!(header.image_format, IrisImageFormat::MonoJpeg2000);
        assert_eq!(header.image_properties.horizontal_orientation, 1);
        assert_eq!(header.image_properties.vertical_orientation, 1);
        assert_eq!(header.image_properties.reserved, 0b10);
        assert_eq!(
            header.image_properties.compression_history,
            CompressionHistory::Lossy
        );
        assert_eq!((header.width, header.height), (10, 10));
        assert_eq!(header.geometry.diameter_largest, 9);

        let image = record.primary_image().unwrap();
        assert_eq!(image.compression, ImageCompression::Jpeg2000Lossy);
        assert_eq!(image.code, 0x12);
    }

    #[test]
    fn test_properties_byte_is_preserved() {
        for byte in [0x00u8, 0x25, 0x65, 0xFF] {
            assert_eq!(IrisImageProperties::from_byte(byte).to_byte(), byte);
        }
    }

    #[test]
    fn test_round_trip() {
        let bytes = iris_record_bytes();
        assert_eq!(IrisBdir::decode(&bytes).unwrap().encode().unwrap(), bytes);
    }

    #[test]
    fn test_unknown_image_format() {
        let mut bytes = iris_record_bytes();
        assert_eq!(bytes[FORMAT_OFFSET], IrisImageFormat::MonoJpeg2000 as u8);
        bytes[FORMAT_OFFSET] = 0x03;
        assert!(matches!(
            IrisBdir::decode(&bytes),
            Err(BdirError::UnsupportedCompressionType {
                modality: Modality::Iris,
                code: 0x03
            })
        ));
    }

    #[test]
    fn test_zero_width_rejected() {
        let mut bytes = iris_record_bytes();
        bytes[FORMAT_OFFSET + 2] = 0;
        bytes[FORMAT_OFFSET + 3] = 0;
        assert!(matches!(
            IrisBdir::decode(&bytes),
            Err(BdirError::RecordParse { offset, .. }) if offset == FORMAT_OFFSET + 2
        ));
    }

    #[test]
    fn test_replace_keeps_family_and_updates_history() {
        let mut record = IrisBdir::decode(&iris_record_bytes()).unwrap();
        record.representations[0].header.image_properties.compression_history =
            CompressionHistory::LosslessOrNone;
        record.replace_primary_image(vec![1, 2, 3], TargetFormat::Png).unwrap();
        let header = &record.representations[0].header;
        assert_eq!(header.image_format, IrisImageFormat::MonoPng);
        assert_eq!(
            header.image_properties.compression_history,
            CompressionHistory::LosslessOrNone
        );
        assert_eq!(header.image_properties.reserved, 0b10);

        record.replace_primary_image(vec![4], TargetFormat::Jpeg).unwrap();
        let header = &record.representations[0].header;
        assert_eq!(header.image_format, IrisImageFormat::MonoJpeg);
        assert_eq!(header.image_properties.compression_history, CompressionHistory::Lossy);
    }

    #[test]
    fn test_lossy_history_survives_png() {
        let mut record = IrisBdir::decode(&iris_record_bytes()).unwrap();
        assert_eq!(
            record.representations[0].header.image_properties.compression_history,
            CompressionHistory::Lossy
        );
        record.replace_primary_image(vec![1, 2, 3], TargetFormat::Png).unwrap();

        let decoded = IrisBdir::decode(&record.encode().unwrap()).unwrap();
        let header = &decoded.representations[0].header;
        assert_eq!(header.image_format, IrisImageFormat::MonoPng);
        assert_eq!(header.image_properties.compression_history, CompressionHistory::Lossy);
    }

    #[test]
    fn test_rgb_family() {
        assert_eq!(
            IrisImageFormat::RgbJpeg2000.for_target(TargetFormat::Jpeg),
            IrisImageFormat::RgbJpeg
        );
        assert_eq!(
            IrisImageFormat::RgbRaw.for_target(TargetFormat::Png),
            IrisImageFormat::RgbPng
        );
    }
}
