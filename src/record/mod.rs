//! ISO/IEC 19794 biometric data interchange records (BDIR).
//!
//! Each modality has its own field catalogue (`face`, `iris`, `finger`),
//! but all three share the same shape: a general header followed by one or
//! more length-prefixed representations, each carrying one embedded image.
//!
//! Decoding walks `Unparsed -> HeaderParsed -> RepresentationsParsed -> Decoded`
//! and either returns a complete record or a `RecordParse` error; there is no
//! partially populated result. Encoding recomputes every count and length
//! field from content.

pub mod face;
pub mod finger;
mod io;
pub mod iris;

pub use face::FaceBdir;
pub use finger::FingerBdir;
pub use iris::IrisBdir;

use serde::Serialize;

use crate::codec::ImageKind;
use crate::config::{Modality, TargetFormat};
use crate::error::{BdirError, Result};
use crate::validation;

pub(crate) use io::{fit, RecordReader, RecordWriter};

/// Capture date and time (9 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureDateTime {
    /// Year (1-65535).
    pub year: u16,
    /// Month (1-12).
    pub month: u8,
    /// Day (1-31).
    pub day: u8,
    /// Hour (0-23).
    pub hour: u8,
    /// Minute (0-59).
    pub minute: u8,
    /// Second (0-59).
    pub second: u8,
    /// Millisecond (0-999).
    pub millisecond: u16,
}

impl CaptureDateTime {
    pub(crate) fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
        Ok(Self {
            year: reader.u16("capture year")?,
            month: reader.u8("capture month")?,
            day: reader.u8("capture day")?,
            hour: reader.u8("capture hour")?,
            minute: reader.u8("capture minute")?,
            second: reader.u8("capture second")?,
            millisecond: reader.u16("capture millisecond")?,
        })
    }

    pub(crate) fn write(&self, writer: &mut RecordWriter) -> Result<()> {
        writer.u16(self.year)?;
        writer.u8(self.month)?;
        writer.u8(self.day)?;
        writer.u8(self.hour)?;
        writer.u8(self.minute)?;
        writer.u8(self.second)?;
        writer.u16(self.millisecond)
    }

    /// Check every field against its range.
    pub fn is_valid(&self) -> bool {
        validation::is_valid_capture_date_time(
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.millisecond,
        )
    }
}

impl std::fmt::Display for CaptureDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.millisecond
        )
    }
}

/// Capture device identifiers (5 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureDevice {
    /// Capture device technology identifier.
    pub technology_id: u8,
    /// Registered vendor identifier.
    pub vendor_id: u16,
    /// Vendor-assigned device type identifier.
    pub type_id: u16,
}

impl CaptureDevice {
    pub(crate) fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
        Ok(Self {
            technology_id: reader.u8("capture device technology identifier")?,
            vendor_id: reader.u16("capture device vendor identifier")?,
            type_id: reader.u16("capture device type identifier")?,
        })
    }

    pub(crate) fn write(&self, writer: &mut RecordWriter) -> Result<()> {
        writer.u8(self.technology_id)?;
        writer.u16(self.vendor_id)?;
        writer.u16(self.type_id)
    }
}

/// One quality block (5 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityBlock {
    /// Quality score (0-100, 255 for failed attempt).
    pub score: u8,
    /// Quality algorithm vendor identifier.
    pub algorithm_vendor_id: u16,
    /// Quality algorithm identifier.
    pub algorithm_id: u16,
}

pub(crate) fn read_quality_blocks(reader: &mut RecordReader<'_>) -> Result<Vec<QualityBlock>> {
    let count = reader.u8("number of quality blocks")?;
    (0..count)
        .map(|_| {
            Ok(QualityBlock {
                score: reader.u8("quality score")?,
                algorithm_vendor_id: reader.u16("quality algorithm vendor identifier")?,
                algorithm_id: reader.u16("quality algorithm identifier")?,
            })
        })
        .collect()
}

pub(crate) fn write_quality_blocks(writer: &mut RecordWriter, blocks: &[QualityBlock]) -> Result<()> {
    writer.u8(fit(blocks.len(), "number of quality blocks")?)?;
    for block in blocks {
        writer.u8(block.score)?;
        writer.u16(block.algorithm_vendor_id)?;
        writer.u16(block.algorithm_id)?;
    }
    Ok(())
}

/// Fields every general header starts with.
pub(crate) struct Prelude {
    pub version: u32,
    pub representation_count: u16,
    pub certification_flag: u8,
}

/// Read format identifier, version, record length, representation count and
/// certification flag, checking them against the modality and buffer.
pub(crate) fn read_prelude(
    reader: &mut RecordReader<'_>,
    format_identifier: u32,
    version: u32,
) -> Result<Prelude> {
    let start = reader.offset();
    if reader.u32("format identifier")? != format_identifier {
        return Err(BdirError::parse(
            reader.modality(),
            start,
            format!("format identifier {}", fourcc(format_identifier)),
        ));
    }

    let version_offset = reader.offset();
    let found_version = reader.u32("version number")?;
    if found_version != version {
        return Err(BdirError::parse(
            reader.modality(),
            version_offset,
            format!(
                "version {} (found {})",
                fourcc(version),
                fourcc(found_version)
            ),
        ));
    }

    let length_offset = reader.offset();
    let record_length = reader.u32("record length")?;
    if record_length as usize != reader.len() {
        return Err(BdirError::parse(
            reader.modality(),
            length_offset,
            format!(
                "record length {} matching the {} bytes supplied",
                record_length,
                reader.len()
            ),
        ));
    }

    Ok(Prelude {
        version: found_version,
        representation_count: reader.u16("number of representations")?,
        certification_flag: reader.u8("certification flag")?,
    })
}

/// Write the shared header prefix.
pub(crate) fn write_prelude(
    writer: &mut RecordWriter,
    format_identifier: u32,
    version: u32,
    record_length: usize,
    representation_count: usize,
    certification_flag: u8,
) -> Result<()> {
    writer.u32(format_identifier)?;
    writer.u32(version)?;
    writer.u32(fit(record_length, "record length")?)?;
    writer.u16(fit(representation_count, "number of representations")?)?;
    writer.u8(certification_flag)
}

/// Render a four-character code such as `FAC\0` as text.
pub fn fourcc(value: u32) -> String {
    value
        .to_be_bytes()
        .iter()
        .filter(|&&b| b != 0)
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
        .collect()
}

/// Read `count` length-prefixed representations.
///
/// Each representation is parsed from a sub-reader bounded by its declared
/// length and must consume it exactly.
pub(crate) fn read_representations<'a, T>(
    reader: &mut RecordReader<'a>,
    count: u16,
    mut read_one: impl FnMut(&mut RecordReader<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut representations = Vec::with_capacity(count as usize);
    for index in 0..count {
        let length = reader.u32("representation length")? as usize;
        if length < 4 {
            return Err(reader.error(format!(
                "representation {} length of at least 4 bytes (found {})",
                index, length
            )));
        }
        let mut body = reader.sub_reader(length - 4, "representation body")?;
        let representation = read_one(&mut body)?;
        body.finish("end of representation")?;
        representations.push(representation);
    }
    Ok(representations)
}

/// Write a representation body behind its recomputed length.
pub(crate) fn frame_representation(body: RecordWriter) -> Result<Vec<u8>> {
    let body = body.into_inner();
    let mut writer = RecordWriter::new();
    writer.u32(fit(body.len() + 4, "representation length")?)?;
    writer.bytes(&body);
    Ok(writer.into_inner())
}

/// Read an image length field and take the image bytes.
///
/// When the image is the last field of the representation, `trailing` is 0
/// and the declared length must match the bytes that remain exactly.
pub(crate) fn read_image_data(reader: &mut RecordReader<'_>, trailing: usize) -> Result<Vec<u8>> {
    let length_offset = reader.offset();
    let declared = reader.u32("image data length")?;
    let available = reader.remaining().saturating_sub(trailing);

    if trailing == 0 {
        let window = reader.bytes(available, "image data")?;
        if !validation::is_valid_image_data_length(window, declared) {
            return Err(BdirError::parse(
                reader.modality(),
                length_offset,
                format!(
                    "image data length {} matching the {} bytes present",
                    declared, available
                ),
            ));
        }
        return Ok(window.to_vec());
    }

    if declared as usize > available {
        return Err(BdirError::parse(
            reader.modality(),
            length_offset,
            format!(
                "image data length {} within the {} bytes present",
                declared, available
            ),
        ));
    }
    Ok(reader.bytes(declared as usize, "image data")?.to_vec())
}

/// Assemble header and framed representations into a record.
pub(crate) fn assemble_record(
    header_len: usize,
    representations: Vec<Vec<u8>>,
    write_header: impl FnOnce(&mut RecordWriter, usize, usize) -> Result<()>,
) -> Result<Vec<u8>> {
    let record_length = header_len + representations.iter().map(Vec::len).sum::<usize>();
    let mut writer = RecordWriter::new();
    write_header(&mut writer, record_length, representations.len())?;
    if writer.len() != header_len {
        return Err(BdirError::Validation(format!(
            "general header of {} bytes written where {} were declared",
            writer.len(),
            header_len
        )));
    }
    for representation in &representations {
        writer.bytes(representation);
    }
    Ok(writer.into_inner())
}

/// Compression of an embedded image, across the three modality enumerations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageCompression {
    /// Uncompressed samples.
    Raw,
    /// Uncompressed, bit-packed samples.
    RawBitPacked,
    /// WSQ.
    Wsq,
    /// Baseline JPEG (lossy).
    Jpeg,
    /// JPEG-LS.
    JpegLs,
    /// JPEG 2000, lossy.
    Jpeg2000Lossy,
    /// JPEG 2000, lossless.
    Jpeg2000Lossless,
    /// PNG.
    Png,
}

impl ImageCompression {
    /// Short label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            ImageCompression::Raw => "RAW",
            ImageCompression::RawBitPacked => "RAW_BIT_PACKED",
            ImageCompression::Wsq => "WSQ",
            ImageCompression::Jpeg => "JPEG_LOSSY",
            ImageCompression::JpegLs => "JPEG_LS",
            ImageCompression::Jpeg2000Lossy => "JPEG2000_LOSSY",
            ImageCompression::Jpeg2000Lossless => "JPEG2000_LOSSLESS",
            ImageCompression::Png => "PNG",
        }
    }

    /// Container format of the image bytes, when the transcoder knows it.
    pub fn image_kind(&self) -> Option<ImageKind> {
        match self {
            ImageCompression::Wsq => Some(ImageKind::Wsq),
            ImageCompression::Jpeg => Some(ImageKind::Jpeg),
            ImageCompression::Jpeg2000Lossy | ImageCompression::Jpeg2000Lossless => {
                Some(ImageKind::Jpeg2000)
            }
            ImageCompression::Png => Some(ImageKind::Png),
            ImageCompression::Raw | ImageCompression::RawBitPacked | ImageCompression::JpegLs => {
                None
            }
        }
    }
}

impl std::fmt::Display for ImageCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Borrowed view of a representation's image payload and declared metadata.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedImage<'a> {
    /// Image bytes.
    pub data: &'a [u8],
    /// Declared compression.
    pub compression: ImageCompression,
    /// Declared compression code, as stored in the record.
    pub code: u8,
    /// Declared width in pixels.
    pub width: u16,
    /// Declared height in pixels.
    pub height: u16,
}

/// Borrowed view of one representation, as seen by validation and reports.
#[derive(Debug, Clone, Copy)]
pub struct RepresentationView<'a> {
    /// Position of the representation within the record.
    pub index: usize,
    /// Capture date and time.
    pub capture_date_time: CaptureDateTime,
    /// Embedded image.
    pub image: EmbeddedImage<'a>,
}

/// Header fields shared by the three modalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    /// Format identifier.
    pub format_identifier: u32,
    /// Version number.
    pub version: u32,
    /// Certification flag.
    pub certification_flag: u8,
}

/// Decode/encode capability implemented once per modality.
pub trait BiometricRecord: Sized {
    /// Modality handled by the implementation.
    const MODALITY: Modality;

    /// Decode a complete record.
    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Encode the record, recomputing counts and lengths.
    fn encode(&self) -> Result<Vec<u8>>;

    /// Shared header fields.
    fn header_info(&self) -> HeaderInfo;

    /// Views over every representation, in record order.
    fn representations(&self) -> Vec<RepresentationView<'_>>;

    /// Swap the first representation's image for one in the target format,
    /// updating the compression code (and any compression-derived fields).
    fn replace_primary_image(&mut self, data: Vec<u8>, target: TargetFormat) -> Result<()>;

    /// First representation's image, if any.
    fn primary_image(&self) -> Option<EmbeddedImage<'_>> {
        self.representations().first().map(|view| view.image)
    }
}

pub(crate) fn missing_representation(modality: Modality) -> BdirError {
    BdirError::Validation(format!("{} record has no representation", modality))
}

/// Decoded record of any modality.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "modality")]
pub enum Bdir {
    /// Face record.
    Face(FaceBdir),
    /// Iris record.
    Iris(IrisBdir),
    /// Finger record.
    Finger(FingerBdir),
}

impl Bdir {
    /// Decode a record with the codec selected by `modality`.
    pub fn decode(modality: Modality, bytes: &[u8]) -> Result<Self> {
        let record = match modality {
            Modality::Face => Bdir::Face(FaceBdir::decode(bytes)?),
            Modality::Iris => Bdir::Iris(IrisBdir::decode(bytes)?),
            Modality::Finger => Bdir::Finger(FingerBdir::decode(bytes)?),
            Modality::UnSpecified => {
                return Err(BdirError::InputContract(
                    "a modality must be specified to decode a record".into(),
                ))
            }
        };
        log::debug!(
            "Decoded {} record: {} bytes, {} representation(s)",
            modality,
            bytes.len(),
            record.representations().len()
        );
        Ok(record)
    }

    /// Encode with the codec of the record's modality.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Bdir::Face(record) => record.encode(),
            Bdir::Iris(record) => record.encode(),
            Bdir::Finger(record) => record.encode(),
        }
    }

    /// Modality of the record.
    pub fn modality(&self) -> Modality {
        match self {
            Bdir::Face(_) => Modality::Face,
            Bdir::Iris(_) => Modality::Iris,
            Bdir::Finger(_) => Modality::Finger,
        }
    }

    /// Shared header fields.
    pub fn header_info(&self) -> HeaderInfo {
        match self {
            Bdir::Face(record) => record.header_info(),
            Bdir::Iris(record) => record.header_info(),
            Bdir::Finger(record) => record.header_info(),
        }
    }

    /// Views over every representation.
    pub fn representations(&self) -> Vec<RepresentationView<'_>> {
        match self {
            Bdir::Face(record) => record.representations(),
            Bdir::Iris(record) => record.representations(),
            Bdir::Finger(record) => record.representations(),
        }
    }

    /// First representation's image, if any.
    pub fn primary_image(&self) -> Option<EmbeddedImage<'_>> {
        match self {
            Bdir::Face(record) => record.primary_image(),
            Bdir::Iris(record) => record.primary_image(),
            Bdir::Finger(record) => record.primary_image(),
        }
    }

    /// Swap the first representation's image.
    pub fn replace_primary_image(&mut self, data: Vec<u8>, target: TargetFormat) -> Result<()> {
        match self {
            Bdir::Face(record) => record.replace_primary_image(data, target),
            Bdir::Iris(record) => record.replace_primary_image(data, target),
            Bdir::Finger(record) => record.replace_primary_image(data, target),
        }
    }

    /// Serialisable overview of the record.
    pub fn summary(&self) -> RecordSummary {
        let header = self.header_info();
        RecordSummary {
            modality: self.modality(),
            format_identifier: fourcc(header.format_identifier),
            version: fourcc(header.version),
            certification_flag: header.certification_flag,
            representations: self
                .representations()
                .iter()
                .map(|view| RepresentationSummary {
                    index: view.index,
                    capture_date_time: view.capture_date_time.to_string(),
                    compression: view.image.compression,
                    compression_code: view.image.code,
                    width: view.image.width,
                    height: view.image.height,
                    image_length: view.image.data.len(),
                })
                .collect(),
        }
    }
}

/// Overview of a decoded record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    /// Record modality.
    pub modality: Modality,
    /// Format identifier as text.
    pub format_identifier: String,
    /// Version as text.
    pub version: String,
    /// Certification flag.
    pub certification_flag: u8,
    /// One entry per representation.
    pub representations: Vec<RepresentationSummary>,
}

/// Overview of one representation.
#[derive(Debug, Clone, Serialize)]
pub struct RepresentationSummary {
    /// Position within the record.
    pub index: usize,
    /// Capture date and time, ISO 8601 style.
    pub capture_date_time: String,
    /// Declared compression.
    pub compression: ImageCompression,
    /// Declared compression code.
    pub compression_code: u8,
    /// Declared width.
    pub width: u16,
    /// Declared height.
    pub height: u16,
    /// Image size in bytes.
    pub image_length: usize,
}

/// Serialise image bytes as their length in reports.
pub(crate) fn serialize_len<T: AsRef<[u8]>, S: serde::Serializer>(
    data: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(data.as_ref().len() as u64)
}
