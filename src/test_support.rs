//! Hand-assembled records and images shared by the unit tests.

use crate::codec::{CodecInfo, ImageCodec, ImageKind};
use crate::error::{BdirError, Result};
use crate::Raster;

/// 10x10 gray 8-bit JPEG 2000 codestream with no decomposition levels and a
/// single empty packet, so every sample decodes to mid-gray.
pub(crate) fn tiny_j2k_codestream() -> Vec<u8> {
    let mut stream = Builder::default()
        // SOC, SIZ
        .u16(0xFF4F)
        .u16(0xFF51)
        .u16(0x0029)
        .u16(0x0000)
        .u32(10)
        .u32(10)
        .u32(0)
        .u32(0)
        .u32(10)
        .u32(10)
        .u32(0)
        .u32(0)
        .u16(1)
        .bytes(&[0x07, 0x01, 0x01])
        // COD: LRCP, one layer, no MCT, 0 levels, 64x64 blocks, 5-3 reversible
        .u16(0xFF52)
        .u16(0x000C)
        .bytes(&[0x00, 0x00])
        .u16(0x0001)
        .bytes(&[0x00, 0x00, 0x04, 0x04, 0x00, 0x01])
        // QCD: no quantization, one subband
        .u16(0xFF5C)
        .u16(0x0004)
        .bytes(&[0x40, 0x48])
        // SOT: tile 0, tile-part length 15
        .u16(0xFF90)
        .u16(0x000A)
        .u16(0x0000)
        .u32(0x0000_000F)
        .bytes(&[0x00, 0x01])
        .0;
    // SOD, empty packet, EOC
    stream.extend_from_slice(&[0xFF, 0x93, 0x00, 0xFF, 0xD9]);
    stream
}

/// [`tiny_j2k_codestream`] wrapped in a minimal JP2 file: signature, file
/// type, header (image header and greyscale colour specification) and codestream boxes.
pub(crate) fn tiny_jp2() -> Vec<u8> {
    let codestream = tiny_j2k_codestream();
    Builder::default()
        .u32(12)
        .bytes(b"jP  ")
        .u32(0x0D0A_870A)
        .u32(20)
        .bytes(b"ftyp")
        .bytes(b"jp2 ")
        .u32(0)
        .bytes(b"jp2 ")
        // jp2h: ihdr (22) + colr (15)
        .u32(8 + 22 + 15)
        .bytes(b"jp2h")
        .u32(22)
        .bytes(b"ihdr")
        .u32(10)
        .u32(10)
        .u16(1)
        .bytes(&[0x07, 0x07, 0x00, 0x00])
        .u32(15)
        .bytes(b"colr")
        .bytes(&[0x01, 0x00, 0x00])
        .u32(17)
        .u32(8 + codestream.len() as u32)
        .bytes(b"jp2c")
        .bytes(&codestream)
        .0
}

/// Container understood by [`FakeWsqCodec`]: WSQ start marker, width and
/// height bytes, gray samples, WSQ end marker.
pub(crate) const FAKE_WSQ: &[u8] = &[0xFF, 0xA0, 0x02, 0x02, 10, 20, 30, 40, 0xFF, 0xA1];

/// Stand-in WSQ decoder for [`FAKE_WSQ`]-shaped buffers.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FakeWsqCodec;

impl ImageCodec for FakeWsqCodec {
    fn info(&self) -> CodecInfo {
        CodecInfo {
            name: "WSQ (test)",
            kind: ImageKind::Wsq,
            lossless: false,
            can_decode: true,
            can_encode: false,
        }
    }

    fn decode(&self, data: &[u8]) -> Result<Raster> {
        let fail = |cause: &str| BdirError::ImageDecode {
            kind: ImageKind::Wsq,
            cause: cause.to_string(),
        };
        if data.len() < 6 || !data.starts_with(&[0xFF, 0xA0]) || !data.ends_with(&[0xFF, 0xA1]) {
            return Err(fail("missing markers"));
        }
        let (width, height) = (data[2] as u32, data[3] as u32);
        let samples = &data[4..data.len() - 2];
        if width == 0 || height == 0 || samples.len() != (width * height) as usize {
            return Err(fail("bad geometry"));
        }
        Ok(Raster::gray(width, height, samples.to_vec()))
    }
}

#[derive(Default)]
struct Builder(Vec<u8>);

impl Builder {
    fn u8(mut self, value: u8) -> Self {
        self.0.push(value);
        self
    }

    fn u16(mut self, value: u16) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn u24(mut self, value: u32) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes()[1..]);
        self
    }

    fn u32(mut self, value: u32) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn bytes(mut self, data: &[u8]) -> Self {
        self.0.extend_from_slice(data);
        self
    }

    /// 2023-06-15 10:30:45.123, device and one quality block.
    fn capture_prefix(self) -> Self {
        self.u16(2023)
            .u8(6)
            .u8(15)
            .u8(10)
            .u8(30)
            .u8(45)
            .u16(123)
            // capture device
            .u8(1)
            .u16(0x0101)
            .u16(0x0002)
            // one quality block
            .u8(1)
            .u8(80)
            .u16(0x0101)
            .u16(0x0001)
    }
}

/// Wrap representation bodies in a general header. `header_tail` starts
/// with the certification flag.
fn record(format: &[u8; 4], version: &[u8; 4], header_tail: &[u8], bodies: &[Vec<u8>]) -> Vec<u8> {
    let header_len = 14 + header_tail.len();
    let length = header_len + bodies.iter().map(|body| body.len() + 4).sum::<usize>();

    let mut builder = Builder::default()
        .bytes(format)
        .bytes(version)
        .u32(length as u32)
        .u16(bodies.len() as u16)
        .bytes(header_tail);
    for body in bodies {
        builder = builder.u32(body.len() as u32 + 4).bytes(body);
    }
    builder.0
}

/// Face record with one 10x10 JPEG 2000 lossless representation and two landmarks.
pub(crate) fn face_record_bytes() -> Vec<u8> {
    face_record_with_representations(1)
}

/// Face record repeating the [`face_record_bytes`] representation `count`
/// times, each with its own expression mask.
pub(crate) fn face_record_with_representations(count: u16) -> Vec<u8> {
    let bodies: Vec<Vec<u8>> = (0..count)
        .map(|index| face_representation_body(1 << index))
        .collect();
    record(b"FAC\0", b"030\0", &[0x00, 0x00, 0x00], &bodies)
}

fn face_representation_body(expression_mask: u16) -> Vec<u8> {
    let image = tiny_j2k_codestream();
    Builder::default()
        .capture_prefix()
        // landmark count
        .u16(2)
        // facial information
        .u8(1)
        .u8(1)
        .u8(1)
        .u8(170)
        .u24(0x000102)
        .u16(expression_mask)
        .bytes(&[0, 0, 0, 0, 0, 0])
        // landmarks
        .bytes(&[1, 0x11])
        .u16(30)
        .u16(40)
        .u16(0)
        .bytes(&[1, 0x12])
        .u16(60)
        .u16(40)
        .u16(0)
        // image information: basic, JPEG 2000 lossless, 10x10
        .u8(1)
        .u8(2)
        .u16(10)
        .u16(10)
        .u8(0)
        .u16(0)
        .u8(0)
        .u8(1)
        .u32(image.len() as u32)
        .bytes(&image)
        .0
}

/// Iris record with one 10x10 mono JPEG 2000 representation, lossy history.
pub(crate) fn iris_record_bytes() -> Vec<u8> {
    let image = tiny_j2k_codestream();
    let body = Builder::default()
        .capture_prefix()
        // representation number, eye label, image type
        .u16(1)
        .u8(1)
        .u8(2)
        // mono JPEG 2000; orientation 1/1, reserved 0b10, history lossy
        .u8(0x12)
        .u8(0xA5)
        .u16(10)
        .u16(10)
        .u8(8)
        // range, roll, roll uncertainty
        .u16(100)
        .u16(0)
        .u16(0)
        // iris centre and diameter
        .u16(4)
        .u16(6)
        .u16(4)
        .u16(6)
        .u16(7)
        .u16(9)
        .u32(image.len() as u32)
        .bytes(&image)
        .0;

    record(b"IIR\0", b"020\0", &[0x00, 0x01], &[body])
}

/// Certified finger record with one 2x2 WSQ representation and three
/// extended data areas (segmentation, comment, vendor).
pub(crate) fn finger_record_bytes() -> Vec<u8> {
    let segmentation = Builder::default()
        .u16(0x0101)
        .u16(0x0001)
        .u8(1)
        .u8(2)
        .u8(2)
        .u16(0)
        .u16(0)
        .u16(1)
        .u16(1)
        .0;
    let extended = Builder::default()
        .u16(0x0001)
        .u16(segmentation.len() as u16)
        .bytes(&segmentation)
        .u16(0x0003)
        .u16(2)
        .bytes(b"ok")
        .u16(0x00F0)
        .u16(3)
        .bytes(&[1, 2, 3])
        .0;

    let body = Builder::default()
        .capture_prefix()
        // one certification block
        .u8(1)
        .u16(0x0101)
        .u8(0x01)
        // position, representation number, scale units
        .u8(2)
        .u8(0)
        .u8(1)
        // sampling rates
        .u16(500)
        .u16(500)
        .u16(500)
        .u16(500)
        // bit depth, WSQ, impression
        .u8(8)
        .u8(2)
        .u8(0)
        .u16(2)
        .u16(2)
        .u32(FAKE_WSQ.len() as u32)
        .bytes(FAKE_WSQ)
        .u16(extended.len() as u16)
        .bytes(&extended)
        .0;

    record(b"FIR\0", b"020\0", &[0x01, 0x01], &[body])
}
