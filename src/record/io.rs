//! Bounded big-endian reader and writer for record fields.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::config::Modality;
use crate::error::{BdirError, Result};

/// Reads big-endian fields from a byte window, tracking the absolute offset
/// for error reports. A reader never reads past the end of its window.
#[derive(Debug)]
pub(crate) struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
    modality: Modality,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(data: &'a [u8], modality: Modality) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
            modality,
        }
    }

    /// Absolute offset of the next unread byte.
    pub(crate) fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn modality(&self) -> Modality {
        self.modality
    }

    pub(crate) fn error(&self, expected: impl Into<String>) -> BdirError {
        BdirError::parse(self.modality, self.offset(), expected)
    }

    fn read<T>(
        &mut self,
        width: usize,
        field: &str,
        read: impl FnOnce(&mut &'a [u8]) -> std::io::Result<T>,
    ) -> Result<T> {
        let data: &'a [u8] = self.data;
        let mut window = &data[self.pos..];
        let value = read(&mut window).map_err(|_| self.error(field))?;
        self.pos += width;
        Ok(value)
    }

    pub(crate) fn u8(&mut self, field: &str) -> Result<u8> {
        self.read(1, field, |r| r.read_u8())
    }

    pub(crate) fn u16(&mut self, field: &str) -> Result<u16> {
        self.read(2, field, |r| r.read_u16::<BigEndian>())
    }

    pub(crate) fn u24(&mut self, field: &str) -> Result<u32> {
        self.read(3, field, |r| r.read_u24::<BigEndian>())
    }

    pub(crate) fn u32(&mut self, field: &str) -> Result<u32> {
        self.read(4, field, |r| r.read_u32::<BigEndian>())
    }

    pub(crate) fn bytes(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.error(format!(
                "{} ({} bytes, {} available)",
                field,
                len,
                self.remaining()
            )));
        }
        let data: &'a [u8] = self.data;
        let slice = &data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Split off the next `len` bytes as an independent reader.
    pub(crate) fn sub_reader(&mut self, len: usize, field: &str) -> Result<RecordReader<'a>> {
        let base = self.offset();
        let data = self.bytes(len, field)?;
        Ok(RecordReader {
            data,
            pos: 0,
            base,
            modality: self.modality,
        })
    }

    /// Fail unless every byte of the window was consumed.
    pub(crate) fn finish(&self, context: &str) -> Result<()> {
        if self.remaining() != 0 {
            return Err(self.error(format!(
                "{} ({} unconsumed bytes)",
                context,
                self.remaining()
            )));
        }
        Ok(())
    }
}

/// Writes big-endian fields into a growable buffer.
#[derive(Debug, Default)]
pub(crate) struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn u8(&mut self, value: u8) -> Result<()> {
        self.buf.write_u8(value)?;
        Ok(())
    }

    pub(crate) fn u16(&mut self, value: u16) -> Result<()> {
        self.buf.write_u16::<BigEndian>(value)?;
        Ok(())
    }

    pub(crate) fn u24(&mut self, value: u32) -> Result<()> {
        self.buf.write_u24::<BigEndian>(value)?;
        Ok(())
    }

    pub(crate) fn u32(&mut self, value: u32) -> Result<()> {
        self.buf.write_u32::<BigEndian>(value)?;
        Ok(())
    }

    pub(crate) fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Narrow a computed count or length to its field width.
pub(crate) fn fit<T: TryFrom<usize>>(value: usize, field: &str) -> Result<T> {
    T::try_from(value).map_err(|_| {
        BdirError::Validation(format!("{} of {} does not fit its field", field, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_reports_absolute_offsets() {
        let data = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05];
        let mut reader = RecordReader::new(&data, Modality::Face);
        assert_eq!(reader.u16("first").unwrap(), 0x0001);

        let mut sub = reader.sub_reader(3, "window").unwrap();
        assert_eq!(sub.u16("inside").unwrap(), 0x0203);
        match sub.u16("past window").unwrap_err() {
            BdirError::RecordParse { offset, expected, modality } => {
                assert_eq!(offset, 4);
                assert_eq!(expected, "past window");
                assert_eq!(modality, Modality::Face);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_reader_bytes_bounded() {
        let data = [1u8, 2, 3];
        let mut reader = RecordReader::new(&data, Modality::Iris);
        assert!(reader.bytes(4, "image data").is_err());
        assert_eq!(reader.bytes(3, "image data").unwrap(), &data);
        assert!(reader.finish("end").is_ok());
    }

    #[test]
    fn test_writer_big_endian() {
        let mut writer = RecordWriter::new();
        writer.u16(0x0102).unwrap();
        writer.u24(0x030405).unwrap();
        writer.u32(0x06070809).unwrap();
        assert_eq!(writer.into_inner(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_fit() {
        assert_eq!(fit::<u8>(255, "count").unwrap(), 255u8);
        assert!(fit::<u8>(256, "count").is_err());
    }
}
