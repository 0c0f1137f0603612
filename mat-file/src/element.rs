//! Data element tags and the element level reader.

use crate::{array::Scalar, common::*, header::Endian};

/// Data types of level 5 data elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int8 = 1,
    UInt8 = 2,
    Int16 = 3,
    UInt16 = 4,
    Int32 = 5,
    UInt32 = 6,
    Single = 7,
    Double = 9,
    Int64 = 12,
    UInt64 = 13,
    Matrix = 14,
    Compressed = 15,
    Utf8 = 16,
    Utf16 = 17,
    Utf32 = 18,
}

impl DataType {
    pub fn from_code(code: u32) -> Result<Self> {
        let data_type = match code {
            1 => Self::Int8,
            2 => Self::UInt8,
            3 => Self::Int16,
            4 => Self::UInt16,
            5 => Self::Int32,
            6 => Self::UInt32,
            7 => Self::Single,
            9 => Self::Double,
            12 => Self::Int64,
            13 => Self::UInt64,
            14 => Self::Matrix,
            15 => Self::Compressed,
            16 => Self::Utf8,
            17 => Self::Utf16,
            18 => Self::Utf32,
            _ => bail!("unknown data element type {}", code),
        };
        Ok(data_type)
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// The size of one value, or `None` for container types.
    pub fn value_size(self) -> Option<usize> {
        let size = match self {
            Self::Int8 | Self::UInt8 | Self::Utf8 => 1,
            Self::Int16 | Self::UInt16 | Self::Utf16 => 2,
            Self::Int32 | Self::UInt32 | Self::Single | Self::Utf32 => 4,
            Self::Int64 | Self::UInt64 | Self::Double => 8,
            Self::Matrix | Self::Compressed => return None,
        };
        Some(size)
    }

    /// Decodes every value of an element body.
    pub(crate) fn decode<'a>(
        self,
        data: &'a [u8],
        endian: Endian,
    ) -> Result<impl Iterator<Item = Scalar> + 'a> {
        let size = self
            .value_size()
            .ok_or_else(|| format_err!("{:?} elements do not hold plain values", self))?;
        ensure!(
            data.len() % size == 0,
            "{} bytes is not a multiple of the {:?} value size",
            data.len(),
            self
        );

        let values = data.chunks_exact(size).map(move |chunk| match self {
            Self::Int8 => Scalar::Int(chunk[0] as i8 as i64),
            Self::UInt8 | Self::Utf8 => Scalar::UInt(chunk[0] as u64),
            Self::Int16 => Scalar::Int(endian.read_i16(chunk) as i64),
            Self::UInt16 | Self::Utf16 => Scalar::UInt(endian.read_u16(chunk) as u64),
            Self::Int32 => Scalar::Int(endian.read_i32(chunk) as i64),
            Self::UInt32 | Self::Utf32 => Scalar::UInt(endian.read_u32(chunk) as u64),
            Self::Int64 => Scalar::Int(endian.read_i64(chunk)),
            Self::UInt64 => Scalar::UInt(endian.read_u64(chunk)),
            Self::Single => Scalar::Float(endian.read_f32(chunk) as f64),
            Self::Double => Scalar::Float(endian.read_f64(chunk)),
            Self::Matrix | Self::Compressed => unreachable!(),
        });
        Ok(values)
    }

    /// Encodes one value in this type, casting as needed.
    pub(crate) fn encode(self, writer: &mut Vec<u8>, value: Scalar, endian: Endian) -> Result<()> {
        match self {
            Self::Int8 => writer.push(value.to_i64() as i8 as u8),
            Self::UInt8 | Self::Utf8 => writer.push(value.to_u64() as u8),
            Self::Int16 => endian.write_i16(writer, value.to_i64() as i16)?,
            Self::UInt16 | Self::Utf16 => endian.write_u16(writer, value.to_u64() as u16)?,
            Self::Int32 => endian.write_i32(writer, value.to_i64() as i32)?,
            Self::UInt32 | Self::Utf32 => endian.write_u32(writer, value.to_u64() as u32)?,
            Self::Int64 => endian.write_i64(writer, value.to_i64())?,
            Self::UInt64 => endian.write_u64(writer, value.to_u64())?,
            Self::Single => endian.write_f32(writer, value.to_f64() as f32)?,
            Self::Double => endian.write_f64(writer, value.to_f64())?,
            Self::Matrix | Self::Compressed => {
                bail!("{:?} elements do not hold plain values", self)
            }
        }
        Ok(())
    }
}

/// One data element, borrowing its body from the underlying buffer.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    pub data_type: DataType,
    pub data: &'a [u8],
}

/// Walks a sequence of tagged data elements.
#[derive(Debug, Clone)]
pub struct ElementReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    endian: Endian,
}

impl<'a> ElementReader<'a> {
    pub fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Self {
            bytes,
            offset: 0,
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    /// Number of bytes not consumed yet.
    pub fn remaining_len(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    pub fn next_element(&mut self) -> Result<Element<'a>> {
        let bytes = self.bytes;
        let offset = self.offset;
        let remaining = &bytes[offset.min(bytes.len())..];
        ensure!(
            remaining.len() >= 8,
            "truncated data element tag at offset {}",
            offset
        );

        let first = self.endian.read_u32(&remaining[0..4]);
        let small_size = (first >> 16) as usize;

        // small data element format packs the tag and up to 4 bytes into 8 bytes
        if small_size != 0 {
            ensure!(
                small_size <= 4,
                "small data element at offset {} claims {} bytes",
                offset,
                small_size
            );
            let data_type = DataType::from_code(first & 0xffff)?;
            self.offset += 8;
            return Ok(Element {
                data_type,
                data: &remaining[4..(4 + small_size)],
            });
        }

        let data_type = DataType::from_code(first)?;
        let num_bytes = self.endian.read_u32(&remaining[4..8]) as usize;
        ensure!(
            remaining.len() - 8 >= num_bytes,
            "data element at offset {} claims {} bytes, but only {} bytes remain",
            offset,
            num_bytes,
            remaining.len() - 8
        );

        // compressed elements are not padded
        let consumed = match data_type {
            DataType::Compressed => num_bytes,
            _ => padded_len(num_bytes),
        };
        self.offset += 8 + consumed;

        Ok(Element {
            data_type,
            data: &remaining[8..(8 + num_bytes)],
        })
    }

    /// Reads the next element and checks that it has one of the expected types.
    pub fn next_of(&mut self, expected: &[DataType]) -> Result<Element<'a>> {
        let element = self.next_element()?;
        ensure!(
            expected.contains(&element.data_type),
            "expect one of {:?} data element, but found {:?}",
            expected,
            element.data_type
        );
        Ok(element)
    }
}

/// Rounds a body size up to the 8-byte element alignment.
pub fn padded_len(len: usize) -> usize {
    (len + 7) / 8 * 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_regular_and_small_elements() {
        let bytes = [
            // regular int32 element with two values
            5, 0, 0, 0, 8, 0, 0, 0, 1, 0, 0, 0, 0xfe, 0xff, 0xff, 0xff,
            // small int8 element with three values
            1, 0, 3, 0, b'a', b'b', b'c', 0,
            // regular uint8 element with one padded value
            2, 0, 0, 0, 1, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0,
        ];
        let mut reader = ElementReader::new(&bytes, Endian::Little);

        let element = reader.next_element().unwrap();
        assert_eq!(element.data_type, DataType::Int32);
        let values: Vec<_> = element
            .data_type
            .decode(element.data, Endian::Little)
            .unwrap()
            .map(Scalar::to_i64)
            .collect();
        assert_eq!(values, [1, -2]);

        let element = reader.next_element().unwrap();
        assert_eq!(element.data_type, DataType::Int8);
        assert_eq!(element.data, b"abc");

        let element = reader.next_of(&[DataType::UInt8]).unwrap();
        assert_eq!(element.data, [7]);
        assert!(reader.is_empty());
    }

    #[test]
    fn reject_truncated_element() {
        let bytes = [9, 0, 0, 0, 16, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut reader = ElementReader::new(&bytes, Endian::Little);
        assert!(reader.next_element().is_err());
    }

    #[test]
    fn big_endian_small_element() {
        let bytes = [0, 4, 0, 5, 0, 0, 0, 42];
        let mut reader = ElementReader::new(&bytes, Endian::Big);
        let element = reader.next_element().unwrap();
        assert_eq!(element.data_type, DataType::Int32);
        let values: Vec<_> = element
            .data_type
            .decode(element.data, Endian::Big)
            .unwrap()
            .map(Scalar::to_i64)
            .collect();
        assert_eq!(values, [42]);
    }
}
