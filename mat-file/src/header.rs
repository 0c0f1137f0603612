//! The 128-byte MAT-file header and byte order handling.

use crate::common::*;

/// The size of the level 5 MAT-file header in bytes.
pub const HEADER_SIZE: usize = 128;

/// The only header version level 5 files carry.
pub const VERSION: u16 = 0x0100;

const TEXT_SIZE: usize = 116;
const SUBSYS_OFFSET_SIZE: usize = 8;
const HDF5_VERSION: u16 = 0x0200;

/// Byte order of the data elements in a MAT-file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

macro_rules! endian_read {
    ($($name:ident -> $ty:ty),* $(,)?) => {
        $(
            pub fn $name(self, buf: &[u8]) -> $ty {
                match self {
                    Self::Little => LittleEndian::$name(buf),
                    Self::Big => BigEndian::$name(buf),
                }
            }
        )*
    };
}

macro_rules! endian_write {
    ($($name:ident($ty:ty)),* $(,)?) => {
        $(
            pub fn $name(self, writer: &mut impl Write, value: $ty) -> Result<()> {
                match self {
                    Self::Little => writer.$name::<LittleEndian>(value)?,
                    Self::Big => writer.$name::<BigEndian>(value)?,
                }
                Ok(())
            }
        )*
    };
}

impl Endian {
    endian_read! {
        read_u16 -> u16,
        read_i16 -> i16,
        read_u32 -> u32,
        read_i32 -> i32,
        read_u64 -> u64,
        read_i64 -> i64,
        read_f32 -> f32,
        read_f64 -> f64,
    }

    endian_write! {
        write_u16(u16),
        write_i16(i16),
        write_u32(u32),
        write_i32(i32),
        write_u64(u64),
        write_i64(i64),
        write_f32(f32),
        write_f64(f64),
    }

    /// The two indicator characters stored at the end of the header.
    pub fn indicator(self) -> [u8; 2] {
        match self {
            Self::Little => *b"IM",
            Self::Big => *b"MI",
        }
    }
}

/// The MAT-file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Human readable description, with trailing padding removed.
    pub text: String,
    pub subsys_offset: [u8; SUBSYS_OFFSET_SIZE],
    pub version: u16,
    pub endian: Endian,
}

impl Header {
    pub fn new(text: impl Into<String>, endian: Endian) -> Self {
        Self {
            text: text.into(),
            subsys_offset: [0; SUBSYS_OFFSET_SIZE],
            version: VERSION,
            endian,
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= HEADER_SIZE,
            "not a level 5 MAT-file: expect at least {} bytes, but found {}",
            HEADER_SIZE,
            bytes.len()
        );

        let text = String::from_utf8_lossy(&bytes[..TEXT_SIZE])
            .trim_end_matches(|c| c == ' ' || c == '\0')
            .to_string();
        ensure!(
            !text.starts_with("MATLAB 7.3"),
            "MATLAB 7.3 MAT-files are HDF5 containers and are not supported"
        );

        let endian = match &bytes[126..128] {
            b"IM" => Endian::Little,
            b"MI" => Endian::Big,
            other => bail!(
                "not a level 5 MAT-file: invalid endian indicator {:?}",
                other
            ),
        };

        let version = endian.read_u16(&bytes[124..126]);
        ensure!(
            version != HDF5_VERSION,
            "MATLAB 7.3 MAT-files are HDF5 containers and are not supported"
        );
        if version != VERSION {
            warn!("unexpected MAT-file version {:#06x}", version);
        }

        let mut subsys_offset = [0; SUBSYS_OFFSET_SIZE];
        subsys_offset.copy_from_slice(&bytes[TEXT_SIZE..(TEXT_SIZE + SUBSYS_OFFSET_SIZE)]);

        Ok(Self {
            text,
            subsys_offset,
            version,
            endian,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let text = self.text.as_bytes();
        ensure!(
            text.len() <= TEXT_SIZE,
            "header text exceeds {} bytes",
            TEXT_SIZE
        );

        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.extend_from_slice(text);
        bytes.resize(TEXT_SIZE, b' ');
        bytes.extend_from_slice(&self.subsys_offset);
        self.endian.write_u16(&mut bytes, self.version)?;
        bytes.extend_from_slice(&self.endian.indicator());
        Ok(bytes)
    }
}
