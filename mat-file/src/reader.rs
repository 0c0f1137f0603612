use crate::{
    array::{checked_numel, Array, ArrayClass, ArrayData, Numbers},
    common::*,
    element::{DataType, Element, ElementReader},
    header::{Endian, Header, HEADER_SIZE},
};
use flate2::read::ZlibDecoder;

pub(crate) const FLAG_COMPLEX: u32 = 0x0800;
pub(crate) const FLAG_LOGICAL: u32 = 0x0200;

/// A parsed level 5 MAT-file.
#[derive(Debug, Clone)]
pub struct MatFile {
    pub header: Header,
    /// Variables in file order.
    pub variables: IndexMap<String, Array>,
}

impl MatFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read MAT-file '{}'", path.display()))?;
        Self::from_bytes(&bytes)
            .with_context(|| format!("failed to parse MAT-file '{}'", path.display()))
    }

    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut bytes = vec![];
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = Header::parse(bytes)?;
        let endian = header.endian;
        let mut reader = ElementReader::new(&bytes[HEADER_SIZE..], endian);
        let mut variables = IndexMap::new();

        while !reader.is_empty() {
            let element = reader.next_element()?;
            let array = match element.data_type {
                DataType::Compressed => {
                    let inflated = inflate(element.data)?;
                    let mut inner = ElementReader::new(&inflated, endian);
                    let element = inner.next_of(&[DataType::Matrix])?;
                    parse_matrix(element, endian)?
                }
                DataType::Matrix => parse_matrix(element, endian)?,
                data_type => {
                    warn!("ignore top level {:?} data element", data_type);
                    continue;
                }
            };
            debug!(
                "loaded variable '{}' of {:?} class with dimensions {:?}",
                array.name,
                array.class(),
                array.dims
            );

            if variables.contains_key(&array.name) {
                warn!("variable '{}' appears more than once", array.name);
            }
            variables.insert(array.name.clone(), array);
        }

        Ok(Self { header, variables })
    }

    pub fn get(&self, name: &str) -> Option<&Array> {
        self.variables.get(name)
    }

    /// Like [MatFile::get], but a missing variable is an error.
    pub fn variable(&self, name: &str) -> Result<&Array> {
        self.variables
            .get(name)
            .ok_or_else(|| format_err!("the variable '{}' does not exist", name))
    }

    pub fn remove(&mut self, name: &str) -> Result<Array> {
        self.variables
            .shift_remove(name)
            .ok_or_else(|| format_err!("the variable '{}' does not exist", name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut inflated = vec![];
    ZlibDecoder::new(data)
        .read_to_end(&mut inflated)
        .context("failed to decompress data element")?;
    Ok(inflated)
}

fn parse_matrix(element: Element<'_>, endian: Endian) -> Result<Array> {
    // MATLAB writes [] in a cell as a matrix element without a body
    if element.data.is_empty() {
        return Ok(Array::empty());
    }

    let mut reader = ElementReader::new(element.data, endian);

    let (class, complex, logical) = {
        let flags = reader
            .next_of(&[DataType::UInt32])
            .context("failed to read array flags")?;
        ensure!(
            flags.data.len() == 8,
            "array flags must be 8 bytes, but found {}",
            flags.data.len()
        );
        let word = endian.read_u32(&flags.data[0..4]);
        let class = ArrayClass::from_code((word & 0xff) as u8)?;
        (
            class,
            word & FLAG_COMPLEX != 0,
            word & FLAG_LOGICAL != 0,
        )
    };

    let dims: Vec<usize> = {
        let element = reader
            .next_of(&[DataType::Int32])
            .context("failed to read array dimensions")?;
        element
            .data_type
            .decode(element.data, endian)?
            .map(|dim| {
                let dim = dim.to_i64();
                ensure!(dim >= 0, "negative array dimension {}", dim);
                Ok(dim as usize)
            })
            .collect::<Result<_>>()?
    };
    let numel = checked_numel(&dims)?;

    let name = {
        let element = reader
            .next_of(&[DataType::Int8, DataType::UInt8])
            .context("failed to read array name")?;
        String::from_utf8(element.data.to_vec()).context("array name is not valid UTF-8")?
    };

    let data = match class {
        ArrayClass::Cell => {
            ensure_fits(numel, &reader, &dims)?;
            let elements: Vec<_> = (0..numel)
                .map(|index| {
                    let element = reader.next_of(&[DataType::Matrix])?;
                    parse_matrix(element, endian)
                        .with_context(|| format!("failed to read cell element {}", index))
                })
                .collect::<Result<_>>()?;
            ArrayData::Cell(elements)
        }
        ArrayClass::Struct => {
            let name_len = {
                let element = reader.next_of(&[DataType::Int32])?;
                let len = element
                    .data_type
                    .decode(element.data, endian)?
                    .next()
                    .ok_or_else(|| format_err!("missing struct field name length"))?
                    .to_i64();
                ensure!(len >= 0, "negative struct field name length {}", len);
                len as usize
            };
            let names = reader.next_of(&[DataType::Int8, DataType::UInt8])?;

            let fields: Vec<String> = if name_len == 0 {
                vec![]
            } else {
                ensure!(
                    names.data.len() % name_len == 0,
                    "struct field names of {} bytes do not divide into {} byte chunks",
                    names.data.len(),
                    name_len
                );
                names
                    .data
                    .chunks(name_len)
                    .map(|chunk| {
                        let end = chunk.iter().position(|&byte| byte == 0).unwrap_or(chunk.len());
                        String::from_utf8(chunk[..end].to_vec())
                            .context("struct field name is not valid UTF-8")
                    })
                    .collect::<Result<_>>()?
            };

            let num_values = numel
                .checked_mul(fields.len())
                .ok_or_else(|| format_err!("too many fields for dimensions {:?}", dims))?;
            ensure_fits(num_values, &reader, &dims)?;
            let values: Vec<_> = (0..num_values)
                .map(|index| {
                    let element = reader.next_of(&[DataType::Matrix])?;
                    parse_matrix(element, endian).with_context(|| {
                        format!(
                            "failed to read field '{}' of struct element {}",
                            fields[index % fields.len()],
                            index / fields.len()
                        )
                    })
                })
                .collect::<Result<_>>()?;

            ArrayData::Struct { fields, values }
        }
        ArrayClass::Char => {
            let element = reader.next_element().context("failed to read char data")?;
            let units = decode_chars(element, endian)?;
            ensure!(
                units.len() == numel,
                "char array with dimensions {:?} holds {} characters",
                dims,
                units.len()
            );
            ArrayData::Char(units)
        }
        class => {
            let kind = class
                .number_kind()
                .ok_or_else(|| format_err!("{:?} arrays are not supported", class))?;
            ensure!(!complex, "complex arrays are not supported");

            let element = reader
                .next_element()
                .context("failed to read the real part")?;
            let values = Numbers::from_scalars(kind, element.data_type.decode(element.data, endian)?);
            ensure!(
                values.len() == numel,
                "numeric array with dimensions {:?} holds {} values",
                dims,
                values.len()
            );

            ArrayData::Numeric {
                class,
                logical,
                values,
            }
        }
    };

    Ok(Array { name, dims, data })
}

/// Checks that the remaining bytes can hold `count` nested matrices, each at least a tag.
fn ensure_fits(count: usize, reader: &ElementReader<'_>, dims: &[usize]) -> Result<()> {
    ensure!(
        count <= reader.remaining_len() / 8,
        "array with dimensions {:?} needs {} nested elements, but only {} bytes remain",
        dims,
        count,
        reader.remaining_len()
    );
    Ok(())
}

fn decode_chars(element: Element<'_>, endian: Endian) -> Result<Vec<u16>> {
    let Element { data_type, data } = element;

    let units = match data_type {
        DataType::Utf8 => std::str::from_utf8(data)
            .context("char data is not valid UTF-8")?
            .encode_utf16()
            .collect(),
        DataType::Utf32 => {
            let text: String = data_type
                .decode(data, endian)?
                .map(|code| {
                    let code = code.to_u64() as u32;
                    char::from_u32(code)
                        .ok_or_else(|| format_err!("invalid UTF-32 code point {:#x}", code))
                })
                .collect::<Result<_>>()?;
            text.encode_utf16().collect()
        }
        DataType::UInt16 | DataType::Utf16 | DataType::UInt8 | DataType::Int8 => data_type
            .decode(data, endian)?
            .map(|unit| unit.to_u64() as u16)
            .collect(),
        _ => bail!("{:?} data cannot hold characters", data_type),
    };

    Ok(units)
}
