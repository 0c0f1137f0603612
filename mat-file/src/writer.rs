use crate::{
    array::{Array, ArrayData, Scalar},
    common::*,
    element::{padded_len, DataType},
    header::{Endian, Header},
    reader::FLAG_LOGICAL,
};
use flate2::{write::ZlibEncoder, Compression};

const DEFAULT_TEXT: &str = "MATLAB 5.0 MAT-file, written by mat-file";

/// Serializes arrays into a level 5 MAT-file.
#[derive(Debug, Clone)]
pub struct MatWriter {
    endian: Endian,
    compress: bool,
    text: String,
}

impl Default for MatWriter {
    fn default() -> Self {
        Self {
            endian: Endian::Little,
            compress: false,
            text: DEFAULT_TEXT.into(),
        }
    }
}

impl MatWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endian(self, endian: Endian) -> Self {
        Self { endian, ..self }
    }

    /// Wraps every variable in a zlib compressed element.
    pub fn compress(self, compress: bool) -> Self {
        Self { compress, ..self }
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self
        }
    }

    pub fn to_bytes<'a>(&self, variables: impl IntoIterator<Item = &'a Array>) -> Result<Vec<u8>> {
        let Self {
            endian,
            compress,
            ref text,
        } = *self;

        let mut bytes = Header::new(text.as_str(), endian).to_bytes()?;

        for array in variables {
            ensure!(
                !array.name.is_empty(),
                "top level variables must be named"
            );
            let element = encode_matrix(array, endian)
                .with_context(|| format!("failed to encode variable '{}'", array.name))?;

            if compress {
                let mut encoder = ZlibEncoder::new(vec![], Compression::default());
                encoder.write_all(&element)?;
                let compressed = encoder.finish()?;
                endian.write_u32(&mut bytes, DataType::Compressed.code())?;
                endian.write_u32(&mut bytes, compressed.len() as u32)?;
                bytes.extend_from_slice(&compressed);
            } else {
                bytes.extend_from_slice(&element);
            }
        }

        Ok(bytes)
    }

    pub fn write_file<'a>(
        &self,
        path: impl AsRef<Path>,
        variables: impl IntoIterator<Item = &'a Array>,
    ) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes(variables)?;
        fs::write(path, bytes)
            .with_context(|| format!("failed to write MAT-file '{}'", path.display()))?;
        Ok(())
    }
}

/// Encodes a complete matrix element, tag included.
fn encode_matrix(array: &Array, endian: Endian) -> Result<Vec<u8>> {
    let Array { name, dims, data } = array;
    let mut body = vec![];

    // array flags
    let flags = match data {
        ArrayData::Numeric { logical: true, .. } => FLAG_LOGICAL,
        _ => 0,
    } | array.class().code() as u32;
    let mut flags_data = vec![];
    endian.write_u32(&mut flags_data, flags)?;
    endian.write_u32(&mut flags_data, 0)?;
    push_element(&mut body, DataType::UInt32, &flags_data, endian)?;

    // dimensions
    let mut dims_data = vec![];
    for &dim in dims {
        endian.write_i32(&mut dims_data, dim as i32)?;
    }
    push_element(&mut body, DataType::Int32, &dims_data, endian)?;

    push_element(&mut body, DataType::Int8, name.as_bytes(), endian)?;

    match data {
        ArrayData::Numeric { class, values, .. } => {
            let data_type = class
                .storage_type()
                .ok_or_else(|| format_err!("{:?} is not a numeric class", class))?;
            let mut values_data = vec![];
            for value in values.scalars() {
                data_type.encode(&mut values_data, value, endian)?;
            }
            push_element(&mut body, data_type, &values_data, endian)?;
        }
        ArrayData::Char(units) => {
            let mut units_data = vec![];
            for &unit in units {
                DataType::UInt16.encode(&mut units_data, Scalar::UInt(unit as u64), endian)?;
            }
            push_element(&mut body, DataType::UInt16, &units_data, endian)?;
        }
        ArrayData::Cell(elements) => {
            for element in elements {
                body.extend(encode_matrix(element, endian)?);
            }
        }
        ArrayData::Struct { fields, values } => {
            let name_len = fields.iter().map(|field| field.len() + 1).max().unwrap_or(0);
            let mut len_data = vec![];
            endian.write_i32(&mut len_data, name_len as i32)?;
            push_element(&mut body, DataType::Int32, &len_data, endian)?;

            let mut names_data = vec![];
            for field in fields {
                let begin = names_data.len();
                names_data.extend_from_slice(field.as_bytes());
                names_data.resize(begin + name_len, 0);
            }
            push_element(&mut body, DataType::Int8, &names_data, endian)?;

            for value in values {
                body.extend(encode_matrix(value, endian)?);
            }
        }
    }

    let mut element = vec![];
    endian.write_u32(&mut element, DataType::Matrix.code())?;
    endian.write_u32(&mut element, body.len() as u32)?;
    element.extend(body);
    Ok(element)
}

/// Appends a data element, using the small format for bodies of 1 to 4 bytes.
fn push_element(
    output: &mut Vec<u8>,
    data_type: DataType,
    data: &[u8],
    endian: Endian,
) -> Result<()> {
    if (1..=4).contains(&data.len()) {
        endian.write_u32(output, (data.len() as u32) << 16 | data_type.code())?;
        output.extend_from_slice(data);
        output.resize(output.len() + 4 - data.len(), 0);
    } else {
        endian.write_u32(output, data_type.code())?;
        endian.write_u32(output, data.len() as u32)?;
        output.extend_from_slice(data);
        output.resize(output.len() + padded_len(data.len()) - data.len(), 0);
    }
    Ok(())
}
