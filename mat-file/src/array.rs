//! In-memory MATLAB arrays.

use crate::{common::*, element::DataType};

/// The class of a MATLAB array, as stored in the array flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayClass {
    Cell = 1,
    Struct = 2,
    Object = 3,
    Char = 4,
    Sparse = 5,
    Double = 6,
    Single = 7,
    Int8 = 8,
    UInt8 = 9,
    Int16 = 10,
    UInt16 = 11,
    Int32 = 12,
    UInt32 = 13,
    Int64 = 14,
    UInt64 = 15,
    Function = 16,
}

impl ArrayClass {
    pub fn from_code(code: u8) -> Result<Self> {
        let class = match code {
            1 => Self::Cell,
            2 => Self::Struct,
            3 => Self::Object,
            4 => Self::Char,
            5 => Self::Sparse,
            6 => Self::Double,
            7 => Self::Single,
            8 => Self::Int8,
            9 => Self::UInt8,
            10 => Self::Int16,
            11 => Self::UInt16,
            12 => Self::Int32,
            13 => Self::UInt32,
            14 => Self::Int64,
            15 => Self::UInt64,
            16 => Self::Function,
            _ => bail!("unknown array class {}", code),
        };
        Ok(class)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// The kind of numbers a numeric class holds, or `None` for other classes.
    pub fn number_kind(self) -> Option<NumberKind> {
        let kind = match self {
            Self::Double | Self::Single => NumberKind::Float,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 => NumberKind::Int,
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 => NumberKind::UInt,
            _ => return None,
        };
        Some(kind)
    }

    /// The data type that stores the class without loss.
    pub fn storage_type(self) -> Option<DataType> {
        let data_type = match self {
            Self::Double => DataType::Double,
            Self::Single => DataType::Single,
            Self::Int8 => DataType::Int8,
            Self::UInt8 => DataType::UInt8,
            Self::Int16 => DataType::Int16,
            Self::UInt16 => DataType::UInt16,
            Self::Int32 => DataType::Int32,
            Self::UInt32 => DataType::UInt32,
            Self::Int64 => DataType::Int64,
            Self::UInt64 => DataType::UInt64,
            _ => return None,
        };
        Some(data_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberKind {
    Float,
    Int,
    UInt,
}

/// A single decoded value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Float(f64),
    Int(i64),
    UInt(u64),
}

impl Scalar {
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Float(value) => value,
            Self::Int(value) => value as f64,
            Self::UInt(value) => value as f64,
        }
    }

    pub fn to_i64(self) -> i64 {
        match self {
            Self::Float(value) => value as i64,
            Self::Int(value) => value,
            Self::UInt(value) => value as i64,
        }
    }

    pub fn to_u64(self) -> u64 {
        match self {
            Self::Float(value) => value as u64,
            Self::Int(value) => value as u64,
            Self::UInt(value) => value,
        }
    }
}

/// The values of a numeric array, widened to the kind of its class.
#[derive(Debug, Clone, PartialEq)]
pub enum Numbers {
    Float(Vec<f64>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
}

impl Numbers {
    pub(crate) fn from_scalars(kind: NumberKind, values: impl Iterator<Item = Scalar>) -> Self {
        match kind {
            NumberKind::Float => Self::Float(values.map(Scalar::to_f64).collect()),
            NumberKind::Int => Self::Int(values.map(Scalar::to_i64).collect()),
            NumberKind::UInt => Self::UInt(values.map(Scalar::to_u64).collect()),
        }
    }

    pub fn kind(&self) -> NumberKind {
        match self {
            Self::Float(_) => NumberKind::Float,
            Self::Int(_) => NumberKind::Int,
            Self::UInt(_) => NumberKind::UInt,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Float(values) => values.len(),
            Self::Int(values) => values.len(),
            Self::UInt(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Scalar> {
        let scalar = match self {
            Self::Float(values) => Scalar::Float(*values.get(index)?),
            Self::Int(values) => Scalar::Int(*values.get(index)?),
            Self::UInt(values) => Scalar::UInt(*values.get(index)?),
        };
        Some(scalar)
    }

    pub fn scalars(&self) -> impl Iterator<Item = Scalar> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.scalars().map(Scalar::to_f64).collect()
    }

    /// Converts to integers, failing on floats with a fractional part.
    pub fn to_i64_vec(&self) -> Result<Vec<i64>> {
        self.scalars()
            .map(|scalar| {
                if let Scalar::Float(value) = scalar {
                    ensure!(
                        value.fract() == 0.0,
                        "expect an integral value, but found {}",
                        value
                    );
                }
                Ok(scalar.to_i64())
            })
            .collect()
    }

    /// Reorders values so that `values[indices[i]]` becomes the i-th value.
    fn gather(&self, indices: &[usize]) -> Self {
        match self {
            Self::Float(values) => Self::Float(indices.iter().map(|&i| values[i]).collect()),
            Self::Int(values) => Self::Int(indices.iter().map(|&i| values[i]).collect()),
            Self::UInt(values) => Self::UInt(indices.iter().map(|&i| values[i]).collect()),
        }
    }

    /// Moves the i-th value to `indices[i]`.
    fn scatter(&self, indices: &[usize]) -> Self {
        fn scatter_vec<T: Copy + Default>(values: &[T], indices: &[usize]) -> Vec<T> {
            let mut output = vec![T::default(); values.len()];
            values
                .iter()
                .zip(indices)
                .for_each(|(&value, &index)| output[index] = value);
            output
        }

        match self {
            Self::Float(values) => Self::Float(scatter_vec(values, indices)),
            Self::Int(values) => Self::Int(scatter_vec(values, indices)),
            Self::UInt(values) => Self::UInt(scatter_vec(values, indices)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Numeric {
        class: ArrayClass,
        logical: bool,
        /// Values in column-major order.
        values: Numbers,
    },
    /// UTF-16 code units in column-major order.
    Char(Vec<u16>),
    /// Elements in column-major order.
    Cell(Vec<Array>),
    /// Field values, `fields.len()` per element, elements in column-major order.
    Struct {
        fields: Vec<String>,
        values: Vec<Array>,
    },
}

/// A named MATLAB array.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub name: String,
    pub dims: Vec<usize>,
    pub data: ArrayData,
}

impl Array {
    /// The `0x0` double array MATLAB uses for `[]`.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            dims: vec![0, 0],
            data: ArrayData::Numeric {
                class: ArrayClass::Double,
                logical: false,
                values: Numbers::Float(vec![]),
            },
        }
    }

    /// Builds a numeric array from values in column-major order.
    pub fn numeric(dims: Vec<usize>, class: ArrayClass, values: Numbers) -> Result<Self> {
        let kind = class
            .number_kind()
            .ok_or_else(|| format_err!("{:?} is not a numeric class", class))?;
        ensure!(
            kind == values.kind(),
            "{:?} arrays hold {:?} values, but {:?} values are given",
            class,
            kind,
            values.kind()
        );
        ensure_numel(&dims, values.len())?;

        Ok(Self {
            name: String::new(),
            dims,
            data: ArrayData::Numeric {
                class,
                logical: false,
                values,
            },
        })
    }

    /// Builds a numeric array from values in row-major order.
    pub fn from_row_major(dims: Vec<usize>, class: ArrayClass, values: Numbers) -> Result<Self> {
        ensure_numel(&dims, values.len())?;
        let values = values.scatter(&row_major_indices(&dims)?);
        Self::numeric(dims, class, values)
    }

    /// A `rows x cols` double matrix.
    pub fn double_matrix<const N: usize>(rows: &[[f64; N]]) -> Result<Self> {
        let values = rows.iter().flatten().copied().collect();
        Self::from_row_major(vec![rows.len(), N], ArrayClass::Double, Numbers::Float(values))
    }

    /// A column vector of the given integer class.
    pub fn int_column(class: ArrayClass, values: &[i64]) -> Result<Self> {
        Self::numeric(vec![values.len(), 1], class, Numbers::Int(values.to_vec()))
    }

    /// A `1xN` char array.
    pub fn char_row(text: &str) -> Self {
        let units: Vec<u16> = text.encode_utf16().collect();
        let dims = if units.is_empty() {
            vec![0, 0]
        } else {
            vec![1, units.len()]
        };
        Self {
            name: String::new(),
            dims,
            data: ArrayData::Char(units),
        }
    }

    /// A cell array with elements in column-major order.
    pub fn cell(dims: Vec<usize>, elements: Vec<Array>) -> Result<Self> {
        ensure_numel(&dims, elements.len())?;
        Ok(Self {
            name: String::new(),
            dims,
            data: ArrayData::Cell(elements),
        })
    }

    /// A `Nx1` cell array.
    pub fn cell_column(elements: Vec<Array>) -> Self {
        Self {
            name: String::new(),
            dims: vec![elements.len(), 1],
            data: ArrayData::Cell(elements),
        }
    }

    /// A struct array with `fields.len()` values per element.
    pub fn structure(dims: Vec<usize>, fields: Vec<String>, values: Vec<Array>) -> Result<Self> {
        ensure!(
            fields.iter().collect::<HashSet<_>>().len() == fields.len(),
            "struct field names must be unique"
        );
        let expect = checked_numel(&dims)?
            .checked_mul(fields.len())
            .ok_or_else(|| format_err!("too many fields for dimensions {:?}", dims))?;
        ensure!(
            values.len() == expect,
            "expect {} field values, but found {}",
            expect,
            values.len()
        );
        Ok(Self {
            name: String::new(),
            dims,
            data: ArrayData::Struct { fields, values },
        })
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }

    /// Number of elements, saturated at `usize::MAX`.
    pub fn numel(&self) -> usize {
        self.dims
            .iter()
            .fold(1usize, |numel, &dim| numel.saturating_mul(dim))
    }

    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    pub fn class(&self) -> ArrayClass {
        match &self.data {
            ArrayData::Numeric { class, .. } => *class,
            ArrayData::Char(_) => ArrayClass::Char,
            ArrayData::Cell(_) => ArrayClass::Cell,
            ArrayData::Struct { .. } => ArrayClass::Struct,
        }
    }

    /// Numeric values in column-major order.
    pub fn numbers(&self) -> Result<&Numbers> {
        match &self.data {
            ArrayData::Numeric { values, .. } => Ok(values),
            _ => bail!(
                "expect a numeric array '{}', but found {:?} array",
                self.name,
                self.class()
            ),
        }
    }

    /// Numeric values in row-major order, the order `numpy` would flatten them in.
    pub fn to_row_major(&self) -> Result<Numbers> {
        let values = self.numbers()?;
        Ok(values.gather(&row_major_indices(&self.dims)?))
    }

    /// Reads a char array with at most one row as a string.
    pub fn to_text(&self) -> Result<String> {
        let units = match &self.data {
            ArrayData::Char(units) => units,
            _ => bail!(
                "expect a char array '{}', but found {:?} array",
                self.name,
                self.class()
            ),
        };
        ensure!(
            self.dims.iter().filter(|&&dim| dim > 1).count() <= 1,
            "multi-row char array {:?} cannot be read as a string",
            self.dims
        );
        let text = String::from_utf16(units)
            .map_err(|err| format_err!("invalid UTF-16 in char array: {}", err))?;
        Ok(text)
    }

    /// Cell elements in column-major order.
    pub fn cells(&self) -> Result<&[Array]> {
        match &self.data {
            ArrayData::Cell(elements) => Ok(elements),
            _ => bail!(
                "expect a cell array '{}', but found {:?} array",
                self.name,
                self.class()
            ),
        }
    }

    /// Looks up a field of the `index`-th struct element.
    pub fn field(&self, index: usize, name: &str) -> Result<&Array> {
        let (fields, values) = match &self.data {
            ArrayData::Struct { fields, values } => (fields, values),
            _ => bail!(
                "expect a struct array '{}', but found {:?} array",
                self.name,
                self.class()
            ),
        };
        ensure!(
            index < self.numel(),
            "struct element index {} is out of bound {}",
            index,
            self.numel()
        );
        let position = fields
            .iter()
            .position(|field| field == name)
            .ok_or_else(|| format_err!("struct has no field '{}'", name))?;
        Ok(&values[index * fields.len() + position])
    }
}

/// Product of the dimensions, or an error if it does not fit in `usize`.
pub fn checked_numel(dims: &[usize]) -> Result<usize> {
    dims.iter().try_fold(1usize, |numel, &dim| {
        numel
            .checked_mul(dim)
            .ok_or_else(|| format_err!("dimensions {:?} overflow the element count", dims))
    })
}

fn ensure_numel(dims: &[usize], len: usize) -> Result<()> {
    let numel = checked_numel(dims)?;
    ensure!(
        numel == len,
        "dimensions {:?} require {} elements, but found {}",
        dims,
        numel,
        len
    );
    Ok(())
}

/// Column-major positions of the elements visited in row-major order.
pub(crate) fn row_major_indices(dims: &[usize]) -> Result<Vec<usize>> {
    let numel = checked_numel(dims)?;
    if numel == 0 {
        return Ok(vec![]);
    }

    // partial products never exceed numel
    let strides: Vec<usize> = dims
        .iter()
        .scan(1, |stride, &dim| {
            let current = *stride;
            *stride *= dim;
            Some(current)
        })
        .collect();
    let mut position = vec![0; dims.len()];

    let indices: Vec<usize> = (0..numel)
        .map(|_| {
            let index = position
                .iter()
                .zip(&strides)
                .map(|(pos, stride)| pos * stride)
                .sum();

            for axis in (0..dims.len()).rev() {
                position[axis] += 1;
                if position[axis] < dims[axis] {
                    break;
                }
                position[axis] = 0;
            }

            index
        })
        .collect();
    Ok(indices)
}
