//! Reader and writer for MATLAB level 5 MAT-files.
//!
//! Numeric, char, cell and struct arrays are supported, as well as the
//! zlib compressed elements newer MATLAB versions write by default.
//! MATLAB 7.3 files are HDF5 containers and are rejected.

mod common;

pub mod array;
pub mod element;
pub mod header;
pub mod reader;
pub mod writer;

pub use array::{Array, ArrayClass, ArrayData, NumberKind, Numbers, Scalar};
pub use header::{Endian, Header};
pub use reader::MatFile;
pub use writer::MatWriter;
