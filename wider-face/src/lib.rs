//! Converts the WIDER FACE dataset into TFRecord files.
//!
//! Each split is written to `<root>/{train,val,test}.tfrecords` with one
//! `Example` per image. An index file records the path and image count of
//! every split.

mod common;

pub mod annotation;
pub mod config;
pub mod convert;
pub mod index;
pub mod logging;
pub mod record;
pub mod split;
pub mod verify;

pub use annotation::{AnnotationTable, FaceAttributes, ImageAnnotation, LabelValue};
pub use config::{Config, Split, SplitConfig};
pub use convert::convert;
pub use index::{DatasetIndex, IndexValue, SplitSummary};
pub use record::{read_records, FaceBox, FaceRecord};
pub use split::process_split;
pub use verify::SplitCount;
