pub use anyhow::{bail, ensure, format_err, Context as _, Result};
pub use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
pub use indexmap::IndexMap;
pub use log::{debug, warn};
pub use std::{
    collections::HashSet,
    fs,
    io::{Read, Write},
    path::Path,
};
