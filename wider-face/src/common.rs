pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use indexmap::IndexMap;
pub use itertools::{izip, Itertools as _};
pub use log::{debug, info, warn};
pub use serde::{Deserialize, Serialize};
pub use std::{
    fmt,
    fs::{self, File},
    io::{BufReader, BufWriter},
    iter::FromIterator,
    path::{Path, PathBuf},
};
