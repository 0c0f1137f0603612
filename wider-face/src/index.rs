//! The index file summarizing the converted splits.

use crate::{common::*, config::Split};

/// A value of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexValue {
    /// Path to a record file.
    Data(PathBuf),
    /// Number of images in a split.
    Num(u64),
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(path) => write!(f, "{}", path.display()),
            Self::Num(num) => write!(f, "{}", num),
        }
    }
}

/// Output of a converted split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub split: Split,
    pub data_path: PathBuf,
    /// Number of images listed in the annotation file.
    pub num_images: u64,
}

/// Maps `{split}_data` and `{split}_num` keys to their values in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetIndex {
    entries: IndexMap<String, IndexValue>,
}

impl DatasetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, summary: SplitSummary) {
        let SplitSummary {
            split,
            data_path,
            num_images,
        } = summary;

        if self.entries.contains_key(&split.data_key()) {
            warn!("the index entries of split '{}' are overwritten", split);
        }
        self.entries
            .insert(split.data_key(), IndexValue::Data(data_path));
        self.entries
            .insert(split.num_key(), IndexValue::Num(num_images));
    }

    pub fn entries(&self) -> &IndexMap<String, IndexValue> {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&IndexValue> {
        self.entries.get(key)
    }

    pub fn data_path(&self, split: Split) -> Option<&Path> {
        match self.entries.get(&split.data_key())? {
            IndexValue::Data(path) => Some(path),
            IndexValue::Num(_) => None,
        }
    }

    pub fn num_images(&self, split: Split) -> Option<u64> {
        match self.entries.get(&split.num_key())? {
            IndexValue::Num(num) => Some(*num),
            IndexValue::Data(_) => None,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let writer = BufWriter::new(
            File::create(path)
                .with_context(|| format!("failed to create index file '{}'", path.display()))?,
        );
        bincode::serialize_into(writer, self)
            .with_context(|| format!("failed to write index file '{}'", path.display()))?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(
            File::open(path)
                .with_context(|| format!("failed to open index file '{}'", path.display()))?,
        );
        let index = bincode::deserialize_from(reader)
            .with_context(|| format!("failed to parse index file '{}'", path.display()))?;
        Ok(index)
    }
}

impl FromIterator<SplitSummary> for DatasetIndex {
    fn from_iter<T: IntoIterator<Item = SplitSummary>>(iter: T) -> Self {
        let mut index = Self::new();
        iter.into_iter().for_each(|summary| index.insert(summary));
        index
    }
}
