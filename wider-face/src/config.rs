//! Dataset layout resolved from the dataset root.

use crate::common::*;

/// Name of the directory holding the annotation files.
pub const ANNOTATION_DIR: &str = "wider_face_split";

/// A partition of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// Splits in processing order.
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }

    /// The image directory of the split under the root, e.g. `WIDER_train`.
    pub fn sub_dir(&self) -> String {
        format!("WIDER_{}", self.name())
    }

    pub fn annotation_file_name(&self) -> String {
        format!("wider_face_{}.mat", self.name())
    }

    /// Whether the annotation file carries boxes and face attributes.
    pub fn is_annotated(&self) -> bool {
        !matches!(self, Self::Test)
    }

    pub fn data_key(&self) -> String {
        format!("{}_data", self.name())
    }

    pub fn num_key(&self) -> String {
        format!("{}_num", self.name())
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input and output locations of one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitConfig {
    pub split: Split,
    pub annotation_file: PathBuf,
    /// Directory holding one sub-directory per event.
    pub image_dir: PathBuf,
    pub output_file: PathBuf,
}

impl SplitConfig {
    fn new(root: &Path, split: Split) -> Self {
        Self {
            split,
            annotation_file: root
                .join(ANNOTATION_DIR)
                .join(split.annotation_file_name()),
            image_dir: root.join(split.sub_dir()).join("images"),
            output_file: root.join(format!("{}.tfrecords", split.name())),
        }
    }

    /// The file records are streamed to before the split completes.
    pub fn partial_file(&self) -> PathBuf {
        let mut path = self.output_file.clone().into_os_string();
        path.push(".part");
        path.into()
    }
}

/// Conversion settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub root: PathBuf,
    /// Where the index is persisted.
    pub output_file: PathBuf,
    pub splits: Vec<SplitConfig>,
}

impl Config {
    /// Resolves the dataset layout and checks the inputs the conversion needs
    /// up front, so a bad root fails before anything is written.
    pub fn new(root: impl AsRef<Path>, output_file: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let output_file = output_file.as_ref();

        ensure!(
            root.is_dir(),
            "the dataset root '{}' does not exist or is not a directory",
            root.display()
        );
        let annotation_dir = root.join(ANNOTATION_DIR);
        ensure!(
            annotation_dir.is_dir(),
            "the annotation directory '{}' does not exist",
            annotation_dir.display()
        );

        let splits: Vec<_> = Split::ALL
            .iter()
            .map(|&split| SplitConfig::new(root, split))
            .collect();

        for split_config in &splits {
            ensure!(
                split_config.annotation_file.is_file(),
                "the annotation file '{}' does not exist",
                split_config.annotation_file.display()
            );
            if !split_config.image_dir.is_dir() {
                warn!(
                    "the image directory '{}' does not exist",
                    split_config.image_dir.display()
                );
            }
        }

        Ok(Self {
            root: root.to_owned(),
            output_file: output_file.to_owned(),
            splits,
        })
    }

    pub fn split(&self, split: Split) -> Option<&SplitConfig> {
        self.splits.iter().find(|config| config.split == split)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keys() {
        let keys: Vec<_> = Split::ALL
            .iter()
            .flat_map(|split| [split.data_key(), split.num_key()])
            .collect();
        assert_eq!(
            keys,
            ["train_data", "train_num", "val_data", "val_num", "test_data", "test_num"]
        );
        assert!(Split::Train.is_annotated());
        assert!(!Split::Test.is_annotated());
    }

    #[test]
    fn resolve_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join(ANNOTATION_DIR)).unwrap();
        for split in Split::ALL {
            fs::write(
                root.join(ANNOTATION_DIR).join(split.annotation_file_name()),
                b"",
            )
            .unwrap();
        }

        let config = Config::new(root, root.join("index.bin")).unwrap();
        let val = config.split(Split::Val).unwrap();
        assert_eq!(val.image_dir, root.join("WIDER_val").join("images"));
        assert_eq!(
            val.annotation_file,
            root.join("wider_face_split").join("wider_face_val.mat")
        );
        assert_eq!(val.output_file, root.join("val.tfrecords"));
        assert_eq!(val.partial_file(), root.join("val.tfrecords.part"));
    }

    #[test]
    fn reject_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        assert!(Config::new(root.join("missing"), "index.bin").is_err());
        assert!(Config::new(root, "index.bin").is_err());

        fs::create_dir(root.join(ANNOTATION_DIR)).unwrap();
        let err = Config::new(root, "index.bin").unwrap_err();
        assert!(err.to_string().contains("wider_face_train.mat"));
    }
}
