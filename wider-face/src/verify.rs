//! Consistency checks of a converted dataset against its index.

use crate::{common::*, config::Split, index::DatasetIndex, record::read_records};

/// What the record file of a split actually holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitCount {
    pub split: Split,
    pub data_path: PathBuf,
    /// Number of images listed in the index.
    pub expected: u64,
    pub records: u64,
    pub faces: u64,
}

impl SplitCount {
    pub fn is_consistent(&self) -> bool {
        self.expected == self.records
    }
}

/// Counts records and face boxes in a record file.
pub fn count_records(path: impl AsRef<Path>) -> Result<(u64, u64)> {
    read_records(path)?.try_fold((0, 0), |(records, faces), record| {
        let record = record?;
        Ok((records + 1, faces + record.boxes.len() as u64))
    })
}

/// Re-reads the record file of every split listed in the index.
pub fn count_splits(index: &DatasetIndex) -> Result<Vec<SplitCount>> {
    let mut counts = vec![];

    for split in Split::ALL {
        let (data_path, expected) = match (index.data_path(split), index.num_images(split)) {
            (Some(data_path), Some(expected)) => (data_path, expected),
            _ => {
                warn!("the index has no entries for the {} split", split);
                continue;
            }
        };
        let (records, faces) = count_records(data_path)?;
        debug!("found {} records with {} faces in '{}'", records, faces, data_path.display());

        counts.push(SplitCount {
            split,
            data_path: data_path.to_path_buf(),
            expected,
            records,
            faces,
        });
    }

    Ok(counts)
}

/// Fails if any split holds a different number of records than the index lists.
pub fn check_counts(counts: &[SplitCount]) -> Result<()> {
    let mismatches: Vec<_> = counts
        .iter()
        .filter(|count| !count.is_consistent())
        .map(|count| {
            format!(
                "the {} split lists {} images, but '{}' holds {} records",
                count.split,
                count.expected,
                count.data_path.display(),
                count.records
            )
        })
        .collect();
    ensure!(mismatches.is_empty(), "{}", mismatches.join("\n"));
    Ok(())
}

/// Counts the records of every split and checks them against the index.
pub fn verify(index: &DatasetIndex) -> Result<Vec<SplitCount>> {
    let counts = count_splits(index)?;
    check_counts(&counts)?;
    Ok(counts)
}
