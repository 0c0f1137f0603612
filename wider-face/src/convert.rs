use crate::{common::*, config::Config, index::DatasetIndex, split::process_split};

/// Converts every split in order and persists the index once all succeed.
pub fn convert(config: &Config) -> Result<DatasetIndex> {
    let summaries: Vec<_> = config
        .splits
        .iter()
        .map(|split_config| {
            process_split(split_config)
                .with_context(|| format!("failed to convert the {} split", split_config.split))
        })
        .collect::<Result<_>>()?;

    let index: DatasetIndex = summaries.into_iter().collect();
    index.save(&config.output_file)?;
    info!("saved index to '{}'", config.output_file.display());

    Ok(index)
}
