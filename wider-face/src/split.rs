//! Conversion of a single split.

use crate::{
    annotation::{AnnotationTable, ImageAnnotation},
    common::*,
    config::SplitConfig,
    index::SplitSummary,
    record::{create_writer, FaceRecord},
};
use indicatif::{ProgressBar, ProgressStyle};

/// Converts all images of a split into a record file.
///
/// Records are streamed to a `.part` file, which is renamed to the final
/// output path once every image is written.
pub fn process_split(config: &SplitConfig) -> Result<SplitSummary> {
    let SplitConfig {
        split,
        ref annotation_file,
        ref image_dir,
        ref output_file,
    } = *config;

    info!(
        "loading {} annotations from '{}'",
        split,
        annotation_file.display()
    );
    let table = AnnotationTable::load(annotation_file, split.is_annotated())?;
    let num_images = table.num_images();
    info!(
        "converting {} images in {} events of the {} split",
        num_images,
        table.events.len(),
        split
    );

    let partial_file = config.partial_file();
    let mut writer = create_writer(&partial_file)?;
    let progress = create_progress_bar(num_images as u64, split.name());

    for event in &table.events {
        let event_dir = image_dir.join(&event.name);
        debug!("converting event '{}'", event.name);

        for image in &event.images {
            let record = load_record(&event_dir, image)
                .with_context(|| format!("failed to convert event '{}'", event.name))?;
            writer
                .send(record.to_example()?)
                .with_context(|| format!("failed to write record '{}'", image.name))?;
            progress.inc(1);
        }
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush '{}'", partial_file.display()))?;
    drop(writer);
    progress.finish();

    fs::rename(&partial_file, output_file).with_context(|| {
        format!(
            "failed to move '{}' to '{}'",
            partial_file.display(),
            output_file.display()
        )
    })?;
    info!(
        "wrote {} records to '{}'",
        num_images,
        output_file.display()
    );

    Ok(SplitSummary {
        split,
        data_path: output_file.clone(),
        num_images: num_images as u64,
    })
}

/// Reads the image of an annotation and builds its record.
pub fn load_record(event_dir: &Path, annotation: &ImageAnnotation) -> Result<FaceRecord> {
    let image_file = event_dir.join(format!("{}.jpg", annotation.name));
    ensure!(
        image_file.is_file(),
        "the image file '{}' does not exist",
        image_file.display()
    );

    let image = fs::read(&image_file)
        .with_context(|| format!("failed to read image file '{}'", image_file.display()))?;
    let imagesize::ImageSize { width, height } = imagesize::blob_size(&image)
        .with_context(|| format!("failed to read the size of '{}'", image_file.display()))?;

    Ok(FaceRecord::from_annotation(
        annotation,
        image,
        [height as i64, width as i64],
    ))
}

fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .progress_chars("#>-"),
    );
    bar
}
