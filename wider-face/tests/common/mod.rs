#![allow(dead_code)]

use anyhow::Result;
use mat_file::{Array, ArrayClass, MatWriter, Numbers};
use std::{fs, path::Path};
use tempfile::TempDir;
use wider_face::Split;

/// An image of a fixture dataset. Every face attribute gets `labels`.
#[derive(Debug, Clone)]
pub struct Image {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub boxes: Vec<[f64; 4]>,
    pub labels: Vec<i64>,
}

impl Image {
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            boxes: vec![],
            labels: vec![],
        }
    }

    pub fn with_faces(self, boxes: Vec<[f64; 4]>, labels: Vec<i64>) -> Self {
        Self {
            boxes,
            labels,
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub images: Vec<Image>,
}

impl Event {
    pub fn new(name: &str, images: Vec<Image>) -> Self {
        Self {
            name: name.into(),
            images,
        }
    }
}

/// Creates a dataset root holding the given events per split.
pub fn build_dataset(
    train: &[Event],
    val: &[Event],
    test: &[Event],
) -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    fs::create_dir(dir.path().join("wider_face_split"))?;

    for (split, events) in Split::ALL.iter().zip([train, val, test]) {
        write_split(dir.path(), *split, events)?;
    }

    Ok(dir)
}

/// Writes the annotation file and the JPEG images of a split.
pub fn write_split(root: &Path, split: Split, events: &[Event]) -> Result<()> {
    for event in events {
        let event_dir = root.join(split.sub_dir()).join("images").join(&event.name);
        fs::create_dir_all(&event_dir)?;

        for image in &event.images {
            image::RgbImage::new(image.width, image.height)
                .save(event_dir.join(format!("{}.jpg", image.name)))?;
        }
    }

    let per_event = |make: &dyn Fn(&Image) -> Result<Array>| -> Result<Array> {
        let cells = events
            .iter()
            .map(|event| -> Result<_> {
                let cells = event.images.iter().map(make).collect::<Result<_>>()?;
                Ok(Array::cell_column(cells))
            })
            .collect::<Result<_>>()?;
        Ok(Array::cell_column(cells))
    };

    let mut variables = vec![
        Array::cell_column(
            events
                .iter()
                .map(|event| Array::char_row(&event.name))
                .collect(),
        )
        .with_name("event_list"),
        per_event(&|image| Ok(Array::char_row(&image.name)))?.with_name("file_list"),
    ];

    if split.is_annotated() {
        variables.push(per_event(&box_matrix)?.with_name("face_bbx_list"));
        for name in wider_face::annotation::ATTRIBUTE_NAMES {
            let labels = per_event(&|image| {
                Array::int_column(ArrayClass::Int32, &image.labels)
            })?;
            variables.push(labels.with_name(format!("{}_label_list", name)));
        }
    }

    MatWriter::new().compress(true).write_file(
        root.join("wider_face_split")
            .join(split.annotation_file_name()),
        &variables,
    )?;
    Ok(())
}

fn box_matrix(image: &Image) -> Result<Array> {
    if image.boxes.is_empty() {
        return Ok(Array::empty());
    }
    let values = image.boxes.iter().flatten().copied().collect();
    Array::from_row_major(
        vec![image.boxes.len(), 4],
        ArrayClass::Double,
        Numbers::Float(values),
    )
}
