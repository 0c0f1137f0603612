//! Conversion between image annotations and TFRecord examples.

use crate::{
    annotation::{FaceAttributes, ImageAnnotation, ATTRIBUTE_NAMES},
    common::*,
};
use tfrecord::{Example, ExampleIter, ExampleWriter, Feature, FeatureKind, RecordReaderConfig};

pub const IMAGE_KEY: &str = "img";
pub const NAME_KEY: &str = "name";
pub const SIZE_KEY: &str = "img_hw";
pub const LABEL_KEY: &str = "label";
pub const X1_KEY: &str = "x1";
pub const Y1_KEY: &str = "y1";
pub const X2_KEY: &str = "x2";
pub const Y2_KEY: &str = "y2";

/// Class id shared by all faces.
pub const FACE_CLASS: f32 = 0.0;

/// A face box in corner form, in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub class: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl FaceBox {
    /// Converts a `[x, y, width, height]` box.
    pub fn from_xywh([x, y, w, h]: [f64; 4]) -> Self {
        Self {
            class: FACE_CLASS,
            x1: x as f32,
            y1: y as f32,
            x2: (x + w) as f32,
            y2: (y + h) as f32,
        }
    }
}

/// Everything stored for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRecord {
    /// Image name without extension.
    pub name: String,
    /// Encoded image bytes as read from disk.
    pub image: Vec<u8>,
    /// Image size as `[height, width]`.
    pub height_width: [i64; 2],
    pub boxes: Vec<FaceBox>,
    /// Empty for unannotated splits.
    pub attributes: FaceAttributes,
}

impl FaceRecord {
    pub fn from_annotation(
        annotation: &ImageAnnotation,
        image: Vec<u8>,
        height_width: [i64; 2],
    ) -> Self {
        let ImageAnnotation {
            name,
            boxes,
            attributes,
        } = annotation;

        Self {
            name: name.clone(),
            image,
            height_width,
            boxes: boxes.iter().copied().map(FaceBox::from_xywh).collect(),
            attributes: attributes.clone().unwrap_or_default(),
        }
    }

    /// Checks that every per-face array has one entry per box.
    pub fn check_shape(&self) -> Result<()> {
        let num_faces = self.boxes.len();
        for (name, values) in self.attributes.named() {
            ensure!(
                values.len() == num_faces,
                "image '{}' has {} face boxes, but {} {} labels",
                self.name,
                num_faces,
                values.len(),
                name
            );
        }
        Ok(())
    }

    pub fn to_example(&self) -> Result<Example> {
        self.check_shape()?;

        let Self {
            name,
            image,
            height_width,
            boxes,
            attributes,
        } = self;
        let column = |get: fn(&FaceBox) -> f32| -> Feature {
            Feature::from_f32_iter(boxes.iter().map(get))
        };

        let mut features = vec![
            (
                IMAGE_KEY.to_string(),
                Feature::from_bytes_list(vec![image.clone()]),
            ),
            (
                NAME_KEY.to_string(),
                Feature::from_bytes_list(vec![name.as_bytes().to_vec()]),
            ),
            (LABEL_KEY.to_string(), column(|b| b.class)),
            (X1_KEY.to_string(), column(|b| b.x1)),
            (Y1_KEY.to_string(), column(|b| b.y1)),
            (X2_KEY.to_string(), column(|b| b.x2)),
            (Y2_KEY.to_string(), column(|b| b.y2)),
            (
                SIZE_KEY.to_string(),
                Feature::from_i64_list(&height_width[..]),
            ),
        ];
        for (key, values) in attributes.named() {
            features.push((key.to_string(), Feature::from_i64_list(values)));
        }

        Ok(Example::from_iter(features))
    }

    /// Decodes an example written by [FaceRecord::to_example].
    pub fn from_example(example: Example) -> Result<Self> {
        let mut features = example.into_hash_map();
        let mut take = |key: &str| {
            features
                .remove(key)
                .ok_or_else(|| format_err!("the feature '{}' is missing", key))
        };

        let name = {
            let bytes = single_bytes(NAME_KEY, take(NAME_KEY)?)?;
            String::from_utf8(bytes).context("image name is not valid UTF-8")?
        };
        let image = single_bytes(IMAGE_KEY, take(IMAGE_KEY)?)?;
        let height_width: [i64; 2] = int64_list(SIZE_KEY, take(SIZE_KEY)?)?
            .try_into()
            .map_err(|values: Vec<i64>| {
                format_err!("expect 2 values in '{}', but found {}", SIZE_KEY, values.len())
            })?;

        let classes = float_list(LABEL_KEY, take(LABEL_KEY)?)?;
        let x1 = float_list(X1_KEY, take(X1_KEY)?)?;
        let y1 = float_list(Y1_KEY, take(Y1_KEY)?)?;
        let x2 = float_list(X2_KEY, take(X2_KEY)?)?;
        let y2 = float_list(Y2_KEY, take(Y2_KEY)?)?;
        ensure!(
            [&x1, &y1, &x2, &y2]
                .iter()
                .all(|column| column.len() == classes.len()),
            "box columns of image '{}' differ in length",
            name
        );
        let boxes: Vec<_> = izip!(classes, x1, y1, x2, y2)
            .map(|(class, x1, y1, x2, y2)| FaceBox {
                class,
                x1,
                y1,
                x2,
                y2,
            })
            .collect();

        let mut labels = Vec::with_capacity(ATTRIBUTE_NAMES.len());
        for key in ATTRIBUTE_NAMES {
            labels.push(int64_list(key, take(key)?)?);
        }
        let [blur, expression, illumination, invalid, occlusion, pose]: [Vec<i64>; 6] = labels
            .try_into()
            .map_err(|_| format_err!("expect {} attributes", ATTRIBUTE_NAMES.len()))?;

        if !features.is_empty() {
            warn!(
                "ignore unknown features {:?} of image '{}'",
                features.keys().collect::<Vec<_>>(),
                name
            );
        }

        let record = Self {
            name,
            image,
            height_width,
            boxes,
            attributes: FaceAttributes {
                blur,
                expression,
                illumination,
                invalid,
                occlusion,
                pose,
            },
        };
        record.check_shape()?;
        Ok(record)
    }
}

fn single_bytes(key: &str, feature: Feature) -> Result<Vec<u8>> {
    match feature.into_kinds() {
        Some(FeatureKind::Bytes(list)) => {
            let len = list.len();
            list.into_iter()
                .exactly_one()
                .map_err(|_| format_err!("expect one value in '{}', but found {}", key, len))
        }
        _ => bail!("expect bytes list in '{}'", key),
    }
}

fn float_list(key: &str, feature: Feature) -> Result<Vec<f32>> {
    match feature.into_kinds() {
        Some(FeatureKind::F32(list)) => Ok(list),
        None => Ok(vec![]),
        _ => bail!("expect float list in '{}'", key),
    }
}

fn int64_list(key: &str, feature: Feature) -> Result<Vec<i64>> {
    match feature.into_kinds() {
        Some(FeatureKind::I64(list)) => Ok(list),
        None => Ok(vec![]),
        _ => bail!("expect int64 list in '{}'", key),
    }
}

/// Creates a record file.
pub fn create_writer(path: impl AsRef<Path>) -> Result<ExampleWriter<BufWriter<File>>> {
    let path = path.as_ref();
    let writer = ExampleWriter::create(path)
        .with_context(|| format!("failed to create record file '{}'", path.display()))?;
    Ok(writer)
}

/// Reads back the records of a TFRecord file.
pub fn read_records(path: impl AsRef<Path>) -> Result<impl Iterator<Item = Result<FaceRecord>>> {
    let path = path.as_ref();
    let reader = ExampleIter::<BufReader<File>>::open(path, RecordReaderConfig::default())
        .with_context(|| format!("failed to open record file '{}'", path.display()))?;
    let iter = reader.map(|example| FaceRecord::from_example(example?));
    Ok(iter)
}
