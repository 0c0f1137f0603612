//! Annotation tables loaded from the per-split MAT-files.

use crate::common::*;
use mat_file::{Array, MatFile};

/// Names of the per-face attributes, in record order.
pub const ATTRIBUTE_NAMES: [&str; 6] = [
    "blur",
    "expression",
    "illumination",
    "invalid",
    "occlusion",
    "pose",
];

/// An attribute label as stored in the annotation file. Images with a
/// single face may store a bare scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LabelValue {
    Scalar(i64),
    Sequence(Vec<i64>),
}

impl LabelValue {
    pub fn from_array(array: &Array) -> Result<Self> {
        let values = array.to_row_major()?.to_i64_vec()?;
        let label = if values.len() == 1 {
            Self::Scalar(values[0])
        } else {
            Self::Sequence(values)
        };
        Ok(label)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Sequence(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<i64> {
        match self {
            Self::Scalar(value) => vec![value],
            Self::Sequence(values) => values,
        }
    }
}

impl From<i64> for LabelValue {
    fn from(value: i64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<i64>> for LabelValue {
    fn from(values: Vec<i64>) -> Self {
        Self::Sequence(values)
    }
}

impl From<LabelValue> for Vec<i64> {
    fn from(label: LabelValue) -> Self {
        label.into_vec()
    }
}

/// Per-face attribute labels of an image, one entry per face.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FaceAttributes {
    pub blur: Vec<i64>,
    pub expression: Vec<i64>,
    pub illumination: Vec<i64>,
    pub invalid: Vec<i64>,
    pub occlusion: Vec<i64>,
    pub pose: Vec<i64>,
}

impl FaceAttributes {
    /// Builds the attributes from labels listed in [ATTRIBUTE_NAMES] order.
    pub fn from_labels(labels: [LabelValue; 6]) -> Self {
        let [blur, expression, illumination, invalid, occlusion, pose] = labels;
        Self {
            blur: blur.into_vec(),
            expression: expression.into_vec(),
            illumination: illumination.into_vec(),
            invalid: invalid.into_vec(),
            occlusion: occlusion.into_vec(),
            pose: pose.into_vec(),
        }
    }

    /// Attribute arrays paired with their names, in [ATTRIBUTE_NAMES] order.
    pub fn named(&self) -> [(&'static str, &[i64]); 6] {
        let [blur, expression, illumination, invalid, occlusion, pose] = ATTRIBUTE_NAMES;
        [
            (blur, self.blur.as_slice()),
            (expression, self.expression.as_slice()),
            (illumination, self.illumination.as_slice()),
            (invalid, self.invalid.as_slice()),
            (occlusion, self.occlusion.as_slice()),
            (pose, self.pose.as_slice()),
        ]
    }
}

/// Annotation of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAnnotation {
    /// File name without the `.jpg` extension.
    pub name: String,
    /// Face boxes in `[x, y, width, height]` form.
    pub boxes: Vec<[f64; 4]>,
    /// Absent for unannotated splits.
    pub attributes: Option<FaceAttributes>,
}

/// A named group of images.
#[derive(Debug, Clone, PartialEq)]
pub struct EventAnnotation {
    pub name: String,
    pub images: Vec<ImageAnnotation>,
}

/// Annotations of one split in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationTable {
    pub events: Vec<EventAnnotation>,
}

impl AnnotationTable {
    /// Loads a split annotation file. `annotated` tells whether boxes and
    /// attribute labels are expected.
    pub fn load(path: impl AsRef<Path>, annotated: bool) -> Result<Self> {
        let path = path.as_ref();
        let mat = MatFile::open(path)?;
        Self::from_mat(&mat, annotated)
            .with_context(|| format!("invalid annotation file '{}'", path.display()))
    }

    pub fn from_mat(mat: &MatFile, annotated: bool) -> Result<Self> {
        let event_list = mat.variable("event_list")?.cells()?;
        let file_list = mat.variable("file_list")?.cells()?;
        ensure!(
            event_list.len() == file_list.len(),
            "event_list has {} events, but file_list has {}",
            event_list.len(),
            file_list.len()
        );

        let (bbx_list, label_lists) = if annotated {
            let bbx_list = event_variable(mat, "face_bbx_list", event_list.len())?;
            let mut label_lists = Vec::with_capacity(ATTRIBUTE_NAMES.len());
            for name in ATTRIBUTE_NAMES {
                let label_list =
                    event_variable(mat, &format!("{}_label_list", name), event_list.len())?;
                label_lists.push(label_list);
            }
            (Some(bbx_list), label_lists)
        } else {
            (None, vec![])
        };

        let events: Vec<_> = event_list
            .iter()
            .enumerate()
            .map(|(index, event)| {
                let name = event
                    .to_text()
                    .with_context(|| format!("invalid name of event {}", index))?;
                let images = load_event(
                    &file_list[index],
                    bbx_list.map(|list| &list[index]),
                    &label_lists
                        .iter()
                        .map(|list| &list[index])
                        .collect::<Vec<_>>(),
                )
                .with_context(|| format!("invalid annotation of event '{}'", name))?;
                Ok(EventAnnotation { name, images })
            })
            .collect::<Result<_>>()?;

        Ok(Self { events })
    }

    /// Number of images listed across all events.
    pub fn num_images(&self) -> usize {
        self.events.iter().map(|event| event.images.len()).sum()
    }
}

/// Looks up a per-event cell variable with one entry per event.
fn event_variable<'a>(mat: &'a MatFile, name: &str, num_events: usize) -> Result<&'a [Array]> {
    let cells = mat.variable(name)?.cells()?;
    ensure!(
        cells.len() == num_events,
        "{} has {} entries, but there are {} events",
        name,
        cells.len(),
        num_events
    );
    Ok(cells)
}

fn load_event(
    files: &Array,
    boxes: Option<&Array>,
    labels: &[&Array],
) -> Result<Vec<ImageAnnotation>> {
    let files = files.cells()?;
    let num_images = files.len();

    let boxes = boxes.map(|boxes| boxes.cells()).transpose()?;
    if let Some(boxes) = boxes {
        ensure!(
            boxes.len() == num_images,
            "{} images are listed, but found {} box entries",
            num_images,
            boxes.len()
        );
    }

    let labels: Vec<_> = labels
        .iter()
        .zip(ATTRIBUTE_NAMES)
        .map(|(label, name)| -> Result<_> {
            let cells = label.cells()?;
            ensure!(
                cells.len() == num_images,
                "{} images are listed, but found {} {} label entries",
                num_images,
                cells.len(),
                name
            );
            Ok(cells)
        })
        .collect::<Result<_>>()?;

    files
        .iter()
        .enumerate()
        .map(|(index, file)| {
            let name = file
                .to_text()
                .with_context(|| format!("invalid name of image {}", index))?;

            let image_boxes = match boxes {
                Some(boxes) => load_boxes(&boxes[index])
                    .with_context(|| format!("invalid boxes of image '{}'", name))?,
                None => vec![],
            };

            let attributes = if labels.is_empty() {
                None
            } else {
                let values: Vec<_> = labels
                    .iter()
                    .zip(ATTRIBUTE_NAMES)
                    .map(|(cells, attribute)| {
                        LabelValue::from_array(&cells[index]).with_context(|| {
                            format!("invalid {} label of image '{}'", attribute, name)
                        })
                    })
                    .collect::<Result<_>>()?;
                let values: [LabelValue; 6] = values
                    .try_into()
                    .map_err(|_| format_err!("expect {} attributes", ATTRIBUTE_NAMES.len()))?;
                Some(FaceAttributes::from_labels(values))
            };

            Ok(ImageAnnotation {
                name,
                boxes: image_boxes,
                attributes,
            })
        })
        .collect()
}

/// Reads a box matrix as rows of `[x, y, width, height]`.
fn load_boxes(array: &Array) -> Result<Vec<[f64; 4]>> {
    let values = array.to_row_major()?.to_f64_vec();
    ensure!(
        values.len() % 4 == 0,
        "box values of length {} cannot be split into rows of 4",
        values.len()
    );
    let boxes = values
        .chunks_exact(4)
        .map(|row| [row[0], row[1], row[2], row[3]])
        .collect();
    Ok(boxes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mat_file::{ArrayClass, Numbers};

    fn int_label(values: &[i64]) -> Array {
        Array::int_column(ArrayClass::Int32, values).unwrap()
    }

    fn labels(per_image: Vec<Array>) -> Array {
        Array::cell_column(vec![Array::cell_column(per_image)])
    }

    fn annotated_file() -> MatFile {
        let mut variables = vec![
            Array::cell_column(vec![Array::char_row("0--Parade")]).with_name("event_list"),
            Array::cell_column(vec![Array::cell_column(vec![
                Array::char_row("a"),
                Array::char_row("b"),
            ])])
            .with_name("file_list"),
            Array::cell_column(vec![Array::cell_column(vec![
                Array::double_matrix(&[[10.0, 10.0, 5.0, 5.0], [20.0, 20.0, 4.0, 4.0]]).unwrap(),
                Array::double_matrix(&[[0.0, 0.0, 2.0, 2.0]]).unwrap(),
            ])])
            .with_name("face_bbx_list"),
        ];
        for name in ATTRIBUTE_NAMES {
            variables.push(
                labels(vec![int_label(&[0, 0]), int_label(&[1])])
                    .with_name(format!("{}_label_list", name)),
            );
        }

        let bytes = mat_file::MatWriter::new().to_bytes(&variables).unwrap();
        MatFile::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn scalar_and_sequence_labels() {
        let scalar = LabelValue::from_array(&int_label(&[3])).unwrap();
        assert_eq!(scalar, LabelValue::Scalar(3));
        assert_eq!(scalar.clone().into_vec(), LabelValue::Sequence(vec![3]).into_vec());

        let sequence = LabelValue::from_array(&int_label(&[1, 2])).unwrap();
        assert_eq!(sequence, LabelValue::Sequence(vec![1, 2]));

        let empty = LabelValue::from_array(&Array::empty()).unwrap();
        assert!(empty.is_empty());

        let fractional =
            Array::numeric(vec![1, 1], ArrayClass::Double, Numbers::Float(vec![0.5])).unwrap();
        assert!(LabelValue::from_array(&fractional).is_err());
    }

    #[test]
    fn load_annotated_table() {
        let table = AnnotationTable::from_mat(&annotated_file(), true).unwrap();
        assert_eq!(table.num_images(), 2);

        let event = &table.events[0];
        assert_eq!(event.name, "0--Parade");
        assert_eq!(event.images[0].name, "a");
        assert_eq!(
            event.images[0].boxes,
            [[10.0, 10.0, 5.0, 5.0], [20.0, 20.0, 4.0, 4.0]]
        );

        let attributes = event.images[1].attributes.as_ref().unwrap();
        assert_eq!(attributes.blur, [1]);
        assert_eq!(attributes.pose, [1]);
        assert!(attributes.named().iter().all(|(_, values)| values.len() == 1));
    }

    #[test]
    fn load_unannotated_table() {
        let table = AnnotationTable::from_mat(&annotated_file(), false).unwrap();
        assert!(table
            .events
            .iter()
            .flat_map(|event| &event.images)
            .all(|image| image.boxes.is_empty() && image.attributes.is_none()));
    }

    #[test]
    fn reject_mismatched_lists() {
        let mut mat = annotated_file();
        let blur = mat.remove("blur_label_list").unwrap();
        assert!(AnnotationTable::from_mat(&mat, true).is_err());

        // one label entry for two images
        let short = labels(vec![int_label(&[0, 0])]).with_name("blur_label_list");
        mat.variables.insert(short.name.clone(), short);
        let err = AnnotationTable::from_mat(&mat, true).unwrap_err();
        assert!(format!("{:#}", err).contains("blur"));

        mat.variables.insert(blur.name.clone(), blur);
        assert!(AnnotationTable::from_mat(&mat, true).is_ok());
    }

    #[test]
    fn reject_ragged_boxes() {
        let ragged = Array::from_row_major(
            vec![1, 3],
            ArrayClass::Double,
            Numbers::Float(vec![1.0, 2.0, 3.0]),
        )
        .unwrap();
        assert!(load_boxes(&ragged).is_err());
        assert!(load_boxes(&Array::empty()).unwrap().is_empty());
    }
}
