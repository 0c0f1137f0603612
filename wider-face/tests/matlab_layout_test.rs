//! Loads annotation files assembled byte by byte in the layout MATLAB uses,
//! independent of the crate's own MAT writer.

use anyhow::Result;
use mat_file::MatFile;
use std::fs;
use wider_face::{annotation::ATTRIBUTE_NAMES, AnnotationTable};

const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;

const MX_CELL: u8 = 1;
const MX_CHAR: u8 = 4;
const MX_DOUBLE: u8 = 6;
const MX_INT32: u8 = 12;

fn element(data_type: u32, data: &[u8]) -> Vec<u8> {
    // up to 4 bytes are packed into the tag
    if !data.is_empty() && data.len() <= 4 {
        let mut bytes = (data_type | ((data.len() as u32) << 16))
            .to_le_bytes()
            .to_vec();
        bytes.extend_from_slice(data);
        bytes.resize(8, 0);
        return bytes;
    }

    let mut bytes = data_type.to_le_bytes().to_vec();
    bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(data);
    bytes.resize((bytes.len() + 7) / 8 * 8, 0);
    bytes
}

fn matrix(class: u8, dims: &[u32], name: &str, data: &[Vec<u8>]) -> Vec<u8> {
    let flags = [class, 0, 0, 0, 0, 0, 0, 0];
    let dims: Vec<u8> = dims.iter().flat_map(|dim| dim.to_le_bytes()).collect();

    let mut body = [
        element(MI_UINT32, &flags),
        element(MI_INT32, &dims),
        element(MI_INT8, name.as_bytes()),
    ]
    .concat();
    data.iter().for_each(|part| body.extend_from_slice(part));
    element(MI_MATRIX, &body)
}

/// A `1xN` char array stored as UTF-16 code units.
fn text(value: &str) -> Vec<u8> {
    let units: Vec<u8> = value
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    matrix(
        MX_CHAR,
        &[1, (units.len() / 2) as u32],
        "",
        &[element(MI_UINT16, &units)],
    )
}

fn cell(name: &str, elements: Vec<Vec<u8>>) -> Vec<u8> {
    matrix(MX_CELL, &[elements.len() as u32, 1], name, &elements)
}

/// A `Kx4` double matrix whose values fit in `u8`, stored narrowed.
fn narrowed_boxes(rows: &[[u8; 4]]) -> Vec<u8> {
    let values: Vec<u8> = (0..4)
        .flat_map(|col| rows.iter().map(move |row| row[col]))
        .collect();
    matrix(
        MX_DOUBLE,
        &[rows.len() as u32, 4],
        "",
        &[element(MI_UINT8, &values)],
    )
}

fn double_boxes(rows: &[[f64; 4]]) -> Vec<u8> {
    let values: Vec<u8> = (0..4)
        .flat_map(|col| rows.iter().map(move |row| row[col]))
        .flat_map(|value| value.to_le_bytes())
        .collect();
    matrix(
        MX_DOUBLE,
        &[rows.len() as u32, 4],
        "",
        &[element(MI_DOUBLE, &values)],
    )
}

/// An int32 column stored as `u8` values.
fn int32_labels(values: &[u8]) -> Vec<u8> {
    matrix(
        MX_INT32,
        &[values.len() as u32, 1],
        "",
        &[element(MI_UINT8, values)],
    )
}

/// `[]`: a 0x0 double with an empty real part.
fn empty() -> Vec<u8> {
    matrix(MX_DOUBLE, &[0, 0], "", &[element(MI_DOUBLE, &[])])
}

fn file(variables: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = b"MATLAB 5.0 MAT-file, Platform: GLNXA64, Created on: Tue Nov 15 10:20:05 2016"
        .to_vec();
    bytes.resize(116, b' ');
    bytes.extend_from_slice(&[0; 8]);
    bytes.extend_from_slice(&[0x00, 0x01, b'I', b'M']);
    variables.iter().for_each(|variable| bytes.extend_from_slice(variable));
    bytes
}

fn names() -> [Vec<u8>; 2] {
    let event_list = cell("event_list", vec![text("0--Parade"), text("1--Handshaking")]);
    let file_list = cell(
        "file_list",
        vec![
            cell(
                "",
                vec![
                    text("0_Parade_marchingband_1_5"),
                    text("0_Parade_Parade_0_904"),
                ],
            ),
            cell("", vec![text("1_Handshaking_Handshaking_1_35")]),
        ],
    );
    [event_list, file_list]
}

fn annotated_file() -> Vec<u8> {
    let mut variables = Vec::from(names());
    variables.push(cell(
        "face_bbx_list",
        vec![
            cell(
                "",
                vec![
                    narrowed_boxes(&[[10, 10, 5, 5], [20, 20, 4, 4]]),
                    double_boxes(&[[1.5, 2.5, 300.0, 4.0]]),
                ],
            ),
            cell("", vec![empty()]),
        ],
    ));
    for name in ATTRIBUTE_NAMES {
        variables.push(cell(
            &format!("{}_label_list", name),
            vec![
                cell("", vec![int32_labels(&[0, 1]), int32_labels(&[2])]),
                cell("", vec![empty()]),
            ],
        ));
    }
    file(&variables)
}

#[test]
fn annotated_table() -> Result<()> {
    let mat = MatFile::from_bytes(&annotated_file())?;
    let table = AnnotationTable::from_mat(&mat, true)?;
    assert_eq!(table.num_images(), 3);

    let event_names: Vec<_> = table.events.iter().map(|event| &event.name).collect();
    assert_eq!(event_names, ["0--Parade", "1--Handshaking"]);

    let parade = &table.events[0].images;
    assert_eq!(parade[0].name, "0_Parade_marchingband_1_5");
    assert_eq!(
        parade[0].boxes,
        [[10.0, 10.0, 5.0, 5.0], [20.0, 20.0, 4.0, 4.0]]
    );
    let attributes = parade[0].attributes.as_ref().unwrap();
    assert!(attributes.named().iter().all(|(_, values)| *values == [0, 1]));

    // a single face stores each label as a 1x1 array
    assert_eq!(parade[1].name, "0_Parade_Parade_0_904");
    assert_eq!(parade[1].boxes, [[1.5, 2.5, 300.0, 4.0]]);
    let attributes = parade[1].attributes.as_ref().unwrap();
    assert_eq!(attributes.occlusion, [2]);
    assert!(attributes.named().iter().all(|(_, values)| values.len() == 1));

    let handshaking = &table.events[1].images;
    assert_eq!(handshaking.len(), 1);
    assert_eq!(handshaking[0].name, "1_Handshaking_Handshaking_1_35");
    assert!(handshaking[0].boxes.is_empty());
    let attributes = handshaking[0].attributes.as_ref().unwrap();
    assert!(attributes.named().iter().all(|(_, values)| values.is_empty()));

    Ok(())
}

#[test]
fn unannotated_table_from_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wider_face_test_filelist.mat");
    fs::write(&path, file(&names()))?;

    let table = AnnotationTable::load(&path, false)?;
    assert_eq!(table.num_images(), 3);
    assert!(table
        .events
        .iter()
        .flat_map(|event| &event.images)
        .all(|image| image.boxes.is_empty() && image.attributes.is_none()));

    // the annotated variables are required when boxes are expected
    assert!(AnnotationTable::load(&path, true).is_err());
    Ok(())
}

#[test]
fn reject_truncated_variable() {
    let mut bytes = annotated_file();
    bytes.truncate(bytes.len() - 16);
    assert!(MatFile::from_bytes(&bytes).is_err());
}
