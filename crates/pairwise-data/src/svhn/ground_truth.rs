// SVHN ground truth — digit boxes per image
//
// `digitStruct.mat` (MATLAB v7.3, i.e. HDF5) holds one reference per image in
// `/digitStruct/bbox`. Each reference points at a group with five fields
// (height, width, top, left, label), each an (n, 1) array for n digits:
//
//   - n == 1: the array holds the number itself (float64)
//   - n  > 1: the array holds object references, one per digit, each
//             pointing at a 1x1 float64 dataset
//
// `DigitStructSource` models that as `FieldValue::{Scalar, Reference}` plus an
// explicit `dereference`, so the unpacking logic does not care where the
// values come from.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One digit bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitBox {
    pub height: i64,
    pub width: i64,
    pub top: i64,
    pub left: i64,
    pub label: i64,
}

/// Digit boxes of one image, keyed by box index.
pub type GroundTruthRecord = BTreeMap<usize, DigitBox>;

/// Ground truth of a whole split, keyed by sequential image id.
pub type GroundTruth = BTreeMap<usize, GroundTruthRecord>;

/// The five per-digit fields of a box group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxField {
    Height,
    Width,
    Top,
    Left,
    Label,
}

impl BoxField {
    pub const ALL: [BoxField; 5] = [
        BoxField::Height,
        BoxField::Width,
        BoxField::Top,
        BoxField::Left,
        BoxField::Label,
    ];

    /// Dataset name inside a box group.
    pub fn name(self) -> &'static str {
        match self {
            BoxField::Height => "height",
            BoxField::Width => "width",
            BoxField::Top => "top",
            BoxField::Left => "left",
            BoxField::Label => "label",
        }
    }
}

/// A stored field value: the number itself, or a reference to it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<R> {
    Scalar(f64),
    Reference(R),
}

/// Read access to a digit-struct file.
pub trait DigitStructSource {
    type Reference;

    /// Number of box groups (one per image).
    fn num_images(&self) -> Result<usize>;

    /// Values of `field` for every digit of `image`, in box order.
    fn field(&self, image: usize, field: BoxField) -> Result<Vec<FieldValue<Self::Reference>>>;

    /// Follow a reference to the scalar it points at.
    fn dereference(&self, reference: &Self::Reference) -> Result<f64>;
}

/// Opens the digit-struct source of a split.
pub trait DigitStructOpener {
    type Source: DigitStructSource;

    fn open(&self, path: &Path) -> Result<Self::Source>;
}

fn resolve<S: DigitStructSource>(
    source: &S,
    image: usize,
    field: BoxField,
    value: &FieldValue<S::Reference>,
) -> Result<i64> {
    let v = match value {
        FieldValue::Scalar(v) => *v,
        FieldValue::Reference(r) => source.dereference(r).map_err(|e| match e {
            Error::UnresolvedReference { found } => Error::UnexpectedReferenceType {
                image,
                field: field.name(),
                found,
            },
            other => other,
        })?,
    };
    // Truncation toward zero.
    Ok(v as i64)
}

/// Decode every box group of `source` into per-image records.
pub fn unpack_ground_truth<S: DigitStructSource>(source: &S) -> Result<GroundTruth> {
    let mut ground_truth = GroundTruth::new();
    for image in 0..source.num_images()? {
        let mut columns = Vec::with_capacity(BoxField::ALL.len());
        for field in BoxField::ALL {
            columns.push(source.field(image, field)?);
        }
        let digits = columns[0].len();
        if let Some((field, column)) = BoxField::ALL
            .iter()
            .zip(&columns)
            .find(|(_, c)| c.len() != digits)
        {
            return Err(Error::UnexpectedReferenceType {
                image,
                field: field.name(),
                found: format!("{} values where {} digits were expected", column.len(), digits),
            });
        }

        let mut record = GroundTruthRecord::new();
        for digit in 0..digits {
            let value = |column: usize| {
                resolve(source, image, BoxField::ALL[column], &columns[column][digit])
            };
            record.insert(
                digit,
                DigitBox {
                    height: value(0)?,
                    width: value(1)?,
                    top: value(2)?,
                    left: value(3)?,
                    label: value(4)?,
                },
            );
        }
        ground_truth.insert(image, record);
    }
    Ok(ground_truth)
}

/// An in-memory digit struct laid out the way MATLAB stores it: images with a
/// single digit carry scalars, images with several digits carry references
/// into a value pool.
#[derive(Debug, Clone, Default)]
pub struct DigitStructTable {
    images: Vec<Vec<[FieldValue<usize>; 5]>>,
    pool: Vec<f64>,
}

impl DigitStructTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an image with the given digit boxes.
    pub fn push_image(&mut self, boxes: &[DigitBox]) {
        let by_reference = boxes.len() > 1;
        let mut rows = Vec::with_capacity(boxes.len());
        for b in boxes {
            let values = [b.height, b.width, b.top, b.left, b.label].map(|v| v as f64);
            rows.push(values.map(|v| {
                if by_reference {
                    self.pool.push(v);
                    FieldValue::Reference(self.pool.len() - 1)
                } else {
                    FieldValue::Scalar(v)
                }
            }));
        }
        self.images.push(rows);
    }
}

impl DigitStructSource for DigitStructTable {
    type Reference = usize;

    fn num_images(&self) -> Result<usize> {
        Ok(self.images.len())
    }

    fn field(&self, image: usize, field: BoxField) -> Result<Vec<FieldValue<usize>>> {
        let rows = self.images.get(image).ok_or_else(|| Error::SampleOutOfRange {
            index: image,
            len: self.images.len(),
            split: "digit struct".to_string(),
        })?;
        let column = BoxField::ALL.iter().position(|f| *f == field).unwrap_or(0);
        Ok(rows.iter().map(|row| row[column].clone()).collect())
    }

    fn dereference(&self, reference: &usize) -> Result<f64> {
        self.pool
            .get(*reference)
            .copied()
            .ok_or_else(|| Error::UnresolvedReference {
                found: format!("dangling reference {reference}"),
            })
    }
}

impl DigitStructOpener for DigitStructTable {
    type Source = DigitStructTable;

    fn open(&self, _path: &Path) -> Result<DigitStructTable> {
        Ok(self.clone())
    }
}
