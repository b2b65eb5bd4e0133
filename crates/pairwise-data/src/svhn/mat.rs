// MATLAB v7.3 digit-struct reader (HDF5 via hdf5-metno)

use std::path::Path;

use hdf5::types::TypeDescriptor;
use hdf5::{Dataset, File, Group, ObjectReference1, ReferencedObject};

use super::ground_truth::{BoxField, DigitStructOpener, DigitStructSource, FieldValue};
use crate::error::{Error, Result};

const DIGIT_STRUCT: &str = "digitStruct";
const BBOX: &str = "bbox";

/// An open `digitStruct.mat` file.
pub struct MatDigitStruct {
    file: File,
    boxes: Vec<ObjectReference1>,
}

impl MatDigitStruct {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let boxes = file
            .group(DIGIT_STRUCT)?
            .dataset(BBOX)?
            .read_raw::<ObjectReference1>()?;
        Ok(Self { file, boxes })
    }

    fn box_group(&self, image: usize) -> Result<Group> {
        let reference = self.boxes.get(image).ok_or_else(|| Error::SampleOutOfRange {
            index: image,
            len: self.boxes.len(),
            split: "digitStruct/bbox".to_string(),
        })?;
        match self.file.dereference(reference)? {
            ReferencedObject::Group(group) => Ok(group),
            other => Err(Error::UnexpectedReferenceType {
                image,
                field: BBOX,
                found: kind(&other).to_string(),
            }),
        }
    }
}

fn kind(object: &ReferencedObject) -> &'static str {
    match object {
        ReferencedObject::Group(_) => "group",
        ReferencedObject::Dataset(_) => "dataset",
        #[allow(unreachable_patterns)]
        _ => "datatype",
    }
}

fn first_value(dataset: &Dataset) -> Result<Option<f64>> {
    Ok(dataset.read_raw::<f64>()?.first().copied())
}

impl DigitStructSource for MatDigitStruct {
    type Reference = ObjectReference1;

    fn num_images(&self) -> Result<usize> {
        Ok(self.boxes.len())
    }

    fn field(&self, image: usize, field: BoxField) -> Result<Vec<FieldValue<ObjectReference1>>> {
        let dataset = self.box_group(image)?.dataset(field.name())?;
        let dtype = dataset.dtype()?;
        match dtype.to_descriptor()? {
            TypeDescriptor::Float(_) => Ok(dataset
                .read_raw::<f64>()?
                .into_iter()
                .map(FieldValue::Scalar)
                .collect()),
            _ if dtype.is::<ObjectReference1>() => Ok(dataset
                .read_raw::<ObjectReference1>()?
                .into_iter()
                .map(FieldValue::Reference)
                .collect()),
            other => Err(Error::UnexpectedReferenceType {
                image,
                field: field.name(),
                found: format!("{other:?}"),
            }),
        }
    }

    fn dereference(&self, reference: &ObjectReference1) -> Result<f64> {
        match self.file.dereference(reference)? {
            ReferencedObject::Dataset(dataset) => {
                first_value(&dataset)?.ok_or_else(|| Error::UnresolvedReference {
                    found: "empty dataset".to_string(),
                })
            }
            other => Err(Error::UnresolvedReference {
                found: kind(&other).to_string(),
            }),
        }
    }
}

/// Opens each split's `digitStruct.mat` from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatFileOpener;

impl DigitStructOpener for MatFileOpener {
    type Source = MatDigitStruct;

    fn open(&self, path: &Path) -> Result<MatDigitStruct> {
        MatDigitStruct::open(path)
    }
}
