use std::path::PathBuf;

/// All errors that can occur while indexing, preparing or sampling a dataset.
///
/// Every failure surfaces to the caller immediately; nothing is retried
/// internally. Preparation steps are idempotent, so the usual recovery is to
/// fix the cause and call `prepare_data` again.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A JSON document (or another required file) does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A JSON document exists but could not be parsed.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded as JSON.
    #[error("failed to serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A class folder name could not be parsed as a digit 0-9.
    #[error("cannot parse class folder name {name:?} in {}", folder.display())]
    ClassParse { name: String, folder: PathBuf },

    /// A ground-truth field was neither a reference nor a floating-point scalar.
    #[error("unexpected value type for ground-truth field `{field}` of image {image}: {found}")]
    UnexpectedReferenceType {
        image: usize,
        field: &'static str,
        found: String,
    },

    /// A ground-truth reference did not lead to a scalar. Unpacking reports
    /// it as [`Error::UnexpectedReferenceType`] with the image and field.
    #[error("unresolved ground-truth reference: {found}")]
    UnresolvedReference { found: String },

    /// Image indexing found no `1.png` in a split folder.
    #[error("no {split} images in {}", folder.display())]
    EmptySplit { split: String, folder: PathBuf },

    /// A bounded retry loop ran out of attempts.
    #[error("sampling exhausted after {attempts} attempts: {reason}")]
    SamplingExhausted { attempts: usize, reason: String },

    /// A class has no samples to draw from.
    #[error("class {class} has no samples")]
    EmptyClass { class: String },

    /// Different-class sampling needs at least two classes.
    #[error("need at least 2 classes, found {found}")]
    NotEnoughClasses { found: usize },

    /// A label appears in more than one block of a dataset's enumeration.
    #[error("class {label} is not contiguous: it reappears at index {index}")]
    NonContiguousClass { label: usize, index: usize },

    /// A sample id outside `0..len`.
    #[error("sample {index} out of range for {split} (size {len})")]
    SampleOutOfRange {
        index: usize,
        len: usize,
        split: String,
    },

    /// Image decoding failed.
    #[error("failed to decode {}: {message}", path.display())]
    ImageDecode { path: PathBuf, message: String },

    /// A network fetch or repository clone failed.
    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// A required cargo feature is not enabled.
    #[error("feature `{0}` is not enabled")]
    FeatureDisabled(&'static str),

    #[cfg(feature = "mat")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn exhausted(attempts: usize, reason: impl Into<String>) -> Self {
        Error::SamplingExhausted {
            attempts,
            reason: reason.into(),
        }
    }
}

/// Convenience Result type used throughout pairwise-data.
pub type Result<T> = std::result::Result<T, Error>;
