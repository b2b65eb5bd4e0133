// JSON store — persist any serde mapping to a file and read it back
//
// Single-writer assumption: nothing here guards against two writers on the
// same path.

use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Write `content` as JSON to `path`, creating missing parent directories and
/// overwriting any existing file.
///
/// Values JSON cannot represent (e.g. maps with non-string keys) fail with
/// [`Error::Serialize`]; write failures surface as [`Error::Io`].
pub fn save<T: Serialize + ?Sized>(path: impl AsRef<Path>, content: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(&mut writer, content).map_err(|source| {
        if source.is_io() {
            Error::Io(source.into())
        } else {
            Error::Serialize {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    writer.flush()?;
    Ok(())
}

/// Read and parse the JSON document at `path`.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(Error::Io(e)),
    };
    serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}
