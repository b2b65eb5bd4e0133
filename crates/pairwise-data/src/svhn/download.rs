// Raw SVHN archives: fetch, extract, delete
//
// http://ufldl.stanford.edu/housenumbers/
//   train.tar.gz / test.tar.gz           full images + digitStruct.mat
//   train_32x32.mat / test_32x32.mat     cropped digits (not an archive)

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use tracing::{info, warn};

use crate::dataset::Split;
use crate::error::{Error, Result};

pub const BASE_URL: &str = "http://ufldl.stanford.edu/housenumbers";

/// File name of a split's archive.
pub fn archive_name(split: Split, crop: bool) -> String {
    if crop {
        format!("{split}_32x32.mat")
    } else {
        format!("{split}.tar.gz")
    }
}

pub fn archive_url(split: Split, crop: bool) -> String {
    format!("{BASE_URL}/{}", archive_name(split, crop))
}

/// Download and unpack both splits into `root`.
///
/// Does nothing when `root` already exists; delete it to force a fresh
/// download. Returns whether anything was fetched.
///
/// Both splits are fetched into a sibling `<root>.partial` directory that is
/// renamed to `root` only once everything succeeded, so a failed run leaves
/// no `root` behind and can simply be retried.
pub fn download_dataset(root: &Path, crop: bool, timeout: Duration) -> Result<bool> {
    download_from(BASE_URL, root, crop, timeout)
}

pub(crate) fn download_from(
    base_url: &str,
    root: &Path,
    crop: bool,
    timeout: Duration,
) -> Result<bool> {
    if root.exists() {
        info!(root = %root.display(), "SVHN root exists, skipping download");
        return Ok(false);
    }

    let staging = staging_dir(root);
    if staging.exists() {
        warn!(path = %staging.display(), "removing leftovers of an earlier download");
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    match fetch_all(base_url, &staging, crop, timeout) {
        Ok(()) => {
            fs::rename(&staging, root)?;
            Ok(true)
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(
                    path = %staging.display(),
                    error = %cleanup,
                    "cannot remove partial download"
                );
            }
            Err(e)
        }
    }
}

/// `<root>.partial`, next to `root`.
fn staging_dir(root: &Path) -> PathBuf {
    let mut name = root
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("svhn"));
    name.push(".partial");
    root.with_file_name(name)
}

fn fetch_all(base_url: &str, dest: &Path, crop: bool, timeout: Duration) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Download {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;

    for split in Split::ALL {
        let url = format!("{base_url}/{}", archive_name(split, crop));
        let archive = dest.join(archive_name(split, crop));
        let target = dest.join(split.as_str());

        info!(%url, path = %archive.display(), "downloading SVHN archive");
        fetch(&client, &url, &archive)?;

        if crop {
            fs::create_dir_all(&target)?;
            fs::rename(&archive, target.join(archive_name(split, crop)))?;
        } else {
            extract_archive(&archive, &target)?;
        }
    }
    Ok(())
}

fn fetch(client: &reqwest::blocking::Client, url: &str, dest: &Path) -> Result<()> {
    let download_err = |e: reqwest::Error| Error::Download {
        url: url.to_string(),
        message: e.to_string(),
    };
    let mut response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;
    let mut out = BufWriter::new(File::create(dest)?);
    response.copy_to(&mut out).map_err(download_err)?;
    out.flush()?;
    Ok(())
}

/// Unpack a `.tar.gz` into `target`, then delete the archive.
pub fn extract_archive(archive: &Path, target: &Path) -> Result<()> {
    info!(archive = %archive.display(), target = %target.display(), "extracting");
    fs::create_dir_all(target)?;
    let mut tar = tar::Archive::new(GzDecoder::new(File::open(archive)?));
    tar.unpack(target)?;
    fs::remove_file(archive)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    fn tar_gz(entry: &str, body: &[u8]) -> Vec<u8> {
        let gz = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(gz);
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, entry, body).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn image_bytes() -> Vec<u8> {
        (0..65_536u32).map(|i| (i % 251) as u8).collect()
    }

    /// Answer `connections` HTTP requests with `respond(path)` on a local port.
    fn serve(connections: usize, respond: fn(&str) -> (u16, Vec<u8>)) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming().take(connections) {
                let mut stream = stream.unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request = String::new();
                reader.read_line(&mut request).unwrap();
                let mut line = String::new();
                while reader.read_line(&mut line).unwrap() > 2 {
                    line.clear();
                }
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = respond(&path);
                write!(
                    stream,
                    "HTTP/1.1 {status} Status\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n",
                    body.len()
                )
                .unwrap();
                stream.write_all(&body).unwrap();
            }
        });
        format!("http://{addr}")
    }

    fn split_archive(path: &str) -> (u16, Vec<u8>) {
        let split = if path.contains("test") { "test" } else { "train" };
        (200, tar_gz(&format!("{split}/1.png"), &image_bytes()))
    }

    fn test_split_missing(path: &str) -> (u16, Vec<u8>) {
        if path.contains("test") {
            (404, Vec::new())
        } else {
            split_archive(path)
        }
    }

    #[test]
    fn urls() {
        assert_eq!(
            archive_url(Split::Train, false),
            "http://ufldl.stanford.edu/housenumbers/train.tar.gz"
        );
        assert_eq!(
            archive_url(Split::Test, true),
            "http://ufldl.stanford.edu/housenumbers/test_32x32.mat"
        );
    }

    #[test]
    fn extract_unpacks_and_removes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("train.tar.gz");
        let body = b"png bytes";
        fs::write(&archive, tar_gz("train/1.png", body)).unwrap();

        let target = dir.path().join("train");
        extract_archive(&archive, &target).unwrap();
        assert!(!archive.exists());
        assert_eq!(fs::read(target.join("train/1.png")).unwrap(), body);
    }

    #[test]
    fn existing_root_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let fetched = download_dataset(dir.path(), false, Duration::from_secs(1)).unwrap();
        assert!(!fetched);
    }

    #[test]
    fn download_extracts_both_splits() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("svhn");
        let base = serve(2, split_archive);

        let fetched = download_from(&base, &root, false, Duration::from_secs(10)).unwrap();
        assert!(fetched);
        for split in ["train", "test"] {
            let image = root.join(split).join(split).join("1.png");
            assert_eq!(fs::read(image).unwrap(), image_bytes());
        }
        assert!(!root.join("train.tar.gz").exists());
        assert!(!staging_dir(&root).exists());
    }

    #[test]
    fn failed_download_leaves_no_root_and_can_be_retried() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("svhn");
        let base = serve(4, test_split_missing);

        for _ in 0..2 {
            let err = download_from(&base, &root, false, Duration::from_secs(10)).unwrap_err();
            assert!(matches!(
                err,
                Error::Download { ref url, .. } if url.ends_with("test.tar.gz")
            ));
            assert!(!root.exists());
            assert!(!staging_dir(&root).exists());
        }
    }

    #[test]
    fn staging_is_a_sibling() {
        assert_eq!(
            staging_dir(Path::new("/data/svhn")),
            PathBuf::from("/data/svhn.partial")
        );
    }
}
