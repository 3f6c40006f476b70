//! Upload sources

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;

#[derive(Debug, Clone)]
enum Source {
    Memory(Bytes),
    Path(PathBuf),
}

/// A named byte source with a known size.
///
/// Path-backed files are only read when the part phase starts; the size
/// recorded at open time must still hold then.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    size: u64,
    source: Source,
}

impl UploadFile {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        UploadFile {
            name: name.into(),
            size: data.len() as u64,
            source: Source::Memory(data),
        }
    }

    /// Open a file on disk, taking its name from the last path component
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} has no usable file name", path.display()),
                )
            })?
            .to_string();

        Ok(UploadFile {
            name,
            size: metadata.len(),
            source: Source::Path(path.to_path_buf()),
        })
    }

    /// Override the name sent to the backend
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the whole source into one shared buffer
    pub async fn read_all(&self) -> io::Result<Bytes> {
        let data = match &self.source {
            Source::Memory(data) => data.clone(),
            Source::Path(path) => Bytes::from(tokio::fs::read(path).await?),
        };

        if data.len() as u64 != self.size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} changed size: expected {} bytes, read {}",
                    self.name,
                    self.size,
                    data.len()
                ),
            ));
        }

        Ok(data)
    }
}
