use std::path::{Path, PathBuf};

use super::source::sanitize_filename;
use super::ImportError;
use crate::config::APP_NAME;

/// Template users can fill in to prepare a CSV import.
pub const CSV_SAMPLE: &str = "name,tags,url,username,password,notes
Facebook,social,https://facebook.com/,john.doe@gmail.com,3kjaf93,\"Some note...\"
Github,\"work,coding\",https://github.com,john.doe@gmail.com,129lskdf93";

pub const CSV_MIME_TYPE: &str = "text/csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFile {
    pub filename: String,
    pub mime_type: &'static str,
    pub contents: &'static str,
}

pub fn csv_sample() -> SampleFile {
    SampleFile {
        filename: format!("{APP_NAME}_csv_import_sample.csv"),
        mime_type: CSV_MIME_TYPE,
        contents: CSV_SAMPLE,
    }
}

/// Hands a generated file to the user (download, save dialog, disk).
pub trait FileSaver {
    /// Store `contents` and report where it went.
    fn save_file(&self, filename: &str, mime_type: &str, contents: &[u8])
        -> Result<PathBuf, ImportError>;
}

pub fn save_csv_sample(saver: &dyn FileSaver) -> Result<PathBuf, ImportError> {
    let sample = csv_sample();
    let location = saver.save_file(&sample.filename, sample.mime_type, sample.contents.as_bytes())?;
    tracing::info!(path = %location.display(), "CSV sample saved");
    Ok(location)
}

/// Writes files into a fixed directory.
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileSaver for DirectorySaver {
    fn save_file(
        &self,
        filename: &str,
        _mime_type: &str,
        contents: &[u8],
    ) -> Result<PathBuf, ImportError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(sanitize_filename(filename));
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}
