use std::borrow::Cow;
use std::io::Read;
use std::path::Path;

use super::ImportError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// The file handed to the pipeline: raw bytes plus a filename hint.
///
/// The pipeline only ever borrows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    name: String,
    bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: sanitize_filename(name),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, refusing anything above `max_size` bytes.
    pub fn from_path(path: &Path, max_size: u64) -> Result<Self, ImportError> {
        let metadata = std::fs::metadata(path)?;
        let file_size = metadata.len();
        if file_size > max_size {
            return Err(ImportError::FileTooLarge {
                size_mb: file_size as f64 / (1024.0 * 1024.0),
                max_mb: max_size / (1024 * 1024),
            });
        }

        let mut bytes = Vec::with_capacity(file_size as usize);
        std::fs::File::open(path)?
            .take(max_size + 1)
            .read_to_end(&mut bytes)?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        tracing::debug!(file = %name, size = bytes.len(), "Read import source");
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lower-cased extension of the filename hint, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// MIME type guessed from the filename hint.
    pub fn mime_type(&self) -> Option<&'static str> {
        mime_guess::from_path(&self.name).first_raw()
    }

    /// Content as UTF-8 text with any byte-order mark removed.
    pub fn text(&self) -> Result<&str, ImportError> {
        std::str::from_utf8(self.without_bom())
            .map_err(|e| ImportError::MalformedInput(format!("file is not UTF-8 text: {e}")))
    }

    /// Like [`RawFile::text`], but invalid sequences become U+FFFD instead of
    /// failing. Spreadsheet exports are often in a legacy code page.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.without_bom())
    }

    fn without_bom(&self) -> &[u8] {
        self.bytes.strip_prefix(UTF8_BOM).unwrap_or(&self.bytes[..])
    }
}

/// Strip path components and limit length.
pub fn sanitize_filename(original: &str) -> String {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let clean: String = name.chars().filter(|c| *c != '\0').take(255).collect();

    if clean.is_empty() {
        "import".to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_and_mime_from_name() {
        let file = RawFile::new("Export.CSV", "a,b\n");
        assert_eq!(file.extension().as_deref(), Some("csv"));
        assert_eq!(file.mime_type(), Some("text/csv"));
        assert_eq!(RawFile::new("noext", "").extension(), None);
    }

    #[test]
    fn text_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"name,url");
        let file = RawFile::new("a.csv", bytes);
        assert_eq!(file.text().unwrap(), "name,url");
    }

    #[test]
    fn binary_is_not_text() {
        let file = RawFile::new("blob.bin", vec![0xFF, 0xFE, 0x00, 0x80]);
        assert!(matches!(file.text(), Err(ImportError::MalformedInput(_))));
    }

    #[test]
    fn lossy_text_replaces_invalid_bytes() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"name\nCaf\xe9\n");
        let file = RawFile::new("latin1.csv", bytes);
        assert!(file.text().is_err());
        assert_eq!(file.text_lossy(), "name\nCaf\u{FFFD}\n");
        assert!(matches!(RawFile::new("a.csv", "ok").text_lossy(), Cow::Borrowed("ok")));
    }

    #[test]
    fn from_path_reads_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.csv");
        std::fs::write(&path, "name,password\nMail,hunter2\n").unwrap();
        let file = RawFile::from_path(&path, 1024).unwrap();
        assert_eq!(file.name(), "items.csv");
        assert_eq!(file.len(), 27);
    }

    #[test]
    fn from_path_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.csv");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(4096).unwrap();
        let err = RawFile::from_path(&path, 1024).unwrap_err();
        assert!(matches!(err, ImportError::FileTooLarge { .. }));
    }

    #[test]
    fn from_path_missing_file_is_io_error() {
        let err = RawFile::from_path(Path::new("/definitely/not/here.csv"), 1024).unwrap_err();
        assert!(matches!(err, ImportError::Io(_)));
    }

    #[test]
    fn sanitize_path_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\export.1pux"), "export.1pux");
        assert_eq!(sanitize_filename(""), "import");
        assert_eq!(sanitize_filename("file\0name.csv"), "filename.csv");
    }
}
