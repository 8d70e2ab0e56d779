//! ZIP bundling and scratch files

use std::io::{Cursor, Read, Write};
use std::path::PathBuf;

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AppError, AppResult};

/// Make a string safe to use as a file or archive entry name
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "documento".to_string()
    } else {
        cleaned
    }
}

/// Bundle named files into a deflated ZIP held in memory.
///
/// Names are sanitised; duplicates get a numeric suffix so every input
/// ends up as its own entry.
pub fn bundle_zip(files: &[(String, Vec<u8>)]) -> AppResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut used: Vec<String> = Vec::with_capacity(files.len());

    for (name, content) in files {
        let mut entry = sanitize_file_name(name);
        if used.contains(&entry) {
            let (stem, ext) = match entry.rsplit_once('.') {
                Some((stem, ext)) => (stem.to_string(), format!(".{}", ext)),
                None => (entry.clone(), String::new()),
            };
            let mut n = 2;
            while used.contains(&format!("{}-{}{}", stem, n, ext)) {
                n += 1;
            }
            entry = format!("{}-{}{}", stem, n, ext);
        }

        zip.start_file(entry.as_str(), options)
            .map_err(|e| AppError::Document(format!("zip: {}", e)))?;
        zip.write_all(content)?;
        used.push(entry);
    }

    let cursor = zip
        .finish()
        .map_err(|e| AppError::Document(format!("zip: {}", e)))?;
    Ok(cursor.into_inner())
}

/// Per-job scratch directory, removed when dropped
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new(root: &str) -> AppResult<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("fops-").tempdir_in(root)?;
        Ok(Self { dir })
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Write a new file into the scratch directory.
    ///
    /// Fails if a file with the same sanitised name is already there.
    pub fn write(&self, name: &str, content: &[u8]) -> AppResult<PathBuf> {
        let path = self.dir.path().join(sanitize_file_name(name));
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| AppError::Document(format!("{}: {}", path.display(), e)))?;
        file.write_all(content)?;
        Ok(path)
    }

    /// Zip the given scratch files into `archive_name`, returning its bytes
    pub fn zip_files(&self, paths: &[PathBuf], archive_name: &str) -> AppResult<Vec<u8>> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let mut content = Vec::new();
            std::fs::File::open(path)?.read_to_end(&mut content)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "documento".to_string());
            files.push((name, content));
        }

        let bytes = bundle_zip(&files)?;
        self.write(archive_name, &bytes)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::ZipArchive;

    fn entry_names(bytes: Vec<u8>) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Rotulado BRU/7.pdf"), "Rotulado_BRU_7.pdf");
        assert_eq!(sanitize_file_name("../../etc"), "_.._etc");
        assert_eq!(sanitize_file_name("   "), "documento");
    }

    #[test]
    fn test_zip_has_one_entry_per_document() {
        let files = vec![
            ("rotulado-A.pdf".to_string(), b"%PDF-a".to_vec()),
            ("rotulado-B.pdf".to_string(), b"%PDF-b".to_vec()),
            ("rotulado-A.pdf".to_string(), b"%PDF-c".to_vec()),
        ];
        let names = entry_names(bundle_zip(&files).unwrap());
        assert_eq!(
            names,
            vec!["rotulado-A.pdf", "rotulado-B.pdf", "rotulado-A-2.pdf"]
        );
    }

    #[test]
    fn test_scratch_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let root_str = root.path().to_string_lossy().to_string();

        let scratch = Scratch::new(&root_str).unwrap();
        let a = scratch.write("a.pdf", b"%PDF-a").unwrap();
        let b = scratch.write("b.pdf", b"%PDF-b").unwrap();
        let bytes = scratch.zip_files(&[a, b], "bundle.zip").unwrap();
        assert_eq!(entry_names(bytes).len(), 2);

        let dir = scratch.path().to_path_buf();
        assert!(dir.join("bundle.zip").exists());
        drop(scratch);
        assert!(!dir.exists());
    }

    #[test]
    fn test_scratch_refuses_to_overwrite() {
        let root = tempfile::tempdir().unwrap();
        let scratch = Scratch::new(&root.path().to_string_lossy()).unwrap();

        scratch.write("rotulado BRU-7.pdf", b"%PDF-first").unwrap();
        let err = scratch.write("rotulado/BRU-7.pdf", b"%PDF-second").unwrap_err();
        assert!(matches!(err, AppError::Document(_)));

        let kept = std::fs::read(scratch.path().join("rotulado_BRU-7.pdf")).unwrap();
        assert_eq!(kept, b"%PDF-first");
    }
}
