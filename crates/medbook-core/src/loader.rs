//! Directory document loader.
//!
//! Walks a data directory for text files and produces one [`Document`] per
//! file, tagged with the file's basename under the `source` metadata key.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{Document, Meta, SOURCE_KEY};

const TEXT_EXTENSIONS: [&str; 2] = ["txt", "md"];

pub struct DocumentLoader {
    data_dir: PathBuf,
}

impl DocumentLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    /// Loads the whole corpus or nothing: any unreadable file is fatal, and
    /// an empty corpus is an error rather than a silently empty index.
    pub fn load(&self) -> Result<Vec<Document>> {
        let files = self.list_files();
        if files.is_empty() {
            return Err(Error::Load(format!(
                "no documents found under {}",
                self.data_dir.display()
            )));
        }

        let mut documents = Vec::with_capacity(files.len());
        for path in &files {
            let content = read_file_content(path)
                .map_err(|e| Error::Load(format!("{}: {e}", path.display())))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            debug!(source = %name, bytes = content.len(), "loaded document");
            let mut metadata = Meta::new();
            metadata.insert(SOURCE_KEY.to_string(), name);
            documents.push(Document::new(content, metadata));
        }
        info!(
            count = documents.len(),
            dir = %self.data_dir.display(),
            "loaded corpus"
        );
        Ok(documents)
    }

    /// Sorted so repeated loads of the same directory produce the same
    /// document order.
    fn list_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.data_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext));
            if matches {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        files
    }
}

fn read_file_content(path: &Path) -> std::io::Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        // Scanned references occasionally carry stray non-UTF8 bytes.
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}
