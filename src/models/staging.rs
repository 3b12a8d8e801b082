use crate::models::registry::{Category, CATEGORIES};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A file found under the staging root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Category owning the top-level directory, `None` for stray files
    pub category: Option<Category>,
}

/// Directory layout of the staging tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    root: PathBuf,
}

impl StagingLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Final path of a downloaded model file
    #[must_use]
    pub fn destination(&self, category: Category, filename: &str) -> PathBuf {
        self.category_dir(category).join(filename)
    }

    /// Local directory for a synced repository (`huggingface/<org>/<name>`)
    #[must_use]
    pub fn repo_dir(&self, repo_id: &str) -> PathBuf {
        repo_id
            .split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .fold(self.category_dir(Category::HuggingFace), |dir, part| {
                dir.join(part)
            })
    }

    /// Create the root and one directory per category
    pub fn create_directory_structure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;

        for info in CATEGORIES {
            let dir = self.root.join(info.dir_name);
            fs::create_dir_all(&dir)?;
            tracing::debug!("Created directory: {}", dir.display());
        }

        Ok(())
    }

    /// Every regular file under the root, sorted by path
    pub fn scan_files(&self) -> io::Result<Vec<StagedFile>> {
        let mut files = Vec::new();
        if self.root.exists() {
            collect_files(&self.root, &mut files)?;
        }
        for file in &mut files {
            file.category = file
                .path
                .strip_prefix(&self.root)
                .ok()
                .and_then(|rel| rel.components().next())
                .and_then(|first| Category::from_dir_name(&first.as_os_str().to_string_lossy()))
                // Files directly under the root have no category
                .filter(|_| file.path.parent() != Some(self.root.as_path()));
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

/// True when `path` is a file with at least one byte
#[must_use]
pub fn is_present(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

fn collect_files(dir: &Path, files: &mut Vec<StagedFile>) -> io::Result<()> {
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            collect_files(&path, files)?;
        } else if file_type.is_file() {
            let size_bytes = entry.metadata().map_or(0, |m| m.len());
            files.push(StagedFile {
                path,
                size_bytes,
                category: None,
            });
        }
    }
    Ok(())
}
