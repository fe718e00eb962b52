//! Selecting local files for an operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use jwalk::{Parallelism, WalkDir};
use shipwright_core::{
    DeployError, DeployResult, FileDescriptor, FileObserver, FileToDelete, FileToDownload,
    FileToUpload, join_remote,
};

/// Which local files take part in an operation, and where they map remotely.
///
/// Remote paths are the file paths relative to `root`.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct FileSelection {
    /// Workspace root.
    pub root: PathBuf,

    /// Glob patterns matched against the file name and the relative path.
    #[builder(default)]
    pub exclude: Vec<String>,

    /// Include hidden files (starting with .).
    #[builder(default = "false")]
    pub include_hidden: bool,
}

impl FileSelectionBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            Some(_) => {}
        }

        if let Some(ref patterns) = self.exclude {
            for pattern in patterns {
                Glob::new(pattern)
                    .map_err(|e| format!("Invalid exclude pattern '{pattern}': {e}"))?;
            }
        }
        Ok(())
    }
}

impl FileSelection {
    pub fn builder() -> FileSelectionBuilder {
        FileSelectionBuilder::default()
    }

    /// Select everything below `root`, hidden files excluded.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude: Vec::new(),
            include_hidden: false,
        }
    }

    fn glob_set(&self) -> DeployResult<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            let glob = Glob::new(pattern).map_err(|e| {
                DeployError::config(format!("Invalid exclude pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| DeployError::config(e.to_string()))
    }

    /// Path of `path` relative to the root, with `/` separators.
    pub fn relative(&self, path: &Path) -> DeployResult<String> {
        let absolute = self.absolute(path);
        let relative = absolute.strip_prefix(&self.root).map_err(|_| {
            DeployError::config(format!(
                "{} is outside of the workspace {}",
                absolute.display(),
                self.root.display()
            ))
        })?;

        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(join_remote(&parts.iter().map(String::as_str).collect::<Vec<_>>()))
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        // Collecting components drops interior `.` segments.
        self.root.join(path).components().collect()
    }

    fn is_excluded(&self, globs: &GlobSet, relative: &str) -> bool {
        let name = relative.rsplit('/').next().unwrap_or(relative);
        globs.is_match(relative) || globs.is_match(name)
    }

    /// Expand `inputs` (files or directories, relative to the root) into a
    /// sorted, deduplicated list of files.
    ///
    /// Directories are walked recursively. This blocks; run it on a
    /// blocking task from async code.
    pub fn collect(&self, inputs: &[PathBuf]) -> DeployResult<Vec<PathBuf>> {
        let globs = self.glob_set()?;
        let mut files = Vec::new();

        for input in inputs {
            let path = self.absolute(input);
            let metadata = std::fs::metadata(&path).map_err(|e| DeployError::io(&path, e))?;

            if metadata.is_file() {
                if !self.is_excluded(&globs, &self.relative(&path)?) {
                    files.push(path);
                }
                continue;
            }

            let walker = WalkDir::new(&path)
                .parallelism(Parallelism::Serial)
                .skip_hidden(!self.include_hidden)
                .sort(true);

            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(err) => {
                        tracing::warn!(target: "selection", "skipping unreadable entry: {err}");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }

                let file = entry.path();
                if !self.is_excluded(&globs, &self.relative(&file)?) {
                    files.push(file);
                }
            }
        }

        files.sort();
        files.dedup();
        tracing::debug!(target: "selection", files = files.len(), "collected local files");
        Ok(files)
    }

    fn descriptor(&self, relative: &str, observer: &Arc<dyn FileObserver>) -> FileDescriptor {
        FileDescriptor::from_relative(relative)
            .with_local_path(self.absolute(Path::new(relative)))
            .with_observer(Arc::clone(observer))
    }

    /// Upload descriptors for local files.
    pub fn uploads(
        &self,
        files: &[PathBuf],
        observer: Arc<dyn FileObserver>,
    ) -> DeployResult<Vec<FileToUpload>> {
        files
            .iter()
            .map(|path| {
                let relative = self.relative(path)?;
                let local = self.absolute(path);
                Ok(FileToUpload::from_local(self.descriptor(&relative, &observer), local))
            })
            .collect()
    }

    /// Download descriptors for remote-relative paths; pulled data belongs
    /// at the same path below the root.
    pub fn downloads(
        &self,
        relative: &[String],
        observer: Arc<dyn FileObserver>,
    ) -> Vec<FileToDownload> {
        relative
            .iter()
            .map(|r| FileToDownload::new(self.descriptor(r, &observer)))
            .collect()
    }

    /// Delete descriptors for remote-relative paths.
    pub fn deletions(
        &self,
        relative: &[String],
        observer: Arc<dyn FileObserver>,
    ) -> Vec<FileToDelete> {
        relative
            .iter()
            .map(|r| FileToDelete::new(self.descriptor(r, &observer)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use shipwright_core::NoopObserver;

    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("css")).unwrap();
        std::fs::create_dir_all(dir.path().join("logs")).unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>").unwrap();
        std::fs::write(dir.path().join("css/site.css"), "body {}").unwrap();
        std::fs::write(dir.path().join("logs/debug.log"), "...").unwrap();
        std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        dir
    }

    #[test]
    fn test_builder_rejects_bad_glob() {
        let result = FileSelection::builder()
            .root("/srv")
            .exclude(vec!["[".to_string()])
            .build();
        assert!(result.is_err());

        assert!(FileSelection::builder().build().is_err());
    }

    #[test]
    fn test_collect_walks_directories() {
        let dir = tree();
        let selection = FileSelection::builder()
            .root(dir.path())
            .exclude(vec!["*.log".to_string()])
            .build()
            .unwrap();

        let files = selection.collect(&[PathBuf::from(".")]).unwrap();
        let relative: Vec<_> = files.iter().map(|f| selection.relative(f).unwrap()).collect();
        assert_eq!(relative, ["css/site.css", "index.html"]);
    }

    #[test]
    fn test_hidden_files_opt_in() {
        let dir = tree();
        let selection = FileSelection::builder()
            .root(dir.path())
            .include_hidden(true)
            .build()
            .unwrap();

        let files = selection.collect(&[PathBuf::from(".")]).unwrap();
        assert!(files.iter().any(|f| f.ends_with(".env")));
    }

    #[test]
    fn test_outside_root_is_rejected() {
        let dir = tree();
        let selection = FileSelection::new(dir.path().join("css"));
        assert!(selection.relative(&dir.path().join("index.html")).is_err());
    }

    #[test]
    fn test_descriptors() {
        let dir = tree();
        let selection = FileSelection::new(dir.path());
        let observer: Arc<dyn FileObserver> = Arc::new(NoopObserver);

        let uploads = selection
            .uploads(&[PathBuf::from("css/site.css")], observer.clone())
            .unwrap();
        assert_eq!(uploads[0].name(), "site.css");
        assert_eq!(uploads[0].path(), "css");

        let downloads = selection.downloads(&["css/site.css".to_string()], observer);
        assert_eq!(downloads[0].local_path(), Some(dir.path().join("css/site.css").as_path()));
    }
}
