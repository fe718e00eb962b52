//! Per-file descriptors travelling through an operation.
//!
//! A descriptor names one file (`path` + `name`, remote-relative) and carries
//! an observer that receives exactly one `before` and one `completed` call for
//! every concrete target that actually attempts the file.

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::BoxFuture;
use crate::error::{DeployError, DeployResult};
use crate::mapping::{PathMapping, apply_mappings, join_remote, normalize_remote_path};

/// Receives lifecycle callbacks for a file.
pub trait FileObserver: Send + Sync {
    /// Called right before the file is transferred. `destination` is the
    /// target-local path the file is written to or read from.
    fn before(&self, _file: &FileDescriptor, _destination: Option<&str>) {}

    /// Called once the file has been handled. Downloads carry their data.
    fn completed(&self, _file: &FileDescriptor, _result: Result<Option<&[u8]>, &DeployError>) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FileObserver for NoopObserver {}

/// Forwards callbacks of a remapped copy to the caller's original descriptor.
struct ForwardingObserver {
    original: FileDescriptor,
}

impl FileObserver for ForwardingObserver {
    fn before(&self, _file: &FileDescriptor, destination: Option<&str>) {
        self.original.notify_before(destination);
    }

    fn completed(&self, _file: &FileDescriptor, result: Result<Option<&[u8]>, &DeployError>) {
        self.original.notify_completed(result);
    }
}

/// A single file in a batch.
#[derive(Clone)]
pub struct FileDescriptor {
    name: String,
    path: String,
    local_path: Option<PathBuf>,
    observer: Arc<dyn FileObserver>,
}

impl FileDescriptor {
    /// Create a descriptor for `name` inside the remote-relative directory `path`.
    pub fn new(name: impl Into<String>, path: &str) -> Self {
        Self {
            name: name.into(),
            path: normalize_remote_path(path),
            local_path: None,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Create a descriptor from a full remote-relative path like `css/site.css`.
    pub fn from_relative(relative: &str) -> Self {
        let normalized = normalize_remote_path(relative);
        match normalized.rsplit_once('/') {
            Some((dir, name)) => Self::new(name, dir),
            None => Self::new(normalized, ""),
        }
    }

    /// Attach the local file this descriptor corresponds to.
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    /// Attach an observer for lifecycle callbacks.
    pub fn with_observer(mut self, observer: Arc<dyn FileObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Leaf file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote-relative directory (no leading or trailing slash).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Local file, if known.
    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    /// `path/name`.
    pub fn relative_path(&self) -> String {
        join_remote(&[&self.path, &self.name])
    }

    /// Fire the `before` callback.
    pub fn notify_before(&self, destination: Option<&str>) {
        self.observer.before(self, destination);
    }

    /// Fire the `completed` callback.
    pub fn notify_completed(&self, result: Result<Option<&[u8]>, &DeployError>) {
        self.observer.completed(self, result);
    }

    /// Copy of this descriptor with the target's path mappings applied.
    ///
    /// Callbacks on the copy are forwarded to this descriptor, so the caller
    /// observes the target-local destination on its own file.
    pub fn remapped(&self, mappings: &[PathMapping]) -> DeployResult<Self> {
        Ok(Self {
            name: self.name.clone(),
            path: apply_mappings(&self.path, mappings)?,
            local_path: self.local_path.clone(),
            observer: Arc::new(ForwardingObserver {
                original: self.clone(),
            }),
        })
    }
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDescriptor")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("local_path", &self.local_path)
            .finish_non_exhaustive()
    }
}

/// A file to delete on a target.
#[derive(Debug, Clone)]
pub struct FileToDelete {
    file: FileDescriptor,
}

impl FileToDelete {
    /// Wrap a descriptor.
    pub fn new(file: FileDescriptor) -> Self {
        Self { file }
    }

    /// Underlying descriptor.
    pub fn descriptor(&self) -> &FileDescriptor {
        &self.file
    }

    /// See [`FileDescriptor::remapped`].
    pub fn remapped(&self, mappings: &[PathMapping]) -> DeployResult<Self> {
        Ok(Self::new(self.file.remapped(mappings)?))
    }
}

impl Deref for FileToDelete {
    type Target = FileDescriptor;

    fn deref(&self) -> &FileDescriptor {
        &self.file
    }
}

impl From<FileDescriptor> for FileToDelete {
    fn from(file: FileDescriptor) -> Self {
        Self::new(file)
    }
}

/// A file to pull from a target.
#[derive(Debug, Clone)]
pub struct FileToDownload {
    file: FileDescriptor,
}

impl FileToDownload {
    /// Wrap a descriptor.
    pub fn new(file: FileDescriptor) -> Self {
        Self { file }
    }

    /// Underlying descriptor.
    pub fn descriptor(&self) -> &FileDescriptor {
        &self.file
    }

    /// See [`FileDescriptor::remapped`].
    pub fn remapped(&self, mappings: &[PathMapping]) -> DeployResult<Self> {
        Ok(Self::new(self.file.remapped(mappings)?))
    }
}

impl Deref for FileToDownload {
    type Target = FileDescriptor;

    fn deref(&self) -> &FileDescriptor {
        &self.file
    }
}

impl From<FileDescriptor> for FileToDownload {
    fn from(file: FileDescriptor) -> Self {
        Self::new(file)
    }
}

/// A file to deploy to a target, with a lazy content accessor.
#[derive(Clone)]
pub struct FileToUpload {
    file: FileDescriptor,
    source: Arc<dyn ContentSource>,
    transformer: Option<Arc<dyn DataTransformer>>,
}

impl FileToUpload {
    /// Create an upload reading from `source`.
    pub fn new(file: FileDescriptor, source: Arc<dyn ContentSource>) -> Self {
        Self {
            file,
            source,
            transformer: None,
        }
    }

    /// Create an upload reading from a local file, also recorded as the
    /// descriptor's local path.
    pub fn from_local(file: FileDescriptor, local: impl Into<PathBuf>) -> Self {
        let local = local.into();
        Self::new(
            file.with_local_path(local.clone()),
            Arc::new(LocalSource::new(local)),
        )
    }

    /// Pass content through `transformer` before it is handed to a plugin.
    pub fn with_transformer(mut self, transformer: Arc<dyn DataTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Underlying descriptor.
    pub fn descriptor(&self) -> &FileDescriptor {
        &self.file
    }

    /// Read (and transform) the content to upload.
    pub async fn read(&self) -> DeployResult<Vec<u8>> {
        let data = self.source.read().await?;
        match &self.transformer {
            Some(transformer) => {
                let context = TransformContext {
                    name: self.file.name().to_string(),
                    path: self.file.path().to_string(),
                };
                transformer.transform(data, &context)
            }
            None => Ok(data),
        }
    }

    /// See [`FileDescriptor::remapped`].
    pub fn remapped(&self, mappings: &[PathMapping]) -> DeployResult<Self> {
        Ok(Self {
            file: self.file.remapped(mappings)?,
            source: Arc::clone(&self.source),
            transformer: self.transformer.clone(),
        })
    }
}

impl Deref for FileToUpload {
    type Target = FileDescriptor;

    fn deref(&self) -> &FileDescriptor {
        &self.file
    }
}

impl fmt::Debug for FileToUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileToUpload")
            .field("file", &self.file)
            .field("transformed", &self.transformer.is_some())
            .finish_non_exhaustive()
    }
}

/// Where upload content comes from.
pub trait ContentSource: Send + Sync {
    /// Read the full content.
    fn read(&self) -> BoxFuture<'_, DeployResult<Vec<u8>>>;
}

/// Content read from a local file.
#[derive(Debug, Clone)]
pub struct LocalSource {
    path: PathBuf,
}

impl LocalSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContentSource for LocalSource {
    fn read(&self) -> BoxFuture<'_, DeployResult<Vec<u8>>> {
        Box::pin(async move {
            tokio::fs::read(&self.path)
                .await
                .map_err(|e| DeployError::io(&self.path, e))
        })
    }
}

/// In-memory content.
#[derive(Debug, Clone)]
pub struct BytesSource(Arc<[u8]>);

impl BytesSource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self(data.into())
    }
}

impl ContentSource for BytesSource {
    fn read(&self) -> BoxFuture<'_, DeployResult<Vec<u8>>> {
        let data = self.0.to_vec();
        Box::pin(async move { Ok(data) })
    }
}

/// Information handed to a [`DataTransformer`].
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// File name.
    pub name: String,
    /// Remote-relative directory.
    pub path: String,
}

/// Rewrites file content before it is transferred.
pub trait DataTransformer: Send + Sync {
    fn transform(&self, data: Vec<u8>, context: &TransformContext) -> DeployResult<Vec<u8>>;
}

impl<F> DataTransformer for F
where
    F: Fn(Vec<u8>, &TransformContext) -> DeployResult<Vec<u8>> + Send + Sync,
{
    fn transform(&self, data: Vec<u8>, context: &TransformContext) -> DeployResult<Vec<u8>> {
        self(data, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl FileObserver for Recorder {
        fn before(&self, file: &FileDescriptor, destination: Option<&str>) {
            self.events.lock().unwrap().push(format!(
                "before {} -> {}",
                file.relative_path(),
                destination.unwrap_or("-")
            ));
        }

        fn completed(&self, file: &FileDescriptor, result: Result<Option<&[u8]>, &DeployError>) {
            self.events.lock().unwrap().push(format!(
                "completed {} ok={}",
                file.relative_path(),
                result.is_ok()
            ));
        }
    }

    #[test]
    fn test_from_relative() {
        let file = FileDescriptor::from_relative("/css/theme/site.css");
        assert_eq!(file.name(), "site.css");
        assert_eq!(file.path(), "css/theme");

        let file = FileDescriptor::from_relative("index.html");
        assert_eq!(file.name(), "index.html");
        assert_eq!(file.path(), "");
    }

    #[test]
    fn test_remapped_forwards_to_original() {
        let recorder = Arc::new(Recorder::default());
        let file = FileDescriptor::new("a.txt", "src").with_observer(recorder.clone());

        let mapped = file.remapped(&[PathMapping::new("src", "www")]).unwrap();
        assert_eq!(mapped.path(), "www");

        mapped.notify_before(Some("www/a.txt"));
        mapped.notify_completed(Ok(None));

        let events = recorder.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["before src/a.txt -> www/a.txt", "completed src/a.txt ok=true"]
        );
    }

    #[tokio::test]
    async fn test_upload_read_with_transformer() {
        let upload = FileToUpload::new(
            FileDescriptor::new("a.txt", ""),
            Arc::new(BytesSource::new(b"hello".to_vec())),
        )
        .with_transformer(Arc::new(
            |data: Vec<u8>, _: &TransformContext| -> DeployResult<Vec<u8>> {
                Ok(data.to_ascii_uppercase())
            },
        ));

        assert_eq!(upload.read().await.unwrap(), b"HELLO");
    }

    #[tokio::test]
    async fn test_local_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let upload = FileToUpload::from_local(
            FileDescriptor::new("missing.txt", ""),
            dir.path().join("missing.txt"),
        );
        assert!(matches!(upload.read().await, Err(DeployError::Io { .. })));
    }
}
