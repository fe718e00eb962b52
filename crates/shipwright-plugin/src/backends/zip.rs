//! `zip`: pack an upload batch into a timestamped archive.
//!
//! The archive is written to `<dir>/<workspace>_<YYYYMMDD_HHMMSS>.zip`,
//! `dir` defaulting to the workspace root. Entries keep their remote path.

use std::io::{BufWriter, Seek, Write};
use std::path::PathBuf;

use chrono::Local;
use shipwright_core::{BoxFuture, DeployError, DeployResult, FileToUpload, Target, join_remote};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::capability::Capabilities;
use crate::context::{FilesContext, PluginContext};
use crate::plugin::Plugin;
use crate::workspace::Workspace;

/// Upload-only plugin writing zip archives.
#[derive(Debug, Clone, Default)]
pub struct ZipPlugin {
    context: PluginContext,
}

impl ZipPlugin {
    pub fn new(context: PluginContext) -> Self {
        Self { context }
    }

    /// Archive file a batch for `target` is written to.
    pub fn archive_path(target: &Target, workspace: &Workspace) -> PathBuf {
        let dir = target.str_setting("dir").unwrap_or(".");
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        workspace
            .resolve_dir(dir)
            .join(format!("{}_{stamp}.zip", workspace.name()))
    }

    /// Stream the batch into a new archive file.
    ///
    /// The archive file is created before the first callback fires, so an
    /// unwritable destination fails the batch without reporting any file.
    /// Each file is read after its `before` callback and completed once its
    /// entry is written.
    async fn pack(&self, ctx: FilesContext<'_, FileToUpload>) -> DeployResult<()> {
        if ctx.files.is_empty() {
            return Ok(());
        }

        let path = Self::archive_path(ctx.target, ctx.workspace);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DeployError::io(parent, e))?;
        }
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| DeployError::io(&path, e))?
            .into_std()
            .await;

        let mut writer = ZipWriter::new(BufWriter::new(file));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        let mut packed = 0usize;

        for file in &ctx.files {
            if ctx.is_cancelling() {
                tracing::debug!(target: "zip", "cancelled, skipping remaining files");
                break;
            }

            let entry = join_remote(&[file.path(), file.name()]);
            file.notify_before(Some(&entry));

            let added = match file.read().await {
                Ok(data) => add_entry(&mut writer, &entry, &data, options),
                Err(err) => Err(err),
            };
            match added {
                Ok(()) => {
                    packed += 1;
                    file.notify_completed(Ok(None));
                }
                Err(err) => {
                    tracing::warn!(target: "zip", entry = %entry, "{err}");
                    file.notify_completed(Err(&err));
                }
            }
        }

        let finished = writer
            .finish()
            .map_err(|e| archive_error("archive", e))
            .and_then(|mut out| out.flush().map_err(|e| DeployError::io(&path, e)));

        if packed == 0 || finished.is_err() {
            if let Err(err) = tokio::fs::remove_file(&path).await {
                tracing::warn!(
                    target: "zip",
                    archive = %path.display(),
                    "failed to remove archive: {err}"
                );
            }
            return finished;
        }

        tracing::info!(target: "zip", archive = %path.display(), files = packed, "archive written");
        self.context
            .output(format!("[zip] {} file(s) packed into {}", packed, path.display()));
        Ok(())
    }
}

fn add_entry<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    entry: &str,
    data: &[u8],
    options: SimpleFileOptions,
) -> DeployResult<()> {
    writer
        .start_file(entry, options)
        .map_err(|e| archive_error(entry, e))?;
    writer.write_all(data).map_err(|e| archive_error(entry, e))
}

fn archive_error(entry: &str, err: impl std::fmt::Display) -> DeployError {
    DeployError::Archive {
        message: format!("{entry}: {err}"),
    }
}

impl Plugin for ZipPlugin {
    fn kind(&self) -> &str {
        "zip"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::UPLOAD
    }

    fn upload_files<'a>(
        &'a self,
        ctx: FilesContext<'a, FileToUpload>,
    ) -> BoxFuture<'a, DeployResult<()>> {
        Box::pin(self.pack(ctx))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::{Arc, Mutex};

    use shipwright_core::{BytesSource, FileDescriptor, FileObserver};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::registry::PluginRegistry;

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl FileObserver for Calls {
        fn before(&self, file: &FileDescriptor, _destination: Option<&str>) {
            self.0.lock().unwrap().push(format!("before:{}", file.name()));
        }

        fn completed(&self, file: &FileDescriptor, result: Result<Option<&[u8]>, &DeployError>) {
            let outcome = if result.is_ok() { "ok" } else { "err" };
            self.0
                .lock()
                .unwrap()
                .push(format!("completed:{}:{outcome}", file.name()));
        }
    }

    fn observed(name: &str, content: &[u8], calls: &Arc<Calls>) -> FileToUpload {
        FileToUpload::new(
            FileDescriptor::new(name, "").with_observer(calls.clone()),
            Arc::new(BytesSource::new(content.to_vec())),
        )
    }

    fn archive_target(dir: &str) -> Target {
        Target::builder()
            .name("Archive")
            .kind("zip")
            .setting("dir", dir)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_batch_becomes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(PluginRegistry::new());
        let ws = Workspace::new("site", dir.path(), registry);
        let target = Target::builder()
            .name("Archive")
            .kind("zip")
            .setting("dir", "dist")
            .build()
            .unwrap();

        let files = vec![
            FileToUpload::new(
                FileDescriptor::new("index.html", ""),
                Arc::new(BytesSource::new(b"<html>".to_vec())),
            ),
            FileToUpload::new(
                FileDescriptor::new("site.css", "css"),
                Arc::new(BytesSource::new(b"body {}".to_vec())),
            ),
        ];

        let plugin = ZipPlugin::default();
        let ctx = FilesContext::new(&target, files, &ws, CancellationToken::new());
        plugin.upload_files(ctx).await.unwrap();

        let archives: Vec<_> = std::fs::read_dir(dir.path().join("dist"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(archives.len(), 1);
        let file_name = archives[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with("site_") && file_name.ends_with(".zip"));

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&archives[0]).unwrap()).unwrap();
        let mut css = String::new();
        archive
            .by_name("css/site.css")
            .unwrap()
            .read_to_string(&mut css)
            .unwrap();
        assert_eq!(css, "body {}");
        assert_eq!(archive.len(), 2);
    }

    #[tokio::test]
    async fn test_callbacks_interleave_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new("site", dir.path(), Arc::new(PluginRegistry::new()));
        let target = archive_target("dist");
        let calls = Arc::new(Calls::default());
        let files = vec![observed("a.txt", b"a", &calls), observed("b.txt", b"b", &calls)];

        let ctx = FilesContext::new(&target, files, &ws, CancellationToken::new());
        ZipPlugin::default().upload_files(ctx).await.unwrap();

        assert_eq!(
            *calls.0.lock().unwrap(),
            ["before:a.txt", "completed:a.txt:ok", "before:b.txt", "completed:b.txt:ok"]
        );
    }

    #[tokio::test]
    async fn test_unwritable_destination_reports_no_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), "not a directory").unwrap();
        let ws = Workspace::new("site", dir.path(), Arc::new(PluginRegistry::new()));
        let target = archive_target("blocker/out");
        let calls = Arc::new(Calls::default());

        let ctx = FilesContext::new(
            &target,
            vec![observed("a.txt", b"a", &calls)],
            &ws,
            CancellationToken::new(),
        );
        let result = ZipPlugin::default().upload_files(ctx).await;

        assert!(matches!(result, Err(DeployError::Io { .. })));
        assert!(calls.0.lock().unwrap().is_empty());
    }
}
