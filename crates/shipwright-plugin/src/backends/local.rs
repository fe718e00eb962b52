//! `local`: a directory on this machine.
//!
//! Settings: `dir` (relative paths resolve against the workspace root) and
//! `empty` (remove the directory's contents before an upload batch).

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use shipwright_core::{BoxFuture, ClientError, ClientResult, DeployError, DeployResult, Target};

use crate::client::{
    AsyncFileClient, ClientFactory, ConnectionContext, FileSystemInfo, FileSystemKind,
};
use crate::workspace::Workspace;

/// File client over `tokio::fs`, confined to a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileClient {
    root: PathBuf,
}

impl LocalFileClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a remote path (absolute under the root, or root-relative) to a
    /// local path. Parent-directory segments are rejected.
    fn resolve(&self, remote: &str) -> ClientResult<PathBuf> {
        let root = root_string(&self.root);
        let relative = remote
            .strip_prefix(root.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(remote)
            .trim_start_matches('/');

        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(ClientError::InvalidPath {
                        path: remote.to_string(),
                    });
                }
            }
        }
        Ok(path)
    }
}

fn root_string(root: &Path) -> String {
    root.to_string_lossy().replace('\\', "/")
}

impl AsyncFileClient for LocalFileClient {
    fn upload_file<'a>(&'a self, path: &'a str, data: Vec<u8>) -> BoxFuture<'a, ClientResult<()>> {
        Box::pin(async move {
            let local = self.resolve(path)?;
            if let Some(parent) = local.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ClientError::io(path, e))?;
            }
            tokio::fs::write(&local, data)
                .await
                .map_err(|e| ClientError::io(path, e))
        })
    }

    fn download_file<'a>(&'a self, path: &'a str) -> BoxFuture<'a, ClientResult<Vec<u8>>> {
        Box::pin(async move {
            let local = self.resolve(path)?;
            tokio::fs::read(&local).await.map_err(|e| ClientError::io(path, e))
        })
    }

    fn delete_file<'a>(&'a self, path: &'a str) -> BoxFuture<'a, ClientResult<()>> {
        Box::pin(async move {
            let local = self.resolve(path)?;
            tokio::fs::remove_file(&local)
                .await
                .map_err(|e| ClientError::io(path, e))
        })
    }

    fn list_directory<'a>(
        &'a self,
        path: &'a str,
    ) -> BoxFuture<'a, ClientResult<Vec<FileSystemInfo>>> {
        Box::pin(async move {
            let local = self.resolve(path)?;
            let mut dir = tokio::fs::read_dir(&local)
                .await
                .map_err(|e| ClientError::io(path, e))?;

            let mut entries = Vec::new();
            while let Some(entry) = dir.next_entry().await.map_err(|e| ClientError::io(path, e))? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let remote = format!("{}/{}", path.trim_end_matches('/'), name);

                let Ok(metadata) = entry.metadata().await else {
                    entries.push(
                        FileSystemInfo::new(name, FileSystemKind::Unknown).with_path(remote),
                    );
                    continue;
                };

                let kind = if metadata.is_dir() {
                    FileSystemKind::Directory
                } else if metadata.is_file() {
                    FileSystemKind::File
                } else {
                    FileSystemKind::Unknown
                };

                let mut info = FileSystemInfo::new(name, kind).with_path(remote);
                if metadata.is_file() {
                    info = info.with_size(metadata.len());
                }
                if let Ok(modified) = metadata.modified() {
                    info = info.with_modified(DateTime::<Utc>::from(modified));
                }
                entries.push(info);
            }

            entries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(entries)
        })
    }
}

/// Builds [`LocalFileClient`] connections for `local` targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFactory;

impl ClientFactory for LocalFactory {
    fn kind(&self) -> &str {
        "local"
    }

    fn create_context<'a>(
        &'a self,
        target: &'a Target,
        workspace: &'a Workspace,
    ) -> BoxFuture<'a, DeployResult<ConnectionContext>> {
        Box::pin(async move {
            let dir = target.str_setting("dir").ok_or_else(|| {
                DeployError::invalid_target(target.display_name(), "missing 'dir' setting")
            })?;
            let root = workspace.resolve_dir(dir);

            Ok(ConnectionContext::new(
                Box::new(LocalFileClient::new(&root)),
                target.clone(),
                root_string(&root),
            ))
        })
    }

    fn prepare_upload<'a>(
        &'a self,
        conn: &'a ConnectionContext,
    ) -> BoxFuture<'a, DeployResult<()>> {
        Box::pin(async move {
            if conn.target.bool_setting(&["empty"], false) {
                empty_dir(Path::new(conn.root())).await?;
            }
            Ok(())
        })
    }
}

/// Remove everything inside `dir`, keeping `dir` itself.
async fn empty_dir(dir: &Path) -> DeployResult<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(DeployError::io(dir, e)),
    };

    while let Some(entry) = entries.next_entry().await.map_err(|e| DeployError::io(dir, e))? {
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .await
            .map_err(|e| DeployError::io(&path, e))?
            .is_dir();

        let removed = if is_dir {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        removed.map_err(|e| DeployError::io(&path, e))?;
    }

    tracing::debug!(target: "connection", dir = %dir.display(), "emptied target directory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalFileClient::new(dir.path());
        let root = root_string(dir.path());

        client
            .upload_file(&format!("{root}/css/site.css"), b"body {}".to_vec())
            .await
            .unwrap();
        client.upload_file("index.html", b"<html>".to_vec()).await.unwrap();

        let data = client.download_file(&format!("{root}/css/site.css")).await.unwrap();
        assert_eq!(data, b"body {}");

        let entries = client.list_directory(&root).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert_eq!(
            names,
            [("css", FileSystemKind::Directory), ("index.html", FileSystemKind::File)]
        );
        assert_eq!(entries[1].size, Some(6));

        client.delete_file("index.html").await.unwrap();
        let err = client.download_file("index.html").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_parent_segments_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalFileClient::new(dir.path());

        let err = client.upload_file("../escape.txt", Vec::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidPath { .. }));
    }

    #[tokio::test]
    async fn test_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/deep")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();

        empty_dir(dir.path()).await.unwrap();
        assert!(dir.path().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        empty_dir(&dir.path().join("missing")).await.unwrap();
    }
}
