use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{ObjectRef, StorageService};
use crate::error::StorageError;

const TEMP_MARKER: &str = ".tmp-";

/// Filesystem-backed storage: one directory per container under `root`.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, container: &str, name: &str) -> Result<PathBuf, StorageError> {
        validate_segment_path(container)?;
        validate_segment_path(name)?;
        Ok(self.root.join(container).join(name))
    }

    fn base_url(&self) -> String {
        let absolute = std::path::absolute(&self.root).unwrap_or_else(|_| self.root.clone());
        format!("file://{}", absolute.display().to_string().trim_end_matches('/'))
    }
}

fn validate_segment_path(value: &str) -> Result<(), StorageError> {
    let path = Path::new(value);
    let valid = !value.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(value.to_string()))
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn list(&self, container: &str) -> Result<Vec<ObjectRef>, StorageError> {
        validate_segment_path(container)?;
        let base = self.root.join(container);
        let mut objects = Vec::new();
        let mut pending = vec![base.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&base) else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if name.contains(TEMP_MARKER) {
                    continue;
                }
                objects.push(ObjectRef::new(container, name));
            }
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    async fn read(&self, object: &ObjectRef) -> Result<Vec<u8>, StorageError> {
        let path = self.path_of(&object.container, &object.name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                container: object.container.clone(),
                name: object.name.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, container: &str, name: &str, bytes: &[u8]) -> Result<ObjectRef, StorageError> {
        let path = self.path_of(container, name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so readers never observe a partial object.
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = path.with_file_name(format!("{file_name}{TEMP_MARKER}{}", uuid::Uuid::new_v4()));
        fs::write(&temp, bytes).await?;
        fs::rename(&temp, &path).await?;

        debug!(container, name, bytes = bytes.len(), "Object written");
        Ok(ObjectRef::new(container, name))
    }

    async fn exists(&self, object: &ObjectRef) -> Result<bool, StorageError> {
        let path = self.path_of(&object.container, &object.name)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn delete(&self, object: &ObjectRef) -> Result<(), StorageError> {
        let path = self.path_of(&object.container, &object.name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, object: &ObjectRef) -> String {
        let encoded = object
            .name
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}/{}", self.base_url(), object.container, encoded)
    }

    fn parse_url(&self, url: &str) -> Option<ObjectRef> {
        let rest = url.strip_prefix(&self.base_url())?.strip_prefix('/')?;
        let (container, name) = rest.split_once('/')?;
        let name = urlencoding::decode(name).ok()?.into_owned();
        Some(ObjectRef::new(container, name))
    }
}
