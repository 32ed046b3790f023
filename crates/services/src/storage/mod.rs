mod local;

pub use local::LocalStorage;

use async_trait::async_trait;

use crate::error::StorageError;

/// A named object inside a storage container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub container: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.container, self.name)
    }
}

/// Object storage holding the audio input and every output container.
///
/// Writes overwrite by name, so repeating a write with the same key is safe.
#[async_trait]
pub trait StorageService: Send + Sync + 'static {
    async fn list(&self, container: &str) -> Result<Vec<ObjectRef>, StorageError>;

    async fn read(&self, object: &ObjectRef) -> Result<Vec<u8>, StorageError>;

    async fn write(&self, container: &str, name: &str, bytes: &[u8]) -> Result<ObjectRef, StorageError>;

    async fn exists(&self, object: &ObjectRef) -> Result<bool, StorageError>;

    /// Deletes an object. Deleting a missing object succeeds.
    async fn delete(&self, object: &ObjectRef) -> Result<(), StorageError>;

    /// The URL handed to providers for this object.
    fn url(&self, object: &ObjectRef) -> String;

    /// Maps a URL produced by [`StorageService::url`] back to its object.
    fn parse_url(&self, url: &str) -> Option<ObjectRef>;

    /// Moves an object. A missing source whose destination already exists
    /// counts as an earlier, completed move.
    async fn move_object(
        &self,
        from: &ObjectRef,
        to_container: &str,
        to_name: &str,
    ) -> Result<ObjectRef, StorageError> {
        let to = ObjectRef::new(to_container, to_name);
        if !self.exists(from).await? {
            if self.exists(&to).await? {
                return Ok(to);
            }
            return Err(StorageError::NotFound {
                container: from.container.clone(),
                name: from.name.clone(),
            });
        }
        let bytes = self.read(from).await?;
        self.write(to_container, to_name, &bytes).await?;
        self.delete(from).await?;
        Ok(to)
    }
}

/// The last path segment of a URL without query string, percent-decoded.
pub fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let segment = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// The file name without its final extension, used as a folder name for
/// consolidated outputs.
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..dot],
    }
}
