use std::path::{Component, Path, PathBuf};

use super::ScriptError;

/// Read-only object storage addressed by bucket and key.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// Fetch an object as UTF-8 text.
    async fn get_text(&self, bucket: &str, key: &str) -> Result<String, ScriptError>;
}

/// [`ObjectStore`] backed by a local directory: bucket `b`, key `k/x.sql`
/// reads `<root>/b/k/x.sql`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, ScriptError> {
        let escapes = |p: &str| {
            p.is_empty()
                || Path::new(p)
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        };
        if escapes(bucket) || bucket.contains(['/', '\\']) || escapes(key) {
            return Err(ScriptError::object(bucket, key, "invalid bucket or key"));
        }
        Ok(self.root.join(bucket).join(key))
    }
}

impl ObjectStore for LocalObjectStore {
    async fn get_text(&self, bucket: &str, key: &str) -> Result<String, ScriptError> {
        let path = self.object_path(bucket, key)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ScriptError::object(bucket, key, format!("{}: {e}", path.display())))?;
        String::from_utf8(bytes).map_err(|e| ScriptError::object(bucket, key, e.to_string()))
    }
}
