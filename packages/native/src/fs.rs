use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skiff_core::{check_put_size, Error, ObjectInfo, StorageProvider};

const BACKEND: &str = "local-fs";
const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";

/// Local-filesystem storage: a bucket is a directory under the configured
/// root, an object is a file plus a JSON metadata sidecar.
pub struct FsStorage {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObjectMeta {
    content_type: Option<String>,
    etag: String,
    uploaded_at: DateTime<Utc>,
}

impl FsStorage {
    pub fn new(root: PathBuf) -> Result<Self, Error> {
        std::fs::create_dir_all(&root).map_err(|err| {
            Error::connectivity(format!(
                "failed to create storage root {}: {err}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, Error> {
        check_name(bucket, "bucket name")?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, Error> {
        check_name(key, "object key")?;
        Ok(self.bucket_dir(bucket)?.join(OBJECTS_DIR).join(key))
    }

    fn meta_path(&self, bucket: &str, key: &str) -> Result<PathBuf, Error> {
        check_name(key, "object key")?;
        Ok(self
            .bucket_dir(bucket)?
            .join(META_DIR)
            .join(format!("{key}.json")))
    }

    fn require_bucket(&self, bucket: &str) -> Result<PathBuf, Error> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Err(Error::not_found(format!("bucket '{bucket}' does not exist")));
        }
        Ok(dir)
    }

    fn read_meta(&self, bucket: &str, key: &str) -> Option<ObjectMeta> {
        let path = self.meta_path(bucket, key).ok()?;
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Rejects names that could escape the storage root.
fn check_name(name: &str, what: &str) -> Result<(), Error> {
    let traversal = name
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if name.is_empty() || name.contains('\\') || name.starts_with('/') || traversal {
        return Err(Error::encoding(format!("invalid {what}: {name:?}")));
    }
    Ok(())
}

fn io_error(context: &str, err: std::io::Error) -> Error {
    Error::backend(format!("{context}: {err}"))
}

#[async_trait(?Send)]
impl StorageProvider for FsStorage {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), Error> {
        let dir = self.bucket_dir(bucket)?;
        std::fs::create_dir_all(dir.join(OBJECTS_DIR))
            .and_then(|()| std::fs::create_dir_all(dir.join(META_DIR)))
            .map_err(|err| io_error("failed to create bucket", err))
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, Error> {
        Ok(self.bucket_dir(bucket)?.is_dir())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        size: u64,
        content_type: Option<&str>,
    ) -> Result<(), Error> {
        check_put_size(bytes, size)?;
        self.require_bucket(bucket)?;

        let object_path = self.object_path(bucket, key)?;
        let meta_path = self.meta_path(bucket, key)?;
        for path in [&object_path, &meta_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| io_error("failed to create object directory", err))?;
            }
        }

        std::fs::write(&object_path, bytes).map_err(|err| io_error("failed to write object", err))?;

        let meta = ObjectMeta {
            content_type: content_type.map(|value| value.to_string()),
            etag: blake3::hash(bytes).to_hex().to_string(),
            uploaded_at: Utc::now(),
        };
        let encoded = serde_json::to_vec(&meta)
            .map_err(|err| Error::encoding(format!("failed to encode object metadata: {err}")))?;
        std::fs::write(&meta_path, encoded)
            .map_err(|err| io_error("failed to write object metadata", err))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, Error> {
        self.require_bucket(bucket)?;
        let path = self.object_path(bucket, key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found(
                format!("object '{key}' does not exist in bucket '{bucket}'"),
            )),
            Err(err) => Err(io_error("failed to read object", err)),
        }
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, Error> {
        self.require_bucket(bucket)?;
        let path = self.object_path(bucket, key)?;
        let stat = match std::fs::metadata(&path) {
            Ok(stat) => stat,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(format!(
                    "object '{key}' does not exist in bucket '{bucket}'"
                )))
            }
            Err(err) => return Err(io_error("failed to stat object", err)),
        };

        let meta = self.read_meta(bucket, key);
        Ok(ObjectInfo {
            key: key.to_string(),
            size: stat.len(),
            content_type: meta.as_ref().and_then(|meta| meta.content_type.clone()),
            etag: meta.map(|meta| meta.etag),
            last_modified: stat
                .modified()
                .ok()
                .map(|modified| DateTime::<Utc>::from(modified)),
        })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ObjectInfo>, Error> {
        self.require_bucket(bucket)?;
        let objects_dir = self.bucket_dir(bucket)?.join(OBJECTS_DIR);
        let mut keys = Vec::new();
        collect_keys(&objects_dir, &objects_dir, &mut keys)?;
        keys.retain(|key| prefix.map_or(true, |prefix| key.starts_with(prefix)));
        keys.sort();

        let mut infos = Vec::with_capacity(keys.len());
        for key in keys {
            infos.push(self.head_object(bucket, &key).await?);
        }
        Ok(infos)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error> {
        self.require_bucket(bucket)?;
        let path = self.object_path(bucket, key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                let _ = std::fs::remove_file(self.meta_path(bucket, key)?);
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found(
                format!("object '{key}' does not exist in bucket '{bucket}'"),
            )),
            Err(err) => Err(io_error("failed to delete object", err)),
        }
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), Error> {
        let dir = self.require_bucket(bucket)?;
        std::fs::remove_dir_all(dir).map_err(|err| io_error("failed to delete bucket", err))
    }
}

fn collect_keys(base: &Path, dir: &Path, keys: &mut Vec<String>) -> Result<(), Error> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(io_error("failed to list objects", err)),
    };
    for entry in entries {
        let entry = entry.map_err(|err| io_error("failed to list objects", err))?;
        let path = entry.path();
        if path.is_dir() {
            collect_keys(base, &path, keys)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            // Keys use '/' separators regardless of platform.
            let key = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            keys.push(key);
        }
    }
    Ok(())
}
