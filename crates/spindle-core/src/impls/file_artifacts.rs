//! FileArtifactStore - fragment ソースを一時ファイルとして置く
//!
//! コンテキストはファイルパスから fragment を読み込みます。
//! ディレクトリを指定しない場合は `tempfile::TempDir` を作り、
//! store が drop されたときにディレクトリごと消えます。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tempfile::TempDir;

use crate::domain::errors::ArtifactError;
use crate::domain::ids::ArtifactId;
use crate::ports::{ArtifactHandle, ArtifactStore, ProvisionStrategy};

const FILE_PREFIX: &str = "fragment-";
const FILE_EXTENSION: &str = "script";

pub struct FileArtifactStore {
    root: PathBuf,
    live: Mutex<HashSet<ArtifactId>>,
    // drop 時にディレクトリを削除するために保持するだけ
    _temp_dir: Option<TempDir>,
}

impl FileArtifactStore {
    /// 新しい一時ディレクトリを作って使う
    pub fn temporary() -> Result<Self, ArtifactError> {
        let temp_dir = tempfile::Builder::new()
            .prefix("spindle-")
            .tempdir()
            .map_err(|source| ArtifactError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        Ok(Self {
            root: temp_dir.path().to_path_buf(),
            live: Mutex::new(HashSet::new()),
            _temp_dir: Some(temp_dir),
        })
    }

    /// 既存（または新規作成する）ディレクトリを使う
    ///
    /// ディレクトリ自体は store が drop されても残ります。
    pub fn in_dir(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| ArtifactError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root,
            live: Mutex::new(HashSet::new()),
            _temp_dir: None,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: ArtifactId) -> PathBuf {
        self.root
            .join(format!("{FILE_PREFIX}{}.{FILE_EXTENSION}", id.as_ulid()))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn put(&self, id: ArtifactId, source: &str) -> Result<ArtifactHandle, ArtifactError> {
        let path = self.path_for(id);
        fs::write(&path, source).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        Ok(ArtifactHandle::on_disk(id, path))
    }

    fn load(&self, handle: &ArtifactHandle) -> Result<String, ArtifactError> {
        let path = handle
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.path_for(handle.id()));
        fs::read_to_string(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ArtifactError::NotFound(handle.id()),
            _ => ArtifactError::Io { path, source },
        })
    }

    fn delete(&self, handle: &ArtifactHandle) -> Result<(), ArtifactError> {
        let path = handle
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.path_for(handle.id()));
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id());
        fs::remove_file(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ArtifactError::NotFound(handle.id()),
            _ => ArtifactError::Io { path, source },
        })
    }

    fn live(&self) -> usize {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn strategy(&self) -> ProvisionStrategy {
        ProvisionStrategy::TempFile
    }
}
