//! SpindleConfig - ランタイムの設定
//!
//! JSON（serde_json）から読み込めます。省略したフィールドはデフォルト値になり、
//! 未知のフィールドはエラーです。
//!
//! ```json
//! {
//!   "provisioning": "temp_file",
//!   "artifact_dir": "/var/tmp/spindle",
//!   "thread_name": "spindle-context",
//!   "stack_size": 8388608,
//!   "max_call_depth": 256
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ports::ProvisionStrategy;

pub const DEFAULT_THREAD_NAME: &str = "spindle-context";
pub const DEFAULT_STACK_SIZE: usize = 8 * 1024 * 1024;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

const MIN_STACK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpindleConfig {
    /// fragment ソースの受け渡し方式
    pub provisioning: ProvisionStrategy,
    /// `temp_file` のときの置き場所。`None` なら一時ディレクトリを作る
    pub artifact_dir: Option<PathBuf>,
    /// コンテキストのスレッド名のプレフィックス
    pub thread_name: String,
    /// コンテキストのスレッドのスタックサイズ（バイト）
    pub stack_size: usize,
    /// script の関数呼び出しの深さの上限（boa の recursion limit）
    pub max_call_depth: usize,
}

impl Default for SpindleConfig {
    fn default() -> Self {
        Self {
            provisioning: ProvisionStrategy::default(),
            artifact_dir: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: DEFAULT_STACK_SIZE,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl SpindleConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "thread_name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.thread_name.contains('\0') {
            return Err(ConfigError::Invalid {
                field: "thread_name",
                reason: "must not contain NUL".to_string(),
            });
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::Invalid {
                field: "stack_size",
                reason: format!("must be at least {MIN_STACK_SIZE} bytes"),
            });
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_call_depth",
                reason: "must be positive".to_string(),
            });
        }
        if self.artifact_dir.is_some() && self.provisioning != ProvisionStrategy::TempFile {
            tracing::warn!("artifact_dir is ignored unless provisioning is temp_file");
        }
        Ok(())
    }
}
