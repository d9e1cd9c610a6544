//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryArtifactStore**: プロセス内メモリ（デフォルト）
//! - **FileArtifactStore**: 一時ディレクトリ上のファイル

pub mod file_artifacts;
pub mod inmem_artifacts;

pub use self::file_artifacts::FileArtifactStore;
pub use self::inmem_artifacts::InMemoryArtifactStore;
