//! Domain model (ids, names, errors, context events).
//!
//! 実行や保存の仕組みには依存しない型だけを置きます。

pub mod errors;
pub mod events;
pub mod ids;
pub mod name;

pub use self::errors::{ArtifactError, ErrorKind, FaultCause, FaultKind, SpindleError, TaskError};
pub use self::events::ContextEvent;
pub use self::ids::{ArtifactId, ContextId};
pub use self::name::FunctionName;
