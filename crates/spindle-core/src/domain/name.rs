//! FunctionName - registry のキー
//!
//! 名前は空でない文字列であれば何でもよい。ファイル名には使わない
//! （artifact のファイル名は ArtifactId から作る）ので、文字種の制限はない。

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use super::errors::SpindleError;

/// Registry に登録された関数の名前
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionName(String);

impl FunctionName {
    /// 名前を検証して作成
    ///
    /// 空文字列は `SpindleError::InvalidName` になります。
    pub fn parse(value: impl Into<String>) -> Result<Self, SpindleError> {
        let value = value.into();
        if value.is_empty() {
            return Err(SpindleError::InvalidName {
                name: value,
                reason: "name must not be empty",
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FunctionName {
    type Error = SpindleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<FunctionName> for String {
    fn from(name: FunctionName) -> Self {
        name.0
    }
}

// HashMap<FunctionName, _> を &str で引けるように
impl Borrow<str> for FunctionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
