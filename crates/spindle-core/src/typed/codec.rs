//! Codec - 引数リストと戻り値を転送用の `serde_json::Value` と相互変換
//!
//! - 引数: メッセージは JSON 配列（位置引数のリスト）
//! - 戻り値: `Serialize` できる値なら何でもよい。`()` は `null` になる

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::errors::TaskError;

/// Reads positional arguments one by one.
///
/// 足りない引数は `null` として読まれるので、`Option<T>` の引数は省略できます。
pub(crate) struct ArgReader {
    args: std::vec::IntoIter<Value>,
    position: usize,
}

impl ArgReader {
    pub(crate) fn new(args: Vec<Value>) -> Self {
        Self {
            args: args.into_iter(),
            position: 0,
        }
    }

    pub(crate) fn next<T: DeserializeOwned>(&mut self) -> Result<T, TaskError> {
        let position = self.position;
        self.position += 1;
        let value = self.args.next().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|err| TaskError::InvalidArgument {
            position,
            message: err.to_string(),
        })
    }
}

/// Decodes the whole argument list at once (used by `TaskFn::Args`).
///
/// 空のリストは `null` としても読むので、`type Args = ()` は引数なしで呼べます。
pub(crate) fn decode_args<T: DeserializeOwned>(args: Vec<Value>) -> Result<T, TaskError> {
    if args.is_empty() {
        if let Ok(unit) = serde_json::from_value(Value::Null) {
            return Ok(unit);
        }
    }
    serde_json::from_value(Value::Array(args)).map_err(|err| TaskError::InvalidArgument {
        position: 0,
        message: err.to_string(),
    })
}

pub(crate) fn encode_output<T: Serialize>(output: T) -> Result<Value, TaskError> {
    serde_json::to_value(output).map_err(|err| TaskError::Untransferable(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use serde_json::json;

    #[test]
    fn reader_pads_with_null() {
        let mut reader = ArgReader::new(vec![json!(1)]);
        assert_eq!(reader.next::<i64>().unwrap(), 1);
        assert_eq!(reader.next::<Option<i64>>().unwrap(), None);
        assert!(matches!(
            reader.next::<i64>(),
            Err(TaskError::InvalidArgument { position: 2, .. })
        ));
    }

    #[test]
    fn decode_tuple_from_list() {
        let (a, b): (String, u8) = decode_args(vec![json!("x"), json!(2)]).unwrap();
        assert_eq!((a.as_str(), b), ("x", 2));
        assert!(decode_args::<(String, u8)>(vec![json!("x")]).is_err());
    }

    #[test]
    fn unit_args_accept_an_empty_list() {
        decode_args::<()>(Vec::new()).unwrap();
        let empty: Vec<i64> = decode_args(Vec::new()).unwrap();
        assert!(empty.is_empty());
        assert!(decode_args::<()>(vec![json!(1)]).is_err());
    }

    #[test]
    fn encode_rejects_non_string_map_keys() {
        assert_eq!(encode_output(()).unwrap(), Value::Null);

        let mut map = HashMap::new();
        map.insert(vec![1u8], "bytes as key");
        assert!(matches!(
            encode_output(map),
            Err(TaskError::Untransferable(_))
        ));
    }
}
