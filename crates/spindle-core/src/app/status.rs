//! Status - ランタイムの状態のスナップショット

use serde::Serialize;

use crate::ports::ProvisionStrategy;

/// RuntimeStatus は `Spindle::status()` の結果
///
/// # 使用例
/// ```ignore
/// let status = spindle.status();
/// println!("{}", serde_json::to_string(&status)?);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeStatus {
    /// まだ結果が出ていない dispatch の数
    pub in_flight: usize,
    /// まだ後片付けの終わっていないコンテキストスレッドの数
    ///
    /// 結果を返した直後のコンテキストも含むので、通常は `in_flight` 以上になります。
    pub live_contexts: usize,
    /// registry のエントリ数
    pub registered: usize,
    /// 削除されていない artifact の数（registry 分と読み込み前の dispatch 分）
    pub live_artifacts: usize,
    pub provisioning: ProvisionStrategy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_as_flat_object() {
        let status = RuntimeStatus {
            in_flight: 1,
            live_contexts: 2,
            registered: 1,
            live_artifacts: 1,
            provisioning: ProvisionStrategy::TempFile,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "in_flight": 1,
                "live_contexts": 2,
                "registered": 1,
                "live_artifacts": 1,
                "provisioning": "temp_file"
            })
        );
    }
}
