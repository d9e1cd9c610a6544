//! Fragment rendering for script callables.

use std::collections::HashSet;

pub const DEFAULT_BINDING: &str = "__spindle_task";

/// Picks the first binding name that does not occur as a word in the
/// callable's source: `__spindle_task`, `__spindle_task_1`, `__spindle_task_2`, ...
///
/// 文字列やコメントの中の単語も「使用済み」として数えます（避けすぎても害はない）。
pub fn choose_binding(callable_source: &str) -> String {
    let taken: HashSet<&str> = callable_source
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .filter(|word| !word.is_empty())
        .collect();

    if !taken.contains(DEFAULT_BINDING) {
        return DEFAULT_BINDING.to_string();
    }
    (1..)
        .map(|n| format!("{DEFAULT_BINDING}_{n}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_default()
}

/// Renders the fragment program: the callable source verbatim under `binding`,
/// wired to the message channel.
///
/// ソースは改行で閉じるので、末尾の `//` コメントが後続の行を食べることはありません。
pub fn render(binding: &str, callable_source: &str) -> String {
    format!(
        "const {binding} = {callable_source}\n;\nonmessage((message) => postMessage({binding}(...message)));\n"
    )
}
