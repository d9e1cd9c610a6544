//! Interpreter - 1 つのコンテキストスレッドに閉じた boa の `Context`
//!
//! # 終了の種類
//! - 正常終了: プログラム／ハンドラが最後まで実行された
//! - `exit(code)`: 終了コード付きで打ち切る（例外を catch されても終了コードが優先）
//! - `throw` / 実行時エラー: 捕捉されずに外へ出た例外をメッセージにして返す
//!
//! `postMessage` は返信を送るだけで実行は続きます。最初の返信だけが結果になります。

use boa_engine::{Context, JsError, JsResult, JsValue, Script, Source};
use serde_json::Value;

use super::{LoadError, Outbound, builtins};

/// How a run of the program or the message handler ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Completed,
    Exited(i32),
    Threw(String),
}

/// Script engine for one isolated context.
///
/// `Context` は `!Send` なので、作ったスレッドの上でだけ使います。
pub struct Interpreter {
    context: Context,
}

impl Interpreter {
    pub fn new(max_call_depth: usize, outbound: Box<dyn Outbound>) -> Result<Self, LoadError> {
        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_recursion_limit(max_call_depth);
        builtins::install(&mut context).map_err(|err| LoadError::Globals(err.to_string()))?;
        builtins::open(outbound);
        Ok(Self { context })
    }

    /// Parses and runs the top level of a fragment program.
    pub fn run(&mut self, source: &str) -> Result<Termination, LoadError> {
        let script = Script::parse(Source::from_bytes(source), None, &mut self.context)
            .map_err(|err| LoadError::Syntax(describe(err, &mut self.context)))?;
        let result = script.evaluate(&mut self.context);
        Ok(self.terminate(result))
    }

    /// Delivers the inbound message to the handler installed with `onmessage`.
    ///
    /// Returns `None` when no handler was installed.
    pub fn deliver(&mut self, message: &Value) -> Option<Termination> {
        let handler = builtins::handler()?;
        let result = JsValue::from_json(message, &mut self.context).and_then(|message| {
            handler.call(&JsValue::undefined(), &[message], &mut self.context)
        });
        Some(self.terminate(result))
    }

    /// Timers scheduled with `setTimeout` that never ran.
    pub fn pending_timers(&self) -> usize {
        builtins::pending_timers()
    }

    fn terminate(&mut self, result: JsResult<JsValue>) -> Termination {
        if let Some(code) = builtins::exit_code() {
            return Termination::Exited(code);
        }
        match result {
            Ok(_) => Termination::Completed,
            Err(err) => Termination::Threw(describe(err, &mut self.context)),
        }
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        builtins::close();
    }
}

/// `Error: message` for error objects, the raw text for thrown strings.
fn describe(err: JsError, context: &mut Context) -> String {
    if let Some(text) = err.as_opaque().and_then(|value| value.as_string()) {
        return text.to_std_string_escaped();
    }
    match err.try_native(context) {
        Ok(native) => native.to_string(),
        Err(_) => match err.as_opaque() {
            Some(value) => value.display().to_string(),
            None => err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<Value>>>);

    impl Outbound for Collect {
        fn post(&self, message: Value) {
            self.0.lock().unwrap().push(message);
        }
    }

    fn interpreter() -> (Interpreter, Collect) {
        let outbox = Collect::default();
        (Interpreter::new(64, Box::new(outbox.clone())).unwrap(), outbox)
    }

    /// Runs `const f = <callable>;` plus the message wiring and delivers `args`.
    fn dispatch(callable: &str, args: Value) -> (Termination, Vec<Value>) {
        let source = format!(
            "const f = {callable};\nonmessage((message) => postMessage(f(...message)));"
        );
        let (mut interp, outbox) = interpreter();
        assert_eq!(interp.run(&source).unwrap(), Termination::Completed);
        let termination = interp.deliver(&args).unwrap();
        let posted = outbox.0.lock().unwrap().clone();
        (termination, posted)
    }

    #[rstest]
    #[case("(a, b) => a + b", json!([1, 2]), json!(3))]
    #[case("(a, b, c, d) => a + b + c + d", json!([1, 2, 3, 4]), json!(10))]
    #[case("(a, b) => a + b", json!(["x", 1]), json!("x1"))]
    #[case("(a, b) => b", json!([1]), json!(null))]
    #[case("(a, b) => a + b", json!([1]), json!(null))]
    #[case("(a, b) => b === undefined && a !== null", json!([1]), json!(true))]
    #[case("(...xs) => xs.length", json!([1, 2, 3]), json!(3))]
    #[case("(o) => o.inner.value * 2", json!([{"inner": {"value": 21}}]), json!(42))]
    #[case("(xs) => xs.map((x) => x * x).filter((x) => x > 1)", json!([[1, 2, 3]]), json!([4, 9]))]
    #[case("(xs) => xs.join('-')", json!([[1, "a", null]]), json!("1-a-"))]
    #[case("(x) => Math.max(x, 10) + Math.floor(2.7)", json!([3]), json!(12))]
    #[case("(a, b) => { return { sum: a + b, list: [a, ...[b]] }; }", json!([1, 2]), json!({"sum": 3, "list": [1, 2]}))]
    fn evaluates_callables(#[case] callable: &str, #[case] args: Value, #[case] expected: Value) {
        let (termination, posted) = dispatch(callable, args);
        assert_eq!(termination, Termination::Completed);
        assert_eq!(posted, vec![expected]);
    }

    #[test]
    fn named_function_expression_recurses() {
        let callable = "function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }";
        let (_, posted) = dispatch(callable, json!([10]));
        assert_eq!(posted, vec![json!(55)]);
    }

    #[test]
    fn thrown_errors_are_described() {
        let (termination, posted) = dispatch("() => { throw new Error('boom'); }", json!([]));
        assert_eq!(termination, Termination::Threw("Error: boom".into()));
        assert!(posted.is_empty());

        let (termination, _) = dispatch("() => { throw 'plain'; }", json!([]));
        assert_eq!(termination, Termination::Threw("plain".into()));
    }

    #[rstest]
    #[case("() => missing", "ReferenceError")]
    #[case("() => null.x", "TypeError")]
    #[case("() => postMessage(() => 1)", "DataCloneError")]
    #[case("() => sleep(1e25)", "RangeError")]
    #[case("() => setTimeout(1, 0)", "TypeError")]
    fn runtime_errors(#[case] callable: &str, #[case] expected: &str) {
        let (termination, posted) = dispatch(callable, json!([{}]));
        let Termination::Threw(message) = termination else {
            panic!("expected a throw, got {termination:?}");
        };
        assert!(message.contains(expected), "{message}");
        assert!(posted.is_empty());
    }

    #[test]
    fn runaway_recursion_is_stopped() {
        let (termination, posted) = dispatch("function f(n) { return f(n + 1) + 1; }", json!([0]));
        assert!(matches!(termination, Termination::Threw(_)), "{termination:?}");
        assert!(posted.is_empty());
    }

    #[test]
    fn exit_stops_execution() {
        let (termination, posted) = dispatch("() => { exit(3); return 1; }", json!([]));
        assert_eq!(termination, Termination::Exited(3));
        assert!(posted.is_empty());
    }

    #[test]
    fn exit_survives_a_catch() {
        let (termination, posted) = dispatch(
            "() => { try { exit(4); } catch (e) { return 'caught'; } }",
            json!([]),
        );
        assert_eq!(termination, Termination::Exited(4));
        assert!(posted.is_empty());
    }

    #[test]
    fn every_post_is_delivered_to_the_outbound() {
        let (mut interp, outbox) = interpreter();
        interp
            .run("onmessage((m) => { postMessage(m[0]); postMessage('second'); });")
            .unwrap();
        assert_eq!(interp.deliver(&json!(["first"])), Some(Termination::Completed));
        assert_eq!(*outbox.0.lock().unwrap(), vec![json!("first"), json!("second")]);
    }

    #[test]
    fn timers_are_only_queued() {
        let (mut interp, outbox) = interpreter();
        let termination = interp
            .run("const a = setTimeout(() => postMessage('late'), 10);\nconst b = setTimeout(() => 1, 20);\nclearTimeout(b);")
            .unwrap();
        assert_eq!(termination, Termination::Completed);
        assert_eq!(interp.pending_timers(), 1);
        assert!(outbox.0.lock().unwrap().is_empty());
    }

    #[test]
    fn deliver_without_handler() {
        let (mut interp, _) = interpreter();
        interp.run("const f = (a) => a;").unwrap();
        assert_eq!(interp.deliver(&json!([1])), None);
    }

    #[test]
    fn syntax_errors_fail_the_load() {
        let (mut interp, _) = interpreter();
        assert!(matches!(interp.run("const = 1;"), Err(LoadError::Syntax(_))));
    }

    #[test]
    fn each_interpreter_starts_with_fresh_globals() {
        let (mut first, _) = interpreter();
        first.run("globalThis.leak = 1;").unwrap();
        drop(first);

        let (mut second, outbox) = interpreter();
        second
            .run("onmessage(() => postMessage(typeof leak));")
            .unwrap();
        second.deliver(&json!([]));
        assert_eq!(*outbox.0.lock().unwrap(), vec![json!("undefined")]);
    }
}
