//! Global functions installed into every fragment context.
//!
//! boa のネイティブ関数は関数ポインタなので、コンテキストごとの状態（返信先、
//! メッセージハンドラ、終了コード、タイマー）はスレッドローカルの `Bridge` に置きます。
//! コンテキストは専用スレッドで 1 つだけ動くので、スレッドと `Bridge` は 1 対 1 です。

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::time::Duration;

use boa_engine::object::FunctionObjectBuilder;
use boa_engine::property::Attribute;
use boa_engine::{
    Context, JsError, JsNativeError, JsObject, JsResult, JsValue, NativeFunction, js_string,
};
use serde_json::Value;

use super::Outbound;

pub(super) struct Bridge {
    outbound: Box<dyn Outbound>,
    handler: Option<JsObject>,
    exit: Option<i32>,
    timers: BTreeSet<u32>,
    next_timer: u32,
}

thread_local! {
    static BRIDGE: RefCell<Option<Bridge>> = const { RefCell::new(None) };
}

/// Connects the builtins on this thread to `outbound`.
pub(super) fn open(outbound: Box<dyn Outbound>) {
    let previous = BRIDGE.with(|bridge| {
        bridge.borrow_mut().replace(Bridge {
            outbound,
            handler: None,
            exit: None,
            timers: BTreeSet::new(),
            next_timer: 1,
        })
    });
    if previous.is_some() {
        tracing::warn!("replacing the script bridge of a context still running on this thread");
    }
}

pub(super) fn close() {
    // ハンドラ（JsObject）は borrow の外で drop する
    let bridge = BRIDGE.with(|bridge| bridge.borrow_mut().take());
    drop(bridge);
}

fn with_bridge<R>(f: impl FnOnce(&mut Bridge) -> R) -> Option<R> {
    BRIDGE.with(|bridge| bridge.borrow_mut().as_mut().map(f))
}

pub(super) fn handler() -> Option<JsObject> {
    with_bridge(|bridge| bridge.handler.clone()).flatten()
}

pub(super) fn exit_code() -> Option<i32> {
    with_bridge(|bridge| bridge.exit).flatten()
}

pub(super) fn pending_timers() -> usize {
    with_bridge(|bridge| bridge.timers.len()).unwrap_or(0)
}

type Builtin = fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue>;

const GLOBALS: &[(&str, Builtin, usize)] = &[
    ("onmessage", on_message, 1),
    ("postMessage", post_message, 1),
    ("exit", exit, 1),
    ("log", log, 0),
    ("sleep", sleep, 1),
    ("setTimeout", set_timeout, 2),
    ("clearTimeout", clear_timeout, 1),
];

/// Register the fragment globals into a boa context.
pub(super) fn install(context: &mut Context) -> JsResult<()> {
    for &(name, body, length) in GLOBALS {
        let function = FunctionObjectBuilder::new(context.realm(), NativeFunction::from_fn_ptr(body))
            .name(js_string!(name))
            .length(length)
            .constructor(false)
            .build();
        context.register_global_property(js_string!(name), function, Attribute::all())?;
    }
    Ok(())
}

/// Converts a script value to JSON the way it crosses the context boundary.
///
/// `JSON.stringify` の規則に従うので、`undefined` と関数は `null` に、
/// `NaN` / `Infinity` も `null` になります。循環参照と BigInt は例外になります。
pub(super) fn to_json(value: &JsValue, context: &mut Context) -> JsResult<Value> {
    if value.is_callable() {
        return Err(data_clone_error("a function cannot be transferred"));
    }
    let json = context.global_object().get(js_string!("JSON"), context)?;
    let stringify = json
        .as_object()
        .ok_or_else(|| JsNativeError::typ().with_message("JSON is not an object"))?
        .get(js_string!("stringify"), context)?;
    let stringify = stringify
        .as_callable()
        .ok_or_else(|| JsNativeError::typ().with_message("JSON.stringify is not a function"))?;
    let text = stringify.call(&JsValue::undefined(), &[value.clone()], context)?;
    match text.as_string() {
        Some(text) => serde_json::from_str(&text.to_std_string_escaped())
            .map_err(|err| data_clone_error(&err.to_string())),
        None => Ok(Value::Null),
    }
}

fn data_clone_error(message: &str) -> JsError {
    JsError::from(JsNativeError::typ().with_message(format!("DataCloneError: {message}")))
}

fn number_arg(args: &[JsValue], index: usize, context: &mut Context) -> JsResult<f64> {
    match args.get(index) {
        Some(value) => value.to_number(context),
        None => Ok(0.0),
    }
}

fn on_message(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    let handler = args
        .first()
        .and_then(|value| value.as_callable())
        .cloned()
        .ok_or_else(|| JsNativeError::typ().with_message("onmessage handler must be a function"))?;
    with_bridge(|bridge| bridge.handler = Some(handler));
    Ok(JsValue::undefined())
}

fn post_message(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let value = args.first().cloned().unwrap_or_else(JsValue::undefined);
    let message = to_json(&value, ctx)?;
    // exit() の後の返信は届かない
    with_bridge(|bridge| {
        if bridge.exit.is_none() {
            bridge.outbound.post(message);
        }
    });
    Ok(JsValue::undefined())
}

/// Records the exit code and unwinds the script with an exception.
///
/// スクリプトが例外を catch しても終了コードは残り、コンテキストはそのコードで終わります。
fn exit(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let code = number_arg(args, 0, ctx)?;
    let code = if code.is_finite() { code as i32 } else { 1 };
    let code = with_bridge(|bridge| *bridge.exit.get_or_insert(code)).unwrap_or(code);
    Err(JsNativeError::error()
        .with_message(format!("exit({code})"))
        .into())
}

fn log(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    let line = args
        .iter()
        .map(|value| match value.as_string() {
            Some(text) => text.to_std_string_escaped(),
            None => value.display().to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ");
    tracing::info!(target: "spindle::script", "{line}");
    Ok(JsValue::undefined())
}

fn sleep(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let ms = number_arg(args, 0, ctx)?;
    if ms.is_nan() || ms <= 0.0 {
        return Ok(JsValue::undefined());
    }
    let duration = Duration::try_from_secs_f64(ms / 1000.0).map_err(|err| {
        JsNativeError::range().with_message(format!("sleep({ms}) is out of range: {err}"))
    })?;
    // コンテキスト専用スレッドなのでブロックしてよい
    std::thread::sleep(duration);
    Ok(JsValue::undefined())
}

/// Queues a timer that never fires: the context is torn down right after the reply.
fn set_timeout(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    if !args.first().is_some_and(JsValue::is_callable) {
        return Err(JsNativeError::typ()
            .with_message("setTimeout callback must be a function")
            .into());
    }
    let id = with_bridge(|bridge| {
        let id = bridge.next_timer;
        bridge.next_timer += 1;
        bridge.timers.insert(id);
        id
    })
    .unwrap_or(0);
    Ok(JsValue::from(id))
}

fn clear_timeout(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let id = number_arg(args, 0, ctx)?;
    if id.is_finite() && id >= 0.0 {
        with_bridge(|bridge| bridge.timers.remove(&(id as u32)));
    }
    Ok(JsValue::undefined())
}
