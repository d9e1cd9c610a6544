use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;

use spindle_core::{Callable, Scope, Spindle, SpindleConfig, SpindleError, TaskError, TaskFn};

#[derive(Debug, Deserialize)]
struct Greeting {
    name: String,
    delay_ms: u64,
}

#[derive(Debug, Serialize)]
struct Greeted {
    text: String,
    context: String,
}

/// 少し待ってから挨拶を返すネイティブ関数
struct Greet;

#[async_trait(?Send)]
impl TaskFn for Greet {
    type Args = (Greeting,);
    type Output = Greeted;

    async fn call(&self, scope: &Scope, (greeting,): Self::Args) -> Result<Greeted, TaskError> {
        sleep(Duration::from_millis(greeting.delay_ms)).await;
        Ok(Greeted {
            text: format!("Hello, {}!", greeting.name),
            context: scope.context_id().to_string(),
        })
    }
}

fn load_config() -> SpindleConfig {
    match std::env::var("SPINDLE_CONFIG") {
        Ok(path) => SpindleConfig::from_path(&path).unwrap_or_else(|err| {
            eprintln!("ignoring {path}: {err}");
            SpindleConfig::default()
        }),
        Err(_) => SpindleConfig::default(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) 設定を読んで Spindle を組み立てる（起動時に登録する関数もここで渡す）
    let spindle = Spindle::builder()
        .config(load_config())
        .function("greet", Callable::function(Greet))
        .function(
            "fib",
            Callable::script(
                "function fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }",
            ),
        )
        .expect_functions(&["greet", "fib"])
        .build()
        .expect("spindle builds");
    let spindle = Arc::new(spindle);
    println!("status: {}", serde_json::to_string(&spindle.status()).unwrap());

    // (B) その場の callable を dispatch（script とネイティブ）
    let sum = spindle
        .dispatch(Callable::script("(a, b) => a + b"), (1, 2))
        .await
        .expect("script dispatch");
    println!("(a, b) => a + b with (1, 2) = {sum}");

    let product = spindle
        .dispatch(Callable::function(|a: i64, b: i64| a * b), (6, 7))
        .await
        .expect("native dispatch");
    println!("|a, b| a * b with (6, 7) = {product}");

    // (C) 登録済みの関数を名前で並行に dispatch（遅いものが後から終わる）
    let slow = spindle.dispatch("greet", (json!({ "name": "slow", "delay_ms": 200 }),));
    let fast = spindle.dispatch("greet", (json!({ "name": "fast", "delay_ms": 10 }),));
    let fib = spindle.dispatch("fib", (20,));
    let (slow, fast, fib) = tokio::join!(slow, fast, fib);
    println!("greet: {}", slow.expect("greet slow"));
    println!("greet: {}", fast.expect("greet fast"));
    println!("fib(20) = {}", fib.expect("fib"));

    // (D) 失敗の見え方
    let failures = [
        Callable::script("(a) => { throw new Error('no thanks ' + a); }"),
        Callable::script("() => exit(3)"),
        Callable::script("1"),
    ];
    for callable in failures {
        match spindle.dispatch(callable, (1,)).await {
            Ok(value) => println!("unexpected value: {value}"),
            Err(err @ SpindleError::WorkerFault(_)) => println!("worker fault: {:?}", err.fault()),
            Err(err) => println!("rejected ({:?}): {err}", err.kind()),
        }
    }

    // (E) 登録を外すと名前では呼べなくなる
    spindle.unregister("fib").expect("valid name");
    match spindle.dispatch("fib", (10,)).await {
        Err(SpindleError::UnregisteredFunction(name)) => println!("{name} is no longer registered"),
        other => println!("unexpected: {other:?}"),
    }

    // 結果はすべて受け取ったので in_flight は 0（live_contexts は後片付け中のスレッド）
    println!("status: {}", serde_json::to_string(&spindle.status()).unwrap());
    spindle.shutdown();
}
