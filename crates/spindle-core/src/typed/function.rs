//! TaskFn / DynFunction - ネイティブ callable の定義
//!
//! # 二層構造
//! - **表層**: クロージャ `Fn(A1, .., An) -> R`（n ≤ 8）と `TaskFn` trait - 型付き
//! - **内部**: `DynFunction` - object-safe、`Vec<Value>` を受けて `Value` を返す
//!
//! クロージャは marker 型（`fn(A1, ..) -> R`）で区別して `IntoFunction` を実装します。
//! 引数は JavaScript の関数呼び出しと同じく位置引数で、足りない分は `null`、
//! 余った分は無視されます。

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::codec::{ArgReader, decode_args, encode_output};
use super::scope::Scope;
use crate::domain::errors::TaskError;

/// TaskFn は async なネイティブ callable
///
/// # 使用例
/// ```ignore
/// struct Delayed;
///
/// #[async_trait(?Send)]
/// impl TaskFn for Delayed {
///     type Args = (u64, String);
///     type Output = String;
///
///     async fn call(&self, _scope: &Scope, (ms, text): Self::Args) -> Result<String, TaskError> {
///         tokio::time::sleep(Duration::from_millis(ms)).await;
///         Ok(text)
///     }
/// }
/// ```
///
/// `Args` は引数リスト（JSON 配列）全体からデコードされます。タプルなら要素数が
/// 一致している必要があります。
#[async_trait(?Send)]
pub trait TaskFn: Send + Sync + 'static {
    type Args: DeserializeOwned;
    type Output: Serialize;

    async fn call(&self, scope: &Scope, args: Self::Args) -> Result<Self::Output, TaskError>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// DynFunction は object-safe なネイティブ callable
///
/// 隔離コンテキストのスレッド上（LocalSet 内）で呼ばれるので future は `Send` 不要。
/// 値そのものは `Arc<dyn DynFunction>` としてスレッド間で共有されます。
#[async_trait(?Send)]
pub trait DynFunction: Send + Sync {
    async fn invoke(&self, scope: Scope, args: Vec<Value>) -> Result<Value, TaskError>;

    fn label(&self) -> &str;
}

/// Conversion into a type-erased native callable.
///
/// `Marker` only disambiguates the blanket impls (one per closure arity plus
/// one for `TaskFn`); callers never name it.
pub trait IntoFunction<Marker>: Send + Sync + 'static {
    fn into_function(self) -> Arc<dyn DynFunction>;
}

pub struct TaskFnMarker;

/// TypedFunction<T> は TaskFn を DynFunction に変換するラッパー
pub struct TypedFunction<T: TaskFn> {
    inner: T,
}

impl<T: TaskFn> TypedFunction<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait(?Send)]
impl<T: TaskFn> DynFunction for TypedFunction<T> {
    async fn invoke(&self, scope: Scope, args: Vec<Value>) -> Result<Value, TaskError> {
        let args: T::Args = decode_args(args)?;
        let output = self.inner.call(&scope, args).await?;
        encode_output(output)
    }

    fn label(&self) -> &str {
        self.inner.name()
    }
}

impl<T: TaskFn> IntoFunction<TaskFnMarker> for T {
    fn into_function(self) -> Arc<dyn DynFunction> {
        Arc::new(TypedFunction::new(self))
    }
}

/// Plain closure wrapped as a DynFunction. `M` is the `fn(..) -> R` marker.
pub struct ClosureFunction<F, M> {
    f: F,
    _marker: PhantomData<M>,
}

impl<F, M> ClosureFunction<F, M> {
    fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

macro_rules! impl_closure {
    ($($arg:ident: $ty:ident),*) => {
        impl<F, R, $($ty,)*> IntoFunction<fn($($ty,)*) -> R> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: Serialize + 'static,
            $($ty: DeserializeOwned + 'static,)*
        {
            fn into_function(self) -> Arc<dyn DynFunction> {
                Arc::new(ClosureFunction::<F, fn($($ty,)*) -> R>::new(self))
            }
        }

        #[async_trait(?Send)]
        impl<F, R, $($ty,)*> DynFunction for ClosureFunction<F, fn($($ty,)*) -> R>
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: Serialize + 'static,
            $($ty: DeserializeOwned + 'static,)*
        {
            #[allow(unused_mut, unused_variables)]
            async fn invoke(&self, _scope: Scope, args: Vec<Value>) -> Result<Value, TaskError> {
                let mut reader = ArgReader::new(args);
                $(let $arg: $ty = reader.next()?;)*
                encode_output((self.f)($($arg),*))
            }

            fn label(&self) -> &str {
                std::any::type_name::<F>()
            }
        }
    };
}

impl_closure!();
impl_closure!(a: A);
impl_closure!(a: A, b: B);
impl_closure!(a: A, b: B, c: C);
impl_closure!(a: A, b: B, c: C, d: D);
impl_closure!(a: A, b: B, c: C, d: D, e: E);
impl_closure!(a: A, b: B, c: C, d: D, e: E, f: G);
impl_closure!(a: A, b: B, c: C, d: D, e: E, f: G, g: H);
impl_closure!(a: A, b: B, c: C, d: D, e: E, f: G, g: H, h: I);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::ContextId;
    use serde_json::json;
    use ulid::Ulid;

    fn scope() -> Scope {
        Scope::new(ContextId::from_ulid(Ulid::new()))
    }

    async fn invoke<M>(f: impl IntoFunction<M>, args: Value) -> Result<Value, TaskError> {
        let Value::Array(args) = args else {
            panic!("args must be an array");
        };
        f.into_function().invoke(scope(), args).await
    }

    #[tokio::test]
    async fn closures_of_several_arities() {
        assert_eq!(invoke(|| 7, json!([])).await.unwrap(), json!(7));
        assert_eq!(
            invoke(|a: i64, b: i64| a + b, json!([1, 2])).await.unwrap(),
            json!(3)
        );
        assert_eq!(
            invoke(
                |a: i64, b: i64, c: i64, d: i64| a + b + c + d,
                json!([1, 2, 3, 4])
            )
            .await
            .unwrap(),
            json!(10)
        );
        assert_eq!(
            invoke(
                |a: u8, b: u8, c: u8, d: u8, e: u8, f: u8, g: u8, h: u8| {
                    [a, b, c, d, e, f, g, h].iter().map(|&x| u32::from(x)).sum::<u32>()
                },
                json!([1, 1, 1, 1, 1, 1, 1, 1])
            )
            .await
            .unwrap(),
            json!(8)
        );
    }

    #[tokio::test]
    async fn missing_arguments_are_null_and_extra_are_ignored() {
        let f = |a: i64, b: Option<i64>| a + b.unwrap_or(100);
        assert_eq!(invoke(f, json!([1])).await.unwrap(), json!(101));
        assert_eq!(invoke(f, json!([1, 2, 3])).await.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn unit_return_is_null() {
        assert_eq!(invoke(|_: i64| (), json!([1])).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn argument_decode_failure_names_the_position() {
        let err = invoke(|a: i64, b: i64| a + b, json!([1, "two"]))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument { position: 1, .. }));
    }

    struct Concat;

    #[async_trait(?Send)]
    impl TaskFn for Concat {
        type Args = (String, String);
        type Output = String;

        async fn call(&self, _scope: &Scope, (a, b): Self::Args) -> Result<String, TaskError> {
            if a.is_empty() {
                return Err(TaskError::failed("left side is empty"));
            }
            Ok(format!("{a}{b}"))
        }
    }

    #[tokio::test]
    async fn task_fn_decodes_the_whole_argument_list() {
        assert_eq!(
            invoke(Concat, json!(["go", "routine"])).await.unwrap(),
            json!("goroutine")
        );
        assert!(matches!(
            invoke(Concat, json!(["", "x"])).await,
            Err(TaskError::Failed(_))
        ));
        assert!(matches!(
            invoke(Concat, json!([1])).await,
            Err(TaskError::InvalidArgument { .. })
        ));
        assert!(Concat.into_function().label().ends_with("Concat"));
    }
}
