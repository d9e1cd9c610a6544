//! IntoArgs - dispatch に渡す引数リスト
//!
//! 引数は 1 つのメッセージ（JSON 配列）としてコンテキストへ送られます。
//! 転送できない値（シリアライズに失敗する値）は dispatch 前に弾かれます。

use serde::Serialize;
use serde_json::Value;

/// An ordered argument list that can cross into an isolated context.
pub trait IntoArgs {
    fn into_args(self) -> Result<Vec<Value>, serde_json::Error>;
}

impl IntoArgs for () {
    fn into_args(self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(Vec::new())
    }
}

impl IntoArgs for Vec<Value> {
    fn into_args(self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(self)
    }
}

macro_rules! impl_into_args {
    ($($arg:ident: $ty:ident),+) => {
        impl<$($ty: Serialize,)+> IntoArgs for ($($ty,)+) {
            fn into_args(self) -> Result<Vec<Value>, serde_json::Error> {
                let ($($arg,)+) = self;
                Ok(vec![$(serde_json::to_value($arg)?,)+])
            }
        }
    };
}

impl_into_args!(a: A);
impl_into_args!(a: A, b: B);
impl_into_args!(a: A, b: B, c: C);
impl_into_args!(a: A, b: B, c: C, d: D);
impl_into_args!(a: A, b: B, c: C, d: D, e: E);
impl_into_args!(a: A, b: B, c: C, d: D, e: E, f: F);
impl_into_args!(a: A, b: B, c: C, d: D, e: E, f: F, g: G);
impl_into_args!(a: A, b: B, c: C, d: D, e: E, f: F, g: G, h: H);
