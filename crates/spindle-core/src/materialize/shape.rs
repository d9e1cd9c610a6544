//! Shape check for script callables.
//!
//! ソースを括弧で包んで boa の parser に通し、文がちょうど 1 つで、その式が
//! 関数式（アロー関数か `function` 式）であることを確かめます。
//!
//! parser は再帰下降なので、深い入れ子はスタックを食い尽くします。そこで
//! parse の前に括弧と前置演算子の入れ子の深さを数え、上限を超えたら拒否します。
//! parse 自体も大きめのスタックを持つ専用スレッドで行います（呼び出し元は
//! tokio のワーカースレッドであることが多い）。

use std::ops::ControlFlow;
use std::thread;

use boa_engine::ast::expression::Expression;
use boa_engine::ast::scope::Scope;
use boa_engine::ast::visitor::{VisitWith, Visitor};
use boa_engine::ast::StatementListItem;
use boa_engine::interner::Interner;
use boa_engine::parser::{Parser, Source};

/// Deepest bracket or prefix-operator nesting accepted in a callable.
pub const MAX_NESTING_DEPTH: usize = 32;

const PARSE_STACK_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("nesting is deeper than {} levels", MAX_NESTING_DEPTH)]
    TooDeep,
    #[error("cannot parse: {0}")]
    Syntax(String),
    #[error("not a function expression")]
    NotAFunction,
    #[error("parser did not finish: {0}")]
    Aborted(String),
}

/// Checks that `source` is exactly one function expression, optionally
/// followed by `;`.
pub fn check_function_expression(source: &str) -> Result<(), ShapeError> {
    if nesting_depth(source) > MAX_NESTING_DEPTH {
        return Err(ShapeError::TooDeep);
    }
    let wrapped = wrap(source);
    thread::scope(|scope| {
        let parsing = thread::Builder::new()
            .name("spindle-parse".to_string())
            .stack_size(PARSE_STACK_SIZE)
            .spawn_scoped(scope, || parse_shape(&wrapped))
            .map_err(|err| ShapeError::Aborted(err.to_string()))?;
        parsing
            .join()
            .map_err(|_| ShapeError::Aborted("parser panicked".to_string()))?
    })
}

/// `(\n<source>\n)`: a trailing `//` comment cannot swallow the closing paren,
/// and anything after the function (`; extra`, `), (x`) breaks the single
/// parenthesized expression.
fn wrap(source: &str) -> String {
    let trimmed = source.trim_end();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);
    format!("(\n{trimmed}\n)")
}

fn parse_shape(wrapped: &str) -> Result<(), ShapeError> {
    let mut interner = Interner::default();
    let mut parser = Parser::new(Source::from_bytes(wrapped));
    let script = parser
        .parse_script(&Scope::new_global(), &mut interner)
        .map_err(|err| ShapeError::Syntax(err.to_string()))?;

    let mut shape = ShapeVisitor::default();
    let _ = shape.visit_script(&script);
    if shape.top_level == 1 && shape.outermost == Some(true) {
        Ok(())
    } else {
        Err(ShapeError::NotAFunction)
    }
}

#[derive(Default)]
struct ShapeVisitor {
    depth: usize,
    top_level: usize,
    /// Whether the first expression under the wrapping parens is a function.
    outermost: Option<bool>,
}

impl<'ast> Visitor<'ast> for ShapeVisitor {
    type BreakTy = ();

    fn visit_statement_list_item(
        &mut self,
        node: &'ast StatementListItem,
    ) -> ControlFlow<Self::BreakTy> {
        if self.depth == 0 {
            self.top_level += 1;
        }
        self.depth += 1;
        let flow = node.visit_with(self);
        self.depth -= 1;
        flow
    }

    fn visit_expression(&mut self, node: &'ast Expression) -> ControlFlow<Self::BreakTy> {
        if self.outermost.is_none() && !matches!(node, Expression::Parenthesized(_)) {
            self.outermost = Some(matches!(
                node,
                Expression::ArrowFunction(_) | Expression::FunctionExpression(_)
            ));
        }
        node.visit_with(self)
    }
}

/// Deepest nesting of `(`, `[`, `{` and runs of prefix operators outside
/// string literals and comments.
///
/// テンプレートリテラルの中身も数えるので、実際より深く見積もることはあっても
/// 浅く見積もることはまずありません。
pub fn nesting_depth(source: &str) -> usize {
    let mut chars = source.chars().peekable();
    let mut depth = 0usize;
    let mut prefix_run = 0usize;
    let mut deepest = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                // 文字列は改行を含めないので、閉じ忘れても行末で止まる
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => {
                            chars.next();
                        }
                        '\n' => break,
                        _ if inner == c => break,
                        _ => {}
                    }
                }
                prefix_run = 0;
                continue;
            }
            '/' if chars.peek() == Some(&'/') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
                continue;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut star = false;
                for inner in chars.by_ref() {
                    if star && inner == '/' {
                        break;
                    }
                    star = inner == '*';
                }
                continue;
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if matches!(c, '!' | '~' | '-' | '+') {
            prefix_run += 1;
        } else if !c.is_whitespace() {
            prefix_run = 0;
        }
        deepest = deepest.max(depth + prefix_run);
    }
    deepest
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("(a, b) => a + b", 1)]
    #[case("(a) => { return [a, { b: (1) }]; }", 4)]
    #[case("() => ')))((((' // (((((", 1)]
    #[case("() => /* {{{{ */ 1", 1)]
    #[case("(x) => - - -x", 3)]
    fn measures_nesting(#[case] source: &str, #[case] expected: usize) {
        assert_eq!(nesting_depth(source), expected);
    }

    #[test]
    fn deep_nesting_is_rejected_before_parsing() {
        let parens = format!("() => {}1{}", "(".repeat(500), ")".repeat(500));
        assert_eq!(check_function_expression(&parens), Err(ShapeError::TooDeep));

        let negations = format!("() => {}1", "!".repeat(10_000));
        assert_eq!(check_function_expression(&negations), Err(ShapeError::TooDeep));

        let nested = format!("() => {}1{}", "[".repeat(MAX_NESTING_DEPTH), "]".repeat(MAX_NESTING_DEPTH));
        assert_eq!(check_function_expression(&nested), Ok(()));
    }

    #[rstest]
    #[case("1", ShapeError::NotAFunction)]
    #[case("{ a: 1 }", ShapeError::NotAFunction)]
    #[case("(x) => x), (y", ShapeError::NotAFunction)]
    #[case("(x) => x)(1", ShapeError::NotAFunction)]
    fn non_functions(#[case] source: &str, #[case] expected: ShapeError) {
        assert_eq!(check_function_expression(source), Err(expected));
    }

    #[test]
    fn trailing_comment_and_semicolon() {
        assert_eq!(check_function_expression("(a) => a // done"), Ok(()));
        assert_eq!(check_function_expression("(a) => a;  \n"), Ok(()));
        assert!(matches!(
            check_function_expression("(a) => a;;"),
            Err(ShapeError::Syntax(_))
        ));
    }
}
