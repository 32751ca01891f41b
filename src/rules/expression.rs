//! Parsed boolean expressions for conditional rules
//!
//! A small comparison/boolean AST over `event`/`context` field paths,
//! evaluated by an interpreter with no ambient code execution capability.
//! Grammar (precedence low to high):
//!
//! ```text
//! or    := and ("||" and)*
//! and   := unary ("&&" unary)*
//! unary := "!" unary | cmp
//! cmp   := term (("==" | "!=" | "<" | "<=" | ">" | ">=") term)?
//! term  := literal | path | "(" or ")"
//! ```
//!
//! Literals: single- or double-quoted strings, numbers, `true`, `false`,
//! `null`. Paths: dotted identifiers resolved against the event/context.

use crate::errors::{MemoryError, Result};
use crate::events::{EventContext, SystemEvent};
use serde_json::Value;

/// Comparison operators in expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Dot-path into the event/context
    Path(String),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Op(&'static str),
    LParen,
    RParen,
}

fn lex(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    if i >= chars.len() {
                        return Err(MemoryError::Expression(
                            "unterminated string literal".to_string(),
                        ));
                    }
                    if chars[i] == quote {
                        i += 1;
                        break;
                    }
                    s.push(chars[i]);
                    i += 1;
                }
                tokens.push(Token::Str(s));
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                let next = chars.get(i + 1).copied();
                let op = match (c, next) {
                    ('=', Some('=')) => ("==", 2),
                    ('!', Some('=')) => ("!=", 2),
                    ('<', Some('=')) => ("<=", 2),
                    ('>', Some('=')) => (">=", 2),
                    ('&', Some('&')) => ("&&", 2),
                    ('|', Some('|')) => ("||", 2),
                    ('<', _) => ("<", 1),
                    ('>', _) => (">", 1),
                    ('!', _) => ("!", 1),
                    _ => {
                        return Err(MemoryError::Expression(format!(
                            "unexpected character {c:?} at offset {i}"
                        )))
                    }
                };
                tokens.push(Token::Op(op.0));
                i += op.1;
            }
            _ if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num = text.parse::<f64>().map_err(|_| {
                    MemoryError::Expression(format!("invalid number literal {text:?}"))
                })?;
                tokens.push(Token::Num(num));
            }
            _ if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => {
                return Err(MemoryError::Expression(format!(
                    "unexpected character {c:?} at offset {i}"
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_op("||") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while self.eat_op("&&") {
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat_op("!") {
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr> {
        let left = self.parse_term()?;
        let op = match self.peek() {
            Some(Token::Op("==")) => Some(CmpOp::Eq),
            Some(Token::Op("!=")) => Some(CmpOp::Ne),
            Some(Token::Op("<")) => Some(CmpOp::Lt),
            Some(Token::Op("<=")) => Some(CmpOp::Le),
            Some(Token::Op(">")) => Some(CmpOp::Gt),
            Some(Token::Op(">=")) => Some(CmpOp::Ge),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                let right = self.parse_term()?;
                Ok(Expr::Cmp(op, Box::new(left), Box::new(right)))
            }
            None => Ok(left),
        }
    }

    fn parse_term(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(MemoryError::Expression("expected ')'".to_string())),
                }
            }
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(serde_json::json!(n))),
            Some(Token::Ident(ident)) => match ident.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ => Ok(Expr::Path(ident)),
            },
            other => Err(MemoryError::Expression(format!(
                "unexpected token {other:?}"
            ))),
        }
    }
}

impl Expr {
    /// Parse an expression string into an AST
    pub fn parse(input: &str) -> Result<Expr> {
        let tokens = lex(input)?;
        if tokens.is_empty() {
            return Err(MemoryError::Expression("empty expression".to_string()));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(MemoryError::Expression(format!(
                "trailing tokens after position {}",
                parser.pos
            )));
        }
        Ok(expr)
    }

    /// Evaluate against an event and context. Total: mismatched types
    /// compare false, missing paths resolve to null.
    pub fn eval(&self, event: &SystemEvent, context: &EventContext) -> bool {
        truthy(&self.eval_value(event, context))
    }

    fn eval_value(&self, event: &SystemEvent, context: &EventContext) -> Value {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Path(path) => {
                // `event.` and `context.` prefixes are explicit roots; a
                // bare `event` prefix strips to the inner path
                let resolved = if let Some(stripped) = path.strip_prefix("event.") {
                    event.resolve_path(context, stripped)
                } else {
                    event.resolve_path(context, path)
                };
                resolved.unwrap_or(Value::Null)
            }
            Expr::Cmp(op, left, right) => {
                let l = left.eval_value(event, context);
                let r = right.eval_value(event, context);
                Value::Bool(compare_values(*op, &l, &r))
            }
            Expr::And(left, right) => {
                Value::Bool(truthy(&left.eval_value(event, context))
                    && truthy(&right.eval_value(event, context)))
            }
            Expr::Or(left, right) => {
                Value::Bool(truthy(&left.eval_value(event, context))
                    || truthy(&right.eval_value(event, context)))
            }
            Expr::Not(inner) => Value::Bool(!truthy(&inner.eval_value(event, context))),
        }
    }
}

fn compare_values(op: CmpOp, left: &Value, right: &Value) -> bool {
    match op {
        CmpOp::Eq => json_eq(left, right),
        CmpOp::Ne => !json_eq(left, right),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => match op {
                    CmpOp::Lt => a < b,
                    CmpOp::Le => a <= b,
                    CmpOp::Gt => a > b,
                    CmpOp::Ge => a >= b,
                    _ => unreachable!(),
                },
                _ => false,
            }
        }
    }
}

/// Equality with numeric coercion so `5 == 5.0`
fn json_eq(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return a == b;
    }
    left == right
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Severity;
    use serde_json::json;

    fn event() -> SystemEvent {
        SystemEvent::new("build_failed", "ci")
            .with_data(json!({"exit_code": 101, "branch": "main"}))
            .with_severity(Severity::Error)
    }

    fn ctx() -> EventContext {
        let mut ctx = EventContext::new();
        ctx.insert("userId".to_string(), json!("u-1"));
        ctx.insert("retries".to_string(), json!(2));
        ctx
    }

    fn eval(input: &str) -> bool {
        Expr::parse(input).unwrap().eval(&event(), &ctx())
    }

    #[test]
    fn test_comparisons() {
        assert!(eval("type == 'build_failed'"));
        assert!(eval("data.exit_code > 100"));
        assert!(eval("data.exit_code <= 101"));
        assert!(!eval("data.exit_code < 5"));
        assert!(eval("severity != 'info'"));
    }

    #[test]
    fn test_boolean_combinators() {
        assert!(eval("type == 'build_failed' && data.branch == 'main'"));
        assert!(eval("type == 'other' || data.exit_code == 101"));
        assert!(eval("!(type == 'other')"));
        // && binds tighter than ||
        assert!(eval("type == 'other' && false || data.branch == 'main'"));
    }

    #[test]
    fn test_context_paths() {
        assert!(eval("context.userId == 'u-1'"));
        assert!(eval("context.retries >= 2"));
        assert!(eval("event.source == 'ci'"));
    }

    #[test]
    fn test_missing_path_is_null() {
        assert!(eval("data.ghost == null"));
        assert!(!eval("data.ghost == 'x'"));
        assert!(!eval("data.ghost"));
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert!(!eval("type == 'other' && (false || data.branch == 'main')"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expr::parse("").is_err());
        assert!(Expr::parse("a == ").is_err());
        assert!(Expr::parse("(a == 1").is_err());
        assert!(Expr::parse("a == 1 extra").is_err());
        assert!(Expr::parse("'unterminated").is_err());
        assert!(Expr::parse("a @ b").is_err());
    }

    #[test]
    fn test_numeric_coercion() {
        assert!(eval("data.exit_code == 101.0"));
        assert!(eval("-1 < 0"));
    }
}
