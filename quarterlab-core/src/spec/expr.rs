//! Condition expression language for entry rules.
//!
//! Conditions are parsed once when a strategy is compiled and evaluated per
//! bar against a read-only [`Env`]. There is no general-purpose evaluator
//! behind this: the only things an expression can touch are literals and the
//! column names the environment resolves.
//!
//! Grammar (lowest precedence first):
//! ```text
//! or      := and (("or" | "||") and)*
//! and     := not (("and" | "&&") not)*
//! not     := ("not" | "!") not | cmp
//! cmp     := sum (("<" | "<=" | ">" | ">=" | "==" | "!=") sum)*
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/") unary)*
//! unary   := "-" unary | primary
//! primary := NUMBER | STRING | "True" | "False" | IDENT | "(" or ")"
//! ```
//! Comparisons chain like `30 < RSI_14 < 70`. Parentheses, `not` and unary
//! minus nest at most 64 levels deep.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

// ─── Values and environment ─────────────────────────────────────────

/// A value produced while evaluating an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Number(f64),
    Text(&'a str),
    Bool(bool),
    /// The column exists but has no value on this bar (warm-up, gap).
    Missing,
}

impl Value<'_> {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Bool(_) => "bool",
            Value::Missing => "missing",
        }
    }
}

/// Name resolution for one bar.
pub trait Env {
    /// `None` means the name does not exist at all.
    fn lookup(&self, name: &str) -> Option<Value<'_>>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown name '{0}'")]
    UnknownName(String),
    #[error("value not available for '{0}'")]
    NotAvailable(String),
    #[error("type mismatch: {op} on {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("expected bool, got {0}")]
    NotBool(&'static str),
    #[error("division by zero")]
    DivisionByZero,
}

// ─── AST ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Column(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    /// `first op1 e1 op2 e2 ...`, true when every adjacent pair holds.
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse a condition string.
    pub fn parse(source: &str) -> Result<Expr, ParseError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ParseError::Empty);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(ParseError::UnexpectedToken {
                offset: tok.offset,
                found: tok.kind.to_string(),
            }),
        }
    }

    /// Every column name referenced by the expression.
    pub fn columns(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Column(name) => {
                out.insert(name);
            }
            Expr::Neg(e) | Expr::Not(e) => e.collect_columns(out),
            Expr::Arith(_, l, r) | Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Expr::Compare(first, rest) => {
                first.collect_columns(out);
                for (_, e) in rest {
                    e.collect_columns(out);
                }
            }
            Expr::Number(_) | Expr::Text(_) | Expr::Bool(_) => {}
        }
    }

    /// Evaluate to a boolean. `and`/`or` short-circuit.
    pub fn eval_bool(&self, env: &dyn Env) -> Result<bool, EvalError> {
        match self.eval(env)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::NotBool(other.type_name())),
        }
    }

    pub fn eval<'a>(&'a self, env: &'a dyn Env) -> Result<Value<'a>, EvalError> {
        match self {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Text(s) => Ok(Value::Text(s)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Column(name) => match env.lookup(name) {
                None => Err(EvalError::UnknownName(name.clone())),
                Some(Value::Missing) => Err(EvalError::NotAvailable(name.clone())),
                Some(Value::Number(n)) if n.is_nan() => {
                    Err(EvalError::NotAvailable(name.clone()))
                }
                Some(v) => Ok(v),
            },
            Expr::Neg(inner) => match inner.eval(env)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(EvalError::TypeMismatch {
                    op: "-",
                    lhs: other.type_name(),
                    rhs: other.type_name(),
                }),
            },
            Expr::Not(inner) => Ok(Value::Bool(!inner.eval_bool(env)?)),
            Expr::And(l, r) => Ok(Value::Bool(l.eval_bool(env)? && r.eval_bool(env)?)),
            Expr::Or(l, r) => Ok(Value::Bool(l.eval_bool(env)? || r.eval_bool(env)?)),
            Expr::Arith(op, l, r) => arith(*op, l.eval(env)?, r.eval(env)?),
            Expr::Compare(first, rest) => {
                let mut lhs = first.eval(env)?;
                for (op, expr) in rest {
                    let rhs = expr.eval(env)?;
                    if !compare(*op, lhs, rhs)? {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::Bool(true))
            }
        }
    }
}

fn arith<'a>(op: ArithOp, lhs: Value<'a>, rhs: Value<'a>) -> Result<Value<'a>, EvalError> {
    let (Value::Number(a), Value::Number(b)) = (lhs, rhs) else {
        return Err(EvalError::TypeMismatch {
            op: op.symbol(),
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        });
    };
    let out = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
    };
    Ok(Value::Number(out))
}

fn compare(op: CmpOp, lhs: Value<'_>, rhs: Value<'_>) -> Result<bool, EvalError> {
    use std::cmp::Ordering;

    let ordering = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(&b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) if matches!(op, CmpOp::Eq | CmpOp::Ne) => Some(a.cmp(&b)),
        _ => None,
    };
    let Some(ordering) = ordering else {
        // Equality across types is decidable: different types never match.
        if lhs.type_name() != rhs.type_name() {
            match op {
                CmpOp::Eq => return Ok(false),
                CmpOp::Ne => return Ok(true),
                _ => {}
            }
        }
        return Err(EvalError::TypeMismatch {
            op: op.symbol(),
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        });
    };
    Ok(match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
    })
}

// ─── Lexer ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { offset: usize, ch: char },
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { offset: usize, text: String },
    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken { offset: usize, found: String },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("nesting too deep at offset {offset}")]
    TooDeep { offset: usize },
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    And,
    Or,
    Not,
    LParen,
    RParen,
    Cmp(CmpOp),
    Plus,
    Minus,
    Star,
    Slash,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::Str(s) => write!(f, "string '{s}'"),
            TokenKind::Ident(s) => write!(f, "name '{s}'"),
            TokenKind::True => f.write_str("'True'"),
            TokenKind::False => f.write_str("'False'"),
            TokenKind::And => f.write_str("'and'"),
            TokenKind::Or => f.write_str("'or'"),
            TokenKind::Not => f.write_str("'not'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::Cmp(op) => write!(f, "'{}'", op.symbol()),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Slash => f.write_str("'/'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let (kind, width) = match (c, next) {
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('<', Some('=')) => (TokenKind::Cmp(CmpOp::Le), 2),
            ('<', _) => (TokenKind::Cmp(CmpOp::Lt), 1),
            ('>', Some('=')) => (TokenKind::Cmp(CmpOp::Ge), 2),
            ('>', _) => (TokenKind::Cmp(CmpOp::Gt), 1),
            ('=', Some('=')) => (TokenKind::Cmp(CmpOp::Eq), 2),
            ('!', Some('=')) => (TokenKind::Cmp(CmpOp::Ne), 2),
            ('!', _) => (TokenKind::Not, 1),
            ('&', Some('&')) => (TokenKind::And, 2),
            ('|', Some('|')) => (TokenKind::Or, 2),
            ('\'' | '"', _) => {
                let quote = c;
                let mut j = i + 1;
                let mut text = String::new();
                while j < chars.len() && chars[j].1 != quote {
                    text.push(chars[j].1);
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(ParseError::UnterminatedString { offset });
                }
                (TokenKind::Str(text), j + 1 - i)
            }
            _ if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let mut j = i;
                let mut text = String::new();
                while j < chars.len() {
                    let ch = chars[j].1;
                    let is_exponent_sign = (ch == '+' || ch == '-')
                        && matches!(text.chars().last(), Some('e' | 'E'));
                    if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || is_exponent_sign
                    {
                        text.push(ch);
                        j += 1;
                    } else {
                        break;
                    }
                }
                let value: f64 = text
                    .parse()
                    .map_err(|_| ParseError::InvalidNumber { offset, text: text.clone() })?;
                (TokenKind::Number(value), j - i)
            }
            _ if c.is_alphabetic() || c == '_' => {
                let mut j = i;
                let mut text = String::new();
                while j < chars.len() && (chars[j].1.is_alphanumeric() || chars[j].1 == '_') {
                    text.push(chars[j].1);
                    j += 1;
                }
                let kind = match text.as_str() {
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    "True" | "true" => TokenKind::True,
                    "False" | "false" => TokenKind::False,
                    _ => TokenKind::Ident(text),
                };
                (kind, j - i)
            }
            _ => return Err(ParseError::UnexpectedChar { offset, ch: c }),
        };

        tokens.push(Token { kind, offset });
        i += width;
    }

    Ok(tokens)
}

// ─── Parser ─────────────────────────────────────────────────────────

/// Limit on nested parentheses, `not` and unary minus.
const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        let tok = self.tokens.get(self.pos).cloned().ok_or(ParseError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Run `inner` one nesting level down. Called right after the opening
    /// token has been consumed.
    fn nested(
        &mut self,
        inner: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        if self.depth >= MAX_DEPTH {
            let offset = self
                .tokens
                .get(self.pos.saturating_sub(1))
                .map_or(0, |t| t.offset);
            return Err(ParseError::TooDeep { offset });
        }
        self.depth += 1;
        let out = inner(self);
        self.depth -= 1;
        out
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.not()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Not) {
            return Ok(Expr::Not(Box::new(self.nested(Self::not)?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let first = self.sum()?;
        let mut rest = Vec::new();
        while let Some(TokenKind::Cmp(op)) = self.peek().map(|t| t.kind.clone()) {
            self.pos += 1;
            rest.push((op, self.sum()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn sum(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.product()?;
        loop {
            let op = if self.eat(&TokenKind::Plus) {
                ArithOp::Add
            } else if self.eat(&TokenKind::Minus) {
                ArithOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.product()?;
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn product(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(&TokenKind::Star) {
                ArithOp::Mul
            } else if self.eat(&TokenKind::Slash) {
                ArithOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Minus) {
            return Ok(Expr::Neg(Box::new(self.nested(Self::unary)?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.advance()?;
        match tok.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Str(s) => Ok(Expr::Text(s)),
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::Ident(name) => Ok(Expr::Column(name)),
            TokenKind::LParen => {
                let inner = self.nested(Self::or)?;
                match self.advance() {
                    Ok(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Ok(other) => Err(ParseError::UnexpectedToken {
                        offset: other.offset,
                        found: other.kind.to_string(),
                    }),
                    Err(e) => Err(e),
                }
            }
            other => Err(ParseError::UnexpectedToken {
                offset: tok.offset,
                found: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, Value<'static>>);

    impl Env for MapEnv {
        fn lookup(&self, name: &str) -> Option<Value<'_>> {
            self.0.get(name).copied()
        }
    }

    fn env() -> MapEnv {
        MapEnv(HashMap::from([
            ("RSI_14", Value::Number(28.5)),
            ("Close", Value::Number(17.05)),
            ("EMA_50", Value::Number(17.01)),
            ("QG", Value::Text("Q1")),
            ("Session", Value::Text("London")),
            ("Sweep_low", Value::Bool(true)),
            ("ATR_14", Value::Number(f64::NAN)),
            ("MACD", Value::Missing),
        ]))
    }

    fn eval(src: &str) -> Result<bool, EvalError> {
        Expr::parse(src).unwrap().eval_bool(&env())
    }

    #[test]
    fn typical_rule_matches() {
        assert_eq!(
            eval("(RSI_14 < 35) and (Close > EMA_50) and (QG == 'Q1') and (Session == \"London\")"),
            Ok(true)
        );
        assert_eq!(eval("RSI_14 > 65 or QG == 'Q4'"), Ok(false));
    }

    #[test]
    fn symbolic_connectives() {
        assert_eq!(eval("!(RSI_14 > 30) && Sweep_low"), Ok(true));
        assert_eq!(eval("RSI_14 > 30 || not Sweep_low"), Ok(false));
    }

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        // true or (false and false)
        assert_eq!(eval("Sweep_low or RSI_14 > 50 and Close < 0"), Ok(true));
    }

    #[test]
    fn arithmetic_and_unary_minus() {
        assert_eq!(eval("Close - EMA_50 > 0.03"), Ok(true));
        assert_eq!(eval("-RSI_14 < -28"), Ok(true));
        assert_eq!(eval("RSI_14 / 2 * 2 == RSI_14"), Ok(true));
        assert_eq!(eval("1e-3 < 0.01"), Ok(true));
    }

    #[test]
    fn chained_comparison() {
        assert_eq!(eval("20 < RSI_14 < 30"), Ok(true));
        assert_eq!(eval("30 < RSI_14 < 70"), Ok(false));
    }

    #[test]
    fn missing_values_fail() {
        assert_eq!(
            eval("ATR_14 > 0"),
            Err(EvalError::NotAvailable("ATR_14".into()))
        );
        assert_eq!(eval("MACD > 0"), Err(EvalError::NotAvailable("MACD".into())));
    }

    #[test]
    fn short_circuit_skips_missing_operand() {
        assert_eq!(eval("RSI_14 > 50 and ATR_14 > 0"), Ok(false));
        assert_eq!(eval("Sweep_low or ATR_14 > 0"), Ok(true));
    }

    #[test]
    fn runtime_errors() {
        assert_eq!(eval("Foo > 1"), Err(EvalError::UnknownName("Foo".into())));
        assert!(matches!(eval("QG < 3"), Err(EvalError::TypeMismatch { .. })));
        assert!(matches!(eval("RSI_14"), Err(EvalError::NotBool("number"))));
        assert_eq!(eval("Close / 0 > 1"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Expr::parse("   "), Err(ParseError::Empty));
        assert_eq!(Expr::parse("(RSI_14 < 30"), Err(ParseError::UnexpectedEnd));
        assert!(matches!(
            Expr::parse("QG == 'Q1"),
            Err(ParseError::UnterminatedString { offset: 6 })
        ));
        assert!(matches!(
            Expr::parse("RSI_14 < 30)"),
            Err(ParseError::UnexpectedToken { offset: 11, .. })
        ));
        assert!(matches!(
            Expr::parse("__import__('os') @ 1"),
            Err(ParseError::UnexpectedChar { ch: '@', .. })
        ));
        assert!(matches!(
            Expr::parse("RSI_14 < 1.2.3"),
            Err(ParseError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn nesting_is_capped() {
        let deep = format!("{}RSI_14{} < 30", "(".repeat(200), ")".repeat(200));
        assert!(matches!(
            Expr::parse(&deep),
            Err(ParseError::TooDeep { offset: 64 })
        ));
        let negated = format!("{}Sweep_low", "not ".repeat(100));
        assert!(matches!(Expr::parse(&negated), Err(ParseError::TooDeep { .. })));
        assert!(matches!(
            Expr::parse(&format!("{}1 < 2", "-".repeat(100))),
            Err(ParseError::TooDeep { .. })
        ));

        let fine = format!("{}RSI_14{} < 30", "(".repeat(60), ")".repeat(60));
        assert_eq!(Expr::parse(&fine).unwrap().eval_bool(&env()), Ok(true));
    }

    #[test]
    fn equality_across_types() {
        assert_eq!(eval("QG != 1"), Ok(true));
        assert_eq!(eval("QG == 1"), Ok(false));
        assert_eq!(eval("Sweep_low != 'yes'"), Ok(true));
        assert!(matches!(eval("QG >= 1"), Err(EvalError::TypeMismatch { .. })));
    }

    #[test]
    fn columns_are_collected() {
        let expr = Expr::parse("(RSI_14 < 35) and (Close > EMA_50) or not (QG == 'Q1')").unwrap();
        let cols: Vec<&str> = expr.columns().into_iter().collect();
        assert_eq!(cols, vec!["Close", "EMA_50", "QG", "RSI_14"]);
    }
}
