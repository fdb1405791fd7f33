//! Restricted boolean predicate language for condition nodes
//!
//! Condition expressions are authored by users, so they are never executed as
//! code. They are parsed into a small AST and interpreted against a single
//! named input (`response`, the last action's result).
//!
//! Grammar, lowest precedence first:
//! ```text
//! or       := and ( "||" and )*
//! and      := equality ( "&&" equality )*
//! equality := relation ( ("==" | "!=" | "===" | "!==") relation )*
//! relation := unary ( ("<" | "<=" | ">" | ">=") unary )*
//! unary    := ("!" | "-") unary | member
//! member   := primary ( "." ident | "[" or "]" )*
//! primary  := number | string | true | false | null | undefined | response | "(" or ")"
//! ```
//!
//! `&&` and `||` chains are kept flat and evaluated iteratively. Every other
//! level of nesting (parentheses, unary operators, comparison chains, member
//! access) counts against `MAX_DEPTH`, and sources longer than `MAX_TOKENS`
//! tokens are rejected before parsing.

use serde_json::Value;
use thiserror::Error;

/// Name under which the evaluated input is visible to expressions
pub const INPUT_NAME: &str = "response";

const MAX_DEPTH: usize = 64;
const MAX_TOKENS: usize = 10_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("Unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    #[error("Invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("Unexpected token '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Expression nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("Expression has more than {0} tokens")]
    TooLong(usize),

    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("Cannot read property '{property}' of {target}")]
    NullishAccess { property: String, target: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Not,
    Minus,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Token::Number(n) => return write!(f, "{}", n),
            Token::Str(s) => return write!(f, "\"{}\"", s),
            Token::Ident(name) => return f.write_str(name),
            Token::Dot => ".",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Not => "!",
            Token::Minus => "-",
            Token::Eq => "==",
            Token::NotEq => "!=",
            Token::StrictEq => "===",
            Token::StrictNotEq => "!==",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::And => "&&",
            Token::Or => "||",
        };
        f.write_str(text)
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Multi-character operators first; longest match wins
        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        let operator = [
            ("===", Token::StrictEq),
            ("!==", Token::StrictNotEq),
            ("==", Token::Eq),
            ("!=", Token::NotEq),
            ("<=", Token::Le),
            (">=", Token::Ge),
            ("&&", Token::And),
            ("||", Token::Or),
        ]
        .into_iter()
        .find(|(text, _)| rest.starts_with(text));

        if let Some((text, token)) = operator {
            tokens.push((token, start));
            i += text.len();
            continue;
        }

        let single = match c {
            '.' if !chars.get(i + 1).is_some_and(char::is_ascii_digit) => Some(Token::Dot),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '!' => Some(Token::Not),
            '-' => Some(Token::Minus),
            '<' => Some(Token::Lt),
            '>' => Some(Token::Gt),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push((token, start));
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                i += 1;
                if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let number = text
                .parse::<f64>()
                .map_err(|_| ExpressionError::InvalidNumber(text.clone()))?;
            tokens.push((Token::Number(number), start));
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(ExpressionError::UnterminatedString(start));
                };
                i += 1;
                match ch {
                    '\\' => {
                        let escaped = chars
                            .get(i)
                            .copied()
                            .ok_or(ExpressionError::UnterminatedString(start))?;
                        i += 1;
                        value.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                    }
                    ch if ch == quote => break,
                    ch => value.push(ch),
                }
            }
            tokens.push((Token::Str(value), start));
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push((Token::Ident(chars[start..i].iter().collect()), start));
            continue;
        }

        return Err(ExpressionError::UnexpectedChar { ch: c, position: start });
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Operand),
    Input,
    Member { object: Box<Expr>, key: Box<Expr> },
    Not(Box<Expr>),
    Negate(Box<Expr>),
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// Two or more operands
    And(Vec<Expr>),
    /// Two or more operands
    Or(Vec<Expr>),
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, wanted: &Token) -> bool {
        if self.peek() == Some(wanted) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, wanted: Token) -> Result<(), ExpressionError> {
        match self.next() {
            Some((token, _)) if token == wanted => Ok(()),
            Some((token, position)) => Err(ExpressionError::UnexpectedToken {
                found: token.to_string(),
                position,
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        self.enter()?;
        let first = self.parse_and()?;
        let expr = if self.peek() == Some(&Token::Or) {
            let mut operands = vec![first];
            while self.eat(&Token::Or) {
                operands.push(self.parse_and()?);
            }
            Expr::Or(operands)
        } else {
            first
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.parse_equality()?;
        if self.peek() != Some(&Token::And) {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.eat(&Token::And) {
            operands.push(self.parse_equality()?);
        }
        Ok(Expr::And(operands))
    }

    fn parse_equality(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.depth;
        let mut lhs = self.parse_relation()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::StrictEq) => BinaryOp::StrictEq,
                Some(Token::StrictNotEq) => BinaryOp::StrictNotEq,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.enter()?;
            let rhs = self.parse_relation()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn parse_relation(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.depth;
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.enter()?;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Not) {
            self.enter()?;
            let operand = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(operand)));
        }
        if self.eat(&Token::Minus) {
            self.enter()?;
            let operand = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.parse_member()
    }

    fn parse_member(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.depth;
        let mut object = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                self.enter()?;
                match self.next() {
                    Some((Token::Ident(name), _)) => {
                        object = Expr::Member {
                            object: Box::new(object),
                            key: Box::new(Expr::Literal(Operand::Str(name))),
                        };
                    }
                    Some((token, position)) => {
                        return Err(ExpressionError::UnexpectedToken {
                            found: token.to_string(),
                            position,
                        })
                    }
                    None => return Err(ExpressionError::UnexpectedEnd),
                }
            } else if self.eat(&Token::LBracket) {
                self.enter()?;
                let key = self.parse_or()?;
                self.expect(Token::RBracket)?;
                object = Expr::Member {
                    object: Box::new(object),
                    key: Box::new(key),
                };
            } else {
                self.depth = base;
                return Ok(object);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.next() {
            Some((Token::Number(n), _)) => Ok(Expr::Literal(Operand::Number(n))),
            Some((Token::Str(s), _)) => Ok(Expr::Literal(Operand::Str(s))),
            Some((Token::Ident(name), _)) => Ok(match name.as_str() {
                "true" => Expr::Literal(Operand::Bool(true)),
                "false" => Expr::Literal(Operand::Bool(false)),
                "null" => Expr::Literal(Operand::Null),
                "undefined" => Expr::Literal(Operand::Undefined),
                INPUT_NAME => Expr::Input,
                // Rejected at evaluation time
                _ => Expr::Literal(Operand::Unresolved(name)),
            }),
            Some((Token::LParen, _)) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some((token, position)) => Err(ExpressionError::UnexpectedToken {
                found: token.to_string(),
                position,
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

/// Runtime value of a sub-expression
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// JSON array or object
    Composite(Value),
    /// Identifier other than the input name; evaluating it is an error
    Unresolved(String),
}

impl Operand {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Operand::Null,
            Value::Bool(b) => Operand::Bool(*b),
            Value::Number(n) => Operand::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Operand::Str(s.clone()),
            other => Operand::Composite(other.clone()),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Operand::Undefined | Operand::Null | Operand::Unresolved(_) => false,
            Operand::Bool(b) => *b,
            Operand::Number(n) => *n != 0.0 && !n.is_nan(),
            Operand::Str(s) => !s.is_empty(),
            Operand::Composite(_) => true,
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Operand::Null => 0.0,
            Operand::Bool(b) => f64::from(u8::from(*b)),
            Operand::Number(n) => *n,
            Operand::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Operand::Undefined | Operand::Composite(_) | Operand::Unresolved(_) => f64::NAN,
        }
    }

    fn property_key(&self) -> String {
        match self {
            Operand::Str(s) => s.clone(),
            Operand::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Operand::Number(n) => n.to_string(),
            Operand::Bool(b) => b.to_string(),
            Operand::Null => "null".to_string(),
            _ => "undefined".to_string(),
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self, Operand::Undefined | Operand::Null)
    }
}

fn member(object: Operand, key: Operand) -> Result<Operand, ExpressionError> {
    let property = key.property_key();
    match object {
        Operand::Undefined => Err(ExpressionError::NullishAccess { property, target: "undefined" }),
        Operand::Null => Err(ExpressionError::NullishAccess { property, target: "null" }),
        Operand::Composite(Value::Object(map)) => Ok(map
            .get(&property)
            .map(Operand::from_json)
            .unwrap_or(Operand::Undefined)),
        Operand::Composite(Value::Array(items)) => {
            if property == "length" {
                return Ok(Operand::Number(items.len() as f64));
            }
            Ok(property
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .map(Operand::from_json)
                .unwrap_or(Operand::Undefined))
        }
        Operand::Str(s) => {
            if property == "length" {
                return Ok(Operand::Number(s.chars().count() as f64));
            }
            Ok(property
                .parse::<usize>()
                .ok()
                .and_then(|index| s.chars().nth(index))
                .map(|ch| Operand::Str(ch.to_string()))
                .unwrap_or(Operand::Undefined))
        }
        _ => Ok(Operand::Undefined),
    }
}

fn strict_equals(lhs: &Operand, rhs: &Operand) -> bool {
    match (lhs, rhs) {
        (Operand::Number(a), Operand::Number(b)) => a == b,
        (Operand::Undefined, Operand::Undefined) | (Operand::Null, Operand::Null) => true,
        (a, b) => a == b,
    }
}

fn loose_equals(lhs: &Operand, rhs: &Operand) -> bool {
    match (lhs, rhs) {
        (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (Operand::Bool(_), _) | (_, Operand::Bool(_)) => {
            let a = if let Operand::Bool(_) = lhs { Operand::Number(lhs.to_number()) } else { lhs.clone() };
            let b = if let Operand::Bool(_) = rhs { Operand::Number(rhs.to_number()) } else { rhs.clone() };
            loose_equals(&a, &b)
        }
        (Operand::Number(_), Operand::Str(_)) | (Operand::Str(_), Operand::Number(_)) => {
            lhs.to_number() == rhs.to_number()
        }
        _ => strict_equals(lhs, rhs),
    }
}

fn compare(op: BinaryOp, lhs: &Operand, rhs: &Operand) -> bool {
    if let (Operand::Str(a), Operand::Str(b)) = (lhs, rhs) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (lhs.to_number(), rhs.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

fn eval(expr: &Expr, input: &Operand) -> Result<Operand, ExpressionError> {
    Ok(match expr {
        Expr::Literal(Operand::Unresolved(name)) => {
            return Err(ExpressionError::UnknownIdentifier(name.clone()))
        }
        Expr::Literal(value) => value.clone(),
        Expr::Input => input.clone(),
        Expr::Member { object, key } => member(eval(object, input)?, eval(key, input)?)?,
        Expr::Not(operand) => Operand::Bool(!eval(operand, input)?.truthy()),
        Expr::Negate(operand) => Operand::Number(-eval(operand, input)?.to_number()),
        Expr::And(operands) => {
            let mut value = Operand::Bool(true);
            for operand in operands {
                value = eval(operand, input)?;
                if !value.truthy() {
                    break;
                }
            }
            value
        }
        Expr::Or(operands) => {
            let mut value = Operand::Bool(false);
            for operand in operands {
                value = eval(operand, input)?;
                if value.truthy() {
                    break;
                }
            }
            value
        }
        Expr::Binary { op, lhs, rhs } => {
            let (a, b) = (eval(lhs, input)?, eval(rhs, input)?);
            Operand::Bool(match op {
                BinaryOp::Eq => loose_equals(&a, &b),
                BinaryOp::NotEq => !loose_equals(&a, &b),
                BinaryOp::StrictEq => strict_equals(&a, &b),
                BinaryOp::StrictNotEq => !strict_equals(&a, &b),
                _ => compare(*op, &a, &b),
            })
        }
    })
}

/// A parsed condition expression
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        if tokens.len() > MAX_TOKENS {
            return Err(ExpressionError::TooLong(MAX_TOKENS));
        }
        let mut parser = Parser { tokens, pos: 0, depth: 0 };
        let expr = parser.parse_or()?;
        if let Some((token, position)) = parser.next() {
            return Err(ExpressionError::UnexpectedToken {
                found: token.to_string(),
                position,
            });
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `input`; `None` means the input is undefined
    pub fn evaluate(&self, input: Option<&Value>) -> Result<bool, ExpressionError> {
        let input = input.map(Operand::from_json).unwrap_or(Operand::Undefined);
        Ok(eval(&self.expr, &input)?.truthy())
    }
}

/// Evaluate a condition expression, treating every failure as `false`
///
/// Blank expressions are `false` without being parsed.
pub fn evaluate_condition(expression: &str, input: Option<&Value>) -> bool {
    let expression = expression.trim();
    if expression.is_empty() {
        return false;
    }
    match Predicate::parse(expression).and_then(|p| p.evaluate(input)) {
        Ok(decision) => decision,
        Err(e) => {
            tracing::debug!("Condition '{}' evaluated as false: {}", expression, e);
            false
        }
    }
}
