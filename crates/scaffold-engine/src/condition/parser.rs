//! Condition expression parser
//!
//! Tokenizes with character offsets and parses by recursive descent:
//!
//! ```text
//! expr     := or
//! or       := and (("or" | "||") and)*
//! and      := not (("and" | "&&") not)*
//! not      := ("not" | "!") not | compare
//! compare  := primary (("==" | "!=" | "in" | "not in") primary)?
//! primary  := "true" | "false" | STRING | NUMBER | "defined" "(" PATH ")"
//!           | PATH | "(" expr ")"
//! ```

use thiserror::Error;

use super::Expr;
use crate::context::VariablePath;
use crate::value::Value;

/// Maximum nesting of `not`, parentheses, and chained `and`/`or`
const MAX_DEPTH: usize = 128;

/// A condition failed to parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct ConditionSyntaxError {
    /// Character offset into the condition source
    pub offset: usize,
    /// What went wrong
    pub message: String,
}

impl ConditionSyntaxError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Not,
    And,
    Or,
    EqEq,
    NotEq,
    In,
    True,
    False,
    Defined,
    Str(String),
    Int(i64),
    Float(f64),
    Path(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Not => "`not`".to_string(),
            Token::And => "`and`".to_string(),
            Token::Or => "`or`".to_string(),
            Token::EqEq => "`==`".to_string(),
            Token::NotEq => "`!=`".to_string(),
            Token::In => "`in`".to_string(),
            Token::True => "`true`".to_string(),
            Token::False => "`false`".to_string(),
            Token::Defined => "`defined`".to_string(),
            Token::Str(s) => format!("string {:?}", s),
            Token::Int(i) => format!("number {}", i),
            Token::Float(f) => format!("number {}", f),
            Token::Path(p) => format!("`{}`", p),
        }
    }
}

/// Parse condition source into an expression tree
pub fn parse(source: &str) -> Result<Expr, ConditionSyntaxError> {
    let tokens = tokenize(source)?;
    let end = source.chars().count();
    let mut parser = Parser {
        tokens,
        position: 0,
        end,
        depth: 0,
    };

    if parser.tokens.is_empty() {
        return Err(ConditionSyntaxError::new(0, "empty condition"));
    }

    let expr = parser.parse_or()?;
    if let Some((token, offset)) = parser.peek_with_offset() {
        return Err(ConditionSyntaxError::new(
            offset,
            format!("unexpected {}", token.describe()),
        ));
    }
    Ok(expr)
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ConditionSyntaxError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => {
                tokens.push((Token::LParen, start));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, start));
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push((Token::EqEq, start));
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push((Token::NotEq, start));
                i += 2;
            }
            '!' => {
                tokens.push((Token::Not, start));
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push((Token::And, start));
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push((Token::Or, start));
                i += 2;
            }
            '\'' | '"' => {
                let (text, next) = lex_string(&chars, i)?;
                tokens.push((Token::Str(text), start));
                i = next;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                let (token, next) = lex_number(&chars, i)?;
                tokens.push((token, start));
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "true" => Token::True,
                    "false" => Token::False,
                    "defined" => Token::Defined,
                    _ => {
                        if VariablePath::parse(&word).is_none() {
                            return Err(ConditionSyntaxError::new(
                                start,
                                format!("invalid variable reference `{}`", word),
                            ));
                        }
                        Token::Path(word)
                    }
                };
                tokens.push((token, start));
            }
            other => {
                return Err(ConditionSyntaxError::new(
                    start,
                    format!("unexpected character `{}`", other),
                ));
            }
        }
    }

    Ok(tokens)
}

fn lex_string(chars: &[char], start: usize) -> Result<(String, usize), ConditionSyntaxError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                match chars.get(i + 1) {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(&c) => text.push(c),
                    None => break,
                }
                i += 2;
            }
            c if c == quote => return Ok((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }

    Err(ConditionSyntaxError::new(start, "unterminated string"))
}

fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize), ConditionSyntaxError> {
    let mut i = start + 1;
    let mut is_float = false;

    while i < chars.len() {
        match chars[i] {
            c if c.is_ascii_digit() => i += 1,
            '.' if !is_float && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) => {
                is_float = true;
                i += 1;
            }
            _ => break,
        }
    }

    let text: String = chars[start..i].iter().collect();
    let token = if is_float {
        text.parse::<f64>().map(Token::Float).ok()
    } else {
        text.parse::<i64>().map(Token::Int).ok()
    };

    token
        .map(|t| (t, i))
        .ok_or_else(|| ConditionSyntaxError::new(start, format!("invalid number `{}`", text)))
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(t, _)| t)
    }

    fn peek_with_offset(&self) -> Option<(&Token, usize)> {
        self.tokens.get(self.position).map(|(t, o)| (t, *o))
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .map(|(_, o)| *o)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).map(|(t, _)| t.clone());
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ConditionSyntaxError> {
        let offset = self.offset();
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(ConditionSyntaxError::new(
                offset,
                format!("expected {}, found {}", expected.describe(), token.describe()),
            )),
            None => Err(ConditionSyntaxError::new(
                offset,
                format!("expected {}, found end of condition", expected.describe()),
            )),
        }
    }

    fn enter(&mut self) -> Result<(), ConditionSyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ConditionSyntaxError::new(
                self.offset(),
                format!("condition nests deeper than {} levels", MAX_DEPTH),
            ));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionSyntaxError> {
        let start = self.depth;
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            self.enter()?;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth = start;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionSyntaxError> {
        let start = self.depth;
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            self.enter()?;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth = start;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ConditionSyntaxError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            self.enter()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, ConditionSyntaxError> {
        let left = self.parse_primary()?;

        let expr = match self.peek() {
            Some(Token::EqEq) => {
                self.advance();
                Expr::Eq(Box::new(left), Box::new(self.parse_primary()?))
            }
            Some(Token::NotEq) => {
                self.advance();
                Expr::Ne(Box::new(left), Box::new(self.parse_primary()?))
            }
            Some(Token::In) => {
                self.advance();
                Expr::In(Box::new(left), Box::new(self.parse_primary()?))
            }
            Some(Token::Not)
                if self.tokens.get(self.position + 1).map(|(t, _)| t) == Some(&Token::In) =>
            {
                self.position += 2;
                let right = self.parse_primary()?;
                Expr::Not(Box::new(Expr::In(Box::new(left), Box::new(right))))
            }
            _ => left,
        };

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionSyntaxError> {
        let offset = self.offset();
        let token = self.advance().ok_or_else(|| {
            ConditionSyntaxError::new(offset, "unexpected end of condition")
        })?;

        match token {
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Int(i) => Ok(Expr::Literal(Value::Integer(i))),
            Token::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Token::Path(p) => Ok(Expr::Var(path(&p, offset)?)),
            Token::Defined => {
                self.expect(Token::LParen)?;
                let path_offset = self.offset();
                let inner = match self.advance() {
                    Some(Token::Path(p)) => path(&p, path_offset)?,
                    _ => {
                        return Err(ConditionSyntaxError::new(
                            path_offset,
                            "`defined` expects a variable name",
                        ))
                    }
                };
                self.expect(Token::RParen)?;
                Ok(Expr::Defined(inner))
            }
            Token::LParen => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(ConditionSyntaxError::new(
                offset,
                format!("unexpected {}", other.describe()),
            )),
        }
    }
}

fn path(text: &str, offset: usize) -> Result<VariablePath, ConditionSyntaxError> {
    VariablePath::parse(text).ok_or_else(|| {
        ConditionSyntaxError::new(offset, format!("invalid variable reference `{}`", text))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(VariablePath::parse(name).unwrap()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a or b and not c").unwrap();
        assert_eq!(
            expr,
            Expr::Or(
                var("a"),
                Box::new(Expr::And(var("b"), Box::new(Expr::Not(var("c")))))
            )
        );
    }

    #[test]
    fn test_symbolic_operators() {
        assert_eq!(parse("a && !b").unwrap(), parse("a and not b").unwrap());
        assert_eq!(parse("a || b").unwrap(), parse("a or b").unwrap());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            parse("license == 'MIT'").unwrap(),
            Expr::Eq(var("license"), Box::new(Expr::Literal(Value::from("MIT"))))
        );
        assert_eq!(
            parse("\"x\" not in tags").unwrap(),
            Expr::Not(Box::new(Expr::In(
                Box::new(Expr::Literal(Value::from("x"))),
                var("tags")
            )))
        );
        assert_eq!(
            parse("port != -1.5").unwrap(),
            Expr::Ne(var("port"), Box::new(Expr::Literal(Value::Float(-1.5))))
        );
    }

    #[test]
    fn test_defined_and_parens() {
        assert_eq!(
            parse("(defined(ci.provider))").unwrap(),
            Expr::Defined(VariablePath::parse("ci.provider").unwrap())
        );
    }

    #[test]
    fn test_errors_carry_offsets() {
        assert_eq!(parse("").unwrap_err().offset, 0);
        assert_eq!(parse("a and").unwrap_err().offset, 5);
        assert_eq!(parse("a b").unwrap_err().offset, 2);
        assert_eq!(parse("x == 'open").unwrap_err().offset, 5);
        assert_eq!(parse("a $ b").unwrap_err().offset, 2);
        assert_eq!(parse("defined(1)").unwrap_err().offset, 8);
        assert_eq!(parse("(a").unwrap_err().offset, 2);
    }

    #[test]
    fn test_nesting_limit() {
        let nested = format!("{}a{}", "(".repeat(10_000), ")".repeat(10_000));
        let err = parse(&nested).unwrap_err();
        assert!(err.message.contains("nests deeper"));
        assert_eq!(err.offset, MAX_DEPTH + 1);

        let negated = format!("{}a", "not ".repeat(10_000));
        assert!(parse(&negated).unwrap_err().message.contains("nests deeper"));

        let chained = vec!["a"; 10_000].join(" and ");
        assert!(parse(&chained).unwrap_err().message.contains("nests deeper"));

        let shallow = format!("{}a{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(parse(&shallow).is_ok());
    }
}
