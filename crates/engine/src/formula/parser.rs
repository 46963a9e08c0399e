//! Formula text to column expression tree.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := factor (('*' | '/') factor)*
//! factor  := unary ('^' factor)?          (right associative)
//! unary   := '-' unary | primary
//! primary := number | name | name '(' expr ')' | '(' expr ')'
//! ```
//!
//! Names are bare identifiers or backtick-quoted (for names with spaces).
//! A name followed by `(` is a function call; anything else stays an
//! [`ColumnExpr::Ident`] for the resolver.

use crate::error::FormulaError;
use crate::formula::expr::{AggFn, BinaryOp, ColumnExpr, RowFn};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Name(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(text: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '^' => {
                chars.next();
                tokens.push(Token::Caret);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '`' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('`') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(FormulaError::Syntax),
                    }
                }
                if name.is_empty() {
                    return Err(FormulaError::Syntax);
                }
                tokens.push(Token::Name(name));
            }
            '0'..='9' | '.' => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n: f64 = digits.parse().map_err(|_| FormulaError::Syntax)?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(name));
            }
            _ => return Err(FormulaError::Syntax),
        }
    }

    Ok(tokens)
}

enum FnKind {
    Row(RowFn),
    Agg(AggFn),
}

/// Function names are matched case-insensitively.
fn function_for(name: &str) -> Option<FnKind> {
    let kind = match name.to_ascii_uppercase().as_str() {
        "ABS" => FnKind::Row(RowFn::Abs),
        "LN" => FnKind::Row(RowFn::Ln),
        "LOG10" => FnKind::Row(RowFn::Log10),
        "SQRT" => FnKind::Row(RowFn::Sqrt),
        "EXP" => FnKind::Row(RowFn::Exp),
        "MEAN" => FnKind::Agg(AggFn::Mean),
        "SUM" => FnKind::Agg(AggFn::Sum),
        "SD" => FnKind::Agg(AggFn::Sd),
        "MIN" => FnKind::Agg(AggFn::Min),
        "MAX" => FnKind::Agg(AggFn::Max),
        _ => return None,
    };
    Some(kind)
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
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, want: &Token) -> Result<(), FormulaError> {
        match self.next() {
            Some(ref t) if t == want => Ok(()),
            _ => Err(FormulaError::Syntax),
        }
    }

    fn expr(&mut self) -> Result<ColumnExpr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = ColumnExpr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<ColumnExpr, FormulaError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = ColumnExpr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<ColumnExpr, FormulaError> {
        let base = self.unary()?;
        if let Some(Token::Caret) = self.peek() {
            self.pos += 1;
            let exp = self.factor()?;
            return Ok(ColumnExpr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exp),
            });
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<ColumnExpr, FormulaError> {
        if let Some(Token::Minus) = self.peek() {
            self.pos += 1;
            let inner = self.unary()?;
            return Ok(ColumnExpr::Unary(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<ColumnExpr, FormulaError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(ColumnExpr::Number(n)),
            Some(Token::Name(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.pos += 1;
                    let arg = self.expr()?;
                    self.eat(&Token::RParen)?;
                    match function_for(&name) {
                        Some(FnKind::Row(f)) => Ok(ColumnExpr::RowFunc {
                            f,
                            arg: Box::new(arg),
                        }),
                        Some(FnKind::Agg(f)) => Ok(ColumnExpr::Agg {
                            f,
                            arg: Box::new(arg),
                        }),
                        None => Err(FormulaError::Invalid(format!(
                            "Function '{name}' does not exist"
                        ))),
                    }
                } else {
                    Ok(ColumnExpr::Ident(name))
                }
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.eat(&Token::RParen)?;
                Ok(inner)
            }
            _ => Err(FormulaError::Syntax),
        }
    }
}

/// Parse formula text. Blank text (empty or whitespace) parses to `None`,
/// meaning the formula is being cleared rather than set.
pub fn parse(text: &str) -> Result<Option<ColumnExpr>, FormulaError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let tree = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(FormulaError::Syntax);
    }
    Ok(Some(tree))
}
