//! Purpose: Query evaluator for a CQL subset: parse query text and compile it against a corpus.
//! Exports: `parse`, `compile`, `QueryAst`, `CompiledQuery`.
//! Role: The collaborator that turns query text into a filter the concordance applies.
//! Invariants: Syntax errors, unknown attributes/structures and bad regexes are engine errors.
//! Invariants: String literals are regexes matched against the whole attribute value.
//! Invariants: `!` and `(` nest at most `MAX_NESTING` levels deep.
use std::fmt;

use regex::Regex;

use crate::core::error::Error;
use crate::engine::vertical::{CorpusData, Span};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cond {
    Any,
    Test {
        attr: String,
        negated: bool,
        pattern: String,
    },
    Not(Box<Cond>),
    And(Vec<Cond>),
    Or(Vec<Cond>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Within {
    pub structure: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryAst {
    pub positions: Vec<Cond>,
    pub within: Option<Within>,
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eq,
    Neq,
    And,
    Or,
    Not,
    Lt,
    Gt,
    Slash,
    Str(String),
    Name(String),
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::LBracket => write!(f, "'['"),
            Tok::RBracket => write!(f, "']'"),
            Tok::LParen => write!(f, "'('"),
            Tok::RParen => write!(f, "')'"),
            Tok::Eq => write!(f, "'='"),
            Tok::Neq => write!(f, "'!='"),
            Tok::And => write!(f, "'&'"),
            Tok::Or => write!(f, "'|'"),
            Tok::Not => write!(f, "'!'"),
            Tok::Lt => write!(f, "'<'"),
            Tok::Gt => write!(f, "'>'"),
            Tok::Slash => write!(f, "'/'"),
            Tok::Str(s) => write!(f, "string \"{s}\""),
            Tok::Name(n) => write!(f, "word '{n}'"),
        }
    }
}

fn syntax_error(pos: usize, what: impl fmt::Display) -> Error {
    Error::engine(format!("query syntax error at position {pos}: {what}"))
}

fn lex(input: &str) -> Result<Vec<(usize, Tok)>, Error> {
    let mut out = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some((pos, ch)) = chars.next() {
        let tok = match ch {
            c if c.is_whitespace() => continue,
            '[' => Tok::LBracket,
            ']' => Tok::RBracket,
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '=' => Tok::Eq,
            '&' => Tok::And,
            '|' => Tok::Or,
            '<' => Tok::Lt,
            '>' => Tok::Gt,
            '/' => Tok::Slash,
            '!' => {
                if chars.next_if(|(_, c)| *c == '=').is_some() {
                    Tok::Neq
                } else {
                    Tok::Not
                }
            }
            '"' => {
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        // keep the backslash: the literal is a regex
                        '\\' => {
                            value.push('\\');
                            if let Some((_, escaped)) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(syntax_error(pos, "unterminated string"));
                }
                Tok::Str(unescape_quotes(&value))
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = c.to_string();
                while let Some((_, c)) =
                    chars.next_if(|(_, c)| c.is_alphanumeric() || *c == '_' || *c == '.')
                {
                    name.push(c);
                }
                Tok::Name(name)
            }
            other => return Err(syntax_error(pos, format!("unexpected character '{other}'"))),
        };
        out.push((pos, tok));
    }
    Ok(out)
}

// `\"` only exists to get a quote past the lexer; the regex wants a bare quote.
fn unescape_quotes(value: &str) -> String {
    value.replace("\\\"", "\"")
}

const MAX_NESTING: usize = 256;

struct Parser {
    toks: Vec<(usize, Tok)>,
    at: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.at).map(|(_, tok)| tok)
    }

    fn pos(&self) -> usize {
        self.toks.get(self.at).map(|(pos, _)| *pos).unwrap_or(self.end)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.at).map(|(_, tok)| tok.clone());
        self.at += 1;
        tok
    }

    fn expect(&mut self, want: Tok) -> Result<(), Error> {
        let pos = self.pos();
        match self.bump() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(syntax_error(pos, format!("expected {want}, found {tok}"))),
            None => Err(syntax_error(pos, format!("expected {want}, found end of query"))),
        }
    }

    fn expect_str(&mut self) -> Result<String, Error> {
        let pos = self.pos();
        match self.bump() {
            Some(Tok::Str(s)) => Ok(s),
            Some(tok) => Err(syntax_error(pos, format!("expected string, found {tok}"))),
            None => Err(syntax_error(pos, "expected string, found end of query")),
        }
    }

    fn expect_name(&mut self) -> Result<String, Error> {
        let pos = self.pos();
        match self.bump() {
            Some(Tok::Name(n)) => Ok(n),
            Some(tok) => Err(syntax_error(pos, format!("expected name, found {tok}"))),
            None => Err(syntax_error(pos, "expected name, found end of query")),
        }
    }

    fn query(&mut self, default_attr: &str) -> Result<QueryAst, Error> {
        let mut positions = Vec::new();
        let mut within = None;
        while let Some(tok) = self.peek() {
            match tok {
                Tok::LBracket => {
                    self.bump();
                    if self.peek() == Some(&Tok::RBracket) {
                        self.bump();
                        positions.push(Cond::Any);
                        continue;
                    }
                    let cond = self.or_expr()?;
                    self.expect(Tok::RBracket)?;
                    positions.push(cond);
                }
                Tok::Str(_) => {
                    let pattern = self.expect_str()?;
                    positions.push(Cond::Test {
                        attr: default_attr.to_string(),
                        negated: false,
                        pattern,
                    });
                }
                Tok::Name(n) if n == "within" && !positions.is_empty() => {
                    self.bump();
                    within = Some(self.within()?);
                    break;
                }
                other => {
                    return Err(syntax_error(self.pos(), format!("unexpected {other}")));
                }
            }
        }
        if let Some(tok) = self.peek() {
            return Err(syntax_error(self.pos(), format!("unexpected {tok}")));
        }
        if positions.is_empty() {
            return Err(syntax_error(self.pos(), "empty query"));
        }
        Ok(QueryAst { positions, within })
    }

    fn within(&mut self) -> Result<Within, Error> {
        self.expect(Tok::Lt)?;
        let structure = self.expect_name()?;
        let mut attrs = Vec::new();
        while let Some(Tok::Name(_)) = self.peek() {
            let name = self.expect_name()?;
            self.expect(Tok::Eq)?;
            attrs.push((name, self.expect_str()?));
        }
        self.expect(Tok::Slash)?;
        self.expect(Tok::Gt)?;
        Ok(Within { structure, attrs })
    }

    fn or_expr(&mut self) -> Result<Cond, Error> {
        let mut items = vec![self.and_expr()?];
        while self.peek() == Some(&Tok::Or) {
            self.bump();
            items.push(self.and_expr()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Cond::Or(items)
        })
    }

    fn and_expr(&mut self) -> Result<Cond, Error> {
        let mut items = vec![self.unary()?];
        while self.peek() == Some(&Tok::And) {
            self.bump();
            items.push(self.unary()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Cond::And(items)
        })
    }

    fn nested(&mut self, f: fn(&mut Self) -> Result<Cond, Error>) -> Result<Cond, Error> {
        if self.depth >= MAX_NESTING {
            return Err(syntax_error(self.pos(), "query nesting too deep"));
        }
        self.depth += 1;
        let cond = f(self);
        self.depth -= 1;
        cond
    }

    fn unary(&mut self) -> Result<Cond, Error> {
        match self.peek() {
            Some(Tok::Not) => {
                self.bump();
                Ok(Cond::Not(Box::new(self.nested(Self::unary)?)))
            }
            Some(Tok::LParen) => {
                self.bump();
                let cond = self.nested(Self::or_expr)?;
                self.expect(Tok::RParen)?;
                Ok(cond)
            }
            _ => {
                let attr = self.expect_name()?;
                let pos = self.pos();
                let negated = match self.bump() {
                    Some(Tok::Eq) => false,
                    Some(Tok::Neq) => true,
                    Some(tok) => {
                        return Err(syntax_error(pos, format!("expected '=' or '!=', found {tok}")));
                    }
                    None => return Err(syntax_error(pos, "expected '=' or '!='")),
                };
                Ok(Cond::Test {
                    attr,
                    negated,
                    pattern: self.expect_str()?,
                })
            }
        }
    }
}

pub fn parse(input: &str, default_attr: &str) -> Result<QueryAst, Error> {
    let toks = lex(input)?;
    let mut parser = Parser {
        toks,
        at: 0,
        end: input.len(),
        depth: 0,
    };
    parser.query(default_attr)
}

#[derive(Debug)]
enum Matcher {
    Any,
    // mask[lexicon id] tells whether the value satisfies the test
    Lexicon { attr: usize, mask: Vec<bool> },
    Not(Box<Matcher>),
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
}

impl Matcher {
    fn matches(&self, data: &CorpusData, pos: usize) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Lexicon { attr, mask } => mask[data.attributes[*attr].id_at(pos) as usize],
            Matcher::Not(inner) => !inner.matches(data, pos),
            Matcher::And(items) => items.iter().all(|m| m.matches(data, pos)),
            Matcher::Or(items) => items.iter().any(|m| m.matches(data, pos)),
        }
    }
}

/// A query bound to one corpus: attribute names resolved, regexes evaluated per lexicon.
#[derive(Debug)]
pub struct CompiledQuery {
    text: String,
    positions: Vec<Matcher>,
    // allowed spans when the query has a `within` clause
    within: Option<Vec<Span>>,
}

impl CompiledQuery {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn width(&self) -> usize {
        self.positions.len()
    }

    /// Enumerates all match spans in corpus order.
    pub fn matches(&self, data: &CorpusData) -> Vec<Span> {
        let width = self.width();
        let mut out = Vec::new();
        let ranges: Vec<Span> = match &self.within {
            Some(spans) => spans.clone(),
            None => vec![Span {
                start: 0,
                end: data.size(),
            }],
        };
        for range in ranges {
            if range.len() < width {
                continue;
            }
            for start in range.start..=range.end - width {
                let hit = self
                    .positions
                    .iter()
                    .enumerate()
                    .all(|(offset, m)| m.matches(data, start + offset));
                if hit {
                    out.push(Span {
                        start,
                        end: start + width,
                    });
                }
            }
        }
        out
    }
}

pub fn compile(text: &str, ast: &QueryAst, data: &CorpusData) -> Result<CompiledQuery, Error> {
    let positions = ast
        .positions
        .iter()
        .map(|cond| compile_cond(cond, data))
        .collect::<Result<Vec<_>, _>>()?;
    let within = match &ast.within {
        Some(within) => Some(compile_within(within, data)?),
        None => None,
    };
    Ok(CompiledQuery {
        text: text.to_string(),
        positions,
        within,
    })
}

fn compile_cond(cond: &Cond, data: &CorpusData) -> Result<Matcher, Error> {
    Ok(match cond {
        Cond::Any => Matcher::Any,
        Cond::Test {
            attr,
            negated,
            pattern,
        } => {
            let idx = data
                .attributes
                .iter()
                .position(|a| &a.name == attr)
                .ok_or_else(|| Error::engine(format!("AttrNotFound ({attr})")))?;
            let re = full_match_regex(pattern)?;
            let mask = data.attributes[idx]
                .lexicon()
                .iter()
                .map(|value| re.is_match(value) != *negated)
                .collect();
            Matcher::Lexicon { attr: idx, mask }
        }
        Cond::Not(inner) => Matcher::Not(Box::new(compile_cond(inner, data)?)),
        Cond::And(items) => Matcher::And(
            items
                .iter()
                .map(|c| compile_cond(c, data))
                .collect::<Result<_, _>>()?,
        ),
        Cond::Or(items) => Matcher::Or(
            items
                .iter()
                .map(|c| compile_cond(c, data))
                .collect::<Result<_, _>>()?,
        ),
    })
}

fn compile_within(within: &Within, data: &CorpusData) -> Result<Vec<Span>, Error> {
    let structure = data
        .structure(&within.structure)
        .ok_or_else(|| Error::engine(format!("StructNotFound ({})", within.structure)))?;
    let mut tests = Vec::with_capacity(within.attrs.len());
    for (name, pattern) in &within.attrs {
        let idx = structure.attr_index(name).ok_or_else(|| {
            Error::engine(format!("AttrNotFound ({}.{name})", within.structure))
        })?;
        tests.push((idx, full_match_regex(pattern)?));
    }
    Ok(structure
        .spans()
        .iter()
        .enumerate()
        .filter(|(sidx, _)| {
            tests
                .iter()
                .all(|(attr, re)| re.is_match(structure.value(*attr, *sidx)))
        })
        .map(|(_, span)| *span)
        .collect())
}

fn full_match_regex(pattern: &str) -> Result<Regex, Error> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|err| Error::engine(format!("invalid regular expression \"{pattern}\": {err}")))
}
