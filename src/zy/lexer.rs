// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/lexer.rs

// Chunk-fed tokenizer. Input arrives in pieces; a token split
// across pieces is held until it is complete, and running out of
// input is reported as an End token rather than an error.

// <>

use std::collections::VecDeque;
use std::mem;

use regex::Regex;

use super::{ZyErr, ZyResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    LSquare,
    RSquare,
    LCurly,
    RCurly,
    Quote,
    SyntaxQuote,
    Unquote,
    UnquoteSplice,
    /// dotted pair marker
    Backslash,
    Comma,
    Symbol,
    SymbolColon,
    DotSymbol,
    Sigil,
    Bool,
    Decimal,
    Hex,
    Oct,
    Binary,
    Float,
    Uint64,
    Char,
    Str,
    Comment,
    BeginBlockComment,
    EndBlockComment,
    /// no further token can be formed from the input so far
    End,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LexerState {
    Normal,
    Str,
    Escape,
    LineComment,
    BlockComment,
    BlockCommentStar,
    Backtick,
    /// saw `:` with an empty buffer; `:=` or a lone colon
    Colon,
    /// saw `/` with an empty buffer; comment opener or division
    Slash,
    /// saw `~`; unquote or `~@`
    Tilde,
    /// saw `%`; quote prefix or the modulo operator
    Percent,
}

/// Regular expressions classifying a completed atom
struct AtomShapes {
    decimal: Regex,
    hex: Regex,
    oct: Regex,
    binary: Regex,
    float: Regex,
    uint64: Regex,
    chr: Regex,
    dot_symbol: Regex,
    symbol: Regex,
}

impl AtomShapes {
    fn new() -> Result<Self, regex::Error> {
        Ok(AtomShapes {
            decimal: Regex::new(r"^-?[0-9]+$")?,
            hex: Regex::new(r"^0x[0-9a-fA-F]+$")?,
            oct: Regex::new(r"^0o[0-7]+$")?,
            binary: Regex::new(r"^0b[01]+$")?,
            float: Regex::new(
                r"^-?([0-9]+\.[0-9]*([eE][-+]?[0-9]+)?|\.[0-9]+([eE][-+]?[0-9]+)?|[0-9]+[eE][-+]?[0-9]+)$",
            )?,
            uint64: Regex::new(r"^(0x[0-9a-fA-F]+|0o[0-7]+|[0-9]+)ULL$")?,
            chr: Regex::new(&format!(
                r"^#(.|u\+[0-9a-fA-F]{{1,6}}|{})$",
                CHAR_NAMES
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join("|")
            ))?,
            dot_symbol: Regex::new(r"^(\.[^.\s]+)+$")?,
            symbol: Regex::new(r"^(-|-[^0-9#\s][^\s]*|[^0-9\-#\s][^\s]*)$")?,
        })
    }

    fn classify(&self, atom: &str) -> Option<TokenKind> {
        let kind = if atom == "true" || atom == "false" {
            TokenKind::Bool
        } else if self.uint64.is_match(atom) {
            TokenKind::Uint64
        } else if self.hex.is_match(atom) {
            TokenKind::Hex
        } else if self.oct.is_match(atom) {
            TokenKind::Oct
        } else if self.binary.is_match(atom) {
            TokenKind::Binary
        } else if self.decimal.is_match(atom) {
            TokenKind::Decimal
        } else if self.float.is_match(atom) {
            TokenKind::Float
        } else if self.chr.is_match(atom) {
            TokenKind::Char
        } else if self.dot_symbol.is_match(atom) {
            TokenKind::DotSymbol
        } else if atom.chars().count() > 1
            && (atom.starts_with('$') || atom.starts_with('?') || atom.starts_with('#'))
        {
            TokenKind::Sigil
        } else if self.symbol.is_match(atom) {
            TokenKind::Symbol
        } else {
            return None;
        };
        Some(kind)
    }
}

pub struct Lexer {
    input: VecDeque<char>,
    buffer: String,
    state: LexerState,
    tokens: VecDeque<Token>,
    line: usize,
    shapes: AtomShapes,
}

impl Lexer {
    pub fn new() -> ZyResult<Self> {
        let shapes = AtomShapes::new().map_err(|e| ZyErr::Lex {
            line: 0,
            msg: format!("atom patterns: {}", e),
        })?;
        Ok(Lexer {
            input: VecDeque::new(),
            buffer: String::new(),
            state: LexerState::Normal,
            tokens: VecDeque::new(),
            line: 1,
            shapes,
        })
    }

    /// Discards all partial state: pending input, half-built tokens,
    /// and queued tokens
    pub fn reset(&mut self) {
        self.input.clear();
        self.buffer.clear();
        self.tokens.clear();
        self.state = LexerState::Normal;
        self.line = 1;
    }

    /// Appends a chunk of source; lexing resumes where it stopped
    pub fn add_next_stream(&mut self, chunk: &str) {
        self.input.extend(chunk.chars());
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// The next token without consuming it; an End token means
    /// nothing more can be formed yet
    pub fn peek_next_token(&mut self) -> ZyResult<Token> {
        self.fill()?;
        Ok(match self.tokens.front() {
            Some(tok) => tok.clone(),
            None => self.end_token(),
        })
    }

    pub fn get_next_token(&mut self) -> ZyResult<Token> {
        self.fill()?;
        Ok(match self.tokens.pop_front() {
            Some(tok) => tok,
            None => self.end_token(),
        })
    }

    fn end_token(&self) -> Token {
        Token {
            kind: TokenKind::End,
            text: String::new(),
            line: self.line,
        }
    }

    fn fill(&mut self) -> ZyResult<()> {
        while self.tokens.is_empty() {
            match self.input.pop_front() {
                Some(r) => {
                    if let Err(e) = self.lex_rune(r) {
                        self.buffer.clear();
                        self.state = LexerState::Normal;
                        return Err(e);
                    }
                }
                None => break,
            }
        }
        Ok(())
    }

    fn emit(&mut self, kind: TokenKind, text: impl Into<String>) {
        self.tokens.push_back(Token {
            kind,
            text: text.into(),
            line: self.line,
        });
    }

    fn error(&self, msg: String) -> ZyErr {
        ZyErr::Lex {
            line: self.line,
            msg,
        }
    }

    fn lex_rune(&mut self, r: char) -> ZyResult<()> {
        match self.state {
            LexerState::Normal => self.lex_normal(r)?,
            LexerState::Str => match r {
                '\\' => self.state = LexerState::Escape,
                '"' => {
                    let text = mem::take(&mut self.buffer);
                    self.emit(TokenKind::Str, text);
                    self.state = LexerState::Normal;
                }
                c => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    self.buffer.push(c);
                }
            },
            LexerState::Escape => {
                let c = match r {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    '"' => '"',
                    '\\' => '\\',
                    other => return Err(self.error(format!("unknown escape sequence \\{}", other))),
                };
                self.buffer.push(c);
                self.state = LexerState::Str;
            }
            LexerState::Backtick => match r {
                '`' => {
                    let text = mem::take(&mut self.buffer);
                    self.emit(TokenKind::Str, text);
                    self.state = LexerState::Normal;
                }
                c => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    self.buffer.push(c);
                }
            },
            LexerState::LineComment => match r {
                '\n' => {
                    let text = mem::take(&mut self.buffer);
                    self.emit(TokenKind::Comment, text);
                    self.line += 1;
                    self.state = LexerState::Normal;
                }
                c => self.buffer.push(c),
            },
            LexerState::BlockComment => match r {
                '*' => self.state = LexerState::BlockCommentStar,
                c => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    self.buffer.push(c);
                }
            },
            LexerState::BlockCommentStar => match r {
                '/' => {
                    let text = mem::take(&mut self.buffer);
                    self.emit(TokenKind::Comment, text);
                    self.emit(TokenKind::EndBlockComment, "*/");
                    self.state = LexerState::Normal;
                }
                '*' => self.buffer.push('*'),
                c => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    self.buffer.push('*');
                    self.buffer.push(c);
                    self.state = LexerState::BlockComment;
                }
            },
            LexerState::Colon => {
                self.state = LexerState::Normal;
                if r == '=' {
                    self.emit(TokenKind::Symbol, ":=");
                } else {
                    self.emit(TokenKind::Symbol, ":");
                    self.lex_normal(r)?;
                }
            }
            LexerState::Slash => match r {
                '/' => self.state = LexerState::LineComment,
                '*' => {
                    self.emit(TokenKind::BeginBlockComment, "/*");
                    self.state = LexerState::BlockComment;
                }
                c => {
                    self.buffer.push('/');
                    self.state = LexerState::Normal;
                    self.lex_normal(c)?;
                }
            },
            LexerState::Tilde => {
                self.state = LexerState::Normal;
                if r == '@' {
                    self.emit(TokenKind::UnquoteSplice, "~@");
                } else {
                    self.emit(TokenKind::Unquote, "~");
                    self.lex_normal(r)?;
                }
            }
            LexerState::Percent => {
                self.state = LexerState::Normal;
                if r.is_whitespace() || matches!(r, ')' | ']' | '}') {
                    self.buffer.push('%');
                } else {
                    self.emit(TokenKind::Quote, "%");
                }
                self.lex_normal(r)?;
            }
        }
        Ok(())
    }

    fn lex_normal(&mut self, r: char) -> ZyResult<()> {
        match r {
            '"' => {
                self.finish_atom()?;
                self.state = LexerState::Str;
            }
            '`' => {
                self.finish_atom()?;
                self.state = LexerState::Backtick;
            }
            ';' => {
                self.finish_atom()?;
                self.state = LexerState::LineComment;
            }
            '(' | ')' | '[' | ']' | '{' | '}' => {
                self.finish_atom()?;
                let kind = match r {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '[' => TokenKind::LSquare,
                    ']' => TokenKind::RSquare,
                    '{' => TokenKind::LCurly,
                    _ => TokenKind::RCurly,
                };
                self.emit(kind, r.to_string());
            }
            ',' => {
                self.finish_atom()?;
                self.emit(TokenKind::Comma, ",");
            }
            c if c.is_whitespace() => {
                self.finish_atom()?;
                if c == '\n' {
                    self.line += 1;
                }
            }
            '/' if self.buffer.is_empty() => self.state = LexerState::Slash,
            ':' if self.buffer.is_empty() => self.state = LexerState::Colon,
            ':' => {
                self.buffer.push(':');
                self.finish_atom()?;
            }
            '\\' if self.buffer.is_empty() => self.emit(TokenKind::Backslash, "\\"),
            '%' if self.buffer.is_empty() => self.state = LexerState::Percent,
            '^' if self.buffer.is_empty() => self.emit(TokenKind::SyntaxQuote, "^"),
            '~' if self.buffer.is_empty() => self.state = LexerState::Tilde,
            c => self.buffer.push(c),
        }
        Ok(())
    }

    /// Classifies and emits the buffered atom, if any
    fn finish_atom(&mut self) -> ZyResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let atom = mem::take(&mut self.buffer);

        if let Some(name) = atom.strip_suffix(':') {
            if !name.is_empty() && self.shapes.symbol.is_match(name) {
                self.emit(TokenKind::SymbolColon, name);
                return Ok(());
            }
            return Err(self.error(format!("malformed keyword '{}'", atom)));
        }

        match self.shapes.classify(&atom) {
            Some(kind) => {
                self.emit(kind, atom);
                Ok(())
            }
            None => Err(self.error(format!("malformed atom '{}'", atom))),
        }
    }
}

/// Splits a dot path such as `.a.b.c` into `.a`, `.b`, `.c`
pub fn split_dot_path(path: &str) -> Vec<String> {
    path.split('.')
        .filter(|part| !part.is_empty())
        .map(|part| format!(".{}", part))
        .collect()
}

/// Spellings for characters that cannot follow `#` as themselves
const CHAR_NAMES: &[(&str, char)] = &[
    ("newline", '\n'),
    ("space", ' '),
    ("tab", '\t'),
    ("return", '\r'),
    ("lparen", '('),
    ("rparen", ')'),
    ("lsquare", '['),
    ("rsquare", ']'),
    ("lcurly", '{'),
    ("rcurly", '}'),
    ("dquote", '"'),
    ("backtick", '`'),
    ("semicolon", ';'),
    ("comma", ','),
    ("colon", ':'),
];

/// Resolves the text after `#` in a char literal: a name, `u+hex`, or
/// a single character
pub fn char_from_literal(text: &str) -> Option<char> {
    if let Some((_, c)) = CHAR_NAMES.iter().find(|(name, _)| *name == text) {
        return Some(*c);
    }
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => {
            let hex = text.strip_prefix("u+")?;
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        }
    }
}

/// Spelling of `c` after `#` when the bare character would not read back
pub fn char_name(c: char) -> Option<String> {
    match CHAR_NAMES.iter().find(|(_, named)| *named == c) {
        Some((name, _)) => Some(name.to_string()),
        None if c.is_whitespace() || c.is_control() => Some(format!("u+{:04x}", c as u32)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lex_all(text: &str) -> Vec<Token> {
        let mut lx = Lexer::new().unwrap();
        lx.add_next_stream(text);
        let mut out = vec![];
        loop {
            let tok = lx.get_next_token().unwrap();
            if tok.kind == TokenKind::End {
                return out;
            }
            out.push(tok);
        }
    }

    fn kinds(text: &str) -> Vec<TokenKind> {
        lex_all(text).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn numbers() {
        let toks = lex_all("8.06e-05 -1 0x1F 0o17 0b101 42ULL 0xffULL 3.5 ");
        let got: Vec<_> = toks.iter().map(|t| (t.kind, t.text.as_str())).collect();
        assert_eq!(
            got,
            vec![
                (TokenKind::Float, "8.06e-05"),
                (TokenKind::Decimal, "-1"),
                (TokenKind::Hex, "0x1F"),
                (TokenKind::Oct, "0o17"),
                (TokenKind::Binary, "0b101"),
                (TokenKind::Uint64, "42ULL"),
                (TokenKind::Uint64, "0xffULL"),
                (TokenKind::Float, "3.5"),
            ]
        );
    }

    #[test]
    fn negative_vs_operator() {
        assert_eq!(
            kinds("(- 5 -1) "),
            vec![
                TokenKind::LParen,
                TokenKind::Symbol,
                TokenKind::Decimal,
                TokenKind::Decimal,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn symbols_and_operators() {
        let toks = lex_all("a: := : .a.b.c $sig (% 5 2) %x / ");
        let got: Vec<_> = toks.iter().map(|t| (t.kind, t.text.as_str())).collect();
        assert_eq!(
            got,
            vec![
                (TokenKind::SymbolColon, "a"),
                (TokenKind::Symbol, ":="),
                (TokenKind::Symbol, ":"),
                (TokenKind::DotSymbol, ".a.b.c"),
                (TokenKind::Sigil, "$sig"),
                (TokenKind::LParen, "("),
                (TokenKind::Symbol, "%"),
                (TokenKind::Decimal, "5"),
                (TokenKind::Decimal, "2"),
                (TokenKind::RParen, ")"),
                (TokenKind::Quote, "%"),
                (TokenKind::Symbol, "x"),
                (TokenKind::Symbol, "/"),
            ]
        );
    }

    #[test]
    fn quoting_prefixes() {
        assert_eq!(
            kinds("^(a ~b ~@c) "),
            vec![
                TokenKind::SyntaxQuote,
                TokenKind::LParen,
                TokenKind::Symbol,
                TokenKind::Unquote,
                TokenKind::Symbol,
                TokenKind::UnquoteSplice,
                TokenKind::Symbol,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn strings_and_comments() {
        let toks = lex_all("\"a\\tb\" `raw\n\"x\"` ; line\n// other\n/* blo*ck */ x ");
        let got: Vec<_> = toks.iter().map(|t| (t.kind, t.text.as_str())).collect();
        assert_eq!(
            got,
            vec![
                (TokenKind::Str, "a\tb"),
                (TokenKind::Str, "raw\n\"x\""),
                (TokenKind::Comment, " line"),
                (TokenKind::Comment, " other"),
                (TokenKind::BeginBlockComment, "/*"),
                (TokenKind::Comment, " blo*ck "),
                (TokenKind::EndBlockComment, "*/"),
                (TokenKind::Symbol, "x"),
            ]
        );
        assert_eq!(toks.last().unwrap().line, 4);
    }

    #[test]
    fn split_chunks() {
        let mut lx = Lexer::new().unwrap();
        lx.add_next_stream("(defn hel");
        assert_eq!(lx.get_next_token().unwrap().kind, TokenKind::LParen);
        assert_eq!(lx.get_next_token().unwrap().text, "defn");
        // `hel` may continue in the next chunk
        assert_eq!(lx.peek_next_token().unwrap().kind, TokenKind::End);

        lx.add_next_stream("lo \"gree");
        assert_eq!(lx.get_next_token().unwrap().text, "hello");
        assert_eq!(lx.get_next_token().unwrap().kind, TokenKind::End);

        lx.add_next_stream("tings!\")");
        let s = lx.get_next_token().unwrap();
        assert_eq!((s.kind, s.text.as_str()), (TokenKind::Str, "greetings!"));
        assert_eq!(lx.get_next_token().unwrap().kind, TokenKind::RParen);
    }

    #[test]
    fn block_comment_close_split() {
        let mut lx = Lexer::new().unwrap();
        lx.add_next_stream("/* abc *");
        assert_eq!(lx.get_next_token().unwrap().kind, TokenKind::BeginBlockComment);
        assert_eq!(lx.get_next_token().unwrap().kind, TokenKind::End);
        lx.add_next_stream("/ ");
        assert_eq!(lx.get_next_token().unwrap().text, " abc ");
        assert_eq!(lx.get_next_token().unwrap().kind, TokenKind::EndBlockComment);
    }

    #[test]
    fn malformed() {
        let mut lx = Lexer::new().unwrap();
        lx.add_next_stream("12abc ");
        assert!(matches!(lx.get_next_token(), Err(ZyErr::Lex { line: 1, .. })));

        let mut lx = Lexer::new().unwrap();
        lx.add_next_stream("\"bad \\q\" ");
        assert!(matches!(lx.get_next_token(), Err(ZyErr::Lex { .. })));
    }

    #[test]
    fn reset_discards() {
        let mut lx = Lexer::new().unwrap();
        lx.add_next_stream("(a \"unterminated");
        assert_eq!(lx.get_next_token().unwrap().kind, TokenKind::LParen);
        lx.reset();
        lx.add_next_stream("b ");
        let tok = lx.get_next_token().unwrap();
        assert_eq!((tok.kind, tok.text.as_str()), (TokenKind::Symbol, "b"));
    }

    #[test]
    fn dot_paths() {
        assert_eq!(split_dot_path(".a.b.c"), vec![".a", ".b", ".c"]);
        assert_eq!(split_dot_path(".field"), vec![".field"]);
    }

    #[test]
    fn delimiter_chars() {
        let toks = lex_all("#lparen #semicolon #colon #u+00a0 #u ");
        assert!(toks.iter().all(|t| t.kind == TokenKind::Char));
        let got: Vec<_> = toks.iter().map(|t| char_from_literal(&t.text[1..])).collect();
        assert_eq!(
            got,
            vec![Some('('), Some(';'), Some(':'), Some('\u{a0}'), Some('u')]
        );
        assert_eq!(char_from_literal("u+d800"), None);
        assert_eq!(char_name(';').as_deref(), Some("semicolon"));
        assert_eq!(char_name('\u{2028}').as_deref(), Some("u+2028"));
        assert_eq!(char_name('x'), None);
    }

    proptest! {
        #[test]
        fn integers_lex_whole(n in any::<i64>()) {
            let toks = lex_all(&format!("{} ", n));
            prop_assert_eq!(toks.len(), 1);
            prop_assert_eq!(toks[0].kind, TokenKind::Decimal);
            prop_assert_eq!(toks[0].text.parse::<i64>().unwrap(), n);
        }

        #[test]
        fn floats_lex_whole(x in -1.0e12f64..1.0e12f64) {
            let text = format!("{:?} ", x);
            let toks = lex_all(&text);
            prop_assert_eq!(toks.len(), 1);
            prop_assert_eq!(toks[0].kind, TokenKind::Float);
            prop_assert_eq!(toks[0].text.parse::<f64>().unwrap(), x);
        }
    }
}
