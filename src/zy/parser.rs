// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/parser.rs

// Resumable parser. Parsing runs on its own thread and talks to the
// caller over rendezvous channels; when the lexer runs dry at any
// nesting depth, the parse process blocks in place until more input
// (or a reset, or a stop) arrives, then carries on from where it was.

// <>

use std::mem;
use std::num::ParseIntError;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Select, Sender};

use super::lexer::{char_from_literal, Lexer, Token, TokenKind};
use super::sexp::{Sexp, SexpSymbol};
use super::symtab::Stab;
use super::{ZyErr, ZyResult};

/// One handoff from the parse process: finished expressions and the
/// error, if any, that stopped the batch
pub struct ParserReply {
    pub exprs: Vec<Sexp>,
    pub err: Option<ZyErr>,
}

/// Caller's handle on a running parse process
pub struct Parser {
    add_input: Sender<String>,
    reset_add_input: Sender<String>,
    parsed_output: Receiver<Vec<ParserReply>>,
    /// dropped to ask the process to halt
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Parser {
    /// Starts a parse process interning symbols into `stab`
    pub fn new(stab: Stab) -> ZyResult<Self> {
        let lexer = Lexer::new()?;

        let (add_tx, add_rx) = bounded(0);
        let (reset_tx, reset_rx) = bounded(0);
        let (out_tx, out_rx) = bounded(0);
        let (stop_tx, stop_rx) = bounded(0);

        let process = ParseProcess {
            lexer,
            stab,
            add_input: add_rx,
            reset_add_input: reset_rx,
            parsed_output: out_tx,
            stop: stop_rx,
            send_me: Vec::new(),
            need_input: false,
        };

        let handle = thread::Builder::new()
            .name("zy-parser".to_string())
            .spawn(move || process.run())?;

        Ok(Parser {
            add_input: add_tx,
            reset_add_input: reset_tx,
            parsed_output: out_rx,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Hands another chunk of source to the parse process
    pub fn new_input(&self, text: &str) -> ZyResult<()> {
        self.add_input
            .send(text.to_string())
            .map_err(|_| ZyErr::ShuttingDown)
    }

    /// Discards any partial parse and starts over on `text`
    pub fn reset_add_new_input(&self, text: &str) -> ZyResult<()> {
        self.reset_add_input
            .send(text.to_string())
            .map_err(|_| ZyErr::ShuttingDown)
    }

    /// Blocks for the next batch of parsed expressions
    ///
    /// Returns every expression preceding the first reported error,
    /// along with that error.
    pub fn parse_tokens(&self) -> (Vec<Sexp>, Option<ZyErr>) {
        let replies = match self.parsed_output.recv() {
            Ok(replies) => replies,
            Err(_) => return (vec![], Some(ZyErr::ShuttingDown)),
        };

        let mut out = vec![];
        for reply in replies {
            out.extend(reply.exprs);
            if let Some(err) = reply.err {
                return (out, Some(err));
            }
        }
        (out, None)
    }

    /// Halts the parse process and waits for it to exit; later calls
    /// do nothing
    pub fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("parser thread panicked");
            }
        }
    }
}

impl Drop for Parser {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the parser thread
struct ParseProcess {
    lexer: Lexer,
    stab: Stab,
    add_input: Receiver<String>,
    reset_add_input: Receiver<String>,
    parsed_output: Sender<Vec<ParserReply>>,
    stop: Receiver<()>,
    /// replies waiting for the caller to collect them
    send_me: Vec<ParserReply>,
    /// offer an empty batch so a caller waiting on output wakes up
    need_input: bool,
}

impl ParseProcess {
    fn run(mut self) {
        log::debug!("parser process started");
        let mut exprs = Vec::new();

        loop {
            let handoff = match self.parse_expression() {
                Ok(Sexp::End) => self.get_more_input(mem::take(&mut exprs), None),
                Ok(expr) => {
                    exprs.push(expr);
                    Ok(())
                }
                Err(err @ (ZyErr::Lex { .. } | ZyErr::Parse { .. })) => {
                    self.get_more_input(mem::take(&mut exprs), Some(err))
                }
                Err(err) => Err(err),
            };

            match handoff {
                Ok(()) => {}
                Err(ZyErr::ResetRequested) => {
                    log::debug!("parser reset");
                    exprs.clear();
                }
                Err(ZyErr::HaltRequested) => break,
                Err(err) => {
                    if self.get_more_input(mem::take(&mut exprs), Some(err)).is_err() {
                        break;
                    }
                }
            }
        }

        log::debug!("parser process stopped");
    }

    /// Delivers what has been parsed and waits for something to do
    ///
    /// Returns once new input is available. A reset or a stop arrives
    /// as the corresponding error so that it unwinds any nested parse.
    fn get_more_input(&mut self, deliver: Vec<Sexp>, err: Option<ZyErr>) -> ZyResult<()> {
        if deliver.is_empty() && err.is_none() {
            self.need_input = true;
        } else {
            self.send_me.push(ParserReply {
                exprs: deliver,
                err,
            });
        }

        loop {
            let mut sel = Select::new();
            let stop_op = sel.recv(&self.stop);
            let input_op = sel.recv(&self.add_input);
            let reset_op = sel.recv(&self.reset_add_input);
            if !self.send_me.is_empty() || self.need_input {
                let _ = sel.send(&self.parsed_output);
            }

            let oper = sel.select();
            match oper.index() {
                i if i == stop_op => {
                    let _ = oper.recv(&self.stop);
                    return Err(ZyErr::HaltRequested);
                }
                i if i == input_op => {
                    let input = oper
                        .recv(&self.add_input)
                        .map_err(|_| ZyErr::HaltRequested)?;
                    self.lexer.add_next_stream(&input);
                    self.need_input = false;
                    // a stale request for input is answered by this input
                    self.send_me.retain(|reply| {
                        !(reply.exprs.is_empty() && matches!(reply.err, Some(ZyErr::MoreInputNeeded)))
                    });
                    return Ok(());
                }
                i if i == reset_op => {
                    let input = oper
                        .recv(&self.reset_add_input)
                        .map_err(|_| ZyErr::HaltRequested)?;
                    self.lexer.reset();
                    self.lexer.add_next_stream(&input);
                    self.send_me.clear();
                    self.need_input = false;
                    return Err(ZyErr::ResetRequested);
                }
                _ => {
                    let batch = mem::take(&mut self.send_me);
                    oper.send(&self.parsed_output, batch)
                        .map_err(|_| ZyErr::HaltRequested)?;
                    self.need_input = false;
                }
            }
        }
    }

    fn more_input(&mut self) -> ZyResult<()> {
        self.get_more_input(vec![], Some(ZyErr::MoreInputNeeded))
    }

    /// Next significant token, consuming comments and separators
    fn peek_token(&mut self) -> ZyResult<Token> {
        loop {
            let tok = self.lexer.peek_next_token()?;
            match tok.kind {
                TokenKind::Comment | TokenKind::Comma => {
                    self.lexer.get_next_token()?;
                }
                TokenKind::BeginBlockComment => {
                    self.lexer.get_next_token()?;
                    self.skip_block_comment()?;
                }
                _ => return Ok(tok),
            }
        }
    }

    fn skip_block_comment(&mut self) -> ZyResult<()> {
        loop {
            let tok = self.lexer.get_next_token()?;
            match tok.kind {
                TokenKind::EndBlockComment => return Ok(()),
                TokenKind::End => self.more_input()?,
                _ => {}
            }
        }
    }

    fn error(&self, tok: &Token, msg: String) -> ZyErr {
        ZyErr::Parse {
            line: tok.line,
            msg,
        }
    }

    /// One expression, or End when input ran out between expressions
    fn parse_expression(&mut self) -> ZyResult<Sexp> {
        let tok = self.peek_token()?;
        if tok.kind == TokenKind::End {
            return Ok(Sexp::End);
        }
        self.lexer.get_next_token()?;

        match tok.kind {
            TokenKind::LParen => self.parse_list(),
            TokenKind::LSquare => self.parse_array(),
            TokenKind::LCurly => self.parse_infix(),
            TokenKind::Quote => self.parse_quoted("quote"),
            TokenKind::SyntaxQuote => self.parse_quoted("syntax-quote"),
            TokenKind::Unquote => self.parse_quoted("unquote"),
            TokenKind::UnquoteSplice => self.parse_quoted("unquote-splicing"),
            TokenKind::RParen
            | TokenKind::RSquare
            | TokenKind::RCurly
            | TokenKind::Backslash
            | TokenKind::EndBlockComment => {
                Err(self.error(&tok, format!("unexpected '{}'", tok.text)))
            }
            _ => self.parse_atom(&tok),
        }
    }

    /// An expression that must be present, waiting for input if needed
    fn expect_expression(&mut self) -> ZyResult<Sexp> {
        loop {
            match self.parse_expression()? {
                Sexp::End => self.more_input()?,
                expr => return Ok(expr),
            }
        }
    }

    fn parse_quoted(&mut self, form: &str) -> ZyResult<Sexp> {
        let expr = self.expect_expression()?;
        let head = Sexp::Symbol(SexpSymbol::intern(&self.stab, form));
        Ok(Sexp::list(vec![head, expr]))
    }

    fn parse_list(&mut self) -> ZyResult<Sexp> {
        let mut items = vec![];
        loop {
            let tok = self.peek_token()?;
            match tok.kind {
                TokenKind::End => self.more_input()?,
                TokenKind::RParen => {
                    self.lexer.get_next_token()?;
                    return Ok(Sexp::list(items));
                }
                TokenKind::Backslash => {
                    self.lexer.get_next_token()?;
                    if items.is_empty() {
                        return Err(self.error(&tok, "dotted pair has no head".into()));
                    }
                    let tail = self.expect_expression()?;
                    self.close_dotted_pair()?;
                    return Ok(Sexp::list_with_tail(items, tail));
                }
                _ => items.push(self.expect_expression()?),
            }
        }
    }

    fn close_dotted_pair(&mut self) -> ZyResult<()> {
        loop {
            let tok = self.peek_token()?;
            match tok.kind {
                TokenKind::End => self.more_input()?,
                TokenKind::RParen => {
                    self.lexer.get_next_token()?;
                    return Ok(());
                }
                _ => {
                    return Err(self.error(
                        &tok,
                        format!("expected ')' after dotted pair, found '{}'", tok.text),
                    ))
                }
            }
        }
    }

    /// Elements up to the closing delimiter
    fn parse_sequence(&mut self, close: TokenKind) -> ZyResult<Vec<Sexp>> {
        let mut items = vec![];
        loop {
            let tok = self.peek_token()?;
            if tok.kind == TokenKind::End {
                self.more_input()?;
            } else if tok.kind == close {
                self.lexer.get_next_token()?;
                return Ok(items);
            } else {
                items.push(self.expect_expression()?);
            }
        }
    }

    fn parse_array(&mut self) -> ZyResult<Sexp> {
        Ok(Sexp::array(self.parse_sequence(TokenKind::RSquare)?))
    }

    /// `{a + b}` becomes `(infix [a + b])`
    fn parse_infix(&mut self) -> ZyResult<Sexp> {
        let items = self.parse_sequence(TokenKind::RCurly)?;
        let head = Sexp::Symbol(SexpSymbol::intern(&self.stab, "infix"));
        Ok(Sexp::list(vec![head, Sexp::array(items)]))
    }

    fn parse_atom(&self, tok: &Token) -> ZyResult<Sexp> {
        let text = tok.text.as_str();
        let bad_number = |_: ParseIntError| self.error(tok, format!("number out of range: {}", text));

        Ok(match tok.kind {
            TokenKind::Symbol if text == "nil" => Sexp::Null,
            TokenKind::Symbol | TokenKind::DotSymbol | TokenKind::Sigil => {
                Sexp::Symbol(SexpSymbol::intern(&self.stab, text))
            }
            TokenKind::SymbolColon => Sexp::Symbol(SexpSymbol::intern(&self.stab, text).with_colon()),
            TokenKind::Bool => Sexp::Bool(text == "true"),
            TokenKind::Decimal => Sexp::Int(text.parse().map_err(bad_number)?),
            TokenKind::Hex => Sexp::Int(i64::from_str_radix(&text[2..], 16).map_err(bad_number)?),
            TokenKind::Oct => Sexp::Int(i64::from_str_radix(&text[2..], 8).map_err(bad_number)?),
            TokenKind::Binary => Sexp::Int(i64::from_str_radix(&text[2..], 2).map_err(bad_number)?),
            TokenKind::Float => Sexp::Float(
                text.parse()
                    .map_err(|_| self.error(tok, format!("malformed float: {}", text)))?,
            ),
            TokenKind::Uint64 => {
                let digits = text.trim_end_matches("ULL");
                let parsed = if let Some(hex) = digits.strip_prefix("0x") {
                    u64::from_str_radix(hex, 16)
                } else if let Some(oct) = digits.strip_prefix("0o") {
                    u64::from_str_radix(oct, 8)
                } else {
                    digits.parse()
                };
                Sexp::UInt64(parsed.map_err(bad_number)?)
            }
            TokenKind::Char => Sexp::Char(
                char_from_literal(&text[1..])
                    .ok_or_else(|| self.error(tok, format!("bad character literal '{}'", text)))?,
            ),
            TokenKind::Str => Sexp::string(text),
            _ => return Err(self.error(tok, format!("unexpected '{}'", text))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zy::symtab::SymbolTable;
    use proptest::prelude::*;

    fn parse_all(text: &str) -> Vec<Sexp> {
        let parser = Parser::new(SymbolTable::shared(32)).unwrap();
        parser.new_input(&format!("{}\n", text)).unwrap();
        let (exprs, err) = parser.parse_tokens();
        assert!(err.is_none(), "unexpected error {:?}", err);
        exprs
    }

    fn printed(exprs: &[Sexp]) -> Vec<String> {
        exprs.iter().map(|e| e.to_string()).collect()
    }

    const SAMPLE: &str = "(defn hello [] \"greetings!\") ; hi\n\
                          (def x [1, 2.5 #a]) %sym {a + b} ^(f ~x ~@y) (1 \\ 2) .a.b 0x10 7ULL";

    #[test]
    fn split_input() {
        let parser = Parser::new(SymbolTable::shared(16)).unwrap();

        parser.new_input("(defn hel").unwrap();
        let (exprs, err) = parser.parse_tokens();
        assert!(exprs.is_empty());
        assert!(matches!(err, Some(ZyErr::MoreInputNeeded)));

        parser.new_input("lo [] \"greetings!\")").unwrap();
        let (exprs, err) = parser.parse_tokens();
        assert!(err.is_none());
        assert_eq!(printed(&exprs), vec!["(defn hello [] \"greetings!\")"]);
    }

    #[test]
    fn desugaring() {
        let exprs = parse_all(SAMPLE);
        assert_eq!(
            printed(&exprs),
            vec![
                "(defn hello [] \"greetings!\")",
                "(def x [1 2.5 #a])",
                "(quote sym)",
                "(infix [a + b])",
                "(syntax-quote (f (unquote x) (unquote-splicing y)))",
                "(1 \\ 2)",
                ".a.b",
                "16",
                "7ULL",
            ]
        );
        assert!(exprs[6].as_symbol().unwrap().is_dot);
    }

    #[test]
    fn print_parse_round_trip() {
        let first = parse_all("(a b: -3 [8.06e-05 \"q\\\"s\"] #space (nested (list)) nil true)");
        let again = parse_all(&printed(&first).join(" "));
        assert_eq!(first, again);
    }

    #[test]
    fn errors_keep_earlier_exprs() {
        let parser = Parser::new(SymbolTable::shared(16)).unwrap();
        parser.new_input("(a) (b) )\n").unwrap();
        let (exprs, err) = parser.parse_tokens();
        assert_eq!(printed(&exprs), vec!["(a)", "(b)"]);
        assert!(matches!(err, Some(ZyErr::Parse { .. })));

        parser.reset_add_new_input("(1 \\ 2 3)\n").unwrap();
        let (_, err) = parser.parse_tokens();
        assert!(matches!(err, Some(ZyErr::Parse { .. })));
    }

    #[test]
    fn reset_discards_partial() {
        let parser = Parser::new(SymbolTable::shared(16)).unwrap();
        parser.new_input("(unfinished [").unwrap();
        let (_, err) = parser.parse_tokens();
        assert!(matches!(err, Some(ZyErr::MoreInputNeeded)));

        parser.reset_add_new_input("(fresh)\n").unwrap();
        let (exprs, err) = parser.parse_tokens();
        assert!(err.is_none());
        assert_eq!(printed(&exprs), vec!["(fresh)"]);
    }

    #[test]
    fn block_comment_across_chunks() {
        let parser = Parser::new(SymbolTable::shared(16)).unwrap();
        parser.new_input("(a /* still").unwrap();
        let (_, err) = parser.parse_tokens();
        assert!(matches!(err, Some(ZyErr::MoreInputNeeded)));
        parser.new_input(" going */ b)").unwrap();
        let (exprs, _) = parser.parse_tokens();
        assert_eq!(printed(&exprs), vec!["(a b)"]);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut parser = Parser::new(SymbolTable::shared(16)).unwrap();
        parser.stop();
        parser.stop();
        assert!(matches!(parser.new_input("x"), Err(ZyErr::ShuttingDown)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn split_anywhere(cut in 0usize..SAMPLE.len()) {
            prop_assume!(SAMPLE.is_char_boundary(cut));
            let whole = parse_all(SAMPLE);

            let parser = Parser::new(SymbolTable::shared(32)).unwrap();
            let mut got = vec![];

            parser.new_input(&SAMPLE[..cut]).unwrap();
            let (exprs, err) = parser.parse_tokens();
            prop_assert!(err.is_none() || matches!(err, Some(ZyErr::MoreInputNeeded)));
            got.extend(exprs);

            parser.new_input(&format!("{}\n", &SAMPLE[cut..])).unwrap();
            let (exprs, err) = parser.parse_tokens();
            prop_assert!(err.is_none());
            got.extend(exprs);

            prop_assert_eq!(printed(&got), printed(&whole));
        }

        #[test]
        fn any_char_reads_back(c in any::<char>()) {
            let text = format!("[{} {}]", Sexp::Char(c), Sexp::Char(c));
            let exprs = parse_all(&text);
            prop_assert_eq!(exprs.len(), 1);
            prop_assert_eq!(printed(&exprs)[0].clone(), text);
        }
    }
}
