// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/mod.rs

// The Zy language: error taxonomy, module layout, and the thin
// front ends (file runner and interactive loop) built on the
// Environment entry points.

// <>

use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use thiserror::Error;

pub mod codegen;
pub mod env;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod sexp;
pub mod stack;
pub mod stdenv;
pub mod symtab;
pub mod thread;

pub use env::{EnvConfig, Environment, PostHook, PreHook};
pub use eval::Instr;
pub use sexp::{Arity, Sexp, SexpSymbol, SexpType, ZyFunction};

/// Every failure the runtime can report, from lexing to execution
///
/// The parser control signals travel through the same channel as
/// genuine errors; use `is_control_signal` to tell them apart.
#[derive(Error, Debug)]
pub enum ZyErr {
    #[error("line {line}: {msg}")]
    Lex { line: usize, msg: String },

    #[error("line {line}: parse error: {msg}")]
    Parse { line: usize, msg: String },

    #[error("parser halt requested")]
    HaltRequested,

    #[error("parser reset requested")]
    ResetRequested,

    #[error("more input needed")]
    MoreInputNeeded,

    #[error("parser is shutting down")]
    ShuttingDown,

    #[error("compile error: {0}")]
    Compile(String),

    #[error("symbol `{0}` not found")]
    Undefined(String),

    #[error("`{name}` expects {expected} arguments, got {got}")]
    ArgCount {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("{0}")]
    Runtime(String),

    #[error("stack underflow")]
    StackUnderflow,

    #[error("panic in native `{name}`: {msg}")]
    Panic {
        name: String,
        msg: String,
        trace: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ZyErr {
    /// True for the parser's flow-control signals, which are not failures
    pub fn is_control_signal(&self) -> bool {
        matches!(
            self,
            ZyErr::HaltRequested
                | ZyErr::ResetRequested
                | ZyErr::MoreInputNeeded
                | ZyErr::ShuttingDown
        )
    }
}

pub type ZyResult<T> = Result<T, ZyErr>;

/// Locks a mutex, recovering the guard if a panicking holder poisoned it
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Evaluates a Zy source file in a fresh environment, returning the
/// value of its last expression
pub fn run_file(filename: &str) -> ZyResult<Sexp> {
    let text = fs::read_to_string(filename)?;
    let mut env = Environment::new();
    log::debug!("running file {}", filename);
    let out = env.eval_string(&text);
    env.stop();
    out
}

/// Interactive read-eval-print loop
///
/// Lines go to the resumable parser one at a time, so an expression
/// may span any number of lines.
pub fn repl() -> ZyResult<()> {
    let mut rl = DefaultEditor::new().map_err(readline_err)?;
    let mut env = Environment::new();
    let mut pending = false;

    println!("Zy interactive environment; .dump shows state, .quit exits");

    loop {
        let prompt = if pending { "...> " } else { "zy> " };
        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                pending = false;
                env.reset_parser()?;
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(readline_err(e)),
        };

        if !pending {
            match line.trim() {
                "" => continue,
                ".quit" | ".exit" => break,
                ".dump" => {
                    println!("{}", env.dump_environment());
                    continue;
                }
                _ => {}
            }
        }

        let _ = rl.add_history_entry(line.as_str());

        let exprs = match env.parse_input(&line) {
            Ok(exprs) => {
                pending = false;
                exprs
            }
            Err(ZyErr::MoreInputNeeded) => {
                pending = true;
                continue;
            }
            Err(e) => {
                println!("error: {}", e);
                pending = false;
                env.reset_parser()?;
                continue;
            }
        };

        if exprs.is_empty() {
            continue;
        }

        match env.eval_expressions(&exprs) {
            Ok(Sexp::Null) => {}
            Ok(out) => println!("{}", out),
            Err(e) => {
                println!("error: {}", e);
                if let ZyErr::Panic { trace, .. } = &e {
                    println!("{}", trace);
                } else {
                    println!("{}", env.stack_trace());
                }
                env.clear();
            }
        }
    }

    env.stop();
    Ok(())
}

fn readline_err(e: ReadlineError) -> ZyErr {
    ZyErr::Runtime(format!("line editor: {}", e))
}
