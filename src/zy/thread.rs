// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/thread.rs

// Running Zy code on other threads.

// <>

use std::thread::{self, JoinHandle};

use super::env::Environment;
use super::sexp::Sexp;
use super::{ZyErr, ZyResult};

/// Handle on an evaluation running in its own thread
pub struct ZyThread {
    handle: JoinHandle<ZyResult<Sexp>>,
}

/// Evaluates `source` on a new thread in a duplicate of `env`
///
/// The duplicate shares globals, macros, and symbols with `env`, so
/// definitions made on either side are visible to the other.
pub fn spawn_eval(env: &Environment, source: &str) -> ZyResult<ZyThread> {
    let mut child = env.duplicate();
    let source = source.to_string();

    let handle = thread::Builder::new()
        .name("zy-eval".to_string())
        .spawn(move || {
            let out = child.eval_string(&source);
            child.stop();
            out
        })?;

    Ok(ZyThread { handle })
}

impl ZyThread {
    /// Waits for the evaluation to finish
    pub fn join(self) -> ZyResult<Sexp> {
        match self.handle.join() {
            Ok(out) => out,
            Err(_) => Err(ZyErr::Runtime("evaluation thread panicked".to_string())),
        }
    }
}
