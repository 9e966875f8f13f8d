// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/lib.rs

// Crate root.

// <>

//! An embeddable Lisp: a resumable lexer and parser, a bytecode
//! compiler, and a stack machine to run the result.
//!
//! Hosts create an [`zy::Environment`], register native functions on
//! it, and feed it source text.

pub mod zy;
