// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/stack.rs

// Growable stack used three ways by the evaluator: values, lexical
// scopes, and call return addresses.

// <>

use super::{ZyErr, ZyResult};

#[derive(Clone, Debug)]
pub struct Stack<T> {
    elements: Vec<T>,
}

impl<T> Stack<T> {
    pub fn new(capacity: usize) -> Self {
        Stack {
            elements: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, elt: T) {
        self.elements.push(elt);
    }

    pub fn pop(&mut self) -> ZyResult<T> {
        self.elements.pop().ok_or(ZyErr::StackUnderflow)
    }

    /// Pops the top `n` elements, returned bottom first
    pub fn pop_n(&mut self, n: usize) -> ZyResult<Vec<T>> {
        if n > self.elements.len() {
            return Err(ZyErr::StackUnderflow);
        }
        let at = self.elements.len() - n;
        Ok(self.elements.split_off(at))
    }

    pub fn top(&self) -> Option<&T> {
        self.elements.last()
    }

    /// Element `depth` places below the top; zero is the top itself
    pub fn get(&self, depth: usize) -> Option<&T> {
        let len = self.elements.len();
        if depth >= len {
            None
        } else {
            self.elements.get(len - 1 - depth)
        }
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.elements.truncate(len);
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Walks from the top of the stack downward
    pub fn iter_from_top(&self) -> impl Iterator<Item = &T> {
        self.elements.iter().rev()
    }
}
