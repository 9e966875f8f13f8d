// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/symtab.rs

// A table to associate symbol names with efficient internal IDs.

// <>

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Symbol table shared by an environment, its parser process, and
/// any duplicated environments
pub type Stab = Arc<Mutex<SymbolTable>>;

pub struct SymbolTable {
    // indexed by id
    id_to_nm: Vec<Arc<str>>,
    nm_to_id: HashMap<Arc<str>, u32>,
}

impl SymbolTable {
    pub fn new(approx_cap: usize) -> Self {
        Self {
            id_to_nm: Vec::with_capacity(approx_cap),
            nm_to_id: HashMap::with_capacity(approx_cap),
        }
    }

    /// Creates a new shared table
    pub fn shared(approx_cap: usize) -> Stab {
        Arc::new(Mutex::new(Self::new(approx_cap)))
    }

    /// Returns the id for a name, interning the name if it is new
    pub fn get_id(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.nm_to_id.get(name) {
            return id;
        }

        let id = self.id_to_nm.len() as u32;
        let name: Arc<str> = Arc::from(name);
        self.id_to_nm.push(Arc::clone(&name));
        self.nm_to_id.insert(name, id);
        id
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<u32> {
        self.nm_to_id.get(name).copied()
    }

    pub fn lookup_by_id(&self, id: u32) -> Option<Arc<str>> {
        self.id_to_nm.get(id as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.id_to_nm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_nm.is_empty()
    }
}
