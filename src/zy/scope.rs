// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/scope.rs

// Lexical scopes and closures. Scopes are shared by reference so a
// closure keeps the frames it was made in alive after the defining
// call returns.

// <>

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::env::Environment;
use super::lexer::split_dot_path;
use super::sexp::{Sexp, SexpSymbol, ZyFunction};
use super::stack::Stack;
use super::{lock, ZyErr, ZyResult};

pub type ScopeRef = Arc<Mutex<Scope>>;

/// Mapping from symbol id to value
pub struct Scope {
    map: HashMap<u32, Sexp>,
    pub name: String,
    /// set on the scope opened by a call; lexical search stops here
    pub is_function: bool,
    pub my_function: Option<Arc<ZyFunction>>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Scope {
            map: HashMap::new(),
            name: name.into(),
            is_function: false,
            my_function: None,
        }
    }

    /// Call-boundary scope for an invocation of `func`
    pub fn new_function(func: &Arc<ZyFunction>) -> Self {
        Scope {
            map: HashMap::new(),
            name: func.name.clone(),
            is_function: true,
            my_function: Some(Arc::clone(func)),
        }
    }

    pub fn into_ref(self) -> ScopeRef {
        Arc::new(Mutex::new(self))
    }

    pub fn lookup(&self, id: u32) -> Option<Sexp> {
        self.map.get(&id).cloned()
    }

    /// Creates or overwrites a binding in this scope
    pub fn bind(&mut self, sym: &SexpSymbol, val: Sexp) -> ZyResult<()> {
        if let Some(old) = self.map.get(&sym.id) {
            check_rebind(sym, old, &val)?;
        }
        self.map.insert(sym.id, val);
        Ok(())
    }

    /// Host registration; replaces any prior binding unchecked
    pub fn define(&mut self, sym: &SexpSymbol, val: Sexp) {
        self.map.insert(sym.id, val);
    }

    /// Overwrites an existing binding in this scope
    pub fn update(&mut self, sym: &SexpSymbol, val: Sexp) -> ZyResult<()> {
        match self.map.get(&sym.id) {
            Some(old) => check_rebind(sym, old, &val)?,
            None => return Err(ZyErr::Undefined(sym.name.to_string())),
        }
        self.map.insert(sym.id, val);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Bindings ordered by symbol id
    pub fn entries(&self) -> Vec<(u32, Sexp)> {
        let mut out: Vec<_> = self.map.iter().map(|(k, v)| (*k, v.clone())).collect();
        out.sort_by_key(|(k, _)| *k);
        out
    }
}

/// A rebinding is rejected only when both values carry descriptors
/// and the new one is not assignable to the old
fn check_rebind(sym: &SexpSymbol, old: &Sexp, new: &Sexp) -> ZyResult<()> {
    if let (Some(old_ty), Some(new_ty)) = (old.descriptor(), new.descriptor()) {
        if !new_ty.assignable_to(&old_ty) {
            return Err(ZyErr::Type(format!(
                "cannot assign {} to `{}` of type {}",
                new_ty, sym.name, old_ty
            )));
        }
    }
    Ok(())
}

/// Scopes captured by a closure, innermost first
#[derive(Clone, Default)]
pub struct Closing {
    scopes: Vec<ScopeRef>,
}

impl Closing {
    /// Captures the scopes from the top of `stack` down to and
    /// including the nearest call boundary, never the global scope
    pub fn capture(stack: &Stack<ScopeRef>, global: &ScopeRef) -> Self {
        let mut scopes = Vec::new();
        for scope in stack.iter_from_top() {
            if Arc::ptr_eq(scope, global) {
                break;
            }
            scopes.push(Arc::clone(scope));
            if lock(scope).is_function {
                break;
            }
        }
        Closing { scopes }
    }

    pub fn lookup(&self, id: u32) -> Option<(Sexp, ScopeRef)> {
        self.scopes.iter().find_map(|scope| {
            lock(scope)
                .lookup(id)
                .map(|val| (val, Arc::clone(scope)))
        })
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// Searches innermost first, stopping after the nearest call boundary
fn lookup_until_function(stack: &Stack<ScopeRef>, id: u32) -> Option<(Sexp, ScopeRef)> {
    for scope in stack.iter_from_top() {
        let guard = lock(scope);
        if let Some(val) = guard.lookup(id) {
            return Some((val, Arc::clone(scope)));
        }
        if guard.is_function {
            break;
        }
    }
    None
}

impl Environment {
    /// Finds the value bound to `id` and the scope holding it
    ///
    /// Order: the current call's scopes up to its boundary; the
    /// closure's captured scopes and then those of each enclosing
    /// function; finally the global scope. Scopes a caller opened
    /// below the call boundary are never searched.
    pub(crate) fn find_binding(&self, id: u32) -> Option<(Sexp, ScopeRef)> {
        if let Some(hit) = lookup_until_function(&self.scopestack, id) {
            return Some(hit);
        }

        let mut func = Some(Arc::clone(&self.curfunc));
        while let Some(f) = func {
            if let Some(hit) = f.closing().and_then(|c| c.lookup(id)) {
                return Some(hit);
            }
            func = f.parent().cloned();
        }

        let val = lock(&self.global).lookup(id)?;
        Some((val, Arc::clone(&self.global)))
    }

    /// Resolves a symbol to its value
    pub fn lexical_lookup(&self, sym: &SexpSymbol) -> ZyResult<Sexp> {
        if sym.is_dot {
            return self.dot_path_lookup(sym);
        }
        self.find_binding(sym.id)
            .map(|(val, _)| val)
            .ok_or_else(|| ZyErr::Undefined(sym.name.to_string()))
    }

    /// `def`: binds in the innermost scope without searching outward
    pub(crate) fn bind_symbol(&mut self, sym: &SexpSymbol, val: Sexp) -> ZyResult<()> {
        let scope = self
            .scopestack
            .top()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.global));
        let result = lock(&scope).bind(sym, val);
        result
    }

    /// `set`: mutates whichever scope already defines the symbol
    pub(crate) fn update_symbol(&mut self, sym: &SexpSymbol, val: Sexp) -> ZyResult<()> {
        if sym.is_dot {
            return self.dot_path_set(sym, val);
        }
        match self.find_binding(sym.id) {
            Some((_, scope)) => {
                let result = lock(&scope).update(sym, val);
                result
            }
            None => Err(ZyErr::Undefined(sym.name.to_string())),
        }
    }

    fn dot_path_lookup(&self, sym: &SexpSymbol) -> ZyResult<Sexp> {
        let parts = split_dot_path(&sym.name);
        let (first, rest) = parts
            .split_first()
            .ok_or_else(|| ZyErr::Undefined(sym.name.to_string()))?;

        let root = self.make_symbol(&first[1..]);
        let mut cur = self.lexical_lookup(&root)?;
        for field in rest {
            cur = self.hash_field(&cur, &field[1..], &sym.name)?;
        }
        Ok(cur)
    }

    fn dot_path_set(&mut self, sym: &SexpSymbol, val: Sexp) -> ZyResult<()> {
        let parts = split_dot_path(&sym.name);
        let (last, init) = parts
            .split_last()
            .ok_or_else(|| ZyErr::Undefined(sym.name.to_string()))?;

        if init.is_empty() {
            let root = self.make_symbol(&last[1..]);
            return self.update_symbol(&root, val);
        }

        let root = self.make_symbol(&init[0][1..]);
        let mut cur = self.lexical_lookup(&root)?;
        for field in &init[1..] {
            cur = self.hash_field(&cur, &field[1..], &sym.name)?;
        }

        match cur {
            Sexp::Hash(h) => {
                let key = Sexp::Symbol(self.make_symbol(&last[1..]));
                let result = lock(&h).set(key, val);
                result
            }
            other => Err(ZyErr::Type(format!(
                "{}: cannot set field `{}` of {}",
                sym.name,
                &last[1..],
                other.type_of()
            ))),
        }
    }

    fn hash_field(&self, val: &Sexp, field: &str, path: &str) -> ZyResult<Sexp> {
        match val {
            Sexp::Hash(h) => {
                let key = Sexp::Symbol(self.make_symbol(field));
                let found = lock(h).get(&key)?;
                found.ok_or_else(|| ZyErr::Undefined(format!("{} (no field `{}`)", path, field)))
            }
            other => Err(ZyErr::Type(format!(
                "{}: cannot take field `{}` of {}",
                path,
                field,
                other.type_of()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zy::symtab::SymbolTable;

    #[test]
    fn bind_and_rebind() {
        let stab = SymbolTable::shared(8);
        let x = SexpSymbol::intern(&stab, "x");
        let mut scope = Scope::new("test");

        scope.bind(&x, Sexp::Null).unwrap();
        // nil carries no descriptor, so anything may replace it
        scope.bind(&x, Sexp::Int(1)).unwrap();
        scope.update(&x, Sexp::Int(2)).unwrap();
        assert!(matches!(scope.update(&x, Sexp::string("no")), Err(ZyErr::Type(_))));
        scope.update(&x, Sexp::Float(2.5)).unwrap_err();
        scope.update(&x, Sexp::list(vec![])).unwrap();

        let y = SexpSymbol::intern(&stab, "y");
        assert!(matches!(scope.update(&y, Sexp::Int(1)), Err(ZyErr::Undefined(_))));
        assert_eq!(scope.lookup(x.id), Some(Sexp::Null));
    }

    #[test]
    fn boundary_search() {
        let stab = SymbolTable::shared(8);
        let a = SexpSymbol::intern(&stab, "a");
        let b = SexpSymbol::intern(&stab, "b");

        let global = Scope::new("global").into_ref();
        lock(&global).bind(&a, Sexp::Int(1)).unwrap();

        let mut call = Scope::new("call");
        call.is_function = true;
        let call = call.into_ref();
        lock(&call).bind(&b, Sexp::Int(2)).unwrap();

        let inner = Scope::new("let").into_ref();

        let mut stack = Stack::new(4);
        stack.push(Arc::clone(&global));
        stack.push(Arc::clone(&call));
        stack.push(Arc::clone(&inner));

        assert_eq!(lookup_until_function(&stack, b.id).map(|h| h.0), Some(Sexp::Int(2)));
        assert!(lookup_until_function(&stack, a.id).is_none());

        let closing = Closing::capture(&stack, &global);
        assert_eq!(closing.len(), 2);
        assert!(closing.lookup(b.id).is_some());
        assert!(closing.lookup(a.id).is_none());
    }

    #[test]
    fn callers_lets_stay_private() {
        let mut env = Environment::new();
        let read = env.eval_string("(def x 1) (defn rd [] x) (let [x 5] (rd))");
        assert_eq!(read.unwrap(), Sexp::Int(1));

        let shadowed = env.eval_string("(defn bump [] (set x 2)) (let [x 5] (bump) x)");
        assert_eq!(shadowed.unwrap(), Sexp::Int(5));
        assert_eq!(env.eval_string("x").unwrap(), Sexp::Int(2));

        let hidden = env.eval_string("(defn peek-y [] y) (let [y 3] (peek-y))");
        assert!(matches!(hidden, Err(ZyErr::Undefined(_))));
        env.clear();

        let captured = env.eval_string("(def getz (let [z 9] (fn [] z))) (getz)");
        assert_eq!(captured.unwrap(), Sexp::Int(9));
        env.stop();
    }
}
