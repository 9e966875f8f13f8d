// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/sexp.rs

// The Zy value type. Every parsed expression, every runtime value,
// and every function object is an Sexp; printing an Sexp yields
// text that parses back to an equal Sexp for all literal forms.

// <>

use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, TryLockError};

use super::env::Environment;
use super::eval::Instr;
use super::lexer::char_name;
use super::scope::Closing;
use super::symtab::Stab;
use super::{lock, ZyErr, ZyResult};

/// Universal dynamically typed value
#[derive(Clone)]
pub enum Sexp {
    Null,
    End,
    Pair(Arc<SexpPair>),
    Array(Arc<Mutex<Vec<Sexp>>>),
    Int(i64),
    UInt64(u64),
    Float(f64),
    Char(char),
    Bool(bool),
    Str(Arc<str>),
    Symbol(SexpSymbol),
    Function(Arc<ZyFunction>),
    Hash(Arc<Mutex<SexpHash>>),
    Pointer(Arc<Mutex<Sexp>>),
    Reflect(Arc<dyn Any + Send + Sync>),
}

pub struct SexpPair {
    pub head: Sexp,
    pub tail: Sexp,
}

/// Interned symbol; identity is the id, never the name
#[derive(Clone, Debug)]
pub struct SexpSymbol {
    pub name: Arc<str>,
    pub id: u32,
    /// `.a.b.c` path navigation
    pub is_dot: bool,
    /// `$x`, `?x`, `#x`; these evaluate to themselves
    pub is_sigil: bool,
    /// written `name:`; keyword arguments and hash keys
    pub colon: bool,
}

impl SexpSymbol {
    /// Interns `name`, deriving the dot and sigil flags from its first character
    pub fn intern(stab: &Stab, name: &str) -> Self {
        let id = lock(stab).get_id(name);
        let first = name.chars().next();
        let long = name.chars().count() > 1;
        SexpSymbol {
            name: Arc::from(name),
            id,
            is_dot: long && first == Some('.'),
            is_sigil: long && matches!(first, Some('$') | Some('?') | Some('#')),
            colon: false,
        }
    }

    pub fn with_colon(mut self) -> Self {
        self.colon = true;
        self
    }

    /// The same symbol without the keyword colon
    pub fn plain(&self) -> Self {
        SexpSymbol {
            colon: false,
            ..self.clone()
        }
    }
}

impl PartialEq for SexpSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.colon == other.colon
    }
}

/// Type descriptor, used for typed parameters and rebinding checks
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SexpType {
    Null,
    End,
    List,
    Array,
    Int,
    UInt64,
    Float,
    Char,
    Bool,
    Str,
    Symbol,
    Function,
    /// record type name; empty for an anonymous hash
    Hash(String),
    Pointer(Box<SexpType>),
    Reflect,
}

impl SexpType {
    /// Maps a type name as written in a parameter list
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "int" | "int64" => SexpType::Int,
            "uint64" => SexpType::UInt64,
            "float" | "float64" => SexpType::Float,
            "char" => SexpType::Char,
            "bool" => SexpType::Bool,
            "string" => SexpType::Str,
            "symbol" => SexpType::Symbol,
            "list" => SexpType::List,
            "array" => SexpType::Array,
            "hash" => SexpType::Hash(String::new()),
            "fn" => SexpType::Function,
            _ => return None,
        })
    }

    /// Whether a value of this type may stand where `target` is expected
    pub fn assignable_to(&self, target: &SexpType) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (SexpType::Int, SexpType::Float) => true,
            (
                SexpType::Null,
                SexpType::List
                | SexpType::Array
                | SexpType::Hash(_)
                | SexpType::Function
                | SexpType::Pointer(_),
            ) => true,
            (SexpType::Hash(_), SexpType::Hash(t)) => t.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for SexpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SexpType::Null => write!(f, "nil"),
            SexpType::End => write!(f, "end"),
            SexpType::List => write!(f, "list"),
            SexpType::Array => write!(f, "array"),
            SexpType::Int => write!(f, "int64"),
            SexpType::UInt64 => write!(f, "uint64"),
            SexpType::Float => write!(f, "float64"),
            SexpType::Char => write!(f, "char"),
            SexpType::Bool => write!(f, "bool"),
            SexpType::Str => write!(f, "string"),
            SexpType::Symbol => write!(f, "symbol"),
            SexpType::Function => write!(f, "fn"),
            SexpType::Hash(name) if name.is_empty() => write!(f, "hash"),
            SexpType::Hash(name) => write!(f, "{}", name),
            SexpType::Pointer(inner) => write!(f, "*{}", inner),
            SexpType::Reflect => write!(f, "reflect"),
        }
    }
}

/// Host callback signature for native functions and builders
pub type NativeFn = Arc<dyn Fn(&mut Environment, &str, &[Sexp]) -> ZyResult<Sexp> + Send + Sync>;

/// Plain function pointer form, used by the standard native tables
pub type NativeFnPtr = fn(&mut Environment, &str, &[Sexp]) -> ZyResult<Sexp>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn check(&self, name: &str, got: usize) -> ZyResult<()> {
        let ok = match *self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Any => true,
        };
        if ok {
            return Ok(());
        }
        let expected = match *self {
            Arity::Exact(n) => n.to_string(),
            Arity::AtLeast(n) => format!("at least {}", n),
            Arity::Any => String::from("any number of"),
        };
        Err(ZyErr::ArgCount {
            name: name.to_string(),
            expected,
            got,
        })
    }
}

#[derive(Clone)]
pub struct ZyFunction {
    pub name: String,
    pub body: FnBody,
}

#[derive(Clone)]
pub enum FnBody {
    Compiled(CompiledFn),
    Native(NativeBody),
}

#[derive(Clone)]
pub struct NativeBody {
    pub callback: NativeFn,
    pub arity: Arity,
    /// builders receive their arguments unevaluated
    pub builder: bool,
}

#[derive(Clone)]
pub struct CompiledFn {
    pub params: Vec<Param>,
    pub varargs: Option<SexpSymbol>,
    pub code: Arc<Vec<Instr>>,
    /// scopes captured when the closure was made
    pub closing: Option<Closing>,
    /// function whose frame created this closure
    pub parent: Option<Arc<ZyFunction>>,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub sym: SexpSymbol,
    pub ty: Option<SexpType>,
}

impl ZyFunction {
    pub fn compiled(
        name: impl Into<String>,
        params: Vec<Param>,
        varargs: Option<SexpSymbol>,
        code: Vec<Instr>,
    ) -> Self {
        ZyFunction {
            name: name.into(),
            body: FnBody::Compiled(CompiledFn {
                params,
                varargs,
                code: Arc::new(code),
                closing: None,
                parent: None,
            }),
        }
    }

    pub fn native(name: impl Into<String>, arity: Arity, builder: bool, callback: NativeFn) -> Self {
        ZyFunction {
            name: name.into(),
            body: FnBody::Native(NativeBody {
                callback,
                arity,
                builder,
            }),
        }
    }

    /// Instruction stream; empty for natives
    pub fn code(&self) -> &[Instr] {
        match &self.body {
            FnBody::Compiled(c) => &c.code,
            FnBody::Native(_) => &[],
        }
    }

    pub fn arity(&self) -> Arity {
        match &self.body {
            FnBody::Compiled(c) if c.varargs.is_some() => Arity::AtLeast(c.params.len()),
            FnBody::Compiled(c) => Arity::Exact(c.params.len()),
            FnBody::Native(n) => n.arity,
        }
    }

    pub fn is_builder(&self) -> bool {
        matches!(&self.body, FnBody::Native(n) if n.builder)
    }

    pub fn closing(&self) -> Option<&Closing> {
        match &self.body {
            FnBody::Compiled(c) => c.closing.as_ref(),
            FnBody::Native(_) => None,
        }
    }

    pub fn parent(&self) -> Option<&Arc<ZyFunction>> {
        match &self.body {
            FnBody::Compiled(c) => c.parent.as_ref(),
            FnBody::Native(_) => None,
        }
    }

    /// A closure instance of this prototype
    pub fn close_over(&self, closing: Closing, parent: Option<Arc<ZyFunction>>) -> ZyFunction {
        let mut out = self.clone();
        if let FnBody::Compiled(c) = &mut out.body {
            c.closing = Some(closing);
            c.parent = parent;
        }
        out
    }
}

impl fmt::Debug for ZyFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name)
    }
}

/// Record value: insertion-ordered keys over hashed buckets
#[derive(Clone, Default)]
pub struct SexpHash {
    pub type_name: String,
    keys: Vec<Sexp>,
    buckets: HashMap<u64, Vec<(Sexp, Sexp)>>,
}

impl SexpHash {
    pub fn new(type_name: impl Into<String>) -> Self {
        SexpHash {
            type_name: type_name.into(),
            keys: Vec::new(),
            buckets: HashMap::new(),
        }
    }

    pub fn get(&self, key: &Sexp) -> ZyResult<Option<Sexp>> {
        let h = hash_key(key)?;
        Ok(self.buckets.get(&h).and_then(|bucket| {
            bucket
                .iter()
                .find(|(k, _)| key_eq(k, key))
                .map(|(_, v)| v.clone())
        }))
    }

    pub fn set(&mut self, key: Sexp, val: Sexp) -> ZyResult<()> {
        let key = match key {
            Sexp::Symbol(sym) => Sexp::Symbol(sym.plain()),
            other => other,
        };
        let h = hash_key(&key)?;
        let bucket = self.buckets.entry(h).or_default();
        match bucket.iter_mut().find(|(k, _)| key_eq(k, &key)) {
            Some(entry) => entry.1 = val,
            None => {
                bucket.push((key.clone(), val));
                self.keys.push(key);
            }
        }
        Ok(())
    }

    pub fn delete(&mut self, key: &Sexp) -> ZyResult<bool> {
        let h = hash_key(key)?;
        let found = match self.buckets.get_mut(&h) {
            Some(bucket) => {
                let before = bucket.len();
                bucket.retain(|(k, _)| !key_eq(k, key));
                before != bucket.len()
            }
            None => false,
        };
        if found {
            self.keys.retain(|k| !key_eq(k, key));
        }
        Ok(found)
    }

    pub fn keys(&self) -> &[Sexp] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key/value pairs in insertion order
    pub fn pairs(&self) -> Vec<(Sexp, Sexp)> {
        self.keys
            .iter()
            .filter_map(|k| match self.get(k) {
                Ok(Some(v)) => Some((k.clone(), v)),
                _ => None,
            })
            .collect()
    }
}

fn hash_key(key: &Sexp) -> ZyResult<u64> {
    let mut h = DefaultHasher::new();
    match key {
        Sexp::Int(i) => (0u8, i).hash(&mut h),
        Sexp::UInt64(u) => (1u8, u).hash(&mut h),
        Sexp::Char(c) => (2u8, c).hash(&mut h),
        Sexp::Bool(b) => (3u8, b).hash(&mut h),
        Sexp::Str(s) => (4u8, &**s).hash(&mut h),
        Sexp::Symbol(sym) => (5u8, sym.id).hash(&mut h),
        other => {
            return Err(ZyErr::Type(format!(
                "cannot use {} as a hash key",
                other.type_of()
            )))
        }
    }
    Ok(h.finish())
}

fn key_eq(a: &Sexp, b: &Sexp) -> bool {
    match (a, b) {
        (Sexp::Symbol(x), Sexp::Symbol(y)) => x.id == y.id,
        _ => a == b,
    }
}

impl Sexp {
    pub fn cons(head: Sexp, tail: Sexp) -> Sexp {
        Sexp::Pair(Arc::new(SexpPair { head, tail }))
    }

    pub fn list(items: Vec<Sexp>) -> Sexp {
        Sexp::list_with_tail(items, Sexp::Null)
    }

    pub fn list_with_tail(items: Vec<Sexp>, tail: Sexp) -> Sexp {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, head| Sexp::cons(head, acc))
    }

    pub fn array(items: Vec<Sexp>) -> Sexp {
        Sexp::Array(Arc::new(Mutex::new(items)))
    }

    pub fn string(s: impl Into<String>) -> Sexp {
        Sexp::Str(Arc::from(s.into()))
    }

    pub fn hash(h: SexpHash) -> Sexp {
        Sexp::Hash(Arc::new(Mutex::new(h)))
    }

    /// False, nil, zero integers, and the zero char are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            Sexp::Bool(b) => *b,
            Sexp::Null => false,
            Sexp::Int(i) => *i != 0,
            Sexp::UInt64(u) => *u != 0,
            Sexp::Char(c) => *c != '\0',
            _ => true,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Sexp::Null | Sexp::Pair(_))
    }

    pub fn as_symbol(&self) -> Option<&SexpSymbol> {
        match self {
            Sexp::Symbol(sym) => Some(sym),
            _ => None,
        }
    }

    /// Elements of a proper list; nil is the empty list
    pub fn list_to_vec(&self) -> ZyResult<Vec<Sexp>> {
        let mut out = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                Sexp::Null => return Ok(out),
                Sexp::Pair(p) => {
                    out.push(p.head.clone());
                    cur = &p.tail;
                }
                other => {
                    return Err(ZyErr::Type(format!(
                        "improper list ending in {}",
                        other.type_of()
                    )))
                }
            }
        }
    }

    /// Elements of a list or an array
    pub fn seq_to_vec(&self) -> ZyResult<Vec<Sexp>> {
        match self {
            Sexp::Array(arr) => Ok(lock(arr).clone()),
            Sexp::Null | Sexp::Pair(_) => self.list_to_vec(),
            other => Err(ZyErr::Type(format!(
                "expected list or array, got {}",
                other.type_of()
            ))),
        }
    }

    pub fn type_of(&self) -> SexpType {
        match self {
            Sexp::Null => SexpType::Null,
            Sexp::End => SexpType::End,
            Sexp::Pair(_) => SexpType::List,
            Sexp::Array(_) => SexpType::Array,
            Sexp::Int(_) => SexpType::Int,
            Sexp::UInt64(_) => SexpType::UInt64,
            Sexp::Float(_) => SexpType::Float,
            Sexp::Char(_) => SexpType::Char,
            Sexp::Bool(_) => SexpType::Bool,
            Sexp::Str(_) => SexpType::Str,
            Sexp::Symbol(_) => SexpType::Symbol,
            Sexp::Function(_) => SexpType::Function,
            Sexp::Hash(h) => SexpType::Hash(lock(h).type_name.clone()),
            Sexp::Pointer(p) => SexpType::Pointer(Box::new(lock(p).type_of())),
            Sexp::Reflect(_) => SexpType::Reflect,
        }
    }

    /// Descriptor consulted when a binding is overwritten; values
    /// without one may always be rebound
    pub fn descriptor(&self) -> Option<SexpType> {
        match self {
            Sexp::Int(_)
            | Sexp::UInt64(_)
            | Sexp::Float(_)
            | Sexp::Char(_)
            | Sexp::Bool(_)
            | Sexp::Str(_)
            | Sexp::Pointer(_)
            | Sexp::Reflect(_) => Some(self.type_of()),
            Sexp::Hash(h) => {
                let name = lock(h).type_name.clone();
                if name.is_empty() {
                    None
                } else {
                    Some(SexpType::Hash(name))
                }
            }
            _ => None,
        }
    }
}

impl From<i64> for Sexp {
    fn from(v: i64) -> Self {
        Sexp::Int(v)
    }
}

impl From<f64> for Sexp {
    fn from(v: f64) -> Self {
        Sexp::Float(v)
    }
}

impl From<bool> for Sexp {
    fn from(v: bool) -> Self {
        Sexp::Bool(v)
    }
}

impl From<&str> for Sexp {
    fn from(v: &str) -> Self {
        Sexp::string(v)
    }
}

impl From<String> for Sexp {
    fn from(v: String) -> Self {
        Sexp::string(v)
    }
}

impl PartialEq for Sexp {
    fn eq(&self, other: &Self) -> bool {
        equal(self, other, &mut vec![])
    }
}

/// Structural equality; `seen` holds container pairs already under
/// comparison, which are taken as equal when met again
fn equal(a: &Sexp, b: &Sexp, seen: &mut Vec<(usize, usize)>) -> bool {
    match (a, b) {
        (Sexp::Pair(_), Sexp::Pair(_)) => {
            let (mut a, mut b) = (a.clone(), b.clone());
            loop {
                match (&a, &b) {
                    (Sexp::Pair(x), Sexp::Pair(y)) if Arc::ptr_eq(x, y) => return true,
                    (Sexp::Pair(x), Sexp::Pair(y)) => {
                        if !equal(&x.head, &y.head, seen) {
                            return false;
                        }
                        let tails = (x.tail.clone(), y.tail.clone());
                        (a, b) = tails;
                    }
                    _ => return equal(&a, &b, seen),
                }
            }
        }
        (Sexp::Array(x), Sexp::Array(y)) => {
            let key = (Arc::as_ptr(x) as usize, Arc::as_ptr(y) as usize);
            if Arc::ptr_eq(x, y) || seen.contains(&key) {
                return true;
            }
            let xs = lock(x).clone();
            let ys = lock(y).clone();
            seen.push(key);
            let same = xs.len() == ys.len()
                && xs.iter().zip(&ys).all(|(p, q)| equal(p, q, seen));
            seen.pop();
            same
        }
        (Sexp::Hash(x), Sexp::Hash(y)) => {
            let key = (Arc::as_ptr(x) as usize, Arc::as_ptr(y) as usize);
            if Arc::ptr_eq(x, y) || seen.contains(&key) {
                return true;
            }
            let xh = lock(x).clone();
            let yh = lock(y).clone();
            if xh.type_name != yh.type_name {
                return false;
            }
            let (xs, ys) = (xh.pairs(), yh.pairs());
            seen.push(key);
            let same = xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(&ys)
                    .all(|((k1, v1), (k2, v2))| equal(k1, k2, seen) && equal(v1, v2, seen));
            seen.pop();
            same
        }
        (Sexp::Null, Sexp::Null) | (Sexp::End, Sexp::End) => true,
        (Sexp::Int(x), Sexp::Int(y)) => x == y,
        (Sexp::UInt64(x), Sexp::UInt64(y)) => x == y,
        (Sexp::Float(x), Sexp::Float(y)) => x == y,
        (Sexp::Char(x), Sexp::Char(y)) => x == y,
        (Sexp::Bool(x), Sexp::Bool(y)) => x == y,
        (Sexp::Str(x), Sexp::Str(y)) => x == y,
        (Sexp::Symbol(x), Sexp::Symbol(y)) => x == y,
        (Sexp::Function(x), Sexp::Function(y)) => Arc::ptr_eq(x, y),
        (Sexp::Pointer(x), Sexp::Pointer(y)) => Arc::ptr_eq(x, y),
        (Sexp::Reflect(x), Sexp::Reflect(y)) => {
            std::ptr::addr_eq(Arc::as_ptr(x), Arc::as_ptr(y))
        }
        _ => false,
    }
}

impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexp::Null => write!(f, "nil"),
            Sexp::End => write!(f, "<end>"),
            Sexp::Pair(_) => fmt_list(self, f),
            Sexp::Array(arr) => match arr.try_lock() {
                Ok(items) => fmt_seq(f, &items),
                Err(TryLockError::Poisoned(p)) => fmt_seq(f, &p.into_inner()),
                Err(TryLockError::WouldBlock) => write!(f, "[...]"),
            },
            Sexp::Int(i) => write!(f, "{}", i),
            Sexp::UInt64(u) => write!(f, "{}ULL", u),
            Sexp::Float(x) => write!(f, "{:?}", x),
            Sexp::Char(c) => fmt_char(*c, f),
            Sexp::Bool(b) => write!(f, "{}", b),
            Sexp::Str(s) => fmt_str(s, f),
            Sexp::Symbol(sym) if sym.colon => write!(f, "{}:", sym.name),
            Sexp::Symbol(sym) => write!(f, "{}", sym.name),
            Sexp::Function(func) => write!(f, "<fn {}>", func.name),
            Sexp::Hash(h) => match h.try_lock() {
                Ok(h) => fmt_hash(&h, f),
                Err(TryLockError::Poisoned(p)) => fmt_hash(&p.into_inner(), f),
                Err(TryLockError::WouldBlock) => write!(f, "(hash ...)"),
            },
            Sexp::Pointer(p) => match p.try_lock() {
                Ok(inner) => write!(f, "(ptr {})", *inner),
                Err(TryLockError::Poisoned(e)) => write!(f, "(ptr {})", *e.into_inner()),
                Err(TryLockError::WouldBlock) => write!(f, "(ptr ...)"),
            },
            Sexp::Reflect(_) => write!(f, "<reflect>"),
        }
    }
}

impl fmt::Debug for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn fmt_list(list: &Sexp, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "(")?;
    let mut cur = list;
    let mut first = true;
    loop {
        match cur {
            Sexp::Pair(p) => {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{}", p.head)?;
                first = false;
                cur = &p.tail;
            }
            Sexp::Null => break,
            // dotted pair
            other => {
                write!(f, " \\ {}", other)?;
                break;
            }
        }
    }
    write!(f, ")")
}

fn fmt_seq(f: &mut fmt::Formatter<'_>, items: &[Sexp]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "]")
}

fn fmt_hash(h: &SexpHash, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "(hash")?;
    if !h.type_name.is_empty() {
        write!(f, " ")?;
        fmt_str(&h.type_name, f)?;
    }
    for (k, v) in h.pairs() {
        match k {
            Sexp::Symbol(sym) => write!(f, " {}: {}", sym.name, v)?,
            other => write!(f, " {} {}", other, v)?,
        }
    }
    write!(f, ")")
}

fn fmt_char(c: char, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match char_name(c) {
        Some(name) => write!(f, "#{}", name),
        None => write!(f, "#{}", c),
    }
}

fn fmt_str(s: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            '\0' => write!(f, "\\0")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}
