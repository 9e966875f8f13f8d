// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/stdenv.rs

// Native functions bound in every new environment

// <>

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use super::env::Environment;
use super::sexp::{Arity, NativeFnPtr, Sexp, SexpHash};
use super::{lock, ZyErr, ZyResult};

/// Builds a table of native functions
///
/// Each entry gives a name, an arity (`2`, `*` for any, or `(1+)` for
/// at least one), names for the leading arguments, and a body. The
/// header names the environment, the called name, and the full
/// argument slice for use inside the bodies.
macro_rules! zy_fn {
    ( const $array:ident; $env:ident $name:ident $argv:ident;
      $( $fname:literal $argct:tt [ $($args:ident),* ] $body:block )+
    ) => {
        pub const $array: &[(&str, NativeFnPtr, Arity)] =
            &[$(($fname, |
                _env: &mut Environment,
                _name: &str,
                _argv: &[Sexp],
              | -> ZyResult<Sexp> {
                    #[allow(unused_variables)]
                    let $env = _env;
                    #[allow(unused_variables)]
                    let $name = _name;
                    #[allow(unused_variables)]
                    let $argv = _argv;

                    #[allow(unused_mut, unused_variables)]
                    let mut _it = _argv.iter();
                    $(
                        let $args = _it.next().cloned().unwrap_or(Sexp::Null);
                    )*

                    $body
                },
                zy_fn!(@arity $argct))),+];
    };

    (@arity *) => { Arity::Any };
    (@arity ($n:literal +)) => { Arity::AtLeast($n) };
    (@arity $n:literal) => { Arity::Exact($n) };
}

fn type_err(name: &str, what: &str, got: &Sexp) -> ZyErr {
    ZyErr::Type(format!("`{}` expects {}, got {}", name, what, got.type_of()))
}

fn overflow(name: &str) -> ZyErr {
    ZyErr::Runtime(format!("`{}`: integer overflow or division by zero", name))
}

/// Applies an arithmetic operator, widening integers to floats when
/// the operands are mixed
fn arith(
    name: &str,
    a: &Sexp,
    b: &Sexp,
    int: fn(i64, i64) -> Option<i64>,
    uint: fn(u64, u64) -> Option<u64>,
    float: fn(f64, f64) -> f64,
) -> ZyResult<Sexp> {
    Ok(match (a, b) {
        (Sexp::Int(x), Sexp::Int(y)) => Sexp::Int(int(*x, *y).ok_or_else(|| overflow(name))?),
        (Sexp::UInt64(x), Sexp::UInt64(y)) => {
            Sexp::UInt64(uint(*x, *y).ok_or_else(|| overflow(name))?)
        }
        (Sexp::Float(x), Sexp::Float(y)) => Sexp::Float(float(*x, *y)),
        (Sexp::Int(x), Sexp::Float(y)) => Sexp::Float(float(*x as f64, *y)),
        (Sexp::Float(x), Sexp::Int(y)) => Sexp::Float(float(*x, *y as f64)),
        (Sexp::Int(_) | Sexp::UInt64(_) | Sexp::Float(_), other) => {
            return Err(type_err(name, "a number", other))
        }
        (other, _) => return Err(type_err(name, "a number", other)),
    })
}

/// Folds an operator over `args`; no arguments yields `identity`
fn fold_arith(
    name: &str,
    identity: Sexp,
    args: &[Sexp],
    int: fn(i64, i64) -> Option<i64>,
    uint: fn(u64, u64) -> Option<u64>,
    float: fn(f64, f64) -> f64,
) -> ZyResult<Sexp> {
    let (first, rest) = match args.split_first() {
        Some(split) => split,
        None => return Ok(identity),
    };
    if as_f64(first).is_none() {
        return Err(type_err(name, "a number", first));
    }
    rest.iter()
        .try_fold(first.clone(), |acc, arg| arith(name, &acc, arg, int, uint, float))
}

fn as_f64(v: &Sexp) -> Option<f64> {
    match v {
        Sexp::Int(i) => Some(*i as f64),
        Sexp::UInt64(u) => Some(*u as f64),
        Sexp::Float(x) => Some(*x),
        _ => None,
    }
}

fn equal(a: &Sexp, b: &Sexp) -> bool {
    match (a, b) {
        (Sexp::Int(_) | Sexp::Float(_), Sexp::Int(_) | Sexp::Float(_))
            if matches!(a, Sexp::Float(_)) || matches!(b, Sexp::Float(_)) =>
        {
            as_f64(a) == as_f64(b)
        }
        _ => a == b,
    }
}

fn compare(name: &str, a: &Sexp, b: &Sexp) -> ZyResult<Ordering> {
    let ord = match (a, b) {
        (Sexp::Int(x), Sexp::Int(y)) => Some(x.cmp(y)),
        (Sexp::UInt64(x), Sexp::UInt64(y)) => Some(x.cmp(y)),
        (Sexp::Str(x), Sexp::Str(y)) => Some(x.cmp(y)),
        (Sexp::Char(x), Sexp::Char(y)) => Some(x.cmp(y)),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => {
                return Err(ZyErr::Type(format!(
                    "`{}` cannot compare {} with {}",
                    name,
                    a.type_of(),
                    b.type_of()
                )))
            }
        },
    };
    ord.ok_or_else(|| ZyErr::Runtime(format!("`{}`: unordered operands", name)))
}

fn index(name: &str, idx: &Sexp, len: usize) -> ZyResult<usize> {
    match idx {
        Sexp::Int(i) if *i >= 0 && (*i as usize) < len => Ok(*i as usize),
        Sexp::Int(i) => Err(ZyErr::Index(format!(
            "`{}`: index {} out of bounds for length {}",
            name, i, len
        ))),
        other => Err(type_err(name, "an integer index", other)),
    }
}

/// Text form used by `str` and the printers: strings and chars bare
fn plain_text(v: &Sexp) -> String {
    match v {
        Sexp::Str(s) => s.to_string(),
        Sexp::Char(c) => c.to_string(),
        other => other.to_string(),
    }
}

fn joined(args: &[Sexp], sep: &str) -> String {
    args.iter().map(plain_text).collect::<Vec<_>>().join(sep)
}

/// Joins lists, arrays, or strings; the first argument picks the kind
fn concat(name: &str, args: &[Sexp]) -> ZyResult<Sexp> {
    match args.first() {
        None | Some(Sexp::Null) | Some(Sexp::Pair(_)) => {
            let mut out = vec![];
            for arg in args {
                out.extend(arg.seq_to_vec()?);
            }
            Ok(Sexp::list(out))
        }
        Some(Sexp::Array(_)) => {
            let mut out = vec![];
            for arg in args {
                out.extend(arg.seq_to_vec()?);
            }
            Ok(Sexp::array(out))
        }
        Some(Sexp::Str(_)) => {
            let mut out = String::new();
            for arg in args {
                match arg {
                    Sexp::Str(s) => out.push_str(s),
                    other => return Err(type_err(name, "strings", other)),
                }
            }
            Ok(Sexp::string(out))
        }
        Some(other) => Err(type_err(name, "lists, arrays, or strings", other)),
    }
}

fn build_hash(name: &str, args: &[Sexp]) -> ZyResult<Sexp> {
    let (type_name, pairs) = match args.split_first() {
        Some((Sexp::Str(s), rest)) if args.len() % 2 == 1 => (s.to_string(), rest),
        _ => (String::new(), args),
    };
    if pairs.len() % 2 != 0 {
        return Err(ZyErr::Runtime(format!("`{}` needs key/value pairs", name)));
    }

    let mut h = SexpHash::new(type_name);
    for pair in pairs.chunks(2) {
        h.set(pair[0].clone(), pair[1].clone())?;
    }
    Ok(Sexp::hash(h))
}

fn with_hash<T>(name: &str, target: &Sexp, f: impl FnOnce(&mut SexpHash) -> ZyResult<T>) -> ZyResult<T> {
    match target {
        Sexp::Hash(h) => f(&mut *lock(h)),
        other => Err(type_err(name, "a hash", other)),
    }
}

zy_fn! {
    const ENVFNS;
    env name argv;

    "+" * [] {
        fold_arith(name, Sexp::Int(0), argv, i64::checked_add, u64::checked_add, |a, b| a + b)
    }

    "-" (1+) [first] {
        if argv.len() == 1 {
            return arith(name, &Sexp::Int(0), &first, i64::checked_sub, u64::checked_sub, |a, b| a - b);
        }
        fold_arith(name, first, argv, i64::checked_sub, u64::checked_sub, |a, b| a - b)
    }

    "*" * [] {
        fold_arith(name, Sexp::Int(1), argv, i64::checked_mul, u64::checked_mul, |a, b| a * b)
    }

    "/" (2+) [first] {
        fold_arith(name, first, argv, i64::checked_div, u64::checked_div, |a, b| a / b)
    }

    "%" 2 [a, b] {
        arith(name, &a, &b, i64::checked_rem, u64::checked_rem, |a, b| a % b)
    }

    "**" 2 [base, exp] {
        match (&base, &exp) {
            (Sexp::Int(b), Sexp::Int(e)) if *e >= 0 => {
                let e = u32::try_from(*e).map_err(|_| overflow(name))?;
                b.checked_pow(e).map(Sexp::Int).ok_or_else(|| overflow(name))
            }
            _ => match (as_f64(&base), as_f64(&exp)) {
                (Some(b), Some(e)) => Ok(Sexp::Float(b.powf(e))),
                _ => Err(type_err(name, "numbers", if as_f64(&base).is_none() { &base } else { &exp })),
            },
        }
    }

    "==" 2 [a, b] {
        Ok(Sexp::Bool(equal(&a, &b)))
    }

    "!=" 2 [a, b] {
        Ok(Sexp::Bool(!equal(&a, &b)))
    }

    "<" 2 [a, b] {
        Ok(Sexp::Bool(compare(name, &a, &b)? == Ordering::Less))
    }

    "<=" 2 [a, b] {
        Ok(Sexp::Bool(compare(name, &a, &b)? != Ordering::Greater))
    }

    ">" 2 [a, b] {
        Ok(Sexp::Bool(compare(name, &a, &b)? == Ordering::Greater))
    }

    ">=" 2 [a, b] {
        Ok(Sexp::Bool(compare(name, &a, &b)? != Ordering::Less))
    }

    "not" 1 [val] {
        Ok(Sexp::Bool(!val.is_truthy()))
    }

    "list" * [] {
        Ok(Sexp::list(argv.to_vec()))
    }

    "cons" 2 [head, tail] {
        Ok(Sexp::cons(head, tail))
    }

    "first" 1 [seq] {
        match &seq {
            Sexp::Pair(p) => Ok(p.head.clone()),
            Sexp::Array(arr) => {
                let items = lock(arr);
                items
                    .first()
                    .cloned()
                    .ok_or_else(|| ZyErr::Index("`first` of an empty array".into()))
            }
            Sexp::Null => Err(ZyErr::Index("`first` of an empty list".into())),
            other => Err(type_err(name, "a list or array", other)),
        }
    }

    "rest" 1 [seq] {
        match &seq {
            Sexp::Pair(p) => Ok(p.tail.clone()),
            Sexp::Null => Ok(Sexp::Null),
            Sexp::Array(arr) => {
                let items: Vec<Sexp> = lock(arr).iter().skip(1).cloned().collect();
                Ok(Sexp::array(items))
            }
            other => Err(type_err(name, "a list or array", other)),
        }
    }

    "len" 1 [seq] {
        let n = match &seq {
            Sexp::Str(s) => s.chars().count(),
            Sexp::Hash(h) => lock(h).len(),
            other => other.seq_to_vec().map_err(|_| type_err(name, "a sequence", other))?.len(),
        };
        Ok(Sexp::Int(n as i64))
    }

    "append" (1+) [seq] {
        match &seq {
            Sexp::Array(arr) => {
                let mut items = lock(arr).clone();
                items.extend_from_slice(&argv[1..]);
                Ok(Sexp::array(items))
            }
            Sexp::Null | Sexp::Pair(_) => {
                let mut items = seq.list_to_vec()?;
                items.extend_from_slice(&argv[1..]);
                Ok(Sexp::list(items))
            }
            other => Err(type_err(name, "a list or array", other)),
        }
    }

    "concat" * [] {
        concat(name, argv)
    }

    "array" * [] {
        Ok(Sexp::array(argv.to_vec()))
    }

    "aget" 2 [arr, idx] {
        match &arr {
            Sexp::Array(items) => {
                let items = lock(items);
                let i = index(name, &idx, items.len())?;
                Ok(items[i].clone())
            }
            other => Err(type_err(name, "an array", other)),
        }
    }

    "aset" 3 [arr, idx, val] {
        match &arr {
            Sexp::Array(items) => {
                let mut items = lock(items);
                let i = index(name, &idx, items.len())?;
                items[i] = val;
                Ok(Sexp::Null)
            }
            other => Err(type_err(name, "an array", other)),
        }
    }

    "hash" * [] {
        build_hash(name, argv)
    }

    "hget" (2+) [target, key, default] {
        let found = with_hash(name, &target, |h| h.get(&key))?;
        match found {
            Some(v) => Ok(v),
            None if argv.len() > 2 => Ok(default),
            None => Err(ZyErr::Index(format!("`{}`: no key {}", name, key))),
        }
    }

    "hset" 3 [target, key, val] {
        with_hash(name, &target, |h| h.set(key, val))?;
        Ok(Sexp::Null)
    }

    "hdel" 2 [target, key] {
        with_hash(name, &target, |h| h.delete(&key))?;
        Ok(Sexp::Null)
    }

    "keys" 1 [target] {
        let keys = with_hash(name, &target, |h| Ok(h.keys().to_vec()))?;
        Ok(Sexp::array(keys))
    }

    "ptr" 1 [val] {
        Ok(Sexp::Pointer(Arc::new(Mutex::new(val))))
    }

    "deref" 1 [p] {
        match &p {
            Sexp::Pointer(inner) => {
                let val = lock(inner).clone();
                Ok(val)
            }
            other => Err(type_err(name, "a pointer", other)),
        }
    }

    "str" * [] {
        Ok(Sexp::string(joined(argv, "")))
    }

    "print" * [] {
        print!("{}", joined(argv, " "));
        Ok(Sexp::Null)
    }

    "println" * [] {
        println!("{}", joined(argv, " "));
        Ok(Sexp::Null)
    }

    "type?" 1 [val] {
        Ok(Sexp::string(val.type_of().to_string()))
    }

    "symnum" 1 [sym] {
        match sym.as_symbol() {
            Some(s) => Ok(Sexp::Int(s.id as i64)),
            None => Err(type_err(name, "a symbol", &sym)),
        }
    }

    "gensym" * [prefix] {
        let prefix = match &prefix {
            Sexp::Null => String::from("__gensym"),
            other => plain_text(other),
        };
        Ok(Sexp::Symbol(env.gensym(&prefix)))
    }

    "apply" 2 [f, args] {
        let args = args.seq_to_vec()?;
        env.apply(&f, args)
    }

    "map" 2 [f, seq] {
        let items = seq.seq_to_vec()?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(env.apply(&f, vec![item])?);
        }
        Ok(match seq {
            Sexp::Array(_) => Sexp::array(out),
            _ => Sexp::list(out),
        })
    }

    "null?" 1 [val] {
        Ok(Sexp::Bool(matches!(val, Sexp::Null)))
    }

    "empty?" 1 [val] {
        let empty = match &val {
            Sexp::Null => true,
            Sexp::Str(s) => s.is_empty(),
            Sexp::Array(arr) => lock(arr).is_empty(),
            Sexp::Hash(h) => lock(h).is_empty(),
            _ => false,
        };
        Ok(Sexp::Bool(empty))
    }

    "list?" 1 [val] {
        Ok(Sexp::Bool(val.is_list()))
    }

    "array?" 1 [val] {
        Ok(Sexp::Bool(matches!(val, Sexp::Array(_))))
    }

    "number?" 1 [val] {
        Ok(Sexp::Bool(as_f64(&val).is_some()))
    }

    "string?" 1 [val] {
        Ok(Sexp::Bool(matches!(val, Sexp::Str(_))))
    }

    "symbol?" 1 [val] {
        Ok(Sexp::Bool(matches!(val, Sexp::Symbol(_))))
    }

    "hash?" 1 [val] {
        Ok(Sexp::Bool(matches!(val, Sexp::Hash(_))))
    }

    "fn?" 1 [val] {
        Ok(Sexp::Bool(matches!(val, Sexp::Function(_))))
    }

    "eval" 1 [expr] {
        let mut dup = env.nested()?;
        dup.eval_expressions(&[expr])
    }

    "error" * [] {
        Err(ZyErr::Runtime(joined(argv, " ")))
    }

    "macexpand" 1 [form] {
        let items = match form.list_to_vec() {
            Ok(items) => items,
            Err(_) => return Ok(form),
        };
        let mac = items
            .first()
            .and_then(|head| head.as_symbol())
            .and_then(|sym| env.macro_for(sym.id));
        match mac {
            Some(mac) => env.expand_macro(&mac, items[1..].to_vec()),
            None => Ok(form),
        }
    }
}

/// Binds every standard native in `env`'s global scope
pub fn load_std_functions(env: &mut Environment) {
    for &(name, f, arity) in ENVFNS {
        env.add_native(name, arity, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> ZyResult<Sexp> {
        let mut env = Environment::new();
        let out = env.eval_string(text);
        env.stop();
        out
    }

    fn shows(text: &str) -> String {
        eval(text).unwrap().to_string()
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("(+ 1 2 3)").unwrap(), Sexp::Int(6));
        assert_eq!(eval("(- 10 4 1)").unwrap(), Sexp::Int(5));
        assert_eq!(eval("(- 3)").unwrap(), Sexp::Int(-3));
        assert_eq!(eval("(* 2 2.5)").unwrap(), Sexp::Float(5.0));
        assert_eq!(eval("(/ 7 2)").unwrap(), Sexp::Int(3));
        assert_eq!(eval("(% 7 2)").unwrap(), Sexp::Int(1));
        assert_eq!(eval("(** 2 10)").unwrap(), Sexp::Int(1024));
        assert_eq!(eval("(+ 1ULL 2ULL)").unwrap(), Sexp::UInt64(3));
        assert!(matches!(eval("(/ 1 0)"), Err(ZyErr::Runtime(_))));
        assert!(matches!(eval("(+ 1 \"a\")"), Err(ZyErr::Type(_))));
        assert!(matches!(eval("(%)"), Err(ZyErr::ArgCount { .. })));
    }

    #[test]
    fn comparison() {
        assert_eq!(eval("(== 1 1.0)").unwrap(), Sexp::Bool(true));
        assert_eq!(eval("(!= \"a\" \"b\")").unwrap(), Sexp::Bool(true));
        assert_eq!(eval("(< 1 2.5)").unwrap(), Sexp::Bool(true));
        assert_eq!(eval("(>= \"b\" \"a\")").unwrap(), Sexp::Bool(true));
        assert_eq!(eval("(not 0)").unwrap(), Sexp::Bool(true));
        assert!(matches!(eval("(< 1 \"a\")"), Err(ZyErr::Type(_))));
    }

    #[test]
    fn sequences() {
        assert_eq!(shows("(cons 1 (list 2 3))"), "(1 2 3)");
        assert_eq!(shows("(first (list 4 5))"), "4");
        assert_eq!(shows("(rest [4 5 6])"), "[5 6]");
        assert_eq!(shows("(len \"héllo\")"), "5");
        assert_eq!(shows("(append [1] 2 3)"), "[1 2 3]");
        assert_eq!(shows("(concat (list 1) [2] nil)"), "(1 2)");
        assert_eq!(shows("(concat \"ab\" \"cd\")"), "\"abcd\"");
        assert_eq!(shows("(def a [1 2 3]) (aset a 1 9) a"), "[1 9 3]");
        assert_eq!(shows("(aget [1 2] 1)"), "2");
        assert!(matches!(eval("(aget [1 2] 5)"), Err(ZyErr::Index(_))));
        assert!(matches!(eval("(first nil)"), Err(ZyErr::Index(_))));
    }

    #[test]
    fn hashes_and_pointers() {
        assert_eq!(shows("(hash \"Point\" x: 1 y: 2)"), "(hash \"Point\" x: 1 y: 2)");
        assert_eq!(shows("(def h (hash a: 1)) (hset h b: 2) (hget h b:)"), "2");
        assert_eq!(shows("(def h (hash a: 1)) (hdel h a:) (keys h)"), "[]");
        assert_eq!(shows("(hget (hash) z: 0)"), "0");
        assert!(matches!(eval("(hget (hash) z:)"), Err(ZyErr::Index(_))));
        assert_eq!(shows("(deref (ptr 5))"), "5");
        assert_eq!(shows("(type? (hash \"Point\"))"), "\"Point\"");
    }

    #[test]
    fn higher_order() {
        assert_eq!(shows("(map (fn [x] (* x x)) [1 2 3])"), "[1 4 9]");
        assert_eq!(shows("(apply + (list 1 2 3))"), "6");
        assert_eq!(shows("(defn add [a b] (+ a b)) (apply add [2 3])"), "5");
        assert_eq!(shows("(eval (quote (+ 2 3)))"), "5");
        assert_eq!(shows("(str \"n=\" 5 #c)"), "\"n=5c\"");
    }

    #[test]
    fn predicates_and_symbols() {
        assert_eq!(shows("(list (null? nil) (empty? []) (list? nil) (number? 1.5) (fn? +))"), "(true true true true true)");
        assert_eq!(shows("(symbol? (gensym))"), "true");
        assert_eq!(shows("(== (symnum (quote q)) (symnum (quote q)))"), "true");
    }

    #[test]
    fn errors_and_expansion() {
        assert!(matches!(eval("(error \"bad\" 1)"), Err(ZyErr::Runtime(msg)) if msg == "bad 1"));
        assert_eq!(
            shows("(defmac twice [x] ^(begin ~x ~x)) (macexpand (quote (twice (f))))"),
            "(begin (f) (f))"
        );
    }
}
