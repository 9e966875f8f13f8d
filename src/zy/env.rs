// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/env.rs

// The Environment: one interpreter instance, holding the symbol
// table, global scope, the three execution stacks, and the handle on
// its parse process. Entry points for embedding hosts live here.

// <>

use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::codegen::Generator;
use super::eval::CallFrame;
use super::parser::Parser;
use super::scope::{Scope, ScopeRef};
use super::sexp::{Arity, NativeFn, Sexp, SexpSymbol, ZyFunction};
use super::stack::Stack;
use super::stdenv;
use super::symtab::{Stab, SymbolTable};
use super::{lock, ZyErr, ZyResult};

/// Runs before every call with the callee name and its arguments
pub type PreHook = Arc<dyn Fn(&str, &[Sexp]) + Send + Sync>;

/// Runs after every call with the callee name and its result
pub type PostHook = Arc<dyn Fn(&str, &Sexp) + Send + Sync>;

/// Settings fixed when an environment is built
#[derive(Clone)]
pub struct EnvConfig {
    /// initial capacity of the data, scope, and call stacks
    pub stack_capacity: usize,
    /// deepest allowed nesting of compiled calls
    pub max_call_depth: usize,
    /// deepest allowed nesting of runs started from native code, such
    /// as `apply`, `eval`, and macro expansion
    pub max_reentry_depth: usize,
    /// log every executed instruction at trace level
    pub trace_instructions: bool,
    pub pre_hooks: Vec<PreHook>,
    pub post_hooks: Vec<PostHook>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            stack_capacity: 64,
            max_call_depth: 10_000,
            max_reentry_depth: 32,
            trace_instructions: false,
            pre_hooks: vec![],
            post_hooks: vec![],
        }
    }
}

const SYMTAB_SIZE: usize = 256;

pub struct Environment {
    pub(crate) stab: Stab,
    pub(crate) global: ScopeRef,
    macros: Arc<Mutex<HashMap<u32, Arc<ZyFunction>>>>,
    builders: Arc<Mutex<HashSet<u32>>>,
    pub(crate) config: Arc<EnvConfig>,

    pub(crate) datastack: Stack<Sexp>,
    pub(crate) scopestack: Stack<ScopeRef>,
    pub(crate) addrstack: Stack<CallFrame>,
    pub(crate) curfunc: Arc<ZyFunction>,
    pub(crate) pc: isize,
    /// call depth at which a return ends the current run
    pub(crate) base_depth: usize,
    /// runs this one is nested inside
    pub(crate) reentry: usize,

    /// started on first use
    parser: Option<Parser>,
    gensym_ctr: Arc<AtomicU64>,
}

fn empty_main() -> Arc<ZyFunction> {
    Arc::new(ZyFunction::compiled("__main", vec![], None, vec![]))
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// A fresh environment with the standard functions loaded
    pub fn new() -> Self {
        Self::with_config(EnvConfig::default())
    }

    pub fn with_config(config: EnvConfig) -> Self {
        let global = Scope::new("global").into_ref();
        let mut scopestack = Stack::new(config.stack_capacity);
        scopestack.push(Arc::clone(&global));

        let mut env = Environment {
            stab: SymbolTable::shared(SYMTAB_SIZE),
            global,
            macros: Arc::new(Mutex::new(HashMap::new())),
            builders: Arc::new(Mutex::new(HashSet::new())),
            datastack: Stack::new(config.stack_capacity),
            scopestack,
            addrstack: Stack::new(config.stack_capacity),
            curfunc: empty_main(),
            pc: 0,
            base_depth: 0,
            reentry: 0,
            parser: None,
            gensym_ctr: Arc::new(AtomicU64::new(0)),
            config: Arc::new(config),
        };

        stdenv::load_std_functions(&mut env);
        env
    }

    /// Interns `name` in this environment's symbol table
    pub fn make_symbol(&self, name: &str) -> SexpSymbol {
        SexpSymbol::intern(&self.stab, name)
    }

    /// A symbol not yet used by anything in this environment
    pub fn gensym(&self, prefix: &str) -> SexpSymbol {
        loop {
            let n = self.gensym_ctr.fetch_add(1, Ordering::Relaxed);
            let name = format!("{}__{}", prefix, n);
            if lock(&self.stab).lookup_by_name(&name).is_none() {
                return self.make_symbol(&name);
            }
        }
    }

    /// Binds a function under its own name in the global scope
    pub fn add_function(&mut self, func: ZyFunction) {
        let sym = self.make_symbol(&func.name);
        if func.is_builder() {
            lock(&self.builders).insert(sym.id);
        } else {
            lock(&self.builders).remove(&sym.id);
        }
        lock(&self.global).define(&sym, Sexp::Function(Arc::new(func)));
    }

    /// Registers a host callback receiving evaluated arguments
    pub fn add_native<F>(&mut self, name: &str, arity: Arity, f: F)
    where
        F: Fn(&mut Environment, &str, &[Sexp]) -> ZyResult<Sexp> + Send + Sync + 'static,
    {
        let callback: NativeFn = Arc::new(f);
        self.add_function(ZyFunction::native(name, arity, false, callback));
    }

    /// Registers a host callback receiving its argument expressions
    /// unevaluated
    pub fn add_builder<F>(&mut self, name: &str, arity: Arity, f: F)
    where
        F: Fn(&mut Environment, &str, &[Sexp]) -> ZyResult<Sexp> + Send + Sync + 'static,
    {
        let callback: NativeFn = Arc::new(f);
        self.add_function(ZyFunction::native(name, arity, true, callback));
    }

    pub fn is_builder(&self, id: u32) -> bool {
        lock(&self.builders).contains(&id)
    }

    pub fn macro_for(&self, id: u32) -> Option<Arc<ZyFunction>> {
        lock(&self.macros).get(&id).cloned()
    }

    pub fn register_macro(&mut self, id: u32, mac: Arc<ZyFunction>) {
        log::debug!("registered macro {}", mac.name);
        lock(&self.macros).insert(id, mac);
    }

    /// Runs a macro over unevaluated arguments in a duplicate
    /// environment, returning the expansion
    pub fn expand_macro(&self, mac: &Arc<ZyFunction>, args: Vec<Sexp>) -> ZyResult<Sexp> {
        let mut dup = self.nested()?;
        dup.apply(&Sexp::Function(Arc::clone(mac)), args)
    }

    /// Binds `name` in the global scope, subject to the rebinding check
    pub fn bind_global(&mut self, name: &str, val: Sexp) -> ZyResult<()> {
        let sym = self.make_symbol(name);
        let result = lock(&self.global).bind(&sym, val);
        result
    }

    /// Resolves `name` as the running program would
    pub fn lookup(&self, name: &str) -> ZyResult<Sexp> {
        self.lexical_lookup(&self.make_symbol(name))
    }

    fn parser(&mut self) -> ZyResult<&Parser> {
        if self.parser.is_none() {
            self.parser = Some(Parser::new(Arc::clone(&self.stab))?);
        }
        match &self.parser {
            Some(parser) => Ok(parser),
            None => Err(ZyErr::ShuttingDown),
        }
    }

    /// Parses a complete source text, discarding any partial input
    /// left over from earlier
    pub fn parse_string(&mut self, text: &str) -> ZyResult<Vec<Sexp>> {
        let parser = self.parser()?;
        parser.reset_add_new_input(&format!("{}\n", text))?;
        match parser.parse_tokens() {
            (exprs, None) => Ok(exprs),
            (_, Some(err)) => Err(err),
        }
    }

    /// Feeds one more line to the parser; an unfinished expression
    /// yields `MoreInputNeeded` and carries over to the next call
    pub fn parse_input(&mut self, line: &str) -> ZyResult<Vec<Sexp>> {
        let parser = self.parser()?;
        parser.new_input(&format!("{}\n", line))?;
        match parser.parse_tokens() {
            (exprs, None) => Ok(exprs),
            (_, Some(err)) => Err(err),
        }
    }

    /// Throws away whatever partial expression the parser holds
    pub fn reset_parser(&mut self) -> ZyResult<()> {
        self.parser()?.reset_add_new_input("")
    }

    /// Compiles `exprs` as the new main program without running it
    pub fn load_expressions(&mut self, exprs: &[Sexp]) -> ZyResult<()> {
        let mut gen = Generator::new(self);
        gen.generate(exprs)?;
        let code = gen.into_instructions();

        log::debug!("loaded {} forms as {} instructions", exprs.len(), code.len());
        self.curfunc = Arc::new(ZyFunction::compiled("__main", vec![], None, code));
        self.pc = 0;
        Ok(())
    }

    /// Parses and compiles `text` without running it
    pub fn load_string(&mut self, text: &str) -> ZyResult<()> {
        let exprs = self.parse_string(text)?;
        self.load_expressions(&exprs)
    }

    pub fn eval_expressions(&mut self, exprs: &[Sexp]) -> ZyResult<Sexp> {
        self.load_expressions(exprs)?;
        self.run()
    }

    /// Parses, compiles, and runs `text`, returning its last value
    pub fn eval_string(&mut self, text: &str) -> ZyResult<Sexp> {
        self.load_string(text)?;
        self.run()
    }

    /// A separate interpreter sharing this one's symbols, globals,
    /// macros, and configuration, with empty stacks of its own
    pub fn duplicate(&self) -> Environment {
        log::debug!("duplicating environment");
        let mut scopestack = Stack::new(self.config.stack_capacity);
        scopestack.push(Arc::clone(&self.global));

        Environment {
            stab: Arc::clone(&self.stab),
            global: Arc::clone(&self.global),
            macros: Arc::clone(&self.macros),
            builders: Arc::clone(&self.builders),
            config: Arc::clone(&self.config),
            datastack: Stack::new(self.config.stack_capacity),
            scopestack,
            addrstack: Stack::new(self.config.stack_capacity),
            curfunc: empty_main(),
            pc: 0,
            base_depth: 0,
            reentry: 0,
            parser: None,
            gensym_ctr: Arc::clone(&self.gensym_ctr),
        }
    }

    /// A duplicate for a run started from inside this one
    pub(crate) fn nested(&self) -> ZyResult<Environment> {
        self.check_reentry()?;
        let mut dup = self.duplicate();
        dup.reentry = self.reentry + 1;
        Ok(dup)
    }

    pub(crate) fn check_reentry(&self) -> ZyResult<()> {
        if self.reentry >= self.config.max_reentry_depth {
            return Err(ZyErr::Runtime(format!(
                "call depth exceeded {} nested runs from native code",
                self.config.max_reentry_depth
            )));
        }
        Ok(())
    }

    /// Empties all three stacks after an error
    pub fn clear(&mut self) {
        self.datastack.clear();
        self.scopestack.truncate(1);
        self.addrstack.clear();
        self.curfunc = empty_main();
        self.pc = 0;
        self.base_depth = 0;
    }

    /// Stops the parse process, waiting for it to exit
    pub fn stop(&mut self) {
        if let Some(mut parser) = self.parser.take() {
            parser.stop();
        }
    }

    /// Current function and pc, then each pending return address
    pub fn stack_trace(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "  in {} at pc {}", self.curfunc.name, self.pc);
        for frame in self.addrstack.iter_from_top() {
            let _ = writeln!(
                out,
                "  called from {} at pc {} (calling {})",
                frame.func.name,
                frame.pc - 1,
                frame.callee
            );
        }
        out
    }

    /// Instruction listing with the pc marked, then the data and
    /// scope stacks
    pub fn dump_environment(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "function {}:", self.curfunc.name);
        for (i, instr) in self.curfunc.code().iter().enumerate() {
            let mark = if i as isize == self.pc { "*" } else { " " };
            let _ = writeln!(out, "{} {:4} {}", mark, i, instr);
        }

        let _ = writeln!(out, "data stack ({}):", self.datastack.size());
        for (i, val) in self.datastack.iter_from_top().enumerate() {
            let _ = writeln!(out, "  {:3}: {}", i, val);
        }

        let _ = writeln!(out, "scope stack ({}):", self.scopestack.size());
        let stab = lock(&self.stab);
        for scope in self.scopestack.iter_from_top() {
            let scope = lock(scope);
            let marker = if scope.is_function { " (call)" } else { "" };
            let _ = writeln!(out, "  {}{}:", scope.name, marker);
            for (id, val) in scope.entries() {
                let name = stab.lookup_by_id(id).unwrap_or_else(|| Arc::from("?"));
                let _ = writeln!(out, "    {} = {}", name, val);
            }
        }
        out
    }
}

/// Copies the execution state too; the parse process is not shared
impl Clone for Environment {
    fn clone(&self) -> Self {
        Environment {
            stab: Arc::clone(&self.stab),
            global: Arc::clone(&self.global),
            macros: Arc::clone(&self.macros),
            builders: Arc::clone(&self.builders),
            config: Arc::clone(&self.config),
            datastack: self.datastack.clone(),
            scopestack: self.scopestack.clone(),
            addrstack: self.addrstack.clone(),
            curfunc: Arc::clone(&self.curfunc),
            pc: self.pc,
            base_depth: self.base_depth,
            reentry: self.reentry,
            parser: None,
            gensym_ctr: Arc::clone(&self.gensym_ctr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn eval(text: &str) -> ZyResult<Sexp> {
        let mut env = Environment::new();
        let out = env.eval_string(text);
        env.stop();
        out
    }

    #[test]
    fn end_to_end() {
        assert_eq!(eval("(+ 1 2)").unwrap(), Sexp::Int(3));
        assert_eq!(
            eval("(cond (== 1 2) \"a\" (== 1 1) \"b\" \"default\")").unwrap(),
            Sexp::string("b")
        );
        assert_eq!(eval("(def x 5) (set x (+ x 1)) x").unwrap(), Sexp::Int(6));
        assert_eq!(eval("").unwrap(), Sexp::Null);
    }

    #[test]
    fn short_circuit_skips_side_effects() {
        let mut env = Environment::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        env.add_native("sideeffect", Arity::Exact(0), move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Sexp::Bool(true))
        });

        assert_eq!(env.eval_string("(and false (sideeffect))").unwrap(), Sexp::Bool(false));
        assert_eq!(env.eval_string("(or 1 (sideeffect))").unwrap(), Sexp::Int(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(env.eval_string("(and true (sideeffect))").unwrap(), Sexp::Bool(true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        env.stop();
    }

    #[test]
    fn closures_keep_definition_scope() {
        let src = "
            (defn make-adder [n] (fn [x] (+ x n)))
            (def add5 (make-adder 5))
            (defn other [n] (add5 n))
            (other 100)";
        assert_eq!(eval(src).unwrap(), Sexp::Int(105));

        let counter = "
            (defn counter [] (let [c 0] (fn [] (set c (+ c 1)))))
            (def tick (counter))
            (tick) (tick) (tick)";
        assert_eq!(eval(counter).unwrap(), Sexp::Int(3));

        let nested = "
            (defn outer [a] (fn [b] (fn [c] (+ a b c))))
            (((outer 1) 2) 3)";
        assert_eq!(eval(nested).unwrap(), Sexp::Int(6));
    }

    #[test]
    fn lexical_not_dynamic() {
        let src = "
            (defn reader [] y)
            (defn caller [y] (reader))
            (caller 3)";
        assert!(matches!(eval(src), Err(ZyErr::Undefined(name)) if name == "y"));
    }

    #[test]
    fn symbol_interning() {
        let a = Environment::new();
        let b = Environment::new();
        assert_eq!(a.make_symbol("zz-top").id, a.make_symbol("zz-top").id);

        let b_first = b.make_symbol("only-in-b");
        let a_other = a.make_symbol("something-else");
        let a_same = a.make_symbol("only-in-b");
        assert_ne!(a_other.id, a_same.id);
        assert_eq!(b_first.id, b.make_symbol("only-in-b").id);
        assert_eq!(a.duplicate().make_symbol("zz-top").id, a.make_symbol("zz-top").id);
    }

    #[test]
    fn hooks_see_calls() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pre_seen = Arc::clone(&seen);
        let post_seen = Arc::clone(&seen);

        let pre: PreHook = Arc::new(move |name, args| {
            lock(&pre_seen).push(format!("pre {} {}", name, args.len()));
        });
        let post: PostHook = Arc::new(move |name, ret| {
            lock(&post_seen).push(format!("post {} {}", name, ret));
        });
        let config = EnvConfig {
            pre_hooks: vec![pre],
            post_hooks: vec![post],
            ..EnvConfig::default()
        };

        let mut env = Environment::with_config(config);
        env.eval_string("(defn sq [x] (* x x)) (sq 4)").unwrap();
        env.stop();

        let log = lock(&seen).clone();
        assert_eq!(log, vec!["pre sq 1", "pre * 2", "post * 16", "post sq 16"]);
    }

    #[test]
    fn builders_get_raw_arguments() {
        let mut env = Environment::new();
        env.add_builder("shape", Arity::Any, |_, _, args| {
            Ok(Sexp::string(
                args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(","),
            ))
        });
        assert_eq!(
            env.eval_string("(shape a (b c) 1)").unwrap(),
            Sexp::string("a,(b c),1")
        );
        env.stop();
    }

    #[test]
    fn macros_expand_at_compile_time() {
        let src = "
            (defmac unless [c body] ^(if ~c nil ~body))
            (unless false 7)";
        assert_eq!(eval(src).unwrap(), Sexp::Int(7));

        let splice = "
            (defmac sum-all [& xs] ^(+ ~@xs))
            (sum-all 1 2 3)";
        assert_eq!(eval(splice).unwrap(), Sexp::Int(6));
    }

    #[test]
    fn dot_paths_and_records() {
        let src = "
            (def p (hash \"Point\" x: 1 inner: (hash y: 2)))
            (set .p.x 10)
            (+ .p.x .p.inner.y)";
        assert_eq!(eval(src).unwrap(), Sexp::Int(12));
    }

    #[test]
    fn keyword_and_typed_arguments() {
        assert_eq!(
            eval("(defn sub [a b] (- a b)) (sub b: 1 a: 10)").unwrap(),
            Sexp::Int(9)
        );
        assert!(matches!(
            eval("(defn f [a b] a) (f c: 1 2)"),
            Err(ZyErr::Runtime(_)) | Err(ZyErr::ArgCount { .. })
        ));
        assert!(matches!(
            eval("(defn g [n: int] n) (g \"no\")"),
            Err(ZyErr::Type(_))
        ));
        assert_eq!(eval("(defn h [x: float] x) (h 2)").unwrap(), Sexp::Int(2));
        assert_eq!(
            eval("(defn v [a & more] more) (v 1 2 3)").unwrap().to_string(),
            "(2 3)"
        );
        assert!(matches!(eval("(defn w [a] a) (w)"), Err(ZyErr::ArgCount { .. })));
    }

    #[test]
    fn rebinding_checks_descriptors() {
        assert!(matches!(eval("(def s \"a\") (set s 3)"), Err(ZyErr::Type(_))));
        assert_eq!(eval("(def n nil) (set n 3) n").unwrap(), Sexp::Int(3));
        assert_eq!(eval("(def f 1.5) (set f 2) f").unwrap(), Sexp::Int(2));
    }

    #[test]
    fn loops() {
        let src = "
            (def total 0)
            (for [(def i 0) (< i 10) (set i (+ i 1))]
                (if (== i 5) (continue) nil)
                (if (== i 8) (break) nil)
                (set total (+ total i)))
            total";
        assert_eq!(eval(src).unwrap(), Sexp::Int(1 + 2 + 3 + 4 + 6 + 7));

        let w = "
            (def n 0)
            (while true (let [step 2] (set n (+ n step)) (if (> n 7) (break) nil)))
            n";
        assert_eq!(eval(w).unwrap(), Sexp::Int(8));
    }

    #[test]
    fn infix_blocks() {
        assert_eq!(eval("{1 + 2 * 3}").unwrap(), Sexp::Int(7));
        assert_eq!(eval("(def a 0) {a = 2 ** 3} a").unwrap(), Sexp::Int(8));
        assert_eq!(eval("{1 < 2 and 3 > 4}").unwrap(), Sexp::Bool(false));
    }

    #[test]
    fn let_and_begin() {
        assert_eq!(eval("(let [a 1 b (+ a 1)] (* a b 10))").unwrap(), Sexp::Int(20));
        assert_eq!(eval("(begin 1 2 3)").unwrap(), Sexp::Int(3));
        assert_eq!(eval("(if false 1)").unwrap(), Sexp::Null);
        assert!(matches!(eval("(let [q 1] q) q"), Err(ZyErr::Undefined(_))));
    }

    #[test]
    fn syntax_quote_builds_values() {
        assert_eq!(eval("(def x 2) ^(a ~x)").unwrap().to_string(), "(a 2)");
        assert_eq!(
            eval("(def xs (list 1 2)) ^[0 ~@xs 3]").unwrap().to_string(),
            "[0 1 2 3]"
        );
    }

    #[test]
    fn incomplete_source() {
        assert!(matches!(eval("(+ 1"), Err(ZyErr::MoreInputNeeded)));
        assert!(matches!(eval("(1 \\ 2 3)"), Err(ZyErr::Parse { .. })));
    }

    #[test]
    fn errors_leave_state_until_cleared() {
        let mut env = Environment::new();
        assert!(env.eval_string("(defn bad [] (undefined-thing)) (bad)").is_err());
        assert!(env.stack_trace().contains("bad"));
        assert_eq!(env.addrstack.size(), 1);

        env.clear();
        assert_eq!(env.addrstack.size(), 0);
        assert_eq!(env.scopestack.size(), 1);
        assert_eq!(env.eval_string("(+ 2 2)").unwrap(), Sexp::Int(4));
        env.stop();
    }

    #[test]
    fn deep_recursion_is_an_error() {
        let config = EnvConfig {
            max_call_depth: 50,
            ..EnvConfig::default()
        };
        let mut env = Environment::with_config(config);
        let res = env.eval_string("(defn down [n] (down (+ n 1))) (down 0)");
        assert!(matches!(res, Err(ZyErr::Runtime(msg)) if msg.contains("call depth")));
    }

    #[test]
    fn cyclic_arrays_compare() {
        let res = eval("(def a [1]) (aset a 0 a) (def b [1]) (aset b 0 b) (== a b)");
        assert_eq!(res.unwrap(), Sexp::Bool(true));
        let res = eval("(def a [1 2]) (aset a 0 a) (def b [1 3]) (aset b 0 b) (!= a b)");
        assert_eq!(res.unwrap(), Sexp::Bool(true));
    }

    #[test]
    fn loop_exits_leave_stack_balanced() {
        let mut env = Environment::new();
        let res = env.eval_string(
            "(def n 0) (for [(def i 0) (< i 100) (set i (+ i 1))] (list i (continue) (set n (+ n 1)))) n",
        );
        assert_eq!(res.unwrap(), Sexp::Int(0));
        assert_eq!(env.datastack.size(), 0);

        let res = env.eval_string("(list 7 (while true (list 1 [2 (break)])))");
        assert_eq!(res.unwrap().to_string(), "(7 nil)");
        assert_eq!(env.datastack.size(), 0);
        env.stop();
    }

    #[test]
    fn native_reentry_is_bounded() {
        let mut env = Environment::new();
        let res = env.eval_string("(defn r [n] (apply r (list (+ n 1)))) (r 0)");
        assert!(matches!(res, Err(ZyErr::Runtime(msg)) if msg.contains("call depth")));
        assert_eq!(env.reentry, 0);
        env.clear();

        let res = env.eval_string("(defn s [n] (if (> n 20) n (apply s (list (+ n 1))))) (s 0)");
        assert_eq!(res.unwrap(), Sexp::Int(21));

        let res = env.eval_string("(defn e [n] (eval (list (quote e) (+ n 1)))) (e 0)");
        assert!(matches!(res, Err(ZyErr::Runtime(msg)) if msg.contains("call depth")));
        env.stop();
        env.stop();
    }

    #[test]
    fn native_panics_become_errors() {
        let mut env = Environment::new();
        env.add_native("boom", Arity::Exact(0), |_, _, _| panic!("kaboom"));
        match env.eval_string("(boom)") {
            Err(ZyErr::Panic { name, msg, trace }) => {
                assert_eq!(name, "boom");
                assert_eq!(msg, "kaboom");
                assert!(trace.contains("__main"));
            }
            other => panic!("expected a panic error, got {:?}", other.map(|v| v.to_string())),
        }
        env.clear();
        assert_eq!(env.eval_string("(+ 1 1)").unwrap(), Sexp::Int(2));
        env.stop();
    }

    #[test]
    fn repl_style_input() {
        let mut env = Environment::new();
        assert!(matches!(env.parse_input("(+ 1"), Err(ZyErr::MoreInputNeeded)));
        let exprs = env.parse_input("2)").unwrap();
        assert_eq!(env.eval_expressions(&exprs).unwrap(), Sexp::Int(3));

        assert!(matches!(env.parse_input("(oops"), Err(ZyErr::MoreInputNeeded)));
        env.reset_parser().unwrap();
        let exprs = env.parse_input("(* 2 5)").unwrap();
        assert_eq!(env.eval_expressions(&exprs).unwrap(), Sexp::Int(10));

        assert!(env.dump_environment().contains("function __main"));
        env.stop();
        env.stop();
    }

    #[test]
    fn apply_from_host() {
        let mut env = Environment::new();
        env.eval_string("(defn twice [x] (* 2 x))").unwrap();
        let f = env.lookup("twice").unwrap();
        assert_eq!(env.apply(&f, vec![Sexp::Int(21)]).unwrap(), Sexp::Int(42));
        let plus = env.lookup("+").unwrap();
        assert_eq!(env.apply(&plus, vec![Sexp::Int(1), Sexp::Int(2)]).unwrap(), Sexp::Int(3));
        env.stop();
    }
}
