// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/codegen.rs

// Code generator: turns parsed expressions into a flat instruction
// sequence. Special forms are recognized by the name at the head of a
// list; anything else becomes a call.

// <>

use std::mem;
use std::sync::Arc;

use super::env::Environment;
use super::eval::Instr;
use super::sexp::{Param, Sexp, SexpSymbol, SexpType, ZyFunction};
use super::{lock, ZyErr, ZyResult};

const MAX_MACRO_DEPTH: usize = 256;

/// Loop being compiled; breaks close the let scopes opened inside it
/// and drop the operands pushed since it began
struct LoopFrame {
    let_depth: usize,
    pending: usize,
}

pub struct Generator<'e> {
    env: &'e mut Environment,
    instrs: Vec<Instr>,
    loops: Vec<LoopFrame>,
    /// let scopes currently open in this function body
    let_depth: usize,
    /// values pushed for a call or constructor that has not consumed
    /// them yet
    pending: usize,
    /// macro expansion nesting
    depth: usize,
}

fn compile_err(msg: impl Into<String>) -> ZyErr {
    ZyErr::Compile(msg.into())
}

/// Places a fragment compiled from offset zero at the end of `dst`
fn splice(dst: &mut Vec<Instr>, frag: Vec<Instr>) {
    let base = dst.len();
    dst.extend(frag.into_iter().map(|i| i.relocated(base)));
}

impl<'e> Generator<'e> {
    pub fn new(env: &'e mut Environment) -> Self {
        Generator {
            env,
            instrs: vec![],
            loops: vec![],
            let_depth: 0,
            pending: 0,
            depth: 0,
        }
    }

    /// Compiles top-level expressions; only the last value is kept
    pub fn generate(&mut self, exprs: &[Sexp]) -> ZyResult<()> {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.instrs.push(Instr::Pop);
            }
            self.compile(expr)?;
        }
        Ok(())
    }

    pub fn into_instructions(self) -> Vec<Instr> {
        self.instrs
    }

    fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    fn here(&self) -> usize {
        self.instrs.len()
    }

    fn symbol(&self, name: &str) -> SexpSymbol {
        self.env.make_symbol(name)
    }

    /// Compiles `expr` on its own, with jump targets relative to zero
    fn fragment(&mut self, expr: &Sexp) -> ZyResult<Vec<Instr>> {
        let saved = mem::take(&mut self.instrs);
        let res = self.compile(expr);
        let frag = mem::replace(&mut self.instrs, saved);
        res.map(|_| frag)
    }

    pub fn compile(&mut self, expr: &Sexp) -> ZyResult<()> {
        match expr {
            Sexp::Symbol(sym) if sym.colon || sym.is_sigil => {
                self.emit(Instr::Push(expr.clone()))
            }
            Sexp::Symbol(sym) => self.emit(Instr::Get(sym.clone())),
            Sexp::Pair(_) => self.compile_list(expr)?,
            Sexp::Array(arr) => {
                let items = lock(arr).clone();
                self.compile_operands(&items)?;
                let array = self.symbol("array");
                self.emit(Instr::Call(array, items.len()));
            }
            other => self.emit(Instr::Push(other.clone())),
        }
        Ok(())
    }

    /// Compiles values left on the stack for a following call
    fn compile_operands(&mut self, exprs: &[Sexp]) -> ZyResult<()> {
        let saved = self.pending;
        for expr in exprs {
            self.compile(expr)?;
            self.pending += 1;
        }
        self.pending = saved;
        Ok(())
    }

    fn compile_list(&mut self, expr: &Sexp) -> ZyResult<()> {
        let items = expr
            .list_to_vec()
            .map_err(|_| compile_err(format!("cannot compile dotted list {}", expr)))?;
        let (head, args) = match items.split_first() {
            Some(split) => split,
            None => {
                self.emit(Instr::Push(Sexp::Null));
                return Ok(());
            }
        };

        let sym = match head {
            Sexp::Symbol(sym) if !sym.colon => sym,
            _ => {
                self.compile_operands(&items)?;
                self.emit(Instr::Dispatch(args.len()));
                return Ok(());
            }
        };

        match &*sym.name {
            "quote" => return self.compile_quote(args),
            "and" => return self.compile_short_circuit(args, false),
            "or" => return self.compile_short_circuit(args, true),
            "cond" => return self.compile_cond(args),
            "def" | ":=" => return self.compile_binding(args, &sym.name, false),
            "set" | "=" => return self.compile_binding(args, &sym.name, true),
            "if" => return self.compile_if(args),
            "begin" => return self.compile_body(args),
            "fn" => return self.compile_fn(args, false),
            "defn" => return self.compile_fn(args, true),
            "let" | "let*" => return self.compile_let(args),
            "while" => return self.compile_while(args),
            "for" => return self.compile_for(args),
            "break" => return self.compile_loop_exit(args, Instr::Break),
            "continue" => return self.compile_loop_exit(args, Instr::Continue),
            "syntax-quote" => return self.compile_syntax_quote(args),
            "infix" => return self.compile_infix(args),
            "defmac" => return self.compile_defmac(args),
            _ => {}
        }

        if let Some(mac) = self.env.macro_for(sym.id) {
            if self.depth >= MAX_MACRO_DEPTH {
                return Err(compile_err(format!("macro `{}` expands too deeply", sym.name)));
            }
            let expansion = self.env.expand_macro(&mac, args.to_vec())?;
            self.depth += 1;
            let res = self.compile(&expansion);
            self.depth -= 1;
            return res;
        }

        if self.env.is_builder(sym.id) {
            for arg in args {
                self.emit(Instr::Push(arg.clone()));
            }
        } else {
            self.compile_operands(args)?;
        }
        self.emit(Instr::Call(sym.clone(), args.len()));
        Ok(())
    }

    fn compile_quote(&mut self, args: &[Sexp]) -> ZyResult<()> {
        if args.is_empty() {
            return Err(compile_err("quote needs an argument"));
        }
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.emit(Instr::Pop);
            }
            self.emit(Instr::Push(arg.clone()));
        }
        Ok(())
    }

    /// Lays out `and`/`or` from the last operand back to the first
    ///
    /// Each operand's value is tested in place; once it settles the
    /// result, the branch skips the rest with that value on the stack.
    fn compile_short_circuit(&mut self, args: &[Sexp], is_or: bool) -> ZyResult<()> {
        let (last, init) = match args.split_last() {
            Some(split) => split,
            None => {
                self.emit(Instr::Push(Sexp::Bool(!is_or)));
                return Ok(());
            }
        };

        let mut acc = self.fragment(last)?;
        for arg in init.iter().rev() {
            let mut frag = self.fragment(arg)?;
            let end = frag.len() + 3 + acc.len();
            frag.push(Instr::Dup);
            frag.push(Instr::Branch(is_or, end));
            frag.push(Instr::Pop);
            splice(&mut frag, acc);
            acc = frag;
        }

        splice(&mut self.instrs, acc);
        Ok(())
    }

    /// `(cond p1 e1 p2 e2 ... default)`, built from the default back
    fn compile_cond(&mut self, args: &[Sexp]) -> ZyResult<()> {
        if args.len() % 2 == 0 {
            return Err(compile_err("cond: missing default case"));
        }

        let (default, clauses) = match args.split_last() {
            Some(split) => split,
            None => return Err(compile_err("cond: missing default case")),
        };

        let mut acc = self.fragment(default)?;
        for clause in clauses.chunks(2).rev() {
            let mut frag = self.fragment(&clause[0])?;
            let body = self.fragment(&clause[1])?;

            let next = frag.len() + 1 + body.len() + 1;
            let end = next + acc.len();
            frag.push(Instr::Branch(false, next));
            splice(&mut frag, body);
            frag.push(Instr::Jump(end));
            splice(&mut frag, acc);
            acc = frag;
        }

        splice(&mut self.instrs, acc);
        Ok(())
    }

    /// `def` binds in the innermost scope, `set` in the defining one;
    /// both leave the value on the stack
    fn compile_binding(&mut self, args: &[Sexp], form: &str, assign: bool) -> ZyResult<()> {
        let (sym, val) = match args {
            [Sexp::Symbol(sym), val] if !sym.colon => (sym, val),
            _ => return Err(compile_err(format!("{}: expected a symbol and a value", form))),
        };

        self.compile(val)?;
        self.emit(Instr::Dup);
        if assign {
            self.emit(Instr::Set(sym.clone()));
        } else {
            self.emit(Instr::Put(sym.clone()));
        }
        Ok(())
    }

    fn compile_if(&mut self, args: &[Sexp]) -> ZyResult<()> {
        if args.len() < 2 || args.len() > 3 {
            return Err(compile_err("if: expected a test, a consequent, and an optional alternative"));
        }

        self.compile(&args[0])?;
        let branch = self.here();
        self.emit(Instr::Branch(false, 0));

        self.compile(&args[1])?;
        let jump = self.here();
        self.emit(Instr::Jump(0));

        self.instrs[branch] = Instr::Branch(false, self.here());
        match args.get(2) {
            Some(alt) => self.compile(alt)?,
            None => self.emit(Instr::Push(Sexp::Null)),
        }
        self.instrs[jump] = Instr::Jump(self.here());
        Ok(())
    }

    /// Evaluates each expression in turn, keeping the last value
    fn compile_body(&mut self, body: &[Sexp]) -> ZyResult<()> {
        if body.is_empty() {
            self.emit(Instr::Push(Sexp::Null));
            return Ok(());
        }
        for (i, expr) in body.iter().enumerate() {
            if i > 0 {
                self.emit(Instr::Pop);
            }
            self.compile(expr)?;
        }
        Ok(())
    }

    /// Reads `[a b: int & rest]`
    fn compile_params(&self, params: &Sexp) -> ZyResult<(Vec<Param>, Option<SexpSymbol>)> {
        let items = match params {
            Sexp::Array(arr) => lock(arr).clone(),
            Sexp::Null | Sexp::Pair(_) => params.list_to_vec()?,
            other => return Err(compile_err(format!("expected a parameter list, got {}", other))),
        };

        let mut out = vec![];
        let mut varargs = None;
        let mut it = items.iter();
        while let Some(item) = it.next() {
            let sym = match item {
                Sexp::Symbol(sym) => sym,
                other => return Err(compile_err(format!("bad parameter {}", other))),
            };

            if &*sym.name == "&" {
                match (it.next(), it.next()) {
                    (Some(Sexp::Symbol(rest)), None) if !rest.colon => varargs = Some(rest.clone()),
                    _ => return Err(compile_err("`&` must be followed by exactly one name")),
                }
            } else if sym.colon {
                let ty = match it.next() {
                    Some(Sexp::Symbol(ty)) => SexpType::from_name(&ty.name)
                        .ok_or_else(|| compile_err(format!("unknown type `{}`", ty.name)))?,
                    _ => return Err(compile_err(format!("parameter `{}:` needs a type", sym.name))),
                };
                out.push(Param {
                    sym: sym.plain(),
                    ty: Some(ty),
                });
            } else {
                out.push(Param {
                    sym: sym.clone(),
                    ty: None,
                });
            }
        }
        Ok((out, varargs))
    }

    /// Compiles a function body on its own generator and emits the
    /// closure instruction for it
    fn compile_function(&mut self, name: &str, params: &Sexp, body: &[Sexp]) -> ZyResult<ZyFunction> {
        let (params, varargs) = self.compile_params(params)?;

        let mut sub = Generator::new(&mut *self.env);
        sub.depth = self.depth;
        sub.compile_body(body)?;
        sub.emit(Instr::Return);
        let code = sub.into_instructions();

        Ok(ZyFunction::compiled(name, params, varargs, code))
    }

    fn compile_fn(&mut self, args: &[Sexp], define: bool) -> ZyResult<()> {
        let (name, params, body) = match args {
            [Sexp::Symbol(name), params, body @ ..] => (Some(name), params, body),
            [params, body @ ..] if !define => (None, params, body),
            _ => {
                let form = if define { "defn" } else { "fn" };
                return Err(compile_err(format!("{}: expected a name and a parameter list", form)));
            }
        };

        let label = name.map(|n| n.name.to_string()).unwrap_or_else(|| "__anon".to_string());
        let proto = self.compile_function(&label, params, body)?;
        self.emit(Instr::Closure(Arc::new(proto)));

        if define {
            if let Some(name) = name {
                self.emit(Instr::Dup);
                self.emit(Instr::Put(name.clone()));
            }
        }
        Ok(())
    }

    fn compile_let(&mut self, args: &[Sexp]) -> ZyResult<()> {
        let (bindings, body) = match args.split_first() {
            Some((Sexp::Array(arr), body)) => (lock(arr).clone(), body),
            _ => return Err(compile_err("let: expected a binding array")),
        };
        if bindings.len() % 2 != 0 {
            return Err(compile_err("let: bindings must come in pairs"));
        }

        self.emit(Instr::AddScope);
        self.let_depth += 1;
        for pair in bindings.chunks(2) {
            let sym = match &pair[0] {
                Sexp::Symbol(sym) if !sym.colon => sym.clone(),
                other => return Err(compile_err(format!("let: cannot bind {}", other))),
            };
            self.compile(&pair[1])?;
            self.emit(Instr::Put(sym));
        }
        self.compile_body(body)?;
        self.let_depth -= 1;
        self.emit(Instr::RemoveScope);
        Ok(())
    }

    /// Replaces this loop's break and continue placeholders with jumps
    fn close_loop(&mut self, body_start: usize, cont: usize, exit: usize) {
        self.loops.pop();
        for instr in &mut self.instrs[body_start..] {
            match instr {
                Instr::Break => *instr = Instr::Jump(exit),
                Instr::Continue => *instr = Instr::Jump(cont),
                _ => {}
            }
        }
    }

    fn compile_loop_body(&mut self, body: &[Sexp]) -> ZyResult<()> {
        for expr in body {
            self.compile(expr)?;
            self.emit(Instr::Pop);
        }
        Ok(())
    }

    fn compile_while(&mut self, args: &[Sexp]) -> ZyResult<()> {
        let (test, body) = args
            .split_first()
            .ok_or_else(|| compile_err("while: expected a test"))?;

        let top = self.here();
        self.compile(test)?;
        let branch = self.here();
        self.emit(Instr::Branch(false, 0));

        self.loops.push(LoopFrame {
            let_depth: self.let_depth,
            pending: self.pending,
        });
        let body_start = self.here();
        self.compile_loop_body(body)?;
        self.emit(Instr::Jump(top));

        let exit = self.here();
        self.instrs[branch] = Instr::Branch(false, exit);
        self.close_loop(body_start, top, exit);
        self.emit(Instr::Push(Sexp::Null));
        Ok(())
    }

    /// `(for [init test step] body...)` in a scope of its own
    fn compile_for(&mut self, args: &[Sexp]) -> ZyResult<()> {
        let (header, body) = match args.split_first() {
            Some((Sexp::Array(arr), body)) => (lock(arr).clone(), body),
            _ => return Err(compile_err("for: expected [init test step]")),
        };
        let (init, test, step) = match header.as_slice() {
            [init, test, step] => (init, test, step),
            _ => return Err(compile_err("for: expected [init test step]")),
        };

        self.emit(Instr::AddScope);
        self.let_depth += 1;
        self.compile(init)?;
        self.emit(Instr::Pop);

        let top = self.here();
        self.compile(test)?;
        let branch = self.here();
        self.emit(Instr::Branch(false, 0));

        self.loops.push(LoopFrame {
            let_depth: self.let_depth,
            pending: self.pending,
        });
        let body_start = self.here();
        self.compile_loop_body(body)?;

        let cont = self.here();
        self.compile(step)?;
        self.emit(Instr::Pop);
        self.emit(Instr::Jump(top));

        let exit = self.here();
        self.instrs[branch] = Instr::Branch(false, exit);
        self.close_loop(body_start, cont, exit);

        self.let_depth -= 1;
        self.emit(Instr::RemoveScope);
        self.emit(Instr::Push(Sexp::Null));
        Ok(())
    }

    fn compile_loop_exit(&mut self, args: &[Sexp], exit: Instr) -> ZyResult<()> {
        if !args.is_empty() {
            return Err(compile_err(format!("{} takes no arguments", exit)));
        }
        let (frame_depth, frame_pending) = match self.loops.last() {
            Some(frame) => (frame.let_depth, frame.pending),
            None => return Err(compile_err(format!("{} outside of a loop", exit))),
        };

        for _ in frame_pending..self.pending {
            self.emit(Instr::Pop);
        }
        for _ in frame_depth..self.let_depth {
            self.emit(Instr::RemoveScope);
        }
        self.emit(exit);
        // unreachable, but keeps the stack shape of an expression
        self.emit(Instr::Push(Sexp::Null));
        Ok(())
    }

    fn compile_syntax_quote(&mut self, args: &[Sexp]) -> ZyResult<()> {
        match args {
            [template] => self.compile_template(template),
            _ => Err(compile_err("syntax-quote takes one template")),
        }
    }

    /// Builds a templated value at runtime from list and array
    /// segments joined by `concat`
    fn compile_template(&mut self, template: &Sexp) -> ZyResult<()> {
        match template {
            Sexp::Pair(_) => {
                let items = match template.list_to_vec() {
                    Ok(items) => items,
                    Err(_) => {
                        self.emit(Instr::Push(template.clone()));
                        return Ok(());
                    }
                };
                if let Some(inner) = self.unwrap_form(&items, "unquote") {
                    return self.compile(&inner);
                }

                let list = self.symbol("list");
                let saved = self.pending;
                for item in &items {
                    self.compile_segment(item, &list)?;
                    self.pending += 1;
                }
                self.pending = saved;
                let concat = self.symbol("concat");
                self.emit(Instr::Call(concat, items.len()));
            }
            Sexp::Array(arr) => {
                let items = lock(arr).clone();
                let array = self.symbol("array");
                self.emit(Instr::Call(array.clone(), 0));
                let saved = self.pending;
                for item in &items {
                    self.pending += 1;
                    self.compile_segment(item, &array)?;
                }
                self.pending = saved;
                let concat = self.symbol("concat");
                self.emit(Instr::Call(concat, items.len() + 1));
            }
            other => self.emit(Instr::Push(other.clone())),
        }
        Ok(())
    }

    fn compile_segment(&mut self, item: &Sexp, wrap: &SexpSymbol) -> ZyResult<()> {
        if let Ok(parts) = item.list_to_vec() {
            if let Some(spliced) = self.unwrap_form(&parts, "unquote-splicing") {
                return self.compile(&spliced);
            }
        }
        self.compile_template(item)?;
        self.emit(Instr::Call(wrap.clone(), 1));
        Ok(())
    }

    /// The argument of `(form x)`, if `items` has that shape
    fn unwrap_form(&self, items: &[Sexp], form: &str) -> Option<Sexp> {
        match items {
            [Sexp::Symbol(head), inner] if &*head.name == form => Some(inner.clone()),
            _ => None,
        }
    }

    fn compile_infix(&mut self, args: &[Sexp]) -> ZyResult<()> {
        let items = match args {
            [Sexp::Array(arr)] => lock(arr).clone(),
            _ => return Err(compile_err("infix expects a single array")),
        };
        if items.is_empty() {
            self.emit(Instr::Push(Sexp::Null));
            return Ok(());
        }

        let mut pos = 0;
        let prefix = infix_expr(&items, &mut pos, 0)?;
        if let Some(extra) = items.get(pos) {
            return Err(compile_err(format!("infix: unexpected {}", extra)));
        }
        self.compile(&prefix)
    }

    fn compile_defmac(&mut self, args: &[Sexp]) -> ZyResult<()> {
        let (name, params, body) = match args {
            [Sexp::Symbol(name), params, body @ ..] if !name.colon => (name, params, body),
            _ => return Err(compile_err("defmac: expected a name and a parameter list")),
        };

        let mac = self.compile_function(&name.name, params, body)?;
        self.env.register_macro(name.id, Arc::new(mac));
        self.emit(Instr::Push(Sexp::Null));
        Ok(())
    }
}

/// Binding power and associativity of an infix operator
fn infix_op(expr: &Sexp) -> Option<(u8, bool)> {
    let sym = expr.as_symbol()?;
    if sym.colon {
        return None;
    }
    Some(match &*sym.name {
        "=" | ":=" => (1, true),
        "or" => (2, false),
        "and" => (3, false),
        "==" | "!=" | "<" | "<=" | ">" | ">=" => (4, false),
        "+" | "-" => (5, false),
        "*" | "/" | "%" => (6, false),
        "**" => (7, true),
        _ => return None,
    })
}

/// Precedence climbing over a flat infix sequence
fn infix_expr(items: &[Sexp], pos: &mut usize, min_prec: u8) -> ZyResult<Sexp> {
    let mut lhs = items
        .get(*pos)
        .cloned()
        .ok_or_else(|| compile_err("infix: missing operand"))?;
    *pos += 1;

    while let Some(op) = items.get(*pos) {
        let (prec, right) = match infix_op(op) {
            Some(found) => found,
            None => break,
        };
        if prec < min_prec {
            break;
        }
        *pos += 1;

        let next_min = if right { prec } else { prec + 1 };
        let rhs = infix_expr(items, pos, next_min)?;
        lhs = Sexp::list(vec![op.clone(), lhs, rhs]);
    }
    Ok(lhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_str(env: &mut Environment, text: &str) -> ZyResult<Vec<Instr>> {
        let exprs = env.parse_string(text)?;
        let mut gen = Generator::new(env);
        gen.generate(&exprs)?;
        Ok(gen.into_instructions())
    }

    fn listing(instrs: &[Instr]) -> Vec<String> {
        instrs.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn and_layout() {
        let mut env = Environment::new();
        let code = compile_str(&mut env, "(and a b c)").unwrap();
        assert_eq!(
            listing(&code),
            vec![
                "get a",
                "dup",
                "branch false 9",
                "pop",
                "get b",
                "dup",
                "branch false 9",
                "pop",
                "get c",
            ]
        );
        env.stop();
    }

    #[test]
    fn or_and_empty() {
        let mut env = Environment::new();
        let code = compile_str(&mut env, "(or a b)").unwrap();
        assert_eq!(listing(&code), vec!["get a", "dup", "branch true 5", "pop", "get b"]);

        let code = compile_str(&mut env, "(and) (or)").unwrap();
        assert_eq!(listing(&code), vec!["push true", "pop", "push false"]);
        env.stop();
    }

    #[test]
    fn cond_layout() {
        let mut env = Environment::new();
        let code = compile_str(&mut env, "(cond p1 1 p2 2 3)").unwrap();
        assert_eq!(
            listing(&code),
            vec![
                "get p1",
                "branch false 4",
                "push 1",
                "jump 9",
                "get p2",
                "branch false 8",
                "push 2",
                "jump 9",
                "push 3",
            ]
        );
        env.stop();
    }

    #[test]
    fn cond_needs_default() {
        let mut env = Environment::new();
        let err = compile_str(&mut env, "(cond (== 1 2) \"a\")").unwrap_err();
        assert!(matches!(err, ZyErr::Compile(msg) if msg.contains("missing default case")));
        env.stop();
    }

    #[test]
    fn malformed_forms() {
        let mut env = Environment::new();
        for text in ["(def 1 2)", "(if)", "(break)", "(let [a] a)", "(fn 3)", "(quote)"] {
            assert!(
                matches!(compile_str(&mut env, text), Err(ZyErr::Compile(_))),
                "{} should not compile",
                text
            );
        }
        env.stop();
    }

    #[test]
    fn calls_and_dispatch() {
        let mut env = Environment::new();
        let code = compile_str(&mut env, "(f 1 x) ((g) 2)").unwrap();
        assert_eq!(
            listing(&code),
            vec!["push 1", "get x", "call f 2", "pop", "call g 0", "push 2", "dispatch 1"]
        );
        env.stop();
    }

    #[test]
    fn break_closes_let_scopes() {
        let mut env = Environment::new();
        let code = compile_str(&mut env, "(while true (let [a 1] (break)))").unwrap();
        let text = listing(&code);
        let exit = code.len() - 1;
        let brk = text.iter().position(|s| s.starts_with("jump") && s != "jump 0").unwrap();
        assert_eq!(text[brk - 1], "remove-scope");
        assert_eq!(text[brk], format!("jump {}", exit));
    }

    #[test]
    fn closures_show_in_debug_output() {
        let mut env = Environment::new();
        let code = compile_str(&mut env, "(fn named [] 1)").unwrap();
        let text = format!("{:?}", code);
        assert!(text.contains("Closure(<fn named>)"), "{}", text);
        env.stop();
    }

    #[test]
    fn loop_exits_drop_pending_operands() {
        let mut env = Environment::new();
        let code = compile_str(&mut env, "(while true (f 1 [2 (break)]))").unwrap();
        let text = listing(&code);
        let brk = text.iter().position(|s| s.starts_with("jump") && s != "jump 0").unwrap();
        assert_eq!(text[brk - 2..brk], ["pop", "pop"]);
        assert_eq!(text[brk - 3], "push 2");
        env.stop();
    }

    #[test]
    fn infix_precedence() {
        let stab = crate::zy::symtab::SymbolTable::shared(16);
        let sym = |n: &str| Sexp::Symbol(SexpSymbol::intern(&stab, n));
        let items = vec![
            sym("a"),
            sym("="),
            Sexp::Int(1),
            sym("+"),
            Sexp::Int(2),
            sym("*"),
            Sexp::Int(3),
            sym("**"),
            Sexp::Int(2),
            sym("**"),
            Sexp::Int(1),
        ];
        let mut pos = 0;
        let out = infix_expr(&items, &mut pos, 0).unwrap();
        assert_eq!(pos, items.len());
        assert_eq!(out.to_string(), "(= a (+ 1 (* 2 (** 3 (** 2 1)))))");
    }
}
