// ZYLISP, an embeddable Lisp runtime.
// Copyright (C) 2024 Matthew Rothlisberger

// ZYLISP is licensed under the terms of the GNU Affero General Public
// License, version 3 only.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/zy/eval.rs

// Instruction set and iterative evaluator. The evaluator runs one
// instruction at a time against the data, scope, and call-address
// stacks; calls never recurse on the host stack.

// <>

use std::backtrace::Backtrace;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::env::Environment;
use super::scope::{Closing, Scope};
use super::sexp::{CompiledFn, FnBody, NativeBody, Sexp, SexpSymbol, ZyFunction};
use super::{ZyErr, ZyResult};

/// One VM instruction; jump targets are absolute offsets into the
/// owning function's instruction sequence
#[derive(Clone, Debug)]
pub enum Instr {
    Push(Sexp),
    Pop,
    Dup,
    /// resolve lexically and push
    Get(SexpSymbol),
    /// pop and bind in the innermost scope
    Put(SexpSymbol),
    /// pop and assign in the scope that defines the symbol
    Set(SexpSymbol),
    /// call the function bound to a name
    Call(SexpSymbol, usize),
    /// call a function value pushed beneath its arguments
    Dispatch(usize),
    Jump(usize),
    /// pop; jump when truthiness equals the direction
    Branch(bool, usize),
    Return,
    /// instantiate a closure over the current scopes
    Closure(Arc<ZyFunction>),
    AddScope,
    RemoveScope,
    /// loop exits, resolved to jumps once the loop is compiled
    Break,
    Continue,
}

impl Instr {
    /// Shifts jump targets when a fragment is placed at `base`
    pub fn relocated(self, base: usize) -> Instr {
        match self {
            Instr::Jump(t) => Instr::Jump(t + base),
            Instr::Branch(dir, t) => Instr::Branch(dir, t + base),
            other => other,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Push(v) => write!(f, "push {}", v),
            Instr::Pop => write!(f, "pop"),
            Instr::Dup => write!(f, "dup"),
            Instr::Get(sym) => write!(f, "get {}", sym.name),
            Instr::Put(sym) => write!(f, "put {}", sym.name),
            Instr::Set(sym) => write!(f, "set {}", sym.name),
            Instr::Call(sym, n) => write!(f, "call {} {}", sym.name, n),
            Instr::Dispatch(n) => write!(f, "dispatch {}", n),
            Instr::Jump(t) => write!(f, "jump {}", t),
            Instr::Branch(dir, t) => write!(f, "branch {} {}", dir, t),
            Instr::Return => write!(f, "return"),
            Instr::Closure(func) => write!(f, "closure {}", func.name),
            Instr::AddScope => write!(f, "add-scope"),
            Instr::RemoveScope => write!(f, "remove-scope"),
            Instr::Break => write!(f, "break"),
            Instr::Continue => write!(f, "continue"),
        }
    }
}

/// Return address saved by a call
#[derive(Clone)]
pub struct CallFrame {
    pub func: Arc<ZyFunction>,
    pub pc: isize,
    /// scope stack height before the callee's boundary scope
    pub scope_depth: usize,
    pub callee: String,
}

impl Environment {
    /// Executes the loaded program and returns the value left on top
    /// of the data stack, or nil when nothing is left
    pub fn run(&mut self) -> ZyResult<Sexp> {
        self.drive()?;
        Ok(self.datastack.pop().unwrap_or(Sexp::Null))
    }

    fn drive(&mut self) -> ZyResult<()> {
        loop {
            match self.iter_once() {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(ZyErr::StackUnderflow) if self.addrstack.size() <= self.base_depth => {
                    log::debug!("stack underflow at top level; stopping");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Executes the instruction at the current pc
    ///
    /// Returns false once the current frame is terminal: pc -1 for a
    /// pending return, pc at the end of the code for completion.
    pub(crate) fn iter_once(&mut self) -> ZyResult<bool> {
        let func = Arc::clone(&self.curfunc);
        let code = func.code();
        if self.pc < 0 || self.pc as usize >= code.len() {
            return Ok(false);
        }
        let instr = &code[self.pc as usize];

        if cfg!(feature = "stkdbg") {
            println!(
                "EXEC: {} [{}] {}; stack: {}",
                func.name,
                self.pc,
                instr,
                self.datastack.size()
            );
        }
        if self.config.trace_instructions {
            log::trace!("{} [{}] {}", func.name, self.pc, instr);
        }

        self.execute(instr)?;
        Ok(true)
    }

    fn execute(&mut self, instr: &Instr) -> ZyResult<()> {
        match instr {
            Instr::Push(v) => {
                self.datastack.push(v.clone());
                self.pc += 1;
            }
            Instr::Pop => {
                let _ = self.datastack.pop();
                self.pc += 1;
            }
            Instr::Dup => {
                let top = self.datastack.top().cloned().ok_or(ZyErr::StackUnderflow)?;
                self.datastack.push(top);
                self.pc += 1;
            }
            Instr::Get(sym) => {
                let val = self.lexical_lookup(sym)?;
                self.datastack.push(val);
                self.pc += 1;
            }
            Instr::Put(sym) => {
                let val = self.datastack.pop()?;
                self.bind_symbol(sym, val)?;
                self.pc += 1;
            }
            Instr::Set(sym) => {
                let val = self.datastack.pop()?;
                self.update_symbol(sym, val)?;
                self.pc += 1;
            }
            Instr::Call(sym, n) => {
                let func = match self.lexical_lookup(sym)? {
                    Sexp::Function(func) => func,
                    other => {
                        return Err(ZyErr::Type(format!(
                            "`{}` is {}, not a function",
                            sym.name,
                            other.type_of()
                        )))
                    }
                };
                let args = self.datastack.pop_n(*n)?;
                self.call_function(func, args)?;
            }
            Instr::Dispatch(n) => {
                let args = self.datastack.pop_n(*n)?;
                let func = match self.datastack.pop()? {
                    Sexp::Function(func) => func,
                    other => {
                        return Err(ZyErr::Type(format!(
                            "cannot call {} {}",
                            other.type_of(),
                            other
                        )))
                    }
                };
                self.call_function(func, args)?;
            }
            Instr::Jump(target) => self.pc = *target as isize,
            Instr::Branch(dir, target) => {
                let cond = self.datastack.pop()?;
                if cond.is_truthy() == *dir {
                    self.pc = *target as isize;
                } else {
                    self.pc += 1;
                }
            }
            Instr::Return => self.return_from_call()?,
            Instr::Closure(proto) => {
                let closing = Closing::capture(&self.scopestack, &self.global);
                let inst = proto.close_over(closing, Some(Arc::clone(&self.curfunc)));
                self.datastack.push(Sexp::Function(Arc::new(inst)));
                self.pc += 1;
            }
            Instr::AddScope => {
                self.scopestack.push(Scope::new("let").into_ref());
                self.pc += 1;
            }
            Instr::RemoveScope => {
                if self.scopestack.size() <= 1 {
                    return Err(ZyErr::Runtime("scope stack exhausted".into()));
                }
                self.scopestack.pop()?;
                self.pc += 1;
            }
            Instr::Break | Instr::Continue => {
                return Err(ZyErr::Compile(format!("{} outside of a loop", instr)))
            }
        }
        Ok(())
    }

    fn call_function(&mut self, func: Arc<ZyFunction>, args: Vec<Sexp>) -> ZyResult<()> {
        let config = Arc::clone(&self.config);
        for hook in &config.pre_hooks {
            hook(&func.name, &args);
        }

        match &func.body {
            FnBody::Native(native) => {
                native.arity.check(&func.name, args.len())?;
                let out = self.call_native(&func, native, &args)?;
                for hook in &config.post_hooks {
                    hook(&func.name, &out);
                }
                self.datastack.push(out);
                self.pc += 1;
            }
            FnBody::Compiled(compiled) => {
                if self.addrstack.size() >= config.max_call_depth {
                    return Err(ZyErr::Runtime(format!(
                        "call depth exceeded {} calling `{}`",
                        config.max_call_depth, func.name
                    )));
                }

                let bindings = bind_arguments(&func, compiled, args)?;
                let mut scope = Scope::new_function(&func);
                for (sym, val) in &bindings {
                    scope.bind(sym, val.clone())?;
                }

                self.addrstack.push(CallFrame {
                    func: Arc::clone(&self.curfunc),
                    pc: self.pc + 1,
                    scope_depth: self.scopestack.size(),
                    callee: func.name.clone(),
                });
                self.scopestack.push(scope.into_ref());
                self.curfunc = func;
                self.pc = 0;
            }
        }
        Ok(())
    }

    /// Runs a host callback, turning a panic into a runtime error
    fn call_native(&mut self, func: &ZyFunction, native: &NativeBody, args: &[Sexp]) -> ZyResult<Sexp> {
        let callback = Arc::clone(&native.callback);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(self, &func.name, args)));
        match outcome {
            Ok(res) => res,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| String::from("unknown panic"));
                log::warn!("native `{}` panicked: {}", func.name, msg);
                let trace = format!("{}\n{}", self.stack_trace(), Backtrace::force_capture());
                Err(ZyErr::Panic {
                    name: func.name.clone(),
                    msg,
                    trace,
                })
            }
        }
    }

    fn return_from_call(&mut self) -> ZyResult<()> {
        if self.addrstack.size() <= self.base_depth {
            self.pc = -1;
            return Ok(());
        }

        let frame = self.addrstack.pop()?;
        let config = Arc::clone(&self.config);
        if !config.post_hooks.is_empty() {
            let ret = self.datastack.top().cloned().unwrap_or(Sexp::Null);
            for hook in &config.post_hooks {
                hook(&frame.callee, &ret);
            }
        }

        self.scopestack.truncate(frame.scope_depth);
        self.curfunc = frame.func;
        self.pc = frame.pc;
        Ok(())
    }

    /// Calls any function value with already evaluated arguments
    ///
    /// Compiled functions run to completion on this environment's
    /// stacks before this returns.
    pub fn apply(&mut self, f: &Sexp, args: Vec<Sexp>) -> ZyResult<Sexp> {
        let func = match f {
            Sexp::Function(func) => Arc::clone(func),
            other => return Err(ZyErr::Type(format!("cannot apply {}", other.type_of()))),
        };

        if let FnBody::Native(native) = &func.body {
            native.arity.check(&func.name, args.len())?;
            let config = Arc::clone(&self.config);
            for hook in &config.pre_hooks {
                hook(&func.name, &args);
            }
            let out = self.call_native(&func, native, &args)?;
            for hook in &config.post_hooks {
                hook(&func.name, &out);
            }
            return Ok(out);
        }

        self.check_reentry()?;
        let n = args.len();
        let mut code = Vec::with_capacity(n + 2);
        code.push(Instr::Push(f.clone()));
        code.extend(args.into_iter().map(Instr::Push));
        code.push(Instr::Dispatch(n));
        let stub = Arc::new(ZyFunction::compiled("__apply", vec![], None, code));

        let saved_func = mem::replace(&mut self.curfunc, stub);
        let saved_pc = mem::replace(&mut self.pc, 0);
        let saved_base = mem::replace(&mut self.base_depth, self.addrstack.size());
        self.reentry += 1;

        let outcome = self.drive();

        self.reentry -= 1;
        self.curfunc = saved_func;
        self.pc = saved_pc;
        self.base_depth = saved_base;

        outcome?;
        self.datastack.pop()
    }
}

/// Matches call arguments to parameters, honoring `name: value`
/// keyword arguments and declared parameter types
fn bind_arguments(
    func: &ZyFunction,
    compiled: &CompiledFn,
    args: Vec<Sexp>,
) -> ZyResult<Vec<(SexpSymbol, Sexp)>> {
    let name = &func.name;
    let params = &compiled.params;
    let keyword = |a: &Sexp| match a {
        Sexp::Symbol(s) if s.colon => Some(s.id),
        _ => None,
    };

    let named = args
        .iter()
        .filter_map(keyword)
        .any(|id| params.iter().any(|p| p.sym.id == id));

    let mut slots: Vec<Option<Sexp>> = vec![None; params.len()];
    let mut extra = Vec::new();

    let mut it = args.into_iter();
    if named {
        while let Some(arg) = it.next() {
            match keyword(&arg) {
                Some(id) => {
                    let idx = params.iter().position(|p| p.sym.id == id).ok_or_else(|| {
                        ZyErr::Runtime(format!("`{}` has no parameter named `{}`", name, arg))
                    })?;
                    let val = it.next().ok_or_else(|| {
                        ZyErr::Runtime(format!("`{}`: keyword `{}` has no value", name, arg))
                    })?;
                    if slots[idx].is_some() {
                        return Err(ZyErr::Runtime(format!(
                            "`{}`: parameter `{}` given twice",
                            name, params[idx].sym.name
                        )));
                    }
                    slots[idx] = Some(val);
                }
                None => match slots.iter().position(Option::is_none) {
                    Some(free) => slots[free] = Some(arg),
                    None => extra.push(arg),
                },
            }
        }
    } else {
        for slot in slots.iter_mut() {
            *slot = it.next();
        }
        extra.extend(it);
    }

    let got = slots.iter().filter(|s| s.is_some()).count() + extra.len();
    if !extra.is_empty() && compiled.varargs.is_none() {
        func.arity().check(name, got)?;
    }
    if let Some(missing) = slots.iter().position(Option::is_none) {
        if !named {
            func.arity().check(name, got)?;
        }
        return Err(ZyErr::Runtime(format!(
            "`{}`: missing argument for parameter `{}`",
            name, params[missing].sym.name
        )));
    }

    let mut out = Vec::with_capacity(params.len() + 1);
    for (param, val) in params.iter().zip(slots.into_iter().flatten()) {
        if let Some(ty) = &param.ty {
            let got_ty = val.type_of();
            if !got_ty.assignable_to(ty) {
                return Err(ZyErr::Type(format!(
                    "`{}`: parameter `{}` expects {}, got {}",
                    name, param.sym.name, ty, got_ty
                )));
            }
        }
        out.push((param.sym.clone(), val));
    }
    if let Some(rest) = &compiled.varargs {
        out.push((rest.clone(), Sexp::list(extra)));
    }
    Ok(out)
}
