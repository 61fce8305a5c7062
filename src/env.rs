//! Lexical environments.
//!
//! A frame is the cons structure `((vars . vals) . outer)`: `vars` and
//! `vals` are parallel lists, newest binding first, and `outer` is the
//! enclosing frame or nil at the root.

use crate::error::{LispError, LispResult};
use crate::eval::Machine;
use crate::heap::Heap;
use crate::symbol::sym;
use crate::value::{PairId, Value};

/// The `(vars . vals)` header cell of a frame.
fn frame_header(heap: &Heap, env: Value) -> LispResult<PairId> {
    env.as_pair()
        .and_then(|id| heap.car(id).as_pair())
        .ok_or_else(|| LispError::Type("not an environment".into()))
}

/// Find the `vals` cell holding the local binding of `var`, if any.
fn find_local(heap: &Heap, env: Value, var: Value) -> LispResult<Option<PairId>> {
    let header = frame_header(heap, env)?;
    let mut vars = heap.car(header);
    let mut vals = heap.cdr(header);
    while let (Value::Pair(var_cell), Value::Pair(val_cell)) = (vars, vals) {
        if heap.car(var_cell) == var {
            return Ok(Some(val_cell));
        }
        vars = heap.cdr(var_cell);
        vals = heap.cdr(val_cell);
    }
    Ok(None)
}

/// Find the binding of `var` in `env` or any frame it is chained to.
fn find_global(heap: &Heap, mut env: Value, var: Value) -> LispResult<Option<PairId>> {
    while let Value::Pair(id) = env {
        if let Some(cell) = find_local(heap, env, var)? {
            return Ok(Some(cell));
        }
        env = heap.cdr(id);
    }
    Ok(None)
}

impl Machine {
    /// Create an empty frame chained to `outer` (nil for a root frame).
    pub fn make_env(&mut self, outer: Value) -> LispResult<Value> {
        let header = self.heap.cons(Value::Nil, Value::Nil)?;
        self.heap.cons(header, outer)
    }

    /// Bind `var` in the innermost frame of `env`, replacing a local binding
    /// in place if there is one.
    pub fn env_define(&mut self, env: Value, var: Value, val: Value) -> LispResult<()> {
        if var == Value::Symbol(sym::ENV) {
            log::warn!("defining *env* has no effect on lookup, it always names the current environment");
        }
        if let Some(cell) = find_local(&self.heap, env, var)? {
            self.heap.set_car(cell, val);
            return Ok(());
        }
        let header = frame_header(&self.heap, env)?;
        let vars = self.heap.cons(var, self.heap.car(header))?;
        let vals = self.heap.cons(val, self.heap.cdr(header))?;
        self.heap.set_car(header, vars);
        self.heap.set_cdr(header, vals);
        Ok(())
    }

    /// Value bound to `var`, searching outward through the chain.
    pub fn env_lookup(&self, env: Value, var: Value) -> LispResult<Value> {
        match find_global(&self.heap, env, var)? {
            Some(cell) => Ok(self.heap.car(cell)),
            None => Err(LispError::Unbound(self.render(var))),
        }
    }

    /// Overwrite the nearest existing binding of `var`.
    pub fn env_assign(&mut self, env: Value, var: Value, val: Value) -> LispResult<()> {
        match find_global(&self.heap, env, var)? {
            Some(cell) => {
                self.heap.set_car(cell, val);
                Ok(())
            }
            None => Err(LispError::Unbound(self.render(var))),
        }
    }

    /// Whether `var` is bound anywhere in the chain.
    pub fn env_can_assign(&self, env: Value, var: Value) -> LispResult<bool> {
        Ok(find_global(&self.heap, env, var)?.is_some())
    }

    /// Remove the first local binding of `var`. Outer frames are not searched.
    pub fn env_delete(&mut self, env: Value, var: Value) -> LispResult<()> {
        let header = frame_header(&self.heap, env)?;
        let heap = &mut self.heap;

        let mut prev: Option<(PairId, PairId)> = None;
        let mut vars = heap.car(header);
        let mut vals = heap.cdr(header);
        while let (Value::Pair(var_cell), Value::Pair(val_cell)) = (vars, vals) {
            if heap.car(var_cell) == var {
                let (rest_vars, rest_vals) = (heap.cdr(var_cell), heap.cdr(val_cell));
                match prev {
                    Some((prev_var, prev_val)) => {
                        heap.set_cdr(prev_var, rest_vars);
                        heap.set_cdr(prev_val, rest_vals);
                    }
                    None => {
                        heap.set_car(header, rest_vars);
                        heap.set_cdr(header, rest_vals);
                    }
                }
                return Ok(());
            }
            prev = Some((var_cell, val_cell));
            vars = heap.cdr(var_cell);
            vals = heap.cdr(val_cell);
        }
        Err(LispError::Unbound(self.render(var)))
    }

    /// Match a parameter pattern against an argument value, binding every
    /// symbol in the pattern into the innermost frame of `env`.
    ///
    /// A symbol binds the whole value, a list binds element-wise, and a
    /// symbol in tail position of a dotted pattern binds the remaining
    /// arguments.
    pub fn destructure_bind(&mut self, env: Value, pattern: Value, args: Value) -> LispResult<()> {
        match pattern {
            Value::Nil => {
                if args.is_nil() {
                    Ok(())
                } else {
                    Err(LispError::Bind(format!(
                        "too many arguments, no parameter for {}",
                        self.render(args)
                    )))
                }
            }
            Value::Symbol(_) => self.env_define(env, pattern, args),
            Value::Pair(_) => {
                let mut pattern = pattern;
                let mut args = args;
                while let Value::Pair(pat_id) = pattern {
                    let arg_id = match args {
                        Value::Pair(id) => id,
                        _ => {
                            return Err(LispError::Bind(format!(
                                "too few arguments for {}",
                                self.render(pattern)
                            )))
                        }
                    };
                    self.destructure_bind(env, self.heap.car(pat_id), self.heap.car(arg_id))?;
                    pattern = self.heap.cdr(pat_id);
                    args = self.heap.cdr(arg_id);
                }
                self.destructure_bind(env, pattern, args)
            }
            other => Err(LispError::Bind(format!(
                "{} is not a parameter",
                self.render(other)
            ))),
        }
    }
}
