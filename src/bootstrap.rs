//! The core environment: the special forms and primitive functions every
//! program starts with.

use crate::error::{LispError, LispResult};
use crate::eval::{BuiltinFn, Machine, SpecialFn, Step};
use crate::heap::Heap;
use crate::stream::{CharSink, StreamTable};
use crate::symbol::sym;
use crate::value::Value;

const SPECIALS: [(&str, SpecialFn); 6] = [
    ("quote", form_quote),
    ("if", form_if),
    ("def", form_def),
    ("lambda", form_lambda),
    ("syntax", form_syntax),
    ("backquote", form_backquote),
];

const BUILTINS: [(&str, BuiltinFn); 8] = [
    ("eq", prim_eq),
    ("equal", prim_equal),
    ("cons", prim_cons),
    ("car", prim_car),
    ("cdr", prim_cdr),
    ("println", prim_println),
    ("gensym", prim_gensym),
    ("load-file", prim_load_file),
];

impl Machine {
    /// Build a fresh root environment holding `t` and the core operators.
    pub fn make_core_env(&mut self) -> LispResult<Value> {
        let env = self.make_env(Value::Nil)?;
        let t = Value::Symbol(sym::T);
        self.env_define(env, t, t)?;

        for (name, fun) in SPECIALS {
            let var = self.intern(name)?;
            let val = self.make_special(name, fun)?;
            self.env_define(env, var, val)?;
        }
        for (name, fun) in BUILTINS {
            let var = self.intern(name)?;
            let val = self.make_builtin(name, fun)?;
            self.env_define(env, var, val)?;
        }
        Ok(env)
    }
}

/// Structural equality: pairs compare by contents, everything else by
/// identity.
pub fn equal(heap: &Heap, a: Value, b: Value) -> bool {
    let mut pending = vec![(a, b)];
    while let Some((a, b)) = pending.pop() {
        if a == b {
            continue;
        }
        match (a, b) {
            (Value::Pair(x), Value::Pair(y)) => {
                pending.push((heap.cdr(x), heap.cdr(y)));
                pending.push((heap.car(x), heap.car(y)));
            }
            _ => return false,
        }
    }
    true
}

// ============================================================================
// Argument checking
// ============================================================================

fn arity_error(m: &Machine, name: &str, args: Value, problem: &'static str) -> LispError {
    let call = match args {
        Value::Nil => format!("({})", name),
        _ => format!("({} {}", name, &m.render(args)[1..]),
    };
    LispError::Arity { problem, call }
}

/// Unpack an evaluated argument list of exactly `N` values.
fn expect_args<const N: usize>(m: &Machine, name: &str, args: Value) -> LispResult<[Value; N]> {
    let vals = m.heap.list_to_vec(args).unwrap_or_default();
    match vals.len() {
        n if n < N => Err(arity_error(m, name, args, "not enough")),
        n if n > N => Err(arity_error(m, name, args, "too many")),
        _ => <[Value; N]>::try_from(vals).map_err(|_| arity_error(m, name, args, "wrong number of")),
    }
}

/// At least two arguments, as `eq` and `equal` require.
fn expect_two_or_more(m: &Machine, name: &str, args: Value) -> LispResult<Vec<Value>> {
    let vals = m.heap.list_to_vec(args).unwrap_or_default();
    if vals.len() < 2 {
        return Err(arity_error(m, name, args, "not enough"));
    }
    Ok(vals)
}

// ============================================================================
// Special forms
// ============================================================================

/// (quote x) -> x, unevaluated.
fn form_quote(m: &mut Machine, args: Value, _env: Value) -> LispResult<Step> {
    Ok(Step::Done(m.heap.car_val(args)?))
}

/// (if test then [else])
fn form_if(m: &mut Machine, args: Value, env: Value) -> LispResult<Step> {
    let test = m.heap.car_val(args)?;
    if !m.eval(test, env)?.is_nil() {
        return Ok(Step::Eval(m.cadr(args)?, env));
    }
    let rest = m.heap.cdr_val(m.heap.cdr_val(args)?)?;
    if rest.is_nil() {
        Ok(Step::Done(Value::Nil))
    } else {
        Ok(Step::Eval(m.heap.car_val(rest)?, env))
    }
}

/// (def name expr): bind name in the current frame. Yields nil.
fn form_def(m: &mut Machine, args: Value, env: Value) -> LispResult<Step> {
    let name = m.heap.car_val(args)?;
    if !name.is_symbol() {
        return Err(LispError::Type(format!("cannot define {}", m.render(name))));
    }
    let val = m.eval(m.cadr(args)?, env)?;
    m.env_define(env, name, val)?;
    Ok(Step::Done(Value::Nil))
}

/// (lambda params . body) -> (lit clo env params . body)
fn form_lambda(m: &mut Machine, args: Value, env: Value) -> LispResult<Step> {
    let params = m.heap.car_val(args)?;
    let body = m.heap.cdr_val(args)?;
    Ok(Step::Done(m.make_closure(sym::CLO, env, params, body)?))
}

/// (syntax params . body) -> (lit mac env params . body)
fn form_syntax(m: &mut Machine, args: Value, env: Value) -> LispResult<Step> {
    let params = m.heap.car_val(args)?;
    let body = m.heap.cdr_val(args)?;
    Ok(Step::Done(m.make_closure(sym::MAC, env, params, body)?))
}

fn form_backquote(m: &mut Machine, args: Value, env: Value) -> LispResult<Step> {
    let template = m.heap.car_val(args)?;
    Ok(Step::Done(backquote(m, template, env)?))
}

// ============================================================================
// Backquote expansion
// ============================================================================

/// One element of a backquoted list after expansion.
enum Piece {
    Item(Value),
    Splice(Value),
}

/// Expand a template, evaluating its unquoted parts. The template itself is
/// never modified.
fn backquote(m: &mut Machine, template: Value, env: Value) -> LispResult<Value> {
    if !template.is_pair() {
        return Ok(template);
    }
    if m.caris(template, sym::UNQUOTE) {
        return m.eval(m.cadr(template)?, env);
    }
    backquote_list(m, template, env)
}

fn backquote_list(m: &mut Machine, seq: Value, env: Value) -> LispResult<Value> {
    let mut pieces = Vec::new();
    let mut current = seq;
    let mut tail = Value::Nil;
    loop {
        match current {
            Value::Nil => break,
            // `(a . ,b) reads as (a unquote b): the tail is itself an unquote.
            Value::Pair(_) if current != seq && m.caris(current, sym::UNQUOTE) => {
                tail = m.eval(m.cadr(current)?, env)?;
                break;
            }
            Value::Pair(id) => {
                let item = m.heap.car(id);
                if m.caris(item, sym::UNQUOTE_SPLICING) {
                    pieces.push(Piece::Splice(m.eval(m.cadr(item)?, env)?));
                } else {
                    pieces.push(Piece::Item(backquote(m, item, env)?));
                }
                current = m.heap.cdr(id);
            }
            atom => {
                tail = atom;
                break;
            }
        }
    }

    let mut result = tail;
    for piece in pieces.into_iter().rev() {
        result = match piece {
            Piece::Item(val) => m.heap.cons(val, result)?,
            Piece::Splice(list) => m.heap.append(list, result)?,
        };
    }
    Ok(result)
}

// ============================================================================
// Primitive functions
// ============================================================================

/// (eq a b ...) -> t if all arguments are the same object.
fn prim_eq(m: &mut Machine, args: Value, _env: Value) -> LispResult<Value> {
    let vals = expect_two_or_more(m, "eq", args)?;
    let same = vals.windows(2).all(|w| w[0] == w[1]);
    Ok(if same { Value::Symbol(sym::T) } else { Value::Nil })
}

/// (equal a b ...) -> t if all arguments are structurally equal.
fn prim_equal(m: &mut Machine, args: Value, _env: Value) -> LispResult<Value> {
    let vals = expect_two_or_more(m, "equal", args)?;
    let same = vals.windows(2).all(|w| equal(&m.heap, w[0], w[1]));
    Ok(if same { Value::Symbol(sym::T) } else { Value::Nil })
}

fn prim_cons(m: &mut Machine, args: Value, _env: Value) -> LispResult<Value> {
    let [a, b] = expect_args::<2>(m, "cons", args)?;
    m.heap.cons(a, b)
}

fn prim_car(m: &mut Machine, args: Value, _env: Value) -> LispResult<Value> {
    let [x] = expect_args::<1>(m, "car", args)?;
    m.heap.car_val(x)
}

fn prim_cdr(m: &mut Machine, args: Value, _env: Value) -> LispResult<Value> {
    let [x] = expect_args::<1>(m, "cdr", args)?;
    m.heap.cdr_val(x)
}

/// Print the arguments separated by spaces, then a newline.
fn prim_println(m: &mut Machine, args: Value, _env: Value) -> LispResult<Value> {
    let vals = m.heap.list_to_vec(args).unwrap_or_default();
    let mut line = vals
        .iter()
        .map(|&v| m.render(v))
        .collect::<Vec<_>>()
        .join(" ");
    line.push('\n');
    m.streams.get_mut(StreamTable::STDOUT)?.write_str(&line)?;
    Ok(Value::Nil)
}

fn prim_gensym(m: &mut Machine, args: Value, _env: Value) -> LispResult<Value> {
    expect_args::<0>(m, "gensym", args)?;
    m.make_gensym()
}

/// (load-file "path"): evaluate every form of the file in the calling
/// environment.
fn prim_load_file(m: &mut Machine, args: Value, env: Value) -> LispResult<Value> {
    let [path] = expect_args::<1>(m, "load-file", args)?;
    let path = match path {
        Value::Str(id) => m.strings.to_string_lossy(id),
        other => {
            return Err(LispError::Type(format!(
                "load-file expects a string, got {}",
                m.render(other)
            )))
        }
    };
    m.load_file(&path, env)?;
    Ok(Value::Nil)
}
