use crate::config::MachineConfig;
use crate::error::{LispError, LispResult};
use crate::heap::Heap;
use crate::printer;
use crate::reader::Reader;
use crate::registry::Registry;
use crate::stream::{CharSource, StrSource, StreamTable};
use crate::strings::StringPool;
use crate::symbol::{sym, GensymCounter, SymbolTable};
use crate::value::{BuiltinId, SpecialId, StreamId, SymbolId, Value};

/// Remaining stack below which `eval` switches to a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each extra stack segment.
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// A primitive function. Receives its arguments already evaluated, plus the
/// calling environment.
pub type BuiltinFn = fn(&mut Machine, Value, Value) -> LispResult<Value>;

/// A special form. Receives its arguments unevaluated, plus the calling
/// environment, and decides what to evaluate.
pub type SpecialFn = fn(&mut Machine, Value, Value) -> LispResult<Step>;

/// What a special form or application hands back to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Finished with this value.
    Done(Value),
    /// Continue by evaluating this expression in this environment, in place
    /// of the current call.
    Eval(Value, Value),
}

/// The parts of a `(lit clo env params . body)` closure.
#[derive(Debug, Clone, Copy)]
struct Closure {
    env: Value,
    params: Value,
    body: Value,
}

/// How the head of a call form is applied.
enum Callable {
    Builtin(BuiltinId),
    Special(SpecialId),
    Function(Closure),
    Macro(Closure),
    Other,
}

/// The evaluation machine. Every arena and all interpreter state lives here
/// and is threaded through each operation.
pub struct Machine {
    pub heap: Heap,
    pub symbols: SymbolTable,
    pub strings: StringPool,
    pub gensyms: GensymCounter,
    pub builtins: Registry<BuiltinFn>,
    pub specials: Registry<SpecialFn>,
    pub streams: StreamTable,
    pub config: MachineConfig,

    /// Steps taken by the current top-level evaluation.
    steps: u64,
    /// Current nesting of `eval`.
    depth: usize,
}

impl Machine {
    pub fn new(config: MachineConfig) -> LispResult<Self> {
        Ok(Machine {
            heap: Heap::new(config.max_conses),
            symbols: SymbolTable::new(config.max_symbols),
            strings: StringPool::new(config.max_strings),
            gensyms: GensymCounter::new(),
            builtins: Registry::new(),
            specials: Registry::new(),
            streams: StreamTable::new(),
            config,
            steps: 0,
            depth: 0,
        })
    }

    // ========================================================================
    // Constructors and accessors
    // ========================================================================

    /// Intern a symbol. The name "nil" is the empty list, not a symbol.
    pub fn intern(&mut self, name: &str) -> LispResult<Value> {
        if name == "nil" {
            return Ok(Value::Nil);
        }
        Ok(Value::Symbol(self.symbols.intern(name)?))
    }

    /// Name of a symbol value; nil answers "nil".
    pub fn symbol_name(&self, val: Value) -> LispResult<&str> {
        match val {
            Value::Nil => Ok("nil"),
            Value::Symbol(id) if self.is_live(val) => Ok(self.symbols.name(id)),
            other => Err(LispError::Type(format!("{} is not a symbol", self.render(other)))),
        }
    }

    pub fn make_string(&mut self, bytes: &[u8]) -> LispResult<Value> {
        Ok(Value::Str(self.strings.alloc(bytes)?))
    }

    pub fn string_bytes(&self, val: Value) -> LispResult<&[u8]> {
        match val {
            Value::Str(id) => self
                .strings
                .get(id)
                .ok_or_else(|| LispError::Type(format!("no string {}", id.0))),
            other => Err(LispError::Type(format!("{} is not a string", self.render(other)))),
        }
    }

    /// True if `val` refers to something this machine actually allocated.
    /// Values built by hand with `Value::new` or `Value::from_word` may not.
    pub fn is_live(&self, val: Value) -> bool {
        match val {
            Value::Nil => true,
            Value::Symbol(id) => (id.0 as usize) < self.symbols.count(),
            Value::Pair(id) => self.heap.contains(id),
            Value::Gensym(id) => id.0 < self.gensyms.count(),
            Value::Str(id) => self.strings.get(id).is_some(),
            Value::Stream(id) => (id.0 as usize) < self.streams.count(),
            Value::Special(id) => (id.0 as usize) < self.specials.count(),
            Value::Builtin(id) => (id.0 as usize) < self.builtins.count(),
        }
    }

    fn check_live(&self, val: Value) -> LispResult<()> {
        if self.is_live(val) {
            Ok(())
        } else {
            Err(LispError::Type(format!(
                "dangling {} {}",
                val.kind().name(),
                val.index()
            )))
        }
    }

    pub fn make_gensym(&mut self) -> LispResult<Value> {
        Ok(Value::Gensym(self.gensyms.fresh()?))
    }

    pub fn make_builtin(&mut self, name: &str, fun: BuiltinFn) -> LispResult<Value> {
        Ok(Value::Builtin(BuiltinId(self.builtins.register(name, fun)?)))
    }

    pub fn make_special(&mut self, name: &str, fun: SpecialFn) -> LispResult<Value> {
        Ok(Value::Special(SpecialId(self.specials.register(name, fun)?)))
    }

    /// Printed representation of a value.
    pub fn render(&self, val: Value) -> String {
        printer::print_val(val, self)
    }

    pub(crate) fn caris(&self, x: Value, marker: SymbolId) -> bool {
        match x {
            Value::Pair(id) => self.heap.car(id) == Value::Symbol(marker),
            _ => false,
        }
    }

    pub(crate) fn cadr(&self, v: Value) -> LispResult<Value> {
        let cdr = self.heap.cdr_val(v)?;
        self.heap.car_val(cdr)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Read one expression from any character source.
    pub fn read_from<S: CharSource>(&mut self, source: &mut S) -> LispResult<Option<Value>> {
        Reader::new(source, &mut self.heap, &mut self.symbols, &mut self.strings).read()
    }

    /// Read one expression from an open stream. None at end of input.
    pub fn parse_one(&mut self, stream: StreamId) -> LispResult<Option<Value>> {
        let source = self.streams.get_mut(stream)?;
        Reader::new(source, &mut self.heap, &mut self.symbols, &mut self.strings).read()
    }

    /// Read the first expression of `src`.
    pub fn read_str(&mut self, src: &str) -> LispResult<Option<Value>> {
        self.read_from(&mut StrSource::new(src))
    }

    /// Read every expression of `src`.
    pub fn read_all(&mut self, src: &str) -> LispResult<Vec<Value>> {
        let mut source = StrSource::new(src);
        Reader::new(&mut source, &mut self.heap, &mut self.symbols, &mut self.strings).read_all()
    }

    // ========================================================================
    // Core evaluation entry point
    // ========================================================================

    /// Evaluate an expression in an environment.
    pub fn eval(&mut self, expr: Value, env: Value) -> LispResult<Value> {
        if self.depth == 0 {
            self.steps = 0;
        }
        if self.depth >= self.config.max_depth {
            return Err(LispError::DepthExceeded);
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.eval_loop(expr, env)
        });
        self.depth -= 1;
        result
    }

    /// Evaluate every form of `src` in order, returning the last result.
    pub fn eval_str(&mut self, src: &str, env: Value) -> LispResult<Value> {
        let mut source = StrSource::new(src);
        let mut result = Value::Nil;
        while let Some(expr) = self.read_from(&mut source)? {
            result = self.eval(expr, env)?;
        }
        Ok(result)
    }

    /// Read and evaluate every form of a file in order. The file's stream is
    /// released whether or not evaluation succeeds.
    pub fn load_file(&mut self, path: &str, env: Value) -> LispResult<()> {
        log::debug!("loading {}", path);
        let stream = self.streams.open_for_reading(path)?;
        let result = self.eval_stream(stream, env);
        self.streams.release(stream)?;
        let forms = result?;
        log::debug!("loaded {} ({} forms)", path, forms);
        Ok(())
    }

    fn eval_stream(&mut self, stream: StreamId, env: Value) -> LispResult<usize> {
        let mut forms = 0;
        while let Some(expr) = self.parse_one(stream)? {
            self.eval(expr, env)?;
            forms += 1;
        }
        Ok(forms)
    }

    fn tick(&mut self) -> LispResult<()> {
        self.steps += 1;
        if self.steps > self.config.max_steps {
            return Err(LispError::StepLimit);
        }
        Ok(())
    }

    /// The evaluation loop. Tail positions hand back `Step::Eval` and are
    /// continued here instead of recursing.
    fn eval_loop(&mut self, mut expr: Value, mut env: Value) -> LispResult<Value> {
        loop {
            self.tick()?;
            self.check_live(expr)?;
            match expr {
                Value::Nil => return Ok(Value::Nil),
                Value::Str(_) => return Ok(expr),
                Value::Symbol(sym::ENV) => return Ok(env),
                Value::Symbol(_) => return self.env_lookup(env, expr),
                Value::Pair(id) => {
                    let (head, args) = (self.heap.car(id), self.heap.cdr(id));
                    match self.apply(head, args, env)? {
                        Step::Done(val) => return Ok(val),
                        Step::Eval(next, next_env) => {
                            expr = next;
                            env = next_env;
                        }
                    }
                }
                other => return Err(LispError::Unevaluable(self.render(other))),
            }
        }
    }

    // ========================================================================
    // Application
    // ========================================================================

    /// Apply the head of a call form to its raw argument list.
    pub fn apply(&mut self, head: Value, args: Value, env: Value) -> LispResult<Step> {
        let mut op = head;
        loop {
            self.check_live(op)?;
            match self.classify(op)? {
                Callable::Builtin(id) => {
                    let vals = self.eval_list(args, env)?;
                    let fun = self.builtins.get(id.0);
                    return Ok(Step::Done(fun(self, vals, env)?));
                }
                Callable::Special(id) => {
                    let fun = self.specials.get(id.0);
                    return fun(self, args, env);
                }
                Callable::Function(clo) => {
                    let vals = self.eval_list(args, env)?;
                    if log::log_enabled!(log::Level::Trace) {
                        log::trace!(
                            "apply {} to {}",
                            self.render(clo.params),
                            self.render(vals)
                        );
                    }
                    let call_env = self.make_call_env(clo, vals)?;
                    return self.eval_body_tail(clo.body, call_env);
                }
                Callable::Macro(clo) => {
                    let call_env = self.make_call_env(clo, args)?;
                    let expansion = self.eval_body(clo.body, call_env)?;
                    if log::log_enabled!(log::Level::Trace) {
                        log::trace!("expand {} -> {}", self.render(args), self.render(expansion));
                    }
                    return Ok(Step::Eval(expansion, env));
                }
                Callable::Other => {
                    self.tick()?;
                    let next = self.eval(op, env)?;
                    if next == op {
                        return Err(LispError::Type(format!("cannot apply {}", self.render(op))));
                    }
                    op = next;
                }
            }
        }
    }

    fn classify(&self, op: Value) -> LispResult<Callable> {
        let callable = match op {
            Value::Builtin(id) => Callable::Builtin(id),
            Value::Special(id) => Callable::Special(id),
            Value::Pair(_) if self.caris(op, sym::LIT) => {
                let kind = self.cadr(op)?;
                if kind == Value::Symbol(sym::CLO) {
                    Callable::Function(self.closure_parts(op)?)
                } else if kind == Value::Symbol(sym::MAC) {
                    Callable::Macro(self.closure_parts(op)?)
                } else {
                    Callable::Other
                }
            }
            _ => Callable::Other,
        };
        Ok(callable)
    }

    /// Split `(lit kind env params . body)`.
    fn closure_parts(&self, clo: Value) -> LispResult<Closure> {
        let rest = self.heap.cdr_val(self.heap.cdr_val(clo)?)?;
        let env = self.heap.car_val(rest)?;
        let rest = self.heap.cdr_val(rest)?;
        let params = self.heap.car_val(rest)?;
        let body = self.heap.cdr_val(rest)?;
        Ok(Closure { env, params, body })
    }

    /// Build a `(lit kind env params . body)` closure value.
    pub fn make_closure(
        &mut self,
        kind: SymbolId,
        env: Value,
        params: Value,
        body: Value,
    ) -> LispResult<Value> {
        self.heap.list_with_tail(
            &[Value::Symbol(sym::LIT), Value::Symbol(kind), env, params],
            body,
        )
    }

    fn make_call_env(&mut self, clo: Closure, args: Value) -> LispResult<Value> {
        let call_env = self.make_env(clo.env)?;
        self.destructure_bind(call_env, clo.params, args)?;
        Ok(call_env)
    }

    /// Evaluate each element of a list, left to right.
    pub fn eval_list(&mut self, exprs: Value, env: Value) -> LispResult<Value> {
        let mut vals = Vec::new();
        let mut current = exprs;
        while let Value::Pair(id) = current {
            vals.push(self.eval(self.heap.car(id), env)?);
            current = self.heap.cdr(id);
        }
        if !current.is_nil() {
            return Err(LispError::Type(format!(
                "improper argument list {}",
                self.render(exprs)
            )));
        }
        self.heap.list(&vals)
    }

    /// Evaluate a sequence of forms, returning the last result (nil if empty).
    pub fn eval_body(&mut self, body: Value, env: Value) -> LispResult<Value> {
        match self.eval_body_tail(body, env)? {
            Step::Done(val) => Ok(val),
            Step::Eval(expr, env) => self.eval(expr, env),
        }
    }

    /// Like `eval_body`, but hands the last form back to the caller.
    pub(crate) fn eval_body_tail(&mut self, body: Value, env: Value) -> LispResult<Step> {
        let mut current = body;
        while let Value::Pair(id) = current {
            let (expr, rest) = (self.heap.car(id), self.heap.cdr(id));
            if rest.is_nil() {
                return Ok(Step::Eval(expr, env));
            }
            self.eval(expr, env)?;
            current = rest;
        }
        Ok(Step::Done(Value::Nil))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> (Machine, Value) {
        let mut m = Machine::new(MachineConfig::default()).unwrap();
        let env = m.make_core_env().unwrap();
        (m, env)
    }

    fn eval_to_string(m: &mut Machine, env: Value, src: &str) -> String {
        let val = m.eval_str(src, env).unwrap();
        m.render(val)
    }

    #[test]
    fn nil_evaluates_to_itself_anywhere() {
        let mut m = Machine::new(MachineConfig::default()).unwrap();
        assert_eq!(m.eval(Value::Nil, Value::Nil).unwrap(), Value::Nil);
    }

    #[test]
    fn env_symbol_names_the_current_environment() {
        let (mut m, env) = machine();
        let t = m.intern("t").unwrap();
        assert_eq!(m.eval(t, env).unwrap(), t);
        let star_env = m.intern("*env*").unwrap();
        assert_eq!(m.eval(star_env, env).unwrap(), env);
    }

    #[test]
    fn strings_are_self_evaluating_and_gensyms_are_not() {
        let (mut m, env) = machine();
        let s = m.make_string(b"hi").unwrap();
        assert_eq!(m.eval(s, env).unwrap(), s);
        let g = m.make_gensym().unwrap();
        assert!(matches!(m.eval(g, env), Err(LispError::Unevaluable(_))));
    }

    #[test]
    fn body_evaluation_returns_the_last_form() {
        let (mut m, env) = machine();
        let body = m.read_str("((def a 'x) (def b 'y) (cons a b))").unwrap().unwrap();
        let val = m.eval_body(body, env).unwrap();
        assert_eq!(m.render(val), "(x . y)");
        assert_eq!(m.eval_body(Value::Nil, env).unwrap(), Value::Nil);
    }

    #[test]
    fn closures_are_plain_lists() {
        let (mut m, env) = machine();
        assert_eq!(
            eval_to_string(&mut m, env, "(cdr (cdr (cdr (lambda (x) x))))"),
            "((x) x)"
        );
        assert_eq!(eval_to_string(&mut m, env, "(car (syntax (x) x))"), "lit");
    }

    #[test]
    fn a_hand_built_closure_can_be_called() {
        let (mut m, env) = machine();
        let src = "((cons 'lit (cons 'clo (cons *env* '((x) (cons x x))))) 'a)";
        assert_eq!(eval_to_string(&mut m, env, src), "(a . a)");
    }

    #[test]
    fn head_is_evaluated_until_callable() {
        let (mut m, env) = machine();
        assert_eq!(eval_to_string(&mut m, env, "(def kons cons) (kons 'a 'b)"), "(a . b)");
        assert_eq!(
            eval_to_string(&mut m, env, "(def k2 'kons) (k2 'a 'b)"),
            "(a . b)"
        );
    }

    #[test]
    fn non_callable_heads_are_type_errors() {
        let (mut m, env) = machine();
        assert!(matches!(m.eval_str("(nil)", env), Err(LispError::Type(_))));
        assert!(matches!(m.eval_str("(\"f\" 'a)", env), Err(LispError::Type(_))));
        assert!(matches!(m.eval_str("(def s 's) (s)", env), Err(LispError::Type(_))));
    }

    #[test]
    fn step_budget_stops_runaway_evaluation() {
        let mut m = Machine::new(MachineConfig {
            max_steps: 200,
            ..MachineConfig::default()
        })
        .unwrap();
        let env = m.make_core_env().unwrap();
        let err = m
            .eval_str("(def a 'b) (def b 'a) (a)", env)
            .unwrap_err();
        assert_eq!(err, LispError::StepLimit);
    }

    #[test]
    fn tail_calls_in_if_do_not_nest() {
        let mut m = Machine::new(MachineConfig {
            max_depth: 40,
            ..MachineConfig::default()
        })
        .unwrap();
        let env = m.make_core_env().unwrap();
        let src = "(def walk (lambda (xs) (if xs (walk (cdr xs)) 'done)))
                   (walk '(a b c d e f g h i j k l m n o p q r s t u v w x y z
                           a b c d e f g h i j k l m n o p q r s t u v w x y z))";
        assert_eq!(eval_to_string(&mut m, env, src), "done");
    }
}
