//! Built-in self-test suite, run by the `unit` command.

use std::io::Write;

use crate::config::MachineConfig;
use crate::error::LispResult;
use crate::eval::Machine;
use crate::stream::StreamTable;
use crate::value::{Kind, Value};

/// Counts from one run of the suite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestSummary {
    pub tests: usize,
    pub failed: usize,
}

impl TestSummary {
    pub fn passed(&self) -> bool {
        self.failed == 0
    }
}

struct TestState<'a> {
    out: &'a mut dyn Write,
    summary: TestSummary,
}

impl TestState<'_> {
    fn group(&mut self, name: &str) -> LispResult<()> {
        writeln!(self.out, "==== {} ====", name)?;
        Ok(())
    }

    fn check(&mut self, ok: bool, text: &str) -> LispResult<()> {
        self.summary.tests += 1;
        if ok {
            writeln!(self.out, "PASS {}", text)?;
        } else {
            self.summary.failed += 1;
            writeln!(self.out, "FAIL {}", text)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> LispResult<()> {
        let TestSummary { tests, failed } = self.summary;
        if failed > 0 {
            writeln!(self.out, "FAIL {}/{} test(s)", failed, tests)?;
        } else {
            writeln!(self.out, "PASS {}/{} test(s)", tests, tests)?;
        }
        Ok(())
    }
}

/// Record a check, labelled with its own source text.
macro_rules! check {
    ($t:expr, $e:expr) => {
        $t.check($e, stringify!($e))?
    };
}

/// Run every group against a fresh machine, writing a report to `out`.
pub fn run_unit_tests(out: &mut dyn Write) -> LispResult<TestSummary> {
    let mut t = TestState {
        out,
        summary: TestSummary::default(),
    };
    let groups: [(&str, fn(&mut TestState, &mut Machine) -> LispResult<()>); 10] = [
        ("expr", test_expr),
        ("nil", test_nil),
        ("symbol", test_symbol),
        ("cons", test_cons),
        ("stream", test_stream),
        ("printer", test_printer),
        ("util", test_util),
        ("env", test_env),
        ("eval", test_eval),
        ("reader", test_reader),
    ];
    for (name, run) in groups {
        t.group(name)?;
        let mut m = Machine::new(MachineConfig::default())?;
        if let Err(e) = run(&mut t, &mut m) {
            if e.is_fatal() {
                return Err(e);
            }
            t.check(false, &format!("{} group raised: {}", name, e))?;
        }
    }
    t.group("summary")?;
    t.finish()?;
    Ok(t.summary)
}

fn test_expr(t: &mut TestState, _m: &mut Machine) -> LispResult<()> {
    check!(t, Value::new(Kind::Gensym, 42).kind() == Kind::Gensym);
    check!(t, Value::new(Kind::Gensym, 42).index() == 42);
    check!(t, Value::from_word(Value::new(Kind::Cons, 7).to_word()) == Some(Value::new(Kind::Cons, 7)));
    Ok(())
}

fn test_nil(t: &mut TestState, _m: &mut Machine) -> LispResult<()> {
    check!(t, Value::Nil.kind() == Kind::Nil);
    check!(t, Value::Nil.index() == 0);
    check!(t, Value::Nil.to_word() == 0);
    check!(t, Value::Nil.is_nil());
    Ok(())
}

fn test_symbol(t: &mut TestState, m: &mut Machine) -> LispResult<()> {
    let foo = m.intern("foo")?;
    let bar = m.intern("bar")?;
    check!(t, m.symbol_name(foo)? == "foo");
    check!(t, m.symbol_name(bar)? == "bar");
    check!(t, m.symbol_name(Value::Nil)? == "nil");
    check!(t, m.intern("foo")? == m.intern("foo")?);
    check!(t, m.intern("foo")? != m.intern("bar")?);
    Ok(())
}

fn test_cons(t: &mut TestState, m: &mut Machine) -> LispResult<()> {
    let cell = m.heap.cons(Value::Nil, Value::Nil)?;
    check!(t, cell.is_pair());
    check!(t, m.heap.car_val(cell)? == Value::Nil);
    check!(t, m.heap.cdr_val(cell)? == Value::Nil);
    let foo = m.intern("foo")?;
    m.heap.set_car_val(cell, foo)?;
    check!(t, m.heap.car_val(cell)? == foo);
    Ok(())
}

fn test_stream(t: &mut TestState, m: &mut Machine) -> LispResult<()> {
    check!(t, m.streams.status(StreamTable::STDIN) == "in");
    check!(t, m.streams.status(StreamTable::STDOUT) == "out");
    check!(t, m.streams.status(StreamTable::STDERR) == "out");
    Ok(())
}

fn test_printer(t: &mut TestState, m: &mut Machine) -> LispResult<()> {
    check!(t, m.render(Value::Nil) == "nil");
    let list = m.read_str("(a (b . c) \"d\\n\")")?;
    check!(t, list.map(|v| m.render(v)).as_deref() == Some("(a (b . c) \"d\\n\")"));
    Ok(())
}

fn test_util(t: &mut TestState, m: &mut Machine) -> LispResult<()> {
    check!(t, m.intern("nil")? == Value::Nil);
    check!(t, m.intern("nul")?.is_symbol());
    let foo = m.intern("foo")?;
    let bar = m.intern("bar")?;
    let one = m.heap.list(&[foo])?;
    let two = m.heap.list(&[foo, bar])?;
    check!(t, m.heap.car_val(one)? == foo);
    check!(t, m.heap.car_val(two)? == foo);
    check!(t, m.cadr(two)? == bar);
    let reversed = m.heap.nreverse(two);
    check!(t, m.heap.car_val(reversed)? == bar);
    Ok(())
}

fn test_env(t: &mut TestState, m: &mut Machine) -> LispResult<()> {
    let foo = m.intern("foo")?;
    let bar = m.intern("bar")?;

    let env = m.make_env(Value::Nil)?;
    check!(t, !m.env_can_assign(env, foo)?);
    check!(t, !m.env_can_assign(env, bar)?);
    m.env_define(env, foo, bar)?;
    check!(t, m.env_can_assign(env, foo)?);
    check!(t, !m.env_can_assign(env, bar)?);
    check!(t, m.env_lookup(env, foo)? == bar);
    m.env_define(env, bar, foo)?;
    check!(t, m.env_can_assign(env, foo)?);
    check!(t, m.env_can_assign(env, bar)?);
    check!(t, m.env_lookup(env, foo)? == bar);
    check!(t, m.env_lookup(env, bar)? == foo);
    m.env_delete(env, foo)?;
    check!(t, !m.env_can_assign(env, foo)?);
    check!(t, m.env_can_assign(env, bar)?);
    check!(t, m.env_lookup(env, bar)? == foo);

    let env1 = m.make_env(Value::Nil)?;
    let env2 = m.make_env(env1)?;
    check!(t, !m.env_can_assign(env1, foo)?);
    check!(t, !m.env_can_assign(env2, foo)?);
    check!(t, !m.env_can_assign(env1, bar)?);
    check!(t, !m.env_can_assign(env2, bar)?);
    m.env_define(env1, foo, foo)?;
    check!(t, m.env_can_assign(env1, foo)?);
    check!(t, m.env_can_assign(env2, foo)?);
    check!(t, !m.env_can_assign(env2, bar)?);
    Ok(())
}

fn test_eval(t: &mut TestState, m: &mut Machine) -> LispResult<()> {
    check!(t, m.eval(Value::Nil, Value::Nil)? == Value::Nil);
    let env = m.make_core_env()?;
    let tee = m.intern("t")?;
    check!(t, m.eval(tee, env)? == tee);
    let star_env = m.intern("*env*")?;
    check!(t, m.eval(star_env, env)? == env);
    let result = m.eval_str("((lambda (x y) (cons y x)) 'a 'b)", env)?;
    check!(t, m.render(result) == "(b . a)");
    let result = m.eval_str("(if nil 'a 'b)", env)?;
    check!(t, m.render(result) == "b");
    Ok(())
}

fn test_reader(t: &mut TestState, m: &mut Machine) -> LispResult<()> {
    check!(t, m.read_str("")?.is_none());
    check!(t, m.read_str("nil")? == Some(Value::Nil));
    check!(t, m.read_str("foo")? == Some(m.intern("foo")?));
    let quoted = m.read_str("'x")?;
    check!(t, quoted.map(|v| m.render(v)).as_deref() == Some("(quote x)"));
    check!(t, m.read_str("(a . b c)").is_err());
    check!(t, m.read_str("\"open").is_err());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_passes_and_reports() {
        let mut out = Vec::new();
        let summary = run_unit_tests(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(summary.passed(), "{}", text);
        assert!(summary.tests > 40);
        assert!(text.starts_with("==== expr ====\n"));
        assert!(text.contains("==== reader ===="));
        assert!(text.ends_with(&format!(
            "==== summary ====\nPASS {}/{} test(s)\n",
            summary.tests, summary.tests
        )));
        assert!(!text.contains("FAIL"));
    }

    #[test]
    fn failures_are_counted() {
        let mut out = Vec::new();
        let mut t = TestState {
            out: &mut out,
            summary: TestSummary::default(),
        };
        t.check(true, "fine").unwrap();
        t.check(false, "broken").unwrap();
        t.finish().unwrap();
        assert_eq!(t.summary, TestSummary { tests: 2, failed: 1 });
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "PASS fine\nFAIL broken\nFAIL 1/2 test(s)\n");
    }
}
