use std::collections::HashSet;
use std::fmt::Write;

use crate::eval::Machine;
use crate::value::{PairId, Value};

/// Nesting level past which output is cut short.
const MAX_PRINT_DEPTH: usize = 1000;

/// Print a value to a string.
pub fn print_val(val: Value, m: &Machine) -> String {
    let mut printer = Printer {
        m,
        out: String::new(),
        truncated: false,
        path: HashSet::new(),
    };
    printer.print(val, 0);
    if printer.truncated {
        log::warn!(
            "structure nested deeper than {} levels, output truncated",
            MAX_PRINT_DEPTH
        );
    }
    printer.out
}

struct Printer<'a> {
    m: &'a Machine,
    out: String,
    truncated: bool,
    /// Pairs of every list currently being printed. Reaching one of them
    /// again, through a car or a cdr, is a cycle.
    path: HashSet<PairId>,
}

impl Printer<'_> {
    fn print(&mut self, val: Value, depth: usize) {
        if depth > MAX_PRINT_DEPTH {
            self.out.push_str("...");
            self.truncated = true;
            return;
        }
        if !self.m.is_live(val) {
            let _ = write!(self.out, "#:<invalid {} {}>", val.kind().name(), val.index());
            return;
        }

        match val {
            Value::Nil => self.out.push_str("nil"),
            Value::Symbol(id) => self.out.push_str(self.m.symbols.name(id)),
            Value::Pair(id) => self.print_list(id, depth),
            Value::Gensym(id) => {
                let _ = write!(self.out, "#:G{}", id.0);
            }
            Value::Str(id) => print_string(self.m.strings.bytes(id), &mut self.out),
            Value::Stream(id) => {
                let _ = write!(self.out, "#:<stream {}>", id.0);
            }
            Value::Special(id) => {
                let _ = write!(self.out, "#:<special operator {}>", self.m.specials.name(id.0));
            }
            Value::Builtin(id) => {
                let _ = write!(self.out, "#:<core function {}>", self.m.builtins.name(id.0));
            }
        }
    }

    fn print_list(&mut self, head: PairId, depth: usize) {
        if self.path.contains(&head) {
            self.out.push_str("...");
            return;
        }
        let m = self.m;
        let heap = &m.heap;
        let mut spine = vec![head];
        self.path.insert(head);
        self.out.push('(');
        self.print(heap.car(head), depth + 1);

        let mut current = heap.cdr(head);
        loop {
            match current {
                Value::Nil => break,
                Value::Pair(id) if heap.contains(id) => {
                    if !self.path.insert(id) {
                        self.out.push_str(" ...");
                        break;
                    }
                    spine.push(id);
                    self.out.push(' ');
                    self.print(heap.car(id), depth + 1);
                    current = heap.cdr(id);
                }
                _ => {
                    self.out.push_str(" . ");
                    self.print(current, depth + 1);
                    break;
                }
            }
        }
        self.out.push(')');
        for id in spine {
            self.path.remove(&id);
        }
    }
}

/// Print string bytes as a readable literal.
fn print_string(bytes: &[u8], out: &mut String) {
    out.push('"');
    for &ch in bytes {
        match ch {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(ch as char),
            _ => {
                let _ = write!(out, "\\x{:02x}", ch);
            }
        }
    }
    out.push('"');
}
