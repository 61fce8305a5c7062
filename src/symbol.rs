use std::collections::HashMap;

use crate::config::{grow_capacity, DEFAULT_SYMBOLS};
use crate::error::{LispError, LispResult};
use crate::value::{GensymId, SymbolId};

/// Interned symbol table. Each unique symbol name maps to a unique SymbolId,
/// so symbols compare by identity.
pub struct SymbolTable {
    name_to_id: HashMap<String, SymbolId>,
    id_to_name: Vec<String>,
    max: Option<usize>,
}

/// Well-known symbol IDs, pre-interned at startup.
/// These must match the order of interning in SymbolTable::new().
pub mod sym {
    use crate::value::SymbolId;

    pub const T: SymbolId = SymbolId(0);
    pub const QUOTE: SymbolId = SymbolId(1);
    pub const IF: SymbolId = SymbolId(2);
    pub const DEF: SymbolId = SymbolId(3);
    pub const LAMBDA: SymbolId = SymbolId(4);
    pub const SYNTAX: SymbolId = SymbolId(5);
    pub const BACKQUOTE: SymbolId = SymbolId(6);
    pub const UNQUOTE: SymbolId = SymbolId(7);
    pub const UNQUOTE_SPLICING: SymbolId = SymbolId(8);
    pub const LIT: SymbolId = SymbolId(9);
    pub const CLO: SymbolId = SymbolId(10);
    pub const MAC: SymbolId = SymbolId(11);
    pub const ENV: SymbolId = SymbolId(12);
    pub const DOT: SymbolId = SymbolId(13);
}

const WELL_KNOWN: [&str; 14] = [
    "t",
    "quote",
    "if",
    "def",
    "lambda",
    "syntax",
    "backquote",
    "unquote",
    "unquote-splicing",
    "lit",
    "clo",
    "mac",
    "*env*",
    ".",
];

impl SymbolTable {
    /// Create a new symbol table with all well-known symbols pre-interned.
    /// The order MUST match the constants in the `sym` module above.
    /// The cap, if any, only limits names interned after these.
    pub fn new(max: Option<usize>) -> Self {
        let mut name_to_id = HashMap::new();
        let mut id_to_name = Vec::with_capacity(DEFAULT_SYMBOLS);

        for (i, name) in WELL_KNOWN.iter().enumerate() {
            let id = SymbolId(i as u32);
            name_to_id.insert(name.to_string(), id);
            id_to_name.push(name.to_string());
        }

        SymbolTable {
            name_to_id,
            id_to_name,
            max: max.map(|m| m + WELL_KNOWN.len()),
        }
    }

    /// Intern a symbol name. Returns the existing ID if already interned,
    /// or creates a new one.
    pub fn intern(&mut self, name: &str) -> LispResult<SymbolId> {
        if let Some(&id) = self.name_to_id.get(name) {
            return Ok(id);
        }
        self.reserve_slot()?;
        let id = SymbolId(
            u32::try_from(self.id_to_name.len())
                .map_err(|_| LispError::BudgetExceeded { arena: "intern" })?,
        );
        self.name_to_id.insert(name.to_string(), id);
        self.id_to_name.push(name.to_string());
        Ok(id)
    }

    fn reserve_slot(&mut self) -> LispResult<()> {
        let len = self.id_to_name.len();
        if self.max.is_some_and(|max| len >= max) {
            return Err(LispError::BudgetExceeded { arena: "intern" });
        }
        if len == self.id_to_name.capacity() {
            let new_cap = grow_capacity(len, DEFAULT_SYMBOLS, self.max)
                .ok_or(LispError::BudgetExceeded { arena: "intern" })?;
            self.id_to_name.reserve_exact(new_cap - len);
        }
        Ok(())
    }

    /// Look up a symbol name by its ID.
    pub fn name(&self, id: SymbolId) -> &str {
        &self.id_to_name[id.0 as usize]
    }

    /// Look up a symbol ID by name, without interning.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.name_to_id.get(name).copied()
    }

    /// Total number of interned symbols.
    pub fn count(&self) -> usize {
        self.id_to_name.len()
    }
}

/// Source of fresh gensyms. Gensyms are their own value kind, so they can
/// never collide with an interned symbol.
#[derive(Debug, Default)]
pub struct GensymCounter {
    counter: u32,
}

impl GensymCounter {
    pub fn new() -> Self {
        GensymCounter::default()
    }

    pub fn fresh(&mut self) -> LispResult<GensymId> {
        let id = GensymId(self.counter);
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or(LispError::BudgetExceeded { arena: "gensym" })?;
        Ok(id)
    }

    /// Number of gensyms handed out so far.
    pub fn count(&self) -> u32 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_id() {
        let mut table = SymbolTable::new(None);
        let a = table.intern("foo").unwrap();
        let b = table.intern("foo").unwrap();
        let c = table.intern("bar").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.name(a), "foo");
        assert_eq!(table.name(c), "bar");
    }

    #[test]
    fn well_known_ids_match_names() {
        let mut table = SymbolTable::new(None);
        assert_eq!(table.intern("t").unwrap(), sym::T);
        assert_eq!(table.intern("quote").unwrap(), sym::QUOTE);
        assert_eq!(table.intern("unquote-splicing").unwrap(), sym::UNQUOTE_SPLICING);
        assert_eq!(table.intern("*env*").unwrap(), sym::ENV);
        assert_eq!(table.name(sym::DOT), ".");
    }

    #[test]
    fn lookup_does_not_intern() {
        let mut table = SymbolTable::new(None);
        let before = table.count();
        assert_eq!(table.lookup("nowhere"), None);
        assert_eq!(table.count(), before);
        let id = table.intern("somewhere").unwrap();
        assert_eq!(table.lookup("somewhere"), Some(id));
    }

    #[test]
    fn cap_limits_new_names() {
        let mut table = SymbolTable::new(Some(2));
        table.intern("a").unwrap();
        table.intern("b").unwrap();
        table.intern("a").unwrap();
        assert_eq!(
            table.intern("c"),
            Err(LispError::BudgetExceeded { arena: "intern" })
        );
    }

    #[test]
    fn gensyms_are_fresh() {
        let mut gensyms = GensymCounter::new();
        let a = gensyms.fresh().unwrap();
        let b = gensyms.fresh().unwrap();
        assert_ne!(a, b);
        assert_eq!(gensyms.count(), 2);
    }
}
