use crate::error::{LispError, LispResult};

/// One registered native operator: its printed name and its handler.
struct Entry<F> {
    name: String,
    fun: F,
}

/// Growable table of native operators. A builtin or special-form value is
/// an index into one of these.
pub struct Registry<F> {
    entries: Vec<Entry<F>>,
}

impl<F: Copy> Registry<F> {
    pub fn new() -> Self {
        Registry {
            entries: Vec::new(),
        }
    }

    /// Add an operator and return its index.
    pub fn register(&mut self, name: &str, fun: F) -> LispResult<u32> {
        let index = u32::try_from(self.entries.len())
            .map_err(|_| LispError::BudgetExceeded { arena: "registry" })?;
        self.entries.push(Entry {
            name: name.to_string(),
            fun,
        });
        Ok(index)
    }

    pub fn name(&self, index: u32) -> &str {
        &self.entries[index as usize].name
    }

    pub fn get(&self, index: u32) -> F {
        self.entries[index as usize].fun
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

impl<F: Copy> Default for Registry<F> {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one() -> u8 {
        1
    }

    fn two() -> u8 {
        2
    }

    #[test]
    fn entries_keep_name_and_handler() {
        let mut reg: Registry<fn() -> u8> = Registry::new();
        let a = reg.register("one", one).unwrap();
        let b = reg.register("two", two).unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.name(a), "one");
        assert_eq!((reg.get(b))(), 2);
        assert_eq!(reg.count(), 2);
    }
}
