/// Initial slot count of the cons heap; doubles on every overflow.
pub const DEFAULT_CONSES: usize = 4;
/// Initial slot count of the symbol table.
pub const DEFAULT_SYMBOLS: usize = 16;
/// Initial slot count of the string pool.
pub const DEFAULT_STRINGS: usize = 16;

/// Knobs for a [`Machine`](crate::eval::Machine). Arena caps are hard budgets:
/// an allocation that would exceed one fails with a fatal error.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Maximum number of cons cells, or None for unbounded.
    pub max_conses: Option<usize>,
    /// Maximum number of distinct symbol names, or None for unbounded.
    pub max_symbols: Option<usize>,
    /// Maximum number of strings, or None for unbounded.
    pub max_strings: Option<usize>,
    /// Evaluation steps allowed per top-level `eval` call.
    pub max_steps: u64,
    /// How deeply `eval` may nest before giving up.
    pub max_depth: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            max_conses: None,
            max_symbols: None,
            max_strings: None,
            max_steps: u64::MAX,
            max_depth: 1000,
        }
    }
}

/// Next capacity under the doubling policy, clamped to `max`.
/// Returns None when the arena is already at its cap.
pub fn grow_capacity(current: usize, initial: usize, max: Option<usize>) -> Option<usize> {
    let wanted = if current == 0 { initial } else { current.saturating_mul(2) };
    match max {
        Some(max) if current >= max => None,
        Some(max) => Some(wanted.min(max)),
        None => Some(wanted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_starts_small_and_doubles() {
        assert_eq!(grow_capacity(0, 4, None), Some(4));
        assert_eq!(grow_capacity(4, 4, None), Some(8));
        assert_eq!(grow_capacity(8, 4, None), Some(16));
    }

    #[test]
    fn growth_is_clamped_to_the_cap() {
        assert_eq!(grow_capacity(8, 4, Some(10)), Some(10));
        assert_eq!(grow_capacity(10, 4, Some(10)), None);
        assert_eq!(grow_capacity(0, 4, Some(2)), Some(2));
        assert_eq!(grow_capacity(0, 4, Some(0)), None);
    }
}
