use crate::config::{grow_capacity, DEFAULT_STRINGS};
use crate::error::{LispError, LispResult};
use crate::value::StringId;

/// Pool of immutable byte strings. Strings are length-known, so they may
/// contain any byte, NUL included.
pub struct StringPool {
    values: Vec<Box<[u8]>>,
    max: Option<usize>,
}

impl StringPool {
    pub fn new(max: Option<usize>) -> Self {
        StringPool {
            values: Vec::new(),
            max,
        }
    }

    /// Copy `bytes` into the pool.
    pub fn alloc(&mut self, bytes: &[u8]) -> LispResult<StringId> {
        let len = self.values.len();
        if self.max.is_some_and(|max| len >= max) {
            return Err(LispError::BudgetExceeded { arena: "string" });
        }
        if len == self.values.capacity() {
            let new_cap = grow_capacity(len, DEFAULT_STRINGS, self.max)
                .ok_or(LispError::BudgetExceeded { arena: "string" })?;
            self.values.reserve_exact(new_cap - len);
        }
        let id = StringId(
            u32::try_from(len).map_err(|_| LispError::BudgetExceeded { arena: "string" })?,
        );
        self.values.push(bytes.into());
        Ok(id)
    }

    /// The bytes of `id`, or None if no such string was allocated.
    pub fn get(&self, id: StringId) -> Option<&[u8]> {
        self.values.get(id.0 as usize).map(|b| &b[..])
    }

    pub fn bytes(&self, id: StringId) -> &[u8] {
        &self.values[id.0 as usize]
    }

    pub fn len(&self, id: StringId) -> usize {
        self.values[id.0 as usize].len()
    }

    /// Lossy UTF-8 view, for paths and diagnostics.
    pub fn to_string_lossy(&self, id: StringId) -> String {
        String::from_utf8_lossy(self.bytes(id)).into_owned()
    }

    /// Total number of strings allocated.
    pub fn count(&self) -> usize {
        self.values.len()
    }
}
