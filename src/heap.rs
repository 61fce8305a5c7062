use crate::config::{grow_capacity, DEFAULT_CONSES};
use crate::error::{LispError, LispResult};
use crate::value::{PairId, Value};

/// A single cons cell on the heap.
#[derive(Clone, Copy)]
pub struct ConsCell {
    pub car: Value,
    pub cdr: Value,
}

/// The cons cell heap. All pairs are allocated here and live until the heap
/// is dropped; there is no reclamation of individual cells.
/// PairId is an index into `cells`.
pub struct Heap {
    cells: Vec<ConsCell>,
    /// Hard cap on the number of cells, if any.
    max: Option<usize>,
}

impl Heap {
    pub fn new(max: Option<usize>) -> Self {
        Heap {
            cells: Vec::new(),
            max,
        }
    }

    /// Allocate a new cons cell. Returns a PairId.
    /// Capacity starts at a small default and doubles when exhausted;
    /// returns Err(BudgetExceeded) once the cap is reached.
    pub fn alloc(&mut self, car: Value, cdr: Value) -> LispResult<PairId> {
        if self.max.is_some_and(|max| self.cells.len() >= max) {
            return Err(LispError::BudgetExceeded { arena: "cons" });
        }
        if self.cells.len() == self.cells.capacity() {
            let new_cap = grow_capacity(self.cells.capacity(), DEFAULT_CONSES, self.max)
                .ok_or(LispError::BudgetExceeded { arena: "cons" })?;
            self.cells.reserve_exact(new_cap - self.cells.len());
        }
        let index = u32::try_from(self.cells.len())
            .map_err(|_| LispError::BudgetExceeded { arena: "cons" })?;
        self.cells.push(ConsCell { car, cdr });
        Ok(PairId(index))
    }

    /// Allocate a cell and wrap it as a value.
    pub fn cons(&mut self, car: Value, cdr: Value) -> LispResult<Value> {
        Ok(Value::Pair(self.alloc(car, cdr)?))
    }

    /// True if `id` names an allocated cell.
    #[inline]
    pub fn contains(&self, id: PairId) -> bool {
        (id.0 as usize) < self.cells.len()
    }

    fn cell(&self, id: PairId) -> LispResult<&ConsCell> {
        self.cells
            .get(id.0 as usize)
            .ok_or_else(|| LispError::Type(format!("no cons cell {}", id.0)))
    }

    /// Get the car of a pair.
    #[inline]
    pub fn car(&self, id: PairId) -> Value {
        self.cells[id.0 as usize].car
    }

    /// Get the cdr of a pair.
    #[inline]
    pub fn cdr(&self, id: PairId) -> Value {
        self.cells[id.0 as usize].cdr
    }

    /// Set the car of a pair in place.
    #[inline]
    pub fn set_car(&mut self, id: PairId, val: Value) {
        self.cells[id.0 as usize].car = val;
    }

    /// Set the cdr of a pair in place.
    #[inline]
    pub fn set_cdr(&mut self, id: PairId, val: Value) {
        self.cells[id.0 as usize].cdr = val;
    }

    /// Get car of a Value if it's a pair, or Nil if it's Nil.
    pub fn car_val(&self, val: Value) -> LispResult<Value> {
        match val {
            Value::Nil => Ok(Value::Nil),
            Value::Pair(id) => Ok(self.cell(id)?.car),
            other => Err(LispError::Type(format!(
                "car of non-pair {}",
                other.kind().name()
            ))),
        }
    }

    /// Get cdr of a Value if it's a pair, or Nil if it's Nil.
    pub fn cdr_val(&self, val: Value) -> LispResult<Value> {
        match val {
            Value::Nil => Ok(Value::Nil),
            Value::Pair(id) => Ok(self.cell(id)?.cdr),
            other => Err(LispError::Type(format!(
                "cdr of non-pair {}",
                other.kind().name()
            ))),
        }
    }

    /// Set the car of a value that must be a pair.
    pub fn set_car_val(&mut self, target: Value, val: Value) -> LispResult<()> {
        let id = target
            .as_pair()
            .ok_or_else(|| LispError::Type("set-car of non-pair".into()))?;
        self.cell(id)?;
        self.set_car(id, val);
        Ok(())
    }

    /// Set the cdr of a value that must be a pair.
    pub fn set_cdr_val(&mut self, target: Value, val: Value) -> LispResult<()> {
        let id = target
            .as_pair()
            .ok_or_else(|| LispError::Type("set-cdr of non-pair".into()))?;
        self.cell(id)?;
        self.set_cdr(id, val);
        Ok(())
    }

    /// Build a proper list from a slice of values.
    pub fn list(&mut self, values: &[Value]) -> LispResult<Value> {
        self.list_with_tail(values, Value::Nil)
    }

    /// Build a list from a slice of values ending in `tail` instead of nil.
    pub fn list_with_tail(&mut self, values: &[Value], tail: Value) -> LispResult<Value> {
        let mut result = tail;
        for &val in values.iter().rev() {
            result = self.cons(val, result)?;
        }
        Ok(result)
    }

    /// Returns true if this value is a proper list.
    pub fn is_proper_list(&self, val: Value) -> bool {
        let mut current = val;
        loop {
            match current {
                Value::Nil => return true,
                Value::Pair(id) => current = self.cdr(id),
                _ => return false,
            }
        }
    }

    /// Collect a proper list into a Vec. Returns None if not a proper list.
    pub fn list_to_vec(&self, val: Value) -> Option<Vec<Value>> {
        let mut result = Vec::new();
        let mut current = val;
        loop {
            match current {
                Value::Nil => return Some(result),
                Value::Pair(id) => {
                    result.push(self.car(id));
                    current = self.cdr(id);
                }
                _ => return None,
            }
        }
    }

    /// Number of pairs in the spine of a list (dotted tails are not counted).
    pub fn list_len(&self, val: Value) -> usize {
        let mut count = 0;
        let mut current = val;
        while let Value::Pair(id) = current {
            count += 1;
            current = self.cdr(id);
        }
        count
    }

    /// Reverse a list in place by relinking its cells. A dotted tail stays the
    /// final cdr: `(a b . c)` becomes `(b a . c)`.
    pub fn nreverse(&mut self, list: Value) -> Value {
        let mut prev = Value::Nil;
        let mut current = list;
        while let Value::Pair(id) = current {
            let next = self.cdr(id);
            self.set_cdr(id, prev);
            prev = current;
            current = next;
        }
        if !current.is_nil() {
            if let Value::Pair(first) = list {
                self.set_cdr(first, current);
            }
        }
        prev
    }

    /// Concatenate two lists. The spine of `a` is copied, `b` is shared.
    pub fn append(&mut self, a: Value, b: Value) -> LispResult<Value> {
        let items = self
            .list_to_vec(a)
            .ok_or_else(|| LispError::Type("append of improper list".into()))?;
        self.list_with_tail(&items, b)
    }

    /// Returns the number of allocated cells.
    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }

    /// Returns the number of cells the heap can hold before growing again.
    pub fn capacity(&self) -> usize {
        self.cells.capacity()
    }
}
