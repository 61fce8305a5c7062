use std::fmt;

/// Unique identifier for an interned symbol.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// Index into the cons-cell heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairId(pub u32);

/// Index into the string pool.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringId(pub u32);

/// Serial number handed out by the gensym counter.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GensymId(pub u32);

/// Unique identifier for an open stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u32);

/// Index into the special-form registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecialId(pub u32);

/// Index into the builtin-function registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinId(pub u32);

/// Type tag of a value. The discriminants are the tags used by the packed word form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Nil = 0,
    Symbol = 1,
    Cons = 2,
    Gensym = 3,
    String = 4,
    Stream = 5,
    Special = 6,
    Builtin = 7,
}

impl Kind {
    pub fn from_tag(tag: u8) -> Option<Kind> {
        let kind = match tag {
            0 => Kind::Nil,
            1 => Kind::Symbol,
            2 => Kind::Cons,
            3 => Kind::Gensym,
            4 => Kind::String,
            5 => Kind::Stream,
            6 => Kind::Special,
            7 => Kind::Builtin,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Nil => "nil",
            Kind::Symbol => "symbol",
            Kind::Cons => "cons",
            Kind::Gensym => "gensym",
            Kind::String => "string",
            Kind::Stream => "stream",
            Kind::Special => "special",
            Kind::Builtin => "builtin",
        }
    }
}

/// The universal value. Copy semantics: the data it refers to lives in the
/// arena selected by its kind, and two values are `==` exactly when they are
/// the same kind and index (identity equality).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Value {
    #[default]
    Nil,
    Symbol(SymbolId),
    Pair(PairId),
    Gensym(GensymId),
    Str(StringId),
    Stream(StreamId),
    Special(SpecialId),
    Builtin(BuiltinId),
}

const TAG_BITS: u32 = 8;
const TAG_MASK: u64 = 0xff;

impl Value {
    /// Build a value from a kind and an arena index. Nil ignores the index.
    pub fn new(kind: Kind, index: u32) -> Value {
        match kind {
            Kind::Nil => Value::Nil,
            Kind::Symbol => Value::Symbol(SymbolId(index)),
            Kind::Cons => Value::Pair(PairId(index)),
            Kind::Gensym => Value::Gensym(GensymId(index)),
            Kind::String => Value::Str(StringId(index)),
            Kind::Stream => Value::Stream(StreamId(index)),
            Kind::Special => Value::Special(SpecialId(index)),
            Kind::Builtin => Value::Builtin(BuiltinId(index)),
        }
    }

    pub fn kind(self) -> Kind {
        match self {
            Value::Nil => Kind::Nil,
            Value::Symbol(_) => Kind::Symbol,
            Value::Pair(_) => Kind::Cons,
            Value::Gensym(_) => Kind::Gensym,
            Value::Str(_) => Kind::String,
            Value::Stream(_) => Kind::Stream,
            Value::Special(_) => Kind::Special,
            Value::Builtin(_) => Kind::Builtin,
        }
    }

    pub fn index(self) -> u64 {
        let raw = match self {
            Value::Nil => 0,
            Value::Symbol(id) => id.0,
            Value::Pair(id) => id.0,
            Value::Gensym(id) => id.0,
            Value::Str(id) => id.0,
            Value::Stream(id) => id.0,
            Value::Special(id) => id.0,
            Value::Builtin(id) => id.0,
        };
        raw as u64
    }

    /// Pack into a single machine word: the index above an 8-bit kind tag.
    /// Nil packs to 0.
    pub fn to_word(self) -> u64 {
        (self.index() << TAG_BITS) | self.kind() as u64
    }

    /// Inverse of [`Value::to_word`]. Returns None for an unknown tag, an index
    /// that does not fit the arena id width, or a nil tag with a non-zero index.
    pub fn from_word(word: u64) -> Option<Value> {
        let kind = Kind::from_tag((word & TAG_MASK) as u8)?;
        let index = u32::try_from(word >> TAG_BITS).ok()?;
        if kind == Kind::Nil && index != 0 {
            return None;
        }
        Some(Value::new(kind, index))
    }

    pub fn is_nil(self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_pair(self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn is_symbol(self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    pub fn as_pair(self) -> Option<PairId> {
        match self {
            Value::Pair(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_symbol(self) -> Option<SymbolId> {
        match self {
            Value::Symbol(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_string(self) -> Option<StringId> {
        match self {
            Value::Str(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Symbol(id) => write!(f, "Sym({})", id.0),
            Value::Pair(id) => write!(f, "Pair({})", id.0),
            Value::Gensym(id) => write!(f, "Gensym({})", id.0),
            Value::Str(id) => write!(f, "Str({})", id.0),
            Value::Stream(id) => write!(f, "Stream({})", id.0),
            Value::Special(id) => write!(f, "Special({})", id.0),
            Value::Builtin(id) => write!(f, "Builtin({})", id.0),
        }
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({})", self.0)
    }
}

impl fmt::Debug for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PairId({})", self.0)
    }
}

impl fmt::Debug for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringId({})", self.0)
    }
}

impl fmt::Debug for GensymId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GensymId({})", self.0)
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}

impl fmt::Debug for SpecialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpecialId({})", self.0)
    }
}

impl fmt::Debug for BuiltinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinId({})", self.0)
    }
}
