use thiserror::Error;

/// Errors raised by the runtime. Every contract violation the evaluator,
/// reader or arenas detect surfaces here so an embedding host can drop a bad
/// top-level form and carry on. Only arena exhaustion is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LispError {
    /// An arena would grow past its configured cap.
    #[error("{arena} ran over memory budget")]
    BudgetExceeded { arena: &'static str },

    /// The reader hit an unexpected character or an unterminated construct.
    #[error("malformed syntax: {0}")]
    Syntax(String),

    /// Lookup, assignment or deletion of a variable with no binding.
    #[error("unbound variable {0}")]
    Unbound(String),

    /// A builtin was called with too few or too many arguments.
    /// `call` is the offending call as printed text.
    #[error("{problem} arguments in call {call}")]
    Arity { problem: &'static str, call: String },

    /// An operation received a value of the wrong kind.
    #[error("type error: {0}")]
    Type(String),

    /// `eval` met a value kind with no evaluation rule.
    #[error("cannot evaluate {0}")]
    Unevaluable(String),

    /// A parameter pattern did not match the shape of its arguments.
    #[error("cannot bind parameters: {0}")]
    Bind(String),

    /// I/O failure from a stream operation.
    #[error("I/O error: {0}")]
    Io(String),

    /// The evaluation step budget ran out, likely an infinite loop.
    #[error("step limit exceeded (possible infinite loop)")]
    StepLimit,

    /// Evaluation nested deeper than the configured depth budget.
    #[error("recursion depth limit exceeded")]
    DepthExceeded,
}

impl LispError {
    /// Fatal errors leave the runtime in a state where continuing makes no
    /// sense; hosts should report them and terminate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LispError::BudgetExceeded { .. })
    }
}

impl From<std::io::Error> for LispError {
    fn from(e: std::io::Error) -> Self {
        LispError::Io(e.to_string())
    }
}

pub type LispResult<T> = Result<T, LispError>;
