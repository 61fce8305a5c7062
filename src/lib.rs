//! A small Lisp: tagged values over growable arenas, frame-chained
//! environments, and a tree-walking evaluator with closures, macros and
//! quasiquotation.

pub mod bootstrap;
pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod heap;
pub mod printer;
pub mod reader;
pub mod registry;
pub mod selftest;
pub mod stream;
pub mod strings;
pub mod symbol;
pub mod value;

pub use config::MachineConfig;
pub use error::{LispError, LispResult};
pub use eval::{Machine, Step};
pub use value::{Kind, Value};
