//! Kernel-side execution engine.
//!
//! Everything in this crate runs inside a kernel subprocess: the embedded
//! expression language (lexer, parser, evaluator), the jobject builder that
//! describes runtime values as JSON, the per-run namespace tree, and the
//! blocking request loop that talks framed JSON to the server over
//! stdin/stdout.
//!
//! A kernel is strictly single-threaded: one `RunCode` request is fully
//! processed, including all of its streamed output frames and the closing
//! `NewGlobals`, before the next request is read.

pub mod ast;
pub mod exec;
pub mod jobject;
pub mod lexer;
pub mod pack;
pub mod parser;
pub mod runtime;
pub mod value;

pub use exec::{ExecError, run_code};
pub use jobject::create_jobject;
pub use runtime::{KernelRuntime, run_kernel};
pub use value::{Namespace, Value, new_namespace};
