pub mod ast;
pub mod backend;
pub mod builtins;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod pipeline;
pub mod types;
