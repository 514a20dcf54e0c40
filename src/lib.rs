//! Parse `.env` text into an ordered mapping, resolving variable references
//! and inline commands as each line is read.
//!
//! [`parse_str`] is the common entry point. Build a [`Parser`] to choose the
//! substitution chain, for example to disable command execution:
//!
//! ```
//! use dotenv_resolve::{Parser, VariableSubstitution};
//!
//! let parser = Parser::literal().substitution(VariableSubstitution);
//! let env = parser.parse("HOST=localhost\nURL=\"http://${HOST}:$(port)\"").unwrap();
//! assert_eq!(env.get("URL"), Some("http://localhost:$(port)"));
//! ```
//!
//! Parsing never touches the process environment; seed the parser with
//! [`Parser::parse_with_seed`] to make existing variables visible to
//! references.

mod error;
mod model;
mod parser;
mod serialize;
pub mod substitution;
mod value;

pub use error::{Error, FormatError, FormatErrorKind};
pub use model::{EnvMap, Entry, Quote};
pub use parser::{Parser, parse_bytes, parse_reader, parse_str, parse_str_with_seed};
pub use substitution::{
    CommandOutput, CommandRunner, CommandSubstitution, ShellRunner, Substitution,
    VariableSubstitution,
};
