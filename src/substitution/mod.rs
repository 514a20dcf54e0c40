//! Substitution strategies applied to unquoted and double-quoted values.
//!
//! A [`Parser`](crate::Parser) folds each value through an ordered list of
//! strategies. The default list is [`VariableSubstitution`] followed by
//! [`CommandSubstitution`].

mod command;
mod variable;

pub use command::{CommandOutput, CommandRunner, CommandSubstitution, ShellRunner};
pub use variable::VariableSubstitution;

use crate::model::EnvMap;

/// Rewrites a value using the environment bound by earlier lines.
pub trait Substitution: Send + Sync {
    fn substitute(&self, value: &str, env: &EnvMap) -> String;
}

impl<F> Substitution for F
where
    F: Fn(&str, &EnvMap) -> String + Send + Sync,
{
    fn substitute(&self, value: &str, env: &EnvMap) -> String {
        self(value, env)
    }
}

/// Variable interpolation, then command execution.
pub fn default_chain() -> Vec<Box<dyn Substitution>> {
    vec![
        Box::new(VariableSubstitution),
        Box::new(CommandSubstitution::new()),
    ]
}

/// Whether the byte at `idx` is escaped by a single preceding backslash.
pub(crate) fn is_escaped(bytes: &[u8], idx: usize) -> bool {
    idx > 0 && bytes[idx - 1] == b'\\'
}
