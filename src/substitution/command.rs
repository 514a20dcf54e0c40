use std::io;
use std::process::{Command, Stdio};

use log::{debug, warn};

use super::{Substitution, is_escaped};
use crate::model::EnvMap;

/// Captured result of one inline command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
        }
    }

    pub fn failure() -> Self {
        Self::default()
    }
}

/// Process-spawning capability used by [`CommandSubstitution`].
pub trait CommandRunner: Send + Sync {
    /// Run `command` with `env` layered over the inherited environment.
    fn run(&self, command: &str, env: &EnvMap) -> io::Result<CommandOutput>;
}

impl<F> CommandRunner for F
where
    F: Fn(&str, &EnvMap) -> io::Result<CommandOutput> + Send + Sync,
{
    fn run(&self, command: &str, env: &EnvMap) -> io::Result<CommandOutput> {
        self(command, env)
    }
}

/// Runs commands through the platform shell (`sh -c` or `cmd /C`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRunner {
    program: String,
    flag: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `program flag <command>` instead of the platform shell.
    pub fn with_shell(program: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            flag: flag.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        if cfg!(windows) {
            Self::with_shell("cmd", "/C")
        } else {
            Self::with_shell("sh", "-c")
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, env: &EnvMap) -> io::Result<CommandOutput> {
        let output = Command::new(&self.program)
            .arg(&self.flag)
            .arg(command)
            .envs(env.iter())
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// Replaces `$(command)` and `` `command` `` with the command's standard output.
///
/// Trailing newlines are trimmed from the output. A command that cannot be
/// spawned or exits unsuccessfully is replaced by the empty string; parsing
/// carries on. A preceding backslash keeps the text literal.
#[derive(Debug, Clone, Default)]
pub struct CommandSubstitution<R = ShellRunner> {
    runner: R,
}

impl CommandSubstitution<ShellRunner> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: CommandRunner> CommandSubstitution<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn execute(&self, command: &str, env: &EnvMap) -> String {
        debug!("running command substitution `{command}`");
        match self.runner.run(command, env) {
            Ok(output) if output.success => {
                output.stdout.trim_end_matches(['\n', '\r']).to_owned()
            }
            Ok(_) => {
                warn!("command `{command}` exited unsuccessfully; substituting empty string");
                String::new()
            }
            Err(err) => {
                warn!("failed to run command `{command}`: {err}; substituting empty string");
                String::new()
            }
        }
    }
}

impl<R: CommandRunner> Substitution for CommandSubstitution<R> {
    fn substitute(&self, value: &str, env: &EnvMap) -> String {
        if !value.contains("$(") && !value.contains('`') {
            return value.to_owned();
        }

        let bytes = value.as_bytes();
        let mut out = String::with_capacity(value.len());
        let mut cursor = 0usize;
        let mut idx = 0usize;

        while idx < bytes.len() {
            let span = match bytes[idx] {
                b'$' if bytes.get(idx + 1) == Some(&b'(') => dollar_paren_span(bytes, idx),
                b'`' => backtick_span(bytes, idx),
                _ => {
                    idx += 1;
                    continue;
                }
            };

            if is_escaped(bytes, idx) {
                // An escaped backtick is a single literal character.
                let end = match (bytes[idx], span) {
                    (b'$', Some(span)) => span.end,
                    _ => idx + 1,
                };
                out.push_str(&value[cursor..idx - 1]);
                out.push_str(&value[idx..end]);
                cursor = end;
                idx = end;
                continue;
            }

            let Some(span) = span else {
                idx += 1;
                continue;
            };

            out.push_str(&value[cursor..idx]);
            out.push_str(&self.execute(&value[span.command_start..span.command_end], env));
            cursor = span.end;
            idx = span.end;
        }

        out.push_str(&value[cursor..]);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    command_start: usize,
    command_end: usize,
    end: usize,
}

/// `$(...)` with balanced nested parentheses.
fn dollar_paren_span(bytes: &[u8], start: usize) -> Option<Span> {
    let mut depth = 0usize;
    for (idx, byte) in bytes.iter().enumerate().skip(start + 1) {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(Span {
                        command_start: start + 2,
                        command_end: idx,
                        end: idx + 1,
                    });
                }
            }
            _ => {}
        }
    }
    None
}

fn backtick_span(bytes: &[u8], start: usize) -> Option<Span> {
    let close = bytes
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(idx, byte)| **byte == b'`' && !is_escaped(bytes, *idx))
        .map(|(idx, _)| idx)?;

    Some(Span {
        command_start: start + 1,
        command_end: close,
        end: close + 1,
    })
}
