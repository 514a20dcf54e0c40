use log::trace;

use super::{Substitution, is_escaped};
use crate::model::EnvMap;

/// Expands `$NAME`, `${NAME}`, `${NAME:-default}` and `${NAME-default}`.
///
/// Names resolve against the environment bound so far; an unset name with no
/// default expands to the empty string. `\$` keeps the reference literal and
/// `$(` is left untouched for command substitution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableSubstitution;

impl Substitution for VariableSubstitution {
    fn substitute(&self, value: &str, env: &EnvMap) -> String {
        expand(value, env)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback<'a> {
    /// `${NAME}` or `$NAME`.
    None,
    /// `${NAME-default}`: used when the name is unbound.
    Unset(&'a str),
    /// `${NAME:-default}`: used when the name is unbound or empty.
    UnsetOrEmpty(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reference<'a> {
    name: &'a str,
    fallback: Fallback<'a>,
    end: usize,
}

fn expand(input: &str, env: &EnvMap) -> String {
    if !input.contains('$') {
        return input.to_owned();
    }

    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0usize;
    let mut idx = 0usize;

    while idx < bytes.len() {
        if bytes[idx] != b'$' || bytes.get(idx + 1) == Some(&b'(') {
            idx += 1;
            continue;
        }

        let reference = parse_reference(input, idx);

        if is_escaped(bytes, idx) {
            let end = reference.map_or(idx + 1, |reference| reference.end);
            out.push_str(&input[cursor..idx - 1]);
            out.push_str(&input[idx..end]);
            cursor = end;
            idx = end;
            continue;
        }

        let Some(reference) = reference else {
            idx += 1;
            continue;
        };

        out.push_str(&input[cursor..idx]);
        out.push_str(&lookup(reference, env));
        cursor = reference.end;
        idx = reference.end;
    }

    out.push_str(&input[cursor..]);
    out
}

fn lookup(reference: Reference<'_>, env: &EnvMap) -> String {
    let bound = env.get(reference.name);
    trace!(
        "interpolating `{}` (bound: {})",
        reference.name,
        bound.is_some()
    );

    match (bound, reference.fallback) {
        (Some(value), Fallback::UnsetOrEmpty(default)) if value.is_empty() => expand(default, env),
        (Some(value), _) => value.to_owned(),
        (None, Fallback::Unset(default) | Fallback::UnsetOrEmpty(default)) => {
            expand(default, env)
        }
        (None, Fallback::None) => String::new(),
    }
}

fn parse_reference(input: &str, start: usize) -> Option<Reference<'_>> {
    let bytes = input.as_bytes();
    let next = *bytes.get(start + 1)?;

    if next != b'{' {
        let name_start = start + 1;
        let name_end = scan(bytes, name_start, is_unbraced_var_char);
        if name_end == name_start {
            return None;
        }
        return Some(Reference {
            name: &input[name_start..name_end],
            fallback: Fallback::None,
            end: name_end,
        });
    }

    let name_start = start + 2;
    let name_end = scan(bytes, name_start, is_braced_var_char);
    if name_end == name_start {
        return None;
    }
    let close = find_closing_brace(bytes, name_end)?;
    let name = &input[name_start..name_end];
    let modifier = &input[name_end..close];

    let fallback = if modifier.is_empty() {
        Fallback::None
    } else if let Some(default) = modifier.strip_prefix(":-") {
        Fallback::UnsetOrEmpty(default)
    } else if let Some(default) = modifier.strip_prefix('-') {
        Fallback::Unset(default)
    } else {
        return None;
    };

    Some(Reference {
        name,
        fallback,
        end: close + 1,
    })
}

fn scan(bytes: &[u8], from: usize, accept: fn(u8) -> bool) -> usize {
    let mut end = from;
    while end < bytes.len() && accept(bytes[end]) {
        end += 1;
    }
    end
}

/// Find the `}` closing a `${`, skipping over nested `${...}` in defaults.
fn find_closing_brace(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut idx = from;
    while idx < bytes.len() {
        match bytes[idx] {
            b'{' if idx > 0 && bytes[idx - 1] == b'$' => depth += 1,
            b'}' if depth == 0 => return Some(idx),
            b'}' => depth -= 1,
            _ => {}
        }
        idx += 1;
    }
    None
}

fn is_unbraced_var_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn is_braced_var_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.'
}
