use std::borrow::Cow;

use crate::model::{EnvMap, Quote};
use crate::substitution::Substitution;

/// A captured value on its way from raw line text to its bound form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Value<'a> {
    text: Cow<'a, str>,
    quote: Quote,
}

impl<'a> Value<'a> {
    /// Trim the raw capture and strip one enclosing pair of matching quotes.
    pub(crate) fn from_raw(raw: &'a str) -> Self {
        let trimmed = raw.trim();
        let quote = match trimmed.as_bytes() {
            [b'\'', .., b'\''] => Quote::Single,
            [b'"', .., b'"'] => Quote::Double,
            _ => Quote::None,
        };

        let text = match quote {
            Quote::None => trimmed,
            Quote::Single | Quote::Double => &trimmed[1..trimmed.len() - 1],
        };

        Self {
            text: Cow::Borrowed(text),
            quote,
        }
    }

    /// Expand escape sequences inside double quotes.
    pub(crate) fn unescape(self) -> Self {
        if self.quote != Quote::Double || !self.text.contains('\\') {
            return self;
        }

        Self {
            text: Cow::Owned(unescape_double_quoted(&self.text)),
            quote: self.quote,
        }
    }

    /// Run the substitution chain in order unless the value was single-quoted.
    pub(crate) fn substitute(self, env: &EnvMap, chain: &[Box<dyn Substitution>]) -> Self {
        if self.quote == Quote::Single {
            return self;
        }

        let text = chain.iter().fold(self.text, |text, strategy| {
            Cow::Owned(strategy.substitute(&text, env))
        });

        Self {
            text,
            quote: self.quote,
        }
    }

    pub(crate) fn into_string(self) -> String {
        self.text.into_owned()
    }
}

/// Resolve one raw captured value against the environment built so far.
pub(crate) fn resolve(raw: &str, env: &EnvMap, chain: &[Box<dyn Substitution>]) -> String {
    Value::from_raw(raw)
        .unescape()
        .substitute(env, chain)
        .into_string()
}

fn unescape_double_quoted(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            // Substitution markers keep their backslash so the strategies
            // can tell them apart from live references.
            Some(marker @ ('$' | '`')) => {
                out.push('\\');
                out.push(marker);
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
