use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::sync::LazyLock;

use log::{debug, trace};
use regex::Regex;

use crate::error::{Error, FormatError, FormatErrorKind};
use crate::model::EnvMap;
use crate::substitution::{Substitution, default_chain};
use crate::value;

/// `KEY=VALUE` or `KEY: VALUE`, optionally prefixed by `export` and followed
/// by a comment. Group 1 is the key, group 2 the raw value.
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        \A
        \s*
        (?:export\s+)?
        ([A-Za-z0-9_.]+)
        (?:\s*=\s*|:\s+)
        (
            '(?:\\'|[^'])*'
            |
            "(?:\\"|[^"])*"
            |
            [^\#\n]+
        )?
        \s*
        (?:\#.*)?
        \z
        "#,
    )
    .expect("assignment pattern is valid")
});

static BLANK_OR_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\s*(?:#.*)?\z").expect("comment pattern is valid"));

/// Parse dotenv text with the default substitution chain.
pub fn parse_str(input: &str) -> Result<EnvMap, Error> {
    parse_str_with_seed(input, EnvMap::new())
}

/// Parse dotenv text, resolving references against `seed` before earlier lines.
pub fn parse_str_with_seed(input: &str, seed: EnvMap) -> Result<EnvMap, Error> {
    Parser::new()
        .parse_with_seed(input, seed)
        .map_err(Error::from)
}

/// Parse dotenv text from UTF-8 bytes.
pub fn parse_bytes(input: &[u8]) -> Result<EnvMap, Error> {
    let text = std::str::from_utf8(input)?;
    parse_str(text)
}

/// Parse dotenv text from a reader.
pub fn parse_reader<R: Read>(mut reader: R) -> Result<EnvMap, Error> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    parse_bytes(&buf)
}

/// Line-by-line dotenv parser carrying its own substitution chain.
///
/// Each assignment is resolved against the bindings made by the lines before
/// it, so a value can refer to earlier keys but never to later ones.
pub struct Parser {
    substitutions: Vec<Box<dyn Substitution>>,
}

impl Parser {
    /// Parser with variable interpolation followed by command substitution.
    pub fn new() -> Self {
        Self::with_substitutions(default_chain())
    }

    /// Parser that binds values without any substitution.
    pub fn literal() -> Self {
        Self::with_substitutions(Vec::new())
    }

    pub fn with_substitutions(substitutions: Vec<Box<dyn Substitution>>) -> Self {
        Self { substitutions }
    }

    /// Append a strategy to the end of the chain.
    pub fn substitution(mut self, substitution: impl Substitution + 'static) -> Self {
        self.substitutions.push(Box::new(substitution));
        self
    }

    pub fn substitutions(&self) -> &[Box<dyn Substitution>] {
        &self.substitutions
    }

    pub fn parse(&self, input: &str) -> Result<EnvMap, FormatError> {
        self.parse_with_seed(input, EnvMap::new())
    }

    /// Parse `input` on top of `seed`. Seeded bindings stay in the result.
    pub fn parse_with_seed(&self, input: &str, seed: EnvMap) -> Result<EnvMap, FormatError> {
        let normalized = normalize_newlines(input);
        let mut env = seed;

        for (idx, line) in normalized.split('\n').enumerate() {
            let line_number = u32::try_from(idx + 1).unwrap_or(u32::MAX);
            self.parse_line(line, line_number, &mut env)
                .inspect_err(|err| debug!("aborting parse: {err}"))?;
        }

        Ok(env)
    }

    fn parse_line(&self, line: &str, line_number: u32, env: &mut EnvMap) -> Result<(), FormatError> {
        if let Some(captures) = ASSIGNMENT.captures(line) {
            let key = &captures[1];
            let raw = captures.get(2).map_or("", |raw| raw.as_str());
            let value = value::resolve(raw, env, &self.substitutions);
            trace!("line {line_number}: binding `{key}`");
            env.insert_at(key.to_owned(), value, line_number);
            return Ok(());
        }

        let mut words = line.split_whitespace();
        if words.next() == Some("export") {
            return match words.find(|name| !env.contains_key(name)) {
                Some(name) => Err(FormatError::new(
                    line_number,
                    line,
                    FormatErrorKind::UnsetVariable {
                        name: name.to_owned(),
                    },
                )),
                None => Ok(()),
            };
        }

        if BLANK_OR_COMMENT.is_match(line) {
            return Ok(());
        }

        Err(FormatError::new(line_number, line, FormatErrorKind::Malformed))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("substitutions", &self.substitutions.len())
            .finish()
    }
}

fn normalize_newlines(input: &str) -> Cow<'_, str> {
    if !input.contains('\r') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            out.push('\n');
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            continue;
        }
        out.push(ch);
    }

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(input: &str) -> Result<EnvMap, FormatError> {
        Parser::literal().parse(input)
    }

    fn pairs(map: &EnvMap) -> Vec<(&str, &str)> {
        map.iter().collect()
    }

    #[test]
    fn parses_basic_values_and_comments() {
        let input = "A=1\nB = 2\n# skip\nC=hello # comment\nD=\n";
        let parsed = literal(input).expect("parse should succeed");

        assert_eq!(
            pairs(&parsed),
            [("A", "1"), ("B", "2"), ("C", "hello"), ("D", "")]
        );
    }

    #[test]
    fn parses_export_and_quotes() {
        let input = "export QUOTED=\"line\\nvalue\"\nSINGLE='raw value'\n";
        let parsed = literal(input).expect("parse should succeed");

        assert_eq!(
            pairs(&parsed),
            [("QUOTED", "line\nvalue"), ("SINGLE", "raw value")]
        );
    }

    #[test]
    fn parses_yaml_style_separator() {
        let parsed = literal("HOST: example.com\nPORT:  8080").expect("parse should succeed");
        assert_eq!(pairs(&parsed), [("HOST", "example.com"), ("PORT", "8080")]);
    }

    #[test]
    fn colon_without_whitespace_is_malformed() {
        let err = literal("HOST:example.com").expect_err("expected format error");
        assert_eq!(err.kind, FormatErrorKind::Malformed);
        assert_eq!(err.line, "HOST:example.com");
    }

    #[test]
    fn keys_may_contain_dots() {
        let parsed = literal("app.name=demo").expect("parse should succeed");
        assert_eq!(parsed.get("app.name"), Some("demo"));
    }

    #[test]
    fn duplicate_keys_keep_last_value() {
        let parsed = literal("A=1\nB=x\nA=2\n").expect("parse should succeed");

        assert_eq!(pairs(&parsed), [("A", "2"), ("B", "x")]);
        assert_eq!(parsed.get_entry("A").map(|entry| entry.line), Some(3));
    }

    #[test]
    fn empty_values_with_trailing_comment() {
        let parsed = literal("A=\nB= # nothing\nC=''").expect("parse should succeed");
        assert_eq!(pairs(&parsed), [("A", ""), ("B", ""), ("C", "")]);
    }

    #[test]
    fn quoted_values_keep_inner_whitespace_and_hashes() {
        let input = "A=\"  spaced # not a comment \"  # comment\nB='#hash'";
        let parsed = literal(input).expect("parse should succeed");

        assert_eq!(
            pairs(&parsed),
            [("A", "  spaced # not a comment "), ("B", "#hash")]
        );
    }

    #[test]
    fn escaped_quotes_inside_quoted_values() {
        let parsed = literal(r#"A="say \"hi\"""#).expect("parse should succeed");
        assert_eq!(parsed.get("A"), Some("say \"hi\""));

        let parsed = literal(r"B='it\'s'").expect("parse should succeed");
        assert_eq!(parsed.get("B"), Some(r"it\'s"));
    }

    #[test]
    fn unquoted_value_with_inner_quote_is_kept_verbatim() {
        let parsed = literal("A=\"open\nB=x\"y").expect("parse should succeed");
        assert_eq!(pairs(&parsed), [("A", "\"open"), ("B", "x\"y")]);
    }

    #[test]
    fn carriage_returns_separate_lines() {
        let parsed = literal("A=1\r\nB=2\rC=3\n\n\r\nD=4").expect("parse should succeed");
        assert_eq!(pairs(&parsed), [("A", "1"), ("B", "2"), ("C", "3"), ("D", "4")]);
    }

    #[test]
    fn malformed_line_reports_exact_text_and_line_number() {
        let err = literal("A=1\n\n  not a valid line!!!").expect_err("expected format error");

        assert_eq!(err.line_number, 3);
        assert_eq!(err.line, "  not a valid line!!!");
        assert_eq!(err.kind, FormatErrorKind::Malformed);
        assert_eq!(
            err.to_string(),
            "line 3: \"  not a valid line!!!\" doesn't match format"
        );
    }

    #[test]
    fn bare_export_requires_bound_names() {
        let parsed = literal("A=1\nB=2\nexport A B").expect("parse should succeed");
        assert_eq!(pairs(&parsed), [("A", "1"), ("B", "2")]);

        let err = literal("A=1\nexport A MISSING").expect_err("expected format error");
        assert_eq!(
            err.kind,
            FormatErrorKind::UnsetVariable {
                name: "MISSING".to_owned()
            }
        );
        assert_eq!(err.line, "export A MISSING");
    }

    #[test]
    fn bare_export_sees_seed_and_bare_keyword_is_noop() {
        let seed: EnvMap = [("FROM_SEED", "1")].into_iter().collect();
        let parsed = Parser::literal()
            .parse_with_seed("export FROM_SEED\nexport", seed)
            .expect("parse should succeed");
        assert_eq!(pairs(&parsed), [("FROM_SEED", "1")]);
    }

    #[test]
    fn export_prefix_needs_whitespace() {
        let parsed = literal("exportA=1").expect("parse should succeed");
        assert_eq!(parsed.get("exportA"), Some("1"));
    }

    #[test]
    fn references_resolve_only_against_earlier_lines() {
        let parsed = Parser::new()
            .parse("B=${A}\nA=1\nC=$A")
            .expect("parse should succeed");
        assert_eq!(pairs(&parsed), [("B", ""), ("A", "1"), ("C", "1")]);
    }

    #[test]
    fn self_reference_uses_previous_binding() {
        let parsed = Parser::new()
            .parse("PATH_LIST=/bin\nPATH_LIST=$PATH_LIST:/usr/bin")
            .expect("parse should succeed");
        assert_eq!(parsed.get("PATH_LIST"), Some("/bin:/usr/bin"));
    }

    #[test]
    fn custom_chain_replaces_command_execution() {
        let parser = Parser::with_substitutions(Vec::new())
            .substitution(crate::substitution::VariableSubstitution)
            .substitution(|value: &str, _env: &EnvMap| value.replace("$(whoami)", "tester"));

        let parsed = parser
            .parse("USER_NAME=\"$(whoami)\"\nGREETING=\"hi $USER_NAME\"")
            .expect("parse should succeed");
        assert_eq!(parsed.get("GREETING"), Some("hi tester"));
        assert_eq!(parser.substitutions().len(), 2);
    }

    #[test]
    fn parse_reader_reads_everything() {
        let reader = std::io::Cursor::new("KEY=value\n");
        let parsed = parse_reader(reader).expect("parse should succeed");
        assert_eq!(parsed.get("KEY"), Some("value"));
    }

    #[test]
    fn parse_bytes_rejects_invalid_utf8() {
        let err = parse_bytes(b"A=\xff").expect_err("expected encoding error");
        assert!(matches!(err, Error::InvalidEncoding(_)));
    }

    #[test]
    fn parse_str_wraps_format_errors() {
        let err = parse_str("???").expect_err("expected format error");
        match err {
            Error::Format(format_err) => assert_eq!(format_err.line, "???"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
