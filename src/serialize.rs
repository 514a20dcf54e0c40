use crate::model::EnvMap;

impl EnvMap {
    /// Render the mapping as dotenv text, one `KEY="VALUE"` line per entry.
    ///
    /// Parsing the output with the default parser yields an equal mapping:
    /// newlines, quotes and backslashes are escaped, and `$` and `` ` `` are
    /// escaped so no substitution fires.
    pub fn to_dotenv_string(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.iter() {
            out.push_str(key);
            out.push_str("=\"");
            push_escaped(&mut out, value);
            out.push_str("\"\n");
        }
        out
    }
}

fn push_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' | '"' | '$' | '`' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}
