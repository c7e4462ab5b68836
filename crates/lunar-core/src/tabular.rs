//! Line tokenizer for administration tool output

/// How a tool separates the fields of one output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `key: value` style verbose listings (`stmfadm`)
    FieldChar(char),
    /// Column-aligned or tab-separated output (`zfs -H`, `itadm`)
    Whitespace,
}

impl Delimiter {
    /// The colon delimiter used by `stmfadm` verbose listings
    pub const COLON: Delimiter = Delimiter::FieldChar(':');
}

/// Split a single line into trimmed, non-empty tokens
pub fn tokenize_line(line: &str, delimiter: Delimiter) -> Vec<String> {
    match delimiter {
        Delimiter::FieldChar(c) => line
            .split(c)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Delimiter::Whitespace => line.split_whitespace().map(str::to_string).collect(),
    }
}

/// Tokenize every line, keeping one row per line (blank lines become empty rows)
pub fn tokenize(lines: &[String], delimiter: Delimiter) -> Vec<Vec<String>> {
    lines
        .iter()
        .map(|line| tokenize_line(line, delimiter))
        .collect()
}

/// Split a line at its first delimiter run into `[key, value]`
///
/// The value keeps its inner spacing, so free-form fields such as user
/// property values survive intact. An empty value leaves a one-cell row and a
/// blank line an empty row.
pub fn split_pair(line: &str, delimiter: Delimiter) -> Vec<String> {
    let line = line.trim_start().trim_end_matches(['\n', '\r']);
    let is_delim = |c: char| match delimiter {
        Delimiter::FieldChar(d) => c == d,
        Delimiter::Whitespace => c.is_whitespace(),
    };

    let Some(at) = line.find(is_delim) else {
        let key = line.trim_end();
        return if key.is_empty() { Vec::new() } else { vec![key.to_string()] };
    };
    let key = line[..at].trim_end().to_string();
    let value = line[at..].trim_start_matches(is_delim);
    let value = match delimiter {
        Delimiter::FieldChar(_) => value.trim(),
        Delimiter::Whitespace => value,
    };
    if value.is_empty() {
        vec![key]
    } else {
        vec![key, value.to_string()]
    }
}

/// [`split_pair`] applied to every line
pub fn split_pairs(lines: &[String], delimiter: Delimiter) -> Vec<Vec<String>> {
    lines
        .iter()
        .map(|line| split_pair(line, delimiter))
        .collect()
}

/// Rewrite ` = ` to `=`
///
/// `itadm list-target -v` prints defaulted fields as `auth: none = default`,
/// which would otherwise tokenize into an extra cell. Only apply this to that
/// command's output.
pub fn normalize_assignments(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| line.replace(" = ", "="))
        .collect()
}
