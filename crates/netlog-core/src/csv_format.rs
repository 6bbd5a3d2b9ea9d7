//! Minimal RFC 4180 reading and writing for report files.

pub(crate) const LINE_END: &str = "\r\n";

/// Quote a field when it contains a delimiter, quote or line break
pub(crate) fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub(crate) fn write_row<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    let line = fields
        .iter()
        .map(|f| escape(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str(LINE_END);
}

/// Format a float the way the report files expect: shortest form, at least one decimal
pub(crate) fn decimal(value: f64) -> String {
    let text = value.to_string();
    if text.contains(['.', 'e', 'N', 'i']) {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Parse CSV text into rows of fields, honoring quoted fields spanning lines
pub(crate) fn parse(content: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape(r#"{"id":"x"}"#), r#""{""id"":""x""}""#);
        assert_eq!(escape("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_decimal() {
        assert_eq!(decimal(0.0), "0.0");
        assert_eq!(decimal(12.35), "12.35");
        assert_eq!(decimal(1500.0), "1500.0");
    }

    #[test]
    fn test_parse_quoted_fields() {
        let mut out = String::new();
        write_row(&mut out, &["a", "b,c", "say \"hi\""]);
        write_row(&mut out, &["multi\nline", "", "end"]);

        let rows = parse(&out);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["a", "b,c", "say \"hi\""]);
        assert_eq!(rows[1], vec!["multi\nline", "", "end"]);
    }

    #[test]
    fn test_parse_without_trailing_newline() {
        let rows = parse("h1,h2\nv1,v2");
        assert_eq!(rows, vec![vec!["h1", "h2"], vec!["v1", "v2"]]);
    }
}
