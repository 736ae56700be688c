//! override text
//!
//! `a.b = 1; c[0] = "x" + d` is two clauses. Clauses are separated by `;` or newlines outside of
//! strings, template interpolations and brackets, each one is `<path> = <expression>` split at the first top-level `=`.
use super::{Override, OverrideValue};
use crate::error::AddressingError;
use crate::source::unsupported_component;
use crate::var_path::VarPath;

/// Parse one or more override clauses
pub fn parse_overrides(text: &str) -> Result<Vec<Override>, AddressingError> {
    split_clauses(text)
        .into_iter()
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(parse_clause)
        .collect()
}

fn parse_clause(clause: &str) -> Result<Override, AddressingError> {
    let invalid = |reason: String| AddressingError::InvalidOverride {
        source_text: clause.to_string(),
        reason,
    };

    let (target, value) = split_assignment(clause)
        .ok_or_else(|| invalid("expected `<path> = <expression>`".to_string()))?;
    let (target, value) = (target.trim(), value.trim());

    let target = VarPath::parse(target)?;
    if target.is_empty() {
        return Err(invalid("missing target path".to_string()));
    }

    let expr: hcl_edit::expr::Expression = value
        .parse()
        .map_err(|err: hcl_edit::parser::Error| invalid(err.to_string()))?;
    let expr: hcl::Expression = expr.into();
    if let Some(component) = unsupported_component(&expr) {
        return Err(invalid(format!("unsupported expression component: {component}")));
    }

    tracing::trace!(path = %target, value, "parsed override");
    Ok(Override::new(
        Some(clause.to_string()),
        target,
        OverrideValue::Expr(expr),
        value.to_string(),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Nesting {
    Bracket,
    String,
    /// `${ ... }` or `%{ ... }` inside a string
    Interpolation,
}

/// Walks text and tracks whether the current character is nested in strings, interpolations or
/// brackets
struct Scanner<'a> {
    text: &'a str,
    stack: Vec<Nesting>,
    escaped: bool,
    /// the last template marker character in a string and how often it repeated
    marker: Option<(char, usize)>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            stack: vec![],
            escaped: false,
            marker: None,
        }
    }

    /// Byte offsets and characters at the top level
    fn top_level(mut self) -> impl Iterator<Item = (usize, char)> + 'a {
        let text = self.text;
        text.char_indices().filter(move |(_, c)| self.step(*c))
    }

    /// Advance over `c`, returns whether it is at the top level
    fn step(&mut self, c: char) -> bool {
        if self.stack.last() == Some(&Nesting::String) {
            self.step_in_string(c);
            return false;
        }

        match c {
            '"' => self.stack.push(Nesting::String),
            '(' | '[' | '{' => self.stack.push(Nesting::Bracket),
            ')' | ']' | '}' => {
                self.stack.pop();
            }
            _ => return self.stack.is_empty(),
        }
        false
    }

    fn step_in_string(&mut self, c: char) {
        let marker = self.marker.take();
        match c {
            _ if self.escaped => self.escaped = false,
            '\\' => self.escaped = true,
            '"' => {
                self.stack.pop();
            }
            '$' | '%' => {
                self.marker = match marker {
                    Some((previous, run)) if previous == c => Some((c, run + 1)),
                    _ => Some((c, 1)),
                }
            }
            // `$${` and `%%{` are escaped markers
            '{' if matches!(marker, Some((_, 1))) => self.stack.push(Nesting::Interpolation),
            _ => {}
        }
    }
}

fn split_clauses(text: &str) -> Vec<&str> {
    let mut clauses = vec![];
    let mut start = 0;
    for (index, c) in Scanner::new(text).top_level() {
        if c == ';' || c == '\n' {
            clauses.push(&text[start..index]);
            start = index + c.len_utf8();
        }
    }
    clauses.push(&text[start..]);
    clauses
}

/// Split at the first top-level `=` that is not part of a comparison operator
fn split_assignment(clause: &str) -> Option<(&str, &str)> {
    let bytes = clause.as_bytes();
    Scanner::new(clause)
        .top_level()
        .find(|(index, c)| {
            *c == '='
                && !matches!(index.checked_sub(1).map(|i| bytes[i]), Some(b'=' | b'!' | b'<' | b'>'))
                && bytes.get(index + 1) != Some(&b'=')
        })
        .map(|(index, _)| (&clause[..index], &clause[index + 1..]))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn clauses(text: &str) -> Vec<(String, String)> {
        parse_overrides(text)
            .unwrap()
            .into_iter()
            .map(|o| (o.target.as_str(), o.value_source))
            .collect()
    }

    #[test]
    fn splits_clauses() {
        assert_eq!(
            clauses("a = 1; b.c[0] = \"x;y\"\nd = [1, 2]\n\n"),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b.c[0]".to_string(), "\"x;y\"".to_string()),
                ("d".to_string(), "[1, 2]".to_string()),
            ]
        );
        assert_eq!(
            clauses(r#"a = "${upper("x;y")}"; b = "${ {k = ";"}.k }"; c = "$${d;e}""#),
            vec![
                ("a".to_string(), r#""${upper("x;y")}""#.to_string()),
                ("b".to_string(), r#""${ {k = ";"}.k }""#.to_string()),
                ("c".to_string(), r#""$${d;e}""#.to_string()),
            ]
        );
    }

    #[test]
    fn nested_separators_stay_in_values() {
        assert_eq!(
            clauses("a = {\n  x = 1\n  y = 2\n}"),
            vec![("a".to_string(), "{\n  x = 1\n  y = 2\n}".to_string())]
        );
        assert_eq!(
            split_clauses("b = f(1; 2); c = [\n1\n]"),
            vec!["b = f(1; 2)", " c = [\n1\n]"]
        );
    }

    #[test]
    fn comparisons_are_not_assignments() {
        assert_eq!(
            clauses("a = b == c; d = e >= 1"),
            vec![
                ("a".to_string(), "b == c".to_string()),
                ("d".to_string(), "e >= 1".to_string()),
            ]
        );
        assert_eq!(split_assignment("a == b"), None);
    }

    #[test]
    fn rejects_invalid_clauses() {
        for text in ["a", "= 1", "a = ", "a = [for x in y : x]", "a + 1 = 2", "a = b[*]"] {
            assert!(parse_overrides(text).is_err(), "{text}");
        }
    }

    #[test]
    fn keeps_source() {
        let overrides = parse_overrides(r#"model.layers[1]["size"] = 2 * base"#).unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].target.as_str(), r#"model.layers[1]["size"]"#);
        assert_eq!(
            overrides[0].source.as_deref(),
            Some(r#"model.layers[1]["size"] = 2 * base"#)
        );
    }
}
