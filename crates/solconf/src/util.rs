use crate::error::AddressingError;

/// Resolve a (possibly relative) module name against the absolute name of the current module
///
/// Names with leading dots are relative to the package containing `current`, every additional dot
/// walks up one package level. Names without leading dots are returned with any empty components
/// (`a..b`) resolved the same way.
///
/// ```
/// # use solconf::util::abs_mod_name;
/// assert_eq!(abs_mod_name("pkg.a.main", ".b").unwrap(), "pkg.a.b");
/// assert_eq!(abs_mod_name("pkg.a.main", "..b.c").unwrap(), "pkg.b.c");
/// assert!(abs_mod_name("pkg.main", "..b").is_err());
/// ```
pub fn abs_mod_name(current: &str, relative: &str) -> Result<String, AddressingError> {
    let concatenated = if relative.starts_with('.') {
        format!("{current}.{relative}")
    } else {
        relative.to_string()
    };

    let mut components: Vec<&str> = vec![];
    for component in concatenated.split('.') {
        if !component.is_empty() {
            components.push(component);
            continue;
        }

        // an empty component walks up one level, the package itself must remain
        if components.pop().is_none() || components.is_empty() {
            return Err(AddressingError::BeyondRoot(concatenated));
        }
    }

    Ok(components.join("."))
}

/// Render `text` as a quoted HCL string literal that parses back to `text`
///
/// Template sequences are escaped (`$${`, `%%{`) so the literal never interpolates.
pub fn hcl_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Replace characters that are not valid in file names
pub fn as_valid_filename(text: &str) -> String {
    text.replace(['/', '\\', ':'], "|")
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn relative_names() {
        assert_eq!(abs_mod_name("pkg.main", ".other").unwrap(), "pkg.other");
        assert_eq!(abs_mod_name("pkg.a.sub", "..other").unwrap(), "pkg.other");
        assert_eq!(abs_mod_name("pkg.a.b.sub", "...x.y").unwrap(), "pkg.x.y");
        assert_eq!(abs_mod_name("pkg.main", "pkg.x.y").unwrap(), "pkg.x.y");
    }

    #[test]
    fn beyond_root() {
        assert!(matches!(
            abs_mod_name("pkg.sub", "..other"),
            Err(AddressingError::BeyondRoot(name)) if name == "pkg.sub...other"
        ));
        assert!(abs_mod_name("pkg.a.sub", "...other").is_err());
    }

    #[test]
    fn quoted_literals() {
        assert_eq!(hcl_quote("plain"), r#""plain""#);
        assert_eq!(hcl_quote(r#"a "b" \c"#), r#""a \"b\" \\c""#);
        assert_eq!(hcl_quote("${x} %{y}"), r#""$${x} %%{y}""#);
        assert_eq!(hcl_quote("$$ 100%"), r#""$$ 100%""#);
        assert_eq!(hcl_quote("\u{7f}\n"), r#""\u007F\n""#);
    }

    #[test]
    fn filenames() {
        assert_eq!(as_valid_filename("a/b\\c:d"), "a|b|c|d");
    }
}
