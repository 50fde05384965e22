//! Minimal deb822 paragraph handling shared by the index formats.

use crate::{AptRepositoryError, Result};

/// A parsed paragraph: field names in original case, values with
/// continuation lines joined by `\n` (leading whitespace preserved).
pub type Fields = Vec<(String, String)>;

/// Parse a single deb822 paragraph.
pub fn parse_paragraph(paragraph: &str) -> Result<Fields> {
    let mut fields: Fields = Vec::new();

    for line in paragraph.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            match fields.last_mut() {
                Some((_, value)) => {
                    value.push('\n');
                    value.push_str(line);
                }
                None => {
                    return Err(AptRepositoryError::invalid_metadata(format!(
                        "Continuation line without field: {}",
                        line
                    )))
                }
            }
        } else if let Some((name, value)) = line.split_once(':') {
            fields.push((name.trim().to_string(), value.trim().to_string()));
        } else {
            return Err(AptRepositoryError::invalid_metadata(format!(
                "Invalid line format: {}",
                line
            )));
        }
    }

    Ok(fields)
}

/// Split a deb822 document into paragraphs and parse each.
pub fn parse_paragraphs(content: &str) -> Result<Vec<Fields>> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.trim().is_empty() {
                paragraphs.push(parse_paragraph(&current)?);
            }
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        paragraphs.push(parse_paragraph(&current)?);
    }

    Ok(paragraphs)
}

/// Case-insensitive field lookup.
pub fn field<'a>(fields: &'a Fields, name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Render a long description body as deb822 continuation lines.
///
/// Every line gains a leading space; empty lines become ` .`.
pub fn format_long_description(long: &str) -> String {
    long.lines()
        .map(|line| {
            if line.trim().is_empty() {
                " .".to_string()
            } else {
                format!(" {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render `Field: summary` plus the continuation lines of `long`.
pub fn format_description_field(name: &str, summary: &str, long: Option<&str>) -> String {
    let mut out = format!("{}: {}\n", name, summary);
    if let Some(long) = long.filter(|l| !l.trim().is_empty()) {
        out.push_str(&format_long_description(long));
        out.push('\n');
    }
    out
}
