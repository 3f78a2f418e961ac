//! Compose-style variable interpolation
//!
//! Substitutes `$VAR`, `${VAR}`, `${VAR:-default}`, `${VAR-default}`,
//! `${VAR:?err}` and `${VAR?err}` in the string scalars of a parsed YAML
//! value tree. `$$` escapes a literal dollar. Substitution happens on the
//! value tree, not on raw text, so a substituted value containing `:` or
//! `#` cannot corrupt the surrounding document.

use serde_yaml::Value;

use crate::domain::error::DomainError;

/// Result of interpolating a document.
#[derive(Debug)]
pub struct Interpolated {
    pub value: Value,
    /// Variables that were unset and had no default; substituted empty.
    pub missing: Vec<String>,
}

/// Interpolate every string scalar in the document.
///
/// Mapping keys are left untouched; compose only substitutes values.
pub fn interpolate_document(
    value: Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Interpolated, DomainError> {
    let mut missing = Vec::new();
    let value = walk(value, lookup, &mut missing)?;
    Ok(Interpolated { value, missing })
}

fn walk(
    value: Value,
    lookup: &dyn Fn(&str) -> Option<String>,
    missing: &mut Vec<String>,
) -> Result<Value, DomainError> {
    match value {
        Value::String(s) => Ok(Value::String(interpolate_str(&s, lookup, missing)?)),
        Value::Sequence(seq) => Ok(Value::Sequence(
            seq.into_iter()
                .map(|v| walk(v, lookup, missing))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Value::Mapping(map) => {
            let mut out = serde_yaml::Mapping::with_capacity(map.len());
            for (key, val) in map {
                out.insert(key, walk(val, lookup, missing)?);
            }
            Ok(Value::Mapping(out))
        }
        other => Ok(other),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Interpolate a single string.
pub fn interpolate_str(
    input: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
    missing: &mut Vec<String>,
) -> Result<String, DomainError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '$' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        // At a '$': escape, braced reference, bare reference, or literal.
        match chars.get(i + 1) {
            Some('$') => {
                out.push('$');
                i += 2;
            }
            Some('{') => {
                let end = matching_brace(&chars, i + 1)
                    .ok_or_else(|| DomainError::UnterminatedReference(input.to_string()))?;
                let inner: String = chars[i + 2..end].iter().collect();
                out.push_str(&resolve_braced(&inner, lookup, missing)?);
                i = end + 1;
            }
            Some(&c) if is_name_char(c) && !c.is_ascii_digit() => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_name_char(chars[end]) {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                out.push_str(&resolve_plain(&name, lookup, missing));
                i = end;
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }

    Ok(out)
}

/// Find the index of the `}` closing the `{` at `open`, honoring nesting.
fn matching_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn resolve_plain(
    name: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
    missing: &mut Vec<String>,
) -> String {
    match lookup(name) {
        Some(value) => value,
        None => {
            if !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
            String::new()
        }
    }
}

/// Resolve the inside of a `${...}` reference.
fn resolve_braced(
    inner: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
    missing: &mut Vec<String>,
) -> Result<String, DomainError> {
    let name_end = inner.find(|c: char| !is_name_char(c)).unwrap_or(inner.len());
    let name = &inner[..name_end];
    let rest = &inner[name_end..];

    if name.is_empty() {
        return Err(DomainError::Syntax {
            message: format!("invalid variable reference: ${{{inner}}}"),
        });
    }

    let value = lookup(name);

    if rest.is_empty() {
        return Ok(resolve_plain(name, lookup, missing));
    }

    let (empty_counts, operand) = if let Some(operand) = rest.strip_prefix(":-") {
        (true, Operand::Default(operand))
    } else if let Some(operand) = rest.strip_prefix(":?") {
        (true, Operand::Required(operand))
    } else if let Some(operand) = rest.strip_prefix('-') {
        (false, Operand::Default(operand))
    } else if let Some(operand) = rest.strip_prefix('?') {
        (false, Operand::Required(operand))
    } else {
        return Err(DomainError::Syntax {
            message: format!("invalid variable reference: ${{{inner}}}"),
        });
    };

    let unset = match &value {
        None => true,
        Some(v) => empty_counts && v.is_empty(),
    };

    match operand {
        Operand::Default(default) => {
            if unset {
                // Defaults may themselves contain references.
                interpolate_str(default, lookup, missing)
            } else {
                Ok(value.unwrap_or_default())
            }
        }
        Operand::Required(message) => {
            if unset {
                Err(DomainError::RequiredVariable {
                    name: name.to_string(),
                    message: if message.is_empty() {
                        "required".to_string()
                    } else {
                        message.to_string()
                    },
                })
            } else {
                Ok(value.unwrap_or_default())
            }
        }
    }
}

enum Operand<'a> {
    Default(&'a str),
    Required(&'a str),
}
