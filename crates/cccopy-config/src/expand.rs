//! Path value expansion
//!
//! Template values may reference the home directory (`~`) and environment
//! variables in both `${VAR}` and `$VAR` spellings. Expansion failures are
//! configuration errors; a half-expanded path must never reach the sync
//! pipeline.

use crate::error::{ConfigError, ConfigResult};

/// Expand `~`, `${VAR}` and `$VAR` references in a template value.
pub fn expand_value(value: &str) -> ConfigResult<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.char_indices().peekable();

    if let Some(rest) = value.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') {
            let home = std::env::var("HOME")
                .map_err(|_| ConfigError::expansion(value, "HOME is not set"))?;
            out.push_str(&home);
            // Skip the consumed '~'
            chars.next();
        }
    }

    while let Some((idx, ch)) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some((_, '{')) => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed || name.is_empty() {
                    return Err(ConfigError::expansion(
                        value.to_string(),
                        format!("unterminated variable reference at byte {idx}"),
                    ));
                }
                out.push_str(&lookup_var(value, &name)?);
            }
            Some((_, c)) if c.is_ascii_alphabetic() || *c == '_' => {
                let mut name = String::new();
                while let Some((_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || *c == '_' {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&lookup_var(value, &name)?);
            }
            _ => out.push('$'),
        }
    }

    Ok(out)
}

fn lookup_var(value: &str, name: &str) -> ConfigResult<String> {
    std::env::var(name).map_err(|_| {
        ConfigError::expansion(value.to_string(), format!("variable '{name}' is not set"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_plain_value() {
        assert_eq!(expand_value("/opt/shared").unwrap(), "/opt/shared");
    }

    #[test]
    fn test_expand_tilde() {
        let home = std::env::var("HOME").unwrap();
        assert_eq!(expand_value("~/work").unwrap(), format!("{home}/work"));
        assert_eq!(expand_value("~").unwrap(), home);
    }

    #[test]
    fn test_tilde_mid_value_is_literal() {
        assert_eq!(expand_value("/a/~b").unwrap(), "/a/~b");
    }

    #[test]
    fn test_expand_braced_and_bare_variables() {
        std::env::set_var("CCCOPY_TEST_ROOT", "/srv/projects");
        assert_eq!(
            expand_value("${CCCOPY_TEST_ROOT}/alpha").unwrap(),
            "/srv/projects/alpha"
        );
        assert_eq!(
            expand_value("$CCCOPY_TEST_ROOT/alpha").unwrap(),
            "/srv/projects/alpha"
        );
    }

    #[test]
    fn test_unset_variable_is_an_error() {
        let err = expand_value("${CCCOPY_TEST_UNSET_VAR}").unwrap_err();
        assert!(err.to_string().contains("CCCOPY_TEST_UNSET_VAR"));
    }

    #[test]
    fn test_lone_dollar_is_literal() {
        assert_eq!(expand_value("price$").unwrap(), "price$");
        assert_eq!(expand_value("a$ b").unwrap(), "a$ b");
    }
}
