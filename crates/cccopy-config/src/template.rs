//! Project template (INI) parsing
//!
//! The template format is a small INI dialect: `[SECTION]` headers,
//! `KEY = VALUE` pairs, full-line comments starting with `;` or `#`, and
//! inline comments introduced by either character. `[SOURCES]` and
//! `[EXCLUDES]` use numbered keys whose numeric order defines pattern
//! precedence.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// Parsed template: section name → (key → value), keys uppercased.
#[derive(Debug, Clone, Default)]
pub struct Template {
    sections: BTreeMap<String, Vec<(String, String)>>,
}

impl Template {
    /// Parse a template file from disk.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse template text.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut sections: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[') {
                let Some(name) = name.strip_suffix(']') else {
                    return Err(format!("line {}: unterminated section header", lineno + 1));
                };
                let name = name.trim().to_ascii_uppercase();
                current = Some(name.clone());
                sections.entry(name).or_default();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(format!("line {}: expected 'KEY = VALUE'", lineno + 1));
            };
            let Some(section) = current.as_ref() else {
                return Err(format!("line {}: key outside of any section", lineno + 1));
            };
            let key = key.trim().to_ascii_uppercase();
            let value = strip_inline_comment(value).trim().to_string();
            if key.is_empty() {
                return Err(format!("line {}: empty key", lineno + 1));
            }
            if let Some(entries) = sections.get_mut(section) {
                entries.push((key, value));
            }
        }

        Ok(Self { sections })
    }

    /// Look up a single value; empty values read as absent.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(&section.to_ascii_uppercase())?
            .iter()
            .find(|(k, _)| k == &key.to_ascii_uppercase())
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Collect a numbered-pattern section (`[SOURCES]`, `[EXCLUDES]`) in
    /// numeric key order. Non-numeric keys keep insertion order after the
    /// numbered ones.
    pub fn numbered_values(&self, section: &str) -> Vec<String> {
        let Some(entries) = self.sections.get(&section.to_ascii_uppercase()) else {
            return Vec::new();
        };
        let mut numbered: Vec<(u64, &str)> = Vec::new();
        let mut rest: Vec<&str> = Vec::new();
        for (key, value) in entries {
            if value.is_empty() {
                continue;
            }
            match key.parse::<u64>() {
                Ok(n) => numbered.push((n, value)),
                Err(_) => rest.push(value),
            }
        }
        numbered.sort_by_key(|(n, _)| *n);
        numbered
            .into_iter()
            .map(|(_, v)| v.to_string())
            .chain(rest.into_iter().map(String::from))
            .collect()
    }

    /// Whether the template contains a section.
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(&section.to_ascii_uppercase())
    }
}

fn strip_inline_comment(value: &str) -> &str {
    let cut = value
        .find(';')
        .into_iter()
        .chain(value.find('#'))
        .min()
        .unwrap_or(value.len());
    &value[..cut]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
; project template
[CONFIG]
PRODUCTION_DIR = /shared/alpha   ; the team tree
WORKING_DIR = /home/user/alpha
PROJECT_ID = 7

[SOURCES]
2 = docs/*.md
1 = src/**

[EXCLUDES]
1 = **/*.tmp

[UPLOAD]
GROUP = alpha_users  # unix group
BACKUP_COUNT = 2

[LOG]
PATH = /tmp/cccopy.log
";

    #[test]
    fn test_parse_sections_and_inline_comments() {
        let template = Template::parse(SAMPLE).unwrap();
        assert_eq!(template.get("CONFIG", "PRODUCTION_DIR"), Some("/shared/alpha"));
        assert_eq!(template.get("UPLOAD", "GROUP"), Some("alpha_users"));
        assert_eq!(template.get("UPLOAD", "BACKUP_COUNT"), Some("2"));
        assert!(template.has_section("LOG"));
        assert_eq!(template.get("CONFIG", "MISSING"), None);
    }

    #[test]
    fn test_numbered_values_sort_numerically() {
        let template = Template::parse(SAMPLE).unwrap();
        assert_eq!(
            template.numbered_values("SOURCES"),
            vec!["src/**".to_string(), "docs/*.md".to_string()]
        );
        assert_eq!(template.numbered_values("EXCLUDES"), vec!["**/*.tmp".to_string()]);
        assert!(template.numbered_values("NOPE").is_empty());
    }

    #[test]
    fn test_section_names_case_insensitive() {
        let template = Template::parse("[config]\nProduction_Dir = /x\n").unwrap();
        assert_eq!(template.get("CONFIG", "PRODUCTION_DIR"), Some("/x"));
    }

    #[test]
    fn test_malformed_lines_error() {
        assert!(Template::parse("[CONFIG\n").is_err());
        assert!(Template::parse("KEY = 1\n").is_err());
        assert!(Template::parse("[A]\nno_equals_here\n").is_err());
    }
}
