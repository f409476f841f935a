//! # Naming
//!
//! Turns roster names into lookup keys.
//!
//! Students are keyed by the school email derived from their roster name.
//! Faculty have no generated email, so they are keyed by a single name token.
//! The resolver probes the same tokens from a login display name, which is why
//! both sides go through one [`NamingStrategy`].
use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_EMAIL_DOMAIN: &str = "prismsus.org";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static PARENS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[()]").unwrap());

pub trait NamingStrategy: Send + Sync {
    /// Email key for a student roster name.
    fn student_key(&self, name: &str) -> String;

    /// Name-token key for a faculty roster name.
    fn faculty_key(&self, name: &str) -> Option<String>;

    /// Keys to probe for a display name, most specific first.
    fn lookup_tokens(&self, display_name: &str) -> Vec<String>;
}

/// "First Last" heuristics: the second word is the surname.
#[derive(Debug, Clone)]
pub struct PositionalNaming {
    domain: String,
}

impl PositionalNaming {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn local_part(name: &str) -> String {
        let lower = name.to_lowercase();

        if !lower.contains('(') {
            return WHITESPACE.replace_all(&lower, ".").into_owned();
        }

        // "jane doe (jd)" -> ["jane doe ", "jd", ""]
        let joined = PARENS
            .split(&lower)
            .enumerate()
            .map(|(i, segment)| match i {
                0 => WHITESPACE.replace_all(segment.trim(), ".").into_owned(),
                _ => WHITESPACE.replace_all(segment, "").into_owned(),
            })
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(".");

        joined.strip_prefix('.').unwrap_or(&joined).to_string()
    }
}

impl Default for PositionalNaming {
    fn default() -> Self {
        Self::new(DEFAULT_EMAIL_DOMAIN)
    }
}

impl NamingStrategy for PositionalNaming {
    fn student_key(&self, name: &str) -> String {
        format!("{}@{}", Self::local_part(name), self.domain)
    }

    fn faculty_key(&self, name: &str) -> Option<String> {
        let mut tokens = name.split_whitespace();
        let first = tokens.next()?;

        Some(tokens.next().unwrap_or(first).to_string())
    }

    fn lookup_tokens(&self, display_name: &str) -> Vec<String> {
        let tokens: Vec<&str> = display_name.split_whitespace().collect();

        [tokens.get(1), tokens.first()]
            .into_iter()
            .flatten()
            .map(|token| token.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naming() -> PositionalNaming {
        PositionalNaming::new("example.org")
    }

    #[test]
    fn test_plain_names() {
        assert_eq!(naming().student_key("Jane Q Doe"), "jane.q.doe@example.org");
        assert_eq!(naming().student_key("Jane   Doe"), "jane.doe@example.org");
        assert_eq!(naming().student_key("MARY"), "mary@example.org");
    }

    #[test]
    fn test_parenthesized_names() {
        assert_eq!(naming().student_key("Jane Doe (JD)"), "jane.doe.jd@example.org");
        assert_eq!(
            naming().student_key("Tony (Jia Hao) (Zhang)"),
            "tony.jiahao.zhang@example.org"
        );
        assert_eq!(naming().student_key("(Wei) Chen"), "wei.chen@example.org");
    }

    #[test]
    fn test_faculty_key() {
        assert_eq!(naming().faculty_key("Kenneth Jones"), Some("Jones".to_string()));
        assert_eq!(naming().faculty_key("Dr. Alan Smith"), Some("Alan".to_string()));
        assert_eq!(naming().faculty_key("Madonna"), Some("Madonna".to_string()));
        assert_eq!(naming().faculty_key("   "), None);
    }

    #[test]
    fn test_lookup_tokens() {
        assert_eq!(naming().lookup_tokens("Kenneth Jones"), vec!["Jones", "Kenneth"]);
        assert_eq!(naming().lookup_tokens("Madonna"), vec!["Madonna"]);
        assert!(naming().lookup_tokens("").is_empty());
    }

    #[test]
    fn test_default_domain() {
        assert_eq!(PositionalNaming::default().domain(), DEFAULT_EMAIL_DOMAIN);
    }
}
