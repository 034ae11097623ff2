//! Path pattern compilation and matching.
//!
//! # Responsibilities
//! - Normalize request paths and route templates to one canonical form
//! - Classify templates as static (no `{param}`) or dynamic
//! - Compile dynamic templates into anchored regexes with named captures
//!
//! # Design Decisions
//! - Static templates are compared with plain string equality
//! - Default placeholder pattern is one segment: `[^/]+`
//! - Constraint fragments are not validated beyond what the regex engine rejects
//! - Captured values are always strings; coercion belongs to the dispatcher

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RouterError;

/// Parameters captured from a dynamic route, keyed by placeholder name.
pub type PathParams = BTreeMap<String, String>;

/// Sub-pattern used for placeholders without a constraint.
pub const DEFAULT_PARAM_PATTERN: &str = "[^/]+";

/// Canonicalize a path: drop query and fragment, collapse repeated slashes,
/// force a leading `/` and strip the trailing one (except for the root).
pub fn normalize_path(raw: &str) -> String {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let mut out = String::with_capacity(end + 1);
    for segment in raw[..end].split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// A piece of a route template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Literal(&'a str),
    Param(&'a str),
}

/// Split a template into literal runs and `{identifier}` placeholders.
pub(crate) fn tokenize(template: &str) -> Result<Vec<Token<'_>>, String> {
    let mut tokens = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        if open > 0 {
            tokens.push(Token::Literal(&rest[..open]));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| "unclosed `{` in template".to_string())?;
        let name = &after[..close];
        if !is_identifier(name) {
            return Err(format!("invalid parameter name `{}`", name));
        }
        tokens.push(Token::Param(name));
        rest = &after[close + 1..];
    }

    if rest.contains('}') {
        return Err("unmatched `}` in template".to_string());
    }
    if !rest.is_empty() {
        tokens.push(Token::Literal(rest));
    }
    Ok(tokens)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Compiled matcher for a dynamic template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathMatcher {
    #[serde(with = "regex_source")]
    regex: Regex,
    params: Vec<String>,
}

impl PathMatcher {
    /// Names of the placeholders, in template order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The anchored regex source.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match a normalized path, returning the percent-decoded parameters.
    /// A capture that does not decode to UTF-8 is kept as received.
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let caps = self.regex.captures(path)?;
        let mut params = PathParams::new();
        for name in &self.params {
            if let Some(m) = caps.name(name) {
                let raw = m.as_str();
                let value = percent_decode_str(raw)
                    .decode_utf8()
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| raw.to_string());
                params.insert(name.clone(), value);
            }
        }
        Some(params)
    }
}

/// A route template after compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PathPattern {
    /// Exact normalized path.
    Static { path: String },
    /// Regex with one named group per placeholder.
    Dynamic { matcher: PathMatcher },
}

impl PathPattern {
    /// Compile a template with its per-parameter constraints.
    ///
    /// The template is normalized first, so `/users/{id}/` and `/users/{id}`
    /// compile identically.
    pub fn compile(
        template: &str,
        constraints: &BTreeMap<String, String>,
    ) -> Result<Self, RouterError> {
        let template = normalize_path(template);
        let fail = |reason: String| RouterError::PatternCompilation {
            template: template.clone(),
            reason,
        };

        if !template.contains('{') {
            if template.contains('}') {
                return Err(fail("unmatched `}` in template".to_string()));
            }
            return Ok(PathPattern::Static { path: template });
        }

        let tokens = tokenize(&template).map_err(fail)?;
        let mut source = String::from("^");
        let mut params = Vec::new();

        for token in tokens {
            match token {
                Token::Literal(text) => source.push_str(&regex::escape(text)),
                Token::Param(name) => {
                    let inner = constraints
                        .get(name)
                        .map(String::as_str)
                        .unwrap_or(DEFAULT_PARAM_PATTERN);
                    source.push_str(&format!("(?P<{}>{})", name, inner));
                    params.push(name.to_string());
                }
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| fail(e.to_string()))?;
        Ok(PathPattern::Dynamic {
            matcher: PathMatcher { regex, params },
        })
    }

    pub fn is_static(&self) -> bool {
        matches!(self, PathPattern::Static { .. })
    }

    pub fn matcher(&self) -> Option<&PathMatcher> {
        match self {
            PathPattern::Static { .. } => None,
            PathPattern::Dynamic { matcher } => Some(matcher),
        }
    }

    /// Match a normalized path. Static patterns yield an empty parameter set.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        match self {
            PathPattern::Static { path: expected } => {
                (expected == path).then(PathParams::new)
            }
            PathPattern::Dynamic { matcher } => matcher.captures(path),
        }
    }
}

/// Serializes a regex as its source; loading hands the stored source
/// straight to the regex engine without re-scanning the template.
mod regex_source {
    use regex::Regex;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(regex: &Regex, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(regex.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Regex, D::Error> {
        let source = String::deserialize(deserializer)?;
        Regex::new(&source).map_err(D::Error::custom)
    }
}
