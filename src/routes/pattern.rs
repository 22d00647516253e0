//! Route patterns: `/profile/edit`, `/@:handle`, `/files/*`.
//!
//! `:name` matches one non-empty path segment part (`[^/]+`) and `*` matches
//! the rest of the path (`.*`). Everything else is literal.

use regex::Regex;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    regex: Regex,
    params: Vec<String>,
}

impl RoutePattern {
    pub fn compile(raw: &str) -> Result<Self, regex::Error> {
        let mut source = String::from("^");
        let mut params = Vec::new();
        let mut chars = raw.chars().peekable();
        let mut wildcard = false;

        while let Some(c) = chars.next() {
            match c {
                ':' => {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '_' {
                            name.push(n);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if name.is_empty() {
                        source.push_str(&regex::escape(":"));
                    } else {
                        source.push_str(&format!("(?P<{}>[^/]+)", name));
                        params.push(name);
                    }
                }
                '*' if !wildcard => {
                    source.push_str("(?P<wildcard>.*)");
                    wildcard = true;
                }
                '*' => source.push_str(".*"),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        source.push('$');

        Ok(Self {
            raw: raw.to_string(),
            regex: Regex::new(&source)?,
            params,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_parameterized(&self) -> bool {
        !self.params.is_empty() || self.raw.contains('*')
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match `path` and return the captured params (`*` is captured as `wildcard`).
    pub fn captures(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let mut out = BTreeMap::new();
        for name in &self.params {
            if let Some(m) = caps.name(name) {
                out.insert(name.clone(), m.as_str().to_string());
            }
        }
        if let Some(m) = caps.name("wildcard") {
            out.insert("wildcard".to_string(), m.as_str().to_string());
        }
        Some(out)
    }
}
