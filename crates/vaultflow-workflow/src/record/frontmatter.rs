//! YAML frontmatter codec for record files.
//!
//! A record file looks like:
//!
//! ```text
//! ---
//! id: 20260101-120000-email-42
//! status: new
//! ---
//!
//! free text body
//! ```

use serde_yaml::{Mapping, Value};

/// Ordered metadata header of a record.
///
/// Backed by a YAML mapping so that fields this crate does not know about
/// survive a read/modify/write cycle untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    inner: Mapping,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    /// Scalar value rendered as a string. Null and nested values yield `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.inner.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.inner.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.inner.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// True when the key holds a non-null, non-empty value.
    pub fn is_set(&self, key: &str) -> bool {
        match self.inner.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// Insert or replace a field. New keys are appended at the end.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.inner.insert(Value::from(key), value.into());
    }

    /// Builder-style [`Metadata::set`].
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Overlay `updates` on top of this mapping, keeping existing key order.
    pub fn merge(&mut self, updates: Metadata) {
        for (key, value) in updates.inner {
            self.inner.insert(key, value);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().filter_map(|k| k.as_str())
    }
}

impl From<Mapping> for Metadata {
    fn from(inner: Mapping) -> Self {
        Self { inner }
    }
}

/// Split file content into metadata and body.
///
/// Content without a leading `---` line is treated as a body with empty
/// metadata.
pub fn parse(content: &str) -> Result<(Metadata, String), String> {
    let content = if content.contains('\r') {
        content.replace("\r\n", "\n")
    } else {
        content.to_string()
    };

    let Some(rest) = content.strip_prefix("---\n") else {
        return Ok((Metadata::new(), content));
    };

    let (yaml, body) = if let Some(body) = rest.strip_prefix("---\n") {
        ("", body)
    } else if let Some(split_at) = rest.find("\n---\n") {
        (&rest[..split_at], &rest[split_at + 5..])
    } else if let Some(yaml) = rest.strip_suffix("\n---") {
        (yaml, "")
    } else {
        return Err("missing closing delimiter".to_string());
    };

    let metadata = if yaml.trim().is_empty() {
        Metadata::new()
    } else {
        match serde_yaml::from_str::<Value>(yaml).map_err(|e| e.to_string())? {
            Value::Mapping(map) => Metadata::from(map),
            Value::Null => Metadata::new(),
            _ => return Err("frontmatter is not a mapping".to_string()),
        }
    };

    let body = body.strip_prefix('\n').unwrap_or(body);
    Ok((metadata, body.to_string()))
}

/// Render metadata and body back into file content.
pub fn render(metadata: &Metadata, body: &str) -> Result<String, String> {
    let yaml = if metadata.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(&metadata.inner).map_err(|e| e.to_string())?
    };
    Ok(format!("---\n{}---\n\n{}", yaml, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let content = "---\nid: t-1\nstatus: new\n---\n\nHello body\n";
        let (meta, body) = parse(content).unwrap();
        assert_eq!(meta.get_str("id").as_deref(), Some("t-1"));
        assert_eq!(meta.get_str("status").as_deref(), Some("new"));
        assert_eq!(body, "Hello body\n");
    }

    #[test]
    fn test_parse_without_frontmatter() {
        let (meta, body) = parse("just text").unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, "just text");
    }

    #[test]
    fn test_parse_empty_frontmatter() {
        let (meta, body) = parse("---\n---\nbody").unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, "body");
    }

    #[test]
    fn test_parse_missing_closing_delimiter() {
        assert!(parse("---\nid: x\nno end").is_err());
    }

    #[test]
    fn test_parse_non_mapping_is_error() {
        assert!(parse("---\n- a\n- b\n---\nbody").is_err());
    }

    #[test]
    fn test_parse_crlf() {
        let (meta, body) = parse("---\r\nid: t-2\r\n---\r\n\r\nline\r\n").unwrap();
        assert_eq!(meta.get_str("id").as_deref(), Some("t-2"));
        assert_eq!(body, "line\n");
    }

    #[test]
    fn test_render_then_parse_preserves_unknown_fields_and_order() {
        let content = "---\nzeta: 1\ncustom_flag: true\nid: t-3\n---\n\nbody text";
        let (mut meta, body) = parse(content).unwrap();
        meta.set("status", "planned");

        let rendered = render(&meta, &body).unwrap();
        let (reparsed, rebody) = parse(&rendered).unwrap();
        assert_eq!(rebody, "body text");
        let keys: Vec<&str> = reparsed.keys().collect();
        assert_eq!(keys, vec!["zeta", "custom_flag", "id", "status"]);
        assert_eq!(reparsed.get_bool("custom_flag"), Some(true));
        assert_eq!(reparsed.get_u64("zeta"), Some(1));
    }

    #[test]
    fn test_metadata_accessors() {
        let meta = Metadata::new()
            .with("requires_approval", "true")
            .with("retry_count", 2u64)
            .with("approved_at", "")
            .with("flag", false);
        assert_eq!(meta.get_bool("requires_approval"), Some(true));
        assert_eq!(meta.get_bool("flag"), Some(false));
        assert_eq!(meta.get_u64("retry_count"), Some(2));
        assert_eq!(meta.get_str("retry_count").as_deref(), Some("2"));
        assert!(!meta.is_set("approved_at"));
        assert!(!meta.is_set("missing"));
        assert!(meta.is_set("retry_count"));
    }

    #[test]
    fn test_merge_overrides_and_appends() {
        let mut meta = Metadata::new().with("a", "1").with("b", "2");
        meta.merge(Metadata::new().with("b", "3").with("c", "4"));
        assert_eq!(meta.get_str("b").as_deref(), Some("3"));
        assert_eq!(meta.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }
}
