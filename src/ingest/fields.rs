//! Lenient field reading for loosely-typed JSON feeds.
//!
//! Each feed declares its logical fields as an enum implementing
//! [`FieldSpec`]; the alias list is tried in order and the first usable value
//! wins. Upstream schemas drift between districts and releases, so lookups
//! also descend into nested objects when no top-level alias is present.

use serde_json::{Map, Value};

/// A logical field and the upstream key spellings it may appear under.
pub trait FieldSpec: Copy {
    fn aliases(self) -> &'static [&'static str];
}

const NESTED_DEPTH: usize = 3;

/// Read-only view over one upstream record.
#[derive(Debug, Clone, Copy)]
pub struct LenientRecord<'a> {
    obj: &'a Map<String, Value>,
}

impl<'a> LenientRecord<'a> {
    pub fn new(obj: &'a Map<String, Value>) -> Self {
        Self { obj }
    }

    pub fn from_value(v: &'a Value) -> Option<Self> {
        v.as_object().map(Self::new)
    }

    /// Raw value for the first alias present at the top level, else the first
    /// found in nested objects (breadth by alias, depth-limited).
    pub fn value<F: FieldSpec>(&self, field: F) -> Option<&'a Value> {
        let aliases = field.aliases();
        for key in aliases {
            if let Some(v) = self.obj.get(*key).filter(|v| is_present(v)) {
                return Some(v);
            }
        }
        aliases
            .iter()
            .find_map(|key| find_nested(self.obj, key, NESTED_DEPTH))
    }

    /// Trimmed string; numbers are rendered, "Not Reported" and blanks are absent.
    pub fn string<F: FieldSpec>(&self, field: F) -> Option<String> {
        let aliases = field.aliases();
        for key in aliases {
            if let Some(s) = self.obj.get(*key).and_then(coerce_string) {
                return Some(s);
            }
        }
        aliases.iter().find_map(|key| {
            find_nested(self.obj, key, NESTED_DEPTH).and_then(coerce_string)
        })
    }

    /// [`Self::string`] or the empty string.
    pub fn text<F: FieldSpec>(&self, field: F) -> String {
        self.string(field).unwrap_or_default()
    }

    /// Float from a JSON number or a numeric string.
    pub fn number<F: FieldSpec>(&self, field: F) -> Option<f64> {
        let aliases = field.aliases();
        for key in aliases {
            if let Some(n) = self.obj.get(*key).and_then(coerce_number) {
                return Some(n);
            }
        }
        aliases.iter().find_map(|key| {
            find_nested(self.obj, key, NESTED_DEPTH).and_then(coerce_number)
        })
    }

    /// Non-negative integer; fractional values are truncated.
    pub fn count<F: FieldSpec>(&self, field: F) -> Option<u32> {
        self.number(field)
            .filter(|n| *n >= 0.0 && *n <= u32::MAX as f64)
            .map(|n| n.trunc() as u32)
    }
}

fn is_present(v: &Value) -> bool {
    !v.is_null()
}

fn find_nested<'a>(obj: &'a Map<String, Value>, key: &str, depth: usize) -> Option<&'a Value> {
    if depth == 0 {
        return None;
    }
    for child in obj.values() {
        if let Value::Object(inner) = child {
            if let Some(v) = inner.get(key).filter(|v| is_present(v)) {
                return Some(v);
            }
            if let Some(v) = find_nested(inner, key, depth - 1) {
                return Some(v);
            }
        }
    }
    None
}

fn clean_scalar(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("not reported") {
        None
    } else {
        Some(t.to_string())
    }
}

fn coerce_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => clean_scalar(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => clean_scalar(s)
            .and_then(|t| t.parse::<f64>().ok())
            .filter(|n| n.is_finite()),
        _ => None,
    }
}
