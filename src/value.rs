//! Read-only view over a parsed trace document.
//!
//! Every lookup is total: asking for a field or entry that is not there
//! yields an invalid inspector, and reading a scalar out of an invalid (or
//! differently typed) inspector yields the zero value of the requested type.
//! Extraction code can therefore chain lookups freely and only branch on
//! presence where it actually matters.

use serde_json::Value;

/// The shape of the value behind an inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Empty,
    Bool,
    Long,
    Double,
    String,
    /// Raw bytes. JSON input never produces these.
    Bytes,
    Array,
    Object,
}

#[derive(Debug, Clone, Copy)]
pub struct Inspector<'a> {
    value: Option<&'a Value>,
}

impl<'a> Inspector<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value: Some(value) }
    }

    pub fn invalid() -> Self {
        Self { value: None }
    }

    pub fn valid(&self) -> bool {
        self.value.is_some()
    }

    pub fn kind(&self) -> Kind {
        match self.value {
            None | Some(Value::Null) => Kind::Empty,
            Some(Value::Bool(_)) => Kind::Bool,
            Some(Value::Number(n)) if n.is_f64() => Kind::Double,
            Some(Value::Number(_)) => Kind::Long,
            Some(Value::String(_)) => Kind::String,
            Some(Value::Array(_)) => Kind::Array,
            Some(Value::Object(_)) => Kind::Object,
        }
    }

    pub fn field(&self, name: &str) -> Inspector<'a> {
        match self.value {
            Some(Value::Object(map)) => map.get(name).map_or_else(Self::invalid, Self::new),
            _ => Self::invalid(),
        }
    }

    pub fn entry(&self, idx: usize) -> Inspector<'a> {
        match self.value {
            Some(Value::Array(items)) => items.get(idx).map_or_else(Self::invalid, Self::new),
            _ => Self::invalid(),
        }
    }

    /// Follow a sequence of field names.
    pub fn path(&self, names: &[&str]) -> Inspector<'a> {
        names.iter().fold(*self, |cur, name| cur.field(name))
    }

    pub fn entries(self) -> impl Iterator<Item = Inspector<'a>> + 'a {
        let items: &'a [Value] = match self.value {
            Some(Value::Array(items)) => items,
            _ => &[],
        };
        items.iter().map(Self::new)
    }

    pub fn fields(self) -> impl Iterator<Item = (&'a str, Inspector<'a>)> + 'a {
        let map = match self.value {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };
        map.into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), Self::new(v))))
    }

    /// Array entries or object values, whichever this is.
    pub fn children(&self) -> Vec<Inspector<'a>> {
        match self.kind() {
            Kind::Array => self.entries().collect(),
            Kind::Object => self.fields().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self.value, Some(Value::Bool(true)))
    }

    pub fn as_long(&self) -> i64 {
        match self.value {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_u64().map(|u| u as i64))
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn as_double(&self) -> f64 {
        match self.value {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn as_str(&self) -> &'a str {
        match self.value {
            Some(Value::String(s)) => s.as_str(),
            _ => "",
        }
    }

    /// Pre-order search for the first value (this one included) matching `pred`.
    pub fn find(&self, pred: impl Fn(&Inspector<'a>) -> bool) -> Inspector<'a> {
        fn walk<'a>(node: Inspector<'a>, pred: &dyn Fn(&Inspector<'a>) -> bool) -> Option<Inspector<'a>> {
            if pred(&node) {
                return Some(node);
            }
            node.children().into_iter().find_map(|c| walk(c, pred))
        }
        walk(*self, &pred).unwrap_or_else(Self::invalid)
    }

    /// Pre-order search for every value matching `pred`. Matches are not
    /// searched further.
    pub fn find_all(&self, pred: impl Fn(&Inspector<'a>) -> bool) -> Vec<Inspector<'a>> {
        fn walk<'a>(
            node: Inspector<'a>,
            pred: &dyn Fn(&Inspector<'a>) -> bool,
            out: &mut Vec<Inspector<'a>>,
        ) {
            if pred(&node) {
                out.push(node);
                return;
            }
            for c in node.children() {
                walk(c, pred, out);
            }
        }
        let mut out = Vec::new();
        walk(*self, &pred, &mut out);
        out
    }
}
