//! Typed property values and the property map carried by every message.

use std::fmt;

/// Kind tag of a [`TypedValue`], used to select per-system property setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Byte => "byte",
            ValueKind::Int16 => "int16",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::Float32 => "float32",
            ValueKind::Float64 => "float64",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message property value together with its type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Boolean(bool),
    Byte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::String(_) => ValueKind::String,
            TypedValue::Boolean(_) => ValueKind::Boolean,
            TypedValue::Byte(_) => ValueKind::Byte,
            TypedValue::Int16(_) => ValueKind::Int16,
            TypedValue::Int32(_) => ValueKind::Int32,
            TypedValue::Int64(_) => ValueKind::Int64,
            TypedValue::Float32(_) => ValueKind::Float32,
            TypedValue::Float64(_) => ValueKind::Float64,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of any integral variant, widened to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Byte(v) => Some(i64::from(*v)),
            TypedValue::Int16(v) => Some(i64::from(*v)),
            TypedValue::Int32(v) => Some(i64::from(*v)),
            TypedValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Float view of either floating variant, widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Float32(v) => Some(f64::from(*v)),
            TypedValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this value is numeric (integral or floating)
    pub fn is_numeric(&self) -> bool {
        !matches!(self, TypedValue::String(_) | TypedValue::Boolean(_))
    }
}

/// String representation used when an external system has no native slot for a kind.
///
/// Floats always keep a decimal point so that string-valued systems parse them
/// back as floats rather than integers.
impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) => f.write_str(s),
            TypedValue::Boolean(b) => write!(f, "{}", b),
            TypedValue::Byte(v) => write!(f, "{}", v),
            TypedValue::Int16(v) => write!(f, "{}", v),
            TypedValue::Int32(v) => write!(f, "{}", v),
            TypedValue::Int64(v) => write!(f, "{}", v),
            TypedValue::Float32(v) => write!(f, "{:?}", v),
            TypedValue::Float64(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::String(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::String(value)
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        TypedValue::Boolean(value)
    }
}

impl From<i8> for TypedValue {
    fn from(value: i8) -> Self {
        TypedValue::Byte(value)
    }
}

impl From<i16> for TypedValue {
    fn from(value: i16) -> Self {
        TypedValue::Int16(value)
    }
}

impl From<i32> for TypedValue {
    fn from(value: i32) -> Self {
        TypedValue::Int32(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Int64(value)
    }
}

impl From<f32> for TypedValue {
    fn from(value: f32) -> Self {
        TypedValue::Float32(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::Float64(value)
    }
}

/// Property map with unique keys.
///
/// Insertion order is kept for inspection and iteration; equality ignores it.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(String, TypedValue)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property, replacing (in place) any previous value for the name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<TypedValue>) -> Option<TypedValue> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<TypedValue> {
        let pos = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl PartialEq for PropertyMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl<K: Into<String>, V: Into<TypedValue>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for PropertyMap {
    type Item = (String, TypedValue);
    type IntoIter = std::vec::IntoIter<(String, TypedValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
