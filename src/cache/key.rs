//! Composite cache key construction.

use std::fmt;

/// Separator placed between key parts.
pub const KEY_DELIMITER: char = ':';

/// One scalar component of a composite cache key.
///
/// `Null` parts are dropped when the key is built, so optional filters can be
/// passed straight through without changing the key when they are unset.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Null,
}

impl KeyPart {
    pub fn is_null(&self) -> bool {
        matches!(self, KeyPart::Null)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => f.write_str(s),
            KeyPart::Int(n) => write!(f, "{}", n),
            KeyPart::UInt(n) => write!(f, "{}", n),
            KeyPart::Float(n) => write!(f, "{}", n),
            KeyPart::Bool(b) => write!(f, "{}", b),
            KeyPart::Null => Ok(()),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        KeyPart::Str(value.clone())
    }
}

macro_rules! key_part_from {
    ($variant:ident as $target:ty: $($source:ty),+) => {
        $(
            impl From<$source> for KeyPart {
                fn from(value: $source) -> Self {
                    KeyPart::$variant(value as $target)
                }
            }
        )+
    };
}

key_part_from!(Int as i64: i8, i16, i32, i64, isize);
key_part_from!(UInt as u64: u8, u16, u32, u64, usize);
key_part_from!(Float as f64: f32, f64);

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

impl<T> From<Option<T>> for KeyPart
where
    T: Into<KeyPart>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyPart::Null, Into::into)
    }
}

/// Build a composite key from ordered parts.
///
/// Null parts are dropped and the rest are joined with [`KEY_DELIMITER`] in
/// the order given. Order matters: `["a", "b"]` and `["b", "a"]` are
/// different keys. An input with no usable parts yields an empty string.
///
/// ```
/// use dashboard_cache::cache::{build_key, KeyPart};
///
/// let key = build_key([KeyPart::from("replies"), KeyPart::from(7), KeyPart::Null]);
/// assert_eq!(key, "replies:7");
/// ```
pub fn build_key<I, P>(parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: Into<KeyPart>,
{
    let mut key = String::new();
    for part in parts.into_iter().map(Into::into) {
        if part.is_null() {
            continue;
        }
        if !key.is_empty() {
            key.push(KEY_DELIMITER);
        }
        key.push_str(&part.to_string());
    }
    key
}

/// Build a composite key from heterogeneous parts.
///
/// ```
/// use dashboard_cache::cache_key;
///
/// let status: Option<&str> = None;
/// assert_eq!(cache_key!["alerts", 3_u32, status, true], "alerts:3:true");
/// ```
#[macro_export]
macro_rules! cache_key {
    ($($part:expr),* $(,)?) => {
        $crate::cache::build_key::<_, $crate::cache::KeyPart>([
            $($crate::cache::KeyPart::from($part)),*
        ])
    };
}
