//! Tagged values that round-trip through structured elements.
//!
//! A [`ValueCell`] carries its own [`ContentKind`], and [`CellElement`] is the
//! serialized shape used by settings files and component parameters. The
//! element records the kind of every cell (and, for containers, the kinds of
//! their members), so a document can be turned back into cells without any
//! schema on the reading side.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// The kind tag stored next to every serialized cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentKind {
    /// Text
    String,
    /// Signed 64-bit integer
    Integer,
    /// True or false
    Boolean,
    /// Ordered sequence
    List,
    /// Ordered key/value map
    Map,
    /// Pair of two cells
    Tuple,
}

impl ContentKind {
    /// Attribute text of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::String => "string",
            ContentKind::Integer => "integer",
            ContentKind::Boolean => "boolean",
            ContentKind::List => "list",
            ContentKind::Map => "map",
            ContentKind::Tuple => "tuple",
        }
    }

    /// Resolve an attribute value; `None` for kinds this build does not know.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(ContentKind::String),
            "integer" => Some(ContentKind::Integer),
            "boolean" => Some(ContentKind::Boolean),
            "list" => Some(ContentKind::List),
            "map" => Some(ContentKind::Map),
            "tuple" => Some(ContentKind::Tuple),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed value.
///
/// Containers hold cells rather than raw values, so arbitrarily nested
/// structures keep their member kinds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueCell {
    /// Text
    String(String),
    /// Integer
    Integer(i64),
    /// Flag
    Boolean(bool),
    /// Items in order
    List(Vec<ValueCell>),
    /// Entries sorted by key
    Map(BTreeMap<ValueCell, ValueCell>),
    /// First and second member
    Tuple(Box<ValueCell>, Box<ValueCell>),
}

impl ValueCell {
    /// Box a native value. Boxing a cell returns it unchanged.
    pub fn boxed(raw: impl Into<ValueCell>) -> Self {
        raw.into()
    }

    /// Build a tuple cell.
    pub fn tuple(first: impl Into<ValueCell>, second: impl Into<ValueCell>) -> Self {
        ValueCell::Tuple(Box::new(first.into()), Box::new(second.into()))
    }

    /// The kind tag of this cell.
    pub fn kind(&self) -> ContentKind {
        match self {
            ValueCell::String(_) => ContentKind::String,
            ValueCell::Integer(_) => ContentKind::Integer,
            ValueCell::Boolean(_) => ContentKind::Boolean,
            ValueCell::List(_) => ContentKind::List,
            ValueCell::Map(_) => ContentKind::Map,
            ValueCell::Tuple(_, _) => ContentKind::Tuple,
        }
    }

    /// The text, if this is a string cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueCell::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this is an integer cell.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ValueCell::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The flag, if this is a boolean cell.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ValueCell::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The items, if this is a list cell.
    pub fn as_list(&self) -> Option<&[ValueCell]> {
        match self {
            ValueCell::List(items) => Some(items),
            _ => None,
        }
    }

    /// The entries, if this is a map cell.
    pub fn as_map(&self) -> Option<&BTreeMap<ValueCell, ValueCell>> {
        match self {
            ValueCell::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Both members, if this is a tuple cell.
    pub fn as_tuple(&self) -> Option<(&ValueCell, &ValueCell)> {
        match self {
            ValueCell::Tuple(first, second) => Some((first, second)),
            _ => None,
        }
    }

    /// Replace the value, keeping the kind. Fails if `value` is of another kind.
    pub fn set(&mut self, value: impl Into<ValueCell>) -> Result<()> {
        let value = value.into();
        if value.kind() != self.kind() {
            return Err(CoreError::KindMismatch {
                expected: self.kind(),
                found: value.kind(),
            });
        }
        *self = value;
        Ok(())
    }

    /// Append to a list cell.
    pub fn push(&mut self, item: impl Into<ValueCell>) -> Result<()> {
        let item = item.into();
        match self {
            ValueCell::List(items) => {
                items.push(item);
                Ok(())
            }
            other => Err(CoreError::KindMismatch {
                expected: other.kind(),
                found: ContentKind::List,
            }),
        }
    }

    /// Insert into a map cell, returning the replaced value.
    pub fn insert(
        &mut self,
        key: impl Into<ValueCell>,
        value: impl Into<ValueCell>,
    ) -> Result<Option<ValueCell>> {
        match self {
            ValueCell::Map(entries) => Ok(entries.insert(key.into(), value.into())),
            other => Err(CoreError::KindMismatch {
                expected: other.kind(),
                found: ContentKind::Map,
            }),
        }
    }

    /// Serialize into a named element.
    pub fn to_element(&self, name: impl Into<String>) -> CellElement {
        let mut element = CellElement::new(name, self.kind());
        match self {
            ValueCell::String(s) => element.value = Some(s.clone()),
            ValueCell::Integer(i) => element.value = Some(i.to_string()),
            ValueCell::Boolean(b) => element.value = Some(b.to_string()),
            ValueCell::List(items) => {
                element.element_kind = common_kind(items.iter());
                element.children = items.iter().map(|item| item.to_element("item")).collect();
            }
            ValueCell::Map(entries) => {
                element.key_kind = common_kind(entries.keys());
                element.value_kind = common_kind(entries.values());
                element.children = entries
                    .iter()
                    .map(|(key, value)| tuple_element("entry", key, value))
                    .collect();
            }
            ValueCell::Tuple(first, second) => {
                return tuple_element(element.name, first, second);
            }
        }
        element
    }

    /// Rebuild a cell from an element.
    ///
    /// An element naming a kind this build does not know is read as a plain
    /// string, as are scalars whose text does not parse as their kind.
    pub fn from_element(element: &CellElement) -> Self {
        Self::from_element_with(element, None)
    }

    fn from_element_with(element: &CellElement, inherited: Option<&str>) -> Self {
        let declared = if element.content_kind.is_empty() {
            inherited.unwrap_or_default()
        } else {
            element.content_kind.as_str()
        };
        let text = || element.value.clone().unwrap_or_default();

        match ContentKind::parse(declared) {
            Some(ContentKind::String) | None => ValueCell::String(text()),
            Some(ContentKind::Integer) => element
                .value
                .as_deref()
                .and_then(|v| v.trim().parse().ok())
                .map(ValueCell::Integer)
                .unwrap_or_else(|| ValueCell::String(text())),
            Some(ContentKind::Boolean) => match element.value.as_deref().map(str::trim) {
                Some("true") => ValueCell::Boolean(true),
                Some("false") => ValueCell::Boolean(false),
                _ => ValueCell::String(text()),
            },
            Some(ContentKind::List) => ValueCell::List(
                element
                    .children
                    .iter()
                    .map(|child| Self::from_element_with(child, element.element_kind.as_deref()))
                    .collect(),
            ),
            Some(ContentKind::Map) => ValueCell::Map(
                element
                    .children
                    .iter()
                    .filter_map(|entry| {
                        let (key, value) = tuple_halves(
                            entry,
                            element.key_kind.as_deref(),
                            element.value_kind.as_deref(),
                        )?;
                        Some((key, value))
                    })
                    .collect(),
            ),
            Some(ContentKind::Tuple) => {
                match tuple_halves(element, element.key_kind.as_deref(), element.value_kind.as_deref()) {
                    Some((first, second)) => ValueCell::Tuple(Box::new(first), Box::new(second)),
                    None => ValueCell::String(text()),
                }
            }
        }
    }
}

fn common_kind<'a>(mut cells: impl Iterator<Item = &'a ValueCell>) -> Option<String> {
    let first = cells.next()?.kind();
    cells
        .all(|cell| cell.kind() == first)
        .then(|| first.as_str().to_string())
}

fn tuple_element(name: impl Into<String>, first: &ValueCell, second: &ValueCell) -> CellElement {
    let mut element = CellElement::new(name, ContentKind::Tuple);
    element.key_kind = Some(first.kind().as_str().to_string());
    element.value_kind = Some(second.kind().as_str().to_string());
    element.children = vec![first.to_element("first"), second.to_element("second")];
    element
}

fn tuple_halves(
    element: &CellElement,
    first_kind: Option<&str>,
    second_kind: Option<&str>,
) -> Option<(ValueCell, ValueCell)> {
    let first_kind = element.key_kind.as_deref().or(first_kind);
    let second_kind = element.value_kind.as_deref().or(second_kind);
    match element.children.as_slice() {
        [first, second] => Some((
            ValueCell::from_element_with(first, first_kind),
            ValueCell::from_element_with(second, second_kind),
        )),
        _ => None,
    }
}

impl fmt::Display for ValueCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueCell::String(s) => f.write_str(s),
            ValueCell::Integer(i) => write!(f, "{}", i),
            ValueCell::Boolean(b) => write!(f, "{}", b),
            ValueCell::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            ValueCell::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            ValueCell::Tuple(first, second) => write!(f, "({}, {})", first, second),
        }
    }
}

impl From<&str> for ValueCell {
    fn from(value: &str) -> Self {
        ValueCell::String(value.to_string())
    }
}

impl From<String> for ValueCell {
    fn from(value: String) -> Self {
        ValueCell::String(value)
    }
}

impl From<i64> for ValueCell {
    fn from(value: i64) -> Self {
        ValueCell::Integer(value)
    }
}

impl From<i32> for ValueCell {
    fn from(value: i32) -> Self {
        ValueCell::Integer(value.into())
    }
}

impl From<u32> for ValueCell {
    fn from(value: u32) -> Self {
        ValueCell::Integer(value.into())
    }
}

impl From<bool> for ValueCell {
    fn from(value: bool) -> Self {
        ValueCell::Boolean(value)
    }
}

impl<T: Into<ValueCell>> From<Vec<T>> for ValueCell {
    fn from(value: Vec<T>) -> Self {
        ValueCell::List(value.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<ValueCell>, V: Into<ValueCell>> From<BTreeMap<K, V>> for ValueCell {
    fn from(value: BTreeMap<K, V>) -> Self {
        ValueCell::Map(value.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<A: Into<ValueCell>, B: Into<ValueCell>> From<(A, B)> for ValueCell {
    fn from((first, second): (A, B)) -> Self {
        ValueCell::tuple(first, second)
    }
}

/// Serialized shape of a [`ValueCell`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellElement {
    /// Element name (setting or parameter name, or a member role)
    pub name: String,

    /// Kind of the serialized cell
    #[serde(rename = "content-kind", default)]
    pub content_kind: String,

    /// Member kind of a homogeneous list
    #[serde(rename = "element-kind", default, skip_serializing_if = "Option::is_none")]
    pub element_kind: Option<String>,

    /// Key kind of a map, or first kind of a tuple
    #[serde(rename = "key-kind", default, skip_serializing_if = "Option::is_none")]
    pub key_kind: Option<String>,

    /// Value kind of a map, or second kind of a tuple
    #[serde(rename = "value-kind", default, skip_serializing_if = "Option::is_none")]
    pub value_kind: Option<String>,

    /// Scalar text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Container members
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CellElement>,
}

impl CellElement {
    fn new(name: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            name: name.into(),
            content_kind: kind.as_str().to_string(),
            element_kind: None,
            key_kind: None,
            value_kind: None,
            value: None,
            children: Vec::new(),
        }
    }
}
