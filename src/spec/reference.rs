use serde::{Deserialize, Serialize};

/// Either an inline object or a `$ref` pointer to one.
///
/// Mirrors `oas3::spec::ObjectOrReference`; the `Ref` arm is tried first when
/// deserialising so that `{"$ref": ...}` never becomes an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectOrReference<T> {
    Ref {
        #[serde(rename = "$ref")]
        ref_path: String,
    },
    Object(T),
}

impl<T> ObjectOrReference<T> {
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&T> {
        match self {
            ObjectOrReference::Object(obj) => Some(obj),
            ObjectOrReference::Ref { .. } => None,
        }
    }

    #[inline]
    pub fn as_object_mut(&mut self) -> Option<&mut T> {
        match self {
            ObjectOrReference::Object(obj) => Some(obj),
            ObjectOrReference::Ref { .. } => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn ref_path(&self) -> Option<&str> {
        match self {
            ObjectOrReference::Ref { ref_path } => Some(ref_path),
            ObjectOrReference::Object(_) => None,
        }
    }
}

impl<T> From<T> for ObjectOrReference<T> {
    fn from(obj: T) -> Self {
        ObjectOrReference::Object(obj)
    }
}
