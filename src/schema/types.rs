use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::tag::SchemaTag;
use crate::spec::ObjectOrReference;

/// A schema position in the document: an inline schema or a `$ref`.
pub type Schema = ObjectOrReference<SchemaObject>;

/// JSON Schema primitive type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

/// `type` keyword: a single name or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaTypeSet {
    Single(SchemaType),
    Multiple(Vec<SchemaType>),
}

impl SchemaTypeSet {
    #[must_use]
    pub fn contains(&self, ty: SchemaType) -> bool {
        match self {
            SchemaTypeSet::Single(t) => *t == ty,
            SchemaTypeSet::Multiple(ts) => ts.contains(&ty),
        }
    }
}

/// `additionalProperties`: either a boolean switch or a schema for the values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Bool(bool),
    Schema(Box<Schema>),
}

/// Inline JSON Schema node.
///
/// The keywords the canonicalisation walk needs are modelled as fields; every
/// other keyword (`minLength`, `pattern`, `const`, `example`, `x-*`, ...) lives
/// in `keywords` and round-trips untouched. The tag is never serialised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaObject {
    #[serde(skip)]
    pub tag: Option<SchemaTag>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaTypeSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(flatten)]
    pub keywords: Map<String, Value>,
}

impl SchemaObject {
    #[must_use]
    pub fn of_type(ty: SchemaType) -> Self {
        Self {
            schema_type: Some(SchemaTypeSet::Single(ty)),
            ..Self::default()
        }
    }

    /// True for the universal schema `{}`: no `type`, no composition and no
    /// properties. The walk treats it as a leaf.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.schema_type.is_none()
            && self.all_of.is_empty()
            && self.any_of.is_empty()
            && self.one_of.is_empty()
            && self.properties.is_empty()
    }

    #[must_use]
    pub fn is_object_type(&self) -> bool {
        self.schema_type
            .as_ref()
            .is_some_and(|t| t.contains(SchemaType::Object))
    }

    /// Nested schema positions in walk order: `allOf`, `anyOf`, `oneOf`,
    /// property values, `additionalProperties`, `items`.
    #[must_use]
    pub fn children(&self) -> Vec<&Schema> {
        let mut out: Vec<&Schema> = Vec::new();
        out.extend(self.all_of.iter());
        out.extend(self.any_of.iter());
        out.extend(self.one_of.iter());
        out.extend(self.properties.values());
        if let Some(AdditionalProperties::Schema(s)) = &self.additional_properties {
            out.push(s.as_ref());
        }
        if let Some(items) = &self.items {
            out.push(items.as_ref());
        }
        out
    }

    /// Mutable counterpart of [`SchemaObject::children`], same order.
    pub fn children_mut(&mut self) -> Vec<&mut Schema> {
        let mut out: Vec<&mut Schema> = Vec::new();
        out.extend(self.all_of.iter_mut());
        out.extend(self.any_of.iter_mut());
        out.extend(self.one_of.iter_mut());
        out.extend(self.properties.values_mut());
        if let Some(AdditionalProperties::Schema(s)) = &mut self.additional_properties {
            out.push(s.as_mut());
        }
        if let Some(items) = &mut self.items {
            out.push(items.as_mut());
        }
        out
    }
}

impl Schema {
    #[must_use]
    pub fn reference(ref_path: impl Into<String>) -> Self {
        ObjectOrReference::Ref {
            ref_path: ref_path.into(),
        }
    }

    /// The universal schema `{}`.
    #[must_use]
    pub fn any() -> Self {
        ObjectOrReference::Object(SchemaObject::default())
    }

    #[must_use]
    pub fn object() -> Self {
        ObjectOrReference::Object(SchemaObject::of_type(SchemaType::Object))
    }

    #[must_use]
    pub fn string() -> Self {
        ObjectOrReference::Object(SchemaObject::of_type(SchemaType::String))
    }

    #[must_use]
    pub fn integer() -> Self {
        ObjectOrReference::Object(SchemaObject::of_type(SchemaType::Integer))
    }

    #[must_use]
    pub fn number() -> Self {
        ObjectOrReference::Object(SchemaObject::of_type(SchemaType::Number))
    }

    #[must_use]
    pub fn boolean() -> Self {
        ObjectOrReference::Object(SchemaObject::of_type(SchemaType::Boolean))
    }

    #[must_use]
    pub fn array(items: Schema) -> Self {
        let mut obj = SchemaObject::of_type(SchemaType::Array);
        obj.items = Some(Box::new(items));
        ObjectOrReference::Object(obj)
    }

    /// `{"type": "string", "enum": [...]}`
    #[must_use]
    pub fn string_enum<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut obj = SchemaObject::of_type(SchemaType::String);
        obj.enum_values = values.into_iter().map(|v| Value::String(v.into())).collect();
        ObjectOrReference::Object(obj)
    }

    #[must_use]
    pub fn one_of(variants: Vec<Schema>) -> Self {
        ObjectOrReference::Object(SchemaObject {
            one_of: variants,
            ..SchemaObject::default()
        })
    }

    #[must_use]
    pub fn any_of(variants: Vec<Schema>) -> Self {
        ObjectOrReference::Object(SchemaObject {
            any_of: variants,
            ..SchemaObject::default()
        })
    }

    #[must_use]
    pub fn all_of(parts: Vec<Schema>) -> Self {
        ObjectOrReference::Object(SchemaObject {
            all_of: parts,
            ..SchemaObject::default()
        })
    }

    fn with_object(mut self, f: impl FnOnce(&mut SchemaObject)) -> Self {
        if let ObjectOrReference::Object(obj) = &mut self {
            f(obj);
        }
        self
    }

    /// Add an optional property.
    #[must_use]
    pub fn property(self, name: impl Into<String>, schema: Schema) -> Self {
        self.with_object(|obj| {
            obj.properties.insert(name.into(), schema);
        })
    }

    /// Add a property and list it under `required`.
    #[must_use]
    pub fn required_property(self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.with_object(|obj| {
            if !obj.required.contains(&name) {
                obj.required.push(name.clone());
            }
            obj.properties.insert(name, schema);
        })
    }

    #[must_use]
    pub fn additional_properties(self, additional: AdditionalProperties) -> Self {
        self.with_object(|obj| obj.additional_properties = Some(additional))
    }

    #[must_use]
    pub fn description(self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.with_object(|obj| obj.description = Some(text))
    }

    #[must_use]
    pub fn format(self, format: impl Into<String>) -> Self {
        let format = format.into();
        self.with_object(|obj| obj.format = Some(format))
    }

    /// Set any keyword not modelled as a field (`minimum`, `pattern`, `x-*`, ...).
    #[must_use]
    pub fn keyword(self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        self.with_object(|obj| {
            obj.keywords.insert(key, value);
        })
    }

    /// Tag this schema with a fresh identity named `name`.
    #[must_use]
    pub fn tagged(self, name: impl AsRef<str>) -> Self {
        super::schema_type(name, self)
    }

    #[must_use]
    pub fn tag(&self) -> Option<&SchemaTag> {
        self.as_object().and_then(|obj| obj.tag.as_ref())
    }

    #[must_use]
    pub fn is_tagged(&self) -> bool {
        self.tag().is_some()
    }
}
