use std::collections::HashMap;

use zbus::zvariant::{StructureBuilder, Value};

use crate::ibus_constants::{
    ATTR_TYPE_BACKGROUND, ATTR_TYPE_FOREGROUND, ATTR_TYPE_UNDERLINE, ATTR_UNDERLINE_DOUBLE,
    ATTR_UNDERLINE_ERROR, ATTR_UNDERLINE_LOW, ATTR_UNDERLINE_NONE, ATTR_UNDERLINE_SINGLE,
};

/// Every IBus serializable starts with its type name and an attachment dict.
pub(crate) fn attachments() -> HashMap<String, Value<'static>> {
    HashMap::new()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Underline {
    #[default]
    None,
    Single,
    Double,
    Low,
    Error,
}

impl Underline {
    fn to_u32(self) -> u32 {
        match self {
            Underline::None => ATTR_UNDERLINE_NONE,
            Underline::Single => ATTR_UNDERLINE_SINGLE,
            Underline::Double => ATTR_UNDERLINE_DOUBLE,
            Underline::Low => ATTR_UNDERLINE_LOW,
            Underline::Error => ATTR_UNDERLINE_ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Underline(Underline),
    /// RGB as `0xRRGGBB`.
    Foreground(u32),
    Background(u32),
}

impl Attribute {
    fn type_and_value(self) -> (u32, u32) {
        match self {
            Attribute::Underline(underline) => (ATTR_TYPE_UNDERLINE, underline.to_u32()),
            Attribute::Foreground(color) => (ATTR_TYPE_FOREGROUND, color),
            Attribute::Background(color) => (ATTR_TYPE_BACKGROUND, color),
        }
    }
}

/// A styled span of an `IBusText`. Indices count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IBusAttribute {
    pub attr: Attribute,
    pub start_index: u32,
    pub end_index: u32,
}

impl IBusAttribute {
    pub fn new(attr: Attribute, start_index: u32, end_index: u32) -> Self {
        Self {
            attr,
            start_index,
            end_index,
        }
    }
}

impl From<&IBusAttribute> for Value<'static> {
    fn from(attr: &IBusAttribute) -> Self {
        let (type_, value) = attr.attr.type_and_value();
        Value::Structure(
            StructureBuilder::new()
                .add_field("IBusAttribute")
                .add_field(attachments())
                .add_field(type_)
                .add_field(value)
                .add_field(attr.start_index)
                .add_field(attr.end_index)
                .build(),
        )
    }
}

pub struct IBusAttrList<'a>(pub &'a [IBusAttribute]);

impl From<IBusAttrList<'_>> for Value<'static> {
    fn from(list: IBusAttrList<'_>) -> Self {
        Value::Structure(
            StructureBuilder::new()
                .add_field("IBusAttrList")
                .add_field(attachments())
                .add_field(list.0.iter().map(Value::from).collect::<Vec<_>>())
                .build(),
        )
    }
}

/// Text with attributes, as carried by commit, preedit and auxiliary signals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IBusText {
    pub text: String,
    pub attributes: Vec<IBusAttribute>,
}

impl IBusText {
    pub fn new(text: &str, attributes: &[IBusAttribute]) -> Self {
        Self {
            text: text.to_owned(),
            attributes: attributes.to_vec(),
        }
    }

    pub fn plain(text: &str) -> Self {
        Self::new(text, &[])
    }
}

impl From<IBusText> for Value<'static> {
    fn from(text: IBusText) -> Self {
        Value::from(&text)
    }
}

impl From<&IBusText> for Value<'static> {
    fn from(text: &IBusText) -> Self {
        Value::Structure(
            StructureBuilder::new()
                .add_field("IBusText")
                .add_field(attachments())
                .add_field(text.text.clone())
                .add_field(Value::from(IBusAttrList(&text.attributes)))
                .build(),
        )
    }
}
