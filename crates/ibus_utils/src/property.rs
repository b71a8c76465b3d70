use zbus::zvariant::{StructureBuilder, Value};

use crate::ibus_constants::{PROP_STATE_UNCHECKED, PROP_TYPE_NORMAL};
use crate::text::attachments;
use crate::IBusText;

/// An entry of the engine's language-bar menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IBusProperty {
    pub key: String,
    pub prop_type: u32,
    pub label: String,
    pub icon: String,
    pub tooltip: String,
    pub sensitive: bool,
    pub visible: bool,
    pub state: u32,
}

impl IBusProperty {
    pub fn new(key: &str, tooltip: &str) -> Self {
        Self {
            key: key.to_owned(),
            prop_type: PROP_TYPE_NORMAL,
            label: String::new(),
            icon: String::new(),
            tooltip: tooltip.to_owned(),
            sensitive: true,
            visible: false,
            state: PROP_STATE_UNCHECKED,
        }
    }
}

impl From<&IBusProperty> for Value<'static> {
    fn from(prop: &IBusProperty) -> Self {
        Value::Structure(
            StructureBuilder::new()
                .add_field("IBusProperty")
                .add_field(attachments())
                .add_field(prop.key.clone())
                .add_field(prop.prop_type)
                .add_field(Value::from(IBusText::plain(&prop.label)))
                .add_field(prop.icon.clone())
                .add_field(Value::from(IBusText::plain(&prop.tooltip)))
                .add_field(prop.sensitive)
                .add_field(prop.visible)
                .add_field(prop.state)
                .add_field(Value::from(IBusPropList(&[])))
                .add_field(Value::from(IBusText::plain("")))
                .build(),
        )
    }
}

pub struct IBusPropList<'a>(pub &'a [IBusProperty]);

impl From<IBusPropList<'_>> for Value<'static> {
    fn from(list: IBusPropList<'_>) -> Self {
        Value::Structure(
            StructureBuilder::new()
                .add_field("IBusPropList")
                .add_field(attachments())
                .add_field(list.0.iter().map(Value::from).collect::<Vec<_>>())
                .build(),
        )
    }
}
