//! Engine descriptions and the component that announces them to ibus-daemon.

use std::fmt::Write;

use zbus::zvariant::{StructureBuilder, Value};

use crate::text::attachments;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IBusEngineDesc {
    pub name: String,
    pub longname: String,
    pub description: String,
    pub language: String,
    pub license: String,
    pub author: String,
    pub icon: String,
    pub layout: String,
    pub rank: u32,
}

impl From<&IBusEngineDesc> for Value<'static> {
    fn from(desc: &IBusEngineDesc) -> Self {
        Value::Structure(
            StructureBuilder::new()
                .add_field("IBusEngineDesc")
                .add_field(attachments())
                .add_field(desc.name.clone())
                .add_field(desc.longname.clone())
                .add_field(desc.description.clone())
                .add_field(desc.language.clone())
                .add_field(desc.license.clone())
                .add_field(desc.author.clone())
                .add_field(desc.icon.clone())
                .add_field(desc.layout.clone())
                .add_field(desc.rank)
                // hotkeys, symbol, setup, layout_variant, layout_option,
                // version, textdomain, icon_prop_key
                .add_field(String::new())
                .add_field(String::new())
                .add_field(String::new())
                .add_field(String::new())
                .add_field(String::new())
                .add_field(String::new())
                .add_field(String::new())
                .add_field(String::new())
                .build(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IBusComponent {
    pub name: String,
    pub description: String,
    pub version: String,
    pub license: String,
    pub author: String,
    pub homepage: String,
    pub exec: String,
    pub textdomain: String,
    pub engines: Vec<IBusEngineDesc>,
}

impl From<&IBusComponent> for Value<'static> {
    fn from(component: &IBusComponent) -> Self {
        Value::Structure(
            StructureBuilder::new()
                .add_field("IBusComponent")
                .add_field(attachments())
                .add_field(component.name.clone())
                .add_field(component.description.clone())
                .add_field(component.version.clone())
                .add_field(component.license.clone())
                .add_field(component.author.clone())
                .add_field(component.homepage.clone())
                .add_field(component.exec.clone())
                .add_field(component.textdomain.clone())
                // observed paths
                .add_field(Vec::<Value<'static>>::new())
                .add_field(
                    component
                        .engines
                        .iter()
                        .map(Value::from)
                        .collect::<Vec<_>>(),
                )
                .build(),
        )
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// The `<engines>` element ibus-daemon expects from `--xml`.
pub fn engines_xml(engines: &[IBusEngineDesc]) -> String {
    let mut out = String::from("<engines>\n");
    for engine in engines {
        out.push_str("  <engine>\n");
        let fields = [
            ("name", &engine.name),
            ("longname", &engine.longname),
            ("description", &engine.description),
            ("language", &engine.language),
            ("license", &engine.license),
            ("author", &engine.author),
            ("icon", &engine.icon),
            ("layout", &engine.layout),
        ];
        for (tag, value) in fields {
            let _ = writeln!(out, "    <{tag}>{}</{tag}>", escape_xml(value));
        }
        let _ = writeln!(out, "    <rank>{}</rank>", engine.rank);
        out.push_str("  </engine>\n");
    }
    out.push_str("</engines>\n");
    out
}
