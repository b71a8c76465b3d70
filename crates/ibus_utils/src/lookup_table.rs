use zbus::zvariant::{StructureBuilder, Value};

use crate::text::attachments;
use crate::IBusText;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableOrientation {
    Horizontal = 0,
    Vertical = 1,
    #[default]
    System = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IBusLookupTable {
    /// Number of candidates shown per page.
    page_size: u32,
    /// Position index of cursor.
    cursor_pos: u32,
    /// Whether the cursor is visible.
    cursor_visible: bool,
    /// `true` for lookup table wrap around.
    round: bool,
    orientation: TableOrientation,
    /// Candidate words/phrases.
    candidates: Vec<String>,
}

impl Default for IBusLookupTable {
    fn default() -> IBusLookupTable {
        IBusLookupTable::new(10, TableOrientation::System)
    }
}

impl IBusLookupTable {
    pub fn new(page_size: u32, orientation: TableOrientation) -> IBusLookupTable {
        IBusLookupTable {
            page_size: page_size.max(1),
            cursor_pos: 0,
            cursor_visible: true,
            round: false,
            orientation,
            candidates: Vec::new(),
        }
    }

    pub fn append_candidate(&mut self, text: &str) {
        self.candidates.push(text.to_owned());
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.max(1);
    }

    pub fn get_cursor_pos(&self) -> u32 {
        self.cursor_pos
    }

    /// Move the cursor; positions past the end are clamped to the last candidate.
    pub fn set_cursor_pos(&mut self, pos: u32) {
        let last = (self.candidates.len() as u32).saturating_sub(1);
        self.cursor_pos = pos.min(last);
    }

    pub fn get_cursor_pos_in_current_page(&self) -> u32 {
        self.cursor_pos % self.page_size
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.cursor_pos = 0;
    }
}

impl From<&IBusLookupTable> for Value<'static> {
    fn from(table: &IBusLookupTable) -> Self {
        let texts = |items: &[String]| -> Vec<Value<'static>> {
            items
                .iter()
                .map(|item| Value::from(IBusText::plain(item)))
                .collect()
        };
        Value::Structure(
            StructureBuilder::new()
                .add_field("IBusLookupTable")
                .add_field(attachments())
                .add_field(table.page_size)
                .add_field(table.cursor_pos)
                .add_field(table.cursor_visible)
                .add_field(table.round)
                .add_field(table.orientation as i32)
                .add_field(texts(&table.candidates))
                // No labels; clients number the page 1, 2, 3 ...
                .add_field(texts(&[]))
                .build(),
        )
    }
}
