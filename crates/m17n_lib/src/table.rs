//! A table-driven input method library.
//!
//! Each YAML file describes one method: a reading (typed with ASCII letters)
//! maps to an ordered list of candidates.
//!
//! ```yaml
//! language: zh
//! name: pinyin
//! title: Pinyin
//! status: 拼
//! page_size: 5
//! entries:
//!   zhong: [中, 种, 重]
//! ```
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use serde::Deserialize;

use crate::keysym::{Symbol, INPUT_FOCUS_IN};
use crate::method::{
    Callbacks, Command, ContextState, InputContext, InputMethod, Lookup, MethodError,
    MethodInfo, MethodLibrary,
};
use crate::session::STATUS_PROPERTY;

const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_DIRECT_STATUS: &str = "A";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Table {
    pub language: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub direct_status: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<String>>,
}

impl Table {
    pub fn from_yaml(source: &str, path: &Path) -> Result<Table, MethodError> {
        let table: Table =
            serde_yaml_ng::from_str(source).map_err(|source| MethodError::Parse {
                path: path.to_owned(),
                source,
            })?;
        table.validate(path)?;
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Table, MethodError> {
        let source = fs::read_to_string(path).map_err(|source| MethodError::Io {
            path: path.to_owned(),
            source,
        })?;
        Table::from_yaml(&source, path)
    }

    fn validate(&self, path: &Path) -> Result<(), MethodError> {
        let invalid = |reason: String| MethodError::Invalid {
            path: path.to_owned(),
            reason,
        };
        if self.language.is_empty() || self.name.is_empty() {
            return Err(invalid("language and name must not be empty".to_owned()));
        }
        if self.page_size == Some(0) {
            return Err(invalid("page_size must be positive".to_owned()));
        }
        if let Some(reading) = self
            .entries
            .keys()
            .find(|reading| reading.is_empty() || !reading.chars().all(|c| c.is_ascii_lowercase()))
        {
            return Err(invalid(format!(
                "reading {:?} must consist of lowercase ASCII letters",
                reading
            )));
        }
        Ok(())
    }

    pub fn info(&self) -> MethodInfo {
        MethodInfo {
            language: self.language.clone(),
            name: self.name.clone(),
            title: self.title.clone(),
            icon: self.icon.clone(),
            description: self.description.clone(),
        }
    }

    fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    fn status(&self) -> &str {
        self.status
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(&self.name)
    }

    fn direct_status(&self) -> &str {
        self.direct_status.as_deref().unwrap_or(DEFAULT_DIRECT_STATUS)
    }

    fn is_prefix(&self, reading: &str) -> bool {
        self.entries
            .range(reading.to_owned()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(reading))
    }

    /// Exact matches first, then the entries the reading is a prefix of.
    fn candidates(&self, reading: &str) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();
        let exact = self.entries.get(reading).into_iter().flatten();
        let longer = self
            .entries
            .range(reading.to_owned()..)
            .take_while(|(key, _)| key.starts_with(reading))
            .filter(|(key, _)| key.as_str() != reading)
            .flat_map(|(_, values)| values);
        for candidate in exact.chain(longer) {
            if !candidates.contains(candidate) {
                candidates.push(candidate.clone());
            }
        }
        candidates
    }
}

/// Finds tables in a list of directories.
pub struct TableLibrary {
    dirs: Vec<PathBuf>,
}

impl TableLibrary {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn table_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for dir in &self.dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                debug!("skipping table directory {:?}", dir);
                continue;
            };
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.is_file()
                        && path
                            .extension()
                            .is_some_and(|ext| ext == "yml" || ext == "yaml")
                })
                .collect();
            found.sort();
            files.extend(found);
        }
        files
    }

    fn tables(&self) -> impl Iterator<Item = Table> + '_ {
        self.table_files()
            .into_iter()
            .filter_map(|path| match Table::load(&path) {
                Ok(table) => Some(table),
                Err(err) => {
                    warn!("ignoring table: {}", err);
                    None
                }
            })
    }
}

impl MethodLibrary for TableLibrary {
    fn list_methods(&self) -> Vec<MethodInfo> {
        let mut methods: Vec<MethodInfo> = Vec::new();
        for table in self.tables() {
            let info = table.info();
            // Earlier directories shadow later ones.
            if !methods
                .iter()
                .any(|m| m.language == info.language && m.name == info.name)
            {
                methods.push(info);
            }
        }
        methods
    }

    fn open(&self, language: &str, name: &str) -> Result<Box<dyn InputMethod>, MethodError> {
        self.tables()
            .find(|table| table.language == language && table.name == name)
            .map(|table| Box::new(TableMethod::new(table)) as Box<dyn InputMethod>)
            .ok_or_else(|| MethodError::NotFound {
                language: language.to_owned(),
                name: name.to_owned(),
            })
    }
}

pub struct TableMethod {
    info: MethodInfo,
    table: Arc<Table>,
}

impl TableMethod {
    pub fn new(table: Table) -> Self {
        Self {
            info: table.info(),
            table: Arc::new(table),
        }
    }
}

impl InputMethod for TableMethod {
    fn info(&self) -> &MethodInfo {
        &self.info
    }

    fn create_context(&self) -> Box<dyn InputContext> {
        Box::new(TableContext::new(self.table.clone()))
    }
}

pub struct TableContext {
    table: Arc<Table>,
    state: ContextState,
    direct: bool,
    preedit_active: bool,
    candidates_active: bool,
    /// Text produced by the last `filter`, handed out by `lookup`.
    pending: Option<String>,
}

impl TableContext {
    pub fn new(table: Arc<Table>) -> Self {
        let state = ContextState {
            status: table.status().to_owned(),
            ..Default::default()
        };
        Self {
            table,
            state,
            direct: false,
            preedit_active: false,
            candidates_active: false,
            pending: None,
        }
    }

    fn is_composing(&self) -> bool {
        !self.state.preedit.is_empty()
    }

    fn flat_candidates(&self) -> impl Iterator<Item = &String> {
        self.state.candidates.iter().flatten()
    }

    fn selected(&self) -> String {
        self.flat_candidates()
            .nth(self.state.candidate_index as usize)
            .cloned()
            .unwrap_or_else(|| self.state.preedit.clone())
    }

    fn redraw(&mut self, callbacks: &mut dyn Callbacks) {
        if self.state.preedit.is_empty() {
            self.finish(callbacks);
            return;
        }
        if !self.preedit_active {
            self.preedit_active = true;
            callbacks.callback(Command::PreeditStart, &self.state);
        }
        self.state.cursor_pos = self.state.preedit.chars().count() as u32;
        callbacks.callback(Command::PreeditDraw, &self.state);

        let candidates = self.table.candidates(&self.state.preedit);
        self.state.candidate_index = 0;
        if candidates.is_empty() {
            self.state.candidates.clear();
            self.state.candidates_visible = false;
            if self.candidates_active {
                self.candidates_active = false;
                callbacks.callback(Command::CandidatesDone, &self.state);
            }
            return;
        }
        self.state.candidates = candidates
            .chunks(self.table.page_size())
            .map(<[String]>::to_vec)
            .collect();
        self.state.candidates_visible = true;
        if !self.candidates_active {
            self.candidates_active = true;
            callbacks.callback(Command::CandidatesStart, &self.state);
        }
        callbacks.callback(Command::CandidatesDraw, &self.state);
    }

    /// Clear the composition and raise the matching done callbacks.
    fn finish(&mut self, callbacks: &mut dyn Callbacks) {
        self.state.preedit.clear();
        self.state.cursor_pos = 0;
        self.state.candidates.clear();
        self.state.candidate_index = 0;
        self.state.candidates_visible = false;
        if self.preedit_active {
            self.preedit_active = false;
            callbacks.callback(Command::PreeditDraw, &self.state);
            callbacks.callback(Command::PreeditDone, &self.state);
        }
        if self.candidates_active {
            self.candidates_active = false;
            callbacks.callback(Command::CandidatesDone, &self.state);
        }
    }

    fn commit(&mut self, text: String, callbacks: &mut dyn Callbacks) -> bool {
        self.finish(callbacks);
        self.pending = Some(text);
        false
    }

    fn move_candidate(&mut self, delta: i64, callbacks: &mut dyn Callbacks) -> bool {
        let total = self.flat_candidates().count() as i64;
        if total == 0 {
            return false;
        }
        let index = (self.state.candidate_index as i64 + delta).clamp(0, total - 1);
        self.state.candidate_index = index as u32;
        callbacks.callback(Command::CandidatesDraw, &self.state);
        true
    }

    fn select_on_page(&mut self, digit: u32, callbacks: &mut dyn Callbacks) -> bool {
        let page_size = self.table.page_size();
        let page_start =
            self.state.candidate_index as usize / page_size * page_size;
        let Some(candidate) = self
            .flat_candidates()
            .nth(page_start + digit as usize - 1)
            .cloned()
        else {
            // Digits without a candidate are swallowed while composing.
            return true;
        };
        self.commit(candidate, callbacks)
    }

    fn type_letter(&mut self, c: char, callbacks: &mut dyn Callbacks) -> bool {
        let mut extended = self.state.preedit.clone();
        extended.push(c);
        if self.table.is_prefix(&extended) {
            self.state.preedit = extended;
            self.redraw(callbacks);
            return true;
        }
        if !self.is_composing() {
            return false;
        }
        // The reading cannot grow: commit the selection, then start over.
        let mut produced = self.selected();
        self.finish(callbacks);
        let restart = c.to_string();
        if self.table.is_prefix(&restart) {
            self.state.preedit = restart;
            self.redraw(callbacks);
        } else {
            produced.push(c);
        }
        self.pending = Some(produced);
        false
    }
}

impl InputContext for TableContext {
    fn filter(&mut self, key: &Symbol, callbacks: &mut dyn Callbacks) -> bool {
        self.pending = None;
        let name = key.as_str();
        if name == INPUT_FOCUS_IN {
            callbacks.callback(Command::StatusDraw, &self.state);
            return false;
        }
        if self.direct || name != key.base() {
            return false;
        }

        let composing = self.is_composing();
        match name {
            " " if composing => {
                let text = self.selected();
                self.commit(text, callbacks)
            }
            "Return" | "KP_Enter" if composing => {
                let text = self.state.preedit.clone();
                self.commit(text, callbacks)
            }
            "BackSpace" if composing => {
                self.state.preedit.pop();
                self.redraw(callbacks);
                true
            }
            "Escape" if composing => {
                self.finish(callbacks);
                true
            }
            "Left" => self.move_candidate(-1, callbacks),
            "Right" => self.move_candidate(1, callbacks),
            "Up" => self.move_candidate(-(self.table.page_size() as i64), callbacks),
            "Down" => self.move_candidate(self.table.page_size() as i64, callbacks),
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_lowercase() => self.type_letter(c, callbacks),
                    (Some(c @ '1'..='9'), None) if self.state.candidates_visible => {
                        self.select_on_page(c as u32 - '0' as u32, callbacks)
                    }
                    _ => false,
                }
            }
        }
    }

    fn lookup(&mut self, _key: &Symbol, _callbacks: &mut dyn Callbacks) -> Lookup {
        match self.pending.take() {
            Some(text) => Lookup::produced(text),
            None => Lookup::unhandled(),
        }
    }

    fn reset(&mut self, callbacks: &mut dyn Callbacks) {
        self.pending = None;
        callbacks.callback(Command::Reset, &self.state);
        self.finish(callbacks);
    }

    fn state(&self) -> &ContextState {
        &self.state
    }

    fn set_spot(&mut self, _x: i32, _y: i32, _w: i32, _h: i32, callbacks: &mut dyn Callbacks) {
        callbacks.callback(Command::SetSpot, &self.state);
    }

    fn activate_property(&mut self, name: &str, _state: u32, callbacks: &mut dyn Callbacks) -> bool {
        if name != STATUS_PROPERTY {
            return false;
        }
        self.finish(callbacks);
        self.direct = !self.direct;
        self.state.status = if self.direct {
            self.table.direct_status().to_owned()
        } else {
            self.table.status().to_owned()
        };
        callbacks.callback(Command::Toggle, &self.state);
        callbacks.callback(Command::StatusDraw, &self.state);
        true
    }
}
