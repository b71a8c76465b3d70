//! The boundary between the engine and the input-method library.
//!
//! The library drives the engine through [`Callbacks`] while it is inside
//! `filter`, `lookup` or `reset`; the callback runs on the caller's stack and
//! reads the context through a shared [`ContextState`].
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::keysym::Symbol;

/// What the library asks the engine to redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    PreeditStart,
    PreeditDraw,
    PreeditDone,
    StatusStart,
    StatusDraw,
    StatusDone,
    CandidatesStart,
    CandidatesDraw,
    CandidatesDone,
    SetSpot,
    Toggle,
    Reset,
    GetSurroundingText,
    DeleteSurroundingText,
}

/// The part of an input context visible to callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextState {
    pub preedit: String,
    /// Cursor position inside the preedit, in characters.
    pub cursor_pos: u32,
    pub status: String,
    /// Candidate groups in display order, already decoded.
    pub candidates: Vec<Vec<String>>,
    /// Index of the selected candidate across all groups.
    pub candidate_index: u32,
    pub candidates_visible: bool,
}

impl ContextState {
    pub fn candidate_count(&self) -> usize {
        self.candidates.iter().map(Vec::len).sum()
    }
}

pub trait Callbacks {
    fn callback(&mut self, command: Command, state: &ContextState);
}

/// A closure works as a callback sink, which keeps tests short.
impl<F> Callbacks for F
where
    F: FnMut(Command, &ContextState),
{
    fn callback(&mut self, command: Command, state: &ContextState) {
        self(command, state)
    }
}

/// Result of [`InputContext::lookup`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lookup {
    /// Text produced for the client; may be empty.
    pub produced: String,
    /// Whether the key was recognized by the method.
    pub handled: bool,
}

impl Lookup {
    pub fn unhandled() -> Self {
        Lookup::default()
    }

    pub fn produced(text: impl Into<String>) -> Self {
        Lookup {
            produced: text.into(),
            handled: true,
        }
    }
}

pub trait InputContext: Send + Sync {
    /// Feed a key. `true` means the key was absorbed and nothing is produced.
    fn filter(&mut self, key: &Symbol, callbacks: &mut dyn Callbacks) -> bool;

    /// Collect the text produced by a key `filter` did not absorb.
    fn lookup(&mut self, key: &Symbol, callbacks: &mut dyn Callbacks) -> Lookup;

    /// Drop the current composition.
    fn reset(&mut self, callbacks: &mut dyn Callbacks);

    fn state(&self) -> &ContextState;

    fn set_spot(&mut self, _x: i32, _y: i32, _w: i32, _h: i32, _callbacks: &mut dyn Callbacks) {}

    /// Returns `false` when the method has no such property.
    fn activate_property(
        &mut self,
        _name: &str,
        _state: u32,
        _callbacks: &mut dyn Callbacks,
    ) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodInfo {
    pub language: String,
    pub name: String,
    pub title: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
}

impl MethodInfo {
    /// The name the IBus registry uses, `m17n:<lang>:<name>`.
    pub fn engine_name(&self) -> String {
        format!("m17n:{}:{}", self.language, self.name)
    }
}

pub trait InputMethod: Send + Sync {
    fn info(&self) -> &MethodInfo;

    fn create_context(&self) -> Box<dyn InputContext>;
}

pub trait MethodLibrary {
    fn list_methods(&self) -> Vec<MethodInfo>;

    fn open(&self, language: &str, name: &str) -> Result<Box<dyn InputMethod>, MethodError>;
}

#[derive(Debug, Error)]
pub enum MethodError {
    #[error("input method {language}:{name} not found")]
    NotFound { language: String, name: String },
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
    #[error("invalid table {path:?}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}
