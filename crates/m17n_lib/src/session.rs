//! One input context bound to one IBus engine object.
//!
//! A [`Session`] never talks to the bus. Every call records the [`Action`]s
//! the transport must perform; the caller drains them with
//! [`Session::take_actions`] once the call returns.
use enum_as_inner::EnumAsInner;
use ibus_utils::ibus_constants::RELEASE_MASK;
use ibus_utils::{
    Attribute, IBusAttribute, IBusLookupTable, IBusProperty, IBusText, TableOrientation,
    Underline,
};
use log::debug;

use crate::keysym::{self, Symbol, INPUT_FOCUS_IN, INPUT_FOCUS_OUT};
use crate::method::{Callbacks, Command, ContextState, InputContext};

pub const STATUS_PROPERTY: &str = "status";

#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum Action {
    CommitText(IBusText),
    UpdatePreedit {
        text: IBusText,
        cursor_pos: u32,
        visible: bool,
    },
    UpdateLookupTable {
        table: IBusLookupTable,
        visible: bool,
    },
    UpdateAuxiliaryText {
        text: IBusText,
        visible: bool,
    },
    RegisterProperties(Vec<IBusProperty>),
    UpdateProperty(IBusProperty),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Inactive,
    FocusedIdle,
    Composing,
    Destroyed,
}

/// How preedit and candidates are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStyle {
    pub preedit_foreground: u32,
    pub preedit_background: u32,
    pub preedit_underline: Underline,
    pub page_size: u32,
    pub orientation: TableOrientation,
}

impl Default for SessionStyle {
    fn default() -> Self {
        Self {
            preedit_foreground: 0xffffff,
            preedit_background: 0x000000,
            preedit_underline: Underline::None,
            page_size: 10,
            orientation: TableOrientation::System,
        }
    }
}

/// The callback side of a session: turns library redraw requests into actions.
struct Presenter {
    style: SessionStyle,
    table: IBusLookupTable,
    status: IBusProperty,
    preedit_active: bool,
    candidates_active: bool,
    actions: Vec<Action>,
}

impl Presenter {
    fn new(style: SessionStyle) -> Self {
        Self {
            style,
            table: IBusLookupTable::new(style.page_size, style.orientation),
            status: IBusProperty::new(STATUS_PROPERTY, "m17n status"),
            preedit_active: false,
            candidates_active: false,
            actions: Vec::new(),
        }
    }

    fn is_composing(&self) -> bool {
        self.preedit_active || self.candidates_active
    }

    fn draw_preedit(&mut self, state: &ContextState) {
        let len = state.preedit.chars().count() as u32;
        let mut attributes = vec![
            IBusAttribute::new(Attribute::Background(self.style.preedit_background), 0, len),
            IBusAttribute::new(Attribute::Foreground(self.style.preedit_foreground), 0, len),
        ];
        if self.style.preedit_underline != Underline::None {
            attributes.push(IBusAttribute::new(
                Attribute::Underline(self.style.preedit_underline),
                0,
                len,
            ));
        }
        self.preedit_active = len > 0;
        self.actions.push(Action::UpdatePreedit {
            text: IBusText::new(&state.preedit, &attributes),
            cursor_pos: state.cursor_pos.min(len),
            visible: len > 0,
        });
    }

    fn draw_status(&mut self, state: &ContextState) {
        self.status.label = state.status.clone();
        self.status.visible = !state.status.is_empty();
        self.actions.push(Action::UpdateProperty(self.status.clone()));
    }

    fn hide_candidates(&mut self) {
        self.table.clear();
        self.candidates_active = false;
        self.actions.push(Action::UpdateLookupTable {
            table: self.table.clone(),
            visible: false,
        });
        self.actions.push(Action::UpdateAuxiliaryText {
            text: IBusText::default(),
            visible: false,
        });
    }

    fn draw_candidates(&mut self, state: &ContextState) {
        if state.candidate_count() == 0 {
            self.hide_candidates();
            return;
        }
        self.table.clear();
        // One library group is one page.
        if let Some(page_size) = state.candidates.iter().map(Vec::len).max() {
            self.table.set_page_size(page_size as u32);
        }
        for candidate in state.candidates.iter().flatten() {
            self.table.append_candidate(candidate);
        }
        self.table.set_cursor_pos(state.candidate_index);
        self.candidates_active = true;

        let aux = format!(
            "({} / {})",
            self.table.get_cursor_pos() + 1,
            self.table.len()
        );
        let visible = state.candidates_visible;
        self.actions.push(Action::UpdateLookupTable {
            table: self.table.clone(),
            visible,
        });
        self.actions.push(Action::UpdateAuxiliaryText {
            text: IBusText::plain(&aux),
            visible,
        });
    }
}

impl Callbacks for Presenter {
    fn callback(&mut self, command: Command, state: &ContextState) {
        match command {
            Command::PreeditDraw => self.draw_preedit(state),
            Command::StatusDraw => self.draw_status(state),
            Command::CandidatesStart | Command::CandidatesDone => self.hide_candidates(),
            Command::CandidatesDraw => self.draw_candidates(state),
            Command::PreeditStart | Command::PreeditDone => {
                self.preedit_active = command == Command::PreeditStart;
            }
            Command::StatusStart
            | Command::StatusDone
            | Command::SetSpot
            | Command::Toggle
            | Command::Reset
            | Command::GetSurroundingText
            | Command::DeleteSurroundingText => debug!("callback {:?}", command),
        }
    }
}

pub struct Session {
    id: u32,
    context: Option<Box<dyn InputContext>>,
    presenter: Presenter,
    phase: Phase,
    enabled: bool,
    cursor_location: (i32, i32, i32, i32),
}

impl Session {
    pub fn new(id: u32, context: Box<dyn InputContext>, style: SessionStyle) -> Self {
        Self {
            id,
            context: Some(context),
            presenter: Presenter::new(style),
            phase: Phase::Inactive,
            enabled: false,
            cursor_location: (0, 0, 0, 0),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cursor_location(&self) -> (i32, i32, i32, i32) {
        self.cursor_location
    }

    pub fn status(&self) -> &IBusProperty {
        &self.presenter.status
    }

    pub fn lookup_table(&self) -> &IBusLookupTable {
        &self.presenter.table
    }

    /// Drain the actions recorded since the last call.
    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.presenter.actions)
    }

    /// Returns whether the key was handled; `false` hands it back to the client.
    pub fn process_key_event(&mut self, keyval: u32, keycode: u32, state: u32) -> bool {
        if state & RELEASE_MASK != 0 {
            return false;
        }
        let Some(key) = keysym::translate(keyval, state) else {
            debug!("no symbol for keyval={:#x} keycode={}", keyval, keycode);
            return false;
        };
        self.feed(&key)
    }

    pub fn focus_in(&mut self) {
        if self.phase == Phase::Destroyed {
            return;
        }
        self.presenter
            .actions
            .push(Action::RegisterProperties(vec![self.presenter.status.clone()]));
        self.phase = Phase::FocusedIdle;
        self.feed(&Symbol::from(INPUT_FOCUS_IN));
    }

    pub fn focus_out(&mut self) {
        if self.phase == Phase::Destroyed {
            return;
        }
        self.feed(&Symbol::from(INPUT_FOCUS_OUT));
        if self.phase != Phase::Destroyed {
            self.phase = Phase::Inactive;
        }
    }

    pub fn page_up(&mut self) {
        self.feed(&Symbol::from("Up"));
    }

    pub fn page_down(&mut self) {
        self.feed(&Symbol::from("Down"));
    }

    pub fn cursor_up(&mut self) {
        self.feed(&Symbol::from("Left"));
    }

    pub fn cursor_down(&mut self) {
        self.feed(&Symbol::from("Right"));
    }

    /// Drop the composition. Nothing is committed.
    pub fn reset(&mut self) {
        let Some(context) = self.context.as_mut() else {
            return;
        };
        context.reset(&mut self.presenter);
        self.update_phase();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled && self.enabled {
            self.focus_out();
        }
        self.enabled = enabled;
    }

    pub fn set_cursor_location(&mut self, x: i32, y: i32, w: i32, h: i32) {
        self.cursor_location = (x, y, w, h);
        if let Some(context) = self.context.as_mut() {
            context.set_spot(x, y, w, h, &mut self.presenter);
        }
    }

    pub fn property_activate(&mut self, name: &str, state: u32) {
        let Some(context) = self.context.as_mut() else {
            return;
        };
        if !context.activate_property(name, state, &mut self.presenter) {
            debug!("property {} is not handled by the input method", name);
        }
        self.update_phase();
    }

    /// Release the input context. Safe to call more than once.
    pub fn destroy(&mut self) {
        self.context = None;
        self.presenter.actions.clear();
        self.phase = Phase::Destroyed;
    }

    /// Run a key through filter and lookup.
    fn feed(&mut self, key: &Symbol) -> bool {
        let Some(context) = self.context.as_mut() else {
            return false;
        };
        debug!("session {}: key {:?}", self.id, key.as_str());

        let handled = if context.filter(key, &mut self.presenter) {
            true
        } else {
            let lookup = context.lookup(key, &mut self.presenter);
            if !lookup.produced.is_empty() {
                self.presenter
                    .actions
                    .push(Action::CommitText(IBusText::plain(&lookup.produced)));
                self.presenter.draw_preedit(context.state());
            }
            lookup.handled
        };
        self.update_phase();
        handled
    }

    fn update_phase(&mut self) {
        self.phase = match self.phase {
            Phase::Destroyed => Phase::Destroyed,
            _ if self.presenter.is_composing() => Phase::Composing,
            Phase::Composing => Phase::FocusedIdle,
            phase => phase,
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use ibus_utils::ibus_constants::{CONTROL_MASK, SHIFT_MASK};

    use super::*;
    use crate::method::Lookup;

    /// Records the keys it sees and replays scripted callbacks.
    #[derive(Default)]
    struct Scripted {
        state: ContextState,
        seen: Arc<Mutex<Vec<String>>>,
        absorb: bool,
        produce: Option<String>,
        on_filter: Vec<(Command, ContextState)>,
    }

    impl InputContext for Scripted {
        fn filter(&mut self, key: &Symbol, callbacks: &mut dyn Callbacks) -> bool {
            self.seen.lock().unwrap().push(key.as_str().to_owned());
            for (command, state) in self.on_filter.drain(..) {
                self.state = state;
                callbacks.callback(command, &self.state);
            }
            self.absorb
        }

        fn lookup(&mut self, _key: &Symbol, _callbacks: &mut dyn Callbacks) -> Lookup {
            match self.produce.take() {
                Some(text) => Lookup::produced(text),
                None => Lookup::unhandled(),
            }
        }

        fn reset(&mut self, callbacks: &mut dyn Callbacks) {
            self.state = ContextState::default();
            callbacks.callback(Command::PreeditDraw, &self.state);
            callbacks.callback(Command::CandidatesDone, &self.state);
        }

        fn state(&self) -> &ContextState {
            &self.state
        }
    }

    fn session(context: Scripted) -> Session {
        Session::new(1, Box::new(context), SessionStyle::default())
    }

    fn candidates_state(groups: &[&[&str]], index: u32, visible: bool) -> ContextState {
        ContextState {
            candidates: groups
                .iter()
                .map(|g| g.iter().map(|s| s.to_string()).collect())
                .collect(),
            candidate_index: index,
            candidates_visible: visible,
            ..Default::default()
        }
    }

    #[test]
    fn release_is_not_handled() {
        let mut s = session(Scripted {
            absorb: true,
            ..Default::default()
        });
        assert!(!s.process_key_event('a' as u32, 38, RELEASE_MASK));
        assert!(s.take_actions().is_empty());
    }

    #[test]
    fn modifier_key_is_not_handled() {
        let mut s = session(Scripted {
            absorb: true,
            ..Default::default()
        });
        assert!(!s.process_key_event(0xffe1, 50, SHIFT_MASK));
    }

    #[test]
    fn absorbed_key_is_handled_without_commit() {
        let mut s = session(Scripted {
            absorb: true,
            produce: Some("x".to_owned()),
            ..Default::default()
        });
        assert!(s.process_key_event('a' as u32, 38, 0));
        assert!(s.take_actions().iter().all(|a| a.as_commit_text().is_none()));
    }

    #[test]
    fn produced_text_is_committed() {
        let mut s = session(Scripted {
            produce: Some("ক".to_owned()),
            ..Default::default()
        });
        assert!(s.process_key_event('k' as u32, 45, 0));
        let actions = s.take_actions();
        assert_eq!(actions[0].as_commit_text().unwrap().text, "ক");
    }

    #[test]
    fn failed_lookup_is_not_handled() {
        let mut s = session(Scripted::default());
        assert!(!s.process_key_event('a' as u32, 38, CONTROL_MASK));
        assert!(s.take_actions().is_empty());
    }

    #[test]
    fn preedit_draw_covers_whole_text() {
        let state = ContextState {
            preedit: "zhō".to_owned(),
            cursor_pos: 3,
            ..Default::default()
        };
        let mut s = session(Scripted {
            absorb: true,
            on_filter: vec![(Command::PreeditDraw, state)],
            ..Default::default()
        });
        s.process_key_event('o' as u32, 32, 0);
        let actions = s.take_actions();
        let (text, cursor_pos, visible) = actions[0].as_update_preedit().unwrap();
        assert_eq!(text.text, "zhō");
        assert_eq!(
            text.attributes,
            vec![
                IBusAttribute::new(Attribute::Background(0x000000), 0, 3),
                IBusAttribute::new(Attribute::Foreground(0xffffff), 0, 3),
            ]
        );
        assert_eq!(*cursor_pos, 3);
        assert!(*visible);
        assert_eq!(s.phase(), Phase::Composing);
    }

    #[test]
    fn empty_preedit_is_hidden() {
        let mut s = session(Scripted {
            absorb: true,
            on_filter: vec![(Command::PreeditDraw, ContextState::default())],
            ..Default::default()
        });
        s.process_key_event('a' as u32, 38, 0);
        let actions = s.take_actions();
        let (text, _, visible) = actions[0].as_update_preedit().unwrap();
        assert!(text.text.is_empty());
        assert!(!*visible);
    }

    #[test]
    fn candidates_are_flattened() {
        let state = candidates_state(&[&["中", "种", "重"], &["众", "钟"]], 3, true);
        let mut s = session(Scripted {
            absorb: true,
            on_filter: vec![(Command::CandidatesDraw, state)],
            ..Default::default()
        });
        s.process_key_event('g' as u32, 42, 0);
        let actions = s.take_actions();
        let (table, visible) = actions[0].as_update_lookup_table().unwrap();
        assert_eq!(table.candidates(), &["中", "种", "重", "众", "钟"]);
        assert_eq!(table.get_cursor_pos(), 3);
        assert_eq!(table.page_size(), 3);
        assert_eq!(table.get_cursor_pos_in_current_page(), 0);
        assert!(*visible);
        let (aux, aux_visible) = actions[1].as_update_auxiliary_text().unwrap();
        assert_eq!(aux.text, "(4 / 5)");
        assert!(*aux_visible);
    }

    #[test]
    fn candidate_visibility_follows_library() {
        let state = candidates_state(&[&["a", "b"]], 0, false);
        let mut s = session(Scripted {
            absorb: true,
            on_filter: vec![(Command::CandidatesDraw, state)],
            ..Default::default()
        });
        s.process_key_event('g' as u32, 42, 0);
        let actions = s.take_actions();
        assert!(!*actions[0].as_update_lookup_table().unwrap().1);
        assert!(!*actions[1].as_update_auxiliary_text().unwrap().1);
    }

    #[test]
    fn candidate_index_is_clamped() {
        let state = candidates_state(&[&["a", "b"]], 7, true);
        let mut s = session(Scripted {
            absorb: true,
            on_filter: vec![(Command::CandidatesDraw, state)],
            ..Default::default()
        });
        s.process_key_event('g' as u32, 42, 0);
        assert_eq!(s.lookup_table().get_cursor_pos(), 1);
        let actions = s.take_actions();
        assert_eq!(actions[1].as_update_auxiliary_text().unwrap().0.text, "(2 / 2)");
    }

    #[test]
    fn candidates_start_and_done_hide_everything() {
        for command in [Command::CandidatesStart, Command::CandidatesDone] {
            let drawn = candidates_state(&[&["a", "b"]], 0, true);
            let mut s = session(Scripted {
                absorb: true,
                on_filter: vec![
                    (Command::CandidatesDraw, drawn),
                    (command, ContextState::default()),
                ],
                ..Default::default()
            });
            s.process_key_event('g' as u32, 42, 0);
            let actions = s.take_actions();
            let (table, visible) = actions[2].as_update_lookup_table().unwrap();
            assert!(table.is_empty());
            assert!(!*visible);
            let (aux, aux_visible) = actions[3].as_update_auxiliary_text().unwrap();
            assert!(aux.text.is_empty());
            assert!(!*aux_visible);
            assert!(s.lookup_table().is_empty());
        }
    }

    #[test]
    fn empty_draw_clears_candidates() {
        let mut s = session(Scripted {
            absorb: true,
            on_filter: vec![(Command::CandidatesDraw, ContextState::default())],
            ..Default::default()
        });
        s.process_key_event('g' as u32, 42, 0);
        let actions = s.take_actions();
        assert!(!*actions[0].as_update_lookup_table().unwrap().1);
    }

    #[test]
    fn status_draw_toggles_visibility() {
        let state = ContextState {
            status: "अ".to_owned(),
            ..Default::default()
        };
        let mut s = session(Scripted {
            absorb: true,
            on_filter: vec![
                (Command::StatusDraw, state),
                (Command::StatusDraw, ContextState::default()),
            ],
            ..Default::default()
        });
        s.process_key_event('a' as u32, 38, 0);
        let actions = s.take_actions();
        let shown = actions[0].as_update_property().unwrap();
        assert_eq!(shown.label, "अ");
        assert!(shown.visible);
        let hidden = actions[1].as_update_property().unwrap();
        assert!(hidden.label.is_empty());
        assert!(!hidden.visible);
    }

    #[test]
    fn focus_in_registers_properties_and_feeds_pseudo_key() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut s = session(Scripted {
            seen: seen.clone(),
            ..Default::default()
        });
        s.focus_in();
        let actions = s.take_actions();
        let props = actions[0].as_register_properties().unwrap();
        assert_eq!(props[0].key, STATUS_PROPERTY);
        assert_eq!(s.phase(), Phase::FocusedIdle);
        assert_eq!(*seen.lock().unwrap(), vec![INPUT_FOCUS_IN]);
    }

    #[test]
    fn reset_never_commits() {
        let mut s = session(Scripted {
            produce: Some("leftover".to_owned()),
            ..Default::default()
        });
        s.reset();
        let actions = s.take_actions();
        assert!(actions.iter().all(|a| a.as_commit_text().is_none()));
        assert!(actions.iter().any(|a| a.as_update_preedit().is_some()));
    }

    #[test]
    fn destroy_is_terminal_and_idempotent() {
        let mut s = session(Scripted {
            absorb: true,
            ..Default::default()
        });
        s.destroy();
        s.destroy();
        assert_eq!(s.phase(), Phase::Destroyed);
        assert!(!s.process_key_event('a' as u32, 38, 0));
        s.focus_in();
        s.reset();
        assert!(s.take_actions().is_empty());
        assert_eq!(s.phase(), Phase::Destroyed);
    }

    #[test]
    fn disable_feeds_focus_out() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut s = session(Scripted {
            seen: seen.clone(),
            ..Default::default()
        });
        s.set_enabled(true);
        s.focus_in();
        s.set_enabled(false);
        assert!(!s.is_enabled());
        assert_eq!(s.phase(), Phase::Inactive);
        assert_eq!(*seen.lock().unwrap(), vec![INPUT_FOCUS_IN, INPUT_FOCUS_OUT]);
    }
}
