use std::path::PathBuf;

use ibus_utils::ibus_constants::{CONTROL_MASK, RELEASE_MASK};
use m17n_lib::{Action, MethodLibrary, Phase, Session, SessionStyle, TableLibrary};
use xkeysym::Keysym;

fn shipped_tables() -> TableLibrary {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/tables");
    TableLibrary::new(vec![dir])
}

fn pinyin_session() -> Session {
    let method = shipped_tables().open("zh", "pinyin").unwrap();
    assert_eq!(method.info().engine_name(), "m17n:zh:pinyin");
    Session::new(1, method.create_context(), SessionStyle::default())
}

fn type_text(session: &mut Session, text: &str) -> Vec<bool> {
    text.chars()
        .map(|c| session.process_key_event(c as u32, 0, 0))
        .collect()
}

fn commits(actions: &[Action]) -> Vec<String> {
    actions
        .iter()
        .filter_map(Action::as_commit_text)
        .map(|text| text.text.clone())
        .collect()
}

#[test]
fn shipped_tables_are_listed() {
    let methods = shipped_tables().list_methods();
    let names: Vec<String> = methods.iter().map(|m| m.engine_name()).collect();
    assert!(names.contains(&"m17n:zh:pinyin".to_owned()));
    assert!(names.contains(&"m17n:hi:itrans".to_owned()));
}

#[test]
fn typing_a_reading_and_space_commits() {
    let mut session = pinyin_session();
    session.set_enabled(true);
    session.focus_in();
    let actions = session.take_actions();
    assert!(matches!(actions[0], Action::RegisterProperties(_)));
    let status = actions
        .iter()
        .find_map(Action::as_update_property)
        .unwrap();
    assert_eq!(status.label, "拼");

    assert_eq!(type_text(&mut session, "zhong"), vec![true; 5]);
    assert_eq!(session.phase(), Phase::Composing);
    let actions = session.take_actions();
    let (preedit, cursor_pos, visible) = actions
        .iter()
        .rev()
        .find_map(Action::as_update_preedit)
        .unwrap();
    assert_eq!(preedit.text, "zhong");
    assert_eq!(*cursor_pos, 5);
    assert!(*visible);
    let (table, visible) = actions
        .iter()
        .rev()
        .find_map(Action::as_update_lookup_table)
        .unwrap();
    assert!(*visible);
    assert_eq!(table.candidates()[0], "中");
    assert!(commits(&actions).is_empty());

    assert!(session.process_key_event(' ' as u32, 0, 0));
    let actions = session.take_actions();
    assert_eq!(commits(&actions), vec!["中"]);
    let (preedit, _, visible) = actions
        .iter()
        .rev()
        .find_map(Action::as_update_preedit)
        .unwrap();
    assert!(preedit.text.is_empty());
    assert!(!*visible);
    assert_eq!(session.phase(), Phase::FocusedIdle);
}

#[test]
fn candidate_navigation_then_digit() {
    let mut session = pinyin_session();
    session.focus_in();
    type_text(&mut session, "zhong");
    session.cursor_down();
    assert_eq!(session.lookup_table().get_cursor_pos(), 1);
    session.take_actions();

    assert!(session.process_key_event('3' as u32, 0, 0));
    assert_eq!(commits(&session.take_actions()), vec!["重"]);
}

#[test]
fn reset_never_commits() {
    let mut session = pinyin_session();
    session.focus_in();
    type_text(&mut session, "guo");
    session.take_actions();
    session.reset();
    let actions = session.take_actions();
    assert!(commits(&actions).is_empty());
    assert_eq!(session.phase(), Phase::FocusedIdle);
    // The discarded reading does not come back on the next key.
    assert!(!session.process_key_event(' ' as u32, 0, 0));
    assert!(commits(&session.take_actions()).is_empty());
}

#[test]
fn unrelated_keys_reach_the_client() {
    let mut session = pinyin_session();
    session.focus_in();
    session.take_actions();
    assert!(!session.process_key_event('a' as u32, 0, RELEASE_MASK));
    assert!(!session.process_key_event('c' as u32, 0, CONTROL_MASK));
    assert!(!session.process_key_event(Keysym::Shift_L.raw(), 0, 0));
    assert!(!session.process_key_event(Keysym::Return.raw(), 0, 0));
    assert!(session.take_actions().is_empty());
}

#[test]
fn direct_mode_passes_letters() {
    let mut session = pinyin_session();
    session.focus_in();
    session.property_activate("status", 0);
    let actions = session.take_actions();
    let status = actions
        .iter()
        .rev()
        .find_map(Action::as_update_property)
        .unwrap();
    assert_eq!(status.label, "A");
    assert!(!session.process_key_event('z' as u32, 0, 0));
}

#[test]
fn digit_selects_the_labelled_candidate_on_the_shown_page() {
    let mut session = pinyin_session();
    session.focus_in();
    type_text(&mut session, "zh");
    for _ in 0..5 {
        session.cursor_down();
    }
    let table = session.lookup_table();
    assert_eq!(table.page_size(), 5);
    assert_eq!(table.get_cursor_pos(), 5);
    let page_start = (table.get_cursor_pos() / table.page_size() * table.page_size()) as usize;
    let labelled_one = table.candidates()[page_start].clone();
    assert_eq!(labelled_one, "中文");
    session.take_actions();

    assert!(session.process_key_event('1' as u32, 0, 0));
    assert_eq!(commits(&session.take_actions()), vec![labelled_one]);
}
