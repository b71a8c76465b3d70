//! Translation of IBus key events into the key symbols an input method expects.
//!
//! A symbol is the key name with modifier prefixes, e.g. `a`, `C-A`, `S- `,
//! `A-BackSpace`. Prefixes always appear in the order `S-`, `C-`, `M-`, `A-`,
//! `G-` (AltGr), `s-`, `H-`.
use std::fmt;

use ibus_utils::ibus_constants::{
    ALT_MASK, CONTROL_MASK, HYPER_MASK, META_MASK, MOD5_MASK, SHIFT_MASK, SUPER_MASK,
};
use xkeysym::Keysym;

/// Pseudo keys fed to the input method on focus changes.
pub const INPUT_FOCUS_IN: &str = "input-focus-in";
pub const INPUT_FOCUS_OUT: &str = "input-focus-out";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key name without modifier prefixes.
    pub fn base(&self) -> &str {
        let mut rest = self.0.as_str();
        while let Some(stripped) = strip_modifier(rest) {
            rest = stripped;
        }
        rest
    }

    /// Whether any of the given prefixes (e.g. `"C-"`) is present.
    pub fn has_modifier(&self, prefix: &str) -> bool {
        let mut rest = self.0.as_str();
        while let Some(stripped) = strip_modifier(rest) {
            if rest.starts_with(prefix) {
                return true;
            }
            rest = stripped;
        }
        false
    }
}

fn strip_modifier(s: &str) -> Option<&str> {
    // A prefix must be followed by a key name.
    const PREFIXES: [&str; 7] = ["S-", "C-", "M-", "A-", "G-", "s-", "H-"];
    PREFIXES
        .iter()
        .find_map(|p| s.strip_prefix(p))
        .filter(|rest| !rest.is_empty())
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

fn is_pure_modifier(keysym: Keysym) -> bool {
    (Keysym::Shift_L.raw()..=Keysym::Hyper_R.raw()).contains(&keysym.raw())
}

/// Names of the keys input methods bind most often.
fn named_key(keysym: Keysym) -> Option<&'static str> {
    let name = match keysym {
        Keysym::BackSpace => "BackSpace",
        Keysym::Tab => "Tab",
        Keysym::ISO_Left_Tab => "ISO_Left_Tab",
        Keysym::Return => "Return",
        Keysym::Escape => "Escape",
        Keysym::Delete => "Delete",
        Keysym::Home => "Home",
        Keysym::End => "End",
        Keysym::Left => "Left",
        Keysym::Up => "Up",
        Keysym::Right => "Right",
        Keysym::Down => "Down",
        Keysym::Page_Up => "Page_Up",
        Keysym::Page_Down => "Page_Down",
        Keysym::Insert => "Insert",
        Keysym::KP_Enter => "KP_Enter",
        _ => return None,
    };
    Some(name)
}

fn key_name(keysym: Keysym) -> Option<String> {
    if let Some(name) = named_key(keysym) {
        return Some(name.to_owned());
    }
    let name = keysym.name()?;
    let name = name.strip_prefix("XK_").unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name.to_owned())
    }
}

/// Translate a pressed key into its symbol.
///
/// Returns `None` for modifier keys themselves and for keysyms without a
/// name; callers report those as not handled.
pub fn translate(keyval: u32, state: u32) -> Option<Symbol> {
    let keysym = Keysym::new(keyval);
    if is_pure_modifier(keysym) {
        return None;
    }

    let mut mask = 0;
    let key = if (Keysym::space.raw()..=Keysym::asciitilde.raw()).contains(&keyval) {
        let mut c = char::from_u32(keyval)?;
        if keysym == Keysym::space && state & SHIFT_MASK != 0 {
            mask |= SHIFT_MASK;
        }
        if state & CONTROL_MASK != 0 {
            c = c.to_ascii_uppercase();
            mask |= CONTROL_MASK;
        }
        c.to_string()
    } else {
        mask |= state & (SHIFT_MASK | CONTROL_MASK);
        key_name(keysym)?
    };

    mask |= state & (ALT_MASK | MOD5_MASK | META_MASK | SUPER_MASK | HYPER_MASK);

    let mut symbol = String::with_capacity(key.len() + 12);
    for (bit, prefix) in [
        (SHIFT_MASK, "S-"),
        (CONTROL_MASK, "C-"),
        (META_MASK, "M-"),
        (ALT_MASK, "A-"),
        (MOD5_MASK, "G-"),
        (SUPER_MASK, "s-"),
        (HYPER_MASK, "H-"),
    ] {
        if mask & bit != 0 {
            symbol.push_str(prefix);
        }
    }
    symbol.push_str(&key);
    Some(Symbol(symbol))
}
