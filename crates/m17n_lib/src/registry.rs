//! Bookkeeping shared by factories: session ids, live counts, object paths,
//! and the process-wide factory count that decides when to exit.
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use event_listener::Event;
use ibus_utils::IBusEngineDesc;
use log::info;

use crate::method::MethodInfo;

pub const DEFAULT_ICON: &str = "ibus-m17n";
pub const AUTHORS: &str = "Huang Peng <shawn.p.huang@gmail.com>";
pub const CREDITS: &str = "GPLv2";

const PATH_PREFIX: &str = "/org/freedesktop/IBus/M17N";

/// Keymaps ranked above the other methods of their language.
const DEFAULT_KEYMAPS: &[&str] = &[
    "m17n:as:phonetic",
    "m17n:bn:inscript",
    "m17n:gu:inscript",
    "m17n:hi:inscript",
    "m17n:kn:kgp",
    "m17n:ks:kbd",
    "m17n:mai:inscript",
    "m17n:ml:inscript",
    "m17n:mr:inscript",
    "m17n:ne:rom",
    "m17n:or:inscript",
    "m17n:pa:inscript",
    "m17n:sa:harvard-kyoto",
    "m17n:sd:inscript",
    "m17n:si:wijesekera",
    "m17n:ta:tamil99",
    "m17n:te:inscript",
];

/// Counts live factories; notifies `done` when the last one goes away.
pub struct FactoryRegistry {
    live: AtomicUsize,
    finished: AtomicBool,
    done: Arc<Event>,
}

impl FactoryRegistry {
    pub fn new(done: Arc<Event>) -> Arc<Self> {
        Arc::new(Self {
            live: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            done,
        })
    }

    pub fn acquire(&self) {
        self.live.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns `true` if this was the last factory.
    pub fn release(&self) -> bool {
        let previous = self
            .live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        if previous == 1 {
            info!("last factory destroyed, shutting down");
            self.finished.store(true, Ordering::SeqCst);
            self.done.notify(usize::MAX);
            true
        } else {
            false
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Per-factory session ids. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct SessionCounter {
    next_id: AtomicU32,
    live: AtomicUsize,
}

impl Default for SessionCounter {
    fn default() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            live: AtomicUsize::new(0),
        }
    }
}

impl SessionCounter {
    pub fn open(&self) -> u32 {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn close(&self) {
        let _ = self
            .live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// What `GetInfo` reports for a factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryInfo {
    pub name: String,
    pub language: String,
    pub icon: String,
    pub authors: String,
    pub credits: String,
}

impl FactoryInfo {
    pub fn new(method: &MethodInfo) -> Self {
        Self {
            name: method.name.clone(),
            language: method.language.clone(),
            icon: method
                .icon
                .clone()
                .filter(|icon| !icon.is_empty())
                .unwrap_or_else(|| DEFAULT_ICON.to_owned()),
            authors: AUTHORS.to_owned(),
            credits: CREDITS.to_owned(),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.language.clone(),
            self.icon.clone(),
            self.authors.clone(),
            self.credits.clone(),
        ]
    }

    pub fn factory_path(&self) -> String {
        format!(
            "{}/{}/{}/Factory",
            PATH_PREFIX,
            path_component(&self.language),
            path_component(&self.name)
        )
    }

    pub fn engine_path(&self, id: u32) -> String {
        format!(
            "{}/{}/{}/Engine/{}",
            PATH_PREFIX,
            path_component(&self.language),
            path_component(&self.name),
            id
        )
    }
}

/// Make a string usable as one element of a D-Bus object path.
pub fn path_component(s: &str) -> String {
    let component: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if component.is_empty() {
        "_".to_owned()
    } else {
        component
    }
}

/// Split `m17n:<lang>:<name>`.
pub fn parse_engine_name(engine_name: &str) -> Option<(&str, &str)> {
    let rest = engine_name.strip_prefix("m17n:")?;
    let (language, name) = rest.split_once(':')?;
    if language.is_empty() || name.is_empty() || name.contains(':') {
        return None;
    }
    Some((language, name))
}

/// Parse a command-line method list, `lang:name[,name...]`.
pub fn parse_method_list(arg: &str) -> Option<Vec<(String, String)>> {
    let (language, names) = arg.split_once(':')?;
    if language.is_empty() {
        return None;
    }
    let methods: Vec<_> = names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| (language.to_owned(), name.to_owned()))
        .collect();
    if methods.is_empty() {
        None
    } else {
        Some(methods)
    }
}

pub fn engine_desc(method: &MethodInfo) -> IBusEngineDesc {
    let name = method.engine_name();
    let rank = u32::from(DEFAULT_KEYMAPS.contains(&name.as_str()));
    IBusEngineDesc {
        longname: format!("{} (m17n)", method.name),
        description: method.description.clone().unwrap_or_default(),
        language: method.language.clone(),
        license: "GPL".to_owned(),
        author: AUTHORS.to_owned(),
        icon: method.icon.clone().unwrap_or_default(),
        layout: "us".to_owned(),
        rank,
        name,
    }
}
