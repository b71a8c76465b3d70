//! The `org.freedesktop.IBus.Engine` object for one input context.
//!
//! Every method forwards to the [`Session`] and then replays the actions the
//! session recorded as signals on this object.
use std::sync::Arc;

use ibus_utils::IBusPropList;
use log::{debug, error, info};
use m17n_lib::{Action, Session, SessionCounter};
use zbus::zvariant::{OwnedObjectPath, Value};
use zbus::{fdo, interface, object_server::SignalContext, ObjectServer};

pub(crate) struct M17nEngine {
    session: Session,
    sessions: Arc<SessionCounter>,
    path: OwnedObjectPath,
}

impl M17nEngine {
    pub fn new(session: Session, sessions: Arc<SessionCounter>, path: OwnedObjectPath) -> Self {
        Self {
            session,
            sessions,
            path,
        }
    }

    async fn emit(&mut self, ctxt: &SignalContext<'_>) -> zbus::Result<()> {
        for action in self.session.take_actions() {
            match action {
                Action::CommitText(text) => {
                    M17nEngine::commit_text(ctxt, text.into()).await?;
                }
                Action::UpdatePreedit {
                    text,
                    cursor_pos,
                    visible,
                } => {
                    M17nEngine::update_preedit_text(ctxt, text.into(), cursor_pos, visible)
                        .await?;
                }
                Action::UpdateLookupTable { table, visible } => {
                    M17nEngine::update_lookup_table(ctxt, (&table).into(), visible).await?;
                }
                Action::UpdateAuxiliaryText { text, visible } => {
                    M17nEngine::update_auxiliary_text(ctxt, text.into(), visible).await?;
                }
                Action::RegisterProperties(props) => {
                    M17nEngine::register_properties(ctxt, IBusPropList(&props).into()).await?;
                }
                Action::UpdateProperty(prop) => {
                    M17nEngine::update_property(ctxt, (&prop).into()).await?;
                }
            }
        }
        Ok(())
    }

    /// Emit pending signals; a failure is logged and reported as `false`.
    async fn emit_or_log(&mut self, ctxt: &SignalContext<'_>) -> bool {
        match self.emit(ctxt).await {
            Ok(()) => true,
            Err(err) => {
                error!("engine {}: failed to emit signals: {}", self.session.id(), err);
                false
            }
        }
    }
}

#[interface(name = "org.freedesktop.IBus.Engine")]
impl M17nEngine {
    async fn process_key_event(
        &mut self,
        #[zbus(signal_context)] ctxt: SignalContext<'_>,
        keyval: u32,
        keycode: u32,
        state: u32,
    ) -> bool {
        debug!(
            "ProcessKeyEvent: keyval={:#x}, keycode={}, state={:#x}",
            keyval, keycode, state
        );
        let handled = self.session.process_key_event(keyval, keycode, state);
        self.emit_or_log(&ctxt).await && handled
    }

    async fn focus_in(&mut self, #[zbus(signal_context)] ctxt: SignalContext<'_>) {
        debug!("FocusIn");
        self.session.focus_in();
        self.emit_or_log(&ctxt).await;
    }

    async fn focus_out(&mut self, #[zbus(signal_context)] ctxt: SignalContext<'_>) {
        debug!("FocusOut");
        self.session.focus_out();
        self.emit_or_log(&ctxt).await;
    }

    async fn set_cursor_location(
        &mut self,
        #[zbus(signal_context)] ctxt: SignalContext<'_>,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    ) {
        self.session.set_cursor_location(x, y, w, h);
        self.emit_or_log(&ctxt).await;
    }

    fn set_capabilities(&mut self, caps: u32) {
        debug!("SetCapabilities: {:#x}", caps);
    }

    async fn reset(&mut self, #[zbus(signal_context)] ctxt: SignalContext<'_>) {
        debug!("Reset");
        self.session.reset();
        self.emit_or_log(&ctxt).await;
    }

    async fn enable(&mut self, #[zbus(signal_context)] ctxt: SignalContext<'_>) {
        debug!("Enable");
        self.session.set_enabled(true);
        self.emit_or_log(&ctxt).await;
    }

    async fn disable(&mut self, #[zbus(signal_context)] ctxt: SignalContext<'_>) {
        debug!("Disable");
        self.session.set_enabled(false);
        self.emit_or_log(&ctxt).await;
    }

    async fn page_up(&mut self, #[zbus(signal_context)] ctxt: SignalContext<'_>) {
        self.session.page_up();
        self.emit_or_log(&ctxt).await;
    }

    async fn page_down(&mut self, #[zbus(signal_context)] ctxt: SignalContext<'_>) {
        self.session.page_down();
        self.emit_or_log(&ctxt).await;
    }

    async fn cursor_up(&mut self, #[zbus(signal_context)] ctxt: SignalContext<'_>) {
        self.session.cursor_up();
        self.emit_or_log(&ctxt).await;
    }

    async fn cursor_down(&mut self, #[zbus(signal_context)] ctxt: SignalContext<'_>) {
        self.session.cursor_down();
        self.emit_or_log(&ctxt).await;
    }

    async fn property_activate(
        &mut self,
        #[zbus(signal_context)] ctxt: SignalContext<'_>,
        prop_name: &str,
        prop_state: u32,
    ) {
        debug!("PropertyActivate: {} {}", prop_name, prop_state);
        self.session.property_activate(prop_name, prop_state);
        self.emit_or_log(&ctxt).await;
    }

    async fn destroy(&mut self, #[zbus(object_server)] server: &ObjectServer) -> fdo::Result<()> {
        info!("Destroy: engine {}", self.session.id());
        self.session.destroy();
        server.remove::<M17nEngine, _>(&self.path).await?;
        self.sessions.close();
        Ok(())
    }

    #[zbus(signal)]
    async fn commit_text(ctxt: &SignalContext<'_>, text: Value<'_>) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn update_preedit_text(
        ctxt: &SignalContext<'_>,
        text: Value<'_>,
        cursor_pos: u32,
        visible: bool,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn update_lookup_table(
        ctxt: &SignalContext<'_>,
        table: Value<'_>,
        visible: bool,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn update_auxiliary_text(
        ctxt: &SignalContext<'_>,
        text: Value<'_>,
        visible: bool,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn register_properties(ctxt: &SignalContext<'_>, props: Value<'_>) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn update_property(ctxt: &SignalContext<'_>, prop: Value<'_>) -> zbus::Result<()>;
}
