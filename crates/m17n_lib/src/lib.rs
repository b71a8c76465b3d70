//! Input-method plumbing behind the IBus m17n engine.
//!
//! [`method`] is the library boundary, [`table`] a table-driven library,
//! [`session`] the per-engine state machine and [`registry`] the factory
//! bookkeeping. Nothing in this crate touches the bus.
pub mod config;
pub mod keysym;
pub mod method;
pub mod registry;
pub mod session;
pub mod table;

pub use config::{Config, ConfigError};
pub use method::{InputContext, InputMethod, MethodError, MethodInfo, MethodLibrary};
pub use registry::{FactoryInfo, FactoryRegistry, SessionCounter};
pub use session::{Action, Phase, Session, SessionStyle};
pub use table::TableLibrary;
