mod address;
mod component;
pub mod ibus_constants;
mod lookup_table;
mod property;
mod text;

pub use address::{get_ibus_address, AddressError};
pub use component::{engines_xml, IBusComponent, IBusEngineDesc};
pub use lookup_table::{IBusLookupTable, TableOrientation};
pub use property::{IBusPropList, IBusProperty};
pub use text::{Attribute, IBusAttrList, IBusAttribute, IBusText, Underline};
