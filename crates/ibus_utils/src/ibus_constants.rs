//! Numeric constants of the IBus protocol.

// Modifier masks (IBusModifierType).
pub const SHIFT_MASK: u32 = 1 << 0;
pub const LOCK_MASK: u32 = 1 << 1;
pub const CONTROL_MASK: u32 = 1 << 2;
pub const MOD1_MASK: u32 = 1 << 3;
pub const MOD5_MASK: u32 = 1 << 7;
pub const SUPER_MASK: u32 = 1 << 26;
pub const HYPER_MASK: u32 = 1 << 27;
pub const META_MASK: u32 = 1 << 28;
pub const RELEASE_MASK: u32 = 1 << 30;

/// Alt is reported as Mod1.
pub const ALT_MASK: u32 = MOD1_MASK;

// IBusAttrType
pub const ATTR_TYPE_UNDERLINE: u32 = 1;
pub const ATTR_TYPE_FOREGROUND: u32 = 2;
pub const ATTR_TYPE_BACKGROUND: u32 = 3;

// IBusAttrUnderline
pub const ATTR_UNDERLINE_NONE: u32 = 0;
pub const ATTR_UNDERLINE_SINGLE: u32 = 1;
pub const ATTR_UNDERLINE_DOUBLE: u32 = 2;
pub const ATTR_UNDERLINE_LOW: u32 = 3;
pub const ATTR_UNDERLINE_ERROR: u32 = 4;

// IBusPropType
pub const PROP_TYPE_NORMAL: u32 = 0;

// IBusPropState
pub const PROP_STATE_UNCHECKED: u32 = 0;
