/// File prologue. Historically unused, always zero.
pub const SIGNATURE: u32 = 0x0000_0000;

/// The root node carries this type byte.
pub const ROOT_NODE_TYPE: u8 = 0;

/// Attributes valid only under the root node.
pub mod root_attr {
    /// `major:u32, minor:u32, build:u32, description:char[128]`.
    pub const VERSION: u8 = 0x01;

    pub const VERSION_LEN: u16 = 140;
    pub const DESCRIPTION_LEN: usize = 128;
}

/// Attributes valid inside item nodes.
pub mod item_attr {
    pub const SERVER_ID: u8 = 0x10;
    pub const CLIENT_ID: u8 = 0x11;
    pub const NAME: u8 = 0x12;
    pub const GROUND_SPEED: u8 = 0x14;
    pub const SPRITE_HASH: u8 = 0x20;
    pub const MINIMAP_COLOR: u8 = 0x22;
    pub const MAX_READ_WRITE_CHARS: u8 = 0x23;
    pub const MAX_READ_CHARS: u8 = 0x24;
    pub const LIGHT: u8 = 0x2A;
    pub const STACK_ORDER: u8 = 0x2B;
    pub const TRADE_AS: u8 = 0x2D;

    pub const NAME_MAX_LEN: u16 = 1024;

    /// Declared payload length for fixed-width attributes; `None` for
    /// variable-length ones.
    pub fn expected_len(attribute: u8) -> Option<u16> {
        match attribute {
            SERVER_ID | CLIENT_ID | GROUND_SPEED | MINIMAP_COLOR | MAX_READ_WRITE_CHARS
            | MAX_READ_CHARS | TRADE_AS => Some(2),
            LIGHT => Some(4),
            STACK_ORDER => Some(1),
            SPRITE_HASH => Some(16),
            _ => None,
        }
    }

    pub fn is_known(attribute: u8) -> bool {
        matches!(
            attribute,
            SERVER_ID
                | CLIENT_ID
                | NAME
                | GROUND_SPEED
                | SPRITE_HASH
                | MINIMAP_COLOR
                | MAX_READ_WRITE_CHARS
                | MAX_READ_CHARS
                | LIGHT
                | STACK_ORDER
                | TRADE_AS
        )
    }
}
