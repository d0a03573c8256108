use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Item-flag bits as stored in the 32-bit flag word of an item node.
///
/// The named booleans on [`ServerItem`] are the source of truth when
/// writing; the flag word is derived from them. Bits not listed here are
/// unknown and must stay zero.
pub mod flag {
    pub const UNPASSABLE: u32 = 1 << 0;
    pub const BLOCK_MISSILES: u32 = 1 << 1;
    pub const BLOCK_PATHFINDER: u32 = 1 << 2;
    pub const HAS_ELEVATION: u32 = 1 << 3;
    pub const FORCE_USE: u32 = 1 << 4;
    pub const MULTI_USE: u32 = 1 << 5;
    pub const PICKUPABLE: u32 = 1 << 6;
    pub const MOVABLE: u32 = 1 << 7;
    pub const STACKABLE: u32 = 1 << 8;
    pub const HAS_STACK_ORDER: u32 = 1 << 13;
    pub const READABLE: u32 = 1 << 14;
    pub const ROTATABLE: u32 = 1 << 15;
    pub const HANGABLE: u32 = 1 << 16;
    pub const HOOK_SOUTH: u32 = 1 << 17;
    pub const HOOK_EAST: u32 = 1 << 18;
    pub const ALLOW_DISTANCE_READ: u32 = 1 << 20;
    pub const IGNORE_LOOK: u32 = 1 << 23;
    pub const FULL_GROUND: u32 = 1 << 24;
    pub const IS_ANIMATION: u32 = 1 << 25;

    /// Every bit the format assigns a meaning to.
    pub const KNOWN: u32 = UNPASSABLE
        | BLOCK_MISSILES
        | BLOCK_PATHFINDER
        | HAS_ELEVATION
        | FORCE_USE
        | MULTI_USE
        | PICKUPABLE
        | MOVABLE
        | STACKABLE
        | HAS_STACK_ORDER
        | READABLE
        | ROTATABLE
        | HANGABLE
        | HOOK_SOUTH
        | HOOK_EAST
        | ALLOW_DISTANCE_READ
        | IGNORE_LOOK
        | FULL_GROUND
        | IS_ANIMATION;
}

/// Server item classification. The value doubles as the node type byte of
/// the item's tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServerItemType {
    None = 0,
    Ground = 1,
    Container = 2,
    Splash = 3,
    Fluid = 4,
    Deprecated = 5,
}

impl ServerItemType {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ServerItemType::None),
            1 => Some(ServerItemType::Ground),
            2 => Some(ServerItemType::Container),
            3 => Some(ServerItemType::Splash),
            4 => Some(ServerItemType::Fluid),
            5 => Some(ServerItemType::Deprecated),
            _ => None,
        }
    }
}

/// Render stacking position for items sharing a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StackOrder {
    None = 0,
    Border = 1,
    Bottom = 2,
    Top = 3,
}

impl StackOrder {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StackOrder::None),
            1 => Some(StackOrder::Border),
            2 => Some(StackOrder::Bottom),
            3 => Some(StackOrder::Top),
            _ => None,
        }
    }
}

/// Database version header carried by the root node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub client_version: u32,
}

/// Declared id range of a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRange {
    pub min_id: u16,
    pub max_id: u16,
}

impl ItemRange {
    pub fn contains(&self, id: u16) -> bool {
        id >= self.min_id && id <= self.max_id
    }

    pub fn count(&self) -> u32 {
        if self.max_id >= self.min_id {
            u32::from(self.max_id - self.min_id) + 1
        } else {
            0
        }
    }
}

/// A single server-side item record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerItem {
    pub server_id: u16,
    pub client_id: u16,
    pub previous_client_id: u16,
    pub item_type: ServerItemType,
    pub has_stack_order: bool,
    pub stack_order: StackOrder,

    pub unpassable: bool,
    pub block_missiles: bool,
    pub block_pathfinder: bool,
    pub has_elevation: bool,
    pub force_use: bool,
    pub multi_use: bool,
    pub pickupable: bool,
    pub movable: bool,
    pub stackable: bool,
    pub readable: bool,
    pub rotatable: bool,
    pub hangable: bool,
    pub hook_south: bool,
    pub hook_east: bool,
    pub allow_distance_read: bool,
    pub ignore_look: bool,
    pub full_ground: bool,
    pub is_animation: bool,

    /// Raw flag word as read from or written to the file. Kept in sync
    /// with the booleans above; the booleans win on write.
    pub flags: u32,

    pub ground_speed: u16,
    pub light_level: u16,
    pub light_color: u16,
    pub max_read_chars: u16,
    pub max_read_write_chars: u16,
    pub minimap_color: u16,
    pub trade_as: u16,

    pub sprite_hash: [u8; 16],

    pub name: String,
    pub description: String,
    pub article: String,
    pub plural: String,

    pub last_modified: Option<DateTime<Utc>>,
    pub modified_by: String,
    pub is_custom_created: bool,
    pub has_client_data: bool,
}

impl Default for ServerItem {
    fn default() -> Self {
        Self {
            server_id: 0,
            client_id: 0,
            previous_client_id: 0,
            item_type: ServerItemType::None,
            has_stack_order: false,
            stack_order: StackOrder::None,
            unpassable: false,
            block_missiles: false,
            block_pathfinder: false,
            has_elevation: false,
            force_use: false,
            multi_use: false,
            pickupable: false,
            // Items move unless the database says otherwise.
            movable: true,
            stackable: false,
            readable: false,
            rotatable: false,
            hangable: false,
            hook_south: false,
            hook_east: false,
            allow_distance_read: false,
            ignore_look: false,
            full_ground: false,
            is_animation: false,
            flags: flag::MOVABLE,
            ground_speed: 0,
            light_level: 0,
            light_color: 0,
            max_read_chars: 0,
            max_read_write_chars: 0,
            minimap_color: 0,
            trade_as: 0,
            sprite_hash: [0; 16],
            name: String::new(),
            description: String::new(),
            article: String::new(),
            plural: String::new(),
            last_modified: None,
            modified_by: String::new(),
            is_custom_created: false,
            has_client_data: false,
        }
    }
}

impl ServerItem {
    pub fn new(server_id: u16, item_type: ServerItemType) -> Self {
        Self {
            server_id,
            item_type,
            ..Self::default()
        }
    }

    /// Projects the raw flag word onto the named booleans.
    pub fn update_properties_from_flags(&mut self) {
        self.unpassable = self.flags & flag::UNPASSABLE != 0;
        self.block_missiles = self.flags & flag::BLOCK_MISSILES != 0;
        self.block_pathfinder = self.flags & flag::BLOCK_PATHFINDER != 0;
        self.has_elevation = self.flags & flag::HAS_ELEVATION != 0;
        self.force_use = self.flags & flag::FORCE_USE != 0;
        self.multi_use = self.flags & flag::MULTI_USE != 0;
        self.pickupable = self.flags & flag::PICKUPABLE != 0;
        self.movable = self.flags & flag::MOVABLE != 0;
        self.stackable = self.flags & flag::STACKABLE != 0;
        self.has_stack_order = self.flags & flag::HAS_STACK_ORDER != 0;
        self.readable = self.flags & flag::READABLE != 0;
        self.rotatable = self.flags & flag::ROTATABLE != 0;
        self.hangable = self.flags & flag::HANGABLE != 0;
        self.hook_south = self.flags & flag::HOOK_SOUTH != 0;
        self.hook_east = self.flags & flag::HOOK_EAST != 0;
        self.allow_distance_read = self.flags & flag::ALLOW_DISTANCE_READ != 0;
        self.ignore_look = self.flags & flag::IGNORE_LOOK != 0;
        self.full_ground = self.flags & flag::FULL_GROUND != 0;
        self.is_animation = self.flags & flag::IS_ANIMATION != 0;
    }

    /// Derives the flag word from the named booleans. This direction is
    /// authoritative when serializing.
    pub fn flags_from_properties(&self) -> u32 {
        let mut flags = 0;
        if self.unpassable {
            flags |= flag::UNPASSABLE;
        }
        if self.block_missiles {
            flags |= flag::BLOCK_MISSILES;
        }
        if self.block_pathfinder {
            flags |= flag::BLOCK_PATHFINDER;
        }
        if self.has_elevation {
            flags |= flag::HAS_ELEVATION;
        }
        if self.force_use {
            flags |= flag::FORCE_USE;
        }
        if self.multi_use {
            flags |= flag::MULTI_USE;
        }
        if self.pickupable {
            flags |= flag::PICKUPABLE;
        }
        if self.movable {
            flags |= flag::MOVABLE;
        }
        if self.stackable {
            flags |= flag::STACKABLE;
        }
        if self.has_stack_order {
            flags |= flag::HAS_STACK_ORDER;
        }
        if self.readable {
            flags |= flag::READABLE;
        }
        if self.rotatable {
            flags |= flag::ROTATABLE;
        }
        if self.hangable {
            flags |= flag::HANGABLE;
        }
        if self.hook_south {
            flags |= flag::HOOK_SOUTH;
        }
        if self.hook_east {
            flags |= flag::HOOK_EAST;
        }
        if self.allow_distance_read {
            flags |= flag::ALLOW_DISTANCE_READ;
        }
        if self.ignore_look {
            flags |= flag::IGNORE_LOOK;
        }
        if self.full_ground {
            flags |= flag::FULL_GROUND;
        }
        if self.is_animation {
            flags |= flag::IS_ANIMATION;
        }
        flags
    }

    /// Refreshes the stored flag word from the booleans.
    pub fn sync_flags(&mut self) {
        self.flags = self.flags_from_properties();
    }

    /// Compares the gameplay-relevant fields, ignoring audit metadata.
    pub fn equals_core(&self, other: &ServerItem) -> bool {
        self.server_id == other.server_id
            && self.client_id == other.client_id
            && self.item_type == other.item_type
            && self.has_stack_order == other.has_stack_order
            && self.stack_order == other.stack_order
            && self.flags_from_properties() == other.flags_from_properties()
            && self.ground_speed == other.ground_speed
            && self.light_level == other.light_level
            && self.light_color == other.light_color
            && self.max_read_chars == other.max_read_chars
            && self.max_read_write_chars == other.max_read_write_chars
            && self.minimap_color == other.minimap_color
            && self.trade_as == other.trade_as
            && self.sprite_hash == other.sprite_hash
            && self.name == other.name
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListError {
    #[error("duplicate server id {0}")]
    DuplicateServerId(u16),
}

/// An ordered collection of server items with O(1) lookup by server id.
///
/// Insertion order is file order; readers must not re-sort.
#[derive(Debug, Clone, Default)]
pub struct ServerItemList {
    pub version: VersionInfo,
    pub range: ItemRange,
    pub description: String,
    items: Vec<ServerItem>,
    index: HashMap<u16, usize>,
    dirty: bool,
}

impl ServerItemList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ServerItem] {
        &self.items
    }

    pub fn get(&self, server_id: u16) -> Option<&ServerItem> {
        self.index.get(&server_id).map(|&i| &self.items[i])
    }

    pub fn contains(&self, server_id: u16) -> bool {
        self.index.contains_key(&server_id)
    }

    /// Appends an item, keeping the id index and declared range current.
    /// The item's flag word is re-derived from its booleans so the two
    /// representations can never drift inside a list.
    pub fn add(&mut self, mut item: ServerItem) -> Result<(), ListError> {
        if self.index.contains_key(&item.server_id) {
            return Err(ListError::DuplicateServerId(item.server_id));
        }
        item.sync_flags();
        if self.items.is_empty() {
            self.range = ItemRange {
                min_id: item.server_id,
                max_id: item.server_id,
            };
        } else {
            self.range.min_id = self.range.min_id.min(item.server_id);
            self.range.max_id = self.range.max_id.max(item.server_id);
        }
        self.index.insert(item.server_id, self.items.len());
        self.items.push(item);
        self.dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, server_id: u16) -> Option<ServerItem> {
        let pos = self.index.remove(&server_id)?;
        let item = self.items.remove(pos);
        for (_, idx) in self.index.iter_mut() {
            if *idx > pos {
                *idx -= 1;
            }
        }
        self.recompute_range();
        self.dirty = true;
        Some(item)
    }

    /// Replaces an existing item in place, preserving order.
    pub fn update(&mut self, mut item: ServerItem) -> Option<ServerItem> {
        let pos = *self.index.get(&item.server_id)?;
        item.sync_flags();
        let old = std::mem::replace(&mut self.items[pos], item);
        self.dirty = true;
        Some(old)
    }

    pub fn recompute_range(&mut self) {
        if self.items.is_empty() {
            self.range = ItemRange::default();
            return;
        }
        let mut min = u16::MAX;
        let mut max = 0;
        for item in &self.items {
            min = min.min(item.server_id);
            max = max.max(item.server_id);
        }
        self.range = ItemRange {
            min_id: min,
            max_id: max,
        };
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServerItem> {
        self.items.iter()
    }
}

impl PartialEq for ServerItemList {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.range == other.range
            && self.description == other.description
            && self.items == other.items
    }
}
