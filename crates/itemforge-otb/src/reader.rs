use crate::attr::{item_attr, root_attr, ROOT_NODE_TYPE, SIGNATURE};
use crate::error::{OtbError, OtbResult};
use bytes::Bytes;
use itemforge_tree::TreeReader;
use itemforge_types::{
    ProgressSink, ServerItem, ServerItemList, ServerItemType, StackOrder, VersionInfo,
};
use std::path::Path;
use tracing::{debug, warn};

/// Controls how much corruption a read tolerates.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Abort on the first malformed item or attribute. Lenient mode logs,
    /// discards the offending item and continues with the next sibling.
    pub strict: bool,
    /// Lenient-mode ceiling; exceeding it aborts the read.
    pub max_corrupt_items: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            strict: true,
            max_corrupt_items: 100,
        }
    }
}

/// Counters accumulated over one read.
#[derive(Debug, Clone, Default)]
pub struct ReadStats {
    pub bytes_read: u64,
    pub items_read: u64,
    pub items_skipped: u64,
    pub attributes_read: u64,
    pub duplicate_ids: Vec<u16>,
    pub warnings: Vec<String>,
}

impl ReadStats {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// Quick probe: the file begins with the OTB signature followed by a root
/// node marker.
pub fn is_valid_otb(path: &Path) -> bool {
    let Ok(data) = std::fs::read(path) else {
        return false;
    };
    data.len() >= 5
        && u32::from_le_bytes([data[0], data[1], data[2], data[3]]) == SIGNATURE
        && data[4] == itemforge_tree::NODE_START
}

/// Parses an OTB file into a [`ServerItemList`].
pub struct OtbReader {
    options: ReadOptions,
    stats: ReadStats,
}

impl Default for OtbReader {
    fn default() -> Self {
        Self::new(ReadOptions::default())
    }
}

impl OtbReader {
    pub fn new(options: ReadOptions) -> Self {
        Self {
            options,
            stats: ReadStats::default(),
        }
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    pub fn read(&mut self, path: &Path) -> OtbResult<ServerItemList> {
        self.read_with_progress(path, &mut ProgressSink::disabled())
    }

    pub fn read_with_progress(
        &mut self,
        path: &Path,
        progress: &mut ProgressSink<'_>,
    ) -> OtbResult<ServerItemList> {
        if !path.exists() {
            return Err(OtbError::FileNotFound(path.display().to_string()));
        }
        let data = std::fs::read(path)?;
        self.read_from_bytes(data, progress)
    }

    pub fn read_from_bytes(
        &mut self,
        data: Vec<u8>,
        progress: &mut ProgressSink<'_>,
    ) -> OtbResult<ServerItemList> {
        self.stats.reset();
        self.stats.bytes_read = data.len() as u64;
        let mut tree = TreeReader::from_bytes(data);
        progress.set_total(tree.file_len() as u64);
        progress.report(0, "Reading header")?;

        let signature = tree.read_raw_u32()?;
        if signature != SIGNATURE {
            return Err(OtbError::InvalidSignature(signature));
        }

        tree.enter_node()?;
        if tree.current_node_type() != Some(ROOT_NODE_TYPE) {
            return Err(OtbError::InvalidHeader(format!(
                "root node type must be 0, got {:?}",
                tree.current_node_type()
            )));
        }

        let mut list = ServerItemList::new();
        self.parse_root_payload(&mut tree, &mut list)?;
        tree.leave_node()?;

        let mut corrupt = 0usize;
        while tree.has_next_node() {
            progress.report(tree.position() as u64, "Reading items")?;
            tree.enter_node()?;
            match self.parse_item_node(&mut tree) {
                Ok(item) => {
                    let id = item.server_id;
                    if let Err(e) = list.add(item) {
                        if self.options.strict {
                            return Err(OtbError::DuplicateServerId(id));
                        }
                        corrupt += 1;
                        self.stats.items_skipped += 1;
                        self.stats.duplicate_ids.push(id);
                        self.stats.warn(format!("skipping item: {e}"));
                    } else {
                        self.stats.items_read += 1;
                    }
                }
                Err(e) => {
                    if self.options.strict {
                        return Err(e);
                    }
                    corrupt += 1;
                    self.stats.items_skipped += 1;
                    self.stats.warn(format!("skipping corrupt item node: {e}"));
                    if corrupt > self.options.max_corrupt_items {
                        return Err(OtbError::TooManyCorruptItems(corrupt));
                    }
                }
            }
            tree.leave_node()?;
        }

        progress.report(tree.file_len() as u64, "Read complete")?;
        debug!(
            items = self.stats.items_read,
            skipped = self.stats.items_skipped,
            attributes = self.stats.attributes_read,
            "otb read finished"
        );
        list.clear_dirty();
        Ok(list)
    }

    /// Reads only the root node and returns the version header.
    pub fn detect_version(path: &Path) -> OtbResult<(VersionInfo, String)> {
        if !path.exists() {
            return Err(OtbError::FileNotFound(path.display().to_string()));
        }
        let mut tree = TreeReader::open(path)?;
        let signature = tree.read_raw_u32()?;
        if signature != SIGNATURE {
            return Err(OtbError::InvalidSignature(signature));
        }
        tree.enter_node()?;
        if tree.current_node_type() != Some(ROOT_NODE_TYPE) {
            return Err(OtbError::InvalidHeader("root node type must be 0".into()));
        }
        let mut reader = OtbReader::default();
        let mut list = ServerItemList::new();
        reader.parse_root_payload(&mut tree, &mut list)?;
        Ok((list.version, list.description))
    }

    fn parse_root_payload(
        &mut self,
        tree: &mut TreeReader,
        list: &mut ServerItemList,
    ) -> OtbResult<()> {
        // Four reserved flag bytes precede the root attributes.
        let _root_flags = tree.read_u32()?;

        while !tree.at_payload_end() {
            let attribute = tree.read_u8()?;
            let len = tree.read_u16()?;
            let data = tree.read_bytes(len as usize)?;
            self.stats.attributes_read += 1;

            if attribute == root_attr::VERSION {
                if len != root_attr::VERSION_LEN {
                    return Err(OtbError::AttributeValidationFailed {
                        attribute,
                        expected: root_attr::VERSION_LEN,
                        actual: len,
                        context: "root".into(),
                    });
                }
                let major = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                let minor = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
                let build = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
                if major > 3 {
                    return Err(OtbError::InvalidVersion { major });
                }
                list.version = VersionInfo {
                    major,
                    minor,
                    build,
                    // The 140-byte layout carries no separate client
                    // version; it mirrors the minor number.
                    client_version: minor,
                };
                let desc = &data[12..12 + root_attr::DESCRIPTION_LEN];
                let end = desc.iter().position(|&b| b == 0).unwrap_or(desc.len());
                list.description = String::from_utf8_lossy(&desc[..end]).into_owned();
            } else {
                self.stats.warn(format!(
                    "unknown root attribute 0x{attribute:02X} ({len} bytes), skipping"
                ));
            }
        }
        Ok(())
    }

    fn parse_item_node(&mut self, tree: &mut TreeReader) -> OtbResult<ServerItem> {
        let type_byte = tree
            .current_node_type()
            .ok_or_else(|| OtbError::InvalidItemData("no open node".into()))?;
        let item_type = ServerItemType::from_u8(type_byte)
            .ok_or_else(|| OtbError::InvalidItemData(format!("invalid item type {type_byte}")))?;

        let mut item = ServerItem {
            item_type,
            ..ServerItem::default()
        };
        item.flags = tree.read_u32()?;

        while !tree.at_payload_end() {
            let attribute = tree.read_u8()?;
            let len = tree.read_u16()?;
            self.stats.attributes_read += 1;

            if !item_attr::is_known(attribute) {
                self.stats.warn(format!(
                    "unknown item attribute 0x{attribute:02X} ({len} bytes) on item {}, skipping",
                    item.server_id
                ));
                tree.read_bytes(len as usize)?;
                continue;
            }
            if let Some(expected) = item_attr::expected_len(attribute) {
                if len != expected {
                    let err = OtbError::AttributeValidationFailed {
                        attribute,
                        expected,
                        actual: len,
                        context: format!("server id {}", item.server_id),
                    };
                    if self.options.strict {
                        return Err(err);
                    }
                    self.stats.warn(err.to_string());
                    tree.read_bytes(len as usize)?;
                    continue;
                }
            }
            let data = tree.read_bytes(len as usize)?;
            self.apply_item_attribute(&mut item, attribute, len, data)?;
        }

        item.update_properties_from_flags();
        Ok(item)
    }

    fn apply_item_attribute(
        &mut self,
        item: &mut ServerItem,
        attribute: u8,
        len: u16,
        data: Bytes,
    ) -> OtbResult<()> {
        match attribute {
            item_attr::SERVER_ID => item.server_id = le_u16(&data),
            item_attr::CLIENT_ID => item.client_id = le_u16(&data),
            item_attr::NAME => {
                if len > item_attr::NAME_MAX_LEN {
                    let err = OtbError::AttributeValidationFailed {
                        attribute,
                        expected: item_attr::NAME_MAX_LEN,
                        actual: len,
                        context: format!("server id {}", item.server_id),
                    };
                    if self.options.strict {
                        return Err(err);
                    }
                    self.stats.warn(err.to_string());
                    return Ok(());
                }
                if data.contains(&0) {
                    self.stats.warn(format!(
                        "item {} name contains NUL bytes",
                        item.server_id
                    ));
                }
                item.name = String::from_utf8_lossy(&data).into_owned();
            }
            item_attr::GROUND_SPEED => item.ground_speed = le_u16(&data),
            item_attr::SPRITE_HASH => {
                let mut hash = [0u8; 16];
                hash.copy_from_slice(&data);
                item.sprite_hash = hash;
            }
            item_attr::MINIMAP_COLOR => item.minimap_color = le_u16(&data),
            item_attr::MAX_READ_WRITE_CHARS => item.max_read_write_chars = le_u16(&data),
            item_attr::MAX_READ_CHARS => item.max_read_chars = le_u16(&data),
            item_attr::LIGHT => {
                item.light_level = le_u16(&data[0..2]);
                item.light_color = le_u16(&data[2..4]);
            }
            item_attr::STACK_ORDER => {
                let value = data[0];
                match StackOrder::from_u8(value) {
                    Some(order) => {
                        item.stack_order = order;
                        item.has_stack_order = true;
                    }
                    None => {
                        let err = OtbError::InvalidItemData(format!(
                            "item {} has invalid stack order {value}",
                            item.server_id
                        ));
                        if self.options.strict {
                            return Err(err);
                        }
                        self.stats.warn(err.to_string());
                    }
                }
            }
            item_attr::TRADE_AS => item.trade_as = le_u16(&data),
            // Codes outside the table were skipped before dispatch.
            _ => {}
        }
        Ok(())
    }
}

fn le_u16(data: &[u8]) -> u16 {
    u16::from_le_bytes([data[0], data[1]])
}
