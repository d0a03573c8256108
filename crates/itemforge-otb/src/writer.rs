use crate::attr::{item_attr, root_attr, ROOT_NODE_TYPE, SIGNATURE};
use crate::error::OtbResult;
use bytes::Bytes;
use itemforge_tree::TreeWriter;
use itemforge_types::{ProgressSink, ServerItem, ServerItemList, ServerItemType};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Serializes a [`ServerItemList`] back to the tree format.
///
/// Attributes are emitted in a fixed canonical order and values equal to
/// the item type's defaults are omitted, so a file this writer produced
/// re-emits byte-identically after a clean read. Saving is atomic: bytes
/// go to a sibling temp file which is fsynced and renamed over the target;
/// any failure leaves the original untouched.
#[derive(Debug, Default)]
pub struct OtbWriter;

impl OtbWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, path: &Path, list: &ServerItemList) -> OtbResult<()> {
        self.write_with_progress(path, list, &mut ProgressSink::disabled())
    }

    pub fn write_with_progress(
        &self,
        path: &Path,
        list: &ServerItemList,
        progress: &mut ProgressSink<'_>,
    ) -> OtbResult<()> {
        let bytes = self.serialize_with_progress(list, progress)?;
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut temp = match parent {
            Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
            None => tempfile::NamedTempFile::new_in(".")?,
        };
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        debug!(bytes = bytes.len(), path = %path.display(), "otb written");
        Ok(())
    }

    pub fn serialize(&self, list: &ServerItemList) -> OtbResult<Bytes> {
        self.serialize_with_progress(list, &mut ProgressSink::disabled())
    }

    pub fn serialize_with_progress(
        &self,
        list: &ServerItemList,
        progress: &mut ProgressSink<'_>,
    ) -> OtbResult<Bytes> {
        progress.set_total(list.len() as u64);
        progress.report(0, "Writing header")?;

        let mut tree = TreeWriter::new();
        tree.write_raw_u32(SIGNATURE);
        tree.begin_node(ROOT_NODE_TYPE);
        // Reserved root flags.
        tree.write_u32(0);
        tree.write_prop(root_attr::VERSION, &version_payload(list));

        for (index, item) in list.iter().enumerate() {
            progress.report(index as u64, "Writing items")?;
            self.write_item_node(&mut tree, item);
        }

        tree.end_node()?;
        let bytes = tree.finish()?;
        progress.report(list.len() as u64, "Write complete")?;
        Ok(bytes)
    }

    fn write_item_node(&self, tree: &mut TreeWriter, item: &ServerItem) {
        tree.begin_node(item.item_type.id());
        // The named booleans are authoritative; the stored word is only a
        // cache of a previous load.
        tree.write_u32(item.flags_from_properties());

        tree.write_prop(item_attr::SERVER_ID, &item.server_id.to_le_bytes());
        if item.item_type != ServerItemType::Deprecated {
            tree.write_prop(item_attr::CLIENT_ID, &item.client_id.to_le_bytes());
        }
        if !item.name.is_empty() {
            tree.write_prop(item_attr::NAME, item.name.as_bytes());
        }
        if item.item_type == ServerItemType::Ground {
            tree.write_prop(item_attr::GROUND_SPEED, &item.ground_speed.to_le_bytes());
        }
        if item.item_type != ServerItemType::Deprecated {
            tree.write_prop(item_attr::SPRITE_HASH, &item.sprite_hash);
        }
        if item.minimap_color != 0 {
            tree.write_prop(item_attr::MINIMAP_COLOR, &item.minimap_color.to_le_bytes());
        }
        if item.max_read_write_chars != 0 {
            tree.write_prop(
                item_attr::MAX_READ_WRITE_CHARS,
                &item.max_read_write_chars.to_le_bytes(),
            );
        }
        if item.max_read_chars != 0 {
            tree.write_prop(item_attr::MAX_READ_CHARS, &item.max_read_chars.to_le_bytes());
        }
        if item.light_level != 0 || item.light_color != 0 {
            let mut light = [0u8; 4];
            light[0..2].copy_from_slice(&item.light_level.to_le_bytes());
            light[2..4].copy_from_slice(&item.light_color.to_le_bytes());
            tree.write_prop(item_attr::LIGHT, &light);
        }
        if item.has_stack_order {
            tree.write_prop(item_attr::STACK_ORDER, &[item.stack_order.id()]);
        }
        if item.trade_as != 0 {
            tree.write_prop(item_attr::TRADE_AS, &item.trade_as.to_le_bytes());
        }

        tree.end_node().expect("item node balanced");
    }
}

fn version_payload(list: &ServerItemList) -> Vec<u8> {
    let mut payload = Vec::with_capacity(root_attr::VERSION_LEN as usize);
    payload.extend_from_slice(&list.version.major.to_le_bytes());
    payload.extend_from_slice(&list.version.minor.to_le_bytes());
    payload.extend_from_slice(&list.version.build.to_le_bytes());
    let mut desc = [0u8; root_attr::DESCRIPTION_LEN];
    let bytes = list.description.as_bytes();
    let take = bytes.len().min(root_attr::DESCRIPTION_LEN);
    desc[..take].copy_from_slice(&bytes[..take]);
    payload.extend_from_slice(&desc);
    payload
}
