use crate::error::{ClientError, ClientResult};
use crate::version::{dat_version, SpriteIdWidth, Version};
use bytes::{Buf, Bytes};
use itemforge_types::ClientItem;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Client-flag bits accumulated from the DAT flag stream. The layout is
/// internal; the byte values on the wire differ per band.
pub mod client_flag {
    pub const GROUND: u32 = 1 << 0;
    pub const GROUND_BORDER: u32 = 1 << 1;
    pub const ON_BOTTOM: u32 = 1 << 2;
    pub const ON_TOP: u32 = 1 << 3;
    pub const CONTAINER: u32 = 1 << 4;
    pub const STACKABLE: u32 = 1 << 5;
    pub const FORCE_USE: u32 = 1 << 6;
    pub const MULTI_USE: u32 = 1 << 7;
    pub const HAS_CHARGES: u32 = 1 << 8;
    pub const WRITABLE: u32 = 1 << 9;
    pub const WRITABLE_ONCE: u32 = 1 << 10;
    pub const FLUID_CONTAINER: u32 = 1 << 11;
    pub const FLUID: u32 = 1 << 12;
    pub const UNPASSABLE: u32 = 1 << 13;
    pub const UNMOVABLE: u32 = 1 << 14;
    pub const BLOCK_MISSILES: u32 = 1 << 15;
    pub const BLOCK_PATHFINDER: u32 = 1 << 16;
    pub const PICKUPABLE: u32 = 1 << 17;
    pub const HANGABLE: u32 = 1 << 18;
    pub const HORIZONTAL: u32 = 1 << 19;
    pub const VERTICAL: u32 = 1 << 20;
    pub const ROTATABLE: u32 = 1 << 21;
    pub const HAS_LIGHT: u32 = 1 << 22;
    pub const DONT_HIDE: u32 = 1 << 23;
    pub const TRANSLUCENT: u32 = 1 << 24;
    pub const HAS_OFFSET: u32 = 1 << 25;
    pub const HAS_ELEVATION: u32 = 1 << 26;
    pub const LYING: u32 = 1 << 27;
    pub const ANIMATE_ALWAYS: u32 = 1 << 28;
    pub const MINIMAP: u32 = 1 << 29;
    pub const LENS_HELP: u32 = 1 << 30;
    pub const FULL_GROUND: u32 = 1 << 31;
}

/// The flag byte that terminates an item's flag stream.
const LAST_FLAG: u8 = 0xFF;

/// What a flag byte means in the active dialect.
enum FlagKind {
    Simple(u32),
    Ground,
    Writable,
    WritableOnce,
    Light,
    Offset,
    Elevation,
    Minimap,
    LensHelp,
    IgnoreLook,
    Cloth,
    Market,
    /// Recognized byte with no payload. Late pre-10 builds emit flag
    /// bytes past the documented table; they carry nothing and are safe
    /// to step over.
    Extended,
    Last,
    Unknown,
}

/// Per-band flag table. Clients before 10.00 have no charge flag; from
/// 10.00 `HasCharges = 0x08` shifts the writable block up by one. The
/// pre-10 dialect additionally accepts 0x22-0xFE as payload-free
/// extended flags, while the 10.00+ dialect knows nothing past Market
/// and treats such bytes as fatal for the table.
fn classify(version: &Version, flag: u8) -> FlagKind {
    use FlagKind::*;
    if flag == LAST_FLAG {
        return Last;
    }
    let shifted = version.numeric >= 1000;
    match (flag, shifted) {
        (0x00, _) => Ground,
        (0x01, _) => Simple(client_flag::GROUND_BORDER),
        (0x02, _) => Simple(client_flag::ON_BOTTOM),
        (0x03, _) => Simple(client_flag::ON_TOP),
        (0x04, _) => Simple(client_flag::CONTAINER),
        (0x05, _) => Simple(client_flag::STACKABLE),
        (0x06, _) => Simple(client_flag::FORCE_USE),
        (0x07, _) => Simple(client_flag::MULTI_USE),
        (0x08, true) => Simple(client_flag::HAS_CHARGES),
        (0x08, false) => Writable,
        (0x09, true) => Writable,
        (0x09, false) => WritableOnce,
        (0x0A, true) => WritableOnce,
        (0x0A, false) => Simple(client_flag::FLUID_CONTAINER),
        (0x0B, true) => Simple(client_flag::FLUID_CONTAINER),
        (0x0B, false) => Simple(client_flag::FLUID),
        (0x0C, true) => Simple(client_flag::FLUID),
        (0x0C, false) => Simple(client_flag::UNPASSABLE),
        (0x0D, true) => Simple(client_flag::UNPASSABLE),
        (0x0D, false) => Simple(client_flag::UNMOVABLE),
        (0x0E, true) => Simple(client_flag::UNMOVABLE),
        (0x0E, false) => Simple(client_flag::BLOCK_MISSILES),
        (0x0F, true) => Simple(client_flag::BLOCK_MISSILES),
        (0x0F, false) => Simple(client_flag::BLOCK_PATHFINDER),
        (0x10, _) => Simple(client_flag::PICKUPABLE),
        (0x11, _) => Simple(client_flag::HANGABLE),
        (0x12, _) => Simple(client_flag::HORIZONTAL),
        (0x13, _) => Simple(client_flag::VERTICAL),
        (0x14, _) => Simple(client_flag::ROTATABLE),
        (0x15, _) => Light,
        (0x16, _) => Simple(client_flag::DONT_HIDE),
        (0x17, _) => Simple(client_flag::TRANSLUCENT),
        (0x18, _) => Offset,
        (0x19, _) => Elevation,
        (0x1A, _) => Simple(client_flag::LYING),
        (0x1B, _) => Simple(client_flag::ANIMATE_ALWAYS),
        (0x1C, _) => Minimap,
        (0x1D, _) => LensHelp,
        (0x1E, _) => Simple(client_flag::FULL_GROUND),
        (0x1F, _) => IgnoreLook,
        (0x20, _) if version.has_market_flags() => Cloth,
        (0x21, _) if version.has_market_flags() => Market,
        (0x22..=0xFE, false) => Extended,
        _ => Unknown,
    }
}

/// A parsed DAT file: header counts plus the item table.
#[derive(Debug)]
pub struct DatFile {
    pub version: Version,
    pub signature: u32,
    /// Highest item id in the file; items are numbered from 100 up to and
    /// including this value.
    pub item_count: u16,
    pub outfit_count: u16,
    pub effect_count: u16,
    pub missile_count: u16,
    pub items: HashMap<u16, ClientItem>,
    pub warnings: Vec<String>,
}

pub struct DatParser;

impl DatParser {
    pub fn parse_file(path: &Path) -> ClientResult<DatFile> {
        Self::parse(std::fs::read(path)?)
    }

    pub fn parse(data: Vec<u8>) -> ClientResult<DatFile> {
        let mut buf = Bytes::from(data);
        let signature = get_u32(&mut buf, "dat signature")?;
        let version =
            dat_version(signature).ok_or(ClientError::UnknownSignature(signature))?;
        debug!(signature = %format!("{signature:08X}"), version = version.name, "dat header");

        let item_count = get_u16(&mut buf, "item count")?;
        let outfit_count = get_u16(&mut buf, "outfit count")?;
        let effect_count = get_u16(&mut buf, "effect count")?;
        let missile_count = get_u16(&mut buf, "missile count")?;

        let mut file = DatFile {
            version,
            signature,
            item_count,
            outfit_count,
            effect_count,
            missile_count,
            items: HashMap::new(),
            warnings: Vec::new(),
        };

        for client_id in 100..=item_count {
            match parse_item(&mut buf, client_id, &version) {
                Ok(item) => {
                    file.items.insert(client_id, item);
                }
                Err(e @ ClientError::UnknownFlag { .. }) => {
                    // The payload length of an unknown flag is unknowable,
                    // so the stream position cannot be recovered. Keep what
                    // parsed so far.
                    let message = format!("stopping item table: {e}");
                    warn!("{message}");
                    file.warnings.push(message);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(file)
    }
}

fn parse_item(buf: &mut Bytes, client_id: u16, version: &Version) -> ClientResult<ClientItem> {
    let mut item = ClientItem::new(client_id);

    loop {
        let flag = get_u8(buf, "item flag")?;
        match classify(version, flag) {
            FlagKind::Last => break,
            FlagKind::Simple(bit) => item.flags |= bit,
            FlagKind::Ground => {
                item.flags |= client_flag::GROUND;
                item.ground_speed = get_u16(buf, "ground speed")?;
            }
            FlagKind::Writable => {
                item.flags |= client_flag::WRITABLE;
                item.max_read_write_chars = get_u16(buf, "writable length")?;
            }
            FlagKind::WritableOnce => {
                item.flags |= client_flag::WRITABLE_ONCE;
                item.max_read_chars = get_u16(buf, "readable length")?;
            }
            FlagKind::Light => {
                item.flags |= client_flag::HAS_LIGHT;
                item.light_level = get_u16(buf, "light level")?;
                item.light_color = get_u16(buf, "light color")?;
            }
            FlagKind::Offset => {
                item.flags |= client_flag::HAS_OFFSET;
                get_u16(buf, "offset x")?;
                get_u16(buf, "offset y")?;
            }
            FlagKind::Elevation => {
                item.flags |= client_flag::HAS_ELEVATION;
                get_u16(buf, "elevation height")?;
            }
            FlagKind::Minimap => {
                item.flags |= client_flag::MINIMAP;
                item.minimap_color = get_u16(buf, "minimap color")?;
            }
            FlagKind::LensHelp => {
                item.flags |= client_flag::LENS_HELP;
                let opt = get_u16(buf, "lens help")?;
                if opt == 1112 {
                    item.flags |= client_flag::WRITABLE;
                }
            }
            FlagKind::IgnoreLook => {
                // No spare bit in the 32-bit word; the flag carries no
                // payload so skipping it keeps the stream aligned.
            }
            FlagKind::Cloth => {
                get_u16(buf, "cloth slot")?;
            }
            FlagKind::Market => {
                get_u16(buf, "market category")?;
                item.trade_as = get_u16(buf, "market trade-as")?;
                get_u16(buf, "market show-as")?;
                let name_len = get_u16(buf, "market name length")? as usize;
                if buf.remaining() < name_len {
                    return Err(ClientError::UnexpectedEof("market name"));
                }
                buf.advance(name_len);
                get_u16(buf, "market vocation")?;
                get_u16(buf, "market level")?;
            }
            FlagKind::Extended => {
                debug!(flag = %format!("{flag:02X}"), item = client_id, "extended flag, no payload");
            }
            FlagKind::Unknown => {
                return Err(ClientError::UnknownFlag {
                    flag,
                    item: client_id,
                })
            }
        }
    }

    item.width = get_u8(buf, "sprite width")?;
    item.height = get_u8(buf, "sprite height")?;
    if item.width > 1 || item.height > 1 {
        // Clients store the real tile edge here; it does not affect the
        // sprite count.
        get_u8(buf, "exact size")?;
    }
    item.layers = get_u8(buf, "layers")?;
    item.pattern_x = get_u8(buf, "pattern x")?;
    item.pattern_y = get_u8(buf, "pattern y")?;
    item.pattern_z = get_u8(buf, "pattern z")?;
    item.frames = get_u8(buf, "frames")?;
    item.num_sprites = item.sprite_geometry_product();

    if item.frames > 1 {
        let animation = 6 + 8 * usize::from(item.frames);
        if buf.remaining() < animation {
            return Err(ClientError::UnexpectedEof("animation descriptor"));
        }
        buf.advance(animation);
    }

    item.sprite_ids.reserve(item.num_sprites as usize);
    for _ in 0..item.num_sprites {
        let id = match version.sprite_id_width() {
            SpriteIdWidth::U16 => u32::from(get_u16(buf, "sprite id")?),
            SpriteIdWidth::U32 => get_u32(buf, "sprite id")?,
        };
        item.sprite_ids.push(id);
    }
    Ok(item)
}

fn get_u8(buf: &mut Bytes, what: &'static str) -> ClientResult<u8> {
    if buf.remaining() < 1 {
        return Err(ClientError::UnexpectedEof(what));
    }
    Ok(buf.get_u8())
}

fn get_u16(buf: &mut Bytes, what: &'static str) -> ClientResult<u16> {
    if buf.remaining() < 2 {
        return Err(ClientError::UnexpectedEof(what));
    }
    Ok(buf.get_u16_le())
}

fn get_u32(buf: &mut Bytes, what: &'static str) -> ClientResult<u32> {
    if buf.remaining() < 4 {
        return Err(ClientError::UnexpectedEof(what));
    }
    Ok(buf.get_u32_le())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAT_986: u32 = 0x5170_E904;
    const DAT_1010: u32 = 0x51E3_F8C3;

    fn header(signature: u32, items: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&signature.to_le_bytes());
        data.extend_from_slice(&items.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes()); // outfits
        data.extend_from_slice(&0u16.to_le_bytes()); // effects
        data.extend_from_slice(&0u16.to_le_bytes()); // missiles
        data
    }

    fn plain_geometry(data: &mut Vec<u8>) {
        data.extend_from_slice(&[1, 1, 1, 1, 1, 1, 1]); // w h layers px py pz frames
    }

    #[test]
    fn test_986_dispatch_and_light_flag() {
        let mut data = header(DAT_986, 100);
        data.push(0x00); // Ground
        data.extend_from_slice(&150u16.to_le_bytes());
        data.push(0x15); // HasLight: level + color
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(&215u16.to_le_bytes());
        data.push(0xFF);
        plain_geometry(&mut data);
        data.extend_from_slice(&42u16.to_le_bytes()); // 16-bit sprite id

        let file = DatParser::parse(data).unwrap();
        assert_eq!(file.version.name, "9.86");
        let item = &file.items[&100];
        assert_eq!(item.ground_speed, 150);
        assert_eq!(item.light_level, 5);
        assert_eq!(item.light_color, 215);
        assert_eq!(item.sprite_ids, vec![42]);
        assert!(item.flags & client_flag::GROUND != 0);
        assert!(item.flags & client_flag::HAS_LIGHT != 0);
    }

    #[test]
    fn test_1010_uses_wide_sprite_ids() {
        let mut data = header(DAT_1010, 100);
        data.push(0xFF);
        plain_geometry(&mut data);
        data.extend_from_slice(&70_000u32.to_le_bytes());

        let file = DatParser::parse(data).unwrap();
        assert_eq!(file.version.name, "10.10");
        assert_eq!(file.items[&100].sprite_ids, vec![70_000]);
    }

    #[test]
    fn test_charge_flag_shift_between_bands() {
        // 0x08 reads a u16 payload before 10.00 and none after.
        let mut old = header(DAT_986, 100);
        old.push(0x08);
        old.extend_from_slice(&80u16.to_le_bytes());
        old.push(0xFF);
        plain_geometry(&mut old);
        old.extend_from_slice(&1u16.to_le_bytes());
        let file = DatParser::parse(old).unwrap();
        assert_eq!(file.items[&100].max_read_write_chars, 80);

        let mut new = header(DAT_1010, 100);
        new.push(0x08);
        new.push(0xFF);
        plain_geometry(&mut new);
        new.extend_from_slice(&1u32.to_le_bytes());
        let file = DatParser::parse(new).unwrap();
        assert!(file.items[&100].flags & client_flag::HAS_CHARGES != 0);
        assert_eq!(file.items[&100].max_read_write_chars, 0);
    }

    #[test]
    fn test_market_flag_payload() {
        let mut data = header(DAT_986, 100);
        data.push(0x21);
        data.extend_from_slice(&1u16.to_le_bytes()); // category
        data.extend_from_slice(&3031u16.to_le_bytes()); // trade as
        data.extend_from_slice(&3031u16.to_le_bytes()); // show as
        data.extend_from_slice(&4u16.to_le_bytes()); // name length
        data.extend_from_slice(b"gold");
        data.extend_from_slice(&0u16.to_le_bytes()); // vocation
        data.extend_from_slice(&0u16.to_le_bytes()); // level
        data.push(0xFF);
        plain_geometry(&mut data);
        data.extend_from_slice(&9u16.to_le_bytes());

        let file = DatParser::parse(data).unwrap();
        assert_eq!(file.items[&100].trade_as, 3031);
    }

    #[test]
    fn test_extended_flags_are_stepped_over_pre10() {
        // Late 9.x builds emit bytes past the documented table; they
        // carry no payload and must not derail the item.
        let mut data = header(DAT_986, 100);
        data.push(0x30);
        data.push(0xF0);
        data.push(0x1C); // Minimap still parses normally afterwards
        data.extend_from_slice(&40u16.to_le_bytes());
        data.push(0xFF);
        plain_geometry(&mut data);
        data.extend_from_slice(&11u16.to_le_bytes());

        let file = DatParser::parse(data).unwrap();
        let item = &file.items[&100];
        assert_eq!(item.minimap_color, 40);
        assert_eq!(item.sprite_ids, vec![11]);
        assert!(file.warnings.is_empty());
    }

    #[test]
    fn test_unknown_flag_aborts_item_table_in_v10() {
        // The 10.00+ dialect knows nothing past Market, so an unlisted
        // byte leaves the stream unrecoverable.
        let mut data = header(DAT_1010, 101);
        data.push(0xF0);
        let file = DatParser::parse(data).unwrap();
        assert!(file.items.is_empty());
        assert_eq!(file.warnings.len(), 1);
    }

    #[test]
    fn test_animation_descriptor_is_skipped() {
        let mut data = header(DAT_986, 100);
        data.push(0xFF);
        data.extend_from_slice(&[1, 1]); // w h
        data.extend_from_slice(&[1, 1, 1, 1, 2]); // layers px py pz frames=2
        data.extend_from_slice(&vec![0u8; 6 + 8 * 2]); // animation block
        data.extend_from_slice(&7u16.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());

        let file = DatParser::parse(data).unwrap();
        let item = &file.items[&100];
        assert_eq!(item.num_sprites, 2);
        assert_eq!(item.sprite_ids, vec![7, 8]);
    }

    #[test]
    fn test_truncated_file_errors() {
        let mut data = header(DAT_986, 100);
        data.push(0x15); // light flag, payload missing
        let err = DatParser::parse(data).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedEof(_)));
    }

    #[test]
    fn test_bad_signature_rejected() {
        let data = header(0xDEAD_BEEF, 100);
        let err = DatParser::parse(data).unwrap_err();
        assert!(matches!(err, ClientError::UnknownSignature(0xDEAD_BEEF)));
    }
}
