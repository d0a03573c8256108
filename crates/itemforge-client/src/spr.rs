use crate::error::{ClientError, ClientResult};
use crate::version::{spr_version, Version};
use itemforge_types::Sprite;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// A parsed SPR file: the offset index resolved into sprite records.
#[derive(Debug)]
pub struct SprFile {
    pub version: Version,
    pub signature: u32,
    pub sprite_count: u32,
    pub sprites: HashMap<u32, Sprite>,
    pub warnings: Vec<String>,
}

pub struct SprParser;

impl SprParser {
    pub fn parse_file(path: &Path, transparent: bool) -> ClientResult<SprFile> {
        Self::parse(std::fs::read(path)?, transparent)
    }

    pub fn parse(data: Vec<u8>, transparent: bool) -> ClientResult<SprFile> {
        let mut pos = 0usize;
        let signature = read_u32(&data, &mut pos, "spr signature")?;
        let version =
            spr_version(signature).ok_or(ClientError::UnknownSignature(signature))?;

        let sprite_count = if version.spr_count_is_u16() {
            u32::from(read_u16(&data, &mut pos, "sprite count")?)
        } else {
            read_u32(&data, &mut pos, "sprite count")?
        };
        debug!(
            signature = %format!("{signature:08X}"),
            version = version.name,
            sprite_count,
            "spr header"
        );

        let mut offsets = Vec::with_capacity(sprite_count as usize);
        for _ in 0..sprite_count {
            offsets.push(read_u32(&data, &mut pos, "sprite offset")?);
        }

        let mut file = SprFile {
            version,
            signature,
            sprite_count,
            sprites: HashMap::new(),
            warnings: Vec::new(),
        };

        // Sprite ids are sequential from 1; offset 0 marks an absent tile.
        for (index, &offset) in offsets.iter().enumerate() {
            let sprite_id = index as u32 + 1;
            if offset == 0 {
                continue;
            }
            match read_sprite(&data, offset, sprite_id, &version, transparent) {
                Ok(Some(sprite)) => {
                    file.sprites.insert(sprite_id, sprite);
                }
                Ok(None) => {}
                Err(e) => {
                    let message = format!("skipping sprite {sprite_id}: {e}");
                    warn!("{message}");
                    file.warnings.push(message);
                }
            }
        }
        Ok(file)
    }
}

fn read_sprite(
    data: &[u8],
    offset: u32,
    sprite_id: u32,
    version: &Version,
    transparent: bool,
) -> ClientResult<Option<Sprite>> {
    // Three unused bytes at each offset: the legacy transparency color key.
    let mut pos = offset as usize + 3;
    if pos > data.len() {
        return Err(ClientError::SpriteCorrupt {
            id: sprite_id,
            reason: format!("offset {offset} beyond end of file"),
        });
    }
    let size = if version.spr_size_is_u32() {
        read_u32(data, &mut pos, "sprite size")?
    } else {
        u32::from(read_u16(data, &mut pos, "sprite size")?)
    };
    if size == 0 {
        return Ok(None);
    }
    let end = pos + size as usize;
    if end > data.len() {
        return Err(ClientError::SpriteCorrupt {
            id: sprite_id,
            reason: format!("{size} pixel bytes run past end of file"),
        });
    }
    Ok(Some(Sprite {
        sprite_id,
        size,
        compressed_pixels: data[pos..end].to_vec(),
        transparent,
    }))
}

fn read_u16(data: &[u8], pos: &mut usize, what: &'static str) -> ClientResult<u16> {
    if *pos + 2 > data.len() {
        return Err(ClientError::UnexpectedEof(what));
    }
    let value = u16::from_le_bytes([data[*pos], data[*pos + 1]]);
    *pos += 2;
    Ok(value)
}

fn read_u32(data: &[u8], pos: &mut usize, what: &'static str) -> ClientResult<u32> {
    if *pos + 4 > data.len() {
        return Err(ClientError::UnexpectedEof(what));
    }
    let value = u32::from_le_bytes([
        data[*pos],
        data[*pos + 1],
        data[*pos + 2],
        data[*pos + 3],
    ]);
    *pos += 4;
    Ok(value)
}

#[cfg(test)]
pub(crate) fn build_spr(
    signature: u32,
    count_is_u16: bool,
    size_is_u32: bool,
    payloads: &[Option<Vec<u8>>],
) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&signature.to_le_bytes());
    if count_is_u16 {
        data.extend_from_slice(&(payloads.len() as u16).to_le_bytes());
    } else {
        data.extend_from_slice(&(payloads.len() as u32).to_le_bytes());
    }
    let index_at = data.len();
    data.resize(data.len() + payloads.len() * 4, 0);
    for (i, payload) in payloads.iter().enumerate() {
        let Some(payload) = payload else { continue };
        let offset = data.len() as u32;
        data[index_at + i * 4..index_at + i * 4 + 4].copy_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(&[0xFF, 0x00, 0xFF]); // color key
        if size_is_u32 {
            data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        } else {
            data.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        }
        data.extend_from_slice(payload);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPR_986: u32 = 0x5170_E96F;
    const SPR_860: u32 = 0x4C22_0594;
    const SPR_1010: u32 = 0x51E3_F8E9;

    #[test]
    fn test_parse_with_absent_sprite() {
        let data = build_spr(
            SPR_986,
            false,
            false,
            &[Some(vec![1, 2, 3, 4]), None, Some(vec![9, 9])],
        );
        let file = SprParser::parse(data, false).unwrap();
        assert_eq!(file.version.name, "9.86");
        assert_eq!(file.sprite_count, 3);
        assert_eq!(file.sprites.len(), 2);
        assert_eq!(file.sprites[&1].compressed_pixels, vec![1, 2, 3, 4]);
        assert!(!file.sprites.contains_key(&2));
        assert_eq!(file.sprites[&3].compressed_pixels, vec![9, 9]);
    }

    #[test]
    fn test_early_86x_uses_narrow_count() {
        let data = build_spr(SPR_860, true, false, &[Some(vec![5])]);
        let file = SprParser::parse(data, false).unwrap();
        assert_eq!(file.version.name, "8.60");
        assert_eq!(file.sprites[&1].size, 1);
    }

    #[test]
    fn test_v10_uses_wide_size() {
        let data = build_spr(SPR_1010, false, true, &[Some(vec![7; 10])]);
        let file = SprParser::parse(data, false).unwrap();
        assert_eq!(file.version.name, "10.10");
        assert_eq!(file.sprites[&1].size, 10);
    }

    #[test]
    fn test_corrupt_offset_is_skipped_not_fatal() {
        let mut data = build_spr(SPR_986, false, false, &[Some(vec![1, 2])]);
        // Point the only offset past the end of the file.
        let len = data.len() as u32;
        data[8..12].copy_from_slice(&(len + 50).to_le_bytes());
        let file = SprParser::parse(data, false).unwrap();
        assert!(file.sprites.is_empty());
        assert_eq!(file.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_signature_rejected() {
        let data = build_spr(0x0BAD_F00D, false, false, &[]);
        let err = SprParser::parse(data, false).unwrap_err();
        assert!(matches!(err, ClientError::UnknownSignature(0x0BAD_F00D)));
    }
}
