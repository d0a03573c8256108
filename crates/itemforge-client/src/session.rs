use crate::dat::{DatFile, DatParser};
use crate::error::{ClientError, ClientResult};
use crate::spr::{SprFile, SprParser};
use crate::version::{is_matched_pair, Version};
use itemforge_types::{ClientItem, Sprite};
use std::path::Path;
use tracing::info;

/// A fully loaded client: paired item definitions and sprite store.
///
/// One session is active at a time; loading a new client builds a fresh
/// session and the old one (with its caches) is dropped wholesale.
#[derive(Debug)]
pub struct ClientSession {
    version: Version,
    dat: DatFile,
    spr: SprFile,
}

impl ClientSession {
    pub fn load(dat_path: &Path, spr_path: &Path, transparent: bool) -> ClientResult<Self> {
        let dat = DatParser::parse_file(dat_path)?;
        let spr = SprParser::parse_file(spr_path, transparent)?;
        Self::pair(dat, spr)
    }

    pub fn from_parts(dat: DatFile, spr: SprFile) -> ClientResult<Self> {
        Self::pair(dat, spr)
    }

    fn pair(dat: DatFile, spr: SprFile) -> ClientResult<Self> {
        if !is_matched_pair(dat.signature, spr.signature) {
            return Err(ClientError::VersionMismatch {
                dat: dat.version.name.to_string(),
                spr: spr.version.name.to_string(),
            });
        }
        info!(
            version = dat.version.name,
            items = dat.items.len(),
            sprites = spr.sprites.len(),
            "client loaded"
        );
        Ok(Self {
            version: dat.version,
            dat,
            spr,
        })
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn item(&self, client_id: u16) -> Option<&ClientItem> {
        self.dat.items.get(&client_id)
    }

    pub fn sprite(&self, sprite_id: u32) -> Option<&Sprite> {
        self.spr.sprites.get(&sprite_id)
    }

    pub fn item_count(&self) -> usize {
        self.dat.items.len()
    }

    pub fn sprite_count(&self) -> usize {
        self.spr.sprites.len()
    }

    pub fn dat(&self) -> &DatFile {
        &self.dat
    }

    pub fn spr(&self) -> &SprFile {
        &self.spr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spr::build_spr;

    fn minimal_dat(signature: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&signature.to_le_bytes());
        data.extend_from_slice(&100u16.to_le_bytes());
        data.extend_from_slice(&[0u8; 6]);
        data.push(0xFF);
        data.extend_from_slice(&[1, 1, 1, 1, 1, 1, 1]);
        data.extend_from_slice(&1u16.to_le_bytes());
        data
    }

    #[test]
    fn test_matched_pair_loads() {
        let dat = DatParser::parse(minimal_dat(0x5170_E904)).unwrap();
        let spr =
            SprParser::parse(build_spr(0x5170_E96F, false, false, &[Some(vec![0; 4])]), false)
                .unwrap();
        let session = ClientSession::from_parts(dat, spr).unwrap();
        assert_eq!(session.version().name, "9.86");
        assert!(session.item(100).is_some());
        assert!(session.sprite(1).is_some());
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let dat = DatParser::parse(minimal_dat(0x5170_E904)).unwrap();
        let spr =
            SprParser::parse(build_spr(0x51E3_F8E9, false, true, &[]), false).unwrap();
        let err = ClientSession::from_parts(dat, spr).unwrap_err();
        assert!(matches!(err, ClientError::VersionMismatch { .. }));
    }
}
