/// A contiguous range of client versions sharing one DAT/SPR dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Pre755,
    V755_859,
    V860_986,
    V1000_1077,
    V1098Plus,
}

/// Element width of sprite ids in a DAT item record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteIdWidth {
    U16,
    U32,
}

/// A resolved client version with its dialect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// User-facing version string, e.g. "9.86".
    pub name: &'static str,
    /// Version as major*100 + minor, e.g. 986.
    pub numeric: u32,
    pub band: Band,
}

impl Version {
    fn resolve(name: &'static str) -> Self {
        let numeric = numeric_of(name);
        Self {
            name,
            numeric,
            band: band_of(numeric),
        }
    }

    pub fn sprite_id_width(&self) -> SpriteIdWidth {
        if self.numeric >= 1000 {
            SpriteIdWidth::U32
        } else {
            SpriteIdWidth::U16
        }
    }

    /// Sprite count field width in the SPR header. Only the early 8.6x
    /// clients still used a 16-bit count.
    pub fn spr_count_is_u16(&self) -> bool {
        (860..=862).contains(&self.numeric)
    }

    /// Per-sprite size field width in the SPR store.
    pub fn spr_size_is_u32(&self) -> bool {
        self.numeric >= 1000
    }

    /// Cloth and Market flags exist from 8.60 onward.
    pub fn has_market_flags(&self) -> bool {
        self.numeric >= 860
    }
}

fn numeric_of(name: &str) -> u32 {
    let mut parts = name.split('.');
    let major: u32 = parts.next().unwrap_or("0").parse().unwrap_or(0);
    let minor: u32 = parts.next().unwrap_or("0").parse().unwrap_or(0);
    major * 100 + minor
}

fn band_of(numeric: u32) -> Band {
    match numeric {
        0..=754 => Band::Pre755,
        755..=859 => Band::V755_859,
        860..=999 => Band::V860_986,
        1000..=1097 => Band::V1000_1077,
        _ => Band::V1098Plus,
    }
}

struct SupportedClient {
    name: &'static str,
    dat_signature: u32,
    spr_signature: u32,
}

const fn client(name: &'static str, dat_signature: u32, spr_signature: u32) -> SupportedClient {
    SupportedClient {
        name,
        dat_signature,
        spr_signature,
    }
}

/// Signature catalog carried over from the original plugin manifests.
/// Some versions shipped several revisions, so a version name may appear
/// more than once and SPR signatures may be shared across neighbors.
const CLIENT_CATALOG: &[SupportedClient] = &[
    client("8.60", 0x4C28_B721, 0x4C22_0594),
    client("8.60", 0x4C2C_7993, 0x4C22_0594),
    client("8.61", 0x4C6A_4CBC, 0x4C63_F145),
    client("8.62", 0x4C97_3450, 0x4C63_F145),
    client("8.70", 0x4CFE_22C5, 0x4CFD_078A),
    client("8.71", 0x4D41_979E, 0x4D3D_65D0),
    client("8.72", 0x4DAD_1A1A, 0x4DAD_1A32),
    client("8.73", 0x4DBA_A20B, 0x4DAD_1A32),
    client("9.10", 0x4E12_DAFF, 0x4E12_DB27),
    client("9.20", 0x4E80_7C08, 0x4E80_7C23),
    client("9.40", 0x4EE7_1DE5, 0x4EE7_1E06),
    client("9.44", 0x4F0E_EFBB, 0x4F0E_EFEF),
    client("9.44", 0x4F10_5168, 0x4F10_51D7),
    client("9.44", 0x4F16_C0D7, 0x4F10_51D7),
    client("9.44", 0x4F31_31CF, 0x4F31_31F6),
    client("9.46", 0x4F6B_341F, 0x4F5D_CEF7),
    client("9.50", 0x4F75_B7AB, 0x4F75_B7CD),
    client("9.52", 0x4F85_7F6C, 0x4F85_7F8E),
    client("9.53", 0x4FA1_1252, 0x4FA1_1282),
    client("9.54", 0x4FD5_956B, 0x4FD5_95B7),
    client("9.60", 0x4FFA_74CC, 0x4FFA_74F9),
    client("9.61", 0x5022_6F9D, 0x5022_6FBD),
    client("9.63", 0x503C_B933, 0x503C_B954),
    client("9.70", 0x5072_A490, 0x5072_A567),
    client("9.80", 0x50C7_0674, 0x50C7_0753),
    client("9.81", 0x50D1_C5B6, 0x50D1_C685),
    client("9.82", 0x512C_AD09, 0x512C_AD68),
    client("9.83", 0x5140_7B67, 0x5140_7BC7),
    client("9.85", 0x5164_1A1B, 0x5164_1A84),
    client("9.86", 0x5170_E904, 0x5170_E96F),
    client("10.10", 0x51E3_F8C3, 0x51E3_F8E9),
    client("10.20", 0x5236_F129, 0x5236_F14F),
    client("10.21", 0x526A_5068, 0x526A_5090),
    client("10.30", 0x52A5_9036, 0x52A5_905F),
    client("10.31", 0x52AE_D581, 0x52AE_D5A7),
    client("10.41", 0x5383_504E, 0x5383_5077),
    client("10.77", 0x0000_38DE, 0x5525_213D),
    client("10.98", 0x0000_42A3, 0x57BB_D603),
];

pub fn dat_version(signature: u32) -> Option<Version> {
    CLIENT_CATALOG
        .iter()
        .find(|c| c.dat_signature == signature)
        .map(|c| Version::resolve(c.name))
}

pub fn spr_version(signature: u32) -> Option<Version> {
    CLIENT_CATALOG
        .iter()
        .find(|c| c.spr_signature == signature)
        .map(|c| Version::resolve(c.name))
}

/// True when some supported client ships exactly this DAT/SPR pair.
pub fn is_matched_pair(dat_signature: u32, spr_signature: u32) -> bool {
    CLIENT_CATALOG
        .iter()
        .any(|c| c.dat_signature == dat_signature && c.spr_signature == spr_signature)
}
