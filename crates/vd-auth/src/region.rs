use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::UserInfoResponse;

/// Regional shard a player's game data lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Na,
    Eu,
    Ap,
    Kr,
    Br,
    Latam,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Na => "na",
            Self::Eu => "eu",
            Self::Ap => "ap",
            Self::Kr => "kr",
            Self::Br => "br",
            Self::Latam => "latam",
        }
    }

    /// Parse a shard identifier as found in userinfo affinity values.
    pub fn from_shard(shard: &str) -> Option<Self> {
        match shard {
            "na" => Some(Self::Na),
            "eu" => Some(Self::Eu),
            "ap" => Some(Self::Ap),
            "kr" => Some(Self::Kr),
            "br" => Some(Self::Br),
            "latam" => Some(Self::Latam),
            _ => None,
        }
    }

    /// Map an ISO country code to its shard. Unrecognized codes land on na.
    pub fn from_country(country: &str) -> Self {
        match country.to_ascii_uppercase().as_str() {
            "KR" => Self::Kr,
            "BR" => Self::Br,
            "MX" | "AR" | "CL" | "CO" | "PE" | "VE" | "EC" | "BO" | "PY" | "UY" | "GT" | "CR"
            | "PA" | "DO" | "SV" | "HN" | "NI" => Self::Latam,
            "GB" | "DE" | "FR" | "ES" | "IT" | "PL" | "NL" | "SE" | "NO" | "DK" | "FI" | "PT"
            | "GR" | "CZ" | "RO" | "HU" | "AT" | "CH" | "BE" | "IE" | "UA" | "RU" | "TR" => {
                Self::Eu
            }
            "JP" | "AU" | "NZ" | "SG" | "MY" | "TH" | "PH" | "ID" | "VN" | "TW" | "HK" | "IN" => {
                Self::Ap
            }
            _ => Self::Na,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a player's region from their userinfo claims.
///
/// Affinity always wins over country: the `pp` entry is checked first, then
/// `live`, then any remaining value that names a known shard. Only when no
/// affinity entry resolves does the country table apply.
pub fn determine_region(info: &UserInfoResponse) -> Region {
    if let Some(affinity) = &info.affinity {
        let preferred = ["pp", "live"]
            .iter()
            .filter_map(|key| affinity.get(*key))
            .chain(affinity.values())
            .filter_map(Value::as_str)
            .find_map(Region::from_shard);
        if let Some(region) = preferred {
            return region;
        }
    }
    info.country
        .as_deref()
        .map(Region::from_country)
        .unwrap_or(Region::Na)
}
