use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(UserId);
id_newtype!(CoupleId);
id_newtype!(InviteId);
id_newtype!(ManifestationId);
id_newtype!(ReviewId);
id_newtype!(DateNightId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Active,
    Used,
    Revoked,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Revoked => "revoked",
        }
    }
}

impl std::str::FromStr for InviteStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "used" => Ok(Self::Used),
            "revoked" => Ok(Self::Revoked),
            _ => Err(UnknownVariant("invite status", s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestationKind {
    Shared,
    Individual,
}

impl ManifestationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Individual => "individual",
        }
    }
}

impl std::str::FromStr for ManifestationKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" => Ok(Self::Shared),
            "individual" => Ok(Self::Individual),
            _ => Err(UnknownVariant("manifestation kind", s.to_string())),
        }
    }
}

/// A checkable step toward a manifestation, stored as part of a JSON list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub label: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {0} '{1}'")]
pub struct UnknownVariant(pub &'static str, pub String);
