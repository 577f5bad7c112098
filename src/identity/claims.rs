use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize};

/// Account status as persisted: `"activo"` is the only active value, anything else gates login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "activo",
            AccountStatus::Inactive => "inactivo",
        }
    }

    pub fn is_active(&self) -> bool { matches!(self, AccountStatus::Active) }
}

impl From<String> for AccountStatus {
    fn from(s: String) -> Self { AccountStatus::from(s.as_str()) }
}

impl From<&str> for AccountStatus {
    fn from(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("activo") { AccountStatus::Active } else { AccountStatus::Inactive }
    }
}

impl From<AccountStatus> for String {
    fn from(s: AccountStatus) -> Self { s.as_str().to_string() }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Allowed time-of-day window for an account. Carried in tokens, not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub hora_inicio: NaiveTime,
    pub hora_fin: NaiveTime,
}

impl TimeWindow {
    /// Windows may wrap midnight (22:00-06:00).
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.hora_inicio <= self.hora_fin {
            t >= self.hora_inicio && t <= self.hora_fin
        } else {
            t >= self.hora_inicio || t <= self.hora_fin
        }
    }
}

/// Unordered set of opaque permission strings. No hierarchy: every requirement must be
/// matched by an explicit member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self { Self::default() }

    pub fn single(p: &str) -> Self { Self::from_iter([p]) }

    /// Parse the serialized text form stored alongside a role (a JSON array of strings).
    pub fn from_serialized(text: &str) -> anyhow::Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() { return Ok(Self::default()); }
        let items: Vec<String> = serde_json::from_str(trimmed)
            .map_err(|e| anyhow::anyhow!("invalid permission list {:?}: {}", trimmed, e))?;
        Ok(Self::from_iter(items))
    }

    pub fn to_serialized(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn contains(&self, p: &str) -> bool { self.0.contains(p) }

    pub fn intersects(&self, other: &PermissionSet) -> bool {
        // iterate the smaller side
        let (small, large) = if self.0.len() <= other.0.len() { (self, other) } else { (other, self) };
        small.0.iter().any(|p| large.0.contains(p))
    }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(|s| s.as_str()) }
}

impl<S: AsRef<str>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        PermissionSet(
            iter.into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

/// Accepts either the serialized text column or an already-decoded array.
pub fn deserialize_permissions<'de, D>(de: D) -> Result<PermissionSet, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        List(Vec<String>),
        Null(()),
    }
    match Raw::deserialize(de)? {
        Raw::Text(t) => PermissionSet::from_serialized(&t).map_err(serde::de::Error::custom),
        Raw::List(items) => Ok(PermissionSet::from_iter(items)),
        Raw::Null(()) => Ok(PermissionSet::default()),
    }
}

/// Identity snapshot embedded in a session token at issuance time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub nombre_usuario: String,
    pub rol: String,
    pub email: String,
    pub estado: AccountStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horario: Option<TimeWindow>,
    #[serde(default)]
    pub permisos: PermissionSet,
}
