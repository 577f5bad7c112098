//! Account and role persistence seams.
//!
//! Login and administration only talk to these traits. `MemoryDirectory` backs development
//! runs and tests; `ServiceDirectory` goes through the stored-procedure data service.

mod memory;
mod service;

pub use memory::{MemoryDirectory, DEV_ADMIN_ROLE, DEV_ADMIN_USER};
pub use service::ServiceDirectory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::identity::{deserialize_permissions, AccountStatus, Claims, PermissionSet, TimeWindow};

/// Persisted account row. Holds the password digest, so it is never serialized to clients;
/// use [`Account::view`] for responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub id: i64,
    pub nombre_usuario: String,
    #[serde(default)]
    pub nombres: String,
    #[serde(default)]
    pub apellidos: String,
    #[serde(default)]
    pub email: String,
    pub contrasena: String,
    pub rol: String,
    pub estado: AccountStatus,
    #[serde(default)]
    pub horario: Option<TimeWindow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: i64,
    pub nombre_usuario: String,
    pub nombres: String,
    pub apellidos: String,
    pub email: String,
    pub rol: String,
    pub estado: AccountStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horario: Option<TimeWindow>,
}

impl Account {
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            nombre_usuario: self.nombre_usuario.clone(),
            nombres: self.nombres.clone(),
            apellidos: self.apellidos.clone(),
            email: self.email.clone(),
            rol: self.rol.clone(),
            estado: self.estado,
            horario: self.horario,
        }
    }

    /// Snapshot for a token; permissions come from the role at issuance time.
    pub fn claims(&self, permisos: PermissionSet) -> Claims {
        Claims {
            id: self.id,
            nombre_usuario: self.nombre_usuario.clone(),
            rol: self.rol.clone(),
            email: self.email.clone(),
            estado: self.estado,
            horario: self.horario,
            permisos,
        }
    }
}

/// Registration input. `contrasena` is already a digest when it reaches a directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub nombre_usuario: String,
    #[serde(default)]
    pub nombres: String,
    #[serde(default)]
    pub apellidos: String,
    #[serde(default)]
    pub email: String,
    pub contrasena: String,
    pub rol: String,
    #[serde(default = "default_status")]
    pub estado: AccountStatus,
    #[serde(default)]
    pub horario: Option<TimeWindow>,
}

fn default_status() -> AccountStatus { AccountStatus::Active }

/// Administrative update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombres: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apellidos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estado: Option<AccountStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horario: Option<TimeWindow>,
    /// Digest, never plaintext.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrasena: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub nombre: String,
    #[serde(deserialize_with = "deserialize_permissions", default)]
    pub permisos: PermissionSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub nombre: String,
    #[serde(deserialize_with = "deserialize_permissions", default)]
    pub permisos: PermissionSet,
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn account_by_username(&self, nombre_usuario: &str) -> Result<Option<Account>>;
    async fn account_by_id(&self, id: i64) -> Result<Option<Account>>;
    async fn list_accounts(&self) -> Result<Vec<Account>>;
    /// Fails when the username is taken.
    async fn insert_account(&self, new: NewAccount) -> Result<Account>;
    async fn update_account(&self, id: i64, update: AccountUpdate) -> Result<Option<Account>>;
}

#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn role_by_name(&self, nombre: &str) -> Result<Option<Role>>;
    async fn list_roles(&self) -> Result<Vec<Role>>;
    async fn insert_role(&self, new: NewRole) -> Result<Role>;
    async fn update_role(&self, id: i64, new: NewRole) -> Result<Option<Role>>;
    async fn delete_role(&self, id: i64) -> Result<bool>;
}
