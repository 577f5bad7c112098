use std::collections::BTreeMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::warn;

use super::{Account, AccountDirectory, AccountUpdate, NewAccount, NewRole, Role, RoleDirectory};
use crate::identity::{AccountStatus, PermissionSet};
use crate::security;

pub const DEV_ADMIN_USER: &str = "admin";
pub const DEV_ADMIN_ROLE: &str = "Administrador";

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    roles: BTreeMap<i64, Role>,
    next_account: i64,
    next_role: i64,
}

/// Process-local directory. Last write wins, same as the stored procedures.
#[derive(Default)]
pub struct MemoryDirectory {
    tables: RwLock<Tables>,
}

impl MemoryDirectory {
    pub fn new() -> Self { Self::default() }

    /// Development seed: an `Administrador` role holding every permission the application
    /// routes use and an `admin` account with the given password.
    pub fn with_dev_admin(password: &str, permissions: PermissionSet) -> Result<Self> {
        let dir = Self::new();
        {
            let mut t = dir.tables.write();
            t.next_role += 1;
            let rid = t.next_role;
            t.roles.insert(rid, Role { id: rid, nombre: DEV_ADMIN_ROLE.into(), permisos: permissions });
            t.next_account += 1;
            let aid = t.next_account;
            t.accounts.insert(aid, Account {
                id: aid,
                nombre_usuario: DEV_ADMIN_USER.into(),
                nombres: "Administrador".into(),
                apellidos: String::new(),
                email: String::new(),
                contrasena: security::hash_password(password)?,
                rol: DEV_ADMIN_ROLE.into(),
                estado: AccountStatus::Active,
                horario: None,
            });
        }
        warn!(target: "startup", user = DEV_ADMIN_USER, "seeded development administrator in memory directory");
        Ok(dir)
    }
}

#[async_trait]
impl AccountDirectory for MemoryDirectory {
    async fn account_by_username(&self, nombre_usuario: &str) -> Result<Option<Account>> {
        let t = self.tables.read();
        Ok(t.accounts.values().find(|a| a.nombre_usuario == nombre_usuario).cloned())
    }

    async fn account_by_id(&self, id: i64) -> Result<Option<Account>> {
        Ok(self.tables.read().accounts.get(&id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.tables.read().accounts.values().cloned().collect())
    }

    async fn insert_account(&self, new: NewAccount) -> Result<Account> {
        let mut t = self.tables.write();
        if t.accounts.values().any(|a| a.nombre_usuario == new.nombre_usuario) {
            bail!("el nombre de usuario '{}' ya existe", new.nombre_usuario);
        }
        t.next_account += 1;
        let id = t.next_account;
        let acct = Account {
            id,
            nombre_usuario: new.nombre_usuario,
            nombres: new.nombres,
            apellidos: new.apellidos,
            email: new.email,
            contrasena: new.contrasena,
            rol: new.rol,
            estado: new.estado,
            horario: new.horario,
        };
        t.accounts.insert(id, acct.clone());
        Ok(acct)
    }

    async fn update_account(&self, id: i64, u: AccountUpdate) -> Result<Option<Account>> {
        let mut t = self.tables.write();
        let Some(acct) = t.accounts.get_mut(&id) else { return Ok(None); };
        if let Some(v) = u.nombres { acct.nombres = v; }
        if let Some(v) = u.apellidos { acct.apellidos = v; }
        if let Some(v) = u.email { acct.email = v; }
        if let Some(v) = u.rol { acct.rol = v; }
        if let Some(v) = u.estado { acct.estado = v; }
        if let Some(v) = u.horario { acct.horario = Some(v); }
        if let Some(v) = u.contrasena { acct.contrasena = v; }
        Ok(Some(acct.clone()))
    }
}

#[async_trait]
impl RoleDirectory for MemoryDirectory {
    async fn role_by_name(&self, nombre: &str) -> Result<Option<Role>> {
        Ok(self.tables.read().roles.values().find(|r| r.nombre == nombre).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        Ok(self.tables.read().roles.values().cloned().collect())
    }

    async fn insert_role(&self, new: NewRole) -> Result<Role> {
        let mut t = self.tables.write();
        if t.roles.values().any(|r| r.nombre == new.nombre) {
            bail!("el rol '{}' ya existe", new.nombre);
        }
        t.next_role += 1;
        let id = t.next_role;
        let role = Role { id, nombre: new.nombre, permisos: new.permisos };
        t.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: i64, new: NewRole) -> Result<Option<Role>> {
        let mut t = self.tables.write();
        let Some(role) = t.roles.get_mut(&id) else { return Ok(None); };
        role.nombre = new.nombre;
        role.permisos = new.permisos;
        Ok(Some(role.clone()))
    }

    async fn delete_role(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().roles.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(user: &str) -> NewAccount {
        NewAccount {
            nombre_usuario: user.into(),
            nombres: "Ana".into(),
            apellidos: "Pérez".into(),
            email: format!("{user}@example.org"),
            contrasena: "$argon2id$placeholder".into(),
            rol: "Digitador".into(),
            estado: AccountStatus::Active,
            horario: None,
        }
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let dir = MemoryDirectory::new();
        let a = dir.insert_account(new_account("ana")).await.unwrap();
        assert_eq!(a.id, 1);
        assert!(dir.insert_account(new_account("ana")).await.is_err());
        let b = dir.insert_account(new_account("beto")).await.unwrap();
        assert_eq!(b.id, 2);
        assert_eq!(dir.list_accounts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields() {
        let dir = MemoryDirectory::new();
        let a = dir.insert_account(new_account("ana")).await.unwrap();
        let upd = AccountUpdate { estado: Some(AccountStatus::Inactive), ..Default::default() };
        let after = dir.update_account(a.id, upd).await.unwrap().unwrap();
        assert_eq!(after.estado, AccountStatus::Inactive);
        assert_eq!(after.email, "ana@example.org");
        assert!(dir.update_account(99, AccountUpdate::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn role_lifecycle() {
        let dir = MemoryDirectory::new();
        let r = dir.insert_role(NewRole { nombre: "Cajero".into(), permisos: PermissionSet::single("Pagos") }).await.unwrap();
        assert!(dir.role_by_name("Cajero").await.unwrap().unwrap().permisos.contains("Pagos"));
        let upd = NewRole { nombre: "Cajero".into(), permisos: PermissionSet::from_iter(["Pagos", "Personas"]) };
        assert_eq!(dir.update_role(r.id, upd).await.unwrap().unwrap().permisos.len(), 2);
        assert!(dir.delete_role(r.id).await.unwrap());
        assert!(dir.role_by_name("Cajero").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dev_admin_can_be_verified() {
        let dir = MemoryDirectory::with_dev_admin("cambiar", PermissionSet::single("Usuarios")).unwrap();
        let a = dir.account_by_username(DEV_ADMIN_USER).await.unwrap().unwrap();
        assert!(security::verify_password(&a.contrasena, "cambiar"));
        assert!(dir.role_by_name(DEV_ADMIN_ROLE).await.unwrap().is_some());
    }
}
