use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Account, AccountDirectory, AccountUpdate, NewAccount, NewRole, Role, RoleDirectory};
use crate::datasvc::{Action, DataCommand, DataService, Entity, Params, QueryVariant, Row};
use crate::identity::AccountStatus;

/// Directory backed by the `usuarios` and `roles` stored procedures.
#[derive(Clone)]
pub struct ServiceDirectory {
    data: Arc<dyn DataService>,
}

fn to_params<T: serde::Serialize>(v: &T) -> Result<Params> {
    match serde_json::to_value(v)? {
        Value::Object(m) => Ok(m),
        other => Err(anyhow!("expected an object, got {}", other)),
    }
}

fn first<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Option<T>> {
    match rows.into_iter().find(|r| !r.is_null()) {
        Some(r) => Ok(Some(serde_json::from_value(r).context("unexpected row shape")?)),
        None => Ok(None),
    }
}

fn all<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter()
        .filter(|r| !r.is_null())
        .map(|r| serde_json::from_value(r).context("unexpected row shape"))
        .collect()
}

/// Drop soft-deleted rows. Rows without an `estado` column count as live.
fn live(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .filter(|r| match r.get("estado").and_then(Value::as_str) {
            Some(estado) => AccountStatus::from(estado).is_active(),
            None => true,
        })
        .collect()
}

impl ServiceDirectory {
    pub fn new(data: Arc<dyn DataService>) -> Self { Self { data } }

    async fn run(&self, entity: Entity, action: Action, params: Params) -> Result<Vec<Row>> {
        self.data.execute(&DataCommand::new(entity, action, params)).await
    }

    fn role_params(new: &NewRole) -> Params {
        let mut p = Params::new();
        p.insert("nombre".into(), Value::from(new.nombre.clone()));
        // stored as serialized text
        p.insert("permisos".into(), Value::from(new.permisos.to_serialized()));
        p
    }
}

#[async_trait]
impl AccountDirectory for ServiceDirectory {
    async fn account_by_username(&self, nombre_usuario: &str) -> Result<Option<Account>> {
        let cmd = DataCommand::new(Entity::Usuarios, Action::Variant(QueryVariant::Buscar), Params::new())
            .with_param("nombre_usuario", nombre_usuario);
        first(self.data.execute(&cmd).await?)
    }

    async fn account_by_id(&self, id: i64) -> Result<Option<Account>> {
        let cmd = DataCommand::new(Entity::Usuarios, Action::Select, Params::new()).with_param("id", id);
        first(self.data.execute(&cmd).await?)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        all(self.run(Entity::Usuarios, Action::SelectAll, Params::new()).await?)
    }

    async fn insert_account(&self, new: NewAccount) -> Result<Account> {
        let rows = self.run(Entity::Usuarios, Action::Insert, to_params(&new)?).await?;
        first(rows)?.ok_or_else(|| anyhow!("sp_usuarios returned no row for insert"))
    }

    async fn update_account(&self, id: i64, update: AccountUpdate) -> Result<Option<Account>> {
        let mut p = to_params(&update)?;
        p.insert("id".into(), Value::from(id));
        first(self.run(Entity::Usuarios, Action::Update, p).await?)
    }
}

#[async_trait]
impl RoleDirectory for ServiceDirectory {
    async fn role_by_name(&self, nombre: &str) -> Result<Option<Role>> {
        let cmd = DataCommand::new(Entity::Roles, Action::Variant(QueryVariant::Buscar), Params::new())
            .with_param("nombre", nombre);
        first(live(self.data.execute(&cmd).await?))
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        all(live(self.run(Entity::Roles, Action::SelectAll, Params::new()).await?))
    }

    async fn insert_role(&self, new: NewRole) -> Result<Role> {
        let rows = self.run(Entity::Roles, Action::Insert, Self::role_params(&new)).await?;
        first(rows)?.ok_or_else(|| anyhow!("sp_roles returned no row for insert"))
    }

    async fn update_role(&self, id: i64, new: NewRole) -> Result<Option<Role>> {
        let mut p = Self::role_params(&new);
        p.insert("id".into(), Value::from(id));
        first(self.run(Entity::Roles, Action::Update, p).await?)
    }

    async fn delete_role(&self, id: i64) -> Result<bool> {
        let mut p = Params::new();
        p.insert("id".into(), Value::from(id));
        Ok(!self.run(Entity::Roles, Action::Deactivate, p).await?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasvc::MemoryDataService;
    use crate::identity::{AccountStatus, PermissionSet};

    fn dir() -> ServiceDirectory { ServiceDirectory::new(Arc::new(MemoryDataService::new())) }

    #[tokio::test]
    async fn accounts_round_trip_through_rows() {
        let d = dir();
        let created = d.insert_account(NewAccount {
            nombre_usuario: "maria".into(),
            nombres: "María".into(),
            apellidos: "López".into(),
            email: "maria@example.org".into(),
            contrasena: "$argon2id$v=19$x".into(),
            rol: "Digitador".into(),
            estado: AccountStatus::Active,
            horario: None,
        }).await.unwrap();
        let found = d.account_by_username("maria").await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(d.account_by_username("ghost").await.unwrap().is_none());

        let upd = AccountUpdate { estado: Some(AccountStatus::Inactive), ..Default::default() };
        let after = d.update_account(created.id, upd).await.unwrap().unwrap();
        assert_eq!(after.estado, AccountStatus::Inactive);
        assert_eq!(d.account_by_id(created.id).await.unwrap().unwrap().estado, AccountStatus::Inactive);
    }

    #[tokio::test]
    async fn role_permissions_are_stored_as_text() {
        let d = dir();
        let r = d.insert_role(NewRole { nombre: "Cajero".into(), permisos: PermissionSet::from_iter(["Pagos", "Personas"]) }).await.unwrap();
        assert_eq!(r.permisos.len(), 2);
        let again = d.role_by_name("Cajero").await.unwrap().unwrap();
        assert!(again.permisos.contains("Pagos"));
        assert_eq!(d.list_roles().await.unwrap().len(), 1);
        assert!(d.delete_role(r.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleted_role_no_longer_resolves() {
        let d = dir();
        let cajero = d.insert_role(NewRole { nombre: "Cajero".into(), permisos: PermissionSet::single("Pagos") }).await.unwrap();
        d.insert_role(NewRole { nombre: "Digitador".into(), permisos: PermissionSet::single("Personas") }).await.unwrap();
        assert!(d.delete_role(cajero.id).await.unwrap());

        assert!(d.role_by_name("Cajero").await.unwrap().is_none());
        let names: Vec<String> = d.list_roles().await.unwrap().into_iter().map(|r| r.nombre).collect();
        assert_eq!(names, vec!["Digitador".to_string()]);

        // the name can be taken again and the new role is the one that resolves
        let again = d.insert_role(NewRole { nombre: "Cajero".into(), permisos: PermissionSet::single("Expedientes") }).await.unwrap();
        let found = d.role_by_name("Cajero").await.unwrap().unwrap();
        assert_eq!(found.id, again.id);
        assert!(found.permisos.contains("Expedientes"));
    }

    #[tokio::test]
    async fn login_ignores_a_deleted_role() {
        use crate::identity::{AuthProvider, DirectoryAuthProvider, LoginRequest, TokenService};

        let d = Arc::new(dir());
        let cajero = d.insert_role(NewRole { nombre: "Cajero".into(), permisos: PermissionSet::single("Pagos") }).await.unwrap();
        d.insert_account(NewAccount {
            nombre_usuario: "luis".into(),
            nombres: String::new(),
            apellidos: String::new(),
            email: String::new(),
            contrasena: crate::security::hash_password("clave").unwrap(),
            rol: "Cajero".into(),
            estado: AccountStatus::Active,
            horario: None,
        }).await.unwrap();
        d.delete_role(cajero.id).await.unwrap();

        let tokens = Arc::new(TokenService::new("pruebas").unwrap());
        let provider = DirectoryAuthProvider::new(d.clone(), d, tokens.clone());
        let req = LoginRequest { nombre_usuario: "luis".into(), contrasena: "clave".into() };
        let resp = provider.login(&req).await.unwrap();
        assert!(tokens.validate(Some(&resp.token)).unwrap().permisos.is_empty());
    }
}
