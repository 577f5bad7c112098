use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::{Action, DataCommand, DataService, Entity, Params, QueryVariant, Row};

#[derive(Default)]
struct Table {
    rows: BTreeMap<i64, Params>,
    next_id: i64,
}

/// In-process stand-in for the stored procedures, used when no database is configured.
/// Rows are schemaless JSON objects keyed by a generated `id`; deactivation sets
/// `estado = "inactivo"`.
#[derive(Default)]
pub struct MemoryDataService {
    tables: RwLock<HashMap<Entity, Table>>,
}

fn id_param(p: &Params) -> Option<i64> {
    match p.get("id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn matches(row: &Params, filter: &Params) -> bool {
    filter.iter().all(|(k, v)| row.get(k) == Some(v))
}

impl MemoryDataService {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl DataService for MemoryDataService {
    async fn execute(&self, cmd: &DataCommand) -> Result<Vec<Row>> {
        let mut tables = self.tables.write();
        let table = tables.entry(cmd.entity).or_default();
        match cmd.action {
            Action::Insert => {
                table.next_id += 1;
                let id = table.next_id;
                let mut row = cmd.params.clone();
                row.insert("id".into(), Value::from(id));
                row.entry("estado").or_insert_with(|| Value::from("activo"));
                table.rows.insert(id, row.clone());
                Ok(vec![Value::Object(row)])
            }
            Action::Update => {
                let id = id_param(&cmd.params).ok_or_else(|| anyhow!("{}: update requires id", cmd.entity))?;
                let Some(row) = table.rows.get_mut(&id) else { bail!("{}: no existe el registro {}", cmd.entity, id) };
                for (k, v) in cmd.params.iter() {
                    row.insert(k.clone(), v.clone());
                }
                Ok(vec![Value::Object(row.clone())])
            }
            Action::Deactivate => {
                let id = id_param(&cmd.params).ok_or_else(|| anyhow!("{}: deactivate requires id", cmd.entity))?;
                let Some(row) = table.rows.get_mut(&id) else { bail!("{}: no existe el registro {}", cmd.entity, id) };
                row.insert("estado".into(), Value::from("inactivo"));
                Ok(vec![Value::Object(row.clone())])
            }
            Action::Select => {
                if let Some(id) = id_param(&cmd.params) {
                    return Ok(table.rows.get(&id).cloned().map(Value::Object).into_iter().collect());
                }
                Ok(table.rows.values().filter(|r| matches(r, &cmd.params)).cloned().map(Value::Object).collect())
            }
            Action::SelectAll => Ok(table.rows.values().cloned().map(Value::Object).collect()),
            Action::Variant(QueryVariant::Conteo) => {
                let n = table.rows.values().filter(|r| matches(r, &cmd.params)).count();
                Ok(vec![serde_json::json!({ "total": n })])
            }
            Action::ByRelation | Action::Variant(_) => {
                Ok(table.rows.values().filter(|r| matches(r, &cmd.params)).cloned().map(Value::Object).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Params {
        v.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn insert_select_update_deactivate() {
        let svc = MemoryDataService::new();
        let ins = DataCommand::new(Entity::Pagos, Action::Insert, params(json!({"expediente_id": 3, "monto": 150})));
        let row = svc.execute(&ins).await.unwrap().remove(0);
        assert_eq!(row["id"], json!(1));
        assert_eq!(row["estado"], json!("activo"));

        let upd = DataCommand::new(Entity::Pagos, Action::Update, params(json!({"id": 1, "monto": 175})));
        assert_eq!(svc.execute(&upd).await.unwrap()[0]["monto"], json!(175));

        let rel = DataCommand::new(Entity::Pagos, Action::ByRelation, params(json!({"expediente_id": 3})));
        assert_eq!(svc.execute(&rel).await.unwrap().len(), 1);

        let del = DataCommand::new(Entity::Pagos, Action::Deactivate, params(json!({"id": "1"})));
        assert_eq!(svc.execute(&del).await.unwrap()[0]["estado"], json!("inactivo"));

        let all = DataCommand::new(Entity::Pagos, Action::SelectAll, Params::new());
        assert_eq!(svc.execute(&all).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn entities_are_isolated() {
        let svc = MemoryDataService::new();
        svc.execute(&DataCommand::new(Entity::Personas, Action::Insert, Params::new())).await.unwrap();
        let rows = svc.execute(&DataCommand::new(Entity::Pagos, Action::SelectAll, Params::new())).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn update_of_missing_row_fails() {
        let svc = MemoryDataService::new();
        let upd = DataCommand::new(Entity::Expedientes, Action::Update, params(json!({"id": 9})));
        assert!(svc.execute(&upd).await.is_err());
        let no_id = DataCommand::new(Entity::Expedientes, Action::Update, Params::new());
        assert!(svc.execute(&no_id).await.is_err());
    }

    #[tokio::test]
    async fn count_variant() {
        let svc = MemoryDataService::new();
        for _ in 0..3 {
            svc.execute(&DataCommand::new(Entity::Requisitos, Action::Insert, Params::new())).await.unwrap();
        }
        let c = DataCommand::new(Entity::Requisitos, Action::Variant(QueryVariant::Conteo), Params::new());
        assert_eq!(svc.execute(&c).await.unwrap()[0]["total"], json!(3));
    }
}
