//! Data service: every entity read/write is one typed command handed to a collaborator.
//!
//! Stored procedures take a one-letter action code; that encoding lives only in
//! [`Action::code`] and is used at the PostgreSQL boundary.

mod guard;
mod memory;
mod postgres;

pub use guard::GuardedDataService;
pub use memory::MemoryDataService;
pub use postgres::PgDataService;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub type Params = Map<String, Value>;
pub type Row = Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {
    Expedientes,
    Personas,
    Beneficiarios,
    Pagos,
    Requisitos,
    Remisiones,
    Contactos,
    Proyectos,
    Seguimientos,
    Usuarios,
    Roles,
}

impl Entity {
    pub const DISPATCHABLE: [Entity; 9] = [
        Entity::Expedientes,
        Entity::Personas,
        Entity::Beneficiarios,
        Entity::Pagos,
        Entity::Requisitos,
        Entity::Remisiones,
        Entity::Contactos,
        Entity::Proyectos,
        Entity::Seguimientos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Expedientes => "expedientes",
            Entity::Personas => "personas",
            Entity::Beneficiarios => "beneficiarios",
            Entity::Pagos => "pagos",
            Entity::Requisitos => "requisitos",
            Entity::Remisiones => "remisiones",
            Entity::Contactos => "contactos",
            Entity::Proyectos => "proyectos",
            Entity::Seguimientos => "seguimientos",
            Entity::Usuarios => "usuarios",
            Entity::Roles => "roles",
        }
    }

    pub fn parse(s: &str) -> Option<Entity> {
        let lower = s.trim().to_ascii_lowercase();
        Entity::DISPATCHABLE
            .iter()
            .chain([Entity::Usuarios, Entity::Roles].iter())
            .copied()
            .find(|e| e.as_str() == lower)
    }

    /// Stored procedure serving this entity.
    pub fn procedure(&self) -> String { format!("sp_{}", self.as_str()) }

    /// Permission string that guards this entity, shared by UI routes and API endpoints.
    pub fn permission(&self) -> &'static str {
        match self {
            Entity::Expedientes => "Expedientes",
            Entity::Personas => "Personas",
            Entity::Beneficiarios => "Personas",
            Entity::Pagos => "Pagos",
            Entity::Requisitos => "Requisitos",
            Entity::Remisiones => "Remisiones",
            Entity::Contactos => "Contactos",
            Entity::Proyectos => "Proyectos",
            Entity::Seguimientos => "Expedientes",
            Entity::Usuarios => "Usuarios",
            Entity::Roles => "Roles",
        }
    }

    /// Accounts and roles hold password digests and are served by the admin endpoints only.
    pub fn is_dispatchable(&self) -> bool { !matches!(self, Entity::Usuarios | Entity::Roles) }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Entity-specific query shapes beyond the common verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryVariant {
    /// Lookup by a unique business key (username, case number).
    Buscar,
    /// Grouped/aggregated listing.
    General,
    /// Items still awaiting action.
    Pendientes,
    /// Items currently in force.
    Vigentes,
    /// Row counts.
    Conteo,
    /// Wide listing for export.
    Exportar,
}

impl QueryVariant {
    pub const ALL: [QueryVariant; 6] = [
        QueryVariant::Buscar,
        QueryVariant::General,
        QueryVariant::Pendientes,
        QueryVariant::Vigentes,
        QueryVariant::Conteo,
        QueryVariant::Exportar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryVariant::Buscar => "buscar",
            QueryVariant::General => "general",
            QueryVariant::Pendientes => "pendientes",
            QueryVariant::Vigentes => "vigentes",
            QueryVariant::Conteo => "conteo",
            QueryVariant::Exportar => "exportar",
        }
    }

    fn code(&self) -> char {
        match self {
            QueryVariant::Buscar => 'B',
            QueryVariant::General => 'G',
            QueryVariant::Pendientes => 'P',
            QueryVariant::Vigentes => 'V',
            QueryVariant::Conteo => 'C',
            QueryVariant::Exportar => 'X',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Insert,
    Update,
    /// Rows related to another record (e.g. payments of one case file).
    ByRelation,
    /// One record by id, or a filtered list.
    Select,
    SelectAll,
    /// Soft delete.
    Deactivate,
    Variant(QueryVariant),
}

impl Action {
    pub fn code(&self) -> char {
        match self {
            Action::Insert => 'I',
            Action::Update => 'U',
            Action::ByRelation => 'Q',
            Action::Select => 'S',
            Action::SelectAll => 'A',
            Action::Deactivate => 'D',
            Action::Variant(v) => v.code(),
        }
    }

    /// Reads are idempotent and may be retried.
    pub fn is_read(&self) -> bool {
        !matches!(self, Action::Insert | Action::Update | Action::Deactivate)
    }

    /// Path form: `insert`, `update`, `by-relation`, `select`, `select-all`, `deactivate`,
    /// or `variant:<name>`.
    pub fn parse(s: &str) -> Option<Action> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some(name) = lower.strip_prefix("variant:") {
            return QueryVariant::ALL.iter().copied().find(|v| v.as_str() == name).map(Action::Variant);
        }
        match lower.as_str() {
            "insert" => Some(Action::Insert),
            "update" => Some(Action::Update),
            "by-relation" => Some(Action::ByRelation),
            "select" => Some(Action::Select),
            "select-all" => Some(Action::SelectAll),
            "deactivate" => Some(Action::Deactivate),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Insert => f.write_str("insert"),
            Action::Update => f.write_str("update"),
            Action::ByRelation => f.write_str("by-relation"),
            Action::Select => f.write_str("select"),
            Action::SelectAll => f.write_str("select-all"),
            Action::Deactivate => f.write_str("deactivate"),
            Action::Variant(v) => write!(f, "variant:{}", v.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataCommand {
    pub entity: Entity,
    pub action: Action,
    pub params: Params,
}

impl DataCommand {
    pub fn new(entity: Entity, action: Action, params: Params) -> Self { Self { entity, action, params } }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

#[async_trait]
pub trait DataService: Send + Sync {
    async fn execute(&self, cmd: &DataCommand) -> Result<Vec<Row>>;
}
