use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, error, info, warn};

use super::{DataCommand, DataService, Row};

/// Stored-procedure data service. Every procedure has the signature
/// `sp_<entity>(accion text, parametros jsonb) RETURNS SETOF record`; rows come back as JSON.
///
/// A single `tokio_postgres::Client` pipelines concurrent queries from all handlers. When
/// its connection task ends the next call opens a new one.
pub struct PgDataService {
    config: Config,
    slot: ConnectionSlot<Client>,
}

async fn open(config: &Config) -> Result<Client> {
    let (client, conn) = config.connect(NoTls).await.context("connecting to postgres")?;
    // drive the connection in background
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            error!(target: "datasvc", "postgres connection error: {}", e);
        }
    });
    Ok(client)
}

impl PgDataService {
    pub async fn connect(url: &str) -> Result<Self> {
        let config: Config = url.parse().context("invalid postgres url")?;
        let client = open(&config).await?;
        Ok(Self { config, slot: ConnectionSlot::new(client) })
    }

    fn statement_for(cmd: &DataCommand) -> String {
        format!(
            "SELECT row_to_json(r)::text FROM {}($1::text, ($2::text)::jsonb) AS r",
            cmd.entity.procedure()
        )
    }
}

pub(crate) trait Liveness {
    fn is_closed(&self) -> bool;
}

impl Liveness for Client {
    fn is_closed(&self) -> bool { Client::is_closed(self) }
}

/// The connection in use, replaced once it reports closed. Concurrent callers that find
/// it closed reconnect once; the rest wait on the write lock and reuse the result.
pub(crate) struct ConnectionSlot<C> {
    current: RwLock<Arc<C>>,
}

impl<C: Liveness> ConnectionSlot<C> {
    pub(crate) fn new(conn: C) -> Self { Self { current: RwLock::new(Arc::new(conn)) } }

    pub(crate) async fn get<F, Fut>(&self, connect: F) -> Result<Arc<C>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C>>,
    {
        {
            let cur = self.current.read().await;
            if !cur.is_closed() {
                return Ok(cur.clone());
            }
        }
        let mut cur = self.current.write().await;
        if cur.is_closed() {
            warn!(target: "datasvc", "postgres connection closed; reconnecting");
            *cur = Arc::new(connect().await?);
            info!(target: "datasvc", "postgres connection re-established");
        }
        Ok(cur.clone())
    }
}

#[async_trait]
impl DataService for PgDataService {
    async fn execute(&self, cmd: &DataCommand) -> Result<Vec<Row>> {
        let sql = Self::statement_for(cmd);
        let code = cmd.action.code().to_string();
        let params = serde_json::to_string(&cmd.params)?;
        debug!(target: "datasvc", entity = %cmd.entity, action = %cmd.action, "calling {}", cmd.entity.procedure());
        let client = self.slot.get(|| open(&self.config)).await?;
        let rows = client
            .query(sql.as_str(), &[&code, &params])
            .await
            .with_context(|| format!("{} ({})", cmd.entity.procedure(), cmd.action))?;
        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let text: Option<String> = r.try_get(0)?;
            match text {
                Some(t) => out.push(serde_json::from_str(&t).context("procedure returned invalid json")?),
                None => out.push(Row::Null),
            }
        }
        Ok(out)
    }
}
