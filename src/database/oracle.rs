use super::{Database, DatabaseError, Rows, SessionLimit, Value, normalize_query};
use futures::future::BoxFuture;
use oracle::pool::{GetMode, Pool, PoolBuilder};
use oracle::sql_type::OracleType;
use oracle::{Connection, Connector, Privilege, Row};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info_span, instrument};
use tracing_futures::Instrument as _;

/// Everything needed to reach the database.
#[derive(Clone, Debug)]
pub struct ConnectionSettings {
    pub username: String,
    pub password: SecretString,
    pub connect_string: String,
    pub sys_dba: bool,
    pub sys_oper: bool,
    pub max_open_connections: u32,
    pub disable_connection_pool: bool,
}

impl ConnectionSettings {
    /// Privileged sessions cannot be pooled, so they always use standalone
    /// connections.
    #[must_use]
    pub const fn pooled(&self) -> bool {
        !(self.disable_connection_pool || self.sys_dba || self.sys_oper)
    }
}

enum Source {
    Pool(Pool),
    Standalone(ConnectionSettings),
}

impl Source {
    fn connect(&self) -> oracle::Result<Connection> {
        match self {
            Self::Pool(pool) => pool.get(),
            Self::Standalone(settings) => {
                let mut connector = Connector::new(
                    settings.username.as_str(),
                    settings.password.expose_secret(),
                    settings.connect_string.as_str(),
                );
                if settings.sys_dba {
                    connector.privilege(Privilege::Sysdba);
                } else if settings.sys_oper {
                    connector.privilege(Privilege::Sysoper);
                }
                connector.connect()
            }
        }
    }
}

/// [`Database`] backed by the Oracle client library.
///
/// The driver is blocking; every round trip runs on tokio's blocking pool.
/// Pooled or not, at most `max_open_connections` sessions are open at once
/// and further queries wait for one to be returned.
#[derive(Clone)]
pub struct OracleDatabase {
    source: Arc<Source>,
    limit: SessionLimit,
}

impl OracleDatabase {
    /// Build the handle (and the session pool unless disabled).
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created.
    #[instrument(skip(settings), level = "info", err, fields(db.system = "oracle", pooled = settings.pooled()))]
    pub async fn connect(settings: ConnectionSettings) -> Result<Self, DatabaseError> {
        let limit = SessionLimit::new(settings.max_open_connections);
        let source = if settings.pooled() {
            let pool = tokio::task::spawn_blocking(move || {
                let mut builder = PoolBuilder::new(
                    settings.username.as_str(),
                    settings.password.expose_secret(),
                    settings.connect_string.as_str(),
                );
                builder
                    .min_connections(0)
                    .max_connections(settings.max_open_connections.max(1))
                    .get_mode(GetMode::Wait);
                builder.build()
            })
            .await
            .map_err(|e| DatabaseError::Worker(e.to_string()))?
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            Source::Pool(pool)
        } else {
            Source::Standalone(settings)
        };

        Ok(Self {
            source: Arc::new(source),
            limit,
        })
    }

    #[must_use]
    pub const fn session_limit(&self) -> &SessionLimit {
        &self.limit
    }

    /// Round trip to the server to verify credentials and reachability.
    ///
    /// # Errors
    ///
    /// Returns an error if no session can be opened or the ping fails.
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        let permit = self.limit.acquire().await?;
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let conn = source
                .connect()
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            conn.ping()
                .map_err(|e| DatabaseError::Connection(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Worker(e.to_string()))?
    }
}

impl Database for OracleDatabase {
    fn query<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<Rows, DatabaseError>> {
        Box::pin(async move {
            let span = info_span!(
                "db.query",
                db.system = "oracle",
                db.operation = "SELECT",
                db.statement = %normalize_query(sql),
                otel.kind = "client"
            );

            let permit = self.limit.acquire().instrument(span.clone()).await?;
            let source = Arc::clone(&self.source);
            let statement = sql.to_string();

            // The permit moves into the blocking call so the slot stays taken
            // until the session is released, even if this future is dropped.
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let conn = source
                    .connect()
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;
                fetch(&conn, &statement).map_err(|e| DatabaseError::Query(e.to_string()))
            })
            .instrument(span)
            .await
            .map_err(|e| DatabaseError::Worker(e.to_string()))?
        })
    }
}

// The result set borrows the connection and is dropped (closing the cursor)
// before the connection goes back to the pool.
fn fetch(conn: &Connection, sql: &str) -> oracle::Result<Rows> {
    let result_set = conn.query(sql, &[])?;

    let info: Vec<(String, OracleType)> = result_set
        .column_info()
        .iter()
        .map(|c| (c.name().to_string(), c.oracle_type().clone()))
        .collect();

    let mut rows = Vec::new();
    for row in result_set {
        let row = row?;
        let mut values = Vec::with_capacity(info.len());
        for (idx, (_, oracle_type)) in info.iter().enumerate() {
            values.push(decode_column(&row, idx, oracle_type)?);
        }
        rows.push(values);
    }

    debug!(rows = rows.len(), "fetched result set");

    let columns = info.into_iter().map(|(name, _)| name).collect();
    Ok(Rows::new(columns, rows))
}

fn decode_column(row: &Row, idx: usize, oracle_type: &OracleType) -> oracle::Result<Value> {
    let value = match oracle_type {
        OracleType::Number(_, _) | OracleType::Float(_) | OracleType::Int64 | OracleType::UInt64 => row
            .get::<_, Option<String>>(idx)?
            .map_or(Value::Null, Value::Number),
        OracleType::BinaryFloat | OracleType::BinaryDouble => row
            .get::<_, Option<f64>>(idx)?
            .map_or(Value::Null, Value::Float),
        _ => row
            .get::<_, Option<String>>(idx)?
            .map_or(Value::Null, Value::Str),
    };

    Ok(value)
}
