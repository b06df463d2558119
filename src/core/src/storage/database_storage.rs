use std::env;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use sea_orm::sea_query::Expr;
use sea_orm::sqlx::sqlite::SqliteJournalMode;
use sea_orm::{
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend,
    EntityTrait, FromQueryResult, QueryFilter, Statement,
};

use crate::error_handling::types::StorageError;
use crate::storage::db_entities::contracts;
use crate::storage::schema;
use crate::storage::storage_trait::ContractStore;
use crate::storage::types::{Access, ContractSummary, PipelineStage};

// Internal row mappings for the joined read paths.
#[derive(Debug, FromQueryResult)]
struct SummaryRow {
    id: String,
    start_time: String,
    end_time: String,
    active: bool,
}

#[derive(Debug, FromQueryResult)]
struct ContractIdRow {
    contract: String,
}

#[derive(Debug, FromQueryResult)]
struct NameRow {
    name: String,
}

#[derive(Debug, FromQueryResult)]
struct StageRow {
    pipeline: i32,
    system: String,
    sensor: String,
    time_trigger: Option<String>,
    execute: i32,
    prev_model: Option<i32>,
    next_model: Option<i32>,
    persist: bool,
}

impl StageRow {
    fn into_stage(self) -> PipelineStage {
        PipelineStage {
            pipeline: self.pipeline,
            system: self.system,
            sensor: self.sensor,
            time_trigger: self.time_trigger,
            execute: self.execute,
            prev_model: self.prev_model,
            next_model: self.next_model,
            persist: self.persist,
        }
    }
}

const ROUTING_QUERY: &str = "SELECT DISTINCT cms.contract AS contract
    FROM contract_machine_sensors AS cms
    JOIN machine_sensors AS ms ON cms.machine_sensor = ms.id
    JOIN sensors AS s ON ms.sensor = s.id
    JOIN contracts AS c ON cms.contract = c.id
    WHERE ms.machine = ? AND s.transmitted_id = ? AND c.active
    ORDER BY cms.contract";

const STAGES_QUERY: &str = "SELECT p.id AS pipeline, sy.name AS system,
        s.transmitted_id AS sensor, p.time_trigger AS time_trigger,
        a.execute AS execute, a.prev_model AS prev_model, a.next_model AS next_model,
        a.persist AS persist
    FROM analysis AS a
    JOIN pipelines AS p ON a.pipeline = p.id
    JOIN systems AS sy ON p.system = sy.id
    JOIN contract_machine_sensors AS cms ON p.contract_machine_sensor = cms.id
    JOIN machine_sensors AS ms ON cms.machine_sensor = ms.id
    JOIN sensors AS s ON ms.sensor = s.id
    WHERE cms.contract = ?
    ORDER BY p.id, a.id";

/// SQLite backed contract store.
///
/// The sea-orm API is async; this type owns a current-thread runtime and
/// exposes a blocking API on top of it. Do not call it from inside another
/// runtime's async context.
pub struct DatabaseStorage {
    rt: tokio::runtime::Runtime,
    db: DatabaseConnection,
}

impl DatabaseStorage {
    /// Default database filename used in the application's working directory
    const DEFAULT_DB_FILE: &'static str = "kosmos-contracts.sqlite3";
    const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    /// How long a writer waits for another ingestion's write lock
    const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create or open the database in the current working directory with the default filename
    pub fn new() -> Result<Self, StorageError> {
        let cwd = env::current_dir().map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        Self::new_file(cwd.join(Self::DEFAULT_DB_FILE))
    }

    pub fn new_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::open(path, Self::DEFAULT_MAX_CONNECTIONS)
    }

    /// Opens (creating if missing) the database file and applies the schema.
    pub fn open<P: AsRef<Path>>(path: P, max_connections: u32) -> Result<Self, StorageError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        }
        let url = format!("sqlite://{}?mode=rwc", path_ref.display());
        let db = rt.block_on(async {
            let mut options = ConnectOptions::new(url);
            options
                .max_connections(max_connections)
                .min_connections(1)
                .sqlx_logging(false)
                .map_sqlx_sqlite_opts(|opts| {
                    opts.journal_mode(SqliteJournalMode::Wal)
                        .busy_timeout(Self::BUSY_TIMEOUT)
                        .foreign_keys(true)
                });
            let db = Database::connect(options)
                .await
                .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
            for statement in schema::STATEMENTS {
                db.execute_unprepared(statement).await?;
            }
            Ok::<_, StorageError>(db)
        })?;
        info!("contract database ready at {}", path_ref.display());
        Ok(Self { rt, db })
    }

    /// Drives `future` to completion on the storage runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.rt.block_on(future)
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    #[cfg(test)]
    pub(crate) fn row_count(&self, table: &str) -> usize {
        #[derive(FromQueryResult)]
        struct CountRow {
            n: i64,
        }
        let sql = format!("SELECT COUNT(*) AS n FROM {}", table);
        self.block_on(async {
            CountRow::find_by_statement(Statement::from_string(DbBackend::Sqlite, sql))
                .one(&self.db)
                .await
                .unwrap()
                .map(|row| row.n as usize)
                .unwrap_or(0)
        })
    }
}

impl ContractStore for DatabaseStorage {
    fn get_contract(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.rt.block_on(async {
            let found = contracts::Entity::find_by_id(id.to_string())
                .one(&self.db)
                .await?;
            Ok(found.map(|row| row.contract))
        })
    }

    fn delete_contract(&self, id: &str) -> Result<bool, StorageError> {
        self.rt.block_on(async {
            let result = contracts::Entity::update_many()
                .col_expr(contracts::Column::Active, Expr::value(false))
                .filter(contracts::Column::Id.eq(id))
                .exec(&self.db)
                .await?;
            debug!("deactivated {} contract row(s) for {}", result.rows_affected, id);
            Ok(result.rows_affected > 0)
        })
    }

    fn list_contracts(&self) -> Result<Vec<ContractSummary>, StorageError> {
        self.rt.block_on(async {
            let rows = SummaryRow::find_by_statement(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT id, start_time, end_time, active FROM contracts ORDER BY id",
            ))
            .all(&self.db)
            .await?;
            Ok(rows
                .into_iter()
                .map(|row| ContractSummary {
                    id: row.id,
                    start_time: row.start_time,
                    end_time: row.end_time,
                    active: row.active,
                })
                .collect())
        })
    }

    fn contracts_for_machine_sensor(
        &self,
        machine: &str,
        sensor: &str,
    ) -> Result<Vec<String>, StorageError> {
        self.rt.block_on(async {
            let rows = ContractIdRow::find_by_statement(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                ROUTING_QUERY,
                [machine.into(), sensor.into()],
            ))
            .all(&self.db)
            .await?;
            Ok(rows.into_iter().map(|row| row.contract).collect())
        })
    }

    fn organisations_with_access(
        &self,
        contract: &str,
        access: Access,
    ) -> Result<Vec<String>, StorageError> {
        let sql = format!(
            "SELECT o.name AS name FROM {} AS l
             JOIN organisations AS o ON l.organisation = o.id
             WHERE l.contract = ? ORDER BY o.name",
            access.table()
        );
        self.rt.block_on(async {
            let rows = NameRow::find_by_statement(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                sql,
                [contract.into()],
            ))
            .all(&self.db)
            .await?;
            Ok(rows.into_iter().map(|row| row.name).collect())
        })
    }

    fn pipeline_stages(&self, contract: &str) -> Result<Vec<PipelineStage>, StorageError> {
        self.rt.block_on(async {
            let rows = StageRow::find_by_statement(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                STAGES_QUERY,
                [contract.into()],
            ))
            .all(&self.db)
            .await?;
            Ok(rows.into_iter().map(StageRow::into_stage).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ActiveModelTrait, Set};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn temp_db() -> DatabaseStorage {
        let dir = TempDir::new().unwrap();
        let path: PathBuf = dir.path().join("test.sqlite3");
        // Keep TempDir alive by leaking it for the test duration
        Box::leak(Box::new(dir));
        DatabaseStorage::new_file(path).unwrap()
    }

    fn put_contract(storage: &DatabaseStorage, id: &str, blob: &[u8]) {
        storage.block_on(async {
            contracts::ActiveModel {
                id: Set(id.to_string()),
                start_time: Set("2020-01-01T00:00:00Z".into()),
                end_time: Set("2030-01-01T00:00:00Z".into()),
                creation: Set("2020-01-01T00:00:00Z".into()),
                validate_signature: Set(false),
                active: Set(true),
                contract: Set(blob.to_vec()),
            }
            .insert(storage.connection())
            .await
            .unwrap();
        });
    }

    #[test]
    fn test_schema_is_reapplied_without_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("twice.sqlite3");
        drop(DatabaseStorage::new_file(&path).unwrap());
        let storage = DatabaseStorage::new_file(&path).unwrap();
        assert_eq!(storage.row_count("contracts"), 0);
    }

    #[test]
    fn test_blob_roundtrip_and_unknown_id() {
        let storage = temp_db();
        let blob = b"{ \"body\" : {}  }\n";
        put_contract(&storage, "c1", blob);
        assert_eq!(storage.get_contract("c1").unwrap().as_deref(), Some(&blob[..]));
        assert_eq!(storage.get_contract("nope").unwrap(), None);
    }

    #[test]
    fn test_soft_delete_keeps_blob() {
        let storage = temp_db();
        put_contract(&storage, "c1", b"{}");
        assert!(storage.delete_contract("c1").unwrap());
        assert!(!storage.delete_contract("missing").unwrap());
        assert_eq!(storage.get_contract("c1").unwrap().as_deref(), Some(&b"{}"[..]));
        let listed = storage.list_contracts().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].active);
    }

    #[test]
    fn test_list_is_ordered_by_id() {
        let storage = temp_db();
        put_contract(&storage, "b", b"{}");
        put_contract(&storage, "a", b"{}");
        let ids: Vec<String> = storage
            .list_contracts()
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_lookups() {
        let storage = temp_db();
        assert!(storage.contracts_for_machine_sensor("m1", "s1").unwrap().is_empty());
        assert!(storage
            .organisations_with_access("c1", Access::Write)
            .unwrap()
            .is_empty());
        assert!(storage.pipeline_stages("c1").unwrap().is_empty());
    }
}
