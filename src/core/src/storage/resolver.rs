//! Get-or-create over a natural key.
//!
//! [`resolve`] looks a row up with the caller's natural-key query and, when
//! nothing matches, inserts the candidate row inside a savepoint. A unique
//! constraint violation on that insert means a concurrent writer committed
//! the same key first: the savepoint is rolled back and the lookup repeated.
//! Any other failure is returned to the caller, which aborts its ingestion.

use log::{debug, warn};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel, Select,
    SqlErr, TransactionTrait,
};

use crate::error_handling::types::StorageError;

/// Exposes the surrogate id of a resolved row.
pub trait Identified {
    type Id: Clone;

    fn surrogate_id(&self) -> Self::Id;
}

/// Result of a resolution: the surrogate id and whether this call created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<Id> {
    pub id: Id,
    pub created: bool,
}

pub async fn resolve<E, C>(
    conn: &C,
    lookup: Select<E>,
    candidate: E::ActiveModel,
) -> Result<Resolved<<E::Model as Identified>::Id>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
    E: EntityTrait,
    E::Model: Identified + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
{
    if let Some(existing) = lookup.clone().one(conn).await? {
        return Ok(Resolved {
            id: existing.surrogate_id(),
            created: false,
        });
    }
    insert_or_adopt(conn, lookup, candidate).await
}

/// Inserts `candidate` after a lookup missed. When a concurrent writer
/// committed the same key in between, its row is adopted instead.
async fn insert_or_adopt<E, C>(
    conn: &C,
    lookup: Select<E>,
    candidate: E::ActiveModel,
) -> Result<Resolved<<E::Model as Identified>::Id>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
    E: EntityTrait,
    E::Model: Identified + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
{
    let savepoint = conn.begin().await?;
    match candidate.insert(&savepoint).await {
        Ok(inserted) => {
            savepoint.commit().await?;
            debug!("created {} row", E::default().table_name());
            Ok(Resolved {
                id: inserted.surrogate_id(),
                created: true,
            })
        }
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            savepoint.rollback().await?;
            warn!(
                "concurrent insert into {}, retrying lookup",
                E::default().table_name()
            );
            let existing = lookup.one(conn).await?.ok_or_else(|| {
                StorageError::WriteFailed(format!(
                    "{} row vanished after a unique conflict",
                    E::default().table_name()
                ))
            })?;
            Ok(Resolved {
                id: existing.surrogate_id(),
                created: false,
            })
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database_storage::DatabaseStorage;
    use crate::storage::db_entities::{organisations, sensors};
    use sea_orm::{ColumnTrait, QueryFilter, Set};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn temp_db() -> DatabaseStorage {
        let dir = TempDir::new().unwrap();
        let path: PathBuf = dir.path().join("resolver.sqlite3");
        Box::leak(Box::new(dir));
        DatabaseStorage::new_file(path).unwrap()
    }

    fn organisation(name: &str) -> (Select<organisations::Entity>, organisations::ActiveModel) {
        (
            organisations::Entity::find().filter(organisations::Column::Name.eq(name)),
            organisations::ActiveModel {
                name: Set(name.to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn second_resolution_returns_the_same_id() {
        let storage = temp_db();
        let (first, second) = storage.block_on(async {
            let (lookup, candidate) = organisation("acme");
            let first = resolve(storage.connection(), lookup, candidate).await.unwrap();
            let (lookup, candidate) = organisation("acme");
            let second = resolve(storage.connection(), lookup, candidate).await.unwrap();
            (first, second)
        });
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(storage.row_count("organisations"), 1);
    }

    #[test]
    fn lost_race_adopts_the_winning_row() {
        let storage = temp_db();
        let (winner, loser) = storage.block_on(async {
            let (lookup, candidate) = organisation("acme");
            let winner = resolve(storage.connection(), lookup, candidate).await.unwrap();
            // The loser's lookup ran before the winner committed, so it goes
            // straight to the insert.
            let (lookup, candidate) = organisation("acme");
            let loser = insert_or_adopt(storage.connection(), lookup, candidate)
                .await
                .unwrap();
            (winner, loser)
        });
        assert!(winner.created);
        assert_eq!(
            loser,
            Resolved {
                id: winner.id,
                created: false
            }
        );
        assert_eq!(storage.row_count("organisations"), 1);
    }

    #[test]
    fn lost_race_adopts_the_row_committed_by_another_handle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.sqlite3");
        let first = DatabaseStorage::new_file(&path).unwrap();
        let second = DatabaseStorage::new_file(&path).unwrap();

        let winner = second.block_on(async {
            let (lookup, candidate) = organisation("acme");
            resolve(second.connection(), lookup, candidate).await.unwrap()
        });
        let loser = first.block_on(async {
            let (lookup, candidate) = organisation("acme");
            insert_or_adopt(first.connection(), lookup, candidate)
                .await
                .unwrap()
        });
        assert_eq!(loser.id, winner.id);
        assert!(!loser.created);
        assert_eq!(first.row_count("organisations"), 1);
    }

    #[test]
    fn unique_conflict_never_duplicates_a_row() {
        let storage = temp_db();
        let err = storage.block_on(async {
            let (lookup, candidate) = organisation("acme");
            let winner = resolve(storage.connection(), lookup, candidate).await.unwrap();
            // This lookup never sees the committed row, not even on retry.
            let blind = organisations::Entity::find()
                .filter(organisations::Column::Name.eq("acme"))
                .filter(organisations::Column::Id.ne(winner.id));
            let (_, candidate) = organisation("acme");
            resolve(storage.connection(), blind, candidate).await.unwrap_err()
        });
        assert!(matches!(err, StorageError::WriteFailed(_)));
        assert_eq!(storage.row_count("organisations"), 1);
    }

    #[test]
    fn null_meta_is_part_of_the_sensor_key() {
        let storage = temp_db();
        let ids = storage.block_on(async {
            let conn = storage.connection();
            let mut ids = Vec::new();
            for meta in [None, Some(r#"{"unit":"C"}"#.to_string()), None] {
                let lookup = match &meta {
                    Some(m) => sensors::Entity::find()
                        .filter(sensors::Column::TransmittedId.eq("s1"))
                        .filter(sensors::Column::Meta.eq(m.clone())),
                    None => sensors::Entity::find()
                        .filter(sensors::Column::TransmittedId.eq("s1"))
                        .filter(sensors::Column::Meta.is_null()),
                };
                let candidate = sensors::ActiveModel {
                    transmitted_id: Set("s1".into()),
                    meta: Set(meta),
                    ..Default::default()
                };
                ids.push(resolve(conn, lookup, candidate).await.unwrap().id);
            }
            ids
        });
        assert_ne!(ids[0], ids[1]);
        assert_eq!(ids[0], ids[2]);
        assert_eq!(storage.row_count("sensors"), 2);
    }
}
