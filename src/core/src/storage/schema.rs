//! SQLite schema, applied statement by statement when a database is opened.
//!
//! Every natural key carries a UNIQUE constraint so that the resolver can
//! rely on the store to reject a second row for the same key. Nullable key
//! parts are folded through `COALESCE` in expression indexes because SQLite
//! treats NULLs as distinct in plain unique constraints.

pub const STATEMENTS: &[&str] = &[
    "PRAGMA foreign_keys = ON;",
    "CREATE TABLE IF NOT EXISTS organisations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );",
    "CREATE TABLE IF NOT EXISTS systems (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );",
    "CREATE TABLE IF NOT EXISTS machines (
        id TEXT PRIMARY KEY
    );",
    "CREATE TABLE IF NOT EXISTS sensors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        transmitted_id TEXT NOT NULL,
        meta TEXT
    );",
    "CREATE UNIQUE INDEX IF NOT EXISTS sensors_natural_key
        ON sensors (transmitted_id, COALESCE(meta, ''));",
    "CREATE TABLE IF NOT EXISTS containers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL,
        tag TEXT NOT NULL,
        arguments TEXT NOT NULL,
        environment TEXT NOT NULL,
        UNIQUE (url, tag, arguments, environment)
    );",
    "CREATE TABLE IF NOT EXISTS models (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        container INTEGER NOT NULL UNIQUE REFERENCES containers(id)
    );",
    "CREATE TABLE IF NOT EXISTS contracts (
        id TEXT PRIMARY KEY,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        creation TEXT NOT NULL,
        validate_signature BOOLEAN NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        contract BLOB NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS machine_sensors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        machine TEXT NOT NULL REFERENCES machines(id),
        sensor INTEGER NOT NULL REFERENCES sensors(id),
        UNIQUE (machine, sensor)
    );",
    "CREATE TABLE IF NOT EXISTS contract_machine_sensors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        contract TEXT NOT NULL REFERENCES contracts(id),
        machine_sensor INTEGER NOT NULL REFERENCES machine_sensors(id),
        UNIQUE (contract, machine_sensor)
    );",
    "CREATE TABLE IF NOT EXISTS partners (
        contract TEXT NOT NULL REFERENCES contracts(id),
        organisation INTEGER NOT NULL REFERENCES organisations(id),
        PRIMARY KEY (contract, organisation)
    );",
    "CREATE TABLE IF NOT EXISTS read_permissions (
        contract TEXT NOT NULL REFERENCES contracts(id),
        organisation INTEGER NOT NULL REFERENCES organisations(id),
        PRIMARY KEY (contract, organisation)
    );",
    "CREATE TABLE IF NOT EXISTS write_permissions (
        contract TEXT NOT NULL REFERENCES contracts(id),
        organisation INTEGER NOT NULL REFERENCES organisations(id),
        PRIMARY KEY (contract, organisation)
    );",
    "CREATE TABLE IF NOT EXISTS technical_containers (
        contract TEXT NOT NULL REFERENCES contracts(id),
        container INTEGER NOT NULL REFERENCES containers(id),
        system INTEGER NOT NULL REFERENCES systems(id),
        PRIMARY KEY (contract, container, system)
    );",
    "CREATE TABLE IF NOT EXISTS storage_duration (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        system INTEGER NOT NULL REFERENCES systems(id),
        contract_machine_sensor INTEGER NOT NULL REFERENCES contract_machine_sensors(id),
        duration TEXT NOT NULL
    );",
    "CREATE UNIQUE INDEX IF NOT EXISTS storage_duration_natural_key
        ON storage_duration (contract_machine_sensor, system, duration);",
    "CREATE TABLE IF NOT EXISTS pipelines (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        contract_machine_sensor INTEGER NOT NULL REFERENCES contract_machine_sensors(id),
        system INTEGER NOT NULL REFERENCES systems(id),
        time_trigger TEXT
    );",
    "CREATE UNIQUE INDEX IF NOT EXISTS pipelines_natural_key
        ON pipelines (contract_machine_sensor, system, COALESCE(time_trigger, ''));",
    "CREATE TABLE IF NOT EXISTS analysis (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pipeline INTEGER NOT NULL REFERENCES pipelines(id),
        prev_model INTEGER REFERENCES models(id),
        next_model INTEGER REFERENCES models(id),
        persist BOOLEAN NOT NULL,
        execute INTEGER NOT NULL REFERENCES models(id)
    );",
];

/// Tables in dependency order, parents first.
pub const TABLES: &[&str] = &[
    "organisations",
    "systems",
    "machines",
    "sensors",
    "containers",
    "models",
    "contracts",
    "machine_sensors",
    "contract_machine_sensors",
    "partners",
    "read_permissions",
    "write_permissions",
    "technical_containers",
    "storage_duration",
    "pipelines",
    "analysis",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_has_a_create_statement() {
        for table in TABLES {
            let needle = format!("CREATE TABLE IF NOT EXISTS {} (", table);
            assert!(
                STATEMENTS.iter().any(|s| s.contains(&needle)),
                "missing DDL for {}",
                table
            );
        }
    }
}
