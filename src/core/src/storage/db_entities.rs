//! SeaORM entity models used by the database storage backend.
//!
//! These structs map to the SQLite tables created from `schema`:
//! - `organisations`, `systems`, `machines`, `sensors`, `containers` and
//!   `models`: entities resolved by natural key
//! - `machine_sensors`, `contract_machine_sensors`: resolved join entities
//! - `contracts`: verbatim contract documents plus header fields
//! - `partners`, `read_permissions`, `write_permissions`,
//!   `technical_containers`: per-contract links
//! - `storage_duration`, `pipelines`, `analysis`: retention policies and the
//!   flattened pipeline graph

use crate::storage::resolver::Identified;

/// Organisations, unique by name.
pub mod organisations {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "organisations")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(unique)]
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Deployment sites (edge or cloud), unique by name.
pub mod systems {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "systems")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(unique)]
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Machines are keyed by their external id.
pub mod machines {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "machines")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Sensors, unique by (transmitted id, meta).
pub mod sensors {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "sensors")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub transmitted_id: String,
        /// Compact JSON text, `None` when the declaration carried no meta
        #[sea_orm(column_type = "Text", nullable)]
        pub meta: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Container images, unique by (url, tag, arguments, environment).
pub mod containers {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "containers")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub url: String,
        pub tag: String,
        /// JSON array text
        #[sea_orm(column_type = "Text")]
        pub arguments: String,
        /// JSON array text
        #[sea_orm(column_type = "Text")]
        pub environment: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Models, one per container.
pub mod models {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "models")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(unique)]
        pub container: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        /// Executes a container
        #[sea_orm(
            belongs_to = "super::containers::Entity",
            from = "Column::Container",
            to = "super::containers::Column::Id"
        )]
        Container,
    }

    impl Related<super::containers::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Container.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// One row per sensor attached to a machine.
pub mod machine_sensors {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "machine_sensors")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub machine: String,
        pub sensor: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::machines::Entity",
            from = "Column::Machine",
            to = "super::machines::Column::Id"
        )]
        Machine,
        #[sea_orm(
            belongs_to = "super::sensors::Entity",
            from = "Column::Sensor",
            to = "super::sensors::Column::Id"
        )]
        Sensor,
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Scopes a machine-sensor pairing to one contract.
pub mod contract_machine_sensors {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "contract_machine_sensors")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub contract: String,
        pub machine_sensor: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::contracts::Entity",
            from = "Column::Contract",
            to = "super::contracts::Column::Id"
        )]
        Contract,
        #[sea_orm(
            belongs_to = "super::machine_sensors::Entity",
            from = "Column::MachineSensor",
            to = "super::machine_sensors::Column::Id"
        )]
        MachineSensor,
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Contract documents. `contract` holds the bytes exactly as submitted.
pub mod contracts {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "contracts")]
    pub struct Model {
        /// Caller supplied contract id
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        /// RFC3339 start of validity
        pub start_time: String,
        /// RFC3339 end of validity
        pub end_time: String,
        /// RFC3339 creation timestamp
        pub creation: String,
        pub validate_signature: bool,
        /// Cleared by soft delete
        pub active: bool,
        #[sea_orm(column_type = "Blob")]
        pub contract: Vec<u8>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Organisations named as contract partners.
pub mod partners {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "partners")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub contract: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub organisation: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Read grants (organisation x contract).
pub mod read_permissions {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "read_permissions")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub contract: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub organisation: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Write grants (organisation x contract).
pub mod write_permissions {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "write_permissions")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub contract: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub organisation: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Containers a contract requires on a system.
pub mod technical_containers {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "technical_containers")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub contract: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub container: i32,
        #[sea_orm(primary_key, auto_increment = false)]
        pub system: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Retention policy of a contract sensor on one system.
pub mod storage_duration {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "storage_duration")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub system: i32,
        pub contract_machine_sensor: i32,
        pub duration: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Execution unit: what triggers analysis of a contract sensor on a system.
pub mod pipelines {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "pipelines")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub contract_machine_sensor: i32,
        pub system: i32,
        /// Delay-after specification, `None` for untimed triggers
        pub time_trigger: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// One stage of a pipeline. `prev_model`/`next_model` link the stages into
/// chains.
pub mod analysis {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "analysis")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub pipeline: i32,
        pub prev_model: Option<i32>,
        pub next_model: Option<i32>,
        pub persist: bool,
        pub execute: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

macro_rules! identified_by_serial {
    ($($entity:ident),* $(,)?) => {
        $(
            impl Identified for $entity::Model {
                type Id = i32;

                fn surrogate_id(&self) -> i32 {
                    self.id
                }
            }
        )*
    };
}

identified_by_serial!(
    organisations,
    systems,
    sensors,
    containers,
    models,
    machine_sensors,
    contract_machine_sensors,
    storage_duration,
    pipelines,
);

impl Identified for machines::Model {
    type Id = String;

    fn surrogate_id(&self) -> String {
        self.id.clone()
    }
}
