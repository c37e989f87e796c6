//! Read-only dumps of table and register state.

use cheetah_bfrt::{BfrtError, BfrtResult, BfrtSession, BfrtStatus, Entry, ObjectKind, RegisterCell};
use cheetah_reconcile::Catalog;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Contents of one object at the time of the dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Snapshot {
    Table {
        name: String,
        entries: Vec<Entry>,
    },
    Register {
        name: String,
        from_hw: bool,
        cells: Vec<RegisterCell>,
    },
}

impl Snapshot {
    pub fn name(&self) -> &str {
        match self {
            Snapshot::Table { name, .. } | Snapshot::Register { name, .. } => name,
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Snapshot::Table { name, entries } => {
                writeln!(f, "Table {} ({} entries)", name, entries.len())?;
                for entry in entries {
                    writeln!(f, "  {}", entry)?;
                }
            }
            Snapshot::Register {
                name,
                from_hw,
                cells,
            } => {
                let source = if *from_hw { "hw" } else { "sw" };
                writeln!(f, "Register {} ({} cells, {})", name, cells.len(), source)?;
                for cell in cells {
                    writeln!(f, "  {}", cell)?;
                }
            }
        }
        Ok(())
    }
}

pub struct Inspector {
    session: Arc<dyn BfrtSession>,
    catalog: Catalog,
}

impl Inspector {
    pub fn new(session: Arc<dyn BfrtSession>) -> Self {
        Self {
            catalog: Catalog::new(session.clone()),
            session,
        }
    }

    /// Dumps every entry of a table. An empty listing is an empty snapshot.
    pub async fn dump_table(&self, name: &str) -> BfrtResult<Snapshot> {
        let entries = match self.session.entries(name).await {
            Ok(entries) => entries,
            Err(e) if e.status_code() == Some(BfrtStatus::ObjectNotFound) => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(Snapshot::Table {
            name: name.to_string(),
            entries,
        })
    }

    /// Dumps every index of a register.
    pub async fn dump_register(&self, name: &str, from_hw: bool) -> BfrtResult<Snapshot> {
        let cells = self.session.read_register(name, from_hw).await?;
        Ok(Snapshot::Register {
            name: name.to_string(),
            from_hw,
            cells,
        })
    }

    /// Dumps an object by name, looking its kind up in the catalog.
    pub async fn dump(&self, name: &str, from_hw: bool) -> BfrtResult<Snapshot> {
        let object = self
            .catalog
            .find(name)
            .await
            .map_err(|e| e.cause().clone())?;
        match object {
            Some(o) if o.kind == ObjectKind::Register => self.dump_register(&o.name, from_hw).await,
            Some(o) => self.dump_table(&o.name).await,
            None => Err(BfrtError::status(BfrtStatus::TableNotFound, name)),
        }
    }

    /// Dumps `tables`, then `registers`, in the order given.
    pub async fn dump_all(
        &self,
        tables: &[String],
        registers: &[String],
        from_hw: bool,
    ) -> BfrtResult<Vec<Snapshot>> {
        let mut snapshots = Vec::with_capacity(tables.len() + registers.len());
        for table in tables {
            snapshots.push(self.dump_table(table).await?);
        }
        for reg in registers {
            snapshots.push(self.dump_register(reg, from_hw).await?);
        }
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheetah_bfrt::{ActionSpec, EntryKey, SimSession, SimSnapshot};
    use pretty_assertions::assert_eq;

    fn inspector() -> Inspector {
        let snapshot = SimSnapshot::new("p")
            .table("pipe.Ingress.get_server_from_id", ObjectKind::MatchDirect)
            .table("pipe.Ingress.get_client", ObjectKind::MatchDirect)
            .entry(
                "pipe.Ingress.get_server_from_id",
                Entry::new(
                    EntryKey::new().with("server_id", 1u32),
                    ActionSpec::new("fwd_to_server").with_param("egress_port", 52u16),
                ),
            )
            .register("pipe.Ingress.bucket_counter_reg", 2, &["f1"])
            .register_value("pipe.Ingress.bucket_counter_reg", 1, "f1", 7);
        Inspector::new(Arc::new(SimSession::new(snapshot)))
    }

    #[tokio::test]
    async fn test_dump_table() {
        let snapshot = inspector()
            .dump_table("pipe.Ingress.get_server_from_id")
            .await
            .unwrap();
        assert_eq!(
            snapshot.to_string(),
            "Table pipe.Ingress.get_server_from_id (1 entries)\n  \
             {server_id=1} -> fwd_to_server(egress_port=52)\n"
        );
    }

    #[tokio::test]
    async fn test_dump_empty_table() {
        let snapshot = inspector().dump_table("pipe.Ingress.get_client").await.unwrap();
        assert_eq!(
            snapshot,
            Snapshot::Table {
                name: "pipe.Ingress.get_client".to_string(),
                entries: vec![],
            }
        );
    }

    #[tokio::test]
    async fn test_dump_missing_table_fails() {
        let err = inspector().dump_table("pipe.Ingress.nope").await.unwrap_err();
        assert_eq!(err.status_code(), Some(BfrtStatus::TableNotFound));
    }

    #[tokio::test]
    async fn test_dump_register() {
        let snapshot = inspector()
            .dump("pipe.Ingress.bucket_counter_reg", true)
            .await
            .unwrap();
        assert_eq!(
            snapshot.to_string(),
            "Register pipe.Ingress.bucket_counter_reg (2 cells, hw)\n  [0] f1=0\n  [1] f1=7\n"
        );
    }

    #[tokio::test]
    async fn test_dump_unknown_object() {
        let err = inspector().dump("pipe.Ingress.nope", false).await.unwrap_err();
        assert_eq!(err.status_code(), Some(BfrtStatus::TableNotFound));
    }

    #[tokio::test]
    async fn test_dump_all_json() {
        let snapshots = inspector()
            .dump_all(
                &["pipe.Ingress.get_client".to_string()],
                &["pipe.Ingress.bucket_counter_reg".to_string()],
                false,
            )
            .await
            .unwrap();
        let json = serde_json::to_value(&snapshots).unwrap();
        assert_eq!(json[0]["type"], "table");
        assert_eq!(json[1]["type"], "register");
        assert_eq!(json[1]["from_hw"], false);
        assert_eq!(json[1]["cells"][1]["fields"]["f1"], 7);
    }
}
