//! Direct counter reset.

use cheetah_bfrt::{BfrtResult, BfrtSession, DirectCounter};
use log::{debug, info};

/// Zeroes `$COUNTER_SPEC_BYTES` and `$COUNTER_SPEC_PKTS` on every entry of
/// `table` by writing each entry back with a cleared counter.
///
/// Returns the number of entries written. An empty or missing table has
/// nothing to reset.
pub async fn clear_counters(session: &dyn BfrtSession, table: &str) -> BfrtResult<usize> {
    let entries = match session.entries(table).await {
        Ok(entries) => entries,
        Err(e) if e.is_not_found() => {
            debug!("{}: no entries, no counters to reset", table);
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    let count = entries.len();
    for entry in entries {
        session
            .modify_entry(table, entry.with_counter(DirectCounter::default()))
            .await?;
    }
    info!("Reset direct counters on {} entries of {}", count, table);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheetah_bfrt::{
        ActionSpec, BfrtStatus, Entry, EntryKey, ObjectKind, SimSession, SimSnapshot,
    };
    use pretty_assertions::assert_eq;

    const TABLE: &str = "pipe.Ingress.get_client";

    fn key(n: u32) -> EntryKey {
        EntryKey::new().with("dst_addr", n)
    }

    fn session() -> SimSession {
        let counted = |n: u32, bytes: u64| {
            Entry::new(key(n), ActionSpec::new("fwd_to_client")).with_counter(DirectCounter {
                bytes,
                packets: bytes / 64,
            })
        };
        SimSession::new(
            SimSnapshot::new("p")
                .table(TABLE, ObjectKind::MatchDirect)
                .table("pipe.Ingress.empty", ObjectKind::MatchDirect)
                .entry(TABLE, counted(1, 6400))
                .entry(TABLE, counted(2, 128)),
        )
    }

    #[tokio::test]
    async fn test_clear_counters() {
        let sim = session();
        assert_eq!(clear_counters(&sim, TABLE).await.unwrap(), 2);
        for n in 1..=2 {
            let entry = sim.entry(TABLE, &key(n)).unwrap();
            assert!(entry.counter.unwrap().is_zero());
            assert_eq!(entry.action.unwrap().name, "fwd_to_client");
        }
    }

    #[tokio::test]
    async fn test_clear_counters_empty_table() {
        let sim = session();
        assert_eq!(clear_counters(&sim, "pipe.Ingress.empty").await.unwrap(), 0);
        assert_eq!(clear_counters(&sim, "pipe.Ingress.missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_counters_list_failure() {
        let sim = session();
        sim.fail_list(TABLE, BfrtStatus::TableLocked);
        let err = clear_counters(&sim, TABLE).await.unwrap_err();
        assert_eq!(err.status_code(), Some(BfrtStatus::TableLocked));
    }
}
