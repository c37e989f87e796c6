//! Names fixed by the compiled `cheetah_quic_and_hash_pipeline` program.

use cheetah_bfrt::{ActionSpec, ObjectKind, SimSnapshot};

pub const PROGRAM: &str = "cheetah_quic_and_hash_pipeline";

pub const CLIENT_TABLE: &str = "pipe.Ingress.get_client";
pub const BUCKET_TABLE: &str = "pipe.Ingress.get_server_from_bucket";
pub const SERVER_ID_TABLE: &str = "pipe.Ingress.get_server_from_id";

pub const BUCKET_COUNTER_REG: &str = "pipe.Ingress.bucket_counter_reg";
pub const COUNTER_REG: &str = "pipe.Ingress.counter_reg";
pub const DEBUG_REGS: [&str; 3] = [
    "pipe.Ingress.debug_reg",
    "pipe.Ingress.debug_2_reg",
    "pipe.Ingress.debug_3_reg",
];

/// Field every register in the program stores its value in.
pub const REGISTER_FIELD: &str = "f1";

pub mod action {
    pub const FWD_TO_CLIENT: &str = "fwd_to_client";
    pub const FWD_TO_SERVER: &str = "fwd_to_server";
    pub const NO_ACTION: &str = "NoAction";
}

pub mod field {
    pub const DST_ADDR: &str = "dst_addr";
    pub const BUCKET_ID: &str = "bucket_id";
    pub const SERVER_ID: &str = "server_id";
    pub const EGRESS_PORT: &str = "egress_port";
    pub const DIP: &str = "dip";
    pub const DMAC: &str = "dmac";
}

/// Empty program with the forwarding tables and registers of the pipeline.
///
/// Used when `cheetah-ctl` runs without a recorded snapshot.
pub fn reference_snapshot() -> SimSnapshot {
    let mut snapshot = SimSnapshot::new(PROGRAM);
    for table in [CLIENT_TABLE, BUCKET_TABLE, SERVER_ID_TABLE] {
        snapshot = snapshot.table_with_default(
            table,
            ObjectKind::MatchDirect,
            ActionSpec::new(action::NO_ACTION),
        );
    }
    snapshot = snapshot
        .register(BUCKET_COUNTER_REG, 1, &[REGISTER_FIELD])
        .register(COUNTER_REG, 1, &[REGISTER_FIELD]);
    for reg in DEBUG_REGS {
        snapshot = snapshot.register(reg, 5, &[REGISTER_FIELD]);
    }
    snapshot
}
