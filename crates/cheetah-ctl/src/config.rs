//! Configuration file support for cheetah-ctl
//!
//! Loads and validates the deployment description (clients, backend
//! servers, registers to zero, objects to dump) from a TOML file.
//! Default location: /etc/cheetah/cheetah.toml

use crate::error::ConfigError;
use crate::pipeline;
use cheetah_types::MacAddress;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/cheetah/cheetah.toml";

/// Highest server id; the id selects the third octet `60 + sid - 1`.
pub const MAX_SID: u8 = 10;

/// Highest endpoint count per server; the endpoint selects the last octet.
pub const MAX_NF_PER_SERVER: u8 = 254;

/// Clearing behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSection {
    /// Log one progress line per object at info level
    #[serde(default = "default_true")]
    pub verbose: bool,

    /// Wrap the removals of each object in a device batch
    #[serde(default = "default_true")]
    pub batching: bool,
}

/// Qualified names of the forwarding tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablesConfig {
    #[serde(default = "default_client_table")]
    pub client: String,

    #[serde(default = "default_bucket_table")]
    pub bucket: String,

    #[serde(default = "default_server_id_table")]
    pub server_id: String,
}

/// A client reachable through the switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub ip: Ipv4Addr,
    pub dmac: MacAddress,
    pub port: u16,
}

/// A physical machine hosting `nf_per_server` generated endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub sid: u8,
    pub port: u16,
    /// Address of the machine itself. Generated endpoints sit behind a
    /// bridge on the host and use their own addresses instead.
    pub dmac: MacAddress,
}

/// One explicit bucket or server-id row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub id: u32,
    pub port: u16,
    pub ip: Ipv4Addr,
    pub dmac: MacAddress,
}

/// Backend server layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ServersConfig {
    /// Endpoints derived from host ids, numbered in host order
    Generated {
        #[serde(default = "default_nf_per_server")]
        nf_per_server: u8,
        #[serde(default)]
        hosts: Vec<HostConfig>,
    },
    /// Literal bucket and server-id rows
    Manual {
        #[serde(default)]
        buckets: Vec<EndpointConfig>,
        #[serde(default)]
        ids: Vec<EndpointConfig>,
    },
}

/// A register whose indices are zeroed after the load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterConfig {
    pub name: String,

    #[serde(default = "default_register_indices")]
    pub indices: Vec<u32>,

    #[serde(default = "default_register_fields")]
    pub fields: Vec<String>,
}

/// Objects printed after a reconcile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpConfig {
    #[serde(default = "default_dump_tables")]
    pub tables: Vec<String>,

    #[serde(default = "default_dump_registers")]
    pub registers: Vec<String>,

    /// Sync register values from hardware before reading
    #[serde(default = "default_true")]
    pub from_hw: bool,
}

/// Complete cheetah-ctl configuration
///
/// Sections describing deployment data (`clients`, `servers`, `registers`)
/// are empty when omitted from a file; [`Config::default`] is the reference
/// two-host deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reconcile: ReconcileSection,

    #[serde(default)]
    pub tables: TablesConfig,

    #[serde(default)]
    pub clients: Vec<ClientConfig>,

    #[serde(default = "default_servers")]
    pub servers: ServersConfig,

    #[serde(default)]
    pub registers: Vec<RegisterConfig>,

    #[serde(default)]
    pub dump: DumpConfig,
}

fn default_true() -> bool {
    true
}

fn default_client_table() -> String {
    pipeline::CLIENT_TABLE.to_string()
}

fn default_bucket_table() -> String {
    pipeline::BUCKET_TABLE.to_string()
}

fn default_server_id_table() -> String {
    pipeline::SERVER_ID_TABLE.to_string()
}

fn default_nf_per_server() -> u8 {
    16
}

fn default_servers() -> ServersConfig {
    ServersConfig::Generated {
        nf_per_server: default_nf_per_server(),
        hosts: Vec::new(),
    }
}

fn default_register_indices() -> Vec<u32> {
    vec![0]
}

fn default_register_fields() -> Vec<String> {
    vec![pipeline::REGISTER_FIELD.to_string()]
}

fn default_dump_tables() -> Vec<String> {
    vec![
        default_client_table(),
        default_server_id_table(),
        default_bucket_table(),
    ]
}

fn default_dump_registers() -> Vec<String> {
    vec![pipeline::BUCKET_COUNTER_REG.to_string()]
}

const CLIENT_1_MAC: MacAddress = MacAddress::new([0xb8, 0x83, 0x03, 0x6f, 0x43, 0x49]);
const CLIENT_2_MAC: MacAddress = MacAddress::new([0xb8, 0x83, 0x03, 0x6f, 0x43, 0x28]);
const HOST_1_MAC: MacAddress = MacAddress::new([0xb8, 0x83, 0x03, 0x6f, 0x43, 0x11]);
const HOST_2_MAC: MacAddress = MacAddress::new([0xb8, 0x83, 0x03, 0x6f, 0x43, 0xd1]);

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            verbose: default_true(),
            batching: default_true(),
        }
    }
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            client: default_client_table(),
            bucket: default_bucket_table(),
            server_id: default_server_id_table(),
        }
    }
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            tables: default_dump_tables(),
            registers: default_dump_registers(),
            from_hw: default_true(),
        }
    }
}

impl Default for ServersConfig {
    fn default() -> Self {
        ServersConfig::Generated {
            nf_per_server: default_nf_per_server(),
            hosts: vec![
                HostConfig {
                    sid: 1,
                    port: 52,
                    dmac: HOST_1_MAC,
                },
                HostConfig {
                    sid: 2,
                    port: 20,
                    dmac: HOST_2_MAC,
                },
            ],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconcile: ReconcileSection::default(),
            tables: TablesConfig::default(),
            clients: vec![
                ClientConfig {
                    ip: Ipv4Addr::new(192, 168, 63, 15),
                    dmac: CLIENT_1_MAC,
                    port: 60,
                },
                ClientConfig {
                    ip: Ipv4Addr::new(192, 168, 63, 17),
                    dmac: CLIENT_2_MAC,
                    port: 44,
                },
            ],
            servers: ServersConfig::default(),
            registers: vec![RegisterConfig {
                name: pipeline::BUCKET_COUNTER_REG.to_string(),
                indices: default_register_indices(),
                fields: default_register_fields(),
            }],
            dump: DumpConfig::default(),
        }
    }
}

impl ServersConfig {
    /// The two-host layout with the 2:1 bucket split, written out by hand.
    pub fn manual_reference() -> Self {
        let a = |id| EndpointConfig {
            id,
            port: 52,
            ip: Ipv4Addr::new(192, 168, 63, 16),
            dmac: HOST_1_MAC,
        };
        let b = |id| EndpointConfig {
            id,
            port: 20,
            ip: Ipv4Addr::new(192, 168, 63, 19),
            dmac: HOST_2_MAC,
        };
        ServersConfig::Manual {
            buckets: vec![a(0), a(1), a(2), b(3)],
            ids: vec![a(1), b(2)],
        }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`. A missing file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Loads configuration from `path`, falling back to the reference
    /// deployment if the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Config file {} not found, using reference deployment",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (what, name) in [
            ("tables.client", &self.tables.client),
            ("tables.bucket", &self.tables.bucket),
            ("tables.server_id", &self.tables.server_id),
        ] {
            if name.trim().is_empty() {
                return Err(invalid(format!("{} must not be empty", what)));
            }
        }

        let mut seen = HashSet::new();
        for client in &self.clients {
            if !seen.insert(client.ip) {
                return Err(invalid(format!("duplicate client ip {}", client.ip)));
            }
        }

        match &self.servers {
            ServersConfig::Generated {
                nf_per_server,
                hosts,
            } => {
                if *nf_per_server == 0 || *nf_per_server > MAX_NF_PER_SERVER {
                    return Err(invalid(format!(
                        "nf_per_server must be 1-{}, got {}",
                        MAX_NF_PER_SERVER, nf_per_server
                    )));
                }
                let mut sids = HashSet::new();
                for host in hosts {
                    if host.sid == 0 || host.sid > MAX_SID {
                        return Err(invalid(format!(
                            "sid must be 1-{}, got {}",
                            MAX_SID, host.sid
                        )));
                    }
                    if !sids.insert(host.sid) {
                        return Err(invalid(format!("duplicate sid {}", host.sid)));
                    }
                }
            }
            ServersConfig::Manual { buckets, ids } => {
                check_unique_ids("bucket id", buckets)?;
                check_unique_ids("server id", ids)?;
            }
        }

        for reg in &self.registers {
            if reg.name.trim().is_empty() {
                return Err(invalid("register name must not be empty".to_string()));
            }
            if reg.indices.is_empty() || reg.fields.is_empty() {
                return Err(invalid(format!(
                    "register {} needs at least one index and one field",
                    reg.name
                )));
            }
        }

        if let Some(name) = self
            .dump
            .tables
            .iter()
            .chain(&self.dump.registers)
            .find(|n| n.trim().is_empty())
        {
            return Err(invalid(format!("empty dump target {:?}", name)));
        }

        Ok(())
    }
}

fn check_unique_ids(what: &str, rows: &[EndpointConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for row in rows {
        if !seen.insert(row.id) {
            return Err(invalid(format!("duplicate {} {}", what, row.id)));
        }
    }
    Ok(())
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}
