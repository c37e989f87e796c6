//! Static forwarding rules and the load plan built from configuration.
//!
//! Three tables receive literal entries:
//!
//! | Table                   | Key         | Action                          |
//! |-------------------------|-------------|---------------------------------|
//! | `get_client`            | `dst_addr`  | `fwd_to_client(egress_port, dmac)` |
//! | `get_server_from_bucket`| `bucket_id` | `fwd_to_server(egress_port, dip, dmac)` |
//! | `get_server_from_id`    | `server_id` | `fwd_to_server(egress_port, dip, dmac)` |

use cheetah_bfrt::{ActionSpec, Entry, EntryKey};
use cheetah_types::MacAddress;
use std::fmt;
use std::net::Ipv4Addr;

use crate::config::{Config, EndpointConfig, HostConfig, RegisterConfig, ServersConfig};
use crate::pipeline::{action, field};

/// Match key of a forwarding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKey {
    Client(Ipv4Addr),
    Bucket(u32),
    Server(u32),
}

impl MatchKey {
    pub fn to_entry_key(self) -> EntryKey {
        match self {
            MatchKey::Client(ip) => EntryKey::new().with(field::DST_ADDR, ip),
            MatchKey::Bucket(id) => EntryKey::new().with(field::BUCKET_ID, id),
            MatchKey::Server(id) => EntryKey::new().with(field::SERVER_ID, id),
        }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKey::Client(ip) => write!(f, "{}={}", field::DST_ADDR, ip),
            MatchKey::Bucket(id) => write!(f, "{}={}", field::BUCKET_ID, id),
            MatchKey::Server(id) => write!(f, "{}={}", field::SERVER_ID, id),
        }
    }
}

/// One desired-state entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingRule {
    pub key: MatchKey,
    pub egress_port: u16,
    /// Rewritten destination address; client rules carry none.
    pub dip: Option<Ipv4Addr>,
    pub dmac: MacAddress,
}

impl ForwardingRule {
    pub fn client(ip: Ipv4Addr, egress_port: u16, dmac: MacAddress) -> Self {
        Self {
            key: MatchKey::Client(ip),
            egress_port,
            dip: None,
            dmac,
        }
    }

    pub fn bucket(bucket_id: u32, egress_port: u16, dip: Ipv4Addr, dmac: MacAddress) -> Self {
        Self {
            key: MatchKey::Bucket(bucket_id),
            egress_port,
            dip: Some(dip),
            dmac,
        }
    }

    pub fn server(server_id: u32, egress_port: u16, dip: Ipv4Addr, dmac: MacAddress) -> Self {
        Self {
            key: MatchKey::Server(server_id),
            egress_port,
            dip: Some(dip),
            dmac,
        }
    }

    /// Builds the table entry: `fwd_to_client` for client rules,
    /// `fwd_to_server` otherwise.
    pub fn to_entry(&self) -> Entry {
        let action = match self.dip {
            None => ActionSpec::new(action::FWD_TO_CLIENT),
            Some(dip) => ActionSpec::new(action::FWD_TO_SERVER).with_param(field::DIP, dip),
        }
        .with_param(field::EGRESS_PORT, self.egress_port)
        .with_param(field::DMAC, self.dmac);
        Entry::new(self.key.to_entry_key(), action)
    }
}

impl fmt::Display for ForwardingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> port {}", self.key, self.egress_port)?;
        if let Some(dip) = self.dip {
            write!(f, " ip {}", dip)?;
        }
        write!(f, " mac {}", self.dmac)
    }
}

/// A backend endpoint reached through one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub bucket_id: u32,
    pub egress_port: u16,
    pub ip: Ipv4Addr,
    pub dmac: MacAddress,
}

impl Endpoint {
    /// Server id paired with this endpoint's bucket.
    pub fn server_id(&self) -> u32 {
        self.bucket_id + 1
    }
}

/// Expands hosts into endpoints, `nf_per_server` per host.
///
/// Bucket ids run from 0 in host order. Endpoint `nf` of host `sid` gets
/// `192.168.6{sid-1}.{nf+1}` and `16:93:a8:4d:{sid-1:02x}:{nf+1:02x}`.
pub fn generated_endpoints(hosts: &[HostConfig], nf_per_server: u8) -> Vec<Endpoint> {
    let mut endpoints = Vec::with_capacity(hosts.len() * usize::from(nf_per_server));
    let mut bucket_id = 0u32;
    for host in hosts {
        let host_index = host.sid.saturating_sub(1);
        for nf in 0..nf_per_server {
            let last = nf.saturating_add(1);
            endpoints.push(Endpoint {
                bucket_id,
                egress_port: host.port,
                ip: Ipv4Addr::new(192, 168, 60u8.saturating_add(host_index), last),
                dmac: MacAddress::new([0x16, 0x93, 0xa8, 0x4d, host_index, last]),
            });
            bucket_id += 1;
        }
    }
    endpoints
}

/// Everything the loader installs, table by table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub client_table: String,
    pub bucket_table: String,
    pub server_table: String,
    pub clients: Vec<ForwardingRule>,
    pub buckets: Vec<ForwardingRule>,
    pub servers: Vec<ForwardingRule>,
    pub registers: Vec<RegisterConfig>,
}

impl LoadPlan {
    pub fn from_config(config: &Config) -> Self {
        let clients = config
            .clients
            .iter()
            .map(|c| ForwardingRule::client(c.ip, c.port, c.dmac))
            .collect();

        let (buckets, servers) = match &config.servers {
            ServersConfig::Generated {
                nf_per_server,
                hosts,
            } => {
                let endpoints = generated_endpoints(hosts, *nf_per_server);
                let buckets = endpoints
                    .iter()
                    .map(|e| ForwardingRule::bucket(e.bucket_id, e.egress_port, e.ip, e.dmac))
                    .collect();
                let servers = endpoints
                    .iter()
                    .map(|e| ForwardingRule::server(e.server_id(), e.egress_port, e.ip, e.dmac))
                    .collect();
                (buckets, servers)
            }
            ServersConfig::Manual { buckets, ids } => (
                manual_rules(buckets, ForwardingRule::bucket),
                manual_rules(ids, ForwardingRule::server),
            ),
        };

        Self {
            client_table: config.tables.client.clone(),
            bucket_table: config.tables.bucket.clone(),
            server_table: config.tables.server_id.clone(),
            clients,
            buckets,
            servers,
            registers: config.registers.clone(),
        }
    }

    /// Tables paired with their rules, in load order.
    pub fn tables(&self) -> [(&str, &[ForwardingRule]); 3] {
        [
            (self.client_table.as_str(), self.clients.as_slice()),
            (self.bucket_table.as_str(), self.buckets.as_slice()),
            (self.server_table.as_str(), self.servers.as_slice()),
        ]
    }

    pub fn rule_count(&self) -> usize {
        self.clients.len() + self.buckets.len() + self.servers.len()
    }
}

fn manual_rules(
    rows: &[EndpointConfig],
    build: fn(u32, u16, Ipv4Addr, MacAddress) -> ForwardingRule,
) -> Vec<ForwardingRule> {
    rows.iter()
        .map(|row| build(row.id, row.port, row.ip, row.dmac))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheetah_bfrt::FieldValue;
    use pretty_assertions::assert_eq;

    fn host(sid: u8, port: u16) -> HostConfig {
        HostConfig {
            sid,
            port,
            dmac: MacAddress::ZERO,
        }
    }

    #[test]
    fn test_generated_endpoint_formula() {
        let endpoints = generated_endpoints(&[host(1, 52), host(2, 20)], 16);
        assert_eq!(endpoints.len(), 32);

        for sid in 1..=2u8 {
            for nf in 0..16u8 {
                let e = &endpoints[usize::from(sid - 1) * 16 + usize::from(nf)];
                assert_eq!(e.bucket_id, u32::from(sid - 1) * 16 + u32::from(nf));
                assert_eq!(e.ip.to_string(), format!("192.168.6{}.{}", sid - 1, nf + 1));
                assert_eq!(
                    e.dmac.to_string(),
                    format!("16:93:a8:4d:{:02x}:{:02x}", sid - 1, nf + 1)
                );
            }
        }
        assert_eq!(endpoints[0].egress_port, 52);
        assert_eq!(endpoints[31].egress_port, 20);
        assert_eq!(endpoints[31].server_id(), 32);
    }

    #[test]
    fn test_client_rule_entry() {
        let mac: MacAddress = "b8:83:03:6f:43:49".parse().unwrap();
        let rule = ForwardingRule::client(Ipv4Addr::new(192, 168, 63, 15), 60, mac);
        let entry = rule.to_entry();

        assert_eq!(
            entry.key.get("dst_addr"),
            Some(&FieldValue::Ipv4(Ipv4Addr::new(192, 168, 63, 15)))
        );
        let action = entry.action.unwrap();
        assert_eq!(action.name, "fwd_to_client");
        assert_eq!(action.params["egress_port"], FieldValue::Int(60));
        assert_eq!(action.params["dmac"], FieldValue::Mac(mac));
        assert!(!action.params.contains_key("dip"));
        assert_eq!(
            rule.to_string(),
            "dst_addr=192.168.63.15 -> port 60 mac b8:83:03:6f:43:49"
        );
    }

    #[test]
    fn test_server_rule_entry() {
        let rule = ForwardingRule::server(
            3,
            20,
            Ipv4Addr::new(192, 168, 61, 2),
            MacAddress::new([0x16, 0x93, 0xa8, 0x4d, 0x01, 0x02]),
        );
        let entry = rule.to_entry();
        assert_eq!(entry.key.get("server_id"), Some(&FieldValue::Int(3)));
        let action = entry.action.unwrap();
        assert_eq!(action.name, "fwd_to_server");
        assert_eq!(
            action.params["dip"],
            FieldValue::Ipv4(Ipv4Addr::new(192, 168, 61, 2))
        );
    }

    #[test]
    fn test_plan_from_reference_config() {
        let plan = LoadPlan::from_config(&Config::default());
        assert_eq!(plan.clients.len(), 2);
        assert_eq!(plan.buckets.len(), 32);
        assert_eq!(plan.servers.len(), 32);
        assert_eq!(plan.rule_count(), 66);
        assert_eq!(plan.buckets[0].key, MatchKey::Bucket(0));
        assert_eq!(plan.servers[0].key, MatchKey::Server(1));
        assert_eq!(plan.buckets[17].dip, plan.servers[17].dip);

        let tables: Vec<&str> = plan.tables().iter().map(|(t, _)| *t).collect();
        assert_eq!(
            tables,
            vec![
                "pipe.Ingress.get_client",
                "pipe.Ingress.get_server_from_bucket",
                "pipe.Ingress.get_server_from_id",
            ]
        );
    }

    #[test]
    fn test_plan_manual_mode() {
        let config = Config {
            servers: ServersConfig::manual_reference(),
            ..Config::default()
        };
        let plan = LoadPlan::from_config(&config);
        let buckets: Vec<String> = plan.buckets.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            buckets,
            vec![
                "bucket_id=0 -> port 52 ip 192.168.63.16 mac b8:83:03:6f:43:11",
                "bucket_id=1 -> port 52 ip 192.168.63.16 mac b8:83:03:6f:43:11",
                "bucket_id=2 -> port 52 ip 192.168.63.16 mac b8:83:03:6f:43:11",
                "bucket_id=3 -> port 20 ip 192.168.63.19 mac b8:83:03:6f:43:d1",
            ]
        );
        assert_eq!(plan.servers.len(), 2);
        assert_eq!(plan.servers[1].key, MatchKey::Server(2));
    }
}
