// Daemon runtime configuration (SPEC_FULL.md §9): which shard groups this
// node services, which network it talks on, and the tunables a `main.rs`
// needs to build a `FlowHandler` — `groups`/`broker-id`/`broker-num`,
// `network`, `status-size-limit`, `bind`. Consensus-level constants (gas
// schedule, caps, retarget window) stay where they are derived from:
// `blockflow_common::config`.

use std::time::Duration;

use blockflow_common::chain_index::{ChainIndex, GroupIndex};
use blockflow_common::config::{DEFAULT_STATUS_SIZE_LIMIT, GROUPS};
use blockflow_common::difficulty::{max_target, Target};
use blockflow_common::network::NetworkId;
use clap::{Parser, ValueEnum};

/// Default P2P bind address for a node with no `--bind` override.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:22973";

/// Default interval between liveness pings to connected peers (spec.md §6).
pub const DEFAULT_PING_FREQUENCY: Duration = Duration::from_secs(30);

/// Which of the `G x G` chains a broker is responsible for. A broker with
/// `broker_num == 1` services every chain (a single full node); a sharded
/// deployment splits the `G` groups across `broker_num` brokers, and a
/// chain is serviced by whichever broker owns either endpoint group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerInfo {
    pub broker_id: u32,
    pub broker_num: u32,
}

impl BrokerInfo {
    pub fn new(broker_id: u32, broker_num: u32) -> Self {
        assert!(broker_num > 0, "broker_num must be positive");
        assert!(broker_id < broker_num, "broker_id {} out of range [0, {})", broker_id, broker_num);
        Self { broker_id, broker_num }
    }

    /// A single, unsharded node services every group.
    pub fn single() -> Self {
        Self { broker_id: 0, broker_num: 1 }
    }

    pub fn contains_group(&self, group: GroupIndex) -> bool {
        group.value() % self.broker_num == self.broker_id
    }

    pub fn contains_chain(&self, chain_index: ChainIndex) -> bool {
        self.contains_group(chain_index.from) || self.contains_group(chain_index.to)
    }

    /// Every chain this broker is responsible for validating and extending,
    /// in `ChainIndex::all()`'s canonical row-major order.
    pub fn serviced_chains(&self) -> Vec<ChainIndex> {
        ChainIndex::all().into_iter().filter(|idx| self.contains_chain(*idx)).collect()
    }
}

/// `clap`-friendly mirror of `blockflow_common::network::NetworkId` (that
/// type deliberately has no `ValueEnum` impl of its own — it is a wire-format
/// type, not a CLI concern).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NetworkArg {
    Mainnet,
    Testnet,
    Devnet,
}

impl From<NetworkArg> for NetworkId {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Mainnet => NetworkId::Mainnet,
            NetworkArg::Testnet => NetworkId::Testnet,
            NetworkArg::Devnet => NetworkId::Devnet,
        }
    }
}

/// CLI surface for the daemon binary (SPEC_FULL.md §9). Parsed once in
/// `main` and turned into a `FlowHandler` plus whatever transport/RPC layer
/// that binary wires up.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "blockflow-daemon",
    about = "BlockFlow validation and flow-maintenance node",
    version = blockflow_common::BUILD_VERSION
)]
pub struct DaemonConfig {
    /// Number of shard groups `G`. Must match the compiled-in
    /// `blockflow_common::config::GROUPS`; kept as a flag so a
    /// misconfigured deployment fails fast with a clear message rather than
    /// silently servicing the wrong chains.
    #[arg(long, default_value_t = GROUPS)]
    pub groups: u32,

    #[arg(long, default_value_t = 0)]
    pub broker_id: u32,

    #[arg(long, default_value_t = 1)]
    pub broker_num: u32,

    #[arg(long, value_enum, default_value_t = NetworkArg::Testnet)]
    pub network: NetworkArg,

    #[arg(long, default_value_t = DEFAULT_STATUS_SIZE_LIMIT)]
    pub status_size_limit: usize,

    #[arg(long, default_value = DEFAULT_BIND_ADDRESS)]
    pub bind: String,

    /// Seconds between liveness pings sent to each connected peer.
    #[arg(long, default_value_t = 30)]
    pub ping_frequency_secs: u64,
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.groups != GROUPS {
            return Err(format!(
                "--groups {} does not match this build's group count {}",
                self.groups, GROUPS
            ));
        }
        if self.broker_id >= self.broker_num {
            return Err(format!(
                "--broker-id {} out of range for --broker-num {}",
                self.broker_id, self.broker_num
            ));
        }
        Ok(())
    }

    pub fn broker_info(&self) -> BrokerInfo {
        BrokerInfo::new(self.broker_id, self.broker_num)
    }

    pub fn network_id(&self) -> NetworkId {
        self.network.into()
    }

    pub fn ping_frequency(&self) -> Duration {
        Duration::from_secs(self.ping_frequency_secs)
    }

    /// Genesis/lowest-difficulty target, used to seed a fresh chain before
    /// any retarget has run.
    pub fn max_mining_target(&self) -> Target {
        max_target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_single_services_everything() {
        let broker = BrokerInfo::single();
        assert_eq!(broker.serviced_chains().len(), ChainIndex::all().len());
    }

    #[test]
    fn test_broker_shard_splits_groups() {
        let broker0 = BrokerInfo::new(0, 2);
        let broker1 = BrokerInfo::new(1, 2);
        // every chain is serviced by at least one of the two brokers
        for idx in ChainIndex::all() {
            assert!(broker0.contains_chain(idx) || broker1.contains_chain(idx));
        }
        // an intra-group chain in an even group is only broker0's
        assert!(broker0.contains_chain(ChainIndex::new(GroupIndex(0), GroupIndex(0))));
        assert!(!broker1.contains_chain(ChainIndex::new(GroupIndex(0), GroupIndex(0))));
    }

    #[test]
    fn test_config_rejects_bad_broker_id() {
        let mut config = DaemonConfig::parse_from(["blockflow-daemon"]);
        config.broker_id = 5;
        config.broker_num = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_defaults_parse() {
        let config = DaemonConfig::parse_from(["blockflow-daemon"]);
        assert!(config.validate().is_ok());
        assert_eq!(config.network_id(), NetworkId::Testnet);
        assert_eq!(config.broker_info(), BrokerInfo::single());
    }
}
