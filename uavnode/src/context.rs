use crate::config::Config;
use crate::core::NodeId;
use crate::data_types::{Health, Mode, NodeStatus};
use crate::pool::DEFAULT_BLOCK_COUNT;
use crate::registers::{RegisterStore, map};
use crate::time::Instant;
use crate::transport::Transport;

/// Node state shared by the protocol components
///
/// Owned by the [`crate::node::Node`] composition root and lent to each component call.
pub struct Context<const N: usize = DEFAULT_BLOCK_COUNT> {
    pub config: Config,
    pub registers: RegisterStore,
    pub transport: Transport<N>,
    local_node_id: Option<NodeId>,
    boot_time: Instant,
}

impl<const N: usize> Context<N> {
    /// Sets mode INITIALIZATION and health OK
    pub fn new(config: Config, mut registers: RegisterStore, boot_time: Instant) -> Self {
        registers.set(map::MODE, Mode::Initialization.into_u8());
        registers.set(map::HEALTH, Health::Ok.into_u8());
        Self {
            transport: Transport::new(config.stale_transfer_timeout),
            config,
            registers,
            local_node_id: None,
            boot_time,
        }
    }

    pub fn local_node_id(&self) -> Option<NodeId> {
        self.local_node_id
    }

    /// Commits the local node ID and mirrors it to the node ID register
    ///
    /// The ID is set once per boot; later calls are ignored.
    pub fn commit_node_id(&mut self, node_id: NodeId) {
        if let Some(current) = self.local_node_id {
            warn!(
                "Node ID {} already committed, ignoring {}",
                current.into_u8(),
                node_id.into_u8()
            );
            return;
        }
        self.local_node_id = Some(node_id);
        self.registers.set(map::NODE_ID, node_id.into_u8());
    }

    pub fn uptime_sec(&self, now: Instant) -> u32 {
        let seconds = now.saturating_duration_since(self.boot_time).as_secs();
        u32::try_from(seconds).unwrap_or(u32::MAX)
    }

    pub fn node_status(&self, now: Instant) -> NodeStatus {
        NodeStatus {
            uptime_sec: self.uptime_sec(now),
            health: Health::from_u8_truncating(self.registers.get(map::HEALTH)),
            mode: Mode::new(self.registers.get(map::MODE)).unwrap_or(Mode::Initialization),
            sub_mode: 0,
            vendor_specific_status_code: 0,
        }
    }
}
