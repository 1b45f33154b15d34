use crate::context::Context;
use crate::core::{DataTypeId, Priority, TransferId};
use crate::data_types::{Mode, NodeStatus};
use crate::encoding::{DataType, Serialize};
use crate::pool::PoolStatistics;
use crate::registers::map;
use crate::time::Instant;
use crate::transport::TxError;

/// Result of one housekeeping pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HousekeepingReport {
    pub purged_sessions: usize,
    /// Pool usage before the NodeStatus broadcast of this pass
    pub statistics: PoolStatistics,
    /// Peak usage exceeded the configured threshold
    pub pool_warning: bool,
    pub status_broadcast: Result<(), TxError>,
}

/// 1 Hz maintenance tasks
///
/// Each pass purges stale reassembly sessions, reports pool usage, broadcasts NodeStatus and
/// switches the node to OPERATIONAL. The peak usage reported covers the interval since the
/// previous pass and leaves out the pass's own broadcast.
#[derive(Debug, Default)]
pub struct PeriodicHousekeeping {
    transfer_id: TransferId,
}

impl PeriodicHousekeeping {
    pub const fn new() -> Self {
        Self {
            transfer_id: TransferId::SESSION_START,
        }
    }

    pub fn run<const N: usize>(
        &mut self,
        context: &mut Context<N>,
        now: Instant,
    ) -> HousekeepingReport {
        let purged_sessions = context.transport.cleanup_stale(now);
        if purged_sessions > 0 {
            debug!("Purged {} stale transfers", purged_sessions);
        }

        let statistics = context.transport.pool_statistics();
        let peak_percent = statistics.peak_percent();
        info!(
            "Memory pool stats: capacity {} blocks, usage {} blocks, peak usage {} blocks ({}%)",
            statistics.capacity_blocks,
            statistics.current_usage_blocks,
            statistics.peak_usage_blocks,
            peak_percent
        );
        let pool_warning = peak_percent > context.config.pool_warning_percent;
        if pool_warning {
            warn!("Memory pool peak usage {}%, enlarge the pool", peak_percent);
        }

        let status_broadcast = self.broadcast_status(context, now);
        context.transport.reset_pool_peak();
        context
            .registers
            .set(map::MODE, Mode::Operational.into_u8());

        HousekeepingReport {
            purged_sessions,
            statistics,
            pool_warning,
            status_broadcast,
        }
    }

    fn broadcast_status<const N: usize>(
        &mut self,
        context: &mut Context<N>,
        now: Instant,
    ) -> Result<(), TxError> {
        let status = context.node_status(now);
        let mut buffer = [0; NodeStatus::SIZE_BYTES];
        let payload = unwrap!(status.serialize_to_slice(&mut buffer));
        let result = context.transport.broadcast(
            context.local_node_id(),
            Priority::LOWEST,
            DataTypeId::new(NodeStatus::ID),
            NodeStatus::SIGNATURE,
            self.transfer_id,
            payload,
        );
        match result {
            Ok(_) => {
                self.transfer_id = self.transfer_id.next();
                Ok(())
            }
            Err(err) => {
                warn!("Could not broadcast node status; error {:?}", err);
                Err(err)
            }
        }
    }
}
