use crate::core::NodeId;
use crate::data_types::SoftwareVersion;
use crate::time::Duration;

/// Node configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Config {
    /// Node ID suggested to the allocator, `None` accepts any
    pub preferred_node_id: Option<NodeId>,
    /// Reported in GetNodeInfo responses
    pub software_version: SoftwareVersion,
    /// Reported in GetNodeInfo responses, at most 80 ASCII characters
    pub node_name: &'static str,
    /// Fixed part of the delay between allocation requests
    pub request_delay_offset: Duration,
    /// Upper bound of the random part of the delay between allocation requests
    pub random_timeout_range: Duration,
    /// Reassembly sessions idle for longer are purged
    pub stale_transfer_timeout: Duration,
    /// Peak pool usage above this percentage is reported
    pub pool_warning_percent: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_node_id: None,
            software_version: SoftwareVersion::new(1, 0),
            node_name: "org.uavnode.compass",
            request_delay_offset: Duration::from_millis(600),
            random_timeout_range: Duration::from_millis(400),
            stale_transfer_timeout: Duration::from_secs(2),
            pool_warning_percent: 70,
        }
    }
}
