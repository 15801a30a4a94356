use alloy_sol_types::sol;
use rollup_node_primitives::InboxConfig;

sol! {
    /// The inbox configuration.
    #[derive(Debug)]
    struct Config {
        address bondToken;
        address checkpointManager;
        address proofVerifier;
        address proposerChecker;
        uint48 provingWindow;
        uint48 extendedProvingWindow;
        uint256 maxFinalizationCount;
        uint48 finalizationGracePeriod;
        uint256 ringBufferSize;
        uint8 basefeeSharingPctg;
        uint256 minForcedInclusionCount;
        uint64 forcedInclusionDelay;
        uint64 forcedInclusionFeeInGwei;
    }

    /// Returns the inbox configuration.
    function getConfig() external view returns (Config memory config_);
}

impl From<Config> for InboxConfig {
    fn from(value: Config) -> Self {
        Self {
            ring_buffer_size: value.ringBufferSize.saturating_to(),
            finalization_grace_period: value.finalizationGracePeriod.to(),
            max_finalization_count: value.maxFinalizationCount.saturating_to(),
        }
    }
}
