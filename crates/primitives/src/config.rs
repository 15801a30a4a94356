/// The inbox protocol configuration, read once from the inbox contract.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct InboxConfig {
    /// The size of the proposal ring buffer. Bounds how many trailing proposals must remain
    /// addressable.
    pub ring_buffer_size: u64,
    /// The minimum age in seconds of a transition record before it can be finalized.
    pub finalization_grace_period: u64,
    /// The maximum number of transitions finalized by a single proposal.
    pub max_finalization_count: u64,
}
