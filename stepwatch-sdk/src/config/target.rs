//! Target-side configuration.

/// Sizing for the channels between controller and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetConfig {
    /// Buffer of the candidate event and command channels.
    pub channel_buffer: usize,
}

impl TargetConfig {
    pub const DEFAULT_CHANNEL_BUFFER: usize = 256;
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            channel_buffer: Self::DEFAULT_CHANNEL_BUFFER,
        }
    }
}
