/// Size of the register window the stub claims on the MMIO bus.
pub const DEFAULT_WINDOW_SIZE: u64 = 0x100;
pub const DEFAULT_DEVICE_NAME: &str = "mmio-stub";
pub const DEFAULT_LISTENER_NAME: &str = "mmio-stub-master";

/// What the reverse listener sends back when a peer READ hits a failing address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFailurePolicy {
    /// Zero-filled payload, no failure signal.
    #[default]
    ZeroFill,
    /// Payload (zero-filled on failure) followed by one status byte.
    /// The peer must be built to expect the extra byte.
    TrailingStatus,
}

/// What a forward write does when the peer answers with a failure status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteFailurePolicy {
    /// Log it; the access completes as if it succeeded.
    #[default]
    Ignore,
    /// Report `MmioError::DeviceError` back to the bus.
    Fault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubConfig {
    pub window_size: u64,
    pub name: String,
    pub listener_name: String,
    pub read_failure: ReadFailurePolicy,
    pub write_failure: WriteFailurePolicy,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            name: DEFAULT_DEVICE_NAME.to_string(),
            listener_name: DEFAULT_LISTENER_NAME.to_string(),
            read_failure: ReadFailurePolicy::default(),
            write_failure: WriteFailurePolicy::default(),
        }
    }
}

impl StubConfig {
    pub fn window_size(mut self, size: u64) -> Self {
        self.window_size = size;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn listener_name(mut self, name: impl Into<String>) -> Self {
        self.listener_name = name.into();
        self
    }

    pub fn read_failure(mut self, policy: ReadFailurePolicy) -> Self {
        self.read_failure = policy;
        self
    }

    pub fn write_failure(mut self, policy: WriteFailurePolicy) -> Self {
        self.write_failure = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_preserve_legacy_behavior() {
        let config = StubConfig::default();
        assert_eq!(config.window_size, 0x100);
        assert_eq!(config.read_failure, ReadFailurePolicy::ZeroFill);
        assert_eq!(config.write_failure, WriteFailurePolicy::Ignore);
    }

    #[test]
    fn test_builder_setters() {
        let config = StubConfig::default()
            .window_size(0x1000)
            .name("stub0")
            .write_failure(WriteFailurePolicy::Fault);
        assert_eq!(config.window_size, 0x1000);
        assert_eq!(config.name, "stub0");
        assert_eq!(config.listener_name, DEFAULT_LISTENER_NAME);
        assert_eq!(config.write_failure, WriteFailurePolicy::Fault);
    }
}
