use crate::error::{Error, Result};
use derive_more::Display;

/// Default values for configuration.
pub mod defaults {
    use crate::config::TimestampPrecision;

    /// The default value for `snaplen`.
    pub const DEFAULT_SNAPLEN: u32 = 65535;

    /// The default value for `buffer-capacity`.
    pub const DEFAULT_BUFFER_CAPACITY: usize = 65536;

    /// The default value for `precision`.
    pub const DEFAULT_PRECISION: TimestampPrecision = TimestampPrecision::Micro;
}

/// The minimum read buffer capacity, enough for the global header of a pcap file.
const MIN_BUFFER_CAPACITY: usize = 24;

/// The resolution of the timestamps of a pcap file.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum TimestampPrecision {
    #[display("microsecond")]
    Micro,
    #[display("nanosecond")]
    Nano,
}

impl TimestampPrecision {
    /// The magic number of a pcap file with this precision.
    #[must_use]
    pub const fn magic(self) -> u32 {
        match self {
            Self::Micro => 0xa1b2_c3d4,
            Self::Nano => 0xa1b2_3c4d,
        }
    }

    /// The number of nanoseconds in one unit of the fractional timestamp field.
    #[must_use]
    pub const fn unit_nanos(self) -> u32 {
        match self {
            Self::Micro => 1_000,
            Self::Nano => 1,
        }
    }
}

/// Pcap file configuration.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PcapConfig {
    /// The maximum number of bytes of each frame written.
    pub snaplen: u32,
    /// The size of the read buffer, which must hold the largest record of a file.
    pub buffer_capacity: usize,
    /// The timestamp precision of files written.
    pub precision: TimestampPrecision,
}

impl PcapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.snaplen == 0 {
            return Err(Error::BadConfig(String::from("snaplen must be positive")));
        }
        if self.buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(Error::BadConfig(format!(
                "buffer-capacity ({}) must be at least {MIN_BUFFER_CAPACITY}",
                self.buffer_capacity
            )));
        }
        Ok(())
    }
}

impl Default for PcapConfig {
    fn default() -> Self {
        Self {
            snaplen: defaults::DEFAULT_SNAPLEN,
            buffer_capacity: defaults::DEFAULT_BUFFER_CAPACITY,
            precision: defaults::DEFAULT_PRECISION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PcapConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_snaplen() {
        let config = PcapConfig {
            snaplen: 0,
            ..PcapConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!("invalid config: snaplen must be positive", err.to_string());
    }

    #[test]
    fn test_small_buffer() {
        let config = PcapConfig {
            buffer_capacity: 16,
            ..PcapConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::BadConfig(_))));
    }

    #[test]
    fn test_precision_display() {
        assert_eq!("microsecond", TimestampPrecision::Micro.to_string());
        assert_eq!("nanosecond", TimestampPrecision::Nano.to_string());
    }
}
