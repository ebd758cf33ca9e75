use crate::config::{PayloadTracking, StreamConfig};
use crate::error::{Error, Result};
use crate::follower::StreamFollower;

/// Build a stream follower.
///
/// # Examples
///
/// ```
/// # fn main() -> anyhow::Result<()> {
/// use pdukit_stream::{Builder, PayloadTracking};
///
/// let follower = Builder::new()
///     .max_streams(128)
///     .track_payload(PayloadTracking::Disabled)
///     .build()?;
/// assert!(follower.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    config: StreamConfig,
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of out-of-order bytes held per direction of a stream.
    #[must_use]
    pub fn max_buffered_bytes(self, max_buffered_bytes: usize) -> Self {
        Self {
            config: StreamConfig {
                max_buffered_bytes,
                ..self.config
            },
        }
    }

    /// Set the maximum number of streams tracked at once.
    ///
    /// New streams beyond this are ignored until a tracked stream finishes.
    #[must_use]
    pub fn max_streams(self, max_streams: usize) -> Self {
        Self {
            config: StreamConfig {
                max_streams,
                ..self.config
            },
        }
    }

    #[must_use]
    pub fn track_payload(self, track_payload: PayloadTracking) -> Self {
        Self {
            config: StreamConfig {
                track_payload,
                ..self.config
            },
        }
    }

    /// Build the [`StreamFollower`].
    pub fn build(self) -> Result<StreamFollower> {
        if self.config.max_streams == 0 {
            return Err(Error::BadConfig(String::from("max_streams must be positive")));
        }
        Ok(StreamFollower::new(self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults;

    #[test]
    fn test_defaults() {
        let follower = Builder::new().build().unwrap();
        assert_eq!(defaults::DEFAULT_MAX_STREAMS, follower.config().max_streams);
        assert_eq!(
            defaults::DEFAULT_MAX_BUFFERED_BYTES,
            follower.config().max_buffered_bytes
        );
        assert!(follower.config().track_payload.is_enabled());
    }

    #[test]
    fn test_overrides() {
        let follower = Builder::new()
            .max_buffered_bytes(0)
            .max_streams(3)
            .track_payload(PayloadTracking::Disabled)
            .build()
            .unwrap();
        let expected = StreamConfig {
            max_buffered_bytes: 0,
            max_streams: 3,
            track_payload: PayloadTracking::Disabled,
        };
        assert_eq!(&expected, follower.config());
    }

    #[test]
    fn test_zero_streams_rejected() {
        let err = Builder::new().max_streams(0).build().unwrap_err();
        assert_eq!("invalid config: max_streams must be positive", err.to_string());
    }
}
