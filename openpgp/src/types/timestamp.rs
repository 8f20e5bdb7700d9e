use std::convert::TryFrom;
use std::fmt;
use std::time::{SystemTime, Duration as SystemDuration, UNIX_EPOCH};

use crate::{
    Error,
    Result,
};

/// A timestamp representable by OpenPGP.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u32);

impl From<Timestamp> for u32 {
    fn from(t: Timestamp) -> Self {
        t.0
    }
}

impl From<u32> for Timestamp {
    fn from(t: u32) -> Self {
        Timestamp(t)
    }
}

impl TryFrom<SystemTime> for Timestamp {
    type Error = anyhow::Error;

    fn try_from(t: SystemTime) -> Result<Self> {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) if d.as_secs() <= std::u32::MAX as u64 =>
                Ok(Timestamp(d.as_secs() as u32)),
            _ => Err(Error::InvalidArgument(
                format!("Time exceeds u32 epoch: {:?}", t)).into()),
        }
    }
}

impl From<Timestamp> for SystemTime {
    fn from(t: Timestamp) -> Self {
        UNIX_EPOCH + SystemDuration::new(t.0 as u64, 0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Timestamp {
    /// Converts a `SystemTime` into a `Timestamp`, clamping times
    /// before the epoch to the epoch and times past 2106 to the
    /// largest representable timestamp.
    pub fn saturating_from(t: SystemTime) -> Timestamp {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) if d.as_secs() <= std::u32::MAX as u64 =>
                Timestamp(d.as_secs() as u32),
            Ok(_) => Timestamp(std::u32::MAX),
            Err(_) => Timestamp(0),
        }
    }

    /// Adds a duration to this timestamp.
    ///
    /// Returns `None` if the resulting timestamp is not
    /// representable.
    pub fn checked_add(&self, d: Duration) -> Option<Timestamp> {
        self.0.checked_add(d.0).map(Timestamp)
    }
}

/// A duration representable by OpenPGP.
///
/// Signature and key expiration subpackets express lifetimes as a
/// number of seconds.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(u32);

impl From<Duration> for u32 {
    fn from(d: Duration) -> Self {
        d.0
    }
}

impl From<u32> for Duration {
    fn from(d: u32) -> Self {
        Duration(d)
    }
}

impl From<Duration> for SystemDuration {
    fn from(d: Duration) -> Self {
        SystemDuration::new(d.0 as u64, 0)
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", SystemDuration::from(*self))
    }
}

impl Duration {
    /// Returns a `Duration` with the given number of seconds.
    pub const fn seconds(n: u32) -> Duration {
        Duration(n)
    }

    /// Returns a `Duration` with the given number of days, if
    /// representable.
    pub fn days(n: u32) -> Result<Duration> {
        n.checked_mul(24 * 60 * 60)
            .map(Duration)
            .ok_or_else(|| Error::InvalidArgument(
                format!("Not representable: {} days", n)).into())
    }

    /// Returns the duration as seconds.
    pub fn as_secs(self) -> u64 {
        self.0 as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    quickcheck! {
        fn systemtime_roundtrip(t: u32) -> bool {
            let st = SystemTime::from(Timestamp::from(t));
            Timestamp::try_from(st).unwrap() == Timestamp::from(t)
        }
    }

    #[test]
    fn saturating() {
        assert_eq!(Timestamp::saturating_from(UNIX_EPOCH), Timestamp::from(0));
        assert_eq!(Timestamp::saturating_from(
            UNIX_EPOCH + SystemDuration::new(1388534400, 0)),
                   Timestamp::from(1388534400));
        assert_eq!(Timestamp::saturating_from(
            UNIX_EPOCH + SystemDuration::new(1 << 40, 0)),
                   Timestamp::from(std::u32::MAX));
    }

    #[test]
    fn add() {
        let t = Timestamp::from(100);
        assert_eq!(t.checked_add(Duration::seconds(5)), Some(Timestamp::from(105)));
        assert_eq!(Timestamp::from(std::u32::MAX).checked_add(Duration::seconds(1)),
                   None);
        assert_eq!(Duration::days(2).unwrap(), Duration::seconds(172800));
        assert!(Duration::days(std::u32::MAX).is_err());
    }
}
