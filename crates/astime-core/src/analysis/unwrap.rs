use crate::TimestampSample;

/// Modulus of the 32-bit AVTP presentation time.
pub const TIMESTAMP_MODULUS: u64 = 1 << 32;

/// Turns the wrapping 32-bit presentation time into a monotonic 64-bit value.
///
/// The first timestamp only sets the baseline. Every later timestamp adds the
/// elapsed time since the previous one; when the raw value does not increase
/// exactly one wrap is assumed. Gaps spanning several wraps are under-counted.
///
/// # Examples
/// ```
/// use astime_core::TimestampUnwrapper;
///
/// let mut unwrapper = TimestampUnwrapper::new();
/// assert_eq!(unwrapper.push(u32::MAX - 9), None);
/// let sample = unwrapper.push(10).unwrap();
/// assert_eq!(sample.index, 1);
/// assert_eq!(sample.timestamp, u64::from(u32::MAX) + 11);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TimestampUnwrapper {
    previous: Option<u32>,
    accumulator: u64,
    consumed: u64,
}

impl TimestampUnwrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw timestamp; returns the sample to emit, if any.
    pub fn push(&mut self, raw: u32) -> Option<TimestampSample> {
        let sample = match self.previous {
            None => {
                self.accumulator = u64::from(raw);
                None
            }
            Some(previous) => {
                self.accumulator += wrapped_delta(previous, raw);
                Some(TimestampSample {
                    index: self.consumed,
                    timestamp: self.accumulator,
                })
            }
        };
        self.previous = Some(raw);
        self.consumed += 1;
        sample
    }

    /// Timestamps consumed so far, baseline included.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn accumulator(&self) -> Option<u64> {
        self.previous.map(|_| self.accumulator)
    }
}

fn wrapped_delta(previous: u32, current: u32) -> u64 {
    if current > previous {
        u64::from(current - previous)
    } else {
        u64::from(current) + TIMESTAMP_MODULUS - u64::from(previous)
    }
}

/// Outcome of checking one AVTP sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    First,
    InOrder,
    /// The number went down without restarting at zero.
    WrapError { last: u8, current: u8 },
    /// The number did not advance by exactly one.
    Gap { last: u8, current: u8 },
}

impl SequenceCheck {
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Self::WrapError { .. } | Self::Gap { .. })
    }
}

/// Advisory check of the 8-bit AVTP sequence number.
///
/// # Examples
/// ```
/// use astime_core::{SequenceCheck, SequenceTracker};
///
/// let mut tracker = SequenceTracker::default();
/// assert_eq!(tracker.check(254), SequenceCheck::First);
/// assert_eq!(tracker.check(255), SequenceCheck::InOrder);
/// assert_eq!(tracker.check(0), SequenceCheck::InOrder);
/// assert!(tracker.check(5).is_anomaly());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    last: Option<u8>,
}

impl SequenceTracker {
    pub fn check(&mut self, current: u8) -> SequenceCheck {
        let result = match self.last {
            None => SequenceCheck::First,
            Some(last) if current < last => {
                if current == 0 {
                    SequenceCheck::InOrder
                } else {
                    SequenceCheck::WrapError { last, current }
                }
            }
            Some(last) if current - last != 1 => SequenceCheck::Gap { last, current },
            Some(_) => SequenceCheck::InOrder,
        };
        self.last = Some(current);
        result
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}
