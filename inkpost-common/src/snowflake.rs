//! Time-ordered 64 bit ids.
//!
//! From the most significant bit down, a snowflake holds 42 bits of milliseconds since the
//! epoch, a 5 bit worker id, a 5 bit process id and a 12 bit increment. Ids generated by one
//! [`SnowflakeGenerator`] sort by creation time.

use derive_where::derive_where;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_LENGTH: u32 = 42;
pub const WORKER_ID_LENGTH: u32 = 5;
pub const PROCESS_ID_LENGTH: u32 = 5;
pub const INCREMENT_LENGTH: u32 = 12;

pub const INCREMENT_OFFSET: u32 = 0;
pub const PROCESS_ID_OFFSET: u32 = INCREMENT_OFFSET + INCREMENT_LENGTH;
pub const WORKER_ID_OFFSET: u32 = PROCESS_ID_OFFSET + PROCESS_ID_LENGTH;
pub const TIMESTAMP_OFFSET: u32 = WORKER_ID_OFFSET + WORKER_ID_LENGTH;

const fn low_bits(length: u32) -> u64 {
    (1 << length) - 1
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimeError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("{name} out of range: {value}")]
pub struct SnowflakePartOutOfRangeError {
    name: &'static str,
    value: u8,
}

/// Identifies the machine a generator runs on.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkerId(u8);

/// Identifies the process on a worker.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct ProcessId(u8);

impl WorkerId {
    #[must_use]
    pub fn new(id: u8) -> Option<Self> {
        (u64::from(id) <= low_bits(WORKER_ID_LENGTH)).then_some(Self(id))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl ProcessId {
    #[must_use]
    pub fn new(id: u8) -> Option<Self> {
        (u64::from(id) <= low_bits(PROCESS_ID_LENGTH)).then_some(Self(id))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for WorkerId {
    type Error = SnowflakePartOutOfRangeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(SnowflakePartOutOfRangeError {
            name: "WorkerId",
            value,
        })
    }
}

impl TryFrom<u8> for ProcessId {
    type Error = SnowflakePartOutOfRangeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(SnowflakePartOutOfRangeError {
            name: "ProcessId",
            value,
        })
    }
}

impl<'de> Deserialize<'de> for WorkerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = u8::deserialize(deserializer)?;
        Self::new(inner)
            .ok_or_else(|| Error::invalid_value(Unexpected::Unsigned(inner.into()), &"WorkerId"))
    }
}

impl<'de> Deserialize<'de> for ProcessId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = u8::deserialize(deserializer)?;
        Self::new(inner)
            .ok_or_else(|| Error::invalid_value(Unexpected::Unsigned(inner.into()), &"ProcessId"))
    }
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    /// Packs the parts into a snowflake. Bits of `millis` and `increment` beyond their field
    /// width are discarded.
    #[must_use]
    pub fn from_parts(millis: u64, worker_id: WorkerId, process_id: ProcessId, increment: u16) -> Self {
        let snowflake = (millis & low_bits(TIMESTAMP_LENGTH)) << TIMESTAMP_OFFSET
            | u64::from(worker_id.get()) << WORKER_ID_OFFSET
            | u64::from(process_id.get()) << PROCESS_ID_OFFSET
            | (u64::from(increment) & low_bits(INCREMENT_LENGTH)) << INCREMENT_OFFSET;

        Self::new(snowflake)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Milliseconds since the epoch.
    #[must_use]
    pub fn millis(self) -> u64 {
        self.0 >> TIMESTAMP_OFFSET & low_bits(TIMESTAMP_LENGTH)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn worker_id(self) -> WorkerId {
        WorkerId((self.0 >> WORKER_ID_OFFSET & low_bits(WORKER_ID_LENGTH)) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn process_id(self) -> ProcessId {
        ProcessId((self.0 >> PROCESS_ID_OFFSET & low_bits(PROCESS_ID_LENGTH)) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn increment(self) -> u16 {
        (self.0 >> INCREMENT_OFFSET & low_bits(INCREMENT_LENGTH)) as u16
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        // 42 bits of milliseconds always fit in an i64.
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(self.millis().cast_signed())
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

/// Milliseconds between the epoch and `time`, if they fit the timestamp field.
pub fn millis_since_epoch<SnowflakeEpoch: Epoch>(
    time: UtcDateTime,
) -> Result<u64, SnowflakeTimeError> {
    let millis = (time - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
    if millis < 0 {
        return Err(SnowflakeTimeError::TimeBeforeEpoch);
    }

    u64::try_from(millis)
        .ok()
        .filter(|&millis| millis <= low_bits(TIMESTAMP_LENGTH))
        .ok_or(SnowflakeTimeError::TimestampTooLarge)
}

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    worker_id: WorkerId,
    process_id: ProcessId,
    next_increment: u16,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            worker_id,
            process_id,
            next_increment: 0,
            phantom_data: PhantomData,
        }
    }

    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        let millis = millis_since_epoch::<SnowflakeEpoch>(time)?;

        let increment = self.next_increment;
        // The increment wraps at its field width.
        self.next_increment = (increment + 1) & 0x0FFF;

        Ok(Snowflake::from_parts(
            millis,
            self.worker_id,
            self.process_id,
            increment,
        ))
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        self.generate_at(UtcDateTime::now())
    }
}

#[cfg(test)]
mod tests {
    use crate::snowflake::{
        Epoch, ProcessId, Snowflake, SnowflakeGenerator, SnowflakeTimeError, WorkerId,
        millis_since_epoch,
    };
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    struct MillennialEpoch;
    impl Epoch for MillennialEpoch {
        const EPOCH_TIME: UtcDateTime = utc_datetime!(2000-1-1 00:00);
    }

    #[test]
    fn worker_and_process_ids_are_five_bits() {
        for legal_id in [0, 0xD, 0x1F] {
            assert!(WorkerId::new(legal_id).is_some());
            assert!(ProcessId::new(legal_id).is_some());
        }
        for illegal_id in [0x20, 0xF0, u8::MAX] {
            assert!(WorkerId::new(illegal_id).is_none());
            assert!(ProcessId::try_from(illegal_id).is_err());
        }
    }

    #[test]
    fn epoch_bounds() {
        assert_eq!(
            millis_since_epoch::<MillennialEpoch>(MillennialEpoch::EPOCH_TIME),
            Ok(0)
        );
        assert_eq!(
            millis_since_epoch::<MillennialEpoch>(
                MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x03FF_FFFF_FFFF)
            ),
            Ok(0x03FF_FFFF_FFFF)
        );
        assert_eq!(
            millis_since_epoch::<MillennialEpoch>(
                MillennialEpoch::EPOCH_TIME - Duration::milliseconds(1)
            ),
            Err(SnowflakeTimeError::TimeBeforeEpoch)
        );
        assert_eq!(
            millis_since_epoch::<MillennialEpoch>(
                MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x0400_0000_0000)
            ),
            Err(SnowflakeTimeError::TimestampTooLarge)
        );
    }

    #[test]
    fn snowflake_from_into_parts() {
        let time = utc_datetime!(2025-10-24 10:30);
        let millis = millis_since_epoch::<MillennialEpoch>(time).unwrap();
        let worker_id = WorkerId::new(0b10101).unwrap();
        let process_id = ProcessId::new(0b10001).unwrap();

        let snowflake = Snowflake::<MillennialEpoch>::from_parts(millis, worker_id, process_id, 100);

        assert_eq!(snowflake.get(), 3_416_751_341_570_822_244);
        assert_eq!(snowflake.millis(), millis);
        assert_eq!(snowflake.worker_id(), worker_id);
        assert_eq!(snowflake.process_id(), process_id);
        assert_eq!(snowflake.increment(), 100);
        assert_eq!(snowflake.created_at(), time);
    }

    #[test]
    fn generator_increments_and_wraps() {
        let worker_id = WorkerId::new(10).unwrap();
        let process_id = ProcessId::new(0).unwrap();
        let time = utc_datetime!(2025-10-24 10:55);

        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(worker_id, process_id);

        let first = generator.generate_at(time).unwrap();
        let second = generator.generate_at(time).unwrap();
        assert_eq!(first.increment(), 0);
        assert_eq!(second.increment(), 1);
        assert!(first < second);

        for _ in 2..0x1000 {
            generator.generate_at(time).unwrap();
        }
        assert_eq!(generator.generate_at(time).unwrap().increment(), 0);
    }

    #[test]
    fn generator_rejects_time_before_epoch() {
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::default();

        assert_eq!(
            generator.generate_at(utc_datetime!(1999-12-31 23:59)),
            Err(SnowflakeTimeError::TimeBeforeEpoch)
        );
    }
}
