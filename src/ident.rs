use std::time::{SystemTime, UNIX_EPOCH};
use time::{Date, OffsetDateTime};

pub const TRANSACTION_PREFIX: &str = "4200002564";
/// Suffixes are drawn from `0..SUFFIX_RANGE` and printed with five digits.
pub const SUFFIX_RANGE: u32 = 99_999;

/// Source of the random tail of a transaction id.
pub trait IdGenerator {
    fn next_suffix(&mut self) -> u32;
}

pub trait Clock {
    fn today(&self) -> Date;
    fn unix_millis(&self) -> i64;
}

/// Local wall clock, falling back to UTC when the offset cannot be read.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Date {
        OffsetDateTime::now_local()
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
            .date()
    }

    fn unix_millis(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// Hashes the current time and a call counter into a suffix.
#[derive(Debug, Default)]
pub struct HashedIdGenerator {
    counter: u64,
}

impl IdGenerator for HashedIdGenerator {
    fn next_suffix(&mut self) -> u32 {
        self.counter = self.counter.wrapping_add(1);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let digest = md5::compute(format!("{}:{}", nanos, self.counter));
        let value = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        value % SUFFIX_RANGE
    }
}

pub fn compact_date(date: Date) -> String {
    format!(
        "{:04}{:02}{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// `2024年01月15日`
pub fn display_date(date: Date) -> String {
    format!(
        "{:04}年{:02}月{:02}日",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn transaction_id(date: Date, suffix: u32) -> String {
    format!(
        "{}{}{:05}",
        TRANSACTION_PREFIX,
        compact_date(date),
        suffix % SUFFIX_RANGE
    )
}
