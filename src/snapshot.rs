use std::fmt;

use jiff::Zoned;
use serde::{de, Deserialize, Deserializer, Serialize};

/// Name of the synthetic station holding the sum over one scrape.
pub const TOTALS_NAME: &str = "Totals";

/// Largest counter an `INT` column holds.
pub const MAX_COUNT: u32 = i32::MAX as u32;

fn counter<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = u32::deserialize(deserializer)?;
    if value > MAX_COUNT {
        return Err(de::Error::custom(format!(
            "counter {} is larger than {}",
            value, MAX_COUNT
        )));
    }
    Ok(value)
}

/// Occupancy counters of one station, as returned by the `/stations/stations`
/// endpoint.  The scrape time is not part of the feed, it gets attached
/// when the row is written to the archive.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StationSnapshot {
    #[serde(deserialize_with = "counter")]
    pub max_extra_bikes: u32,
    #[serde(deserialize_with = "counter")]
    pub stocking_full: u32,
    pub name: String,
    #[serde(deserialize_with = "counter")]
    pub primary_locked_cycle_count: u32,
    #[serde(deserialize_with = "counter")]
    pub stocking_low: u32,
    #[serde(deserialize_with = "counter")]
    pub total_locked_cycle_count: u32,
    #[serde(deserialize_with = "counter")]
    pub free_dockes: u32,
    #[serde(deserialize_with = "counter")]
    pub free_spaces: u32,
}

/// The numeric columns of a [StationSnapshot], in table order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    MaxExtraBikes,
    StockingFull,
    PrimaryLockedCycleCount,
    StockingLow,
    TotalLockedCycleCount,
    FreeDockes,
    FreeSpaces,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::MaxExtraBikes,
        Field::StockingFull,
        Field::PrimaryLockedCycleCount,
        Field::StockingLow,
        Field::TotalLockedCycleCount,
        Field::FreeDockes,
        Field::FreeSpaces,
    ];

    /// Column name, same as the json key
    pub fn name(&self) -> &'static str {
        match self {
            Field::MaxExtraBikes => "max_extra_bikes",
            Field::StockingFull => "stocking_full",
            Field::PrimaryLockedCycleCount => "primary_locked_cycle_count",
            Field::StockingLow => "stocking_low",
            Field::TotalLockedCycleCount => "total_locked_cycle_count",
            Field::FreeDockes => "free_dockes",
            Field::FreeSpaces => "free_spaces",
        }
    }

    pub fn value(&self, snapshot: &StationSnapshot) -> u32 {
        match self {
            Field::MaxExtraBikes => snapshot.max_extra_bikes,
            Field::StockingFull => snapshot.stocking_full,
            Field::PrimaryLockedCycleCount => snapshot.primary_locked_cycle_count,
            Field::StockingLow => snapshot.stocking_low,
            Field::TotalLockedCycleCount => snapshot.total_locked_cycle_count,
            Field::FreeDockes => snapshot.free_dockes,
            Field::FreeSpaces => snapshot.free_spaces,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running sum of the numeric fields over the stations of one scrape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals([u64; 7]);

impl Totals {
    pub fn new() -> Totals {
        Totals::default()
    }

    /// Add the counters of one station.  The station name plays no role.
    pub fn accumulate(self, snapshot: &StationSnapshot) -> Totals {
        let mut sums = self.0;
        for field in Field::ALL {
            sums[field.index()] += u64::from(field.value(snapshot));
        }
        Totals(sums)
    }

    pub fn get(&self, field: Field) -> u64 {
        self.0[field.index()]
    }

    /// The row written to the archive under the name `Totals`.
    /// Sums larger than [MAX_COUNT] are capped.
    pub fn to_snapshot(&self) -> StationSnapshot {
        let v = |field: Field| self.get(field).min(u64::from(MAX_COUNT)) as u32;
        StationSnapshot {
            max_extra_bikes: v(Field::MaxExtraBikes),
            stocking_full: v(Field::StockingFull),
            name: TOTALS_NAME.to_string(),
            primary_locked_cycle_count: v(Field::PrimaryLockedCycleCount),
            stocking_low: v(Field::StockingLow),
            total_locked_cycle_count: v(Field::TotalLockedCycleCount),
            free_dockes: v(Field::FreeDockes),
            free_spaces: v(Field::FreeSpaces),
        }
    }
}

impl<'a> FromIterator<&'a StationSnapshot> for Totals {
    fn from_iter<I: IntoIterator<Item = &'a StationSnapshot>>(iter: I) -> Self {
        iter.into_iter().fold(Totals::new(), Totals::accumulate)
    }
}

/// One point of a station history, in local time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Observation {
    pub zoned: Zoned,
    pub total_locked_cycle_count: u32,
}

/// Keep only the letters, digits and spaces of a station name so it can be
/// used as a file name.  Trailing whitespace is removed.
pub fn safe_filename(name: &str) -> String {
    let s: String = name
        .chars()
        .filter(|c| (c.is_alphabetic() && !c.is_numeric()) || c.is_ascii_digit() || *c == ' ')
        .collect();
    s.trim_end().to_string()
}
