//! Raw simulator output tables.
//!
//! The simulator writes one CSV per grid point: one row per simulated day,
//! one column per `(compartment, city, age)` triple named `I_<city>_<age>` or
//! `I2_<city>_<age>`. The header is parsed once into typed [`ColumnKey`]s so
//! the aggregation stage never touches column-name strings.

use anyhow::{Context, Result, bail};
use std::io::Read;
use std::path::Path;

/// Infectious compartments tracked by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Compartment {
    I,
    I2,
}

/// Typed identity of one infection column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub compartment: Compartment,
    pub city: usize,
    pub age: usize,
}

impl ColumnKey {
    /// Parses `I_<city>_<age>` / `I2_<city>_<age>`. Returns `None` for any
    /// other column (day index, susceptible/exposed compartments, ...).
    fn parse(name: &str) -> Option<Self> {
        let mut parts = name.split('_');
        let compartment = match parts.next()? {
            "I" => Compartment::I,
            "I2" => Compartment::I2,
            _ => return None,
        };
        let city = parts.next()?.parse().ok()?;
        let age = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(ColumnKey { compartment, city, age })
    }
}

/// One simulator run's output, reduced to its infection columns.
#[derive(Debug)]
pub struct RawSimulationTable {
    columns: Vec<(ColumnKey, Vec<f64>)>,
    days: usize,
}

impl RawSimulationTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening raw table {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("reading raw table {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);

        let headers = rdr.headers()?.clone();
        // (record position, key) for the infection columns only
        let keyed: Vec<(usize, ColumnKey)> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, name)| ColumnKey::parse(name).map(|key| (i, key)))
            .collect();
        if keyed.is_empty() {
            bail!("no infection columns (I_*/I2_*) found in table header");
        }

        let mut columns: Vec<(ColumnKey, Vec<f64>)> =
            keyed.iter().map(|(_, key)| (*key, Vec::new())).collect();

        let mut days = 0;
        for record in rdr.records() {
            let record = record?;
            for (slot, (i, _)) in keyed.iter().enumerate() {
                let cell = record
                    .get(*i)
                    .with_context(|| format!("row {days} shorter than header"))?;
                let value: f64 = cell
                    .trim()
                    .parse()
                    .with_context(|| format!("non-numeric cell {cell:?} at row {days}"))?;
                columns[slot].1.push(value);
            }
            days += 1;
        }

        Ok(RawSimulationTable { columns, days })
    }

    /// Number of simulated days (rows).
    pub fn days(&self) -> usize {
        self.days
    }

    pub fn columns(&self) -> &[(ColumnKey, Vec<f64>)] {
        &self.columns
    }
}
