//! Spatial aggregation of raw simulator output.
//!
//! Folds per-city, per-age infection columns into county-level, age-level
//! and whole-population daily curves. Both infectious compartments are
//! summed together.

use anyhow::{Result, bail};
use tracing::warn;

use crate::registry::PopulationRegistry;
use crate::table::RawSimulationTable;

/// Aggregated curves for one simulated grid point.
#[derive(Debug)]
pub struct AggregatedCurves {
    /// County name -> per-day infection counts, in county-name order.
    pub counties: Vec<(String, Vec<f64>)>,
    /// Per-age-group curves, indexed by age group.
    pub ages: Vec<Vec<f64>>,
    /// Whole-population curve (sum over every infection column).
    pub national: Vec<f64>,
    /// Death-rate-weighted national curve.
    pub deaths: Vec<f64>,
    /// Counties whose city list resolved to zero columns; their curves are
    /// all-zero and downstream consumers can treat them as data gaps.
    pub empty_counties: Vec<String>,
}

fn add_into(accumulator: &mut [f64], series: &[f64]) {
    for (acc, value) in accumulator.iter_mut().zip(series) {
        *acc += value;
    }
}

/// Aggregates one raw table against the population registry.
///
/// A city index present in the table but missing from the registry means the
/// simulator ran against a different network configuration; that is an error
/// for this grid point, not a soft skip.
pub fn aggregate(
    table: &RawSimulationTable,
    registry: &PopulationRegistry,
    age_groups: usize,
    death_rate: &[f64],
) -> Result<AggregatedCurves> {
    if death_rate.len() != age_groups {
        bail!(
            "death_rate has {} entries but age_groups is {age_groups}",
            death_rate.len()
        );
    }
    let days = table.days();

    let mut counties: Vec<(String, Vec<f64>)> = registry
        .counties()
        .map(|(name, _)| (name.to_string(), vec![0.0; days]))
        .collect();
    let mut column_counts = vec![0usize; counties.len()];
    let mut ages = vec![vec![0.0; days]; age_groups];
    let mut national = vec![0.0; days];
    let mut deaths = vec![0.0; days];

    for (key, series) in table.columns() {
        let Some(county) = registry.county_of(key.city) else {
            bail!(
                "city index {} has no registry entry (network size {})",
                key.city,
                registry.network_size()
            );
        };
        if key.age >= age_groups {
            bail!("age group {} out of range (configured {age_groups})", key.age);
        }
        let slot = counties
            .binary_search_by(|(name, _)| name.as_str().cmp(county))
            .unwrap_or_else(|_| unreachable!());
        add_into(&mut counties[slot].1, series);
        column_counts[slot] += 1;
        add_into(&mut ages[key.age], series);
        add_into(&mut national, series);
        let rate = death_rate[key.age];
        for (acc, value) in deaths.iter_mut().zip(series) {
            *acc += rate * value;
        }
    }

    let empty_counties: Vec<String> = counties
        .iter()
        .zip(&column_counts)
        .filter(|(_, count)| **count == 0)
        .map(|((name, _), _)| name.clone())
        .collect();
    for county in &empty_counties {
        warn!(county, "county has no infection columns, emitting zero curve");
    }

    Ok(AggregatedCurves { counties, ages, national, deaths, empty_counties })
}
