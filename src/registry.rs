//! City-to-county membership, loaded from the network's population file.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

/// Locale-specific county aliases, normalized to the ground-truth naming at
/// load time so lookups never see them.
const COUNTY_ALIASES: &[(&str, &str)] = &[("főváros", "Budapest")];

#[derive(Debug, Deserialize)]
struct PopulationEntry {
    index: usize,
    city: String,
    admin_municip: String,
    admin_county: String,
}

#[derive(Debug, Deserialize)]
struct PopulationFile {
    populations: Vec<PopulationEntry>,
}

/// One city node of the simulated network.
#[derive(Debug, Clone)]
pub struct CityRecord {
    pub index: usize,
    pub city: String,
    pub municipality: String,
    pub county: String,
}

/// Mapping from city index to municipality and county, built once per run.
#[derive(Debug)]
pub struct PopulationRegistry {
    cities: HashMap<usize, CityRecord>,
    // county -> sorted member city indices; BTreeMap for deterministic order
    counties: BTreeMap<String, Vec<usize>>,
}

fn normalize_county(name: &str) -> &str {
    COUNTY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

impl PopulationRegistry {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening population file {}", path.display()))?;
        Self::from_reader(file)
            .with_context(|| format!("reading population file {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let parsed: PopulationFile = serde_json::from_reader(reader)?;
        if parsed.populations.is_empty() {
            bail!("population file contains no cities");
        }

        let mut cities = HashMap::new();
        let mut counties: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for entry in parsed.populations {
            let county = normalize_county(&entry.admin_county).to_string();
            counties.entry(county.clone()).or_default().push(entry.index);
            let previous = cities.insert(
                entry.index,
                CityRecord {
                    index: entry.index,
                    city: entry.city,
                    municipality: entry.admin_municip,
                    county,
                },
            );
            if let Some(previous) = previous {
                bail!("city index {} appears twice in the population file", previous.index);
            }
        }
        for members in counties.values_mut() {
            members.sort_unstable();
        }

        Ok(PopulationRegistry { cities, counties })
    }

    /// Number of city nodes in the network.
    pub fn network_size(&self) -> usize {
        self.cities.len()
    }

    pub fn city(&self, index: usize) -> Option<&CityRecord> {
        self.cities.get(&index)
    }

    /// County of a city index, after alias normalization.
    pub fn county_of(&self, index: usize) -> Option<&str> {
        self.cities.get(&index).map(|record| record.county.as_str())
    }

    /// Counties with their member city indices, in county-name order.
    pub fn counties(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.counties
            .iter()
            .map(|(name, members)| (name.as_str(), members.as_slice()))
    }
}
