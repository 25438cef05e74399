//! Per-unit result arena.
//!
//! Batch operations over the country × sex × age-band space return a flat
//! list of `(UnitKey, result)` records in request order instead of a nested
//! map. Lookups by component are linear scans, which is fine at this scale.

use rayon::prelude::*;
use tracing::warn;

use crate::demography::{AgeBand, CountryCode, Sex, UnitKey};

/// Results of a batch operation, one record per requested unit.
#[derive(Debug, Clone)]
pub struct BatchResults<T> {
    entries: Vec<(UnitKey, T)>,
}

impl<T> BatchResults<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, unit: UnitKey, value: T) {
        self.entries.push((unit, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, unit: &UnitKey) -> Option<&T> {
        self.entries
            .iter()
            .find(|(key, _)| key == unit)
            .map(|(_, value)| value)
    }

    /// Lookup by components, mirroring `results[country][sex][age_band]`.
    pub fn get_by(&self, country: &CountryCode, sex: Sex, age_band: &AgeBand) -> Option<&T> {
        self.entries
            .iter()
            .find(|(key, _)| &key.country == country && key.sex == sex && &key.age_band == age_band)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UnitKey, &T)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitKey> {
        self.entries.iter().map(|(key, _)| key)
    }

    /// Records belonging to one country, in order.
    pub fn for_country<'a>(
        &'a self,
        country: &'a CountryCode,
    ) -> impl Iterator<Item = (&'a UnitKey, &'a T)> + 'a {
        self.iter().filter(move |(key, _)| &key.country == country)
    }

    pub fn map<U>(self, mut f: impl FnMut(&UnitKey, T) -> U) -> BatchResults<U> {
        BatchResults {
            entries: self
                .entries
                .into_iter()
                .map(|(key, value)| {
                    let mapped = f(&key, value);
                    (key, mapped)
                })
                .collect(),
        }
    }
}

impl<T, E> BatchResults<Result<T, E>> {
    pub fn successes(&self) -> impl Iterator<Item = (&UnitKey, &T)> {
        self.iter()
            .filter_map(|(key, result)| result.as_ref().ok().map(|value| (key, value)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&UnitKey, &E)> {
        self.iter()
            .filter_map(|(key, result)| result.as_ref().err().map(|err| (key, err)))
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

impl<T> Default for BatchResults<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(UnitKey, T)> for BatchResults<T> {
    fn from_iter<I: IntoIterator<Item = (UnitKey, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for BatchResults<T> {
    type Item = (UnitKey, T);
    type IntoIter = std::vec::IntoIter<(UnitKey, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Run `f` for every unit, sequentially or on a pool of `workers` threads.
///
/// Output order always matches `units`. A unit's result never affects another.
pub fn run_units<T, F>(units: &[UnitKey], workers: usize, f: F) -> BatchResults<T>
where
    T: Send,
    F: Fn(&UnitKey) -> T + Sync,
{
    if workers <= 1 || units.len() <= 1 {
        return units.iter().map(|unit| (unit.clone(), f(unit))).collect();
    }

    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(|| {
            units
                .par_iter()
                .map(|unit| (unit.clone(), f(unit)))
                .collect::<Vec<_>>()
                .into_iter()
                .collect()
        }),
        Err(e) => {
            warn!(workers = workers, error = %e, "Failed to build worker pool, running sequentially");
            units.iter().map(|unit| (unit.clone(), f(unit))).collect()
        }
    }
}
