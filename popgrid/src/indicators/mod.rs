//! Demographic indicators per district.
//!
//! Rows of the [`CombinedTable`] are grouped by `(country, district_id,
//! district)` and reduced to age-structure shares, sex ratio and dependency
//! ratio. Age bands outside the fixed child / working-age / elderly partition
//! count toward the total but toward no bin, so the three shares can sum to
//! less than 100 for unusual inputs.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::demography::{AgeBin, CountryCode, Sex};
use crate::zonal::CombinedTable;

/// Indicators for one district.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemographicIndicatorRow {
    pub country: CountryCode,
    pub district_id: String,
    pub district: String,
    pub total_population: f64,
    pub child_percentage: f64,
    pub working_age_percentage: f64,
    pub elderly_percentage: f64,
    /// Male / female; 0 when there is no female population
    pub sex_ratio: f64,
    /// (child + elderly) / working-age × 100; 0 when there is no working-age population
    pub dependency_ratio: f64,
    pub male_population: f64,
    pub female_population: f64,
}

/// `numerator / denominator × 100`, or 0 when the denominator is 0.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

#[derive(Debug, Default)]
struct Totals {
    total: f64,
    child: f64,
    working: f64,
    elderly: f64,
    male: f64,
    female: f64,
}

/// Compute one indicator row per district, in order of first appearance.
///
/// Districts with zero total population are emitted with every share at 0.
pub fn compute_indicators(table: &CombinedTable) -> Vec<DemographicIndicatorRow> {
    let mut index: HashMap<(&CountryCode, &str, &str), usize> = HashMap::new();
    let mut groups: Vec<((&CountryCode, &str, &str), Totals)> = Vec::new();

    for cell in table.cells() {
        let key = (&cell.country, cell.district_id.as_str(), cell.district.as_str());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push((key, Totals::default()));
            groups.len() - 1
        });
        let totals = &mut groups[slot].1;

        totals.total += cell.population;
        match cell.age_band.classify() {
            Some(AgeBin::Child) => totals.child += cell.population,
            Some(AgeBin::WorkingAge) => totals.working += cell.population,
            Some(AgeBin::Elderly) => totals.elderly += cell.population,
            None => {}
        }
        match cell.sex {
            Sex::Male => totals.male += cell.population,
            Sex::Female => totals.female += cell.population,
        }
    }

    debug!(districts = groups.len(), rows = table.len(), "Computed demographic indicators");

    groups
        .into_iter()
        .map(|((country, district_id, district), t)| DemographicIndicatorRow {
            country: country.clone(),
            district_id: district_id.to_string(),
            district: district.to_string(),
            total_population: t.total,
            child_percentage: percentage(t.child, t.total),
            working_age_percentage: percentage(t.working, t.total),
            elderly_percentage: percentage(t.elderly, t.total),
            sex_ratio: if t.female > 0.0 { t.male / t.female } else { 0.0 },
            dependency_ratio: percentage(t.child + t.elderly, t.working),
            male_population: t.male,
            female_population: t.female,
        })
        .collect()
}
