//! Combined population table and its tidy export form.

use serde::Serialize;

use super::types::{DistrictCell, ZonalSummary};
use crate::demography::{CountryCode, Sex};

/// Every [`DistrictCell`] of a run, flattened in unit order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedTable {
    cells: Vec<DistrictCell>,
}

/// One row of the visualization contract.
///
/// Age groups use the display encoding (`"80+"`, `"0-4"`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TidyRow {
    pub country: CountryCode,
    pub district: String,
    pub age_group: String,
    pub sex: Sex,
    pub population: f64,
}

impl CombinedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten aggregation results into one table. Empty input gives an empty table.
    pub fn combine<'a>(summaries: impl IntoIterator<Item = &'a ZonalSummary>) -> Self {
        Self {
            cells: summaries
                .into_iter()
                .flat_map(|summary| summary.cells.iter().cloned())
                .collect(),
        }
    }

    pub fn push(&mut self, cell: DistrictCell) {
        self.cells.push(cell);
    }

    pub fn extend(&mut self, cells: impl IntoIterator<Item = DistrictCell>) {
        self.cells.extend(cells);
    }

    pub fn cells(&self) -> &[DistrictCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn total_population(&self) -> f64 {
        self.cells.iter().map(|cell| cell.population).sum()
    }

    /// Rows for the visualization layer.
    pub fn to_tidy(&self) -> Vec<TidyRow> {
        self.cells
            .iter()
            .map(|cell| TidyRow {
                country: cell.country.clone(),
                district: cell.district.clone(),
                age_group: cell.age_band.display_label(),
                sex: cell.sex,
                population: cell.population,
            })
            .collect()
    }
}

impl FromIterator<DistrictCell> for CombinedTable {
    fn from_iter<I: IntoIterator<Item = DistrictCell>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demography::AgeBand;

    fn cell(district: &str, band: &str, population: f64) -> DistrictCell {
        DistrictCell {
            country: CountryCode::new("UGA").unwrap(),
            sex: Sex::Female,
            age_band: AgeBand::from_raw(band),
            district_id: format!("UGA.{}", district),
            district: district.to_string(),
            region: "Central".to_string(),
            population,
            pixel_count: 1,
        }
    }

    #[test]
    fn test_combine_empty_is_empty() {
        let table = CombinedTable::combine(std::iter::empty());
        assert!(table.is_empty());
        assert!(table.to_tidy().is_empty());
    }

    #[test]
    fn test_combine_preserves_order() {
        let a = ZonalSummary {
            cells: vec![cell("Kampala", "0_4", 10.0), cell("Wakiso", "0_4", 20.0)],
            skipped: Vec::new(),
        };
        let b = ZonalSummary {
            cells: vec![cell("Kampala", "80_plus", 1.5)],
            skipped: Vec::new(),
        };

        let table = CombinedTable::combine([&a, &b]);

        assert_eq!(table.len(), 3);
        assert_eq!(table.cells()[2].age_band.as_str(), "80_plus");
        assert_eq!(table.total_population(), 31.5);
    }

    #[test]
    fn test_tidy_uses_display_labels() {
        let table: CombinedTable = vec![cell("Kampala", "80_plus", 3.0), cell("Kampala", "0_4", 4.0)]
            .into_iter()
            .collect();

        let tidy = table.to_tidy();

        assert_eq!(tidy[0].age_group, "80+");
        assert_eq!(tidy[1].age_group, "0-4");
        assert_eq!(tidy[0].district, "Kampala");
        assert_eq!(tidy[0].sex, Sex::Female);
    }
}
