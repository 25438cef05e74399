//! District-level zonal aggregation.
//!
//! A grid cell belongs to a district when its center lies inside the district
//! polygon or on its outline. Valid cells (not nodata, not NaN) are summed per
//! district and flattened into a [`CombinedTable`].

mod aggregator;
mod table;
mod types;

pub use aggregator::ZonalAggregator;
pub use table::{CombinedTable, TidyRow};
pub use types::{AggregateError, DistrictCell, SkippedDistrict, ZonalSummary};
