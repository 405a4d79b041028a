use serde_json::Value;

use crate::domain::{DataSource, PortalHarvest};
use crate::error::Result;

/// Supplies the raw score rows one collector produced
pub trait RecordSourcePort: Send + Sync {
    fn source(&self) -> DataSource;

    /// Where the rows come from, for logs and the cleaning ledger
    fn origin(&self) -> String;

    /// One entry per row; entries that are not objects are rejected later by the parser
    fn load(&self) -> Result<Vec<Value>>;
}

/// Supplies everything the portal collector harvested in one run
pub trait PortalHarvestPort: Send + Sync {
    fn origin(&self) -> String;
    fn load(&self) -> Result<PortalHarvest>;
}
