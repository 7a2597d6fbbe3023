use async_trait::async_trait;

use crate::errors::SheetPilotResult;
use crate::sheet::address::{CellAddress, CellRange};
use crate::sheet::cell::{CellPatch, CellSnapshot};

/// The spreadsheet application the agent drives.
/// Implementations talk to the active worksheet only; playground gating is
/// done by the caller.
#[async_trait]
pub trait SpreadsheetHost: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn read_cell(&self, addr: CellAddress) -> SheetPilotResult<CellSnapshot>;

    async fn write_cell(&self, addr: CellAddress, patch: &CellPatch) -> SheetPilotResult<()>;

    /// Every cell of `range`, row by row.
    async fn read_region(&self, range: &CellRange) -> SheetPilotResult<Vec<CellSnapshot>>;

    /// The user's current selection, as the host reports it (e.g. `Sheet1!A1:D10`).
    async fn selected_range(&self) -> SheetPilotResult<Option<String>>;
}
