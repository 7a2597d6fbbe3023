//! Playground-gated cell access. Every read and write the agent performs goes
//! through here so nothing outside the user's region can be touched.
use crate::errors::{SheetPilotError, SheetPilotResult};
use crate::sheet::address::{is_cell_in_range, CellAddress, CellRange};
use crate::sheet::cell::{CellPatch, CellSnapshot};
use crate::sheet::host::SpreadsheetHost;

fn gate(address: &str, playground: &str) -> SheetPilotResult<CellAddress> {
    if !is_cell_in_range(address, playground) {
        return Err(SheetPilotError::OutsidePlayground);
    }
    CellAddress::parse(address)
}

/// Read value, formula and colours of one cell inside the playground.
pub async fn get_cell(
    host: &dyn SpreadsheetHost,
    address: &str,
    playground: &str,
) -> SheetPilotResult<CellSnapshot> {
    let addr = gate(address, playground)?;
    host.read_cell(addr).await
}

/// Apply `patch` to one cell inside the playground.
pub async fn set_cell(
    host: &dyn SpreadsheetHost,
    address: &str,
    patch: &CellPatch,
    playground: &str,
) -> SheetPilotResult<()> {
    let addr = gate(address, playground)?;
    tracing::debug!(cell = %addr, ?patch, host = host.name(), "set_cell");
    host.write_cell(addr, patch).await
}

/// Parse `playground` and refuse regions with more than `max_cells` cells.
pub fn check_playground(playground: &str, max_cells: u64) -> SheetPilotResult<CellRange> {
    if playground.trim().is_empty() {
        return Err(SheetPilotError::NoPlayground);
    }
    let range = CellRange::parse(playground)?;
    let cells = range.cell_count();
    if cells > max_cells {
        return Err(SheetPilotError::PlaygroundTooLarge {
            range: range.to_string(),
            cells,
            max: max_cells,
        });
    }
    Ok(range)
}

/// Every cell of the playground, row by row, with its real address.
pub async fn get_all_content(
    host: &dyn SpreadsheetHost,
    playground: &str,
) -> SheetPilotResult<Vec<CellSnapshot>> {
    if playground.trim().is_empty() {
        return Err(SheetPilotError::NoPlayground);
    }
    let range = CellRange::parse(playground)?;
    host.read_region(&range).await
}

/// One `address: value=…, formula=…` line per cell, as fed to the model.
pub fn summarize(cells: &[CellSnapshot]) -> String {
    if cells.is_empty() {
        return "Playground area is empty.".to_string();
    }
    cells
        .iter()
        .map(|c| format!("{}: value={}, formula={}", c.address, c.value, c.formula))
        .collect::<Vec<_>>()
        .join("\n")
}
