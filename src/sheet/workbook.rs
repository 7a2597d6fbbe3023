use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::errors::{SheetPilotError, SheetPilotResult};
use crate::sheet::address::{column_letters, CellAddress, CellRange};
use crate::sheet::cell::{
    CellPatch, CellSnapshot, CellValue, DEFAULT_FILL_COLOR, DEFAULT_FONT_COLOR,
};
use crate::sheet::host::SpreadsheetHost;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellFormat {
    #[serde(default)]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default)]
    pub format: CellFormat,
}

impl Cell {
    /// Formula text as a host reports it: the formula itself, or the
    /// constant's display text for plain cells.
    fn formula_text(&self) -> String {
        self.formula.clone().unwrap_or_else(|| self.value.to_string())
    }

    /// Typed input: a leading `=` makes a formula, anything else a constant.
    fn enter(&mut self, text: String) {
        if text.starts_with('=') {
            self.formula = Some(text);
            self.value = CellValue::Empty;
        } else {
            self.value = constant_from_text(&text);
            self.formula = None;
        }
    }

    fn is_blank(&self) -> bool {
        self.value.is_empty() && self.formula.is_none() && self.format == CellFormat::default()
    }
}

/// On-disk layout of a saved worksheet.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SheetFile {
    name: String,
    #[serde(default)]
    selection: Option<String>,
    #[serde(default)]
    cells: BTreeMap<CellAddress, Cell>,
}

struct SheetState {
    cells: BTreeMap<CellAddress, Cell>,
    selection: Option<String>,
}

/// A single worksheet held in memory, optionally backed by a JSON file.
/// No recalculation: formula cells keep an empty value.
pub struct InMemoryWorksheet {
    name: String,
    path: Option<PathBuf>,
    state: RwLock<SheetState>,
}

impl InMemoryWorksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            state: RwLock::new(SheetState {
                cells: BTreeMap::new(),
                selection: None,
            }),
        }
    }

    /// Load the sheet at `path`, or start an empty one that will be saved there.
    pub fn open(path: impl AsRef<Path>) -> SheetPilotResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: SheetFile = serde_json::from_str(&content)?;
            tracing::info!(path = %path.display(), cells = file.cells.len(), "worksheet loaded");
            file
        } else {
            tracing::info!(path = %path.display(), "worksheet file not found; starting empty");
            SheetFile {
                name: "Sheet1".into(),
                ..SheetFile::default()
            }
        };
        Ok(Self {
            name: file.name,
            path: Some(path),
            state: RwLock::new(SheetState {
                cells: file.cells,
                selection: file.selection,
            }),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Save to `path`, or to the path the sheet was opened from.
    pub async fn save(&self, path: Option<&Path>) -> SheetPilotResult<PathBuf> {
        let target = path
            .map(Path::to_path_buf)
            .or_else(|| self.path.clone())
            .ok_or_else(|| SheetPilotError::Host("worksheet has no file path".into()))?;
        let state = self.state.read().await;
        let file = SheetFile {
            name: self.name.clone(),
            selection: state.selection.clone(),
            cells: state.cells.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(&target, content).await?;
        tracing::info!(path = %target.display(), cells = file.cells.len(), "worksheet saved");
        Ok(target)
    }

    /// Set the current selection, as a user dragging over the grid would.
    pub async fn select(&self, range: CellRange) {
        self.state.write().await.selection = Some(format!("{}!{}", self.name, range));
    }

    /// Plain-text grid of `range` for terminal display.
    pub async fn render_grid(&self, range: &CellRange) -> String {
        let state = self.state.read().await;
        let mut rows: Vec<Vec<String>> = Vec::new();

        let mut header = vec![String::new()];
        header.extend((range.start.col..=range.end.col).map(column_letters));
        rows.push(header);

        for row in range.start.row..=range.end.row {
            let mut line = vec![row.to_string()];
            for col in range.start.col..=range.end.col {
                let text = state
                    .cells
                    .get(&CellAddress::new(col, row))
                    .map(|c| match &c.formula {
                        Some(f) => f.clone(),
                        None if c.format.bold => format!("*{}*", c.value),
                        None => c.value.to_string(),
                    })
                    .unwrap_or_default();
                line.push(text);
            }
            rows.push(line);
        }

        let ncols = range.col_count() as usize + 1;
        let widths: Vec<usize> = (0..ncols)
            .map(|i| rows.iter().map(|r| r[i].chars().count()).max().unwrap_or(0).clamp(1, 24))
            .collect();

        rows.iter()
            .map(|r| {
                r.iter()
                    .zip(&widths)
                    .map(|(cell, w)| {
                        let clipped: String = cell.chars().take(*w).collect();
                        format!("{clipped:<w$}", w = *w)
                    })
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn snapshot(addr: CellAddress, cell: Option<&Cell>) -> CellSnapshot {
        match cell {
            Some(c) => CellSnapshot {
                address: addr,
                value: c.value.clone(),
                formula: c.formula_text(),
                font_color: c
                    .format
                    .font_color
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FONT_COLOR.to_string()),
                fill_color: c
                    .format
                    .fill_color
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FILL_COLOR.to_string()),
            },
            None => CellSnapshot {
                address: addr,
                value: CellValue::Empty,
                formula: String::new(),
                font_color: DEFAULT_FONT_COLOR.to_string(),
                fill_color: DEFAULT_FILL_COLOR.to_string(),
            },
        }
    }
}

/// Text that is not a formula is stored the way a sheet would parse typed
/// input: numbers become numbers.
fn constant_from_text(text: &str) -> CellValue {
    match text.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ if text.is_empty() => CellValue::Empty,
        _ => CellValue::Text(text.to_string()),
    }
}

#[async_trait]
impl SpreadsheetHost for InMemoryWorksheet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_cell(&self, addr: CellAddress) -> SheetPilotResult<CellSnapshot> {
        let state = self.state.read().await;
        Ok(Self::snapshot(addr, state.cells.get(&addr)))
    }

    async fn write_cell(&self, addr: CellAddress, patch: &CellPatch) -> SheetPilotResult<()> {
        let patch = patch.resolved();
        let mut state = self.state.write().await;
        let cell = state.cells.entry(addr).or_default();

        match patch.value {
            Some(CellValue::Text(text)) => cell.enter(text),
            Some(value) => {
                cell.value = value;
                cell.formula = None;
            }
            None => {}
        }
        if let Some(formula) = patch.formula {
            cell.enter(formula);
        }
        if let Some(bold) = patch.bold {
            cell.format.bold = bold;
        }
        if let Some(color) = patch.font_color {
            cell.format.font_color = Some(color);
        }
        if let Some(color) = patch.fill_color {
            cell.format.fill_color = Some(color);
        }
        if let Some(name) = patch.font_name {
            cell.format.font_name = Some(name);
        }
        if let Some(size) = patch.font_size {
            cell.format.font_size = Some(size);
        }

        if cell.is_blank() {
            state.cells.remove(&addr);
        }
        tracing::debug!(sheet = %self.name, cell = %addr, "cell written");
        Ok(())
    }

    async fn read_region(&self, range: &CellRange) -> SheetPilotResult<Vec<CellSnapshot>> {
        let state = self.state.read().await;
        Ok(range
            .cells()
            .map(|addr| Self::snapshot(addr, state.cells.get(&addr)))
            .collect())
    }

    async fn selected_range(&self) -> SheetPilotResult<Option<String>> {
        Ok(self.state.read().await.selection.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[tokio::test]
    async fn write_then_read_value_and_format() {
        let sheet = InMemoryWorksheet::new("Sheet1");
        let patch: CellPatch = serde_json::from_str(
            r##"{"value": "Country", "bold": true, "fillColor": "#FFFF00"}"##,
        )
        .unwrap();
        sheet.write_cell(addr("A1"), &patch).await.unwrap();

        let snap = sheet.read_cell(addr("A1")).await.unwrap();
        assert_eq!(snap.value, CellValue::from("Country"));
        assert_eq!(snap.formula, "Country");
        assert_eq!(snap.fill_color, "#FFFF00");
        assert_eq!(snap.font_color, DEFAULT_FONT_COLOR);
    }

    fn patch(json: &str) -> CellPatch {
        serde_json::from_str(json).unwrap()
    }

    async fn format_of(sheet: &InMemoryWorksheet, label: &str) -> CellFormat {
        sheet.state.read().await.cells[&addr(label)].format.clone()
    }

    #[tokio::test]
    async fn formatting_reaches_the_cell() {
        let sheet = InMemoryWorksheet::new("Sheet1");
        sheet
            .write_cell(
                addr("A1"),
                &patch(r##"{"value": "Name", "bold": true, "fontColor": "#FF0000", "fontName": "Arial", "fontSize": 14}"##),
            )
            .await
            .unwrap();
        assert_eq!(
            format_of(&sheet, "A1").await,
            CellFormat {
                bold: true,
                font_color: Some("#FF0000".into()),
                fill_color: None,
                font_name: Some("Arial".into()),
                font_size: Some(14.0),
            }
        );
        let grid = sheet.render_grid(&CellRange::parse("A1:A1").unwrap()).await;
        assert!(grid.contains("*Name*"));
    }

    #[tokio::test]
    async fn bold_font_color_sets_bold() {
        let sheet = InMemoryWorksheet::new("Sheet1");
        sheet
            .write_cell(addr("B1"), &patch(r#"{"value": "GDP", "fontColor": "bold"}"#))
            .await
            .unwrap();
        let format = format_of(&sheet, "B1").await;
        assert!(format.bold);
        assert_eq!(format.font_color, None);
        assert_eq!(sheet.read_cell(addr("B1")).await.unwrap().font_color, DEFAULT_FONT_COLOR);
    }

    #[tokio::test]
    async fn empty_format_values_keep_existing_formatting() {
        let sheet = InMemoryWorksheet::new("Sheet1");
        sheet
            .write_cell(
                addr("C1"),
                &patch(r##"{"value": 1, "fontColor": "#00FF00", "fillColor": "#FFFF00", "fontName": "Calibri", "fontSize": 11}"##),
            )
            .await
            .unwrap();
        let before = format_of(&sheet, "C1").await;
        sheet
            .write_cell(
                addr("C1"),
                &patch(r#"{"fontColor": "", "fillColor": "", "fontName": "", "fontSize": 0}"#),
            )
            .await
            .unwrap();
        assert_eq!(format_of(&sheet, "C1").await, before);
    }

    #[tokio::test]
    async fn formula_replaces_value() {
        let sheet = InMemoryWorksheet::new("Sheet1");
        sheet.write_cell(addr("B3"), &CellPatch::value(5.0)).await.unwrap();
        sheet.write_cell(addr("B3"), &CellPatch::formula("=SUM(B1:B2)")).await.unwrap();
        let snap = sheet.read_cell(addr("B3")).await.unwrap();
        assert_eq!(snap.value, CellValue::Empty);
        assert_eq!(snap.formula, "=SUM(B1:B2)");
    }

    #[tokio::test]
    async fn non_formula_text_is_parsed_as_constant() {
        let sheet = InMemoryWorksheet::new("Sheet1");
        sheet.write_cell(addr("C1"), &CellPatch::formula("21.43")).await.unwrap();
        let snap = sheet.read_cell(addr("C1")).await.unwrap();
        assert_eq!(snap.value, CellValue::Number(21.43));
    }

    #[tokio::test]
    async fn typed_values_are_entered_like_user_input() {
        let sheet = InMemoryWorksheet::new("Sheet1");
        sheet.write_cell(addr("D1"), &CellPatch::value("=A1*2")).await.unwrap();
        sheet.write_cell(addr("D2"), &CellPatch::value("7")).await.unwrap();
        assert_eq!(sheet.read_cell(addr("D1")).await.unwrap().formula, "=A1*2");
        assert_eq!(sheet.read_cell(addr("D2")).await.unwrap().value, CellValue::Number(7.0));
    }

    #[tokio::test]
    async fn clearing_removes_blank_cell() {
        let sheet = InMemoryWorksheet::new("Sheet1");
        sheet.write_cell(addr("A2"), &CellPatch::value("x")).await.unwrap();
        sheet.write_cell(addr("A2"), &CellPatch::cleared()).await.unwrap();
        let snap = sheet.read_cell(addr("A2")).await.unwrap();
        assert!(snap.value.is_empty());
        assert!(sheet.state.read().await.cells.is_empty());
    }

    #[tokio::test]
    async fn region_uses_real_addresses() {
        let sheet = InMemoryWorksheet::new("Sheet1");
        sheet.write_cell(addr("C4"), &CellPatch::value(1.0)).await.unwrap();
        let range = CellRange::parse("C3:D4").unwrap();
        let cells = sheet.read_region(&range).await.unwrap();
        let labels: Vec<String> = cells.iter().map(|c| c.address.to_string()).collect();
        assert_eq!(labels, vec!["C3", "D3", "C4", "D4"]);
        assert_eq!(cells[2].value, CellValue::Number(1.0));
    }

    #[tokio::test]
    async fn select_reports_qualified_address() {
        let sheet = InMemoryWorksheet::new("Budget");
        assert_eq!(sheet.selected_range().await.unwrap(), None);
        sheet.select(CellRange::parse("A1:D10").unwrap()).await;
        assert_eq!(
            sheet.selected_range().await.unwrap().as_deref(),
            Some("Budget!A1:D10")
        );
    }

    #[tokio::test]
    async fn save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");

        let sheet = InMemoryWorksheet::open(&path).unwrap();
        sheet.write_cell(addr("B2"), &CellPatch::value(42.0)).await.unwrap();
        sheet.select(CellRange::parse("A1:C3").unwrap()).await;
        sheet.save(None).await.unwrap();

        let reopened = InMemoryWorksheet::open(&path).unwrap();
        let snap = reopened.read_cell(addr("B2")).await.unwrap();
        assert_eq!(snap.value, CellValue::Number(42.0));
        assert_eq!(
            reopened.selected_range().await.unwrap().as_deref(),
            Some("Sheet1!A1:C3")
        );
    }

    #[tokio::test]
    async fn render_grid_has_headers() {
        let sheet = InMemoryWorksheet::new("Sheet1");
        sheet.write_cell(addr("A1"), &CellPatch::value("Name")).await.unwrap();
        let grid = sheet.render_grid(&CellRange::parse("A1:B2").unwrap()).await;
        let first = grid.lines().next().unwrap();
        assert!(first.contains('A') && first.contains('B'));
        assert!(grid.contains("Name"));
        assert_eq!(grid.lines().count(), 3);
    }
}
