//! Canonical sheet actions and the normalizer that maps the shapes models
//! actually emit onto them.
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{SheetPilotError, SheetPilotResult};
use crate::sheet::cell::CellPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Set,
    Get,
    Clear,
}

impl ActionKind {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "set" | "write" | "update" => Some(ActionKind::Set),
            "get" | "read" => Some(ActionKind::Get),
            "clear" | "delete" => Some(ActionKind::Clear),
            _ => None,
        }
    }
}

/// `{"type": "set", "address": "B2", "data": {"value": 42}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub address: String,
    #[serde(default)]
    pub data: CellPatch,
}

fn unrecognized(raw: &Value) -> SheetPilotError {
    SheetPilotError::UnrecognizedAction(raw.to_string())
}

fn address_of(obj: &serde_json::Map<String, Value>) -> Option<String> {
    obj.get("address")
        .or_else(|| obj.get("cell"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read the patch from `data`, or from formatting keys inlined next to `type`.
fn patch_of(obj: &serde_json::Map<String, Value>) -> SheetPilotResult<CellPatch> {
    let source = match obj.get("data") {
        Some(Value::Object(_)) => obj["data"].clone(),
        Some(Value::Null) | None => Value::Object(obj.clone()),
        Some(other) => return Err(unrecognized(other)),
    };
    Ok(serde_json::from_value(source)?)
}

/// Map one model-emitted action onto the canonical shape.
///
/// Accepted shapes:
/// - `{type, address, data}` (also `cell` for `address`, and inline patch keys)
/// - `{action: "setCellValue", cell, value}`
/// - `{action: "setCellFormula", cell, formula}`
/// - `{action: "setCellFormat", cell, bold?, fontColor?, …}`
/// - `{action: "getCell" | "getCellValue", cell}`
/// - `{action: "clearCell", cell}`
pub fn normalize_action(raw: &Value) -> SheetPilotResult<SheetAction> {
    let obj = raw.as_object().ok_or_else(|| unrecognized(raw))?;
    let address = address_of(obj).ok_or_else(|| unrecognized(raw))?;

    if let Some(kind) = obj.get("type").and_then(Value::as_str) {
        let kind = ActionKind::parse(kind).ok_or_else(|| unrecognized(raw))?;
        let data = match kind {
            ActionKind::Set => patch_of(obj)?,
            ActionKind::Get | ActionKind::Clear => CellPatch::default(),
        };
        return Ok(SheetAction { kind, address, data });
    }

    let verb = obj
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| unrecognized(raw))?
        .to_ascii_lowercase();

    match verb.as_str() {
        "setcellvalue" if obj.contains_key("value") => Ok(SheetAction {
            kind: ActionKind::Set,
            address,
            data: serde_json::from_value(serde_json::json!({ "value": obj["value"] }))?,
        }),
        "setcellformula" => {
            let formula = obj
                .get("formula")
                .and_then(Value::as_str)
                .ok_or_else(|| unrecognized(raw))?;
            Ok(SheetAction {
                kind: ActionKind::Set,
                address,
                data: CellPatch::formula(formula),
            })
        }
        "setcellformat" | "formatcell" => Ok(SheetAction {
            kind: ActionKind::Set,
            address,
            data: patch_of(obj)?,
        }),
        "getcell" | "getcellvalue" => Ok(SheetAction {
            kind: ActionKind::Get,
            address,
            data: CellPatch::default(),
        }),
        "clearcell" => Ok(SheetAction {
            kind: ActionKind::Clear,
            address,
            data: CellPatch::default(),
        }),
        _ => Err(unrecognized(raw)),
    }
}

fn action_array_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\[\s*\{.*?\}\s*\]").expect("valid action array regex"))
}

/// The first `[ { … } ]` run in `text`, lazily matched.
pub fn extract_action_array(text: &str) -> Option<&str> {
    action_array_pattern().find(text).map(|m| m.as_str())
}

/// Result of scanning an action-pass reply.
#[derive(Debug)]
pub enum ParsedActions {
    /// No JSON array in the reply.
    NoJson,
    /// Something array-shaped that is not valid JSON.
    Invalid(String),
    /// One entry per array element, normalized or rejected individually.
    Actions(Vec<SheetPilotResult<SheetAction>>),
}

pub fn parse_actions(text: &str) -> ParsedActions {
    let Some(candidate) = extract_action_array(text) else {
        return ParsedActions::NoJson;
    };
    match serde_json::from_str::<Vec<Value>>(candidate) {
        Ok(items) => ParsedActions::Actions(items.iter().map(normalize_action).collect()),
        Err(e) => ParsedActions::Invalid(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::cell::CellValue;
    use serde_json::json;

    #[test]
    fn canonical_shape_passes_through() {
        let a = normalize_action(&json!({"type": "set", "address": "B2", "data": {"value": 42}})).unwrap();
        assert_eq!(a.kind, ActionKind::Set);
        assert_eq!(a.address, "B2");
        assert_eq!(a.data.value, Some(CellValue::Number(42.0)));
    }

    #[test]
    fn set_cell_value_shape() {
        let a = normalize_action(&json!({"action": "setCellValue", "cell": "B1", "value": "Country"})).unwrap();
        assert_eq!(a.kind, ActionKind::Set);
        assert_eq!(a.address, "B1");
        assert_eq!(a.data.value, Some(CellValue::from("Country")));
    }

    #[test]
    fn set_cell_value_without_value_is_rejected() {
        assert!(normalize_action(&json!({"action": "setCellValue", "cell": "B1"})).is_err());
    }

    #[test]
    fn set_cell_formula_shape() {
        let a = normalize_action(&json!({"action": "setCellFormula", "cell": "C3", "formula": "=A1+B1"})).unwrap();
        assert_eq!(a.data.formula.as_deref(), Some("=A1+B1"));
        assert_eq!(a.data.value, None);
    }

    #[test]
    fn get_and_clear_need_no_data() {
        let g = normalize_action(&json!({"type": "get", "address": "A1"})).unwrap();
        assert_eq!(g.kind, ActionKind::Get);
        let c = normalize_action(&json!({"action": "clearCell", "cell": "A2"})).unwrap();
        assert_eq!(c.kind, ActionKind::Clear);
    }

    #[test]
    fn inline_patch_keys_are_collected() {
        let a = normalize_action(&json!({"type": "set", "cell": "A1", "value": "Name", "bold": true})).unwrap();
        assert_eq!(a.address, "A1");
        assert_eq!(a.data.value, Some(CellValue::from("Name")));
        assert_eq!(a.data.bold, Some(true));
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        assert!(normalize_action(&json!({"type": "explode", "address": "A1"})).is_err());
        assert!(normalize_action(&json!({"action": "deleteSheet", "cell": "A1"})).is_err());
        assert!(normalize_action(&json!({"type": "set"})).is_err());
        assert!(normalize_action(&json!("set B2")).is_err());
    }

    #[test]
    fn extracts_first_array_from_prose() {
        let text = "Sure! Here you go:\n```json\n[{\"type\":\"set\",\"address\":\"B2\",\"data\":{\"value\":42}}]\n```\nDone.";
        assert_eq!(
            extract_action_array(text),
            Some("[{\"type\":\"set\",\"address\":\"B2\",\"data\":{\"value\":42}}]")
        );
    }

    #[test]
    fn multi_action_array_is_matched_whole() {
        let text = r#"[{"type":"set","address":"A1","data":{"value":"Country","bold":true}},
                       {"type":"set","address":"B1","data":{"value":"GDP"}}]"#;
        match parse_actions(text) {
            ParsedActions::Actions(items) => {
                assert_eq!(items.len(), 2);
                assert!(items.iter().all(|i| i.is_ok()));
            }
            other => panic!("expected actions, got {other:?}"),
        }
    }

    #[test]
    fn prose_without_array_is_no_json() {
        assert!(matches!(parse_actions("I will set B2 to 42."), ParsedActions::NoJson));
        assert!(matches!(parse_actions("[1, 2, 3]"), ParsedActions::NoJson));
    }

    #[test]
    fn broken_json_is_invalid() {
        assert!(matches!(
            parse_actions("[{type: set, address: B2}]"),
            ParsedActions::Invalid(_)
        ));
    }

    #[test]
    fn serializes_with_type_key() {
        let a = SheetAction {
            kind: ActionKind::Clear,
            address: "D4".into(),
            data: CellPatch::default(),
        };
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            json!({"type": "clear", "address": "D4", "data": {}})
        );
    }
}
