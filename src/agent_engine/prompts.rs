use crate::agent_engine::chat::ContextLine;
use crate::errors::SheetPilotResult;
use crate::sheet::access::summarize;
use crate::sheet::cell::CellSnapshot;

pub const SUMMARY_HEADER: &str =
    "Current playground area cell data (address, value, formula, fontColor, fillColor):";
pub const SUMMARY_UNAVAILABLE: &str = "[Error reading playground area]";

const CONVENTIONS: &str = "\
Conventions:
- Each cell should contain only one type of data (number or string, not both).
- For example, there should never be a cell with 'United States - GDP 21.43 trillion'.
- Instead, use one cell for the country name (e.g., 'United States'), and another cell for the GDP value (e.g., '21.43'), with column headers like 'Country' and 'GDP (trillion)'.
- The first row should contain headers for each column, and headers should be bolded.";

const NO_CONFIRMATION: &str =
    "Never ask the user for confirmation or permission; always proceed with the actions you suggest.";

/// Playground block embedded in both prompts, from a fresh region read.
pub fn playground_block(cells: &SheetPilotResult<Vec<CellSnapshot>>) -> String {
    match cells {
        Ok(cells) if cells.is_empty() => summarize(cells),
        Ok(cells) => format!("{SUMMARY_HEADER}\n{}", summarize(cells)),
        Err(e) => {
            tracing::warn!(error = %e, "playground read failed");
            SUMMARY_UNAVAILABLE.to_string()
        }
    }
}

fn conventions(extra: &[String]) -> String {
    let mut out = CONVENTIONS.to_string();
    for rule in extra {
        out.push_str("\n- ");
        out.push_str(rule);
    }
    out
}

/// First pass: think out loud, no JSON.
pub fn reasoning_prompt(
    playground: &str,
    block: &str,
    context: &[ContextLine],
    task: &str,
    extra_conventions: &[String],
) -> String {
    let history = context
        .iter()
        .map(|c| format!("{}: {}", c.sender.as_str(), c.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are SheetPilot. The user has selected the playground area: {playground}.\n\
         {block}\n\
         {conventions}\n\
         Here is the conversation so far:\n\
         {history}\n\
         Task: {task}\n\
         Please reason step by step and describe your plan for how to accomplish the task. \
         Do not output any JSON yet. {NO_CONFIRMATION}",
        conventions = conventions(extra_conventions),
    )
}

/// Second pass: compress the plan into a strict JSON action array.
pub fn action_prompt(plan: &str, block: &str) -> String {
    format!(
        "You are a spreadsheet automation agent. Based on the following plan and the current state \
         of the playground area, output only a JSON array of actions to perform, and nothing else. \
         Use the format: [{{\"type\":\"set\",\"address\":\"B2\",\"data\":{{\"value\":42}}}}]. \
         Supported types are \"set\", \"get\" and \"clear\". \
         To set a cell as bold, use {{ \"bold\": true }} in the data object. \
         To set font color, use {{ \"fontColor\": \"#RRGGBB\" }}. \
         To set fill color, use {{ \"fillColor\": \"#RRGGBB\" }}. \
         To set font name or size, use {{ \"fontName\": \"Arial\", \"fontSize\": 12 }}. \
         If you want to set a formula, use data: {{ \"formula\": \"=SUM(B2:B5)\" }}. \
         Here is the plan and context:\n{plan}\n\n{block}\n{NO_CONFIRMATION}"
    )
}
