//! Terminal front end: chat transcript on stdout, one command or task per line.
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent_engine::chat::{ChatEntry, ChatLog};
use crate::agent_engine::engine::AgentEngine;
use crate::agent_engine::state::TurnOutcome;
use crate::errors::SheetPilotResult;
use crate::sheet::access::check_playground;
use crate::sheet::address::CellRange;
use crate::sheet::host::SpreadsheetHost;
use crate::sheet::workbook::InMemoryWorksheet;

pub const HELP: &str = "\
Commands:
  /select [RANGE]  set the playground area (defaults to the current selection)
  /clear           clear the chat
  /actions         show or hide the last action batch
  /show            print the playground area
  /save            write the worksheet to disk
  /help            this text
  /quit            exit
Anything else is sent to the agent as a task.";

pub const NO_PLAYGROUND: &str = "Select a playground area first (/select A1:D10).";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select(Option<String>),
    Clear,
    Actions,
    Show,
    Save,
    Help,
    Quit,
    Task(String),
    Empty,
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Task(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim().to_string()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    match name.to_ascii_lowercase().as_str() {
        "select" => Command::Select(arg),
        "clear" => Command::Clear,
        "actions" => Command::Actions,
        "show" => Command::Show,
        "save" => Command::Save,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => Command::Task(line.to_string()),
    }
}

/// What the shell should do after a line.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    Silent,
    Quit,
}

pub struct Shell {
    engine: AgentEngine,
    sheet: Arc<InMemoryWorksheet>,
    chat: ChatLog,
    playground: Option<String>,
    show_actions: bool,
}

impl Shell {
    /// A configured start-up playground that is invalid or too large is dropped.
    pub fn new(engine: AgentEngine, sheet: Arc<InMemoryWorksheet>, playground: Option<String>) -> Self {
        let max_cells = engine.config().max_playground_cells;
        let playground = playground.filter(|p| match check_playground(p, max_cells) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring configured playground");
                false
            }
        });
        Self {
            engine,
            sheet,
            chat: ChatLog::new(),
            playground,
            show_actions: false,
        }
    }

    pub fn playground(&self) -> Option<&str> {
        self.playground.as_deref()
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub async fn handle(&mut self, command: Command) -> Reply {
        match command {
            Command::Empty => Reply::Silent,
            Command::Help => Reply::Print(HELP.to_string()),
            Command::Quit => Reply::Quit,
            Command::Select(arg) => Reply::Print(self.select(arg).await),
            Command::Clear => {
                self.chat.clear();
                self.show_actions = false;
                Reply::Print("Chat cleared.".to_string())
            }
            Command::Actions => Reply::Print(self.toggle_actions()),
            Command::Show => match self.playground_range() {
                Some(range) => Reply::Print(self.sheet.render_grid(&range).await),
                None => Reply::Print(NO_PLAYGROUND.to_string()),
            },
            Command::Save => match self.sheet.save(None).await {
                Ok(path) => Reply::Print(format!("Saved to {}", path.display())),
                Err(e) => Reply::Print(format!("Save failed: {e}")),
            },
            Command::Task(task) => {
                let Some(playground) = self.playground.clone() else {
                    return Reply::Print(NO_PLAYGROUND.to_string());
                };
                let before = self.chat.entries().len();
                let outcome = self.engine.process_message(&mut self.chat, &task, &playground).await;
                if matches!(outcome, TurnOutcome::Executed { .. }) {
                    self.show_actions = false;
                }
                let appended: Vec<String> = self.chat.entries()[before..].iter().map(format_entry).collect();
                if appended.is_empty() {
                    Reply::Silent
                } else {
                    Reply::Print(appended.join("\n"))
                }
            }
        }
    }

    /// An explicit range wins; otherwise take whatever the host has selected.
    async fn select(&mut self, arg: Option<String>) -> String {
        let max_cells = self.engine.config().max_playground_cells;
        let picked = match arg {
            Some(text) => match check_playground(&text, max_cells) {
                Ok(range) => {
                    self.sheet.select(range).await;
                    Some(text)
                }
                Err(e) => return e.to_string(),
            },
            None => match self.sheet.selected_range().await {
                Ok(Some(selection)) => match check_playground(&selection, max_cells) {
                    Ok(_) => Some(selection),
                    Err(e) => return e.to_string(),
                },
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(error = %e, "reading selection failed");
                    None
                }
            },
        };
        tracing::info!(playground = ?picked, "playground changed");
        self.playground = picked;
        match &self.playground {
            Some(range) => format!("Playground Area: {range}"),
            None => "No range selected.".to_string(),
        }
    }

    fn toggle_actions(&mut self) -> String {
        let Some(actions) = self.chat.last_actions() else {
            return "No actions yet.".to_string();
        };
        self.show_actions = !self.show_actions;
        if !self.show_actions {
            return "Actions hidden.".to_string();
        }
        serde_json::to_string_pretty(actions).unwrap_or_else(|e| format!("Error: {e}"))
    }

    fn playground_range(&self) -> Option<CellRange> {
        self.playground.as_deref().and_then(|p| CellRange::parse(p).ok())
    }

    /// Read lines from stdin until `/quit` or end of input.
    pub async fn run(mut self) -> SheetPilotResult<()> {
        println!("SheetPilot ({}). Type /help for commands.", self.engine.host().name());
        if let Some(p) = &self.playground {
            println!("Playground Area: {p}");
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match self.handle(parse_command(&line)).await {
                Reply::Print(text) => println!("{text}"),
                Reply::Silent => {}
                Reply::Quit => break,
            }
        }

        tracing::info!(session = %self.engine.session_id(), "shell closed");
        Ok(())
    }
}

fn format_entry(entry: &ChatEntry) -> String {
    let mut line = format!("{}: {}", entry.sender.as_str(), entry.text);
    if entry.actions.is_some() {
        line.push_str("  (/actions to view)");
    }
    line
}
