pub mod action;
pub mod chat;
pub mod engine;
pub mod event_bus;
pub mod history;
pub mod loop_control;
pub mod prompts;
pub mod state;
