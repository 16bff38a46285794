use serde::Serialize;

pub mod cli;
pub mod commands;
pub mod dashboard;
pub mod db;
pub mod models;
pub mod progression;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;
pub mod utils;

/// How command output should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFmt {
    Text,
    Json,
}

impl OutputFmt {
    pub fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

/// Prints `payload` as JSON, or runs the text renderer.
pub fn emit<T: Serialize>(fmt: OutputFmt, payload: &T, pretty: impl FnOnce()) {
    match fmt {
        OutputFmt::Json => match serde_json::to_string_pretty(payload) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("error: failed to encode JSON: {e}"),
        },
        OutputFmt::Text => pretty(),
    }
}
