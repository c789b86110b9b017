//! Boundary to the command-execution collaborator (input injection, audio
//! cues, caregiver alerts). Implementations live outside this crate.

use crate::models::events::CommandEvent;

pub trait CommandSink {
    /// Executes one gated command. Errors are reported, never retried.
    fn execute(&mut self, event: &CommandEvent) -> Result<(), String>;
}

/// Writes each command as one JSON line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl CommandSink for StdoutSink {
    fn execute(&mut self, event: &CommandEvent) -> Result<(), String> {
        let line = serde_json::to_string(event)
            .map_err(|e| format!("Failed to serialize command: {}", e))?;
        println!("{}", line);
        Ok(())
    }
}
