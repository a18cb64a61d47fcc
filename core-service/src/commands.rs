//! Chat command table.
//!
//! Front ends register these names with their bot framework and route the
//! raw argument list through [`TaskSequencer::handle_command`].

use crate::pipeline::Operation;
use crate::sequencer::TaskSequencer;
use crate::{Result, ServiceError};

/// Command name → operation, in the order front ends list them.
pub const COMMANDS: [(&str, Operation); 5] = [
    ("strm_inc", Operation::SyncIncremental),
    ("strm_sync", Operation::SyncFull),
    ("scrape", Operation::Scrape),
    ("scrape_sync", Operation::ScrapeThenSync),
    ("sync_scrape", Operation::SyncThenScrape),
];

pub fn commands() -> &'static [(&'static str, Operation)] {
    &COMMANDS
}

pub fn lookup(name: &str) -> Result<Operation> {
    let name = name.trim_start_matches('/');
    COMMANDS
        .iter()
        .find(|(command, _)| *command == name)
        .map(|(_, operation)| *operation)
        .ok_or_else(|| ServiceError::UnknownCommand(name.to_string()))
}

impl TaskSequencer {
    /// Route a chat command. Unknown names are an error; everything else
    /// yields the operation's reply text.
    pub fn handle_command<S: AsRef<str>>(&self, name: &str, args: &[S]) -> Result<String> {
        let operation = lookup(name)?;
        Ok(self.run(operation, args))
    }
}
