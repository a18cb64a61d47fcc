//! Target selectors for chat-style commands.
//!
//! Each positional argument picks the target of one stage: an empty string or
//! `#0` means every configured target, `#<id>` means that one target. Anything
//! else is rejected before any work starts.

use crate::{Result, ServiceError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    All,
    Target(u32),
}

impl Selector {
    pub fn target_id(&self) -> Option<u32> {
        match self {
            Selector::All => None,
            Selector::Target(id) => Some(*id),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("all"),
            Selector::Target(id) => write!(f, "#{id}"),
        }
    }
}

/// Parse one argument.
pub fn parse_selector(arg: &str) -> Result<Selector> {
    if arg.is_empty() {
        return Ok(Selector::All);
    }

    let digits = arg
        .strip_prefix('#')
        .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| ServiceError::InvalidSelector(arg.to_string()))?;
    let id: u32 = digits
        .parse()
        .map_err(|_| ServiceError::InvalidSelector(arg.to_string()))?;

    Ok(match id {
        0 => Selector::All,
        id => Selector::Target(id),
    })
}

/// Selectors for `stages` stages. Every argument is validated, including
/// extras beyond the stage count, which are otherwise ignored; missing
/// arguments mean "all".
pub fn parse_selectors<S: AsRef<str>>(args: &[S], stages: usize) -> Result<Vec<Selector>> {
    let parsed = args
        .iter()
        .map(|arg| parse_selector(arg.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    Ok((0..stages)
        .map(|i| parsed.get(i).copied().unwrap_or(Selector::All))
        .collect())
}
