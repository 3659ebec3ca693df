//! CLI command handlers

pub mod analyze;
pub mod execute;
pub mod export;
pub mod plan;
pub mod show;
pub mod vacuum;

use vaultkeeper_core::{Result, VaultkeeperError};

/// Convert a 1-based action number from the command line to an index
pub fn action_index(number: usize) -> Result<usize> {
    number.checked_sub(1).ok_or_else(|| {
        VaultkeeperError::InvalidInput("action numbers start at 1".to_string())
    })
}
