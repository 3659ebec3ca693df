//! Vaultkeeper Core Library
//!
//! Ownership reconciliation and safe cleanup planning for game server
//! databases.
//!
//! # Features
//! - Set-based classification of owner references (character, structure,
//!   guild, orphaned)
//! - Range analysis of orphaned ids
//! - Detection of damage left by earlier over-broad cleanups
//! - Risk-tiered cleanup plans with a confirmation-gated executor

pub mod analysis;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ownership;

pub use analysis::{Analysis, HealthGrade, HintPriority, RecoveryHint};
pub use cleanup::{
    generate_plan, CleanupAction, CleanupPlan, CleanupSession, ExecutionOutcome, RiskTier,
    BACKUP_TOKEN, EXECUTE_TOKEN,
};
pub use config::Config;
pub use db::{Database, GameSchema, ReferenceSets};
pub use error::{Error, Result, VaultkeeperError};
pub use ownership::{
    analyze_patterns, classify, detect_damage, Classification, DamageReport, IdPatternReport,
    OwnerRef, OwnershipClass, SlotPartition,
};

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "vaultkeeper";
