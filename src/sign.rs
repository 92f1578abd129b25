//! Sign-in reward cycle configuration records.
//!
//! Plain data carried through [`WindrowConfig`](crate::WindrowConfig) for
//! game-side services; this crate attaches no behavior to them.

use serde::{Deserialize, Serialize};

/// How the cycle's day-one is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignCycleType {
    /// No fixed start date: the player's first sign-in inside the current
    /// window counts as day one.
    #[default]
    Rolling,
    /// Cycle runs between fixed calendar dates.
    FixedDates,
}

/// Top-level sign-in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInConfig {
    #[serde(default)]
    pub cycle_type: SignCycleType,

    /// How many days the client displays at once.
    #[serde(default)]
    pub display_qty: u32,

    pub cycle: SignInCycleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInCycleConfig {
    /// Length of one cycle, in days.
    pub cycle_qty: u32,

    pub prize: SignInPrizeConfig,

    /// Presentation overrides for specific days, reserved for display use.
    #[serde(default)]
    pub item_rules: Vec<CycleItemRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleItemRule {
    /// Days of the cycle this rule applies to.
    pub days: Vec<u32>,

    #[serde(default)]
    pub item: CycleItemConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleItemConfig {
    pub date_format: Option<String>,
}

/// Prize table for a cycle. Rules can chain through `next`; `both` selects
/// whether a chained rule combines with (`true`) or replaces (`false`) this
/// one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInPrizeConfig {
    #[serde(default)]
    pub both: bool,

    /// When `true` every day's reward is fixed and rule days index into the
    /// cycle; when `false` rule days are counts of consecutive sign-ins.
    #[serde(default)]
    pub fixed: bool,

    #[serde(default)]
    pub next: Option<Box<SignInPrizeConfig>>,

    #[serde(default)]
    pub prize_rules: Vec<PrizeRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrizeRule {
    pub days: Vec<u32>,
    pub prizes: Vec<String>,
}
