//! User profile submitted once per run.
//!
//! A [`Profile`] describes the person playing the simulation, where they
//! live, who they share a household with, and which vulnerabilities the
//! scenario should take into account. Profiles are immutable once a session
//! has been created from them.
//!
//! Field-level constraints are declared with `validator` attributes; the
//! engine normalizes free text first and then calls
//! [`Validate::validate`](validator::Validate::validate).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use validator::Validate;

/// Largest household the simulation accepts (excluding the user).
pub const MAX_HOUSEHOLD_MEMBERS: usize = 12;

/// A person living with the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HouseholdMember {
    /// Display name, unique within the household.
    #[validate(length(min = 1, max = 80, message = "household member name must not be empty"))]
    pub name: String,
    /// Age in years (0 for infants).
    #[validate(range(max = 120, message = "household member age must be at most 120"))]
    pub age: u32,
    /// Relationship to the user (e.g. "partner", "daughter").
    #[serde(default)]
    pub relationship: String,
}

/// The user's self-description used to seed a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Profile {
    /// The user's name.
    #[validate(length(min = 1, max = 80, message = "name must not be empty"))]
    pub name: String,
    /// Age in years.
    #[validate(range(min = 1, max = 120, message = "age must be between 1 and 120"))]
    pub age: u32,
    /// Free-text location (city, region, country or a descriptor such as "coastal town").
    #[validate(length(min = 1, max = 200, message = "location must not be empty"))]
    pub location: String,
    /// People sharing the user's household, in the order given.
    #[serde(default)]
    #[validate(nested)]
    pub household: Vec<HouseholdMember>,
    /// Vulnerability tags (e.g. "flood-prone", "chronic-illness").
    #[serde(default)]
    pub vulnerabilities: BTreeSet<String>,
    /// Professional role (e.g. "manager", "employee").
    #[serde(default)]
    pub occupation: Option<String>,
    /// Free-text description of the user's working environment.
    #[serde(default)]
    pub work_environment: Option<String>,
}

impl Profile {
    /// Number of people the household's supplies must cover, the user included.
    pub fn household_size(&self) -> u32 {
        u32::try_from(self.household.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }
}
