//! Profile normalization and validation.
//!
//! Free text is trimmed and vulnerability tags are canonicalized before the
//! `validator` rules declared on [`Profile`] run, so "  " counts as empty
//! and "Flood-Prone " matches the `flood-prone` catalogue entry.

use std::collections::{BTreeMap, BTreeSet};

use crisou_types::Profile;
use crisou_types::profile::MAX_HOUSEHOLD_MEMBERS;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::error::EngineError;

/// Normalize and validate a submitted profile.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] describing every violated rule.
pub fn validate_profile(profile: Profile) -> Result<Profile, EngineError> {
    let profile = normalize(profile);

    if profile.household.len() > MAX_HOUSEHOLD_MEMBERS {
        return Err(EngineError::Validation(format!(
            "household may list at most {MAX_HOUSEHOLD_MEMBERS} members (got {})",
            profile.household.len()
        )));
    }

    let mut seen = BTreeSet::new();
    for member in &profile.household {
        if !member.name.is_empty() && !seen.insert(member.name.to_lowercase()) {
            return Err(EngineError::Validation(format!(
                "household member names must be unique: {}",
                member.name
            )));
        }
    }

    profile
        .validate()
        .map_err(|e| EngineError::Validation(describe(&e)))?;

    Ok(profile)
}

/// Canonical form of a vulnerability tag: trimmed, lower-case, spaces as hyphens.
pub fn canonical_tag(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

fn normalize(mut profile: Profile) -> Profile {
    profile.name = profile.name.trim().to_owned();
    profile.location = profile.location.trim().to_owned();
    for member in &mut profile.household {
        member.name = member.name.trim().to_owned();
        member.relationship = member.relationship.trim().to_owned();
    }
    profile.vulnerabilities = profile
        .vulnerabilities
        .iter()
        .map(|tag| canonical_tag(tag))
        .filter(|tag| !tag.is_empty())
        .collect();
    profile.occupation = non_blank(profile.occupation);
    profile.work_environment = non_blank(profile.work_environment);
    profile
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Flatten `validator` errors into one readable sentence.
fn describe(errors: &ValidationErrors) -> String {
    let mut messages = BTreeMap::new();
    collect(errors, "", &mut messages);
    messages
        .into_iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut BTreeMap<String, String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let message = list
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map_or_else(|| e.code.to_string(), ToString::to_string)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                out.insert(path, message);
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crisou_types::HouseholdMember;

    use super::*;

    fn profile() -> Profile {
        Profile {
            name: "  Camille ".to_owned(),
            age: 34,
            location: " coastal town ".to_owned(),
            household: vec![HouseholdMember {
                name: " Jules".to_owned(),
                age: 6,
                relationship: "son".to_owned(),
            }],
            vulnerabilities: BTreeSet::from([
                "Flood-Prone ".to_owned(),
                "flood-prone".to_owned(),
                "  ".to_owned(),
                "Chronic Illness".to_owned(),
            ]),
            occupation: Some("   ".to_owned()),
            work_environment: Some(" open-plan office ".to_owned()),
        }
    }

    #[test]
    fn normalizes_text_and_tags() {
        let p = validate_profile(profile()).unwrap();
        assert_eq!(p.name, "Camille");
        assert_eq!(p.location, "coastal town");
        assert_eq!(p.household[0].name, "Jules");
        assert_eq!(
            p.vulnerabilities,
            BTreeSet::from(["chronic-illness".to_owned(), "flood-prone".to_owned()])
        );
        assert_eq!(p.occupation, None);
        assert_eq!(p.work_environment.as_deref(), Some("open-plan office"));
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut p = profile();
        p.name = "   ".to_owned();
        let err = validate_profile(p).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("name")));
    }

    #[test]
    fn blank_location_is_rejected() {
        let mut p = profile();
        p.location = String::new();
        assert!(matches!(
            validate_profile(p),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn age_out_of_range_is_rejected() {
        let mut p = profile();
        p.age = 121;
        let err = validate_profile(p).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ref m) if m.contains("age")));
    }

    #[test]
    fn empty_household_and_tags_are_fine() {
        let mut p = profile();
        p.household.clear();
        p.vulnerabilities.clear();
        assert!(validate_profile(p).is_ok());
    }

    #[test]
    fn duplicate_member_names_are_rejected() {
        let mut p = profile();
        p.household.push(HouseholdMember {
            name: "jules".to_owned(),
            age: 40,
            relationship: "uncle".to_owned(),
        });
        assert!(matches!(
            validate_profile(p),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn oversized_household_is_rejected() {
        let mut p = profile();
        p.household = (0..=MAX_HOUSEHOLD_MEMBERS)
            .map(|i| HouseholdMember {
                name: format!("member-{i}"),
                age: 20,
                relationship: String::new(),
            })
            .collect();
        assert!(matches!(
            validate_profile(p),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn canonical_tag_joins_words() {
        assert_eq!(canonical_tag("  Limited   Mobility "), "limited-mobility");
    }
}
