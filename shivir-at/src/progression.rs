//! Curriculum progression rules
//!
//! A person may attend every level up to their current one (revision) plus
//! the next level (progression). FESTIVAL is open to everyone. A missing or
//! unrecognized level counts as a new user, eligible only for MA.

use shivir_common::SessionType;
use std::collections::BTreeSet;

/// Result of an eligibility check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// New user (no level) at a session other than MA
    NewUserMustStart,
    NotEligible,
}

/// Session types a person at `level` may attend
pub fn eligible_types(level: Option<SessionType>) -> BTreeSet<SessionType> {
    // Index of the next level to progress into; a new user's next level is MA
    let next = level
        .and_then(|l| l.curriculum_index())
        .map_or(0, |index| index + 1);

    let upto = (next + 1).min(SessionType::CURRICULUM.len());
    let mut types: BTreeSet<SessionType> = SessionType::CURRICULUM[..upto].iter().copied().collect();
    types.insert(SessionType::Festival);
    types
}

pub fn is_eligible(level: Option<SessionType>, session_type: SessionType) -> bool {
    session_type.is_festival() || eligible_types(level).contains(&session_type)
}

/// Classify eligibility, distinguishing new users from skipping ahead
pub fn check(level: Option<SessionType>, session_type: SessionType) -> Eligibility {
    if is_eligible(level, session_type) {
        Eligibility::Eligible
    } else if level.is_none() {
        Eligibility::NewUserMustStart
    } else {
        Eligibility::NotEligible
    }
}

/// Whether completing `completed` should become the person's new level
///
/// Never regresses: completing a revision of a lower level keeps the
/// current one. FESTIVAL never changes the level.
pub fn should_advance_level(current: Option<SessionType>, completed: SessionType) -> bool {
    let Some(completed_index) = completed.curriculum_index() else {
        return false;
    };
    match current.and_then(|c| c.curriculum_index()) {
        Some(current_index) => completed_index >= current_index,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionType::*;

    fn set(types: &[SessionType]) -> BTreeSet<SessionType> {
        types.iter().copied().collect()
    }

    #[test]
    fn test_new_user_is_eligible_for_ma_and_festival() {
        assert_eq!(eligible_types(None), set(&[Ma, Festival]));
        assert_eq!(eligible_types(SessionType::parse_level(Some(""))), set(&[Ma, Festival]));
        assert_eq!(eligible_types(SessionType::parse_level(Some("garbled"))), set(&[Ma, Festival]));
    }

    #[test]
    fn test_each_level_allows_revision_and_one_step_ahead() {
        assert_eq!(eligible_types(Some(Ma)), set(&[Ma, Ssp1, Festival]));
        assert_eq!(eligible_types(Some(Ssp1)), set(&[Ma, Ssp1, Ssp2, Festival]));
        assert_eq!(eligible_types(Some(Ssp2)), set(&[Ma, Ssp1, Ssp2, Hs1, Festival]));
        assert_eq!(eligible_types(Some(Hs1)), set(&[Ma, Ssp1, Ssp2, Hs1, Hs2, Festival]));
        assert_eq!(eligible_types(Some(Hs2)), set(&[Ma, Ssp1, Ssp2, Hs1, Hs2, Festival]));
    }

    #[test]
    fn test_festival_level_text_is_treated_as_new_user() {
        assert_eq!(eligible_types(Some(Festival)), set(&[Ma, Festival]));
    }

    #[test]
    fn test_festival_is_always_eligible() {
        for level in [None, Some(Ma), Some(Hs2)] {
            assert!(is_eligible(level, Festival));
        }
    }

    #[test]
    fn test_check_classification() {
        assert_eq!(check(None, Ma), Eligibility::Eligible);
        assert_eq!(check(None, Ssp1), Eligibility::NewUserMustStart);
        assert_eq!(check(Some(Ma), Ssp2), Eligibility::NotEligible);
        assert_eq!(check(Some(Ma), Ssp1), Eligibility::Eligible);
        assert_eq!(check(Some(Ssp2), Ma), Eligibility::Eligible);
    }

    #[test]
    fn test_level_never_regresses() {
        assert!(should_advance_level(None, Ma));
        assert!(should_advance_level(Some(Ma), Ssp1));
        assert!(should_advance_level(Some(Ssp2), Ssp2));
        assert!(!should_advance_level(Some(Ssp2), Ma));
        assert!(!should_advance_level(Some(Hs2), Hs1));
        assert!(!should_advance_level(None, Festival));
        assert!(!should_advance_level(Some(Ma), Festival));
    }
}
