//! Reliability scoring from vote tallies.
//!
//! The score is the share of confirming votes. An incident is retired
//! when either rule fires:
//!
//! * **ratio**: score below [`DEACTIVATION_SCORE`] once at least
//!   [`MIN_VOTES_FOR_RATIO`] votes are in, or
//! * **panic**: at least [`PANIC_DOWN_VOTES`] down-votes outnumbering the
//!   up-votes, regardless of the ratio.
//!
//! Both rules are monotone: more up-votes never lower the score or retire
//! an incident, more down-votes never raise the score or revive one.

use road_watch_incident_models::VoteTally;

/// Score below which an incident with enough votes is retired.
pub const DEACTIVATION_SCORE: f64 = 0.3;

/// Minimum number of votes before the ratio rule applies.
pub const MIN_VOTES_FOR_RATIO: u32 = 3;

/// Down-votes needed for the panic rule.
pub const PANIC_DOWN_VOTES: u32 = 3;

/// Output of the reliability engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reliability {
    /// Confidence in `[0, 1]`.
    pub score: f64,
    /// Whether the incident should stay active.
    pub active: bool,
}

/// Computes the reliability score and active flag for `tally`.
///
/// With no votes the score is `1.0`.
#[must_use]
pub fn compute(tally: VoteTally) -> Reliability {
    let total = tally.total();
    let score = if total == 0 {
        1.0
    } else {
        f64::from(tally.up) / f64::from(total)
    };

    let ratio_rule = total >= MIN_VOTES_FOR_RATIO && score < DEACTIVATION_SCORE;
    let panic_rule = tally.down >= PANIC_DOWN_VOTES && tally.down > tally.up;

    Reliability {
        score,
        active: !(ratio_rule || panic_rule),
    }
}

/// Like [`compute`], but never re-activates an incident that is already
/// inactive. Deactivation is a one-way latch once persisted.
#[must_use]
pub fn evaluate(previously_active: bool, tally: VoteTally) -> Reliability {
    let computed = compute(tally);
    Reliability {
        score: computed.score,
        active: previously_active && computed.active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_votes_gets_benefit_of_the_doubt() {
        let r = compute(VoteTally::new(0, 0));
        assert!((r.score - 1.0).abs() < f64::EPSILON);
        assert!(r.active);
    }

    #[test]
    fn ratio_rule_deactivates() {
        let r = compute(VoteTally::new(1, 3));
        assert!((r.score - 0.25).abs() < f64::EPSILON);
        assert!(!r.active);

        let r = compute(VoteTally::new(3, 1));
        assert!((r.score - 0.75).abs() < f64::EPSILON);
        assert!(r.active);
    }

    #[test]
    fn ratio_rule_needs_minimum_votes() {
        // Score 0 but only two votes.
        let r = compute(VoteTally::new(0, 2));
        assert!(r.score.abs() < f64::EPSILON);
        assert!(r.active);
    }

    #[test]
    fn panic_rule_overrides_ratio() {
        // Score 3/7 ~ 0.43 passes the ratio rule, but 4 downs beat 3 ups.
        let r = compute(VoteTally::new(3, 4));
        assert!(r.score > DEACTIVATION_SCORE);
        assert!(!r.active);

        // Tied counts do not trigger it.
        assert!(compute(VoteTally::new(4, 4)).active);
    }

    #[test]
    fn three_down_votes_deactivate_fresh_incident() {
        let r = compute(VoteTally::new(0, 3));
        assert!(r.score <= DEACTIVATION_SCORE);
        assert!(!r.active);
    }

    #[test]
    fn score_is_monotone() {
        for up in 0..20 {
            for down in 0..20 {
                let base = compute(VoteTally::new(up, down));
                let more_up = compute(VoteTally::new(up + 1, down));
                let more_down = compute(VoteTally::new(up, down + 1));

                assert!(more_up.score >= base.score, "up+1 at ({up}, {down})");
                assert!(more_down.score <= base.score, "down+1 at ({up}, {down})");
                assert!(
                    !base.active || more_up.active,
                    "up+1 deactivated at ({up}, {down})"
                );
                assert!(
                    base.active || !more_down.active,
                    "down+1 reactivated at ({up}, {down})"
                );
            }
        }
    }

    #[test]
    fn evaluate_is_sticky() {
        let r = evaluate(false, VoteTally::new(10, 0));
        assert!((r.score - 1.0).abs() < f64::EPSILON);
        assert!(!r.active);

        assert!(evaluate(true, VoteTally::new(10, 0)).active);
        assert!(!evaluate(true, VoteTally::new(0, 3)).active);
    }
}
