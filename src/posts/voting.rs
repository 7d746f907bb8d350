/**
 * Vote Toggle State Machine
 *
 * Vote state per (user, item) is none, up or down. Casting a vote toggles:
 * voting the current direction again clears it, voting the opposite
 * direction moves it. The outcome carries the counter deltas to apply to
 * the item and the karma delta for the item's author, so the handlers can
 * translate one outcome into atomic `$inc`/`$pull`/`$addToSet` updates.
 *
 * Keeping this pure makes the toggle invariants testable without a
 * database: at most one vote per user per item, and counters always move
 * by exactly the number of state transitions.
 */

use serde::{Deserialize, Serialize};

/// Direction of a vote request or recorded vote
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
}

/// Result of applying a vote request to the current state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteOutcome {
    /// State after the request (None when the vote was toggled off)
    pub new_state: Option<VoteDirection>,
    /// Delta to apply to the item's upvote counter
    pub up_delta: i64,
    /// Delta to apply to the item's downvote counter
    pub down_delta: i64,
}

impl VoteOutcome {
    /// Net karma change for the item's author (upvotes minus downvotes)
    pub fn karma_delta(&self) -> i64 {
        self.up_delta - self.down_delta
    }

    /// True exactly for a fresh upvote (the only vote that notifies)
    pub fn is_first_upvote(&self) -> bool {
        self.new_state == Some(VoteDirection::Up) && self.up_delta == 1 && self.down_delta == 0
    }
}

/// Apply a vote request to the current vote state
pub fn apply_vote(current: Option<VoteDirection>, requested: VoteDirection) -> VoteOutcome {
    match (current, requested) {
        // fresh vote
        (None, VoteDirection::Up) => VoteOutcome {
            new_state: Some(VoteDirection::Up),
            up_delta: 1,
            down_delta: 0,
        },
        (None, VoteDirection::Down) => VoteOutcome {
            new_state: Some(VoteDirection::Down),
            up_delta: 0,
            down_delta: 1,
        },
        // toggle off
        (Some(VoteDirection::Up), VoteDirection::Up) => VoteOutcome {
            new_state: None,
            up_delta: -1,
            down_delta: 0,
        },
        (Some(VoteDirection::Down), VoteDirection::Down) => VoteOutcome {
            new_state: None,
            up_delta: 0,
            down_delta: -1,
        },
        // switch direction
        (Some(VoteDirection::Down), VoteDirection::Up) => VoteOutcome {
            new_state: Some(VoteDirection::Up),
            up_delta: 1,
            down_delta: -1,
        },
        (Some(VoteDirection::Up), VoteDirection::Down) => VoteOutcome {
            new_state: Some(VoteDirection::Down),
            up_delta: -1,
            down_delta: 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_upvote() {
        let outcome = apply_vote(None, VoteDirection::Up);
        assert_eq!(outcome.new_state, Some(VoteDirection::Up));
        assert_eq!(outcome.up_delta, 1);
        assert_eq!(outcome.down_delta, 0);
        assert_eq!(outcome.karma_delta(), 1);
        assert!(outcome.is_first_upvote());
    }

    #[test]
    fn test_fresh_downvote() {
        let outcome = apply_vote(None, VoteDirection::Down);
        assert_eq!(outcome.new_state, Some(VoteDirection::Down));
        assert_eq!(outcome.karma_delta(), -1);
        assert!(!outcome.is_first_upvote());
    }

    #[test]
    fn test_upvote_twice_toggles_off() {
        let outcome = apply_vote(Some(VoteDirection::Up), VoteDirection::Up);
        assert_eq!(outcome.new_state, None);
        assert_eq!(outcome.up_delta, -1);
        assert_eq!(outcome.karma_delta(), -1);
    }

    #[test]
    fn test_switch_down_to_up() {
        let outcome = apply_vote(Some(VoteDirection::Down), VoteDirection::Up);
        assert_eq!(outcome.new_state, Some(VoteDirection::Up));
        assert_eq!(outcome.up_delta, 1);
        assert_eq!(outcome.down_delta, -1);
        // down removed and up added: net +2 karma
        assert_eq!(outcome.karma_delta(), 2);
        // switching is not a fresh upvote, no notification
        assert!(!outcome.is_first_upvote());
    }

    #[test]
    fn test_switch_up_to_down() {
        let outcome = apply_vote(Some(VoteDirection::Up), VoteDirection::Down);
        assert_eq!(outcome.new_state, Some(VoteDirection::Down));
        assert_eq!(outcome.karma_delta(), -2);
    }

    #[test]
    fn test_toggle_sequence_returns_to_zero() {
        // up, up-off, down, down-off: all counters must cancel out
        let mut state = None;
        let mut up = 0i64;
        let mut down = 0i64;
        for dir in [
            VoteDirection::Up,
            VoteDirection::Up,
            VoteDirection::Down,
            VoteDirection::Down,
        ] {
            let outcome = apply_vote(state, dir);
            state = outcome.new_state;
            up += outcome.up_delta;
            down += outcome.down_delta;
        }
        assert_eq!(state, None);
        assert_eq!(up, 0);
        assert_eq!(down, 0);
    }

    #[test]
    fn test_direction_parses_from_request_json() {
        let dir: VoteDirection = serde_json::from_str("\"up\"").unwrap();
        assert_eq!(dir, VoteDirection::Up);
        let dir: VoteDirection = serde_json::from_str("\"down\"").unwrap();
        assert_eq!(dir, VoteDirection::Down);
    }
}
