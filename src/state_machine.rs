//! The like/dislike state machine applied by every record store.
//!
//! Each (user, file) pair is in one of three states. A reaction request moves the
//! pair to its next state and yields the counter deltas the store must apply in the
//! same atomic unit as the reaction record change.

use serde::{Deserialize, Serialize};

use crate::storage::models::Reaction;
use crate::storage::StoreError;

/// Reaction state of one (user, file) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionState {
    Disliked,
    Liked,
    #[default]
    None,
}

impl ReactionState {
    pub fn from_reaction(reaction: Option<Reaction>) -> Self {
        match reaction {
            Some(Reaction::Like) => ReactionState::Liked,
            Some(Reaction::Dislike) => ReactionState::Disliked,
            None => ReactionState::None,
        }
    }

    /// The reaction record this state corresponds to, if any.
    pub fn reaction(self) -> Option<Reaction> {
        match self {
            ReactionState::Liked => Some(Reaction::Like),
            ReactionState::Disliked => Some(Reaction::Dislike),
            ReactionState::None => None,
        }
    }
}

/// Next state plus the counter changes that go with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: ReactionState,
    pub like_delta: i64,
    pub dislike_delta: i64,
}

/// Compute the transition for `desired` applied on top of `current`.
pub fn transition(current: ReactionState, desired: Reaction) -> Transition {
    match current.reaction() {
        None => with_deltas(ReactionState::from_reaction(Some(desired)), &[(desired, 1)]),
        Some(existing) if existing == desired => {
            with_deltas(ReactionState::None, &[(desired, -1)])
        }
        Some(previous) => with_deltas(
            ReactionState::from_reaction(Some(desired)),
            &[(desired, 1), (previous, -1)],
        ),
    }
}

fn with_deltas(next: ReactionState, changes: &[(Reaction, i64)]) -> Transition {
    let mut transition = Transition {
        next,
        like_delta: 0,
        dislike_delta: 0,
    };
    for (reaction, amount) in changes {
        match reaction {
            Reaction::Like => transition.like_delta += amount,
            Reaction::Dislike => transition.dislike_delta += amount,
        }
    }
    transition
}

impl Transition {
    /// Apply the deltas to a file's counters. A counter may never go below zero.
    pub fn apply_to(&self, likes: u64, dislikes: u64) -> Result<(u64, u64), StoreError> {
        Ok((
            apply_delta(likes, self.like_delta, "likes")?,
            apply_delta(dislikes, self.dislike_delta, "dislikes")?,
        ))
    }
}

fn apply_delta(counter: u64, delta: i64, name: &str) -> Result<u64, StoreError> {
    let updated = if delta >= 0 {
        counter.checked_add(delta.unsigned_abs())
    } else {
        counter.checked_sub(delta.unsigned_abs())
    };
    updated.ok_or_else(|| {
        StoreError::ConstraintViolation(format!(
            "{name} counter {counter} cannot change by {delta}"
        ))
    })
}
