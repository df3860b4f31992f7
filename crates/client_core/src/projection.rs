//! Follow graph view state derived from the lifecycle event stream.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Mutex, PoisonError},
};

use shared::{
    domain::{OperationKind, Phase, UserSummary},
    error::ErrorInfo,
    protocol::{EventTag, LifecycleEvent, TaggedEvent},
};
use tracing::debug;

use crate::sink::EventSink;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListState {
    pub loading: bool,
    pub loaded: bool,
    pub limit: Option<u32>,
    pub users: Vec<UserSummary>,
    pub last_error: Option<ErrorInfo>,
}

impl ListState {
    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.users.iter().map(|user| user.username.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingMutation {
    Follow,
    Unfollow,
}

/// Reducer over lifecycle events. Lists are keyed by subject user; follow and
/// unfollow outcomes are keyed by target.
#[derive(Debug, Clone, Default)]
pub struct FollowGraphView {
    followers: HashMap<String, ListState>,
    following: HashMap<String, ListState>,
    pending: HashMap<String, PendingMutation>,
    followed: BTreeSet<String>,
    mutation_errors: HashMap<String, ErrorInfo>,
}

impl FollowGraphView {
    pub fn apply(&mut self, event: &LifecycleEvent) {
        match event.kind {
            OperationKind::FollowerLoad => {
                Self::apply_list(self.followers.entry(event.subject_user.clone()).or_default(), event)
            }
            OperationKind::FollowingLoad => {
                Self::apply_list(self.following.entry(event.subject_user.clone()).or_default(), event)
            }
            OperationKind::Follow | OperationKind::Unfollow => self.apply_mutation(event),
        }
    }

    /// Applies an event received with its dotted wire tag. The tag decides kind and
    /// phase; unknown tags leave the view untouched and return `false`.
    pub fn apply_tagged(&mut self, tagged: &TaggedEvent) -> bool {
        let Ok(tag) = tagged.tag.parse::<EventTag>() else {
            debug!(tag = %tagged.tag, "follow view: ignoring unknown event tag");
            return false;
        };
        let mut event = tagged.event.clone();
        event.kind = tag.kind;
        event.phase = tag.phase;
        self.apply(&event);
        true
    }

    fn apply_list(state: &mut ListState, event: &LifecycleEvent) {
        match event.phase {
            Phase::Init => {
                state.loading = true;
                state.limit = event.count;
                state.last_error = None;
            }
            Phase::Done => {
                state.loading = false;
                state.loaded = true;
                state.users = event.results.clone().unwrap_or_default();
            }
            Phase::Error => {
                state.loading = false;
                state.last_error = event.reason.clone();
            }
        }
    }

    fn apply_mutation(&mut self, event: &LifecycleEvent) {
        let target = event.subject_user.clone();
        match event.phase {
            Phase::Init => {
                let pending = if event.kind == OperationKind::Unfollow {
                    PendingMutation::Unfollow
                } else {
                    PendingMutation::Follow
                };
                self.mutation_errors.remove(&target);
                self.pending.insert(target, pending);
            }
            Phase::Done => {
                self.pending.remove(&target);
                if event.kind == OperationKind::Unfollow {
                    self.followed.remove(&target);
                } else {
                    self.followed.insert(target);
                }
            }
            Phase::Error => {
                self.pending.remove(&target);
                if let Some(reason) = event.reason.clone() {
                    self.mutation_errors.insert(target, reason);
                }
            }
        }
    }

    pub fn followers(&self, username: &str) -> Option<&ListState> {
        self.followers.get(username)
    }

    pub fn following(&self, username: &str) -> Option<&ListState> {
        self.following.get(username)
    }

    pub fn pending(&self, target: &str) -> Option<PendingMutation> {
        self.pending.get(target).copied()
    }

    /// Whether a follow of `target` completed in this session and was not undone.
    pub fn is_followed(&self, target: &str) -> bool {
        self.followed.contains(target)
    }

    pub fn followed(&self) -> impl Iterator<Item = &str> {
        self.followed.iter().map(String::as_str)
    }

    pub fn mutation_error(&self, target: &str) -> Option<&ErrorInfo> {
        self.mutation_errors.get(target)
    }
}

/// Event sink that keeps a `FollowGraphView` current.
#[derive(Debug, Default)]
pub struct FollowGraphStore {
    view: Mutex<FollowGraphView>,
}

impl FollowGraphStore {
    pub fn view(&self) -> FollowGraphView {
        self.view
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for FollowGraphStore {
    fn publish(&self, event: LifecycleEvent) {
        self.view
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(&event);
    }
}

#[cfg(test)]
#[path = "tests/projection_tests.rs"]
mod tests;
