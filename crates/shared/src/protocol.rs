use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::{OperationKind, Phase, UserSummary},
    error::ErrorInfo,
};

/// One phase of one coordinator invocation. Terminal events are derived from
/// their init event so `subject_user` and `count` always correlate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: OperationKind,
    pub phase: Phase,
    pub subject_user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<UserSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorInfo>,
}

impl LifecycleEvent {
    pub fn init(kind: OperationKind, subject_user: impl Into<String>, count: Option<u32>) -> Self {
        Self {
            kind,
            phase: Phase::Init,
            subject_user: subject_user.into(),
            count,
            results: None,
            reason: None,
        }
    }

    pub fn done(&self, results: Option<Vec<UserSummary>>) -> Self {
        Self {
            kind: self.kind,
            phase: Phase::Done,
            subject_user: self.subject_user.clone(),
            count: self.count,
            results,
            reason: None,
        }
    }

    pub fn error(&self, reason: ErrorInfo) -> Self {
        Self {
            kind: self.kind,
            phase: Phase::Error,
            subject_user: self.subject_user.clone(),
            count: self.count,
            results: None,
            reason: Some(reason),
        }
    }

    pub fn tag(&self) -> EventTag {
        EventTag::new(self.kind, self.phase)
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// Dotted event type, e.g. `FOLLOW.FOLLOWER.LOAD.INIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventTag {
    pub kind: OperationKind,
    pub phase: Phase,
}

impl EventTag {
    pub fn new(kind: OperationKind, phase: Phase) -> Self {
        Self { kind, phase }
    }

    pub fn all() -> impl Iterator<Item = EventTag> {
        OperationKind::ALL
            .into_iter()
            .flat_map(|kind| Phase::ALL.into_iter().map(move |phase| EventTag::new(kind, phase)))
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind.tag_prefix(), self.phase.tag_suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event tag '{0}'")]
pub struct UnknownEventTag(pub String);

impl FromStr for EventTag {
    type Err = UnknownEventTag;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (prefix, suffix) = raw
            .rsplit_once('.')
            .ok_or_else(|| UnknownEventTag(raw.to_string()))?;
        let kind = OperationKind::ALL
            .into_iter()
            .find(|kind| kind.tag_prefix() == prefix);
        let phase = Phase::ALL
            .into_iter()
            .find(|phase| phase.tag_suffix() == suffix);
        match (kind, phase) {
            (Some(kind), Some(phase)) => Ok(EventTag::new(kind, phase)),
            _ => Err(UnknownEventTag(raw.to_string())),
        }
    }
}

/// Event as it appears on the wire: the dotted tag alongside the event fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedEvent {
    #[serde(rename = "type")]
    pub tag: String,
    #[serde(flatten)]
    pub event: LifecycleEvent,
}

impl From<LifecycleEvent> for TaggedEvent {
    fn from(event: LifecycleEvent) -> Self {
        Self {
            tag: event.tag().to_string(),
            event,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowListQuery {
    pub limit: u32,
}

/// Body of the follow custom operation. An empty `what` list retracts a follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowOperation {
    pub follower: String,
    pub following: String,
    pub what: Vec<String>,
}

impl FollowOperation {
    pub const FOLLOW_BLOG: &'static str = "blog";

    pub fn new(follower: impl Into<String>, following: impl Into<String>, unfollow: bool) -> Self {
        let what = if unfollow {
            Vec::new()
        } else {
            vec![Self::FOLLOW_BLOG.to_string()]
        };
        Self {
            follower: follower.into(),
            following: following.into(),
            what,
        }
    }

    pub fn is_unfollow(&self) -> bool {
        self.what.is_empty()
    }
}
