use serde::{Deserialize, Serialize};

/// Page size used by follower/following loads when the caller does not pick one.
pub const DEFAULT_LOAD_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    FollowerLoad,
    FollowingLoad,
    Follow,
    Unfollow,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::FollowerLoad,
        OperationKind::FollowingLoad,
        OperationKind::Follow,
        OperationKind::Unfollow,
    ];

    pub fn tag_prefix(self) -> &'static str {
        match self {
            OperationKind::FollowerLoad => "FOLLOW.FOLLOWER.LOAD",
            OperationKind::FollowingLoad => "FOLLOW.FOLLOWING.LOAD",
            OperationKind::Follow => "FOLLOW.FOLLOW",
            OperationKind::Unfollow => "FOLLOW.UNFOLLOW",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::FollowerLoad => "follower_load",
            OperationKind::FollowingLoad => "following_load",
            OperationKind::Follow => "follow",
            OperationKind::Unfollow => "unfollow",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Done,
    Error,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Init, Phase::Done, Phase::Error];

    pub fn is_terminal(self) -> bool {
        !matches!(self, Phase::Init)
    }

    pub fn tag_suffix(self) -> &'static str {
        match self {
            Phase::Init => "INIT",
            Phase::Done => "DONE",
            Phase::Error => "ERROR",
        }
    }
}

/// Account entry returned by follower/following queries. Passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserSummary {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            extra: serde_json::Map::new(),
        }
    }
}
