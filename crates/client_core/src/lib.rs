use std::{future::Future, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{OperationKind, UserSummary, DEFAULT_LOAD_LIMIT},
    error::ErrorInfo,
    protocol::LifecycleEvent,
};
use tracing::{debug, info, warn};

pub mod error;
pub mod graph_service;
pub mod notify;
pub mod projection;
pub mod session;
pub mod sink;

pub use error::FollowError;
pub use graph_service::{HttpGraphService, MissingGraphService};
pub use notify::{Notifier, RecordingNotifier, Severity, TracingNotifier};
pub use projection::{FollowGraphStore, FollowGraphView, ListState, PendingMutation};
pub use session::{SessionAccessor, SharedSession, StaticSession};
pub use sink::{BroadcastEventSink, EventLog, EventSink, FanoutSink};

pub const FOLLOW_LOGIN_REQUIRED: &str = "Please login first!";
pub const UNFOLLOW_LOGIN_REQUIRED: &str = "Please log in first!";

/// Remote follow graph. Calls settle exactly once with a value or a failure reason.
#[async_trait]
pub trait RemoteGraphService: Send + Sync {
    async fn get_followers(&self, username: &str, limit: u32) -> Result<Vec<UserSummary>>;
    async fn get_following(&self, username: &str, limit: u32) -> Result<Vec<UserSummary>>;
    async fn submit_follow_op(&self, actor: &str, target: &str, unfollow: bool) -> Result<()>;
}

/// Issues follower/following loads and follow/unfollow mutations, publishing one
/// init event and one terminal event per attempted invocation.
///
/// Invocations share nothing mutable, so a cloned coordinator can drive any number
/// of them concurrently. Remote calls run on spawned tokio tasks, so operations must
/// be invoked from within a tokio runtime.
#[derive(Clone)]
pub struct FollowCoordinator {
    graph: Arc<dyn RemoteGraphService>,
    session: Arc<dyn SessionAccessor>,
    notifier: Arc<dyn Notifier>,
    sink: Arc<dyn EventSink>,
}

impl FollowCoordinator {
    pub fn new(
        graph: Arc<dyn RemoteGraphService>,
        session: Arc<dyn SessionAccessor>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self::new_with_dependencies(graph, session, Arc::new(TracingNotifier), sink)
    }

    pub fn new_with_dependencies(
        graph: Arc<dyn RemoteGraphService>,
        session: Arc<dyn SessionAccessor>,
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            graph,
            session,
            notifier,
            sink,
        }
    }

    /// Loads the accounts following `username`. `limit` defaults to 1000.
    ///
    /// Returns the terminal event that was published; remote failures come back as
    /// an `Ok` error event, never as `Err`.
    pub async fn load_followers(
        &self,
        username: &str,
        limit: Option<u32>,
    ) -> Result<LifecycleEvent, FollowError> {
        self.run_load(OperationKind::FollowerLoad, username, limit)
            .await
    }

    /// Loads the accounts `username` follows. `limit` defaults to 1000.
    pub async fn load_following(
        &self,
        username: &str,
        limit: Option<u32>,
    ) -> Result<LifecycleEvent, FollowError> {
        self.run_load(OperationKind::FollowingLoad, username, limit)
            .await
    }

    /// Follows `target` as the current session actor.
    ///
    /// Without an authenticated actor the user is warned, nothing is published and
    /// `FollowError::NotLoggedIn` is returned.
    pub async fn follow(&self, target: &str) -> Result<LifecycleEvent, FollowError> {
        self.run_mutation(OperationKind::Follow, target).await
    }

    pub async fn unfollow(&self, target: &str) -> Result<LifecycleEvent, FollowError> {
        self.run_mutation(OperationKind::Unfollow, target).await
    }

    async fn run_load(
        &self,
        kind: OperationKind,
        username: &str,
        limit: Option<u32>,
    ) -> Result<LifecycleEvent, FollowError> {
        if username.trim().is_empty() {
            return Err(FollowError::InvalidArgument(format!(
                "{kind} requires a non-empty username"
            )));
        }
        let limit = limit.unwrap_or(DEFAULT_LOAD_LIMIT);
        if limit == 0 {
            return Err(FollowError::InvalidArgument(format!(
                "{kind} limit must be positive"
            )));
        }

        let init = LifecycleEvent::init(kind, username, Some(limit));
        self.publish(init.clone());

        let graph = Arc::clone(&self.graph);
        let subject = username.to_string();
        let call = async move {
            let accounts = match kind {
                OperationKind::FollowerLoad => graph.get_followers(&subject, limit).await,
                _ => graph.get_following(&subject, limit).await,
            };
            accounts.map(Some)
        };
        Ok(self.settle(init, call).await)
    }

    async fn run_mutation(
        &self,
        kind: OperationKind,
        target: &str,
    ) -> Result<LifecycleEvent, FollowError> {
        // Resolved once; the same actor is used for the submission below.
        let Some(actor) = self.session.current_actor() else {
            let message = match kind {
                OperationKind::Unfollow => UNFOLLOW_LOGIN_REQUIRED,
                _ => FOLLOW_LOGIN_REQUIRED,
            };
            info!(kind = %kind, subject = target, "follow: no authenticated actor");
            self.notifier.warn(message);
            return Err(FollowError::NotLoggedIn { kind });
        };
        if target.trim().is_empty() {
            return Err(FollowError::InvalidArgument(format!(
                "{kind} requires a non-empty target"
            )));
        }

        let init = LifecycleEvent::init(kind, target, None);
        self.publish(init.clone());

        let graph = Arc::clone(&self.graph);
        let subject = target.to_string();
        let unfollow = kind == OperationKind::Unfollow;
        let call = async move {
            graph
                .submit_follow_op(&actor, &subject, unfollow)
                .await
                .map(|()| None)
        };
        Ok(self.settle(init, call).await)
    }

    /// Runs the service call and terminal publication on their own task, so the
    /// invocation settles even if the caller stops polling after init.
    async fn settle<F>(&self, init: LifecycleEvent, call: F) -> LifecycleEvent
    where
        F: Future<Output = Result<Option<Vec<UserSummary>>>> + Send + 'static,
    {
        let sink = Arc::clone(&self.sink);
        let task_init = init.clone();
        let task = tokio::spawn(async move {
            let terminal = match call.await {
                Ok(results) => task_init.done(results),
                Err(err) => {
                    warn!(
                        kind = %task_init.kind,
                        subject = %task_init.subject_user,
                        count = ?task_init.count,
                        "follow: remote call failed: {err:#}"
                    );
                    task_init.error(error::error_info_from(&err))
                }
            };
            publish_to(sink.as_ref(), terminal.clone());
            terminal
        });

        match task.await {
            Ok(terminal) => terminal,
            Err(err) => {
                // The task died before publishing; close the lifecycle here.
                let terminal = init.error(ErrorInfo::remote(format!(
                    "{} task failed: {err}",
                    init.kind
                )));
                self.publish(terminal.clone());
                terminal
            }
        }
    }

    fn publish(&self, event: LifecycleEvent) {
        publish_to(self.sink.as_ref(), event);
    }
}

fn publish_to(sink: &dyn EventSink, event: LifecycleEvent) {
    debug!(
        tag = %event.tag(),
        subject = %event.subject_user,
        count = ?event.count,
        "follow: publishing lifecycle event"
    );
    sink.publish(event);
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
