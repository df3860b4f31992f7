use super::*;
use anyhow::anyhow;
use shared::{domain::Phase, error::ErrorCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
enum GraphCall {
    Followers { username: String, limit: u32 },
    Following { username: String, limit: u32 },
    Submit { actor: String, target: String, unfollow: bool },
}

struct TestGraphService {
    accounts: Vec<UserSummary>,
    fail_with: Option<String>,
    calls: Arc<Mutex<Vec<GraphCall>>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl TestGraphService {
    fn ok(accounts: &[&str]) -> Self {
        Self {
            accounts: accounts.iter().map(|name| UserSummary::new(*name)).collect(),
            fail_with: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            gate: Mutex::new(None),
        }
    }

    fn failing(err: impl Into<String>) -> Self {
        let mut service = Self::ok(&[]);
        service.fail_with = Some(err.into());
        service
    }

    fn gated(mut self, gate: oneshot::Receiver<()>) -> Self {
        self.gate = Mutex::new(Some(gate));
        self
    }

    async fn settle<T>(&self, call: GraphCall, value: T) -> Result<T> {
        self.calls.lock().await.push(call);
        let gate = self.gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match &self.fail_with {
            Some(err) => Err(anyhow!(err.clone())),
            None => Ok(value),
        }
    }
}

#[async_trait]
impl RemoteGraphService for TestGraphService {
    async fn get_followers(&self, username: &str, limit: u32) -> Result<Vec<UserSummary>> {
        let call = GraphCall::Followers {
            username: username.to_string(),
            limit,
        };
        self.settle(call, self.accounts.clone()).await
    }

    async fn get_following(&self, username: &str, limit: u32) -> Result<Vec<UserSummary>> {
        let call = GraphCall::Following {
            username: username.to_string(),
            limit,
        };
        self.settle(call, self.accounts.clone()).await
    }

    async fn submit_follow_op(&self, actor: &str, target: &str, unfollow: bool) -> Result<()> {
        let call = GraphCall::Submit {
            actor: actor.to_string(),
            target: target.to_string(),
            unfollow,
        };
        self.settle(call, ()).await
    }
}

/// Yields a different actor on every read.
struct RotatingSession {
    reads: AtomicUsize,
}

impl SessionAccessor for RotatingSession {
    fn current_actor(&self) -> Option<String> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        Some(format!("actor-{read}"))
    }
}

struct Harness {
    coordinator: FollowCoordinator,
    calls: Arc<Mutex<Vec<GraphCall>>>,
    notifier: Arc<RecordingNotifier>,
    log: Arc<EventLog>,
}

fn harness(service: TestGraphService, session: Arc<dyn SessionAccessor>) -> Harness {
    let calls = service.calls.clone();
    let notifier = Arc::new(RecordingNotifier::default());
    let log = Arc::new(EventLog::default());
    let coordinator = FollowCoordinator::new_with_dependencies(
        Arc::new(service),
        session,
        notifier.clone(),
        log.clone(),
    );
    Harness {
        coordinator,
        calls,
        notifier,
        log,
    }
}

#[tokio::test]
async fn load_followers_defaults_limit_and_echoes_it() {
    let h = harness(
        TestGraphService::ok(&["bob"]),
        Arc::new(StaticSession::anonymous()),
    );

    let terminal = h
        .coordinator
        .load_followers("alice", None)
        .await
        .expect("attempted");

    let events = h.log.snapshot();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].tag().to_string(), "FOLLOW.FOLLOWER.LOAD.INIT");
    assert_eq!(events[0].count, Some(DEFAULT_LOAD_LIMIT));
    assert_eq!(events[1].tag().to_string(), "FOLLOW.FOLLOWER.LOAD.DONE");
    assert_eq!(events[1].count, Some(1000));
    assert_eq!(events[1].subject_user, "alice");
    assert_eq!(terminal, events[1]);
    assert_eq!(
        h.calls.lock().await.clone(),
        vec![GraphCall::Followers {
            username: "alice".to_string(),
            limit: 1000
        }]
    );
    assert!(h.notifier.entries().is_empty());
}

#[tokio::test]
async fn load_failure_is_published_without_notification() {
    let h = harness(
        TestGraphService::failing("node unreachable"),
        Arc::new(StaticSession::anonymous()),
    );

    let terminal = h
        .coordinator
        .load_following("bob", Some(50))
        .await
        .expect("attempted");

    assert_eq!(terminal.phase, Phase::Error);
    assert_eq!(terminal.kind, OperationKind::FollowingLoad);
    assert_eq!(terminal.count, Some(50));
    assert!(terminal.results.is_none());
    let reason = terminal.reason.expect("reason");
    assert_eq!(reason.code, ErrorCode::Remote);
    assert_eq!(reason.message, "node unreachable");
    assert_eq!(h.log.len(), 2);
    assert!(h.notifier.entries().is_empty());
}

#[tokio::test]
async fn loads_need_no_session() {
    let h = harness(TestGraphService::ok(&[]), Arc::new(StaticSession::anonymous()));

    h.coordinator
        .load_following("bob", Some(3))
        .await
        .expect("attempted");

    assert_eq!(h.log.len(), 2);
}

#[tokio::test]
async fn invalid_load_arguments_are_rejected_before_init() {
    let h = harness(TestGraphService::ok(&[]), Arc::new(StaticSession::anonymous()));

    let err = h
        .coordinator
        .load_followers("", None)
        .await
        .expect_err("empty username");
    assert!(matches!(err, FollowError::InvalidArgument(_)));

    let err = h
        .coordinator
        .load_following("alice", Some(0))
        .await
        .expect_err("zero limit");
    assert!(matches!(err, FollowError::InvalidArgument(_)));

    assert!(h.log.is_empty());
    assert!(h.calls.lock().await.is_empty());
    assert!(h.notifier.entries().is_empty());
}

#[tokio::test]
async fn follow_without_actor_warns_and_publishes_nothing() {
    let h = harness(TestGraphService::ok(&[]), Arc::new(StaticSession::anonymous()));

    let err = h.coordinator.follow("dave").await.expect_err("rejected");
    assert_eq!(
        err,
        FollowError::NotLoggedIn {
            kind: OperationKind::Follow
        }
    );

    let err = h.coordinator.unfollow("dave").await.expect_err("rejected");
    assert_eq!(
        err,
        FollowError::NotLoggedIn {
            kind: OperationKind::Unfollow
        }
    );

    assert!(h.log.is_empty());
    assert!(h.calls.lock().await.is_empty());
    assert_eq!(
        h.notifier.entries(),
        vec![
            (Severity::Warning, FOLLOW_LOGIN_REQUIRED.to_string()),
            (Severity::Warning, UNFOLLOW_LOGIN_REQUIRED.to_string()),
        ]
    );
}

#[tokio::test]
async fn unfollow_submits_with_unfollow_flag() {
    let h = harness(
        TestGraphService::ok(&[]),
        Arc::new(StaticSession::authenticated("erin")),
    );

    let terminal = h.coordinator.unfollow("dave").await.expect("attempted");

    assert_eq!(terminal.tag().to_string(), "FOLLOW.UNFOLLOW.DONE");
    assert_eq!(terminal.count, None);
    assert!(terminal.results.is_none());
    assert_eq!(
        h.calls.lock().await.clone(),
        vec![GraphCall::Submit {
            actor: "erin".to_string(),
            target: "dave".to_string(),
            unfollow: true
        }]
    );
}

#[tokio::test]
async fn mutation_reads_session_once_and_submits_as_that_actor() {
    let session = Arc::new(RotatingSession {
        reads: AtomicUsize::new(0),
    });
    let h = harness(TestGraphService::ok(&[]), session.clone());

    h.coordinator.follow("dave").await.expect("attempted");
    h.coordinator.unfollow("dave").await.expect("attempted");

    assert_eq!(session.reads.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.calls.lock().await.clone(),
        vec![
            GraphCall::Submit {
                actor: "actor-0".to_string(),
                target: "dave".to_string(),
                unfollow: false
            },
            GraphCall::Submit {
                actor: "actor-1".to_string(),
                target: "dave".to_string(),
                unfollow: true
            },
        ]
    );
}

#[tokio::test]
async fn session_changes_between_calls_are_observed() {
    let session = Arc::new(SharedSession::default());
    let h = harness(TestGraphService::ok(&[]), session.clone());

    assert!(h.coordinator.follow("dave").await.is_err());
    session.login("erin");
    assert!(h.coordinator.follow("dave").await.is_ok());
    session.logout();
    assert!(h.coordinator.unfollow("dave").await.is_err());

    assert_eq!(h.log.len(), 2);
    assert_eq!(h.notifier.entries().len(), 2);
}

#[tokio::test]
async fn empty_follow_target_is_rejected_before_init() {
    let h = harness(
        TestGraphService::ok(&[]),
        Arc::new(StaticSession::authenticated("erin")),
    );

    let err = h.coordinator.follow("  ").await.expect_err("rejected");
    assert!(matches!(err, FollowError::InvalidArgument(_)));
    assert!(h.log.is_empty());
    assert!(h.notifier.entries().is_empty());
}

#[tokio::test]
async fn init_is_published_before_the_service_settles() {
    let (release, gate) = oneshot::channel();
    let sink = Arc::new(BroadcastEventSink::default());
    let mut rx = sink.subscribe();
    let coordinator = FollowCoordinator::new(
        Arc::new(TestGraphService::ok(&["carol"]).gated(gate)),
        Arc::new(StaticSession::anonymous()),
        sink.clone(),
    );

    let task = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.load_following("bob", Some(50)).await }
    });

    let init = rx.recv().await.expect("init");
    assert_eq!(init.phase, Phase::Init);
    assert_eq!(init.count, Some(50));
    assert!(rx.try_recv().is_err(), "terminal event before settlement");

    release.send(()).expect("release");
    let done = rx.recv().await.expect("done");
    assert_eq!(done.phase, Phase::Done);
    assert_eq!(done.subject_user, init.subject_user);
    assert_eq!(done.count, init.count);

    let terminal = task.await.expect("join").expect("attempted");
    assert_eq!(terminal, done);
}

#[tokio::test]
async fn missing_graph_service_turns_every_attempt_into_error_events() {
    let log = Arc::new(EventLog::default());
    let coordinator = FollowCoordinator::new(
        Arc::new(MissingGraphService),
        Arc::new(StaticSession::authenticated("erin")),
        log.clone(),
    );

    coordinator.load_followers("alice", None).await.expect("attempted");
    coordinator.follow("dave").await.expect("attempted");

    let phases: Vec<Phase> = log.snapshot().iter().map(|event| event.phase).collect();
    assert_eq!(
        phases,
        vec![Phase::Init, Phase::Error, Phase::Init, Phase::Error]
    );
}

struct PanickingGraphService;

#[async_trait]
impl RemoteGraphService for PanickingGraphService {
    async fn get_followers(&self, _username: &str, _limit: u32) -> Result<Vec<UserSummary>> {
        panic!("graph backend crashed");
    }

    async fn get_following(&self, _username: &str, _limit: u32) -> Result<Vec<UserSummary>> {
        panic!("graph backend crashed");
    }

    async fn submit_follow_op(&self, _actor: &str, _target: &str, _unfollow: bool) -> Result<()> {
        panic!("graph backend crashed");
    }
}

#[tokio::test]
async fn crashed_remote_task_still_closes_the_lifecycle() {
    let log = Arc::new(EventLog::default());
    let coordinator = FollowCoordinator::new(
        Arc::new(PanickingGraphService),
        Arc::new(StaticSession::authenticated("erin")),
        log.clone(),
    );

    let terminal = coordinator.follow("dave").await.expect("attempted");

    assert_eq!(terminal.phase, Phase::Error);
    let reason = terminal.reason.clone().expect("reason");
    assert!(reason.message.contains("follow task failed"), "{}", reason.message);
    assert_eq!(
        log.snapshot().iter().map(|event| event.phase).collect::<Vec<_>>(),
        vec![Phase::Init, Phase::Error]
    );
}
