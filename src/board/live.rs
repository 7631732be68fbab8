//! Live collaborator updates over server-sent events.
//!
//! A connection task owns the socket and the reconnect state machine; it
//! parses frames and queues them for a single reconciler task, which applies
//! them to the store one at a time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::events::{CANDIDATE_UPDATED, CandidateEvent, SseDecoder, SseFrame};
use super::models::SessionUser;
use super::store::BoardStore;
use crate::errors::GatewayError;

const EVENT_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    /// Retries used up; nothing reconnects until a new channel is started.
    Exhausted,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^retry, max)`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// What the driver should do after a connection attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    RetryAfter(Duration),
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct ChannelMachine {
    policy: ReconnectPolicy,
    state: ChannelState,
    retries: u32,
}

impl ChannelMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ChannelState::Disconnected,
            retries: 0,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn connecting(&mut self) {
        self.state = ChannelState::Connecting;
    }

    pub fn opened(&mut self) {
        self.state = ChannelState::Connected;
        self.retries = 0;
    }

    /// The attempt failed or the open connection dropped.
    pub fn failed(&mut self) -> Transition {
        if self.retries < self.policy.max_retries {
            let delay = self.policy.delay_for(self.retries);
            self.retries += 1;
            self.state = ChannelState::Disconnected;
            Transition::RetryAfter(delay)
        } else {
            self.state = ChannelState::Exhausted;
            Transition::GiveUp
        }
    }

    pub fn closed(&mut self) {
        self.state = ChannelState::Disconnected;
    }
}

// ── Transport ────────────────────────────────────────────────────────

pub type FrameStream = BoxStream<'static, Result<SseFrame, GatewayError>>;

/// Opens a live frame stream for a job.
/// Real implementation: `HttpEventSource`.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn connect(&self, job_id: &str, user: &SessionUser) -> Result<FrameStream, GatewayError>;
}

pub struct HttpEventSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEventSource {
    /// The stream is long-lived, so only connecting is bounded by `connect_timeout`.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn connect(&self, job_id: &str, user: &SessionUser) -> Result<FrameStream, GatewayError> {
        let url = format!("{}/jobs/{}/candidates/stream", self.base_url, job_id);
        debug!(%url, "opening live stream");
        let resp = self
            .client
            .get(&url)
            .query(&[("user", user.name.as_str()), ("color", user.color.as_str())])
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(GatewayError::Status {
                status: resp.status().as_u16(),
            });
        }

        let mut decoder = SseDecoder::new();
        let frames = resp.bytes_stream().flat_map(move |chunk| {
            let items: Vec<Result<SseFrame, GatewayError>> = match chunk {
                Ok(bytes) => match decoder.push(&bytes) {
                    Ok(frames) => frames.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                },
                Err(e) => vec![Err(GatewayError::Stream(e.to_string()))],
            };
            stream::iter(items)
        });
        Ok(frames.boxed())
    }
}

// ── Driver ───────────────────────────────────────────────────────────

pub struct LiveChannel;

impl LiveChannel {
    /// Start following the store's job as its session user.
    ///
    /// Returns `None` until the store has both a job id and a session.
    pub fn spawn(
        store: Arc<BoardStore>,
        source: Arc<dyn EventSource>,
        policy: ReconnectPolicy,
    ) -> Option<LiveChannelHandle> {
        let (job_id, user) = store.live_target()?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let reconciler = tokio::spawn(run_reconciler(store.clone(), job_id.clone(), events_rx));
        let connection = tokio::spawn(run_connection(
            store,
            source,
            policy,
            job_id,
            user,
            events_tx,
            shutdown_rx,
        ));

        Some(LiveChannelHandle {
            shutdown: Some(shutdown_tx),
            connection: Some(connection),
            reconciler: Some(reconciler),
        })
    }
}

/// Owner of a running live channel. Dropping it tears the channel down.
pub struct LiveChannelHandle {
    shutdown: Option<oneshot::Sender<()>>,
    connection: Option<JoinHandle<()>>,
    reconciler: Option<JoinHandle<()>>,
}

impl LiveChannelHandle {
    /// Close the connection and wait until queued events are applied.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.join().await;
    }

    /// Wait for the channel to stop on its own (retries exhausted).
    pub async fn finished(&mut self) {
        self.join().await;
    }

    async fn join(&mut self) {
        if let Some(task) = self.connection.take()
            && let Err(e) = task.await
        {
            error!(error = %e, "live connection task failed");
        }
        if let Some(task) = self.reconciler.take()
            && let Err(e) = task.await
        {
            error!(error = %e, "live reconciler task failed");
        }
    }
}

impl Drop for LiveChannelHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn run_connection(
    store: Arc<BoardStore>,
    source: Arc<dyn EventSource>,
    policy: ReconnectPolicy,
    job_id: String,
    user: SessionUser,
    events: mpsc::Sender<CandidateEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut machine = ChannelMachine::new(policy);
    let mut jobs = store.watch_job();

    'channel: loop {
        machine.connecting();
        store.set_connection_state(&job_id, machine.state());

        let attempt = tokio::select! {
            _ = &mut shutdown => break 'channel,
            _ = job_switched(&mut jobs, &job_id) => break 'channel,
            attempt = source.connect(&job_id, &user) => attempt,
        };

        match attempt {
            Ok(mut frames) => {
                machine.opened();
                store.set_connection_state(&job_id, machine.state());
                info!(%job_id, "live updates connected");

                loop {
                    let next = tokio::select! {
                        _ = &mut shutdown => break 'channel,
                        _ = job_switched(&mut jobs, &job_id) => break 'channel,
                        next = frames.next() => next,
                    };
                    match next {
                        Some(Ok(frame)) => forward(frame, &events).await,
                        Some(Err(e)) => {
                            warn!(%job_id, error = %e, "live stream failed");
                            break;
                        }
                        None => {
                            info!(%job_id, "live stream closed by server");
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!(%job_id, error = %e, "live connection failed"),
        }

        match machine.failed() {
            Transition::RetryAfter(delay) => {
                store.set_connection_state(&job_id, machine.state());
                debug!(%job_id, retry = machine.retries(), ?delay, "reconnecting");
                tokio::select! {
                    _ = &mut shutdown => break 'channel,
                    _ = job_switched(&mut jobs, &job_id) => break 'channel,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Transition::GiveUp => {
                error!(%job_id, "live updates gave up reconnecting");
                store.set_connection_state(&job_id, machine.state());
                return;
            }
        }
    }

    machine.closed();
    store.set_connection_state(&job_id, machine.state());
    debug!(%job_id, "live channel closed");
}

/// Resolves once the store follows a job other than `job_id`.
async fn job_switched(jobs: &mut watch::Receiver<Option<String>>, job_id: &str) {
    loop {
        if jobs.borrow_and_update().as_deref() != Some(job_id) {
            info!(%job_id, "board switched jobs, closing live channel");
            return;
        }
        if jobs.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn forward(frame: SseFrame, events: &mpsc::Sender<CandidateEvent>) {
    if frame.event.as_deref() != Some(CANDIDATE_UPDATED) {
        debug!(event = ?frame.event, "ignoring frame");
        return;
    }
    match CandidateEvent::parse(&frame.data) {
        Ok(event) => {
            if events.send(event).await.is_err() {
                warn!("reconciler stopped, dropping live event");
            }
        }
        Err(e) => warn!(error = %e, "dropping malformed live event"),
    }
}

async fn run_reconciler(
    store: Arc<BoardStore>,
    job_id: String,
    mut events: mpsc::Receiver<CandidateEvent>,
) {
    while let Some(event) = events.recv().await {
        let candidate_id = event.candidate.id;
        match store.apply_remote_event(&job_id, &event) {
            Ok(outcome) => debug!(candidate_id, ?outcome, "live event applied"),
            Err(e) => warn!(candidate_id, error = %e, "live event rejected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures::channel::mpsc::{UnboundedReceiver, unbounded};
    use tokio::time::Instant;

    use super::*;
    use crate::board::models::CandidateStatus;
    use crate::board::store::CONNECTION_EXHAUSTED;
    use crate::board::testing::{FakeGateway, a_candidate, a_job, a_user, first_page};

    enum Script {
        Refuse,
        /// Deliver frames, then end the stream.
        Open(Vec<Result<SseFrame, GatewayError>>),
        /// Deliver frames, then stay open.
        Hold(Vec<SseFrame>),
        /// Deliver whatever the test sends, for as long as it keeps the sender.
        Live(UnboundedReceiver<SseFrame>),
    }

    struct FakeSource {
        scripts: Mutex<VecDeque<Script>>,
        connects: Mutex<Vec<Instant>>,
    }

    impl FakeSource {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                connects: Mutex::new(Vec::new()),
            })
        }

        fn connect_offsets(&self, start: Instant) -> Vec<u64> {
            self.connects
                .lock()
                .unwrap()
                .iter()
                .map(|t| t.duration_since(start).as_secs())
                .collect()
        }
    }

    #[async_trait]
    impl EventSource for FakeSource {
        async fn connect(&self, _job_id: &str, _user: &SessionUser) -> Result<FrameStream, GatewayError> {
            self.connects.lock().unwrap().push(Instant::now());
            let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::Refuse);
            match script {
                Script::Refuse => Err(GatewayError::Status { status: 503 }),
                Script::Open(frames) => Ok(stream::iter(frames).boxed()),
                Script::Hold(frames) => Ok(stream::iter(frames.into_iter().map(Ok))
                    .chain(stream::pending())
                    .boxed()),
                Script::Live(frames) => Ok(frames.map(Ok).boxed()),
            }
        }
    }

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
            id: None,
        }
    }

    fn candidate_frame(kind: &str, id: i64, position: f64, actor: &str) -> SseFrame {
        let candidate = a_candidate(id).status(CandidateStatus::Interview).position(position).build();
        let data = serde_json::json!({
            "kind": kind,
            "candidate": candidate,
            "user": a_user(actor),
            "columns": {"new": 1, "interview": 4},
        });
        frame(CANDIDATE_UPDATED, &data.to_string())
    }

    fn store() -> Arc<BoardStore> {
        Arc::new(BoardStore::new(
            Arc::new(FakeGateway::new()),
            Some("1".to_string()),
            Some(a_user("alice")),
        ))
    }

    async fn wait_for(store: &BoardStore, check: impl Fn(&BoardStore) -> bool) {
        let mut revisions = store.subscribe();
        tokio::time::timeout(Duration::from_secs(60), async {
            while !check(store) {
                revisions.changed().await.unwrap();
            }
        })
        .await
        .expect("condition never reached");
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<_> = (0..6).map(|r| policy.delay_for(r).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000, 10_000]);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn test_machine_exhausts_after_max_retries() {
        let mut machine = ChannelMachine::new(ReconnectPolicy::default());
        let mut transitions = Vec::new();
        for _ in 0..4 {
            machine.connecting();
            transitions.push(machine.failed());
        }
        assert_eq!(
            transitions,
            vec![
                Transition::RetryAfter(Duration::from_secs(1)),
                Transition::RetryAfter(Duration::from_secs(2)),
                Transition::RetryAfter(Duration::from_secs(4)),
                Transition::GiveUp,
            ]
        );
        assert_eq!(machine.state(), ChannelState::Exhausted);
    }

    #[test]
    fn test_machine_open_resets_retries() {
        let mut machine = ChannelMachine::new(ReconnectPolicy::default());
        machine.failed();
        machine.failed();
        machine.opened();
        assert_eq!(machine.retries(), 0);
        assert_eq!(machine.state(), ChannelState::Connected);
        assert_eq!(machine.failed(), Transition::RetryAfter(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_spawn_requires_session() {
        let store = Arc::new(BoardStore::new(Arc::new(FakeGateway::new()), Some("1".into()), None));
        let source = FakeSource::new(vec![]);
        assert!(LiveChannel::spawn(store, source, ReconnectPolicy::default()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_with_backoff_then_exhausts() {
        let store = store();
        let source = FakeSource::new(vec![]);
        let start = Instant::now();

        let mut handle =
            LiveChannel::spawn(store.clone(), source.clone(), ReconnectPolicy::default()).unwrap();
        handle.finished().await;

        assert_eq!(source.connect_offsets(start), vec![0, 1, 3, 7]);
        let state = store.state();
        assert_eq!(state.connection, ChannelState::Exhausted);
        assert_eq!(state.error.map(|e| e.message).as_deref(), Some(CONNECTION_EXHAUSTED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_open_resets_backoff() {
        let store = store();
        let source = FakeSource::new(vec![Script::Refuse, Script::Open(vec![])]);
        let start = Instant::now();

        let mut handle =
            LiveChannel::spawn(store.clone(), source.clone(), ReconnectPolicy::default()).unwrap();
        handle.finished().await;

        // refused, opened at 1s and dropped, then 1s/2s/4s again
        assert_eq!(source.connect_offsets(start), vec![0, 1, 2, 4, 8]);
        assert_eq!(store.state().connection, ChannelState::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_triggers_reconnect() {
        let store = store();
        let source = FakeSource::new(vec![
            Script::Open(vec![Err(GatewayError::Stream("reset".into()))]),
            Script::Hold(vec![]),
        ]);

        let handle =
            LiveChannel::spawn(store.clone(), source.clone(), ReconnectPolicy::default()).unwrap();
        wait_for(&store, |s| {
            s.state().connection == ChannelState::Connected && source.connects.lock().unwrap().len() == 2
        })
        .await;
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_collaborator_events_reach_the_board() {
        let gateway = FakeGateway::new()
            .with_job(Ok(a_job("1", "Engineer")))
            .with_page(Ok(first_page(vec![a_candidate(1).build()])));
        let store = Arc::new(BoardStore::new(
            Arc::new(gateway),
            Some("1".to_string()),
            Some(a_user("alice")),
        ));
        store.load_initial(Some("1".to_string())).await.unwrap();

        let source = FakeSource::new(vec![Script::Hold(vec![
            frame(CANDIDATE_UPDATED, "{not json"),
            frame("presence_diff", "{}"),
            candidate_frame("add", 8, 1000.0, "alice"),
            candidate_frame("add", 9, 1000.0, "bob"),
        ])]);
        let handle =
            LiveChannel::spawn(store.clone(), source, ReconnectPolicy::default()).unwrap();

        wait_for(&store, |s| s.state().find(9).is_some()).await;

        let state = store.state();
        assert!(state.find(8).is_none(), "own event must not add cards");
        assert_eq!(state.candidates.len(), 2);
        assert_eq!(state.column_counts.get("interview"), Some(&4));
        assert!(state.error.is_none());
        assert_eq!(state.connection, ChannelState::Connected);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_resets_to_disconnected() {
        let store = store();
        let source = FakeSource::new(vec![Script::Hold(vec![])]);
        let handle =
            LiveChannel::spawn(store.clone(), source, ReconnectPolicy::default()).unwrap();

        wait_for(&store, |s| s.state().connection == ChannelState::Connected).await;
        handle.shutdown().await;

        assert_eq!(store.state().connection, ChannelState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_tears_down() {
        let store = store();
        let source = FakeSource::new(vec![Script::Hold(vec![])]);
        let handle =
            LiveChannel::spawn(store.clone(), source, ReconnectPolicy::default()).unwrap();

        wait_for(&store, |s| s.state().connection == ChannelState::Connected).await;
        drop(handle);

        wait_for(&store, |s| s.state().connection == ChannelState::Disconnected).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_switch_closes_channel_for_previous_job() {
        let gateway = FakeGateway::new()
            .with_job(Ok(a_job("1", "First")))
            .with_page(Ok(first_page(vec![a_candidate(1).build()])))
            .with_job(Ok(a_job("2", "Second")))
            .with_page(Ok(first_page(vec![a_candidate(50).build()])));
        let store = Arc::new(BoardStore::new(
            Arc::new(gateway),
            Some("1".to_string()),
            Some(a_user("alice")),
        ));
        store.load_initial(Some("1".to_string())).await.unwrap();

        let (frames, live) = unbounded();
        let source = FakeSource::new(vec![Script::Live(live)]);
        let mut handle =
            LiveChannel::spawn(store.clone(), source.clone(), ReconnectPolicy::default()).unwrap();
        wait_for(&store, |s| s.state().connection == ChannelState::Connected).await;

        store.load_initial(Some("2".to_string())).await.unwrap();
        // Job 1 traffic still in the pipe must not land on job 2's board.
        let _ = frames.unbounded_send(candidate_frame("add", 99, 1000.0, "bob"));
        handle.finished().await;

        let state = store.state();
        assert_eq!(state.job_id.as_deref(), Some("2"));
        let ids: Vec<_> = state.candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![50]);
        assert_eq!(state.column_counts.get("interview"), None);
        assert_eq!(state.connection, ChannelState::Disconnected);
        assert_eq!(source.connects.lock().unwrap().len(), 1);
    }
}
