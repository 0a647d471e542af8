//! End-to-end tests driving the session controller through its
//! command/event channels with fake collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc::{Receiver, Sender};

use stagecast_channel::{
    channel_events, ChannelError, ChannelEvent, ChannelResult, ConnectionState, Credential,
    CredentialIssuer, MediaChannel, Role,
};
use stagecast_media::{MediaBackend, MediaResult, MediaTrack, TrackPair};
use stagecast_session::{SessionController, StatusSink, StatusSinkError, StreamStatus};
use stagecast_types::{
    command_channel, event_channel, BroadcastConfig, DeviceDescriptor, DeviceKind,
    DeviceSelection, SessionCommand, SessionErrorKind, SessionEvent, SessionPhase,
    VideoConstraints,
};

struct FakeTrack {
    closed: AtomicBool,
}

impl FakeTrack {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            closed: AtomicBool::new(false),
        })
    }
}

impl MediaTrack for FakeTrack {
    fn set_enabled(&self, _enabled: bool) {}

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct FakeBackend {
    acquisitions: AtomicUsize,
    last_pair: Mutex<Option<TrackPair>>,
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn enumerate(&self) -> MediaResult<Vec<DeviceDescriptor>> {
        Ok(vec![DeviceDescriptor {
            id: "cam-1".to_string(),
            label: "Front Camera".to_string(),
            kind: DeviceKind::Camera,
            is_default: true,
        }])
    }

    async fn acquire(
        &self,
        _selection: &DeviceSelection,
        _video: VideoConstraints,
    ) -> MediaResult<TrackPair> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let pair = TrackPair::new(FakeTrack::new(), FakeTrack::new());
        *self.last_pair.lock() = Some(pair.clone());
        Ok(pair)
    }
}

#[derive(Default)]
struct FakeChannel {
    state: Mutex<ConnectionState>,
    joins: AtomicUsize,
    publishes: AtomicUsize,
    leaves: AtomicUsize,
    fail_join: AtomicBool,
    fail_publish: AtomicBool,
    join_delay_ms: AtomicUsize,
    joined_uids: Mutex<Vec<u32>>,
    joined_tokens: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaChannel for FakeChannel {
    async fn join(
        &self,
        _channel_id: &str,
        credential: &Credential,
        uid: u32,
    ) -> ChannelResult<()> {
        let delay = self.join_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_join.load(Ordering::SeqCst) {
            return Err(ChannelError::JoinFailed("join refused".to_string()));
        }
        self.joins.fetch_add(1, Ordering::SeqCst);
        self.joined_uids.lock().push(uid);
        self.joined_tokens.lock().push(credential.token.clone());
        *self.state.lock() = ConnectionState::Connected;
        Ok(())
    }

    async fn publish(&self, _tracks: TrackPair) -> ChannelResult<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(ChannelError::PublishFailed("codec mismatch".to_string()));
        }
        self.publishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn unpublish(&self) -> ChannelResult<()> {
        Ok(())
    }

    async fn leave(&self) -> ChannelResult<()> {
        self.leaves.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = ConnectionState::Disconnected;
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        self.state.lock().clone()
    }
}

#[derive(Default)]
struct FakeIssuer {
    requests: AtomicUsize,
    requested_uids: Mutex<Vec<u32>>,
    first_credential_expired: AtomicBool,
    deny: AtomicBool,
}

#[async_trait]
impl CredentialIssuer for FakeIssuer {
    async fn request_credential(
        &self,
        _channel_id: &str,
        uid: u32,
        _role: Role,
        ttl_seconds: u64,
    ) -> ChannelResult<Credential> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(ChannelError::CredentialDenied(
                "issuer misconfigured".to_string(),
            ));
        }

        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        self.requested_uids.lock().push(uid);

        let expires_at = if n == 1 && self.first_credential_expired.load(Ordering::SeqCst) {
            Utc::now().timestamp() - 100
        } else {
            Utc::now().timestamp() + ttl_seconds.max(60) as i64
        };

        Ok(Credential {
            token: format!("tok-{n}"),
            expires_at_epoch_seconds: expires_at,
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    updates: Mutex<Vec<(String, StreamStatus, Option<u32>)>>,
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn update_status(
        &self,
        event_id: &str,
        status: StreamStatus,
        viewer_count: Option<u32>,
    ) -> Result<(), StatusSinkError> {
        self.updates
            .lock()
            .push((event_id.to_string(), status, viewer_count));
        Ok(())
    }
}

struct Harness {
    commands: Sender<SessionCommand>,
    events: Receiver<SessionEvent>,
    channel_events: Sender<ChannelEvent>,
    backend: Arc<FakeBackend>,
    channel: Arc<FakeChannel>,
    issuer: Arc<FakeIssuer>,
    sink: Arc<RecordingSink>,
}

fn config_with_start_offset(offset_seconds: i64) -> BroadcastConfig {
    BroadcastConfig {
        event_id: "evt-1".to_string(),
        event_start_time: Utc::now() + chrono::Duration::seconds(offset_seconds),
        early_entry_seconds: 300,
        credential_ttl_seconds: 3600,
        video: VideoConstraints::default(),
    }
}

fn spawn_controller(config: BroadcastConfig) -> Harness {
    // RUST_LOG=debug surfaces controller traces in test output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let backend = Arc::new(FakeBackend::default());
    let channel = Arc::new(FakeChannel::default());
    let issuer = Arc::new(FakeIssuer::default());
    let sink = Arc::new(RecordingSink::default());

    let (command_tx, command_rx) = command_channel();
    let (event_tx, event_rx) = event_channel();
    let (channel_tx, channel_rx) = channel_events();

    let mut controller = SessionController::new(
        config,
        Arc::clone(&backend),
        Arc::clone(&channel),
        Arc::clone(&issuer),
        Arc::clone(&sink),
        command_rx,
        event_tx,
        channel_rx,
    );

    tokio::spawn(async move {
        controller.run().await;
    });

    Harness {
        commands: command_tx,
        events: event_rx,
        channel_events: channel_tx,
        backend,
        channel,
        issuer,
        sink,
    }
}

async fn next_event(events: &mut Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn wait_for_phase(events: &mut Receiver<SessionEvent>, phase: SessionPhase) {
    loop {
        if let SessionEvent::PhaseChanged { current, .. } = next_event(events).await {
            if current == phase {
                return;
            }
        }
    }
}

async fn next_snapshot(harness: &mut Harness) -> stagecast_types::SessionSnapshot {
    harness
        .commands
        .send(SessionCommand::GetSnapshot)
        .await
        .unwrap();
    loop {
        if let SessionEvent::Snapshot(snapshot) = next_event(&mut harness.events).await {
            return snapshot;
        }
    }
}

async fn go_to_device_ready(harness: &mut Harness) {
    harness
        .commands
        .send(SessionCommand::StartCamera {
            selection: DeviceSelection::default(),
        })
        .await
        .unwrap();
    wait_for_phase(&mut harness.events, SessionPhase::DeviceReady).await;
}

async fn go_live(harness: &mut Harness) {
    harness.commands.send(SessionCommand::GoLive).await.unwrap();
    wait_for_phase(&mut harness.events, SessionPhase::Live).await;
}

#[tokio::test]
async fn test_full_broadcast_flow() {
    // Event already started, so the gate is open.
    let mut harness = spawn_controller(config_with_start_offset(0));

    go_to_device_ready(&mut harness).await;
    go_live(&mut harness).await;

    let snapshot = next_snapshot(&mut harness).await;
    assert_eq!(snapshot.phase, SessionPhase::Live);
    assert_eq!(snapshot.channel_id, "event-evt-1");
    assert!(snapshot.started_at_epoch_millis.is_some());
    let uid = snapshot.participant_uid.expect("uid assigned");
    assert!((1..=2_147_483_647).contains(&uid));

    // The uid requested from the issuer is the one presented on join.
    assert_eq!(harness.issuer.requested_uids.lock().as_slice(), &[uid]);
    assert_eq!(harness.channel.joined_uids.lock().as_slice(), &[uid]);

    // Sink was told the stream is live with zero viewers.
    assert_eq!(
        harness.sink.updates.lock().as_slice(),
        &[("evt-1".to_string(), StreamStatus::Live, Some(0))]
    );

    // Three viewers join, one leaves.
    for uid in [101, 102, 103] {
        harness
            .channel_events
            .send(ChannelEvent::RemoteJoined { uid })
            .await
            .unwrap();
    }
    harness
        .channel_events
        .send(ChannelEvent::RemoteLeft { uid: 102 })
        .await
        .unwrap();

    let mut counts = Vec::new();
    while counts.len() < 4 {
        if let SessionEvent::ViewerCount(count) = next_event(&mut harness.events).await {
            counts.push(count);
        }
    }
    assert_eq!(counts, vec![1, 2, 3, 2]);

    harness
        .commands
        .send(SessionCommand::EndBroadcast)
        .await
        .unwrap();
    wait_for_phase(&mut harness.events, SessionPhase::Ended).await;

    let snapshot = next_snapshot(&mut harness).await;
    assert_eq!(snapshot.phase, SessionPhase::Ended);
    assert_eq!(snapshot.viewer_count, 0);
    assert!(snapshot.started_at_epoch_millis.is_none());

    let updates = harness.sink.updates.lock();
    assert_eq!(updates.len(), 2);
    assert_eq!(
        updates[1],
        ("evt-1".to_string(), StreamStatus::Ended, None)
    );
}

#[tokio::test]
async fn test_gate_closed_six_minutes_early() {
    let mut harness = spawn_controller(config_with_start_offset(6 * 60));

    go_to_device_ready(&mut harness).await;
    harness.commands.send(SessionCommand::GoLive).await.unwrap();

    let mut saw_gate_event = false;
    loop {
        match next_event(&mut harness.events).await {
            SessionEvent::TimeGateClosed {
                wait_minutes,
                wait_seconds,
            } => {
                assert!(wait_minutes * 60 + wait_seconds >= 60);
                saw_gate_event = true;
            }
            SessionEvent::PhaseChanged {
                current: SessionPhase::DeviceReady,
                previous: SessionPhase::Authorizing,
            } => break,
            _ => {}
        }
    }

    assert!(saw_gate_event);
    assert_eq!(harness.issuer.requests.load(Ordering::SeqCst), 0);
    assert_eq!(harness.channel.joins.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_gate_open_four_minutes_early() {
    let mut harness = spawn_controller(config_with_start_offset(4 * 60));

    go_to_device_ready(&mut harness).await;
    go_live(&mut harness).await;

    assert_eq!(harness.channel.joins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rapid_go_live_single_join() {
    let mut harness = spawn_controller(config_with_start_offset(0));
    harness.channel.join_delay_ms.store(50, Ordering::SeqCst);

    go_to_device_ready(&mut harness).await;

    // A burst of go-live intents while the first join is in flight.
    for _ in 0..3 {
        harness.commands.send(SessionCommand::GoLive).await.unwrap();
    }

    wait_for_phase(&mut harness.events, SessionPhase::Live).await;

    // The queued intents are processed after the first completes and
    // are discarded by the phase check.
    let snapshot = next_snapshot(&mut harness).await;
    assert_eq!(snapshot.phase, SessionPhase::Live);
    assert_eq!(harness.channel.joins.load(Ordering::SeqCst), 1);
    assert_eq!(harness.issuer.requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_acquire_twice_holds_single_hardware_lock() {
    let mut harness = spawn_controller(config_with_start_offset(0));

    go_to_device_ready(&mut harness).await;
    go_to_device_ready(&mut harness).await;

    assert_eq!(harness.backend.acquisitions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_expired_credential_is_refetched_before_join() {
    let mut harness = spawn_controller(config_with_start_offset(0));
    harness
        .issuer
        .first_credential_expired
        .store(true, Ordering::SeqCst);

    go_to_device_ready(&mut harness).await;
    go_live(&mut harness).await;

    // Two issuer round-trips, one join, and the join saw the fresh token.
    assert_eq!(harness.issuer.requests.load(Ordering::SeqCst), 2);
    assert_eq!(harness.channel.joins.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.channel.joined_tokens.lock().as_slice(),
        &["tok-2".to_string()]
    );
}

#[tokio::test]
async fn test_credential_denial_returns_to_device_ready() {
    let mut harness = spawn_controller(config_with_start_offset(0));
    harness.issuer.deny.store(true, Ordering::SeqCst);

    go_to_device_ready(&mut harness).await;
    harness.commands.send(SessionCommand::GoLive).await.unwrap();

    loop {
        if let SessionEvent::Error(record) = next_event(&mut harness.events).await {
            assert_eq!(record.kind, SessionErrorKind::CredentialDenied);
            break;
        }
    }

    let snapshot = next_snapshot(&mut harness).await;
    assert_eq!(snapshot.phase, SessionPhase::DeviceReady);
    assert_eq!(harness.channel.joins.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_join_failure_returns_to_device_ready() {
    let mut harness = spawn_controller(config_with_start_offset(0));
    harness.channel.fail_join.store(true, Ordering::SeqCst);

    go_to_device_ready(&mut harness).await;
    harness.commands.send(SessionCommand::GoLive).await.unwrap();

    loop {
        if let SessionEvent::Error(record) = next_event(&mut harness.events).await {
            assert_eq!(record.kind, SessionErrorKind::ChannelJoinFailed);
            break;
        }
    }

    let snapshot = next_snapshot(&mut harness).await;
    assert_eq!(snapshot.phase, SessionPhase::DeviceReady);
    assert_eq!(harness.channel.publishes.load(Ordering::SeqCst), 0);
    assert!(harness.sink.updates.lock().is_empty());
}

#[tokio::test]
async fn test_publish_failure_leaves_no_partial_publish() {
    let mut harness = spawn_controller(config_with_start_offset(0));
    harness.channel.fail_publish.store(true, Ordering::SeqCst);

    go_to_device_ready(&mut harness).await;
    harness.commands.send(SessionCommand::GoLive).await.unwrap();
    wait_for_phase(&mut harness.events, SessionPhase::DeviceReady).await;

    // The join succeeded but the channel was left again.
    assert_eq!(harness.channel.joins.load(Ordering::SeqCst), 1);
    assert!(harness.channel.leaves.load(Ordering::SeqCst) >= 1);
    assert!(harness.channel.connection_state().is_disconnected());
    assert!(harness.sink.updates.lock().is_empty());
}

#[tokio::test]
async fn test_stale_connection_forces_leave_before_join() {
    let mut harness = spawn_controller(config_with_start_offset(0));
    *harness.channel.state.lock() = ConnectionState::Connected;

    go_to_device_ready(&mut harness).await;
    go_live(&mut harness).await;

    assert!(harness.channel.leaves.load(Ordering::SeqCst) >= 1);
    assert_eq!(harness.channel.joins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transport_loss_while_live_is_nonfatal() {
    let mut harness = spawn_controller(config_with_start_offset(0));

    go_to_device_ready(&mut harness).await;
    go_live(&mut harness).await;

    harness
        .channel_events
        .send(ChannelEvent::Connection(ConnectionState::Reconnecting))
        .await
        .unwrap();

    loop {
        if let SessionEvent::TransportLost { .. } = next_event(&mut harness.events).await {
            break;
        }
    }

    // The session stays live; the broadcaster decides what to do.
    let snapshot = next_snapshot(&mut harness).await;
    assert_eq!(snapshot.phase, SessionPhase::Live);

    harness
        .channel_events
        .send(ChannelEvent::Connection(ConnectionState::Connected))
        .await
        .unwrap();

    loop {
        if let SessionEvent::TransportRecovered = next_event(&mut harness.events).await {
            break;
        }
    }
}

#[tokio::test]
async fn test_transport_failure_ends_broadcast() {
    let mut harness = spawn_controller(config_with_start_offset(0));

    go_to_device_ready(&mut harness).await;
    go_live(&mut harness).await;

    harness
        .channel_events
        .send(ChannelEvent::Connection(ConnectionState::Failed {
            reason: "kicked".to_string(),
        }))
        .await
        .unwrap();

    wait_for_phase(&mut harness.events, SessionPhase::Ended).await;

    let updates = harness.sink.updates.lock();
    assert_eq!(updates.last().unwrap().1, StreamStatus::Ended);
}

#[tokio::test]
async fn test_shutdown_releases_devices() {
    let mut harness = spawn_controller(config_with_start_offset(0));

    go_to_device_ready(&mut harness).await;
    harness
        .commands
        .send(SessionCommand::Shutdown)
        .await
        .unwrap();

    loop {
        if let SessionEvent::Shutdown = next_event(&mut harness.events).await {
            break;
        }
    }

    let pair = harness.backend.last_pair.lock().clone().unwrap();
    assert!(!pair.is_ready());
}

#[tokio::test]
async fn test_shutdown_while_live_leaves_and_reports_ended() {
    let mut harness = spawn_controller(config_with_start_offset(0));

    go_to_device_ready(&mut harness).await;
    go_live(&mut harness).await;

    harness
        .commands
        .send(SessionCommand::Shutdown)
        .await
        .unwrap();

    loop {
        if let SessionEvent::Shutdown = next_event(&mut harness.events).await {
            break;
        }
    }

    assert!(harness.channel.leaves.load(Ordering::SeqCst) >= 1);
    assert!(harness.channel.connection_state().is_disconnected());
    let updates = harness.sink.updates.lock();
    assert_eq!(updates.last().unwrap().1, StreamStatus::Ended);

    let pair = harness.backend.last_pair.lock().clone().unwrap();
    assert!(!pair.is_ready());
}

#[tokio::test]
async fn test_restart_after_ended_reuses_warm_camera() {
    let mut harness = spawn_controller(config_with_start_offset(0));

    go_to_device_ready(&mut harness).await;
    go_live(&mut harness).await;

    harness
        .commands
        .send(SessionCommand::EndBroadcast)
        .await
        .unwrap();
    wait_for_phase(&mut harness.events, SessionPhase::Ended).await;

    // Tracks stayed warm; restarting needs no second hardware lock.
    go_to_device_ready(&mut harness).await;
    go_live(&mut harness).await;

    assert_eq!(harness.backend.acquisitions.load(Ordering::SeqCst), 1);
    assert_eq!(harness.channel.joins.load(Ordering::SeqCst), 2);

    // A fresh uid and credential were drawn for the second attempt.
    assert_eq!(harness.issuer.requests.load(Ordering::SeqCst), 2);
    let uids = harness.channel.joined_uids.lock();
    assert_eq!(uids.len(), 2);
}
