//! The session controller event loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::OsRng;
use rand::Rng;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{debug, error, info, instrument, warn};

use stagecast_channel::{
    ChannelError, ChannelEvent, ConnectionState, Credential, CredentialIssuer, MediaChannel, Role,
};
use stagecast_media::{DeviceManager, MediaBackend, MediaError};
use stagecast_types::{
    BroadcastConfig, DeviceSelection, EndReason, SessionCommand, SessionErrorKind, SessionEvent,
    SessionPhase,
};

use crate::gate::{evaluate_gate, GateDecision};
use crate::session::BroadcastSession;
use crate::status::{StatusSink, StreamStatus};

/// Largest participant uid the channel accepts.
const MAX_PARTICIPANT_UID: u32 = 2_147_483_647;

/// How long a channel leave may take before teardown proceeds anyway.
const LEAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Draw a fresh uid for one join attempt. Never reused across retries,
/// so a stale identity from an unpropagated leave cannot collide.
fn generate_participant_uid() -> u32 {
    OsRng.gen_range(1..=MAX_PARTICIPANT_UID)
}

fn media_error_kind(error: &MediaError) -> SessionErrorKind {
    match error {
        MediaError::PermissionDenied => SessionErrorKind::DevicePermissionDenied,
        MediaError::NoDevices => SessionErrorKind::DeviceUnavailable,
        MediaError::AcquisitionFailed(_) => SessionErrorKind::AcquisitionFailed,
    }
}

fn channel_error_kind(error: &ChannelError) -> SessionErrorKind {
    match error {
        ChannelError::CredentialRequestFailed(_) => SessionErrorKind::CredentialRequestFailed,
        ChannelError::CredentialDenied(_) | ChannelError::CredentialExpired => {
            SessionErrorKind::CredentialDenied
        }
        _ => SessionErrorKind::ChannelJoinFailed,
    }
}

/// Drives one broadcast session from idle through live to ended.
///
/// Commands and channel events are handled one at a time to completion;
/// a transition may itself await device or network operations, during
/// which further commands queue. Phase checks at the top of every
/// handler discard intents that no longer apply, so a result can never
/// be applied after the controller has moved on.
pub struct SessionController<B, C, I, S>
where
    B: MediaBackend,
    C: MediaChannel + 'static,
    I: CredentialIssuer,
    S: StatusSink,
{
    config: BroadcastConfig,
    devices: DeviceManager<B>,
    channel: Arc<C>,
    issuer: Arc<I>,
    sink: Arc<S>,
    command_rx: Receiver<SessionCommand>,
    event_tx: Sender<SessionEvent>,
    channel_rx: Receiver<ChannelEvent>,
    channel_open: bool,
    transport_lost: bool,
    session: BroadcastSession,
}

impl<B, C, I, S> SessionController<B, C, I, S>
where
    B: MediaBackend,
    C: MediaChannel + 'static,
    I: CredentialIssuer,
    S: StatusSink,
{
    /// Create a controller over its collaborators and channels.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: BroadcastConfig,
        backend: Arc<B>,
        channel: Arc<C>,
        issuer: Arc<I>,
        sink: Arc<S>,
        command_rx: Receiver<SessionCommand>,
        event_tx: Sender<SessionEvent>,
        channel_rx: Receiver<ChannelEvent>,
    ) -> Self {
        let session = BroadcastSession::new(config.channel_id());
        Self {
            config,
            devices: DeviceManager::new(backend),
            channel,
            issuer,
            sink,
            command_rx,
            event_tx,
            channel_rx,
            channel_open: true,
            transport_lost: false,
            session,
        }
    }

    /// Run the controller until shutdown (blocking the calling task).
    #[instrument(name = "session_run", skip(self), fields(channel_id = %self.session.channel_id()))]
    pub async fn run(&mut self) {
        info!("Session controller starting");
        self.send_event(SessionEvent::Ready);

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                },
                event = self.channel_rx.recv(), if self.channel_open => match event {
                    Some(event) => self.handle_channel_event(event).await,
                    None => self.channel_open = false,
                },
            }
        }

        self.shutdown().await;
        info!("Session controller stopped");
    }

    /// Handle a command. Returns false if the controller should stop.
    async fn handle_command(&mut self, command: SessionCommand) -> bool {
        debug!(?command, "Handling command");

        match command {
            SessionCommand::StartCamera { selection } => self.start_camera(selection).await,
            SessionCommand::GoLive => self.go_live().await,
            SessionCommand::EndBroadcast => self.end_broadcast(EndReason::UserRequested).await,
            SessionCommand::SetMicEnabled(enabled) => self.devices.set_audio_enabled(enabled).await,
            SessionCommand::SetCameraEnabled(enabled) => {
                self.devices.set_video_enabled(enabled).await
            }
            SessionCommand::SwitchCamera { camera_id } => self.switch_camera(camera_id).await,
            SessionCommand::ListDevices => self.send_devices().await,
            SessionCommand::GetSnapshot => {
                self.send_event(SessionEvent::Snapshot(self.session.snapshot()))
            }
            SessionCommand::ReleaseDevices => self.release_devices().await,
            SessionCommand::Shutdown => return false,
        }

        true
    }

    #[instrument(name = "start_camera", skip(self))]
    async fn start_camera(&mut self, selection: DeviceSelection) {
        match self.session.phase() {
            SessionPhase::Idle
            | SessionPhase::DeviceReady
            | SessionPhase::Ended
            | SessionPhase::Error => {}
            other => {
                debug!(phase = other.name(), "Ignoring camera start");
                return;
            }
        }

        self.transition_to(SessionPhase::DeviceAcquiring);

        // The acquire guard makes this a no-op when tracks are already
        // held, e.g. restarting after Ended with a warm camera.
        match self.devices.acquire(selection, self.config.video).await {
            Ok(_tracks) => {
                self.session.last_error = None;
                self.transition_to(SessionPhase::DeviceReady);
            }
            Err(e) => {
                error!("Device acquisition failed: {e}");
                let record = self.session.record_error(media_error_kind(&e), e.to_string());
                self.transition_to(SessionPhase::Error);
                self.send_event(SessionEvent::Error(record));
            }
        }
    }

    #[instrument(name = "go_live", skip(self))]
    async fn go_live(&mut self) {
        if self.session.phase() != SessionPhase::DeviceReady {
            debug!(
                phase = self.session.phase().name(),
                "Ignoring go-live outside DeviceReady"
            );
            return;
        }

        self.transition_to(SessionPhase::Authorizing);

        // Evaluated at the moment of the request, never cached.
        match evaluate_gate(
            self.config.event_start_time,
            self.config.early_entry_seconds,
            Utc::now(),
        ) {
            GateDecision::Closed {
                wait_minutes,
                wait_seconds,
            } => {
                info!(wait_minutes, wait_seconds, "Time gate not yet open");
                self.send_event(SessionEvent::TimeGateClosed {
                    wait_minutes,
                    wait_seconds,
                });
                self.transition_to(SessionPhase::DeviceReady);
                return;
            }
            GateDecision::Open => {}
        }

        let uid = generate_participant_uid();
        self.session.participant_uid = Some(uid);

        let credential = match self
            .issuer
            .request_credential(
                self.session.channel_id(),
                uid,
                Role::Publisher,
                self.config.credential_ttl_seconds,
            )
            .await
        {
            Ok(credential) => credential,
            Err(e) => {
                self.fail_attempt(channel_error_kind(&e), e.to_string());
                return;
            }
        };
        self.session.credential = Some(credential.clone());

        self.transition_to(SessionPhase::Joining);

        match self.join_and_publish(credential, uid).await {
            Ok(()) => {
                self.session.mark_live();
                self.transition_to(SessionPhase::Live);
                self.send_event(SessionEvent::ViewerCount(0));
                info!(uid, "Broadcast live");
                self.notify_status(StreamStatus::Live, Some(0)).await;
            }
            Err(e) => {
                warn!("Join attempt failed: {e}");
                self.fail_attempt(channel_error_kind(&e), e.to_string());
            }
        }
    }

    async fn join_and_publish(
        &mut self,
        mut credential: Credential,
        uid: u32,
    ) -> Result<(), ChannelError> {
        // A stale connection must never be joined twice concurrently.
        if !self.channel.connection_state().is_disconnected() {
            warn!("Channel not disconnected before join, forcing leave");
            if let Err(e) = self.channel.leave().await {
                warn!("Pre-join leave failed: {e}");
            }
        }

        // An expired credential is never presented to join; fetch a
        // fresh one instead.
        if credential.is_expired(Utc::now()) {
            debug!("Credential expired before join, requesting a fresh one");
            credential = self
                .issuer
                .request_credential(
                    self.session.channel_id(),
                    uid,
                    Role::Publisher,
                    self.config.credential_ttl_seconds,
                )
                .await?;
            if credential.is_expired(Utc::now()) {
                return Err(ChannelError::CredentialExpired);
            }
            self.session.credential = Some(credential.clone());
        }

        let channel_id = self.session.channel_id().to_string();
        self.channel.join(&channel_id, &credential, uid).await?;

        let tracks = match self.devices.tracks().await {
            Some(tracks) => tracks,
            None => {
                // Tracks vanished between DeviceReady and here; leave so
                // no half-joined channel slot is held.
                let _ = self.channel.leave().await;
                return Err(ChannelError::PublishFailed(
                    "local tracks no longer held".to_string(),
                ));
            }
        };

        if let Err(e) = self.channel.publish(tracks).await {
            // No partial publish left behind.
            let _ = self.channel.leave().await;
            return Err(e);
        }

        Ok(())
    }

    /// Abort the in-progress attempt and return to the last stable
    /// phase, never leaving the controller stuck mid-transition.
    fn fail_attempt(&mut self, kind: SessionErrorKind, message: String) {
        let record = self.session.record_error(kind, message);
        self.session.clear_attempt();
        self.transition_to(SessionPhase::DeviceReady);
        self.send_event(SessionEvent::Error(record));
    }

    #[instrument(name = "end_broadcast", skip(self, reason))]
    async fn end_broadcast(&mut self, reason: EndReason) {
        if !self.session.phase().is_live() {
            debug!(
                phase = self.session.phase().name(),
                "Ignoring end outside Live"
            );
            return;
        }

        info!(reason = %reason.message(), "Ending broadcast");
        self.transition_to(SessionPhase::Ending);

        if let Err(e) = self.channel.unpublish().await {
            warn!("Unpublish failed: {e}");
        }

        match tokio::time::timeout(LEAVE_TIMEOUT, self.channel.leave()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Channel leave failed: {e}"),
            Err(_) => warn!("Channel leave timed out"),
        }

        self.session.clear_attempt();
        self.session.last_error = None;
        self.transport_lost = false;
        self.transition_to(SessionPhase::Ended);
        self.send_event(SessionEvent::ViewerCount(0));

        // Tracks stay warm for a restart; ReleaseDevices or drop
        // releases them.
        self.notify_status(StreamStatus::Ended, None).await;
    }

    #[instrument(name = "switch_camera", skip(self))]
    async fn switch_camera(&mut self, camera_id: String) {
        if self.session.phase() != SessionPhase::DeviceReady {
            debug!(
                phase = self.session.phase().name(),
                "Ignoring camera switch"
            );
            return;
        }

        if let Err(e) = self.devices.switch_camera(camera_id, self.config.video).await {
            error!("Camera switch failed: {e}");
            let record = self.session.record_error(media_error_kind(&e), e.to_string());
            self.transition_to(SessionPhase::Error);
            self.send_event(SessionEvent::Error(record));
        }
    }

    async fn send_devices(&mut self) {
        match self.devices.list_devices().await {
            Ok(list) => {
                let mut devices = list.cameras;
                devices.extend(list.microphones);
                self.send_event(SessionEvent::Devices(devices));
            }
            Err(e) => {
                // Enumeration failure leaves the selection empty and
                // acquisition falls back to the platform default.
                warn!("Device enumeration failed: {e}");
                self.send_event(SessionEvent::Devices(Vec::new()));
            }
        }
    }

    async fn release_devices(&mut self) {
        if self.session.phase().is_live() || self.session.phase().is_transitioning() {
            debug!(
                phase = self.session.phase().name(),
                "Ignoring device release"
            );
            return;
        }

        self.devices.release().await;
        if self.session.phase() == SessionPhase::DeviceReady {
            self.transition_to(SessionPhase::Idle);
        }
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::RemoteJoined { uid } if self.session.phase().is_live() => {
                let count = self.session.presence.remote_joined(uid);
                self.send_event(SessionEvent::ViewerCount(count));
            }
            ChannelEvent::RemoteLeft { uid } if self.session.phase().is_live() => {
                let count = self.session.presence.remote_left(uid);
                self.send_event(SessionEvent::ViewerCount(count));
            }
            ChannelEvent::Connection(state) => self.handle_connection_change(state).await,
            // Presence outside Live carries no meaning.
            ChannelEvent::RemoteJoined { .. } | ChannelEvent::RemoteLeft { .. } => {}
        }
    }

    async fn handle_connection_change(&mut self, state: ConnectionState) {
        if !self.session.phase().is_live() {
            debug!(state = %state.message(), "Connection change outside Live");
            return;
        }

        match state {
            ConnectionState::Failed { reason } => {
                warn!(reason, "Transport failed while live");
                self.end_broadcast(EndReason::TransportFailure { message: reason })
                    .await;
            }
            ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                // Deliberately no phase change: the broadcaster decides
                // whether to end or wait for transport recovery.
                warn!(state = %state.message(), "Transport lost while live");
                self.transport_lost = true;
                self.session
                    .record_error(SessionErrorKind::ChannelTransportLost, state.message());
                self.send_event(SessionEvent::TransportLost {
                    message: state.message(),
                });
            }
            ConnectionState::Connected if self.transport_lost => {
                info!("Transport recovered");
                self.transport_lost = false;
                self.session.last_error = None;
                self.send_event(SessionEvent::TransportRecovered);
            }
            ConnectionState::Connected | ConnectionState::Connecting => {}
        }
    }

    /// Teardown for every exit path: leave best-effort, release
    /// unconditionally.
    #[instrument(name = "session_shutdown", skip(self))]
    async fn shutdown(&mut self) {
        if self.session.phase().is_live() {
            self.end_broadcast(EndReason::Discarded).await;
        } else if !self.channel.connection_state().is_disconnected() {
            if let Err(e) = self.channel.leave().await {
                warn!("Leave during shutdown failed: {e}");
            }
        }

        self.devices.release().await;

        if !self.session.phase().is_terminal() {
            self.transition_to(SessionPhase::Ended);
        }
        self.send_event(SessionEvent::Shutdown);
    }

    fn transition_to(&mut self, phase: SessionPhase) {
        let previous = self.session.set_phase(phase);

        debug!(
            previous = previous.name(),
            current = phase.name(),
            "Phase transition"
        );

        self.send_event(SessionEvent::PhaseChanged {
            previous,
            current: phase,
        });
    }

    fn send_event(&self, event: SessionEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {e}");
        }
    }

    async fn notify_status(&self, status: StreamStatus, viewer_count: Option<u32>) {
        // Fire-and-forget: a sink failure is logged for operability but
        // never shown to the broadcaster and never blocks teardown.
        if let Err(e) = self
            .sink
            .update_status(&self.config.event_id, status, viewer_count)
            .await
        {
            warn!("Status sink update failed: {e}");
        }
    }
}

impl<B, C, I, S> Drop for SessionController<B, C, I, S>
where
    B: MediaBackend,
    C: MediaChannel + 'static,
    I: CredentialIssuer,
    S: StatusSink,
{
    fn drop(&mut self) {
        // Device release is handled by the DeviceManager's own drop;
        // the channel leave is best-effort and needs a runtime.
        if !self.channel.connection_state().is_disconnected() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let channel = Arc::clone(&self.channel);
                handle.spawn(async move {
                    let _ = channel.leave().await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_uid_range() {
        for _ in 0..1_000 {
            let uid = generate_participant_uid();
            assert!(uid >= 1);
            assert!(uid <= MAX_PARTICIPANT_UID);
        }
    }

    #[test]
    fn test_media_error_mapping() {
        assert_eq!(
            media_error_kind(&MediaError::PermissionDenied),
            SessionErrorKind::DevicePermissionDenied
        );
        assert_eq!(
            media_error_kind(&MediaError::NoDevices),
            SessionErrorKind::DeviceUnavailable
        );
        assert_eq!(
            media_error_kind(&MediaError::AcquisitionFailed("busy".to_string())),
            SessionErrorKind::AcquisitionFailed
        );
    }

    #[test]
    fn test_channel_error_mapping() {
        assert_eq!(
            channel_error_kind(&ChannelError::CredentialRequestFailed("timeout".to_string())),
            SessionErrorKind::CredentialRequestFailed
        );
        assert_eq!(
            channel_error_kind(&ChannelError::CredentialDenied("misconfigured".to_string())),
            SessionErrorKind::CredentialDenied
        );
        assert_eq!(
            channel_error_kind(&ChannelError::JoinFailed("refused".to_string())),
            SessionErrorKind::ChannelJoinFailed
        );
    }
}
