use crate::config::EngineConfig;
use crate::domain::actor::{Actor, ActorId, ActorSnapshot};
use crate::domain::candidate::{CandidateProfile, SearchCriteria};
use crate::domain::notification::Notification;
use crate::domain::ports::{
    CandidateDirectoryBox, NotifierRef, ProcessStoreBox, RequestStoreBox, SessionProviderRef,
};
use crate::domain::process::TaarufProcess;
use crate::domain::request::{MatchRequest, RequestDirection, RequestStatus};
use crate::error::{Result, TaarufError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The taaruf workflow engine.
///
/// `TaarufEngine` combines the request registry and the process state machine for
/// whichever actor the session provider reports. Every mutating operation:
///
/// * requires a signed-in actor,
/// * runs while holding the in-flight lock, so two mutations never interleave,
/// * works on a copy of stored state and only writes it back once every check passed,
/// * reports its outcome to the notifier, success or failure.
pub struct TaarufEngine {
    session: SessionProviderRef,
    notifier: NotifierRef,
    requests: RequestStoreBox,
    processes: ProcessStoreBox,
    directory: CandidateDirectoryBox,
    config: EngineConfig,
    in_flight: Mutex<()>,
}

impl TaarufEngine {
    /// Creates a new `TaarufEngine` with the default configuration.
    ///
    /// # Arguments
    ///
    /// * `session` - Identity of the caller, shared with whatever signs users in.
    /// * `notifier` - Sink for user-facing outcome notifications.
    /// * `requests` - The store for match requests.
    /// * `processes` - The store for taaruf processes.
    /// * `directory` - Published profiles requests can be addressed to.
    pub fn new(
        session: SessionProviderRef,
        notifier: NotifierRef,
        requests: RequestStoreBox,
        processes: ProcessStoreBox,
        directory: CandidateDirectoryBox,
    ) -> Self {
        Self {
            session,
            notifier,
            requests,
            processes,
            directory,
            config: EngineConfig::default(),
            in_flight: Mutex::new(()),
        }
    }

    /// Replaces the default configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// True while a mutating operation is running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    // ─── Queries ─────────────────────────────────────────────────────

    /// Pending requests addressed to the current actor. Empty when signed out.
    pub async fn list_incoming(&self) -> Result<Vec<MatchRequest>> {
        Ok(self
            .visible_requests()
            .await?
            .into_iter()
            .filter(MatchRequest::is_pending_incoming)
            .collect())
    }

    /// Every request the current actor has sent, whatever its status.
    pub async fn list_outgoing(&self) -> Result<Vec<MatchRequest>> {
        Ok(self
            .visible_requests()
            .await?
            .into_iter()
            .filter(|r| r.direction == RequestDirection::Outgoing)
            .collect())
    }

    /// Incoming requests that were accepted or rejected.
    pub async fn resolved_requests(&self) -> Result<Vec<MatchRequest>> {
        Ok(self
            .visible_requests()
            .await?
            .into_iter()
            .filter(|r| r.direction == RequestDirection::Incoming && r.status.is_terminal())
            .collect())
    }

    /// The current actor's non-terminal process, if any.
    pub async fn active_process(&self) -> Result<Option<TaarufProcess>> {
        Ok(self
            .current_process()
            .await?
            .filter(TaarufProcess::is_active))
    }

    /// The most recently started process, terminal or not.
    pub async fn current_process(&self) -> Result<Option<TaarufProcess>> {
        Ok(self.process_history().await?.pop())
    }

    /// Every process of the current actor, oldest first.
    pub async fn process_history(&self) -> Result<Vec<TaarufProcess>> {
        match self.session.current_actor().await {
            Some(actor) => self.processes.all_for(&actor.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Profiles matching `criteria`, excluding the current actor.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<CandidateProfile>> {
        let me = self.session.current_actor().await.map(|a| a.id);
        Ok(self
            .directory
            .all()
            .await?
            .into_iter()
            .filter(|p| Some(&p.id) != me.as_ref() && criteria.matches(p))
            .collect())
    }

    // ─── Request registry ────────────────────────────────────────────

    /// Sends a taaruf request from the current actor to `target`.
    pub async fn send_request(&self, target: &ActorId, message: &str) -> Result<MatchRequest> {
        let _guard = self.in_flight.lock().await;
        let outcome = self.apply_send_request(target, message).await;
        self.report("send_request", outcome, |r| {
            Notification::success(
                "Request sent",
                format!("Your taaruf request to {} has been sent.", r.to.name),
            )
        })
        .await
    }

    /// Registers a request another user addressed to the current actor.
    pub async fn receive_request(
        &self,
        request_id: &str,
        from: &ActorId,
        message: &str,
    ) -> Result<MatchRequest> {
        let _guard = self.in_flight.lock().await;
        let outcome = self.apply_receive_request(request_id, from, message).await;
        self.report("receive_request", outcome, |r| {
            Notification::success(
                "Request received",
                format!("{} would like to start a taaruf with you.", r.from.name),
            )
        })
        .await
    }

    /// Accepts an incoming request and starts a process with its sender.
    pub async fn accept(&self, request_id: &str) -> Result<TaarufProcess> {
        let _guard = self.in_flight.lock().await;
        let outcome = self.apply_accept(request_id).await;
        self.report("accept", outcome, |p| {
            Notification::success(
                "Request accepted",
                format!(
                    "You have accepted the taaruf request from {}. The process has started.",
                    p.partner.name
                ),
            )
        })
        .await
    }

    /// Rejects an incoming request. No process is created.
    pub async fn reject(&self, request_id: &str) -> Result<MatchRequest> {
        let _guard = self.in_flight.lock().await;
        let outcome = self.apply_reject(request_id).await;
        self.report("reject", outcome, |r| {
            Notification::success(
                "Request rejected",
                format!("You have rejected the taaruf request from {}.", r.from.name),
            )
        })
        .await
    }

    // ─── Process state machine ───────────────────────────────────────

    /// Sends a message in the current process, accruing the configured progress step.
    pub async fn send_message(&self, content: &str) -> Result<TaarufProcess> {
        let _guard = self.in_flight.lock().await;
        let outcome = self
            .apply_to_process(|p| {
                p.send_message(content, self.config.progress_per_message)
                    .map(|_| ())
            })
            .await;
        self.report("send_message", outcome, |_| {
            Notification::success("Message sent", "Your message has been sent successfully.")
        })
        .await
    }

    /// Asks for a supervised nadzor meeting.
    pub async fn request_escalation(&self) -> Result<TaarufProcess> {
        let _guard = self.in_flight.lock().await;
        let outcome = self.apply_to_process(TaarufProcess::request_escalation).await;
        self.report("request_escalation", outcome, |_| {
            Notification::success(
                "Nadzor requested",
                "Your request for a nadzor meeting has been sent. Waiting for response.",
            )
        })
        .await
    }

    /// Ends the process, recording `reason`.
    pub async fn terminate(&self, reason: &str) -> Result<TaarufProcess> {
        let _guard = self.in_flight.lock().await;
        let outcome = self.apply_to_process(|p| p.terminate(reason)).await;
        self.report("terminate", outcome, |_| {
            Notification::success(
                "Process ended",
                "The taaruf process has been ended. You can now start a new search.",
            )
        })
        .await
    }

    /// Counterpart accepted the nadzor meeting.
    pub async fn approve_escalation(&self) -> Result<TaarufProcess> {
        let _guard = self.in_flight.lock().await;
        let outcome = self.apply_to_process(TaarufProcess::approve_escalation).await;
        self.report("approve_escalation", outcome, |p| {
            Notification::success(
                "Nadzor approved",
                format!("{} has agreed to a nadzor meeting.", p.partner.name),
            )
        })
        .await
    }

    /// The process concluded after the nadzor meeting.
    pub async fn complete_process(&self) -> Result<TaarufProcess> {
        let _guard = self.in_flight.lock().await;
        let outcome = self.apply_to_process(TaarufProcess::complete).await;
        self.report("complete_process", outcome, |_| {
            Notification::success("Process completed", "The taaruf process has been completed.")
        })
        .await
    }

    // ─── Internals ───────────────────────────────────────────────────

    async fn actor(&self) -> Result<Actor> {
        self.session
            .current_actor()
            .await
            .ok_or(TaarufError::Unauthenticated)
    }

    async fn visible_requests(&self) -> Result<Vec<MatchRequest>> {
        match self.session.current_actor().await {
            Some(actor) => self.requests.all_for(&actor.id).await,
            None => Ok(Vec::new()),
        }
    }

    async fn own_snapshot(&self, actor: &Actor) -> Result<ActorSnapshot> {
        Ok(match self.directory.get(&actor.id).await? {
            Some(profile) => profile.snapshot(),
            None => ActorSnapshot {
                id: actor.id.clone(),
                name: actor.display_name.clone(),
                age: 0,
                location: String::new(),
            },
        })
    }

    async fn candidate(&self, id: &ActorId) -> Result<CandidateProfile> {
        self.directory
            .get(id)
            .await?
            .ok_or_else(|| TaarufError::NotFound(format!("User {id}")))
    }

    async fn apply_send_request(&self, target: &ActorId, message: &str) -> Result<MatchRequest> {
        let actor = self.actor().await?;
        if message.trim().is_empty() {
            return Err(TaarufError::ValidationError(
                "Request message must not be empty".to_string(),
            ));
        }
        if *target == actor.id {
            return Err(TaarufError::ValidationError(
                "Cannot send a taaruf request to yourself".to_string(),
            ));
        }
        let to = self.candidate(target).await?.snapshot();

        let existing = self.requests.all_for(&actor.id).await?;
        if existing.iter().any(|r| {
            r.direction == RequestDirection::Outgoing
                && r.status == RequestStatus::Pending
                && r.to.id == *target
        }) {
            return Err(TaarufError::Conflict(format!(
                "A request to {} is already pending",
                to.name
            )));
        }

        let request = MatchRequest::new(
            Uuid::new_v4().to_string(),
            self.own_snapshot(&actor).await?,
            to,
            RequestDirection::Outgoing,
            message,
        )?;
        self.requests.store(&actor.id, request.clone()).await?;
        Ok(request)
    }

    async fn apply_receive_request(
        &self,
        request_id: &str,
        from: &ActorId,
        message: &str,
    ) -> Result<MatchRequest> {
        let actor = self.actor().await?;
        if request_id.trim().is_empty() {
            return Err(TaarufError::ValidationError(
                "Request id must not be empty".to_string(),
            ));
        }
        if *from == actor.id {
            return Err(TaarufError::ValidationError(
                "Cannot receive a taaruf request from yourself".to_string(),
            ));
        }
        if self.requests.get(&actor.id, request_id).await?.is_some() {
            return Err(TaarufError::Conflict(format!(
                "Request {request_id} already exists"
            )));
        }

        let request = MatchRequest::new(
            request_id,
            self.candidate(from).await?.snapshot(),
            self.own_snapshot(&actor).await?,
            RequestDirection::Incoming,
            message,
        )?;
        self.requests.store(&actor.id, request.clone()).await?;
        Ok(request)
    }

    async fn pending_incoming(&self, actor: &Actor, request_id: &str) -> Result<MatchRequest> {
        let request = self
            .requests
            .get(&actor.id, request_id)
            .await?
            .ok_or_else(|| TaarufError::NotFound(format!("Request {request_id}")))?;
        request.ensure_resolvable()?;
        Ok(request)
    }

    async fn apply_accept(&self, request_id: &str) -> Result<TaarufProcess> {
        let actor = self.actor().await?;
        let mut request = self.pending_incoming(&actor, request_id).await?;

        if let Some(active) = self
            .processes
            .all_for(&actor.id)
            .await?
            .into_iter()
            .find(TaarufProcess::is_active)
        {
            return Err(TaarufError::Conflict(format!(
                "Your taaruf with {} is still {}",
                active.partner.name, active.status
            )));
        }

        let pending = request.clone();
        request.accept()?;
        let process = TaarufProcess::new(
            format!("taaruf-{}", Uuid::new_v4().simple()),
            request.from.clone(),
            self.config.total_stages,
        );

        // The request is marked first and put back if the process cannot be saved
        self.requests.store(&actor.id, request).await?;
        if let Err(e) = self.processes.store(&actor.id, process.clone()).await {
            warn!(request = %request_id, error = %e, "process not saved, restoring request");
            self.requests.store(&actor.id, pending).await?;
            return Err(e);
        }
        Ok(process)
    }

    async fn apply_reject(&self, request_id: &str) -> Result<MatchRequest> {
        let actor = self.actor().await?;
        let mut request = self.pending_incoming(&actor, request_id).await?;
        request.reject()?;
        self.requests.store(&actor.id, request.clone()).await?;
        Ok(request)
    }

    /// Applies `transition` to a copy of the current process and stores it on success.
    async fn apply_to_process<F>(&self, transition: F) -> Result<TaarufProcess>
    where
        F: FnOnce(&mut TaarufProcess) -> Result<()>,
    {
        let actor = self.actor().await?;
        let mut process = self
            .processes
            .all_for(&actor.id)
            .await?
            .pop()
            .ok_or(TaarufError::NoActiveProcess)?;
        debug!(process = %process.id, status = %process.status, "loaded process");

        transition(&mut process)?;
        self.processes.store(&actor.id, process.clone()).await?;
        Ok(process)
    }

    async fn report<T>(
        &self,
        operation: &'static str,
        outcome: Result<T>,
        on_success: impl FnOnce(&T) -> Notification,
    ) -> Result<T> {
        let notification = match &outcome {
            Ok(value) => {
                info!(operation, "operation succeeded");
                on_success(value)
            }
            Err(e) => {
                warn!(operation, kind = ?e.kind(), error = %e, "operation rejected");
                Notification::from(e)
            }
        };
        self.notifier.notify(notification).await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::Gender;
    use crate::domain::notification::NotificationKind;
    use crate::domain::ports::{Notifier, ProcessStore};
    use crate::domain::process::ProcessStatus;
    use crate::error::ErrorKind;
    use crate::infrastructure::in_memory::{
        InMemoryCandidateDirectory, InMemoryProcessStore, InMemoryRequestStore,
    };
    use crate::infrastructure::json_file::JsonFileStore;
    use crate::infrastructure::notifier::RecordingNotifier;
    use crate::infrastructure::session::InMemorySession;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::sync::Notify;

    struct Harness {
        engine: TaarufEngine,
        session: InMemorySession,
        notifier: RecordingNotifier,
        processes: InMemoryProcessStore,
    }

    fn profile(id: &str, name: &str, age: u8) -> CandidateProfile {
        CandidateProfile {
            id: ActorId::new(id),
            name: name.to_string(),
            age,
            gender: Gender::Female,
            location: "Bandung".to_string(),
            occupation: "Teacher".to_string(),
            education: "Bachelor in Education".to_string(),
        }
    }

    fn me() -> Actor {
        Actor {
            id: ActorId::new("1"),
            display_name: "Demo User".to_string(),
            gender: Gender::Male,
            has_completed_profile: true,
        }
    }

    fn harness() -> Harness {
        let session = InMemorySession::signed_in(me());
        let notifier = RecordingNotifier::new();
        let processes = InMemoryProcessStore::new();
        let directory = InMemoryCandidateDirectory::new(vec![
            profile("101", "Fatimah", 25),
            profile("102", "Khadijah", 27),
        ]);
        let engine = TaarufEngine::new(
            Arc::new(session.clone()),
            Arc::new(notifier.clone()),
            Box::new(InMemoryRequestStore::new()),
            Box::new(processes.clone()),
            Box::new(directory),
        );
        Harness {
            engine,
            session,
            notifier,
            processes,
        }
    }

    fn directory() -> InMemoryCandidateDirectory {
        InMemoryCandidateDirectory::new(vec![
            profile("101", "Fatimah", 25),
            profile("102", "Khadijah", 27),
        ])
    }

    /// Refuses every write.
    struct ReadOnlyProcessStore;

    #[async_trait]
    impl ProcessStore for ReadOnlyProcessStore {
        async fn store(&self, _owner: &ActorId, _process: TaarufProcess) -> Result<()> {
            Err(TaarufError::StorageError("read-only".to_string()))
        }

        async fn all_for(&self, _owner: &ActorId) -> Result<Vec<TaarufProcess>> {
            Ok(Vec::new())
        }
    }

    /// Holds every notification until released.
    struct GatedNotifier {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Notifier for GatedNotifier {
        async fn notify(&self, _notification: Notification) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    async fn with_active_process(h: &Harness, progress: u8, stage: u8) -> TaarufProcess {
        let partner = profile("101", "Fatimah", 25).snapshot();
        let mut process = TaarufProcess::new("taaruf-test", partner, 5);
        process.progress = progress;
        process.current_stage = stage;
        h.processes.store(&me().id, process.clone()).await.unwrap();
        process
    }

    #[tokio::test]
    async fn test_accept_starts_process() {
        let h = harness();
        h.engine
            .receive_request("R1", &ActorId::new("101"), "Assalamu'alaikum")
            .await
            .unwrap();
        assert_eq!(h.engine.list_incoming().await.unwrap().len(), 1);

        let process = h.engine.accept("R1").await.unwrap();
        assert_eq!(process.status, ProcessStatus::InProgress);
        assert_eq!(process.progress, 0);
        assert_eq!(process.current_stage, 1);
        assert_eq!(process.partner.name, "Fatimah");

        assert!(h.engine.list_incoming().await.unwrap().is_empty());
        let resolved = h.engine.resolved_requests().await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].status, RequestStatus::Accepted);
        assert_eq!(h.engine.active_process().await.unwrap(), Some(process));

        let last = h.notifier.last().await.unwrap();
        assert_eq!(last.kind, NotificationKind::Success);
        assert_eq!(last.title, "Request accepted");
    }

    #[tokio::test]
    async fn test_accept_twice_fails() {
        let h = harness();
        h.engine
            .receive_request("R1", &ActorId::new("101"), "hello")
            .await
            .unwrap();
        h.engine.accept("R1").await.unwrap();

        let err = h.engine.accept("R1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = h.engine.reject("R1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = h.engine.accept("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(h.notifier.last().await.unwrap().kind, NotificationKind::Error);
    }

    #[tokio::test]
    async fn test_accept_conflicts_with_active_process() {
        let h = harness();
        let existing = with_active_process(&h, 20, 1).await;
        h.engine
            .receive_request("R1", &ActorId::new("102"), "hello")
            .await
            .unwrap();

        let err = h.engine.accept("R1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let incoming = h.engine.list_incoming().await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].status, RequestStatus::Pending);
        assert_eq!(h.engine.process_history().await.unwrap(), vec![existing]);
    }

    #[tokio::test]
    async fn test_reject_creates_no_process() {
        let h = harness();
        h.engine
            .receive_request("R1", &ActorId::new("101"), "hello")
            .await
            .unwrap();
        let request = h.engine.reject("R1").await.unwrap();
        assert_eq!(request.status, RequestStatus::Rejected);
        assert!(h.engine.current_process().await.unwrap().is_none());
        assert!(h.engine.list_incoming().await.unwrap().is_empty());
        assert_eq!(h.notifier.last().await.unwrap().title, "Request rejected");
    }

    #[tokio::test]
    async fn test_send_request_validation() {
        let h = harness();
        let err = h
            .engine
            .send_request(&ActorId::new("101"), "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = h.engine.send_request(&me().id, "hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = h
            .engine
            .send_request(&ActorId::new("999"), "hello")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(h.engine.list_outgoing().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_request_registers_outgoing() {
        let h = harness();
        let request = h
            .engine
            .send_request(&ActorId::new("102"), "Assalamu'alaikum")
            .await
            .unwrap();
        assert_eq!(request.direction, RequestDirection::Outgoing);
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.to.name, "Khadijah");
        assert_eq!(request.from.name, "Demo User");

        let outgoing = h.engine.list_outgoing().await.unwrap();
        assert_eq!(outgoing, vec![request]);
        assert!(h.engine.list_incoming().await.unwrap().is_empty());

        let err = h
            .engine
            .send_request(&ActorId::new("102"), "again")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_send_message_without_process() {
        let h = harness();
        let err = h.engine.send_message("hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        let last = h.notifier.last().await.unwrap();
        assert_eq!(last.kind, NotificationKind::Error);
        assert_eq!(last.title, "No active taaruf");
    }

    #[tokio::test]
    async fn test_escalation_gate() {
        let h = harness();
        with_active_process(&h, 0, 1).await;
        let err = h.engine.request_escalation().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotReady);
        assert_eq!(h.notifier.last().await.unwrap().title, "Process not ready");

        let h = harness();
        with_active_process(&h, 48, 2).await;
        let process = h.engine.send_message("hi").await.unwrap();
        assert_eq!(process.progress, 53);
        let process = h.engine.request_escalation().await.unwrap();
        assert_eq!(process.status, ProcessStatus::NadzorRequested);
        assert_eq!(h.notifier.last().await.unwrap().title, "Nadzor requested");
    }

    #[tokio::test]
    async fn test_stage_advance_through_engine() {
        let h = harness();
        with_active_process(&h, 92, 2).await;
        let process = h.engine.send_message("hi").await.unwrap();
        assert_eq!(process.progress, 97);
        assert_eq!(process.current_stage, 3);
        assert_eq!(process.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_configured_progress_step() {
        let h = harness();
        with_active_process(&h, 0, 1).await;
        let engine = h.engine.with_config(EngineConfig {
            progress_per_message: 25,
            total_stages: 5,
        });

        let process = engine.send_message("hi").await.unwrap();
        assert_eq!(process.progress, 25);
        let process = engine.send_message("again").await.unwrap();
        assert_eq!(process.progress, 50);
    }

    #[tokio::test]
    async fn test_terminate_requires_reason() {
        let h = harness();
        with_active_process(&h, 30, 2).await;
        let err = h.engine.terminate("  ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            h.engine.active_process().await.unwrap().unwrap().status,
            ProcessStatus::InProgress
        );

        let process = h.engine.terminate("Different life goals").await.unwrap();
        assert_eq!(process.status, ProcessStatus::Rejected);
        assert!(h.engine.active_process().await.unwrap().is_none());
        assert_eq!(
            h.engine.current_process().await.unwrap().unwrap().termination_reason.as_deref(),
            Some("Different life goals")
        );

        let err = h.engine.send_message("hello?").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_counterpart_handshake() {
        let h = harness();
        with_active_process(&h, 60, 3).await;
        assert_eq!(
            h.engine.approve_escalation().await.unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        h.engine.request_escalation().await.unwrap();
        h.engine.approve_escalation().await.unwrap();
        let process = h.engine.complete_process().await.unwrap();
        assert_eq!(process.status, ProcessStatus::Completed);
        assert_eq!(process.transitions.len(), 3);
    }

    #[tokio::test]
    async fn test_new_process_after_termination() {
        let h = harness();
        with_active_process(&h, 10, 1).await;
        h.engine.terminate("not a match").await.unwrap();
        h.engine
            .receive_request("R2", &ActorId::new("102"), "hello")
            .await
            .unwrap();
        let process = h.engine.accept("R2").await.unwrap();
        assert_eq!(process.partner.name, "Khadijah");
        assert_eq!(h.engine.process_history().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_signed_out_caller_rejected() {
        let h = harness();
        with_active_process(&h, 60, 3).await;
        h.session.sign_out().await;

        let err = h.engine.send_message("hi").await.unwrap_err();
        assert!(matches!(err, TaarufError::Unauthenticated));
        assert_eq!(err.kind(), ErrorKind::Precondition);
        let err = h.engine.request_escalation().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(h.engine.list_incoming().await.unwrap().is_empty());
        assert!(h.engine.active_process().await.unwrap().is_none());

        h.session.sign_in(me()).await;
        let process = h.engine.active_process().await.unwrap().unwrap();
        assert_eq!(process.progress, 60);
        assert_eq!(process.status, ProcessStatus::InProgress);
    }

    #[tokio::test]
    async fn test_search_excludes_self() {
        let h = harness();
        let criteria = SearchCriteria {
            max_age: 26,
            ..Default::default()
        };
        let results = h.engine.search(&criteria).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Fatimah");
    }

    #[tokio::test]
    async fn test_concurrent_messages_are_serialized() {
        let h = harness();
        with_active_process(&h, 0, 1).await;
        let engine = Arc::new(h.engine);

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.send_message(&format!("message {i}")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let process = engine.active_process().await.unwrap().unwrap();
        assert_eq!(process.progress, 50);
        let mut ids: Vec<u32> = process.messages.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
        assert!(!engine.is_busy());
    }

    #[tokio::test]
    async fn test_is_busy_while_operation_runs() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let engine = Arc::new(TaarufEngine::new(
            Arc::new(InMemorySession::signed_in(me())),
            Arc::new(GatedNotifier {
                entered: entered.clone(),
                release: release.clone(),
            }),
            Box::new(InMemoryRequestStore::new()),
            Box::new(InMemoryProcessStore::new()),
            Box::new(directory()),
        ));
        assert!(!engine.is_busy());

        let running = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .receive_request("R1", &ActorId::new("101"), "hello")
                    .await
            })
        };
        entered.notified().await;
        assert!(engine.is_busy());

        release.notify_one();
        running.await.unwrap().unwrap();
        assert!(!engine.is_busy());
        assert_eq!(engine.list_incoming().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_accept_restores_request_when_process_not_saved() {
        let notifier = RecordingNotifier::new();
        let engine = TaarufEngine::new(
            Arc::new(InMemorySession::signed_in(me())),
            Arc::new(notifier.clone()),
            Box::new(InMemoryRequestStore::new()),
            Box::new(ReadOnlyProcessStore),
            Box::new(directory()),
        );
        engine
            .receive_request("R1", &ActorId::new("101"), "hello")
            .await
            .unwrap();

        let err = engine.accept("R1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(notifier.last().await.unwrap().kind, NotificationKind::Error);

        let incoming = engine.list_incoming().await.unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].status, RequestStatus::Pending);
        assert!(engine.resolved_requests().await.unwrap().is_empty());
        assert!(engine.current_process().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unwritable_state_file_leaves_state_unchanged() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("missing_dir").join("state.json")).unwrap();
        let engine = TaarufEngine::new(
            Arc::new(InMemorySession::signed_in(me())),
            Arc::new(RecordingNotifier::new()),
            Box::new(store.clone()),
            Box::new(store),
            Box::new(directory()),
        );

        let err = engine
            .receive_request("R1", &ActorId::new("101"), "hello")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(engine.list_incoming().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_state_write_keeps_process() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::open(&path).unwrap();
        let engine = TaarufEngine::new(
            Arc::new(InMemorySession::signed_in(me())),
            Arc::new(RecordingNotifier::new()),
            Box::new(store.clone()),
            Box::new(store),
            Box::new(directory()),
        );
        engine
            .receive_request("R1", &ActorId::new("101"), "hello")
            .await
            .unwrap();
        engine.accept("R1").await.unwrap();
        engine.send_message("Assalamu'alaikum").await.unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(engine.send_message("hello").await.is_err());
        let process = engine.active_process().await.unwrap().unwrap();
        assert_eq!(process.progress, 5);
        assert_eq!(process.messages.len(), 1);
    }
}
