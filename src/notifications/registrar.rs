use crate::api::{ApiError, MemberId};
use crate::config::NotificationConfig;
use crate::env::store::PUSH_TOKEN_KEY;
use crate::notifications::dispatch::{self, IncomingNotification, NotificationEvent, NotificationRoute};
use crate::notifications::platform::{LocalNotification, PermissionStatus, PushError, PushPlatform};
use crate::session::{SessionManager, SessionSnapshot};
use crate::store::KeyValueStore;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Push state exposed for display and debugging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushState {
    pub token: Option<String>,
    pub last_notification: Option<IncomingNotification>,
}

/// How a registration pass ended
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Logged out; registration state was reset
    Reset,
    /// Push notifications are turned off in the configuration
    Disabled,
    /// The device produced no token
    NoToken,
    /// The backend already has the token for this session
    AlreadySent,
    /// Another pass for this session is sending the token right now
    InFlight,
    Sent,
    /// The identity changed while the pass was running; its result was dropped
    Superseded,
    Failed(ApiError),
}

/// Snapshot taken when a pass starts, checked again before its result is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTicket {
    epoch: u64,
    member_id: Option<MemberId>,
}

#[derive(Debug, Default)]
struct Registration {
    push_token: Option<String>,
    token_sent: bool,
    /// A send for the current epoch has started and not yet returned
    sending: bool,
    member_id: Option<MemberId>,
    /// Session generation the current registration belongs to
    generation: u64,
    /// Bumped whenever the identity holder or its session changes
    epoch: u64,
}

/// Registers the device push token for the logged-in member and dispatches
/// incoming notifications
///
/// The registrar never mutates the identity. It follows the session
/// manager's identity channel and keeps a de-duplication flag so the token
/// is sent once per login session rather than on every identity update.
pub struct NotificationRegistrar {
    session: Arc<SessionManager>,
    platform: Arc<dyn PushPlatform>,
    store: Arc<dyn KeyValueStore>,
    config: NotificationConfig,
    registration: Mutex<Registration>,
    push_state: watch::Sender<PushState>,
    router: Option<mpsc::UnboundedSender<NotificationRoute>>,
}

impl NotificationRegistrar {
    pub fn new(
        session: Arc<SessionManager>,
        platform: Arc<dyn PushPlatform>,
        store: Arc<dyn KeyValueStore>,
        config: NotificationConfig,
    ) -> Self {
        let (push_state, _) = watch::channel(PushState::default());
        Self {
            session,
            platform,
            store,
            config,
            registration: Mutex::new(Registration::default()),
            push_state,
            router: None,
        }
    }

    /// Forward routing decisions for tapped notifications to `router`
    pub fn with_router(mut self, router: mpsc::UnboundedSender<NotificationRoute>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn subscribe_push_state(&self) -> watch::Receiver<PushState> {
        self.push_state.subscribe()
    }

    pub fn push_state(&self) -> PushState {
        self.push_state.borrow().clone()
    }

    /// Whether the current token has reached the backend for this session
    pub fn token_sent(&self) -> bool {
        self.lock_registration().token_sent
    }

    /// Follow identity changes for as long as the session manager lives
    ///
    /// The state reset for each change happens in order on this task; the
    /// remote part of each pass runs on a task owned by it, so a slow send
    /// never delays reacting to the next change. Aborting the returned
    /// handle also aborts passes still running.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut identity_rx = self.session.subscribe();
        tokio::spawn(async move {
            let mut passes = JoinSet::new();
            loop {
                let session = identity_rx.borrow_and_update().clone();
                if let Some(ticket) = self.begin_sync(&session) {
                    let registrar = self.clone();
                    passes.spawn(async move { registrar.complete_sync(ticket).await });
                }

                loop {
                    tokio::select! {
                        changed = identity_rx.changed() => {
                            if changed.is_err() {
                                debug!("Identity channel closed, stopping push registration");
                                while passes.join_next().await.is_some() {}
                                return;
                            }
                            break;
                        }
                        Some(finished) = passes.join_next() => match finished {
                            Ok(outcome) => debug!("Push registration pass ended: {:?}", outcome),
                            Err(e) if e.is_panic() => warn!("Push registration pass panicked: {}", e),
                            Err(_) => {}
                        },
                    }
                }
            }
        })
    }

    /// Bring push registration in line with `session`
    pub async fn sync_registration(&self, session: &SessionSnapshot) -> SyncOutcome {
        match self.begin_sync(session) {
            Some(ticket) => self.complete_sync(ticket).await,
            None => SyncOutcome::Reset,
        }
    }

    /// Synchronous half of a pass: reset state for a new session
    ///
    /// Returns `None` when logged out, in which case there is nothing
    /// left to do.
    pub fn begin_sync(&self, session: &SessionSnapshot) -> Option<SyncTicket> {
        let mut registration = self.lock_registration();

        let Some(member_id) = session.identity.member_id() else {
            if registration.member_id.is_some() || registration.token_sent {
                debug!("Logged out, resetting push registration");
            }
            registration.epoch += 1;
            registration.member_id = None;
            registration.token_sent = false;
            registration.sending = false;
            registration.push_token = None;
            drop(registration);
            self.push_state.send_modify(|state| state.token = None);
            return None;
        };

        if registration.member_id != Some(member_id)
            || registration.generation != session.generation
        {
            registration.epoch += 1;
            registration.member_id = Some(member_id);
            registration.generation = session.generation;
            registration.token_sent = false;
            registration.sending = false;
        }

        Some(SyncTicket {
            epoch: registration.epoch,
            member_id: Some(member_id),
        })
    }

    /// Remote half of a pass: acquire the token and send it once
    pub async fn complete_sync(&self, ticket: SyncTicket) -> SyncOutcome {
        let Some(member_id) = ticket.member_id else {
            return SyncOutcome::Reset;
        };

        if !self.config.enabled {
            debug!("Push notifications disabled, skipping registration");
            return SyncOutcome::Disabled;
        }

        let Some(token) = self.acquire_token().await else {
            return SyncOutcome::NoToken;
        };

        {
            let mut registration = self.lock_registration();
            if registration.epoch != ticket.epoch {
                debug!("Identity changed while acquiring push token");
                return SyncOutcome::Superseded;
            }
            registration.push_token = Some(token.clone());
            let outcome = if registration.token_sent {
                Some(SyncOutcome::AlreadySent)
            } else if registration.sending {
                Some(SyncOutcome::InFlight)
            } else {
                registration.sending = true;
                None
            };
            drop(registration);
            self.publish_token(&token);
            if let Some(outcome) = outcome {
                return outcome;
            }
        }

        let sent = self
            .session
            .authorized(self.session.api().send_push_token(member_id, &token))
            .await;

        let mut registration = self.lock_registration();
        if registration.epoch != ticket.epoch {
            debug!(
                "Push token send for member {} returned after the session changed",
                member_id
            );
            return SyncOutcome::Superseded;
        }
        registration.sending = false;

        match sent {
            Ok(()) => {
                registration.token_sent = true;
                info!("Push token sent to server for member {}", member_id);
                SyncOutcome::Sent
            }
            Err(e) => {
                warn!("Failed to register push token: {}", e);
                SyncOutcome::Failed(e)
            }
        }
    }

    /// Get a push token from the device, `None` in any degraded mode
    async fn acquire_token(&self) -> Option<String> {
        match self.request_device_token().await {
            Ok(token) => {
                if let Err(e) = self.store.set(PUSH_TOKEN_KEY, &token).await {
                    warn!("Failed to cache push token: {}", e);
                }
                debug!("Push token acquired: {}", token_prefix(&token));
                Some(token)
            }
            Err(PushError::PermissionDenied) => {
                info!("Push notification permissions not granted");
                None
            }
            Err(PushError::NotApplicable(reason)) => {
                info!("Push notifications unavailable: {}", reason);
                None
            }
            Err(PushError::Platform(reason)) => {
                warn!("Error registering for push notifications: {}", reason);
                self.cached_token().await
            }
        }
    }

    async fn request_device_token(&self) -> Result<String, PushError> {
        if !self.platform.is_physical_device() {
            return Err(PushError::NotApplicable(
                "must use a physical device for push notifications".to_string(),
            ));
        }

        let mut status = self.platform.permission_status().await?;
        if status != PermissionStatus::Granted {
            status = self.platform.request_permission().await?;
        }
        if status != PermissionStatus::Granted {
            return Err(PushError::PermissionDenied);
        }

        self.platform.prepare_channel().await?;
        self.platform
            .issue_token(self.config.project_id.as_deref())
            .await
    }

    /// Token cached by an earlier successful acquisition
    async fn cached_token(&self) -> Option<String> {
        match self.store.get(PUSH_TOKEN_KEY).await {
            Ok(Some(token)) => {
                debug!("Falling back to cached push token");
                Some(token)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read cached push token: {}", e);
                None
            }
        }
    }

    /// Handle a notification that arrived while in the foreground
    pub fn on_notification_received(&self, notification: IncomingNotification) {
        info!("Notification received: {}", notification.id);
        self.push_state
            .send_modify(|state| state.last_notification = Some(notification));
    }

    /// Handle the user responding to a notification
    pub fn on_notification_response(
        &self,
        notification: &IncomingNotification,
    ) -> Option<NotificationRoute> {
        debug!("Notification response: {}", notification.id);
        self.dispatch_incoming(&notification.data)
    }

    /// Classify a payload and forward it to the navigation layer
    pub fn dispatch_incoming(
        &self,
        payload: &dispatch::NotificationData,
    ) -> Option<NotificationRoute> {
        let Some(route) = dispatch::route(payload) else {
            debug!("Ignoring notification without a known category");
            return None;
        };

        if let Some(router) = &self.router
            && router.send(route.clone()).is_err()
        {
            debug!("Notification router is gone, dropping route");
        }
        Some(route)
    }

    /// Drain the platform's delivery channels until the sender is dropped
    pub fn listen(self: Arc<Self>, mut events: mpsc::Receiver<NotificationEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    NotificationEvent::Received(notification) => {
                        self.on_notification_received(notification)
                    }
                    NotificationEvent::Responded(notification) => {
                        self.on_notification_response(&notification);
                    }
                }
            }
        })
    }

    pub async fn schedule_local_notification(
        &self,
        notification: LocalNotification,
    ) -> Result<String, PushError> {
        self.platform.schedule_local(notification).await
    }

    pub async fn cancel_all_notifications(&self) -> Result<(), PushError> {
        self.platform.cancel_all().await
    }

    pub async fn badge_count(&self) -> Result<u32, PushError> {
        self.platform.badge_count().await
    }

    pub async fn set_badge_count(&self, count: u32) -> Result<(), PushError> {
        self.platform.set_badge_count(count).await
    }

    fn publish_token(&self, token: &str) {
        self.push_state.send_if_modified(|state| {
            if state.token.as_deref() == Some(token) {
                false
            } else {
                state.token = Some(token.to_string());
                true
            }
        });
    }

    fn lock_registration(&self) -> MutexGuard<'_, Registration> {
        // The guarded data stays consistent even if a holder panicked
        self.registration
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shortened token for log output
fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(12).collect();
    format!("{}...", prefix)
}
