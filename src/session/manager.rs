use crate::api::{
    ApiError, CheckIn, Invoice, LoginCredentials, Member, MemberApi, MemberId, MemberUpdate,
    MembershipPlan, Offer, Payment, Subscription, SubscriptionStatus,
};
use crate::env::store::SESSION_MARKER_KEY;
use crate::session::identity::{Identity, SessionError, SessionSnapshot};
use crate::store::KeyValueStore;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Owns the authenticated identity and its persisted session marker
///
/// The server session cookie is the real authority; the marker stored under
/// [`SESSION_MARKER_KEY`] only says that restoring is worth a try. Identity
/// changes are published on a watch channel, see [`SessionManager::subscribe`].
pub struct SessionManager {
    api: Arc<dyn MemberApi>,
    store: Arc<dyn KeyValueStore>,
    state_tx: watch::Sender<SessionSnapshot>,
}

/// Active subscription together with the plan it was bought on
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipOverview {
    pub subscription: Option<Subscription>,
    pub plan: Option<MembershipPlan>,
}

impl SessionManager {
    /// Create a session manager in the [`Identity::Unknown`] state
    pub fn new(api: Arc<dyn MemberApi>, store: Arc<dyn KeyValueStore>) -> Self {
        let (state_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            api,
            store,
            state_tx,
        }
    }

    /// Receiver that observes identity transitions
    ///
    /// Like any watch channel it only keeps the latest value, so a logout
    /// followed by a login may arrive as one update. The generation tells
    /// such a new session apart from the old one.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_tx.borrow().clone()
    }

    /// Current identity
    pub fn identity(&self) -> Identity {
        self.state_tx.borrow().identity.clone()
    }

    /// Number of logins published so far
    pub fn generation(&self) -> u64 {
        self.state_tx.borrow().generation
    }

    pub fn is_authenticated(&self) -> bool {
        self.state_tx.borrow().identity.is_authenticated()
    }

    pub fn api(&self) -> &Arc<dyn MemberApi> {
        &self.api
    }

    /// Restore a previous session at startup
    ///
    /// Never fails: a missing, stale or unreadable marker leaves the client
    /// logged out, and a marker the server contradicts is removed.
    pub async fn restore(&self) {
        let marker = match self.store.get(SESSION_MARKER_KEY).await {
            Ok(marker) => marker,
            Err(e) => {
                warn!("Could not read session marker: {}", e);
                None
            }
        };

        let Some(marker) = marker else {
            debug!("No session marker stored, starting logged out");
            self.publish(Identity::LoggedOut);
            return;
        };

        match self.api.fetch_current_member().await {
            Ok(member) => {
                if member.id.to_string() != marker {
                    warn!(
                        "Session marker {} does not match restored member {}",
                        marker, member.id
                    );
                }
                info!("Restored session for member {}", member.id);
                self.publish(Identity::LoggedIn(member));
            }
            Err(e) => {
                info!("Stored session could not be restored: {}", e);
                self.clear_marker().await;
                self.publish(Identity::LoggedOut);
            }
        }
    }

    /// Log in with member credentials
    ///
    /// The marker is persisted before the member record is fetched. Failures
    /// are returned to the caller and leave the identity as it was, except
    /// an unauthorized member fetch, which clears the session.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<Member, SessionError> {
        info!("Logging in member with id number {}", mask(&credentials.id_number));

        let response = self.api.login(credentials).await.map_err(|e| match e {
            ApiError::Validation(message) => SessionError::Validation(message),
            other => SessionError::Api(other),
        })?;

        let member_id = match (response.success, response.member_id) {
            (true, Some(member_id)) => member_id,
            _ => {
                let message = response
                    .message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "Login failed".to_string());
                warn!("Login rejected: {}", message);
                return Err(SessionError::Validation(message));
            }
        };

        self.store
            .set(SESSION_MARKER_KEY, &member_id.to_string())
            .await?;

        let member = self.authorized(self.api.fetch_current_member()).await?;
        if member.id != member_id {
            warn!(
                "Login answered member {} but session belongs to member {}",
                member_id, member.id
            );
        }

        info!("Logged in as member {}", member.id);
        self.publish(Identity::LoggedIn(member.clone()));
        Ok(member)
    }

    /// Log out: best effort remotely, unconditional locally
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout_session().await {
            warn!("Remote logout failed, clearing local session anyway: {}", e);
        }

        self.publish(Identity::LoggedOut);
        self.clear_marker().await;
        info!("Logged out");
    }

    /// Re-fetch the member record
    ///
    /// Transient failures keep the current identity. An unauthorized answer
    /// tears the session down like any other authenticated call.
    pub async fn refresh(&self) {
        let Some(current_id) = self.state_tx.borrow().identity.member_id() else {
            debug!("Refresh skipped, no active session");
            return;
        };

        match self.authorized(self.api.fetch_current_member()).await {
            Ok(member) => {
                self.replace_member(current_id, member);
            }
            Err(ApiError::Unauthorized) => {}
            Err(e) => warn!("Refreshing member {} failed: {}", current_id, e),
        }
    }

    /// Run an authenticated call, tearing the session down on `Unauthorized`
    pub async fn authorized<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let result = call.await;
        if matches!(result, Err(ApiError::Unauthorized)) {
            self.teardown().await;
        }
        result
    }

    /// Update editable profile fields and adopt the returned record
    pub async fn update_member(&self, update: &MemberUpdate) -> Result<Member, ApiError> {
        let member = self.authorized(self.api.update_member(update)).await?;
        let current_id = self.state_tx.borrow().identity.member_id();
        if let Some(current_id) = current_id {
            self.replace_member(current_id, member.clone());
        }
        Ok(member)
    }

    pub async fn subscriptions(&self) -> Result<Vec<Subscription>, ApiError> {
        self.authorized(self.api.subscriptions()).await
    }

    /// First subscription with status `active`, if any
    pub async fn active_subscription(&self) -> Result<Option<Subscription>, ApiError> {
        let subscriptions = self.subscriptions().await?;
        Ok(subscriptions
            .into_iter()
            .find(|subscription| subscription.status == SubscriptionStatus::Active))
    }

    pub async fn payments(&self) -> Result<Vec<Payment>, ApiError> {
        self.authorized(self.api.payments()).await
    }

    pub async fn invoices(&self) -> Result<Vec<Invoice>, ApiError> {
        self.authorized(self.api.invoices()).await
    }

    pub async fn download_invoice(&self, invoice_id: i64) -> Result<Vec<u8>, ApiError> {
        self.authorized(self.api.download_invoice(invoice_id)).await
    }

    pub async fn plans(&self) -> Result<Vec<MembershipPlan>, ApiError> {
        self.authorized(self.api.plans()).await
    }

    pub async fn check_ins(&self) -> Result<Vec<CheckIn>, ApiError> {
        self.authorized(self.api.check_ins()).await
    }

    pub async fn offers(&self) -> Result<Vec<Offer>, ApiError> {
        self.authorized(self.api.offers()).await
    }

    /// Fetch the active subscription and the plan list in parallel
    ///
    /// Both requests must succeed; a partial result is never returned.
    pub async fn membership_overview(&self) -> Result<MembershipOverview, ApiError> {
        let (subscription, plans) = futures::try_join!(self.active_subscription(), self.plans())?;

        let plan = subscription.as_ref().and_then(|subscription| {
            plans
                .into_iter()
                .find(|plan| plan.id == subscription.plan_id)
        });

        Ok(MembershipOverview { subscription, plan })
    }

    /// Drop the local session after the server stopped honouring it
    async fn teardown(&self) {
        let was_authenticated = self.is_authenticated();
        if was_authenticated {
            info!("Session is no longer authorized, logging out locally");
        }
        self.clear_marker().await;
        self.publish(Identity::LoggedOut);
    }

    async fn clear_marker(&self) {
        if let Err(e) = self.store.remove(SESSION_MARKER_KEY).await {
            warn!("Failed to remove session marker: {}", e);
        }
    }

    /// Swap in a fresh record, unless the session changed while it was in flight
    fn replace_member(&self, expected_id: MemberId, member: Member) {
        let applied = self.state_tx.send_if_modified(|state| match &mut state.identity {
            Identity::LoggedIn(current) if current.id == expected_id => {
                if *current == member {
                    false
                } else {
                    *current = member;
                    true
                }
            }
            _ => false,
        });
        if applied {
            debug!("Member {} record updated", expected_id);
        }
    }

    /// Publish `next`, starting a new generation when it begins a login
    fn publish(&self, next: Identity) {
        self.state_tx.send_if_modified(|state| {
            if state.identity == next {
                return false;
            }
            if let Some(member_id) = next.member_id()
                && state.identity.member_id() != Some(member_id)
            {
                state.generation += 1;
            }
            state.identity = next;
            true
        });
    }
}

/// Keep only the last few characters of an identifier for logging
fn mask(value: &str) -> String {
    let hidden = value.chars().count().saturating_sub(3);
    let visible: String = value.chars().skip(hidden).collect();
    format!("***{}", visible)
}
