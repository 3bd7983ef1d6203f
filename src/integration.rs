//! # Client Assembly
//!
//! Wires the API client, durable store, session manager and notification
//! registrar into one running member client.
//!
//! ## Core Components
//!
//! - **[`MemberClient`]**: Owns every subsystem and the background tasks linking them
//! - **[`ClientStatus`]**: Snapshot of the session and push registration
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    MemberClient                      │
//! │  ┌─────────────┐  identity  ┌──────────────────────┐ │
//! │  │   Session   │ ─────────▶ │     Notification     │ │
//! │  │   Manager   │   watch    │      Registrar       │ │
//! │  └──────┬──────┘            └──────────┬───────────┘ │
//! │         │                              │             │
//! │  ┌──────▼──────┐  ┌─────────────┐  ┌───▼──────────┐  │
//! │  │  MemberApi  │  │  Key-value  │  │ PushPlatform │  │
//! │  │   (HTTP)    │  │    store    │  │              │  │
//! │  └─────────────┘  └─────────────┘  └──────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use memberlink::{ClientConfig, LoginCredentials, MemberClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = MemberClient::new(&ClientConfig::default()).await?;
//!
//!     let credentials = LoginCredentials {
//!         id_number: "123456789".to_string(),
//!         phone: "0501234567".to_string(),
//!     };
//!     let member = client.session().login(&credentials).await?;
//!     println!("Welcome, {}", member.display_name());
//!
//!     client.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::api::{HttpApiClient, MemberApi, MemberId};
use crate::config::{ClientConfig, NotificationConfig};
use crate::env::store::SESSION_COOKIE_KEY;
use crate::notifications::{
    HeadlessPlatform, NotificationEvent, NotificationRegistrar, NotificationRoute, PushPlatform,
};
use crate::session::SessionManager;
use crate::store::{FileStore, KeyValueStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the channel carrying platform notification events
const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

/// Running member client
pub struct MemberClient {
    http: Option<Arc<HttpApiClient>>,
    store: Arc<dyn KeyValueStore>,
    session: Arc<SessionManager>,
    registrar: Arc<NotificationRegistrar>,
    notification_tx: mpsc::Sender<NotificationEvent>,
    tasks: Vec<JoinHandle<()>>,
}

/// Point-in-time view of the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientStatus {
    pub authenticated: bool,
    pub member_id: Option<MemberId>,
    pub member_name: Option<String>,
    pub push_token: Option<String>,
    pub push_token_sent: bool,
}

impl MemberClient {
    /// Build the client for a command line host
    ///
    /// Uses the HTTP backend, the file store under the configured data
    /// directory and the headless notification platform. A backend cookie
    /// saved by a previous run is loaded before the session is restored.
    pub async fn new(config: &ClientConfig) -> Result<Self> {
        let http = Arc::new(
            HttpApiClient::new(&config.api).context("Failed to create API client")?,
        );
        let store: Arc<dyn KeyValueStore> = Arc::new(
            FileStore::open(&config.data_dir()).context("Failed to open the data directory")?,
        );

        match store.get(SESSION_COOKIE_KEY).await {
            Ok(Some(cookie)) => http.restore_cookies(&cookie),
            Ok(None) => {}
            Err(e) => warn!("Could not read saved session cookie: {}", e),
        }

        let mut client = Self::with_components(
            http.clone(),
            store,
            Arc::new(HeadlessPlatform::new()),
            config.notifications.clone(),
            None,
        )
        .await;
        client.http = Some(http);
        Ok(client)
    }

    /// Assemble a client from explicit components and restore the session
    ///
    /// The registrar starts following identity changes before the restore,
    /// so a restored session is registered for push like a fresh login.
    pub async fn with_components(
        api: Arc<dyn MemberApi>,
        store: Arc<dyn KeyValueStore>,
        platform: Arc<dyn PushPlatform>,
        notifications: NotificationConfig,
        router: Option<mpsc::UnboundedSender<NotificationRoute>>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(api, store.clone()));

        let mut registrar =
            NotificationRegistrar::new(session.clone(), platform, store.clone(), notifications);
        if let Some(router) = router {
            registrar = registrar.with_router(router);
        }
        let registrar = Arc::new(registrar);

        let (notification_tx, notification_rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let tasks = vec![
            registrar.clone().spawn(),
            registrar.clone().listen(notification_rx),
        ];

        session.restore().await;
        debug!("Member client started");

        Self {
            http: None,
            store,
            session,
            registrar,
            notification_tx,
            tasks,
        }
    }

    pub fn session(&self) -> Arc<SessionManager> {
        self.session.clone()
    }

    pub fn registrar(&self) -> Arc<NotificationRegistrar> {
        self.registrar.clone()
    }

    /// Sender through which the host platform delivers notification events
    pub fn notification_sender(&self) -> mpsc::Sender<NotificationEvent> {
        self.notification_tx.clone()
    }

    pub fn status(&self) -> ClientStatus {
        let identity = self.session.identity();
        let push = self.registrar.push_state();
        ClientStatus {
            authenticated: identity.is_authenticated(),
            member_id: identity.member_id(),
            member_name: identity.member().map(|member| member.display_name()),
            push_token: push.token,
            push_token_sent: self.registrar.token_sent(),
        }
    }

    /// Save the backend cookie for the next run, or drop it when logged out
    pub async fn save_cookies(&self) -> Result<()> {
        let Some(http) = &self.http else {
            return Ok(());
        };

        match http.session_cookies() {
            Some(cookie) if self.session.is_authenticated() => self
                .store
                .set(SESSION_COOKIE_KEY, &cookie)
                .await
                .context("Failed to save session cookie")?,
            _ => self
                .store
                .remove(SESSION_COOKIE_KEY)
                .await
                .context("Failed to remove session cookie")?,
        }
        Ok(())
    }

    /// Stop background tasks after saving what the next run needs
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down member client...");

        self.save_cookies().await?;
        self.stop_tasks();

        info!("Member client shutdown complete");
        Ok(())
    }

    fn stop_tasks(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for MemberClient {
    fn drop(&mut self) {
        // The registrar tasks hold the session alive, so they never end on their own
        self.stop_tasks();
    }
}
