//! In-process fakes shared by the unit tests.

use crate::api::*;
use crate::notifications::{LocalNotification, PermissionStatus, PushError, PushPlatform};
use crate::store::{KeyValueStore, MemoryStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Ordered record of calls made against the fakes
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

pub fn member(id: MemberId, status: MemberStatus) -> Member {
    Member {
        id,
        member_number: format!("M-{:04}", id),
        first_name: "Dana".to_string(),
        last_name: "Levi".to_string(),
        phone: "0501234567".to_string(),
        email: format!("member{}@example.com", id),
        id_number: "123456789".to_string(),
        date_of_birth: "1990-04-01".to_string(),
        gender: "female".to_string(),
        address: None,
        photo_url: None,
        join_date: "2024-01-15".to_string(),
        status,
    }
}

pub fn credentials() -> LoginCredentials {
    LoginCredentials {
        id_number: "123456789".to_string(),
        phone: "0501234567".to_string(),
    }
}

pub fn subscription(id: i64, plan_id: i64, status: SubscriptionStatus) -> Subscription {
    Subscription {
        id,
        member_id: 42,
        plan_id,
        start_date: "2026-01-01".to_string(),
        end_date: "2026-12-31".to_string(),
        status,
        auto_renew: false,
    }
}

pub fn plan(id: i64, name: &str) -> MembershipPlan {
    MembershipPlan {
        id,
        name: name.to_string(),
        duration: 12,
        duration_unit: DurationUnit::Months,
        price: "1200.00".to_string(),
        tax_percentage: "17".to_string(),
        description: None,
        is_active: true,
    }
}

/// Scriptable [`MemberApi`]
pub struct FakeApi {
    journal: Journal,
    pub login_result: Mutex<Result<AuthResponse, ApiError>>,
    pub member_result: Mutex<Result<Member, ApiError>>,
    pub logout_result: Mutex<Result<(), ApiError>>,
    pub subscriptions_result: Mutex<Result<Vec<Subscription>, ApiError>>,
    pub plans_result: Mutex<Result<Vec<MembershipPlan>, ApiError>>,
    push_results: Mutex<HashMap<MemberId, Result<(), ApiError>>>,
    push_holds: Mutex<HashMap<MemberId, Arc<Notify>>>,
    pub push_entered: Notify,
    pub push_calls: Mutex<Vec<(MemberId, String)>>,
    pub remote_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            login_result: Mutex::new(Ok(AuthResponse {
                success: true,
                member_id: Some(42),
                message: None,
            })),
            member_result: Mutex::new(Ok(member(42, MemberStatus::Active))),
            logout_result: Mutex::new(Ok(())),
            subscriptions_result: Mutex::new(Ok(Vec::new())),
            plans_result: Mutex::new(Ok(Vec::new())),
            push_results: Mutex::new(HashMap::new()),
            push_holds: Mutex::new(HashMap::new()),
            push_entered: Notify::new(),
            push_calls: Mutex::new(Vec::new()),
            remote_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_login(&self, result: Result<AuthResponse, ApiError>) {
        *self.login_result.lock().unwrap() = result;
    }

    pub fn set_member(&self, result: Result<Member, ApiError>) {
        *self.member_result.lock().unwrap() = result;
    }

    pub fn set_logout(&self, result: Result<(), ApiError>) {
        *self.logout_result.lock().unwrap() = result;
    }

    pub fn set_push_result(&self, member_id: MemberId, result: Result<(), ApiError>) {
        self.push_results.lock().unwrap().insert(member_id, result);
    }

    /// Make push-token sends for `member_id` wait until the returned handle is notified
    pub fn hold_push(&self, member_id: MemberId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.push_holds
            .lock()
            .unwrap()
            .insert(member_id, gate.clone());
        gate
    }

    pub fn push_call_count(&self) -> usize {
        self.push_calls.lock().unwrap().len()
    }

    pub fn call_count(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    fn record(&self, entry: &str) {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().unwrap().push(entry.to_string());
    }
}

#[async_trait]
impl MemberApi for FakeApi {
    async fn login(&self, _credentials: &LoginCredentials) -> Result<AuthResponse, ApiError> {
        self.record("api.login");
        self.login_result.lock().unwrap().clone()
    }

    async fn fetch_current_member(&self) -> Result<Member, ApiError> {
        self.record("api.fetch_current_member");
        self.member_result.lock().unwrap().clone()
    }

    async fn logout_session(&self) -> Result<(), ApiError> {
        self.record("api.logout_session");
        self.logout_result.lock().unwrap().clone()
    }

    async fn send_push_token(&self, member_id: MemberId, token: &str) -> Result<(), ApiError> {
        self.record(&format!("api.send_push_token {}", member_id));
        self.push_calls
            .lock()
            .unwrap()
            .push((member_id, token.to_string()));
        self.push_entered.notify_one();

        let gate = self.push_holds.lock().unwrap().get(&member_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.push_results
            .lock()
            .unwrap()
            .get(&member_id)
            .cloned()
            .unwrap_or(Ok(()))
    }

    async fn update_member(&self, update: &MemberUpdate) -> Result<Member, ApiError> {
        self.record("api.update_member");
        let mut updated = self.member_result.lock().unwrap().clone()?;
        if let Some(email) = &update.email {
            updated.email = email.clone();
        }
        if let Some(phone) = &update.phone {
            updated.phone = phone.clone();
        }
        Ok(updated)
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>, ApiError> {
        self.record("api.subscriptions");
        self.subscriptions_result.lock().unwrap().clone()
    }

    async fn payments(&self) -> Result<Vec<Payment>, ApiError> {
        self.record("api.payments");
        Ok(Vec::new())
    }

    async fn invoices(&self) -> Result<Vec<Invoice>, ApiError> {
        self.record("api.invoices");
        Ok(Vec::new())
    }

    async fn download_invoice(&self, _invoice_id: i64) -> Result<Vec<u8>, ApiError> {
        self.record("api.download_invoice");
        Ok(b"%PDF-1.4".to_vec())
    }

    async fn plans(&self) -> Result<Vec<MembershipPlan>, ApiError> {
        self.record("api.plans");
        self.plans_result.lock().unwrap().clone()
    }

    async fn check_ins(&self) -> Result<Vec<CheckIn>, ApiError> {
        self.record("api.check_ins");
        Ok(Vec::new())
    }

    async fn offers(&self) -> Result<Vec<Offer>, ApiError> {
        self.record("api.offers");
        Ok(Vec::new())
    }
}

/// [`MemoryStore`] that writes every mutation into a [`Journal`]
pub struct JournalStore {
    inner: MemoryStore,
    journal: Journal,
}

impl JournalStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            inner: MemoryStore::new(),
            journal,
        }
    }

    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner.peek(key)
    }
}

#[async_trait]
impl KeyValueStore for JournalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("store.set {}={}", key, value));
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("store.remove {}", key));
        self.inner.remove(key).await
    }
}

/// Scriptable [`PushPlatform`]
pub struct FakePlatform {
    pub physical_device: bool,
    pub status: Mutex<PermissionStatus>,
    pub request_outcome: PermissionStatus,
    pub token: Mutex<Result<String, PushError>>,
    pub permission_requests: AtomicUsize,
    pub token_requests: AtomicUsize,
    pub scheduled: Mutex<Vec<LocalNotification>>,
    pub badge: Mutex<u32>,
}

impl FakePlatform {
    pub fn with_token(token: &str) -> Self {
        Self {
            physical_device: true,
            status: Mutex::new(PermissionStatus::Granted),
            request_outcome: PermissionStatus::Granted,
            token: Mutex::new(Ok(token.to_string())),
            permission_requests: AtomicUsize::new(0),
            token_requests: AtomicUsize::new(0),
            scheduled: Mutex::new(Vec::new()),
            badge: Mutex::new(0),
        }
    }

    /// Simulator or emulator: no push token can be issued
    pub fn simulator() -> Self {
        Self {
            physical_device: false,
            ..Self::with_token("unused")
        }
    }

    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushPlatform for FakePlatform {
    fn is_physical_device(&self) -> bool {
        self.physical_device
    }

    async fn permission_status(&self) -> Result<PermissionStatus, PushError> {
        Ok(*self.status.lock().unwrap())
    }

    async fn request_permission(&self) -> Result<PermissionStatus, PushError> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        let outcome = self.request_outcome;
        *self.status.lock().unwrap() = outcome;
        Ok(outcome)
    }

    async fn issue_token(&self, _project_id: Option<&str>) -> Result<String, PushError> {
        self.token_requests.fetch_add(1, Ordering::SeqCst);
        self.token.lock().unwrap().clone()
    }

    async fn schedule_local(&self, notification: LocalNotification) -> Result<String, PushError> {
        let mut scheduled = self.scheduled.lock().unwrap();
        scheduled.push(notification);
        Ok(format!("local-{}", scheduled.len()))
    }

    async fn cancel_all(&self) -> Result<(), PushError> {
        self.scheduled.lock().unwrap().clear();
        Ok(())
    }

    async fn badge_count(&self) -> Result<u32, PushError> {
        Ok(*self.badge.lock().unwrap())
    }

    async fn set_badge_count(&self, count: u32) -> Result<(), PushError> {
        *self.badge.lock().unwrap() = count;
        Ok(())
    }
}
