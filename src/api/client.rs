//! Remote API client for the membership backend.
//!
//! The backend authenticates with a server-side session cookie. The
//! [`HttpApiClient`] keeps a cookie store, so after a successful login every
//! further request carries the session implicitly. HTTP 401 on any call is
//! reported as [`ApiError::Unauthorized`]; deciding what that means for the
//! local session is left to the session manager.

use crate::api::types::*;
use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Operations offered by the membership backend
#[async_trait]
pub trait MemberApi: Send + Sync {
    /// Exchange credentials for a server session
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse, ApiError>;

    /// Fetch the member bound to the ambient session
    async fn fetch_current_member(&self) -> Result<Member, ApiError>;

    /// Invalidate the server session
    async fn logout_session(&self) -> Result<(), ApiError>;

    /// Register a device push token for the member
    async fn send_push_token(&self, member_id: MemberId, token: &str) -> Result<(), ApiError>;

    async fn update_member(&self, update: &MemberUpdate) -> Result<Member, ApiError>;

    async fn subscriptions(&self) -> Result<Vec<Subscription>, ApiError>;

    async fn payments(&self) -> Result<Vec<Payment>, ApiError>;

    async fn invoices(&self) -> Result<Vec<Invoice>, ApiError>;

    /// Raw PDF bytes of an invoice
    async fn download_invoice(&self, invoice_id: i64) -> Result<Vec<u8>, ApiError>;

    async fn plans(&self) -> Result<Vec<MembershipPlan>, ApiError>;

    async fn check_ins(&self) -> Result<Vec<CheckIn>, ApiError>;

    async fn offers(&self) -> Result<Vec<Offer>, ApiError>;
}

/// reqwest-backed implementation of [`MemberApi`]
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: Url,
    cookies: Arc<Jar>,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpApiClient {
    /// Build a client with a cookie store, JSON content type and the
    /// configured timeout
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidConfig(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidConfig(format!(
                "{} cannot be used as a base URL",
                config.base_url
            )));
        }
        // Relative joins would otherwise drop the last path segment
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let cookies = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(cookies.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        debug!("API client created for {}", base_url);
        Ok(Self {
            client,
            base_url,
            cookies,
        })
    }

    /// Cookies the backend has set, in `Cookie` header form
    ///
    /// Hosts without a native cookie store persist this between runs and
    /// hand it back through [`HttpApiClient::restore_cookies`].
    pub fn session_cookies(&self) -> Option<String> {
        self.cookies
            .cookies(&self.base_url)
            .and_then(|header| header.to_str().ok().map(str::to_string))
    }

    /// Seed the cookie store from a previously saved `Cookie` header
    pub fn restore_cookies(&self, header: &str) {
        for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.cookies.add_cookie_str(pair, &self.base_url);
        }
    }

    /// Base URL every endpoint is resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidConfig(format!("bad endpoint {}: {}", path, e)))
    }

    /// Send a request and translate non-success statuses into [`ApiError`]
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            debug!("Backend answered 401 for {}", response.url());
            return Err(ApiError::Unauthorized);
        }

        let message = Self::error_message(response).await;
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ApiError::Validation(message));
        }

        warn!("Backend answered {}: {}", status, message);
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn error_message(response: Response) -> String {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(ErrorBody {
                message: Some(message),
                ..
            }) => message,
            Ok(ErrorBody {
                error: Some(error), ..
            }) => error,
            _ if !text.trim().is_empty() => text,
            _ => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let response = self.send(self.client.get(url)).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MemberApi for HttpApiClient {
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse, ApiError> {
        let url = self.endpoint("api/member/login")?;
        let response = self.client.post(url).json(credentials).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<AuthResponse>().await?);
        }

        // Rejected credentials are a validation problem, not a lost session
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::BAD_REQUEST
            || status == StatusCode::NOT_FOUND
        {
            let message = Self::error_message(response).await;
            return Err(ApiError::Validation(message));
        }

        let message = Self::error_message(response).await;
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_current_member(&self) -> Result<Member, ApiError> {
        self.get_json("api/member/me").await
    }

    async fn logout_session(&self) -> Result<(), ApiError> {
        let url = self.endpoint("api/member/logout")?;
        self.send(self.client.post(url)).await?;
        Ok(())
    }

    async fn send_push_token(&self, member_id: MemberId, token: &str) -> Result<(), ApiError> {
        let url = self.endpoint("api/member/push-token")?;
        let body = serde_json::json!({ "token": token, "memberId": member_id });
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn update_member(&self, update: &MemberUpdate) -> Result<Member, ApiError> {
        let url = self.endpoint("api/member/me")?;
        let response = self.send(self.client.patch(url).json(update)).await?;
        Ok(response.json::<Member>().await?)
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>, ApiError> {
        self.get_json("api/member/subscriptions").await
    }

    async fn payments(&self) -> Result<Vec<Payment>, ApiError> {
        self.get_json("api/member/payments").await
    }

    async fn invoices(&self) -> Result<Vec<Invoice>, ApiError> {
        self.get_json("api/member/invoices").await
    }

    async fn download_invoice(&self, invoice_id: i64) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(&format!("api/member/invoices/{}/pdf", invoice_id))?;
        let response = self.send(self.client.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn plans(&self) -> Result<Vec<MembershipPlan>, ApiError> {
        self.get_json("api/member/plans").await
    }

    async fn check_ins(&self) -> Result<Vec<CheckIn>, ApiError> {
        self.get_json("api/member/check-ins").await
    }

    async fn offers(&self) -> Result<Vec<Offer>, ApiError> {
        self.get_json("api/offers").await
    }
}
