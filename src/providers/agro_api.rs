use super::error::ApiError;
use crate::core::market::{MarketDataProvider, PriceQuery};
use crate::core::model::{DashboardStat, MarketInsight, PriceFeed, Product, RawPriceRecord, Region};
use crate::core::session::{Session, User};
use crate::store::{TokenStore, Tokens};
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument, warn};

const DEFAULT_LOGIN_ERROR: &str = "Login failed, please check your credentials";

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(alias = "access")]
    pub token: String,
    #[serde(default, alias = "refreshToken", alias = "refresh")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Client for the market price API. Every data request carries the stored
/// bearer token.
pub struct AgroApiClient {
    base_url: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenStore>,
    // Held while renewing the access token so concurrent 401s share one exchange.
    refresh_lock: Mutex<()>,
}

impl AgroApiClient {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("agromarket/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        Ok(Self {
            base_url,
            http,
            tokens,
            refresh_lock: Mutex::new(()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self.http.request(method, url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|e| ApiError::request(url, e))
    }

    /// Sends a request with the stored bearer token. A 401 triggers exactly one
    /// token refresh and one retry; a failed refresh or a second 401 clears the
    /// stored tokens and ends in [`ApiError::SessionExpired`].
    async fn send_authorized(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let tokens = self.tokens.load().await.map_err(ApiError::token_store)?;
        let bearer = tokens.as_ref().map(|t| t.access.as_str());
        let response = self.send(method.clone(), url, body, bearer).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(tokens) = tokens else {
            debug!(%url, "Unauthorized without stored tokens");
            return Err(ApiError::Unauthorized);
        };
        let access = self.renew_access(&tokens.access).await?;

        debug!(%url, "Retrying request with refreshed token");
        let retried = self.send(method, url, body, Some(&access)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!(%url, "Request still unauthorized after token refresh");
            self.expire_session().await;
            return Err(ApiError::SessionExpired);
        }
        Ok(retried)
    }

    /// Returns an access token newer than `rejected`. The refresh token is
    /// exchanged only when no concurrent request has already renewed it.
    async fn renew_access(&self, rejected: &str) -> Result<String, ApiError> {
        let _renewing = self.refresh_lock.lock().await;
        let current = self.tokens.load().await.map_err(ApiError::token_store)?;
        let Some(current) = current else {
            debug!("Session ended by a concurrent request");
            return Err(ApiError::SessionExpired);
        };
        if current.access != rejected {
            debug!("Access token already renewed");
            return Ok(current.access);
        }
        let Some(refresh) = current.refresh else {
            warn!("Access token rejected and no refresh token is stored");
            self.expire_session().await;
            return Err(ApiError::SessionExpired);
        };

        match self.refresh_access(&refresh).await {
            Ok(access) => Ok(access),
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.expire_session().await;
                Err(ApiError::SessionExpired)
            }
        }
    }

    async fn expire_session(&self) {
        if let Err(e) = self.tokens.clear().await {
            warn!(error = %e, "Failed to clear stored tokens");
        }
    }

    async fn decode<T: DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
            });
        }
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::request(url, e))?;
        serde_json::from_str(&text).map_err(|e| {
            error!(error = ?e, response = %text, "Failed to parse API response");
            ApiError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            }
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        debug!("Requesting {}", url);
        let response = self.send_authorized(Method::GET, url, None).await?;
        Self::decode(url, response).await
    }

    /// Exchanges the refresh token for a new access token and stores it.
    #[instrument(name = "TokenRefresh", skip_all)]
    pub async fn refresh_access(&self, refresh: &str) -> Result<String, ApiError> {
        let url = self.url("auth/refresh/");
        let body = json!({ "refresh": refresh });
        let response = self.send(Method::POST, &url, Some(&body), None).await?;
        let refreshed: RefreshResponse = Self::decode(&url, response).await?;
        self.tokens
            .update_access(&refreshed.access)
            .await
            .map_err(ApiError::token_store)?;
        Ok(refreshed.access)
    }

    #[instrument(name = "Login", skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let url = self.url("auth/login/");
        let body = json!({ "username": username, "password": password });
        let response = self.send(Method::POST, &url, Some(&body), None).await?;

        if response.status().is_client_error() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.message.or(b.detail))
                .unwrap_or_else(|| DEFAULT_LOGIN_ERROR.to_string());
            return Err(ApiError::InvalidCredentials(message));
        }

        let auth: AuthResponse = Self::decode(&url, response).await?;
        self.tokens
            .save(&Tokens {
                access: auth.token.clone(),
                refresh: auth.refresh_token.clone(),
            })
            .await
            .map_err(ApiError::token_store)?;
        Ok(auth)
    }

    /// Closes the server session when possible; local tokens are always removed.
    #[instrument(name = "Logout", skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        let tokens = self.tokens.load().await.map_err(ApiError::token_store)?;
        if let Some(refresh) = tokens.and_then(|t| t.refresh) {
            let url = self.url("auth/logout/");
            let body = json!({ "refresh": refresh });
            match self.send_authorized(Method::POST, &url, Some(&body)).await {
                Ok(r) if r.status().is_success() => debug!("Server session closed"),
                Ok(r) => warn!(status = %r.status(), "Logout request rejected"),
                Err(e) => warn!(error = %e, "Logout request failed"),
            }
        }
        self.tokens.clear().await.map_err(ApiError::token_store)
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get_json(&self.url("auth/me/")).await
    }

    /// Rebuilds the session from stored tokens. Tokens the server rejects are
    /// discarded; every other failure is returned and the tokens are kept.
    pub async fn resume_session(&self) -> Result<Session, ApiError> {
        let mut session = Session::anonymous();
        if self
            .tokens
            .load()
            .await
            .map_err(ApiError::token_store)?
            .is_none()
        {
            return Ok(session);
        }

        match self.current_user().await {
            Ok(user) => session.login_succeeded(user),
            Err(e) if e.is_rejected_session() => {
                debug!(error = %e, "Stored session is no longer valid");
                self.expire_session().await;
                session.token_expired();
            }
            Err(e) => return Err(e),
        }
        Ok(session)
    }

    pub async fn fetch_dashboard_stats(&self) -> Result<Vec<DashboardStat>, ApiError> {
        self.get_json(&self.url("dashboard-stats/")).await
    }

    pub async fn fetch_market_insights(&self) -> Result<Vec<MarketInsight>, ApiError> {
        self.get_json(&self.url("market-insights/")).await
    }

    pub async fn fetch_categories(&self) -> Result<Vec<String>, ApiError> {
        self.get_json(&self.url("product-categories/")).await
    }
}

#[async_trait]
impl MarketDataProvider for AgroApiClient {
    #[instrument(name = "ProductsFetch", skip(self))]
    async fn fetch_products(&self) -> anyhow::Result<Vec<Product>> {
        Ok(self.get_json(&self.url("products/")).await?)
    }

    #[instrument(name = "RegionsFetch", skip(self))]
    async fn fetch_regions(&self) -> anyhow::Result<Vec<Region>> {
        Ok(self.get_json(&self.url("regions/")).await?)
    }

    #[instrument(name = "PricesFetch", skip(self))]
    async fn fetch_prices(&self, query: &PriceQuery) -> anyhow::Result<PriceFeed> {
        let base = self.url("market-prices/");
        let pairs = query.query_pairs();
        let url = if pairs.is_empty() {
            base
        } else {
            Url::parse_with_params(&base, &pairs)
                .map_err(|e| anyhow!("Invalid URL {}: {}", base, e))?
                .to_string()
        };

        let raw: Vec<RawPriceRecord> = self.get_json(&url).await?;
        let feed = PriceFeed::from_raw(raw);
        debug!(
            records = feed.records.len(),
            malformed = feed.malformed.len(),
            "Fetched market prices"
        );
        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::Role;
    use crate::store::MemoryTokenStore;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PRICES_JSON: &str = r#"[
        {"id": 1, "product": {"id": 1, "name": "Rice"},
         "market": {"id": 1, "name": "Central", "region": {"id": 1, "name": "North"}},
         "price": 500, "currency": "XOF", "unit": "kg", "change": 1.5, "date": "2024-01-15"},
        {"id": 2, "product": {"id": 2, "name": "Maize"},
         "market": {"id": 2, "name": "Harbour"},
         "price": 300, "currency": "XOF", "unit": "kg", "change": 0, "date": "2024-01-15"}
    ]"#;

    const USER_JSON: &str =
        r#"{"id": 1, "username": "admin", "email": "admin@agromarket.com", "role": "admin"}"#;

    fn tokens(access: &str, refresh: Option<&str>) -> Tokens {
        Tokens {
            access: access.to_string(),
            refresh: refresh.map(str::to_string),
        }
    }

    fn client(server: &MockServer, store: &MemoryTokenStore) -> AgroApiClient {
        AgroApiClient::new(&server.uri(), Arc::new(store.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_prices_validates_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/market-prices/"))
            .and(header("Authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PRICES_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryTokenStore::with_tokens(tokens("token", None));
        let feed = client(&server, &store)
            .fetch_prices(&PriceQuery::default())
            .await
            .unwrap();

        assert_eq!(feed.records.len(), 1);
        assert_eq!(feed.records[0].product.name, "Rice");
        assert_eq!(feed.malformed.len(), 1);
        assert_eq!(feed.malformed[0].field, "market.region");
    }

    #[tokio::test]
    async fn test_fetch_prices_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/market-prices/"))
            .and(query_param("products", "1,2"))
            .and(query_param("region", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryTokenStore::with_tokens(tokens("token", None));
        let query = PriceQuery {
            product_ids: vec!["1".to_string(), "2".to_string()],
            region: Some("3".to_string()),
            ..Default::default()
        };
        let feed = client(&server, &store).fetch_prices(&query).await.unwrap();
        assert!(feed.records.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_request_refreshes_and_retries_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/"))
            .and(header("Authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh/"))
            .and(body_json(json!({ "refresh": "refresh-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"access": "fresh"}"#))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/products/"))
            .and(header("Authorization", "Bearer fresh"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"[{"id": 1, "name": "Rice"}]"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryTokenStore::with_tokens(tokens("stale", Some("refresh-1")));
        let products = client(&server, &store).fetch_products().await.unwrap();

        assert_eq!(products[0].name, "Rice");
        assert_eq!(
            store.load().await.unwrap(),
            Some(tokens("fresh", Some("refresh-1")))
        );
    }

    #[tokio::test]
    async fn test_concurrent_unauthorized_requests_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"access": "fresh"}"#))
            .expect(1)
            .mount(&server)
            .await;
        for (url_path, body) in [
            ("/products/", r#"[{"id": 1, "name": "Rice"}]"#),
            ("/regions/", r#"[{"id": 1, "name": "North"}]"#),
            ("/market-prices/", PRICES_JSON),
        ] {
            Mock::given(method("GET"))
                .and(path(url_path))
                .and(header("Authorization", "Bearer fresh"))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;
        }

        let store = MemoryTokenStore::with_tokens(tokens("stale", Some("refresh-1")));
        let api = client(&server, &store);
        let query = PriceQuery::default();
        let (products, regions, feed) = futures::try_join!(
            api.fetch_products(),
            api.fetch_regions(),
            api.fetch_prices(&query)
        )
        .unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(regions.len(), 1);
        assert_eq!(feed.records.len(), 1);
        assert_eq!(
            store.load().await.unwrap(),
            Some(tokens("fresh", Some("refresh-1")))
        );
    }

    #[tokio::test]
    async fn test_second_unauthorized_logs_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/regions/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"access": "fresh"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryTokenStore::with_tokens(tokens("stale", Some("refresh-1")));
        let err = client(&server, &store).fetch_regions().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::SessionExpired)
        ));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_logs_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/regions/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryTokenStore::with_tokens(tokens("stale", Some("refresh-1")));
        let err = client(&server, &store).fetch_regions().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::SessionExpired)
        ));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_without_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/regions/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let store = MemoryTokenStore::with_tokens(tokens("stale", None));
        let err = client(&server, &store).fetch_regions().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::SessionExpired)
        ));
        assert!(store.load().await.unwrap().is_none());

        let err = client(&server, &store).fetch_regions().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_login_stores_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login/"))
            .and(body_json(json!({ "username": "admin", "password": "secret" })))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"{{"user": {USER_JSON}, "token": "a1", "refreshToken": "r1"}}"#
            )))
            .mount(&server)
            .await;

        let store = MemoryTokenStore::new();
        let auth = client(&server, &store)
            .login("admin", "secret")
            .await
            .unwrap();

        assert_eq!(auth.user.role, Role::Admin);
        assert_eq!(store.load().await.unwrap(), Some(tokens("a1", Some("r1"))));
    }

    #[tokio::test]
    async fn test_login_with_bad_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login/"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"message": "Invalid credentials"}"#),
            )
            .mount(&server)
            .await;

        let store = MemoryTokenStore::new();
        let err = client(&server, &store)
            .login("admin", "wrong")
            .await
            .unwrap_err();

        assert!(matches!(&err, ApiError::InvalidCredentials(m) if m == "Invalid credentials"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_tokens_even_if_server_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryTokenStore::with_tokens(tokens("a1", Some("r1")));
        client(&server, &store).logout().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me/"))
            .and(header("Authorization", "Bearer a1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(USER_JSON))
            .mount(&server)
            .await;

        let anonymous = client(&server, &MemoryTokenStore::new())
            .resume_session()
            .await
            .unwrap();
        assert!(!anonymous.is_authenticated());

        let store = MemoryTokenStore::with_tokens(tokens("a1", None));
        let session = client(&server, &store).resume_session().await.unwrap();
        assert_eq!(session.role(), Some(Role::Admin));
    }

    #[tokio::test]
    async fn test_resume_session_discards_rejected_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = MemoryTokenStore::with_tokens(tokens("old", None));
        let session = client(&server, &store).resume_session().await.unwrap();
        assert!(!session.is_authenticated());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_session_keeps_tokens_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me/"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryTokenStore::with_tokens(tokens("a1", Some("r1")));
        let err = client(&server, &store).resume_session().await.unwrap_err();

        assert!(matches!(&err, ApiError::Status { status, .. } if status.as_u16() == 503));
        assert!(!err.is_rejected_session());
        assert_eq!(store.load().await.unwrap(), Some(tokens("a1", Some("r1"))));
    }

    #[tokio::test]
    async fn test_resume_session_discards_forbidden_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me/"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = MemoryTokenStore::with_tokens(tokens("a1", None));
        let session = client(&server, &store).resume_session().await.unwrap();
        assert!(!session.is_authenticated());
        assert!(store.load().await.unwrap().is_none());
    }
}
