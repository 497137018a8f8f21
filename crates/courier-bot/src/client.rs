// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the campaign-management (bot) API.
//!
//! Every response is checked in two stages: the HTTP status, then the
//! `success` flag of the JSON envelope. Network failures map to
//! `CourierError::Transport`; everything else the server says no to maps to
//! `CourierError::Api`.

use std::time::Duration;

use async_trait::async_trait;
use courier_config::model::BotConfig;
use courier_core::{
    Campaign, CampaignStatistics, ControlPlane, CourierError, ShortLinkRecord,
};
use secrecy::{ExposeSecret, SecretString};
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, warn};

use crate::types::{
    AllocateShortLinksRequest, AllocatedCodes, ApiEnvelope, CampaignList,
    CreateShortLinksRequest, LoginData, LoginRequest, StatisticsRequest,
};

const SERVICE: &str = "control-plane";

fn transport(op: &str, e: reqwest::Error) -> CourierError {
    CourierError::Transport {
        service: SERVICE,
        message: format!("{op}: {e}"),
        source: Some(Box::new(e)),
    }
}

fn api(message: String) -> CourierError {
    CourierError::Api {
        service: SERVICE,
        message,
    }
}

/// HTTP client for the control-plane bot API.
#[derive(Debug, Clone)]
pub struct BotClient {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<SecretString>,
    short_link_domain: String,
}

impl BotClient {
    /// Creates a client from the `[bot]` configuration section.
    pub fn new(config: &BotConfig) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CourierError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_domain.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone().map(SecretString::from),
            short_link_domain: config.short_link_domain.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends the request and fails on any non-2xx status.
    async fn send(
        &self,
        op: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, CourierError> {
        let response = request.send().await.map_err(|e| transport(op, e))?;
        let status = response.status();
        debug!(op, status = %status, "control-plane response received");

        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(api(format!("{op} returned {status}: {}", body.trim())))
    }

    /// Sends the request and decodes the envelope, failing when `success` is false.
    async fn call<T: DeserializeOwned>(
        &self,
        op: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, CourierError> {
        let response = self.send(op, request).await?;
        let body = response.text().await.map_err(|e| transport(op, e))?;
        let envelope: ApiEnvelope<T> = serde_json::from_str(&body)
            .map_err(|e| api(format!("{op} returned malformed payload: {e}")))?;
        if !envelope.success {
            return Err(api(format!("{op} failed: {}", envelope.message)));
        }
        Ok(envelope.data)
    }

    async fn call_data<T: DeserializeOwned>(
        &self,
        op: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CourierError> {
        self.call(op, request)
            .await?
            .ok_or_else(|| api(format!("{op} returned no data")))
    }

    async fn transition(
        &self,
        op: &'static str,
        token: &str,
        campaign_id: u64,
        target: &str,
    ) -> Result<(), CourierError> {
        let url = self.url(&format!("/api/v1/bot/campaigns/{campaign_id}/{target}"));
        self.send(op, self.client.post(url).bearer_auth(token))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ControlPlane for BotClient {
    async fn login(&self) -> Result<String, CourierError> {
        let (Some(username), Some(password)) = (self.username.as_deref(), self.password.as_ref())
        else {
            return Err(CourierError::Config(
                "bot credentials not configured".to_string(),
            ));
        };
        if username.is_empty() || password.expose_secret().is_empty() {
            return Err(CourierError::Config(
                "bot credentials not configured".to_string(),
            ));
        }

        let body = LoginRequest {
            username,
            password: password.expose_secret(),
        };
        let data: LoginData = self
            .call_data(
                "login",
                self.client.post(self.url("/api/v1/bot/auth/login")).json(&body),
            )
            .await?;

        if data.session.access_token.is_empty() {
            return Err(api("login returned an empty access token".to_string()));
        }
        Ok(data.session.access_token)
    }

    async fn list_ready_campaigns(&self, token: &str) -> Result<Vec<Campaign>, CourierError> {
        let list: CampaignList = self
            .call_data(
                "list ready campaigns",
                self.client
                    .get(self.url("/api/v1/bot/campaigns/ready"))
                    .bearer_auth(token),
            )
            .await?;
        debug!(count = list.items.len(), "ready campaigns listed");
        Ok(list.items)
    }

    async fn move_to_running(&self, token: &str, campaign_id: u64) -> Result<(), CourierError> {
        self.transition("move to running", token, campaign_id, "running")
            .await
    }

    async fn move_to_executed(&self, token: &str, campaign_id: u64) -> Result<(), CourierError> {
        self.transition("move to executed", token, campaign_id, "executed")
            .await
    }

    async fn allocate_short_links(
        &self,
        token: &str,
        campaign_id: u64,
        ad_link: Option<&str>,
        phones: &[String],
    ) -> Result<Vec<String>, CourierError> {
        let body = AllocateShortLinksRequest {
            campaign_id,
            ad_link,
            phones,
            short_link_domain: &self.short_link_domain,
        };
        let allocated: AllocatedCodes = self
            .call_data(
                "allocate short links",
                self.client
                    .post(self.url("/api/v1/bot/short-links/allocate"))
                    .bearer_auth(token)
                    .json(&body),
            )
            .await?;

        if allocated.codes.len() != phones.len() {
            warn!(
                campaign_id,
                phones = phones.len(),
                codes = allocated.codes.len(),
                "short-link allocation size mismatch"
            );
            return Err(api(format!(
                "allocate short links returned {} codes for {} phones",
                allocated.codes.len(),
                phones.len()
            )));
        }
        Ok(allocated.codes)
    }

    async fn push_statistics(
        &self,
        token: &str,
        campaign_id: u64,
        statistics: &CampaignStatistics,
    ) -> Result<(), CourierError> {
        let url = self.url(&format!("/api/v1/bot/campaigns/{campaign_id}/statistics"));
        self.send(
            "push statistics",
            self.client
                .post(url)
                .bearer_auth(token)
                .json(&StatisticsRequest { statistics }),
        )
        .await
        .map(|_| ())
    }

    async fn create_short_links(
        &self,
        token: &str,
        links: &[ShortLinkRecord],
    ) -> Result<(), CourierError> {
        if links.is_empty() {
            return Err(CourierError::Validation(
                "short-link batch must not be empty".to_string(),
            ));
        }
        self.call::<IgnoredAny>(
            "create short links",
            self.client
                .post(self.url("/api/v1/bot/short-links"))
                .bearer_auth(token)
                .json(&CreateShortLinksRequest { items: links }),
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> BotClient {
        BotClient::new(&BotConfig {
            api_domain: base_url.to_string(),
            username: Some("scheduler".into()),
            password: Some("s3cret-pass".into()),
            ..BotConfig::default()
        })
        .unwrap()
    }

    fn ok(data: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "message": "ok",
            "data": data
        }))
    }

    #[tokio::test]
    async fn login_returns_session_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/bot/auth/login"))
            .and(body_json(serde_json::json!({
                "username": "scheduler",
                "password": "s3cret-pass"
            })))
            .respond_with(ok(serde_json::json!({
                "bot": {"id": 1, "username": "scheduler"},
                "session": {"access_token": "tok-123", "expires_in": 3600}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = test_client(&server.uri()).login().await.unwrap();
        assert_eq!(token, "tok-123");
    }

    #[tokio::test]
    async fn login_without_credentials_is_a_config_error() {
        let client = BotClient::new(&BotConfig {
            api_domain: "http://127.0.0.1:9".into(),
            ..BotConfig::default()
        })
        .unwrap();
        assert!(matches!(
            client.login().await,
            Err(CourierError::Config(_))
        ));
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/bot/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "message": "invalid credentials"
            })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).login().await.unwrap_err();
        match err {
            CourierError::Api { message, .. } => assert!(message.contains("invalid credentials")),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_error_status_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/bot/campaigns/ready"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .list_ready_campaigns("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Api { .. }));
        assert!(err.to_string().contains("503"), "got: {err}");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        // Port 9 (discard) is not listening in test environments.
        let err = test_client("http://127.0.0.1:9")
            .list_ready_campaigns("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Transport { .. }));
    }

    #[tokio::test]
    async fn lists_ready_campaigns_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/bot/campaigns/ready"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ok(serde_json::json!({
                "items": [{
                    "id": 11, "customer_id": 2, "status": "approved",
                    "created_at": "2026-01-01T00:00:00Z",
                    "updated_at": "2026-01-01T00:00:00Z",
                    "tags": ["3"], "line_number": "3000",
                    "ad_link": "https://example.com", "content": "Hi 🔗",
                    "num_audiences": 5
                }]
            })))
            .mount(&server)
            .await;

        let campaigns = test_client(&server.uri())
            .list_ready_campaigns("tok")
            .await
            .unwrap();
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].id, 11);
        assert_eq!(campaigns[0].ad_link(), Some("https://example.com"));
    }

    #[tokio::test]
    async fn status_transitions_hit_campaign_paths() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/bot/campaigns/11/running"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/bot/campaigns/11/executed"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.move_to_running("tok", 11).await.unwrap();
        client.move_to_executed("tok", 11).await.unwrap();
    }

    #[tokio::test]
    async fn allocates_codes_in_phone_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/bot/short-links/allocate"))
            .and(body_json(serde_json::json!({
                "campaign_id": 11,
                "ad_link": "https://example.com",
                "phones": ["0911", "0912"],
                "short_link_domain": "https://jo1n.ir/"
            })))
            .respond_with(ok(serde_json::json!({"codes": ["aa", "bb"]})))
            .mount(&server)
            .await;

        let codes = test_client(&server.uri())
            .allocate_short_links(
                "tok",
                11,
                Some("https://example.com"),
                &["0911".to_string(), "0912".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(codes, vec!["aa", "bb"]);
    }

    #[tokio::test]
    async fn allocation_size_mismatch_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/bot/short-links/allocate"))
            .respond_with(ok(serde_json::json!({"codes": ["aa"]})))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .allocate_short_links("tok", 11, None, &["1".into(), "2".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Api { .. }));
    }

    #[tokio::test]
    async fn pushes_statistics_with_control_plane_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/bot/campaigns/11/statistics"))
            .and(body_json(serde_json::json!({
                "statistics": {
                    "aggregatedTotalRecords": 2,
                    "aggregatedTotalSent": 2,
                    "aggregatedTotalParts": 3,
                    "aggregatedTotalDeliveredParts": 2,
                    "aggregatedTotalUnDeliveredParts": 1,
                    "aggregatedTotalUnKnownParts": 0,
                    "updatedAt": "2026-01-01T00:00:00Z"
                }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let stats = CampaignStatistics {
            aggregated_total_records: 2,
            aggregated_total_sent: 2,
            aggregated_total_parts: 3,
            aggregated_total_delivered_parts: 2,
            aggregated_total_undelivered_parts: 1,
            aggregated_total_unknown_parts: 0,
            updated_at: "2026-01-01T00:00:00Z".into(),
        };
        test_client(&server.uri())
            .push_statistics("tok", 11, &stats)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn creates_short_links_in_bulk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/bot/short-links"))
            .and(body_json(serde_json::json!({
                "items": [{
                    "uid": "u1",
                    "campaign_id": 11,
                    "long_link": "https://example.com",
                    "short_link": "https://jo1n.ir/aa"
                }]
            })))
            .respond_with(ok(serde_json::json!({"message": "created"})))
            .expect(1)
            .mount(&server)
            .await;

        let links = vec![ShortLinkRecord {
            uid: "u1".into(),
            campaign_id: Some(11),
            client_id: None,
            phone_number: None,
            long_link: "https://example.com".into(),
            short_link: "https://jo1n.ir/aa".into(),
        }];
        test_client(&server.uri())
            .create_short_links("tok", &links)
            .await
            .unwrap();
    }
}
