// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the PayamSMS web service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use courier_config::model::SmsConfig;
use courier_core::{CourierError, DeliveryReport, OutboundSms, SendAck, SmsGateway};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::types::{SendRequest, SmsItem, TokenResponse};

const SERVICE: &str = "sms-provider";
const SEND_PATH: &str = "/panel/webservice/sendMultipleWithSrc";
const STATUS_PATH: &str = "/report/webservice/status";
const TOKEN_PATH: &str = "/auth/oauth/token";
const SEND_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

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

/// Provider-local scheduled send time: `now` shifted into `offset`, plus `delay`.
pub fn send_date(now: DateTime<Utc>, offset: FixedOffset, delay: chrono::Duration) -> String {
    (now.with_timezone(&offset) + delay)
        .format(SEND_DATE_FORMAT)
        .to_string()
}

/// PayamSMS gateway client.
#[derive(Debug, Clone)]
pub struct PayamClient {
    client: reqwest::Client,
    send_url: Url,
    status_url: Url,
    token_url: Url,
    system_name: String,
    username: String,
    password: Option<SecretString>,
    scope: String,
    grant_type: String,
    root_access_token: Option<SecretString>,
    offset: FixedOffset,
    send_delay: chrono::Duration,
}

impl PayamClient {
    /// Creates a client from the `[sms]` configuration section.
    pub fn new(config: &SmsConfig) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CourierError::Config(format!("failed to build HTTP client: {e}")))?;

        let base = config.base_url.trim_end_matches('/');
        let parse = |raw: String| {
            Url::parse(&raw).map_err(|e| CourierError::Config(format!("invalid URL `{raw}`: {e}")))
        };
        let token_url = match config.token_url.as_deref() {
            Some(url) if !url.trim().is_empty() => parse(url.to_string())?,
            _ => parse(format!("{base}{TOKEN_PATH}"))?,
        };
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            CourierError::Config(format!(
                "invalid UTC offset: {} minutes",
                config.utc_offset_minutes
            ))
        })?;

        Ok(Self {
            client,
            send_url: parse(format!("{base}{SEND_PATH}"))?,
            status_url: parse(format!("{base}{STATUS_PATH}"))?,
            token_url,
            system_name: config.system_name.clone(),
            username: config.username.clone(),
            password: config.password.clone().map(SecretString::from),
            scope: config.scope.clone(),
            grant_type: config.grant_type.clone(),
            root_access_token: config
                .root_access_token
                .clone()
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            offset,
            send_delay: chrono::Duration::seconds(config.send_delay_secs),
        })
    }

    async fn read_json<T: DeserializeOwned>(
        op: &'static str,
        response: reqwest::Response,
    ) -> Result<T, CourierError> {
        let status = response.status();
        debug!(op, status = %status, "sms provider response received");
        let body = response.text().await.map_err(|e| transport(op, e))?;
        if !status.is_success() {
            return Err(api(format!("{op} returned {status}: {}", body.trim())));
        }
        serde_json::from_str(&body)
            .map_err(|e| api(format!("{op} returned malformed payload: {e}")))
    }
}

#[async_trait]
impl SmsGateway for PayamClient {
    async fn get_token(&self) -> Result<String, CourierError> {
        let mut url = self.token_url.clone();
        url.query_pairs_mut()
            .append_pair("systemName", &self.system_name)
            .append_pair("username", &self.username)
            .append_pair(
                "password",
                self.password
                    .as_ref()
                    .map(|p| p.expose_secret())
                    .unwrap_or_default(),
            )
            .append_pair("scope", &self.scope)
            .append_pair("grant_type", &self.grant_type);

        let mut request = self.client.post(url);
        if let Some(root) = &self.root_access_token {
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", root.expose_secret()),
            );
        }

        let response = request.send().await.map_err(|e| transport("token", e))?;
        let token: TokenResponse = Self::read_json("token", response).await?;
        if token.access_token.is_empty() {
            return Err(api("token response carried an empty access_token".to_string()));
        }
        Ok(token.access_token)
    }

    async fn send_batch(
        &self,
        sender: &str,
        items: &[OutboundSms],
    ) -> Result<Vec<SendAck>, CourierError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let token = self.get_token().await?;

        let date = send_date(Utc::now(), self.offset, self.send_delay);
        let body = SendRequest {
            sender,
            sms_items: items
                .iter()
                .map(|item| SmsItem {
                    recipient: &item.recipient,
                    body: &item.body,
                    customer_id: &item.tracking_id,
                    send_date: &date,
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.send_url.clone())
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport("send", e))?;
        let acks: Vec<SendAck> = Self::read_json("send", response).await?;
        info!(
            sender,
            items = items.len(),
            acks = acks.len(),
            "sms batch submitted"
        );
        Ok(acks)
    }

    async fn fetch_status(
        &self,
        token: &str,
        tracking_ids: &[String],
    ) -> Result<Vec<DeliveryReport>, CourierError> {
        let ids: Vec<&str> = tracking_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Err(CourierError::Validation(
                "no tracking ids provided".to_string(),
            ));
        }

        let mut url = self.status_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("byCustomer", "true");
            for id in &ids {
                query.append_pair("ids", id);
            }
        }
        debug!(ids = ids.len(), "querying delivery status");

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport("status", e))?;
        Self::read_json("status", response).await
    }
}
