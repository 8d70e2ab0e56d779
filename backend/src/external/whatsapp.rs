//! WhatsApp gateway client
//!
//! The gateway is an internal HTTP relay in front of the WhatsApp sessions.
//! Every call is a JSON POST to `{base_url}/{endpoint}`; the recipient chat
//! id and sender line travel in the body.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::WhatsAppConfig;
use crate::error::ExternalError;

const SERVICE: &str = "whatsapp";

/// Gateway endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhatsAppEndpoint {
    MessageV2,
    MediaV2,
    WelcomeV2,
    DataItem,
    MediaInspectionV2,
    MessageVentas,
    MessageCurso,
}

impl WhatsAppEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            WhatsAppEndpoint::MessageV2 => "messageV2",
            WhatsAppEndpoint::MediaV2 => "mediaV2",
            WhatsAppEndpoint::WelcomeV2 => "welcomeV2",
            WhatsAppEndpoint::DataItem => "data-item",
            WhatsAppEndpoint::MediaInspectionV2 => "media-inspectionV2",
            WhatsAppEndpoint::MessageVentas => "message-ventas",
            WhatsAppEndpoint::MessageCurso => "message-curso",
        }
    }

    /// Whether the endpoint carries a file
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            WhatsAppEndpoint::MediaV2 | WhatsAppEndpoint::MediaInspectionV2
        )
    }
}

/// Recipient and delivery options for one send
#[derive(Debug, Clone)]
pub struct SendContext {
    /// Recipient chat id (`51987654321@c.us`)
    pub phone_number_id: String,
    /// Sender line; the gateway default when `None`
    pub from_number: Option<String>,
    /// Seconds the gateway waits before delivering
    pub sleep: u32,
}

impl SendContext {
    /// Build a context for a raw phone number, normalising it to a chat id
    pub fn for_phone(raw_phone: &str, config: &WhatsAppConfig) -> Option<Self> {
        let chat_id = shared::phone::to_chat_id(raw_phone, &config.country_code)?;
        Some(Self {
            phone_number_id: chat_id,
            from_number: config.from_number.clone(),
            sleep: config.sleep,
        })
    }
}

/// A file to send through a media endpoint
#[derive(Debug, Clone)]
pub struct MediaFile<'a> {
    pub file_name: &'a str,
    pub content: &'a [u8],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GatewayRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<&'a str>,
    phone_number_id: &'a str,
    sleep: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_number: Option<&'a str>,
}

/// Gateway acknowledgement
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayResponse {
    #[serde(default)]
    pub status: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Outbound messaging, implemented by the gateway client and by test fakes
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message
    async fn send_text(
        &self,
        endpoint: WhatsAppEndpoint,
        ctx: &SendContext,
        message: &str,
    ) -> Result<GatewayResponse, ExternalError>;

    /// Send a file, with an optional caption
    async fn send_media(
        &self,
        endpoint: WhatsAppEndpoint,
        ctx: &SendContext,
        file: MediaFile<'_>,
        caption: Option<&str>,
    ) -> Result<GatewayResponse, ExternalError>;
}

/// HTTP client for the WhatsApp gateway
#[derive(Clone)]
pub struct WhatsAppClient {
    base_url: String,
    message_timeout: Duration,
    media_timeout: Duration,
    http_client: Client,
}

impl WhatsAppClient {
    /// Create a new gateway client
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            message_timeout: Duration::from_secs(config.message_timeout_secs),
            media_timeout: Duration::from_secs(config.media_timeout_secs),
            http_client: Client::new(),
        }
    }

    fn url(&self, endpoint: WhatsAppEndpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }

    async fn post(
        &self,
        endpoint: WhatsAppEndpoint,
        body: &GatewayRequest<'_>,
    ) -> Result<GatewayResponse, ExternalError> {
        let timeout = if endpoint.is_media() {
            self.media_timeout
        } else {
            self.message_timeout
        };

        tracing::debug!(
            endpoint = endpoint.path(),
            recipient = body.phone_number_id,
            "Sending WhatsApp request"
        );

        let response = self
            .http_client
            .post(self.url(endpoint))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ExternalError::network(SERVICE, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExternalError::network(SERVICE, e))?;

        if !status.is_success() {
            tracing::warn!(
                endpoint = endpoint.path(),
                status = status.as_u16(),
                body = %text,
                "WhatsApp gateway rejected request"
            );
            return Err(ExternalError::invalid(SERVICE, status.as_u16(), text));
        }

        let parsed: GatewayResponse = if text.trim().is_empty() {
            GatewayResponse::default()
        } else {
            serde_json::from_str(&text)
                .map_err(|_| ExternalError::invalid(SERVICE, status.as_u16(), text.clone()))?
        };

        if parsed.status == Some(false) {
            tracing::warn!(endpoint = endpoint.path(), body = %text, "WhatsApp gateway reported failure");
            return Err(ExternalError::invalid(SERVICE, status.as_u16(), text));
        }

        Ok(parsed)
    }
}

#[async_trait]
impl Messenger for WhatsAppClient {
    async fn send_text(
        &self,
        endpoint: WhatsAppEndpoint,
        ctx: &SendContext,
        message: &str,
    ) -> Result<GatewayResponse, ExternalError> {
        let body = GatewayRequest {
            message: Some(message),
            file_content: None,
            file_name: None,
            phone_number_id: &ctx.phone_number_id,
            sleep: ctx.sleep,
            from_number: ctx.from_number.as_deref(),
        };
        self.post(endpoint, &body).await
    }

    async fn send_media(
        &self,
        endpoint: WhatsAppEndpoint,
        ctx: &SendContext,
        file: MediaFile<'_>,
        caption: Option<&str>,
    ) -> Result<GatewayResponse, ExternalError> {
        let body = GatewayRequest {
            message: caption,
            file_content: Some(STANDARD.encode(file.content)),
            file_name: Some(file.file_name),
            phone_number_id: &ctx.phone_number_id,
            sleep: ctx.sleep,
            from_number: ctx.from_number.as_deref(),
        };
        self.post(endpoint, &body).await
    }
}
