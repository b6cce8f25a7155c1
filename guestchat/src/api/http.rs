//! REST implementation of [`ChatApi`] over `reqwest`.
//!
//! Every request carries the `Device-ID` header and the configured
//! `User-Agent`, and is bounded by the client-wide timeout so a stuck
//! backend can never leave a send in flight forever.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

use guestchat_proto::api::{
    CONVERSATION_PATH, ConversationQuery, ConversationResponse, DEVICE_ID_HEADER, ErrorBody,
    RENAME_PATH, RenameRequest, RenameResponse, SEND_PATH, SendRequest,
};
use guestchat_proto::message::Message;

use super::{ApiError, ChatApi};

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("guestchat/", env!("CARGO_PKG_VERSION"));

/// [`ChatApi`] backed by the HTTP REST endpoints.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: Client,
    base_url: Url,
}

impl HttpChatApi {
    /// Build a client for the backend at `base_url` (e.g. `http://127.0.0.1:8787`).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the URL is invalid or the HTTP
    /// client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Network(format!("invalid base URL {base_url}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Network(format!("invalid endpoint {path}: {e}")))
    }
}

impl ChatApi for HttpChatApi {
    async fn fetch_conversation(
        &self,
        device_id: &str,
        query: &ConversationQuery,
    ) -> Result<ConversationResponse, ApiError> {
        let url = self.endpoint(CONVERSATION_PATH)?;
        let response = self
            .client
            .get(url)
            .header(DEVICE_ID_HEADER, device_id)
            .query(query)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }

    async fn send_message(&self, device_id: &str, request: &SendRequest) -> Result<Message, ApiError> {
        let url = self.endpoint(SEND_PATH)?;
        let response = self
            .client
            .post(url)
            .header(DEVICE_ID_HEADER, device_id)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }

    async fn rename_device(
        &self,
        device_id: &str,
        request: &RenameRequest,
    ) -> Result<RenameResponse, ApiError> {
        let url = self.endpoint(RENAME_PATH)?;
        let response = self
            .client
            .patch(url)
            .header(DEVICE_ID_HEADER, device_id)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }
}

/// Decode a success body, or classify the failure status.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(map_reqwest_error);
    }

    let fallback = status.canonical_reason().unwrap_or("unknown error").to_string();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => fallback,
    };
    tracing::debug!(status = status.as_u16(), %message, "backend returned error status");
    Err(ApiError::from_status(status.as_u16(), message))
}

fn map_reqwest_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else if e.is_decode() {
        ApiError::Decode(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}
