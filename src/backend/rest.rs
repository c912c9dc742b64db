//! REST access to the chat backend: paged history and the conversation list.

use std::{sync::Arc, time::Duration};

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    StatusCode, Url,
};
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;

use crate::{
    domain::conversation::ConversationSummary,
    infra::{config::BackendConfig, error::AppError},
    usecases::{
        contracts::{HistoryFetcher, PageReply},
        list_conversations::{ConversationSource, ConversationSourceError},
        load_history::{HistoryPage, HistoryPageQuery, HistorySourceError},
    },
};

use super::wire::{ConversationsResponse, HistoryResponse, WireRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestError {
    Unauthorized,
    NotFound,
    Network,
    InvalidData,
}

impl From<RestError> for HistorySourceError {
    fn from(value: RestError) -> Self {
        match value {
            RestError::Unauthorized => Self::Unauthorized,
            RestError::NotFound => Self::NotFound,
            RestError::Network => Self::Network,
            RestError::InvalidData => Self::InvalidData,
        }
    }
}

impl From<RestError> for ConversationSourceError {
    fn from(value: RestError) -> Self {
        match value {
            RestError::Unauthorized => Self::Unauthorized,
            RestError::NotFound | RestError::Network => Self::Unavailable,
            RestError::InvalidData => Self::InvalidData,
        }
    }
}

/// HTTP client bound to the API base url and the session's bearer token.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    pub fn new(config: &BackendConfig, access_token: Option<&str>) -> Result<Self, AppError> {
        let base_url =
            Url::parse(&config.api_base_url).map_err(|err| AppError::InvalidBaseUrl {
                url: config.api_base_url.clone(),
                details: err.to_string(),
            })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::InvalidBaseUrl {
                url: config.api_base_url.clone(),
                details: "url cannot carry a path".to_owned(),
            });
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| AppError::InvalidAccessToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(AppError::HttpClientBuild)?;

        Ok(Self { client, base_url })
    }

    pub async fn fetch_history(
        &self,
        query: &HistoryPageQuery,
    ) -> Result<HistoryPage, HistorySourceError> {
        let url = self.endpoint(&["conversations", &query.conversation_id, "messages"]);
        let request = self.client.get(url).query(&[
            ("page", query.page.to_string()),
            ("limit", query.page_size.to_string()),
        ]);
        let response: HistoryResponse = send_json(request).await?;

        let mut messages = Vec::with_capacity(response.messages.len());
        for mut wire in response.messages {
            // Message documents inside a conversation route may omit their parent.
            if wire.conversation_id.is_none() {
                wire.conversation_id = Some(WireRef::Id(query.conversation_id.clone()));
            }
            let message = wire.into_domain().map_err(|err| {
                tracing::warn!(
                    code = "REST_HISTORY_INVALID_MESSAGE",
                    error = ?err,
                    "history message could not be mapped"
                );
                HistorySourceError::InvalidData
            })?;
            messages.push(message);
        }

        Ok(HistoryPage {
            messages,
            has_next_page: response.has_next_page,
        })
    }

    pub async fn fetch_conversations(
        &self,
    ) -> Result<Vec<ConversationSummary>, ConversationSourceError> {
        let request = self.client.get(self.endpoint(&["conversations"]));
        let response: ConversationsResponse = send_json(request).await?;

        response
            .into_items()
            .into_iter()
            .map(|item| {
                item.into_domain().map_err(|err| {
                    tracing::warn!(
                        code = "REST_CONVERSATION_INVALID",
                        error = ?err,
                        "conversation could not be mapped"
                    );
                    ConversationSourceError::InvalidData
                })
            })
            .collect()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, RestError> {
    let response = request.send().await.map_err(|err| {
        let timeout = err.is_timeout();
        let err = err.without_url();
        tracing::warn!(
            code = "REST_REQUEST_FAILED",
            timeout,
            error = %err,
            "request to backend failed"
        );
        RestError::Network
    })?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(
            code = "REST_STATUS_ERROR",
            status = status.as_u16(),
            "backend returned an error status"
        );
        return Err(map_status(status));
    }

    let body = response.bytes().await.map_err(|_| RestError::Network)?;
    serde_json::from_slice(&body).map_err(|err| {
        tracing::warn!(
            code = "REST_DECODE_FAILED",
            error = %err,
            "backend response did not match the expected shape"
        );
        RestError::InvalidData
    })
}

fn map_status(status: StatusCode) -> RestError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RestError::Unauthorized,
        StatusCode::NOT_FOUND => RestError::NotFound,
        _ => RestError::Network,
    }
}

/// Runs history requests on the backend runtime and resolves replies from there.
#[derive(Debug, Clone)]
pub struct RestHistoryFetcher {
    client: Arc<RestClient>,
    runtime: Handle,
}

impl RestHistoryFetcher {
    pub fn new(client: Arc<RestClient>, runtime: Handle) -> Self {
        Self { client, runtime }
    }
}

impl HistoryFetcher for RestHistoryFetcher {
    fn fetch_page(&self, query: HistoryPageQuery, reply: PageReply) {
        let client = Arc::clone(&self.client);
        self.runtime.spawn(async move {
            let result = client.fetch_history(&query).await;
            reply.resolve(result);
        });
    }
}

/// Blocking conversation listing for the synchronous application loop.
#[derive(Debug, Clone)]
pub struct RestConversationSource {
    client: Arc<RestClient>,
    runtime: Handle,
}

impl RestConversationSource {
    pub fn new(client: Arc<RestClient>, runtime: Handle) -> Self {
        Self { client, runtime }
    }
}

impl ConversationSource for RestConversationSource {
    fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ConversationSourceError> {
        self.runtime.block_on(self.client.fetch_conversations())
    }
}
