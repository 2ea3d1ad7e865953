//! REST collaborators over HTTP.

use async_trait::async_trait;
use murmur_proto::{
    RoomId,
    payloads::{AuthSession, ChatRoom, CreateRoomRequest, Message, User},
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{ApiError, AuthApi, ChatApi};

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

/// [`AuthApi`] and [`ChatApi`] against the chat server's REST endpoints.
///
/// Chat queries need a bearer token; attach it with
/// [`with_token`](Self::with_token) after signing in.
#[derive(Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApi {
    /// Client for the server at `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http: reqwest::Client::new(), base_url, token: None }
    }

    /// Same client, authorized with `token`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.post(self.url(path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = request.send().await.map_err(|e| ApiError::Transport(e.to_string()))?;
    let response = check_status(response).await?;
    response.json::<T>().await.map_err(|e| {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    })
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    debug!(%status, url = %response.url(), "request rejected");
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(ApiError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status: status.as_u16(), body })
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ApiError> {
        let body = RegisterRequest { username, email, password };
        fetch(self.post("/api/auth/register").json(&body)).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<AuthSession, ApiError> {
        let body = LoginRequest { username, password };
        fetch(self.post("/api/auth/login").json(&body)).await
    }
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn create_room(&self, request: &CreateRoomRequest) -> Result<ChatRoom, ApiError> {
        fetch(self.post("/api/chat/rooms").json(request)).await
    }

    async fn list_rooms(&self) -> Result<Vec<ChatRoom>, ApiError> {
        fetch(self.get("/api/chat/rooms")).await
    }

    async fn list_messages(&self, room_id: RoomId) -> Result<Vec<Message>, ApiError> {
        fetch(self.get(&format!("/api/chat/messages/{room_id}"))).await
    }

    async fn search_users(&self, query: &str) -> Result<Vec<User>, ApiError> {
        fetch(self.get("/api/users/search").query(&[("q", query)])).await
    }

    async fn online_users(&self) -> Result<Vec<User>, ApiError> {
        fetch(self.get("/api/users/online")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let api = HttpApi::new("http://localhost:8080/");
        assert_eq!(api.url("/api/chat/rooms"), "http://localhost:8080/api/chat/rooms");
    }

    #[test]
    fn token_is_optional() {
        let api = HttpApi::new("http://localhost:8080");
        assert!(api.token.is_none());

        let api = api.with_token("t0k");
        assert_eq!(api.token.as_deref(), Some("t0k"));
        assert!(!format!("{api:?}").contains("t0k"));
    }
}
