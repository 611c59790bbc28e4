use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{Collaborator, Credentials, RawEntry};
use crate::error::ClientError;
use crate::models::EntryAction;

/// Header identifying this client instance to the server.
const CLIENT_ID_HEADER: &str = "emerse_id";

/// HTTP implementation of the collaborator API.
pub struct RestCollaborator {
    client: reqwest::Client,
    base_url: String,
    client_id: Uuid,
    credentials: RwLock<Option<Credentials>>,
}

impl RestCollaborator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        Ok(Self {
            client,
            base_url,
            client_id: Uuid::now_v7(),
            credentials: RwLock::new(None),
        })
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decorate(&self, mut req: RequestBuilder) -> RequestBuilder {
        req = req.header(CLIENT_ID_HEADER, self.client_id.to_string());

        let credentials = self
            .credentials
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(creds) = credentials.as_ref() {
            req = req.basic_auth(&creds.username, Some(&creds.password));
        }
        req
    }

    fn set_credentials(&self, credentials: Option<Credentials>) {
        let mut slot = self
            .credentials
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = credentials;
    }

    async fn get(&self, path: &str) -> Result<Response, ClientError> {
        let started = std::time::Instant::now();
        let resp = self.decorate(self.client.get(self.url(path))).send().await;
        tracing::debug!("GET {path} finished in {:?}", started.elapsed());
        check(resp?).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Response, ClientError> {
        let started = std::time::Instant::now();
        let resp = self
            .decorate(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await;
        tracing::debug!("POST {path} finished in {:?}", started.elapsed());
        check(resp?).await
    }
}

#[async_trait]
impl Collaborator for RestCollaborator {
    async fn login(&self, credentials: &Credentials) -> Result<bool, ClientError> {
        self.set_credentials(Some(credentials.clone()));

        let result = match self.get("api/login").await {
            Ok(resp) => {
                let body = read_json(resp).await?;
                Ok(is_truthy(&body))
            }
            Err(ClientError::Unauthorized) => Ok(false),
            Err(e) => Err(e),
        };

        if !matches!(result, Ok(true)) {
            self.set_credentials(None);
        }
        result
    }

    async fn logout(&self) -> Result<(), ClientError> {
        let result = self.post("api/logout", &Value::Null).await.map(|_| ());
        self.set_credentials(None);
        result
    }

    async fn get_config(&self) -> Result<Map<String, Value>, ClientError> {
        let resp = self.get("api/config").await?;
        match read_json(resp).await? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(ClientError::Decode(format!(
                "expected config object, got {}",
                kind_of(&other)
            ))),
        }
    }

    async fn fetch_queue(&self) -> Result<Vec<RawEntry>, ClientError> {
        let resp = self.get("api/queue").await?;
        let items = match read_json(resp).await? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(ClientError::Decode(format!(
                    "expected queue array, got {}",
                    kind_of(&other)
                )));
            }
        };

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(map) => entries.push(map),
                other => tracing::warn!("Skipping non-object queue record ({})", kind_of(&other)),
            }
        }
        Ok(entries)
    }

    async fn submit_action(
        &self,
        entry_id: &str,
        action: EntryAction,
    ) -> Result<Option<RawEntry>, ClientError> {
        let body = json!({ "id": entry_id, "action": action });
        let resp = self.post("api/entry-action", &body).await?;

        match read_json(resp).await? {
            Value::Object(map) => Ok(Some(map)),
            Value::Null => Ok(None),
            other => Err(ClientError::Decode(format!(
                "expected entry object, got {}",
                kind_of(&other)
            ))),
        }
    }
}

async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }

    let body = resp
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(1024)
        .collect::<String>();

    Err(ClientError::Status {
        code: status.as_u16(),
        body,
    })
}

/// Empty bodies read as `null`.
async fn read_json(resp: Response) -> Result<Value, ClientError> {
    let text = resp.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
