use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::{RecordStore, UserPatch, UserRecord};

/// Record store backed by a spreadsheet automation web app.
///
/// One endpoint serves every operation; the `action` parameter selects
/// between `getUser`, `getFaq` (GET, query string) and `updateUser` (POST,
/// JSON body).
pub struct SheetStore {
    endpoint: String,
    http: reqwest::Client,
}

impl SheetStore {
    pub fn new(config: &StoreConfig, http: reqwest::Client) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            http,
        }
    }

    async fn get_json(&self, query: &[(&str, &str)]) -> Result<serde_json::Value, StoreError> {
        let resp = self.http.get(&self.endpoint).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Parse(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for SheetStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        debug!("Store getUser: {}", user_id);
        let data = self
            .get_json(&[("action", "getUser"), ("userId", user_id)])
            .await
            .inspect_err(|e| error!("Failed to fetch user {}: {}", user_id, e))?;
        parse_user(data)
    }

    async fn update_user(&self, user_id: &str, patch: &UserPatch) -> Result<(), StoreError> {
        debug!("Store updateUser: {}", user_id);
        let body = json!({
            "action": "updateUser",
            "userId": user_id,
            "data": patch,
        });

        let resp = self.http.post(&self.endpoint).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!("Store update failed for {}: {} {}", user_id, status, text);
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let text = resp.text().await.unwrap_or_default();
        if !update_succeeded(&text) {
            error!("Store rejected update for {}: {}", user_id, text);
            return Err(StoreError::Update(user_id.to_string()));
        }

        info!("Updated user {}", user_id);
        Ok(())
    }

    async fn get_faq(&self, question: &str) -> Result<Option<String>, StoreError> {
        let data = self
            .get_json(&[("action", "getFaq"), ("question", question)])
            .await
            .inspect_err(|e| error!("Failed to look up FAQ: {}", e))?;
        Ok(parse_faq_answer(&data))
    }
}

/// `null`, `{}` or an object carrying only an `error` key mean "no such user".
fn parse_user(data: serde_json::Value) -> Result<Option<UserRecord>, StoreError> {
    match &data {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Object(map) if map.is_empty() || (map.len() == 1 && map.contains_key("error")) => {
            return Ok(None)
        }
        serde_json::Value::Object(_) => {}
        other => return Err(StoreError::Parse(format!("expected a user object, got {other}"))),
    }
    serde_json::from_value(data)
        .map(Some)
        .map_err(|e| StoreError::Parse(e.to_string()))
}

/// The answer exactly as stored; blank cells count as no entry.
fn parse_faq_answer(data: &serde_json::Value) -> Option<String> {
    data.get("answer")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}

/// Any 2xx counts as success unless the body says `"success": false`.
fn update_succeeded(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("success").and_then(|s| s.as_bool()))
        .unwrap_or(true)
}
