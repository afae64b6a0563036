//! HTTP-remote client: speaks the REST facade's wire protocol
//! (spec.md §4.4, §6.1) to a running `nlpipe-server`.
//!
//! Grounded on `original_source/nlpipe/clients/HTTPClient.py`: same verb
//! mapping the REST facade in `nlpipe-server::routes` implements, just
//! from the other side of the socket. Uses `reqwest` the way
//! `oxcrypt-cli`'s remote-mount commands talk to a peer over HTTP,
//! rather than pulling in a second HTTP stack.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::client::Client;
use crate::error::ClientError;

pub struct HttpClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Token {token}")),
            None => builder,
        }
    }

    /// Translate a non-2xx response into a [`ClientError`], special-casing
    /// the `ERROR` task state's JSON body (spec.md §7's `ProcessingError`).
    async fn classify_error(resp: reqwest::Response) -> ClientError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            if let Ok(value) = serde_json::from_str::<Value>(&body) {
                if let Some(message) = value.get("message").and_then(Value::as_str) {
                    return ClientError::TaskFailed { id: String::new(), message: message.to_owned() };
                }
            }
        }
        ClientError::Server { status: status.as_u16(), message: body }
    }
}

#[async_trait]
impl Client for HttpClient {
    async fn process(
        &self,
        module: &str,
        doc: &[u8],
        id: Option<&str>,
        reset_error: bool,
        reset_pending: bool,
    ) -> Result<String, ClientError> {
        // The REST facade's POST endpoint always auto-assigns an id
        // (spec.md §4.4's resource table has no id-on-POST parameter),
        // so an explicit `id`/reset flags route through bulk/process's
        // object form instead, which honors them (spec.md §6.1).
        if id.is_some() || reset_error || reset_pending {
            let ids = self
                .bulk_process(module, vec![(id.map(str::to_owned), doc.to_vec())], reset_error, reset_pending)
                .await?;
            return ids.into_iter().next().ok_or_else(|| ClientError::Server {
                status: 500,
                message: "bulk/process returned no id".to_owned(),
            });
        }

        let resp = self
            .authorize(self.http.post(self.url(&format!("/api/modules/{module}/"))))
            .body(doc.to_vec())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::classify_error(resp).await);
        }
        let id = resp
            .headers()
            .get("ID")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| ClientError::Server { status: 202, message: "missing ID header".to_owned() })?;
        Ok(id)
    }

    async fn status(&self, module: &str, id: &str) -> Result<String, ClientError> {
        let resp = self
            .authorize(self.http.head(self.url(&format!("/api/modules/{module}/{id}"))))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok("UNKNOWN".to_owned());
        }
        resp.headers()
            .get("Status")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| ClientError::Server { status: resp.status().as_u16(), message: "missing Status header".to_owned() })
    }

    async fn result(
        &self,
        module: &str,
        id: &str,
        format: Option<&str>,
    ) -> Result<Vec<u8>, ClientError> {
        let mut req = self.authorize(self.http.get(self.url(&format!("/api/modules/{module}/{id}"))));
        if let Some(format) = format {
            req = req.query(&[("format", format)]);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let mut err = Self::classify_error(resp).await;
            if let ClientError::TaskFailed { id: slot, .. } = &mut err {
                *slot = id.to_owned();
            }
            return Err(err);
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn get_task(&self, module: &str) -> Result<Option<(String, Vec<u8>)>, ClientError> {
        let resp = self.authorize(self.http.get(self.url(&format!("/api/modules/{module}/")))).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::classify_error(resp).await);
        }
        let id = resp
            .headers()
            .get("ID")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| ClientError::Server { status: 200, message: "missing ID header".to_owned() })?;
        let doc = resp.bytes().await?.to_vec();
        Ok(Some((id, doc)))
    }

    async fn store_result(&self, module: &str, id: &str, result: &[u8]) -> Result<(), ClientError> {
        let resp = self
            .authorize(self.http.put(self.url(&format!("/api/modules/{module}/{id}"))))
            .body(result.to_vec())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::classify_error(resp).await);
        }
        Ok(())
    }

    async fn store_error(&self, module: &str, id: &str, message: &[u8]) -> Result<(), ClientError> {
        let resp = self
            .authorize(self.http.put(self.url(&format!("/api/modules/{module}/{id}"))))
            .header("Content-Type", "application/prs.error+text")
            .body(message.to_vec())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::classify_error(resp).await);
        }
        Ok(())
    }

    async fn bulk_status(
        &self,
        module: &str,
        ids: &[String],
    ) -> Result<HashMap<String, String>, ClientError> {
        let resp = self
            .authorize(self.http.post(self.url(&format!("/api/modules/{module}/bulk/status"))))
            .json(ids)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::classify_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    async fn bulk_result(
        &self,
        module: &str,
        ids: &[String],
        format: Option<&str>,
    ) -> Result<HashMap<String, Vec<u8>>, ClientError> {
        let mut req = self.authorize(self.http.post(self.url(&format!("/api/modules/{module}/bulk/result"))));
        if let Some(format) = format {
            req = req.query(&[("format", format)]);
        }
        let resp = req.json(ids).send().await?;
        if !resp.status().is_success() {
            return Err(Self::classify_error(resp).await);
        }
        let text_results: HashMap<String, String> = resp.json().await?;
        Ok(text_results.into_iter().map(|(id, text)| (id, text.into_bytes())).collect())
    }

    async fn bulk_process(
        &self,
        module: &str,
        docs: Vec<(Option<String>, Vec<u8>)>,
        reset_error: bool,
        reset_pending: bool,
    ) -> Result<Vec<String>, ClientError> {
        let mut req = self.authorize(self.http.post(self.url(&format!("/api/modules/{module}/bulk/process"))));
        let mut query = Vec::new();
        if reset_error {
            query.push(("reset_error", "1"));
        }
        if reset_pending {
            query.push(("reset_pending", "1"));
        }
        req = req.query(&query);

        // Mirrors the REST facade's polymorphic body (spec.md §6.1): an
        // object when every doc carries an explicit id, else an array.
        let body: Value = if docs.iter().all(|(id, _)| id.is_some()) && !docs.is_empty() {
            let map: serde_json::Map<String, Value> = docs
                .into_iter()
                .map(|(id, doc)| (id.unwrap(), Value::String(String::from_utf8_lossy(&doc).into_owned())))
                .collect();
            Value::Object(map)
        } else {
            Value::Array(
                docs.into_iter()
                    .map(|(_, doc)| Value::String(String::from_utf8_lossy(&doc).into_owned()))
                    .collect(),
            )
        };

        let resp = req.json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Self::classify_error(resp).await);
        }
        Ok(resp.json().await?)
    }

    async fn process_inline(
        &self,
        module: &str,
        doc: &[u8],
        id: Option<&str>,
        format: Option<&str>,
    ) -> Result<Vec<u8>, ClientError> {
        let id = match id {
            Some(id) => id.to_owned(),
            None => nlpipe_core::fingerprint(doc),
        };
        if self.status(module, &id).await? == "UNKNOWN" {
            self.process(module, doc, Some(&id), false, false).await?;
        }
        loop {
            let status = self.status(module, &id).await?;
            match status.as_str() {
                "DONE" | "ERROR" => return self.result(module, &id, format).await,
                _ => tokio::time::sleep(Duration::from_millis(250)).await,
            }
        }
    }
}
