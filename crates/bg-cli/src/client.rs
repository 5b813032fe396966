//! Thin `reqwest` wrapper over the `/api/v1` HTTP surface.
//!
//! Unlike the teacher's CLI, which talks to Postgres directly through
//! `mqk_db::connect_from_env`, this CLI never touches the database — every
//! command goes over the wire to a running `bg-daemon`, the same way an
//! external CI runner or operator laptop would.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub struct Client {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl Client {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .authed(self.http.get(self.url(path)))
            .send()
            .await
            .with_context(|| format!("GET {path} failed"))?;
        Self::parse(resp).await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .authed(self.http.post(self.url(path)))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path} failed"))?;
        Self::parse(resp).await
    }

    pub async fn patch_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .authed(self.http.patch(self.url(path)))
            .json(body)
            .send()
            .await
            .with_context(|| format!("PATCH {path} failed"))?;
        Self::parse(resp).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let resp = self
            .authed(self.http.delete(self.url(path)))
            .send()
            .await
            .with_context(|| format!("DELETE {path} failed"))?;
        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("DELETE {path} failed: {status} {body}")
    }

    /// Uploads `bytes` as multipart form field `file` under `filename`.
    pub async fn upload<T: DeserializeOwned>(&self, path: &str, filename: String, bytes: Vec<u8>) -> Result<T> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename);
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp = self
            .authed(self.http.post(self.url(path)))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("upload to {path} failed"))?;
        Self::parse(resp).await
    }

    async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let text = resp.text().await.context("reading response body")?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(text);
            bail!("server returned {status}: {message}");
        }
        serde_json::from_str(&text).with_context(|| format!("decoding response body: {text}"))
    }
}
