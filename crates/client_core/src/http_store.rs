use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Deserialize};
use shared::{domain::Bill, error::ApiError, protocol::CreateBillResponse};
use tracing::debug;
use url::Url;

use crate::{
    identity::{LocalStorage, JWT_KEY},
    BillsApi, CreateBillPayload, Store, StoreError,
};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Bill store reached over the REST API.
#[derive(Debug, Clone)]
pub struct HttpStore {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(format!(
                "{base_url} cannot be used as an api base"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            token: None,
        })
    }

    /// Picks up the session token stored at login, if any.
    pub fn from_local_storage(base_url: &str, storage: &LocalStorage) -> Result<Self, StoreError> {
        let store = Self::new(base_url)?;
        Ok(match storage.get_item(JWT_KEY) {
            Some(token) if !token.is_empty() => store.with_token(token),
            _ => store,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn bills_url(&self) -> Result<Url, StoreError> {
        Ok(self.base_url.join("bills")?)
    }

    fn bill_url(&self, id: &str) -> Result<Url, StoreError> {
        let mut url = self.bills_url()?;
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.base_url.to_string()))?
            .push(id);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await?;
        let message = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => body.message,
            Err(_) if text.trim().is_empty() => status.to_string(),
            Err(_) => text,
        };
        return Err(StoreError::Api {
            status: status.as_u16(),
            error: ApiError::from_status(status.as_u16(), message),
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

#[async_trait]
impl BillsApi for HttpStore {
    async fn create(&self, payload: CreateBillPayload) -> Result<CreateBillResponse, StoreError> {
        let url = self.bills_url()?;
        let file_name = payload.file.base_name().to_string();
        let mut part = Part::bytes(payload.file.bytes).file_name(file_name.clone());
        if !payload.file.mime_type.is_empty() {
            part = part.mime_str(&payload.file.mime_type)?;
        }
        let form = Form::new()
            .part("file", part)
            .text("email", payload.email);

        debug!(%url, file_name = %file_name, "uploading receipt");
        let response = self
            .authorize(self.http.post(url))
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }

    async fn update(&self, bill: &Bill) -> Result<Bill, StoreError> {
        let url = self.bill_url(bill.id.as_str())?;
        debug!(%url, bill_id = %bill.id, "updating bill");
        let response = self
            .authorize(self.http.patch(url))
            .json(bill)
            .send()
            .await?;
        decode(response).await
    }

    async fn list(&self) -> Result<Vec<Bill>, StoreError> {
        let url = self.bills_url()?;
        let response = self.authorize(self.http.get(url)).send().await?;
        decode(response).await
    }
}

impl Store for HttpStore {
    fn bills(&self) -> &dyn BillsApi {
        self
    }
}

#[cfg(test)]
#[path = "tests/http_store_tests.rs"]
mod tests;
