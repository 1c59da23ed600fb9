//! Access to the authentication, dataset and report services

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, header};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::ServiceFailure;
use crate::models::{
    Credential, Dataset, DatasetDetail, DatasetId, LoginRequest, LoginResponse, RegisterRequest,
    UploadResponse,
};
use crate::normalizer::NormalizedFile;

/// The remote services this client talks to
///
/// Implementations report every failure as a raw [`ServiceFailure`];
/// classifying it is the caller's job.
#[async_trait]
pub trait EquipmentApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ServiceFailure>;

    async fn register(&self, request: &RegisterRequest) -> Result<(), ServiceFailure>;

    async fn history(&self, credential: &Credential) -> Result<Vec<Dataset>, ServiceFailure>;

    async fn dataset(
        &self,
        credential: &Credential,
        id: &DatasetId,
    ) -> Result<DatasetDetail, ServiceFailure>;

    async fn upload(
        &self,
        credential: &Credential,
        file: &NormalizedFile,
    ) -> Result<UploadResponse, ServiceFailure>;

    /// Raw PDF bytes of the report for a dataset
    async fn report(
        &self,
        credential: &Credential,
        id: &DatasetId,
    ) -> Result<Vec<u8>, ServiceFailure>;
}

/// [`EquipmentApi`] over HTTP
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:8000/api`
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(Client::builder().build()?, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpApi { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn dataset_path(prefix: &str, id: &DatasetId) -> String {
        format!("{}{}/", prefix, urlencoding::encode(id.as_str()))
    }
}

fn transport(err: reqwest::Error) -> ServiceFailure {
    ServiceFailure::Transport(err.to_string())
}

/// Turn a non-2xx response into a failure carrying its body
async fn check(response: Response) -> Result<Response, ServiceFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Err(ServiceFailure::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceFailure> {
    let bytes = check(response).await?.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceFailure::Decode(e.to_string()))
}

#[async_trait]
impl EquipmentApi for HttpApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ServiceFailure> {
        let url = self.url("/auth/login/");
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<(), ServiceFailure> {
        let url = self.url("/auth/register/");
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn history(&self, credential: &Credential) -> Result<Vec<Dataset>, ServiceFailure> {
        let url = self.url("/history/");
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, credential.bearer())
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn dataset(
        &self,
        credential: &Credential,
        id: &DatasetId,
    ) -> Result<DatasetDetail, ServiceFailure> {
        let url = self.url(&Self::dataset_path("/datasets/", id));
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, credential.bearer())
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn upload(
        &self,
        credential: &Credential,
        file: &NormalizedFile,
    ) -> Result<UploadResponse, ServiceFailure> {
        let url = self.url("/upload/");
        debug!("POST {} ({}, {} bytes)", url, file.file_name, file.contents.len());

        let part = Part::bytes(file.contents.clone())
            .file_name(file.file_name.clone())
            .mime_str(file.media_type)
            .map_err(transport)?;
        let form = Form::new()
            .part("file", part)
            .text("token", credential.as_str().to_string());

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, credential.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn report(
        &self,
        credential: &Credential,
        id: &DatasetId,
    ) -> Result<Vec<u8>, ServiceFailure> {
        let url = self.url(&Self::dataset_path("/report/pdf/", id));
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, credential.bearer())
            .send()
            .await
            .map_err(transport)?;
        let bytes = check(response).await?.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }
}
