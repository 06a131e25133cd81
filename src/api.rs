use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::auth::{
    API_KEY_HEADER, ApiCredentials, PASSPHRASE_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER, now_iso,
};
use crate::network::NetworkId;

/// Timeout for authenticated reads and writes.
pub const PRIVATE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for endpoints authenticated by an Ethereum signature.
pub const SIGNED_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

const API_PREFIX: &str = "/v3";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("API error on {path} (status {status}): {body}")]
    Status {
        path: String,
        status: StatusCode,
        body: String,
    },
    #[error("private endpoint {path} requires API credentials")]
    MissingCredentials { path: String },
    #[error("failed to encode request body for {path}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode response from {path}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} returned no {what}")]
    Empty { path: String, what: &'static str },
}

/// Exchange account. Only the fields this tool acts on are typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub position_id: String,
    #[serde(default)]
    pub stark_key: Option<String>,
    #[serde(default)]
    pub equity: Option<Decimal>,
    #[serde(default)]
    pub free_collateral: Option<Decimal>,
    #[serde(default)]
    pub pending_deposits: Option<Decimal>,
    #[serde(default)]
    pub pending_withdrawals: Option<Decimal>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferType {
    Deposit,
    Withdrawal,
    FastWithdrawal,
    TransferIn,
    TransferOut,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    Queued,
    Confirmed,
    Canceled,
    #[serde(other)]
    Unknown,
}

/// Deposit or withdrawal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransferType,
    pub status: TransferStatus,
    #[serde(default)]
    pub debit_asset: Option<String>,
    #[serde(default)]
    pub credit_asset: Option<String>,
    #[serde(default)]
    pub debit_amount: Option<Decimal>,
    #[serde(default)]
    pub credit_amount: Option<Decimal>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Deserialize)]
struct TransfersResponse {
    #[serde(default)]
    transfers: Vec<Transfer>,
}

#[derive(Deserialize)]
struct RegistrationResponse {
    signature: Option<String>,
}

/// REST client for the exchange's `/v3` API.
#[derive(Debug)]
pub struct ExchangeClient {
    http: Client,
    base_url: String,
    credentials: Option<ApiCredentials>,
}

impl ExchangeClient {
    pub fn new(network: NetworkId, credentials: Option<ApiCredentials>) -> Self {
        Self::new_with_base_url(network.api_host(), credentials)
    }

    pub fn new_with_base_url(base_url: impl Into<String>, credentials: Option<ApiCredentials>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Authenticated GET on `/v3/{endpoint}`.
    pub async fn private_get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.private_request(Method::GET, endpoint, None).await
    }

    /// Authenticated POST on `/v3/{endpoint}` with a compact JSON body.
    pub async fn private_post<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_string(body).map_err(|source| ApiError::Encode {
            path: request_path(endpoint),
            source,
        })?;
        self.private_request(Method::POST, endpoint, Some(body)).await
    }

    async fn private_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
    ) -> Result<T, ApiError> {
        let path = request_path(endpoint);
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| ApiError::MissingCredentials { path: path.clone() })?;

        let timestamp = now_iso();
        let signature = credentials.sign(&path, method.as_str(), &timestamp, body.as_deref());

        let mut request = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .timeout(PRIVATE_REQUEST_TIMEOUT)
            .header(SIGNATURE_HEADER, signature)
            .header(API_KEY_HEADER, credentials.api_key())
            .header(TIMESTAMP_HEADER, &timestamp)
            .header(PASSPHRASE_HEADER, credentials.passphrase());
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        debug!("{method} {path}");
        let response = request.send().await?;
        decode_response(response, &path).await
    }

    /// POST on `/v3/{endpoint}` authenticated by Ethereum-signed headers.
    pub async fn signed_action_post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        headers: &[(&'static str, String)],
        body: &str,
    ) -> Result<T, ApiError> {
        let path = request_path(endpoint);
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .timeout(SIGNED_ACTION_TIMEOUT)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        debug!("POST {path} (eth-signed)");
        let response = request.send().await?;
        decode_response(response, &path).await
    }

    /// All accounts for the configured key.
    pub async fn accounts(&self) -> Result<Vec<Account>, ApiError> {
        let response: AccountsResponse = self.private_get("accounts").await?;
        debug!("Fetched {} account(s)", response.accounts.len());
        Ok(response.accounts)
    }

    /// The first account for the configured key.
    ///
    /// The exchange only supports one account per key, so the first one is the
    /// account. An empty list is an error rather than a default.
    pub async fn first_account(&self) -> Result<Account, ApiError> {
        self.accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Empty {
                path: request_path("accounts"),
                what: "accounts",
            })
    }

    /// Pre-computed signature required by the on-chain `registerUser` call.
    pub async fn registration_signature(&self) -> Result<String, ApiError> {
        let response: RegistrationResponse = self.private_get("registration").await?;
        response.signature.ok_or_else(|| ApiError::Empty {
            path: request_path("registration"),
            what: "signature",
        })
    }

    pub async fn transfers(&self) -> Result<Vec<Transfer>, ApiError> {
        let response: TransfersResponse = self.private_get("transfers").await?;
        debug!("Fetched {} transfer(s)", response.transfers.len());
        Ok(response.transfers)
    }
}

fn request_path(endpoint: &str) -> String {
    format!("{API_PREFIX}/{}", endpoint.trim_start_matches('/'))
}

async fn decode_response<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Status {
            path: path.to_string(),
            status,
            body,
        });
    }
    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}
