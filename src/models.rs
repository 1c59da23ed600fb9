use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Bearer token proving an authenticated session
///
/// The token is opaque to the client. `Debug` never prints it so a credential
/// can sit inside logged structures without leaking.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for an `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Server-assigned dataset identifier
///
/// The ingestion service hands out integer ids, the detail routes accept any
/// path segment, so ids are kept as text and accepted from either JSON shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(id: impl Into<String>) -> Self {
        DatasetId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DatasetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => DatasetId(n.to_string()),
            RawId::Text(s) => DatasetId(s),
        })
    }
}

/// One uploaded dataset as listed in the history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub filename: String,
    #[serde(deserialize_with = "timestamp")]
    pub uploaded_at: DateTime<Utc>,
}

/// Accepts RFC 3339 timestamps and, failing that, naive ones taken as UTC
fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

/// A single record of the uploaded table, keyed by column header
pub type Row = serde_json::Map<String, Value>;

/// Server-computed aggregate statistics for one dataset
///
/// Consumed as-is. The averages are optional so that a summary missing one of
/// them still deserializes and the views can leave the affected parts out.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub equipment_count: u64,
    #[serde(default)]
    pub avg_flowrate: Option<f64>,
    #[serde(default)]
    pub avg_pressure: Option<f64>,
    #[serde(default)]
    pub avg_temperature: Option<f64>,
    /// Equipment type label to count, in server order
    #[serde(default)]
    pub type_distribution: Option<IndexMap<String, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_flowrate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_flowrate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_temperature: Option<f64>,
}

/// A dataset together with its summary and rows
///
/// Only ever constructed whole, either from the detail endpoint or from an
/// upload response, and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetDetail {
    pub id: DatasetId,
    pub filename: String,
    #[serde(deserialize_with = "timestamp")]
    pub uploaded_at: DateTime<Utc>,
    pub summary: Summary,
    #[serde(default)]
    pub data: Vec<Row>,
}

impl DatasetDetail {
    /// History entry for this dataset
    pub fn entry(&self) -> Dataset {
        Dataset {
            id: self.id.clone(),
            filename: self.filename.clone(),
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Body of a successful upload
#[derive(Clone, Debug, Deserialize)]
pub struct UploadResponse {
    pub dataset_id: DatasetId,
    pub summary: Summary,
    #[serde(default)]
    pub data: Vec<Row>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}
