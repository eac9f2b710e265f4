//! Wire types for the backend REST contract.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// JWT pair returned by `/api/login/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Response of `/api/token/refresh/`.
#[derive(Debug, Deserialize)]
pub struct RefreshedAccess {
    pub access: String,
}

/// One row of a query result. `value_double` comes from the `Telemetry`
/// table, `value` from `Alarms`; unknown columns are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdxRow {
    #[serde(default)]
    pub localtime: Option<String>,
    #[serde(default)]
    pub value_double: Option<f64>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Envelope of `/api/query_adx/` responses.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Vec<AdxRow>,
}

/// Error body the backend attaches to failed calls.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.detail).or(self.message)
    }
}

/// Device registration record from `/api/search_serial/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub device_serial: Option<String>,
    #[serde(default)]
    pub comms_serial: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    /// Last telemetry timestamp seen for the device.
    #[serde(default)]
    pub localtime: Option<String>,
}

/// `/api/search_serial/` has been observed returning both a bare row array
/// and a `{data: [...]}` envelope depending on backend version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SearchSerialResponse {
    Rows(Vec<DeviceInfo>),
    Envelope { data: Vec<DeviceInfo> },
}

impl SearchSerialResponse {
    pub fn into_rows(self) -> Vec<DeviceInfo> {
        match self {
            SearchSerialResponse::Rows(rows) => rows,
            SearchSerialResponse::Envelope { data } => data,
        }
    }
}
