use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATUS_SUCCESSFUL: &str = "SUCCESSFUL";

/// Response wrapper used by every backend endpoint:
/// `{STATUS, DB_DATA, ERROR_DESCRIPTION?, ERROR_CODE?, ERROR_FILTER?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "STATUS")]
    pub status: Option<String>,
    #[serde(rename = "DB_DATA")]
    pub data: Option<T>,
    #[serde(rename = "ERROR_DESCRIPTION")]
    pub error_description: Option<String>,
    #[serde(rename = "ERROR_CODE")]
    pub error_code: Option<String>,
    #[serde(rename = "ERROR_FILTER")]
    pub error_filter: Option<String>,
}

impl<T> Envelope<T> {
    pub fn successful(data: T) -> Self {
        Self {
            status: Some(STATUS_SUCCESSFUL.to_string()),
            data: Some(data),
            error_description: None,
            error_code: None,
            error_filter: None,
        }
    }

    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            status: Some("FAILED".to_string()),
            data: None,
            error_description: Some(description.into()),
            error_code: None,
            error_filter: None,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.status.as_deref() == Some(STATUS_SUCCESSFUL)
    }

    /// The payload, only when the envelope reports success.
    pub fn into_data(self) -> Option<T> {
        if self.is_successful() {
            self.data
        } else {
            None
        }
    }
}

impl Envelope<Value> {
    /// Decodes `DB_DATA` as `T` only when the envelope reports success. A
    /// failed envelope keeps its error fields and drops whatever payload it
    /// carried.
    pub fn typed<T: DeserializeOwned>(self) -> Result<Envelope<T>, serde_json::Error> {
        let data = match self.data {
            Some(data) if self.status.as_deref() == Some(STATUS_SUCCESSFUL) => {
                Some(serde_json::from_value(data)?)
            }
            _ => None,
        };

        Ok(Envelope {
            status: self.status,
            data,
            error_description: self.error_description,
            error_code: self.error_code,
            error_filter: self.error_filter,
        })
    }
}
