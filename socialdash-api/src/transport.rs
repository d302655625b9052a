use crate::endpoints::{Endpoint, RequestData};
use crate::envelope::Envelope;
use crate::error::{ApiError, ErrorBody};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// A fully described outbound call. Owned and cloneable so the pipeline can
/// replay it after a credential refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn from_endpoint<E>(endpoint: &E) -> Result<Self, ApiError>
    where
        E: Endpoint,
    {
        let mut request = Self::new(E::METHOD, endpoint.endpoint());
        match endpoint.data() {
            RequestData::Empty => {}
            RequestData::Query(data) => request.query = query_pairs(data)?,
            RequestData::Json(data) => request.body = Some(serde_json::to_value(data)?),
        }
        Ok(request)
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn targets(&self, fragment: &str) -> bool {
        self.path.contains(fragment)
    }
}

/// Flattens a serialisable parameter struct into query pairs. Null and
/// empty-string values are dropped so an absent key means "no filter".
fn query_pairs<T: Serialize>(data: &T) -> Result<Vec<(String, String)>, ApiError> {
    match serde_json::to_value(data)? {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(s) if s.is_empty() => None,
                Value::String(s) => Some((key, s)),
                other => Some((key, other.to_string())),
            })
            .collect()),
        other => Err(ApiError::Decode(format!(
            "query parameters must be an object, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        Self::new(status, serde_json::to_string(body).unwrap_or_default())
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(HeaderName::from_static(name), value);
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The payload is only decoded as `T` when `STATUS` reports success, so
    /// a failed envelope always keeps its error description.
    pub fn envelope<T: DeserializeOwned>(&self) -> Result<Envelope<T>, ApiError> {
        let raw: Envelope<Value> = serde_json::from_str(&self.body)?;
        raw.typed().map_err(ApiError::from)
    }

    /// Converts a non-success response into the error the pipeline reasons about.
    pub fn into_error(self, url: impl Into<String>) -> ApiError {
        ApiError::Response {
            status: self.status,
            url: url.into(),
            body: ErrorBody::parse(&self.body),
        }
    }
}

/// Executes a single HTTP exchange. Implementations return `Ok` for every
/// response the server produced, whatever its status; only transport-level
/// failures are `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<HttpResponse, ApiError>;
}

pub struct ReqwestTransport {
    http_client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::from)?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<HttpResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .http_client
            .request(request.method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[derive(Serialize)]
    struct Params {
        page: u32,
        search: String,
        status: Option<String>,
    }

    struct Probe(Params);

    impl Endpoint for Probe {
        type Data = Params;
        type Response = Value;

        fn endpoint(&self) -> Cow<'_, str> {
            "/probe".into()
        }

        fn data(&self) -> RequestData<&Self::Data> {
            RequestData::Query(&self.0)
        }
    }

    #[test]
    fn query_drops_empty_and_null_values() {
        let request = ApiRequest::from_endpoint(&Probe(Params {
            page: 2,
            search: String::new(),
            status: None,
        }))
        .unwrap();

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.query_value("page"), Some("2"));
        assert_eq!(request.query_value("search"), None);
        assert_eq!(request.query_value("status"), None);
        assert!(request.body.is_none());
    }

    #[test]
    fn rotated_header_is_readable() {
        let response = HttpResponse::new(StatusCode::OK, "{}")
            .with_header(crate::ROTATED_TOKEN_HEADER, "abc");
        assert_eq!(response.header(crate::ROTATED_TOKEN_HEADER), Some("abc"));
    }

    #[test]
    fn into_error_keeps_body_fields() {
        let err = HttpResponse::new(
            StatusCode::UNAUTHORIZED,
            r#"{"STATUS":"FAILED","ERROR_CODE":"TOKEN_EXPIRED"}"#,
        )
        .into_error("/api/posts");

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(
            err.body().and_then(|b| b.error_code.as_deref()),
            Some("TOKEN_EXPIRED")
        );
    }
}
