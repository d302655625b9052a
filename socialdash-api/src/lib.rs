pub mod endpoints;
pub mod envelope;
mod error;
mod macros;
pub mod repositories;
pub mod transport;

pub use crate::endpoints::{Endpoint, RequestData};
pub use crate::envelope::Envelope;
pub use crate::error::{ApiError, ErrorBody};
pub use crate::transport::{ApiRequest, HttpResponse, ReqwestTransport, Transport};
pub use reqwest::{Method, StatusCode};
use repositories::*;

pub const BASE_URL: &str = "https://backenddeseca-production.up.railway.app";

/// Response header carrying a server-rotated access token.
pub const ROTATED_TOKEN_HEADER: &str = "x-new-access-token";

pub struct Request;

impl Request {
    pub fn auth() -> AuthRepository {
        AuthRepository::new()
    }

    pub fn posts() -> PostRepository {
        PostRepository::new()
    }

    pub fn dashboard() -> DashboardRepository {
        DashboardRepository::new()
    }

    pub fn analytics() -> AnalyticsRepository {
        AnalyticsRepository::new()
    }
}
