pub mod analytics;
pub mod auth;
pub mod dashboard;
pub mod posts;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;

/// Backend route table.
pub mod paths {
    pub const REGISTER: &str = "/api/auth/register";
    pub const LOGIN: &str = "/api/auth/login";
    pub const REFRESH: &str = "/api/auth/refresh";
    pub const LOGOUT: &str = "/api/auth/logout";

    pub const POSTS: &str = "/api/posts";

    pub const DASHBOARD_OVERVIEW: &str = "/api/dashboard/overview";

    pub const OPTIMAL_TIMES: &str = "/api/analytics/optimal-times";
    pub const TRENDS: &str = "/api/analytics/trends";
    pub const PLATFORM_PERFORMANCE: &str = "/api/analytics/performance/platforms";
    pub const TOP_POSTS: &str = "/api/analytics/performance/top-posts";
    pub const PERFORMANCE_COMPARISON: &str = "/api/analytics/performance/comparison";

    pub fn post(id: &str) -> String {
        format!("{}/{}", POSTS, id)
    }

    pub fn post_analytics(id: &str) -> String {
        format!("{}/{}/analytics", POSTS, id)
    }
}

/// How a request carries its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestData<T> {
    Empty,
    Query(T),
    Json(T),
}

/// A typed backend operation. `Response` is the type found under `DB_DATA`
/// in a successful envelope.
pub trait Endpoint {
    type Data: Serialize;
    type Response: DeserializeOwned;
    const METHOD: Method = Method::GET;

    fn endpoint(&self) -> Cow<'_, str>;

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Empty
    }
}
