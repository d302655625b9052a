use super::{paths, Endpoint, RequestData};
use crate::macros::setter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Aggregates are rendered straight into charts; their fields are not
/// interpreted client side.
pub type AnalyticsData = serde_json::Value;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
}

#[derive(Default, Debug, Clone)]
pub struct GetOptimalTimes;

impl Endpoint for GetOptimalTimes {
    type Data = ();
    type Response = Vec<AnalyticsData>;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::OPTIMAL_TIMES.into()
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct GetTrends {
    #[serde(skip_serializing_if = "Option::is_none")]
    period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    granularity: Option<Granularity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metric: Option<String>,
}

impl GetTrends {
    pub fn new() -> Self {
        Self::default()
    }

    setter!(text period);
    setter!(opt granularity: Granularity);
    setter!(text metric);
}

impl Endpoint for GetTrends {
    type Data = Self;
    type Response = AnalyticsData;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::TRENDS.into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Query(self)
    }
}

#[derive(Default, Debug, Clone)]
pub struct GetPlatformPerformance;

impl Endpoint for GetPlatformPerformance {
    type Data = ();
    type Response = Vec<AnalyticsData>;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::PLATFORM_PERFORMANCE.into()
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct GetTopPosts {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

impl GetTopPosts {
    pub fn new() -> Self {
        Self::default()
    }

    setter!(opt limit: u32);
}

impl Endpoint for GetTopPosts {
    type Data = Self;
    type Response = Vec<AnalyticsData>;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::TOP_POSTS.into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Query(self)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct GetPerformanceComparison {
    #[serde(skip_serializing_if = "Option::is_none")]
    start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_date: Option<String>,
}

impl GetPerformanceComparison {
    pub fn new() -> Self {
        Self::default()
    }

    setter!(text start_date);
    setter!(text end_date);
}

impl Endpoint for GetPerformanceComparison {
    type Data = Self;
    type Response = AnalyticsData;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::PERFORMANCE_COMPARISON.into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Query(self)
    }
}
