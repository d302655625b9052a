use socialdash_api::endpoints::analytics::{
    AnalyticsData, GetPerformanceComparison, GetTopPosts, GetTrends,
};
use socialdash_api::{Endpoint, Request, StatusCode};
use socialdash_auth::{ActionError, Outcome, RequestPipeline};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

const ANALYTICS_FAILED: &str = "Failed to fetch analytics";

/// Last payload of each aggregate.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsSnapshot {
    pub optimal_times: Option<Vec<AnalyticsData>>,
    pub trends: Option<AnalyticsData>,
    pub platform_performance: Option<Vec<AnalyticsData>>,
    pub top_posts: Option<Vec<AnalyticsData>>,
    pub comparison: Option<AnalyticsData>,
}

#[derive(Clone)]
pub struct AnalyticsStore {
    pipeline: Arc<RequestPipeline>,
    cache: Arc<RwLock<AnalyticsSnapshot>>,
}

impl AnalyticsStore {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self {
            pipeline,
            cache: Arc::new(RwLock::new(AnalyticsSnapshot::default())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AnalyticsSnapshot> {
        self.cache.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AnalyticsSnapshot> {
        self.cache.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> AnalyticsSnapshot {
        self.read().clone()
    }

    async fn fetch<E: Endpoint>(&self, endpoint: &E) -> Outcome<E::Response> {
        debug!("Fetching analytics from {}", endpoint.endpoint());
        match self.pipeline.send(endpoint).await {
            Ok(reply) => reply.accept(StatusCode::OK, ANALYTICS_FAILED),
            Err(e) => Err(ActionError::from_api(&e, ANALYTICS_FAILED)),
        }
    }

    pub async fn optimal_times(&self) -> Outcome<Vec<AnalyticsData>> {
        let data = self.fetch(&Request::analytics().optimal_times()).await?;
        self.write().optimal_times = Some(data.clone());
        Ok(data)
    }

    pub async fn trends(&self, query: GetTrends) -> Outcome<AnalyticsData> {
        let data = self.fetch(&query).await?;
        self.write().trends = Some(data.clone());
        Ok(data)
    }

    pub async fn platform_performance(&self) -> Outcome<Vec<AnalyticsData>> {
        let data = self
            .fetch(&Request::analytics().platform_performance())
            .await?;
        self.write().platform_performance = Some(data.clone());
        Ok(data)
    }

    pub async fn top_posts(&self, query: GetTopPosts) -> Outcome<Vec<AnalyticsData>> {
        let data = self.fetch(&query).await?;
        self.write().top_posts = Some(data.clone());
        Ok(data)
    }

    pub async fn comparison(&self, query: GetPerformanceComparison) -> Outcome<AnalyticsData> {
        let data = self.fetch(&query).await?;
        self.write().comparison = Some(data.clone());
        Ok(data)
    }
}
