use super::{paths, Endpoint};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCounts {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub published: u64,
    #[serde(default)]
    pub scheduled: u64,
    #[serde(default)]
    pub draft: u64,
    #[serde(default)]
    pub failed: u64,
}

impl PostCounts {
    /// Share of `count` in the total, as a whole percentage.
    pub fn percent_of_total(&self, count: u64) -> u64 {
        if self.total == 0 {
            0
        } else {
            ((count as f64 / self.total as f64) * 100.0).round() as u64
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalEngagement {
    #[serde(default)]
    pub last_30_days: f64,
    #[serde(default)]
    pub all_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementPoint {
    /// `YYYY-MM-DD`, or a full timestamp on older payloads.
    pub date: String,
    #[serde(default)]
    pub value: f64,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardOverview {
    #[serde(default)]
    pub total_posts: PostCounts,
    #[serde(default)]
    pub total_engagement: TotalEngagement,
    #[serde(default)]
    pub average_engagement_rate: f64,
    pub best_performing_platform: Option<String>,
    /// Shared so live updates can leave the loaded series untouched.
    #[serde(default)]
    pub engagement_chart: Arc<Vec<EngagementPoint>>,
    #[serde(default)]
    pub top_5_posts: Vec<serde_json::Value>,
    #[serde(default)]
    pub optimal_posting_times: Vec<serde_json::Value>,
}

#[derive(Default, Debug, Clone)]
pub struct GetOverview;

impl Endpoint for GetOverview {
    type Data = ();
    type Response = DashboardOverview;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::DASHBOARD_OVERVIEW.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overview_tolerates_sparse_payload() {
        let overview: DashboardOverview = serde_json::from_str(
            r#"{"total_posts":{"total":4,"published":1},"engagement_chart":[{"date":"2024-05-01","value":3}]}"#,
        )
        .unwrap();

        assert_eq!(overview.total_posts.total, 4);
        assert_eq!(overview.total_posts.percent_of_total(1), 25);
        assert_eq!(overview.total_engagement.last_30_days, 0.0);
        assert_eq!(overview.engagement_chart.len(), 1);
    }
}
