use crate::live::{LiveUpdateChannel, Subscription};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use socialdash_api::endpoints::dashboard::{DashboardOverview, EngagementPoint};
use socialdash_api::{Request, StatusCode};
use socialdash_auth::{ActionError, Outcome, RequestPipeline};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

pub const ENGAGEMENT_EVENT: &str = "engagement_chart_update";
pub const TRAILING_DAYS: i64 = 30;

const OVERVIEW_FAILED: &str = "Failed to fetch dashboard overview";
const ALREADY_LOADING: &str = "Request already in progress";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngagementTotals {
    pub last_30_days: Option<f64>,
}

/// Payload of an `engagement_chart_update` push. Absent fields leave the
/// held overview alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngagementUpdate {
    pub engagement_chart: Option<Vec<EngagementPoint>>,
    pub total_engagement: Option<EngagementTotals>,
}

/// Chart series over the trailing window, oldest day first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrailingSeries {
    pub dates: Vec<NaiveDate>,
    pub daily: Vec<f64>,
    pub cumulative: Vec<f64>,
}

impl TrailingSeries {
    /// One entry per day for the [`TRAILING_DAYS`] ending `today`. Days
    /// without a point count as zero; points outside the window are ignored.
    pub fn compute(points: &[EngagementPoint], today: NaiveDate) -> Self {
        let mut by_day: HashMap<NaiveDate, f64> = HashMap::new();
        for point in points {
            match parse_day(&point.date) {
                Some(day) => *by_day.entry(day).or_default() += point.value,
                None => debug!("Skipping chart point with date {:?}", point.date),
            }
        }

        let start = today - Duration::days(TRAILING_DAYS - 1);
        let dates: Vec<NaiveDate> = start.iter_days().take(TRAILING_DAYS as usize).collect();
        let daily: Vec<f64> = dates
            .iter()
            .map(|day| by_day.get(day).copied().unwrap_or(0.0))
            .collect();
        let cumulative = daily
            .iter()
            .scan(0.0, |total, value| {
                *total += value;
                Some(*total)
            })
            .collect();

        Self {
            dates,
            daily,
            cumulative,
        }
    }
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc).date_naive())
    })
}

#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    pub overview: Option<DashboardOverview>,
    /// Recomputed from live pushes; the overview's own chart is left as loaded.
    pub live_series: Option<TrailingSeries>,
    pub is_loading: bool,
}

/// Holds the dashboard overview and folds live deltas into it.
#[derive(Clone)]
pub struct DashboardStore {
    pipeline: Arc<RequestPipeline>,
    view: Arc<RwLock<DashboardView>>,
    in_flight: Arc<AtomicBool>,
}

impl DashboardStore {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self {
            pipeline,
            view: Arc::new(RwLock::new(DashboardView::default())),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, DashboardView> {
        self.view.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DashboardView> {
        self.view.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn view(&self) -> DashboardView {
        self.read().clone()
    }

    pub fn overview(&self) -> Option<DashboardOverview> {
        self.read().overview.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.read().is_loading
    }

    pub async fn load_overview(&self) -> Outcome<DashboardOverview> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(ActionError::rejected(ALREADY_LOADING));
        }
        self.write().is_loading = true;

        let outcome = match self.pipeline.send(&Request::dashboard().overview()).await {
            Ok(reply) => reply.accept(StatusCode::OK, OVERVIEW_FAILED),
            Err(e) => Err(ActionError::from_api(&e, OVERVIEW_FAILED)),
        };

        {
            let mut view = self.write();
            view.is_loading = false;
            if let Ok(overview) = &outcome {
                view.overview = Some(overview.clone());
            }
        }
        self.in_flight.store(false, Ordering::SeqCst);

        if outcome.is_ok() {
            info!("Dashboard overview loaded");
        }
        outcome
    }

    /// Applies a live delta against today's UTC date.
    pub fn apply_update(&self, update: &EngagementUpdate) {
        self.apply_update_on(update, Utc::now().date_naive());
    }

    pub fn apply_update_on(&self, update: &EngagementUpdate, today: NaiveDate) {
        let mut view = self.write();

        if let Some(last_30_days) = update
            .total_engagement
            .as_ref()
            .and_then(|totals| totals.last_30_days)
        {
            match view.overview.as_mut() {
                Some(overview) => overview.total_engagement.last_30_days = last_30_days,
                None => debug!("Engagement total pushed before overview loaded"),
            }
        }

        if let Some(points) = &update.engagement_chart {
            view.live_series = Some(TrailingSeries::compute(points, today));
        }
    }

    /// Edits the held overview in place. No-op before the first load.
    pub fn update_overview<F>(&self, edit: F)
    where
        F: FnOnce(&mut DashboardOverview),
    {
        if let Some(overview) = self.write().overview.as_mut() {
            edit(overview);
        }
    }

    /// Routes `engagement_chart_update` pushes into this store.
    pub fn attach(&self, channel: &LiveUpdateChannel) -> Subscription {
        let store = self.clone();
        channel.on_typed(ENGAGEMENT_EVENT, move |update: EngagementUpdate| {
            store.apply_update(&update)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(date: &str, value: f64) -> EngagementPoint {
        EngagementPoint {
            date: date.to_string(),
            value,
        }
    }

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_trailing_series_covers_thirty_days() {
        let today = day("2024-05-30");
        let series = TrailingSeries::compute(
            &[
                point("2024-05-01", 2.0),
                point("2024-05-30", 3.0),
                point("2024-04-30", 100.0),
            ],
            today,
        );

        assert_eq!(series.dates.len(), 30);
        assert_eq!(series.dates.first(), Some(&day("2024-05-01")));
        assert_eq!(series.dates.last(), Some(&today));
        assert_eq!(series.daily[0], 2.0);
        assert_eq!(series.daily[29], 3.0);
        assert_eq!(series.cumulative[28], 2.0);
        assert_eq!(series.cumulative[29], 5.0);
    }

    #[test]
    fn test_trailing_series_accepts_timestamps() {
        let series = TrailingSeries::compute(
            &[
                point("2024-05-30T23:10:00Z", 1.0),
                point("2024-05-30", 1.5),
                point("yesterday", 9.0),
            ],
            day("2024-05-30"),
        );

        assert_eq!(series.daily[29], 2.5);
        assert_eq!(series.cumulative[29], 2.5);
    }

    #[test]
    fn test_update_payload_fields_are_optional() {
        let update: EngagementUpdate =
            serde_json::from_str(r#"{"total_engagement":{"last_30_days":500}}"#).unwrap();

        assert_eq!(update.engagement_chart, None);
        assert_eq!(
            update.total_engagement.and_then(|t| t.last_30_days),
            Some(500.0)
        );
    }
}
