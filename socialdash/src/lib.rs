pub mod analytics;
mod app;
pub mod dashboard;
pub mod live;
pub mod logging;
pub mod posts;

pub use analytics::{AnalyticsSnapshot, AnalyticsStore};
pub use app::{run_headless, SocialDash};
pub use dashboard::{DashboardStore, DashboardView, EngagementUpdate, TrailingSeries};
pub use live::{
    LifecycleHooks, LiveError, LiveEvent, LiveUpdateChannel, PushConnector, PushLink,
    Subscription, WebSocketConnector,
};
pub use posts::{ListMode, Pagination, PostCollection, PostCollectionManager, PostFilters};

// Always expose testing module (integration tests need it)
pub mod testing;
