use anyhow::Result;
use socialdash_auth::RouteTracker;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Headless: redirects to the login surface are only recorded
    socialdash::run_headless(Arc::new(RouteTracker::default())).await
}
