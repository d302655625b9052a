use socialdash_api::endpoints::dashboard::DashboardOverview;
use socialdash_api::{ApiError, ApiRequest, Envelope, Request, ReqwestTransport, Transport, BASE_URL};
use std::time::Duration;

#[tokio::main]
pub async fn main() -> Result<(), ApiError> {
    let transport = ReqwestTransport::new(BASE_URL, Duration::from_secs(30))?;

    let req = ApiRequest::from_endpoint(&Request::dashboard().overview())?;
    let response = transport.execute(&req, Some("access_token")).await?;

    if !response.is_success() {
        return Err(response.into_error(req.path));
    }

    let envelope: Envelope<DashboardOverview> = response.envelope()?;
    if let Some(overview) = envelope.into_data() {
        println!("{} posts in total", overview.total_posts.total);
    }
    Ok(())
}
