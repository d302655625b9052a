use crate::endpoints::{
    analytics::{
        GetOptimalTimes, GetPerformanceComparison, GetPlatformPerformance, GetTopPosts, GetTrends,
    },
    auth::{LoginUser, Logout, RefreshAccessToken, RegisterUser},
    dashboard::GetOverview,
    posts::{CreatePost, DeletePost, GetPost, GetPostAnalytics, ListPosts, Platform, UpdatePost},
};
use chrono::{DateTime, Utc};

#[derive(Default)]
pub struct AuthRepository;

impl AuthRepository {
    pub fn new() -> Self {
        Self
    }

    pub fn register(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
    ) -> RegisterUser {
        RegisterUser::new(email, password, name)
    }

    pub fn login(&self, email: impl Into<String>, password: impl Into<String>) -> LoginUser {
        LoginUser::new(email, password)
    }

    pub fn refresh(&self, user_id: impl Into<String>) -> RefreshAccessToken {
        RefreshAccessToken::new(user_id)
    }

    pub fn logout(&self) -> Logout {
        Logout
    }
}

#[derive(Default)]
pub struct PostRepository;

impl PostRepository {
    pub fn new() -> Self {
        Self
    }

    pub fn list(&self) -> ListPosts {
        ListPosts::new()
    }

    pub fn get(&self, id: impl Into<String>) -> GetPost {
        GetPost::new(id)
    }

    pub fn create(
        &self,
        content: impl Into<String>,
        platform: Platform,
        scheduled_at: DateTime<Utc>,
    ) -> CreatePost {
        CreatePost::new(content, platform, scheduled_at)
    }

    pub fn update(&self, id: impl Into<String>) -> UpdatePost {
        UpdatePost::new(id)
    }

    pub fn delete(&self, id: impl Into<String>) -> DeletePost {
        DeletePost::new(id)
    }

    pub fn analytics(&self, id: impl Into<String>) -> GetPostAnalytics {
        GetPostAnalytics::new(id)
    }
}

#[derive(Default)]
pub struct DashboardRepository;

impl DashboardRepository {
    pub fn new() -> Self {
        Self
    }

    pub fn overview(&self) -> GetOverview {
        GetOverview
    }
}

#[derive(Default)]
pub struct AnalyticsRepository;

impl AnalyticsRepository {
    pub fn new() -> Self {
        Self
    }

    pub fn optimal_times(&self) -> GetOptimalTimes {
        GetOptimalTimes
    }

    pub fn trends(&self) -> GetTrends {
        GetTrends::new()
    }

    pub fn platform_performance(&self) -> GetPlatformPerformance {
        GetPlatformPerformance
    }

    pub fn top_posts(&self) -> GetTopPosts {
        GetTopPosts::new()
    }

    pub fn comparison(&self) -> GetPerformanceComparison {
        GetPerformanceComparison::new()
    }
}
