use itertools::Itertools;
use socialdash_api::endpoints::posts::{
    CreatePost, ListPosts, Platform, Post, PostAnalytics, PostPage, PostStatus, UpdatePost,
    MAX_CONTENT_LENGTH,
};
use socialdash_api::{Request, StatusCode};
use socialdash_auth::{ActionError, Outcome, RequestPipeline};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

pub const DEFAULT_LIMIT: u32 = 20;
pub const DEFAULT_SORT: &str = "-created_at";

const FETCH_FAILED: &str = "Failed to fetch posts";
const CANNOT_LOAD_MORE: &str = "Cannot load more posts";
const NOT_FOUND: &str = "Post not found";
const CREATE_FAILED: &str = "Failed to create post";
const UPDATE_FAILED: &str = "Failed to update post";
const DELETE_FAILED: &str = "Failed to delete post";
const ANALYTICS_FAILED: &str = "Failed to fetch analytics";
const PUBLISHED_IS_FROZEN: &str = "Published posts cannot be modified";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFilters {
    pub status: Option<PostStatus>,
    pub platform: Option<Platform>,
    /// Empty means no search.
    pub search: String,
    pub sort: String,
}

impl Default for PostFilters {
    fn default() -> Self {
        Self {
            status: None,
            platform: None,
            search: String::new(),
            sort: DEFAULT_SORT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
            total: 0,
            total_pages: 0,
        }
    }
}

/// Whether a fetch replaces the held list or extends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Replace,
    Append,
}

/// The held view of the post list.
#[derive(Debug, Clone, Default)]
pub struct PostCollection {
    /// What the UI shows; narrowed by [`PostCollectionManager::search_local`].
    pub posts: Vec<Post>,
    /// Everything fetched for the current filters.
    pub loaded: Vec<Post>,
    pub current_post: Option<Post>,
    pub post_analytics: Option<PostAnalytics>,
    pub filters: PostFilters,
    pub pagination: Pagination,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub is_loading: bool,
    pub is_loading_more: bool,
}

impl PostCollection {
    fn find(&self, id: &str) -> Option<&Post> {
        self.loaded
            .iter()
            .chain(self.current_post.iter())
            .find(|post| post.id == id)
    }

    fn patch(&mut self, updated: &Post) {
        for post in self.posts.iter_mut().chain(self.loaded.iter_mut()) {
            if post.id == updated.id {
                *post = updated.clone();
            }
        }
        self.current_post = Some(updated.clone());
    }

    fn evict(&mut self, id: &str) {
        self.posts.retain(|post| post.id != id);
        self.loaded.retain(|post| post.id != id);
        if self.current_post.as_ref().is_some_and(|post| post.id == id) {
            self.current_post = None;
        }
    }
}

/// Paginated, filtered post list layered on the request pipeline.
///
/// Every replacing fetch and every filter change starts a new generation;
/// pages that arrive for an older generation are handed back to their
/// caller but never merged into the held view.
#[derive(Clone)]
pub struct PostCollectionManager {
    pipeline: Arc<RequestPipeline>,
    state: Arc<RwLock<PostCollection>>,
    generation: Arc<AtomicU64>,
}

impl PostCollectionManager {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self {
            pipeline,
            state: Arc::new(RwLock::new(PostCollection::default())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, PostCollection> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PostCollection> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> PostCollection {
        self.read().clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.read().posts.clone()
    }

    pub fn filters(&self) -> PostFilters {
        self.read().filters.clone()
    }

    pub fn pagination(&self) -> Pagination {
        self.read().pagination
    }

    pub fn has_more(&self) -> bool {
        self.read().has_more
    }

    /// Fetches a page. `overrides` win over the held filters; unset fields
    /// fall back to them. `Append` asks for the page after the current one.
    pub async fn list(&self, overrides: ListPosts, mode: ListMode) -> Outcome<PostPage> {
        let (query, generation, requested_page) = {
            let mut state = self.write();
            state.is_loading = true;

            let requested_page = match mode {
                ListMode::Append => state.pagination.page + 1,
                ListMode::Replace => 1,
            };
            let generation = match mode {
                ListMode::Replace => {
                    // Nothing from the previous result set may be extended
                    // while the replacement is in flight
                    state.pagination.page = 1;
                    state.has_more = false;
                    state.is_loading_more = false;
                    state.next_cursor = None;
                    self.generation.fetch_add(1, Ordering::SeqCst) + 1
                }
                ListMode::Append => self.generation.load(Ordering::SeqCst),
            };
            let query = merge_query(overrides, &state.filters, &state.pagination, requested_page);
            (query, generation, requested_page)
        };

        debug!("Listing posts: {:?}", query);
        let outcome = match self.pipeline.send(&query).await {
            Ok(reply) => reply.accept(StatusCode::OK, FETCH_FAILED),
            Err(e) => Err(ActionError::from_api(&e, FETCH_FAILED)),
        };

        let mut state = self.write();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding posts page for superseded filters");
            return outcome;
        }

        state.is_loading = false;
        state.is_loading_more = false;
        let page = outcome?;

        let current_page = page.page.unwrap_or(requested_page);
        state.pagination = Pagination {
            page: current_page,
            limit: page.limit.unwrap_or(state.pagination.limit),
            total: page.total,
            total_pages: page.total_pages,
        };
        state.has_more = current_page < page.total_pages;
        state.next_cursor = page.next_cursor.clone();

        match mode {
            ListMode::Replace => {
                state.loaded = page.posts.clone();
                state.posts = page.posts.clone();
            }
            ListMode::Append => {
                let loaded = std::mem::take(&mut state.loaded);
                state.loaded = loaded
                    .into_iter()
                    .chain(page.posts.iter().cloned())
                    .unique_by(|post| post.id.clone())
                    .collect();
                let shown = std::mem::take(&mut state.posts);
                state.posts = shown
                    .into_iter()
                    .chain(page.posts.iter().cloned())
                    .unique_by(|post| post.id.clone())
                    .collect();
            }
        }

        info!(
            "Loaded page {}/{} ({} posts held)",
            current_page,
            page.total_pages,
            state.loaded.len()
        );
        Ok(page)
    }

    /// Fetches the next page. Refused without a request when there is none,
    /// when one is already loading, or while the list is being replaced.
    pub async fn load_more(&self) -> Outcome<PostPage> {
        {
            let mut state = self.write();
            if state.is_loading || state.is_loading_more || !state.has_more {
                return Err(ActionError::rejected(CANNOT_LOAD_MORE));
            }
            state.is_loading_more = true;
        }
        self.list(ListPosts::new(), ListMode::Append).await
    }

    /// Edits the filters and resets pagination before returning. Does not
    /// fetch; in-flight pages for the previous filters will be discarded.
    pub fn set_filters<F>(&self, edit: F)
    where
        F: FnOnce(&mut PostFilters),
    {
        let mut state = self.write();
        edit(&mut state.filters);
        self.reset_pagination(&mut state);
    }

    /// [`PostCollectionManager::set_filters`] followed by a fresh first page.
    pub async fn apply_filters<F>(&self, edit: F) -> Outcome<PostPage>
    where
        F: FnOnce(&mut PostFilters),
    {
        self.set_filters(edit);
        self.list(ListPosts::new(), ListMode::Replace).await
    }

    pub fn reset_filters(&self) {
        let mut state = self.write();
        state.filters = PostFilters::default();
        self.reset_pagination(&mut state);
    }

    fn reset_pagination(&self, state: &mut PostCollection) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.pagination.page = 1;
        state.has_more = false;
        state.is_loading = false;
        state.is_loading_more = false;
    }

    /// Narrows the shown posts to those whose content contains `term`,
    /// ignoring case. A blank term shows everything loaded. No request.
    pub fn search_local(&self, term: &str) {
        let mut state = self.write();
        let term = term.trim().to_lowercase();
        state.posts = if term.is_empty() {
            state.loaded.clone()
        } else {
            state
                .loaded
                .iter()
                .filter(|post| post.content.to_lowercase().contains(&term))
                .cloned()
                .collect()
        };
    }

    /// Loads one post and makes it current.
    pub async fn get(&self, id: &str) -> Outcome<Post> {
        let post = match self.pipeline.send(&Request::posts().get(id)).await {
            Ok(reply) => reply.accept(StatusCode::OK, NOT_FOUND)?,
            Err(e) => return Err(ActionError::from_api(&e, "Failed to fetch post")),
        };
        self.write().current_post = Some(post.clone());
        Ok(post)
    }

    /// Creates a post, then reloads the first page.
    pub async fn create(&self, post: CreatePost) -> Outcome<Post> {
        check_length(&post.content)?;

        let created = match self.pipeline.send(&post).await {
            Ok(reply) => reply.accept(StatusCode::CREATED, CREATE_FAILED)?,
            Err(e) => return Err(ActionError::from_api(&e, CREATE_FAILED)),
        };
        info!("Created post {}", created.id);

        if let Err(e) = self.list(ListPosts::new(), ListMode::Replace).await {
            warn!("Post created but list reload failed: {}", e);
        }
        Ok(created)
    }

    /// Updates a post and patches it in place.
    pub async fn update(&self, update: UpdatePost) -> Outcome<Post> {
        self.ensure_mutable(update.id())?;
        if let Some(content) = update.change_set().content.as_deref() {
            check_length(content)?;
        }

        let updated = match self.pipeline.send(&update).await {
            Ok(reply) => reply.accept(StatusCode::OK, UPDATE_FAILED)?,
            Err(e) => return Err(ActionError::from_api(&e, UPDATE_FAILED)),
        };
        self.write().patch(&updated);
        Ok(updated)
    }

    /// Deletes a post and drops it from the held view.
    pub async fn delete(&self, id: &str) -> Outcome<()> {
        self.ensure_mutable(id)?;

        match self.pipeline.send(&Request::posts().delete(id)).await {
            Ok(reply) => reply.accept_empty(StatusCode::OK, DELETE_FAILED)?,
            Err(e) => return Err(ActionError::from_api(&e, DELETE_FAILED)),
        }
        self.write().evict(id);
        info!("Deleted post {}", id);
        Ok(())
    }

    pub async fn analytics(&self, id: &str) -> Outcome<PostAnalytics> {
        let analytics = match self.pipeline.send(&Request::posts().analytics(id)).await {
            Ok(reply) => reply.accept(StatusCode::OK, ANALYTICS_FAILED)?,
            Err(e) => return Err(ActionError::from_api(&e, ANALYTICS_FAILED)),
        };
        self.write().post_analytics = Some(analytics.clone());
        Ok(analytics)
    }

    /// Posts held as published are refused locally.
    fn ensure_mutable(&self, id: &str) -> Outcome<()> {
        match self.read().find(id) {
            Some(post) if !post.is_editable() => Err(ActionError::rejected(PUBLISHED_IS_FROZEN)),
            _ => Ok(()),
        }
    }
}

fn check_length(content: &str) -> Outcome<()> {
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(ActionError::rejected(format!(
            "Content must be at most {} characters",
            MAX_CONTENT_LENGTH
        )));
    }
    Ok(())
}

fn merge_query(
    overrides: ListPosts,
    filters: &PostFilters,
    pagination: &Pagination,
    page: u32,
) -> ListPosts {
    let non_empty = |value: &str| Some(value.to_string()).filter(|v| !v.is_empty());

    ListPosts {
        page: overrides.page.or(Some(page)),
        limit: overrides.limit.or(Some(pagination.limit)),
        status: overrides.status.or(filters.status),
        platform: overrides.platform.or(filters.platform),
        search: overrides.search.or_else(|| non_empty(&filters.search)),
        sort: overrides.sort.or_else(|| non_empty(&filters.sort)),
        ..overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_falls_back_to_filters_and_strips_blanks() {
        let filters = PostFilters {
            status: Some(PostStatus::Draft),
            platform: None,
            search: String::new(),
            sort: DEFAULT_SORT.into(),
        };

        let query = merge_query(ListPosts::new(), &filters, &Pagination::default(), 3);
        assert_eq!(query.page, Some(3));
        assert_eq!(query.limit, Some(DEFAULT_LIMIT));
        assert_eq!(query.status, Some(PostStatus::Draft));
        assert_eq!(query.search, None);
        assert_eq!(query.sort.as_deref(), Some(DEFAULT_SORT));
    }

    #[test]
    fn merge_prefers_overrides() {
        let overrides = ListPosts::new()
            .page(7u32)
            .platform(Platform::Linkedin)
            .search("launch")
            .cursor("abc");
        let query = merge_query(overrides, &PostFilters::default(), &Pagination::default(), 1);
        assert_eq!(query.page, Some(7));
        assert_eq!(query.platform, Some(Platform::Linkedin));
        assert_eq!(query.search.as_deref(), Some("launch"));
        assert_eq!(query.cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn content_length_limit_counts_characters() {
        assert!(check_length(&"é".repeat(MAX_CONTENT_LENGTH)).is_ok());
        assert!(check_length(&"a".repeat(MAX_CONTENT_LENGTH + 1)).is_err());
    }
}
