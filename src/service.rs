//! Dashboard service: cached reads and invalidating mutations.
//!
//! Every read goes through the query cache under a fixed key. Every
//! mutation calls the backend and, once it succeeded, invalidates the keys
//! whose data it changed. Cached collections are never patched in place;
//! the next read fetches fresh data.
//!
//! | Action                                | Invalidated keys                          |
//! |---------------------------------------|-------------------------------------------|
//! | create / delete client                | clients, dashboard                        |
//! | update client                         | clients                                   |
//! | create / delete project               | projects, dashboard                       |
//! | update project                        | projects                                  |
//! | start / retry / resume pipeline       | pipeline-progress/id, project/id, projects|
//! | resolve / bulk-resolve / approve-all  | review-queue, dashboard                   |
//! | upload files                          | project-files/id, project/id              |
//! | delete file                           | project-files/id                          |

use std::path::Path;
use std::sync::Arc;

use crate::api::endpoints::{auth, clients, dashboard, files, pipeline, projects, review};
use crate::api::{ApiClient, ApiError};
use crate::config::{DASHBOARD_REFRESH_INTERVAL, PROGRESS_POLL_INTERVAL};
use crate::models::{
    ApproveAllResult, BulkResolvePayload, BulkResolveResult, ClassificationResult, Client,
    ClientCreate, ClientListParams, ClientListResponse, ClientUpdate, CmaRows, DashboardStats,
    EntityType, ExtractionResult, GeneratedFile, GenerationResult, PipelineAck, PipelineProgress,
    Project, ProjectCreate, ProjectListParams, ProjectListResponse, ProjectUpdate, ReviewItem,
    ReviewListParams, ReviewListResponse, ReviewResolvePayload, UploadedFile, UserProfile,
};
use crate::pipeline::{spawn_periodic_refresh, spawn_progress_poller, PollEvent, PollerHandle};
use crate::query_cache::{QueryCache, QueryKey};

/// Refusal when processing is requested before any document was uploaded.
pub const NO_FILES_MESSAGE: &str = "Please upload standard CMA documents first";

pub struct DashboardService {
    api: Arc<ApiClient>,
    cache: Arc<QueryCache>,
}

impl DashboardService {
    pub fn new(api: Arc<ApiClient>, cache: Arc<QueryCache>) -> Self {
        Self { api, cache }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    async fn invalidate(&self, keys: &[QueryKey]) {
        for key in keys {
            self.cache.invalidate(key).await;
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════

    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        self.cache.fetch(&QueryKey::me(), || auth::me(&self.api)).await
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.cache
            .fetch(&QueryKey::dashboard(), || dashboard::stats(&self.api))
            .await
    }

    pub async fn clients(&self, params: &ClientListParams) -> Result<ClientListResponse, ApiError> {
        let key = QueryKey::clients().with_params(params);
        self.cache
            .fetch(&key, || clients::list(&self.api, params))
            .await
    }

    pub async fn client(&self, id: &str) -> Result<Client, ApiError> {
        self.cache
            .fetch(&QueryKey::client(id), || clients::get(&self.api, id))
            .await
    }

    pub async fn projects(&self, params: &ProjectListParams) -> Result<ProjectListResponse, ApiError> {
        let key = QueryKey::projects().with_params(params);
        self.cache
            .fetch(&key, || projects::list(&self.api, params))
            .await
    }

    pub async fn project(&self, id: &str) -> Result<Project, ApiError> {
        self.cache
            .fetch(&QueryKey::project(id), || projects::get(&self.api, id))
            .await
    }

    pub async fn progress(&self, project_id: &str) -> Result<PipelineProgress, ApiError> {
        self.cache
            .fetch(&QueryKey::pipeline_progress(project_id), || {
                pipeline::progress(&self.api, project_id)
            })
            .await
    }

    pub async fn project_files(&self, project_id: &str) -> Result<Vec<UploadedFile>, ApiError> {
        self.cache
            .fetch(&QueryKey::project_files(project_id), || {
                files::list(&self.api, project_id)
            })
            .await
    }

    pub async fn generated_files(&self, project_id: &str) -> Result<Vec<GeneratedFile>, ApiError> {
        self.cache
            .fetch(&QueryKey::generated_files(project_id), || {
                files::generated(&self.api, project_id)
            })
            .await
    }

    pub async fn review_queue(&self, params: &ReviewListParams) -> Result<ReviewListResponse, ApiError> {
        let key = QueryKey::review_queue().with_params(params);
        self.cache
            .fetch(&key, || review::list(&self.api, params))
            .await
    }

    pub async fn cma_rows(&self, entity_type: Option<EntityType>) -> Result<CmaRows, ApiError> {
        let key = QueryKey::cma_rows().with_params(&entity_type);
        self.cache
            .fetch(&key, || review::cma_rows(&self.api, entity_type))
            .await
    }

    // ═══════════════════════════════════════════════════════════
    // Clients & projects
    // ═══════════════════════════════════════════════════════════

    pub async fn create_client(&self, data: &ClientCreate) -> Result<Client, ApiError> {
        let client = clients::create(&self.api, data).await?;
        tracing::info!(client_id = %client.id, "Client created");
        self.invalidate(&[QueryKey::clients(), QueryKey::dashboard()]).await;
        Ok(client)
    }

    pub async fn update_client(&self, id: &str, data: &ClientUpdate) -> Result<Client, ApiError> {
        let client = clients::update(&self.api, id, data).await?;
        self.invalidate(&[QueryKey::clients()]).await;
        Ok(client)
    }

    pub async fn delete_client(&self, id: &str) -> Result<(), ApiError> {
        clients::delete(&self.api, id).await?;
        tracing::info!(client_id = %id, "Client deleted");
        self.invalidate(&[QueryKey::clients(), QueryKey::dashboard()]).await;
        Ok(())
    }

    pub async fn create_project(&self, data: &ProjectCreate) -> Result<Project, ApiError> {
        let project = projects::create(&self.api, data).await?;
        tracing::info!(project_id = %project.id, "Project created");
        self.invalidate(&[QueryKey::projects(), QueryKey::dashboard()]).await;
        Ok(project)
    }

    pub async fn update_project(&self, id: &str, data: &ProjectUpdate) -> Result<Project, ApiError> {
        let project = projects::update(&self.api, id, data).await?;
        self.invalidate(&[QueryKey::projects()]).await;
        Ok(project)
    }

    pub async fn delete_project(&self, id: &str) -> Result<(), ApiError> {
        projects::delete(&self.api, id).await?;
        tracing::info!(project_id = %id, "Project deleted");
        self.invalidate(&[QueryKey::projects(), QueryKey::dashboard()]).await;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Pipeline
    // ═══════════════════════════════════════════════════════════

    async fn after_pipeline_command(&self, project_id: &str) {
        self.invalidate(&[
            QueryKey::pipeline_progress(project_id),
            QueryKey::project(project_id),
            QueryKey::projects(),
        ])
        .await;
    }

    /// Start processing. Refused locally when the project has no files.
    pub async fn start_pipeline(&self, project_id: &str) -> Result<PipelineAck, ApiError> {
        if self.project_files(project_id).await?.is_empty() {
            return Err(ApiError::Rejected(NO_FILES_MESSAGE.to_string()));
        }
        let ack = pipeline::process(&self.api, project_id).await?;
        tracing::info!(project_id = %project_id, status = %ack.status, "Pipeline started");
        self.after_pipeline_command(project_id).await;
        Ok(ack)
    }

    pub async fn retry_pipeline(&self, project_id: &str) -> Result<PipelineAck, ApiError> {
        let ack = pipeline::retry(&self.api, project_id).await?;
        tracing::info!(project_id = %project_id, status = %ack.status, "Pipeline retrying");
        self.after_pipeline_command(project_id).await;
        Ok(ack)
    }

    pub async fn resume_pipeline(&self, project_id: &str) -> Result<PipelineAck, ApiError> {
        let ack = pipeline::resume(&self.api, project_id).await?;
        tracing::info!(project_id = %project_id, status = %ack.status, "Pipeline resumed");
        self.after_pipeline_command(project_id).await;
        Ok(ack)
    }

    pub async fn run_extraction(&self, project_id: &str) -> Result<ExtractionResult, ApiError> {
        let result = pipeline::extract(&self.api, project_id).await?;
        self.after_pipeline_command(project_id).await;
        Ok(result)
    }

    pub async fn run_classification(&self, project_id: &str) -> Result<ClassificationResult, ApiError> {
        let result = pipeline::classify(&self.api, project_id).await?;
        self.after_pipeline_command(project_id).await;
        Ok(result)
    }

    pub async fn run_generation(&self, project_id: &str) -> Result<GenerationResult, ApiError> {
        let result = pipeline::generate(&self.api, project_id).await?;
        self.after_pipeline_command(project_id).await;
        self.invalidate(&[QueryKey::generated_files(project_id)]).await;
        Ok(result)
    }

    /// Poll progress for `project_id` in the background. Parked pollers wake
    /// up when a pipeline command invalidates the project's progress.
    pub fn watch_progress<C>(&self, project_id: &str, on_event: C) -> PollerHandle
    where
        C: FnMut(PollEvent) + Send + 'static,
    {
        let api = self.api.clone();
        let id = project_id.to_string();
        spawn_progress_poller(
            self.cache.clone(),
            project_id,
            PROGRESS_POLL_INTERVAL,
            move || {
                let (api, id) = (api.clone(), id.clone());
                async move { pipeline::progress(&api, &id).await }
            },
            on_event,
        )
    }

    /// Refresh dashboard stats every `DASHBOARD_REFRESH_INTERVAL`.
    pub fn auto_refresh_dashboard<C>(&self, on_update: C) -> PollerHandle
    where
        C: FnMut(Result<DashboardStats, ApiError>) + Send + 'static,
    {
        let api = self.api.clone();
        spawn_periodic_refresh(
            self.cache.clone(),
            QueryKey::dashboard(),
            DASHBOARD_REFRESH_INTERVAL,
            move || {
                let api = api.clone();
                async move { dashboard::stats(&api).await }
            },
            on_update,
        )
    }

    // ═══════════════════════════════════════════════════════════
    // Files
    // ═══════════════════════════════════════════════════════════

    pub async fn upload_files<P: AsRef<Path>>(
        &self,
        project_id: &str,
        paths: &[P],
    ) -> Result<Vec<UploadedFile>, ApiError> {
        let uploaded = files::upload(&self.api, project_id, paths).await?;
        tracing::info!(project_id = %project_id, count = uploaded.len(), "Files uploaded");
        self.invalidate(&[
            QueryKey::project_files(project_id),
            QueryKey::project(project_id),
        ])
        .await;
        Ok(uploaded)
    }

    pub async fn delete_file(&self, project_id: &str, file_id: &str) -> Result<(), ApiError> {
        files::delete(&self.api, file_id).await?;
        self.invalidate(&[QueryKey::project_files(project_id)]).await;
        Ok(())
    }

    /// Save the latest workbook into `dir` under its generated file name.
    pub async fn download_workbook(&self, project_id: &str, dir: &Path) -> Result<std::path::PathBuf, ApiError> {
        let generated = self.generated_files(project_id).await?;
        let dest = dir.join(crate::models::download_filename(&generated));
        files::download_to(&self.api, project_id, &dest).await?;
        Ok(dest)
    }

    // ═══════════════════════════════════════════════════════════
    // Review
    // ═══════════════════════════════════════════════════════════

    pub async fn resolve_review(
        &self,
        review_id: &str,
        payload: &ReviewResolvePayload,
    ) -> Result<ReviewItem, ApiError> {
        let item = review::resolve(&self.api, review_id, payload).await?;
        self.invalidate(&[QueryKey::review_queue(), QueryKey::dashboard()]).await;
        Ok(item)
    }

    pub async fn bulk_resolve_reviews(
        &self,
        payload: &BulkResolvePayload,
    ) -> Result<BulkResolveResult, ApiError> {
        let result = review::bulk_resolve(&self.api, payload).await?;
        tracing::info!(resolved = result.resolved_count, "Review items resolved");
        self.invalidate(&[QueryKey::review_queue(), QueryKey::dashboard()]).await;
        Ok(result)
    }

    pub async fn approve_all_reviews(&self) -> Result<ApproveAllResult, ApiError> {
        let result = review::approve_all(&self.api).await?;
        tracing::info!(approved = result.approved_count, "All pending reviews approved");
        self.invalidate(&[QueryKey::review_queue(), QueryKey::dashboard()]).await;
        Ok(result)
    }
}
