// Item executor: runs one image request end-to-end
//
// validate -> find-or-create job -> enrich prompt -> generate (retry)
// -> upload (retry) -> persist item -> count completion -> outcome

use crate::application::prompt::enrich_prompt;
use crate::application::retry::{RetryExhausted, RetryPolicy};
use crate::application::worker::constants::DEFAULT_FALLBACK_URL;
use crate::domain::{
    ImageItem, ItemRequest, ItemSpec, ItemStatus, Job, OutcomeKind, WorkerOutcome,
};
use crate::error::{AppError, Result};
use crate::port::{
    IdProvider, ImageGenerator, ImageStorage, ItemRepository, JobRepository, TimeProvider,
    UploadTarget,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Collaborators a worker needs; cloning hands each worker its own handles
#[derive(Clone)]
pub struct WorkerDeps {
    pub job_repo: Arc<dyn JobRepository>,
    pub item_repo: Arc<dyn ItemRepository>,
    pub generator: Arc<dyn ImageGenerator>,
    pub storage: Arc<dyn ImageStorage>,
    pub id_provider: Arc<dyn IdProvider>,
    pub time_provider: Arc<dyn TimeProvider>,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub retry: RetryPolicy,
    pub upload_target: UploadTarget,
    pub fallback_url: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            upload_target: UploadTarget::default(),
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
        }
    }
}

/// Image produced and stored
struct Rendered {
    url: String,
    attempts: u32,
}

pub struct ItemExecutor {
    deps: WorkerDeps,
    config: ExecutorConfig,
}

impl ItemExecutor {
    pub fn new(deps: WorkerDeps, config: ExecutorConfig) -> Self {
        Self { deps, config }
    }

    /// Execute one request; always yields exactly one terminal outcome
    pub async fn execute(&self, request: ItemRequest) -> WorkerOutcome {
        let spec = match request.validate() {
            Ok(spec) => spec,
            Err(e) => {
                let err = AppError::Validation(e.to_string());
                warn!(job_key = %request.job_key, error = %err, "Rejecting invalid request");
                return self.reject(&request, err);
            }
        };

        match self.process(&request, &spec).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    job_key = %request.job_key,
                    item_scope = %request.item_scope,
                    error = %err,
                    "Item execution failed"
                );
                self.reject(&request, err)
            }
        }
    }

    fn reject(&self, request: &ItemRequest, err: AppError) -> WorkerOutcome {
        WorkerOutcome::rejected(
            request,
            err.to_string(),
            &self.config.fallback_url,
            self.deps.time_provider.now_millis(),
        )
    }

    async fn process(&self, request: &ItemRequest, spec: &ItemSpec) -> Result<WorkerOutcome> {
        let draft = Job::new(
            request.job_key.clone(),
            request.script_id.clone(),
            request.user_id.clone(),
            spec.total_items,
            self.deps.time_provider.now_millis(),
        );
        let job = self.deps.job_repo.find_or_create(&draft).await?;
        debug!(
            job_key = %job.job_key,
            status = %job.status,
            completed = job.completed_items,
            total = job.total_items,
            "Job resolved"
        );

        let prompt = enrich_prompt(&request.prompt, spec.style.as_str());

        match self.render(&prompt, spec).await {
            Ok(rendered) => self.finish_generated(request, spec, rendered).await,
            Err(exhausted) => self.finish_failed(request, spec, exhausted).await,
        }
    }

    /// Generation strictly precedes upload
    async fn render(
        &self,
        prompt: &str,
        spec: &ItemSpec,
    ) -> std::result::Result<Rendered, RetryExhausted> {
        let (width, height) = (spec.resolution.width, spec.resolution.height);
        let generator = &self.deps.generator;
        let storage = &self.deps.storage;
        let target = &self.config.upload_target;

        let image = self
            .config
            .retry
            .execute("generate", move |_| generator.generate(prompt, width, height))
            .await?;

        let bytes: &[u8] = &image.value;
        let uploaded = self
            .config
            .retry
            .execute("upload", move |_| storage.upload(bytes, target))
            .await?;

        Ok(Rendered {
            url: uploaded.value,
            attempts: image.attempts,
        })
    }

    fn build_item(
        &self,
        request: &ItemRequest,
        spec: &ItemSpec,
        url: String,
        status: ItemStatus,
        error: Option<String>,
        attempts: u32,
    ) -> ImageItem {
        let now = self.deps.time_provider.now_millis();
        ImageItem {
            id: self.deps.id_provider.generate_id(),
            job_key: request.job_key.clone(),
            script_id: request.script_id.clone(),
            item_scope: request.item_scope.clone(),
            prompt: request.prompt.clone(),
            style: spec.style,
            resolution: spec.resolution_raw.clone(),
            url,
            status,
            error,
            attempts,
            created_at: now,
            updated_at: now,
        }
    }

    async fn finish_generated(
        &self,
        request: &ItemRequest,
        spec: &ItemSpec,
        rendered: Rendered,
    ) -> Result<WorkerOutcome> {
        let item = self.build_item(
            request,
            spec,
            rendered.url,
            ItemStatus::Generated,
            None,
            rendered.attempts,
        );
        self.deps.item_repo.insert(&item).await?;

        let now = self.deps.time_provider.now_millis();
        let job = match self
            .deps
            .job_repo
            .record_completion(&item.job_key, &item.id, now)
            .await?
        {
            Some(job) => job,
            None => {
                // Job already full. A redelivery after a failed status write
                // still owes the completed transition, which is conditional.
                warn!(
                    job_key = %item.job_key,
                    item_id = %item.id,
                    "Job already has all items; completion not counted"
                );
                if self.deps.job_repo.mark_completed(&item.job_key, now).await? {
                    info!(job_key = %item.job_key, "Job completed on redelivery");
                    return Ok(WorkerOutcome::from_item(OutcomeKind::JobCompleted, &item));
                }
                return Ok(WorkerOutcome::from_item(OutcomeKind::ItemGenerated, &item));
            }
        };

        info!(
            job_key = %job.job_key,
            item_id = %item.id,
            completed = job.completed_items,
            total = job.total_items,
            "Item generated"
        );

        if job.is_saturated() && self.deps.job_repo.mark_completed(&job.job_key, now).await? {
            info!(job_key = %job.job_key, total = job.total_items, "Job completed");
            return Ok(WorkerOutcome::from_item(OutcomeKind::JobCompleted, &item));
        }

        Ok(WorkerOutcome::from_item(OutcomeKind::ItemGenerated, &item))
    }

    async fn finish_failed(
        &self,
        request: &ItemRequest,
        spec: &ItemSpec,
        exhausted: RetryExhausted,
    ) -> Result<WorkerOutcome> {
        let reason = AppError::Transient(exhausted.summary()).to_string();
        let item = self.build_item(
            request,
            spec,
            self.config.fallback_url.clone(),
            ItemStatus::Failed,
            Some(reason.clone()),
            exhausted.attempts,
        );
        self.deps.item_repo.insert(&item).await?;

        let now = self.deps.time_provider.now_millis();
        if self
            .deps
            .job_repo
            .mark_failed(&item.job_key, &reason, now)
            .await?
        {
            error!(job_key = %item.job_key, error = %reason, "Job failed with no generated items");
            return Ok(WorkerOutcome::from_item(OutcomeKind::JobFailed, &item));
        }

        warn!(
            job_key = %item.job_key,
            item_id = %item.id,
            error = %reason,
            "Item failed; job keeps its partial progress"
        );
        Ok(WorkerOutcome::from_item(OutcomeKind::Error, &item))
    }
}
