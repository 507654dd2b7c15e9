//! Submission workflow driver
//!
//! Walks the OpenForms API in the order the form UI does: load the form,
//! open a submission, validate and save each step, complete the submission
//! and wait for the backend to finish processing it.

use std::sync::Arc;
use std::time::Instant;

use reqwest::header::{ACCEPT, COOKIE, REFERER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::OpenFormsConfig;
use crate::context::{SessionCookies, SubmissionContext};
use crate::data::{compile_form_steps, verify_step_count, FormDetails, FormStep, FormStepData};
use crate::error::{OpenFormsError, OpenFormsResult};
use crate::poll::{poll_until, Clock, PollSettings, PollState, SubmissionStatus, TokioClock};

const MAX_ERROR_BODY_CHARS: usize = 512;

/// A step the server accepted as completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedStep {
    pub uuid: String,
    pub slug: String,
}

/// Result of a workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub form_name: String,
    pub form_uuid: String,
    pub submission_id: String,
    pub status_url: String,
    pub steps: Vec<CompletedStep>,
    pub poll_attempts: u32,
    pub session_deleted: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Deserialize)]
struct SubmissionCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StepSaved {
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    completed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionStarted {
    status_url: String,
}

/// Client that creates submissions for a single form.
///
/// The client holds no per-run state: every call to
/// [`start_anonymous_submission`](Self::start_anonymous_submission) or
/// [`start_submission`](Self::start_submission) threads its own
/// [`SubmissionContext`], so runs may proceed concurrently.
pub struct OpenFormsClient {
    form_name: String,
    config: OpenFormsConfig,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl OpenFormsClient {
    /// Create a client for `form_name` using an explicit configuration
    pub fn new(form_name: impl Into<String>, config: OpenFormsConfig) -> OpenFormsResult<Self> {
        Self::with_clock(form_name, config, Arc::new(TokioClock::new()))
    }

    /// Create a client using [`OpenFormsConfig::load`]
    pub fn from_default_config(form_name: impl Into<String>) -> OpenFormsResult<Self> {
        Self::new(form_name, OpenFormsConfig::load()?)
    }

    /// Create a client whose status polling runs on `clock`
    pub fn with_clock(
        form_name: impl Into<String>,
        config: OpenFormsConfig,
        clock: Arc<dyn Clock>,
    ) -> OpenFormsResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            form_name: form_name.into(),
            config,
            http,
            clock,
        })
    }

    pub fn form_name(&self) -> &str {
        &self.form_name
    }

    pub fn config(&self) -> &OpenFormsConfig {
        &self.config
    }

    /// Create and complete a submission without prior authentication.
    ///
    /// Loads the form page first to obtain the CSRF and session cookies.
    /// With `strict`, fails before any step is submitted when `steps` does
    /// not cover exactly as many steps as the form declares.
    pub async fn start_anonymous_submission(
        &self,
        steps: &[FormStepData],
        strict: bool,
    ) -> OpenFormsResult<SubmissionOutcome> {
        info!("Initializing anonymous submission of form '{}'", self.form_name);

        let cookies = self.open_form_page().await?;
        self.run_workflow(cookies, steps, strict).await
    }

    /// Create and complete a submission for a user who is already logged in.
    ///
    /// `cookies` must hold the CSRF and session cookies of that login.
    pub async fn start_submission(
        &self,
        cookies: SessionCookies,
        steps: &[FormStepData],
        strict: bool,
    ) -> OpenFormsResult<SubmissionOutcome> {
        info!("Initializing submission of form '{}'", self.form_name);

        self.run_workflow(cookies, steps, strict).await
    }

    async fn run_workflow(
        &self,
        cookies: SessionCookies,
        steps: &[FormStepData],
        strict: bool,
    ) -> OpenFormsResult<SubmissionOutcome> {
        let start = Instant::now();
        let ctx = SubmissionContext::new(&self.form_name, cookies);

        let (ctx, details) = self.fetch_form_details(&ctx).await?;

        if strict {
            verify_step_count(&details, steps)?;
        }
        // Resolve every slug before the server sees a submission for it
        let form_steps = compile_form_steps(&details, steps)?;

        let mut ctx = self.open_submission(&ctx).await?;

        info!("Submitting {} form step(s)...", form_steps.len());
        let mut completed = Vec::with_capacity(form_steps.len());
        for step in &form_steps {
            ctx = self.submit_step(&ctx, step).await?;
            completed.push(CompletedStep {
                uuid: step.uuid().to_string(),
                slug: step.name().to_string(),
            });
        }

        let (ctx, status_url) = self.finalize(&ctx).await?;
        let poll_attempts = self.wait_for_completion(&ctx, &status_url).await?;

        if self.config.delete_session {
            self.delete_session(&ctx).await?;
        }

        let outcome = SubmissionOutcome {
            form_name: self.form_name.clone(),
            form_uuid: ctx.require_form_uuid()?.to_string(),
            submission_id: ctx.require_submission_id()?.to_string(),
            status_url,
            steps: completed,
            poll_attempts,
            session_deleted: self.config.delete_session,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Completed submission {} of form '{}' ({} ms)",
            outcome.submission_id, self.form_name, outcome.duration_ms
        );
        Ok(outcome)
    }

    /// Load the form page the way a browser does and collect its cookies
    async fn open_form_page(&self) -> OpenFormsResult<SessionCookies> {
        let form_url = self.config.form_url(&self.form_name);
        debug!("GET {}", form_url);

        let response = self
            .http
            .get(&form_url)
            .header(REFERER, &form_url)
            .send()
            .await?;
        let response = expect_status("Load form page", response, &[StatusCode::OK]).await?;

        let pairs: Vec<(String, String)> = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();

        SessionCookies::from_pairs(&self.config, pairs)
    }

    async fn fetch_form_details(
        &self,
        ctx: &SubmissionContext,
    ) -> OpenFormsResult<(SubmissionContext, FormDetails)> {
        let form_url = self.config.form_url(ctx.form_name());
        info!("Retrieving form details for form '{}'", form_url);

        let url = self.config.api_url(&format!("/forms/{}", ctx.form_name()));
        let response = self
            .request(ctx, Method::GET, &url, &form_url)
            .send()
            .await?;
        let response = expect_status("Form details", response, &[StatusCode::OK]).await?;

        let ctx = self.rotate_token(ctx, &response);
        let details: FormDetails = response.json().await?;
        debug!(
            "Form '{}' has uuid {} and {} step(s)",
            ctx.form_name(),
            details.uuid,
            details.steps.len()
        );

        Ok((ctx.with_form(details.uuid.as_str()), details))
    }

    async fn open_submission(&self, ctx: &SubmissionContext) -> OpenFormsResult<SubmissionContext> {
        let form_url = self.config.form_url(ctx.form_name());
        info!("Start submission of form '{}'", form_url);

        let body = json!({
            "form": self.config.form_endpoint(ctx.require_form_uuid()?),
            "formUrl": form_url,
        });

        let url = self.config.api_url("/submissions");
        let response = self
            .mutating_request(ctx, Method::POST, &url, &form_url)
            .json(&body)
            .send()
            .await?;
        let response = expect_status("Start submission", response, &[StatusCode::CREATED]).await?;

        let ctx = self.rotate_token(ctx, &response);
        let created: SubmissionCreated = response.json().await?;
        debug!("Opened submission {}", created.id);

        Ok(ctx.with_submission(created.id))
    }

    async fn submit_step(
        &self,
        ctx: &SubmissionContext,
        step: &FormStep,
    ) -> OpenFormsResult<SubmissionContext> {
        let referer = self.config.step_page_url(ctx.form_name(), step.name());
        let endpoint = self.config.api_url(&format!(
            "/submissions/{}/steps/{}",
            ctx.require_submission_id()?,
            step.uuid()
        ));
        debug!("Submitting step '{}' ({})", step.name(), step.uuid());

        let response = self
            .request(ctx, Method::GET, &endpoint, &referer)
            .send()
            .await?;
        let response = expect_status("Fetch step", response, &[StatusCode::OK]).await?;
        let ctx = self.rotate_token(ctx, &response);

        let response = self
            .mutating_request(&ctx, Method::POST, &format!("{}/validate", endpoint), &referer)
            .json(step.data())
            .send()
            .await?;
        let response = expect_status("Validate step", response, &[StatusCode::NO_CONTENT]).await?;
        let ctx = self.rotate_token(&ctx, &response);

        let response = self
            .mutating_request(&ctx, Method::PUT, &endpoint, &referer)
            .json(step.data())
            .send()
            .await?;
        let response = expect_status("Save step", response, &[StatusCode::CREATED]).await?;
        let ctx = self.rotate_token(&ctx, &response);

        let saved: StepSaved = response.json().await?;
        if saved.slug.as_deref() != Some(step.name()) {
            return Err(OpenFormsError::StepNotCompleted {
                slug: step.name().to_string(),
                reason: format!("server answered for step {:?}", saved.slug),
            });
        }
        if !saved.completed {
            return Err(OpenFormsError::StepNotCompleted {
                slug: step.name().to_string(),
                reason: "server did not mark the step as completed".to_string(),
            });
        }

        Ok(ctx)
    }

    /// Accept the required statements and return the status URL to poll
    async fn finalize(&self, ctx: &SubmissionContext) -> OpenFormsResult<(SubmissionContext, String)> {
        info!("Finalizing submission of form '{}'", ctx.form_name());

        let referer = self.config.overview_page_url(ctx.form_name());
        let submission_id = ctx.require_submission_id()?;

        let url = self.config.api_url(&format!("/submissions/{}/summary", submission_id));
        let response = self.request(ctx, Method::GET, &url, &referer).send().await?;
        let response = expect_status("Submission summary", response, &[StatusCode::OK]).await?;
        let ctx = self.rotate_token(ctx, &response);

        let mut statements = Map::new();
        statements.insert("privacyPolicyAccepted".to_string(), Value::Bool(true));
        if self.config.accept_statement_of_truth {
            statements.insert("statementOfTruthAccepted".to_string(), Value::Bool(true));
        }

        let url = self.config.api_url(&format!("/submissions/{}/_complete", submission_id));
        let response = self
            .mutating_request(&ctx, Method::POST, &url, &referer)
            .json(&statements)
            .send()
            .await?;
        let response = expect_status("Complete submission", response, &[StatusCode::OK]).await?;
        let ctx = self.rotate_token(&ctx, &response);

        let started: CompletionStarted = response.json().await?;
        Ok((ctx, self.config.resolve_url(&started.status_url)))
    }

    async fn wait_for_completion(
        &self,
        ctx: &SubmissionContext,
        status_url: &str,
    ) -> OpenFormsResult<u32> {
        info!("Waiting until submission has status 'done'...");

        let settings = PollSettings::from_config(&self.config);
        let attempts = poll_until(self.clock.as_ref(), settings, move || {
            self.check_status(ctx, status_url)
        })
        .await?;

        debug!("Submission processed after {} status check(s)", attempts);
        Ok(attempts)
    }

    async fn check_status(
        &self,
        ctx: &SubmissionContext,
        status_url: &str,
    ) -> OpenFormsResult<PollState> {
        let referer = self.config.overview_page_url(ctx.form_name());
        let response = self
            .request(ctx, Method::GET, status_url, &referer)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            warn!("Status check returned {}", response.status());
            return Ok(PollState::Pending(format!("HTTP {}", response.status())));
        }

        match response.json::<SubmissionStatus>().await {
            Ok(status) => Ok(status.poll_state()),
            Err(e) => {
                warn!("Unreadable status document: {}", e);
                Ok(PollState::Pending("unreadable status document".to_string()))
            }
        }
    }

    async fn delete_session(&self, ctx: &SubmissionContext) -> OpenFormsResult<()> {
        let submission_id = ctx.require_submission_id()?;
        info!("Deleting session for submission with ID {}...", submission_id);

        let referer = self.config.overview_page_url(ctx.form_name());
        let url = self
            .config
            .api_url(&format!("/authentication/{}/session", submission_id));
        let response = self
            .mutating_request(ctx, Method::DELETE, &url, &referer)
            .send()
            .await?;
        let response = expect_status(
            "Delete session",
            response,
            &[StatusCode::NO_CONTENT, StatusCode::FORBIDDEN],
        )
        .await?;

        if response.status() == StatusCode::FORBIDDEN {
            debug!("No authentication session left for submission {}", submission_id);
        }
        info!("Deleted session for submission with ID {}", submission_id);
        Ok(())
    }

    fn request(
        &self,
        ctx: &SubmissionContext,
        method: Method,
        url: &str,
        referer: &str,
    ) -> RequestBuilder {
        debug!("{} {}", method, url);
        self.http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header(COOKIE, ctx.cookies().header_value(&self.config))
            .header(REFERER, referer)
    }

    /// Request carrying the most recently issued CSRF token
    fn mutating_request(
        &self,
        ctx: &SubmissionContext,
        method: Method,
        url: &str,
        referer: &str,
    ) -> RequestBuilder {
        let builder = self.request(ctx, method, url, referer);
        match ctx.csrf_token() {
            Some(token) => builder.header(self.config.csrf_header_name.as_str(), token),
            None => {
                warn!("No CSRF token received yet for {}", url);
                builder
            }
        }
    }

    fn rotate_token(&self, ctx: &SubmissionContext, response: &Response) -> SubmissionContext {
        let token = response
            .headers()
            .get(self.config.csrf_header_name.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if token.is_none() {
            debug!("Response carried no {} header", self.config.csrf_header_name);
        }
        ctx.with_csrf_token(token)
    }
}

async fn expect_status(
    operation: &str,
    response: Response,
    expected: &[StatusCode],
) -> OpenFormsResult<Response> {
    let status = response.status();
    if expected.contains(&status) {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(OpenFormsError::UnexpectedStatus {
        operation: operation.to_string(),
        expected: expected
            .iter()
            .map(|s| s.as_u16().to_string())
            .collect::<Vec<_>>()
            .join(" or "),
        actual: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}
