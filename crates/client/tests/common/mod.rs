//! Fake OpenForms server for workflow tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use openforms_client::{FormStepData, ManualClock, OpenFormsClient, OpenFormsConfig};

pub const FORM: &str = "contact";
pub const FORM_UUID: &str = "f-1";
pub const SUBMISSION: &str = "sub-1";
pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const CREATED_TOKEN: &str = "created-token";
pub const SUMMARY_TOKEN: &str = "summary-token";
pub const COMPLETED_TOKEN: &str = "completed-token";

/// Steps declared by the contact form, in server order
pub const CONTACT_STEPS: &[(&str, &str)] = &[("a1", "intro"), ("b2", "details")];

pub fn config(server: &MockServer) -> OpenFormsConfig {
    OpenFormsConfig::default()
        .with_base_uri(server.uri())
        .with_polling(Duration::from_secs(2), Duration::from_secs(120))
}

pub fn client(config: OpenFormsConfig, clock: Arc<ManualClock>) -> OpenFormsClient {
    OpenFormsClient::with_clock(FORM, config, clock).expect("valid test config")
}

pub fn step_data(slug: &str) -> FormStepData {
    FormStepData::from_json(slug, json!({ "answer": format!("{} answer", slug) }))
        .expect("object data")
}

pub fn status_url(server: &MockServer) -> String {
    format!("{}/api/v2/submissions/{}/status", server.uri(), SUBMISSION)
}

fn with_token(template: ResponseTemplate, token: &str) -> ResponseTemplate {
    template.insert_header(CSRF_HEADER, token)
}

pub async fn mount_form_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/{}", FORM)))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Set-Cookie", "csrftoken=cookie-secret; Path=/")
                .append_header("Set-Cookie", "openforms_sessionid=session-1; Path=/; HttpOnly")
                .set_body_string("<html></html>"),
        )
        .mount(server)
        .await;
}

/// Form details, only answered for requests carrying `session`
pub async fn mount_form_details(server: &MockServer, session: &str, steps: &[(&str, &str)]) {
    let steps: Vec<Value> = steps
        .iter()
        .enumerate()
        .map(|(index, (uuid, slug))| json!({ "uuid": uuid, "slug": slug, "index": index }))
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/api/v2/forms/{}", FORM)))
        .and(header_regex("cookie", &format!("openforms_sessionid={}", session)))
        .respond_with(with_token(
            ResponseTemplate::new(200).set_body_json(json!({
                "uuid": FORM_UUID,
                "name": "Contact",
                "steps": steps,
            })),
            "details-token",
        ))
        .mount(server)
        .await;
}

pub async fn mount_start_submission(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/submissions"))
        .and(header(CSRF_HEADER, "details-token"))
        .respond_with(with_token(
            ResponseTemplate::new(201).set_body_json(json!({ "id": SUBMISSION })),
            CREATED_TOKEN,
        ))
        .mount(server)
        .await;
}

/// How the mock for one form step behaves
pub struct StepMock<'a> {
    pub uuid: &'a str,
    pub slug: &'a str,
    /// Token issued when the step is fetched; `None` sends no token header
    pub fetch_token: Option<&'a str>,
    /// Token the validate call must carry
    pub validate_expects: &'a str,
    pub validate_status: u16,
    pub completed: bool,
}

impl<'a> StepMock<'a> {
    pub fn rotating(uuid: &'a str, slug: &'a str) -> Self {
        Self {
            uuid,
            slug,
            fetch_token: Some(uuid),
            validate_expects: uuid,
            validate_status: 204,
            completed: true,
        }
    }
}

pub fn validated_token(uuid: &str) -> String {
    format!("{}-validated", uuid)
}

pub fn saved_token(uuid: &str) -> String {
    format!("{}-saved", uuid)
}

pub async fn mount_step(server: &MockServer, step: StepMock<'_>) {
    let endpoint = format!("/api/v2/submissions/{}/steps/{}", SUBMISSION, step.uuid);

    let fetched = ResponseTemplate::new(200).set_body_json(json!({ "id": step.uuid, "slug": step.slug }));
    let fetched = match step.fetch_token {
        Some(token) => with_token(fetched, token),
        None => fetched,
    };
    Mock::given(method("GET"))
        .and(path(endpoint.clone()))
        .respond_with(fetched)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("{}/validate", endpoint)))
        .and(header(CSRF_HEADER, step.validate_expects))
        .respond_with(with_token(
            ResponseTemplate::new(step.validate_status),
            &validated_token(step.uuid),
        ))
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(endpoint))
        .and(header(CSRF_HEADER, validated_token(step.uuid).as_str()))
        .respond_with(with_token(
            ResponseTemplate::new(201).set_body_json(json!({
                "slug": step.slug,
                "completed": step.completed,
            })),
            &saved_token(step.uuid),
        ))
        .mount(server)
        .await;
}

pub async fn mount_finalize(server: &MockServer) {
    mount_finalize_reporting(server, &status_url(server)).await;
}

/// Summary and `_complete`, the latter answering with `status_url` as given
pub async fn mount_finalize_reporting(server: &MockServer, status_url: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v2/submissions/{}/summary", SUBMISSION)))
        .respond_with(with_token(ResponseTemplate::new(200).set_body_json(json!([])), SUMMARY_TOKEN))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/api/v2/submissions/{}/_complete", SUBMISSION)))
        .and(header(CSRF_HEADER, SUMMARY_TOKEN))
        .respond_with(with_token(
            ResponseTemplate::new(200).set_body_json(json!({ "statusUrl": status_url })),
            COMPLETED_TOKEN,
        ))
        .mount(server)
        .await;
}

/// Status endpoint that reports `pending` in-progress answers before `done`
pub async fn mount_status(server: &MockServer, pending: u64) {
    let status_path = format!("/api/v2/submissions/{}/status", SUBMISSION);

    if pending > 0 {
        Mock::given(method("GET"))
            .and(path(status_path.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "in_progress",
                "result": "",
                "errorMessage": "",
            })))
            .up_to_n_times(pending)
            .with_priority(1)
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path(status_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "done",
            "result": "success",
            "errorMessage": "",
            "publicReference": "OF-12345",
        })))
        .mount(server)
        .await;
}

/// Status endpoint that never finishes
pub async fn mount_stuck_status(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v2/submissions/{}/status", SUBMISSION)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "in_progress",
            "result": "",
            "errorMessage": "",
        })))
        .mount(server)
        .await;
}

pub async fn mount_delete_session(server: &MockServer, status: u16) {
    Mock::given(method("DELETE"))
        .and(path(format!("/api/v2/authentication/{}/session", SUBMISSION)))
        .and(header(CSRF_HEADER, COMPLETED_TOKEN))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Everything but the steps of the contact form
pub async fn mount_contact_form(server: &MockServer) {
    mount_form_page(server).await;
    mount_form_details(server, "session-1", CONTACT_STEPS).await;
    mount_start_submission(server).await;
    mount_finalize(server).await;
    mount_delete_session(server, 204).await;
}

/// The contact form with both steps answering normally
pub async fn mount_happy_path(server: &MockServer, pending_polls: u64) {
    mount_contact_form(server).await;
    for (uuid, slug) in CONTACT_STEPS {
        mount_step(server, StepMock::rotating(uuid, slug)).await;
    }
    mount_status(server, pending_polls).await;
}

pub async fn requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
}

/// `METHOD path` of every request received, in order
pub async fn request_log(server: &MockServer) -> Vec<String> {
    requests(server)
        .await
        .iter()
        .map(|r| format!("{} {}", r.method.as_str(), r.url.path()))
        .collect()
}

pub async fn count_requests(server: &MockServer, verb: &str, path_suffix: &str) -> usize {
    request_log(server)
        .await
        .iter()
        .filter(|line| line.starts_with(verb) && line.ends_with(path_suffix))
        .count()
}
