//! Per-run workflow state
//!
//! A [`SubmissionContext`] is created at the start of a workflow run and
//! replaced after every response: each step returns a new context carrying the
//! CSRF token the server just issued. Nothing here is shared between runs.

use std::collections::BTreeMap;

use crate::config::OpenFormsConfig;
use crate::error::{OpenFormsError, OpenFormsResult};

/// Cookies sent along with every API call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    /// Value of the CSRF cookie
    pub csrf: String,

    /// Value of the session cookie
    pub session: String,

    /// Further cookies, e.g. from an identity provider login
    pub extra: BTreeMap<String, String>,
}

impl SessionCookies {
    pub fn new(csrf: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            csrf: csrf.into(),
            session: session.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Split a set of `name=value` cookies into CSRF, session and extra cookies
    pub fn from_pairs<I, K, V>(config: &OpenFormsConfig, pairs: I) -> OpenFormsResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut csrf = None;
        let mut session = None;
        let mut extra = BTreeMap::new();

        for (name, value) in pairs {
            let name = name.into();
            let value = value.into();
            if name == config.csrf_cookie_name {
                csrf = Some(value);
            } else if name == config.session_cookie_name {
                session = Some(value);
            } else {
                extra.insert(name, value);
            }
        }

        Ok(Self {
            csrf: csrf.ok_or_else(|| OpenFormsError::MissingCookie(config.csrf_cookie_name.clone()))?,
            session: session
                .ok_or_else(|| OpenFormsError::MissingCookie(config.session_cookie_name.clone()))?,
            extra,
        })
    }

    /// Value for a `Cookie` request header
    pub fn header_value(&self, config: &OpenFormsConfig) -> String {
        let mut parts = vec![
            format!("{}={}", config.csrf_cookie_name, self.csrf),
            format!("{}={}", config.session_cookie_name, self.session),
        ];
        parts.extend(self.extra.iter().map(|(k, v)| format!("{}={}", k, v)));
        parts.join("; ")
    }
}

/// State threaded through the steps of one workflow run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionContext {
    form_name: String,
    cookies: SessionCookies,
    csrf_token: Option<String>,
    form_uuid: Option<String>,
    submission_id: Option<String>,
}

impl SubmissionContext {
    pub fn new(form_name: impl Into<String>, cookies: SessionCookies) -> Self {
        Self {
            form_name: form_name.into(),
            cookies,
            csrf_token: None,
            form_uuid: None,
            submission_id: None,
        }
    }

    pub fn form_name(&self) -> &str {
        &self.form_name
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    /// The most recently issued CSRF token, if any response carried one yet
    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub fn form_uuid(&self) -> Option<&str> {
        self.form_uuid.as_deref()
    }

    pub fn submission_id(&self) -> Option<&str> {
        self.submission_id.as_deref()
    }

    pub fn require_form_uuid(&self) -> OpenFormsResult<&str> {
        self.form_uuid()
            .ok_or_else(|| OpenFormsError::InvalidResponse("form details have not been loaded".to_string()))
    }

    pub fn require_submission_id(&self) -> OpenFormsResult<&str> {
        self.submission_id()
            .ok_or_else(|| OpenFormsError::InvalidResponse("no submission has been started".to_string()))
    }

    /// Context after a response; a missing token keeps the previous one
    pub fn with_csrf_token(&self, token: Option<String>) -> Self {
        Self {
            csrf_token: token.or_else(|| self.csrf_token.clone()),
            ..self.clone()
        }
    }

    pub fn with_form(&self, form_uuid: impl Into<String>) -> Self {
        Self {
            form_uuid: Some(form_uuid.into()),
            ..self.clone()
        }
    }

    pub fn with_submission(&self, submission_id: impl Into<String>) -> Self {
        Self {
            submission_id: Some(submission_id.into()),
            ..self.clone()
        }
    }
}
