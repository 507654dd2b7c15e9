//! OpenForms submission client for integration and end-to-end tests
//!
//! Creates and completes form submissions through the OpenForms API, the way
//! the form UI would:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  OpenFormsClient                                             │
//! │    ├── GET  {base}/{form}                   (anonymous only) │
//! │    ├── GET  /forms/{form}                   → uuid, steps    │
//! │    ├── POST /submissions                    → submission id  │
//! │    ├── per step (caller order, matched by slug)              │
//! │    │     ├── GET  /submissions/{id}/steps/{step}             │
//! │    │     ├── POST /submissions/{id}/steps/{step}/validate    │
//! │    │     └── PUT  /submissions/{id}/steps/{step}             │
//! │    ├── GET  /submissions/{id}/summary                        │
//! │    ├── POST /submissions/{id}/_complete     → statusUrl      │
//! │    ├── GET  {statusUrl} until done/success                   │
//! │    └── DELETE /authentication/{id}/session  (optional)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutating call carries the CSRF token returned by the previous
//! response.

pub mod client;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod plan;
pub mod poll;

pub use client::{CompletedStep, OpenFormsClient, SubmissionOutcome};
pub use config::OpenFormsConfig;
pub use context::{SessionCookies, SubmissionContext};
pub use data::{FormStep, FormStepData};
pub use error::{OpenFormsError, OpenFormsResult};
pub use plan::SubmissionPlan;
pub use poll::{Clock, ManualClock, TokioClock};
