//! Shared plumbing for the install and uninstall workflows.
use crate::http::HttpTransport;
use crate::process::CommandRunner;
use crate::retry::Sleeper;
use crate::ui::Ui;

/// External collaborators a workflow drives. Borrowed for one run.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub runner: &'a dyn CommandRunner,
    pub http: &'a dyn HttpTransport,
    pub ui: &'a dyn Ui,
    pub sleeper: &'a dyn Sleeper,
}

/// How a workflow ended when it did not fail.
///
/// Both variants exit with status 0; only errors map to a failing status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The user declined at a confirmation point, or chose to stop.
    Declined { reason: String },
}

impl Outcome {
    pub fn declined(reason: impl Into<String>) -> Self {
        Outcome::Declined {
            reason: reason.into(),
        }
    }
}

/// Result of a step that may end the workflow early without an error.
#[derive(Debug)]
pub enum Step<T> {
    Continue(T),
    Stop(Outcome),
}
