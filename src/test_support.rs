//! Scripted collaborators for workflow tests.
use crate::flow::Collaborators;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::process::{CommandOutput, CommandRunner, CommandSpec};
use crate::retry::Sleeper;
use crate::settings::{InstallContext, Os, Settings};
use crate::ui::{Tone, Ui, Validator};
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Answer {
    Confirm(bool),
    Text(String),
    Select(usize),
}

pub fn yes() -> Answer {
    Answer::Confirm(true)
}

pub fn no() -> Answer {
    Answer::Confirm(false)
}

pub fn text(value: &str) -> Answer {
    Answer::Text(value.to_string())
}

/// Answers prompts from a queue and records everything shown to the user.
#[derive(Default)]
pub struct ScriptedUi {
    answers: RefCell<VecDeque<Answer>>,
    prompts: RefCell<Vec<String>>,
    messages: RefCell<Vec<(Tone, String)>>,
}

impl ScriptedUi {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }

    pub fn saw(&self, needle: &str) -> bool {
        self.messages
            .borrow()
            .iter()
            .any(|(_, message)| message.contains(needle))
    }

    fn next(&self, prompt: &str) -> Result<Answer> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer for prompt: {prompt}"))
    }

    fn next_text(
        &self,
        prompt: &str,
        default: Option<&str>,
        validate: Validator<'_>,
    ) -> Result<String> {
        loop {
            let value = match self.next(prompt)? {
                Answer::Text(value) if value.is_empty() => default.unwrap_or_default().to_string(),
                Answer::Text(value) => value,
                other => return Err(anyhow!("expected text for {prompt}, got {other:?}")),
            };
            match validate(&value) {
                Ok(()) => return Ok(value),
                Err(reason) => self.say(Tone::Error, &reason),
            }
        }
    }
}

impl Ui for ScriptedUi {
    fn confirm(&self, message: &str, _default: bool) -> Result<bool> {
        match self.next(message)? {
            Answer::Confirm(value) => Ok(value),
            other => Err(anyhow!("expected confirmation for {message}, got {other:?}")),
        }
    }

    fn input(
        &self,
        message: &str,
        default: Option<&str>,
        validate: Validator<'_>,
    ) -> Result<String> {
        self.next_text(message, default, validate)
    }

    fn password(&self, message: &str, validate: Validator<'_>) -> Result<String> {
        self.next_text(message, None, validate)
    }

    fn select(&self, message: &str, choices: &[&str]) -> Result<usize> {
        match self.next(message)? {
            Answer::Select(index) if index < choices.len() => Ok(index),
            other => Err(anyhow!("expected selection for {message}, got {other:?}")),
        }
    }

    fn say(&self, tone: Tone, message: &str) {
        self.messages.borrow_mut().push((tone, message.to_string()));
    }
}

type Scripted<T> = RefCell<VecDeque<Result<T, String>>>;

/// Pops the next queued result; the last one repeats.
fn pop_sticky<T: Clone>(queue: &Scripted<T>) -> Result<T> {
    let mut queue = queue.borrow_mut();
    let next = if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    };
    match next {
        Some(Ok(value)) => Ok(value),
        Some(Err(message)) => Err(anyhow!(message)),
        None => Err(anyhow!("empty script")),
    }
}

/// Answers commands by command-line prefix; unmatched commands succeed with
/// empty output.
#[derive(Default)]
pub struct FakeRunner {
    rules: Vec<(String, Scripted<CommandOutput>)>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(self, prefix: &str, stdout: &str) -> Self {
        self.script(
            prefix,
            vec![Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
            })],
        )
    }

    pub fn fail(self, prefix: &str, message: &str) -> Self {
        self.script(prefix, vec![Err(message.to_string())])
    }

    pub fn script(mut self, prefix: &str, results: Vec<Result<CommandOutput, String>>) -> Self {
        self.rules
            .push((prefix.to_string(), RefCell::new(results.into_iter().collect())));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(CommandSpec::display).collect()
    }

    pub fn specs(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.calls().iter().any(|call| call.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(spec.clone());
        let line = spec.display();
        match self.rules.iter().find(|(prefix, _)| line.starts_with(prefix)) {
            Some((_, queue)) => pop_sticky(queue),
            None => Ok(CommandOutput::default()),
        }
    }
}

/// Routes requests by method and longest matching URL prefix; unmatched
/// requests fail.
#[derive(Default)]
pub struct FakeTransport {
    routes: Vec<(Method, String, Scripted<HttpResponse>)>,
    requests: RefCell<Vec<HttpRequest>>,
}

pub fn status(code: u16, body: &str) -> Result<HttpResponse, String> {
    Ok(HttpResponse {
        status: code,
        headers: Vec::new(),
        body: body.to_string(),
    })
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        method: Method,
        url_prefix: &str,
        responses: Vec<Result<HttpResponse, String>>,
    ) -> Self {
        self.routes.push((
            method,
            url_prefix.to_string(),
            RefCell::new(responses.into_iter().collect()),
        ));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn count(&self, method: Method, url_prefix: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|request| request.method == method && request.url.starts_with(url_prefix))
            .count()
    }
}

impl HttpTransport for FakeTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.borrow_mut().push(request.clone());
        let route = self
            .routes
            .iter()
            .filter(|(method, prefix, _)| {
                *method == request.method && request.url.starts_with(prefix)
            })
            .max_by_key(|(_, prefix, _)| prefix.len());
        match route {
            Some((_, _, queue)) => pop_sticky(queue),
            None => Err(anyhow!("connection refused: {}", request.url)),
        }
    }
}

#[derive(Default)]
pub struct NoSleep {
    slept: RefCell<Vec<Duration>>,
}

impl NoSleep {
    pub fn count(&self) -> usize {
        self.slept.borrow().len()
    }

    pub fn total(&self) -> Duration {
        self.slept.borrow().iter().sum()
    }
}

impl Sleeper for NoSleep {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}

pub fn context_in(home: &Path, os: Os) -> InstallContext {
    InstallContext::new(
        home.to_path_buf(),
        home.join(".config"),
        os,
        Settings::default(),
    )
}

/// Owns one set of fakes for a whole-workflow test.
pub struct Harness {
    pub runner: FakeRunner,
    pub http: FakeTransport,
    pub ui: ScriptedUi,
    pub sleeper: NoSleep,
}

impl Harness {
    pub fn new(runner: FakeRunner, http: FakeTransport, ui: ScriptedUi) -> Self {
        Self {
            runner,
            http,
            ui,
            sleeper: NoSleep::default(),
        }
    }

    pub fn io(&self) -> Collaborators<'_> {
        Collaborators {
            runner: &self.runner,
            http: &self.http,
            ui: &self.ui,
            sleeper: &self.sleeper,
        }
    }
}
