use anyhow::Result;
use thiserror::Error;

use crate::models::{ApplicationResult, ApplyResponse, BrowserLogEntry, LogKind, UserInfo};

/// Seam between the workflow and the remote automation backend. The real
/// implementation is the HTTP client; tests script it.
pub trait ApplyService {
    /// Push the profile and custom fields the backend fills forms from.
    /// A failure here is fatal to the whole batch.
    fn sync_user(&self, user: &UserInfo) -> Result<()>;

    /// One automated application. Blocks until the backend finishes; the
    /// workflow never has two of these in flight.
    fn submit_application(&self, url: &str) -> Result<ApplyResponse>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No URLs provided: add at least one job URL to apply.")]
    NoUrls,
    #[error("Profile incomplete: set at least your name and email before applying.")]
    IncompleteProfile,
    /// The run aborted before or between dispatches; no completed result set
    /// exists. Per-item failures are never reported this way.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

/// The item in flight: what a progress display shows while the backend works.
/// Emitted through the run log; only one exists at a time.
#[derive(Debug, Clone)]
pub struct CurrentApplication {
    pub url: String,
    pub index: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Drops empty and whitespace-only entries before dispatch.
pub fn sanitize_urls(urls: &[String]) -> Vec<String> {
    urls.iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

/// Percentage of the batch represented by `completed` items out of `total`.
/// Called with i + 0.5 while an item is in flight and i + 1 once it resolves,
/// so an observer can tell "dispatched" from "finished".
pub fn progress_value(completed: f64, total: usize) -> u8 {
    ((completed / total as f64) * 100.0).round() as u8
}

/// One run of "apply to N job URLs sequentially". Owns the result list, the
/// run log and the progress counter for the duration of the run; dispatches
/// strictly one URL at a time, in submission order.
pub struct BatchRunner<'a> {
    service: &'a dyn ApplyService,
    pub state: BatchState,
    pub results: Vec<ApplicationResult>,
    pub logs: Vec<BrowserLogEntry>,
    pub progress: u8,
}

impl<'a> BatchRunner<'a> {
    pub fn new(service: &'a dyn ApplyService) -> Self {
        Self {
            service,
            state: BatchState::Idle,
            results: Vec::new(),
            logs: Vec::new(),
            progress: 0,
        }
    }

    fn log<F>(&mut self, kind: LogKind, message: String, observe: &mut F)
    where
        F: FnMut(&BrowserLogEntry, u8),
    {
        let entry = BrowserLogEntry::new(kind, message);
        observe(&entry, self.progress);
        self.logs.push(entry);
    }

    /// Runs the whole batch. Per-item failures are recorded and the loop
    /// keeps going; only pre-dispatch validation and the user sync can stop
    /// the run, in which case the state falls back to Idle with no results.
    pub fn run<F>(
        &mut self,
        urls: &[String],
        user: &UserInfo,
        mut observe: F,
    ) -> Result<BatchSummary, BatchError>
    where
        F: FnMut(&BrowserLogEntry, u8),
    {
        let valid_urls = sanitize_urls(urls);
        if valid_urls.is_empty() {
            return Err(BatchError::NoUrls);
        }
        if !user.profile.is_complete() {
            return Err(BatchError::IncompleteProfile);
        }

        self.state = BatchState::Running;
        self.results.clear();
        self.logs.clear();
        self.progress = 0;

        if let Err(e) = self.service.sync_user(user) {
            self.state = BatchState::Idle;
            return Err(BatchError::Fatal(e));
        }

        let total = valid_urls.len();
        for (i, url) in valid_urls.iter().enumerate() {
            let current = CurrentApplication {
                url: url.clone(),
                index: i + 1,
                total,
            };
            self.progress = progress_value(i as f64 + 0.5, total);
            self.log(
                LogKind::Info,
                format!(
                    "Starting application {}/{}: {}",
                    current.index, current.total, current.url
                ),
                &mut observe,
            );

            // The log kind follows the call outcome: a resolved response is
            // logged as processed even when its body reports a failure; the
            // error kind is reserved for calls that never produced one.
            let outcome = self.service.submit_application(url);
            self.progress = progress_value(i as f64 + 1.0, total);

            let result = match outcome {
                Ok(response) => {
                    let result = ApplicationResult::from_response(i as i64 + 1, url, response);
                    self.log(
                        LogKind::Success,
                        format!(
                            "Successfully processed: {} - {}",
                            result.company_name, result.job_title
                        ),
                        &mut observe,
                    );
                    result
                }
                Err(e) => {
                    let result = ApplicationResult::from_failure(i as i64 + 1, url, &e.to_string());
                    self.log(
                        LogKind::Error,
                        format!("Error applying to {}: {}", url, e),
                        &mut observe,
                    );
                    result
                }
            };

            self.results.push(result);
        }

        let successful = self.results.iter().filter(|r| r.succeeded()).count();
        self.state = BatchState::Completed;
        self.log(
            LogKind::Success,
            format!(
                "All applications completed. {}/{} successful.",
                successful, total
            ),
            &mut observe,
        );

        Ok(BatchSummary {
            total,
            successful,
            failed: total - successful,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Profile;
    use anyhow::anyhow;
    use std::cell::RefCell;

    enum Step {
        Succeed { company: &'static str, title: &'static str },
        Respond { status: &'static str, error: &'static str },
        Fail(&'static str),
    }

    struct FakeService {
        script: RefCell<Vec<Step>>,
        calls: RefCell<Vec<String>>,
        fail_sync: bool,
    }

    impl FakeService {
        fn new(script: Vec<Step>) -> Self {
            Self {
                script: RefCell::new(script),
                calls: RefCell::new(Vec::new()),
                fail_sync: false,
            }
        }

        fn failing_sync() -> Self {
            let mut service = Self::new(Vec::new());
            service.fail_sync = true;
            service
        }
    }

    impl ApplyService for FakeService {
        fn sync_user(&self, _user: &UserInfo) -> Result<()> {
            if self.fail_sync {
                return Err(anyhow!("API error: 500"));
            }
            Ok(())
        }

        fn submit_application(&self, url: &str) -> Result<ApplyResponse> {
            self.calls.borrow_mut().push(url.to_string());
            match self.script.borrow_mut().remove(0) {
                Step::Succeed { company, title } => Ok(ApplyResponse {
                    company_name: company.to_string(),
                    job_title: title.to_string(),
                    status: "success".to_string(),
                    questions_answered: 1,
                    ..Default::default()
                }),
                Step::Respond { status, error } => Ok(ApplyResponse {
                    status: status.to_string(),
                    error_message: Some(error.to_string()),
                    ..Default::default()
                }),
                Step::Fail(message) => Err(anyhow!("{}", message)),
            }
        }
    }

    fn valid_user() -> UserInfo {
        let mut profile = Profile::empty();
        profile.full_name = "Ada Lovelace".to_string();
        profile.email = "ada@example.com".to_string();
        UserInfo {
            profile,
            custom_fields: Vec::new(),
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_completed_run_produces_ordered_results() {
        let service = FakeService::new(vec![
            Step::Succeed { company: "Acme", title: "Engineer" },
            Step::Succeed { company: "Globex", title: "Developer" },
        ]);
        let mut runner = BatchRunner::new(&service);

        let summary = runner
            .run(&urls(&["https://a.com/job1", "https://b.com/job2"]), &valid_user(), |_, _| {})
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(runner.state, BatchState::Completed);
        assert_eq!(runner.progress, 100);

        assert_eq!(runner.results.len(), 2);
        assert_eq!(runner.results[0].id, 1);
        assert_eq!(runner.results[0].url, "https://a.com/job1");
        assert_eq!(runner.results[0].company_name, "Acme");
        assert_eq!(runner.results[1].id, 2);
        assert_eq!(runner.results[1].url, "https://b.com/job2");

        // One start log per item, one outcome log per item, one summary.
        assert_eq!(runner.logs.len(), 5);
        assert!(runner.logs[4].message.contains("2/2 successful"));
    }

    #[test]
    fn test_per_item_failure_does_not_abort_batch() {
        let service = FakeService::new(vec![
            Step::Succeed { company: "Acme", title: "Engineer" },
            Step::Fail("API error: 503"),
            Step::Succeed { company: "Initech", title: "Analyst" },
        ]);
        let mut runner = BatchRunner::new(&service);

        let summary = runner
            .run(
                &urls(&["https://a.com/1", "https://b.com/2", "https://c.com/3"]),
                &valid_user(),
                |_, _| {},
            )
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(service.calls.borrow().len(), 3);

        let failed = &runner.results[1];
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.error_message.as_deref(), Some("API error: 503"));
        assert_eq!(failed.company_name, "Unknown Company");

        assert_eq!(runner.logs[3].kind, LogKind::Error);
        assert!(runner.logs[3].message.contains("https://b.com/2"));
        assert!(runner.logs[3].message.contains("API error: 503"));
        assert!(runner.logs[6].message.contains("2/3 successful"));
    }

    #[test]
    fn test_backend_reported_failure_keeps_error_message() {
        let service = FakeService::new(vec![Step::Respond {
            status: "failed",
            error: "Could not find an application form",
        }]);
        let mut runner = BatchRunner::new(&service);

        runner
            .run(&urls(&["https://a.com/job"]), &valid_user(), |_, _| {})
            .unwrap();

        let result = &runner.results[0];
        assert_eq!(result.status, "failed");
        assert_eq!(
            result.error_message.as_deref(),
            Some("Could not find an application form")
        );

        // The call itself resolved, so the run log counts it as processed;
        // only unresolved calls produce an error entry.
        assert_eq!(runner.logs[1].kind, LogKind::Success);
        assert!(runner.logs[1].message.contains("Successfully processed"));
    }

    #[test]
    fn test_empty_url_list_rejected_before_dispatch() {
        let service = FakeService::new(Vec::new());
        let mut runner = BatchRunner::new(&service);

        let err = runner
            .run(&urls(&["", "   "]), &valid_user(), |_, _| {})
            .unwrap_err();

        assert!(matches!(err, BatchError::NoUrls));
        assert_eq!(runner.state, BatchState::Idle);
        assert!(service.calls.borrow().is_empty());
    }

    #[test]
    fn test_incomplete_profile_rejected_before_dispatch() {
        let service = FakeService::new(Vec::new());
        let mut runner = BatchRunner::new(&service);
        let mut user = valid_user();
        user.profile.email = String::new();

        let err = runner
            .run(&urls(&["https://a.com/job"]), &user, |_, _| {})
            .unwrap_err();

        assert!(matches!(err, BatchError::IncompleteProfile));
        assert_eq!(runner.state, BatchState::Idle);
        assert!(service.calls.borrow().is_empty());
    }

    #[test]
    fn test_sync_failure_is_fatal_and_resets_to_idle() {
        let service = FakeService::failing_sync();
        let mut runner = BatchRunner::new(&service);

        let err = runner
            .run(&urls(&["https://a.com/job"]), &valid_user(), |_, _| {})
            .unwrap_err();

        assert!(matches!(err, BatchError::Fatal(_)));
        assert!(err.to_string().contains("API error: 500"));
        assert_eq!(runner.state, BatchState::Idle);
        assert!(runner.results.is_empty());
        assert!(service.calls.borrow().is_empty());
    }

    #[test]
    fn test_blank_entries_excluded_from_batch() {
        let service = FakeService::new(vec![
            Step::Succeed { company: "Acme", title: "Engineer" },
            Step::Fail("timeout"),
        ]);
        let mut runner = BatchRunner::new(&service);

        let summary = runner
            .run(
                &urls(&["https://a.com/job1", "", "https://b.com/job2"]),
                &valid_user(),
                |_, _| {},
            )
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(runner.results.len(), 2);
        assert_eq!(runner.results[0].id, 1);
        assert_eq!(runner.results[0].url, "https://a.com/job1");
        assert_eq!(runner.results[1].id, 2);
        assert_eq!(runner.results[1].url, "https://b.com/job2");
    }

    #[test]
    fn test_observer_sees_monotone_progress() {
        let service = FakeService::new(vec![
            Step::Succeed { company: "A", title: "T" },
            Step::Fail("boom"),
            Step::Succeed { company: "B", title: "U" },
        ]);
        let mut runner = BatchRunner::new(&service);

        let mut seen: Vec<u8> = Vec::new();
        runner
            .run(
                &urls(&["https://a.com/1", "https://b.com/2", "https://c.com/3"]),
                &valid_user(),
                |_, progress| seen.push(progress),
            )
            .unwrap();

        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 100);
        // First observation is the in-flight value for item 1 of 3.
        assert_eq!(seen[0], progress_value(0.5, 3));
    }

    #[test]
    fn test_progress_value_two_phase() {
        assert_eq!(progress_value(0.5, 2), 25);
        assert_eq!(progress_value(1.0, 2), 50);
        assert_eq!(progress_value(1.0, 4), 25);
        assert_eq!(progress_value(1.0, 3), 33);
        assert_eq!(progress_value(2.0, 3), 67);
        assert_eq!(progress_value(3.0, 3), 100);
        assert_eq!(progress_value(1.0, 1), 100);
    }

    #[test]
    fn test_sanitize_urls_trims_and_drops_blanks() {
        let cleaned = sanitize_urls(&urls(&["  https://a.com/job  ", "", "   "]));
        assert_eq!(cleaned, vec!["https://a.com/job".to_string()]);
    }
}
