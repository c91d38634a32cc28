use serde::{Deserialize, Serialize};

/// Single-user client: the backend keys everything off a numeric user id
/// and there is no authentication layer.
pub const USER_ID: i64 = 1;

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn default_user_id() -> i64 {
    USER_ID
}

fn unknown_company() -> String {
    "Unknown Company".to_string()
}

fn unknown_position() -> String {
    "Unknown Position".to_string()
}

fn unknown_status() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default = "default_user_id")]
    pub user_id: i64,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub portfolio_url: Option<String>,
    #[serde(default = "now_iso")]
    pub created_at: String,
    #[serde(default = "now_iso")]
    pub updated_at: String,
}

impl Profile {
    pub fn empty() -> Self {
        let now = now_iso();
        Self {
            user_id: USER_ID,
            full_name: String::new(),
            email: String::new(),
            phone: None,
            resume_url: None,
            linkedin_url: None,
            github_url: None,
            portfolio_url: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// The batch workflow refuses to run without at least a name and email.
    pub fn is_complete(&self) -> bool {
        !self.full_name.trim().is_empty() && !self.email.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomField {
    #[serde(default)]
    pub id: i64,
    #[serde(default = "default_user_id")]
    pub user_id: i64,
    pub field_name: String,
    pub field_value: String,
    #[serde(default = "now_iso")]
    pub created_at: String,
    #[serde(default = "now_iso")]
    pub updated_at: String,
}

impl CustomField {
    pub fn new(field_name: &str, field_value: &str) -> Self {
        let now = now_iso();
        Self {
            id: 0,
            user_id: USER_ID,
            field_name: field_name.to_string(),
            field_value: field_value.to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Ids are positional (1-based). Reassigned on every save so deletions
    /// never leave gaps.
    pub fn renumber(fields: &mut [CustomField]) {
        for (i, field) in fields.iter_mut().enumerate() {
            field.id = i as i64 + 1;
            field.user_id = USER_ID;
        }
    }
}

/// Read-only composite the batch workflow borrows for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub profile: Profile,
    pub custom_fields: Vec<CustomField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

/// Partial response from the remote apply operation. Every field may be
/// missing; normalization into an ApplicationResult fills the blanks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplyResponse {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub questions_answered: u32,
    #[serde(default)]
    pub questions_and_answers: Vec<QuestionAnswer>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub missing_fields: Vec<String>,
}

/// Outcome of one URL in a batch run. Built exactly once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResult {
    pub id: i64,
    pub url: String,
    pub company_name: String,
    pub job_title: String,
    pub status: String,
    pub applied_at: String,
    pub questions_answered: u32,
    pub questions_and_answers: Vec<QuestionAnswer>,
    pub error_message: Option<String>,
    pub missing_fields: Vec<String>,
}

impl ApplicationResult {
    /// Normalize a backend response. Empty strings count as missing, same as
    /// absent fields.
    pub fn from_response(id: i64, url: &str, resp: ApplyResponse) -> Self {
        Self {
            id,
            url: url.to_string(),
            company_name: if resp.company_name.is_empty() {
                unknown_company()
            } else {
                resp.company_name
            },
            job_title: if resp.job_title.is_empty() {
                unknown_position()
            } else {
                resp.job_title
            },
            status: if resp.status.is_empty() {
                "failed".to_string()
            } else {
                resp.status
            },
            applied_at: now_iso(),
            questions_answered: resp.questions_answered,
            questions_and_answers: resp.questions_and_answers,
            error_message: resp.error_message,
            missing_fields: resp.missing_fields,
        }
    }

    /// A call that never produced a response: network error, non-2xx, timeout.
    pub fn from_failure(id: i64, url: &str, message: &str) -> Self {
        Self {
            id,
            url: url.to_string(),
            company_name: unknown_company(),
            job_title: unknown_position(),
            status: "failed".to_string(),
            applied_at: now_iso(),
            questions_answered: 0,
            questions_and_answers: Vec::new(),
            error_message: Some(message.to_string()),
            missing_fields: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == "success"
    }
}

/// Persisted history entry. Deserialization is deliberately tolerant: older
/// entries used `url` instead of `job_url` and may miss most fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default = "default_user_id")]
    pub user_id: i64,
    #[serde(alias = "url", default)]
    pub job_url: String,
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default = "unknown_company")]
    pub company_name: String,
    #[serde(default = "unknown_position")]
    pub job_title: String,
    #[serde(default = "now_iso")]
    pub applied_at: String,
    #[serde(default = "now_iso")]
    pub created_at: String,
    #[serde(default = "now_iso")]
    pub updated_at: String,
    #[serde(default)]
    pub questions_answered: u32,
    #[serde(default)]
    pub questions_and_answers: Vec<QuestionAnswer>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub missing_fields: Vec<String>,
}

impl From<ApplicationResult> for ApplicationRecord {
    fn from(result: ApplicationResult) -> Self {
        let now = now_iso();
        Self {
            id: result.id,
            user_id: USER_ID,
            job_url: result.url,
            status: result.status,
            company_name: result.company_name,
            job_title: result.job_title,
            applied_at: result.applied_at,
            created_at: now.clone(),
            updated_at: now,
            questions_answered: result.questions_answered,
            questions_and_answers: result.questions_and_answers,
            error_message: result.error_message,
            missing_fields: result.missing_fields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Success,
    Error,
}

/// One line of run observability. Append-only for the duration of a batch,
/// cleared at the start of the next one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserLogEntry {
    pub timestamp: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
}

impl BrowserLogEntry {
    pub fn new(kind: LogKind, message: String) -> Self {
        Self {
            timestamp: now_iso(),
            message,
            kind,
        }
    }
}
