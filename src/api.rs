use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::batch::ApplyService;
use crate::models::{
    ApplicationRecord, ApplyResponse, CustomField, Profile, UserInfo, USER_ID,
};

const DEFAULT_API_URL: &str = "https://blitzapply-backend2.onrender.com";

#[derive(Debug, Serialize)]
struct ApplyRequest<'a> {
    job_url: &'a str,
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct CustomFieldsEnvelope {
    #[serde(default)]
    custom_fields: Vec<CustomField>,
}

#[derive(Debug, Deserialize)]
struct BatchEnvelope {
    #[serde(default)]
    results: Vec<ApplyResponse>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryEnvelope {
    #[serde(default)]
    pub applications: Vec<ApplicationRecord>,
    #[serde(default)]
    pub successful: usize,
    #[serde(default)]
    pub failed: usize,
}

#[derive(Debug, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub successful: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(default)]
    pub success_rate: f64,
}

/// Blocking client for the remote application service. One request in
/// flight at a time is all the workflow ever needs.
#[derive(Debug)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn from_env() -> Self {
        let base_url = env::var("BLITZ_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(&base_url)
    }

    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Any non-2xx response becomes an error carrying the numeric status.
    fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        if !response.status().is_success() {
            return Err(anyhow!("API error: {}", response.status().as_u16()));
        }
        Ok(response)
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        let response = self
            .client
            .post(self.url("/profile"))
            .json(profile)
            .send()
            .context("Failed to send profile to the application service")?;
        Self::check(response)?;
        Ok(())
    }

    pub fn fetch_profile(&self, user_id: i64) -> Result<Option<Profile>> {
        let response = self
            .client
            .get(self.url(&format!("/profile/{}", user_id)))
            .send()
            .context("Failed to fetch profile from the application service")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response)?;
        let profile = response.json().context("Failed to parse profile response")?;
        Ok(Some(profile))
    }

    pub fn save_custom_fields(&self, user_id: i64, fields: &[CustomField]) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/custom-fields/{}", user_id)))
            .json(fields)
            .send()
            .context("Failed to send custom fields to the application service")?;
        Self::check(response)?;
        Ok(())
    }

    pub fn fetch_custom_fields(&self, user_id: i64) -> Result<Vec<CustomField>> {
        let response = self
            .client
            .get(self.url(&format!("/custom-fields/{}", user_id)))
            .send()
            .context("Failed to fetch custom fields from the application service")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = Self::check(response)?;
        let envelope: CustomFieldsEnvelope = response
            .json()
            .context("Failed to parse custom fields response")?;
        Ok(envelope.custom_fields)
    }

    /// One automated application. The backend drives a live browser session,
    /// so this call can take a while; the transport timeout is the only limit.
    pub fn apply(&self, job_url: &str) -> Result<ApplyResponse> {
        let request = ApplyRequest {
            job_url,
            user_id: USER_ID,
        };
        let response = self
            .client
            .post(self.url("/apply"))
            .json(&request)
            .send()
            .context("Failed to reach the application service")?;
        let response = Self::check(response)?;
        response.json().context("Failed to parse apply response")
    }

    /// Whole batch in a single request. Trades per-item progress for one
    /// round trip; the sequential workflow never calls this.
    pub fn apply_batch(&self, job_urls: &[String]) -> Result<Vec<ApplyResponse>> {
        let requests: Vec<ApplyRequest> = job_urls
            .iter()
            .map(|url| ApplyRequest {
                job_url: url,
                user_id: USER_ID,
            })
            .collect();
        let response = self
            .client
            .post(self.url("/apply-batch"))
            .json(&requests)
            .send()
            .context("Failed to reach the application service")?;
        let response = Self::check(response)?;
        let envelope: BatchEnvelope = response
            .json()
            .context("Failed to parse batch apply response")?;
        Ok(envelope.results)
    }

    pub fn fetch_history(&self, user_id: i64) -> Result<HistoryEnvelope> {
        let response = self
            .client
            .get(self.url(&format!("/history/{}", user_id)))
            .send()
            .context("Failed to fetch history from the application service")?;
        let response = Self::check(response)?;
        response.json().context("Failed to parse history response")
    }

    pub fn delete_history(&self, application_id: i64) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/history/{}", application_id)))
            .send()
            .context("Failed to reach the application service")?;
        Self::check(response)?;
        Ok(())
    }

    pub fn fetch_stats(&self, user_id: i64) -> Result<StatsResponse> {
        let response = self
            .client
            .get(self.url(&format!("/stats/{}", user_id)))
            .send()
            .context("Failed to fetch stats from the application service")?;
        let response = Self::check(response)?;
        response.json().context("Failed to parse stats response")
    }
}

impl ApplyService for ApiClient {
    fn sync_user(&self, user: &UserInfo) -> Result<()> {
        self.save_profile(&user.profile)?;
        self.save_custom_fields(user.profile.user_id, &user.custom_fields)?;
        Ok(())
    }

    fn submit_application(&self, url: &str) -> Result<ApplyResponse> {
        self.apply(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = ApiClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/apply"), "http://localhost:8000/apply");
        assert_eq!(client.url("/history/3"), "http://localhost:8000/history/3");
    }

    #[test]
    fn test_apply_response_parses_full_payload() {
        let json = r#"{
            "job_url": "https://a.com/job",
            "company_name": "Acme",
            "job_title": "Engineer",
            "status": "success",
            "questions_answered": 2,
            "questions_and_answers": [
                {"question": "Years of experience?", "answer": "5"},
                {"question": "Visa sponsorship?", "answer": "No"}
            ],
            "missing_fields": ["portfolio_url"]
        }"#;
        let resp: ApplyResponse = serde_json::from_str(json).unwrap();

        assert_eq!(resp.company_name, "Acme");
        assert_eq!(resp.status, "success");
        assert_eq!(resp.questions_answered, 2);
        assert_eq!(resp.questions_and_answers.len(), 2);
        assert_eq!(resp.missing_fields, vec!["portfolio_url"]);
    }

    #[test]
    fn test_custom_fields_envelope_tolerates_missing_list() {
        let envelope: CustomFieldsEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.custom_fields.is_empty());

        let envelope: CustomFieldsEnvelope = serde_json::from_str(
            r#"{"custom_fields": [{"field_name": "Availability", "field_value": "Now"}]}"#,
        )
        .unwrap();
        assert_eq!(envelope.custom_fields.len(), 1);
        assert_eq!(envelope.custom_fields[0].field_name, "Availability");
    }

    #[test]
    fn test_stats_response_defaults() {
        let stats: StatsResponse = serde_json::from_str(r#"{"total": 4, "successful": 3}"#).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.successful, 3);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.success_rate, 0.0);
    }
}
