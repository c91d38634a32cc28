mod api;
mod batch;
mod history;
mod models;
mod store;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use api::ApiClient;
use batch::{BatchError, BatchRunner, BatchSummary};
use models::{
    ApplicationRecord, ApplicationResult, ApplyResponse, CustomField, LogKind, Profile, UserInfo,
    USER_ID,
};
use store::SqliteStore;

#[derive(Parser)]
#[command(name = "blitz")]
#[command(about = "Job application automation - batch-apply to job postings with your saved profile")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local store
    Init,

    /// Manage your applicant profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Manage custom application fields (extra question/answer pairs)
    Field {
        #[command(subcommand)]
        command: FieldCommands,
    },

    /// Apply to one or more job posting URLs
    Apply {
        /// Job posting URLs
        urls: Vec<String>,

        /// Read additional URLs from a file, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Submit the whole batch in a single request (no per-item progress)
        #[arg(long)]
        batch: bool,
    },

    /// Review application history
    History {
        #[command(subcommand)]
        command: Option<HistoryCommands>,
    },

    /// Show application statistics
    Stats {
        /// Fetch aggregate stats from the backend instead of the local mirror
        #[arg(long)]
        remote: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Set profile fields (only the flags you pass are changed)
    Set {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        /// Resume URL (e.g. a shared drive link)
        #[arg(long)]
        resume: Option<String>,

        #[arg(long)]
        linkedin: Option<String>,

        #[arg(long)]
        github: Option<String>,

        #[arg(long)]
        portfolio: Option<String>,
    },

    /// Show the stored profile
    Show,

    /// Replace the local profile with the backend's copy
    Pull,
}

#[derive(Subcommand)]
enum FieldCommands {
    /// Add a custom field
    Add {
        /// Field name as it appears on application forms
        name: String,

        /// Value to fill in
        value: String,
    },

    /// List custom fields
    List,

    /// Remove a custom field by id
    Remove {
        id: i64,
    },

    /// Remove all custom fields
    Clear,
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List applications (default)
    List {
        /// Substring match on company, title or URL
        #[arg(short, long)]
        search: Option<String>,

        /// Exact status match (e.g. success, failed, Applied)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one application in full
    Show {
        id: i64,
    },

    /// Delete an application from history
    Delete {
        id: i64,

        /// Also delete it from the backend
        #[arg(long)]
        remote: bool,
    },

    /// Replace the local history with the backend's copy
    Sync,

    /// Browse history interactively
    Browse {
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long)]
        status: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let db = SqliteStore::open()?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Store initialized at {}", db.path().display());
        }

        Commands::Profile { command } => {
            db.ensure_initialized()?;
            match command {
                ProfileCommands::Set {
                    name,
                    email,
                    phone,
                    resume,
                    linkedin,
                    github,
                    portfolio,
                } => cmd_profile_set(&db, name, email, phone, resume, linkedin, github, portfolio)?,
                ProfileCommands::Show => cmd_profile_show(&db)?,
                ProfileCommands::Pull => cmd_profile_pull(&db)?,
            }
        }

        Commands::Field { command } => {
            db.ensure_initialized()?;
            match command {
                FieldCommands::Add { name, value } => cmd_field_add(&db, &name, &value)?,
                FieldCommands::List => cmd_field_list(&db)?,
                FieldCommands::Remove { id } => cmd_field_remove(&db, id)?,
                FieldCommands::Clear => cmd_field_clear(&db)?,
            }
        }

        Commands::Apply { urls, file, batch } => {
            db.ensure_initialized()?;
            cmd_apply(&db, urls, file, batch)?;
        }

        Commands::History { command } => {
            db.ensure_initialized()?;
            match command.unwrap_or(HistoryCommands::List {
                search: None,
                status: None,
            }) {
                HistoryCommands::List { search, status } => {
                    cmd_history_list(&db, search.as_deref(), status.as_deref())?
                }
                HistoryCommands::Show { id } => cmd_history_show(&db, id)?,
                HistoryCommands::Delete { id, remote } => cmd_history_delete(&db, id, remote)?,
                HistoryCommands::Sync => cmd_history_sync(&db)?,
                HistoryCommands::Browse { search, status } => tui::run_browse(
                    &db,
                    search.as_deref().unwrap_or(""),
                    status.as_deref().unwrap_or("All"),
                )?,
            }
        }

        Commands::Stats { remote } => {
            db.ensure_initialized()?;
            cmd_stats(&db, remote)?;
        }
    }

    Ok(())
}

// --- Profile commands ---

#[allow(clippy::too_many_arguments)]
fn cmd_profile_set(
    db: &SqliteStore,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    resume: Option<String>,
    linkedin: Option<String>,
    github: Option<String>,
    portfolio: Option<String>,
) -> Result<()> {
    let mut profile = store::load_profile(db)?.unwrap_or_else(Profile::empty);

    if let Some(name) = name {
        profile.full_name = name;
    }
    if let Some(email) = email {
        profile.email = email;
    }
    if let Some(phone) = phone {
        profile.phone = Some(phone);
    }
    if let Some(resume) = resume {
        profile.resume_url = Some(resume);
    }
    if let Some(linkedin) = linkedin {
        profile.linkedin_url = Some(linkedin);
    }
    if let Some(github) = github {
        profile.github_url = Some(github);
    }
    if let Some(portfolio) = portfolio {
        profile.portfolio_url = Some(portfolio);
    }
    profile.updated_at = models::now_iso();

    store::save_profile(db, &profile)?;
    println!("Profile saved.");

    if !profile.is_complete() {
        println!("Note: profile is incomplete - name and email are required before applying.");
    }

    // Local copy is the source of truth; the backend mirror is best effort.
    let client = ApiClient::from_env();
    if let Err(e) = client.save_profile(&profile) {
        println!("Warning: could not sync profile to the application service: {}", e);
    }

    Ok(())
}

fn cmd_profile_show(db: &SqliteStore) -> Result<()> {
    match store::load_profile(db)? {
        Some(profile) => {
            println!("Name:      {}", display_or_dash(&profile.full_name));
            println!("Email:     {}", display_or_dash(&profile.email));
            println!("Phone:     {}", opt_or_dash(&profile.phone));
            println!("Resume:    {}", opt_or_dash(&profile.resume_url));
            println!("LinkedIn:  {}", opt_or_dash(&profile.linkedin_url));
            println!("GitHub:    {}", opt_or_dash(&profile.github_url));
            println!("Portfolio: {}", opt_or_dash(&profile.portfolio_url));
            println!("Updated:   {}", profile.updated_at);
            if !profile.is_complete() {
                println!("\nProfile incomplete: set at least --name and --email before applying.");
            }
        }
        None => {
            println!("No profile found. Run 'blitz profile set --name <name> --email <email>'.");
        }
    }
    Ok(())
}

fn cmd_profile_pull(db: &SqliteStore) -> Result<()> {
    let client = ApiClient::from_env();
    match client.fetch_profile(USER_ID)? {
        Some(profile) => {
            store::save_profile(db, &profile)?;
            let mut fields = client.fetch_custom_fields(USER_ID)?;
            store::save_custom_fields(db, &mut fields)?;
            println!(
                "Pulled profile for {} and {} custom field(s) from {}.",
                profile.full_name,
                fields.len(),
                client.base_url()
            );
        }
        None => {
            println!("No profile found on the application service.");
        }
    }
    Ok(())
}

// --- Custom field commands ---

fn push_fields(fields: &[CustomField]) {
    let client = ApiClient::from_env();
    if let Err(e) = client.save_custom_fields(USER_ID, fields) {
        println!(
            "Warning: could not sync custom fields to the application service: {}",
            e
        );
    }
}

fn cmd_field_add(db: &SqliteStore, name: &str, value: &str) -> Result<()> {
    let mut fields = store::load_custom_fields(db)?;
    fields.push(CustomField::new(name, value));
    store::save_custom_fields(db, &mut fields)?;
    println!("Added field '{}' (id: {})", name, fields.len());
    push_fields(&fields);
    Ok(())
}

fn cmd_field_list(db: &SqliteStore) -> Result<()> {
    let fields = store::load_custom_fields(db)?;
    if fields.is_empty() {
        println!("No custom fields. Add one with 'blitz field add <name> <value>'.");
        return Ok(());
    }
    println!("{:<4} {:<30} {}", "ID", "NAME", "VALUE");
    println!("{}", "-".repeat(60));
    for field in fields {
        println!(
            "{:<4} {:<30} {}",
            field.id,
            truncate(&field.field_name, 28),
            field.field_value
        );
    }
    Ok(())
}

fn cmd_field_remove(db: &SqliteStore, id: i64) -> Result<()> {
    let mut fields = store::load_custom_fields(db)?;
    let before = fields.len();
    fields.retain(|field| field.id != id);
    if fields.len() == before {
        println!("No custom field with id {}.", id);
        return Ok(());
    }
    store::save_custom_fields(db, &mut fields)?;
    println!("Removed field {}.", id);
    push_fields(&fields);
    Ok(())
}

fn cmd_field_clear(db: &SqliteStore) -> Result<()> {
    let mut fields: Vec<CustomField> = Vec::new();
    store::save_custom_fields(db, &mut fields)?;
    println!("Removed all custom fields.");
    push_fields(&fields);
    Ok(())
}

// --- Apply ---

fn collect_urls(mut urls: Vec<String>, file: Option<PathBuf>) -> Result<Vec<String>> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read URL file: {}", path.display()))?;
        urls.extend(content.lines().map(|line| line.to_string()));
    }
    Ok(urls)
}

fn load_user(db: &SqliteStore) -> Result<Option<UserInfo>> {
    let Some(profile) = store::load_profile(db)? else {
        return Ok(None);
    };
    let custom_fields = store::load_custom_fields(db)?;
    Ok(Some(UserInfo {
        profile,
        custom_fields,
    }))
}

fn cmd_apply(db: &SqliteStore, urls: Vec<String>, file: Option<PathBuf>, batch: bool) -> Result<()> {
    let urls = collect_urls(urls, file)?;

    let Some(user) = load_user(db)? else {
        println!("Profile incomplete: run 'blitz profile set --name <name> --email <email>' first.");
        return Ok(());
    };

    let client = ApiClient::from_env();

    let (results, summary) = if batch {
        match run_one_shot(&client, &urls, &user)? {
            Some(outcome) => outcome,
            None => return Ok(()),
        }
    } else {
        let mut runner = BatchRunner::new(&client);
        let outcome = runner.run(&urls, &user, |entry, progress| {
            let tag = match entry.kind {
                LogKind::Info => " ..",
                LogKind::Success => " ok",
                LogKind::Error => " !!",
            };
            println!("[{:>3}%]{} {}", progress, tag, entry.message);
        });

        match outcome {
            Ok(summary) => (runner.results, summary),
            Err(e @ BatchError::NoUrls) | Err(e @ BatchError::IncompleteProfile) => {
                println!("{}", e);
                return Ok(());
            }
            Err(BatchError::Fatal(e)) => {
                return Err(e.context("Application run aborted"));
            }
        }
    };

    let records: Vec<ApplicationRecord> =
        results.iter().cloned().map(ApplicationRecord::from).collect();
    store::append_history(db, records)?;

    print_results(&results);
    println!(
        "{} successful, {} failed out of {} application(s).",
        summary.successful, summary.failed, summary.total
    );
    Ok(())
}

/// The --batch path: one round trip, no per-item progress. Kept behind an
/// explicit flag because watching items complete one by one is the point of
/// the default workflow.
fn run_one_shot(
    client: &ApiClient,
    urls: &[String],
    user: &UserInfo,
) -> Result<Option<(Vec<ApplicationResult>, BatchSummary)>> {
    let valid_urls = batch::sanitize_urls(urls);
    if valid_urls.is_empty() {
        println!("{}", BatchError::NoUrls);
        return Ok(None);
    }
    if !user.profile.is_complete() {
        println!("{}", BatchError::IncompleteProfile);
        return Ok(None);
    }

    client.save_profile(&user.profile)?;
    client.save_custom_fields(user.profile.user_id, &user.custom_fields)?;

    println!("Submitting {} application(s) in one batch...", valid_urls.len());
    let responses = client.apply_batch(&valid_urls)?;
    if responses.len() != valid_urls.len() {
        println!(
            "Warning: the application service returned {} result(s) for {} URL(s).",
            responses.len(),
            valid_urls.len()
        );
    }
    let results = zip_batch_results(&valid_urls, responses);

    let successful = results.iter().filter(|r| r.succeeded()).count();
    let summary = BatchSummary {
        total: results.len(),
        successful,
        failed: results.len() - successful,
    };
    Ok(Some((results, summary)))
}

/// Pairs each submitted URL with its batch response, in order. A URL the
/// backend returned no result for becomes a failed result rather than
/// silently vanishing from the table and the history.
fn zip_batch_results(urls: &[String], responses: Vec<ApplyResponse>) -> Vec<ApplicationResult> {
    let mut responses = responses.into_iter();
    urls.iter()
        .enumerate()
        .map(|(i, url)| match responses.next() {
            Some(resp) => ApplicationResult::from_response(i as i64 + 1, url, resp),
            None => ApplicationResult::from_failure(
                i as i64 + 1,
                url,
                "No result returned for this URL",
            ),
        })
        .collect()
}

fn print_results(results: &[ApplicationResult]) {
    println!();
    println!("{:<4} {:<12} {:<22} {:<24} {}", "ID", "STATUS", "COMPANY", "TITLE", "URL");
    println!("{}", "-".repeat(92));
    for result in results {
        println!(
            "{:<4} {:<12} {:<22} {:<24} {}",
            result.id,
            history::status_text(&result.status),
            truncate(&result.company_name, 20),
            truncate(&result.job_title, 22),
            result.url
        );
    }
    println!();

    for result in results {
        if let Some(message) = &result.error_message {
            println!("#{} {}:", result.id, result.url);
            for line in textwrap::fill(message, 76).lines() {
                println!("    {}", line);
            }
        }
        if !result.missing_fields.is_empty() {
            println!(
                "#{} could not fill: {}",
                result.id,
                result.missing_fields.join(", ")
            );
        }
    }
}

// --- History commands ---

fn cmd_history_list(db: &SqliteStore, search: Option<&str>, status: Option<&str>) -> Result<()> {
    let mut records = store::load_history(db)?;
    history::sort_newest_first(&mut records);

    let filtered = history::filter(&records, search.unwrap_or(""), status.unwrap_or("All"));
    if filtered.is_empty() {
        if records.is_empty() {
            println!("No application history yet. Start applying with 'blitz apply <url>'.");
        } else {
            println!("No applications match the search criteria.");
        }
        return Ok(());
    }

    println!(
        "{:<6} {:<12} {:<22} {:<26} {:<12}",
        "ID", "STATUS", "COMPANY", "TITLE", "APPLIED"
    );
    println!("{}", "-".repeat(80));
    for record in filtered {
        println!(
            "{:<6} {:<12} {:<22} {:<26} {:<12}",
            record.id,
            truncate(&record.status, 10),
            truncate(&record.company_name, 20),
            truncate(&record.job_title, 24),
            format_date(&record.applied_at)
        );
    }
    Ok(())
}

fn cmd_history_show(db: &SqliteStore, id: i64) -> Result<()> {
    let records = store::load_history(db)?;
    let Some(record) = records.iter().find(|r| r.id == id) else {
        println!("Application #{} not found.", id);
        return Ok(());
    };

    println!("Application #{}", record.id);
    println!("Position: {}", record.job_title);
    println!("Company:  {}", record.company_name);
    println!("Status:   {}", record.status);
    println!("URL:      {}", record.job_url);
    println!("Applied:  {}", format_date(&record.applied_at));

    if let Some(message) = &record.error_message {
        println!("\nError:");
        for line in textwrap::fill(message, 76).lines() {
            println!("  {}", line);
        }
    }

    if !record.missing_fields.is_empty() {
        println!("\nMissing fields: {}", record.missing_fields.join(", "));
    }

    if !record.questions_and_answers.is_empty() {
        println!("\nQuestions answered ({}):", record.questions_answered);
        for qa in &record.questions_and_answers {
            println!("  Q: {}", qa.question);
            for line in textwrap::fill(&qa.answer, 72).lines() {
                println!("     {}", line);
            }
        }
    }
    Ok(())
}

fn cmd_history_delete(db: &SqliteStore, id: i64, remote: bool) -> Result<()> {
    if store::delete_history_entry(db, id)? {
        println!("Deleted application #{} from local history.", id);
    } else {
        println!("Application #{} not found in local history.", id);
    }

    if remote {
        let client = ApiClient::from_env();
        client.delete_history(id)?;
        println!("Deleted application #{} from the application service.", id);
    }
    Ok(())
}

fn cmd_history_sync(db: &SqliteStore) -> Result<()> {
    let client = ApiClient::from_env();
    let envelope = client.fetch_history(USER_ID)?;
    let (successful, failed) = (envelope.successful, envelope.failed);

    let mut records = envelope.applications;
    history::sort_newest_first(&mut records);
    store::save_history(db, &records)?;

    println!(
        "Synced {} application(s) from {} ({} successful, {} failed).",
        records.len(),
        client.base_url(),
        successful,
        failed
    );
    Ok(())
}

// --- Stats ---

fn cmd_stats(db: &SqliteStore, remote: bool) -> Result<()> {
    if remote {
        let client = ApiClient::from_env();
        let stats = client.fetch_stats(USER_ID)?;
        println!("Total:        {}", stats.total);
        println!("Successful:   {}", stats.successful);
        println!("Failed:       {}", stats.failed);
        println!("Success rate: {:.1}%", stats.success_rate);
        return Ok(());
    }

    let records = store::load_history(db)?;
    let stats = history::stats(&records);
    println!("Total:       {}", stats.total);
    println!("Successful:  {}", stats.applied);
    println!("Failed:      {}", stats.failed);
    println!("In progress: {}", stats.in_progress);
    Ok(())
}

// --- Display helpers ---

fn display_or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

fn opt_or_dash(value: &Option<String>) -> &str {
    value.as_deref().map(display_or_dash).unwrap_or("-")
}

fn format_date(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

// Counts chars, not bytes: company and title strings come from the backend
// and can be non-ASCII.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
