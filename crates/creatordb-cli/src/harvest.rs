//! Harvest command handlers for the CLI.
//!
//! These are called from `main` after config (and, outside dry runs, the
//! database pool) are established. In batch runs a failed account is
//! reported and skipped; the run only errors when every account failed.

use std::path::{Path, PathBuf};

use chrono::Utc;
use creatordb_core::{HarvestRequest, HarvestResponse, HarvesterSettings, Platform};
use creatordb_harvester::{HarvestStore, Harvester, MemoryStore, PgStore};

/// Where `harvest-all` takes its accounts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AccountSource {
    File(PathBuf),
    Stale { stale_hours: i64, limit: i64 },
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct OutputOptions {
    pub json: bool,
}

/// Builds a request from a CLI target. URLs go in `profile_url`, anything
/// else is treated as a handle (or channel id).
pub(crate) fn build_request(
    platform: Option<Platform>,
    target: &str,
    fetch_content: bool,
    resume: bool,
) -> HarvestRequest {
    let target = target.trim();
    let is_url = target.starts_with("http://") || target.starts_with("https://");
    HarvestRequest {
        account_id: None,
        platform,
        handle: (!is_url).then(|| target.to_string()),
        profile_url: is_url.then(|| target.to_string()),
        channel_id: None,
        fetch_content,
        resume_from_cursor: resume,
    }
}

/// Harvest one account into the database.
///
/// # Errors
///
/// Returns an error if the harvester cannot be built or the harvest reports
/// `success: false`.
pub(crate) async fn run_harvest(
    pool: sqlx::PgPool,
    config: &creatordb_core::AppConfig,
    request: &HarvestRequest,
    options: OutputOptions,
) -> anyhow::Result<()> {
    let harvester = Harvester::new(config.harvester.clone(), PgStore::new(pool))?;
    harvest_one(&harvester, request, options).await
}

/// Harvest one account into a throwaway in-memory store.
///
/// # Errors
///
/// Same as [`run_harvest`].
pub(crate) async fn run_harvest_dry(
    settings: HarvesterSettings,
    request: &HarvestRequest,
    options: OutputOptions,
) -> anyhow::Result<()> {
    let harvester = Harvester::new(settings, MemoryStore::new())?;
    println!("dry-run: results are not written to the database");
    harvest_one(&harvester, request, options).await
}

async fn harvest_one<S: HarvestStore>(
    harvester: &Harvester<S>,
    request: &HarvestRequest,
    options: OutputOptions,
) -> anyhow::Result<()> {
    let response = harvester.harvest(request).await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        let label = request.target().unwrap_or_default();
        println!("{}", summary_line(label, &response));
        for warning in &response.data.warnings {
            println!("  warning: {warning}");
        }
    }

    if !response.success {
        anyhow::bail!(
            "harvest failed: {}",
            response.warning.as_deref().unwrap_or("no data")
        );
    }
    Ok(())
}

/// Load the accounts file and turn every entry into a request.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation.
pub(crate) fn requests_from_file(path: &Path, resume: bool) -> anyhow::Result<Vec<HarvestRequest>> {
    let file = creatordb_core::load_accounts(path)?;
    let requests = file
        .accounts
        .into_iter()
        .map(|account| {
            let mut request = build_request(
                Some(account.platform),
                &account.handle,
                account.fetch_content,
                resume,
            );
            request.account_id = account.account_id;
            request
        })
        .collect();
    Ok(requests)
}

/// Requests for stored accounts that have not been synced recently.
///
/// Rows with a platform this build does not know are logged and skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub(crate) async fn requests_from_db(
    pool: &sqlx::PgPool,
    stale_hours: i64,
    limit: i64,
    resume: bool,
) -> anyhow::Result<Vec<HarvestRequest>> {
    let synced_before = Utc::now() - chrono::Duration::hours(stale_hours.max(0));
    let rows = creatordb_db::list_stale_accounts(pool, synced_before, limit.max(1)).await?;

    let requests = rows
        .into_iter()
        .filter_map(|row| match row.platform.parse::<Platform>() {
            Ok(platform) => {
                let mut request = build_request(Some(platform), &row.handle, true, resume);
                request.account_id = row.external_account_id;
                Some(request)
            }
            Err(e) => {
                tracing::warn!(handle = %row.handle, error = %e, "skipping stored account");
                None
            }
        })
        .collect();
    Ok(requests)
}

/// Harvest every account from `source` into the database.
///
/// # Errors
///
/// Returns an error if the accounts cannot be loaded, the harvester cannot
/// be built, or every account failed.
pub(crate) async fn run_harvest_all(
    pool: sqlx::PgPool,
    config: &creatordb_core::AppConfig,
    source: AccountSource,
    resume: bool,
) -> anyhow::Result<()> {
    let requests = match source {
        AccountSource::File(path) => requests_from_file(&path, resume)?,
        AccountSource::Stale { stale_hours, limit } => {
            requests_from_db(&pool, stale_hours, limit, resume).await?
        }
    };
    if requests.is_empty() {
        println!("no accounts to harvest");
        return Ok(());
    }

    let harvester = Harvester::new(config.harvester.clone(), PgStore::new(pool))?;
    harvest_batch(&harvester, requests).await
}

/// Harvest every account from the accounts file into memory.
///
/// # Errors
///
/// Same as [`run_harvest_all`].
pub(crate) async fn run_harvest_all_dry(
    settings: HarvesterSettings,
    requests: Vec<HarvestRequest>,
) -> anyhow::Result<()> {
    if requests.is_empty() {
        println!("no accounts to harvest");
        return Ok(());
    }
    println!(
        "dry-run: harvesting {} accounts without writing to the database",
        requests.len()
    );
    let harvester = Harvester::new(settings, MemoryStore::new())?;
    harvest_batch(&harvester, requests).await
}

async fn harvest_batch<S: HarvestStore>(
    harvester: &Harvester<S>,
    requests: Vec<HarvestRequest>,
) -> anyhow::Result<()> {
    let total = requests.len();
    let results = harvester.harvest_many(requests).await;

    let mut failed = 0usize;
    let mut items = 0usize;
    for (request, response) in &results {
        let label = match request.platform() {
            Some(platform) => format!("{platform}/{}", request.target().unwrap_or_default()),
            None => request.target().unwrap_or_default().to_string(),
        };
        println!("{}", summary_line(&label, response));
        if response.success {
            items += response.data.scraped_count;
        } else {
            failed += 1;
            tracing::warn!(
                account = %label,
                code = response.code.map_or("none", |c| c.as_str()),
                "account harvest failed"
            );
        }
    }

    println!(
        "harvested {} of {total} accounts ({items} items, {failed} failed)",
        total - failed
    );

    if failed == total {
        anyhow::bail!("all {total} account harvests failed");
    }
    Ok(())
}

fn summary_line(label: &str, response: &HarvestResponse) -> String {
    let status = if response.success { "ok" } else { "failed" };
    let mut line = format!(
        "{label}: {status} followers={} items={} views={}",
        response.data.profile.followers, response.data.scraped_count, response.data.total_views
    );
    if let Some(code) = response.code {
        line.push_str(" code=");
        line.push_str(code.as_str());
    }
    if response.data.cursor.exhausted {
        line.push_str(" (fully paged)");
    }
    line
}
