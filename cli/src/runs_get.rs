use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::GalasaError;
use crate::http_client::CommsClient;
use crate::run_age::parse_age;
use crate::run_format::{format_runs, RunsFormat};
use crate::run_types::Run;
use crate::runs_query::{minutes_before, RunsQuery, RunsQueryFilters};

/// Command-line criteria for `runs get`.
#[derive(Debug, Clone, Default)]
pub struct RunsGetCriteria {
    pub run_name: Option<String>,
    pub requestor: Option<String>,
    pub result: Option<String>,
    pub group: Option<String>,
    pub age: Option<String>,
    pub active: bool,
    pub tags: Vec<String>,
}

impl RunsGetCriteria {
    fn is_empty(&self) -> bool {
        self.run_name.is_none()
            && self.requestor.is_none()
            && self.result.is_none()
            && self.group.is_none()
            && self.age.is_none()
            && !self.active
            && self.tags.is_empty()
    }
}

/// Builds the query for `runs get`. `now` anchors the age window for the
/// whole search.
pub fn build_runs_query(
    criteria: RunsGetCriteria,
    format: RunsFormat,
    now: DateTime<Utc>,
) -> Result<RunsQuery, GalasaError> {
    if criteria.is_empty() {
        return Err(GalasaError::MissingQueryCriteria);
    }
    let (from_age_mins, to_age_mins) = match criteria.age.as_deref() {
        Some(age) => {
            let (from, to) = parse_age(age)?;
            // TO is always nearer than FROM, so checking FROM covers both bounds.
            if minutes_before(now, from).is_none() {
                return Err(GalasaError::InvalidAge {
                    age: age.to_string(),
                    reason: "The FROM part is too far in the past.".to_string(),
                });
            }
            (from, to)
        }
        None => (0, 0),
    };
    let tags = criteria
        .tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    Ok(RunsQuery::new(
        RunsQueryFilters {
            run_name: criteria.run_name,
            requestor: criteria.requestor,
            result: criteria.result,
            group: criteria.group,
            from_age_mins,
            to_age_mins,
            active_only: criteria.active,
            need_method_details: format.needs_method_details(),
            tags,
        },
        now,
    ))
}

/// Pages through the whole search, one round trip per page, until the server
/// stops handing out cursors.
pub async fn fetch_all_runs<C: CommsClient>(
    query: &mut RunsQuery,
    comms: &C,
    api_version: &str,
) -> Result<Vec<Run>, GalasaError> {
    let mut runs = Vec::new();
    let mut pages = 0usize;
    loop {
        let page = query.get_runs_page_from_rest_api(comms, api_version).await?;
        pages += 1;
        runs.extend(page.runs.iter().cloned());
        match page.next_page_cursor() {
            Some(cursor) => {
                query.set_page_cursor(cursor);
                debug!(page = pages, cursor = ?query.page_cursor(), "more runs available");
            }
            None => break,
        }
    }
    debug!(pages, total_runs = runs.len(), "run search complete");
    Ok(runs)
}

pub async fn run_runs_get<C: CommsClient>(
    comms: &C,
    criteria: RunsGetCriteria,
    format: RunsFormat,
    api_version: &str,
) -> Result<()> {
    let mut query = build_runs_query(criteria, format, Utc::now())?;
    info!(
        api_server_url = comms.api_server_url(),
        from = ?query.from_time(),
        to = ?query.to_time(),
        "querying runs"
    );
    let runs = fetch_all_runs(&mut query, comms, api_version).await?;
    print!("{}", format_runs(format, &runs, comms.api_server_url())?);
    Ok(())
}
