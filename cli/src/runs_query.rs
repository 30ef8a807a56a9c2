//! Filtered, paginated run search.
//!
//! A [`RunsQuery`] is built once per logical search. Its time window is fixed
//! at construction so every page of the search sees the same bounds; only the
//! page cursor moves between calls. Each call to
//! [`RunsQuery::get_runs_page_from_rest_api`] is exactly one round trip; the
//! caller drives pagination (see `runs_get::fetch_all_runs`).

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::GalasaError;
use crate::galasaapi::{ApiClient, RasSearchRunsRequest};
use crate::http_client::CommsClient;
use crate::run_types::{RunResults, ACTIVE_STATUS_NAMES};

/// `detail` value asking the server to include per-method results.
pub const METHOD_DETAIL_QUERY_PARAM: &str = "methods";

const SORT_NEWEST_FIRST: &str = "from:desc";

/// Raw search criteria as the command line supplies them.
#[derive(Debug, Clone, Default)]
pub struct RunsQueryFilters {
    pub run_name: Option<String>,
    pub requestor: Option<String>,
    pub result: Option<String>,
    pub group: Option<String>,
    /// Minutes before `now` for the lower bound, `0` for none.
    pub from_age_mins: u64,
    /// Minutes before `now` for the upper bound, `0` for none.
    pub to_age_mins: u64,
    pub active_only: bool,
    pub need_method_details: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunsQuery {
    page_cursor: Option<String>,
    run_name: Option<String>,
    requestor: Option<String>,
    result: Option<String>,
    group: Option<String>,
    from_time: Option<DateTime<Utc>>,
    to_time: Option<DateTime<Utc>>,
    should_get_active: bool,
    is_needing_method_details: bool,
    tags: Vec<String>,
}

impl RunsQuery {
    pub fn new(filters: RunsQueryFilters, now: DateTime<Utc>) -> Self {
        Self {
            page_cursor: None,
            run_name: non_empty(filters.run_name),
            requestor: non_empty(filters.requestor),
            result: non_empty(filters.result),
            group: non_empty(filters.group),
            from_time: minutes_before(now, filters.from_age_mins),
            to_time: minutes_before(now, filters.to_age_mins),
            should_get_active: filters.active_only,
            is_needing_method_details: filters.need_method_details,
            tags: filters.tags,
        }
    }

    /// An empty cursor resets the search to its first page.
    pub fn set_page_cursor(&mut self, cursor: &str) {
        self.page_cursor = non_empty(Some(cursor.to_string()));
    }

    pub fn page_cursor(&self) -> Option<&str> {
        self.page_cursor.as_deref()
    }

    pub fn from_time(&self) -> Option<DateTime<Utc>> {
        self.from_time
    }

    pub fn to_time(&self) -> Option<DateTime<Utc>> {
        self.to_time
    }

    /// Applies the criteria to a search request for the given API level.
    pub fn build_request(&self, api: &ApiClient, api_version: &str) -> RasSearchRunsRequest {
        let mut call = api
            .ras_search_runs()
            .client_api_version(api_version)
            .include_cursor(true);

        if let Some(t) = self.from_time {
            call = call.from(t);
        }
        if let Some(t) = self.to_time {
            call = call.to(t);
        }
        if let Some(v) = &self.run_name {
            call = call.runname(v);
        }
        if let Some(v) = &self.requestor {
            call = call.requestor(v);
        }
        if let Some(v) = &self.result {
            call = call.result(v);
        }
        if self.should_get_active {
            call = call.status(&ACTIVE_STATUS_NAMES);
        }
        if let Some(v) = &self.page_cursor {
            call = call.cursor(v);
        }
        if let Some(v) = &self.group {
            call = call.group(v);
        }
        if self.is_needing_method_details {
            call = call.detail(METHOD_DETAIL_QUERY_PARAM);
        }
        if !self.tags.is_empty() {
            call = call.tags(&self.tags.join(","));
        }

        call.sort(SORT_NEWEST_FIRST)
    }

    /// Fetches the page the current cursor points at.
    pub async fn get_runs_page_from_rest_api<C: CommsClient>(
        &self,
        comms: &C,
        api_version: &str,
    ) -> Result<RunResults, GalasaError> {
        comms
            .run_authenticated_command_with_rate_limit_retries(|api| {
                let request = self.build_request(&api, api_version);
                debug!(request = %request.path_and_query(), "searching runs");
                async move {
                    let response =
                        request
                            .execute()
                            .await
                            .map_err(|e| GalasaError::QueryRunsFailed {
                                status: e.status_code(),
                                reason: e.message,
                            })?;

                    if response.status != 200 {
                        return Err(GalasaError::QueryRunsFailed {
                            status: response.status,
                            reason: format!("http response status code: {}", response.status),
                        });
                    }

                    debug!("HTTP status was OK");
                    debug!(runs_on_this_page = response.body.runs.len(), "fetched runs page");
                    Ok(response.body)
                }
            })
            .await
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `None` for a zero age, or when the instant is out of range.
pub fn minutes_before(now: DateTime<Utc>, minutes: u64) -> Option<DateTime<Utc>> {
    if minutes == 0 {
        return None;
    }
    let minutes = i64::try_from(minutes).ok()?;
    Duration::try_minutes(minutes).and_then(|d| now.checked_sub_signed(d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use httpmock::prelude::*;
    use std::cell::Cell;
    use std::future::Future;

    /// Hands the operation a client once, with no retry policy.
    struct PassThroughComms {
        api: ApiClient,
        calls: Cell<usize>,
    }

    impl PassThroughComms {
        fn new(base_url: &str) -> Self {
            Self {
                api: ApiClient::new(
                    base_url,
                    Some("tok".to_string()),
                    std::time::Duration::from_secs(5),
                )
                .expect("client"),
                calls: Cell::new(0),
            }
        }
    }

    impl CommsClient for PassThroughComms {
        fn api_server_url(&self) -> &str {
            self.api.base_url()
        }

        async fn run_authenticated_command_with_rate_limit_retries<T, F, Fut>(
            &self,
            mut op: F,
        ) -> Result<T, GalasaError>
        where
            F: FnMut(ApiClient) -> Fut,
            Fut: Future<Output = Result<T, GalasaError>>,
        {
            self.calls.set(self.calls.get() + 1);
            op(self.api.clone()).await
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn api() -> ApiClient {
        ApiClient::new("http://galasa.test", None, std::time::Duration::from_secs(5))
            .expect("client")
    }

    #[test]
    fn zero_ages_leave_the_window_open() {
        let query = RunsQuery::new(RunsQueryFilters::default(), now());
        assert_eq!(query.from_time(), None);
        assert_eq!(query.to_time(), None);

        let req = query.build_request(&api(), "0.41.0");
        assert_eq!(req.query_value("from"), None);
        assert_eq!(req.query_value("to"), None);
    }

    #[test]
    fn ages_are_subtracted_from_now_in_utc() {
        let query = RunsQuery::new(
            RunsQueryFilters {
                from_age_mins: 90,
                to_age_mins: 30,
                ..Default::default()
            },
            now(),
        );
        assert_eq!(
            query.from_time(),
            Some(Utc.with_ymd_and_hms(2024, 5, 10, 10, 30, 0).unwrap())
        );
        assert_eq!(
            query.to_time(),
            Some(Utc.with_ymd_and_hms(2024, 5, 10, 11, 30, 0).unwrap())
        );

        let req = query.build_request(&api(), "0.41.0");
        assert_eq!(req.query_value("from"), Some("2024-05-10T10:30:00Z"));
        assert_eq!(req.query_value("to"), Some("2024-05-10T11:30:00Z"));
    }

    #[test]
    fn fixed_parameters_are_always_present() {
        let query = RunsQuery::new(RunsQueryFilters::default(), now());
        let req = query.build_request(&api(), "0.41.0");
        assert_eq!(req.api_version(), Some("0.41.0"));
        assert_eq!(req.query_value("includeCursor"), Some("true"));
        assert_eq!(req.query_value("sort"), Some("from:desc"));
        assert_eq!(req.query_pairs().len(), 2);
    }

    #[test]
    fn empty_strings_do_not_become_filters() {
        let query = RunsQuery::new(
            RunsQueryFilters {
                run_name: Some(String::new()),
                requestor: Some(String::new()),
                result: Some(String::new()),
                group: Some(String::new()),
                ..Default::default()
            },
            now(),
        );
        let req = query.build_request(&api(), "0.41.0");
        for name in ["runname", "requestor", "result", "group"] {
            assert_eq!(req.query_value(name), None, "{} should be unset", name);
        }
    }

    #[test]
    fn page_cursor_is_the_only_thing_that_changes() {
        let mut query = RunsQuery::new(
            RunsQueryFilters {
                run_name: Some("U123".to_string()),
                from_age_mins: 60,
                ..Default::default()
            },
            now(),
        );
        let before = query.build_request(&api(), "0.41.0");
        assert_eq!(before.query_value("cursor"), None);

        query.set_page_cursor("next-page");
        let after = query.build_request(&api(), "0.41.0");
        assert_eq!(after.query_value("cursor"), Some("next-page"));

        let strip = |pairs: &[(&'static str, String)]| -> Vec<(&'static str, String)> {
            pairs.iter().filter(|(k, _)| *k != "cursor").cloned().collect()
        };
        assert_eq!(strip(before.query_pairs()), strip(after.query_pairs()));

        query.set_page_cursor("");
        assert_eq!(query.page_cursor(), None);
    }

    #[test]
    fn active_only_sends_the_active_status_list_alongside_result() {
        let query = RunsQuery::new(
            RunsQueryFilters {
                result: Some("Passed".to_string()),
                active_only: true,
                ..Default::default()
            },
            now(),
        );
        let req = query.build_request(&api(), "0.41.0");
        assert_eq!(req.query_value("status"), Some(ACTIVE_STATUS_NAMES.join(",").as_str()));
        assert_eq!(req.query_value("result"), Some("Passed"));
    }

    #[test]
    fn tags_are_comma_joined_in_order() {
        let query = RunsQuery::new(
            RunsQueryFilters {
                tags: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                ..Default::default()
            },
            now(),
        );
        let req = query.build_request(&api(), "0.41.0");
        assert_eq!(req.query_value("tags"), Some("a,b,c"));
    }

    #[test]
    fn method_details_request_the_methods_detail() {
        let query = RunsQuery::new(
            RunsQueryFilters {
                need_method_details: true,
                group: Some("nightly".to_string()),
                ..Default::default()
            },
            now(),
        );
        let req = query.build_request(&api(), "0.41.0");
        assert_eq!(req.query_value("detail"), Some("methods"));
        assert_eq!(req.query_value("group"), Some("nightly"));
    }

    #[tokio::test]
    async fn ok_page_is_returned_after_one_round_trip() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/ras/runs")
                    .query_param("runname", "U456")
                    .query_param("includeCursor", "true")
                    .query_param("sort", "from:desc")
                    .header("clientapiversion", "0.41.0");
                then.status(200).json_body(serde_json::json!({
                    "pageSize": 100,
                    "amountOfRuns": 1,
                    "nextCursor": "cursor-2",
                    "runs": [{"runId": "r1", "testStructure": {"runName": "U456"}}]
                }));
            })
            .await;

        let comms = PassThroughComms::new(&server.base_url());
        let query = RunsQuery::new(
            RunsQueryFilters {
                run_name: Some("U456".to_string()),
                ..Default::default()
            },
            now(),
        );
        let page = query
            .get_runs_page_from_rest_api(&comms, "0.41.0")
            .await
            .expect("page");

        mock.assert_hits_async(1).await;
        assert_eq!(comms.calls.get(), 1);
        assert_eq!(page.runs.len(), 1);
        assert_eq!(page.next_page_cursor(), Some("cursor-2"));
    }

    #[tokio::test]
    async fn server_error_becomes_query_runs_failed_with_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ras/runs");
                then.status(500).body("internal");
            })
            .await;

        let comms = PassThroughComms::new(&server.base_url());
        let query = RunsQuery::new(RunsQueryFilters::default(), now());
        let err = query
            .get_runs_page_from_rest_api(&comms, "0.41.0")
            .await
            .expect_err("500");

        match &err {
            GalasaError::QueryRunsFailed { status, reason } => {
                assert_eq!(*status, 500);
                assert!(reason.contains("500"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn connection_failure_reports_status_zero() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        drop(listener);

        let comms = PassThroughComms::new(&base_url);
        let query = RunsQuery::new(RunsQueryFilters::default(), now());
        let err = query
            .get_runs_page_from_rest_api(&comms, "0.41.0")
            .await
            .expect_err("refused");

        match err {
            GalasaError::QueryRunsFailed { status, reason } => {
                assert_eq!(status, 0);
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn undecodable_body_keeps_the_response_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ras/runs");
                then.status(200).body("not json");
            })
            .await;

        let comms = PassThroughComms::new(&server.base_url());
        let query = RunsQuery::new(RunsQueryFilters::default(), now());
        let err = query
            .get_runs_page_from_rest_api(&comms, "0.41.0")
            .await
            .expect_err("decode");
        assert_eq!(err.http_status(), Some(200));
    }
}
