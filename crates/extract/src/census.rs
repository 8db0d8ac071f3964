//! County geography from the Census ACS API.
//!
//! One GET returns every county as a JSON array of arrays; the first row is
//! the header. [`CensusClient`] owns the retry loop, [`parse_geography`]
//! turns the string rows into [`CanonicalGeoRecord`]s.

use std::thread;
use std::time::Duration;

use reregion_core::CanonicalGeoRecord;

use crate::error::ExtractError;

pub const CENSUS_FIELDS: &str = "NAME,B01003_001E,B01001_002E,B01001_026E,B19013_001E,B25031_001E,C08536_001E";

const SOURCE: &str = "census";
const USER_AGENT: &str = concat!("reregion/", env!("CARGO_PKG_VERSION"));

/// States present in the census result that are never loaded.
const EXCLUDED_STATES: &[&str] = &["District of Columbia", "Puerto Rico"];

/// Anything that can produce the raw census rows, header included.
pub trait GeographySource {
    fn fetch_geography_rows(&self) -> Result<Vec<Vec<String>>, ExtractError>;
}

pub struct CensusClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    attempts: u32,
    backoff: Duration,
}

impl CensusClient {
    /// `attempts` counts the first request. `backoff` is the wait before the
    /// first retry and doubles after each one.
    pub fn new(base_url: &str, api_key: &str, attempts: u32, backoff: Duration) -> Result<Self, ExtractError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ExtractError::Network {
                source: SOURCE.to_string(),
                attempts: 0,
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            attempts: attempts.max(1),
            backoff,
        })
    }

    /// Like [`new`](Self::new), reading the key from `key_env`.
    ///
    /// A missing variable is not an error; the API serves small volumes
    /// without a key.
    pub fn from_env(base_url: &str, key_env: &str, attempts: u32, backoff: Duration) -> Result<Self, ExtractError> {
        let api_key = std::env::var(key_env).unwrap_or_default();
        if api_key.is_empty() {
            log::warn!("{key_env} is not set, calling the census API without a key");
        }
        Self::new(base_url, &api_key, attempts, backoff)
    }

    fn query(&self) -> Vec<(&'static str, &str)> {
        let mut query = vec![("get", CENSUS_FIELDS), ("for", "county:*")];
        if !self.api_key.is_empty() {
            query.push(("key", self.api_key.as_str()));
        }
        query
    }

    /// GET with retry + exponential backoff.
    ///
    /// Transport errors, 429 and 5xx are retried until `attempts` requests
    /// have been made. Any other 4xx fails at once.
    fn request_with_retry(&self) -> Result<String, ExtractError> {
        let mut wait = self.backoff;
        let mut last_failure = String::new();

        for attempt in 1..=self.attempts {
            match self.http.get(&self.base_url).query(&self.query()).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if status == 429 || status >= 500 {
                        last_failure = format!("HTTP {status}");
                    } else if status >= 400 {
                        return Err(ExtractError::Rejected {
                            source: SOURCE.to_string(),
                            status,
                        });
                    } else {
                        return resp.text().map_err(|e| {
                            ExtractError::Malformed(format!("failed to read census response body: {e}"))
                        });
                    }
                }
                Err(e) => last_failure = e.to_string(),
            }

            if attempt < self.attempts {
                log::warn!(
                    "census request failed ({last_failure}), retry {}/{} in {}s",
                    attempt,
                    self.attempts - 1,
                    wait.as_secs()
                );
                thread::sleep(wait);
                wait = wait.saturating_mul(2);
            }
        }

        Err(ExtractError::Network {
            source: SOURCE.to_string(),
            attempts: self.attempts,
            message: last_failure,
        })
    }
}

impl GeographySource for CensusClient {
    fn fetch_geography_rows(&self) -> Result<Vec<Vec<String>>, ExtractError> {
        let body = self.request_with_retry()?;
        rows_from_json(&body)
    }
}

/// Flatten the census body into string rows. JSON nulls become `""`.
pub fn rows_from_json(body: &str) -> Result<Vec<Vec<String>>, ExtractError> {
    let trimmed = body.trim_start_matches('\u{feff}');
    let value: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
        ExtractError::Malformed(format!(
            "census response is not JSON: {e} (body: {})",
            snippet(trimmed, 200)
        ))
    })?;

    let rows = value
        .as_array()
        .ok_or_else(|| ExtractError::Malformed("census response is not an array of rows".into()))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let cells = row
                .as_array()
                .ok_or_else(|| ExtractError::Malformed(format!("census row {i} is not an array")))?;
            Ok(cells.iter().map(cell_text).collect())
        })
        .collect()
}

/// At most `max_chars` characters of `body`.
fn snippet(body: &str, max_chars: usize) -> &str {
    body.char_indices().nth(max_chars).map_or(body, |(i, _)| &body[..i])
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the canonical geography set from census rows.
///
/// Row layout: `NAME, population, male, female, median income, median gross
/// rent, aggregate commute, state FIPS, county FIPS`. Rows that do not fit it
/// are skipped with a warning.
pub fn parse_geography(rows: &[Vec<String>]) -> Vec<CanonicalGeoRecord> {
    let mut records = Vec::with_capacity(rows.len().saturating_sub(1));

    for (i, row) in rows.iter().enumerate().skip(1) {
        if row.len() < 9 {
            log::warn!("census row {i} has {} cells, expected 9", row.len());
            continue;
        }
        let Some((county_name, state_name)) = row[0].split_once(", ") else {
            log::warn!("census row {i}: cannot split {:?} into county and state", row[0]);
            continue;
        };
        if EXCLUDED_STATES.contains(&state_name) {
            continue;
        }

        let population = count(&row[1]);
        let commute = count(&row[6]);
        records.push(CanonicalGeoRecord {
            county_name: county_name.to_string(),
            population,
            male_count: count(&row[2]),
            female_count: count(&row[3]),
            median_income: count(&row[4]),
            median_gross_rent: count(&row[5]),
            avg_commute_minutes: if population == 0 { 0 } else { commute / population },
            state_fips: row[7].clone(),
            county_fips: row[8].clone(),
            state_name: state_name.to_string(),
        });
    }

    records
}

/// Census estimates are integers; missing or suppressed values count as 0.
fn count(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

/// Fetch and parse in one step.
pub fn get_census_data(source: &dyn GeographySource) -> Result<Vec<CanonicalGeoRecord>, ExtractError> {
    let rows = source.fetch_geography_rows()?;
    if rows.is_empty() {
        return Err(ExtractError::Malformed("census response has no header row".into()));
    }
    let records = parse_geography(&rows);
    log::info!("census: {} counties from {} rows", records.len(), rows.len() - 1);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const BODY: &str = r#"[
        ["NAME","B01003_001E","B01001_002E","B01001_026E","B19013_001E","B25031_001E","C08536_001E","state","county"],
        ["Fairfax County, Virginia","1147532","566000","581532","124831","1958","16065448","51","059"],
        ["District of Columbia, District of Columbia","705749","334000","371749","92266","1667","9000000","11","001"],
        ["Empty County, Texas","0",null,null,null,null,"0","48","999"]
    ]"#;

    #[test]
    fn non_json_body_with_multibyte_text_is_malformed() {
        let body = format!("{}é trailing", "x".repeat(199));
        match rows_from_json(&body) {
            Err(ExtractError::Malformed(msg)) => {
                assert!(msg.contains(&format!("{}é", "x".repeat(199))));
                assert!(!msg.contains("trailing"));
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn snippet_counts_characters() {
        assert_eq!(snippet("héllo", 2), "hé");
        assert_eq!(snippet("abc", 200), "abc");
    }

    fn client(server: &MockServer, attempts: u32) -> CensusClient {
        CensusClient::new(&server.url("/data"), "k", attempts, Duration::ZERO).unwrap()
    }

    #[test]
    fn parses_success_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/data")
                .query_param("get", CENSUS_FIELDS)
                .query_param("for", "county:*")
                .query_param("key", "k");
            then.status(200).body(BODY);
        });

        let records = get_census_data(&client(&server, 3)).unwrap();
        mock.assert();

        assert_eq!(records.len(), 2);
        let fairfax = &records[0];
        assert_eq!(fairfax.county_name, "Fairfax County");
        assert_eq!(fairfax.state_name, "Virginia");
        assert_eq!(fairfax.county_id(), "51059");
        assert_eq!(fairfax.avg_commute_minutes, 16065448 / 1147532);

        let empty = &records[1];
        assert_eq!(empty.population, 0);
        assert_eq!(empty.male_count, 0);
        assert_eq!(empty.avg_commute_minutes, 0);
    }

    #[test]
    fn server_errors_exhaust_attempts() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/data");
            then.status(503);
        });

        let err = client(&server, 3).fetch_geography_rows().unwrap_err();
        mock.assert_calls(3);
        match err {
            ExtractError::Network { attempts, message, .. } => {
                assert_eq!(attempts, 3);
                assert!(message.contains("503"));
            }
            other => panic!("expected network error, got {other}"),
        }
    }

    #[test]
    fn rate_limit_is_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/data");
            then.status(429);
        });

        assert!(client(&server, 2).fetch_geography_rows().is_err());
        mock.assert_calls(2);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/data");
            then.status(404);
        });

        let err = client(&server, 3).fetch_geography_rows().unwrap_err();
        mock.assert_calls(1);
        assert!(matches!(err, ExtractError::Rejected { status: 404, .. }));
    }

    #[test]
    fn unreachable_host_is_network_error() {
        // Nothing listens on port 9 here
        let client = CensusClient::new("http://127.0.0.1:9/data", "", 2, Duration::ZERO).unwrap();
        let err = client.fetch_geography_rows().unwrap_err();
        assert!(matches!(err, ExtractError::Network { attempts: 2, .. }));
    }

    #[test]
    fn empty_key_is_left_off_the_query() {
        let server = MockServer::start();
        let keyed = server.mock(|when, then| {
            when.method(GET).path("/data").query_param_exists("key");
            then.status(500);
        });
        let plain = server.mock(|when, then| {
            when.method(GET).path("/data");
            then.status(200).body("[[\"NAME\"]]");
        });

        let client = CensusClient::new(&server.url("/data"), "", 1, Duration::ZERO).unwrap();
        let rows = client.fetch_geography_rows().unwrap();
        assert_eq!(rows, vec![vec!["NAME".to_string()]]);
        keyed.assert_calls(0);
        plain.assert_calls(1);
    }

    #[test]
    fn non_array_body_is_malformed() {
        assert!(matches!(rows_from_json("{\"error\": 1}"), Err(ExtractError::Malformed(_))));
        assert!(matches!(rows_from_json("[1, 2]"), Err(ExtractError::Malformed(_))));
        assert!(matches!(rows_from_json("not json"), Err(ExtractError::Malformed(_))));
    }

    #[test]
    fn numbers_and_nulls_become_text() {
        let rows = rows_from_json("[[\"a\", 12, null, 1.5]]").unwrap();
        assert_eq!(rows[0], vec!["a", "12", "", "1.5"]);
    }

    #[test]
    fn unsplittable_and_short_rows_are_skipped() {
        let rows: Vec<Vec<String>> = vec![
            vec!["NAME".into()],
            ["Nowhere", "1", "1", "1", "1", "1", "1", "01", "001"].map(String::from).to_vec(),
            vec!["Short County, Ohio".into(), "5".into()],
        ];
        assert!(parse_geography(&rows).is_empty());
    }

    #[test]
    fn header_only_response_is_empty_set() {
        struct HeaderOnly;
        impl GeographySource for HeaderOnly {
            fn fetch_geography_rows(&self) -> Result<Vec<Vec<String>>, ExtractError> {
                Ok(vec![vec!["NAME".into()]])
            }
        }
        assert!(get_census_data(&HeaderOnly).unwrap().is_empty());
    }
}
