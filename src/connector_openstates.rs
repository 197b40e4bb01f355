//! OpenStates API v3 connector for state legislatures.
//!
//! One query per configured jurisdiction, paged with `page`/`per_page`
//! until `pagination.max_page` or `max_pages`. The API key named by
//! `api_key_env` is sent as `X-API-KEY`.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use civitas_core::models::{format_ts_iso, normalize_bill_type, parse_timestamp, Bill, SourceRecord};
use civitas_core::retry::RetryPolicy;

use crate::config::OpenStatesConfig;
use crate::http::{api_key_from_env, build_client, get_json};
use crate::traits::Connector;

pub struct OpenStatesConnector {
    config: OpenStatesConfig,
    policy: RetryPolicy,
    client: Client,
}

impl OpenStatesConnector {
    pub fn new(config: OpenStatesConfig, policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            config,
            policy,
            client: build_client(30)?,
        })
    }

    fn page_url(&self, jurisdiction: &str, page: u32, since: Option<i64>) -> Result<String> {
        let mut params: Vec<(&str, String)> = vec![
            ("jurisdiction", jurisdiction.to_string()),
            ("sort", "updated_desc".to_string()),
            ("include", "abstracts".to_string()),
            ("include", "sponsorships".to_string()),
            ("page", page.to_string()),
            ("per_page", self.config.per_page.to_string()),
        ];
        if let Some(session) = &self.config.session {
            params.push(("session", session.clone()));
        }
        if let Some(ts) = since {
            params.push(("updated_since", format_ts_iso(ts)));
        }
        let base = format!("{}/bills", self.config.base_url.trim_end_matches('/'));
        Ok(Url::parse_with_params(&base, &params)?.to_string())
    }
}

#[async_trait]
impl Connector for OpenStatesConnector {
    fn name(&self) -> &str {
        "openstates"
    }

    fn description(&self) -> &str {
        "State legislature bills from the OpenStates API"
    }

    async fn scan(&self, since: Option<i64>) -> Result<Vec<SourceRecord>> {
        let api_key = api_key_from_env(&self.config.api_key_env)?;
        let headers = [("X-API-KEY", api_key)];
        let mut records = Vec::new();

        for jurisdiction in &self.config.jurisdictions {
            let mut page = 1;
            loop {
                let url = self.page_url(jurisdiction, page, since)?;
                let json = get_json(&self.client, &url, &headers, &self.policy).await?;

                let bills = parse_openstates_bills(&json, jurisdiction);
                tracing::debug!(jurisdiction = %jurisdiction, page, count = bills.len(), "openstates: fetched page");
                records.extend(bills.into_iter().map(SourceRecord::Bill));

                let max_page = json
                    .pointer("/pagination/max_page")
                    .and_then(Value::as_u64)
                    .unwrap_or(1) as u32;
                if page >= max_page || page >= self.config.max_pages {
                    break;
                }
                page += 1;
            }
        }

        Ok(records)
    }
}

/// Map an OpenStates `/bills` response into bills. `jurisdiction` is the
/// configured value, used when the result has no parsable jurisdiction id.
pub fn parse_openstates_bills(json: &Value, jurisdiction: &str) -> Vec<Bill> {
    let Some(results) = json.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    let fallback = jurisdiction.trim().to_ascii_lowercase();
    let mut bills = Vec::new();

    for item in results {
        let identifier = item.get("identifier").and_then(Value::as_str).unwrap_or_default();
        let Some((bill_type, number)) = split_identifier(identifier) else {
            tracing::debug!(identifier, "openstates: skipping unparsable identifier");
            continue;
        };
        let Some(session) = item.get("session").and_then(Value::as_str) else {
            continue;
        };

        let state = item
            .pointer("/jurisdiction/id")
            .and_then(Value::as_str)
            .and_then(state_from_ocd_id)
            .unwrap_or_else(|| fallback.clone());

        let title = str_field(item, "title").unwrap_or_default();
        let summary_text = item
            .get("abstracts")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(|a| a.get("abstract"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let sponsor = item
            .get("sponsorships")
            .and_then(Value::as_array)
            .and_then(|s| {
                s.iter()
                    .find(|sp| sp.get("primary").and_then(Value::as_bool) == Some(true))
                    .or_else(|| s.first())
            })
            .and_then(|sp| sp.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let latest_action = str_field(item, "latest_action_description");

        let mut body = title.clone();
        if let Some(text) = &summary_text {
            body.push_str("\n\n");
            body.push_str(text);
        }
        if let Some(action) = &latest_action {
            body.push_str("\n\nLatest action: ");
            body.push_str(action);
        }

        let updated_at = item
            .get("updated_at")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .unwrap_or(0);

        bills.push(Bill {
            id: Bill::make_id(&state, session, &bill_type, number),
            jurisdiction: state,
            session: session.to_string(),
            bill_type,
            number,
            title,
            summary_text,
            sponsor,
            introduced_date: str_field(item, "first_action_date"),
            latest_action,
            latest_action_date: str_field(item, "latest_action_date"),
            public_law: None,
            body,
            source: "openstates".to_string(),
            source_url: str_field(item, "openstates_url"),
            updated_at,
        });
    }
    bills
}

/// `"SB 12"` → `("sb", 12)`, `"A.B. 5"` → `("ab", 5)`.
fn split_identifier(identifier: &str) -> Option<(String, i64)> {
    let digit_at = identifier.find(|c: char| c.is_ascii_digit())?;
    let bill_type = normalize_bill_type(&identifier[..digit_at]);
    if bill_type.is_empty() {
        return None;
    }
    let digits: String = identifier[digit_at..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    Some((bill_type, digits.parse().ok()?))
}

/// `ocd-jurisdiction/country:us/state:ny/government` → `ny`.
fn state_from_ocd_id(id: &str) -> Option<String> {
    id.split('/')
        .find_map(|part| part.strip_prefix("state:"))
        .map(|s| s.to_ascii_lowercase())
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_openstates_bills() {
        let page = json!({
            "results": [
                {
                    "id": "ocd-bill/abc",
                    "session": "2023-2024",
                    "jurisdiction": {
                        "id": "ocd-jurisdiction/country:us/state:ny/government",
                        "name": "New York"
                    },
                    "identifier": "S 1234",
                    "title": "Relates to tenant protections",
                    "updated_at": "2023-05-01T12:00:00.123456+00:00",
                    "openstates_url": "https://openstates.org/ny/bills/2023-2024/S1234/",
                    "first_action_date": "2023-01-10",
                    "latest_action_date": "2023-03-01",
                    "latest_action_description": "REFERRED TO HOUSING",
                    "abstracts": [{ "abstract": "Limits rent increases.", "note": "" }],
                    "sponsorships": [
                        { "name": "Cosponsor", "primary": false },
                        { "name": "Lead Sponsor", "primary": true }
                    ]
                },
                { "session": "2023-2024", "identifier": "RESOLUTION", "title": "No number" }
            ],
            "pagination": { "page": 1, "max_page": 1 }
        });

        let bills = parse_openstates_bills(&page, "New York");
        assert_eq!(bills.len(), 1);
        let b = &bills[0];
        assert_eq!(b.id, "ny-2023-2024-s1234");
        assert_eq!(b.jurisdiction, "ny");
        assert_eq!(b.sponsor.as_deref(), Some("Lead Sponsor"));
        assert_eq!(b.summary_text.as_deref(), Some("Limits rent increases."));
        assert_eq!(b.introduced_date.as_deref(), Some("2023-01-10"));
        assert!(b.body.contains("REFERRED TO HOUSING"));
        assert_eq!(b.updated_at, parse_timestamp("2023-05-01T12:00:00Z").unwrap());
    }

    #[test]
    fn test_split_identifier() {
        assert_eq!(split_identifier("SB 12"), Some(("sb".into(), 12)));
        assert_eq!(split_identifier("A.B. 5"), Some(("ab".into(), 5)));
        assert_eq!(split_identifier("HB 1-A"), Some(("hb".into(), 1)));
        assert_eq!(split_identifier("1234"), None);
        assert_eq!(split_identifier("SR"), None);
    }

    #[test]
    fn test_fallback_jurisdiction() {
        let page = json!({ "results": [{ "session": "2024", "identifier": "HB 7" }] });
        let bills = parse_openstates_bills(&page, "TX");
        assert_eq!(bills[0].jurisdiction, "tx");
        assert_eq!(bills[0].id, "tx-2024-hb7");
    }
}
