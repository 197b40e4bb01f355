//! Congress.gov API v3 connector.
//!
//! Lists bills for one Congress, newest updates first, following
//! `pagination.next` until it is absent or `max_pages` is reached.
//! Requires the API key named by `api_key_env`, sent as `X-Api-Key`.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use civitas_core::models::{
    format_ts_iso, normalize_bill_type, parse_timestamp, Bill, SourceRecord,
};
use civitas_core::retry::RetryPolicy;

use crate::config::CongressConfig;
use crate::http::{api_key_from_env, build_client, get_json};
use crate::traits::Connector;

pub struct CongressConnector {
    config: CongressConfig,
    policy: RetryPolicy,
    client: Client,
}

impl CongressConnector {
    pub fn new(config: CongressConfig, policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            config,
            policy,
            client: build_client(30)?,
        })
    }

    fn first_page_url(&self, since: Option<i64>) -> String {
        let mut url = format!(
            "{}/bill/{}?format=json&limit={}&offset=0&sort=updateDate+desc",
            self.config.base_url.trim_end_matches('/'),
            self.config.congress,
            self.config.page_size
        );
        if let Some(ts) = since {
            url.push_str("&fromDateTime=");
            url.push_str(&format_ts_iso(ts));
        }
        url
    }
}

#[async_trait]
impl Connector for CongressConnector {
    fn name(&self) -> &str {
        "congress"
    }

    fn description(&self) -> &str {
        "Federal bills and resolutions from the Congress.gov API"
    }

    async fn scan(&self, since: Option<i64>) -> Result<Vec<SourceRecord>> {
        let api_key = api_key_from_env(&self.config.api_key_env)?;
        let headers = [("X-Api-Key", api_key)];

        let mut records = Vec::new();
        let mut next = Some(self.first_page_url(since));
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages >= self.config.max_pages {
                tracing::info!(pages, "congress: max_pages reached");
                break;
            }
            let page = get_json(&self.client, &url, &headers, &self.policy).await?;
            pages += 1;

            let bills = parse_congress_bills(&page);
            tracing::debug!(pages, count = bills.len(), "congress: fetched page");
            records.extend(bills.into_iter().map(SourceRecord::Bill));

            next = page
                .pointer("/pagination/next")
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        Ok(records)
    }
}

/// Map a Congress.gov `/bill` list response into bills.
///
/// Entries missing a type or number are skipped.
pub fn parse_congress_bills(json: &Value) -> Vec<Bill> {
    let Some(items) = json.get("bills").and_then(Value::as_array) else {
        return Vec::new();
    };

    items.iter().filter_map(parse_bill).collect()
}

fn parse_bill(item: &Value) -> Option<Bill> {
    let congress = as_i64(item.get("congress")?)?;
    let bill_type = normalize_bill_type(item.get("type")?.as_str()?);
    let number = as_i64(item.get("number")?)?;
    let session = congress.to_string();

    let title = str_field(item, "title").unwrap_or_default();
    let latest_action = item.pointer("/latestAction/text").and_then(Value::as_str);
    let latest_action_date = item
        .pointer("/latestAction/actionDate")
        .and_then(Value::as_str);

    let public_law = item
        .get("laws")
        .and_then(Value::as_array)
        .and_then(|laws| {
            laws.iter().find_map(|law| {
                let kind = law.get("type").and_then(Value::as_str).unwrap_or_default();
                if kind.eq_ignore_ascii_case("Public Law") {
                    law.get("number").and_then(Value::as_str).map(str::to_string)
                } else {
                    None
                }
            })
        });

    let sponsor = item
        .get("sponsors")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .and_then(|s| s.get("fullName"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let updated_at = ["updateDateIncludingText", "updateDate"]
        .iter()
        .filter_map(|k| item.get(*k).and_then(Value::as_str))
        .find_map(parse_timestamp)
        .or_else(|| latest_action_date.and_then(parse_timestamp))
        .unwrap_or(0);

    let mut body = title.clone();
    if let Some(action) = latest_action {
        body.push_str("\n\nLatest action: ");
        body.push_str(action);
    }
    if let Some(law) = &public_law {
        body.push_str(&format!("\n\nBecame Public Law No: {}", law));
    }

    Some(Bill {
        id: Bill::make_id("us", &session, &bill_type, number),
        jurisdiction: "us".to_string(),
        source_url: congress_gov_url(congress, &bill_type, number),
        session,
        bill_type,
        number,
        title,
        summary_text: None,
        sponsor,
        introduced_date: str_field(item, "introducedDate"),
        latest_action: latest_action.map(str::to_string),
        latest_action_date: latest_action_date.map(str::to_string),
        public_law,
        body,
        source: "congress".to_string(),
        updated_at,
    })
}

fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_str()?.trim().parse().ok())
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Public congress.gov page for a bill.
fn congress_gov_url(congress: i64, bill_type: &str, number: i64) -> Option<String> {
    let slug = match bill_type {
        "hr" => "house-bill",
        "s" => "senate-bill",
        "hjres" => "house-joint-resolution",
        "sjres" => "senate-joint-resolution",
        "hconres" => "house-concurrent-resolution",
        "sconres" => "senate-concurrent-resolution",
        "hres" => "house-resolution",
        "sres" => "senate-resolution",
        _ => return None,
    };
    Some(format!(
        "https://www.congress.gov/bill/{}-congress/{}/{}",
        ordinal(congress),
        slug,
        number
    ))
}

fn ordinal(n: i64) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> Value {
        json!({
            "bills": [
                {
                    "congress": 117,
                    "latestAction": {
                        "actionDate": "2021-11-15",
                        "text": "Became Public Law No: 117-58."
                    },
                    "number": "3684",
                    "originChamber": "House",
                    "title": "Infrastructure Investment and Jobs Act",
                    "type": "HR",
                    "updateDate": "2023-01-11",
                    "updateDateIncludingText": "2023-01-11T13:54:01Z",
                    "url": "https://api.congress.gov/v3/bill/117/hr/3684?format=json",
                    "laws": [{ "number": "117-58", "type": "Public Law" }]
                },
                {
                    "congress": 117,
                    "number": 5,
                    "title": "A joint resolution",
                    "type": "SJRES",
                    "updateDate": "2022-02-01"
                },
                { "congress": 117, "title": "missing type and number" }
            ],
            "pagination": { "count": 3 }
        })
    }

    #[test]
    fn test_parse_congress_bills() {
        let bills = parse_congress_bills(&fixture());
        assert_eq!(bills.len(), 2);

        let iija = &bills[0];
        assert_eq!(iija.id, "us-117-hr3684");
        assert_eq!(iija.bill_type, "hr");
        assert_eq!(iija.number, 3684);
        assert_eq!(iija.public_law.as_deref(), Some("117-58"));
        assert_eq!(iija.latest_action_date.as_deref(), Some("2021-11-15"));
        assert_eq!(iija.updated_at, parse_timestamp("2023-01-11T13:54:01Z").unwrap());
        assert_eq!(
            iija.source_url.as_deref(),
            Some("https://www.congress.gov/bill/117th-congress/house-bill/3684")
        );
        assert!(iija.body.contains("Latest action: Became Public Law"));

        let sjres = &bills[1];
        assert_eq!(sjres.id, "us-117-sjres5");
        assert!(sjres.public_law.is_none());
    }

    #[test]
    fn test_ordinal() {
        assert_eq!(ordinal(111), "111th");
        assert_eq!(ordinal(117), "117th");
        assert_eq!(ordinal(101), "101st");
        assert_eq!(ordinal(102), "102nd");
        assert_eq!(ordinal(93), "93rd");
    }

    #[test]
    fn test_first_page_url() {
        let connector = CongressConnector::new(
            CongressConfig {
                congress: 118,
                base_url: "https://api.congress.gov/v3/".into(),
                api_key_env: "CONGRESS_API_KEY".into(),
                page_size: 50,
                max_pages: 1,
            },
            RetryPolicy::no_retry(),
        )
        .unwrap();
        assert_eq!(
            connector.first_page_url(Some(86_400)),
            "https://api.congress.gov/v3/bill/118?format=json&limit=50&offset=0&sort=updateDate+desc&fromDateTime=1970-01-02T00:00:00Z"
        );
    }
}
