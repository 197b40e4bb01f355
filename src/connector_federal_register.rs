//! Federal Register API v1 connector for executive orders.
//!
//! No API key is needed. Pages are followed through `next_page_url`.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use civitas_core::models::{format_ts_iso, parse_date_ts, ExecutiveOrder, SourceRecord};
use civitas_core::retry::RetryPolicy;

use crate::config::FederalRegisterConfig;
use crate::http::{build_client, get_json};
use crate::traits::Connector;

const FIELDS: &[&str] = &[
    "executive_order_number",
    "title",
    "signing_date",
    "publication_date",
    "citation",
    "document_number",
    "html_url",
    "abstract",
    "president",
];

pub struct FederalRegisterConnector {
    config: FederalRegisterConfig,
    policy: RetryPolicy,
    client: Client,
}

impl FederalRegisterConnector {
    pub fn new(config: FederalRegisterConfig, policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            config,
            policy,
            client: build_client(30)?,
        })
    }

    fn first_page_url(&self, since: Option<i64>) -> String {
        let mut url = format!(
            "{}/documents.json?conditions[type][]=PRESDOCU&conditions[presidential_document_type][]=executive_order&per_page={}&order=newest",
            self.config.base_url.trim_end_matches('/'),
            self.config.per_page
        );
        for field in FIELDS {
            url.push_str("&fields[]=");
            url.push_str(field);
        }
        if let Some(ts) = since {
            // Date granularity only; the pipeline drops records older than the checkpoint.
            let iso = format_ts_iso(ts);
            url.push_str("&conditions[publication_date][gte]=");
            url.push_str(iso.get(..10).unwrap_or(&iso));
        }
        url
    }
}

#[async_trait]
impl Connector for FederalRegisterConnector {
    fn name(&self) -> &str {
        "federal_register"
    }

    fn description(&self) -> &str {
        "Presidential executive orders from the Federal Register API"
    }

    async fn scan(&self, since: Option<i64>) -> Result<Vec<SourceRecord>> {
        let mut records = Vec::new();
        let mut next = Some(self.first_page_url(since));
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages >= self.config.max_pages {
                tracing::info!(pages, "federal_register: max_pages reached");
                break;
            }
            let page = get_json(&self.client, &url, &[], &self.policy).await?;
            pages += 1;

            records.extend(
                parse_executive_orders(&page)
                    .into_iter()
                    .map(SourceRecord::ExecutiveOrder),
            );

            next = page
                .get("next_page_url")
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        Ok(records)
    }
}

/// Map a `documents.json` response into executive orders. Entries without
/// an executive order number are skipped.
pub fn parse_executive_orders(json: &Value) -> Vec<ExecutiveOrder> {
    let Some(results) = json.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut orders = Vec::new();
    for item in results {
        let Some(eo_number) = item.get("executive_order_number").and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        }) else {
            let document = str_field(item, "document_number").unwrap_or_default();
            tracing::debug!(
                document = %document,
                "federal_register: skipping entry without an executive order number"
            );
            continue;
        };

        let title = str_field(item, "title").unwrap_or_default();
        let signing_date = str_field(item, "signing_date");
        let publication_date = str_field(item, "publication_date");
        let abstract_text = str_field(item, "abstract");

        let mut body = title.clone();
        if let Some(text) = &abstract_text {
            body.push_str("\n\n");
            body.push_str(text);
        }

        let updated_at = publication_date
            .as_deref()
            .or(signing_date.as_deref())
            .and_then(|d| parse_date_ts(d).ok())
            .unwrap_or(0);

        orders.push(ExecutiveOrder {
            id: ExecutiveOrder::make_id(eo_number),
            eo_number,
            title,
            president: item
                .pointer("/president/name")
                .and_then(Value::as_str)
                .map(str::to_string),
            signing_date,
            publication_date,
            fr_citation: str_field(item, "citation"),
            document_number: str_field(item, "document_number"),
            body,
            source: "federal_register".to_string(),
            source_url: str_field(item, "html_url"),
            updated_at,
        });
    }
    orders
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
    fn test_parse_executive_orders() {
        let page = json!({
            "count": 3,
            "results": [
                {
                    "executive_order_number": 14067,
                    "title": "Ensuring Responsible Development of Digital Assets",
                    "signing_date": "2022-03-09",
                    "publication_date": "2022-03-14",
                    "citation": "87 FR 14143",
                    "document_number": "2022-05471",
                    "html_url": "https://www.federalregister.gov/documents/2022/03/14/2022-05471/ensuring-responsible-development-of-digital-assets",
                    "abstract": null,
                    "president": { "identifier": "joe-biden", "name": "Joseph R. Biden Jr." }
                },
                {
                    "executive_order_number": "14028",
                    "title": "Improving the Nation's Cybersecurity",
                    "publication_date": "2021-05-17",
                    "abstract": "Modernizes federal cybersecurity."
                },
                { "executive_order_number": null, "title": "Proclamation", "document_number": "2022-1" }
            ]
        });

        let orders = parse_executive_orders(&page);
        assert_eq!(orders.len(), 2);

        let digital = &orders[0];
        assert_eq!(digital.id, "eo-14067");
        assert_eq!(digital.fr_citation.as_deref(), Some("87 FR 14143"));
        assert_eq!(digital.president.as_deref(), Some("Joseph R. Biden Jr."));
        assert_eq!(digital.updated_at, parse_date_ts("2022-03-14").unwrap());

        let cyber = &orders[1];
        assert_eq!(cyber.eo_number, 14028);
        assert!(cyber.body.ends_with("Modernizes federal cybersecurity."));
    }

    #[test]
    fn test_entries_without_order_number_are_skipped() {
        let page = json!({
            "results": [
                { "title": "Memorandum on Export Controls", "document_number": "2023-17449" },
                { "executive_order_number": "", "title": "Notice" },
                { "executive_order_number": 14110, "title": "Safe, Secure, and Trustworthy Development and Use of Artificial Intelligence" }
            ]
        });
        let orders = parse_executive_orders(&page);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, "eo-14110");
    }

    #[test]
    fn test_first_page_url_adds_since_date() {
        let connector = FederalRegisterConnector::new(
            FederalRegisterConfig {
                base_url: "https://www.federalregister.gov/api/v1".into(),
                per_page: 100,
                max_pages: 1,
            },
            RetryPolicy::no_retry(),
        )
        .unwrap();
        let url = connector.first_page_url(Some(86_400));
        assert!(url.contains("per_page=100&order=newest"));
        assert!(url.contains("&fields[]=executive_order_number"));
        assert!(url.ends_with("&conditions[publication_date][gte]=1970-01-02"));
    }
}
