//! California Legislative Information bulk data connector.
//!
//! Reads the `pubinfo` export published at downloads.leginfo.legislature.ca.gov,
//! either as the downloaded `.zip` or its extracted directory. Two tables
//! are used:
//!
//! | File | Columns used |
//! |------|--------------|
//! | `BILL_TBL.dat` | bill id, session, measure type/number, chapter, latest version, `trans_update` |
//! | `BILL_VERSION_TBL.dat` | version id, bill id, version number, action/date, subject, `.lob` XML file |
//!
//! `.dat` files are tab-separated with backtick-quoted fields and a bare
//! `NULL` for missing values. Bill text lives in `.lob` files referenced by
//! `BILL_VERSION_TBL.bill_xml`; it is converted to plain text when present.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use civitas_core::models::{normalize_bill_type, parse_timestamp, Bill, SourceRecord};

use crate::activity::ActivityError;
use crate::config::CaliforniaConfig;
use crate::traits::Connector;

const BILL_TABLE: &str = "BILL_TBL.dat";
const VERSION_TABLE: &str = "BILL_VERSION_TBL.dat";
/// Upper bound for any single file read from the export.
const MAX_ENTRY_BYTES: u64 = 2 * 1024 * 1024 * 1024;

// BILL_TBL columns
const B_BILL_ID: usize = 0;
const B_SESSION_YEAR: usize = 1;
const B_SESSION_NUM: usize = 2;
const B_MEASURE_TYPE: usize = 3;
const B_MEASURE_NUM: usize = 4;
const B_CHAPTER_YEAR: usize = 6;
const B_CHAPTER_NUM: usize = 9;
const B_LATEST_VERSION: usize = 10;
const B_TRANS_UPDATE: usize = 13;

// BILL_VERSION_TBL columns
const V_VERSION_ID: usize = 0;
const V_BILL_ID: usize = 1;
const V_VERSION_NUM: usize = 2;
const V_ACTION_DATE: usize = 3;
const V_ACTION: usize = 4;
const V_SUBJECT: usize = 6;
const V_BILL_XML: usize = 14;
const V_TRANS_UPDATE: usize = 17;

pub struct CaliforniaConnector {
    config: CaliforniaConfig,
}

impl CaliforniaConnector {
    pub fn new(config: CaliforniaConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for CaliforniaConnector {
    fn name(&self) -> &str {
        "california"
    }

    fn description(&self) -> &str {
        "California bills from the leginfo pubinfo bulk export"
    }

    async fn scan(&self, _since: Option<i64>) -> Result<Vec<SourceRecord>> {
        let path = self.config.path.clone();
        let bills = tokio::task::spawn_blocking(move || -> Result<Vec<Bill>> {
            let mut export = Export::open(&path)?;
            read_bills(&mut export)
        })
        .await??;
        Ok(bills.into_iter().map(SourceRecord::Bill).collect())
    }
}

/// A pubinfo export on disk.
enum Export {
    Dir(PathBuf),
    Zip(zip::ZipArchive<File>),
}

impl Export {
    fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ActivityError::non_retryable(
                "missing_source",
                format!("California export does not exist: {}", path.display()),
            )
            .into());
        }
        if path.is_dir() {
            return Ok(Export::Dir(path.to_path_buf()));
        }
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let archive = zip::ZipArchive::new(file)
            .with_context(|| format!("{} is not a zip archive", path.display()))?;
        Ok(Export::Zip(archive))
    }

    /// Read a file by name, matching case-insensitively on the final path
    /// component. `Ok(None)` if the export has no such file.
    fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut out = Vec::new();
        match self {
            Export::Dir(root) => {
                let found = WalkDir::new(&*root)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .find(|e| {
                        e.file_type().is_file()
                            && e.file_name().to_string_lossy().eq_ignore_ascii_case(name)
                    });
                let Some(entry) = found else {
                    return Ok(None);
                };
                File::open(entry.path())?
                    .take(MAX_ENTRY_BYTES)
                    .read_to_end(&mut out)?;
            }
            Export::Zip(archive) => {
                let suffix = format!("/{}", name.to_ascii_lowercase());
                let found = archive.file_names().find(|n| {
                    let lower = n.to_ascii_lowercase();
                    lower == name.to_ascii_lowercase() || lower.ends_with(&suffix)
                });
                let Some(entry_name) = found.map(str::to_string) else {
                    return Ok(None);
                };
                archive
                    .by_name(&entry_name)?
                    .take(MAX_ENTRY_BYTES)
                    .read_to_end(&mut out)?;
            }
        }
        Ok(Some(out))
    }
}

fn read_bills(export: &mut Export) -> Result<Vec<Bill>> {
    let bill_bytes = export
        .read(BILL_TABLE)?
        .ok_or_else(|| anyhow::anyhow!("{} not found in California export", BILL_TABLE))?;
    let version_bytes = export.read(VERSION_TABLE)?.unwrap_or_default();

    let bill_rows = parse_dat(&String::from_utf8_lossy(&bill_bytes));
    let version_rows = parse_dat(&String::from_utf8_lossy(&version_bytes));

    let mut versions: HashMap<String, Vec<Version>> = HashMap::new();
    for row in &version_rows {
        if let Some(v) = Version::from_row(row) {
            versions.entry(v.bill_id.clone()).or_default().push(v);
        }
    }

    let mut bills = Vec::new();
    for row in &bill_rows {
        let bill_versions = field(row, B_BILL_ID).and_then(|id| versions.get(id));
        let Some(mut bill) = bill_from_row(row, bill_versions) else {
            continue;
        };
        if let Some(lob) = latest_version(row, bill_versions).and_then(|v| v.bill_xml.clone()) {
            match export.read(&lob)? {
                Some(xml) => {
                    let text = xml_to_text(&xml);
                    if !text.is_empty() {
                        bill.body.push_str("\n\n");
                        bill.body.push_str(&text);
                    }
                }
                None => tracing::debug!(bill = %bill.id, lob = %lob, "california: bill text file missing"),
            }
        }
        bills.push(bill);
    }

    bills.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(bills)
}

#[derive(Debug)]
struct Version {
    version_id: String,
    bill_id: String,
    version_num: i64,
    action_date: Option<String>,
    action: Option<String>,
    subject: Option<String>,
    bill_xml: Option<String>,
    trans_update: Option<i64>,
}

impl Version {
    fn from_row(row: &[Option<String>]) -> Option<Self> {
        Some(Self {
            version_id: field(row, V_VERSION_ID)?.to_string(),
            bill_id: field(row, V_BILL_ID)?.to_string(),
            version_num: field(row, V_VERSION_NUM)
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
            action_date: field(row, V_ACTION_DATE).map(date_part),
            action: field(row, V_ACTION).map(str::to_string),
            subject: field(row, V_SUBJECT).map(str::to_string),
            bill_xml: field(row, V_BILL_XML).map(str::to_string),
            trans_update: field(row, V_TRANS_UPDATE).and_then(parse_timestamp),
        })
    }
}

/// The version named by `latest_bill_version_id`, else the lowest
/// version number (leginfo numbers versions downward from introduction).
fn latest_version<'a>(
    row: &[Option<String>],
    versions: Option<&'a Vec<Version>>,
) -> Option<&'a Version> {
    let versions = versions?;
    if let Some(latest_id) = field(row, B_LATEST_VERSION) {
        if let Some(v) = versions.iter().find(|v| v.version_id == latest_id) {
            return Some(v);
        }
    }
    versions.iter().min_by_key(|v| v.version_num)
}

fn bill_from_row(row: &[Option<String>], versions: Option<&Vec<Version>>) -> Option<Bill> {
    let ca_bill_id = field(row, B_BILL_ID)?;
    let session_year = field(row, B_SESSION_YEAR)?;
    let bill_type = normalize_bill_type(field(row, B_MEASURE_TYPE)?);
    let number: i64 = field(row, B_MEASURE_NUM)?.parse().ok()?;

    let session = match field(row, B_SESSION_NUM) {
        Some(n) if n != "0" => format!("{}x{}", session_year, n),
        _ => session_year.to_string(),
    };

    let latest = latest_version(row, versions);
    let introduced = versions.and_then(|vs| {
        vs.iter()
            .find(|v| {
                v.action
                    .as_deref()
                    .is_some_and(|a| a.eq_ignore_ascii_case("Introduced"))
            })
            .and_then(|v| v.action_date.clone())
    });

    let title = latest
        .and_then(|v| v.subject.clone())
        .unwrap_or_default();

    let mut body = title.clone();
    if let (Some(year), Some(chapter)) = (field(row, B_CHAPTER_YEAR), field(row, B_CHAPTER_NUM)) {
        body.push_str(&format!("\n\nChaptered: Statutes of {}, Chapter {}", year, chapter));
    }

    let updated_at = std::iter::once(field(row, B_TRANS_UPDATE).and_then(parse_timestamp))
        .chain(versions.into_iter().flatten().map(|v| v.trans_update))
        .flatten()
        .max()
        .unwrap_or(0);

    Some(Bill {
        id: Bill::make_id("ca", &session, &bill_type, number),
        jurisdiction: "ca".to_string(),
        session,
        bill_type,
        number,
        title,
        summary_text: None,
        sponsor: None,
        introduced_date: introduced,
        latest_action: latest.and_then(|v| v.action.clone()),
        latest_action_date: latest.and_then(|v| v.action_date.clone()),
        public_law: None,
        body,
        source: "california".to_string(),
        source_url: Some(format!(
            "https://leginfo.legislature.ca.gov/faces/billNavClient.xhtml?bill_id={}",
            ca_bill_id
        )),
        updated_at,
    })
}

fn field(row: &[Option<String>], idx: usize) -> Option<&str> {
    row.get(idx)?.as_deref().filter(|s| !s.is_empty())
}

fn date_part(ts: &str) -> String {
    ts.split_whitespace().next().unwrap_or(ts).to_string()
}

fn finish_field(row: &mut Vec<Option<String>>, current: &mut String, quoted: bool) {
    let value = std::mem::take(current);
    if !quoted && (value.trim() == "NULL" || value.trim().is_empty()) {
        row.push(None);
    } else {
        row.push(Some(value));
    }
}

/// Parse a pubinfo `.dat` table. Fields are tab-separated; values are
/// wrapped in backticks and may contain tabs or newlines; a bare `NULL`
/// is a missing value.
pub fn parse_dat(text: &str) -> Vec<Vec<Option<String>>> {
    let mut rows = Vec::new();
    let mut row: Vec<Option<String>> = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;

    for c in text.chars() {
        if in_quotes {
            if c == '`' {
                in_quotes = false;
            } else {
                current.push(c);
            }
            continue;
        }
        match c {
            '`' => {
                in_quotes = true;
                quoted = true;
            }
            '\t' => {
                finish_field(&mut row, &mut current, quoted);
                quoted = false;
            }
            '\n' => {
                finish_field(&mut row, &mut current, quoted);
                quoted = false;
                if row.iter().any(Option::is_some) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            '\r' => {}
            _ => current.push(c),
        }
    }
    if quoted || !current.trim().is_empty() || !row.is_empty() {
        finish_field(&mut row, &mut current, quoted);
        if row.iter().any(Option::is_some) {
            rows.push(row);
        }
    }
    rows
}

/// Plain text of a bill XML document: text and CDATA nodes, with a newline
/// after paragraph-level elements.
pub fn xml_to_text(xml: &[u8]) -> String {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Text(te)) => {
                if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
                match te.unescape() {
                    Ok(text) => out.push_str(&text),
                    Err(_) => out.push_str(&String::from_utf8_lossy(&te)),
                }
            }
            Ok(quick_xml::events::Event::CData(cd)) => {
                if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
                out.push_str(&String::from_utf8_lossy(&cd));
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                if matches!(
                    name.as_ref(),
                    b"p" | b"P" | b"Title" | b"Subject" | b"Content" | b"LawSection" | b"Section"
                ) && !out.ends_with('\n')
                {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "california: malformed bill XML, keeping partial text");
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const BILL_TBL: &str = "`20230SB1047`\t`20232024`\t`0`\t`SB`\t`1047`\t`Chaptered`\tNULL\tNULL\tNULL\tNULL\t`20230SB104799AMD`\t`Y`\t`1`\t`2024-09-30 12:00:00`\n\
`20230AB5`\t`20232024`\t`0`\t`AB`\t`5`\t`Introduced`\tNULL\tNULL\tNULL\tNULL\tNULL\t`Y`\t`1`\t`2023-01-05 09:00:00`\n";

    const VERSION_TBL: &str = "`20230SB104799INT`\t`20230SB1047`\t`99`\t`2024-02-07 00:00:00`\t`Introduced`\tNULL\t`Artificial intelligence models.`\tNULL\tNULL\tNULL\tNULL\tNULL\tNULL\tNULL\t`BILL_VERSION_TBL_1.lob`\t`Y`\t`1`\t`2024-02-08 10:00:00`\n\
`20230SB104799AMD`\t`20230SB1047`\t`98`\t`2024-08-15 00:00:00`\t`Amended Assembly`\tNULL\t`Safe and Secure Innovation for Frontier Artificial Intelligence Models Act.`\tNULL\tNULL\tNULL\tNULL\tNULL\tNULL\tNULL\t`BILL_VERSION_TBL_2.lob`\t`Y`\t`1`\t`2024-08-16 10:00:00`\n";

    const LOB: &str = r#"<?xml version="1.0"?><caml:MeasureDoc xmlns:caml="http://lc.ca.gov/legalservices/schemas/caml.1#"><caml:Title>An act relating to artificial intelligence.</caml:Title><caml:Content><p>The people of the State of California do enact as follows:</p><p>Developers of covered models &amp; derivatives shall comply.</p></caml:Content></caml:MeasureDoc>"#;

    fn write_export(dir: &Path) {
        std::fs::write(dir.join(BILL_TABLE), BILL_TBL).unwrap();
        std::fs::write(dir.join(VERSION_TABLE), VERSION_TBL).unwrap();
        std::fs::write(dir.join("BILL_VERSION_TBL_2.lob"), LOB).unwrap();
    }

    #[test]
    fn test_parse_dat_handles_null_and_embedded_tabs() {
        let rows = parse_dat("`a`\tNULL\t`b\tc`\n`line\nbreak`\t`x`\n\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![Some("a".into()), None, Some("b\tc".into())]);
        assert_eq!(rows[1], vec![Some("line\nbreak".into()), Some("x".into())]);
    }

    #[test]
    fn test_xml_to_text() {
        let text = xml_to_text(LOB.as_bytes());
        assert!(text.starts_with("An act relating to artificial intelligence."));
        assert!(text.contains("covered models & derivatives"));
        assert!(!text.contains('<'));
    }

    #[tokio::test]
    async fn test_scan_directory_export() {
        let tmp = TempDir::new().unwrap();
        write_export(tmp.path());

        let connector = CaliforniaConnector::new(CaliforniaConfig {
            path: tmp.path().to_path_buf(),
        });
        let records = connector.scan(None).await.unwrap();
        assert_eq!(records.len(), 2);

        let SourceRecord::Bill(sb) = &records[1] else {
            panic!("expected bill");
        };
        assert_eq!(sb.id, "ca-20232024-sb1047");
        assert_eq!(
            sb.title,
            "Safe and Secure Innovation for Frontier Artificial Intelligence Models Act."
        );
        assert_eq!(sb.introduced_date.as_deref(), Some("2024-02-07"));
        assert_eq!(sb.latest_action.as_deref(), Some("Amended Assembly"));
        assert_eq!(sb.updated_at, parse_timestamp("2024-09-30 12:00:00").unwrap());
        assert!(sb.body.contains("Developers of covered models"));
        assert!(sb
            .source_url
            .as_deref()
            .unwrap()
            .ends_with("bill_id=20230SB1047"));

        let SourceRecord::Bill(ab) = &records[0] else {
            panic!("expected bill");
        };
        assert_eq!(ab.id, "ca-20232024-ab5");
        assert!(ab.title.is_empty());
    }

    #[tokio::test]
    async fn test_scan_zip_export() {
        let tmp = TempDir::new().unwrap();
        let zip_path = tmp.path().join("pubinfo_2023.zip");
        {
            let file = File::create(&zip_path).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            let opts = zip::write::SimpleFileOptions::default();
            for (name, body) in [
                (BILL_TABLE, BILL_TBL),
                (VERSION_TABLE, VERSION_TBL),
                ("BILL_VERSION_TBL_2.lob", LOB),
            ] {
                zip.start_file(format!("pubinfo/{}", name), opts).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }

        let connector = CaliforniaConnector::new(CaliforniaConfig { path: zip_path });
        let records = connector.scan(None).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].body().contains("Developers of covered models"));
    }

    #[tokio::test]
    async fn test_missing_export_is_an_error() {
        let connector = CaliforniaConnector::new(CaliforniaConfig {
            path: PathBuf::from("/nonexistent/pubinfo.zip"),
        });
        let err = connector.scan(None).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
