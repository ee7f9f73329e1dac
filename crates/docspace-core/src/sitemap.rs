//! `sitemap.xml` built from the listings API.

use std::collections::HashSet;
use std::fmt::{self, Write as _};

use chrono::NaiveDate;

use crate::company::CompanyRecord;
use crate::config::{SiteConfig, SitemapConfig};
use crate::error::EdgeError;
use crate::http::header::ACCEPT;
use crate::http::HeaderValue;
use crate::proxy::{ProxyHandle, ProxyRequest};

pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

const INDUSTRIES: [&str; 10] = [
    "retail",
    "financial-services",
    "technology",
    "healthcare",
    "construction",
    "manufacturing",
    "professional-services",
    "real-estate",
    "hospitality",
    "transport",
];

const LOCATIONS: [&str; 10] = [
    "london",
    "manchester",
    "birmingham",
    "glasgow",
    "edinburgh",
    "liverpool",
    "bristol",
    "leeds",
    "sheffield",
    "cardiff",
];

const WELL_KNOWN_NAMES: [&str; 10] = [
    "TESCO",
    "SAINSBURY",
    "MARKS & SPENCER",
    "BRITISH TELECOM",
    "VODAFONE",
    "BARCLAYS",
    "LLOYDS",
    "HSBC",
    "BP",
    "SHELL",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeFreq {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ChangeFreq {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
        }
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlEntry {
    pub path: String,
    pub priority: &'static str,
    pub changefreq: ChangeFreq,
}

impl UrlEntry {
    pub fn new(path: impl Into<String>, priority: &'static str, changefreq: ChangeFreq) -> Self {
        Self {
            path: path.into(),
            priority,
            changefreq,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SitemapBuilder {
    base_url: String,
    api_url: String,
    listing_limit: u32,
}

impl SitemapBuilder {
    pub fn new(site: &SiteConfig, sitemap: &SitemapConfig) -> Self {
        Self {
            base_url: site.base_url.trim_end_matches('/').to_string(),
            api_url: sitemap.api_url.trim_end_matches('/').to_string(),
            listing_limit: sitemap.listing_limit,
        }
    }

    /// `oldest` and `newest` listing endpoints.
    pub fn listing_urls(&self) -> [String; 2] {
        [
            format!("{}/api/oldest?limit={}", self.api_url, self.listing_limit),
            format!("{}/api/newest?limit={}", self.api_url, self.listing_limit),
        ]
    }

    /// Fetch both listings concurrently and render the full sitemap. A listing that
    /// fails counts as empty; when both fail the result is the basic sitemap.
    pub async fn generate(&self, handle: &ProxyHandle, today: NaiveDate) -> String {
        let [oldest_url, newest_url] = self.listing_urls();
        let (oldest, newest) = futures::future::join(
            fetch_listing(handle, &oldest_url),
            fetch_listing(handle, &newest_url),
        )
        .await;

        let mut companies = Vec::new();
        let mut failures = 0;
        for (url, listing) in [(&oldest_url, oldest), (&newest_url, newest)] {
            match listing {
                Ok(records) => companies.extend(records),
                Err(err) => {
                    log::warn!("sitemap listing {} unavailable: {}", url, err);
                    failures += 1;
                }
            }
        }

        if failures == 2 {
            log::error!("no sitemap listings available; serving basic sitemap");
            return self.basic_sitemap(today);
        }

        let unique = dedupe(companies);
        log::info!("generated sitemap with {} companies", unique.len());
        self.render(&self.entries_for(&unique), today)
    }

    /// Home page and the four listing pages.
    pub fn main_pages(&self) -> Vec<UrlEntry> {
        vec![
            UrlEntry::new("/", "1.0", ChangeFreq::Daily),
            UrlEntry::new("/oldest-companies", "0.9", ChangeFreq::Weekly),
            UrlEntry::new("/newest-companies", "0.9", ChangeFreq::Weekly),
            UrlEntry::new("/royal-charter-companies", "0.8", ChangeFreq::Monthly),
            UrlEntry::new("/plc-companies", "0.8", ChangeFreq::Weekly),
        ]
    }

    pub fn entries_for(&self, companies: &[CompanyRecord]) -> Vec<UrlEntry> {
        let mut entries = self.main_pages();
        entries.extend(
            INDUSTRIES
                .iter()
                .map(|slug| UrlEntry::new(format!("/industries/{slug}"), "0.7", ChangeFreq::Monthly)),
        );
        entries.extend(
            LOCATIONS
                .iter()
                .map(|slug| UrlEntry::new(format!("/companies/{slug}"), "0.7", ChangeFreq::Monthly)),
        );
        entries.extend(companies.iter().filter_map(|company| {
            let number = company.normalized_number()?;
            Some(UrlEntry::new(
                format!("/company/{number}"),
                company_priority(company),
                company_changefreq(company),
            ))
        }));
        entries
    }

    pub fn basic_sitemap(&self, today: NaiveDate) -> String {
        self.render(&self.main_pages(), today)
    }

    pub fn render(&self, entries: &[UrlEntry], today: NaiveDate) -> String {
        let lastmod = today.format("%Y-%m-%d").to_string();
        let mut xml = String::with_capacity(128 + entries.len() * 160);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(xml, "<urlset xmlns=\"{SITEMAP_NAMESPACE}\">");
        for entry in entries {
            let loc = xml_escape(&format!("{}{}", self.base_url, entry.path));
            let _ = writeln!(
                xml,
                "  <url>\n    <loc>{loc}</loc>\n    <lastmod>{lastmod}</lastmod>\n    <changefreq>{}</changefreq>\n    <priority>{}</priority>\n  </url>",
                entry.changefreq, entry.priority
            );
        }
        xml.push_str("</urlset>");
        xml
    }
}

async fn fetch_listing(handle: &ProxyHandle, url: &str) -> Result<Vec<CompanyRecord>, EdgeError> {
    let mut request = ProxyRequest::get(url)?;
    request
        .headers_mut()
        .insert(ACCEPT, HeaderValue::from_static("application/json"));

    let response = handle.send(request).await?;
    if !response.status().is_success() {
        return Err(EdgeError::internal(anyhow::anyhow!(
            "HTTP {}",
            response.status().as_u16()
        )));
    }
    response.body().to_json().map_err(EdgeError::internal)
}

/// First occurrence of each normalized company number wins.
pub fn dedupe(companies: Vec<CompanyRecord>) -> Vec<CompanyRecord> {
    let mut seen = HashSet::new();
    companies
        .into_iter()
        .filter(|company| match company.normalized_number() {
            Some(number) => seen.insert(number),
            None => true,
        })
        .collect()
}

pub fn company_priority(company: &CompanyRecord) -> &'static str {
    let number = company.normalized_number().unwrap_or_default();
    if number.starts_with("RC") {
        return "0.9";
    }

    let name = company.name_or_empty();
    let upper = name.to_uppercase();
    if WELL_KNOWN_NAMES.iter().any(|known| upper.contains(known)) {
        return "0.8";
    }
    if name.contains("PLC") {
        return "0.7";
    }
    "0.5"
}

pub fn company_changefreq(company: &CompanyRecord) -> ChangeFreq {
    match company.normalized_number() {
        Some(number) if number.starts_with("RC") => ChangeFreq::Yearly,
        _ => ChangeFreq::Monthly,
    }
}

pub fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::http::StatusCode;
    use crate::proxy::{ProxyClient, ProxyResponse};
    use async_trait::async_trait;
    use futures::executor::block_on;
    use serde_json::json;

    fn builder() -> SitemapBuilder {
        SitemapBuilder::new(
            &SiteConfig::default(),
            &SitemapConfig {
                api_url: "https://listings.example/".into(),
                listing_limit: 1000,
            },
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 9).expect("date")
    }

    /// Serves `oldest` and `newest` from fixed payloads; `None` means a transport error.
    struct ListingClient {
        oldest: Option<(StatusCode, serde_json::Value)>,
        newest: Option<(StatusCode, serde_json::Value)>,
    }

    #[async_trait(?Send)]
    impl ProxyClient for ListingClient {
        async fn send(&self, request: ProxyRequest) -> Result<ProxyResponse, EdgeError> {
            assert_eq!(request.uri().query(), Some("limit=1000"));
            let listing = if request.uri().path() == "/api/oldest" {
                &self.oldest
            } else {
                &self.newest
            };
            match listing {
                Some((status, payload)) => Ok(ProxyResponse::new(
                    *status,
                    Body::json(payload).expect("json"),
                )),
                None => Err(EdgeError::internal(anyhow::anyhow!("connection refused"))),
            }
        }
    }

    #[test]
    fn shared_company_appears_once() {
        let handle = ProxyHandle::with_client(ListingClient {
            oldest: Some((
                StatusCode::OK,
                json!([
                    { "CompanyNumber": "00000006", "CompanyName": "MARINE AND GENERAL" },
                    { "CompanyNumber": "RC000766", "CompanyName": "THE SOCIETY" }
                ]),
            )),
            newest: Some((
                StatusCode::OK,
                json!([
                    { "number": "00000006", "name": "MARINE AND GENERAL" },
                    { "company_number": "15000001", "company_name": "FRESH LTD" }
                ]),
            )),
        });

        let xml = block_on(builder().generate(&handle, today()));
        assert_eq!(
            xml.matches("<loc>https://docspace.uk/company/00000006</loc>")
                .count(),
            1
        );
        assert!(xml.contains("<loc>https://docspace.uk/company/RC000766</loc>"));
        assert!(xml.contains("<loc>https://docspace.uk/company/15000001</loc>"));
        // 5 main + 10 industries + 10 locations + 3 companies
        assert_eq!(xml.matches("<url>").count(), 28);
    }

    #[test]
    fn one_failed_listing_counts_as_empty() {
        let handle = ProxyHandle::with_client(ListingClient {
            oldest: None,
            newest: Some((StatusCode::OK, json!([{ "number": "12387565" }]))),
        });

        let xml = block_on(builder().generate(&handle, today()));
        assert!(xml.contains("/company/12387565</loc>"));
        assert!(xml.contains("/industries/retail</loc>"));
    }

    #[test]
    fn all_listings_failing_returns_basic_sitemap() {
        let handle = ProxyHandle::with_client(ListingClient {
            oldest: Some((StatusCode::BAD_GATEWAY, json!({}))),
            newest: Some((StatusCode::OK, json!({ "not": "a list" }))),
        });

        let xml = block_on(builder().generate(&handle, today()));
        assert_eq!(xml, builder().basic_sitemap(today()));
        assert_eq!(xml.matches("<url>").count(), 5);
    }

    #[test]
    fn render_produces_sitemap_document() {
        let xml = builder().basic_sitemap(today());
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));
        assert!(xml.ends_with("</urlset>"));
        assert!(xml.contains(
            "  <url>\n    <loc>https://docspace.uk/</loc>\n    <lastmod>2025-03-09</lastmod>\n    <changefreq>daily</changefreq>\n    <priority>1.0</priority>\n  </url>"
        ));
        assert!(xml.contains("<loc>https://docspace.uk/royal-charter-companies</loc>"));
    }

    #[test]
    fn priorities_follow_name_and_number_rules() {
        let cases = [
            (CompanyRecord::new("RC000766", "ANY"), "0.9", ChangeFreq::Yearly),
            (CompanyRecord::new(" rc000767", "ANY"), "0.9", ChangeFreq::Yearly),
            (CompanyRecord::new("00445791", "tesco bank"), "0.8", ChangeFreq::Monthly),
            (CompanyRecord::new("00445790", "Tesco Stores"), "0.8", ChangeFreq::Monthly),
            (CompanyRecord::new("01234567", "ACME PLC"), "0.7", ChangeFreq::Monthly),
            (CompanyRecord::new("01234568", "acme plc"), "0.5", ChangeFreq::Monthly),
            (CompanyRecord::new("01234569", "ACME LIMITED"), "0.5", ChangeFreq::Monthly),
        ];
        for (company, priority, changefreq) in cases {
            assert_eq!(company_priority(&company), priority, "{:?}", company.name);
            assert_eq!(company_changefreq(&company), changefreq);
        }
    }

    #[test]
    fn dedupe_is_case_and_whitespace_insensitive() {
        let unique = dedupe(vec![
            CompanyRecord::new("sc123456", "FIRST"),
            CompanyRecord::new(" SC123456 ", "SECOND"),
            CompanyRecord::default(),
        ]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].name.as_deref(), Some("FIRST"));
    }

    #[test]
    fn records_without_numbers_are_skipped() {
        let entries = builder().entries_for(&[CompanyRecord::default()]);
        assert_eq!(entries.len(), 25);
    }

    #[test]
    fn loc_values_are_escaped() {
        let xml = builder().render(&[UrlEntry::new("/search?a=1&b=2", "0.1", ChangeFreq::Daily)], today());
        assert!(xml.contains("<loc>https://docspace.uk/search?a=1&amp;b=2</loc>"));
    }
}
