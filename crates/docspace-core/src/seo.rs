//! Search-engine metadata for company and category pages.
//!
//! `HeadDocument` is an in-memory model of a page's `<head>`: the `SeoMetaManager` writes
//! titles, meta tags, the canonical link and JSON-LD into it, and `render()` turns it into
//! the HTML fragment served to crawlers.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::company::CompanyRecord;
use crate::error::EdgeError;
use crate::templates;

pub const COMPANY_SCHEMA_ID: &str = "company-schema";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaAttribute {
    Name,
    Property,
}

impl MetaAttribute {
    /// Open Graph and Twitter cards are keyed by `property`, everything else by `name`.
    pub fn for_key(key: &str) -> Self {
        if key.starts_with("og:") || key.starts_with("twitter:") {
            MetaAttribute::Property
        } else {
            MetaAttribute::Name
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MetaTag {
    pub attribute: MetaAttribute,
    pub key: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub path: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq)]
struct StructuredData {
    id: String,
    value: Value,
}

#[derive(Clone, Debug, Default)]
pub struct HeadDocument {
    title: String,
    meta: Vec<MetaTag>,
    canonical: Option<String>,
    scripts: Vec<StructuredData>,
    history: Vec<HistoryEntry>,
}

#[derive(Serialize)]
struct HeadView<'a> {
    title: &'a str,
    meta: &'a [MetaTag],
    canonical: Option<&'a str>,
    scripts: Vec<ScriptView<'a>>,
}

#[derive(Serialize)]
struct ScriptView<'a> {
    id: &'a str,
    json: String,
}

impl HeadDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// `title` targets the document title; any other key creates or updates a `<meta>`.
    pub fn set_meta_tag(&mut self, key: &str, content: impl Into<String>) {
        let content = content.into();
        if key == "title" {
            self.title = content;
            return;
        }

        let attribute = MetaAttribute::for_key(key);
        match self
            .meta
            .iter_mut()
            .find(|tag| tag.attribute == attribute && tag.key == key)
        {
            Some(tag) => tag.content = content,
            None => self.meta.push(MetaTag {
                attribute,
                key: key.to_string(),
                content,
            }),
        }
    }

    pub fn meta_content(&self, key: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.content.as_str())
    }

    pub fn meta_tags(&self) -> &[MetaTag] {
        &self.meta
    }

    pub fn canonical(&self) -> Option<&str> {
        self.canonical.as_deref()
    }

    pub fn set_canonical_url(&mut self, url: impl Into<String>) {
        self.canonical = Some(url.into());
    }

    /// Replace any JSON-LD block carrying the same element id.
    pub fn set_structured_data(&mut self, id: &str, value: Value) {
        self.scripts.retain(|script| script.id != id);
        self.scripts.push(StructuredData {
            id: id.to_string(),
            value,
        });
    }

    pub fn structured_data(&self, id: &str) -> Option<&Value> {
        self.scripts
            .iter()
            .find(|script| script.id == id)
            .map(|script| &script.value)
    }

    pub fn push_history(&mut self, path: impl Into<String>, title: impl Into<String>) {
        self.history.push(HistoryEntry {
            path: path.into(),
            title: title.into(),
        });
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn current_path(&self) -> Option<&str> {
        self.history.last().map(|entry| entry.path.as_str())
    }

    pub fn render(&self) -> Result<String, EdgeError> {
        let scripts = self
            .scripts
            .iter()
            .map(|script| {
                let json = serde_json::to_string_pretty(&script.value)
                    .map_err(EdgeError::internal)?;
                Ok(ScriptView {
                    id: &script.id,
                    // keep `</script>` inside string values from closing the block
                    json: json.replace("</", "<\\/"),
                })
            })
            .collect::<Result<Vec<_>, EdgeError>>()?;

        let view = HeadView {
            title: &self.title,
            meta: &self.meta,
            canonical: self.canonical.as_deref(),
            scripts,
        };
        templates::render(templates::HEAD, &view)
    }
}

/// Static copy for a listing page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageMeta {
    pub title: &'static str,
    pub description: &'static str,
    pub keywords: &'static str,
    pub image: Option<&'static str>,
}

pub const DEFAULT_META: PageMeta = PageMeta {
    title: "Companies House Bulk Download - Get All PDFs for £5 | DocSpace",
    description: "Download all Companies House documents instantly. Get every PDF filing for any UK company in one ZIP file. Official API, secure payment, £5 per company.",
    keywords: "companies house documents, uk company filings, download company documents",
    image: Some("https://docspace.uk/og-image.png"),
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Oldest,
    Newest,
    RoyalCharter,
    Plc,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Oldest,
        Category::Newest,
        Category::RoyalCharter,
        Category::Plc,
    ];

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.slug() == slug)
    }

    /// Category behind one of the listing paths, e.g. `/plc-companies`.
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.path() == path)
    }

    pub fn slug(self) -> &'static str {
        match self {
            Category::Oldest => "oldest",
            Category::Newest => "newest",
            Category::RoyalCharter => "royal-charter",
            Category::Plc => "plc",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Category::Oldest => "/oldest-companies",
            Category::Newest => "/newest-companies",
            Category::RoyalCharter => "/royal-charter-companies",
            Category::Plc => "/plc-companies",
        }
    }

    pub fn meta(self) -> PageMeta {
        match self {
            Category::Oldest => PageMeta {
                title: "Oldest UK Companies - Royal Charter Companies Since 1327 | DocSpace",
                description: "Explore the oldest companies in the UK, including Royal Charter companies from 1327. Download complete historical documents and filings.",
                keywords: "oldest UK companies, Royal Charter companies, historical companies, ancient corporations",
                image: None,
            },
            Category::Newest => PageMeta {
                title: "Newest UK Companies - Recently Incorporated Businesses | DocSpace",
                description: "Browse the newest companies incorporated in the UK. Access complete documentation for recently registered businesses.",
                keywords: "newest UK companies, new businesses, recent incorporations, startup companies",
                image: None,
            },
            Category::RoyalCharter => PageMeta {
                title: "Royal Charter Companies - Ancient UK Corporations Since 1327 | DocSpace",
                description: "Complete list of Royal Charter companies in the UK. Download documents for these historic corporations, some dating back to 1327.",
                keywords: "Royal Charter companies, ancient corporations, historic companies, medieval businesses",
                image: None,
            },
            Category::Plc => PageMeta {
                title: "Public Limited Companies (PLC) - Download Company Documents | DocSpace",
                description: "Browse all UK Public Limited Companies (PLCs). Download complete documentation including accounts, returns, and filings.",
                keywords: "PLC companies, public limited companies, UK corporations, listed companies",
                image: None,
            },
        }
    }
}

/// What a page should do for its initial query string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitialView {
    /// Open the company modal via this fragment.
    Company { fragment: String },
    /// Category meta was applied.
    Category(String),
    Default,
}

#[derive(Clone, Debug)]
pub struct SeoMetaManager {
    base_url: String,
}

impl SeoMetaManager {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn company_url(&self, number: &str) -> String {
        format!("{}/company/{}", self.base_url, number)
    }

    pub fn og_image_url(&self, number: &str) -> String {
        format!("{}/og-images/company-{}.png", self.base_url, number)
    }

    pub fn company_title(&self, company: &CompanyRecord) -> String {
        format!(
            "{} ({}) - Complete Company Documents | DocSpace",
            display_name(company),
            display_number(company)
        )
    }

    pub fn company_description(&self, company: &CompanyRecord, today: NaiveDate) -> String {
        let age = match years_in_business(company, today) {
            Some(years) if years > 0 => format!("{years} years in business, "),
            _ => String::new(),
        };
        format!(
            "Download all {} documents from Companies House. {}{} status, complete filing history available for £5.",
            display_name(company),
            age,
            company.status.as_deref().unwrap_or("Unknown")
        )
    }

    pub fn company_keywords(&self, company: &CompanyRecord) -> String {
        let name = display_name(company);
        format!(
            "{name}, company documents, Companies House, {}, UK company filings, {name} directors, {name} accounts",
            display_number(company)
        )
    }

    pub fn update_company_meta(
        &self,
        doc: &mut HeadDocument,
        company: &CompanyRecord,
        today: NaiveDate,
    ) {
        let number = display_number(company);
        let title = self.company_title(company);
        let description = self.company_description(company, today);
        let url = self.company_url(number);
        let image = self.og_image_url(number);

        doc.set_meta_tag("title", title.as_str());
        doc.set_meta_tag("description", description.as_str());
        doc.set_meta_tag("keywords", self.company_keywords(company));

        doc.set_meta_tag("og:title", title.as_str());
        doc.set_meta_tag("og:description", description.as_str());
        doc.set_meta_tag("og:url", url.as_str());
        doc.set_meta_tag("og:image", image.as_str());
        doc.set_meta_tag("og:type", "website");

        doc.set_meta_tag("twitter:title", title.as_str());
        doc.set_meta_tag("twitter:description", description.as_str());
        doc.set_meta_tag("twitter:card", "summary_large_image");
        doc.set_meta_tag("twitter:image", image);

        doc.set_canonical_url(url);
        doc.set_structured_data(COMPANY_SCHEMA_ID, self.company_structured_data(company));
        doc.push_history(format!("/company/{number}"), title);
    }

    /// schema.org `Organization` for the company page.
    pub fn company_structured_data(&self, company: &CompanyRecord) -> Value {
        let mut schema = Map::new();
        schema.insert("@context".into(), json!("https://schema.org"));
        schema.insert("@type".into(), json!("Organization"));
        if let Some(name) = &company.name {
            schema.insert("name".into(), json!(name));
        }
        if let Some(number) = &company.number {
            schema.insert("identifier".into(), json!(number));
        }
        schema.insert("url".into(), json!(self.company_url(display_number(company))));
        if let Some(date) = &company.date_of_creation {
            schema.insert("foundingDate".into(), json!(date));
        }

        let mut address = Map::new();
        address.insert("@type".into(), json!("PostalAddress"));
        if let Some(office) = &company.registered_office_address {
            address.insert("streetAddress".into(), json!(office.street_address()));
            for (key, value) in [
                ("addressLocality", &office.locality),
                ("addressRegion", &office.region),
                ("postalCode", &office.postal_code),
            ] {
                if let Some(value) = value {
                    address.insert(key.into(), json!(value));
                }
            }
        }
        address.insert("addressCountry".into(), json!("GB"));
        schema.insert("address".into(), Value::Object(address));

        Value::Object(schema)
    }

    /// Apply the copy for `slug`; unknown slugs get the site-wide defaults.
    pub fn update_category_meta(&self, doc: &mut HeadDocument, slug: &str) {
        let meta = Category::from_slug(slug)
            .map(Category::meta)
            .unwrap_or(DEFAULT_META);
        self.set_basic_meta(doc, &meta);
    }

    pub fn set_basic_meta(&self, doc: &mut HeadDocument, meta: &PageMeta) {
        doc.set_meta_tag("title", meta.title);
        doc.set_meta_tag("description", meta.description);
        doc.set_meta_tag("keywords", meta.keywords);

        doc.set_meta_tag("og:title", meta.title);
        doc.set_meta_tag("og:description", meta.description);
        if let Some(image) = meta.image {
            doc.set_meta_tag("og:image", image);
        }
    }

    pub fn sitemap_urls(&self, companies: &[CompanyRecord]) -> Vec<String> {
        let urls: Vec<String> = companies
            .iter()
            .filter_map(|company| company.number.as_deref())
            .map(|number| self.company_url(number))
            .collect();
        log::debug!("generated {} company urls", urls.len());
        urls
    }

    /// Resolve `?company=` / `?category=` on first load.
    pub fn initial_navigation(&self, doc: &mut HeadDocument, query: &str) -> InitialView {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query.trim_start_matches('?'))
            .unwrap_or_default();
        let lookup = |key: &str| {
            pairs
                .iter()
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.clone())
        };

        if let Some(company) = lookup("company") {
            return InitialView::Company {
                fragment: format!("#company/{company}"),
            };
        }
        if let Some(category) = lookup("category") {
            self.update_category_meta(doc, &category);
            return InitialView::Category(category);
        }
        InitialView::Default
    }

    /// Fragment the company modal listens on for a back/forward to `/company/X`.
    pub fn pop_state_fragment(&self, path: &str) -> Option<String> {
        path.strip_prefix("/company/")
            .filter(|number| !number.is_empty())
            .map(|number| format!("#company/{number}"))
    }
}

fn display_name(company: &CompanyRecord) -> &str {
    company.name.as_deref().unwrap_or("Unknown Company")
}

fn display_number(company: &CompanyRecord) -> &str {
    company.number.as_deref().unwrap_or("")
}

/// Whole years since incorporation; `None` when the date does not parse.
pub fn years_in_business(company: &CompanyRecord, today: NaiveDate) -> Option<i64> {
    let raw = company.date_of_creation.as_deref()?;
    let date = NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d").ok()?;
    let days = (today - date).num_days() as f64;
    Some((days / 365.25).floor() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company::RegisteredOfficeAddress;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).expect("date")
    }

    fn manager() -> SeoMetaManager {
        SeoMetaManager::new("https://docspace.uk/")
    }

    fn tesco() -> CompanyRecord {
        CompanyRecord {
            number: Some("00445790".into()),
            name: Some("TESCO PLC".into()),
            status: Some("active".into()),
            date_of_creation: Some("1947-11-27".into()),
            registered_office_address: Some(RegisteredOfficeAddress {
                address_line_1: Some("Tesco House".into()),
                address_line_2: Some("Shire Park".into()),
                locality: Some("Welwyn Garden City".into()),
                region: None,
                postal_code: Some("AL7 1GA".into()),
            }),
        }
    }

    #[test]
    fn meta_tags_use_property_for_social_keys() {
        let mut doc = HeadDocument::new();
        doc.set_meta_tag("description", "a");
        doc.set_meta_tag("og:title", "b");
        doc.set_meta_tag("twitter:card", "c");

        let attrs: Vec<_> = doc.meta_tags().iter().map(|tag| tag.attribute).collect();
        assert_eq!(
            attrs,
            vec![
                MetaAttribute::Name,
                MetaAttribute::Property,
                MetaAttribute::Property
            ]
        );
    }

    #[test]
    fn meta_tags_update_in_place() {
        let mut doc = HeadDocument::new();
        doc.set_meta_tag("description", "first");
        doc.set_meta_tag("description", "second");
        assert_eq!(doc.meta_tags().len(), 1);
        assert_eq!(doc.meta_content("description"), Some("second"));

        doc.set_meta_tag("title", "Page");
        assert_eq!(doc.title(), "Page");
        assert_eq!(doc.meta_tags().len(), 1);
    }

    #[test]
    fn company_meta_matches_site_copy() {
        let mut doc = HeadDocument::new();
        manager().update_company_meta(&mut doc, &tesco(), today());

        let title = "TESCO PLC (00445790) - Complete Company Documents | DocSpace";
        assert_eq!(doc.title(), title);
        assert_eq!(
            doc.meta_content("description"),
            Some("Download all TESCO PLC documents from Companies House. 77 years in business, active status, complete filing history available for £5.")
        );
        assert_eq!(doc.meta_content("og:title"), Some(title));
        assert_eq!(
            doc.meta_content("og:url"),
            Some("https://docspace.uk/company/00445790")
        );
        assert_eq!(
            doc.meta_content("twitter:image"),
            Some("https://docspace.uk/og-images/company-00445790.png")
        );
        assert_eq!(doc.meta_content("og:type"), Some("website"));
        assert_eq!(doc.meta_content("twitter:card"), Some("summary_large_image"));
        assert_eq!(doc.canonical(), Some("https://docspace.uk/company/00445790"));
        assert_eq!(doc.current_path(), Some("/company/00445790"));
        assert_eq!(doc.history()[0].title, title);
    }

    #[test]
    fn company_meta_falls_back_for_missing_fields() {
        let mut doc = HeadDocument::new();
        let record = CompanyRecord {
            date_of_creation: Some("not a date".into()),
            ..CompanyRecord::default()
        };
        manager().update_company_meta(&mut doc, &record, today());

        assert_eq!(
            doc.title(),
            "Unknown Company () - Complete Company Documents | DocSpace"
        );
        assert_eq!(
            doc.meta_content("description"),
            Some("Download all Unknown Company documents from Companies House. Unknown status, complete filing history available for £5.")
        );
    }

    #[test]
    fn young_companies_omit_age() {
        let record = CompanyRecord {
            name: Some("NEW LTD".into()),
            date_of_creation: Some("2025-01-15".into()),
            ..CompanyRecord::default()
        };
        assert_eq!(years_in_business(&record, today()), Some(0));
        assert!(!manager()
            .company_description(&record, today())
            .contains("years in business"));
    }

    #[test]
    fn structured_data_is_replaced_and_includes_address() {
        let mut doc = HeadDocument::new();
        let seo = manager();
        seo.update_company_meta(&mut doc, &tesco(), today());
        seo.update_company_meta(&mut doc, &tesco(), today());

        let html = doc.render().expect("render");
        assert_eq!(html.matches("id=\"company-schema\"").count(), 1);

        let schema = doc.structured_data(COMPANY_SCHEMA_ID).expect("schema");
        assert_eq!(schema["@type"], "Organization");
        assert_eq!(schema["identifier"], "00445790");
        assert_eq!(schema["foundingDate"], "1947-11-27");
        assert_eq!(schema["address"]["streetAddress"], "Tesco House, Shire Park");
        assert_eq!(schema["address"]["postalCode"], "AL7 1GA");
        assert_eq!(schema["address"]["addressCountry"], "GB");
        assert!(schema["address"].get("addressRegion").is_none());
    }

    #[test]
    fn render_escapes_attributes_and_script_breakouts() {
        let mut doc = HeadDocument::new();
        let record = CompanyRecord::new("00000001", "A \"QUOTED\" </script> LTD");
        manager().update_company_meta(&mut doc, &record, today());

        let html = doc.render().expect("render");
        assert!(html.contains("<meta name=\"description\""));
        assert!(html.contains("<meta property=\"og:title\""));
        assert!(html.contains("&quot;QUOTED&quot;"));
        assert!(html.contains("<link rel=\"canonical\" href=\"https://docspace.uk/company/00000001\">"));
        assert_eq!(html.matches("</script>").count(), 1);
    }

    #[test]
    fn category_meta_and_default_fallback() {
        let seo = manager();
        let mut doc = HeadDocument::new();
        seo.update_category_meta(&mut doc, "royal-charter");
        assert_eq!(doc.title(), Category::RoyalCharter.meta().title);
        assert!(doc.meta_content("og:image").is_none());

        let mut doc = HeadDocument::new();
        seo.update_category_meta(&mut doc, "unknown");
        assert_eq!(doc.title(), DEFAULT_META.title);
        assert_eq!(
            doc.meta_content("og:image"),
            Some("https://docspace.uk/og-image.png")
        );
    }

    #[test]
    fn categories_map_between_slugs_and_paths() {
        for category in Category::ALL {
            assert_eq!(Category::from_slug(category.slug()), Some(category));
            assert_eq!(Category::from_path(category.path()), Some(category));
        }
        assert_eq!(Category::from_path("/plc-companies"), Some(Category::Plc));
        assert_eq!(Category::from_slug("plc-companies"), None);
    }

    #[test]
    fn sitemap_urls_skip_records_without_numbers() {
        let companies = vec![
            CompanyRecord::new("RC000766", "SOCIETY"),
            CompanyRecord::default(),
        ];
        assert_eq!(
            manager().sitemap_urls(&companies),
            vec!["https://docspace.uk/company/RC000766".to_string()]
        );
    }

    #[test]
    fn initial_navigation_prefers_company() {
        let seo = manager();
        let mut doc = HeadDocument::new();
        assert_eq!(
            seo.initial_navigation(&mut doc, "?company=12387565&category=plc"),
            InitialView::Company {
                fragment: "#company/12387565".into()
            }
        );
        assert_eq!(doc.title(), "");

        assert_eq!(
            seo.initial_navigation(&mut doc, "category=plc"),
            InitialView::Category("plc".into())
        );
        assert_eq!(doc.title(), Category::Plc.meta().title);

        assert_eq!(seo.initial_navigation(&mut doc, ""), InitialView::Default);
    }

    #[test]
    fn pop_state_maps_company_paths_to_fragments() {
        let seo = manager();
        assert_eq!(
            seo.pop_state_fragment("/company/08510890"),
            Some("#company/08510890".into())
        );
        assert_eq!(seo.pop_state_fragment("/company/"), None);
        assert_eq!(seo.pop_state_fragment("/plc-companies"), None);
    }
}
