//! The one company shape shared by the SEO, sitemap and routing code.
//!
//! Companies reach the site from several sources (the Companies House API, the listings
//! API behind the sitemap, the front-end's own cards) and each spells its fields
//! differently. `CompanyRecord` accepts every observed spelling and keeps only the
//! normalized form.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCompany")]
pub struct CompanyRecord {
    #[serde(rename = "company_number", skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(rename = "company_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "company_status", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_creation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_office_address: Option<RegisteredOfficeAddress>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredOfficeAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line_1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line_2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

impl RegisteredOfficeAddress {
    /// Non-empty street lines joined with `, `.
    pub fn street_address(&self) -> String {
        [&self.address_line_1, &self.address_line_2]
            .into_iter()
            .flatten()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl CompanyRecord {
    pub fn new(number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            number: Some(number.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Trimmed, upper-cased company number; the deduplication key.
    pub fn normalized_number(&self) -> Option<String> {
        self.number
            .as_deref()
            .map(|number| number.trim().to_ascii_uppercase())
            .filter(|number| !number.is_empty())
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawCompany {
    company_number: Option<StringOrNumber>,
    #[serde(rename = "CompanyNumber")]
    company_number_pascal: Option<StringOrNumber>,
    number: Option<StringOrNumber>,
    company_name: Option<String>,
    #[serde(rename = "CompanyName")]
    company_name_pascal: Option<String>,
    name: Option<String>,
    company_status: Option<String>,
    #[serde(rename = "CompanyStatus")]
    company_status_pascal: Option<String>,
    status: Option<String>,
    date_of_creation: Option<String>,
    #[serde(rename = "IncorporationDate")]
    incorporation_date_pascal: Option<String>,
    #[serde(rename = "incorporationDate")]
    incorporation_date: Option<String>,
    registered_office_address: Option<RegisteredOfficeAddress>,
}

/// Listings occasionally carry numeric company numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(value) => value,
            StringOrNumber::Number(value) => value.to_string(),
        }
    }
}

fn first_present<T>(candidates: [Option<T>; 3]) -> Option<String>
where
    T: Into<String>,
{
    candidates
        .into_iter()
        .flatten()
        .map(Into::into)
        .find(|value: &String| !value.is_empty())
}

impl From<RawCompany> for CompanyRecord {
    fn from(raw: RawCompany) -> Self {
        Self {
            number: first_present([
                raw.company_number,
                raw.company_number_pascal,
                raw.number,
            ]),
            name: first_present([raw.company_name, raw.company_name_pascal, raw.name]),
            status: first_present([raw.company_status, raw.company_status_pascal, raw.status]),
            date_of_creation: first_present([
                raw.date_of_creation,
                raw.incorporation_date_pascal,
                raw.incorporation_date,
            ]),
            registered_office_address: raw.registered_office_address,
        }
    }
}
