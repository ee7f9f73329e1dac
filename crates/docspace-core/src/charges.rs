//! Secured-charge summaries for company cards.
//!
//! Companies House reports each charge's secured amount only as free text
//! (`"£50,000,000 and any other moneys..."`). The summary takes the first sterling
//! figure from that text and totals it by charge status.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::company::CompanyRecord;

/// Outstanding totals above this are flagged [`RiskLevel::High`].
pub const HIGH_RISK_THRESHOLD: u64 = 100_000_000;

static STERLING_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"£([\d,]+)").expect("sterling amount pattern"));

/// Body of `GET /company/{number}/charges`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ChargesResponse {
    #[serde(default)]
    pub items: Vec<Charge>,
    #[serde(default)]
    pub total_count: u32,
    #[serde(default)]
    pub satisfied_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Charge {
    #[serde(default)]
    pub charge_number: Option<u32>,
    #[serde(default)]
    pub charge_description: Option<String>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub satisfied_on: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub secured_details: Option<SecuredDetails>,
    #[serde(default)]
    pub persons_entitled: Vec<PersonEntitled>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SecuredDetails {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PersonEntitled {
    #[serde(default)]
    pub name: Option<String>,
}

impl Charge {
    pub fn description(&self) -> Option<&str> {
        self.secured_details
            .as_ref()
            .and_then(|details| details.description.as_deref())
    }

    /// First `£` figure in the secured-details text, commas removed.
    pub fn secured_amount(&self) -> Option<u64> {
        self.description().and_then(parse_sterling_amount)
    }

    pub fn first_holder(&self) -> Option<&str> {
        self.persons_entitled
            .first()
            .and_then(|person| person.name.as_deref())
    }
}

pub fn parse_sterling_amount(text: &str) -> Option<u64> {
    let digits: String = STERLING_AMOUNT
        .captures(text)?
        .get(1)?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeSummary {
    pub total_outstanding: u64,
    pub total_satisfied: u64,
    pub total_secured: u64,
}

/// Sum secured amounts by status. Charges that are neither `outstanding` nor
/// `satisfied`, or whose text carries no figure, are left out.
pub fn summarize(charges: &ChargesResponse) -> ChargeSummary {
    let mut summary = ChargeSummary::default();
    for charge in &charges.items {
        let Some(amount) = charge.secured_amount() else {
            continue;
        };
        match charge.status.as_deref() {
            Some("outstanding") => summary.total_outstanding += amount,
            Some("satisfied") => summary.total_satisfied += amount,
            _ => {}
        }
    }
    summary.total_secured = summary.total_outstanding + summary.total_satisfied;
    summary
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    High,
    Medium,
}

impl RiskLevel {
    pub fn for_outstanding(total_outstanding: u64) -> Self {
        if total_outstanding > HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeDetail {
    pub number: Option<u32>,
    pub amount: Option<String>,
    pub status: Option<String>,
    pub holder: Option<String>,
    #[serde(rename = "type")]
    pub charge_type: Option<String>,
    pub date: Option<String>,
    pub satisfied_date: Option<String>,
}

impl From<&Charge> for ChargeDetail {
    fn from(charge: &Charge) -> Self {
        Self {
            number: charge.charge_number,
            amount: charge.description().map(str::to_string),
            status: charge.status.clone(),
            holder: charge.first_holder().map(str::to_string),
            charge_type: charge.charge_description.clone(),
            date: charge.created_on.clone(),
            satisfied_date: charge.satisfied_on.clone(),
        }
    }
}

/// Charge fields merged into a company card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargesCard {
    pub total_charges: u32,
    pub outstanding_charges: u32,
    pub satisfied_charges: u32,
    pub total_secured_amount: u64,
    pub outstanding_secured_amount: u64,
    pub satisfied_secured_amount: u64,
    pub security_risk_level: RiskLevel,
    pub charge_details: Vec<ChargeDetail>,
}

impl ChargesCard {
    pub fn from_charges(charges: &ChargesResponse) -> Self {
        let summary = summarize(charges);
        Self {
            total_charges: charges.total_count,
            outstanding_charges: charges.total_count.saturating_sub(charges.satisfied_count),
            satisfied_charges: charges.satisfied_count,
            total_secured_amount: summary.total_secured,
            outstanding_secured_amount: summary.total_outstanding,
            satisfied_secured_amount: summary.total_satisfied,
            security_risk_level: RiskLevel::for_outstanding(summary.total_outstanding),
            charge_details: charges.items.iter().map(ChargeDetail::from).collect(),
        }
    }
}

/// A company record with its charge fields alongside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnhancedCompanyCard {
    #[serde(flatten)]
    pub company: CompanyRecord,
    #[serde(flatten)]
    pub charges: ChargesCard,
}

pub fn enhance_company_card(company: CompanyRecord, charges: &ChargesResponse) -> EnhancedCompanyCard {
    EnhancedCompanyCard {
        company,
        charges: ChargesCard::from_charges(charges),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn charge(
        number: u32,
        kind: &str,
        status: &str,
        description: &str,
        holder: &str,
        created_on: &str,
        satisfied_on: Option<&str>,
    ) -> serde_json::Value {
        let mut value = json!({
            "charge_number": number,
            "charge_code": format!("0000000{number}"),
            "classification": "charge-description",
            "charge_description": kind,
            "created_on": created_on,
            "status": status,
            "secured_details": { "type": "amount-secured-gbp", "description": description },
            "persons_entitled": [{ "name": holder }],
            "links": { "self": format!("/charges/{number}") }
        });
        if let Some(date) = satisfied_on {
            value["satisfied_on"] = json!(date);
        }
        value
    }

    fn gresham_house() -> ChargesResponse {
        serde_json::from_value(json!({
            "etag": "7b5bb5d7",
            "items": [
                charge(1, "DEBENTURE", "outstanding",
                    "£50,000,000 and any other moneys that may become owing by the company",
                    "HSBC BANK PLC", "2023-03-15", None),
                charge(2, "FLOATING CHARGE", "satisfied",
                    "£25,000,000 plus costs, charges, interest and other money (if any)",
                    "NATWEST BANK PLC", "2022-09-20", Some("2023-01-15")),
            ],
            "total_count": 2,
            "unfiltered_count": 2,
            "satisfied_count": 1,
            "part_satisfied_count": 0
        }))
        .expect("charges")
    }

    fn cna_insurance() -> ChargesResponse {
        serde_json::from_value(json!({
            "items": [
                charge(1, "DEBENTURE", "outstanding",
                    "£150,000,000 and any other moneys that may become owing",
                    "CONTINENTAL CASUALTY COMPANY", "2023-06-10", None),
                charge(2, "FLOATING CHARGE", "outstanding",
                    "£75,000,000 plus costs, charges, interest and other money (if any)",
                    "BARCLAYS BANK PLC", "2022-11-15", None),
                charge(3, "LEGAL MORTGAGE", "satisfied", "£25,000,000",
                    "LLOYDS BANK PLC", "2021-08-20", Some("2023-02-10")),
            ],
            "total_count": 3,
            "satisfied_count": 1
        }))
        .expect("charges")
    }

    #[test]
    fn parses_first_sterling_figure() {
        assert_eq!(parse_sterling_amount("£50,000,000 and £1"), Some(50_000_000));
        assert_eq!(parse_sterling_amount("£25000"), Some(25_000));
        assert_eq!(parse_sterling_amount("all monies due"), None);
        assert_eq!(parse_sterling_amount("£, unspecified"), None);
    }

    #[test]
    fn gresham_house_totals() {
        assert_eq!(
            summarize(&gresham_house()),
            ChargeSummary {
                total_outstanding: 50_000_000,
                total_satisfied: 25_000_000,
                total_secured: 75_000_000,
            }
        );
    }

    #[test]
    fn cna_insurance_totals_and_high_risk() {
        let card = ChargesCard::from_charges(&cna_insurance());
        assert_eq!(card.outstanding_secured_amount, 225_000_000);
        assert_eq!(card.satisfied_secured_amount, 25_000_000);
        assert_eq!(card.total_secured_amount, 250_000_000);
        assert_eq!(card.security_risk_level, RiskLevel::High);
        assert_eq!(card.total_charges, 3);
        assert_eq!(card.outstanding_charges, 2);
        assert_eq!(card.satisfied_charges, 1);
    }

    #[test]
    fn risk_threshold_is_exclusive() {
        assert_eq!(RiskLevel::for_outstanding(HIGH_RISK_THRESHOLD), RiskLevel::Medium);
        assert_eq!(RiskLevel::for_outstanding(HIGH_RISK_THRESHOLD + 1), RiskLevel::High);
        assert_eq!(
            ChargesCard::from_charges(&gresham_house()).security_risk_level,
            RiskLevel::Medium
        );
    }

    #[test]
    fn unknown_statuses_and_missing_amounts_are_skipped() {
        let charges: ChargesResponse = serde_json::from_value(json!({
            "items": [
                { "status": "part-satisfied", "secured_details": { "description": "£10" } },
                { "status": "outstanding", "secured_details": { "description": "All monies" } },
                { "status": "outstanding" }
            ],
            "total_count": 3
        }))
        .expect("charges");
        assert_eq!(summarize(&charges), ChargeSummary::default());
    }

    #[test]
    fn card_serializes_detail_rows() {
        let company = CompanyRecord::new("03207655", "GRESHAM HOUSE LIMITED");
        let card = enhance_company_card(company, &gresham_house());
        let value = serde_json::to_value(&card).expect("json");

        assert_eq!(value["company_number"], "03207655");
        assert_eq!(value["totalSecuredAmount"], 75_000_000);
        assert_eq!(value["securityRiskLevel"], "MEDIUM");

        let details = value["chargeDetails"].as_array().expect("details");
        assert_eq!(details.len(), 2);
        assert_eq!(details[0]["number"], 1);
        assert_eq!(details[0]["holder"], "HSBC BANK PLC");
        assert_eq!(details[0]["type"], "DEBENTURE");
        assert_eq!(details[0]["date"], "2023-03-15");
        assert!(details[0]["satisfiedDate"].is_null());
        assert_eq!(details[1]["status"], "satisfied");
        assert_eq!(details[1]["satisfiedDate"], "2023-01-15");
        assert!(details[1]["amount"]
            .as_str()
            .expect("amount")
            .starts_with("£25,000,000"));
    }
}
