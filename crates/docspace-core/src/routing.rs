//! Hash-fragment vs clean-path company addresses.
//!
//! The site started with `/#company/{number}` links and is moving to `/company/{number}`.
//! `DualRouter` decides which form to serve and rewrites in-page links when the mode is
//! switched.

use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::seo::Category;

static COMPANY_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^/company/([A-Z0-9]+)$").expect("company path pattern"));

/// `href` values ending in a company address in either form, with or without an origin.
static COMPANY_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href\s*=\s*(["'])(?:[a-z][a-z0-9+.-]*://[^/"'#]*)?(?:/?#company/|/company/)([A-Z0-9]+)(["'])"#)
        .expect("company href pattern")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UrlMode {
    HashMode,
    CleanMode,
}

impl UrlMode {
    pub fn as_str(self) -> &'static str {
        match self {
            UrlMode::HashMode => "hash-mode",
            UrlMode::CleanMode => "clean-mode",
        }
    }
}

/// Outcome of resolving a request path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    /// Hash mode: send the browser to the fragment address.
    Redirect(String),
    /// Clean mode: load the company at this address.
    LoadCompany(String),
    LoadCategory(Category),
    /// Not a path this router handles.
    PassThrough,
}

#[derive(Debug)]
pub struct DualRouter {
    mode: Mutex<UrlMode>,
}

impl Default for DualRouter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl DualRouter {
    pub fn new(clean_urls: bool) -> Self {
        let mode = if clean_urls {
            UrlMode::CleanMode
        } else {
            UrlMode::HashMode
        };
        Self {
            mode: Mutex::new(mode),
        }
    }

    pub fn mode(&self) -> UrlMode {
        *self.mode.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_clean(&self) -> bool {
        self.mode() == UrlMode::CleanMode
    }

    fn set_mode(&self, mode: UrlMode) {
        *self.mode.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = mode;
        log::info!("url routing switched to {}", mode.as_str());
    }

    pub fn enable_clean_urls(&self) {
        self.set_mode(UrlMode::CleanMode);
    }

    pub fn disable_clean_urls(&self) {
        self.set_mode(UrlMode::HashMode);
    }

    /// Flip the mode and return the new one.
    pub fn toggle(&self) -> UrlMode {
        let mut guard = self.mode.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = match *guard {
            UrlMode::HashMode => UrlMode::CleanMode,
            UrlMode::CleanMode => UrlMode::HashMode,
        };
        *guard = next;
        log::info!("url routing toggled to {}", next.as_str());
        next
    }

    pub fn company_url(&self, number: &str) -> String {
        match self.mode() {
            UrlMode::CleanMode => format!("/company/{number}"),
            UrlMode::HashMode => format!("/#company/{number}"),
        }
    }

    pub fn navigate(&self, path: &str) -> Navigation {
        if let Some(number) = company_number_from_path(path) {
            let navigation = match self.mode() {
                UrlMode::HashMode => Navigation::Redirect(format!("/#company/{number}")),
                UrlMode::CleanMode => Navigation::LoadCompany(number.to_string()),
            };
            log::debug!("company path {} resolved to {:?}", path, navigation);
            return navigation;
        }

        match Category::from_path(path) {
            Some(category) => Navigation::LoadCategory(category),
            None => Navigation::PassThrough,
        }
    }

    /// Rewrite every company link in `html` to the address form of the current mode.
    ///
    /// Relative fragments and origin-qualified links are normalized to the root-relative
    /// form, so a clean-mode round trip yields `/#company/{number}` rather than the input.
    pub fn update_all_links(&self, html: &str) -> String {
        let mode = self.mode();
        COMPANY_HREF
            .replace_all(html, |caps: &Captures<'_>| {
                let number = &caps[2];
                let url = match mode {
                    UrlMode::CleanMode => format!("/company/{number}"),
                    UrlMode::HashMode => format!("/#company/{number}"),
                };
                format!("href={}{}{}", &caps[1], url, &caps[3])
            })
            .into_owned()
    }
}

pub fn company_number_from_path(path: &str) -> Option<&str> {
    COMPANY_PATH
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
