//! Director lookups against the bundled table, with a small in-process cache.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::config::DirectorsConfig;
use crate::error::EdgeError;
use crate::templates;

static KNOWN_DIRECTORS: Lazy<HashMap<String, DirectorInfo>> = Lazy::new(|| {
    serde_json::from_str(include_str!("data/directors.json")).expect("embedded director table")
});

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub company: String,
    pub company_number: String,
    pub role: String,
    pub appointed: String,
    pub status: String,
    pub company_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Appointment {
    /// CSS class for the status pill, e.g. `in-liquidation`.
    pub fn status_class(&self) -> String {
        slugify(&self.company_status.to_lowercase())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    pub total_appointments: u32,
    pub active_appointments: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorInfo {
    pub appointments: Vec<Appointment>,
    pub details: DirectorDetails,
}

impl DirectorInfo {
    pub fn active_appointments(&self) -> usize {
        self.appointments
            .iter()
            .filter(|appointment| appointment.status == "Active")
            .count()
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

fn slugify(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join("-")
}

struct CacheEntry {
    info: Arc<DirectorInfo>,
    inserted: Instant,
}

/// Insertion-ordered cache; the oldest entry is evicted once `capacity` is reached.
struct DirectorCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
}

impl DirectorCache {
    fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&mut self, key: &str) -> Option<Arc<DirectorInfo>> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => {
                return Some(Arc::clone(&entry.info));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.remove(key);
        }
        None
    }

    fn insert(&mut self, key: String, info: Arc<DirectorInfo>) {
        if self.entries.contains_key(&key) {
            self.remove(&key);
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                info,
                inserted: Instant::now(),
            },
        );
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|existing| existing != key);
    }

    fn live_len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.inserted.elapsed() < self.ttl)
            .count()
    }
}

pub struct DirectorLookup {
    table: HashMap<String, Arc<DirectorInfo>>,
    cache: Mutex<DirectorCache>,
}

impl DirectorLookup {
    /// Lookup over the bundled director table.
    pub fn new(config: &DirectorsConfig) -> Self {
        Self::with_table(
            KNOWN_DIRECTORS.clone(),
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        )
    }

    pub fn with_table(
        table: HashMap<String, DirectorInfo>,
        capacity: usize,
        ttl: Duration,
    ) -> Self {
        let table = table
            .into_iter()
            .map(|(name, info)| (normalize_name(&name), Arc::new(info)))
            .collect();
        Self {
            table,
            cache: Mutex::new(DirectorCache::new(capacity, ttl)),
        }
    }

    /// Case and surrounding whitespace are ignored. Unknown names are `None`.
    pub fn lookup(&self, name: &str) -> Option<Arc<DirectorInfo>> {
        let key = normalize_name(name);
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(info) = cache.get(&key) {
            return Some(info);
        }

        let info = self.table.get(&key).cloned()?;
        cache.insert(key, Arc::clone(&info));
        Some(info)
    }

    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .live_len()
    }

    pub fn badge(&self, info: &DirectorInfo) -> Result<String, EdgeError> {
        #[derive(Serialize)]
        struct BadgeView {
            label: String,
        }

        let total = info.appointments.len();
        let noun = if total == 1 { "company" } else { "companies" };
        templates::render(
            templates::DIRECTOR_BADGE,
            &BadgeView {
                label: format!("{total} {noun}"),
            },
        )
    }

    pub fn popup(&self, name: &str, info: &DirectorInfo) -> Result<String, EdgeError> {
        #[derive(Serialize)]
        struct AppointmentView<'a> {
            #[serde(flatten)]
            appointment: &'a Appointment,
            status_class: String,
        }

        #[derive(Serialize)]
        struct PopupView<'a> {
            name: &'a str,
            slug: String,
            details: &'a DirectorDetails,
            appointments: Vec<AppointmentView<'a>>,
        }

        let view = PopupView {
            name,
            slug: slugify(name),
            details: &info.details,
            appointments: info
                .appointments
                .iter()
                .map(|appointment| AppointmentView {
                    appointment,
                    status_class: appointment.status_class(),
                })
                .collect(),
        };
        templates::render(templates::DIRECTOR_POPUP, &view)
    }
}
