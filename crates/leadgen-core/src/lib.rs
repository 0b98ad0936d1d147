//! Core domain model for the lead agent: queries, candidates, leads and run status.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "leadgen-core";

/// Maximum number of entries kept in the dashboard's recent-leads feed.
pub const RECENT_LEADS_CAP: usize = 20;

/// Placeholder written for absent optional lead fields.
pub const ABSENT: &str = "-";

/// Case-folded, trimmed form of a business name used for duplicate checks.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// One search query: a business type in a city, optionally qualified by country.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub business_type: String,
    pub city: String,
    pub country: Option<String>,
}

impl Query {
    pub fn new(business_type: &str, city: &str, country: Option<&str>) -> Self {
        Self {
            business_type: business_type.to_string(),
            city: city.to_string(),
            country: country.map(ToString::to_string),
        }
    }

    pub fn text(&self) -> String {
        match &self.country {
            Some(country) => format!("{} in {}, {}", self.business_type, self.city, country),
            None => format!("{} in {}", self.business_type, self.city),
        }
    }

    /// Title-cased business type, as written to the ledger ("photography studio" -> "Photography Studio").
    pub fn business_type_label(&self) -> String {
        title_case(&self.business_type)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    let mut s = String::new();
                    s.extend(first.to_uppercase());
                    s.push_str(&chars.as_str().to_lowercase());
                    s
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A group of cities sharing a country qualifier and a list of business types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub country: Option<String>,
    pub cities: Vec<String>,
    pub business_types: Vec<String>,
}

impl Region {
    fn from_static(country: Option<&str>, cities: &[&str], business_types: &[&str]) -> Self {
        Self {
            country: country.map(ToString::to_string),
            cities: cities.iter().map(|c| c.to_string()).collect(),
            business_types: business_types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Input tables from which the ordered query sequence is generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCatalog {
    pub regions: Vec<Region>,
}

const INDIA_CITIES: &[&str] = &[
    "Mumbai", "Delhi", "Bangalore", "Hyderabad", "Chennai", "Kolkata", "Pune",
    "Ahmedabad", "Jaipur", "Lucknow", "Chandigarh", "Indore", "Bhopal", "Surat",
    "Nagpur", "Kochi", "Coimbatore", "Vadodara", "Gurgaon", "Noida", "Thane",
    "Visakhapatnam", "Mysore", "Nashik", "Rajkot",
];

const USA_CITIES: &[&str] = &[
    "New York, NY", "Los Angeles, CA", "Chicago, IL", "Houston, TX", "Phoenix, AZ",
    "San Francisco, CA", "Miami, FL", "Seattle, WA", "Denver, CO", "Austin, TX",
    "Boston, MA", "Atlanta, GA", "San Diego, CA", "Dallas, TX", "Las Vegas, NV",
];

const UK_CITIES: &[&str] = &[
    "London", "Manchester", "Birmingham", "Leeds", "Liverpool",
    "Bristol", "Edinburgh", "Glasgow", "Cardiff", "Newcastle",
];

const CANADA_CITIES: &[&str] = &[
    "Toronto", "Vancouver", "Montreal", "Calgary", "Ottawa", "Edmonton", "Winnipeg", "Halifax",
];

const AUSTRALIA_CITIES: &[&str] = &["Sydney", "Melbourne", "Brisbane", "Perth", "Adelaide", "Gold Coast"];

const UAE_CITIES: &[&str] = &["Dubai", "Abu Dhabi", "Sharjah", "Ajman"];

const SINGAPORE_CITIES: &[&str] = &["Singapore"];

const INDIA_BUSINESS_TYPES: &[&str] = &[
    "restaurant", "gym", "salon", "spa", "photography studio", "boutique",
    "real estate agency", "hotel", "beauty parlor", "jewellery shop",
    "interior designer", "wedding planner", "coaching institute",
];

const OTHER_BUSINESS_TYPES: &[&str] = &["restaurant", "gym", "salon", "spa", "photography studio", "boutique"];

impl Default for QueryCatalog {
    fn default() -> Self {
        Self {
            regions: vec![
                Region::from_static(Some("India"), INDIA_CITIES, INDIA_BUSINESS_TYPES),
                Region::from_static(Some("USA"), USA_CITIES, OTHER_BUSINESS_TYPES),
                Region::from_static(Some("UK"), UK_CITIES, OTHER_BUSINESS_TYPES),
                Region::from_static(Some("Canada"), CANADA_CITIES, OTHER_BUSINESS_TYPES),
                Region::from_static(Some("Australia"), AUSTRALIA_CITIES, OTHER_BUSINESS_TYPES),
                Region::from_static(Some("UAE"), UAE_CITIES, OTHER_BUSINESS_TYPES),
                Region::from_static(None, SINGAPORE_CITIES, OTHER_BUSINESS_TYPES),
            ],
        }
    }
}

impl QueryCatalog {
    /// Expand the catalog into its query sequence: region order, then city, then business type.
    pub fn queries(&self) -> Vec<Query> {
        let mut out = Vec::new();
        for region in &self.regions {
            for city in &region.cities {
                for business_type in &region.business_types {
                    out.push(Query {
                        business_type: business_type.clone(),
                        city: city.clone(),
                        country: region.country.clone(),
                    });
                }
            }
        }
        out
    }
}

/// A search hit before detail lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: Option<String>,
}

/// Fields returned by a place-detail lookup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaceDetails {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
}

impl PlaceDetails {
    /// Website only if it is non-blank.
    pub fn website(&self) -> Option<&str> {
        non_blank(self.website.as_deref())
    }
}

/// Result of the best-effort website enrichment. Both fields may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub handle: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeadError {
    #[error("lead business name must not be empty")]
    EmptyName,
}

/// A captured business contact. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lead {
    business_name: String,
    email: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    social_handle: Option<String>,
    location: String,
    rating: f64,
    review_count: u32,
    business_type: String,
    captured_at: DateTime<Utc>,
}

impl Lead {
    pub fn from_details(
        details: &PlaceDetails,
        business_type: impl Into<String>,
        contact: ContactInfo,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, LeadError> {
        let business_name = details.name.trim();
        if business_name.is_empty() {
            return Err(LeadError::EmptyName);
        }
        Ok(Self {
            business_name: business_name.to_string(),
            email: owned_non_blank(contact.email.as_deref()),
            phone: owned_non_blank(details.phone.as_deref()),
            website: owned_non_blank(details.website.as_deref()),
            social_handle: owned_non_blank(contact.handle.as_deref()),
            location: details.address.clone().unwrap_or_default(),
            rating: details.rating.unwrap_or(0.0),
            review_count: details.review_count.unwrap_or(0),
            business_type: business_type.into(),
            captured_at,
        })
    }

    pub fn business_name(&self) -> &str {
        &self.business_name
    }

    pub fn normalized_name(&self) -> String {
        normalize_name(&self.business_name)
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    pub fn social_handle(&self) -> Option<&str> {
        self.social_handle.as_deref()
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn rating(&self) -> f64 {
        self.rating
    }

    pub fn review_count(&self) -> u32 {
        self.review_count
    }

    pub fn business_type(&self) -> &str {
        &self.business_type
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn has_website(&self) -> bool {
        self.website.is_some()
    }

    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| e.contains('@'))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn owned_non_blank(value: Option<&str>) -> Option<String> {
    non_blank(value).map(ToString::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Paused,
    Stopping,
}

impl RunPhase {
    pub fn is_active(self) -> bool {
        !matches!(self, RunPhase::Idle)
    }
}

/// Dashboard projection of a captured lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub instagram: String,
    pub location: String,
    pub rating: f64,
    #[serde(rename = "type")]
    pub business_type: String,
    pub has_website: String,
    pub time: String,
}

impl RecentLead {
    pub fn from_lead(lead: &Lead) -> Self {
        let website = match lead.website() {
            Some(w) if w.chars().count() > 30 => format!("{}...", w.chars().take(30).collect::<String>()),
            Some(w) => w.to_string(),
            None => ABSENT.to_string(),
        };
        Self {
            name: lead.business_name().to_string(),
            email: lead.email().unwrap_or(ABSENT).to_string(),
            phone: lead.phone().unwrap_or(ABSENT).to_string(),
            website,
            instagram: lead.social_handle().unwrap_or(ABSENT).to_string(),
            location: lead.location().chars().take(40).collect(),
            rating: lead.rating(),
            business_type: lead.business_type().to_string(),
            has_website: bool_flag(lead.has_website()).to_string(),
            time: lead.captured_at().with_timezone(&Local).format("%H:%M:%S").to_string(),
        }
    }
}

/// Spreadsheet-style boolean used by the ledgers.
pub fn bool_flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Process-wide run status read by the control surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub phase: RunPhase,
    pub running: bool,
    pub paused: bool,
    pub current_action: String,
    pub current_query: String,
    pub progress: usize,
    pub total_queries: usize,
    pub leads_found: u64,
    pub leads_with_email: u64,
    pub processed_today: u64,
    pub skipped_duplicates: u64,
    pub recent_leads: Vec<RecentLead>,
    pub sheet_synced: bool,
}

impl StatusSnapshot {
    pub fn new(total_queries: usize) -> Self {
        Self {
            phase: RunPhase::Idle,
            running: false,
            paused: false,
            current_action: "Ready to start".to_string(),
            current_query: String::new(),
            progress: 0,
            total_queries,
            leads_found: 0,
            leads_with_email: 0,
            processed_today: 0,
            skipped_duplicates: 0,
            recent_leads: Vec::new(),
            sheet_synced: false,
        }
    }

    pub fn set_phase(&mut self, phase: RunPhase) {
        self.phase = phase;
        self.running = matches!(phase, RunPhase::Running | RunPhase::Paused);
        self.paused = matches!(phase, RunPhase::Paused);
    }

    /// Count a captured lead and put it at the head of the recent feed.
    pub fn record_capture(&mut self, lead: &Lead) {
        self.leads_found += 1;
        if lead.has_email() {
            self.leads_with_email += 1;
        }
        self.processed_today += 1;
        self.recent_leads.insert(0, RecentLead::from_lead(lead));
        self.recent_leads.truncate(RECENT_LEADS_CAP);
    }
}
