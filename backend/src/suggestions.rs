//! Ranks previously issued quotes by how well they fit a new shipment request.
//!
//! Scoring is additive over independent rules and capped at [`MAX_SCORE`]. The
//! pure part ([`score_candidate`], [`rank`]) works on already-loaded rows so it
//! can be tested without a database; [`suggest_for_request`] loads the pool.

use chrono::{Months, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{ServiceType, TransportMode},
    models::{Provider, Quote, ShipmentRequest},
    schema::{providers, quotes, shipment_requests},
};

pub const MAX_SCORE: u32 = 100;

pub const WEIGHT_TRANSPORT_MODE: u32 = 20;
pub const WEIGHT_ORIGIN: u32 = 15;
pub const WEIGHT_DESTINATION: u32 = 15;
pub const WEIGHT_PROVIDER: u32 = 10;
pub const WEIGHT_CARGO_WEIGHT: u32 = 15;
pub const WEIGHT_PACKAGING: u32 = 10;
pub const WEIGHT_RECENT: u32 = 15;
pub const WEIGHT_MODERATELY_RECENT: u32 = 10;
pub const WEIGHT_OLDER: u32 = 5;
pub const WEIGHT_HAZARDOUS: u32 = 5;

const WEIGHT_TOLERANCE: f64 = 0.20;
const RECENT_DAYS: i64 = 30;
const MODERATELY_RECENT_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionConfig {
    pub window_months: u32,
    pub min_score: u32,
    pub limit: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            window_months: 6,
            min_score: 30,
            limit: 10,
        }
    }
}

/// The request attributes the rules look at.
#[derive(Debug, Clone, Default)]
pub struct RequestProfile<'a> {
    pub service_type: Option<ServiceType>,
    pub origin_city: Option<&'a str>,
    pub origin_country: Option<&'a str>,
    pub destination_city: Option<&'a str>,
    pub destination_country: Option<&'a str>,
    pub weight_kg: Option<f64>,
    pub packaging_type: Option<&'a str>,
    pub hazardous: Option<bool>,
}

impl<'a> From<&'a ShipmentRequest> for RequestProfile<'a> {
    fn from(request: &'a ShipmentRequest) -> Self {
        Self {
            service_type: request.service_type.parse().ok(),
            origin_city: request.origin_city.as_deref(),
            origin_country: request.origin_country.as_deref(),
            destination_city: request.destination_city.as_deref(),
            destination_country: request.destination_country.as_deref(),
            weight_kg: request.weight_kg,
            packaging_type: request.packaging_type.as_deref(),
            hazardous: request.hazardous,
        }
    }
}

/// A prior quote together with the request it was issued for.
#[derive(Debug, Clone)]
pub struct CandidateProfile<'a> {
    pub transport_mode: Option<TransportMode>,
    pub origin: &'a str,
    pub destination: &'a str,
    pub provider_reliable: bool,
    pub quoted_on: NaiveDate,
    pub request: RequestProfile<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub points: u32,
    pub reasons: Vec<&'static str>,
}

impl Score {
    fn add(&mut self, points: u32, reason: &'static str) {
        self.points += points;
        self.reasons.push(reason);
    }

    pub fn capped(&self) -> u32 {
        self.points.min(MAX_SCORE)
    }

    pub fn reason(&self) -> String {
        self.reasons.join(", ")
    }
}

/// Provider quality is not modelled yet; any active provider counts as good.
pub fn is_reliable_provider(provider: &Provider) -> bool {
    provider.active
}

pub fn score_candidate(
    candidate: &CandidateProfile<'_>,
    target: &RequestProfile<'_>,
    today: NaiveDate,
) -> Score {
    let mut score = Score {
        points: 0,
        reasons: Vec::new(),
    };

    if let (Some(mode), Some(service)) = (candidate.transport_mode, target.service_type) {
        if mode.serves(service) {
            score.add(WEIGHT_TRANSPORT_MODE, "same transport mode");
        }
    }
    if location_matches(candidate.origin, target.origin_city, target.origin_country) {
        score.add(WEIGHT_ORIGIN, "similar origin");
    }
    if location_matches(
        candidate.destination,
        target.destination_city,
        target.destination_country,
    ) {
        score.add(WEIGHT_DESTINATION, "similar destination");
    }
    if candidate.provider_reliable {
        score.add(WEIGHT_PROVIDER, "reliable provider");
    }
    if weight_within_tolerance(candidate.request.weight_kg, target.weight_kg) {
        score.add(WEIGHT_CARGO_WEIGHT, "similar weight");
    }
    if let (Some(theirs), Some(ours)) = (candidate.request.packaging_type, target.packaging_type) {
        if theirs.trim().eq_ignore_ascii_case(ours.trim()) {
            score.add(WEIGHT_PACKAGING, "same packaging");
        }
    }

    let age_days = (today - candidate.quoted_on).num_days();
    if age_days <= RECENT_DAYS {
        score.add(WEIGHT_RECENT, "recent quote");
    } else if age_days <= MODERATELY_RECENT_DAYS {
        score.add(WEIGHT_MODERATELY_RECENT, "moderately recent quote");
    } else {
        score.add(WEIGHT_OLDER, "older quote");
    }

    if let (Some(theirs), Some(ours)) = (candidate.request.hazardous, target.hazardous) {
        if theirs == ours {
            score.add(WEIGHT_HAZARDOUS, "same hazardous classification");
        }
    }

    score
}

fn location_matches(location: &str, city: Option<&str>, country: Option<&str>) -> bool {
    let haystack = location.to_lowercase();
    let contains = |needle: Option<&str>| {
        needle
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .is_some_and(|needle| haystack.contains(&needle.to_lowercase()))
    };
    contains(city) || contains(country)
}

fn weight_within_tolerance(candidate: Option<f64>, target: Option<f64>) -> bool {
    match (candidate, target) {
        (Some(candidate), Some(target)) if target > 0.0 => {
            (candidate - target).abs() <= target * WEIGHT_TOLERANCE
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteSuggestion {
    pub quote_id: Uuid,
    pub request_folio: String,
    pub provider_name: String,
    pub transport_mode: String,
    pub origin: String,
    pub destination: String,
    pub unit_type: Option<String>,
    pub estimated_time: Option<String>,
    pub cost: f64,
    pub valid_until: Option<NaiveDate>,
    pub credit_days: Option<i32>,
    pub margin_pct: Option<f64>,
    pub score: u32,
    pub reason: String,
}

/// Scores every candidate row, keeps those at or above the threshold and
/// returns them best first. Ties go to the newer quote, then the lower id.
pub fn rank(
    rows: &[(Quote, Provider, ShipmentRequest)],
    target: &ShipmentRequest,
    config: &SuggestionConfig,
    today: NaiveDate,
) -> Vec<QuoteSuggestion> {
    let target_profile = RequestProfile::from(target);

    let mut scored: Vec<(u32, NaiveDateTime, &Quote, &Provider, &ShipmentRequest, String)> = rows
        .iter()
        .filter(|(quote, _, _)| quote.request_id != target.id)
        .filter_map(|(quote, provider, origin_request)| {
            let candidate = CandidateProfile {
                transport_mode: quote.transport_mode.parse().ok(),
                origin: &quote.origin,
                destination: &quote.destination,
                provider_reliable: is_reliable_provider(provider),
                quoted_on: quote.created_at.date(),
                request: RequestProfile::from(origin_request),
            };
            let score = score_candidate(&candidate, &target_profile, today);
            let points = score.capped();
            (points >= config.min_score).then(|| {
                (
                    points,
                    quote.created_at,
                    quote,
                    provider,
                    origin_request,
                    score.reason(),
                )
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.2.id.cmp(&b.2.id))
    });
    scored.truncate(config.limit);

    scored
        .into_iter()
        .map(
            |(score, _, quote, provider, origin_request, reason)| QuoteSuggestion {
                quote_id: quote.id,
                request_folio: origin_request.folio.clone(),
                provider_name: provider.name.clone(),
                transport_mode: quote.transport_mode.clone(),
                origin: quote.origin.clone(),
                destination: quote.destination.clone(),
                unit_type: quote.unit_type.clone(),
                estimated_time: quote.estimated_time.clone(),
                cost: quote.cost,
                valid_until: quote.valid_until,
                credit_days: quote.credit_days,
                margin_pct: quote.margin_pct,
                score,
                reason,
            },
        )
        .collect()
}

/// Loads the candidate pool for `target` and ranks it.
pub fn suggest_for_request(
    conn: &mut PgConnection,
    target: &ShipmentRequest,
    config: &SuggestionConfig,
) -> QueryResult<Vec<QuoteSuggestion>> {
    let now = Utc::now().naive_utc();
    let since = now
        .checked_sub_months(Months::new(config.window_months))
        .unwrap_or(NaiveDateTime::MIN);

    let rows: Vec<(Quote, Provider, ShipmentRequest)> = quotes::table
        .inner_join(providers::table)
        .inner_join(shipment_requests::table)
        .filter(quotes::created_at.ge(since))
        .filter(quotes::estimated_time.is_not_null())
        .filter(quotes::valid_until.is_not_null())
        .filter(quotes::request_id.ne(target.id))
        .order((quotes::created_at.desc(), quotes::id.asc()))
        .select((
            quotes::all_columns,
            providers::all_columns,
            shipment_requests::all_columns,
        ))
        .load(conn)?;

    let suggestions = rank(&rows, target, config, now.date());
    tracing::debug!(
        request_id = %target.id,
        candidates = rows.len(),
        returned = suggestions.len(),
        "ranked quote suggestions"
    );
    Ok(suggestions)
}
