//! Multi-factor technician matching
//!
//! Weighted score in [0, 1] per candidate:
//! trade fit 0.35, certification coverage 0.15, availability today 0.20,
//! workload headroom 0.15, geographic proximity 0.15. Candidates below the
//! 0.4 threshold are dropped.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use uuid::Uuid;

use call_agent_core::{Certification, GeoPoint, Qualification, TradeCategory, Urgency, Worker};

const WEIGHT_TRADE: f64 = 0.35;
const WEIGHT_CERTIFICATIONS: f64 = 0.15;
const WEIGHT_AVAILABILITY: f64 = 0.20;
const WEIGHT_WORKLOAD: f64 = 0.15;
const WEIGHT_PROXIMITY: f64 = 0.15;

const SCORE_THRESHOLD: f64 = 0.4;

/// What the job needs from a technician
#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub trade: TradeCategory,
    pub urgency: Urgency,
    pub required_certifications: Vec<Certification>,
    /// Gate: candidates below this qualification are excluded
    pub min_qualification: Option<Qualification>,
    pub location: Option<GeoPoint>,
    pub service_radius_km: f64,
    /// Instant used for availability checks
    pub when: DateTime<Utc>,
}

impl MatchRequest {
    pub fn new(trade: TradeCategory, urgency: Urgency) -> Self {
        Self {
            trade,
            urgency,
            required_certifications: Vec::new(),
            min_qualification: None,
            location: None,
            service_radius_km: 30.0,
            when: Utc::now(),
        }
    }
}

/// One scored candidate
#[derive(Debug, Clone, Serialize)]
pub struct TechnicianMatch {
    pub worker_id: Uuid,
    pub worker_name: String,
    /// Weighted score in [0, 1]
    pub score: f64,
    pub available_today: bool,
    pub headroom: f64,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
    /// Rough travel estimate, 2 min per km
    pub estimated_travel_minutes: Option<u32>,
}

/// Matching result
#[derive(Debug, Clone, Serialize)]
pub enum MatchOutcome {
    /// Candidates above threshold, best first
    Ranked(Vec<TechnicianMatch>),
    /// Nobody can take the job; emergencies must escalate to the
    /// department's fallback contact
    NoneAvailable,
}

impl MatchOutcome {
    pub fn best(&self) -> Option<&TechnicianMatch> {
        match self {
            MatchOutcome::Ranked(matches) => matches.first(),
            MatchOutcome::NoneAvailable => None,
        }
    }
}

/// Trade similarity table for partial credit
fn trade_similarity(have: TradeCategory, want: TradeCategory) -> f64 {
    use TradeCategory::*;
    if have == want {
        return 1.0;
    }
    match (have, want) {
        (PlumbingHeating, Sanitary) | (Sanitary, PlumbingHeating) => 0.6,
        (Electrical, General) | (General, Electrical) => 0.3,
        _ => 0.0,
    }
}

/// Stateless matcher
pub struct TechnicianMatcher;

impl TechnicianMatcher {
    /// Rank candidates for a job.
    ///
    /// Emergency jobs only consider technicians available right now; when no
    /// one qualifies the outcome is a definite `NoneAvailable`, never a
    /// zero-score match.
    pub fn rank(request: &MatchRequest, candidates: &[Worker]) -> MatchOutcome {
        let mut matches: Vec<TechnicianMatch> = candidates
            .iter()
            .filter(|w| w.active)
            .filter_map(|w| Self::score(request, w))
            .collect();

        if request.urgency == Urgency::Emergency {
            matches.retain(|m| m.available_today);
        }
        matches.retain(|m| m.score >= SCORE_THRESHOLD);

        if matches.is_empty() {
            return MatchOutcome::NoneAvailable;
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.available_today.cmp(&a.available_today))
                .then(
                    b.headroom
                        .partial_cmp(&a.headroom)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.worker_id.cmp(&b.worker_id))
        });

        MatchOutcome::Ranked(matches)
    }

    /// Score one candidate; None when a hard requirement is missed
    fn score(request: &MatchRequest, worker: &Worker) -> Option<TechnicianMatch> {
        let mut reasons = Vec::new();
        let mut warnings = Vec::new();

        if let Some(min) = request.min_qualification {
            if worker.qualification < min {
                return None;
            }
        }

        // Trade fit with partial credit from the similarity table
        let trade_fit = worker
            .trades
            .iter()
            .map(|&t| trade_similarity(t, request.trade))
            .fold(0.0_f64, f64::max);
        if trade_fit == 0.0 {
            return None;
        }
        if trade_fit >= 1.0 {
            reasons.push(format!("Fachgebiet: {}", request.trade.as_str()));
        } else {
            warnings.push(format!(
                "Verwandtes Fachgebiet ({:.0}% Abdeckung)",
                trade_fit * 100.0
            ));
        }

        // Certification coverage
        let cert_coverage = if request.required_certifications.is_empty() {
            1.0
        } else {
            let held = request
                .required_certifications
                .iter()
                .filter(|c| worker.has_certification(**c))
                .count();
            if held < request.required_certifications.len() {
                warnings.push("Fehlende Zertifizierung".to_string());
            }
            held as f64 / request.required_certifications.len() as f64
        };

        // Availability right now; emergency duty counts for emergencies
        let weekday = request.when.weekday();
        let time = request.when.time();
        let in_shift = worker.is_available(weekday, time);
        let on_call = worker.on_emergency_duty && request.urgency == Urgency::Emergency;
        let available_today = in_shift || on_call;
        let availability = if available_today {
            reasons.push(if in_shift {
                "Sofort verfügbar".to_string()
            } else {
                "Notdienst aktiv".to_string()
            });
            1.0
        } else {
            warnings.push("Aktuell nicht verfügbar".to_string());
            0.0
        };

        // Workload headroom
        let headroom = worker.headroom();
        if headroom > 0.5 {
            reasons.push(format!("{:.0}% Kapazität frei", headroom * 100.0));
        }

        // Proximity
        let (proximity, travel) = match (request.location, worker.home_base) {
            (Some(job_loc), Some(base)) => {
                let distance = base.distance_km(&job_loc);
                if distance < 5.0 {
                    reasons.push(format!("Nur {:.1} km entfernt", distance));
                } else if distance > request.service_radius_km {
                    warnings.push(format!("Außerhalb Radius ({:.1} km)", distance));
                }
                let capped = distance.min(request.service_radius_km);
                (
                    1.0 - capped / request.service_radius_km,
                    Some((distance * 2.0).round() as u32),
                )
            }
            // No coordinates on either side: neutral credit
            _ => (0.5, None),
        };

        let score = trade_fit * WEIGHT_TRADE
            + cert_coverage * WEIGHT_CERTIFICATIONS
            + availability * WEIGHT_AVAILABILITY
            + headroom * WEIGHT_WORKLOAD
            + proximity * WEIGHT_PROXIMITY;

        Some(TechnicianMatch {
            worker_id: worker.id,
            worker_name: worker.name.clone(),
            score: (score * 1000.0).round() / 1000.0,
            available_today,
            headroom,
            reasons,
            warnings,
            estimated_travel_minutes: travel,
        })
    }
}
