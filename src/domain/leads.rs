//! Customer consultation requests, deduplicated per phone number and tour.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRequest {
    pub full_name: String,
    pub phone_number: String,
    pub tour_id: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerConsultation {
    pub id: String,
    pub full_name: String,
    pub phone_number: String,
    pub tour_id: String,
    pub note: Option<String>,
    /// Number of times this pair asked for a consultation.
    pub count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerConsultation {
    pub fn first(id: String, request: ConsultationRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            full_name: request.full_name,
            phone_number: request.phone_number,
            tour_id: request.tour_id,
            note: request.note,
            count: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Folds a repeated submission into the existing record.
    pub fn repeat(&mut self, request: ConsultationRequest, now: DateTime<Utc>) {
        self.full_name = request.full_name;
        if request.note.is_some() {
            self.note = request.note;
        }
        self.count = self.count.saturating_add(1);
        self.updated_at = now;
    }

    pub fn is_repeat(&self) -> bool {
        self.count > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsultationError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("phone number {0:?} is not valid")]
    InvalidPhone(String),
}

/// Keeps digits and a leading `+`.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(char::is_ascii_digit));
    out
}

impl ConsultationRequest {
    /// Trims fields and normalises the phone number used as dedup key.
    pub fn validated(mut self) -> Result<Self, ConsultationError> {
        self.full_name = self.full_name.trim().to_string();
        self.tour_id = self.tour_id.trim().to_string();
        self.note = self
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        if self.full_name.is_empty() {
            return Err(ConsultationError::Missing("fullName"));
        }
        if self.tour_id.is_empty() {
            return Err(ConsultationError::Missing("tourId"));
        }
        if self.phone_number.trim().is_empty() {
            return Err(ConsultationError::Missing("phoneNumber"));
        }

        let phone = normalize_phone(&self.phone_number);
        let digits = phone.trim_start_matches('+').len();
        if !(8..=15).contains(&digits) {
            return Err(ConsultationError::InvalidPhone(self.phone_number));
        }
        self.phone_number = phone;
        Ok(self)
    }

    pub fn dedup_key(&self) -> (String, String) {
        (self.phone_number.clone(), self.tour_id.clone())
    }
}
