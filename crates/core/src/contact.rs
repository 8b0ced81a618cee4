//! Contact and address types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::tenant::TenantId;

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another point in kilometers (haversine)
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;

        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}

/// Property classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Residential,
    Commercial,
    Industrial,
}

/// Postal address with a German 5-digit postal code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub house_number: String,
    pub postal_code: String,
    pub city: String,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        house_number: impl Into<String>,
        postal_code: impl Into<String>,
        city: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let postal_code = postal_code.into();
        if postal_code.len() != 5 || !postal_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::InvalidPostalCode(postal_code));
        }
        Ok(Self {
            street: street.into(),
            house_number: house_number.into(),
            postal_code,
            city: city.into(),
        })
    }

    /// Single-line rendering, "Musterstr. 1, 10115 Berlin"
    pub fn display_line(&self) -> String {
        format!(
            "{} {}, {} {}",
            self.street, self.house_number, self.postal_code, self.city
        )
    }
}

/// Caller/customer record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    /// E.164 formatted phone number
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<Address>,
    pub geo: Option<GeoPoint>,
    pub property_type: PropertyType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker; contacts are never hard-deleted
    pub soft_deleted_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, phone: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            phone: phone.into(),
            email: None,
            address: None,
            geo: None,
            property_type: PropertyType::Residential,
            created_at: now,
            updated_at: now,
            soft_deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.soft_deleted_at.is_some()
    }

    /// Scrub personal data in place, keeping the key for referential integrity
    pub fn anonymize(&mut self) {
        self.name = "[gelöscht]".to_string();
        self.phone = String::new();
        self.email = None;
        self.address = None;
        self.geo = None;
        self.soft_deleted_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }
}
