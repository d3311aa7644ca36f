use std::{convert::TryFrom, fmt};
use chrono::NaiveDate;
use serde_json::{json, Value as JsonValue};

use crate::error::{SiagaError, SiagaResult};
use crate::icon::DisasterKind;
use crate::util;


#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> SiagaResult<Self> {
        if !lat.is_finite() || lat < -90.0 || lat > 90.0 {
            Err(SiagaError::validation("Invalid latitude"))
        }
        else if !lng.is_finite() || lng < -180.0 || lng > 180.0 {
            Err(SiagaError::validation("Invalid longitude"))
        }
        else {
            Ok(LatLng { lat, lng })
        }
    }

    pub fn to_json(&self) -> JsonValue {
        json!({ "lat": self.lat, "lng": self.lng })
    }

    fn from_json(val: &JsonValue) -> SiagaResult<Self> {
        let (lat, lng) = match val {
            JsonValue::Array(pair) if pair.len() == 2 => (number(&pair[0]), number(&pair[1])),
            _ => (field_f64(val, "lat"), field_f64(val, "lng")),
        };

        match (lat, lng) {
            (Some(lat), Some(lng)) => LatLng::new(lat, lng),
            _ => Err(SiagaError::Parse("Invalid coordinate".into())),
        }
    }
}

/// Parses `[{"lat":..,"lng":..}, ...]` (or `[[lat, lng], ...]`), keeping order.
pub fn parse_coordinates(text: &str) -> SiagaResult<Vec<LatLng>> {
    let val: JsonValue = serde_json::from_str(text)?;
    coordinates_from_json(&val)
}

fn coordinates_from_json(val: &JsonValue) -> SiagaResult<Vec<LatLng>> {
    match val {
        JsonValue::Array(points) => points.iter().map(LatLng::from_json).collect(),
        // Some backends keep the polyline as a JSON string column.
        JsonValue::String(text) => parse_coordinates(text),
        _ => Err(SiagaError::Parse("Coordinates must be a list".into())),
    }
}

/// A list response is either a bare array or wrapped as `{"data": [...]}`.
pub fn unwrap_list(val: JsonValue) -> SiagaResult<Vec<JsonValue>> {
    match val {
        JsonValue::Array(items) => Ok(items),
        JsonValue::Object(mut obj) => match obj.remove("data") {
            Some(JsonValue::Array(items)) => Ok(items),
            _ => Err(SiagaError::Parse("Missing data list".into())),
        },
        _ => Err(SiagaError::Parse("Expected a list".into())),
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportStatus {
    Pending,
    Verified,
    Rejected,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 3] = [
        ReportStatus::Pending,
        ReportStatus::Verified,
        ReportStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "menunggu",
            ReportStatus::Verified => "diverifikasi",
            ReportStatus::Rejected => "ditolak",
        }
    }

    pub fn parse(text: &str) -> SiagaResult<Self> {
        match util::normalize_key(text).as_str() {
            "menunggu" | "pending" => Ok(ReportStatus::Pending),
            "diverifikasi" | "verified" => Ok(ReportStatus::Verified),
            "ditolak" | "rejected" => Ok(ReportStatus::Rejected),
            _ => Err(SiagaError::Parse(format!("Unknown report status: {}", text))),
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct DisasterReport {
    pub id: i32,
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub disaster_type: String,
    pub occurred_at: NaiveDate,
    pub description: String,
    pub status: ReportStatus,
    pub city: String,
    pub admin_note: Option<String>,
}

impl DisasterReport {
    pub fn kind(&self) -> DisasterKind {
        DisasterKind::from_label(&self.disaster_type)
    }

    pub fn position(&self) -> LatLng {
        LatLng { lat: self.latitude, lng: self.longitude }
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "id": self.id,
            "judul": self.title,
            "latitude": self.latitude,
            "longitude": self.longitude,
            "jenis_bencana": self.disaster_type,
            "tanggal": self.occurred_at.format("%Y-%m-%d").to_string(),
            "deskripsi": self.description,
            "status": self.status.as_str(),
            "lokasi": self.city,
            "catatan_admin": self.admin_note,
        })
    }

    pub fn from_json(val: &JsonValue) -> SiagaResult<Self> {
        let id = field_id(val, "Report")?;
        let latitude = field_f64(val, "latitude");
        let longitude = field_f64(val, "longitude");
        let occurred_at = ["tanggal", "tanggal_kejadian", "created_at"].iter()
            .filter_map(|key| field_str(val, key))
            .filter_map(|text| util::parse_date(&text))
            .next();

        let (position, occurred_at) = match (latitude, longitude, occurred_at) {
            (Some(latitude), Some(longitude), Some(occurred_at)) =>
                (checked_position(id, latitude, longitude)?, occurred_at),
            _ => return Err(SiagaError::Parse(format!("Report {} is missing location or date", id))),
        };

        Ok(DisasterReport {
            id,
            title: field_str(val, "judul").unwrap_or_default(),
            latitude: position.lat,
            longitude: position.lng,
            disaster_type: field_str(val, "jenis_bencana").unwrap_or_default(),
            occurred_at,
            description: field_str(val, "deskripsi").unwrap_or_default(),
            status: field_str(val, "status")
                .map(|s| ReportStatus::parse(&s))
                .unwrap_or(Ok(ReportStatus::Pending))?,
            city: field_str(val, "kota")
                .or_else(|| field_str(val, "lokasi"))
                .unwrap_or_default(),
            admin_note: field_str(val, "catatan_admin"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub title: String,
    pub disaster_type: String,
    pub description: String,
    pub city: String,
    pub position: LatLng,
    pub occurred_at: NaiveDate,
}


#[derive(Debug, Clone, PartialEq)]
pub struct EvacuationRoute {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub color_hex: String,
    pub disaster_type: String,
    pub coordinates: Vec<LatLng>,
}

impl EvacuationRoute {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "id": self.id,
            "nama": self.name,
            "deskripsi": self.description,
            "warna": self.color_hex,
            "jenis_bencana": self.disaster_type,
            "koordinat": self.coordinates.iter().map(LatLng::to_json).collect::<Vec<_>>(),
        })
    }

    pub fn from_json(val: &JsonValue) -> SiagaResult<Self> {
        let id = field_id(val, "Route")?;
        let coordinates = val.get("koordinat")
            .map(coordinates_from_json)
            .unwrap_or_else(|| Ok(Vec::new()))?;

        Ok(EvacuationRoute {
            id,
            name: field_str(val, "nama").unwrap_or_default(),
            description: field_str(val, "deskripsi").unwrap_or_default(),
            color_hex: field_str(val, "warna").unwrap_or_else(|| DEFAULT_ROUTE_COLOR.into()),
            disaster_type: field_str(val, "jenis_bencana").unwrap_or_default(),
            coordinates,
        })
    }
}

pub const DEFAULT_ROUTE_COLOR: &'static str = "#3388ff";

#[derive(Debug, Clone, PartialEq)]
pub struct NewRoute {
    pub name: String,
    pub description: String,
    pub color_hex: String,
    pub disaster_type: String,
    pub coordinates: Vec<LatLng>,
}

impl NewRoute {
    pub fn coordinates_json(&self) -> String {
        JsonValue::Array(self.coordinates.iter().map(LatLng::to_json).collect()).to_string()
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelterKind {
    Evacuation,
    Health,
    Logistics,
    PublicKitchen,
}

impl ShelterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ShelterKind::Evacuation => "pengungsian",
            ShelterKind::Health => "kesehatan",
            ShelterKind::Logistics => "logistik",
            ShelterKind::PublicKitchen => "dapur_umum",
        }
    }

    pub fn parse(text: &str) -> SiagaResult<Self> {
        match util::normalize_key(text).replace(' ', "_").as_str() {
            "pengungsian" | "posko_pengungsian" => Ok(ShelterKind::Evacuation),
            "kesehatan" | "posko_kesehatan" => Ok(ShelterKind::Health),
            "logistik" | "posko_logistik" => Ok(ShelterKind::Logistics),
            "dapur_umum" => Ok(ShelterKind::PublicKitchen),
            _ => Err(SiagaError::validation(format!("Unknown shelter kind: {}", text))),
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelterStatus {
    Active,
    Inactive,
}

impl ShelterStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ShelterStatus::Active => "aktif",
            ShelterStatus::Inactive => "tidak_aktif",
        }
    }

    pub fn parse(text: &str) -> SiagaResult<Self> {
        match util::normalize_key(text).replace(' ', "_").as_str() {
            "aktif" | "active" => Ok(ShelterStatus::Active),
            "tidak_aktif" | "nonaktif" | "inactive" => Ok(ShelterStatus::Inactive),
            _ => Err(SiagaError::validation(format!("Unknown shelter status: {}", text))),
        }
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct Shelter {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub address: String,
    pub contact: String,
    pub kind: ShelterKind,
    pub status: ShelterStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: i32,
}

impl Shelter {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "id": self.id,
            "nama": self.name,
            "deskripsi": self.description,
            "alamat": self.address,
            "kontak": self.contact,
            "jenis_posko": self.kind.as_str(),
            "status": self.status.as_str(),
            "latitude": self.latitude,
            "longitude": self.longitude,
            "kapasitas": self.capacity,
        })
    }

    pub fn from_json(val: &JsonValue) -> SiagaResult<Self> {
        let id = field_id(val, "Shelter")?;

        let position = match (field_f64(val, "latitude"), field_f64(val, "longitude")) {
            (Some(latitude), Some(longitude)) => checked_position(id, latitude, longitude)?,
            _ => return Err(SiagaError::Parse(format!("Shelter {} is missing its location", id))),
        };

        Ok(Shelter {
            id,
            name: field_str(val, "nama").unwrap_or_default(),
            description: field_str(val, "deskripsi").unwrap_or_default(),
            address: field_str(val, "alamat").unwrap_or_default(),
            contact: field_str(val, "kontak").unwrap_or_default(),
            kind: ShelterKind::parse(&field_str(val, "jenis_posko").unwrap_or_default())?,
            status: field_str(val, "status")
                .map(|s| ShelterStatus::parse(&s))
                .unwrap_or(Ok(ShelterStatus::Active))?,
            latitude: position.lat,
            longitude: position.lng,
            capacity: field_i64(val, "kapasitas")
                .and_then(|c| i32::try_from(c).ok())
                .unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewShelter {
    pub name: String,
    pub description: String,
    pub address: String,
    pub contact: String,
    pub kind: ShelterKind,
    pub status: ShelterStatus,
    pub position: LatLng,
    pub capacity: i32,
}


// Laravel serialises decimal columns as strings, so numbers may arrive either way.
fn number(val: &JsonValue) -> Option<f64> {
    match val {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field_f64(val: &JsonValue, key: &str) -> Option<f64> {
    val.get(key).and_then(number)
}

fn field_i64(val: &JsonValue, key: &str) -> Option<i64> {
    val.get(key).and_then(|v| match v {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn field_id(val: &JsonValue, what: &str) -> SiagaResult<i32> {
    let id = field_i64(val, "id")
        .ok_or_else(|| SiagaError::Parse(format!("{} without id", what)))?;

    i32::try_from(id)
        .map_err(|_| SiagaError::Parse(format!("{} id {} is out of range", what, id)))
}

fn checked_position(id: i32, lat: f64, lng: f64) -> SiagaResult<LatLng> {
    LatLng::new(lat, lng)
        .map_err(|err| SiagaError::Parse(format!("Record {}: {}", id, err)))
}

fn field_str(val: &JsonValue, key: &str) -> Option<String> {
    val.get(key).and_then(|v| v.as_str()).map(|s| s.to_owned())
}
