use std::collections::BTreeMap;
use chrono::NaiveDate;
use serde_json::{json, Value as JsonValue};

use crate::error::{SiagaError, SiagaResult};
use crate::icon::DisasterKind;
use crate::util::normalize_key;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    DisasterPoints,
    RiskZones,
    EvacuationFacilities,
    EvacuationRoutes,
}

impl Layer {
    pub const ALL: [Layer; 4] = [
        Layer::DisasterPoints,
        Layer::RiskZones,
        Layer::EvacuationFacilities,
        Layer::EvacuationRoutes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Layer::DisasterPoints => "Titik Bencana",
            Layer::RiskZones => "Zona Rawan",
            Layer::EvacuationFacilities => "Fasilitas Evakuasi",
            Layer::EvacuationRoutes => "Jalur Evakuasi",
        }
    }

    pub fn parse(name: &str) -> SiagaResult<Self> {
        let key = normalize_key(&name.replace(|c: char| c == '-' || c == '_', " "));

        Layer::ALL.iter()
            .cloned()
            .find(|layer| normalize_key(layer.name()) == key)
            .ok_or_else(|| SiagaError::validation(format!("Unknown layer: {}", name)))
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> SiagaResult<Self> {
        if from > to {
            Err(SiagaError::validation("The start date must not be after the end date"))
        }
        else {
            Ok(DateRange { from, to })
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}


/// Toggle state of one map view. Everything starts enabled, with no date range.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    active_layers: BTreeMap<Layer, bool>,
    active_disaster_types: BTreeMap<DisasterKind, bool>,
    date_range: Option<DateRange>,
}

impl FilterState {
    pub fn new() -> Self {
        FilterState {
            active_layers: Layer::ALL.iter().map(|&l| (l, true)).collect(),
            active_disaster_types: DisasterKind::ALL.iter().map(|&k| (k, true)).collect(),
            date_range: None,
        }
    }

    pub fn is_layer_active(&self, layer: Layer) -> bool {
        self.active_layers.get(&layer).cloned().unwrap_or(false)
    }

    pub fn is_kind_active(&self, kind: DisasterKind) -> bool {
        self.active_disaster_types.get(&kind).cloned().unwrap_or(false)
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    /// Returns the new state of the layer.
    pub fn toggle_layer(&mut self, name: &str) -> SiagaResult<bool> {
        let layer = Layer::parse(name)?;
        Ok(self.set_layer(layer, !self.is_layer_active(layer)))
    }

    pub fn set_layer(&mut self, layer: Layer, active: bool) -> bool {
        self.active_layers.insert(layer, active);
        active
    }

    /// Unknown types toggle `Lainnya`, the same bucket their markers fall in.
    pub fn toggle_disaster_type(&mut self, disaster_type: &str) -> bool {
        let kind = DisasterKind::from_label(disaster_type);
        self.set_disaster_kind(kind, !self.is_kind_active(kind))
    }

    pub fn set_disaster_kind(&mut self, kind: DisasterKind, active: bool) -> bool {
        self.active_disaster_types.insert(kind, active);
        active
    }

    /// A rejected range leaves the previous one in place.
    pub fn set_date_range(&mut self, from: NaiveDate, to: NaiveDate) -> SiagaResult<DateRange> {
        let range = DateRange::new(from, to)?;
        self.date_range = Some(range);
        Ok(range)
    }

    pub fn clear_date_range(&mut self) {
        self.date_range = None;
    }

    /// Type and date only, whatever layer ends up drawing it.
    pub fn matches(&self, kind: DisasterKind, date: NaiveDate) -> bool {
        self.is_kind_active(kind)
            && self.date_range.map_or(true, |range| range.contains(date))
    }

    pub fn accepts_report(&self, kind: DisasterKind, date: NaiveDate) -> bool {
        self.is_layer_active(Layer::DisasterPoints) && self.matches(kind, date)
    }

    pub fn to_json(&self) -> JsonValue {
        let layers = self.active_layers.iter()
            .map(|(layer, &on)| (layer.name().to_owned(), JsonValue::Bool(on)))
            .collect::<serde_json::Map<_, _>>();
        let types = self.active_disaster_types.iter()
            .map(|(kind, &on)| (kind.label().to_owned(), JsonValue::Bool(on)))
            .collect::<serde_json::Map<_, _>>();

        json!({
            "active_layers": layers,
            "active_disaster_types": types,
            "date_range": self.date_range.map(|r| json!({
                "from": r.from.format("%Y-%m-%d").to_string(),
                "to": r.to.format("%Y-%m-%d").to_string(),
            })),
        })
    }
}

impl Default for FilterState {
    fn default() -> Self {
        FilterState::new()
    }
}
