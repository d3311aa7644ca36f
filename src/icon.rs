use std::collections::HashMap;

use crate::util::normalize_key;


lazy_static! {
    static ref SYNONYMS: HashMap<&'static str, DisasterKind> = {
        let table: &[(&'static str, DisasterKind)] = &[
            ("banjir", DisasterKind::Flood),
            ("banjir bandang", DisasterKind::Flood),
            ("banjir rob", DisasterKind::Flood),
            ("flood", DisasterKind::Flood),
            ("gempa", DisasterKind::Earthquake),
            ("gempa bumi", DisasterKind::Earthquake),
            ("gempabumi", DisasterKind::Earthquake),
            ("earthquake", DisasterKind::Earthquake),
            ("longsor", DisasterKind::Landslide),
            ("tanah longsor", DisasterKind::Landslide),
            ("landslide", DisasterKind::Landslide),
            ("kebakaran", DisasterKind::Fire),
            ("kebakaran hutan", DisasterKind::Fire),
            ("kebakaran hutan dan lahan", DisasterKind::Fire),
            ("karhutla", DisasterKind::Fire),
            ("fire", DisasterKind::Fire),
            ("tsunami", DisasterKind::Tsunami),
            ("gunung meletus", DisasterKind::Volcano),
            ("erupsi", DisasterKind::Volcano),
            ("erupsi gunung", DisasterKind::Volcano),
            ("letusan gunung", DisasterKind::Volcano),
            ("volcano", DisasterKind::Volcano),
            ("angin puting beliung", DisasterKind::Whirlwind),
            ("puting beliung", DisasterKind::Whirlwind),
            ("angin topan", DisasterKind::Whirlwind),
            ("cuaca ekstrem", DisasterKind::Whirlwind),
            ("kekeringan", DisasterKind::Drought),
            ("drought", DisasterKind::Drought),
        ];

        table.iter().cloned().collect()
    };
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DisasterKind {
    Flood,
    Earthquake,
    Landslide,
    Fire,
    Tsunami,
    Volcano,
    Whirlwind,
    Drought,
    Other,
}

impl DisasterKind {
    pub const ALL: [DisasterKind; 9] = [
        DisasterKind::Flood,
        DisasterKind::Earthquake,
        DisasterKind::Landslide,
        DisasterKind::Fire,
        DisasterKind::Tsunami,
        DisasterKind::Volcano,
        DisasterKind::Whirlwind,
        DisasterKind::Drought,
        DisasterKind::Other,
    ];

    /// Never fails; anything unknown is `Other`.
    pub fn from_label(label: &str) -> Self {
        SYNONYMS.get(normalize_key(label).as_str())
            .cloned()
            .unwrap_or(DisasterKind::Other)
    }

    pub fn label(self) -> &'static str {
        match self {
            DisasterKind::Flood => "Banjir",
            DisasterKind::Earthquake => "Gempa",
            DisasterKind::Landslide => "Longsor",
            DisasterKind::Fire => "Kebakaran",
            DisasterKind::Tsunami => "Tsunami",
            DisasterKind::Volcano => "Gunung Meletus",
            DisasterKind::Whirlwind => "Angin Puting Beliung",
            DisasterKind::Drought => "Kekeringan",
            DisasterKind::Other => "Lainnya",
        }
    }

    pub fn icon(self) -> DisasterIcon {
        DisasterIcon(self)
    }

    /// Radius of the risk zone drawn around a verified report.
    pub fn risk_radius(self) -> f64 {
        match self {
            DisasterKind::Earthquake => 5000.0,
            DisasterKind::Tsunami | DisasterKind::Volcano => 3000.0,
            DisasterKind::Flood | DisasterKind::Fire | DisasterKind::Drought => 1000.0,
            DisasterKind::Landslide | DisasterKind::Whirlwind => 500.0,
            DisasterKind::Other => 300.0,
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisasterIcon(DisasterKind);

impl DisasterIcon {
    pub fn id(self) -> &'static str {
        match self.0 {
            DisasterKind::Flood => "flood",
            DisasterKind::Earthquake => "earthquake",
            DisasterKind::Landslide => "landslide",
            DisasterKind::Fire => "fire",
            DisasterKind::Tsunami => "tsunami",
            DisasterKind::Volcano => "volcano",
            DisasterKind::Whirlwind => "whirlwind",
            DisasterKind::Drought => "drought",
            DisasterKind::Other => "other",
        }
    }

    pub fn asset(self) -> String {
        format!("icons/{}.png", self.id())
    }

    pub fn kind(self) -> DisasterKind {
        self.0
    }
}


pub fn resolve_icon(disaster_type: &str) -> DisasterIcon {
    DisasterKind::from_label(disaster_type).icon()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonyms_resolve_to_documented_icons() {
        let cases = [
            ("Banjir", "flood"),
            ("banjir bandang", "flood"),
            ("Gempa", "earthquake"),
            ("GEMPA BUMI", "earthquake"),
            ("longsor", "landslide"),
            ("Tanah  Longsor", "landslide"),
            ("Karhutla", "fire"),
            ("tsunami", "tsunami"),
            ("Erupsi", "volcano"),
            ("Puting Beliung", "whirlwind"),
            ("Kekeringan", "drought"),
        ];

        for &(input, expected) in cases.iter() {
            assert_eq!(resolve_icon(input).id(), expected, "input: {}", input);
        }
    }

    #[test]
    fn unknown_types_fall_back_to_other() {
        for input in &["", "   ", "wabah", "banjir!", "🌋"] {
            assert_eq!(resolve_icon(input).id(), "other");
        }
    }

    #[test]
    fn resolution_is_stable() {
        for input in &["Banjir", "something else", "gempa bumi"] {
            assert_eq!(resolve_icon(input), resolve_icon(input));
        }
    }

    #[test]
    fn labels_resolve_back_to_their_kind() {
        for &kind in DisasterKind::ALL.iter() {
            assert_eq!(DisasterKind::from_label(kind.label()), kind);
        }
        assert_eq!(DisasterKind::Flood.icon().asset(), "icons/flood.png");
    }
}
