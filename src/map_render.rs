use serde_json::{json, Value as JsonValue};

use crate::icon::{resolve_icon, DisasterIcon, DisasterKind};
use crate::map_filter::{FilterState, Layer};
use crate::model::{DisasterReport, EvacuationRoute, LatLng, ReportStatus, Shelter};
use crate::util::format_date_id;


pub const TILE_URL: &'static str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const TILE_ATTRIBUTION: &'static str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";
pub const DETAIL_LABEL: &'static str = "Lihat Detail";


/// Everything a map view has loaded from the backend.
#[derive(Debug, Clone, Default)]
pub struct MapData {
    pub reports: Vec<DisasterReport>,
    pub shelters: Vec<Shelter>,
    pub routes: Vec<EvacuationRoute>,
}


#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub title: String,
    pub date: String,
    pub description: String,
    pub detail_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub report_id: i32,
    pub position: LatLng,
    pub icon: DisasterIcon,
    pub popup: Popup,
}

impl Marker {
    fn for_report(report: &DisasterReport) -> Self {
        Marker {
            report_id: report.id,
            position: report.position(),
            icon: resolve_icon(&report.disaster_type),
            popup: Popup {
                title: report.disaster_type.clone(),
                date: format_date_id(report.occurred_at),
                description: report.description.clone(),
                detail_url: format!("/laporan/{}", report.id),
            },
        }
    }

    fn to_json(&self) -> JsonValue {
        json!({
            "id": self.report_id,
            "lat": self.position.lat,
            "lng": self.position.lng,
            "icon": self.icon.id(),
            "icon_url": self.icon.asset(),
            "popup": {
                "title": self.popup.title,
                "date": self.popup.date,
                "description": self.popup.description,
                "detail_url": self.popup.detail_url,
                "detail_label": DETAIL_LABEL,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskZone {
    pub report_id: i32,
    pub center: LatLng,
    pub radius: f64,
    pub kind: DisasterKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutePolyline {
    pub route_id: i32,
    pub name: String,
    pub color: String,
    pub path: Vec<LatLng>,
}


#[derive(Debug, Clone, Default)]
pub struct RenderedMap {
    pub markers: Vec<Marker>,
    pub shelters: Vec<Shelter>,
    pub zones: Vec<RiskZone>,
    pub routes: Vec<RoutePolyline>,
    pub legend: Vec<DisasterKind>,
}

impl RenderedMap {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "markers": self.markers.iter().map(Marker::to_json).collect::<Vec<_>>(),
            "shelters": self.shelters.iter().map(Shelter::to_json).collect::<Vec<_>>(),
            "zones": self.zones.iter().map(|z| json!({
                "id": z.report_id,
                "lat": z.center.lat,
                "lng": z.center.lng,
                "radius": z.radius,
                "jenis_bencana": z.kind.label(),
            })).collect::<Vec<_>>(),
            "routes": self.routes.iter().map(|r| json!({
                "id": r.route_id,
                "nama": r.name,
                "warna": r.color,
                "koordinat": r.path.iter().map(LatLng::to_json).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
            "legend": self.legend.iter().map(|k| json!({
                "label": k.label(),
                "icon": k.icon().id(),
                "icon_url": k.icon().asset(),
            })).collect::<Vec<_>>(),
            "size": self.markers.len(),
        })
    }
}


/// Builds every layer from scratch. Nothing from a previous render survives.
pub fn render(data: &MapData, filter: &FilterState) -> RenderedMap {
    let markers = data.reports.iter()
        .filter(|r| filter.accepts_report(r.kind(), r.occurred_at))
        .map(Marker::for_report)
        .collect();

    let zones = if filter.is_layer_active(Layer::RiskZones) {
        data.reports.iter()
            .filter(|r| r.status == ReportStatus::Verified)
            .filter(|r| filter.matches(r.kind(), r.occurred_at))
            .map(|r| RiskZone {
                report_id: r.id,
                center: r.position(),
                radius: r.kind().risk_radius(),
                kind: r.kind(),
            })
            .collect()
    }
    else {
        Vec::new()
    };

    let shelters = if filter.is_layer_active(Layer::EvacuationFacilities) {
        data.shelters.clone()
    }
    else {
        Vec::new()
    };

    // A single point is not a path.
    let routes = if filter.is_layer_active(Layer::EvacuationRoutes) {
        data.routes.iter()
            .filter(|r| r.coordinates.len() >= 2)
            .map(|r| RoutePolyline {
                route_id: r.id,
                name: r.name.clone(),
                color: r.color_hex.clone(),
                path: r.coordinates.clone(),
            })
            .collect()
    }
    else {
        Vec::new()
    };

    let legend = if filter.is_layer_active(Layer::DisasterPoints) {
        DisasterKind::ALL.iter()
            .cloned()
            .filter(|&k| filter.is_kind_active(k))
            .collect()
    }
    else {
        Vec::new()
    };

    RenderedMap { markers, shelters, zones, routes, legend }
}


#[cfg(test)]
pub mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub fn report(id: i32, disaster_type: &str, status: ReportStatus) -> DisasterReport {
        DisasterReport {
            id,
            title: format!("Laporan {}", id),
            latitude: -6.2,
            longitude: 106.8,
            disaster_type: disaster_type.into(),
            occurred_at: NaiveDate::from_ymd(2025, 1, 12),
            description: "Air setinggi lutut".into(),
            status,
            city: "Jakarta".into(),
            admin_note: None,
        }
    }

    fn sample() -> MapData {
        MapData {
            reports: vec![
                report(1, "Banjir", ReportStatus::Verified),
                report(2, "Banjir", ReportStatus::Pending),
                report(3, "banjir", ReportStatus::Verified),
                report(4, "Gempa", ReportStatus::Verified),
                report(5, "Gempa", ReportStatus::Pending),
            ],
            shelters: Vec::new(),
            routes: vec![
                EvacuationRoute {
                    id: 1,
                    name: "Jalur A".into(),
                    description: String::new(),
                    color_hex: "#ff0000".into(),
                    disaster_type: "Banjir".into(),
                    coordinates: vec![
                        LatLng { lat: -6.2, lng: 106.8 },
                        LatLng { lat: -6.21, lng: 106.81 },
                    ],
                },
                EvacuationRoute {
                    id: 2,
                    name: "Jalur B".into(),
                    description: String::new(),
                    color_hex: "#00ff00".into(),
                    disaster_type: "Gempa".into(),
                    coordinates: vec![LatLng { lat: -6.2, lng: 106.8 }],
                },
            ],
        }
    }

    #[test]
    fn disabled_type_hides_its_markers() {
        let mut filter = FilterState::new();
        filter.toggle_disaster_type("Gempa");

        let rendered = render(&sample(), &filter);
        assert_eq!(rendered.markers.len(), 3);
        assert!(rendered.markers.iter().all(|m| m.icon.id() == "flood"));
        assert!(!rendered.legend.contains(&DisasterKind::Earthquake));
    }

    #[test]
    fn disabled_point_layer_hides_all_markers() {
        let mut filter = FilterState::new();
        filter.toggle_layer("Titik Bencana").unwrap();

        let rendered = render(&sample(), &filter);
        assert!(rendered.markers.is_empty());
        assert!(rendered.legend.is_empty());
        // Risk zones have their own layer.
        assert_eq!(rendered.zones.len(), 3);
    }

    #[test]
    fn zones_only_for_verified_reports() {
        let rendered = render(&sample(), &FilterState::new());
        let ids = rendered.zones.iter().map(|z| z.report_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(rendered.zones[2].radius, DisasterKind::Earthquake.risk_radius());
    }

    #[test]
    fn single_point_routes_are_not_drawn() {
        let rendered = render(&sample(), &FilterState::new());
        assert_eq!(rendered.routes.len(), 1);
        assert_eq!(rendered.routes[0].name, "Jalur A");
    }

    #[test]
    fn popup_carries_formatted_fields() {
        let rendered = render(&sample(), &FilterState::new());
        let popup = &rendered.markers[0].popup;

        assert_eq!(popup.title, "Banjir");
        assert_eq!(popup.date, "12 Januari 2025");
        assert_eq!(popup.detail_url, "/laporan/1");

        let json = rendered.to_json();
        assert_eq!(json["size"], 5);
        assert_eq!(json["markers"][0]["popup"]["detail_label"], DETAIL_LABEL);
    }

    #[test]
    fn marker_count_matches_filter_for_every_combination() {
        let data = sample();

        for &points_on in &[true, false] {
            for &flood_on in &[true, false] {
                for &quake_on in &[true, false] {
                    let mut filter = FilterState::new();
                    filter.set_layer(Layer::DisasterPoints, points_on);
                    filter.set_disaster_kind(DisasterKind::Flood, flood_on);
                    filter.set_disaster_kind(DisasterKind::Earthquake, quake_on);

                    let expected = data.reports.iter()
                        .filter(|r| points_on && match r.kind() {
                            DisasterKind::Flood => flood_on,
                            DisasterKind::Earthquake => quake_on,
                            _ => true,
                        })
                        .count();

                    assert_eq!(render(&data, &filter).markers.len(), expected);
                }
            }
        }
    }
}
