use std::time::Duration;
use reqwest::{
    Client, RequestBuilder,
    header::ACCEPT,
};
use serde_json::Value as JsonValue;

use crate::backend::Backend;
use crate::error::{SiagaError, SiagaResult};
use crate::model::{
    self,
    DisasterReport, NewReport, ReportStatus,
    EvacuationRoute, NewRoute,
    Shelter, NewShelter,
};


/// Talks to a Laravel host that owns the data.
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> SiagaResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(HttpBackend {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, request: RequestBuilder) -> SiagaResult<JsonValue> {
        let mut res = request
            .header(ACCEPT, "application/json")
            .send()?;

        let status = res.status();
        let body = res.text()?;

        if !status.is_success() {
            warn!("Backend answered {}: {}", status, body.chars().take(200).collect::<String>());
            return Err(SiagaError::rejected(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    fn get_list(&self, path: &str) -> SiagaResult<Vec<JsonValue>> {
        let val = self.send(self.client.get(&self.url(path)))?;
        model::unwrap_list(val)
    }

    fn send_form(&self, request: RequestBuilder, form: &[(&str, String)]) -> SiagaResult<JsonValue> {
        self.send(request.form(form)).map(unwrap_item)
    }
}

/// Single-item responses may be wrapped as `{"data": {...}}`.
fn unwrap_item(val: JsonValue) -> JsonValue {
    match val {
        JsonValue::Object(mut obj) => match obj.remove("data") {
            Some(item @ JsonValue::Object(_)) => item,
            Some(other) => {
                obj.insert("data".into(), other);
                JsonValue::Object(obj)
            },
            None => JsonValue::Object(obj),
        },
        other => other,
    }
}

fn parse_all<T, F>(items: Vec<JsonValue>, parse: F, what: &str) -> Vec<T> where
    F: Fn(&JsonValue) -> SiagaResult<T> {

    items.iter()
        .filter_map(|item| match parse(item) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!("Skip an invalid {}: {}", what, err);
                None
            },
        })
        .collect()
}

impl Backend for HttpBackend {
    fn list_reports(&self) -> SiagaResult<Vec<DisasterReport>> {
        let items = self.get_list("/api/laporans")?;
        Ok(parse_all(items, DisasterReport::from_json, "report"))
    }

    fn get_report(&self, id: i32) -> SiagaResult<DisasterReport> {
        let val = self.send(self.client.get(&self.url(&format!("/laporans/{}", id))))?;
        DisasterReport::from_json(&unwrap_item(val))
    }

    fn create_report(&self, report: &NewReport) -> SiagaResult<DisasterReport> {
        let form = [
            ("judul", report.title.clone()),
            ("jenis_bencana", report.disaster_type.clone()),
            ("deskripsi", report.description.clone()),
            ("lokasi", report.city.clone()),
            ("latitude", report.position.lat.to_string()),
            ("longitude", report.position.lng.to_string()),
            ("tanggal", report.occurred_at.format("%Y-%m-%d").to_string()),
        ];

        let val = self.send_form(self.client.post(&self.url("/laporans")), &form)?;
        DisasterReport::from_json(&val)
    }

    fn set_report_status(&self, id: i32, status: ReportStatus, note: Option<&str>)
        -> SiagaResult<DisasterReport> {

        let action = match status {
            ReportStatus::Verified => "verify",
            ReportStatus::Rejected => "reject",
            ReportStatus::Pending => return Err(SiagaError::validation("A report can not be reset to pending")),
        };
        let form = [("catatan_admin", note.unwrap_or_default().to_owned())];

        let path = format!("/laporans/{}/{}", id, action);
        let val = self.send_form(self.client.put(&self.url(&path)), &form)?;

        // Some hosts answer with just a message; read the report back then.
        match DisasterReport::from_json(&val) {
            Ok(report) => Ok(report),
            Err(_) => self.get_report(id),
        }
    }

    fn list_routes(&self) -> SiagaResult<Vec<EvacuationRoute>> {
        let items = self.get_list("/api/jalur-evakuasi")?;
        Ok(parse_all(items, EvacuationRoute::from_json, "route"))
    }

    fn create_route(&self, route: &NewRoute) -> SiagaResult<EvacuationRoute> {
        let form = [
            ("nama", route.name.clone()),
            ("deskripsi", route.description.clone()),
            ("koordinat", route.coordinates_json()),
            ("jenis_bencana", route.disaster_type.clone()),
            ("warna", route.color_hex.clone()),
        ];

        let val = self.send_form(self.client.post(&self.url("/jalur-evakuasi")), &form)?;
        EvacuationRoute::from_json(&val)
    }

    fn list_shelters(&self) -> SiagaResult<Vec<Shelter>> {
        let items = self.get_list("/poskos")?;
        Ok(parse_all(items, Shelter::from_json, "shelter"))
    }

    fn create_shelter(&self, shelter: &NewShelter) -> SiagaResult<Shelter> {
        let form = [
            ("nama", shelter.name.clone()),
            ("deskripsi", shelter.description.clone()),
            ("alamat", shelter.address.clone()),
            ("kontak", shelter.contact.clone()),
            ("jenis_posko", shelter.kind.as_str().to_owned()),
            ("status", shelter.status.as_str().to_owned()),
            ("latitude", shelter.position.lat.to_string()),
            ("longitude", shelter.position.lng.to_string()),
            ("kapasitas", shelter.capacity.to_string()),
        ];

        let val = self.send_form(self.client.post(&self.url("/poskos")), &form)?;
        Shelter::from_json(&val)
    }
}
