use chrono::Local;
use rocket::{
    State,
    request::LenientForm,
    response::content::Json,
};
use serde_json::json;

use crate::backend::SharedBackend;
use crate::error::{SiagaError, SiagaResult};
use crate::model::{DisasterReport, LatLng, NewReport, ReportStatus};
use crate::util;


type JsonResult = SiagaResult<Json<String>>;


const MAX_TITLE_LEN: usize = 255;
const MAX_TEXT_LEN: usize = 65536;


#[derive(FromForm)]
pub struct ReportForm {
    judul: String,
    jenis_bencana: String,
    deskripsi: String,
    lokasi: String,
    latitude: f64,
    longitude: f64,
    tanggal: Option<String>,
}

impl ReportForm {
    fn verify_error(&self) -> Option<&'static str> {
        if self.judul.trim().is_empty() {
            Some("The title is required")
        }
        else if self.judul.chars().count() > MAX_TITLE_LEN {
            Some("The title can not be longer than 255 characters")
        }
        else if self.jenis_bencana.trim().is_empty() {
            Some("The disaster type is required")
        }
        else if self.deskripsi.trim().is_empty() {
            Some("The description is required")
        }
        else if self.deskripsi.len() >= MAX_TEXT_LEN {
            Some("The maximum length of the description is 65536")
        }
        else if self.lokasi.trim().is_empty() {
            Some("The location is required")
        }
        else {
            None
        }
    }

    fn to_new_report(&self) -> SiagaResult<NewReport> {
        if let Some(err) = self.verify_error() {
            return Err(SiagaError::validation(err));
        }

        let today = Local::now().naive_local().date();
        let occurred_at = match self.tanggal.as_ref().map(|t| t.trim()) {
            Some(text) if !text.is_empty() => util::parse_date(text)
                .ok_or_else(|| SiagaError::validation("Invalid date"))?,
            _ => today,
        };

        if occurred_at > today {
            return Err(SiagaError::validation("The date can not be in the future"));
        }

        Ok(NewReport {
            title: self.judul.trim().to_owned(),
            disaster_type: self.jenis_bencana.trim().to_owned(),
            description: self.deskripsi.trim().to_owned(),
            city: self.lokasi.trim().to_owned(),
            position: LatLng::new(self.latitude, self.longitude)?,
            occurred_at,
        })
    }
}


#[derive(FromForm)]
pub struct ReviewForm {
    catatan_admin: Option<String>,
}

impl ReviewForm {
    fn note(&self) -> SiagaResult<Option<&str>> {
        match self.catatan_admin.as_ref().map(|n| n.trim()) {
            Some(note) if note.len() >= MAX_TEXT_LEN => {
                Err(SiagaError::validation("The maximum length of the note is 65536"))
            },
            Some(note) if !note.is_empty() => Ok(Some(note)),
            _ => Ok(None),
        }
    }
}


fn report_list_json(reports: &[DisasterReport]) -> String {
    let parts = reports.iter()
        .map(DisasterReport::to_json)
        .collect::<Vec<_>>();

    json!({
        "data": parts,
        "size": parts.len(),
    }).to_string()
}

#[get("/laporans?<status>")]
pub fn get_reports(status: Option<String>, backend: State<SharedBackend>) -> JsonResult {
    let status = match status {
        Some(ref s) if !s.trim().is_empty() => Some(ReportStatus::parse(s)
            .map_err(|_| SiagaError::validation("Unknown status filter"))?),
        _ => None,
    };

    let reports = backend.list_reports()?
        .into_iter()
        .filter(|r| status.map_or(true, |s| r.status == s))
        .collect::<Vec<_>>();

    Ok(Json(report_list_json(&reports)))
}

#[get("/laporans/<id>")]
pub fn get_report(id: i32, backend: State<SharedBackend>) -> JsonResult {
    let report = backend.get_report(id)?;
    Ok(Json(json!({ "data": report.to_json() }).to_string()))
}

#[post("/laporans", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_report(form: Option<LenientForm<ReportForm>>, backend: State<SharedBackend>) -> JsonResult {
    let form = form.ok_or_else(|| SiagaError::validation("Invalid form"))?;
    let new_report = form.to_new_report()?;

    let report = backend.create_report(&new_report)?;
    info!("Report {} ({}) submitted", report.id, report.disaster_type);

    Ok(Json(json!({
        "message": "Laporan berhasil dikirim",
        "data": report.to_json(),
    }).to_string()))
}

fn review(id: i32, status: ReportStatus, form: Option<LenientForm<ReviewForm>>,
    backend: &SharedBackend) -> JsonResult {

    let note = match form {
        Some(ref form) => form.note()?,
        None => None,
    };

    let report = backend.set_report_status(id, status, note)?;
    info!("Report {} is now {}", id, status);

    Ok(Json(json!({ "data": report.to_json() }).to_string()))
}

#[put("/laporans/<id>/verify", data="<form>")]
pub fn put_verify_report(id: i32, form: Option<LenientForm<ReviewForm>>,
    backend: State<SharedBackend>) -> JsonResult {

    review(id, ReportStatus::Verified, form, backend.inner())
}

#[put("/laporans/<id>/reject", data="<form>")]
pub fn put_reject_report(id: i32, form: Option<LenientForm<ReviewForm>>,
    backend: State<SharedBackend>) -> JsonResult {

    review(id, ReportStatus::Rejected, form, backend.inner())
}


#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::{ContentType, Status};
    use serde_json::Value as JsonValue;

    use crate::backend::memory::MemoryBackend;
    use crate::map_render::tests::report;
    use crate::tests::client_with;

    #[test]
    fn lists_are_wrapped_in_data() {
        let backend = MemoryBackend::with_reports(vec![
            report(1, "Banjir", ReportStatus::Pending),
            report(2, "Gempa", ReportStatus::Verified),
        ]);
        let (client, _) = client_with(backend);

        for path in &["/laporans", "/api/laporans"] {
            let mut res = client.get(*path).dispatch();
            assert_eq!(res.status(), Status::Ok);
            let body: JsonValue = serde_json::from_str(&res.body_string().unwrap()).unwrap();
            assert_eq!(body["size"], 2);
        }

        let mut res = client.get("/laporans?status=diverifikasi").dispatch();
        let body: JsonValue = serde_json::from_str(&res.body_string().unwrap()).unwrap();
        assert_eq!(body["data"][0]["id"], 2);
    }

    #[test]
    fn submitted_report_starts_pending() {
        let (client, backend) = client_with(MemoryBackend::new());

        let mut res = client.post("/laporans")
            .header(ContentType::Form)
            .body("judul=Banjir+Kemang&jenis_bencana=Banjir&deskripsi=Setinggi+lutut&lokasi=Jakarta&latitude=-6.26&longitude=106.81&tanggal=2025-01-12")
            .dispatch();
        assert_eq!(res.status(), Status::Ok);

        let body: JsonValue = serde_json::from_str(&res.body_string().unwrap()).unwrap();
        assert_eq!(body["data"]["status"], "menunggu");
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn invalid_report_is_not_sent() {
        let (client, backend) = client_with(MemoryBackend::new());

        let mut res = client.post("/laporans")
            .header(ContentType::Form)
            .body("judul=&jenis_bencana=Banjir&deskripsi=x&lokasi=Jakarta&latitude=-6.26&longitude=106.81")
            .dispatch();
        assert_eq!(res.status(), Status::UnprocessableEntity);
        assert!(res.body_string().unwrap().contains("The title is required"));

        let res = client.post("/laporans")
            .header(ContentType::Form)
            .body("judul=A&jenis_bencana=Banjir&deskripsi=x&lokasi=Jakarta&latitude=-96&longitude=106.81")
            .dispatch();
        assert_eq!(res.status(), Status::UnprocessableEntity);
        assert_eq!(backend.write_count(), 0);
    }

    #[test]
    fn verify_and_reject_set_status_and_note() {
        let backend = MemoryBackend::with_reports(vec![
            report(1, "Banjir", ReportStatus::Pending),
            report(2, "Gempa", ReportStatus::Pending),
        ]);
        let (client, _) = client_with(backend);

        let mut res = client.put("/laporans/1/verify")
            .header(ContentType::Form)
            .body("catatan_admin=Sudah+dicek")
            .dispatch();
        let body: JsonValue = serde_json::from_str(&res.body_string().unwrap()).unwrap();
        assert_eq!(body["data"]["status"], "diverifikasi");
        assert_eq!(body["data"]["catatan_admin"], "Sudah dicek");

        let mut res = client.put("/laporans/2/reject").dispatch();
        let body: JsonValue = serde_json::from_str(&res.body_string().unwrap()).unwrap();
        assert_eq!(body["data"]["status"], "ditolak");

        let res = client.put("/laporans/9/reject").dispatch();
        assert_eq!(res.status(), Status::NotFound);
    }
}
