use rocket::{
    State,
    request::LenientForm,
    response::content::Json,
};
use serde_json::json;

use crate::authoring::ShelterFields;
use crate::backend::SharedBackend;
use crate::error::{SiagaError, SiagaResult};
use crate::model::{LatLng, Shelter, ShelterStatus};


type JsonResult = SiagaResult<Json<String>>;


#[derive(FromForm)]
pub struct ShelterForm {
    nama: String,
    deskripsi: String,
    alamat: String,
    kontak: Option<String>,
    jenis_posko: String,
    status: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    kapasitas: String,
}

impl ShelterForm {
    fn position(&self) -> SiagaResult<Option<LatLng>> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => LatLng::new(lat, lng).map(Some),
            _ => Ok(None),
        }
    }

    fn into_fields(self) -> ShelterFields {
        ShelterFields {
            nama: self.nama,
            deskripsi: self.deskripsi,
            alamat: self.alamat,
            kontak: self.kontak,
            jenis_posko: self.jenis_posko,
            status: self.status,
            kapasitas: self.kapasitas,
        }
    }
}


#[get("/poskos?<status>")]
pub fn get_shelters(status: Option<String>, backend: State<SharedBackend>) -> JsonResult {
    let status = match status {
        Some(ref s) if !s.trim().is_empty() => Some(ShelterStatus::parse(s)?),
        _ => None,
    };

    let parts = backend.list_shelters()?
        .iter()
        .filter(|s| status.map_or(true, |st| s.status == st))
        .map(Shelter::to_json)
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "data": parts,
        "size": parts.len(),
    }).to_string()))
}

#[post("/poskos", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_shelter(form: Option<LenientForm<ShelterForm>>, backend: State<SharedBackend>) -> JsonResult {
    let form = form.ok_or_else(|| SiagaError::validation("Invalid form"))?.into_inner();
    let position = form.position()?;
    let new_shelter = form.into_fields().to_new_shelter(position)?;

    let shelter = backend.create_shelter(&new_shelter)?;
    info!("Shelter {} created", shelter.id);

    Ok(Json(json!({
        "message": "Posko berhasil disimpan",
        "data": shelter.to_json(),
    }).to_string()))
}
