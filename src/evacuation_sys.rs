use rocket::{
    State,
    request::LenientForm,
    response::content::Json,
};
use serde_json::json;

use crate::authoring::RouteFields;
use crate::backend::SharedBackend;
use crate::error::{SiagaError, SiagaResult};
use crate::icon::DisasterKind;
use crate::model::{self, EvacuationRoute};


type JsonResult = SiagaResult<Json<String>>;


/// The route fields plus the polyline, sent as a JSON list of points.
#[derive(FromForm)]
pub struct RouteForm {
    nama: String,
    deskripsi: Option<String>,
    koordinat: String,
    jenis_bencana: String,
    warna: Option<String>,
}

impl RouteForm {
    fn into_fields(self) -> (RouteFields, String) {
        let fields = RouteFields {
            nama: self.nama,
            deskripsi: self.deskripsi,
            jenis_bencana: self.jenis_bencana,
            warna: self.warna,
        };

        (fields, self.koordinat)
    }
}


#[get("/jalur-evakuasi?<jenis>")]
pub fn get_routes(jenis: Option<String>, backend: State<SharedBackend>) -> JsonResult {
    let kind = jenis.as_ref()
        .filter(|j| !j.trim().is_empty())
        .map(|j| DisasterKind::from_label(j));

    let parts = backend.list_routes()?
        .iter()
        .filter(|r| kind.map_or(true, |k| DisasterKind::from_label(&r.disaster_type) == k))
        .map(EvacuationRoute::to_json)
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "data": parts,
        "size": parts.len(),
    }).to_string()))
}

#[post("/jalur-evakuasi", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_route(form: Option<LenientForm<RouteForm>>, backend: State<SharedBackend>) -> JsonResult {
    let form = form.ok_or_else(|| SiagaError::validation("Invalid form"))?;
    let (fields, koordinat) = form.into_inner().into_fields();

    let points = model::parse_coordinates(&koordinat)
        .map_err(|_| SiagaError::validation("The coordinates must be a list of points"))?;
    let new_route = fields.to_new_route(&points)?;

    let route = backend.create_route(&new_route)?;
    info!("Route {} created with {} points", route.id, route.coordinates.len());

    Ok(Json(json!({
        "message": "Jalur evakuasi berhasil disimpan",
        "data": route.to_json(),
    }).to_string()))
}
