use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use rocket::{
    State,
    request::LenientForm,
    response::content::Json,
};
use serde_json::{json, Value as JsonValue};

use crate::authoring::{RouteFields, ShelterFields};
use crate::backend::{Backend, SharedBackend};
use crate::error::{SiagaError, SiagaResult};
use crate::map_source;
use crate::map_view::{MapMode, MapState, MapView};
use crate::model::LatLng;
use crate::task_scheduler::{Task, TaskSchedulerBuilder};
use crate::util;


type JsonResult = SiagaResult<Json<String>>;


const MAX_SESSIONS: usize = 1024;
const EXPIRE_PERIOD: u64 = 60; // seconds


/// Open map views by id. Each view owns its filter state and layers.
pub struct MapSessions {
    views: Mutex<HashMap<String, MapView>>,
    ttl: Duration,
}

impl MapSessions {
    pub fn new(ttl: Duration) -> Self {
        MapSessions {
            views: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<HashMap<String, MapView>> {
        self.views.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_view<T, F>(&self, id: &str, job: F) -> SiagaResult<T> where
        F: FnOnce(&mut MapView) -> SiagaResult<T> {

        let mut views = self.lock();
        let view = views.get_mut(id).ok_or(SiagaError::NotFound)?;
        job(view)
    }

    pub fn open(&self, mode: MapMode, backend: &dyn Backend) -> SiagaResult<JsonValue> {
        let mut view = MapView::new(mode);
        view.initialize()?;

        let id = loop {
            let id = util::generate_rand_id(32);
            let mut views = self.lock();

            if !views.contains_key(&id) {
                if views.len() >= MAX_SESSIONS {
                    let ttl = self.ttl;
                    views.retain(|_, v| !v.is_idle(ttl));
                }

                while views.len() >= MAX_SESSIONS {
                    let oldest = views.iter()
                        .min_by_key(|(_, v)| v.last_used())
                        .map(|(k, _)| k.clone());

                    match oldest.and_then(|k| views.remove(&k).map(|v| (k, v))) {
                        Some((k, mut old)) => {
                            old.dispose();
                            debug!("Evicted map session {}", k);
                        },
                        None => break,
                    }
                }

                views.insert(id.clone(), view);
                break id;
            }
        };

        self.refresh(&id, backend)
    }

    pub fn show(&self, id: &str) -> SiagaResult<JsonValue> {
        self.with_view(id, |view| {
            if view.state() == MapState::Disposed {
                return Err(SiagaError::Disposed);
            }
            Ok(view.to_json(id))
        })
    }

    /// The registry lock is not held while the backend is queried.
    pub fn refresh(&self, id: &str, backend: &dyn Backend) -> SiagaResult<JsonValue> {
        let ticket = self.with_view(id, |view| view.begin_fetch())?;

        let outcome = map_source::fetch_all(backend);

        self.with_view(id, |view| {
            view.finish_fetch(&ticket, outcome)?;
            Ok(view.to_json(id))
        })
    }

    pub fn update<F>(&self, id: &str, change: F) -> SiagaResult<JsonValue> where
        F: FnOnce(&mut MapView) -> SiagaResult<()> {

        self.with_view(id, |view| {
            change(view)?;
            Ok(view.to_json(id))
        })
    }

    pub fn dispose(&self, id: &str) -> SiagaResult<()> {
        self.with_view(id, |view| {
            view.dispose();
            Ok(())
        })
    }

    pub fn submit_route(&self, id: &str, fields: &RouteFields, backend: &dyn Backend)
        -> SiagaResult<JsonValue> {

        let new_route = self.with_view(id, |view| view.prepare_route(fields))?;

        let created = backend.create_route(&new_route)?;
        info!("Route {} created from map {}", created.id, id);
        let routes = backend.list_routes();

        self.with_view(id, |view| {
            view.route_saved(&new_route, routes)?;
            Ok(json!({
                "route": created.to_json(),
                "map": view.to_json(id),
            }))
        })
    }

    pub fn submit_shelter(&self, id: &str, fields: &ShelterFields, backend: &dyn Backend)
        -> SiagaResult<JsonValue> {

        let new_shelter = self.with_view(id, |view| view.prepare_shelter(fields))?;

        let created = backend.create_shelter(&new_shelter)?;
        info!("Shelter {} created from map {}", created.id, id);
        let shelters = backend.list_shelters();

        self.with_view(id, |view| {
            view.shelter_saved(&new_shelter, shelters)?;
            Ok(json!({
                "posko": created.to_json(),
                "map": view.to_json(id),
            }))
        })
    }

    /// Drops views nobody has touched within the TTL. Returns how many went.
    pub fn expire_idle(&self) -> usize {
        let ttl = self.ttl;
        let mut views = self.lock();
        let before = views.len();

        views.retain(|_, view| {
            if view.is_idle(ttl) {
                view.dispose();
                false
            }
            else {
                true
            }
        });

        before - views.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}


pub fn init_map_sys(sessions: Arc<MapSessions>, scheduler: &mut TaskSchedulerBuilder) {
    let job = move || {
        let expired = sessions.expire_idle();
        if expired > 0 {
            info!("Expired {} idle map sessions", expired);
        }
        Duration::new(EXPIRE_PERIOD, 0)
    };

    scheduler.add_task(Task::new("map-session-expiry", job, Duration::new(EXPIRE_PERIOD, 0)));
}


fn json_result(val: JsonValue) -> JsonResult {
    Ok(Json(val.to_string()))
}

fn parse_point(lat: f64, lng: f64) -> SiagaResult<LatLng> {
    LatLng::new(lat, lng)
}


#[post("/map-session?<mode>")]
pub fn post_map_session(mode: Option<String>, sessions: State<Arc<MapSessions>>,
    backend: State<SharedBackend>) -> JsonResult {

    let mode = MapMode::parse(mode.as_ref().map_or("", |m| m.as_str()))?;
    json_result(sessions.open(mode, backend.inner().as_ref())?)
}

#[get("/map-session/<id>")]
pub fn get_map_session(id: String, sessions: State<Arc<MapSessions>>) -> JsonResult {
    json_result(sessions.show(&id)?)
}

#[delete("/map-session/<id>")]
pub fn delete_map_session(id: String, sessions: State<Arc<MapSessions>>) -> JsonResult {
    sessions.dispose(&id)?;
    json_result(json!({ "id": id, "state": "disposed" }))
}

#[post("/map-session/<id>/refresh")]
pub fn post_refresh(id: String, sessions: State<Arc<MapSessions>>,
    backend: State<SharedBackend>) -> JsonResult {

    json_result(sessions.refresh(&id, backend.inner().as_ref())?)
}

#[post("/map-session/<id>/layer?<name>")]
pub fn post_toggle_layer(id: String, name: String, sessions: State<Arc<MapSessions>>) -> JsonResult {
    json_result(sessions.update(&id, |view| view.toggle_layer(&name).map(|_| ()))?)
}

#[post("/map-session/<id>/disaster-type?<jenis>")]
pub fn post_toggle_disaster_type(id: String, jenis: String,
    sessions: State<Arc<MapSessions>>) -> JsonResult {

    json_result(sessions.update(&id, |view| view.toggle_disaster_type(&jenis).map(|_| ()))?)
}

#[post("/map-session/<id>/date-range?<from>&<to>")]
pub fn post_date_range(id: String, from: String, to: String,
    sessions: State<Arc<MapSessions>>) -> JsonResult {

    let from = util::parse_date(&from)
        .ok_or_else(|| SiagaError::validation("Invalid start date"))?;
    let to = util::parse_date(&to)
        .ok_or_else(|| SiagaError::validation("Invalid end date"))?;

    json_result(sessions.update(&id, |view| view.set_date_range(from, to))?)
}

#[delete("/map-session/<id>/date-range")]
pub fn delete_date_range(id: String, sessions: State<Arc<MapSessions>>) -> JsonResult {
    json_result(sessions.update(&id, |view| view.clear_date_range())?)
}

#[post("/map-session/<id>/route-draft/point?<lat>&<lng>")]
pub fn post_route_point(id: String, lat: f64, lng: f64,
    sessions: State<Arc<MapSessions>>) -> JsonResult {

    let point = parse_point(lat, lng)?;
    json_result(sessions.update(&id, |view| view.add_route_point(point).map(|_| ()))?)
}

#[delete("/map-session/<id>/route-draft/points")]
pub fn delete_route_points(id: String, sessions: State<Arc<MapSessions>>) -> JsonResult {
    json_result(sessions.update(&id, |view| view.reset_route_points())?)
}

#[post("/map-session/<id>/route-draft/submit", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_route_submit(id: String, form: Option<LenientForm<RouteFields>>,
    sessions: State<Arc<MapSessions>>, backend: State<SharedBackend>) -> JsonResult {

    let form = form.ok_or_else(|| SiagaError::validation("Invalid form"))?;
    json_result(sessions.submit_route(&id, &form, backend.inner().as_ref())?)
}

#[post("/map-session/<id>/shelter-draft/position?<lat>&<lng>")]
pub fn post_shelter_position(id: String, lat: f64, lng: f64,
    sessions: State<Arc<MapSessions>>) -> JsonResult {

    let point = parse_point(lat, lng)?;
    json_result(sessions.update(&id, |view| view.place_shelter(point))?)
}

#[post("/map-session/<id>/shelter-draft/submit", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_shelter_submit(id: String, form: Option<LenientForm<ShelterFields>>,
    sessions: State<Arc<MapSessions>>, backend: State<SharedBackend>) -> JsonResult {

    let form = form.ok_or_else(|| SiagaError::validation("Invalid form"))?;
    json_result(sessions.submit_shelter(&id, &form, backend.inner().as_ref())?)
}


#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::{ContentType, Status};
    use rocket::local::{Client, LocalRequest};

    use crate::backend::memory::MemoryBackend;
    use crate::map_render::tests::report;
    use crate::model::ReportStatus;
    use crate::tests::client_with;

    fn open(client: &Client, mode: &str) -> JsonValue {
        let mut res = client.post(format!("/map-session?mode={}", mode)).dispatch();
        assert_eq!(res.status(), Status::Ok);
        serde_json::from_str(&res.body_string().unwrap()).unwrap()
    }

    fn call(req: LocalRequest) -> (Status, JsonValue) {
        let mut res = req.dispatch();
        let body = res.body_string().unwrap_or_default();
        (res.status(), serde_json::from_str(&body).unwrap_or(JsonValue::Null))
    }

    #[test]
    fn single_flood_report_renders_one_marker() {
        let backend = MemoryBackend::with_reports(vec![report(1, "Banjir", ReportStatus::Pending)]);
        let (client, _) = client_with(backend);

        let map = open(&client, "publik");
        assert_eq!(map["state"], "rendering");
        assert_eq!(map["layers"]["markers"].as_array().unwrap().len(), 1);
        assert_eq!(map["layers"]["markers"][0]["icon"], "flood");
        assert_eq!(map["layers"]["markers"][0]["popup"]["date"], "12 Januari 2025");
        assert_eq!(map["error"], JsonValue::Null);
    }

    #[test]
    fn unreachable_backend_shows_demo_data() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        let (client, _) = client_with(backend);

        let map = open(&client, "publik");
        assert_eq!(map["error"], map_source::FALLBACK_ERROR);
        assert_eq!(map["layers"]["markers"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn toggles_redraw_the_session() {
        let backend = MemoryBackend::with_reports(vec![
            report(1, "Banjir", ReportStatus::Verified),
            report(2, "Banjir", ReportStatus::Verified),
            report(3, "Banjir", ReportStatus::Verified),
            report(4, "Gempa", ReportStatus::Verified),
            report(5, "Gempa", ReportStatus::Verified),
        ]);
        let (client, _) = client_with(backend);
        let id = open(&client, "publik")["id"].as_str().unwrap().to_owned();

        let (status, map) = call(client.post(format!("/map-session/{}/disaster-type?jenis=Gempa", id)));
        assert_eq!(status, Status::Ok);
        assert_eq!(map["layers"]["markers"].as_array().unwrap().len(), 3);
        assert_eq!(map["redraws"], 2);

        let (status, _) = call(client.post(format!("/map-session/{}/layer?name=Satelit", id)));
        assert_eq!(status, Status::UnprocessableEntity);

        let (status, _) = call(client.post(format!("/map-session/{}/date-range?from=2025-02-01&to=2025-01-01", id)));
        assert_eq!(status, Status::UnprocessableEntity);

        let (status, map) = call(client.post(format!("/map-session/{}/layer?name=Titik%20Bencana", id)));
        assert_eq!(status, Status::Ok);
        assert!(map["layers"]["markers"].as_array().unwrap().is_empty());
    }

    #[test]
    fn disposed_session_is_gone() {
        let (client, _) = client_with(MemoryBackend::new());
        let id = open(&client, "publik")["id"].as_str().unwrap().to_owned();

        let (status, _) = call(client.delete(format!("/map-session/{}", id)));
        assert_eq!(status, Status::Ok);

        let (status, _) = call(client.get(format!("/map-session/{}", id)));
        assert_eq!(status, Status::Gone);

        let (status, _) = call(client.get("/map-session/nope"));
        assert_eq!(status, Status::NotFound);
    }

    #[test]
    fn route_authoring_round_trip() {
        let (client, backend) = client_with(MemoryBackend::new());
        let id = open(&client, "admin")["id"].as_str().unwrap().to_owned();
        let form = "nama=Jalur+A&jenis_bencana=Banjir&warna=%23ff0000";

        call(client.post(format!("/map-session/{}/route-draft/point?lat=-6.1&lng=106.7", id)));
        let (status, map) = call(client.post(format!("/map-session/{}/route-draft/submit", id))
            .header(ContentType::Form)
            .body(form));
        assert_eq!(status, Status::UnprocessableEntity);
        assert_eq!(backend.write_count(), 0);
        assert_eq!(map["message"], "A route needs at least 2 points");

        let (_, map) = call(client.post(format!("/map-session/{}/route-draft/point?lat=-6.2&lng=106.8", id)));
        assert_eq!(map["drafts"]["route_points"].as_array().unwrap().len(), 2);

        let (status, res) = call(client.post(format!("/map-session/{}/route-draft/submit", id))
            .header(ContentType::Form)
            .body(form));
        assert_eq!(status, Status::Ok);
        assert_eq!(backend.write_count(), 1);
        assert_eq!(res["route"]["warna"], "#ff0000");
        assert!(res["map"]["drafts"]["route_points"].as_array().unwrap().is_empty());
        assert_eq!(res["map"]["layers"]["routes"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn failed_submit_keeps_the_draft() {
        let (client, backend) = client_with(MemoryBackend::new());
        let id = open(&client, "admin")["id"].as_str().unwrap().to_owned();

        call(client.post(format!("/map-session/{}/shelter-draft/position?lat=-6.1&lng=106.7", id)));
        call(client.post(format!("/map-session/{}/shelter-draft/position?lat=-6.3&lng=106.9", id)));

        backend.set_offline(true);
        let form = "nama=Posko+A&deskripsi=Utama&alamat=Jl.+Raya&jenis_posko=pengungsian&kapasitas=100";
        let (status, _) = call(client.post(format!("/map-session/{}/shelter-draft/submit", id))
            .header(ContentType::Form)
            .body(form));
        assert_eq!(status, Status::BadGateway);

        let (_, map) = call(client.get(format!("/map-session/{}", id)));
        assert_eq!(map["drafts"]["shelter_position"]["lat"], -6.3);
    }

    #[test]
    fn registry_never_grows_past_its_cap() {
        let sessions = MapSessions::new(Duration::new(60 * 60, 0));
        let backend = MemoryBackend::new();

        let first = sessions.open(MapMode::Public, &backend).unwrap();
        let first = first["id"].as_str().unwrap().to_owned();

        for _ in 0..MAX_SESSIONS + 8 {
            sessions.open(MapMode::Public, &backend).unwrap();
        }

        assert_eq!(sessions.len(), MAX_SESSIONS);
        match sessions.show(&first) {
            Err(SiagaError::NotFound) => (),
            other => panic!("oldest session should be evicted, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn failed_route_submit_keeps_points() {
        let (client, backend) = client_with(MemoryBackend::new());
        let id = open(&client, "admin")["id"].as_str().unwrap().to_owned();

        call(client.post(format!("/map-session/{}/route-draft/point?lat=-6.1&lng=106.7", id)));
        call(client.post(format!("/map-session/{}/route-draft/point?lat=-6.2&lng=106.8", id)));

        backend.set_offline(true);
        let (status, _) = call(client.post(format!("/map-session/{}/route-draft/submit", id))
            .header(ContentType::Form)
            .body("nama=Jalur+A&jenis_bencana=Banjir"));
        assert_eq!(status, Status::BadGateway);
        assert_eq!(backend.write_count(), 0);

        let (_, map) = call(client.get(format!("/map-session/{}", id)));
        assert_eq!(map["drafts"]["route_points"].as_array().unwrap().len(), 2);
        assert!(map["layers"]["routes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn idle_sessions_expire() {
        let sessions = MapSessions::new(Duration::new(0, 0));
        let backend = MemoryBackend::new();
        sessions.open(MapMode::Public, &backend).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(sessions.expire_idle(), 1);
        assert_eq!(sessions.len(), 0);
    }
}
