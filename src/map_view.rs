use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};
use chrono::NaiveDate;
use serde_json::{json, Value as JsonValue};

use crate::authoring::{RouteDraft, RouteFields, ShelterDraft, ShelterFields};
use crate::error::{SiagaError, SiagaResult};
use crate::map_filter::FilterState;
use crate::map_render::{self, MapData, RenderedMap, TILE_URL, TILE_ATTRIBUTION};
use crate::map_source::{self, FetchOutcome, FALLBACK_ERROR};
use crate::model::{EvacuationRoute, LatLng, NewRoute, NewShelter, Shelter};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    Uninitialized,
    /// Tile layer attached, nothing drawn yet.
    Initialized,
    Rendering,
    Disposed,
}

impl MapState {
    pub fn as_str(self) -> &'static str {
        match self {
            MapState::Uninitialized => "uninitialized",
            MapState::Initialized => "initialized",
            MapState::Rendering => "rendering",
            MapState::Disposed => "disposed",
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    Public,
    Admin,
}

impl MapMode {
    pub fn parse(text: &str) -> SiagaResult<Self> {
        match text.trim().to_lowercase().as_str() {
            "" | "publik" | "public" => Ok(MapMode::Public),
            "admin" | "relawan" => Ok(MapMode::Admin),
            _ => Err(SiagaError::validation(format!("Unknown map mode: {}", text))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MapMode::Public => "publik",
            MapMode::Admin => "admin",
        }
    }
}


#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}


/// Handed out when a fetch starts; the result is only applied if the
/// ticket is still the current one when it comes back.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    generation: u64,
    token: CancelToken,
}

impl FetchTicket {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}


pub struct MapView {
    mode: MapMode,
    state: MapState,
    filter: FilterState,
    data: MapData,
    rendered: RenderedMap,
    redraws: u64,
    error: Option<String>,
    demo: bool,
    in_flight: Option<FetchTicket>,
    generation: u64,
    route_draft: RouteDraft,
    shelter_draft: ShelterDraft,
    last_used: Instant,
}

impl MapView {
    pub fn new(mode: MapMode) -> Self {
        MapView {
            mode,
            state: MapState::Uninitialized,
            filter: FilterState::new(),
            data: MapData::default(),
            rendered: RenderedMap::default(),
            redraws: 0,
            error: None,
            demo: false,
            in_flight: None,
            generation: 0,
            route_draft: RouteDraft::default(),
            shelter_draft: ShelterDraft::default(),
            last_used: Instant::now(),
        }
    }

    pub fn state(&self) -> MapState {
        self.state
    }

    pub fn mode(&self) -> MapMode {
        self.mode
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn rendered(&self) -> &RenderedMap {
        &self.rendered
    }

    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.as_str())
    }

    pub fn route_draft(&self) -> &RouteDraft {
        &self.route_draft
    }

    pub fn shelter_draft(&self) -> &ShelterDraft {
        &self.shelter_draft
    }

    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    pub fn is_idle(&self, ttl: Duration) -> bool {
        self.last_used.elapsed() > ttl
    }

    fn ensure_alive(&mut self) -> SiagaResult<()> {
        if self.state == MapState::Disposed {
            return Err(SiagaError::Disposed);
        }

        self.last_used = Instant::now();
        Ok(())
    }

    fn ensure_admin(&mut self) -> SiagaResult<()> {
        self.ensure_alive()?;

        if self.mode != MapMode::Admin {
            return Err(SiagaError::validation("Route and shelter authoring needs an admin map"));
        }

        Ok(())
    }

    /// Attaches the tile layer.
    pub fn initialize(&mut self) -> SiagaResult<()> {
        self.ensure_alive()?;

        if self.state == MapState::Uninitialized {
            self.state = MapState::Initialized;
        }

        Ok(())
    }

    /// Starting a fetch supersedes one that is still running.
    pub fn begin_fetch(&mut self) -> SiagaResult<FetchTicket> {
        self.ensure_alive()?;

        if self.state == MapState::Uninitialized {
            return Err(SiagaError::validation("The map has not been initialized"));
        }

        if let Some(previous) = self.in_flight.take() {
            previous.token.cancel();
        }

        self.generation += 1;
        let ticket = FetchTicket {
            generation: self.generation,
            token: CancelToken::default(),
        };
        self.in_flight = Some(ticket.clone());

        Ok(ticket)
    }

    pub fn finish_fetch(&mut self, ticket: &FetchTicket, outcome: FetchOutcome) -> SiagaResult<()> {
        self.ensure_alive()?;

        if ticket.is_cancelled() || ticket.generation != self.generation {
            debug!("Drop a stale fetch result ({} < {})", ticket.generation, self.generation);
            return Err(SiagaError::Cancelled);
        }

        self.in_flight = None;

        match outcome.reports {
            Ok(reports) => {
                self.data.reports = reports;
                self.error = None;
                self.demo = false;
            },
            Err(_) => {
                self.data.reports = map_source::demo_reports();
                self.error = Some(FALLBACK_ERROR.to_owned());
                self.demo = true;
            },
        }

        // A failed list keeps what was loaded before.
        match outcome.routes {
            Ok(routes) => self.data.routes = routes,
            Err(err) => warn!("Keep stale routes: {}", err),
        }
        match outcome.shelters {
            Ok(shelters) => self.data.shelters = shelters,
            Err(err) => warn!("Keep stale shelters: {}", err),
        }

        self.redraw();
        Ok(())
    }

    /// Clears the layers and draws them again from the loaded data.
    fn redraw(&mut self) {
        self.rendered = map_render::render(&self.data, &self.filter);
        self.redraws += 1;
        self.state = MapState::Rendering;
    }

    fn redraw_if_drawn(&mut self) {
        if self.state == MapState::Rendering {
            self.redraw();
        }
    }

    pub fn toggle_layer(&mut self, name: &str) -> SiagaResult<bool> {
        self.ensure_alive()?;
        let active = self.filter.toggle_layer(name)?;
        self.redraw_if_drawn();
        Ok(active)
    }

    pub fn toggle_disaster_type(&mut self, disaster_type: &str) -> SiagaResult<bool> {
        self.ensure_alive()?;
        let active = self.filter.toggle_disaster_type(disaster_type);
        self.redraw_if_drawn();
        Ok(active)
    }

    pub fn set_date_range(&mut self, from: NaiveDate, to: NaiveDate) -> SiagaResult<()> {
        self.ensure_alive()?;
        self.filter.set_date_range(from, to)?;
        self.redraw_if_drawn();
        Ok(())
    }

    pub fn clear_date_range(&mut self) -> SiagaResult<()> {
        self.ensure_alive()?;
        self.filter.clear_date_range();
        self.redraw_if_drawn();
        Ok(())
    }

    /// Releases everything and cancels a running fetch. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(ticket) = self.in_flight.take() {
            ticket.token.cancel();
        }

        self.data = MapData::default();
        self.rendered = RenderedMap::default();
        self.route_draft.reset_points();
        self.shelter_draft.clear();
        self.state = MapState::Disposed;
    }

    pub fn add_route_point(&mut self, point: LatLng) -> SiagaResult<usize> {
        self.ensure_admin()?;
        Ok(self.route_draft.add_point(point))
    }

    pub fn reset_route_points(&mut self) -> SiagaResult<()> {
        self.ensure_admin()?;
        self.route_draft.reset_points();
        Ok(())
    }

    pub fn place_shelter(&mut self, point: LatLng) -> SiagaResult<()> {
        self.ensure_admin()?;
        self.shelter_draft.place(point);
        Ok(())
    }

    /// Validates the draft; nothing is sent when this fails.
    pub fn prepare_route(&mut self, fields: &RouteFields) -> SiagaResult<NewRoute> {
        self.ensure_admin()?;
        fields.to_new_route(self.route_draft.points())
    }

    pub fn prepare_shelter(&mut self, fields: &ShelterFields) -> SiagaResult<NewShelter> {
        self.ensure_admin()?;
        fields.to_new_shelter(self.shelter_draft.position())
    }

    /// Called after the backend accepted the route, with the re-fetched list.
    pub fn route_saved(&mut self, saved: &NewRoute, routes: SiagaResult<Vec<EvacuationRoute>>)
        -> SiagaResult<()> {

        self.ensure_alive()?;

        // Clicks that landed while the request was out stay in the draft.
        if self.route_draft.points() == saved.coordinates.as_slice() {
            self.route_draft.reset_points();
        }

        match routes {
            Ok(routes) => self.data.routes = routes,
            Err(err) => warn!("Fail to re-fetch routes: {}", err),
        }

        self.redraw_if_drawn();
        Ok(())
    }

    pub fn shelter_saved(&mut self, saved: &NewShelter, shelters: SiagaResult<Vec<Shelter>>)
        -> SiagaResult<()> {

        self.ensure_alive()?;

        if self.shelter_draft.position() == Some(saved.position) {
            self.shelter_draft.clear();
        }

        match shelters {
            Ok(shelters) => self.data.shelters = shelters,
            Err(err) => warn!("Fail to re-fetch shelters: {}", err),
        }

        self.redraw_if_drawn();
        Ok(())
    }

    pub fn to_json(&self, id: &str) -> JsonValue {
        let mut val = json!({
            "id": id,
            "mode": self.mode.as_str(),
            "state": self.state.as_str(),
            "tile_layer": {
                "url": TILE_URL,
                "attribution": TILE_ATTRIBUTION,
            },
            "filter": self.filter.to_json(),
            "layers": self.rendered.to_json(),
            "redraws": self.redraws,
            "error": self.error,
            "demo": self.demo,
        });

        if self.mode == MapMode::Admin {
            val["drafts"] = json!({
                "route_points": self.route_draft.points().iter()
                    .map(LatLng::to_json)
                    .collect::<Vec<_>>(),
                "shelter_position": self.shelter_draft.position().map(|p| p.to_json()),
            });
        }

        val
    }
}
