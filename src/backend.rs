use std::sync::Arc;

use crate::error::SiagaResult;
use crate::model::{
    DisasterReport, NewReport, ReportStatus,
    EvacuationRoute, NewRoute,
    Shelter, NewShelter,
};


pub type SharedBackend = Arc<dyn Backend>;


/// Storage for reports, routes and shelters: the local database or a remote host.
pub trait Backend: Send + Sync {
    fn list_reports(&self) -> SiagaResult<Vec<DisasterReport>>;

    fn get_report(&self, id: i32) -> SiagaResult<DisasterReport>;

    fn create_report(&self, report: &NewReport) -> SiagaResult<DisasterReport>;

    fn set_report_status(&self, id: i32, status: ReportStatus, note: Option<&str>)
        -> SiagaResult<DisasterReport>;

    fn list_routes(&self) -> SiagaResult<Vec<EvacuationRoute>>;

    fn create_route(&self, route: &NewRoute) -> SiagaResult<EvacuationRoute>;

    fn list_shelters(&self) -> SiagaResult<Vec<Shelter>>;

    fn create_shelter(&self, shelter: &NewShelter) -> SiagaResult<Shelter>;
}
