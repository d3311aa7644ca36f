use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
    time::Duration,
};
use rocket::{
    State,
    response::content::Json,
};
use serde_json::{json, Value as JsonValue};

use crate::backend::{Backend, SharedBackend};
use crate::error::SiagaResult;
use crate::icon::DisasterKind;
use crate::model::{DisasterReport, EvacuationRoute, ReportStatus, Shelter, ShelterStatus};
use crate::task_scheduler::{Task, TaskSchedulerBuilder};


const STATS_PERIOD: u64 = 60 * 5; // seconds
const RETRY_PERIOD: u64 = 60; // seconds


#[derive(Debug, Default, PartialEq)]
pub struct Statistics {
    pub reports_total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub by_kind: BTreeMap<&'static str, usize>,
    pub by_city: BTreeMap<String, usize>,
    pub shelters_total: usize,
    pub shelters_active: usize,
    pub shelter_capacity: i64,
    pub routes_total: usize,
}

impl Statistics {
    pub fn compute(reports: &[DisasterReport], shelters: &[Shelter], routes: &[EvacuationRoute]) -> Self {
        let mut stats = Statistics::default();

        for status in &[ReportStatus::Pending, ReportStatus::Verified, ReportStatus::Rejected] {
            stats.by_status.insert(status.as_str(), 0);
        }

        for report in reports {
            *stats.by_status.entry(report.status.as_str()).or_insert(0) += 1;
            *stats.by_kind.entry(report.kind().label()).or_insert(0) += 1;

            let city = report.city.trim();
            let city = if city.is_empty() { "Tidak diketahui" } else { city };
            *stats.by_city.entry(city.to_owned()).or_insert(0) += 1;
        }

        stats.reports_total = reports.len();
        stats.shelters_total = shelters.len();
        stats.shelters_active = shelters.iter()
            .filter(|s| s.status == ShelterStatus::Active)
            .count();
        stats.shelter_capacity = shelters.iter()
            .filter(|s| s.status == ShelterStatus::Active)
            .map(|s| s.capacity.max(0) as i64)
            .sum();
        stats.routes_total = routes.len();

        stats
    }

    pub fn from_backend(backend: &dyn Backend) -> SiagaResult<Self> {
        let reports = backend.list_reports()?;
        let shelters = backend.list_shelters()?;
        let routes = backend.list_routes()?;

        Ok(Statistics::compute(&reports, &shelters, &routes))
    }

    fn demo() -> Self {
        let mut stats = Statistics {
            reports_total: 3,
            shelters_total: 2,
            shelters_active: 2,
            shelter_capacity: 350,
            routes_total: 2,
            ..Statistics::default()
        };

        stats.by_status.insert(ReportStatus::Pending.as_str(), 1);
        stats.by_status.insert(ReportStatus::Verified.as_str(), 2);
        stats.by_status.insert(ReportStatus::Rejected.as_str(), 0);
        stats.by_kind.insert(DisasterKind::Flood.label(), 1);
        stats.by_kind.insert(DisasterKind::Earthquake.label(), 1);
        stats.by_kind.insert(DisasterKind::Landslide.label(), 1);
        stats.by_city.insert("Jakarta Timur".into(), 1);
        stats.by_city.insert("Cianjur".into(), 1);
        stats.by_city.insert("Bogor".into(), 1);

        stats
    }

    pub fn to_json(&self, demo: bool) -> JsonValue {
        json!({
            "laporan": {
                "total": self.reports_total,
                "per_status": self.by_status,
                "per_jenis": self.by_kind,
                "per_kota": self.by_city,
            },
            "posko": {
                "total": self.shelters_total,
                "aktif": self.shelters_active,
                "kapasitas": self.shelter_capacity,
            },
            "jalur_evakuasi": {
                "total": self.routes_total,
            },
            "demo": demo,
        })
    }
}


pub struct StatisticsCache {
    data: RwLock<String>,
}

impl StatisticsCache {
    pub fn new() -> Self {
        StatisticsCache {
            data: RwLock::new(Statistics::demo().to_json(true).to_string()),
        }
    }

    /// Keeps the last good figures when the backend cannot be reached.
    pub fn refresh(&self, backend: &dyn Backend) -> SiagaResult<()> {
        let stats = Statistics::from_backend(backend)?;
        *self.data.write().unwrap_or_else(|p| p.into_inner()) = stats.to_json(false).to_string();
        Ok(())
    }

    fn get(&self) -> String {
        self.data.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}


pub fn init_statistics_sys(cache: Arc<StatisticsCache>, backend: SharedBackend,
    scheduler: &mut TaskSchedulerBuilder) {

    let job = move || {
        info!("Start statistics job");

        match cache.refresh(backend.as_ref()) {
            Ok(_) => Duration::new(STATS_PERIOD, 0),
            Err(err) => {
                warn!("Fail to compute statistics: {}", err);
                Duration::new(RETRY_PERIOD, 0)
            },
        }
    };

    scheduler.add_task(Task::new("statistics", job, Duration::new(0, 0)));
}

#[get("/api/admin/statistics")]
pub fn get_statistics(cache: State<Arc<StatisticsCache>>) -> Json<String> {
    Json(cache.get())
}


#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;

    use crate::backend::memory::MemoryBackend;
    use crate::map_render::tests::report;
    use crate::tests::client_with;

    #[test]
    fn counts_reports_by_status_kind_and_city() {
        let mut reports = vec![
            report(1, "Banjir", ReportStatus::Verified),
            report(2, "banjir bandang", ReportStatus::Pending),
            report(3, "Gempa", ReportStatus::Verified),
        ];
        reports[2].city = "Cianjur".into();

        let stats = Statistics::compute(&reports, &[], &[]);

        assert_eq!(stats.reports_total, 3);
        assert_eq!(stats.by_status["diverifikasi"], 2);
        assert_eq!(stats.by_status["ditolak"], 0);
        assert_eq!(stats.by_kind["Banjir"], 2);
        assert_eq!(stats.by_kind["Gempa"], 1);
        assert_eq!(stats.by_city["Jakarta"], 2);
        assert_eq!(stats.by_city["Cianjur"], 1);
    }

    #[test]
    fn refresh_keeps_old_figures_when_offline() {
        let backend = MemoryBackend::with_reports(vec![report(1, "Banjir", ReportStatus::Pending)]);
        let cache = StatisticsCache::new();

        cache.refresh(&backend).unwrap();
        let val: JsonValue = serde_json::from_str(&cache.get()).unwrap();
        assert_eq!(val["demo"], false);
        assert_eq!(val["laporan"]["total"], 1);

        backend.set_offline(true);
        assert!(cache.refresh(&backend).is_err());
        let val: JsonValue = serde_json::from_str(&cache.get()).unwrap();
        assert_eq!(val["laporan"]["total"], 1);
    }

    #[test]
    fn endpoint_serves_demo_before_first_refresh() {
        let (client, _) = client_with(MemoryBackend::new());

        let mut res = client.get("/api/admin/statistics").dispatch();
        assert_eq!(res.status(), Status::Ok);

        let val: JsonValue = serde_json::from_str(&res.body_string().unwrap()).unwrap();
        assert_eq!(val["demo"], true);
        assert_eq!(val["laporan"]["total"], 3);
    }
}
