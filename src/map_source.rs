use chrono::NaiveDate;

use crate::backend::Backend;
use crate::error::SiagaResult;
use crate::model::{DisasterReport, EvacuationRoute, ReportStatus, Shelter};


pub const FALLBACK_ERROR: &'static str = "Gagal memuat data bencana. Menampilkan data contoh.";


lazy_static! {
    static ref DEMO_REPORTS: Vec<DisasterReport> = vec![
        demo_report(1, "Banjir di Kampung Melayu", "Banjir", -6.2250, 106.8650, (2025, 1, 12),
            "Banjir setinggi 80 cm merendam permukiman warga.", "Jakarta Timur"),
        demo_report(2, "Gempa Bumi Cianjur", "Gempa Bumi", -6.8168, 107.1425, (2025, 1, 10),
            "Gempa magnitudo 5,6 merusak rumah warga.", "Cianjur"),
        demo_report(3, "Tanah Longsor Puncak", "Tanah Longsor", -6.7000, 106.9950, (2025, 1, 8),
            "Longsor menutup akses jalan utama.", "Bogor"),
    ];
}

fn demo_report(id: i32, title: &str, disaster_type: &str, latitude: f64, longitude: f64,
    (y, m, d): (i32, u32, u32), description: &str, city: &str) -> DisasterReport {

    DisasterReport {
        id,
        title: title.into(),
        latitude,
        longitude,
        disaster_type: disaster_type.into(),
        occurred_at: NaiveDate::from_ymd(y, m, d),
        description: description.into(),
        status: ReportStatus::Verified,
        city: city.into(),
        admin_note: None,
    }
}

/// Shown instead of an empty map when the backend can't be reached.
pub fn demo_reports() -> Vec<DisasterReport> {
    DEMO_REPORTS.clone()
}


/// Raw results of one round of fetches; each list fails on its own.
pub struct FetchOutcome {
    pub reports: SiagaResult<Vec<DisasterReport>>,
    pub routes: SiagaResult<Vec<EvacuationRoute>>,
    pub shelters: SiagaResult<Vec<Shelter>>,
}

pub fn fetch_all(backend: &dyn Backend) -> FetchOutcome {
    let outcome = FetchOutcome {
        reports: backend.list_reports(),
        routes: backend.list_routes(),
        shelters: backend.list_shelters(),
    };

    if let Err(ref err) = outcome.reports {
        warn!("Fail to fetch reports: {}", err);
    }

    outcome
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;

    #[test]
    fn demo_dataset_has_three_reports() {
        let demo = demo_reports();
        assert_eq!(demo.len(), 3);
        assert!(demo.iter().all(|r| r.kind() != crate::icon::DisasterKind::Other));
    }

    #[test]
    fn offline_backend_fails_each_list() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);

        let outcome = fetch_all(&backend);
        assert!(outcome.reports.is_err());
        assert!(outcome.routes.is_err());
        assert!(outcome.shelters.is_err());
    }
}
