pub mod models;
pub mod schema;


use std::cell::RefCell;

use diesel::prelude::*;
use diesel::pg::PgConnection;

use chrono::Utc;

use models::*;
use schema::laporans::dsl::{self as l_dsl};
use schema::jalur_evakuasi::dsl::{self as j_dsl};
use schema::poskos::dsl::{self as p_dsl};

use crate::backend::Backend;
use crate::error::{SiagaError, SiagaResult};
use crate::model::{
    DisasterReport, NewReport, ReportStatus,
    EvacuationRoute, NewRoute,
    Shelter, NewShelter,
};


thread_local! {
    static DB_CONN: RefCell<Option<PgConnection>> = RefCell::new(None);
}


/// Postgres store. Each Rocket worker keeps its own connection.
pub struct DbBackend {
    database_url: String,
}

impl DbBackend {
    pub fn new(database_url: String) -> Self {
        DbBackend { database_url }
    }

    fn with_conn<T, F>(&self, job: F) -> SiagaResult<T> where
        F: FnOnce(&PgConnection) -> SiagaResult<T> {

        DB_CONN.with(|cell| {
            let mut slot = cell.borrow_mut();
            let conn = match slot.take() {
                Some(conn) => conn,
                None => PgConnection::establish(&self.database_url)?,
            };

            let result = job(&conn);

            // Reconnect on the next call after a database failure.
            if !matches!(result, Err(SiagaError::Database(_))) {
                *slot = Some(conn);
            }

            result
        })
    }
}

impl Backend for DbBackend {
    fn list_reports(&self) -> SiagaResult<Vec<DisasterReport>> {
        self.with_conn(|conn| {
            l_dsl::laporans
                .order(l_dsl::tanggal.desc())
                .load::<Laporan>(conn)?
                .into_iter()
                .map(Laporan::into_report)
                .collect()
        })
    }

    fn get_report(&self, id: i32) -> SiagaResult<DisasterReport> {
        self.with_conn(|conn| {
            l_dsl::laporans
                .find(id)
                .first::<Laporan>(conn)?
                .into_report()
        })
    }

    fn create_report(&self, report: &NewReport) -> SiagaResult<DisasterReport> {
        let row = NewLaporan {
            judul: report.title.clone(),
            jenis_bencana: report.disaster_type.clone(),
            deskripsi: report.description.clone(),
            lokasi: report.city.clone(),
            latitude: report.position.lat,
            longitude: report.position.lng,
            tanggal: report.occurred_at,
            status: ReportStatus::Pending.as_str().to_owned(),
            created_time: Utc::now().naive_utc(),
        };

        self.with_conn(|conn| {
            diesel::insert_into(schema::laporans::table)
                .values(&row)
                .get_result::<Laporan>(conn)?
                .into_report()
        })
    }

    fn set_report_status(&self, id: i32, status: ReportStatus, note: Option<&str>)
        -> SiagaResult<DisasterReport> {

        self.with_conn(|conn| {
            diesel::update(l_dsl::laporans.find(id))
                .set((
                    l_dsl::status.eq(status.as_str()),
                    l_dsl::catatan_admin.eq(note),
                ))
                .get_result::<Laporan>(conn)?
                .into_report()
        })
    }

    fn list_routes(&self) -> SiagaResult<Vec<EvacuationRoute>> {
        self.with_conn(|conn| {
            j_dsl::jalur_evakuasi
                .order(j_dsl::id.asc())
                .load::<JalurEvakuasi>(conn)?
                .into_iter()
                .map(JalurEvakuasi::into_route)
                .collect()
        })
    }

    fn create_route(&self, route: &NewRoute) -> SiagaResult<EvacuationRoute> {
        let row = NewJalurEvakuasi {
            nama: route.name.clone(),
            deskripsi: route.description.clone(),
            warna: route.color_hex.clone(),
            jenis_bencana: route.disaster_type.clone(),
            koordinat: route.coordinates_json(),
            created_time: Utc::now().naive_utc(),
        };

        self.with_conn(|conn| {
            diesel::insert_into(schema::jalur_evakuasi::table)
                .values(&row)
                .get_result::<JalurEvakuasi>(conn)?
                .into_route()
        })
    }

    fn list_shelters(&self) -> SiagaResult<Vec<Shelter>> {
        self.with_conn(|conn| {
            p_dsl::poskos
                .order(p_dsl::id.asc())
                .load::<Posko>(conn)?
                .into_iter()
                .map(Posko::into_shelter)
                .collect()
        })
    }

    fn create_shelter(&self, shelter: &NewShelter) -> SiagaResult<Shelter> {
        let row = NewPosko {
            nama: shelter.name.clone(),
            deskripsi: shelter.description.clone(),
            alamat: shelter.address.clone(),
            kontak: shelter.contact.clone(),
            jenis_posko: shelter.kind.as_str().to_owned(),
            status: shelter.status.as_str().to_owned(),
            latitude: shelter.position.lat,
            longitude: shelter.position.lng,
            kapasitas: shelter.capacity,
            created_time: Utc::now().naive_utc(),
        };

        self.with_conn(|conn| {
            diesel::insert_into(schema::poskos::table)
                .values(&row)
                .get_result::<Posko>(conn)?
                .into_shelter()
        })
    }
}
