use chrono::{NaiveDate, NaiveDateTime};

use super::schema::{laporans, jalur_evakuasi, poskos};
use crate::error::SiagaResult;
use crate::model::{
    self,
    DisasterReport, ReportStatus,
    EvacuationRoute,
    Shelter, ShelterKind, ShelterStatus,
};


#[derive(Queryable)]
pub struct Laporan {
    pub id: i32,
    pub judul: String,
    pub jenis_bencana: String,
    pub deskripsi: String,
    pub lokasi: String,
    pub latitude: f64,
    pub longitude: f64,
    pub tanggal: NaiveDate,
    pub status: String,
    pub catatan_admin: Option<String>,
    pub created_time: NaiveDateTime,
}

impl Laporan {
    pub fn into_report(self) -> SiagaResult<DisasterReport> {
        Ok(DisasterReport {
            id: self.id,
            title: self.judul,
            latitude: self.latitude,
            longitude: self.longitude,
            disaster_type: self.jenis_bencana,
            occurred_at: self.tanggal,
            description: self.deskripsi,
            status: ReportStatus::parse(&self.status)?,
            city: self.lokasi,
            admin_note: self.catatan_admin,
        })
    }
}

#[derive(Insertable)]
#[table_name="laporans"]
pub struct NewLaporan {
    pub judul: String,
    pub jenis_bencana: String,
    pub deskripsi: String,
    pub lokasi: String,
    pub latitude: f64,
    pub longitude: f64,
    pub tanggal: NaiveDate,
    pub status: String,
    pub created_time: NaiveDateTime,
}


#[derive(Queryable)]
pub struct JalurEvakuasi {
    pub id: i32,
    pub nama: String,
    pub deskripsi: String,
    pub warna: String,
    pub jenis_bencana: String,
    pub koordinat: String,
    pub created_time: NaiveDateTime,
}

impl JalurEvakuasi {
    pub fn into_route(self) -> SiagaResult<EvacuationRoute> {
        Ok(EvacuationRoute {
            id: self.id,
            name: self.nama,
            description: self.deskripsi,
            color_hex: self.warna,
            disaster_type: self.jenis_bencana,
            coordinates: model::parse_coordinates(&self.koordinat)?,
        })
    }
}

#[derive(Insertable)]
#[table_name="jalur_evakuasi"]
pub struct NewJalurEvakuasi {
    pub nama: String,
    pub deskripsi: String,
    pub warna: String,
    pub jenis_bencana: String,
    pub koordinat: String,
    pub created_time: NaiveDateTime,
}


#[derive(Queryable)]
pub struct Posko {
    pub id: i32,
    pub nama: String,
    pub deskripsi: String,
    pub alamat: String,
    pub kontak: String,
    pub jenis_posko: String,
    pub status: String,
    pub latitude: f64,
    pub longitude: f64,
    pub kapasitas: i32,
    pub created_time: NaiveDateTime,
}

impl Posko {
    pub fn into_shelter(self) -> SiagaResult<Shelter> {
        Ok(Shelter {
            id: self.id,
            name: self.nama,
            description: self.deskripsi,
            address: self.alamat,
            contact: self.kontak,
            kind: ShelterKind::parse(&self.jenis_posko)?,
            status: ShelterStatus::parse(&self.status)?,
            latitude: self.latitude,
            longitude: self.longitude,
            capacity: self.kapasitas,
        })
    }
}

#[derive(Insertable)]
#[table_name="poskos"]
pub struct NewPosko {
    pub nama: String,
    pub deskripsi: String,
    pub alamat: String,
    pub kontak: String,
    pub jenis_posko: String,
    pub status: String,
    pub latitude: f64,
    pub longitude: f64,
    pub kapasitas: i32,
    pub created_time: NaiveDateTime,
}
