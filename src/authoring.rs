use crate::error::{SiagaError, SiagaResult};
use crate::model::{
    LatLng,
    NewRoute, DEFAULT_ROUTE_COLOR,
    NewShelter, ShelterKind, ShelterStatus,
};


const MAX_NAME_LEN: usize = 255;
const MAX_TEXT_LEN: usize = 65536;


#[derive(FromForm, Debug, Clone, Default)]
pub struct RouteFields {
    pub nama: String,
    pub deskripsi: Option<String>,
    pub jenis_bencana: String,
    pub warna: Option<String>,
}

impl RouteFields {
    fn verify_error(&self, points: &[LatLng]) -> Option<&'static str> {
        let description = self.deskripsi.as_ref().map_or("", |d| d.as_str());
        let color = self.warna.as_ref().map_or("", |c| c.trim());

        if self.nama.trim().is_empty() {
            Some("The route name is required")
        }
        else if self.nama.chars().count() > MAX_NAME_LEN {
            Some("The route name can not be longer than 255 characters")
        }
        else if self.jenis_bencana.trim().is_empty() {
            Some("The disaster type is required")
        }
        else if description.len() >= MAX_TEXT_LEN {
            Some("The maximum length of the description is 65536")
        }
        else if !color.is_empty() && !is_hex_color(color) {
            Some("The color must look like #RRGGBB")
        }
        else if points.len() < 2 {
            Some("A route needs at least 2 points")
        }
        else {
            None
        }
    }

    pub fn to_new_route(&self, points: &[LatLng]) -> SiagaResult<NewRoute> {
        if let Some(err) = self.verify_error(points) {
            return Err(SiagaError::validation(err));
        }

        let color = self.warna.as_ref().map_or("", |c| c.trim());

        Ok(NewRoute {
            name: self.nama.trim().to_owned(),
            description: self.deskripsi.as_ref().map_or("", |d| d.trim()).to_owned(),
            color_hex: if color.is_empty() { DEFAULT_ROUTE_COLOR.to_owned() } else { color.to_lowercase() },
            disaster_type: self.jenis_bencana.trim().to_owned(),
            coordinates: points.to_vec(),
        })
    }
}

fn is_hex_color(text: &str) -> bool {
    text.len() == 7
        && text.starts_with('#')
        && text[1..].chars().all(|c| c.is_ascii_hexdigit())
}


#[derive(FromForm, Debug, Clone, Default)]
pub struct ShelterFields {
    pub nama: String,
    pub deskripsi: String,
    pub alamat: String,
    pub kontak: Option<String>,
    pub jenis_posko: String,
    pub status: Option<String>,
    pub kapasitas: String,
}

impl ShelterFields {
    fn verify_error(&self, position: Option<LatLng>) -> Option<&'static str> {
        let required = [&self.nama, &self.deskripsi, &self.alamat, &self.jenis_posko, &self.kapasitas];

        if position.is_none() {
            Some("Pick the shelter location on the map first")
        }
        else if required.iter().any(|field| field.trim().is_empty()) {
            Some("Name, description, address, shelter kind and capacity are required")
        }
        else if self.nama.chars().count() > MAX_NAME_LEN {
            Some("The shelter name can not be longer than 255 characters")
        }
        else if self.deskripsi.len() >= MAX_TEXT_LEN {
            Some("The maximum length of the description is 65536")
        }
        else if self.kapasitas.trim().parse::<i32>().map_or(true, |cap| cap <= 0) {
            Some("The capacity must be a number greater than 0")
        }
        else {
            None
        }
    }

    pub fn to_new_shelter(&self, position: Option<LatLng>) -> SiagaResult<NewShelter> {
        if let Some(err) = self.verify_error(position) {
            return Err(SiagaError::validation(err));
        }

        let status = match self.status.as_ref().map(|s| s.trim()) {
            Some(status) if !status.is_empty() => ShelterStatus::parse(status)?,
            _ => ShelterStatus::Active,
        };

        match (position, self.kapasitas.trim().parse::<i32>()) {
            (Some(position), Ok(capacity)) => Ok(NewShelter {
                name: self.nama.trim().to_owned(),
                description: self.deskripsi.trim().to_owned(),
                address: self.alamat.trim().to_owned(),
                contact: self.kontak.as_ref().map_or("", |k| k.trim()).to_owned(),
                kind: ShelterKind::parse(&self.jenis_posko)?,
                status,
                position,
                capacity,
            }),
            _ => Err(SiagaError::validation("Invalid shelter form")),
        }
    }
}


/// Route under construction: every click appends, in click order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteDraft {
    points: Vec<LatLng>,
}

impl RouteDraft {
    pub fn add_point(&mut self, point: LatLng) -> usize {
        self.points.push(point);
        self.points.len()
    }

    pub fn reset_points(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[LatLng] {
        &self.points
    }
}


/// Shelter under construction: a click moves the single location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShelterDraft {
    position: Option<LatLng>,
}

impl ShelterDraft {
    pub fn place(&mut self, point: LatLng) {
        self.position = Some(point);
    }

    pub fn clear(&mut self) {
        self.position = None;
    }

    pub fn position(&self) -> Option<LatLng> {
        self.position
    }
}
