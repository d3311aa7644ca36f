use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use rand::{
    thread_rng, Rng,
    distributions,
};


const ID_MONTHS: [&'static str; 12] = [
    "Januari", "Februari", "Maret", "April", "Mei", "Juni",
    "Juli", "Agustus", "September", "Oktober", "November", "Desember",
];


pub fn generate_rand_id(length: usize) -> String {
    thread_rng()
        .sample_iter(&distributions::Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Lower case, trimmed, single spaces.
pub fn normalize_key(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Long date in the `id-ID` locale, e.g. "12 Januari 2025".
pub fn format_date_id(date: NaiveDate) -> String {
    format!("{} {} {}", date.day(), ID_MONTHS[date.month0() as usize], date.year())
}

/// Accepts plain dates as well as the timestamp shapes a Laravel backend emits.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc().date()))
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").ok().map(|dt| dt.date()))
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.fZ").ok().map(|dt| dt.date()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rand_id_has_requested_length() {
        let id = generate_rand_id(32);
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn normalize_collapses_spaces() {
        assert_eq!(normalize_key("  Tanah   LONGSOR "), "tanah longsor");
    }

    #[test]
    fn formats_indonesian_long_date() {
        assert_eq!(format_date_id(NaiveDate::from_ymd(2025, 1, 12)), "12 Januari 2025");
        assert_eq!(format_date_id(NaiveDate::from_ymd(2024, 8, 5)), "5 Agustus 2024");
    }

    #[test]
    fn parses_laravel_dates() {
        let expected = NaiveDate::from_ymd(2025, 3, 1);
        assert_eq!(parse_date("2025-03-01"), Some(expected));
        assert_eq!(parse_date("2025-03-01 08:30:00"), Some(expected));
        assert_eq!(parse_date("2025-03-01T08:30:00.000000Z"), Some(expected));
        assert_eq!(parse_date("kemarin"), None);
    }
}
