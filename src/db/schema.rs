table! {
    laporans (id) {
        id -> Integer,
        judul -> Text,
        jenis_bencana -> Text,
        deskripsi -> Text,
        lokasi -> Text,
        latitude -> Double,
        longitude -> Double,
        tanggal -> Date,
        status -> Text,
        catatan_admin -> Nullable<Text>,
        created_time -> Timestamp,
    }
}

table! {
    jalur_evakuasi (id) {
        id -> Integer,
        nama -> Text,
        deskripsi -> Text,
        warna -> Text,
        jenis_bencana -> Text,
        koordinat -> Text,
        created_time -> Timestamp,
    }
}

table! {
    poskos (id) {
        id -> Integer,
        nama -> Text,
        deskripsi -> Text,
        alamat -> Text,
        kontak -> Text,
        jenis_posko -> Text,
        status -> Text,
        latitude -> Double,
        longitude -> Double,
        kapasitas -> Integer,
        created_time -> Timestamp,
    }
}
