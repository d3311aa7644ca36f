#![feature(proc_macro_hygiene, decl_macro)]


#[macro_use] extern crate lazy_static;
extern crate rand;
#[macro_use] extern crate rocket;
#[macro_use] extern crate diesel;
#[macro_use] extern crate log;


mod db;
mod util;
mod logger;
mod config;
mod error;
mod icon;
mod model;
mod backend;
mod http_backend;
mod task_scheduler;
mod map_filter;
mod map_render;
mod map_source;
mod map_view;
mod authoring;
mod map_sys;
mod report_sys;
mod evacuation_sys;
mod shelter_sys;
mod news_sys;
mod statistics_sys;
mod notification_sys;


use std::{
    path::{Path, PathBuf},
    process,
    sync::Arc,
};
use rocket::response::NamedFile;

use crate::backend::SharedBackend;
use crate::config::{BackendTarget, Config};
use crate::map_sys::MapSessions;
use crate::news_sys::NewsCache;
use crate::notification_sys::{OutboxMailer, SharedMailer};
use crate::statistics_sys::StatisticsCache;
use crate::task_scheduler::TaskSchedulerBuilder;


const STATIC_DIR: &'static str = "static/";


#[get("/")]
fn index() -> &'static str {
    "GeoSiaga Map Server"
}

#[get("/<file..>")]
fn get_static_file(file: PathBuf) -> Option<NamedFile> {
    NamedFile::open(Path::new(STATIC_DIR).join(file)).ok()
}


/// Shared state handed to the HTTP layer.
pub struct Services {
    pub backend: SharedBackend,
    pub sessions: Arc<MapSessions>,
    pub news: Arc<NewsCache>,
    pub statistics: Arc<StatisticsCache>,
    pub mailer: SharedMailer,
}

fn build_rocket(services: Services) -> rocket::Rocket {
    rocket::ignite()
        .manage(services.backend)
        .manage(services.sessions)
        .manage(services.news)
        .manage(services.statistics)
        .manage(services.mailer)
        .mount("/", routes![index])
        .mount(&format!("/{}", STATIC_DIR), routes![get_static_file])
        .mount("/", routes![
            report_sys::get_reports,
            report_sys::get_report,
            report_sys::post_report,
            report_sys::put_verify_report,
            report_sys::put_reject_report,
        ])
        .mount("/", routes![
            evacuation_sys::get_routes,
            evacuation_sys::post_route,
        ])
        .mount("/api", routes![
            report_sys::get_reports,
            evacuation_sys::get_routes,
        ])
        .mount("/", routes![
            shelter_sys::get_shelters,
            shelter_sys::post_shelter,
        ])
        .mount("/", routes![
            news_sys::get_bnpb_news,
            news_sys::get_news,
        ])
        .mount("/", routes![statistics_sys::get_statistics])
        .mount("/", routes![notification_sys::post_notification])
        .mount("/", routes![
            map_sys::post_map_session,
            map_sys::get_map_session,
            map_sys::delete_map_session,
            map_sys::post_refresh,
            map_sys::post_toggle_layer,
            map_sys::post_toggle_disaster_type,
            map_sys::post_date_range,
            map_sys::delete_date_range,
            map_sys::post_route_point,
            map_sys::delete_route_points,
            map_sys::post_route_submit,
            map_sys::post_shelter_position,
            map_sys::post_shelter_submit,
        ])
}

fn connect_backend(config: &Config) -> error::SiagaResult<SharedBackend> {
    let backend: SharedBackend = match &config.backend {
        BackendTarget::Postgres(url) => {
            info!("Using the local database");
            Arc::new(db::DbBackend::new(url.clone()))
        },
        BackendTarget::Remote(url) => {
            info!("Using the remote backend at {}", url);
            Arc::new(http_backend::HttpBackend::new(url, config.http_timeout)?)
        },
    };

    Ok(backend)
}


fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        },
    };

    if let Err(err) = logger::Logger::new(config.log_level).install() {
        eprintln!("Fail to install the logger: {}", err);
    }

    let _sentry = sentry::init((config.sentry_dsn.clone(), sentry::ClientOptions {
        release: sentry::release_name!(),
        ..Default::default()
    }));

    let backend = match connect_backend(&config) {
        Ok(backend) => backend,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        },
    };

    let mailer: SharedMailer = match OutboxMailer::new(&config.mail_outbox, &config.mail_from) {
        Ok(mailer) => Arc::new(mailer),
        Err(err) => {
            error!("Fail to prepare the mail outbox: {}", err);
            process::exit(1);
        },
    };

    let services = Services {
        backend: backend.clone(),
        sessions: Arc::new(MapSessions::new(config.session_ttl)),
        news: Arc::new(NewsCache::new()),
        statistics: Arc::new(StatisticsCache::new()),
        mailer,
    };

    let mut scheduler = TaskSchedulerBuilder::new()
        .n_workers(config.workers);

    map_sys::init_map_sys(services.sessions.clone(), &mut scheduler);
    news_sys::init_news_sys(services.news.clone(), config.news_url.clone(),
        config.http_timeout, &mut scheduler);
    statistics_sys::init_statistics_sys(services.statistics.clone(), backend, &mut scheduler);

    let _scheduler = scheduler.build();

    let err = build_rocket(services).launch();
    error!("Launch failed: {}", err);
}


#[cfg(test)]
pub mod tests {
    use super::*;
    use std::time::Duration;
    use rocket::local::Client;

    use crate::backend::memory::MemoryBackend;
    use crate::notification_sys::tests::MemoryMailer;

    /// A test server over an in-memory backend. The backend is returned too
    /// so tests can inspect writes or take it offline.
    pub fn client_with(backend: MemoryBackend) -> (Client, Arc<MemoryBackend>) {
        let backend = Arc::new(backend);

        let services = Services {
            backend: backend.clone(),
            sessions: Arc::new(MapSessions::new(Duration::new(60, 0))),
            news: Arc::new(NewsCache::new()),
            statistics: Arc::new(StatisticsCache::new()),
            mailer: Arc::new(MemoryMailer::default()),
        };

        let client = Client::new(build_rocket(services)).expect("valid rocket instance");
        (client, backend)
    }

    #[test]
    fn index_names_the_server() {
        let (client, _) = client_with(MemoryBackend::new());
        let mut res = client.get("/").dispatch();
        assert_eq!(res.body_string(), Some("GeoSiaga Map Server".into()));
    }
}
