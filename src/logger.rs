use log::{Level, LevelFilter, Record, Metadata};
use chrono::Local;


pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    pub fn new(level: LevelFilter) -> Self {
        Logger { level }
    }

    /// Installs the logger behind the Sentry bridge, so warnings become
    /// breadcrumbs and errors become events.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        let sentry_logger = sentry_log::SentryLogger::with_dest(self);

        log::set_boxed_logger(Box::new(sentry_logger))?;
        log::set_max_level(level);

        Ok(())
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // Rocket's per-request chatter stays out below debug.
        if metadata.target().starts_with("_") && metadata.level() > Level::Warn {
            return self.level >= LevelFilter::Debug;
        }

        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("{} [{}] {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(), record.level(), record.args());
        }
    }

    fn flush(&self) {}
}
