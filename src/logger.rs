use std::fmt;

use log::{Level, Log, Metadata, Record};

static LOGGER: Logger = Logger {};

pub fn setup_logger(max_level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level);
    Ok(())
}

struct Logger {}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        println!(
            "{} {} -- {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

// Leveled diagnostics sink for configuration loading.
// Wraps a logger reference so that tests can capture records without a global logger.
// There's no fatal level in `log`, so fatal diagnostics are emitted as errors.
#[derive(Clone, Copy)]
pub struct Diagnostics<'a> {
    sink: &'a dyn Log,
    target: &'static str,
}

impl Diagnostics<'static> {
    pub fn global(target: &'static str) -> Diagnostics<'static> {
        Diagnostics {
            sink: log::logger(),
            target,
        }
    }
}

impl<'a> Diagnostics<'a> {
    pub fn new(sink: &'a dyn Log, target: &'static str) -> Diagnostics<'a> {
        Diagnostics { sink, target }
    }

    fn emit(&self, level: Level, args: fmt::Arguments) {
        let metadata = Metadata::builder()
            .level(level)
            .target(self.target)
            .build();
        if !self.sink.enabled(&metadata) {
            return;
        }
        self.sink.log(
            &Record::builder()
                .metadata(metadata)
                .args(args)
                .module_path_static(Some(module_path!()))
                .build(),
        );
    }

    pub fn fatal(&self, args: fmt::Arguments) {
        self.emit(Level::Error, args)
    }

    pub fn warn(&self, args: fmt::Arguments) {
        self.emit(Level::Warn, args)
    }

    pub fn info(&self, args: fmt::Arguments) {
        self.emit(Level::Info, args)
    }

    pub fn debug(&self, args: fmt::Arguments) {
        self.emit(Level::Debug, args)
    }
}
