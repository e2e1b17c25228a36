//! Logging handle threaded through the simulators.
//!
//! Each simulator owns a [`LogHandle`] given at construction instead of
//! reaching for a process-wide logger. The default handle drops everything;
//! [`LogHandle::facade`] forwards to whatever `log` backend the binary
//! installed, and [`LogHandle::new`] accepts any `log::Log` sink directly.

use std::fmt;
use std::sync::Arc;

use log::{Level, Log, Metadata, Record};

#[derive(Clone, Default)]
pub struct LogHandle {
    sink: Option<Arc<dyn Log>>,
    target: &'static str,
}

/// Forwards records to the global `log` facade.
struct Facade;

impl Log for Facade {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            log::logger().log(record);
        }
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

impl LogHandle {
    /// A handle that discards every record.
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn new(sink: Arc<dyn Log>, target: &'static str) -> Self {
        LogHandle { sink: Some(sink), target }
    }

    pub fn facade(target: &'static str) -> Self {
        Self::new(Arc::new(Facade), target)
    }

    /// Same sink, different target.
    pub fn with_target(&self, target: &'static str) -> Self {
        LogHandle { sink: self.sink.clone(), target }
    }

    pub fn is_noop(&self) -> bool {
        self.sink.is_none()
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let metadata = Metadata::builder().level(level).target(self.target).build();
        if !sink.enabled(&metadata) {
            return;
        }
        sink.log(&Record::builder().metadata(metadata).args(args).build());
    }

    #[inline]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    #[inline]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    #[inline]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    #[inline]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}

impl fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandle")
            .field("target", &self.target)
            .field("noop", &self.is_noop())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Captures formatted records for assertions.
    #[derive(Default)]
    pub struct Capture {
        pub lines: Mutex<Vec<(Level, String, String)>>,
    }

    impl Log for Capture {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            self.lines.lock().unwrap().push((
                record.level(),
                record.target().to_string(),
                record.args().to_string(),
            ));
        }

        fn flush(&self) {}
    }

    #[test]
    fn test_noop_drops_records() {
        let handle = LogHandle::noop();
        assert!(handle.is_noop());
        handle.info(format_args!("nobody hears this"));
    }

    #[test]
    fn test_records_reach_sink() {
        let capture = Arc::new(Capture::default());
        let handle = LogHandle::new(capture.clone(), "paging");
        handle.warn(format_args!("frame {} exhausted", 7));
        handle.with_target("vm").debug(format_args!("swap"));

        let lines = capture.lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], (Level::Warn, "paging".into(), "frame 7 exhausted".into()));
        assert_eq!(lines[1].1, "vm");
    }
}
