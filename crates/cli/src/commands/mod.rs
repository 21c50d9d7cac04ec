pub mod doctor;
pub mod gaps;
pub mod onboard;
pub mod run;

use chrono::{DateTime, FixedOffset, Local, Utc};
use clap::Args;
use timegap_config::AppConfig;
use timegap_core::error::Error;
use timegap_core::window::TimeWindow;

/// The analysis window. Defaults to the current work day up to now.
#[derive(Debug, Clone, Default, Args)]
pub struct WindowArgs {
    /// Window start (RFC 3339, e.g. 2025-06-08T09:00:00+02:00)
    #[arg(long)]
    pub start: Option<DateTime<FixedOffset>>,

    /// Window end (RFC 3339); defaults to now
    #[arg(long)]
    pub end: Option<DateTime<FixedOffset>>,

    /// Do not read or write the timeline snapshot
    #[arg(long)]
    pub no_snapshot: bool,
}

impl WindowArgs {
    /// Resolve against `now`. Fails before any network call when the
    /// window is empty or inverted.
    pub fn resolve(&self, config: &AppConfig, now: DateTime<Local>) -> Result<TimeWindow, Error> {
        let end = self
            .end
            .map(|e| e.with_timezone(&Utc))
            .unwrap_or_else(|| now.with_timezone(&Utc));

        let start = match self.start {
            Some(start) => start.with_timezone(&Utc),
            None => TimeWindow::workday(now, config.workday.start_hour, config.workday.end_hour)?
                .start(),
        };

        TimeWindow::new(start, end)
    }
}
