use colored::{Color, Colorize};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::{self, Stdout, Write};
use std::time::SystemTime;

use wedash_types::{ActivityState, Service};

use crate::config::Columns;

/// Plain-text status output for `--list`.
pub struct Logger<W: Write = Stdout> {
    output: W,
}

impl<W: Write> Logger<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    fn string_to_color(s: &str) -> Color {
        let colors = [
            Color::Green,
            Color::Blue,
            Color::Magenta,
            Color::Cyan,
            Color::BrightGreen,
            Color::BrightBlue,
            Color::BrightMagenta,
            Color::BrightCyan,
        ];

        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        let hash = hasher.finish();

        let idx = usize::try_from(hash).unwrap_or_default() % colors.len();
        colors[idx]
    }

    fn state_color(state: ActivityState) -> Color {
        match state {
            ActivityState::Active => Color::Green,
            ActivityState::Inactive => Color::BrightBlack,
            ActivityState::Failed => Color::Red,
            ActivityState::Unknown => Color::Yellow,
        }
    }

    pub fn service(&mut self, service: &Service, columns: Columns) {
        let state =
            format!("{:<8}", service.state.as_str()).color(Self::state_color(service.state));
        let name = service.name.color(Self::string_to_color(&service.name));
        let pid = service
            .visible_pid()
            .map_or_else(|| "-".to_owned(), |pid| pid.to_string());

        let _ = match columns {
            Columns::Minimal => writeln!(self.output, "{state} {name} {pid}"),
            Columns::Full => writeln!(
                self.output,
                "{state} {name} {pid} {} {} {} {}",
                service.unit,
                service.project.as_deref().unwrap_or("-"),
                service
                    .log_file
                    .as_ref()
                    .map_or_else(|| "-".to_owned(), |path| path.display().to_string()),
                service.updated_at.map_or_else(|| "-".to_owned(), format_time),
            ),
        };
    }

    pub fn system(&mut self, message: &str) {
        let prefix = "[system]".color(Color::Red);
        for line in message.lines() {
            let _ = writeln!(self.output, "{prefix} {line}");
        }
    }
}

impl Logger {
    pub fn default() -> Self {
        Self::new(io::stdout())
    }
}

/// Local wall-clock time of day.
pub fn format_time(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(time)
        .format("%H:%M:%S")
        .to_string()
}
