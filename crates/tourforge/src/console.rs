//! Colorful console output for solve progress.
//!
//! Provides a `tracing` layer that formats the solver's start and end events.
//! Initialized on first call to [`solve`](crate::solve) when the `console`
//! feature is enabled.

use std::io::{self, Write};
use std::sync::OnceLock;

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();

/// Initializes console output.
///
/// Safe to call multiple times - only the first call has effect. Does nothing
/// if another global subscriber is already installed.
pub fn init() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tourforge_solver=info"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(TourConsoleLayer)
            .try_init();
    });
}

/// A tracing layer that formats solver events with colors.
pub struct TourConsoleLayer;

impl<S: Subscriber> Layer<S> for TourConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !event.metadata().target().starts_with("tourforge") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(&visitor, event.metadata().level().as_str());
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    event: Option<String>,
    backend: Option<String>,
    status: Option<String>,
    city_count: Option<u64>,
    variables: Option<u64>,
    inequalities: Option<u64>,
    duration_ms: Option<u64>,
    total_distance: Option<f64>,
    time_limit_secs: Option<f64>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value);
        match field.name() {
            "message" => self.message = Some(s),
            "event" => self.event = Some(s.trim_matches('"').to_string()),
            "backend" => self.backend = Some(s.trim_matches('"').to_string()),
            "status" => self.status = Some(s),
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "city_count" => self.city_count = Some(value),
            "variables" => self.variables = Some(value),
            "inequalities" => self.inequalities = Some(value),
            "duration_ms" => self.duration_ms = Some(value),
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        // Counts and durations are never negative; skip malformed fields.
        if let Ok(value) = u64::try_from(value) {
            self.record_u64(field, value);
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        match field.name() {
            "total_distance" => self.total_distance = Some(value),
            "time_limit_secs" => self.time_limit_secs = Some(value),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "backend" => self.backend = Some(value.to_string()),
            _ => {}
        }
    }
}

fn format_event(v: &EventVisitor, level: &str) -> String {
    match (v.event.as_deref(), v.message.as_deref()) {
        (Some("solve_start"), _) => format_solve_start(v),
        (Some("solve_end"), _) => format_solve_end(v),
        (_, Some("Model built")) => format_model_built(v),
        (_, Some(message)) if level == "WARN" => format!(
            "{} {} {} {}",
            timestamp().bright_black(),
            "WARN".yellow(),
            "[Solver]".bright_cyan(),
            message
        ),
        _ => String::new(),
    }
}

fn format_solve_start(v: &EventVisitor) -> String {
    format!(
        "{} {} {} Solving started: city count ({}), backend ({}), time limit ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Solver]".bright_cyan(),
        v.city_count
            .unwrap_or(0)
            .to_formatted_string(&Locale::en)
            .bright_yellow(),
        v.backend.as_deref().unwrap_or("unknown").white(),
        format_duration_ms((v.time_limit_secs.unwrap_or(0.0) * 1000.0) as u64).yellow()
    )
}

fn format_model_built(v: &EventVisitor) -> String {
    format!(
        "{} {} {} Model built: variables ({}), subtour constraints ({}), time spent ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Model]".bright_cyan(),
        v.variables
            .unwrap_or(0)
            .to_formatted_string(&Locale::en)
            .bright_yellow(),
        v.inequalities
            .unwrap_or(0)
            .to_formatted_string(&Locale::en)
            .bright_magenta(),
        format_duration_ms(v.duration_ms.unwrap_or(0)).yellow()
    )
}

fn format_solve_end(v: &EventVisitor) -> String {
    let status = v.status.as_deref().unwrap_or("Unknown");
    let status = if status == "Optimal" {
        status.bright_green().bold().to_string()
    } else {
        status.yellow().bold().to_string()
    };
    format!(
        "{} {} {} Solving ended: total distance ({}), status ({}), time spent ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Solver]".bright_cyan(),
        v.total_distance.unwrap_or(f64::NAN).bright_white().bold(),
        status,
        format_duration_ms(v.duration_ms.unwrap_or(0)).yellow()
    )
}

fn timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| {
            let secs = d.as_secs() % 100000;
            let millis = d.subsec_millis();
            format!("{:5}.{:03}", secs, millis)
        })
        .unwrap_or_else(|_| "    0.000".to_string())
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_ms(250), "250ms");
        assert_eq!(format_duration_ms(1500), "1.50s");
        assert_eq!(format_duration_ms(125_000), "2m 5s");
    }

    #[test]
    fn test_unrelated_events_are_silent() {
        let visitor = EventVisitor {
            message: Some("Edge variables created".to_string()),
            ..EventVisitor::default()
        };
        assert!(format_event(&visitor, "DEBUG").is_empty());
    }

    struct Capture(Arc<Mutex<Vec<EventVisitor>>>);

    impl<S: Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = EventVisitor::default();
            event.record(&mut visitor);
            self.0.lock().unwrap().push(visitor);
        }
    }

    fn capture(emit: impl FnOnce()) -> Vec<EventVisitor> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Capture(Arc::clone(&events)));
        tracing::subscriber::with_default(subscriber, emit);
        let mut events = events.lock().unwrap();
        std::mem::take(&mut *events)
    }

    #[test]
    fn test_signed_fields() {
        let events = capture(|| {
            tracing::info!(city_count = 5i64, duration_ms = -3i64, "Model built");
        });
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].city_count, Some(5));
        assert_eq!(events[0].duration_ms, None);
    }

    #[test]
    fn test_solve_end_fields() {
        let events = capture(|| {
            tracing::info!(
                event = "solve_end",
                total_distance = 4.0,
                status = ?"Optimal",
                duration_ms = 12u64,
            );
        });
        let end = &events[0];
        assert_eq!(end.event.as_deref(), Some("solve_end"));
        assert_eq!(end.total_distance, Some(4.0));
        assert_eq!(end.duration_ms, Some(12));
        assert!(format_event(end, "INFO").contains("Solving ended"));
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
