//! HTML rendering of the dashboard.
//!
//! Each pull request becomes one row whose background is a horizontal
//! gradient. The coloured segment spans the part of the 240-hour window during
//! which the pull request was open; its colour tells how long it has been open
//! (or that it is closed).

use crate::config::{Colours, DashboardConfig, Thresholds};
use crate::filter::WINDOW_HOURS;
use crate::summary::{PrState, PrSummary};
use chrono::{DateTime, Duration, Utc};
use minijinja::{context, escape_formatter, AutoEscape, Environment, Output, State, Value};
use serde::Serialize;

const TEMPLATE_NAME: &str = "dashboard.html";
const TEMPLATE: &str = include_str!("../templates/dashboard.html");

/// How often the browser reloads the page.
const REFRESH_SECONDS: u32 = 86_400;

const RULER_DAYS: u32 = 10;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

fn hours(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Position of a pull request's open interval inside the window, as fractions
/// of the window width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bar {
    pub start: f64,
    pub end: f64,
}

impl Bar {
    pub fn for_summary(summary: &PrSummary, now: DateTime<Utc>) -> Self {
        let total = WINDOW_HOURS as f64;
        let position = |at: DateTime<Utc>| ((total - hours(now - at)) / total).clamp(0.0, 1.0);

        Self {
            start: position(summary.opened_at),
            end: position(summary.closed_at),
        }
    }

    /// CSS for the row: transparent, then `colour` from start to end, then transparent.
    pub fn style(&self, colour: &str) -> String {
        let start = self.start * 100.0;
        let end = self.end * 100.0;
        format!(
            "margin: 2px; background: linear-gradient( 90deg, transparent 0%, \
             transparent {start:.6}%, {colour} {start:.6}%, {colour} {end:.6}%, \
             transparent {end:.6}%);"
        )
    }
}

/// Picks the bar colour from the state and the length of the open interval.
pub fn colour_for<'a>(
    summary: &PrSummary,
    now: DateTime<Utc>,
    colours: &'a Colours,
    thresholds: &Thresholds,
) -> &'a str {
    if summary.state == PrState::Closed {
        return &colours.closed;
    }

    let open_hours = hours(now - summary.opened_at) - hours(now - summary.closed_at);
    if open_hours < thresholds.passive_hours {
        &colours.passive
    } else if open_hours < thresholds.warning_hours {
        &colours.warning
    } else {
        &colours.alert
    }
}

/// Labels of the ten ruler cells, oldest first.
pub fn ruler_labels() -> Vec<String> {
    (1..=RULER_DAYS)
        .rev()
        .map(|day| match day {
            1 => "today".to_string(),
            _ => format!("{day} days ago"),
        })
        .collect()
}

#[derive(Serialize)]
struct Row<'a> {
    owner: &'a str,
    name: &'a str,
    number: u64,
    title: &'a str,
    author: &'a str,
    style: String,
}

/// Escapes the characters that are significant in HTML text and attributes.
/// `/` is written as is, unlike minijinja's default HTML escaping.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn format_value(out: &mut Output, state: &State, value: &Value) -> Result<(), minijinja::Error> {
    match value.as_str() {
        Some(text) if state.auto_escape() == AutoEscape::Html && !value.is_safe() => {
            out.write_str(&escape_html(text))?;
            Ok(())
        }
        _ => escape_formatter(out, state, value),
    }
}

/// Renders the dashboard page.
#[derive(Clone)]
pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.set_formatter(format_value);
        env.add_template(TEMPLATE_NAME, TEMPLATE)?;
        Ok(Self { env })
    }

    /// Renders `summaries` in the order given.
    pub fn render(
        &self,
        summaries: &[PrSummary],
        config: &DashboardConfig,
        now: DateTime<Utc>,
    ) -> Result<String, minijinja::Error> {
        let rows: Vec<Row<'_>> = summaries
            .iter()
            .map(|summary| {
                let colour = colour_for(summary, now, &config.colours, &config.thresholds);
                Row {
                    owner: &summary.owner,
                    name: &summary.name,
                    number: summary.number,
                    title: &summary.title,
                    author: &summary.author,
                    style: Bar::for_summary(summary, now).style(colour),
                }
            })
            .collect();

        self.env.get_template(TEMPLATE_NAME)?.render(context! {
            refresh_seconds => REFRESH_SECONDS,
            ruler => ruler_labels(),
            rows => rows,
        })
    }
}
