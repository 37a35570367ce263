//! HTML views for the index and detail pages
//!
//! Templates live in `templates/` and are compiled into the binary. Their
//! `.html` names turn on minijinja's HTML auto-escaping.

use chrono_tz::Tz;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::models::{RegionCatalog, WeatherReport};
use crate::store::FetchState;
use crate::TenkiError;

const TEMPLATES: [(&str, &str); 3] = [
    ("layout.html", include_str!("../templates/layout.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("weather.html", include_str!("../templates/weather.html")),
];

const INDEX_TITLE: &str = "天気予報";

/// Report fields as shown on the detail page
#[derive(Debug, Serialize)]
struct ReportView<'a> {
    target_area: &'a str,
    report_datetime: String,
    headline_text: &'a str,
    text: &'a str,
}

impl<'a> ReportView<'a> {
    fn new(report: &'a WeatherReport, timezone: Tz) -> Self {
        Self {
            target_area: &report.target_area,
            report_datetime: report.format_report_datetime(timezone),
            headline_text: &report.headline_text,
            text: &report.text,
        }
    }
}

pub struct PageRenderer {
    env: Environment<'static>,
    timezone: Tz,
    source_url: Option<String>,
}

impl PageRenderer {
    /// `timezone` is used for every report timestamp; `source_url`, when
    /// set, is linked above the region list
    pub fn new(timezone: Tz, source_url: Option<String>) -> Result<Self, TenkiError> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self {
            env,
            timezone,
            source_url,
        })
    }

    pub fn render_index(&self, catalog: &RegionCatalog) -> Result<String, TenkiError> {
        let template = self.env.get_template("index.html")?;
        let html = template.render(context! {
            title => INDEX_TITLE,
            source_url => self.source_url.as_deref(),
            regions => catalog.links(),
        })?;
        Ok(html)
    }

    pub fn render_weather(&self, state: &FetchState) -> Result<String, TenkiError> {
        let report = state
            .data
            .as_ref()
            .map(|r| ReportView::new(r, self.timezone));
        let title = state
            .data
            .as_ref()
            .map_or_else(|| INDEX_TITLE.to_string(), WeatherReport::title);

        let template = self.env.get_template("weather.html")?;
        let html = template.render(context! {
            title => title,
            report => report,
            is_loading => state.is_loading,
            error => state.error.as_ref().map(ToString::to_string),
            reload_action => format!("{}/reload", state.code.detail_href()),
        })?;
        Ok(html)
    }
}
