/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fmt;

use chrono::prelude::*;
use chrono::Duration;
use serde::Serialize;
use url::Url;

use crate::error::FmiError;
use crate::units::static_unit;

/// Identifier of a stored query on the FMI WFS server,
/// e.g. `fmi::forecast::sealevel::point::simple`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StoredQueryId(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiationKind {
    Air,
    ExternalRadiation,
    Other,
}

/// Decides the request time window and whether only the latest sample is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFamily {
    Forecast,
    Hourly,
    Daily,
    Monthly,
    Yearly,
    Radiation(RadiationKind),
    Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservableProperty {
    Forecast,
    Observation,
}

impl ObservableProperty {
    pub fn as_str(self) -> &'static str {
        match self {
            ObservableProperty::Forecast => "forecast",
            ObservableProperty::Observation => "observation",
        }
    }
}

/// Where the unit of a parameter comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSource {
    Static(Option<&'static str>),
    Metadata(ObservableProperty),
}

impl StoredQueryId {
    pub fn new(id: &str) -> Self {
        StoredQueryId(id.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn radiation_kind(&self) -> RadiationKind {
        if self.0.contains("::air") {
            RadiationKind::Air
        } else if self.0.contains("::external-radiation") {
            RadiationKind::ExternalRadiation
        } else {
            RadiationKind::Other
        }
    }

    // First match wins; an id may contain several of these markers.
    pub fn family(&self) -> QueryFamily {
        let id = self.as_str();
        if id.contains("::forecast") {
            QueryFamily::Forecast
        } else if id.contains("::hourly") {
            QueryFamily::Hourly
        } else if id.contains("::daily") {
            QueryFamily::Daily
        } else if id.contains("::monthly") {
            QueryFamily::Monthly
        } else if id.contains("::yearly") {
            QueryFamily::Yearly
        } else if id.starts_with("stuk::") {
            QueryFamily::Radiation(self.radiation_kind())
        } else {
            QueryFamily::Instant
        }
    }

    pub fn unit_source(&self) -> UnitSource {
        if self.0.starts_with("stuk::") {
            UnitSource::Static(static_unit(self.radiation_kind()))
        } else if self.0.contains("forecast::") {
            UnitSource::Metadata(ObservableProperty::Forecast)
        } else {
            UnitSource::Metadata(ObservableProperty::Observation)
        }
    }
}

impl fmt::Display for StoredQueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TargetSelector {
    Fmisid(i64),
    Place(String),
    Geoid(i64),
    LatLon(f64, f64),
}

impl TargetSelector {
    pub fn key(&self) -> &'static str {
        match self {
            TargetSelector::Fmisid(_) => "fmisid",
            TargetSelector::Place(_) => "place",
            TargetSelector::Geoid(_) => "geoid",
            TargetSelector::LatLon(_, _) => "latlon",
        }
    }

    pub fn value(&self) -> String {
        match self {
            TargetSelector::Fmisid(id) => id.to_string(),
            TargetSelector::Place(place) => place.to_owned(),
            TargetSelector::Geoid(id) => id.to_string(),
            TargetSelector::LatLon(lat, lon) => format!("{},{}", lat, lon),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    pub forecast_hours: i64,
    pub forecast_past_hours: i64,
    pub step_minutes: Option<u32>,
}

impl Default for WindowSettings {
    fn default() -> Self {
        WindowSettings {
            forecast_hours: 48,
            forecast_past_hours: 5,
            step_minutes: Some(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub step_minutes: Option<u32>,
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub fn time_window(family: QueryFamily, now: DateTime<Utc>, settings: &WindowSettings) -> TimeWindow {
    let today = now.date_naive();
    let (start, end, step_minutes) = match family {
        QueryFamily::Forecast => (
            Some(now - Duration::hours(settings.forecast_past_hours)),
            Some(now + Duration::hours(settings.forecast_hours)),
            settings.step_minutes,
        ),
        QueryFamily::Hourly => {
            let top_of_hour = midnight(today) + Duration::hours(i64::from(now.hour()));
            (Some(top_of_hour - Duration::hours(1)), None, None)
        }
        QueryFamily::Daily => (Some(midnight(today)), None, None),
        QueryFamily::Monthly => (Some(midnight(today.with_day(1).unwrap_or(today))), None, None),
        QueryFamily::Yearly => (
            Some(midnight(
                NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
            )),
            None,
            None,
        ),
        QueryFamily::Radiation(_) => (None, None, None),
        QueryFamily::Instant => (Some(now - Duration::hours(1)), Some(now), None),
    };

    TimeWindow {
        start,
        end,
        step_minutes,
    }
}

/// How the feature parameter name is matched against the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterMatch {
    /// Fetch every parameter, filter locally ignoring case.
    CaseInsensitive,
    /// Ask the server for the parameter and keep exact matches only.
    Exact,
}

/// Everything needed to build one getFeature request.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub query_id: StoredQueryId,
    pub target: TargetSelector,
    pub parameter: String,
    pub language: String,
    pub window: WindowSettings,
    pub parameter_match: ParameterMatch,
    /// Keep every sample even for observation feeds.
    pub full_series: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub url: String,
    pub query_id: StoredQueryId,
    pub parameter: String,
    pub language: String,
    pub latest_only: bool,
    pub parameter_match: ParameterMatch,
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Base url with the language appended as a path segment.
pub fn language_url(base: &str, language: &str) -> Result<Url, FmiError> {
    let mut url = Url::parse(base).map_err(|e| FmiError::Parse(format!("Bad url {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| FmiError::Parse(format!("Bad url {}", base)))?
        .pop_if_empty()
        .push(language);

    Ok(url)
}

pub fn build_request(
    base_url: &str,
    feed: &FeedRequest,
    now: DateTime<Utc>,
) -> Result<RequestSpec, FmiError> {
    let family = feed.query_id.family();
    let window = time_window(family, now, &feed.window);

    let mut params: Vec<(&str, String)> = vec![
        ("service", "WFS".to_owned()),
        ("version", "2.0.0".to_owned()),
        ("request", "getFeature".to_owned()),
        ("storedquery_id", feed.query_id.to_string()),
    ];
    if let Some(start) = window.start {
        params.push(("starttime", format_time(start)));
    }
    if let Some(end) = window.end {
        params.push(("endtime", format_time(end)));
    }
    if let Some(step) = window.step_minutes {
        params.push(("timestep", step.to_string()));
    }
    params.push((feed.target.key(), feed.target.value()));
    if feed.parameter_match == ParameterMatch::Exact && family != QueryFamily::Forecast {
        params.push(("parameters", feed.parameter.to_owned()));
    }

    let mut url = language_url(base_url, &feed.language)?;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params.iter().filter(|(_, v)| !v.is_empty()) {
            pairs.append_pair(key, value);
        }
    }

    Ok(RequestSpec {
        url: url.to_string(),
        query_id: feed.query_id.clone(),
        parameter: feed.parameter.to_owned(),
        language: feed.language.to_owned(),
        latest_only: !feed.full_series && family != QueryFamily::Forecast,
        parameter_match: feed.parameter_match,
    })
}
