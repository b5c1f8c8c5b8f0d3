/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::HashSet;
use std::convert::TryFrom;
use std::fs;
use std::path::Path;
use std::time::Duration;

use url::Url;
use yaml_rust::yaml::{Yaml, YamlLoader};

use crate::error::ConfigError;
use crate::http_client::DEFAULT_TIMEOUT;
use crate::presets::{get_preset, preset_names, Preset};
use crate::query::{
    FeedRequest, ParameterMatch, QueryFamily, StoredQueryId, TargetSelector, WindowSettings,
};
use crate::session::Endpoints;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_LANGUAGE: &str = "fi";

// A year either way of now is far more than any stored query serves.
const MAX_WINDOW_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub label: String,
    pub request: FeedRequest,
    pub preset: Option<Preset>,
}

impl FeedConfig {
    pub fn is_forecast(&self) -> bool {
        match self.preset {
            Some(p) => p.is_forecast,
            None => self.request.query_id.family() == QueryFamily::Forecast,
        }
    }

    pub fn fixed_unit(&self) -> Option<&'static str> {
        self.preset.map(|p| p.unit)
    }

    pub fn unique_id(&self) -> String {
        format!("fmi_{}", self.label)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub timeout: Duration,
    pub interval: Duration,
    pub endpoints: Endpoints,
    pub feeds: Vec<FeedConfig>,
}

fn feed_error(feed: &str, message: &str) -> ConfigError {
    ConfigError::Feed {
        feed: feed.to_owned(),
        message: message.to_owned(),
    }
}

fn number(y: &Yaml) -> Option<f64> {
    match y {
        Yaml::Integer(i) => Some(*i as f64),
        Yaml::Real(_) => y.as_f64(),
        _ => None,
    }
}

fn bounded(
    feed: &Yaml,
    key: &str,
    label: &str,
    default: i64,
    max: i64,
) -> Result<i64, ConfigError> {
    match &feed[key] {
        Yaml::BadValue => Ok(default),
        Yaml::Integer(i) if (0..=max).contains(i) => Ok(*i),
        _ => Err(feed_error(
            label,
            &format!("{} must be an integer between 0 and {}", key, max),
        )),
    }
}

fn parse_latlon(y: &Yaml) -> Option<(f64, f64)> {
    match y {
        Yaml::Array(a) if a.len() == 2 => Some((number(&a[0])?, number(&a[1])?)),
        Yaml::String(s) => {
            let mut parts = s.split(',').map(|p| p.trim().parse::<f64>());
            match (parts.next(), parts.next(), parts.next()) {
                (Some(Ok(lat)), Some(Ok(lon)), None) => Some((lat, lon)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn parse_target(feed: &Yaml, label: &str) -> Result<TargetSelector, ConfigError> {
    let mut targets = vec![];

    if !feed["fmisid"].is_badvalue() {
        let id = feed["fmisid"]
            .as_i64()
            .ok_or_else(|| feed_error(label, "fmisid must be an integer"))?;
        targets.push(TargetSelector::Fmisid(id));
    }
    if !feed["place"].is_badvalue() {
        let place = feed["place"]
            .as_str()
            .ok_or_else(|| feed_error(label, "place must be a string"))?;
        targets.push(TargetSelector::Place(place.to_owned()));
    }
    if !feed["geoid"].is_badvalue() {
        let id = feed["geoid"]
            .as_i64()
            .ok_or_else(|| feed_error(label, "geoid must be an integer"))?;
        targets.push(TargetSelector::Geoid(id));
    }
    if !feed["latlon"].is_badvalue() {
        let (lat, lon) = parse_latlon(&feed["latlon"])
            .ok_or_else(|| feed_error(label, "latlon must be [lat, lon] or \"lat,lon\""))?;
        targets.push(TargetSelector::LatLon(lat, lon));
    }

    if targets.len() != 1 {
        return Err(feed_error(
            label,
            "exactly one of fmisid, place, geoid or latlon is required",
        ));
    }

    Ok(targets.remove(0))
}

fn parse_feed(feed: &Yaml) -> Result<FeedConfig, ConfigError> {
    let label = feed["label"]
        .as_str()
        .ok_or_else(|| feed_error("?", "label is required"))?
        .to_owned();

    let target = parse_target(feed, &label)?;

    let language = match &feed["language"] {
        Yaml::BadValue => DEFAULT_LANGUAGE.to_owned(),
        Yaml::String(l) if !l.is_empty() => l.to_owned(),
        _ => return Err(feed_error(&label, "language must be a string")),
    };

    let defaults = WindowSettings::default();
    let step = bounded(
        feed,
        "step",
        &label,
        i64::from(defaults.step_minutes.unwrap_or(0)),
        i64::MAX,
    )?;
    let step = u32::try_from(step).map_err(|_| feed_error(&label, "step must fit in u32"))?;
    let window = WindowSettings {
        forecast_hours: bounded(
            feed,
            "forecast_hours",
            &label,
            defaults.forecast_hours,
            MAX_WINDOW_HOURS,
        )?,
        forecast_past_hours: bounded(
            feed,
            "forecast_past_hours",
            &label,
            defaults.forecast_past_hours,
            MAX_WINDOW_HOURS,
        )?,
        step_minutes: if step > 0 { Some(step) } else { None },
    };

    let (request, preset) = if let Some(name) = feed["preset"].as_str() {
        let preset = get_preset(name).ok_or_else(|| {
            feed_error(
                &label,
                &format!("unknown preset {}, expected one of {:?}", name, preset_names()),
            )
        })?;
        let request = FeedRequest {
            query_id: StoredQueryId::new(preset.query),
            target,
            parameter: preset.parameter.to_owned(),
            language,
            window,
            parameter_match: ParameterMatch::Exact,
            full_series: true,
        };
        (request, Some(preset))
    } else {
        let query = feed["query"]
            .as_str()
            .ok_or_else(|| feed_error(&label, "query or preset is required"))?;
        let parameter = feed["parameter"]
            .as_str()
            .ok_or_else(|| feed_error(&label, "parameter is required"))?;
        let parameter_match = match &feed["server_side_filter"] {
            Yaml::BadValue | Yaml::Boolean(false) => ParameterMatch::CaseInsensitive,
            Yaml::Boolean(true) => ParameterMatch::Exact,
            _ => return Err(feed_error(&label, "server_side_filter must be true or false")),
        };
        let request = FeedRequest {
            query_id: StoredQueryId::new(query),
            target,
            parameter: parameter.to_owned(),
            language,
            window,
            parameter_match,
            full_series: false,
        };
        (request, None)
    };

    Ok(FeedConfig {
        label,
        request,
        preset,
    })
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_owned(),
        message: message.to_owned(),
    }
}

fn seconds(y: &Yaml, key: &str, default: Duration, scale: u64) -> Result<Duration, ConfigError> {
    match &y[key] {
        Yaml::BadValue => Ok(default),
        Yaml::Integer(i) if *i > 0 => (*i as u64)
            .checked_mul(scale)
            .map(Duration::from_secs)
            .ok_or_else(|| invalid(key, "is too large")),
        _ => Err(invalid(key, "must be a positive integer")),
    }
}

fn endpoint(doc: &Yaml, key: &str, default: &str) -> Result<String, ConfigError> {
    let url = match &doc["endpoints"][key] {
        Yaml::BadValue => return Ok(default.to_owned()),
        Yaml::String(s) => s,
        _ => return Err(invalid(key, "endpoint must be a url")),
    };

    match Url::parse(url) {
        Ok(u) if !u.cannot_be_a_base() => Ok(url.to_owned()),
        Ok(_) => Err(invalid(key, &format!("{} cannot be used as a base url", url))),
        Err(e) => Err(invalid(key, &format!("{}: {}", url, e))),
    }
}

pub fn parse_config(s: &str) -> Result<Config, ConfigError> {
    let docs = YamlLoader::load_from_str(s)?;
    let doc = docs.get(0).ok_or(ConfigError::Empty)?;

    let timeout = seconds(doc, "timeout", DEFAULT_TIMEOUT, 1)?;
    let interval = seconds(doc, "interval_minutes", DEFAULT_INTERVAL, 60)?;

    let defaults = Endpoints::default();
    let endpoints = Endpoints {
        feature: endpoint(doc, "feature", &defaults.feature)?,
        describe: endpoint(doc, "describe", &defaults.describe)?,
        meta: endpoint(doc, "meta", &defaults.meta)?,
    };

    let mut feeds = vec![];
    let mut labels = HashSet::new();
    if let Some(list) = doc["feeds"].as_vec() {
        for f in list {
            let feed = parse_feed(f)?;
            if !labels.insert(feed.label.to_owned()) {
                return Err(ConfigError::DuplicateLabel(feed.label));
            }
            feeds.push(feed);
        }
    }

    Ok(Config {
        timeout,
        interval,
        endpoints,
        feeds,
    })
}

pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_config(&s)
}
