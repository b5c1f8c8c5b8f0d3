/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use chrono::prelude::*;
use serde::Serialize;

use crate::config::FeedConfig;
use crate::query::format_time;
use crate::session::{DataPoint, QueryResult};

pub const ATTRIBUTION: &str = "Data provided by Finnish Meteorological Institute (FMI)";

const OBSERVATION_ICON: &str = "mdi:weather-cloudy";
const FORECAST_ICON: &str = "mdi:weather-cloudy-clock";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint(pub String, pub String);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_update: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Vec<DataPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<SeriesPoint>>,
}

/// What a consumer sees of a feed after a successful poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    pub unique_id: String,
    pub name: String,
    pub icon: String,
    pub attribution: &'static str,
    pub unit: Option<String>,
    pub value: Option<String>,
    pub attributes: Attributes,
}

fn first_future(data: &[DataPoint], now: DateTime<Utc>) -> Option<&DataPoint> {
    data.iter().find(|p| p.time > now)
}

impl SensorState {
    pub fn from_result(feed: &FeedConfig, result: &QueryResult, now: DateTime<Utc>) -> Self {
        let forecast = feed.is_forecast();

        let (value, attributes) = match feed.preset {
            Some(preset) => {
                let point = if forecast {
                    first_future(&result.data, now)
                } else {
                    result.data.first()
                };
                let series = result
                    .time_value_pairs()
                    .into_iter()
                    .map(|(t, v)| SeriesPoint(t, v))
                    .collect();
                let attributes = Attributes {
                    sensor_type: Some(preset.name.to_owned()),
                    latest_update: point.map(|p| format_time(p.time)),
                    series: Some(series),
                    ..Attributes::default()
                };
                (point.map(|p| p.value.to_owned()), attributes)
            }
            None if forecast => {
                let attributes = Attributes {
                    latitude: result.latitude.to_owned(),
                    longitude: result.longitude.to_owned(),
                    query_id: Some(result.query_id.to_string()),
                    parameter: Some(result.parameter.to_owned()),
                    forecast: Some(result.data.to_owned()),
                    ..Attributes::default()
                };
                let value = first_future(&result.data, now).map(|p| p.value.to_owned());
                (value, attributes)
            }
            None => {
                let latest = result.data.first();
                let attributes = Attributes {
                    latitude: result.latitude.to_owned(),
                    longitude: result.longitude.to_owned(),
                    query_id: Some(result.query_id.to_string()),
                    parameter: Some(result.parameter.to_owned()),
                    time: latest.map(|p| p.time),
                    value: latest.map(|p| p.value.to_owned()),
                    ..Attributes::default()
                };
                (latest.map(|p| p.value.to_owned()), attributes)
            }
        };

        let icon = match (feed.preset, forecast) {
            (Some(p), _) => p.icon,
            (None, true) => FORECAST_ICON,
            (None, false) => OBSERVATION_ICON,
        };

        let unit = match feed.fixed_unit() {
            Some(u) => Some(u.to_owned()),
            None => result.unit.to_owned(),
        };

        SensorState {
            unique_id: feed.unique_id(),
            name: format!("FMI {}", feed.label),
            icon: icon.to_owned(),
            attribution: ATTRIBUTION,
            unit,
            value,
            attributes,
        }
    }
}
