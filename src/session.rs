/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::time::Duration;

use chrono::prelude::*;
use log::debug;
use serde::Serialize;

use crate::catalog::{parse_stored_queries, StoredQueryDescriptor};
use crate::error::FmiError;
use crate::http_client::{build_client, get_xml};
use crate::parser::parse_features;
use crate::query::{format_time, language_url, RequestSpec, StoredQueryId, UnitSource};
use crate::units::parse_unit;

pub const FEATURE_URL: &str = "https://opendata.fmi.fi/wfs";
pub const DESCRIBE_URL: &str = "https://opendata.fmi.fi/wfs";
pub const META_URL: &str = "https://opendata.fmi.fi/meta";

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub feature: String,
    pub describe: String,
    pub meta: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            feature: FEATURE_URL.to_owned(),
            describe: DESCRIBE_URL.to_owned(),
            meta: META_URL.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub time: DateTime<Utc>,
    pub value: String,
}

/// Outcome of one poll of a feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub query_id: StoredQueryId,
    pub parameter: String,
    pub unit: Option<String>,
    pub data: Vec<DataPoint>,
}

impl QueryResult {
    /// The bare `[time, value]` list consumed by the single parameter sensors.
    pub fn time_value_pairs(&self) -> Vec<(String, String)> {
        self.data
            .iter()
            .map(|p| (format_time(p.time), p.value.to_owned()))
            .collect()
    }
}

pub struct FmiSession {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl FmiSession {
    pub fn new(timeout: Duration, endpoints: Endpoints) -> Result<Self, FmiError> {
        Ok(FmiSession {
            client: build_client(timeout)?,
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Fetches the features described by `request` and resolves the unit of
    /// the requested parameter. `resolve_unit` is false for feeds with a fixed unit.
    pub async fn get_feature(
        &self,
        request: &RequestSpec,
        resolve_unit: bool,
    ) -> Result<QueryResult, FmiError> {
        let xml = get_xml(&self.client, &request.url).await?;
        let parsed = parse_features(
            &xml,
            &request.parameter,
            request.parameter_match,
            request.latest_only,
        )?;

        debug!(
            "{} {}: {} data points",
            request.query_id,
            request.parameter,
            parsed.records.len()
        );

        let unit = if resolve_unit {
            self.get_unit(&request.parameter, &request.language, &request.query_id)
                .await?
        } else {
            None
        };

        Ok(QueryResult {
            latitude: parsed.latitude,
            longitude: parsed.longitude,
            query_id: request.query_id.clone(),
            parameter: request.parameter.to_owned(),
            unit,
            data: parsed
                .records
                .into_iter()
                .map(|r| DataPoint {
                    time: r.time,
                    value: r.value,
                })
                .collect(),
        })
    }

    pub async fn get_unit(
        &self,
        parameter: &str,
        language: &str,
        query_id: &StoredQueryId,
    ) -> Result<Option<String>, FmiError> {
        let property = match query_id.unit_source() {
            UnitSource::Static(unit) => return Ok(unit.map(|u| u.to_owned())),
            UnitSource::Metadata(property) => property,
        };

        let mut url = url::Url::parse(&self.endpoints.meta)
            .map_err(|e| FmiError::Parse(format!("Bad url {}: {}", self.endpoints.meta, e)))?;
        url.query_pairs_mut()
            .append_pair("observableProperty", property.as_str())
            .append_pair("language", language);

        let xml = get_xml(&self.client, url.as_str()).await?;
        parse_unit(&xml, parameter)
    }

    pub async fn list_stored_queries(
        &self,
        language: &str,
        suffix: Option<&str>,
    ) -> Result<Vec<StoredQueryDescriptor>, FmiError> {
        let mut url = language_url(&self.endpoints.describe, language)?;
        url.query_pairs_mut()
            .append_pair("service", "WFS")
            .append_pair("version", "2.0.0")
            .append_pair("request", "describeStoredQueries");

        let xml = get_xml(&self.client, url.as_str()).await?;
        parse_stored_queries(&xml, suffix)
    }
}
