/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use chrono::prelude::*;
use xmltree::{Element, XMLNode};

use crate::error::FmiError;
use crate::query::ParameterMatch;

pub const WFS_NS: &str = "http://www.opengis.net/wfs/2.0";
pub const GML_NS: &str = "http://www.opengis.net/gml/3.2";
pub const BSWFS_NS: &str = "http://xml.fmi.fi/schema/wfs/2.0";
pub const OMOP_NS: &str = "http://inspire.ec.europa.eu/schemas/omop/2.9";

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub parameter_name: String,
    pub time: DateTime<Utc>,
    pub value: String,
}

#[derive(Debug, Default, PartialEq)]
pub struct ParsedFeatures {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub records: Vec<FeatureRecord>,
}

pub fn children<'a>(
    element: &'a Element,
    namespace: &'a str,
    name: &'a str,
) -> impl Iterator<Item = &'a Element> + 'a {
    element.children.iter().filter_map(move |c| match c {
        XMLNode::Element(e) if e.name == name && e.namespace.as_deref() == Some(namespace) => {
            Some(e)
        }
        _ => None,
    })
}

pub fn child<'a>(element: &'a Element, namespace: &'a str, name: &'a str) -> Option<&'a Element> {
    children(element, namespace, name).next()
}

fn required<'a>(
    element: &'a Element,
    namespace: &'a str,
    name: &'a str,
) -> Result<&'a Element, FmiError> {
    child(element, namespace, name)
        .ok_or_else(|| FmiError::Parse(format!("{} is missing {}", element.name, name)))
}

fn required_text(element: &Element, namespace: &str, name: &str) -> Result<String, FmiError> {
    let e = required(element, namespace, name)?;
    match e.get_text() {
        Some(t) => Ok(t.trim().to_owned()),
        None => Err(FmiError::Parse(format!("{} has no text", name))),
    }
}

pub fn parse_time(text: &str) -> Result<DateTime<Utc>, FmiError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }

    match NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        Ok(t) => Ok(Utc.from_utc_datetime(&t)),
        Err(_) => Err(FmiError::Parse(format!("Invalid timestamp {}", text))),
    }
}

fn parameter_matches(name: &str, target: &str, mode: ParameterMatch) -> bool {
    match mode {
        ParameterMatch::CaseInsensitive => name.to_lowercase() == target.to_lowercase(),
        ParameterMatch::Exact => name == target,
    }
}

/// Reads the `BsWfsElement`s of a simple feature collection.
///
/// Elements whose parameter name does not match `target` and elements with
/// a `NaN` value are dropped. With `latest_only` the result holds at most
/// the single sample with the greatest timestamp.
pub fn parse_features(
    xml: &str,
    target: &str,
    mode: ParameterMatch,
    latest_only: bool,
) -> Result<ParsedFeatures, FmiError> {
    let root = Element::parse(xml.as_bytes())?;

    let mut parsed = ParsedFeatures::default();

    for member in children(&root, WFS_NS, "member") {
        let element = required(member, BSWFS_NS, "BsWfsElement")?;

        if parsed.latitude.is_none() || parsed.longitude.is_none() {
            let pos = required(element, BSWFS_NS, "Location")
                .and_then(|l| required(l, GML_NS, "Point"))
                .and_then(|p| required_text(p, GML_NS, "pos"))?;
            let mut coords = pos.split_whitespace();
            match (coords.next(), coords.next()) {
                (Some(lat), Some(lon)) => {
                    parsed.latitude = Some(lat.to_owned());
                    parsed.longitude = Some(lon.to_owned());
                }
                _ => return Err(FmiError::Parse(format!("Invalid position {}", pos))),
            }
        }

        let name = required_text(element, BSWFS_NS, "ParameterName")?;
        if !parameter_matches(&name, target, mode) {
            continue;
        }

        let time = parse_time(&required_text(element, BSWFS_NS, "Time")?)?;
        let value = required_text(element, BSWFS_NS, "ParameterValue")?;
        if value == "NaN" {
            continue;
        }

        let record = FeatureRecord {
            parameter_name: name,
            time,
            value,
        };

        if !latest_only {
            parsed.records.push(record);
        } else {
            match parsed.records.first() {
                Some(held) if record.time <= held.time => {}
                _ => parsed.records = vec![record],
            }
        }
    }

    Ok(parsed)
}


#[cfg(test)]
mod tests {
    use super::fixtures::feature_collection;
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn drops_nan_and_other_parameters() {
        let xml = feature_collection(&[
            ("2024-01-01T10:00:00Z", "SeaLevelN2000", "12.0"),
            ("2024-01-01T10:00:00Z", "SeaLevel", "99.0"),
            ("2024-01-01T10:30:00Z", "sealevelN2000", "NaN"),
            ("2024-01-01T11:00:00Z", "SEALEVELN2000", "13.5"),
            ("2024-01-01T11:30:00Z", "SeaLevelN2000", "14.0"),
        ]);
        let parsed =
            parse_features(&xml, "SeaLevelN2000", ParameterMatch::CaseInsensitive, false).unwrap();

        assert_eq!(parsed.latitude.as_deref(), Some("60.15363"));
        assert_eq!(parsed.longitude.as_deref(), Some("24.95622"));
        assert_eq!(parsed.records.len(), 3);
        assert!(parsed
            .records
            .iter()
            .all(|r| r.parameter_name.to_lowercase() == "sealeveln2000"));
        let values: Vec<&str> = parsed.records.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["12.0", "13.5", "14.0"]);
        assert_eq!(parsed.records[0].time, at("2024-01-01T10:00:00Z"));
    }

    #[test]
    fn latest_only_keeps_maximum_regardless_of_order() {
        let xml = feature_collection(&[
            ("2024-01-01T10:00:00Z", "t2m", "1.0"),
            ("2024-01-01T12:00:00Z", "t2m", "3.0"),
            ("2024-01-01T11:00:00Z", "t2m", "2.0"),
        ]);
        let parsed = parse_features(&xml, "T2M", ParameterMatch::CaseInsensitive, true).unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].time, at("2024-01-01T12:00:00Z"));
        assert_eq!(parsed.records[0].value, "3.0");
    }

    #[test]
    fn latest_only_keeps_first_of_equal_timestamps() {
        let xml = feature_collection(&[
            ("2024-01-01T12:00:00Z", "t2m", "1.0"),
            ("2024-01-01T12:00:00Z", "t2m", "2.0"),
        ]);
        let parsed = parse_features(&xml, "t2m", ParameterMatch::CaseInsensitive, true).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].value, "1.0");
    }

    #[test]
    fn latest_only_ignores_newer_nan() {
        let xml = feature_collection(&[
            ("2024-01-01T11:00:00Z", "t2m", "1.0"),
            ("2024-01-01T12:00:00Z", "t2m", "NaN"),
        ]);
        let parsed = parse_features(&xml, "t2m", ParameterMatch::CaseInsensitive, true).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].value, "1.0");
    }

    #[test]
    fn exact_match_with_case_mismatch_yields_nothing() {
        // The server-side filter returns the parameter in its own casing.
        let xml = feature_collection(&[
            ("2024-01-01T11:00:00Z", "WLEVN2K_PT1S_INSTANT", "-12.0"),
            ("2024-01-01T11:01:00Z", "WLEVN2K_PT1S_INSTANT", "-13.0"),
        ]);

        let exact = parse_features(&xml, "wlevn2k_pt1s_instant", ParameterMatch::Exact, false).unwrap();
        assert!(exact.records.is_empty());
        assert_eq!(exact.latitude.as_deref(), Some("60.15363"));

        let relaxed =
            parse_features(&xml, "wlevn2k_pt1s_instant", ParameterMatch::CaseInsensitive, false)
                .unwrap();
        assert_eq!(relaxed.records.len(), 2);
    }

    #[test]
    fn empty_collection() {
        let xml = feature_collection(&[]);
        let parsed = parse_features(&xml, "t2m", ParameterMatch::CaseInsensitive, true).unwrap();
        assert_eq!(parsed, ParsedFeatures::default());
    }

    #[test]
    fn missing_position_is_an_error() {
        let xml = r###"<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs/2.0" xmlns:gml="http://www.opengis.net/gml/3.2" xmlns:BsWfs="http://xml.fmi.fi/schema/wfs/2.0">
    <wfs:member>
        <BsWfs:BsWfsElement gml:id="BsWfsElement.1.1.1">
            <BsWfs:Time>2024-01-01T11:00:00Z</BsWfs:Time>
            <BsWfs:ParameterName>t2m</BsWfs:ParameterName>
            <BsWfs:ParameterValue>1.0</BsWfs:ParameterValue>
        </BsWfs:BsWfsElement>
    </wfs:member>
</wfs:FeatureCollection>"###;
        let res = parse_features(xml, "t2m", ParameterMatch::CaseInsensitive, true);
        assert!(matches!(res, Err(FmiError::Parse(_))));
    }

    #[test]
    fn position_needs_both_coordinates() {
        let xml = feature_collection(&[("2024-01-01T11:00:00Z", "t2m", "1.0")])
            .replace("60.15363 24.95622 ", "60.15363");
        let res = parse_features(&xml, "t2m", ParameterMatch::CaseInsensitive, true);
        assert!(matches!(res, Err(FmiError::Parse(_))));
    }

    #[test]
    fn position_comes_from_first_element() {
        let xml = feature_collection(&[
            ("2024-01-01T11:00:00Z", "t2m", "1.0"),
            ("2024-01-01T12:00:00Z", "t2m", "2.0"),
        ])
        .replacen("60.15363 24.95622 ", "61.00000 25.00000 ", 1);
        let parsed = parse_features(&xml, "t2m", ParameterMatch::CaseInsensitive, false).unwrap();
        assert_eq!(parsed.latitude.as_deref(), Some("61.00000"));
        assert_eq!(parsed.longitude.as_deref(), Some("25.00000"));
    }

    #[test]
    fn missing_parameter_name_is_an_error() {
        let xml = feature_collection(&[("2024-01-01T11:00:00Z", "t2m", "1.0")])
            .replace("<BsWfs:ParameterName>t2m</BsWfs:ParameterName>", "");
        let res = parse_features(&xml, "t2m", ParameterMatch::CaseInsensitive, true);
        assert!(matches!(res, Err(FmiError::Parse(_))));
    }

    #[test]
    fn not_xml() {
        let res = parse_features("Service Unavailable", "t2m", ParameterMatch::CaseInsensitive, true);
        assert!(matches!(res, Err(FmiError::Parse(_))));
    }

    #[test]
    fn timestamps() {
        assert_eq!(parse_time("2024-01-01T12:00:00Z").unwrap(), at("2024-01-01T12:00:00Z"));
        assert_eq!(
            parse_time("2024-01-01T14:00:00+02:00").unwrap(),
            at("2024-01-01T12:00:00Z")
        );
        assert_eq!(parse_time("2024-01-01T12:00:00").unwrap(), at("2024-01-01T12:00:00Z"));
        assert!(parse_time("yesterday").is_err());
    }
}
