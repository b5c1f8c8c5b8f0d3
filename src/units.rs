/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use xmltree::Element;

use crate::error::FmiError;
use crate::parser::{child, children, OMOP_NS};
use crate::query::RadiationKind;

/// Radiation queries have no metadata entry; their units are fixed.
pub fn static_unit(kind: RadiationKind) -> Option<&'static str> {
    match kind {
        RadiationKind::Air => Some("µBq/m³"),
        RadiationKind::ExternalRadiation => Some("µSv/h"),
        RadiationKind::Other => None,
    }
}

pub fn normalize_unit(unit: &str) -> String {
    unit.replace("degC", "°C")
}

/// Looks up the unit of `parameter` in an observable property listing
/// (`/meta?observableProperty=...`). The property id is compared ignoring case.
pub fn parse_unit(xml: &str, parameter: &str) -> Result<Option<String>, FmiError> {
    let root = Element::parse(xml.as_bytes())?;

    for component in children(&root, OMOP_NS, "component") {
        let property = match child(component, OMOP_NS, "ObservableProperty") {
            Some(p) => p,
            None => continue,
        };

        let id = match property.attributes.get("id") {
            Some(id) => id,
            None => continue,
        };

        if id.to_lowercase() == parameter.to_lowercase() {
            let unit = child(property, OMOP_NS, "uom").and_then(|u| u.attributes.get("uom"));
            return Ok(unit.map(|u| normalize_unit(u)));
        }
    }

    Ok(None)
}


#[cfg(test)]
mod tests {
    use super::fixtures::META_XML;
    use super::*;

    #[test]
    fn celsius() {
        assert_eq!(parse_unit(META_XML, "t2m").unwrap(), Some("°C".to_owned()));
        assert_eq!(parse_unit(META_XML, "T2M").unwrap(), Some("°C".to_owned()));
    }

    #[test]
    fn plain_unit() {
        assert_eq!(parse_unit(META_XML, "ws_10min").unwrap(), Some("m/s".to_owned()));
        assert_eq!(
            parse_unit(META_XML, "wlevn2k_pt1s_instant").unwrap(),
            Some("mm".to_owned())
        );
    }

    #[test]
    fn unknown_parameter() {
        assert_eq!(parse_unit(META_XML, "snow_aws").unwrap(), None);
    }

    #[test]
    fn radiation_units() {
        assert_eq!(static_unit(RadiationKind::Air), Some("µBq/m³"));
        assert_eq!(static_unit(RadiationKind::ExternalRadiation), Some("µSv/h"));
        assert_eq!(static_unit(RadiationKind::Other), None);
    }

    #[test]
    fn normalize() {
        assert_eq!(normalize_unit("degC"), "°C");
        assert_eq!(normalize_unit("degC/h"), "°C/h");
        assert_eq!(normalize_unit("hPa"), "hPa");
    }
}
