/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use serde::Serialize;
use xmltree::Element;

use crate::error::FmiError;
use crate::parser::{child, children, WFS_NS};
use crate::query::StoredQueryId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredQueryDescriptor {
    pub id: StoredQueryId,
    pub title: String,
}

/// Station based stored queries from a `describeStoredQueries` response,
/// sorted by title. Only queries accepting an `fmisid` parameter are listed.
pub fn parse_stored_queries(
    xml: &str,
    suffix: Option<&str>,
) -> Result<Vec<StoredQueryDescriptor>, FmiError> {
    let root = Element::parse(xml.as_bytes())?;

    let mut queries = vec![];

    for description in children(&root, WFS_NS, "StoredQueryDescription") {
        let id = description
            .attributes
            .get("id")
            .ok_or_else(|| FmiError::Parse("StoredQueryDescription has no id".to_owned()))?;

        if let Some(s) = suffix {
            if !id.ends_with(s) {
                continue;
            }
        }

        let takes_fmisid = children(description, WFS_NS, "Parameter")
            .any(|p| p.attributes.get("name").map(|n| n.as_str()) == Some("fmisid"));
        if !takes_fmisid {
            continue;
        }

        let title = child(description, WFS_NS, "Title")
            .and_then(|t| t.get_text())
            .ok_or_else(|| FmiError::Parse(format!("Stored query {} has no title", id)))?;

        queries.push(StoredQueryDescriptor {
            id: StoredQueryId::new(id),
            title: title.trim().to_owned(),
        });
    }

    queries.sort_by(|a, b| a.title.cmp(&b.title));

    Ok(queries)
}
