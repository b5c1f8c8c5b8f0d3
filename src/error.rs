/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use thiserror::Error;

/// Everything that can go wrong while talking to the FMI open data service.
#[derive(Debug, Error)]
pub enum FmiError {
    #[error("Timeout error: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("Communication error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("{status} is not valid")]
    Api { status: u16 },

    #[error("Malformed response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FmiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FmiError::Timeout(e)
        } else {
            FmiError::Transport(e)
        }
    }
}

impl From<xmltree::ParseError> for FmiError {
    fn from(e: xmltree::ParseError) -> Self {
        FmiError::Parse(format!("Error parsing xml: {}", e))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error when reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid yaml: {0}")]
    Yaml(#[from] yaml_rust::ScanError),

    #[error("Configuration file is empty")]
    Empty,

    #[error("{key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Feed {feed}: {message}")]
    Feed { feed: String, message: String },

    #[error("Duplicate feed label {0}")]
    DuplicateLabel(String),
}
