/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::prelude::*;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::config::FeedConfig;
use crate::error::FmiError;
use crate::query::build_request;
use crate::sensor::SensorState;
use crate::session::FmiSession;

#[derive(Debug)]
pub enum FeedUpdate {
    Updated(SensorState),
    Failed {
        label: String,
        unique_id: String,
        error: FmiError,
    },
}

/// One poll: build the request for `now`, fetch, shape.
pub async fn poll_feed(
    session: &FmiSession,
    feed: &FeedConfig,
    now: DateTime<Utc>,
) -> Result<SensorState, FmiError> {
    let request = build_request(&session.endpoints().feature, &feed.request, now)?;
    let result = session
        .get_feature(&request, feed.fixed_unit().is_none())
        .await?;

    Ok(SensorState::from_result(feed, &result, now))
}

/// Polls `feed` every `interval` until the receiving end goes away.
pub async fn feed_poller(
    session: Arc<FmiSession>,
    feed: FeedConfig,
    interval: Duration,
    sender: mpsc::Sender<FeedUpdate>,
) {
    loop {
        let update = match poll_feed(&session, &feed, Utc::now()).await {
            Ok(state) => FeedUpdate::Updated(state),
            Err(error) => FeedUpdate::Failed {
                label: feed.label.to_owned(),
                unique_id: feed.unique_id(),
                error,
            },
        };

        if sender.send(update).await.is_err() {
            debug!("Publisher gone, stopping poller for {}", feed.label);
            return;
        }

        sleep(interval).await;
    }
}

/// Keeps the last good state of every feed.
#[derive(Debug, Default)]
pub struct Publisher {
    last: HashMap<String, SensorState>,
}

impl Publisher {
    /// Returns the JSON line to publish, if any.
    pub fn handle(&mut self, update: FeedUpdate) -> Option<String> {
        match update {
            FeedUpdate::Updated(state) => {
                let line = match serde_json::to_string(&state) {
                    Ok(l) => l,
                    Err(e) => {
                        warn!("Could not serialize state of {}: {}", state.name, e);
                        return None;
                    }
                };
                self.last.insert(state.unique_id.to_owned(), state);
                Some(line)
            }
            FeedUpdate::Failed {
                label,
                unique_id,
                error,
            } => {
                let kept = self.last.contains_key(&unique_id);
                warn!(
                    "Error fetching FMI data for {}: {} (keeping last state: {})",
                    label, error, kept
                );
                None
            }
        }
    }

    #[cfg(test)]
    pub fn last_state(&self, unique_id: &str) -> Option<&SensorState> {
        self.last.get(unique_id)
    }
}

pub async fn publisher(mut receiver: mpsc::Receiver<FeedUpdate>) {
    let mut publisher = Publisher::default();

    while let Some(update) = receiver.recv().await {
        if let Some(line) = publisher.handle(update) {
            println!("{}", line);
        }
    }

    info!("All pollers finished");
}
