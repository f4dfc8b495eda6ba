//! FeedPoller processor.
//!
//! Some channels never push webhooks and only publish an iCal-style
//! calendar. The poller fetches each active channel feed on a fixed
//! interval, diffs the entries against stays already imported from that
//! channel (keyed by the entry UID), and routes the difference through the
//! stay lifecycle: create when unseen, modify when the dates moved, skip
//! when unchanged.
//!
//! An iCal feed carries no listing identifier per entry, so a feed channel
//! is modeled as one listing: the channel must have exactly one room
//! mapping, and every entry books into that room.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::entities::{Channel, ChannelMapping, Stay, StaySource};
use crate::lifecycle::{CreateStay, GuestRef, ModifyStay, StayService};
use innsync_sdk::ical::{parse_feed, FeedEntry};

/// Outcome counters for one polling pass, logged per channel and in total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub failed: u32,
}

impl PollStats {
    fn absorb(&mut self, other: PollStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

/// Periodically ingests polled calendar feeds.
pub struct FeedPoller {
    service: StayService,
    shutdown_rx: watch::Receiver<bool>,
    http_client: reqwest::Client,
    poll_interval: std::time::Duration,
}

impl FeedPoller {
    pub fn new(
        service: StayService,
        shutdown_rx: watch::Receiver<bool>,
        poll_interval: std::time::Duration,
    ) -> Self {
        Self {
            service,
            shutdown_rx,
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            poll_interval,
        }
    }

    /// Run the poller until shutdown.
    pub async fn run(mut self) {
        info!(interval_secs = self.poll_interval.as_secs(), "FeedPoller started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("FeedPoller received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(self.poll_interval) => {
                    let stats = self.poll_all().await;
                    info!(
                        created = stats.created,
                        updated = stats.updated,
                        unchanged = stats.unchanged,
                        failed = stats.failed,
                        "feed polling pass complete"
                    );
                }
            }
        }

        info!("FeedPoller shutdown complete");
    }

    /// One polling pass over every active feed channel.
    pub async fn poll_all(&self) -> PollStats {
        let channels = match Channel::active_with_feed(self.service.pool()).await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "failed to load feed channels");
                return PollStats::default();
            }
        };

        let mut stats = PollStats::default();
        for channel in channels {
            stats.absorb(self.poll_channel(&channel).await);
        }
        stats
    }

    async fn poll_channel(&self, channel: &Channel) -> PollStats {
        let mut stats = PollStats::default();

        let Some(feed_url) = channel.ical_url.as_deref() else {
            return stats;
        };
        let feed_url = match url::Url::parse(feed_url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(channel_id = %channel.id, error = %e, "channel has an invalid feed URL");
                stats.failed += 1;
                return stats;
            }
        };

        let mappings = match ChannelMapping::for_channel(self.service.pool(), channel.id).await {
            Ok(mappings) => mappings,
            Err(e) => {
                warn!(channel_id = %channel.id, error = %e, "failed to load channel mappings");
                stats.failed += 1;
                return stats;
            }
        };
        let [mapping] = mappings.as_slice() else {
            warn!(
                channel_id = %channel.id,
                mappings = mappings.len(),
                "feed channel must map exactly one room; skipping"
            );
            stats.failed += 1;
            return stats;
        };

        let body = match self.fetch_feed(feed_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(channel_id = %channel.id, error = %e, "failed to fetch calendar feed");
                stats.failed += 1;
                return stats;
            }
        };

        let parsed = parse_feed(&body);
        for err in &parsed.errors {
            warn!(channel_id = %channel.id, error = %err, "skipping malformed feed entry");
            stats.failed += 1;
        }

        for entry in parsed.entries {
            match self.apply_entry(channel, mapping, &entry).await {
                Ok(outcome) => match outcome {
                    EntryOutcome::Created => stats.created += 1,
                    EntryOutcome::Updated => stats.updated += 1,
                    EntryOutcome::Unchanged => stats.unchanged += 1,
                },
                Err(e) => {
                    warn!(
                        channel_id = %channel.id,
                        uid = %entry.uid,
                        error = %e,
                        "failed to apply feed entry"
                    );
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    async fn fetch_feed(&self, url: url::Url) -> Result<String, reqwest::Error> {
        self.http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    async fn apply_entry(
        &self,
        channel: &Channel,
        mapping: &ChannelMapping,
        entry: &FeedEntry,
    ) -> Result<EntryOutcome, crate::lifecycle::StayError> {
        let existing =
            Stay::find_by_external_ref(self.service.pool(), channel.id, &entry.uid).await?;

        match existing {
            None => {
                self.service
                    .create(CreateStay {
                        property_id: channel.property_id,
                        room_id: mapping.room_id,
                        guest: GuestRef::Contact {
                            full_name: format!("{} guest", channel.name),
                            phone: None,
                            email: None,
                        },
                        check_in: entry.check_in,
                        check_out: entry.check_out,
                        adults: 1,
                        children: 0,
                        rate_rule_id: None,
                        total_override_minor: None,
                        source: StaySource::Channel,
                        channel_id: Some(channel.id),
                        external_ref: Some(entry.uid.clone()),
                        actor: format!("feed:{}", channel.name),
                    })
                    .await?;
                Ok(EntryOutcome::Created)
            }
            Some(stay)
                if stay.check_in == entry.check_in && stay.check_out == entry.check_out =>
            {
                Ok(EntryOutcome::Unchanged)
            }
            Some(stay) if stay.status.is_terminal() => {
                // A cancelled or checked-out stay keeps its external_ref;
                // the feed can no longer move it.
                debug!(stay_id = %stay.id, uid = %entry.uid, "feed entry targets a terminal stay");
                Ok(EntryOutcome::Unchanged)
            }
            Some(stay) => {
                self.service
                    .modify(
                        stay.id,
                        ModifyStay {
                            room_id: None,
                            check_in: Some(entry.check_in),
                            check_out: Some(entry.check_out),
                            adults: None,
                            children: None,
                            total_override_minor: None,
                            actor: format!("feed:{}", channel.name),
                        },
                    )
                    .await?;
                Ok(EntryOutcome::Updated)
            }
        }
    }
}

enum EntryOutcome {
    Created,
    Updated,
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_absorb_adds_componentwise() {
        let mut total = PollStats {
            created: 1,
            updated: 0,
            unchanged: 3,
            failed: 0,
        };
        total.absorb(PollStats {
            created: 0,
            updated: 2,
            unchanged: 1,
            failed: 4,
        });
        assert_eq!(
            total,
            PollStats {
                created: 1,
                updated: 2,
                unchanged: 4,
                failed: 4,
            }
        );
    }
}
