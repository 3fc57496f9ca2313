//! # Playback State Queries
//!
//! Fetch jobs sometimes need a fact owned by the playback component, such as
//! whether a song is queued and already shows a duration. Jobs ask over a
//! channel and wait for a bounded time instead of hopping onto the playback
//! owner's thread.
//!
//! ```ignore
//! let (query, mut requests) = PlaybackQuery::channel(32, Duration::from_secs(2));
//!
//! // Playback owner
//! tokio::spawn(async move {
//!     while let Some(request) = requests.recv().await {
//!         match request {
//!             PlaybackRequest::FindQueuedItem { song_id, reply } => {
//!                 let _ = reply.send(queue.find_next(&song_id));
//!             }
//!             PlaybackRequest::SetDurationText { song_id, text } => {
//!                 queue.set_duration_text(&song_id, text);
//!             }
//!         }
//!     }
//! });
//! ```

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// A song in the playback queue, as seen by fetch jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedItem {
    pub song_id: String,
    pub duration_text: Option<String>,
}

/// Requests handled by the playback state owner.
#[derive(Debug)]
pub enum PlaybackRequest {
    /// Find the next queued item for `song_id`.
    FindQueuedItem {
        song_id: String,
        reply: oneshot::Sender<Option<QueuedItem>>,
    },
    /// Attach a duration text to the queued item for `song_id`.
    SetDurationText { song_id: String, text: String },
}

/// Client side of the playback state channel.
#[derive(Debug, Clone)]
pub struct PlaybackQuery {
    sender: Option<mpsc::Sender<PlaybackRequest>>,
    timeout: Duration,
}

impl PlaybackQuery {
    /// Create a query client and the receiver the playback owner drains.
    pub fn channel(capacity: usize, timeout: Duration) -> (Self, mpsc::Receiver<PlaybackRequest>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender: Some(sender),
                timeout,
            },
            receiver,
        )
    }

    /// A client with no playback owner. Every lookup reports "not queued".
    pub fn detached() -> Self {
        Self {
            sender: None,
            timeout: Duration::ZERO,
        }
    }

    /// Ask for the queued item of `song_id`.
    ///
    /// A closed channel, a dropped reply or a timeout all read as "not queued".
    pub async fn find_queued_item(&self, song_id: &str) -> Option<QueuedItem> {
        let sender = self.sender.as_ref()?;
        let (reply, answer) = oneshot::channel();

        let request = PlaybackRequest::FindQueuedItem {
            song_id: song_id.to_string(),
            reply,
        };

        let exchange = async {
            sender.send(request).await.ok()?;
            answer.await.ok().flatten()
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(item) => item,
            Err(_) => {
                debug!(song_id, "Playback owner did not answer in time");
                None
            }
        }
    }

    /// Hand a computed duration text to the playback owner. Best-effort.
    pub async fn set_duration_text(&self, song_id: &str, text: &str) {
        let Some(sender) = self.sender.as_ref() else {
            return;
        };

        let request = PlaybackRequest::SetDurationText {
            song_id: song_id.to_string(),
            text: text.to_string(),
        };

        if tokio::time::timeout(self.timeout, sender.send(request))
            .await
            .map_or(true, |sent| sent.is_err())
        {
            trace!(song_id, "duration text not delivered to playback owner");
        }
    }
}

/// Format a duration as elapsed time: `M:SS` below an hour, `H:MM:SS` above.
///
/// ```
/// use core_offline::playback::format_duration_text;
///
/// assert_eq!(format_duration_text(185), "3:05");
/// assert_eq!(format_duration_text(5), "0:05");
/// assert_eq!(format_duration_text(3725), "1:02:05");
/// ```
pub fn format_duration_text(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let elapsed = if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    };

    match elapsed.strip_prefix('0') {
        Some(rest) => rest.to_string(),
        None => elapsed,
    }
}
