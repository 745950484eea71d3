// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idle session reaper.
//!
//! A session is stopped once it has been idle for the clone's
//! `max_idle_minutes` and Database Lab no longer reports the clone as usable.
//! Sessions busy with a command are skipped for this round.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use joe_core::types::Message;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assistant::Assistant;
use crate::pipeline::ProcessingService;

pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(60);

pub const DIRECT_SESSION_STOPPED: &str = "Session was stopped due to inactivity.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppedSession {
    pub user_id: String,
    pub channel_id: String,
    pub direct: bool,
    pub platform_session_id: String,
}

pub fn channel_notice(user_ids: &[&str]) -> String {
    let mentions: Vec<String> = user_ids.iter().map(|id| format!("<@{id}>")).collect();
    format!("Stopped idle sessions for: {}", mentions.join(", "))
}

impl ProcessingService {
    /// Stops idle sessions and notifies their channels.
    pub async fn check_idle_sessions(&self) -> Vec<StoppedSession> {
        let now = self.deps.clock.now();
        let mut stopped = Vec::new();

        for (user_id, user) in self.users.snapshot().await {
            let Ok(mut session) = user.session.try_lock() else {
                debug!(user_id = user_id.as_str(), "session busy, skipping");
                continue;
            };
            if !self.owns(&session) {
                continue;
            }
            let Some(clone_id) = session.clone_id().map(str::to_string) else {
                continue;
            };

            let idle = session.idle_minutes(now);
            if idle < i64::from(session.idle_limit_minutes) {
                continue;
            }
            if self.clones.is_active(&clone_id).await {
                debug!(
                    user_id = user_id.as_str(),
                    clone_id = clone_id.as_str(),
                    idle,
                    "clone still active remotely"
                );
                continue;
            }

            let platform_session_id = session.platform_session_id.clone();
            self.clones.stop_session(&mut session).await;
            info!(
                user_id = user_id.as_str(),
                clone_id = clone_id.as_str(),
                idle,
                "stopped idle session"
            );
            stopped.push(StoppedSession {
                user_id,
                channel_id: session.channel_id.clone(),
                direct: session.direct,
                platform_session_id,
            });
        }

        if !stopped.is_empty() && !self.cancel.is_cancelled() {
            self.notify_stopped(&stopped).await;
        }
        stopped
    }

    async fn notify_stopped(&self, stopped: &[StoppedSession]) {
        let mut by_channel: BTreeMap<&str, Vec<&StoppedSession>> = BTreeMap::new();
        for s in stopped {
            by_channel.entry(s.channel_id.as_str()).or_default().push(s);
        }

        let messenger = &self.deps.messenger;
        for (channel_id, sessions) in by_channel {
            let (direct, shared): (Vec<&StoppedSession>, Vec<&StoppedSession>) =
                sessions.into_iter().partition(|s| s.direct);

            for s in direct {
                let mut msg = Message::new(channel_id, s.user_id.as_str(), DIRECT_SESSION_STOPPED);
                msg.session_id = s.platform_session_id.clone();
                if let Err(e) = messenger.publish(&mut msg).await {
                    warn!(channel_id, error = %e, "failed to notify stopped session");
                }
            }

            if !shared.is_empty() {
                let mut user_ids: Vec<&str> = shared.iter().map(|s| s.user_id.as_str()).collect();
                user_ids.sort_unstable();
                let mut msg = Message::new(channel_id, "", channel_notice(&user_ids));
                if let Err(e) = messenger.publish(&mut msg).await {
                    warn!(channel_id, error = %e, "failed to notify stopped sessions");
                }
            }
        }
    }
}

/// Runs `check_idle_sessions` on every assistant until `cancel` fires.
pub async fn run_reaper(
    assistants: Vec<Arc<dyn Assistant>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("idle reaper stopped");
                return;
            }
            _ = ticker.tick() => {
                for assistant in &assistants {
                    assistant.check_idle_sessions().await;
                }
            }
        }
    }
}
