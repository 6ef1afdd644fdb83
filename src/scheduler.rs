// Long-lived scheduling — two independent fixed-interval loops.
//
// Loop A polls notifications and runs the download pipeline. Each tick
// spawns a detached processing attempt, but only if the previous attempt
// has finished (single-flight): overlapping attempts could double-observe
// an unread notification between poll and mark-read, so a slow attempt
// makes the next tick skip instead of piling up.
//
// Loop B reconciles the follower graph inline per tick. Re-following is a
// remote no-op, so overlap would be harmless there anyway.
//
// Both loops run until the process is killed or the Deezer session dies —
// an expired session is fatal because there is no automated
// re-authentication.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::deezer::client::{is_auth_error, DeezerClient};
use crate::engine::deemix::DeemixCli;
use crate::engine::traits::Downloader;
use crate::jellyfin::client::JellyfinClient;
use crate::pipeline;

/// Everything a processing attempt needs, constructed once at startup and
/// shared by both loops.
pub struct Bot {
    pub config: Config,
    pub deezer: DeezerClient,
    pub jellyfin: JellyfinClient,
    pub engine: Box<dyn Downloader>,
}

impl Bot {
    /// Build clients from a validated config and establish the Deezer
    /// session.
    pub async fn connect(config: Config) -> Result<Self> {
        let deezer = DeezerClient::login(&config.deezer.bot_arl_cookie).await?;
        let jellyfin = JellyfinClient::new(
            &config.jellyfin.server_url,
            &config.jellyfin.api_key,
        )?;
        let engine: Box<dyn Downloader> = Box::new(DeemixCli::new(&config.engine.command));

        Ok(Self {
            config,
            deezer,
            jellyfin,
            engine,
        })
    }
}

/// Run both loops. Only returns on a fatal error; process lifetime equals
/// loop lifetime.
pub async fn run(bot: Arc<Bot>) -> Result<()> {
    info!(
        download_poll_secs = bot.config.schedule.download_poll_secs,
        friend_poll_secs = bot.config.schedule.friend_poll_secs,
        "Starting scheduler"
    );

    let download = tokio::spawn(download_loop(bot.clone()));
    let friends = tokio::spawn(friend_loop(bot));

    tokio::select! {
        result = download => result.context("download loop panicked")?,
        result = friends => result.context("friend loop panicked")?,
    }
}

/// Guard ensuring at most one in-flight download pass.
#[derive(Clone)]
struct SingleFlight {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    fn new() -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim the slot. Returns false while a pass is still running.
    fn try_begin(&self) -> bool {
        !self.busy.swap(true, Ordering::SeqCst)
    }

    fn finish(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

async fn download_loop(bot: Arc<Bot>) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(
        bot.config.schedule.download_poll_secs.max(1),
    ));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let flight = SingleFlight::new();
    // Detached attempts report fatal session errors back through a channel
    // so the loop (and with it the process) can die.
    let (fatal_tx, mut fatal_rx) = tokio::sync::mpsc::channel::<anyhow::Error>(1);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            Some(fatal) = fatal_rx.recv() => return Err(fatal),
        }

        if !flight.try_begin() {
            warn!("Previous download pass still running, skipping this tick");
            continue;
        }

        let bot = bot.clone();
        let flight = flight.clone();
        let fatal_tx = fatal_tx.clone();
        tokio::spawn(async move {
            info!("Checking for new download requests");
            match pipeline::run_download_pass(
                &bot.deezer,
                &bot.jellyfin,
                bot.engine.as_ref(),
                &bot.config,
            )
            .await
            {
                Ok(()) => info!("Download pass complete"),
                Err(e) if is_auth_error(&e) => {
                    error!("Deezer session is no longer valid: {e:#}");
                    let _ = fatal_tx.send(e).await;
                }
                Err(e) => error!("Download pass failed: {e:#}"),
            }
            flight.finish();
        });
    }
}

async fn friend_loop(bot: Arc<Bot>) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(
        bot.config.schedule.friend_poll_secs.max(1),
    ));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        info!("Checking for new followers");
        match pipeline::friends::reconcile(&bot.deezer).await {
            Ok(0) => {}
            Ok(followed) => info!(followed = followed, "Follower reconciliation complete"),
            Err(e) if is_auth_error(&e) => {
                error!("Deezer session is no longer valid: {e:#}");
                return Err(e);
            }
            Err(e) => warn!("Follower reconciliation failed: {e:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deezer::client::AuthRequired;

    #[test]
    fn single_flight_admits_one_attempt() {
        let flight = SingleFlight::new();
        assert!(flight.try_begin());
        assert!(!flight.try_begin(), "second attempt must be rejected");
        assert!(!flight.try_begin());

        flight.finish();
        assert!(flight.try_begin(), "slot reopens after finish");
    }

    #[test]
    fn single_flight_clones_share_the_slot() {
        let flight = SingleFlight::new();
        let other = flight.clone();

        assert!(flight.try_begin());
        assert!(!other.try_begin(), "clone sees the claimed slot");

        other.finish();
        assert!(flight.try_begin());
    }

    #[test]
    fn auth_errors_are_detected_through_context() {
        let err = anyhow::Error::new(AuthRequired).context("gw deezer.userMenu rejected");
        assert!(is_auth_error(&err));

        let plain = anyhow::anyhow!("connection refused");
        assert!(!is_auth_error(&plain));
    }
}
