//! One full scrape → extract → merge → notify cycle.

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use tracing::warn;

use crate::config::Config;
use crate::digest;
use crate::extract::{ScheduleKind, SlotExtractor};
use crate::fetcher::Fetcher;
use crate::notify::{EmailNotifier, Notifier};
use crate::slot::CandidateSlot;
use crate::store::{self, SlotStore};

const SUBJECT: &str = "Tenniskenttä vapaana";

pub async fn run(config: &Config, days: Option<u32>, headless: bool) -> Result<()> {
    let days = days.unwrap_or(config.days_ahead);
    let today = Local::now().date_naive();

    println!("🎾 Checking {} day(s) starting {}...", days, today);

    let mut fetcher = Fetcher::spawn(&config.fetcher, headless)?;
    let extractor = SlotExtractor::new(config.schedule.clone(), config.markers.clone());

    let mut candidates: Vec<CandidateSlot> = Vec::new();
    for offset in 0..days {
        let date = today + Duration::days(offset as i64);

        // One bad day never aborts the rest of the scan.
        match scan_day(&mut fetcher, &extractor, &config.url, date, offset == 0).await {
            Ok(found) => {
                println!("  {}: {} candidate slot(s)", date, found.len());
                candidates.extend(found);
            }
            Err(err) => warn!(%date, "skipping day: {err:#}"),
        }
    }

    let slot_store = SlotStore::new(store::from_config(&config.store).await?);

    // A persist failure is fatal: concluding "nothing new" on top of a
    // dropped write would desynchronize every future dedup decision.
    let new_slots = slot_store
        .merge(&candidates)
        .await
        .context("Failed to persist the seen-slot set")?;

    match digest::render(&new_slots) {
        None => {
            println!(
                "No new slots. ({} candidate(s), all seen before)",
                candidates.len()
            );
        }
        Some(body) => {
            println!("{body}");
            println!("{} new slot(s) found.", new_slots.len());
            notify(config, &body).await;
        }
    }

    Ok(())
}

async fn scan_day(
    fetcher: &mut Fetcher,
    extractor: &SlotExtractor,
    url: &str,
    date: NaiveDate,
    first_day: bool,
) -> Result<Vec<CandidateSlot>> {
    if !first_day {
        fetcher.advance_day().await?;
    }
    let page = fetcher.render(url).await?;
    Ok(extractor.extract(&page, date, ScheduleKind::for_date(date)))
}

/// Deliver the digest when email is configured. A delivery failure never
/// fails an otherwise successful scrape cycle.
async fn notify(config: &Config, body: &str) {
    let Some(email) = &config.email else {
        return;
    };

    match EmailNotifier::new(email) {
        Ok(notifier) => match notifier.send(SUBJECT, body, &email.recipient).await {
            Ok(()) => println!("Digest emailed to {}.", email.recipient),
            Err(err) => warn!("digest could not be delivered: {err:#}"),
        },
        Err(err) => warn!("notifier setup failed: {err:#}"),
    }
}
