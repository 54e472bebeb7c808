//! Inspect the persisted seen-slot set.

use anyhow::Result;

use crate::config::Config;
use crate::store::{self, SlotStore};

pub async fn run(config: &Config, date: Option<String>) -> Result<()> {
    let slot_store = SlotStore::new(store::from_config(&config.store).await?);
    let set = slot_store.load().await;

    let mut records: Vec<_> = set
        .slots
        .iter()
        .filter(|(_, record)| match &date {
            Some(date) => &record.slot.date == date,
            None => true,
        })
        .collect();
    records.sort_by(|a, b| a.0.cmp(b.0));

    if records.is_empty() {
        println!("No seen slots recorded.");
        return Ok(());
    }

    for (key, record) in &records {
        println!(
            "{}  [{}]  first seen {}",
            key, record.slot.element_type, record.found_at
        );
    }
    println!("\n{} slot(s) shown, {} total.", records.len(), set.len());

    Ok(())
}
