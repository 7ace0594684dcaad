use anyhow::Result;
use std::sync::Arc;

use crate::agents;
use crate::config::Config;
use crate::db;
use crate::enrich::{EnrichmentRequest, Pipeline};

/// Backfill profile images. Without `all`, only agents that have no image
/// are processed; with it every agent is re-run and may lose a stale image.
pub async fn run_enrich(config: &Config, all: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let backlog = agents::enrichment_backlog(&pool, all).await?;

    if backlog.is_empty() {
        println!("enrich");
        println!("  nothing to do");
        pool.close().await;
        return Ok(());
    }

    let pipeline = Arc::new(Pipeline::from_config(&config.enrichment)?);
    let (ids, requests): (Vec<String>, Vec<EnrichmentRequest>) = backlog.into_iter().unzip();
    let results = pipeline.enrich_batch(requests).await;

    let mut found = 0u64;
    let mut failed = 0u64;
    for (id, image) in ids.iter().zip(results.iter()) {
        if image.is_none() && !all {
            continue;
        }
        match agents::set_profile_image(&pool, id, image.as_deref()).await {
            Ok(()) if image.is_some() => found += 1,
            Ok(()) => {}
            Err(e) => {
                eprintln!("Warning: could not store image for {}: {}", id, e);
                failed += 1;
            }
        }
    }

    println!("enrich");
    println!("  agents processed: {}", ids.len());
    println!("  images found: {}", found);
    println!("  not found: {}", ids.len() as u64 - found - failed);
    if failed > 0 {
        println!("  store failures: {}", failed);
    }

    pool.close().await;
    Ok(())
}

/// Runs the pipeline once without touching the database and prints the
/// stages it went through.
pub async fn run_probe(
    config: &Config,
    full_name: &str,
    website: Option<&str>,
    locality: &str,
) -> Result<()> {
    let pipeline = Pipeline::from_config(&config.enrichment)?;
    let request = EnrichmentRequest::new(full_name, website, locality);
    let resolution = pipeline.run(&request).await;

    let trail: Vec<String> = resolution
        .trail
        .iter()
        .map(|stage| format!("{:?}", stage))
        .collect();

    println!("probe: {}", full_name);
    println!("  website: {}", website.unwrap_or("-"));
    println!("  stages: {}", trail.join(" -> "));
    match (&resolution.image, resolution.found_by) {
        (Some(url), Some(strategy)) => println!("  image: {} (via {:?})", url, strategy),
        (Some(url), None) => println!("  image: {}", url),
        (None, _) => println!("  image: not found"),
    }
    Ok(())
}
