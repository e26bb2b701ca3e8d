use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::db::{FoodSink, SaveOutcome};
use crate::error::{HarvestError, Result};
use crate::fetch::PageSource;
use crate::parser::{self, mapper};
use crate::records::FoodRecord;

/// Where in the per-food pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    SaveFood,
    FetchDetail,
    SaveComponents,
    FinalFlush,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub food_code: Option<String>,
    pub stage: FailureStage,
    pub error: String,
}

/// Outcome of one harvest run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub foods_seen: usize,
    pub foods_inserted: usize,
    pub foods_existing: usize,
    pub components_inserted: usize,
    pub components_existing: usize,
    pub malformed_rows: usize,
    pub foods_without_components: usize,
    pub failures: Vec<ItemFailure>,
    /// The food list page had no usable rows; nothing was persisted.
    pub no_rows: bool,
}

impl RunReport {
    fn start() -> Self {
        RunReport {
            started_at: Utc::now(),
            finished_at: None,
            foods_seen: 0,
            foods_inserted: 0,
            foods_existing: 0,
            components_inserted: 0,
            components_existing: 0,
            malformed_rows: 0,
            foods_without_components: 0,
            failures: Vec::new(),
            no_rows: false,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    fn fail(&mut self, food_code: Option<&str>, stage: FailureStage, error: &HarvestError) {
        warn!(food = food_code.unwrap_or("-"), ?stage, "{}", error);
        self.failures.push(ItemFailure {
            food_code: food_code.map(str::to_string),
            stage,
            error: error.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.malformed_rows == 0
    }
}

/// Walks the food list, persisting each food and then its detail page's
/// components before moving on. Strictly one request or write at a time.
pub struct Harvester<S, K> {
    source: S,
    sink: K,
    config: SourceConfig,
    limit: Option<usize>,
    progress: ProgressBar,
}

impl<S: PageSource, K: FoodSink> Harvester<S, K> {
    pub fn new(source: S, sink: K, config: SourceConfig) -> Self {
        Harvester {
            source,
            sink,
            config,
            limit: None,
            progress: ProgressBar::hidden(),
        }
    }

    /// Visit at most `n` rows of the food list.
    pub fn with_limit(mut self, n: Option<usize>) -> Self {
        self.limit = n;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Failing to load the food list aborts the run; everything after that is
    /// recorded per food in the report and traversal continues.
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::start();

        let list_url = self.config.list_url();
        info!("Fetching food list: {}", list_url);
        let html = self.source.fetch(list_url).await?;

        let mut rows = parser::food_rows(&html);
        if rows.is_empty() {
            info!("No rows found in the food list table");
            report.no_rows = true;
            return Ok(report.finish());
        }
        info!("Food list: {} rows", rows.len());
        if let Some(n) = self.limit {
            rows.truncate(n);
        }
        self.progress.set_length(rows.len() as u64);

        let mut foods: Vec<FoodRecord> = Vec::with_capacity(rows.len());
        let mut unsaved: Vec<usize> = Vec::new();
        for row in &rows {
            let food = match mapper::row_to_food(row) {
                Ok(f) => f,
                Err(e) => {
                    warn!("Skipping food list row: {}", e);
                    report.malformed_rows += 1;
                    self.progress.inc(1);
                    continue;
                }
            };
            report.foods_seen += 1;
            self.progress.set_message(food.code.clone());

            // The food has to be stored before anything references it.
            match self.sink.save_foods(std::slice::from_ref(&food)) {
                Ok(o) => {
                    report.foods_inserted += o.inserted;
                    report.foods_existing += o.skipped;
                    self.harvest_components(&food, &mut report).await;
                }
                Err(e) => {
                    report.fail(Some(&food.code), FailureStage::SaveFood, &e);
                    unsaved.push(foods.len());
                }
            }

            foods.push(food);
            self.progress.inc(1);
        }

        // Foods whose first save failed get one more chance here, and their
        // components are harvested once the flush has stored them.
        if !foods.is_empty() {
            match self.sink.save_foods(&foods) {
                Ok(o) => {
                    report.foods_inserted += o.inserted;
                    for &i in &unsaved {
                        info!("Retrying components of {} after final flush", foods[i].code);
                        self.harvest_components(&foods[i], &mut report).await;
                    }
                }
                Err(e) => report.fail(None, FailureStage::FinalFlush, &e),
            }
        }

        let report = report.finish();
        info!(
            "Harvested {} foods ({} new), {} components ({} new), {} malformed rows, {} failures",
            report.foods_seen,
            report.foods_inserted,
            report.components_inserted + report.components_existing,
            report.components_inserted,
            report.malformed_rows,
            report.failures.len()
        );
        Ok(report)
    }

    async fn harvest_components(&self, food: &FoodRecord, report: &mut RunReport) {
        let url = self.config.detail_url_for(&food.code);
        let html = match self.source.fetch(&url).await {
            Ok(h) => h,
            Err(e) => {
                report.fail(Some(&food.code), FailureStage::FetchDetail, &e);
                return;
            }
        };

        let rows = parser::component_rows(&html);
        if rows.is_empty() {
            info!("No component table found for food {}", food.code);
            report.foods_without_components += 1;
            return;
        }

        let mut components = Vec::with_capacity(rows.len());
        for row in &rows {
            match mapper::row_to_component(&food.code, row) {
                Ok(c) => components.push(c),
                Err(e) => {
                    warn!("Skipping detail row of {}: {}", food.code, e);
                    report.malformed_rows += 1;
                }
            }
        }

        match self.sink.save_components(&components) {
            Ok(SaveOutcome { inserted, skipped }) => {
                report.components_inserted += inserted;
                report.components_existing += skipped;
            }
            Err(e) => report.fail(Some(&food.code), FailureStage::SaveComponents, &e),
        }
    }
}

// ── Tests ──
