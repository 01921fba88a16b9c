//! The run loop: pick a row, post it, record the outcome.
//!
//! Every firing re-opens the row store and re-reads its rows; the sheet is
//! the sole owner of row identity, so nothing picked on a previous tick is
//! trusted to still be there. One JSON line per post attempt goes to
//! stdout; progress lines go through tracing.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{error, info, warn};

use spool_scheduler::{
    ScheduleMap, TimeOfDay, Window, nearest_entry, next_at_with_jitter, next_random_in_window,
    sleep_until, start_of_day_after,
};
use spool_sheets::{Row, RowStatus, RowStore, SheetsClient, SheetsError, first_unposted};
use spool_threads::ThreadsClient;

/// Everything a firing needs: the two API clients plus the sheet address.
pub struct Runner {
    pub sheets: SheetsClient,
    pub threads: ThreadsClient,
    pub sheet_ref: String,
    pub worksheet: Option<String>,
    pub tz: Tz,
}

impl Runner {
    /// Fire once: open the store, pick the first eligible row, submit it,
    /// write the outcome back. Returns whether a row was posted. An empty
    /// queue is a logged no-op, not an error.
    pub async fn post_next_unposted(&self) -> Result<bool, SheetsError> {
        let store = self.open_store().await?;
        let rows = store.read_rows().await?;
        let Some(row) = first_unposted(&rows) else {
            info!("no rows to post");
            println!("{}", json!({ "ok": true, "msg": "no rows to post" }));
            return Ok(false);
        };
        self.submit(&store, row).await
    }

    /// Drain eligible rows now, bounded by `max_per_run` (0 = unbounded).
    /// Rows are re-read after every submission so the head of the queue is
    /// always picked from fresh contents.
    pub async fn run_batch(&self, max_per_run: usize) -> Result<(), SheetsError> {
        let store = self.open_store().await?;
        let mut processed = 0usize;
        loop {
            let rows = store.read_rows().await?;
            let Some(row) = first_unposted(&rows) else {
                info!(processed, "queue drained");
                break;
            };
            self.submit(&store, row).await?;
            processed += 1;
            if max_per_run != 0 && processed >= max_per_run {
                info!(processed, "reached max rows for this run");
                break;
            }
        }
        Ok(())
    }

    /// Fire immediately, then once every `interval_min` minutes.
    pub async fn run_interval(&self, interval_min: u64) {
        info!(interval_min, "interval schedule");
        loop {
            self.fire().await;
            let next = self.now() + Duration::minutes(interval_min as i64);
            info!(next_run = %next.to_rfc3339(), "next run scheduled");
            sleep_until(next).await;
        }
    }

    /// Fire once per day at a random instant inside the window.
    pub async fn run_daily_window(&self, window: Window) {
        info!(start = %window.start, end = %window.end, "daily window schedule");
        let mut next = self.draw_window(&window, self.now());
        loop {
            info!(next_run = %next.to_rfc3339(), "next run scheduled");
            sleep_until(next).await;
            self.fire().await;
            next = self.draw_window(&window, start_of_day_after(next));
        }
    }

    /// Fire once per day at the given time, jittered.
    pub async fn run_daily_at(&self, time: TimeOfDay, jitter_min: u32) {
        info!(jitter_min, "daily-at schedule");
        let mut next = self.draw_at(&time, jitter_min, self.now());
        loop {
            info!(next_run = %next.to_rfc3339(), "next run scheduled");
            sleep_until(next).await;
            self.fire().await;
            next = self.draw_at(&time, jitter_min, next + Duration::days(1));
        }
    }

    /// Fire at several daily times, each label jittered independently.
    /// Only the label that fired is recomputed; the rest keep their
    /// pending instants.
    pub async fn run_daily_multi_at(&self, times: Vec<(String, TimeOfDay)>, jitter_min: u32) {
        info!(count = times.len(), jitter_min, "daily multi-at schedule");

        let mut schedule = ScheduleMap::new();
        for (label, time) in &times {
            schedule.insert(label.clone(), self.draw_at(time, jitter_min, self.now()));
        }

        loop {
            let Some((label, at)) = nearest_entry(&schedule) else {
                return;
            };
            let label = label.to_string();
            info!(label = %label, next_run = %at.to_rfc3339(), "next run scheduled");
            sleep_until(at).await;
            self.fire().await;

            if let Some((_, time)) = times.iter().find(|(l, _)| *l == label) {
                schedule.insert(label, self.draw_at(time, jitter_min, at + Duration::days(1)));
            }
        }
    }

    /// One scheduled firing. Store failures abort the firing but never the
    /// schedule; the loop retries on its next tick.
    async fn fire(&self) {
        if let Err(err) = self.post_next_unposted().await {
            error!(error = %err, "firing aborted");
        }
    }

    /// Submit one picked row and write its result back. Submission errors
    /// become a per-row failure; store write errors propagate.
    async fn submit(&self, store: &RowStore<'_>, row: &Row) -> Result<bool, SheetsError> {
        match self.threads.post_row(row).await {
            Ok(outcome) => {
                store.write_result(row.index, RowStatus::Posted, "").await?;
                println!(
                    "{}",
                    json!({
                        "ok": true,
                        "row_idx": row.index,
                        "row": row_value(row),
                        "res": serde_json::to_value(&outcome).unwrap_or(serde_json::Value::Null),
                    })
                );
                Ok(true)
            }
            Err(err) => {
                let err = err.to_string();
                store.write_result(row.index, RowStatus::Failed, &err).await?;
                warn!(row = row.index, error = %err, "post failed");
                println!(
                    "{}",
                    json!({
                        "ok": false,
                        "row_idx": row.index,
                        "row": row_value(row),
                        "err": err,
                    })
                );
                Ok(false)
            }
        }
    }

    async fn open_store(&self) -> Result<RowStore<'_>, SheetsError> {
        RowStore::open(
            &self.sheets,
            &self.sheet_ref,
            self.worksheet.as_deref(),
            self.tz,
        )
        .await
    }

    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    fn draw_window(&self, window: &Window, reference: DateTime<Tz>) -> DateTime<Tz> {
        let mut rng = rand::rng();
        next_random_in_window(window, reference, &mut rng)
    }

    fn draw_at(&self, time: &TimeOfDay, jitter_min: u32, reference: DateTime<Tz>) -> DateTime<Tz> {
        let mut rng = rand::rng();
        next_at_with_jitter(time, jitter_min, reference, &mut rng)
    }
}

fn row_value(row: &Row) -> serde_json::Value {
    serde_json::to_value(row).unwrap_or(serde_json::Value::Null)
}
