use std::collections::HashMap;
use std::path::Path;

use concierge_core::config::ScheduleConfig;
use concierge_core::error::{ConciergeError, Result};
use reqwest::Url;
use tracing::info;

/// Read-only view of the studio's weekly timetable.
pub trait ScheduleStore: Send + Sync {
    /// Free time labels for `day`, in table order.
    /// Fails with `UnknownScheduleDay` if the table has no such column.
    fn free_slots(&self, day: &str) -> Result<Vec<String>>;

    /// Day column headers, lowercased, in table order.
    fn known_days(&self) -> Vec<String>;
}

/// Timetable parsed from a sheet export.
///
/// Layout: a header row, one column of time labels and one column per day.
/// An empty cell means the master is free at that time.
#[derive(Debug, Clone, Default)]
pub struct SheetSchedule {
    days: Vec<String>,
    free: HashMap<String, Vec<String>>,
}

fn normalize(header: &str) -> String {
    header.trim().to_lowercase()
}

impl SheetSchedule {
    pub fn from_csv(text: &str, time_column: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ConciergeError::Schedule(format!("failed to read header row: {e}")))?
            .iter()
            .map(normalize)
            .collect();

        let time_column = normalize(time_column);
        let time_idx = headers.iter().position(|h| *h == time_column).ok_or_else(|| {
            ConciergeError::Schedule(format!("missing time column '{time_column}'"))
        })?;

        let day_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| *i != time_idx && !h.is_empty())
            .map(|(i, h)| (i, h.clone()))
            .collect();

        let mut free: HashMap<String, Vec<String>> = day_columns
            .iter()
            .map(|(_, day)| (day.clone(), Vec::new()))
            .collect();

        for record in reader.records() {
            let record =
                record.map_err(|e| ConciergeError::Schedule(format!("malformed row: {e}")))?;
            let label = record.get(time_idx).unwrap_or("").trim();
            if label.is_empty() {
                continue;
            }
            for (col, day) in &day_columns {
                let booked = record.get(*col).is_some_and(|cell| !cell.trim().is_empty());
                if !booked {
                    if let Some(slots) = free.get_mut(day) {
                        slots.push(label.to_string());
                    }
                }
            }
        }

        Ok(Self {
            days: day_columns.into_iter().map(|(_, day)| day).collect(),
            free,
        })
    }
}

impl ScheduleStore for SheetSchedule {
    fn free_slots(&self, day: &str) -> Result<Vec<String>> {
        self.free
            .get(&normalize(day))
            .cloned()
            .ok_or_else(|| ConciergeError::UnknownScheduleDay(day.to_string()))
    }

    fn known_days(&self) -> Vec<String> {
        self.days.clone()
    }
}

/// CSV export URL of one sheet of a Google spreadsheet.
pub fn sheet_export_url(spreadsheet_id: &str, sheet: &str) -> Result<Url> {
    let base = format!("https://docs.google.com/spreadsheets/d/{spreadsheet_id}/gviz/tq");
    Url::parse_with_params(&base, &[("tqx", "out:csv"), ("sheet", sheet)])
        .map_err(|e| ConciergeError::Config(format!("invalid spreadsheet id: {e}")))
}

/// Load the timetable once at startup, from a local file or the sheet export.
pub async fn load_schedule(config: &ScheduleConfig) -> Result<SheetSchedule> {
    let text = if !config.path.is_empty() {
        tokio::fs::read_to_string(Path::new(&config.path))
            .await
            .map_err(|e| ConciergeError::Schedule(format!("failed to read {}: {e}", config.path)))?
    } else {
        let url = sheet_export_url(&config.spreadsheet_id, &config.sheet)?;
        fetch_sheet(url).await?
    };

    let schedule = SheetSchedule::from_csv(&text, &config.time_column)?;
    info!("[schedule] loaded days: {}", schedule.known_days().join(", "));
    Ok(schedule)
}

async fn fetch_sheet(url: Url) -> Result<String> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| ConciergeError::Schedule(format!("sheet request failed: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ConciergeError::Schedule(format!("failed to read sheet body: {e}")))?;
    if !status.is_success() {
        return Err(ConciergeError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
