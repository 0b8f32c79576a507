//! Hour-of-week availability grid.

use chrono::{Datelike, FixedOffset, Timelike};
use serde::Serialize;

use super::incidents::status_of;
use crate::series::Sample;

/// State of one hour-of-week cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    #[default]
    NoData,
    Down,
    Up,
}

/// 7×24 grid: rows are days of the week starting with Sunday, columns are
/// hours of the day in the reporting timezone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub cells: [[SlotStatus; 24]; 7],
}

impl Default for Heatmap {
    fn default() -> Self {
        Self {
            cells: [[SlotStatus::NoData; 24]; 7],
        }
    }
}

/// Bucket "up" samples into the hour-of-week grid.
///
/// Samples are placed by their local time at `offset`; within a cell the
/// latest sample in input order wins. Values other than 0 and 1 are skipped.
pub fn heatmap(samples: &[Sample], offset: FixedOffset) -> Heatmap {
    let mut map = Heatmap::default();

    for sample in samples {
        let Some(status) = status_of(sample.value) else {
            continue;
        };

        let local = sample.at.with_timezone(&offset);
        let day = local.weekday().num_days_from_sunday() as usize;
        let hour = local.hour() as usize;

        map.cells[day][hour] = if status == 1 {
            SlotStatus::Up
        } else {
            SlotStatus::Down
        };
    }

    map
}
