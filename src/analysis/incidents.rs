//! Reconstruction of down/resolved events from the "up" series.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::series::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IncidentStatus {
    Down,
    Resolved,
}

/// A down or recovery event derived from status transitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    pub status: IncidentStatus,
    pub started_at: DateTime<Utc>,
    /// `None` while a Down incident is still open.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Whole minutes between going down and recovering. Only set on a closed Down.
    pub duration_minutes: Option<i64>,
}

impl Incident {
    fn down(at: DateTime<Utc>) -> Self {
        Self {
            status: IncidentStatus::Down,
            started_at: at,
            resolved_at: None,
            duration_minutes: None,
        }
    }

    fn resolved(at: DateTime<Utc>) -> Self {
        Self {
            status: IncidentStatus::Resolved,
            started_at: at,
            resolved_at: Some(at),
            duration_minutes: None,
        }
    }

    fn close(&mut self, at: DateTime<Utc>) {
        let ms = (at - self.started_at).num_milliseconds();
        self.resolved_at = Some(at);
        self.duration_minutes = Some((ms as f64 / 60_000.0).round() as i64);
    }

    pub fn is_ongoing(&self) -> bool {
        self.status == IncidentStatus::Down && self.resolved_at.is_none()
    }

    /// "Ongoing", "<n> min", or empty for recovery events.
    pub fn duration_label(&self) -> String {
        match (self.status, self.duration_minutes) {
            (IncidentStatus::Down, Some(m)) => format!("{} min", m),
            (IncidentStatus::Down, None) => "Ongoing".to_string(),
            (IncidentStatus::Resolved, _) => String::new(),
        }
    }

    pub fn message(&self) -> &'static str {
        match self.status {
            IncidentStatus::Down => "Site went down",
            IncidentStatus::Resolved => "Site is back up",
        }
    }
}

/// Incidents for a window, most recent first, plus the status sequence they
/// were derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncidentHistory {
    pub incidents: Vec<Incident>,
    pub uptime_timeline: Vec<u8>,
}

/// Derive incidents from a time-ordered "up" series.
///
/// The first sample only seeds the running status: a window that opens in
/// the middle of an outage records the recovery but no Down event, because
/// the real start of that outage is outside the window.
///
/// Samples sharing an instant collapse to the last one. A sequence going
/// back in time, or holding a status other than 0 or 1, yields an empty
/// history.
pub fn derive_incidents(samples: &[Sample]) -> IncidentHistory {
    let Some(statuses) = normalize(samples) else {
        return IncidentHistory::default();
    };
    let Some(&(_, first)) = statuses.first() else {
        return IncidentHistory::default();
    };

    // Chronological here, reversed at the end
    let mut incidents: Vec<Incident> = Vec::new();
    let mut open: Option<usize> = None;
    let mut last = first;

    for &(at, status) in &statuses {
        match (last, status) {
            (1, 0) => {
                open = Some(incidents.len());
                incidents.push(Incident::down(at));
            }
            (0, 1) => {
                if let Some(i) = open.take() {
                    incidents[i].close(at);
                }
                incidents.push(Incident::resolved(at));
            }
            _ => {}
        }
        last = status;
    }

    incidents.reverse();

    IncidentHistory {
        incidents,
        uptime_timeline: statuses.into_iter().map(|(_, s)| s).collect(),
    }
}

fn normalize(samples: &[Sample]) -> Option<Vec<(DateTime<Utc>, u8)>> {
    let mut out: Vec<(DateTime<Utc>, u8)> = Vec::with_capacity(samples.len());

    for sample in samples {
        let status = status_of(sample.value)?;
        match out.last_mut() {
            Some(prev) if sample.at < prev.0 => return None,
            Some(prev) if sample.at == prev.0 => prev.1 = status,
            _ => out.push((sample.at, status)),
        }
    }

    Some(out)
}

/// Map a gauge value to a binary status.
pub(crate) fn status_of(value: f64) -> Option<u8> {
    if value == 1.0 {
        Some(1)
    } else if value == 0.0 {
        Some(0)
    } else {
        None
    }
}
