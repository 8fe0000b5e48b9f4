use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use exechijack_common::{HijackEvent, ProgramName};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

pub const DEFAULT_MAX_REPORTS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HijackReport {
    /// Receive order. The ring buffer records carry no sequence number of their own.
    pub seq: u64,
    pub pid: u32,
    pub success: bool,
    /// Path the caller asked to execute, before the rewrite.
    pub requested: String,
    pub received_at: DateTime<Utc>,
}

impl HijackReport {
    pub fn from_event(seq: u64, event: &HijackEvent, received_at: DateTime<Utc>) -> Self {
        let requested = ProgramName::from_bytes(event.comm);
        HijackReport {
            seq,
            pid: event.pid,
            success: event.success,
            requested: String::from_utf8_lossy(requested.trimmed()).into_owned(),
            received_at,
        }
    }
}

// Shared between the ring buffer drain and the HTTP handlers
#[derive(Clone)]
pub struct ReportStorage {
    // Bounded FIFO, oldest first
    reports: Arc<RwLock<VecDeque<HijackReport>>>,
    // Per-PID index for quick lookups
    pid_reports: Arc<DashMap<u32, Vec<HijackReport>>>,
    next_seq: Arc<AtomicU64>,
    capacity: usize,
}

impl ReportStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            reports: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            pid_reports: Arc::new(DashMap::new()),
            next_seq: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// Converts `event` into a report stamped with the next sequence number and stores it.
    pub async fn record(&self, event: &HijackEvent) -> HijackReport {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let report = HijackReport::from_event(seq, event, Utc::now());
        self.add_report(report.clone()).await;
        report
    }

    pub async fn add_report(&self, report: HijackReport) {
        if self.capacity == 0 {
            return;
        }
        let mut reports = self.reports.write().await;

        if reports.len() >= self.capacity {
            if let Some(removed) = reports.pop_front() {
                if let Some(mut pid_vec) = self.pid_reports.get_mut(&removed.pid) {
                    pid_vec.retain(|r| r.seq != removed.seq);
                    if pid_vec.is_empty() {
                        drop(pid_vec);
                        self.pid_reports.remove(&removed.pid);
                    }
                }
            }
        }

        reports.push_back(report.clone());

        self.pid_reports
            .entry(report.pid)
            .or_default()
            .push(report);
    }

    pub async fn get_all_reports(&self) -> Vec<HijackReport> {
        let reports = self.reports.read().await;
        reports.iter().cloned().collect()
    }

    pub fn get_reports_by_pid(&self, pid: u32) -> Vec<HijackReport> {
        self.pid_reports
            .get(&pid)
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

// HTTP API handlers
pub async fn get_all_hijacks(State(storage): State<ReportStorage>) -> Json<Vec<HijackReport>> {
    let reports = storage.get_all_reports().await;
    info!("Returning {} hijack reports", reports.len());
    Json(reports)
}

pub async fn get_hijacks_by_pid(
    Path(pid): Path<u32>,
    State(storage): State<ReportStorage>,
) -> Result<Json<Vec<HijackReport>>, StatusCode> {
    let reports = storage.get_reports_by_pid(pid);
    if reports.is_empty() {
        info!("No hijack reports for PID {}", pid);
        Err(StatusCode::NOT_FOUND)
    } else {
        info!("Returning {} hijack reports for PID {}", reports.len(), pid);
        Ok(Json(reports))
    }
}
