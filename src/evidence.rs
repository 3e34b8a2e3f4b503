//! Evidence artifacts
//!
//! Everything the run leaves behind for post-hoc verification lives in one
//! directory: the KPI snapshot, the decision trace, the watcher heartbeat and
//! trip snapshots, the run summary with a config fingerprint, and a manifest
//! hashing every other file. Point-in-time JSON artifacts are written
//! atomically (temp file, fsync, rename) so a crash never leaves a torn file.

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::common::errors::Result;
use crate::metrics::kpi::KpiSnapshot;

pub const KPI_FILE: &str = "kpi.json";
pub const DECISION_TRACE_FILE: &str = "decision_trace.json";
pub const HEARTBEAT_FILE: &str = "heartbeat.jsonl";
pub const WATCH_SUMMARY_FILE: &str = "watch_summary.json";
pub const STOP_REASON_FILE: &str = "stop_reason_snapshot.json";
pub const ENGINE_REPORT_FILE: &str = "engine_report.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// SHA-256 hex of a string
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fingerprint of a canonicalized config
///
/// Serializing through `serde_json::Value` sorts object keys, so the same
/// settings always hash the same regardless of field order in the source file.
pub fn config_fingerprint<T: Serialize>(config: &T) -> Result<String> {
    let value = serde_json::to_value(config)?;
    Ok(sha256_hex(&serde_json::to_string(&value)?))
}

/// Writer rooted at one run directory
#[derive(Debug, Clone)]
pub struct EvidenceWriter {
    dir: PathBuf,
}

impl EvidenceWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Atomic JSON write: temp file in the same directory, fsync, rename
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let target = self.path(name);
        let tmp = self.path(&format!(".{name}.tmp"));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    /// Append one line to a JSONL artifact
    pub fn append_jsonl(&self, name: &str, value: &serde_json::Value) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name))?;
        writeln!(file, "{value}")?;
        Ok(())
    }

    pub fn write_kpi(&self, snapshot: &KpiSnapshot) -> Result<()> {
        self.write_json(KPI_FILE, snapshot)
    }

    /// Gate-breakdown counts plus latency percentiles
    pub fn write_decision_trace(&self, snapshot: &KpiSnapshot) -> Result<()> {
        let trace = serde_json::json!({
            "generated_at": Utc::now().to_rfc3339(),
            "opportunities": snapshot.opportunities,
            "intents": snapshot.intents,
            "executions": snapshot.executions,
            "closed_trades": snapshot.closed_trades,
            "reject_total": snapshot.reject_total,
            "gates": snapshot.reject_reasons,
            "tick_latency_ms": {
                "count": snapshot.tick_latency.count,
                "p50": snapshot.tick_latency.p50_ms,
                "p90": snapshot.tick_latency.p90_ms,
                "p99": snapshot.tick_latency.p99_ms,
                "max": snapshot.tick_latency.max_ms,
            },
        });
        self.write_json(DECISION_TRACE_FILE, &trace)
    }

    /// One heartbeat line per watcher poll, appended regardless of trip state
    pub fn append_heartbeat(&self, snapshot: &KpiSnapshot, tripped: bool) -> Result<()> {
        let line = serde_json::json!({
            "ts": Utc::now().to_rfc3339(),
            "uptime_secs": snapshot.uptime_secs,
            "closed_trades": snapshot.closed_trades,
            "net_pnl_total": snapshot.net_pnl_total,
            "reject_total": snapshot.reject_total,
            "tripped": tripped,
        });
        self.append_jsonl(HEARTBEAT_FILE, &line)
    }

    pub fn write_watch_summary(
        &self,
        expected_duration_secs: f64,
        wallclock_secs: f64,
        stop_reason: Option<&str>,
    ) -> Result<()> {
        let completeness = if expected_duration_secs > 0.0 {
            (wallclock_secs / expected_duration_secs).min(1.0)
        } else {
            1.0
        };
        let summary = serde_json::json!({
            "generated_at": Utc::now().to_rfc3339(),
            "expected_duration_secs": expected_duration_secs,
            "wallclock_secs": wallclock_secs,
            "completeness_ratio": completeness,
            "stop_reason": stop_reason,
        });
        self.write_json(WATCH_SUMMARY_FILE, &summary)
    }

    /// Manifest of every artifact in the directory with its SHA-256,
    /// excluding the manifest itself
    pub fn write_manifest(&self) -> Result<()> {
        let mut files = Vec::new();
        let mut entries: Vec<_> = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == MANIFEST_FILE || name.starts_with('.') {
                continue;
            }
            if !entry.file_type()?.is_file() {
                continue;
            }
            let contents = fs::read(entry.path())?;
            let mut hasher = Sha256::new();
            hasher.update(&contents);
            files.push(serde_json::json!({
                "name": name,
                "bytes": contents.len(),
                "sha256": hex::encode(hasher.finalize()),
            }));
        }
        let manifest = serde_json::json!({
            "generated_at": Utc::now().to_rfc3339(),
            "files": files,
        });
        self.write_json(MANIFEST_FILE, &manifest)
    }
}
