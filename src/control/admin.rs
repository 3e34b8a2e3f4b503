//! Admin control state machine
//!
//! Mode transitions are strict: pause only from RUNNING, resume only from
//! PAUSED, and the two panic modes are terminal and never reversible. The
//! symbol blacklist is orthogonal to mode and survives every transition.
//! Every command, including rejected ones, appends an audit record; that
//! trail is the sole source of truth for who changed what, when.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::common::errors::{EngineError, Result};

/// Run modes of the engine as seen by operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    Running,
    Paused,
    Stopping,
    Panic,
    EmergencyClose,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::Running => "running",
            ControlMode::Paused => "paused",
            ControlMode::Stopping => "stopping",
            ControlMode::Panic => "panic",
            ControlMode::EmergencyClose => "emergency_close",
        }
    }

    /// Terminal modes can never be left
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControlMode::Panic | ControlMode::EmergencyClose)
    }
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operator commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "command", content = "arg")]
pub enum ControlCommand {
    Pause,
    Resume,
    Stop,
    Panic,
    EmergencyClose,
    BlacklistAdd(String),
    BlacklistRemove(String),
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::Pause => "pause",
            ControlCommand::Resume => "resume",
            ControlCommand::Stop => "stop",
            ControlCommand::Panic => "panic",
            ControlCommand::EmergencyClose => "emergency_close",
            ControlCommand::BlacklistAdd(_) => "blacklist_add",
            ControlCommand::BlacklistRemove(_) => "blacklist_remove",
        }
    }
}

/// Persisted control state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub mode: ControlMode,
    pub blacklist: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl ControlState {
    pub fn new() -> Self {
        Self {
            mode: ControlMode::Running,
            blacklist: BTreeSet::new(),
            updated_at: Utc::now(),
        }
    }

    /// Apply a command, mutating only on success
    ///
    /// Returns the mode before the command. Invalid transitions error and
    /// leave the state untouched, blacklist included.
    pub fn apply(&mut self, command: &ControlCommand) -> Result<ControlMode> {
        let before = self.mode;
        let next = match command {
            ControlCommand::Pause => match self.mode {
                ControlMode::Running => Some(ControlMode::Paused),
                _ => None,
            },
            ControlCommand::Resume => match self.mode {
                ControlMode::Paused => Some(ControlMode::Running),
                _ => None,
            },
            ControlCommand::Stop => {
                if self.mode.is_terminal() {
                    None
                } else {
                    Some(ControlMode::Stopping)
                }
            }
            ControlCommand::Panic => {
                if self.mode.is_terminal() {
                    None
                } else {
                    Some(ControlMode::Panic)
                }
            }
            ControlCommand::EmergencyClose => {
                if self.mode.is_terminal() {
                    None
                } else {
                    Some(ControlMode::EmergencyClose)
                }
            }
            ControlCommand::BlacklistAdd(symbol) => {
                self.blacklist.insert(symbol.clone());
                self.updated_at = Utc::now();
                return Ok(before);
            }
            ControlCommand::BlacklistRemove(symbol) => {
                self.blacklist.remove(symbol);
                self.updated_at = Utc::now();
                return Ok(before);
            }
        };

        match next {
            Some(mode) => {
                self.mode = mode;
                self.updated_at = Utc::now();
                Ok(before)
            }
            None => Err(EngineError::InvalidTransition {
                command: command.name().to_string(),
                from: before.as_str().to_string(),
            }),
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

/// One audit line; the trail is append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub ts: DateTime<Utc>,
    pub actor: String,
    pub reason: String,
    pub command: String,
    pub accepted: bool,
    pub before: ControlMode,
    pub after: ControlMode,
    pub error: Option<String>,
}

/// Result handed back to the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub status: String,
    pub before: ControlMode,
    pub after: ControlMode,
}

/// File-backed control store: JSON state plus JSONL audit
///
/// A deployment would point both paths at shared storage; the engine only
/// ever goes through this type.
#[derive(Debug, Clone)]
pub struct ControlStore {
    state_path: PathBuf,
    audit_path: PathBuf,
}

impl ControlStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            state_path: dir.join("control_state.json"),
            audit_path: dir.join("control_audit.jsonl"),
        })
    }

    /// Load current state; a missing file means a fresh RUNNING state
    pub fn load(&self) -> Result<ControlState> {
        if !self.state_path.exists() {
            return Ok(ControlState::new());
        }
        let raw = fs::read_to_string(&self.state_path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, state: &ControlState) -> Result<()> {
        let tmp = self.state_path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(state)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.state_path)?;
        Ok(())
    }

    fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    /// Apply a command and audit it, accepted or not
    pub fn apply(
        &self,
        command: ControlCommand,
        actor: &str,
        reason: &str,
    ) -> Result<CommandOutcome> {
        let mut state = self.load()?;
        let before = state.mode;
        let result = state.apply(&command);

        let record = AuditRecord {
            ts: Utc::now(),
            actor: actor.to_string(),
            reason: reason.to_string(),
            command: command.name().to_string(),
            accepted: result.is_ok(),
            before,
            after: state.mode,
            error: result.as_ref().err().map(|e| e.to_string()),
        };
        self.append_audit(&record)?;

        match result {
            Ok(_) => {
                self.save(&state)?;
                Ok(CommandOutcome {
                    status: "ok".to_string(),
                    before,
                    after: state.mode,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn audit_path(&self) -> &Path {
        &self.audit_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> ControlStore {
        let dir = std::env::temp_dir().join(format!(
            "crossarb-control-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        ControlStore::new(dir).unwrap()
    }

    #[test]
    fn test_pause_resume_cycle() {
        let mut state = ControlState::new();
        state.apply(&ControlCommand::Pause).unwrap();
        assert_eq!(state.mode, ControlMode::Paused);
        state.apply(&ControlCommand::Resume).unwrap();
        assert_eq!(state.mode, ControlMode::Running);
    }

    #[test]
    fn test_pause_from_panic_errors_without_mutation() {
        let mut state = ControlState::new();
        state.apply(&ControlCommand::Panic).unwrap();

        let err = state.apply(&ControlCommand::Pause).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(state.mode, ControlMode::Panic);
    }

    #[test]
    fn test_resume_only_from_paused() {
        let mut state = ControlState::new();
        assert!(state.apply(&ControlCommand::Resume).is_err());
        assert_eq!(state.mode, ControlMode::Running);

        state.apply(&ControlCommand::Stop).unwrap();
        assert!(state.apply(&ControlCommand::Resume).is_err());
        assert_eq!(state.mode, ControlMode::Stopping);
    }

    #[test]
    fn test_terminal_modes_are_irreversible() {
        let mut state = ControlState::new();
        state.apply(&ControlCommand::EmergencyClose).unwrap();
        assert!(state.apply(&ControlCommand::Stop).is_err());
        assert!(state.apply(&ControlCommand::Panic).is_err());
        assert!(state.apply(&ControlCommand::Resume).is_err());
        assert_eq!(state.mode, ControlMode::EmergencyClose);
    }

    #[test]
    fn test_blacklist_survives_mode_transitions() {
        let mut state = ControlState::new();
        state
            .apply(&ControlCommand::BlacklistAdd("DOGE".to_string()))
            .unwrap();
        state.apply(&ControlCommand::Pause).unwrap();
        state.apply(&ControlCommand::Resume).unwrap();
        assert!(state.blacklist.contains("DOGE"));

        state
            .apply(&ControlCommand::BlacklistRemove("DOGE".to_string()))
            .unwrap();
        assert!(state.blacklist.is_empty());
    }

    #[test]
    fn test_blacklist_mutates_in_any_mode() {
        let mut state = ControlState::new();
        state.apply(&ControlCommand::Panic).unwrap();
        state
            .apply(&ControlCommand::BlacklistAdd("BTC".to_string()))
            .unwrap();
        assert!(state.blacklist.contains("BTC"));
        assert_eq!(state.mode, ControlMode::Panic);
    }

    #[test]
    fn test_store_roundtrip_and_audit() {
        let store = temp_store("roundtrip");
        let outcome = store
            .apply(ControlCommand::Pause, "ops", "maintenance window")
            .unwrap();
        assert_eq!(outcome.status, "ok");
        assert_eq!(outcome.before, ControlMode::Running);
        assert_eq!(outcome.after, ControlMode::Paused);

        // State survives a fresh load
        assert_eq!(store.load().unwrap().mode, ControlMode::Paused);

        // Rejected command still audited, state unchanged
        assert!(store
            .apply(ControlCommand::Pause, "ops", "double pause")
            .is_err());
        assert_eq!(store.load().unwrap().mode, ControlMode::Paused);

        let audit = fs::read_to_string(store.audit_path()).unwrap();
        let lines: Vec<&str> = audit.lines().collect();
        assert_eq!(lines.len(), 2);
        let rejected: AuditRecord = serde_json::from_str(lines[1]).unwrap();
        assert!(!rejected.accepted);
        assert_eq!(rejected.before, ControlMode::Paused);
        assert_eq!(rejected.after, ControlMode::Paused);
        assert!(rejected.error.is_some());
    }
}
