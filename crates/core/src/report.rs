//! Collects the results players send back, grouped by trial, phase and
//! worker, and renders them as JSON or a plain-text summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::debug;
use utoipa::ToSchema;

use crate::domain::RetVal;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Json,
    #[default]
    Text,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }

    /// Anything other than `json` selects the text format.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ReportMetadata {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_trials: u32,
    pub total_workers: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ResultRecord {
    pub timestamp: DateTime<Utc>,
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct WorkerRecord {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub results: Vec<ResultRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PhaseRecord {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub workers: Vec<WorkerRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct TrialRecord {
    pub trial_number: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub phases: Vec<PhaseRecord>,
}

/// Result report for a run of trials.
///
/// Recording is tolerant: a call that needs an open trial, phase or worker
/// is ignored when there is none. Ending a phase also closes its worker,
/// and ending a trial closes both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub trials: Vec<TrialRecord>,
    #[serde(skip)]
    current_trial: Option<TrialRecord>,
    #[serde(skip)]
    current_phase: Option<usize>,
    #[serde(skip)]
    current_worker: Option<usize>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            metadata: ReportMetadata {
                start_time: Utc::now(),
                end_time: None,
                total_trials: 0,
                total_workers: 0,
            },
            trials: Vec::new(),
            current_trial: None,
            current_phase: None,
            current_worker: None,
        }
    }

    pub fn start_trials(&mut self, total_trials: u32, total_workers: u32) {
        self.metadata.total_trials = total_trials;
        self.metadata.total_workers = total_workers;
    }

    pub fn start_trial(&mut self, trial_number: u32) {
        debug!(trial = trial_number, "Starting trial");
        self.current_trial = Some(TrialRecord {
            trial_number,
            start_time: Utc::now(),
            end_time: None,
            phases: Vec::new(),
        });
        self.current_phase = None;
        self.current_worker = None;
    }

    pub fn end_trial(&mut self) {
        let Some(mut trial) = self.current_trial.take() else {
            debug!("end_trial called with no open trial");
            return;
        };
        trial.end_time = Some(Utc::now());
        self.trials.push(trial);
        self.current_phase = None;
        self.current_worker = None;
    }

    /// Open a phase in the current trial. Starting a phase name that was
    /// already recorded in this trial starts it over.
    pub fn start_phase(&mut self, name: &str) {
        let Some(trial) = self.current_trial.as_mut() else {
            debug!(phase = name, "start_phase called with no open trial");
            return;
        };
        let record = PhaseRecord {
            name: name.to_string(),
            start_time: Utc::now(),
            end_time: None,
            workers: Vec::new(),
        };
        let index = match trial.phases.iter().position(|p| p.name == name) {
            Some(index) => {
                trial.phases[index] = record;
                index
            }
            None => {
                trial.phases.push(record);
                trial.phases.len() - 1
            }
        };
        self.current_phase = Some(index);
        self.current_worker = None;
    }

    pub fn end_phase(&mut self) {
        if let Some(phase) = self.phase_mut() {
            phase.end_time = Some(Utc::now());
        }
        self.current_phase = None;
        self.current_worker = None;
    }

    pub fn start_worker(&mut self, name: &str) {
        let Some(phase) = self.phase_mut() else {
            debug!(worker = name, "start_worker called with no open phase");
            return;
        };
        let record = WorkerRecord {
            name: name.to_string(),
            start_time: Utc::now(),
            end_time: None,
            results: Vec::new(),
        };
        let index = match phase.workers.iter().position(|w| w.name == name) {
            Some(index) => {
                phase.workers[index] = record;
                index
            }
            None => {
                phase.workers.push(record);
                phase.workers.len() - 1
            }
        };
        self.current_worker = Some(index);
    }

    pub fn end_worker(&mut self) {
        if let Some(worker) = self.worker_mut() {
            worker.end_time = Some(Utc::now());
        }
        self.current_worker = None;
    }

    pub fn add_result(&mut self, result: &RetVal) {
        let Some(worker) = self.worker_mut() else {
            debug!(code = result.code, "add_result called with no open worker");
            return;
        };
        worker.results.push(ResultRecord {
            timestamp: Utc::now(),
            code: result.code,
            message: result.message.clone(),
        });
    }

    /// Stamp the end time. Call once every trial has ended.
    pub fn finalize(&mut self) {
        self.metadata.end_time = Some(Utc::now());
        debug!(trials = self.trials.len(), "Report finalized");
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            ReportFormat::Text => Ok(self.render_text()),
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let time = |t: Option<DateTime<Utc>>| t.map_or_else(|| "-".to_string(), |t| t.to_rfc3339());

        // Writing to a String cannot fail.
        let _ = writeln!(out, "Conductor Test Results");
        let _ = writeln!(out, "=====================");
        let _ = writeln!(out);
        let _ = writeln!(out, "Start Time: {}", self.metadata.start_time.to_rfc3339());
        let _ = writeln!(out, "End Time: {}", time(self.metadata.end_time));
        let _ = writeln!(out, "Total Trials: {}", self.metadata.total_trials);
        let _ = writeln!(out, "Total Workers: {}", self.metadata.total_workers);
        let _ = writeln!(out);

        for trial in &self.trials {
            let _ = writeln!(out, "Trial {}:", trial.trial_number);
            for phase in &trial.phases {
                let _ = writeln!(out, "  Phase: {}", phase.name);
                for worker in &phase.workers {
                    let _ = writeln!(out, "    Worker: {}", worker.name);
                    let _ = writeln!(out, "      Results: {}", worker.results.len());
                    for result in &worker.results {
                        let _ = writeln!(
                            out,
                            "        Code: {}, Message: {}",
                            result.code, result.message
                        );
                    }
                }
            }
        }
        out
    }

    fn phase_mut(&mut self) -> Option<&mut PhaseRecord> {
        let index = self.current_phase?;
        self.current_trial.as_mut()?.phases.get_mut(index)
    }

    fn worker_mut(&mut self) -> Option<&mut WorkerRecord> {
        let index = self.current_worker?;
        self.phase_mut()?.workers.get_mut(index)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

/// One-line form of a result as printed while results stream in.
pub fn result_line(result: &RetVal) -> String {
    if result.is_done() || (result.is_ok() && result.message.eq_ignore_ascii_case("done")) {
        "done".to_string()
    } else {
        format!("{} {}", result.code, result.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_result_report() -> Report {
        let mut report = Report::new();
        report.start_trials(1, 1);
        report.start_trial(1);
        report.start_phase("startup");
        report.start_worker("client1");
        report.add_result(&RetVal::ok("Started"));
        report.end_worker();
        report.end_phase();
        report.end_trial();
        report.finalize();
        report
    }

    #[test]
    fn test_report_records_nested_results() {
        let report = single_result_report();

        assert_eq!(report.metadata.total_trials, 1);
        assert!(report.metadata.end_time.is_some());
        assert_eq!(report.trials.len(), 1);

        let trial = &report.trials[0];
        assert_eq!(trial.trial_number, 1);
        assert!(trial.end_time.is_some());
        assert_eq!(trial.phases[0].name, "startup");
        assert!(trial.phases[0].end_time.is_some());

        let worker = &trial.phases[0].workers[0];
        assert_eq!(worker.name, "client1");
        assert!(worker.end_time.is_some());
        assert_eq!(worker.results[0].code, 0);
        assert_eq!(worker.results[0].message, "Started");
    }

    #[test]
    fn test_calls_without_context_are_ignored() {
        let mut report = Report::new();
        report.start_phase("startup");
        report.start_worker("client1");
        report.add_result(&RetVal::ok("lost"));
        report.end_worker();
        report.end_phase();
        report.end_trial();

        assert!(report.trials.is_empty());
    }

    #[test]
    fn test_result_after_phase_end_is_ignored() {
        let mut report = Report::new();
        report.start_trial(1);
        report.start_phase("run");
        report.start_worker("w");
        report.end_phase();
        report.add_result(&RetVal::ok("late"));
        report.end_trial();

        assert!(report.trials[0].phases[0].workers[0].results.is_empty());
    }

    #[test]
    fn test_phases_keep_order_and_restart_by_name() {
        let mut report = Report::new();
        report.start_trial(1);
        for name in ["startup", "run", "collect"] {
            report.start_phase(name);
            report.end_phase();
        }
        report.start_phase("run");
        report.start_worker("w");
        report.add_result(&RetVal::ok("again"));
        report.end_trial();

        let names: Vec<&str> = report.trials[0].phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["startup", "run", "collect"]);
        assert_eq!(report.trials[0].phases[1].workers[0].results.len(), 1);
    }

    #[test]
    fn test_worker_restarts_in_place_by_name() {
        let mut report = Report::new();
        report.start_trial(1);
        report.start_phase("run");
        report.start_worker("client1");
        report.add_result(&RetVal::ok("first"));
        report.end_worker();
        report.start_worker("client2");
        report.add_result(&RetVal::ok("other"));
        report.end_worker();

        report.start_worker("client1");
        report.add_result(&RetVal::error("retry"));
        report.end_trial();

        let workers = &report.trials[0].phases[0].workers;
        let names: Vec<&str> = workers.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["client1", "client2"]);
        assert_eq!(workers[0].results.len(), 1);
        assert_eq!(workers[0].results[0].message, "retry");
        assert!(workers[0].end_time.is_none());
        assert_eq!(workers[1].results[0].message, "other");
    }

    #[test]
    fn test_render_json() {
        let report = single_result_report();
        let json = report.render(ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["total_workers"], 1);
        assert_eq!(value["trials"][0]["phases"][0]["name"], "startup");
        assert_eq!(
            value["trials"][0]["phases"][0]["workers"][0]["results"][0]["message"],
            "Started"
        );
        assert!(value.get("current_trial").is_none());
    }

    #[test]
    fn test_render_text() {
        let report = single_result_report();
        let text = report.render(ReportFormat::Text).unwrap();

        assert!(text.starts_with("Conductor Test Results\n"));
        assert!(text.contains("Total Trials: 1"));
        assert!(text.contains("Trial 1:"));
        assert!(text.contains("  Phase: startup"));
        assert!(text.contains("    Worker: client1"));
        assert!(text.contains("      Results: 1"));
        assert!(text.contains("        Code: 0, Message: Started"));
    }

    #[test]
    fn test_report_format_parse() {
        assert_eq!(ReportFormat::parse("JSON"), ReportFormat::Json);
        assert_eq!(ReportFormat::parse("text"), ReportFormat::Text);
        assert_eq!(ReportFormat::parse("xml"), ReportFormat::Text);
    }

    #[test]
    fn test_result_line() {
        assert_eq!(result_line(&RetVal::done()), "done");
        assert_eq!(result_line(&RetVal::ok("Done")), "done");
        assert_eq!(result_line(&RetVal::error("boom")), "1 boom");
    }
}
