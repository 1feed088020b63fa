use crate::meter::MeterSnapshot;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    RunStarted {
        run_id: String,
        start_epoch: usize,
        epochs: usize,
        best_score: f64,
    },
    TrainStep {
        epoch: usize,
        step: usize,
        total: usize,
        batch_time: MeterSnapshot,
        loss: MeterSnapshot,
        top1: MeterSnapshot,
        lr: f64,
    },
    ValidationStep {
        epoch: usize,
        step: usize,
        total: usize,
        batch_time: MeterSnapshot,
        top1: MeterSnapshot,
    },
    ValidationFinished {
        epoch: usize,
        top1: f64,
    },
    EpochFinished {
        epoch: usize,
        train_loss: f64,
        train_top1: f64,
        learning_rate: f64,
        val_top1: f64,
        is_best: bool,
        best_score: f64,
    },
    CheckpointSaved {
        epoch: usize,
        path: PathBuf,
        is_best: bool,
    },
    RunFinished {
        run_id: String,
        best_score: f64,
    },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Emits the classic `Epoch: [e][i/n] ...` progress lines through `tracing`.
#[derive(Debug, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { run_id, start_epoch, epochs, best_score } => {
                info!("[{run_id}] training epochs {start_epoch}..{epochs} (best Prec@1 {best_score:.3})");
            }
            ProgressEvent::TrainStep { epoch, step, total, batch_time, loss, top1, lr } => info!(
                "Epoch: [{epoch}][{step}/{total}]\tTime {:.3} ({:.3})\tLoss {:.4} ({:.4})\tPrec@1 {:.3} ({:.3})\tLR {lr:.6}",
                batch_time.value,
                batch_time.average,
                loss.value,
                loss.average,
                top1.value,
                top1.average
            ),
            ProgressEvent::ValidationStep { step, total, batch_time, top1, .. } => info!(
                "Test: [{step}/{total}]\tTime {:.3} ({:.3})\tPrec@1 {:.3} ({:.3})",
                batch_time.value,
                batch_time.average,
                top1.value,
                top1.average
            ),
            ProgressEvent::ValidationFinished { top1, .. } => info!(" * Prec@1 {top1:.3}"),
            ProgressEvent::EpochFinished { epoch, is_best: true, best_score, .. } => {
                info!("epoch {epoch}: new best Prec@1 {best_score:.3}");
            }
            ProgressEvent::EpochFinished { .. } => {}
            ProgressEvent::CheckpointSaved { path, .. } => info!("=> saved checkpoint '{}'", path.display()),
            ProgressEvent::RunFinished { run_id, best_score } => {
                info!("[{run_id}] finished, best Prec@1 {best_score:.3}");
            }
        }
    }
}

/// One scalar sample in a run's `scalars.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarRecord {
    pub tag: String,
    pub value: f64,
    pub step: usize,
}

/// Appends per-epoch scalars (`train_loss`, `train_acc`, `learning_rate`,
/// `val_acc`) to a JSONL file.
#[derive(Debug)]
pub struct ScalarLogSink {
    file: Mutex<File>,
}

impl ScalarLogSink {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }

    fn write(&self, records: &[ScalarRecord]) {
        let Ok(mut file) = self.file.lock() else {
            warn!("scalar log lock is poisoned; dropping {} scalars", records.len());
            return;
        };
        for record in records {
            let line = match serde_json::to_string(record) {
                Ok(line) => line,
                Err(e) => {
                    warn!("failed to encode scalar {}: {e}", record.tag);
                    continue;
                }
            };
            if let Err(e) = writeln!(file, "{line}") {
                warn!("failed to write scalar log: {e}");
                return;
            }
        }
    }
}

impl ProgressSink for ScalarLogSink {
    fn on_event(&self, event: &ProgressEvent) {
        if let ProgressEvent::EpochFinished { epoch, train_loss, train_top1, learning_rate, val_top1, .. } = event {
            let scalar = |tag: &str, value: f64, step: usize| ScalarRecord { tag: tag.to_string(), value, step };
            self.write(&[
                scalar("val_acc", *val_top1, epoch + 1),
                scalar("train_loss", *train_loss, *epoch),
                scalar("train_acc", *train_top1, *epoch),
                scalar("learning_rate", *learning_rate, *epoch),
            ]);
        }
    }
}

/// Forwards every event to each inner sink in order.
#[derive(Default)]
pub struct FanoutProgressSink {
    sinks: Vec<Box<dyn ProgressSink>>,
}

impl FanoutProgressSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl ProgressSink for FanoutProgressSink {
    fn on_event(&self, event: &ProgressEvent) {
        for sink in &self.sinks {
            sink.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn epoch_finished(epoch: usize) -> ProgressEvent {
        ProgressEvent::EpochFinished {
            epoch,
            train_loss: 0.75,
            train_top1: 60.0,
            learning_rate: 0.001,
            val_top1: 55.0,
            is_best: true,
            best_score: 55.0,
        }
    }

    #[test]
    fn test_scalar_log_records_epoch_scalars() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("runs").join("r").join("scalars.jsonl");
        let sink = ScalarLogSink::create(&path).unwrap();

        sink.on_event(&ProgressEvent::ValidationFinished { epoch: 0, top1: 1.0 });
        sink.on_event(&epoch_finished(2));

        let records: Vec<ScalarRecord> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0], ScalarRecord { tag: "val_acc".to_string(), value: 55.0, step: 3 });
        assert!(records.iter().any(|r| r.tag == "learning_rate" && r.step == 2));
    }

    #[test]
    fn test_scalar_log_drops_records_when_lock_is_poisoned() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scalars.jsonl");
        let sink = ScalarLogSink::create(&path).unwrap();

        let poisoned = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = sink.file.lock().unwrap();
                panic!("writer died");
            })
            .join()
        });
        assert!(poisoned.is_err());
        assert!(sink.file.is_poisoned());

        sink.on_event(&epoch_finished(0));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(epoch_finished(1)).unwrap();
        assert_eq!(json["type"], "epoch_finished");
        assert_eq!(json["is_best"], true);
    }
}
