use crate::accuracy::top1_accuracy;
use crate::batch::BatchSource;
use crate::error::{TrainingError, TrainingResult};
use crate::meter::MetricAccumulator;
use crate::model::Model;
use crate::progress::{ProgressEvent, ProgressSink};
use std::time::Instant;

/// Scores the model on the validation stream without touching its weights.
pub struct ValidationRunner<'a> {
    print_freq: usize,
    progress: &'a dyn ProgressSink,
}

impl<'a> ValidationRunner<'a> {
    #[must_use]
    pub fn new(print_freq: usize, progress: &'a dyn ProgressSink) -> Self {
        Self { print_freq: print_freq.max(1), progress }
    }

    /// Returns the pass's average precision@1.
    pub fn run(&self, model: &mut dyn Model, data: &mut dyn BatchSource, epoch: usize) -> TrainingResult<f64> {
        model.eval_mode();
        let model: &dyn Model = &*model;

        let total = data.num_batches();
        let mut batch_time = MetricAccumulator::new();
        let mut top1 = MetricAccumulator::new();

        let mut end = Instant::now();
        for (step, batch) in data.batches(epoch).enumerate() {
            let batch = batch?;
            if batch.is_empty() {
                return Err(TrainingError::EmptyBatch);
            }

            let outputs = model.infer(batch.inputs.view())?;
            let prec1 = top1_accuracy(outputs.view(), batch.target.labels())?;
            top1.update(prec1, batch.len());

            batch_time.record(end.elapsed().as_secs_f64());
            end = Instant::now();

            if step % self.print_freq == 0 {
                self.progress.on_event(&ProgressEvent::ValidationStep {
                    epoch,
                    step,
                    total,
                    batch_time: batch_time.snapshot(),
                    top1: top1.snapshot(),
                });
            }
        }

        self.progress.on_event(&ProgressEvent::ValidationFinished { epoch, top1: top1.average() });
        Ok(top1.average())
    }
}
