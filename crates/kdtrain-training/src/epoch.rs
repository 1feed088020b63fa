use crate::accuracy::top1_accuracy;
use crate::batch::{Batch, BatchSource};
use crate::error::{TrainingError, TrainingResult};
use crate::hooks::CompressionHooks;
use crate::meter::MetricAccumulator;
use crate::model::{Criterion, LrScheduler, Model, Optimizer};
use crate::progress::{ProgressEvent, ProgressSink};
use std::time::Instant;

/// The collaborators one training step needs, borrowed for the length of a run.
pub struct TrainingSession<'a> {
    pub model: &'a mut dyn Model,
    pub criterion: &'a dyn Criterion,
    pub optimizer: &'a mut dyn Optimizer,
    pub scheduler: &'a mut dyn LrScheduler,
    pub hooks: &'a mut dyn CompressionHooks,
}

/// Averages of one training pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub batches: usize,
    pub loss: f64,
    pub top1: f64,
    pub batch_time: f64,
    pub learning_rate: f64,
}

/// Runs a single pass over the training stream.
pub struct TrainEpochRunner<'a> {
    print_freq: usize,
    progress: &'a dyn ProgressSink,
}

impl<'a> TrainEpochRunner<'a> {
    #[must_use]
    pub fn new(print_freq: usize, progress: &'a dyn ProgressSink) -> Self {
        Self { print_freq: print_freq.max(1), progress }
    }

    pub fn run(
        &self,
        session: &mut TrainingSession<'_>,
        data: &mut dyn BatchSource,
        epoch: usize,
    ) -> TrainingResult<EpochStats> {
        let total = data.num_batches();
        let mut batch_time = MetricAccumulator::new();
        let mut losses = MetricAccumulator::new();
        let mut top1 = MetricAccumulator::new();
        let mut batches = 0;

        session.model.train_mode();

        let mut end = Instant::now();
        for (step, batch) in data.batches(epoch).enumerate() {
            let Batch { inputs, target } = batch?;
            if inputs.nrows() == 0 {
                return Err(TrainingError::EmptyBatch);
            }
            session.hooks.on_step_begin(step);

            let labels = target.labels();
            let outputs = session.model.forward(inputs.view())?;
            let loss = session.criterion.compute(outputs.view(), labels)?;
            let loss = session.hooks.on_after_compute_loss(
                inputs.view(),
                outputs.view(),
                loss,
                target.teacher_logits(),
            )?;
            loss.ensure_finite()?;

            let prec1 = top1_accuracy(outputs.view(), labels)?;
            losses.update(f64::from(loss.value), inputs.nrows());
            top1.update(prec1, inputs.nrows());

            session.optimizer.zero_grad(&mut *session.model);
            session.model.backward(loss.grad.view())?;
            session.optimizer.step(&mut *session.model)?;
            session.scheduler.step(&mut *session.optimizer);

            batch_time.record(end.elapsed().as_secs_f64());
            end = Instant::now();
            session.hooks.on_step_end();
            batches += 1;

            if step % self.print_freq == 0 {
                self.progress.on_event(&ProgressEvent::TrainStep {
                    epoch,
                    step,
                    total,
                    batch_time: batch_time.snapshot(),
                    loss: losses.snapshot(),
                    top1: top1.snapshot(),
                    lr: session.scheduler.last_lr(),
                });
            }
        }

        Ok(EpochStats {
            epoch,
            batches,
            loss: losses.average(),
            top1: top1.average(),
            batch_time: batch_time.average(),
            learning_rate: session.scheduler.last_lr(),
        })
    }
}
