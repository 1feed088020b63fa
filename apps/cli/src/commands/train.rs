//! Training command implementation.

use crate::commands::teacher::load_teacher;
use crate::commands::types::TrainArgs;
use crate::config::{self, ResolvedConfig};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use colored::Colorize;
use kdtrain_backend::{CosineAnnealingLr, CrossEntropy, InMemoryDataset, KnowledgeDistillation, Mlp, Sgd};
use kdtrain_training::{
    make_artifact, ArtifactKind, BatchSource, CheckpointManager, CompressionHooks, FanoutProgressSink,
    LogProgressSink, Model, PlainTraining, RunLayout, RunManifest, ScalarLogSink, TrainingOptions,
    TrainingOrchestrator, TrainingSession,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

pub fn execute(args: TrainArgs) -> Result<()> {
    let ResolvedConfig { optimizer: sgd_config, distillation } = config::resolve(&args)?;
    let options = TrainingOptions { epochs: args.epochs, start_epoch: args.start_epoch, print_freq: args.print_freq };
    options.validate()?;

    let mut train_data = InMemoryDataset::open(&args.dataset.join("train.jsonl"), args.batch_size)
        .context("Failed to load training split")?
        .shuffled(args.seed)
        .with_workers(args.workers);
    let mut val_data = InMemoryDataset::open(&args.dataset.join("val.jsonl"), args.batch_size)
        .context("Failed to load validation split")?
        .with_workers(args.workers);

    let features = train_data.num_features();
    if val_data.num_features() != features {
        bail!(
            "train split has {} features per record but val split has {}",
            features,
            val_data.num_features()
        );
    }
    let classes = train_data.num_classes().max(val_data.num_classes());

    let mut rng = StdRng::seed_from_u64(args.seed);
    info!("=> creating model '{}'", args.arch);
    let mut student = Mlp::new(args.arch, features, classes, &mut rng)?;

    let mut hooks: Box<dyn CompressionHooks> = if args.distillation {
        let Some(path) = &args.teacher_checkpoint else {
            bail!("--distillation requires --teacher-checkpoint (train the teacher with `kdtrain-cli train` first)");
        };
        info!("=> using pre-trained teacher model '{}'", args.teacher);
        let teacher = load_teacher(args.teacher, path, features, classes, &mut rng)?;
        info!("Number of teacher model parameters: {}", teacher.num_parameters());
        Box::new(KnowledgeDistillation::new(Box::new(teacher), distillation)?)
    } else {
        if args.teacher_checkpoint.is_some() {
            warn!("--teacher-checkpoint is ignored without --distillation");
        }
        Box::new(PlainTraining)
    };
    info!("Number of student model parameters: {}", student.num_parameters());

    let run_id = args.run_id.clone().unwrap_or_else(|| args.arch.to_string());
    let layout = RunLayout::for_run(&args.output_dir, &run_id);
    let mut sink = FanoutProgressSink::new().with(LogProgressSink);
    if args.scalars {
        let scalars = ScalarLogSink::create(&layout.scalars_path())
            .with_context(|| format!("Failed to open scalar log: {}", layout.scalars_path().display()))?;
        sink = sink.with(scalars);
    }
    let checkpoints = CheckpointManager::new(layout.clone());
    let orchestrator = TrainingOrchestrator::new(run_id.clone(), options, checkpoints, &sink)?.with_arch(args.arch.as_str());

    let mut optimizer = Sgd::new(sgd_config.clone())?;
    let batches_per_epoch = train_data.num_batches();
    let mut scheduler = CosineAnnealingLr::new(sgd_config.lr, batches_per_epoch * args.epochs)?;

    let start = {
        let mut session = TrainingSession {
            model: &mut student,
            criterion: &CrossEntropy,
            optimizer: &mut optimizer,
            scheduler: &mut scheduler,
            hooks: hooks.as_mut(),
        };
        orchestrator.resume(args.resume.as_deref(), &mut session)?
    };
    if start.start_epoch > 0 {
        scheduler.fast_forward(start.start_epoch * batches_per_epoch, &mut optimizer);
    }

    let mut session = TrainingSession {
        model: &mut student,
        criterion: &CrossEntropy,
        optimizer: &mut optimizer,
        scheduler: &mut scheduler,
        hooks: hooks.as_mut(),
    };
    let outcome = orchestrator
        .run(&mut session, &mut train_data, &mut val_data, &start)
        .context("Training run failed")?;

    let saved = hooks
        .save(&student, &args.output_model)
        .with_context(|| format!("Failed to save model to {}", args.output_model.display()))?;

    let mut artifacts = Vec::new();
    for path in saved {
        artifacts.push(make_artifact(ArtifactKind::Model, path)?);
    }
    for (kind, path) in [
        (ArtifactKind::LatestCheckpoint, layout.checkpoint_path()),
        (ArtifactKind::BestCheckpoint, layout.best_checkpoint_path()),
        (ArtifactKind::Scalars, layout.scalars_path()),
    ] {
        if path.is_file() {
            artifacts.push(make_artifact(kind, path)?);
        }
    }

    let manifest = RunManifest {
        run_id,
        created_at: Utc::now(),
        arch: args.arch.to_string(),
        teacher_arch: args.distillation.then(|| args.teacher.to_string()),
        compression: hooks.name().to_string(),
        epochs_completed: outcome.state.epoch,
        best_prec1: outcome.state.best_score,
        artifacts,
    };
    let manifest_path = manifest.write(&args.output_model)?;

    if args.json {
        let out = json!({
            "run_id": manifest.run_id,
            "epochs_completed": manifest.epochs_completed,
            "best_prec1": manifest.best_prec1,
            "resumed_from": start.resumed_from,
            "checkpoint": layout.checkpoint_path(),
            "manifest": manifest_path,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_summary(&manifest, &layout, &manifest_path, start.resumed_from.as_deref());
    Ok(())
}

fn print_summary(manifest: &RunManifest, layout: &RunLayout, manifest_path: &Path, resumed_from: Option<&Path>) {
    println!();
    println!("{}", "Training complete".bold().green());
    println!("  Run: {}", manifest.run_id.cyan());
    if let Some(path) = resumed_from {
        println!("  Resumed from: {}", path.display().to_string().dimmed());
    }
    println!("  Epochs: {}", manifest.epochs_completed);
    println!("  Best Prec@1: {}", format!("{:.3}", manifest.best_prec1).cyan());
    println!("  Checkpoint: {}", layout.checkpoint_path().display().to_string().dimmed());
    println!("  Manifest: {}", manifest_path.display().to_string().dimmed());
    println!();
}
