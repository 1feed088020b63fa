//! Synthetic dataset command implementation.

use crate::commands::teacher::load_teacher;
use crate::commands::types::SynthArgs;
use anyhow::{Context, Result};
use colored::Colorize;
use kdtrain_backend::{attach_teacher_logits, generate_blobs, write_records, BlobSpec};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

pub fn execute(args: SynthArgs) -> Result<()> {
    let spec = BlobSpec {
        classes: args.classes,
        features: args.features,
        train_per_class: args.train_per_class,
        val_per_class: args.val_per_class,
        spread: args.spread,
        seed: args.seed,
    };
    let mut splits = generate_blobs(&spec)?;

    if let Some(path) = &args.teacher_checkpoint {
        let mut rng = StdRng::seed_from_u64(spec.seed);
        let teacher = load_teacher(args.teacher, path, spec.features, spec.classes, &mut rng)?;
        info!("=> attaching logits from teacher '{}' ({})", args.teacher, path.display());
        attach_teacher_logits(&teacher, &mut splits.train)?;
        attach_teacher_logits(&teacher, &mut splits.val)?;
    }

    let train_path = args.output.join("train.jsonl");
    let val_path = args.output.join("val.jsonl");
    write_records(&train_path, &splits.train)
        .with_context(|| format!("Failed to write {}", train_path.display()))?;
    write_records(&val_path, &splits.val).with_context(|| format!("Failed to write {}", val_path.display()))?;

    println!();
    println!("{}", "Synthetic dataset written".bold().green());
    println!("  Train: {} ({} records)", train_path.display().to_string().cyan(), splits.train.len());
    println!("  Val:   {} ({} records)", val_path.display().to_string().cyan(), splits.val.len());
    println!("  Classes: {}  Features: {}", spec.classes, spec.features);
    println!();
    Ok(())
}
