//! Checkpoint inspection command implementation.

use crate::commands::types::InspectArgs;
use anyhow::{Context, Result};
use colored::Colorize;
use kdtrain_training::CheckpointManager;
use serde_json::json;

pub fn execute(args: InspectArgs) -> Result<()> {
    let record = CheckpointManager::load(&args.checkpoint)
        .with_context(|| format!("Failed to load checkpoint: {}", args.checkpoint.display()))?;

    if args.json {
        let tensors: Vec<_> = record
            .state_dict
            .iter()
            .map(|(name, tensor)| json!({ "name": name, "shape": tensor.shape }))
            .collect();
        let out = json!({
            "path": args.checkpoint,
            "epoch": record.epoch,
            "best_prec1": record.best_prec1,
            "arch": record.arch,
            "saved_at": record.saved_at,
            "num_parameters": record.num_parameters(),
            "has_optimizer_state": record.optimizer.is_some(),
            "tensors": tensors,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Checkpoint {}", args.checkpoint.display()).bold().cyan());
    println!();
    println!("  Arch:        {}", record.arch.as_deref().unwrap_or("unknown").cyan());
    println!("  Next epoch:  {}", record.epoch);
    println!("  Best Prec@1: {:.3}", record.best_prec1);
    if let Some(saved_at) = record.saved_at {
        println!("  Saved at:    {}", saved_at.to_rfc3339().dimmed());
    }
    println!("  Parameters:  {}", record.num_parameters());
    println!("  Optimizer:   {}", if record.optimizer.is_some() { "stored" } else { "absent" });
    println!();
    println!("{:<28} {}", "Tensor", "Shape");
    println!("{}", "─".repeat(44));
    for (name, tensor) in &record.state_dict {
        println!("{:<28} {}", name.cyan(), format!("{:?}", tensor.shape).dimmed());
    }
    println!();
    Ok(())
}
