//! Reference collaborators for `kdtrain-training`
//!
//! Dense ReLU classifiers, SGD, a cosine learning-rate schedule, cross-entropy,
//! a temperature-scaled distillation hook and a JSONL dataset loader, all on
//! `ndarray` and running on the CPU.

pub mod dataset;
pub mod distill;
pub mod loss;
pub mod mlp;
pub mod schedule;
pub mod sgd;
pub mod synth;

pub use dataset::{attach_teacher_logits, read_records, write_records, InMemoryDataset, Record};
pub use distill::{DistillationConfig, KnowledgeDistillation, LossType};
pub use loss::{log_softmax, softmax, CrossEntropy};
pub use mlp::{Architecture, Mlp};
pub use schedule::CosineAnnealingLr;
pub use sgd::{Sgd, SgdConfig};
pub use synth::{generate_blobs, BlobSpec, BlobSplits};
