//! JSONL classification data with optional precomputed teacher logits.
//!
//! One record per line: `{"features": [..], "label": 3, "teacher_logits": [..]}`.
//! A file either carries teacher logits on every record or on none of them.

use crossbeam::channel::bounded;
use kdtrain_training::{Batch, BatchIter, BatchSource, Model, Target, TrainingError, TrainingResult};
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// Labels must be below this bound.
const MAX_CLASSES: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub features: Vec<f32>,
    pub label: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_logits: Option<Vec<f32>>,
}

pub fn read_records(path: &Path) -> TrainingResult<Vec<Record>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TrainingError::NotFound(path.to_path_buf()),
        _ => TrainingError::Io(e),
    })?;

    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|e| TrainingError::Dataset(format!("{}:{}: {e}", path.display(), idx + 1)))?;
        records.push(record);
    }
    Ok(records)
}

pub fn write_records(path: &Path, records: &[Record]) -> TrainingResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Runs `teacher` over every record and stores its outputs as `teacher_logits`.
pub fn attach_teacher_logits(teacher: &dyn Model, records: &mut [Record]) -> TrainingResult<()> {
    validate_records(records)?;
    let features = records[0].features.len();
    let inputs = Array2::from_shape_fn((records.len(), features), |(row, col)| records[row].features[col]);
    let logits = teacher.infer(inputs.view())?;
    for (record, row) in records.iter_mut().zip(logits.rows()) {
        record.teacher_logits = Some(row.to_vec());
    }
    Ok(())
}

fn validate_records(records: &[Record]) -> TrainingResult<()> {
    let Some(first) = records.first() else {
        return Err(TrainingError::Dataset("dataset must not be empty".to_string()));
    };
    let features = first.features.len();
    let logits = first.teacher_logits.as_ref().map(Vec::len);
    if features == 0 {
        return Err(TrainingError::Dataset("record[0] has no features".to_string()));
    }
    for (idx, record) in records.iter().enumerate() {
        if record.features.len() != features {
            return Err(TrainingError::Dataset(format!(
                "record[{idx}] has {} features, expected {features}",
                record.features.len()
            )));
        }
        if record.label >= MAX_CLASSES {
            return Err(TrainingError::Dataset(format!(
                "record[{idx}] label {} is out of range (must be < {MAX_CLASSES})",
                record.label
            )));
        }
        if record.teacher_logits.as_ref().map(Vec::len) != logits {
            return Err(TrainingError::Dataset(format!(
                "record[{idx}] teacher_logits disagree with record[0] (present on all records or none, same width)"
            )));
        }
    }
    Ok(())
}

fn assemble(records: &[Record], indices: &[usize]) -> TrainingResult<Batch> {
    let features = records[indices[0]].features.len();
    let inputs = Array2::from_shape_fn((indices.len(), features), |(row, col)| records[indices[row]].features[col]);
    let labels: Vec<usize> = indices.iter().map(|&i| records[i].label).collect();

    let target = match &records[indices[0]].teacher_logits {
        None => Target::Labeled(labels),
        Some(first) => {
            let classes = first.len();
            let teacher_logits = Array2::from_shape_fn((indices.len(), classes), |(row, col)| {
                records[indices[row]].teacher_logits.as_ref().map_or(0.0, |logits| logits[col])
            });
            Target::LabeledWithTeacherLogits { labels, teacher_logits }
        }
    };
    Batch::new(inputs, target)
}

/// Records held in memory and cut into batches on demand.
///
/// Training sets reshuffle every epoch from `seed + epoch`; validation sets keep
/// file order. With `workers > 0` batches are assembled on a background thread
/// and handed over through a bounded channel.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    records: Arc<Vec<Record>>,
    batch_size: usize,
    shuffle: bool,
    seed: u64,
    workers: usize,
}

impl InMemoryDataset {
    pub fn new(records: Vec<Record>, batch_size: usize) -> TrainingResult<Self> {
        if batch_size == 0 {
            return Err(TrainingError::InvalidConfig("batch_size must be >= 1".to_string()));
        }
        validate_records(&records)?;
        Ok(Self { records: Arc::new(records), batch_size, shuffle: false, seed: 0, workers: 0 })
    }

    pub fn open(path: &Path, batch_size: usize) -> TrainingResult<Self> {
        let records = read_records(path)?;
        debug!(path = %path.display(), records = records.len(), "dataset loaded");
        Self::new(records, batch_size)
    }

    #[must_use]
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.records[0].features.len()
    }

    /// Number of classes implied by the labels (and teacher logit width, if present).
    pub fn num_classes(&self) -> usize {
        let from_labels = self.records.iter().map(|r| r.label.saturating_add(1)).max().unwrap_or(0);
        let from_logits = self.records[0].teacher_logits.as_ref().map_or(0, Vec::len);
        from_labels.max(from_logits)
    }

    pub fn has_teacher_logits(&self) -> bool {
        self.records[0].teacher_logits.is_some()
    }

    fn epoch_order(&self, epoch: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.records.len()).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);
        }
        order
    }
}

impl BatchSource for InMemoryDataset {
    fn num_batches(&self) -> usize {
        self.records.len().div_ceil(self.batch_size)
    }

    fn batches(&mut self, epoch: usize) -> BatchIter<'_> {
        let order = self.epoch_order(epoch);
        let batch_size = self.batch_size;

        if self.workers == 0 {
            let records = Arc::clone(&self.records);
            let chunks: Vec<Vec<usize>> = order.chunks(batch_size).map(<[usize]>::to_vec).collect();
            return Box::new(chunks.into_iter().map(move |chunk| assemble(&records, &chunk)));
        }

        let (tx, rx) = bounded(self.workers * 2);
        let records = Arc::clone(&self.records);
        thread::spawn(move || {
            for chunk in order.chunks(batch_size) {
                // receiver gone means the epoch was abandoned
                if tx.send(assemble(&records, chunk)).is_err() {
                    break;
                }
            }
        });
        Box::new(rx.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record { features: vec![i as f32, 1.0], label: i % 3, teacher_logits: None })
            .collect()
    }

    fn first_column(source: &mut InMemoryDataset, epoch: usize) -> Vec<f32> {
        source
            .batches(epoch)
            .flat_map(|b| b.unwrap().inputs.column(0).to_vec())
            .collect()
    }

    #[test]
    fn test_batches_cover_every_record() {
        let mut source = InMemoryDataset::new(records(10), 4).unwrap();
        assert_eq!(source.num_batches(), 3);
        let sizes: Vec<usize> = source.batches(0).map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(first_column(&mut source, 0), (0..10).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_is_seeded_per_epoch() {
        let mut a = InMemoryDataset::new(records(32), 8).unwrap().shuffled(5143);
        let mut b = InMemoryDataset::new(records(32), 8).unwrap().shuffled(5143);
        let epoch0 = first_column(&mut a, 0);
        assert_eq!(epoch0, first_column(&mut b, 0));
        assert_ne!(epoch0, first_column(&mut a, 1));

        let mut sorted = epoch0;
        sorted.sort_by(f32::total_cmp);
        assert_eq!(sorted, (0..32).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_prefetch_matches_inline_order() {
        let mut inline = InMemoryDataset::new(records(50), 7).unwrap().shuffled(1);
        let mut prefetched = InMemoryDataset::new(records(50), 7).unwrap().shuffled(1).with_workers(2);
        assert_eq!(first_column(&mut inline, 3), first_column(&mut prefetched, 3));
    }

    #[test]
    fn test_teacher_logits_become_distillation_targets() {
        let records = vec![
            Record { features: vec![0.0], label: 1, teacher_logits: Some(vec![0.1, 0.9]) },
            Record { features: vec![1.0], label: 0, teacher_logits: Some(vec![0.8, 0.2]) },
        ];
        let mut source = InMemoryDataset::new(records, 2).unwrap();
        assert!(source.has_teacher_logits());
        let batch = source.batches(0).next().unwrap().unwrap();
        assert_eq!(batch.target.labels(), &[1, 0]);
        assert_eq!(batch.target.teacher_logits().unwrap()[[1, 0]], 0.8);
    }

    #[test]
    fn test_rejects_inconsistent_records() {
        let mut mixed = records(3);
        mixed[1].teacher_logits = Some(vec![0.0; 3]);
        assert!(matches!(InMemoryDataset::new(mixed, 2), Err(TrainingError::Dataset(_))));

        let mut ragged = records(3);
        ragged[2].features.push(9.0);
        assert!(matches!(InMemoryDataset::new(ragged, 2), Err(TrainingError::Dataset(_))));

        let mut huge_label = records(3);
        huge_label[1].label = usize::MAX;
        let err = InMemoryDataset::new(huge_label, 2).unwrap_err();
        assert!(err.to_string().contains("record[1] label"));

        assert!(matches!(InMemoryDataset::new(Vec::new(), 2), Err(TrainingError::Dataset(_))));
        assert!(matches!(InMemoryDataset::new(records(3), 0), Err(TrainingError::InvalidConfig(_))));
    }

    #[test]
    fn test_attach_teacher_logits() {
        use crate::mlp::{Architecture, Mlp};

        let teacher = Mlp::new(Architecture::Linear, 2, 3, &mut StdRng::seed_from_u64(4)).unwrap();
        let mut data = records(5);
        attach_teacher_logits(&teacher, &mut data).unwrap();
        assert!(data.iter().all(|r| r.teacher_logits.as_ref().map(Vec::len) == Some(3)));

        let expected = teacher.infer(Array2::from_shape_vec((1, 2), data[4].features.clone()).unwrap().view()).unwrap();
        let attached = data[4].teacher_logits.as_ref().unwrap();
        for (a, e) in attached.iter().zip(expected.row(0)) {
            assert!((a - e).abs() < 1e-5);
        }

        let mut source = InMemoryDataset::new(data, 5).unwrap();
        let batch = source.batches(0).next().unwrap().unwrap();
        assert!(batch.target.teacher_logits().is_some());
    }

    #[test]
    fn test_jsonl_round_trip_and_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("train.jsonl");
        write_records(&path, &records(5)).unwrap();

        let source = InMemoryDataset::open(&path, 2).unwrap();
        assert_eq!(source.len(), 5);
        assert_eq!(source.num_features(), 2);
        assert_eq!(source.num_classes(), 3);

        assert!(matches!(
            InMemoryDataset::open(&temp.path().join("val.jsonl"), 2),
            Err(TrainingError::NotFound(_))
        ));

        std::fs::write(&path, "{\"features\": [1.0], \"label\": 0}\nnot json\n").unwrap();
        let err = read_records(&path).unwrap_err();
        assert!(matches!(err, TrainingError::Dataset(msg) if msg.contains("train.jsonl:2:")));
    }
}
