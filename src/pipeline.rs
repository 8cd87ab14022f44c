/// Train and predict runs over a run directory
///
/// A run directory holds one sub-directory per focus (`CNN_feature`,
/// `CNN_polarity`) with the vocabulary, the network shape, checkpoints and
/// summaries of that model. Prediction writes `prediction.csv` into each of
/// them and the joint `predictions.csv` into the run directory itself.
use std::fs;
use std::path::{Path, PathBuf};

use candle_core::Device;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{Focus, PipelineConfig};
use crate::data::corpus::{load_records, POLARITIES};
use crate::data::{encode, load_embedding_vectors, train_dev_split, LabeledDataset, Vocabulary};
use crate::eval::{
    aggregate, predict_all, write_joint_csv, write_predictions_csv, Aggregation, ClassificationReport,
    CombinedClasses, FocusPredictions, PredictionRecord,
};
use crate::models::{CnnClassifier, TextCnnConfig};
use crate::training::{CheckpointManager, CsvSummaryWriter, Trainer, TrainingReport};

/// Files of one focus model inside a run directory
#[derive(Debug, Clone)]
pub struct FocusPaths {
    root: PathBuf,
}

impl FocusPaths {
    pub fn new(run_dir: &Path, focus: Focus) -> Self {
        Self {
            root: run_dir.join(focus.model_dir_name()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vocab(&self) -> PathBuf {
        self.root.join("vocab.json")
    }

    pub fn model_config(&self) -> PathBuf {
        self.root.join("model.json")
    }

    pub fn checkpoints(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    pub fn train_summaries(&self) -> PathBuf {
        self.root.join("summaries").join("train")
    }

    pub fn dev_summaries(&self) -> PathBuf {
        self.root.join("summaries").join("dev")
    }

    pub fn predictions(&self) -> PathBuf {
        self.root.join("prediction.csv")
    }
}

/// CUDA device 0 when available, CPU otherwise
pub fn select_device() -> crate::Result<Device> {
    let device = if candle_core::utils::cuda_is_available() {
        Device::new_cuda(0)?
    } else {
        Device::Cpu
    };
    log::debug!("Using device: {:?}", device);
    Ok(device)
}

/// `<run_directory>/<directory_name>/<timestamp>`, created
pub fn create_run_dir(config: &PipelineConfig, timestamp: i64) -> crate::Result<PathBuf> {
    let run_dir = config
        .run
        .run_directory
        .join(&config.run.directory_name)
        .join(timestamp.to_string());
    fs::create_dir_all(&run_dir)?;
    Ok(run_dir)
}

/// Train the model of one focus into `run_dir`
pub fn train_focus(config: &PipelineConfig, focus: Focus, run_dir: &Path) -> crate::Result<TrainingReport> {
    config.validate()?;

    let domain = config.data.domain()?;
    let aspects = config.data.effective_aspects()?;
    log::info!("Training CNN_{} on the {} domain", focus, domain);

    let records = load_records(config.data.train_path()?, aspects)?;
    let dataset = LabeledDataset::from_records(&records, focus, domain.labels(focus, aspects))?;
    for (name, count) in dataset.target_names.iter().zip(dataset.class_counts()) {
        log::debug!("{}: {} sentences", name, count);
    }

    // Every sentence must be at least as long as the widest filter
    let vocab = Vocabulary::fit(&dataset.cleaned_texts(), config.model.max_filter_size());
    let examples = encode(&dataset, &vocab);

    let mut rng = StdRng::seed_from_u64(config.data.seed);
    let (train, dev) = train_dev_split(examples, config.data.dev_sample_percentage, &mut rng);
    log::info!("Vocabulary Size: {}", vocab.len());
    log::debug!("First words: {:?}", vocab.words().take(10).collect::<Vec<_>>());
    log::info!("Train/Dev split: {}/{}", train.len(), dev.len());

    let paths = FocusPaths::new(run_dir, focus);
    fs::create_dir_all(paths.root())?;
    vocab.save(paths.vocab())?;

    let model_config = TextCnnConfig {
        sequence_length: vocab.max_document_length(),
        num_classes: dataset.num_classes(),
        vocab_size: vocab.len(),
        embedding_dim: config.embedding_dim(),
        filter_sizes: config.model.filter_sizes.clone(),
        num_filters: config.model.num_filters,
        l2_reg_lambda: config.model.l2_reg_lambda,
    };
    model_config.save(paths.model_config())?;

    let mut classifier = CnnClassifier::new(model_config, select_device()?)?;
    if let Some((kind, path)) = config.embeddings.source() {
        let matrix = load_embedding_vectors(
            path,
            kind,
            config.embeddings.binary,
            &vocab,
            config.embeddings.dimension,
            &mut rng,
        )?;
        classifier.set_embeddings(&matrix)?;
    }

    let checkpoints = CheckpointManager::new(paths.checkpoints(), config.training.num_checkpoints)?;
    let mut trainer = Trainer::new(classifier, config.training.clone(), config.model.dropout_keep_prob)
        .with_checkpoints(checkpoints)
        .with_summaries(
            Box::new(CsvSummaryWriter::create(paths.train_summaries())?),
            Box::new(CsvSummaryWriter::create(paths.dev_summaries())?),
        );

    trainer.train(&train, &dev, &mut rng)
}

/// Train both models, feature first
pub fn train_all(config: &PipelineConfig, run_dir: &Path) -> crate::Result<Vec<(Focus, TrainingReport)>> {
    let mut reports = Vec::with_capacity(Focus::ALL.len());
    for focus in Focus::ALL {
        reports.push((focus, train_focus(config, focus, run_dir)?));
    }
    Ok(reports)
}

/// Test-set predictions and metrics of one focus model
#[derive(Debug, Clone)]
pub struct FocusEvaluation {
    pub focus: Focus,
    pub records: Vec<PredictionRecord>,
    pub target_names: Vec<String>,
    pub report: ClassificationReport,
}

impl FocusEvaluation {
    pub fn predictions(&self) -> FocusPredictions {
        FocusPredictions::from_records(&self.records, &self.target_names)
    }
}

/// Restore the latest checkpoint of one focus and predict the test corpus
pub fn predict_focus(config: &PipelineConfig, focus: Focus, run_dir: &Path) -> crate::Result<FocusEvaluation> {
    let paths = FocusPaths::new(run_dir, focus);
    let checkpoint = CheckpointManager::open(paths.checkpoints())?.latest()?;
    log::info!("Evaluating CNN_{} from {:?}", focus, checkpoint.weights_path);

    let domain = config.data.domain()?;
    let aspects = config.data.effective_aspects()?;
    let records = load_records(config.data.test_path()?, aspects)?;
    let dataset = LabeledDataset::from_records(&records, focus, domain.labels(focus, aspects))?;
    log::debug!("Total number of test examples: {}", dataset.len());

    let vocab = Vocabulary::load(paths.vocab())?;
    let inputs = vocab.transform_all(&dataset.cleaned_texts());

    let model_config = TextCnnConfig::load(paths.model_config())?;
    let classifier = CnnClassifier::from_checkpoint(model_config, &checkpoint.weights_path, select_device()?)?;

    let predictions = predict_all(&classifier, &dataset.texts, &inputs, config.training.batch_size)?;
    let predicted: Vec<usize> = predictions.iter().map(|p| p.class_index).collect();
    let report = ClassificationReport::compute(&dataset.labels, &predicted, &dataset.target_names)?;

    log::info!("Accuracy: {:.4}", report.accuracy);
    log::info!("\n{}", report.to_report());
    log::info!("\n{}", report.confusion_to_string());
    let legend: Vec<String> = dataset
        .target_names
        .iter()
        .enumerate()
        .map(|(idx, name)| format!("{} = {}", idx, name))
        .collect();
    log::info!("Labels : {}", legend.join(", "));

    write_predictions_csv(paths.predictions(), &predictions)?;

    Ok(FocusEvaluation {
        focus,
        records: predictions,
        target_names: dataset.target_names,
        report,
    })
}

/// Predict with both models and score them jointly
pub fn predict_run(config: &PipelineConfig, run_dir: &Path) -> crate::Result<Aggregation> {
    let feature = predict_focus(config, Focus::Feature, run_dir)?;
    let polarity = predict_focus(config, Focus::Polarity, run_dir)?;

    let domain = config.data.domain()?;
    let aspects = config.data.effective_aspects()?;
    let truth = load_records(config.data.test_path()?, aspects)?;
    let classes = CombinedClasses::new(domain.feature_labels(aspects), POLARITIES);

    let aggregation = aggregate(&truth, &feature.predictions(), &polarity.predictions(), &classes)?;

    log::info!("Effectiveness of the whole algorithm");
    log::info!("Fully correct: {:.4}", aggregation.fully_correct);
    log::info!("\n{}", aggregation.report.to_report());
    for (id, entity, polarity) in classes.legend() {
        log::info!("{} : {} - {}", id, entity, polarity);
    }

    write_joint_csv(run_dir.join("predictions.csv"), &aggregation.predictions)?;
    Ok(aggregation)
}
