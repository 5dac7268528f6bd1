//! The prompts × samples evaluation loop.
//!
//! For every prompt, in prompt-file order, each sample is sent through
//! placeholder resolution, inference and label decoding. The prompt's records
//! are handed to an [`ArtifactSink`], then its (reference, predicted) pairs are
//! aggregated into one [`SummaryRow`]. Nothing carries over between prompts.

pub mod run;

pub use run::RunRecord;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::{Dataset, PredictionRecord};
use crate::error::Result;
use crate::inference::Invoker;
use crate::labels::{Label, LabelDecoder};
use crate::metrics::{aggregate, MetricSummary, SchemaMode};
use crate::prompts::PromptTemplate;

/// Receives each prompt's enriched records once the prompt has run over the dataset
pub trait ArtifactSink {
    fn persist(&mut self, prompt_index: usize, records: &[PredictionRecord]) -> Result<()>;
}

/// Sink that keeps nothing
#[derive(Debug, Default)]
pub struct DiscardArtifacts;

impl ArtifactSink for DiscardArtifacts {
    fn persist(&mut self, _prompt_index: usize, _records: &[PredictionRecord]) -> Result<()> {
        Ok(())
    }
}

/// One row of the result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub prompt_index: usize,
    pub prompt: String,
    pub summary: MetricSummary,
}

/// Evaluation settings fixed for a whole run
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    mode: SchemaMode,
    decoder: LabelDecoder,
    echo_responses: bool,
}

impl Evaluator {
    pub fn new(mode: SchemaMode) -> Self {
        Self {
            mode,
            decoder: LabelDecoder::for_schema(mode),
            echo_responses: false,
        }
    }

    /// Log every raw response at info level
    pub fn with_echo_responses(mut self, echo: bool) -> Self {
        self.echo_responses = echo;
        self
    }

    /// Run one prompt over the whole dataset
    pub fn run_prompt<I, S>(
        &self,
        dataset: &Dataset,
        prompt: &PromptTemplate,
        invoker: &I,
        sink: &mut S,
    ) -> Result<SummaryRow>
    where
        I: Invoker + ?Sized,
        S: ArtifactSink + ?Sized,
    {
        let mut records = Vec::with_capacity(dataset.len());
        let mut pairs: Vec<(Label, Label)> = Vec::with_capacity(dataset.len());

        for sample in dataset.samples() {
            let resolved = prompt.resolve(&sample.id, &sample.demographics)?;
            let response = invoker.generate(&sample.audio, &resolved)?;
            let predicted = self.decoder.decode(&response);

            if self.echo_responses {
                info!("[{}] {} -> {}: {}", prompt.index, sample.id, predicted, response);
            } else {
                debug!(
                    "[{}] {}: dx={} pred={}",
                    prompt.index, sample.id, sample.dx, predicted
                );
            }

            pairs.push((sample.dx, predicted));
            records.push(PredictionRecord::new(sample, resolved, response, predicted));
        }

        let unknown = pairs.iter().filter(|(_, p)| *p == Label::Unknown).count();
        if unknown > 0 {
            warn!(
                "Prompt {}: {} of {} responses matched no label",
                prompt.index,
                unknown,
                pairs.len()
            );
        }

        sink.persist(prompt.index, &records)?;

        let summary = aggregate(&pairs, self.mode)?;
        Ok(SummaryRow {
            prompt_index: prompt.index,
            prompt: prompt.text.clone(),
            summary,
        })
    }

    /// Run every prompt in order; one row per prompt, in the same order
    pub fn evaluate<I, S>(
        &self,
        dataset: &Dataset,
        prompts: &[PromptTemplate],
        invoker: &I,
        sink: &mut S,
    ) -> Result<Vec<SummaryRow>>
    where
        I: Invoker + ?Sized,
        S: ArtifactSink + ?Sized,
    {
        info!(
            "Evaluating {} prompts over {} samples ({} inference calls, schema {})",
            prompts.len(),
            dataset.len(),
            prompts.len() * dataset.len(),
            self.mode
        );

        let mut rows = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            info!("Prompt {}/{}: {}", prompt.index + 1, prompts.len(), prompt.text);
            let row = self.run_prompt(dataset, prompt, invoker, sink)?;
            let averages = row.summary.averages();
            info!(
                "Prompt {}: UAR {:.3}, macro F1 {:.3}, weighted F1 {:.3}",
                prompt.index, averages.uar, averages.f1_macro, averages.f1_weighted
            );
            rows.push(row);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioClip;
    use crate::dataset::{Demographics, Sample};
    use crate::error::EvalError;
    use serde_json::Map;
    use std::cell::RefCell;

    /// Answers with the response scripted for the sample whose clip has that length
    struct LengthKeyedInvoker {
        responses: Vec<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl Invoker for LengthKeyedInvoker {
        fn generate(&self, audio: &AudioClip, prompt: &str) -> Result<String> {
            self.calls.borrow_mut().push(prompt.to_string());
            Ok(self.responses[audio.samples.len() - 1].to_string())
        }
    }

    struct FailingInvoker;

    impl Invoker for FailingInvoker {
        fn generate(&self, _audio: &AudioClip, _prompt: &str) -> Result<String> {
            Err(EvalError::Inference("model crashed".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        persisted: Vec<(usize, Vec<PredictionRecord>)>,
    }

    impl ArtifactSink for RecordingSink {
        fn persist(&mut self, prompt_index: usize, records: &[PredictionRecord]) -> Result<()> {
            self.persisted.push((prompt_index, records.to_vec()));
            Ok(())
        }
    }

    fn sample(n: usize, dx: Label, age: Option<u32>) -> Sample {
        Sample {
            id: format!("s{}", n),
            audio: AudioClip::new(vec![0.0; n], 16000),
            dx,
            demographics: Demographics {
                age,
                lang: Some("en".to_string()),
                sex: Some("M".to_string()),
            },
            extra: Map::new(),
        }
    }

    fn dataset() -> Dataset {
        Dataset::new(vec![
            sample(1, Label::Mci, Some(70)),
            sample(2, Label::Nc, Some(71)),
            sample(3, Label::Mci, Some(72)),
            sample(4, Label::Nc, Some(73)),
        ])
    }

    #[test]
    fn test_run_prompt_scores_and_persists() {
        let invoker = LengthKeyedInvoker {
            responses: vec!["MCI", "This is NC", "Probably NC", "NC, not MCI... actually NC"],
            calls: RefCell::new(Vec::new()),
        };
        let mut sink = RecordingSink::default();
        let evaluator = Evaluator::new(SchemaMode::TwoClassMciNc);
        let prompt = PromptTemplate::new(0, "Age [AGE]: MCI or NC?");

        let row = evaluator
            .run_prompt(&dataset(), &prompt, &invoker, &mut sink)
            .unwrap();

        assert_eq!(
            *invoker.calls.borrow(),
            vec![
                "Age 70: MCI or NC?",
                "Age 71: MCI or NC?",
                "Age 72: MCI or NC?",
                "Age 73: MCI or NC?",
            ]
        );

        let (index, records) = &sink.persisted[0];
        assert_eq!(*index, 0);
        let preds: Vec<Label> = records.iter().map(|r| r.dx_pred).collect();
        // last response mentions MCI, which outranks NC
        assert_eq!(preds, vec![Label::Mci, Label::Nc, Label::Nc, Label::Mci]);
        assert_eq!(records[2].prompt, "Age 72: MCI or NC?");

        assert_eq!(row.prompt, "Age [AGE]: MCI or NC?");
        let MetricSummary::TwoClassMciNc { mci, nc, averages } = row.summary else {
            panic!("wrong schema variant");
        };
        assert_eq!(mci.recall, 0.5);
        assert_eq!(mci.precision, 0.5);
        assert_eq!(nc.recall, 0.5);
        assert_eq!(averages.uar, 0.5);
    }

    #[test]
    fn test_missing_field_aborts_before_persisting() {
        let invoker = LengthKeyedInvoker {
            responses: vec!["MCI"; 4],
            calls: RefCell::new(Vec::new()),
        };
        let data = Dataset::new(vec![sample(1, Label::Mci, Some(70)), sample(2, Label::Nc, None)]);
        let mut sink = RecordingSink::default();

        let err = Evaluator::new(SchemaMode::TwoClassMciNc)
            .run_prompt(&data, &PromptTemplate::new(0, "[AGE]"), &invoker, &mut sink)
            .unwrap_err();

        assert!(matches!(err, EvalError::MissingField { field: "age", .. }));
        assert!(sink.persisted.is_empty());
    }

    #[test]
    fn test_inference_error_propagates() {
        let mut sink = DiscardArtifacts;
        let result = Evaluator::new(SchemaMode::ThreeClass).evaluate(
            &dataset(),
            &[PromptTemplate::new(0, "p")],
            &FailingInvoker,
            &mut sink,
        );
        assert!(matches!(result, Err(EvalError::Inference(_))));
    }

    #[test]
    fn test_empty_dataset_fails_aggregation() {
        let invoker = FailingInvoker;
        let result = Evaluator::new(SchemaMode::TwoClassMciNc).run_prompt(
            &Dataset::default(),
            &PromptTemplate::new(0, "p"),
            &invoker,
            &mut DiscardArtifacts,
        );
        assert!(matches!(result, Err(EvalError::Aggregation(_))));
    }
}
