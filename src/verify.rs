//! Sentence-level faithfulness verification.
//!
//! A generated answer is split into sentences and each one is classified
//! against the retrieved context by a three-way NLI model. Contradicted
//! sentences are removed; everything else about the answer is preserved.
//! The whole stage is fail-open: a dead classifier returns the answer
//! untouched, and a per-sentence failure keeps that sentence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::NliConfig;
use crate::error::{EngineError, Result};
use crate::models::{NliRatios, VerifiedAnswer};

/// Appended when at least one sentence was removed, so the reader knows
/// the answer was revised.
pub const DISCLOSURE_NOTE: &str =
    "\n\n(Self-checked against the retrieved context; a sentence contradicted by the context was removed.)";

/// Three-way entailment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NliLabel {
    Entailment,
    Neutral,
    Contradiction,
}

impl NliLabel {
    /// Map a model's label string: anything containing `ENTAIL` is
    /// entailment, anything containing `CONTRAD` is contradiction, the
    /// rest is neutral.
    pub fn from_model_label(label: &str) -> Self {
        let upper = label.to_uppercase();
        if upper.contains("ENTAIL") {
            NliLabel::Entailment
        } else if upper.contains("CONTRAD") {
            NliLabel::Contradiction
        } else {
            NliLabel::Neutral
        }
    }
}

/// Classifies a hypothesis sentence against a premise.
#[async_trait]
pub trait NliClassifier: Send + Sync {
    async fn classify(&self, premise: &str, hypothesis: &str) -> Result<NliLabel>;
}

fn is_sentence_break(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '!' | '?' | '.' | '\n')
}

/// A sentence with its span in the original answer, terminal punctuation
/// included, so dropping one sentence leaves the others byte-identical.
#[derive(Debug)]
struct SentenceSpan {
    start: usize,
    end: usize,
    hypothesis: String,
}

fn sentence_spans(text: &str) -> Vec<SentenceSpan> {
    let mut raw: Vec<(usize, usize)> = Vec::new();
    let mut start: Option<usize> = None;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if is_sentence_break(c) {
            if let Some(s) = start.take() {
                let mut end = i + c.len_utf8();
                // swallow the whole terminal run ("..." / "?!" / trailing \n)
                while let Some(&(j, d)) = iter.peek() {
                    if !is_sentence_break(d) {
                        break;
                    }
                    end = j + d.len_utf8();
                    iter.next();
                }
                raw.push((s, end));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        raw.push((s, text.len()));
    }

    raw.into_iter()
        .filter_map(|(start, end)| {
            let hypothesis = text[start..end]
                .trim_matches(|c: char| is_sentence_break(c) || c.is_whitespace())
                .to_string();
            (!hypothesis.is_empty()).then(|| SentenceSpan {
                start,
                end,
                hypothesis,
            })
        })
        .collect()
}

/// Split text into bare sentences on terminal punctuation and newlines.
pub fn split_sentences(text: &str) -> Vec<String> {
    sentence_spans(text)
        .into_iter()
        .map(|span| span.hypothesis)
        .collect()
}

/// Check every answer sentence against the context and drop contradicted
/// ones.
///
/// A per-sentence classifier failure degrades that sentence to neutral
/// (kept). If everything was contradicted the original answer is returned
/// rather than an empty string; if anything was removed, the disclosure
/// note is appended.
pub async fn verify_and_revise(
    nli: &dyn NliClassifier,
    context: &str,
    answer: &str,
) -> VerifiedAnswer {
    let spans = sentence_spans(answer);
    if spans.is_empty() {
        return VerifiedAnswer {
            answer: answer.to_string(),
            ratios: NliRatios {
                entail_ratio: 0.0,
                neutral_ratio: 1.0,
                contradict_ratio: 0.0,
            },
        };
    }

    let mut labels = Vec::with_capacity(spans.len());
    for span in &spans {
        let label = match nli.classify(context, &span.hypothesis).await {
            Ok(label) => label,
            Err(e) => {
                tracing::warn!("NLI classification failed, keeping sentence: {e}");
                NliLabel::Neutral
            }
        };
        labels.push(label);
    }

    let total = labels.len() as f32;
    let entail = labels.iter().filter(|l| **l == NliLabel::Entailment).count() as f32;
    let contradict = labels
        .iter()
        .filter(|l| **l == NliLabel::Contradiction)
        .count() as f32;
    let ratios = NliRatios {
        entail_ratio: entail / total,
        neutral_ratio: (total - entail - contradict) / total,
        contradict_ratio: contradict / total,
    };

    if contradict == 0.0 {
        return VerifiedAnswer {
            answer: answer.to_string(),
            ratios,
        };
    }

    let mut revised = String::new();
    for (span, label) in spans.iter().zip(&labels) {
        if *label != NliLabel::Contradiction {
            revised.push_str(&answer[span.start..span.end]);
        }
    }
    let revised = revised.trim().to_string();

    if revised.is_empty() {
        // everything contradicted: better the original than nothing
        return VerifiedAnswer {
            answer: answer.to_string(),
            ratios,
        };
    }

    VerifiedAnswer {
        answer: format!("{revised}{DISCLOSURE_NOTE}"),
        ratios,
    }
}

/// HTTP sidecar speaking the `/v1/classify` protocol.
pub struct NliSidecarClient {
    http: reqwest::Client,
    config: NliConfig,
}

impl NliSidecarClient {
    pub fn new(http: reqwest::Client, config: NliConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl NliClassifier for NliSidecarClient {
    async fn classify(&self, premise: &str, hypothesis: &str) -> Result<NliLabel> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .ok_or_else(|| EngineError::InvalidInput("NLI base_url not configured".into()))?;
        let model = self.config.model.as_deref().unwrap_or("default");
        let url = format!("{}/v1/classify", base_url.trim_end_matches('/'));

        let req_body = ClassifyRequest {
            model: model.to_string(),
            premise: premise.to_string(),
            hypothesis: hypothesis.to_string(),
        };

        let timeout = std::time::Duration::from_secs(self.config.timeout_secs.min(30));
        let resp = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&req_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Store(format!(
                "NLI sidecar returned {status}: {body}"
            )));
        }

        let body: ClassifyResponse = resp.json().await?;
        Ok(NliLabel::from_model_label(&body.label))
    }
}

#[derive(Serialize)]
struct ClassifyRequest {
    model: String,
    premise: String,
    hypothesis: String,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flags any hypothesis containing one of the listed needles as a
    /// contradiction; everything else entails.
    struct NeedleClassifier {
        contradictions: Vec<&'static str>,
    }

    #[async_trait]
    impl NliClassifier for NeedleClassifier {
        async fn classify(&self, _premise: &str, hypothesis: &str) -> Result<NliLabel> {
            if self.contradictions.iter().any(|n| hypothesis.contains(n)) {
                Ok(NliLabel::Contradiction)
            } else {
                Ok(NliLabel::Entailment)
            }
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl NliClassifier for FailingClassifier {
        async fn classify(&self, _premise: &str, _hypothesis: &str) -> Result<NliLabel> {
            Err(EngineError::Store("classifier offline".into()))
        }
    }

    const CONTEXT: &str = "Paris is the capital of France.";

    #[test]
    fn test_split_sentences_on_mixed_terminals() {
        let sentences = split_sentences("First one. Second!\nThird？最后一句。");
        assert_eq!(sentences, vec!["First one", "Second", "Third", "最后一句"]);
    }

    #[test]
    fn test_split_sentences_empty() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("...!!!\n\n").is_empty());
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(NliLabel::from_model_label("ENTAILMENT"), NliLabel::Entailment);
        assert_eq!(NliLabel::from_model_label("entailment"), NliLabel::Entailment);
        assert_eq!(
            NliLabel::from_model_label("contradiction"),
            NliLabel::Contradiction
        );
        assert_eq!(NliLabel::from_model_label("NEUTRAL"), NliLabel::Neutral);
        assert_eq!(NliLabel::from_model_label("whatever"), NliLabel::Neutral);
    }

    #[tokio::test]
    async fn test_clean_answer_untouched() {
        let nli = NeedleClassifier {
            contradictions: vec![],
        };
        let answer = "Paris is the capital of France.";
        let verified = verify_and_revise(&nli, CONTEXT, answer).await;
        assert_eq!(verified.answer, answer);
        assert!((verified.ratios.entail_ratio - 1.0).abs() < 1e-6);
        assert!((verified.ratios.contradict_ratio).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_contradiction_removed_with_note() {
        let nli = NeedleClassifier {
            contradictions: vec!["Germany"],
        };
        let answer = "Paris is the capital of France. Paris is in Germany.";
        let verified = verify_and_revise(&nli, CONTEXT, answer).await;
        assert_eq!(
            verified.answer,
            format!("Paris is the capital of France.{DISCLOSURE_NOTE}")
        );
        assert!((verified.ratios.contradict_ratio - 0.5).abs() < 1e-6);
        assert!((verified.ratios.entail_ratio - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_middle_sentence_removal_preserves_rest() {
        let nli = NeedleClassifier {
            contradictions: vec!["wrong"],
        };
        let answer = "Paris is in France. This is wrong. The Seine runs through it.";
        let verified = verify_and_revise(&nli, CONTEXT, answer).await;
        assert!(verified
            .answer
            .starts_with("Paris is in France. The Seine runs through it."));
        assert!(verified.answer.ends_with(DISCLOSURE_NOTE));
    }

    #[tokio::test]
    async fn test_all_contradicted_falls_back_to_original() {
        let nli = NeedleClassifier {
            contradictions: vec!["Paris"],
        };
        let answer = "Paris is in Germany.";
        let verified = verify_and_revise(&nli, CONTEXT, answer).await;
        assert_eq!(verified.answer, answer);
        assert!((verified.ratios.contradict_ratio - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_per_sentence_failure_keeps_sentence() {
        let answer = "Paris is in Germany. The moon is cheese.";
        let verified = verify_and_revise(&FailingClassifier, CONTEXT, answer).await;
        assert_eq!(verified.answer, answer);
        assert!((verified.ratios.neutral_ratio - 1.0).abs() < 1e-6);
        assert!(!verified.ratios.is_unavailable());
    }

    #[tokio::test]
    async fn test_empty_answer_is_all_neutral() {
        let nli = NeedleClassifier {
            contradictions: vec![],
        };
        let verified = verify_and_revise(&nli, CONTEXT, "").await;
        assert_eq!(verified.answer, "");
        assert!((verified.ratios.neutral_ratio - 1.0).abs() < 1e-6);
        assert!((verified.ratios.entail_ratio).abs() < 1e-6);
    }
}
