//! Bounded self-correction for failed command runs.
//!
//! Classifies the failure, pulls remediation context from the developer
//! library, synthesizes a fix action, and re-runs through a caller-supplied
//! callback. Gives up after a fixed attempt budget and escalates to the
//! operator with the full analysis. Corrective commands go through the same
//! validator as everything else; this loop never performs destructive
//! remediation itself.

pub mod classifier;

use std::future::Future;
use std::sync::Arc;

use crate::providers::{CommandOutput, LibraryProvider};
use crate::tools::CommandValidator;

pub use classifier::{ClassifierRule, ErrorClass, ErrorClassifier};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const CONTEXT_TOP_K: usize = 3;

/// What the loop proposes to do about a class of errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationAction {
    /// Natural-language remediation prompt for the planner, bundling the
    /// formatted error list and retrieved context.
    Prompt(String),
    /// Direct corrective command, e.g. an auto-fix invocation.
    Command(String),
}

/// Terminal result of a correction run.
#[derive(Debug)]
pub enum CorrectionOutcome {
    /// The output carried no parsed errors; nothing to correct.
    NotApplicable(CommandOutput),
    /// A retry came back clean.
    Resolved {
        output: CommandOutput,
        attempts: u32,
    },
    /// Attempt budget exhausted; requires the human operator. Never retried
    /// further.
    Escalated {
        analysis: String,
        attempted: Vec<RemediationAction>,
        attempts: u32,
        last_output: CommandOutput,
    },
}

pub struct CorrectionLoop {
    library: Option<Arc<dyn LibraryProvider>>,
    classifier: ErrorClassifier,
    validator: CommandValidator,
    lint_fix_command: String,
    max_attempts: u32,
}

impl CorrectionLoop {
    pub fn new() -> Self {
        Self {
            library: None,
            classifier: ErrorClassifier::default(),
            validator: CommandValidator::new(),
            lint_fix_command: "cargo clippy --fix --allow-dirty --allow-staged".to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Attach a knowledge source for remediation context.
    pub fn with_library(mut self, library: Arc<dyn LibraryProvider>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_lint_fix_command(mut self, command: impl Into<String>) -> Self {
        self.lint_fix_command = command.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Run the correction loop over a failed command output.
    ///
    /// `retry` re-runs the original task-producing operation; when it is
    /// `None` the loop produces its analysis and escalates after the first
    /// pass, since nothing can be re-checked.
    pub async fn correct<F, Fut>(
        &self,
        first: CommandOutput,
        mut retry: Option<F>,
    ) -> CorrectionOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<CommandOutput>>,
    {
        if first.matched_errors.is_empty() {
            return CorrectionOutcome::NotApplicable(first);
        }

        let mut current = first;
        let mut attempted: Vec<RemediationAction> = Vec::new();

        for attempt in 1..=self.max_attempts {
            let grouped = self.classifier.classify_all(&current.matched_errors);
            let context = self.gather_context(&grouped).await;
            let actions = self.synthesize(&grouped, &context);
            tracing::info!(
                attempt,
                classes = grouped.len(),
                "self-correction pass: {} action(s)",
                actions.len()
            );
            attempted.extend(actions);

            let Some(retry_fn) = retry.as_mut() else {
                break;
            };

            match retry_fn().await {
                Ok(output) if output.succeeded() => {
                    return CorrectionOutcome::Resolved {
                        output,
                        attempts: attempt,
                    };
                }
                Ok(output) => {
                    current = output;
                }
                Err(err) => {
                    tracing::warn!(attempt, "correction retry errored: {err}");
                }
            }
        }

        let grouped = self.classifier.classify_all(&current.matched_errors);
        let analysis = format_analysis(&grouped);
        attempted.dedup();
        CorrectionOutcome::Escalated {
            analysis,
            attempted,
            attempts: self.max_attempts,
            last_output: current,
        }
    }

    /// One library query per distinct class, keyed by class + first message.
    async fn gather_context(
        &self,
        grouped: &std::collections::BTreeMap<ErrorClass, Vec<String>>,
    ) -> String {
        let Some(library) = self.library.as_ref() else {
            return String::new();
        };

        let mut context = String::new();
        for (class, lines) in grouped {
            let Some(first) = lines.first() else { continue };
            let question = format!("{class}: {first}");
            match library.query(&question, CONTEXT_TOP_K).await {
                Ok(hits) => {
                    for hit in hits {
                        context.push_str(&hit.text);
                        context.push('\n');
                    }
                }
                Err(err) => {
                    tracing::debug!("remediation context lookup failed: {err}");
                }
            }
        }
        context
    }

    fn synthesize(
        &self,
        grouped: &std::collections::BTreeMap<ErrorClass, Vec<String>>,
        context: &str,
    ) -> Vec<RemediationAction> {
        let mut actions = Vec::new();
        for (class, lines) in grouped {
            match class {
                ErrorClass::Lint => {
                    // Auto-fixable; still subject to the command validator.
                    match self.validator.validate(&self.lint_fix_command) {
                        Ok(()) => {
                            actions.push(RemediationAction::Command(self.lint_fix_command.clone()))
                        }
                        Err(err) => {
                            actions.push(RemediationAction::Prompt(format!(
                                "Lint auto-fix was blocked ({err}). Address these manually:\n{}",
                                lines.join("\n")
                            )));
                        }
                    }
                }
                _ => {
                    let mut prompt = format!(
                        "Fix the following {class} errors:\n{}",
                        lines.join("\n")
                    );
                    if !context.is_empty() {
                        prompt.push_str("\n\nRelevant notes from the developer library:\n");
                        prompt.push_str(context);
                    }
                    actions.push(RemediationAction::Prompt(prompt));
                }
            }
        }
        actions
    }
}

impl Default for CorrectionLoop {
    fn default() -> Self {
        Self::new()
    }
}

fn format_analysis(grouped: &std::collections::BTreeMap<ErrorClass, Vec<String>>) -> String {
    let mut out = String::new();
    for (class, lines) in grouped {
        out.push_str(&format!("{class} ({} error(s)):\n", lines.len()));
        for line in lines {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
