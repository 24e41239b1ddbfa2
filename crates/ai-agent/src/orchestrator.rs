use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::language_model::{ChatTurn, LanguageModelClient, TransportError};
use crate::options::ModelOptions;
use crate::plan::{parse_plan_steps, PlanStep, StepStatus};
use crate::prompts;
use crate::summary::clean_summary;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub model_options: ModelOptions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    #[default]
    Idle,
    Analyzing,
    Planning,
    Executing,
    Summarizing,
    Complete,
    Error,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Summarizing => "summarizing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Index into [`WORKFLOW_STAGES`] for the four working states.
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            Self::Analyzing => Some(0),
            Self::Planning => Some(1),
            Self::Executing => Some(2),
            Self::Summarizing => Some(3),
            _ => None,
        }
    }

    fn rank(&self) -> Option<u8> {
        match self {
            Self::Idle => Some(0),
            Self::Analyzing => Some(1),
            Self::Planning => Some(2),
            Self::Executing => Some(3),
            Self::Summarizing => Some(4),
            Self::Complete => Some(5),
            Self::Error => None,
        }
    }

    /// Forward by exactly one state, or into `Error` from any live state.
    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(target)) => target == current + 1,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkflowStage {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const WORKFLOW_STAGES: [WorkflowStage; 4] = [
    WorkflowStage {
        id: "analyze",
        name: "Analyze Question",
        description: "Understanding the query and identifying key components",
    },
    WorkflowStage {
        id: "plan",
        name: "Create Plan",
        description: "Developing a step-by-step approach to solve the problem",
    },
    WorkflowStage {
        id: "execute",
        name: "Execute Steps",
        description: "Working through each step of the plan",
    },
    WorkflowStage {
        id: "summarize",
        name: "Summarize Results",
        description: "Compiling findings into a comprehensive answer",
    },
];

/// Progress notifications emitted while a run advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkflowEvent {
    WorkflowUpdate {
        state: WorkflowState,
        step: usize,
        message: String,
    },
    AnalysisComplete {
        analysis: String,
    },
    PlanComplete {
        plan: Vec<PlanStep>,
    },
    #[serde(rename_all = "camelCase")]
    ExecutionStepStart {
        step_index: usize,
        step: PlanStep,
    },
    #[serde(rename_all = "camelCase")]
    ExecutionStepComplete {
        step_index: usize,
        result: String,
    },
    WorkflowComplete {
        summary: String,
    },
    WorkflowError {
        error: String,
    },
}

/// Receiver of workflow progress. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: WorkflowEvent);
}

impl ProgressSink for mpsc::UnboundedSender<WorkflowEvent> {
    fn emit(&self, event: WorkflowEvent) {
        if self.send(event).is_err() {
            debug!("progress receiver dropped, discarding workflow event");
        }
    }
}

impl<F> ProgressSink for F
where
    F: Fn(WorkflowEvent) + Send + Sync,
{
    fn emit(&self, event: WorkflowEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: WorkflowEvent) {}
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error("invalid workflow transition from {from} to {to}")]
    InvalidTransition {
        from: WorkflowState,
        to: WorkflowState,
    },
    #[error("plan step {0} does not exist")]
    MissingStep(usize),
}

/// State of a single workflow invocation. Created fresh for every run and
/// owned exclusively by it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    question: String,
    state: WorkflowState,
    current_step_index: usize,
    current_execution_step: usize,
    plan: Vec<PlanStep>,
    analysis: String,
    summary: String,
    error_message: Option<String>,
}

impl WorkflowRun {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            state: WorkflowState::Idle,
            current_step_index: 0,
            current_execution_step: 0,
            plan: Vec::new(),
            analysis: String::new(),
            summary: String::new(),
            error_message: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Index into [`WORKFLOW_STAGES`] of the stage last entered.
    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    /// Index of the plan step being (or last) executed.
    pub fn current_execution_step(&self) -> usize {
        self.current_execution_step
    }

    pub fn plan(&self) -> &[PlanStep] {
        &self.plan
    }

    pub fn analysis(&self) -> &str {
        &self.analysis
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn transition(&mut self, next: WorkflowState) -> Result<(), WorkflowError> {
        if !self.state.can_transition_to(next) {
            return Err(WorkflowError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        if let Some(index) = next.stage_index() {
            self.current_step_index = index;
        }
        Ok(())
    }

    /// Move the run into its terminal error state. No-op once terminal.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = WorkflowState::Error;
        self.error_message = Some(message.into());
    }

    pub fn into_outcome(self) -> WorkflowOutcome {
        match self.state {
            WorkflowState::Complete => WorkflowOutcome::Completed {
                analysis: self.analysis,
                plan: self.plan,
                summary: self.summary,
            },
            _ => WorkflowOutcome::Failed {
                error: self
                    .error_message
                    .unwrap_or_else(|| format!("workflow stopped in state {}", self.state)),
            },
        }
    }

    fn step_mut(&mut self, index: usize) -> Result<&mut PlanStep, WorkflowError> {
        self.plan
            .get_mut(index)
            .ok_or(WorkflowError::MissingStep(index))
    }
}

/// What the caller of a workflow gets back. Fallback content is not
/// distinguished from genuine model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Completed {
        analysis: String,
        plan: Vec<PlanStep>,
        summary: String,
    },
    Failed {
        error: String,
    },
}

impl WorkflowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[derive(Serialize)]
struct OutcomeRepr<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<&'a [PlanStep]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for WorkflowOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            Self::Completed {
                analysis,
                plan,
                summary,
            } => OutcomeRepr {
                success: true,
                analysis: Some(analysis),
                plan: Some(plan),
                summary: Some(summary),
                error: None,
            },
            Self::Failed { error } => OutcomeRepr {
                success: false,
                analysis: None,
                plan: None,
                summary: None,
                error: Some(error),
            },
        };
        repr.serialize(serializer)
    }
}

/// Drives a question through analyze, plan, execute and summarize. Each model
/// failure is replaced by a deterministic fallback so the run always reaches
/// a summary.
pub struct AgentWorkflow {
    model: Arc<dyn LanguageModelClient>,
    config: WorkflowConfig,
}

impl AgentWorkflow {
    pub fn new(model: Arc<dyn LanguageModelClient>, config: WorkflowConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub async fn run(&self, question: &str, sink: &dyn ProgressSink) -> WorkflowOutcome {
        self.execute(question, sink).await.into_outcome()
    }

    /// Run the workflow and hand back the finished run, in `Complete` or
    /// `Error` state.
    pub async fn execute(&self, question: &str, sink: &dyn ProgressSink) -> WorkflowRun {
        let mut run = WorkflowRun::new(question);
        if let Err(err) = self.drive(&mut run, sink).await {
            warn!(error = %err, state = %run.state(), "agent workflow failed");
            let message = err.to_string();
            run.fail(message.clone());
            sink.emit(WorkflowEvent::WorkflowError { error: message });
        }
        run
    }

    async fn drive(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) -> Result<(), WorkflowError> {
        if run.question.trim().is_empty() {
            return Err(WorkflowError::EmptyQuestion);
        }

        self.analyze(run, sink).await?;
        self.plan(run, sink).await?;
        self.execute_plan(run, sink).await?;
        self.summarize(run, sink).await?;

        run.transition(WorkflowState::Complete)?;
        info!(steps = run.plan.len(), "agent workflow complete");
        sink.emit(WorkflowEvent::WorkflowComplete {
            summary: run.summary.clone(),
        });
        Ok(())
    }

    async fn analyze(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) -> Result<(), WorkflowError> {
        enter_stage(run, sink, WorkflowState::Analyzing, "Analyzing your question...")?;

        let prompt = prompts::analyze_prompt(&run.question);
        run.analysis = match self.call("analyze", prompt).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "analysis call failed, using fallback analysis");
                fallback_analysis(&run.question)
            }
        };

        sink.emit(WorkflowEvent::AnalysisComplete {
            analysis: run.analysis.clone(),
        });
        Ok(())
    }

    async fn plan(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) -> Result<(), WorkflowError> {
        enter_stage(
            run,
            sink,
            WorkflowState::Planning,
            "Creating a plan to answer your question...",
        )?;

        let prompt = prompts::plan_prompt(&run.question, &run.analysis);
        let plan_text = match self.call("plan", prompt).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "planning call failed, using fallback plan");
                fallback_plan_text(&run.question)
            }
        };

        run.plan = parse_plan_steps(&plan_text);
        debug!(steps = run.plan.len(), "plan parsed");
        sink.emit(WorkflowEvent::PlanComplete {
            plan: run.plan.clone(),
        });
        Ok(())
    }

    async fn execute_plan(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) -> Result<(), WorkflowError> {
        run.transition(WorkflowState::Executing)?;
        let overview = prompts::plan_overview(&run.plan);

        for index in 0..run.plan.len() {
            run.current_execution_step = index;
            let step = {
                let step = run.step_mut(index)?;
                step.status = StepStatus::InProgress;
                step.clone()
            };
            sink.emit(WorkflowEvent::ExecutionStepStart {
                step_index: index,
                step: step.clone(),
            });

            let context = prompts::cumulative_context(&run.plan, index);
            let prompt =
                prompts::execute_step_prompt(&run.question, &overview, index, &step, &context);
            let result = match self.call("execute", prompt).await {
                Ok(text) => text,
                Err(err) => {
                    warn!(step = index + 1, error = %err, "step call failed, using fallback result");
                    fallback_step_result(index, &step)
                }
            };

            let step = run.step_mut(index)?;
            step.result = result.clone();
            step.status = StepStatus::Complete;
            sink.emit(WorkflowEvent::ExecutionStepComplete {
                step_index: index,
                result,
            });
        }
        Ok(())
    }

    async fn summarize(&self, run: &mut WorkflowRun, sink: &dyn ProgressSink) -> Result<(), WorkflowError> {
        enter_stage(run, sink, WorkflowState::Summarizing, "Summarizing the results...")?;

        let prompt = prompts::summarize_prompt(&run.question, &run.plan);
        let raw = match self.call("summarize", prompt).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "summary call failed, using fallback summary");
                fallback_summary(&run.question, &run.plan)
            }
        };

        let mut summary = clean_summary(&raw);
        if summary.is_empty() {
            warn!("summary was empty after cleaning, using fallback summary");
            summary = clean_summary(&fallback_summary(&run.question, &run.plan));
        }
        run.summary = summary;
        Ok(())
    }

    async fn call(&self, stage: &'static str, prompt: String) -> Result<String, TransportError> {
        let turns = [ChatTurn::user(prompt)];
        let response = self
            .model
            .complete(&turns, &self.config.model_options)
            .await?;
        if response.text.trim().is_empty() {
            return Err(TransportError::Decode(format!(
                "model returned an empty reply for the {stage} stage"
            )));
        }
        debug!(stage, chars = response.text.len(), "model reply received");
        Ok(response.text)
    }
}

fn enter_stage(
    run: &mut WorkflowRun,
    sink: &dyn ProgressSink,
    state: WorkflowState,
    message: &str,
) -> Result<(), WorkflowError> {
    run.transition(state)?;
    info!(state = %state, "workflow stage started");
    sink.emit(WorkflowEvent::WorkflowUpdate {
        state,
        step: run.current_step_index,
        message: message.to_string(),
    });
    Ok(())
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn fallback_analysis(question: &str) -> String {
    format!(
        "Analysis of question: \"{question}\"\n\nMain topic: {}\nQuestion type: Complex inquiry\nRequired knowledge: General knowledge",
        truncate_chars(question, 30)
    )
}

fn fallback_plan_text(question: &str) -> String {
    format!(
        "1. Research: Gather information about {}\n2. Analyze: Evaluate the key aspects\n3. Summarize: Create a comprehensive answer",
        truncate_chars(question, 20)
    )
}

fn fallback_step_result(index: usize, step: &PlanStep) -> String {
    format!(
        "Completed step {}: {}\n\nThis step was processed with limited information due to a technical issue. The key points have been identified and the process can continue.",
        index + 1,
        step.title
    )
}

fn fallback_summary(question: &str, plan: &[PlanStep]) -> String {
    let insights = plan
        .iter()
        .map(|step| {
            if step.result.trim().is_empty() {
                format!("{}: no detailed results available.", step.title)
            } else {
                truncate_chars(&step.result, 200)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "To answer your question: {}\n\n{insights}\n\nI hope this addresses your question. Please let me know if you need any clarification or have follow-up questions.",
        truncate_chars(question, 50)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language_model::LanguageModelResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Mutex as TokioMutex;

    struct ScriptedModel {
        responses: TokioMutex<VecDeque<Result<String, TransportError>>>,
        prompts: StdMutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<String, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: TokioMutex::new(responses.into()),
                prompts: StdMutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModelClient for ScriptedModel {
        async fn complete(
            &self,
            turns: &[ChatTurn],
            _options: &ModelOptions,
        ) -> Result<LanguageModelResponse, TransportError> {
            self.prompts.lock().unwrap().push(turns[0].content.clone());
            let mut guard = self.responses.lock().await;
            let next = guard
                .pop_front()
                .expect("scripted model ran out of responses");
            next.map(LanguageModelResponse::new)
        }
    }

    fn ok(text: &str) -> Result<String, TransportError> {
        Ok(text.to_string())
    }

    fn network_down() -> Result<String, TransportError> {
        Err(TransportError::Network("connection refused".into()))
    }

    #[test]
    fn transitions_only_move_forward() {
        let mut run = WorkflowRun::new("q");
        assert!(run.transition(WorkflowState::Planning).is_err());
        run.transition(WorkflowState::Analyzing).unwrap();
        assert_eq!(run.current_step_index(), 0);
        run.transition(WorkflowState::Planning).unwrap();
        assert_eq!(run.current_step_index(), 1);
        let err = run.transition(WorkflowState::Analyzing).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::InvalidTransition {
                from: WorkflowState::Planning,
                to: WorkflowState::Analyzing,
            }
        );
        run.transition(WorkflowState::Error).unwrap();
        assert!(run.transition(WorkflowState::Executing).is_err());
        assert!(run.transition(WorkflowState::Error).is_err());
    }

    #[test]
    fn fail_is_terminal_and_keeps_first_message() {
        let mut run = WorkflowRun::new("q");
        run.fail("boom");
        run.fail("second");
        assert_eq!(run.state(), WorkflowState::Error);
        assert_eq!(run.error_message(), Some("boom"));
        assert_eq!(
            run.into_outcome(),
            WorkflowOutcome::Failed {
                error: "boom".to_string()
            }
        );
    }

    #[test]
    fn outcome_serializes_with_success_flag() {
        let completed = WorkflowOutcome::Completed {
            analysis: "a".into(),
            plan: vec![PlanStep::new(1, "t", "")],
            summary: "s".into(),
        };
        let value = serde_json::to_value(&completed).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["plan"][0]["status"], "pending");
        assert!(value.get("error").is_none());

        let failed = WorkflowOutcome::Failed { error: "e".into() };
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value, serde_json::json!({ "success": false, "error": "e" }));
    }

    #[test]
    fn events_serialize_with_kebab_case_tags() {
        let event = WorkflowEvent::ExecutionStepComplete {
            step_index: 2,
            result: "done".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "execution-step-complete");
        assert_eq!(value["stepIndex"], 2);

        let update = WorkflowEvent::WorkflowUpdate {
            state: WorkflowState::Planning,
            step: 1,
            message: "m".into(),
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["type"], "workflow-update");
        assert_eq!(value["state"], "planning");
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("ééééé", 2), "éé...");
    }

    #[test]
    fn fallback_plan_parses_into_three_steps() {
        let plan = parse_plan_steps(&fallback_plan_text("How do tides work on other planets?"));
        assert_eq!(plan.len(), 3);
        assert!(plan[0].title.starts_with("Research: Gather information about How do tides"));
        assert_eq!(plan[2].title, "Summarize: Create a comprehensive answer");
    }

    #[tokio::test]
    async fn happy_path_stores_every_artifact() {
        let model = ScriptedModel::new(vec![
            ok("Topic: caching"),
            ok("1. Measure\nProfile the service\n2. Fix\nAdd a cache"),
            ok("p99 is 900ms"),
            ok("Added an LRU cache"),
            ok("Based on my analysis, latency dropped to 120ms."),
        ]);
        let workflow = AgentWorkflow::new(model.clone(), WorkflowConfig::default());

        let run = workflow
            .execute("How should I optimize this slow service?", &NoopSink)
            .await;

        assert_eq!(run.state(), WorkflowState::Complete);
        assert_eq!(run.analysis(), "Topic: caching");
        assert_eq!(run.plan().len(), 2);
        assert_eq!(run.plan()[0].description, "Profile the service");
        assert_eq!(run.plan()[1].result, "Added an LRU cache");
        assert!(run.plan().iter().all(|s| s.status == StepStatus::Complete));
        assert_eq!(run.current_execution_step(), 1);
        assert_eq!(run.current_step_index(), 3);
        assert_eq!(run.summary(), "Latency dropped to 120ms.");

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 5);
        assert!(prompts[1].contains("\"Topic: caching\""));
        assert!(prompts[3].contains("p99 is 900ms"));
        assert!(prompts[4].contains("Result: Added an LRU cache"));
    }

    #[tokio::test]
    async fn blank_replies_are_replaced_by_fallbacks() {
        let model = ScriptedModel::new(vec![ok("   "), ok(""), ok(" "), ok(""), ok(""), ok("")]);
        let workflow = AgentWorkflow::new(model, WorkflowConfig::default());

        let run = workflow
            .execute("Explain how rainbows form in the sky", &NoopSink)
            .await;

        assert_eq!(run.state(), WorkflowState::Complete);
        assert!(run.analysis().starts_with("Analysis of question:"));
        assert_eq!(run.plan().len(), 3);
        assert!(run.plan()[0].result.starts_with("Completed step 1:"));
        assert!(run.summary().starts_with("To answer your question:"));
    }

    #[tokio::test]
    async fn summary_that_cleans_to_nothing_uses_fallback() {
        let model = ScriptedModel::new(vec![
            ok("analysis"),
            ok("1. Only step"),
            ok("step output"),
            ok("In conclusion"),
        ]);
        let workflow = AgentWorkflow::new(model, WorkflowConfig::default());

        let run = workflow
            .execute("Design a schema for a small library", &NoopSink)
            .await;

        assert!(run.summary().starts_with("To answer your question:"));
        assert!(run.summary().contains("step output"));
    }

    #[tokio::test]
    async fn empty_question_fails_the_run() {
        let model = ScriptedModel::new(vec![]);
        let workflow = AgentWorkflow::new(model.clone(), WorkflowConfig::default());
        let events = StdMutex::new(Vec::new());
        let sink = |event: WorkflowEvent| events.lock().unwrap().push(event);

        let outcome = workflow.run("   ", &sink).await;

        assert_eq!(
            outcome,
            WorkflowOutcome::Failed {
                error: "question must not be empty".to_string()
            }
        );
        assert_eq!(
            events.into_inner().unwrap(),
            vec![WorkflowEvent::WorkflowError {
                error: "question must not be empty".to_string()
            }]
        );
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn transport_failures_never_abort_the_run() {
        let model = ScriptedModel::new(vec![
            network_down(),
            ok("1. Alpha\n2. Beta"),
            network_down(),
            ok("beta done"),
            network_down(),
        ]);
        let workflow = AgentWorkflow::new(model.clone(), WorkflowConfig::default());

        let outcome = workflow
            .run("Compare two approaches to caching", &NoopSink)
            .await;

        let WorkflowOutcome::Completed { plan, summary, .. } = outcome else {
            panic!("expected a completed workflow");
        };
        assert_eq!(plan[0].result.lines().next(), Some("Completed step 1: Alpha"));
        assert_eq!(plan[1].result, "beta done");
        assert!(summary.contains("beta done"));
        assert!(model.prompts()[3].contains("Completed step 1: Alpha"));
    }
}
