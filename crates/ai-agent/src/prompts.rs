//! Instruction text for each workflow stage. Every function returns the
//! complete content of the single user turn sent for that stage.

use crate::plan::PlanStep;

pub fn analyze_prompt(question: &str) -> String {
    format!(
        r#"Analyze the following question in detail:
"{question}"

Identify:
1. The main topic or subject
2. The specific task or question type
3. Any constraints or requirements
4. Required knowledge domains
5. Potential sub-questions that need to be answered

Format your response as a structured analysis without any introduction or conclusion."#
    )
}

pub fn plan_prompt(question: &str, analysis: &str) -> String {
    format!(
        r#"Based on this analysis of the question:
"{analysis}"

Create a step-by-step plan to answer the original question:
"{question}"

For each step:
1. Provide a clear title
2. Explain what needs to be done
3. Specify what information or result should be produced

Format your response as a numbered list of steps without any introduction or conclusion.
Limit your plan to 3-5 concrete steps."#
    )
}

/// One line per step, `"<position>. <title>: <description>"`.
pub fn plan_overview(plan: &[PlanStep]) -> String {
    plan.iter()
        .enumerate()
        .map(|(idx, step)| {
            if step.description.is_empty() {
                format!("{}. {}", idx + 1, step.title)
            } else {
                format!("{}. {}: {}", idx + 1, step.title, step.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Results of the first `completed` steps, in order, for later step prompts.
pub fn cumulative_context(plan: &[PlanStep], completed: usize) -> String {
    plan.iter()
        .take(completed)
        .enumerate()
        .map(|(idx, step)| format!("Step {}: {}\n{}", idx + 1, step.title, step.result))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn execute_step_prompt(
    question: &str,
    plan_overview: &str,
    step_index: usize,
    step: &PlanStep,
    cumulative_context: &str,
) -> String {
    let position = step_index + 1;
    let mut prompt = format!(
        r#"You are executing step {position} of a plan to answer this question:
"{question}"

The full plan is:
{plan_overview}

Your current task is:
Step {position}: {title}
{description}
"#,
        title = step.title,
        description = step.description,
    );

    if step_index > 0 && !cumulative_context.is_empty() {
        prompt.push_str("\nPrevious steps' results:\n\n");
        prompt.push_str(cumulative_context);
        prompt.push('\n');
    }

    prompt.push_str(
        r#"
Execute this step thoroughly and provide a detailed result.
Build upon the previous steps' results if available.
Focus on generating content that will be useful for subsequent steps.
Do not repeat information that has already been covered in previous steps."#,
    );
    prompt
}

pub fn summarize_prompt(question: &str, plan: &[PlanStep]) -> String {
    let results = plan
        .iter()
        .enumerate()
        .map(|(idx, step)| format!("Step {}: {}\nResult: {}", idx + 1, step.title, step.result))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Based on the completed plan to answer this question:
"{question}"

With these step-by-step results:
{results}

Provide a comprehensive final answer to the original question.
Make sure to integrate insights from all steps.
Format your response in a clear, well-structured way.

IMPORTANT:
- Your answer should be a cohesive, standalone response that directly addresses the original question
- Do NOT include any meta-commentary about the analysis process
- Do NOT start with phrases like "Based on my analysis..." or "After executing the plan..."
- Do NOT mention steps, analysis, or the workflow in your answer
- Simply provide a clear, comprehensive, and well-structured answer as if you had known it all along
- Use appropriate formatting like paragraphs, bullet points, or numbered lists where relevant"#
    )
}
