//! Validate command

use anyhow::Result;
use colored::*;
use stagecoach_core::Pipeline;

use super::load_pipeline;

pub fn handle_validate(file: &str) -> Result<()> {
    let pipeline = load_pipeline(file)?;

    println!("{}", format!("✓ {} is valid", file).green().bold());
    println!();
    print!("{}", summarize(&pipeline));
    Ok(())
}

/// Lists each stage with the tasks assigned to it
fn summarize(pipeline: &Pipeline) -> String {
    let mut out = String::new();

    if !pipeline.image.is_empty() {
        out.push_str(&format!("{} {}\n", "Image:".bold(), pipeline.image));
    }
    out.push_str(&format!(
        "{} {} stage(s), {} task(s)\n",
        "Pipeline:".bold(),
        pipeline.stages.len(),
        pipeline.tasks.len()
    ));

    for stage in &pipeline.stages {
        out.push_str(&format!("  {}\n", stage.cyan()));
        for task in pipeline.tasks_for_stage(stage) {
            let mut notes = Vec::new();
            if let Some(task_ref) = task.task_ref() {
                notes.push(format!("taskRef {}", task_ref));
            }
            if !task.jobs().is_empty() {
                notes.push(format!("{} jobs", task.jobs().len()));
            }
            if !task.rules.is_empty() {
                notes.push(format!("{} rule(s)", task.rules.len()));
            }
            if !task.artifacts.paths.is_empty() {
                notes.push("artifacts".to_string());
            }

            if notes.is_empty() {
                out.push_str(&format!("    - {}\n", task.name));
            } else {
                out.push_str(&format!("    - {} ({})\n", task.name, notes.join(", ")));
            }
        }
    }

    let orphaned: Vec<&str> = pipeline
        .tasks
        .iter()
        .filter(|t| !pipeline.stages.contains(&t.stage))
        .map(|t| t.name.as_str())
        .collect();
    if !orphaned.is_empty() {
        out.push_str(&format!(
            "{} tasks in undeclared stages are never run: {}\n",
            "Warning:".yellow().bold(),
            orphaned.join(", ")
        ));
    }

    out
}
