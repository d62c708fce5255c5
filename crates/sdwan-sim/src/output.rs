//! Output formatting

use clap::ValueEnum;
use sdwan_path::{Evaluation, FlowOutcome, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn print(&self, evaluation: &Evaluation) -> Result<()> {
        println!("{}", self.render(evaluation)?);
        Ok(())
    }

    pub fn render(&self, evaluation: &Evaluation) -> Result<String> {
        match self {
            OutputFormat::Json => evaluation.to_json(),
            OutputFormat::Text => Ok(evaluation
                .iter()
                .map(|(id, outcome)| match outcome {
                    FlowOutcome::Routed(result) => format!(
                        "Flow {}: Path: {} | Score: {:.1}",
                        id,
                        result.path.join(" -> "),
                        result.score
                    ),
                    FlowOutcome::Failed { error } => {
                        format!("Flow {}: unroutable ({:?})", id, error)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }
}
