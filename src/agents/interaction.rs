use crate::error::{DepshiftError, Result};
use crate::plan::UpdateBatch;
use colored::Colorize;
use std::io::{self, BufRead, Write};

/// What the user answered for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Apply,
    Skip,
    ApplyAll,
    Quit,
}

fn parse_decision(input: &str) -> Option<Decision> {
    match input.trim().to_lowercase().as_str() {
        "" | "y" | "yes" => Some(Decision::Apply),
        "n" | "no" => Some(Decision::Skip),
        "a" | "all" => Some(Decision::ApplyAll),
        "q" | "quit" => Some(Decision::Quit),
        _ => None,
    }
}

/// Asks the user to confirm each batch before it is applied.
pub struct BatchInteraction {
    enabled: bool,
    apply_all: bool,
}

impl BatchInteraction {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            apply_all: false,
        }
    }

    /// Confirm a batch on stdin. Non-interactive mode always confirms.
    pub fn confirm_batch(&mut self, batch: &UpdateBatch) -> Result<bool> {
        let stdin = io::stdin();
        self.confirm_with(batch, &mut stdin.lock())
    }

    fn confirm_with(&mut self, batch: &UpdateBatch, input: &mut dyn BufRead) -> Result<bool> {
        if !self.enabled || self.apply_all {
            return Ok(true);
        }

        println!(
            "\n{} {} {}",
            format!("[{}]", batch.id).cyan().bold(),
            format!("tier {}", batch.tier).dimmed(),
            format!("risk {}", batch.risk).dimmed()
        );
        for item in &batch.items {
            println!(
                "  • {} {} → {}",
                item.name.white().bold(),
                item.current_version.red(),
                item.target_version.green()
            );
        }

        loop {
            print!("{}", "Apply this batch? [Y/n/a/q]: ".bold());
            io::stdout().flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Err(DepshiftError::UserCancelled);
            }

            match parse_decision(&line) {
                Some(Decision::Apply) => return Ok(true),
                Some(Decision::Skip) => {
                    println!("{}", "Skipping this batch.".dimmed());
                    return Ok(false);
                }
                Some(Decision::ApplyAll) => {
                    println!("{}", "Applying this and all remaining batches.".green().bold());
                    self.apply_all = true;
                    return Ok(true);
                }
                Some(Decision::Quit) => return Err(DepshiftError::UserCancelled),
                None => println!(
                    "{}",
                    "Please answer with y(es), n(o), a(ll), or q(uit).".red()
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanItem;
    use crate::plan::model::{PriorityTier, RiskLevel};
    use std::io::Cursor;

    fn batch() -> UpdateBatch {
        UpdateBatch {
            id: "major-1".into(),
            items: vec![PlanItem::new("react", "^17.0.2", "^18.2.0", 100)],
            tier: PriorityTier::Major,
            risk: RiskLevel::High,
        }
    }

    #[test]
    fn disabled_interaction_always_confirms() {
        let mut interaction = BatchInteraction::new(false);
        let mut input = Cursor::new(Vec::new());
        assert!(interaction.confirm_with(&batch(), &mut input).unwrap());
    }

    #[test]
    fn reprompts_on_garbage_then_skips() {
        let mut interaction = BatchInteraction::new(true);
        let mut input = Cursor::new(b"maybe\nn\n".to_vec());
        assert!(!interaction.confirm_with(&batch(), &mut input).unwrap());
    }

    #[test]
    fn apply_all_stops_prompting() {
        let mut interaction = BatchInteraction::new(true);
        let mut input = Cursor::new(b"a\n".to_vec());
        assert!(interaction.confirm_with(&batch(), &mut input).unwrap());

        let mut empty = Cursor::new(Vec::new());
        assert!(interaction.confirm_with(&batch(), &mut empty).unwrap());
    }

    #[test]
    fn quit_and_eof_cancel() {
        let mut interaction = BatchInteraction::new(true);
        let mut quit = Cursor::new(b"q\n".to_vec());
        assert!(matches!(
            interaction.confirm_with(&batch(), &mut quit),
            Err(DepshiftError::UserCancelled)
        ));

        let mut eof = Cursor::new(Vec::new());
        assert!(matches!(
            interaction.confirm_with(&batch(), &mut eof),
            Err(DepshiftError::UserCancelled)
        ));
    }

    #[test]
    fn blank_answer_means_yes() {
        assert_eq!(parse_decision("\n"), Some(Decision::Apply));
        assert_eq!(parse_decision(" ALL "), Some(Decision::ApplyAll));
        assert_eq!(parse_decision("x"), None);
    }
}
