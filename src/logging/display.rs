//! Command-line logger
use super::{EpochSummary, TrainLogger};
use crate::utils::fmt::PrettyPrint;
use std::fmt;
use yansi::Paint;

/// Logger that displays a summary line per epoch on standard output.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DisplayLogger;

impl TrainLogger for DisplayLogger {
    fn log_epoch(&mut self, summary: &EpochSummary) {
        println!("{}", DisplaySummary(summary));
    }
}

#[derive(Debug)]
struct DisplaySummary<'a>(&'a EpochSummary);

impl<'a> fmt::Display for DisplaySummary<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = self.0;
        write!(
            f,
            "{} {:>4}/{:<4} loss {:.4}",
            Paint::fixed(35, "epoch"),
            s.epoch + 1,
            s.num_epochs,
            PrettyPrint(s.train_loss)
        )?;
        if s.num_batches > 1 {
            write!(
                f,
                " {}",
                Paint::fixed(8, format!("(σ {:.4})", PrettyPrint(s.train_loss_stddev)))
            )?;
        }
        if let Some(test_loss) = s.test_loss {
            write!(
                f,
                "  test {}",
                Paint::fixed(221, format!("{:.4}", PrettyPrint(test_loss)))
            )?;
        }
        write!(
            f,
            "  {} batches  {}",
            s.num_batches,
            Paint::fixed(111, format!("{:.3}", PrettyPrint(s.elapsed)))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn summary_line() {
        Paint::disable();
        let summary = EpochSummary {
            epoch: 0,
            num_epochs: 5,
            train_loss: 0.5,
            train_loss_stddev: 0.125,
            test_loss: Some(0.75),
            num_batches: 2,
            elapsed: Duration::from_millis(10),
        };
        let line = DisplaySummary(&summary).to_string();
        assert!(line.starts_with("epoch    1/5    loss 0.5000"));
        assert!(line.contains("(σ 0.1250)"));
        assert!(line.contains("test 0.7500"));
        assert!(line.contains("2 batches"));
    }
}
