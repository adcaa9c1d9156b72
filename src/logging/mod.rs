//! Reporting of training progress
mod display;
mod tensorboard;

pub use display::DisplayLogger;
pub use tensorboard::TensorBoardLogger;

use std::time::Duration;

/// Statistics of one completed training epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    /// Zero-based epoch index.
    pub epoch: usize,
    /// Total number of epochs in the run.
    pub num_epochs: usize,
    /// Mean training loss over the batches of the epoch.
    pub train_loss: f64,
    /// Standard deviation of the training loss over the batches of the epoch.
    pub train_loss_stddev: f64,
    /// Mean loss on held-out pairs at the end of the epoch, if any were given.
    pub test_loss: Option<f64>,
    pub num_batches: usize,
    pub elapsed: Duration,
}

/// Observer of training progress, notified once at the end of every epoch.
pub trait TrainLogger {
    fn log_epoch(&mut self, summary: &EpochSummary);

    /// Write out anything still buffered.
    #[inline]
    fn flush(&mut self) {}
}

/// Logger that does nothing
impl TrainLogger for () {
    #[inline]
    fn log_epoch(&mut self, _: &EpochSummary) {}
}

impl<T: TrainLogger + ?Sized> TrainLogger for &'_ mut T {
    #[inline]
    fn log_epoch(&mut self, summary: &EpochSummary) {
        T::log_epoch(self, summary)
    }
    #[inline]
    fn flush(&mut self) {
        T::flush(self)
    }
}

impl<T: TrainLogger + ?Sized> TrainLogger for Box<T> {
    #[inline]
    fn log_epoch(&mut self, summary: &EpochSummary) {
        T::log_epoch(self, summary)
    }
    #[inline]
    fn flush(&mut self) {
        T::flush(self)
    }
}

/// Log to both loggers.
impl<A: TrainLogger, B: TrainLogger> TrainLogger for (A, B) {
    fn log_epoch(&mut self, summary: &EpochSummary) {
        self.0.log_epoch(summary);
        self.1.log_epoch(summary);
    }
    fn flush(&mut self) {
        self.0.flush();
        self.1.flush();
    }
}

/// Logger that keeps every epoch summary in memory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LossRecorder {
    pub summaries: Vec<EpochSummary>,
}

impl LossRecorder {
    /// Mean training loss of each recorded epoch.
    pub fn train_losses(&self) -> Vec<f64> {
        self.summaries.iter().map(|s| s.train_loss).collect()
    }
}

impl TrainLogger for LossRecorder {
    fn log_epoch(&mut self, summary: &EpochSummary) {
        self.summaries.push(summary.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(epoch: usize, train_loss: f64) -> EpochSummary {
        EpochSummary {
            epoch,
            num_epochs: 3,
            train_loss,
            train_loss_stddev: 0.0,
            test_loss: None,
            num_batches: 1,
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn pair_logs_to_both() {
        let mut loggers = (LossRecorder::default(), LossRecorder::default());
        loggers.log_epoch(&summary(0, 0.5));
        loggers.log_epoch(&summary(1, 0.25));
        assert_eq!(loggers.0.train_losses(), vec![0.5, 0.25]);
        assert_eq!(loggers.0, loggers.1);
    }

    #[test]
    fn dyn_logger() {
        let mut recorder = LossRecorder::default();
        {
            let mut logger: Box<dyn TrainLogger + '_> = Box::new(&mut recorder);
            logger.log_epoch(&summary(0, 1.0));
            logger.flush();
        }
        assert_eq!(recorder.summaries.len(), 1);
    }
}
