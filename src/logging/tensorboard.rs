//! Tensorboard logger
use super::{EpochSummary, TrainLogger};
use std::fmt;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Logger that saves epoch losses to a tensorboard event file.
pub struct TensorBoardLogger {
    writer: SummaryWriter,
}

impl fmt::Debug for TensorBoardLogger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TensorBoardLogger").finish()
    }
}

impl TensorBoardLogger {
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Self {
        Self {
            writer: SummaryWriter::new(log_dir),
        }
    }
}

impl TrainLogger for TensorBoardLogger {
    #[allow(clippy::cast_possible_truncation)]
    fn log_epoch(&mut self, summary: &EpochSummary) {
        self.writer
            .add_scalar("loss/train", summary.train_loss as f32, summary.epoch);
        if let Some(test_loss) = summary.test_loss {
            self.writer
                .add_scalar("loss/test", test_loss as f32, summary.epoch);
        }
        self.writer.add_scalar(
            "time/epoch_seconds",
            summary.elapsed.as_secs_f32(),
            summary.epoch,
        );
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}
