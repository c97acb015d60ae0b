use std::io::{self, Write};

use core_sim::{Action, EpisodeController, EpisodeStatus, PositionLedger};

use crate::logging::{RunLogEvent, RunLogEventKind, RunLogWriter};

pub const REPLAY_CSV_HEADER: &str = "step,price,action,pnl,pnl_pct,open_long,open_short\n";

/// Writes an episode's price path as one CSV row per recorded price. The
/// action column is blank for a price no action was taken at.
pub struct ReplayCsvWriter<W: Write> {
    writer: W,
}

impl<W: Write> ReplayCsvWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        self.writer.write_all(REPLAY_CSV_HEADER.as_bytes())
    }

    /// Replays the controller's history through a fresh ledger so every row
    /// carries the PnL and open positions right after that step. Returns the
    /// number of rows written.
    pub fn append_episode(&mut self, controller: &EpisodeController) -> io::Result<usize> {
        let prices = controller.price_history();
        let actions = controller.action_history();
        let mut ledger = PositionLedger::new(controller.config().allow_multiple_units);

        for (step, price) in prices.iter().enumerate() {
            ledger.record_price(*price);
            let action = actions.get(step).copied();
            if let Some(action) = action {
                ledger
                    .apply(action)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            }
            if step + 1 == prices.len() && controller.status() == EpisodeStatus::Done {
                ledger.close_all();
            }
            self.write_row(step, *price, action, &ledger)?;
        }
        Ok(prices.len())
    }

    /// Writes header and rows, flushing before the artifact is logged under
    /// the caller's `episode` index.
    pub fn write_episode_and_log(
        &mut self,
        episode: u64,
        controller: &EpisodeController,
        run_log_writer: &mut dyn RunLogWriter,
    ) -> io::Result<usize> {
        self.write_header()?;
        let rows = self.append_episode(controller)?;
        self.writer.flush()?;
        run_log_writer.write(
            RunLogEvent::new(
                episode,
                controller.step_count(),
                RunLogEventKind::ReplayArtifactWritten,
            )
            .with_value(rows as f64),
        );
        Ok(rows)
    }

    fn write_row(
        &mut self,
        step: usize,
        price: f64,
        action: Option<Action>,
        ledger: &PositionLedger,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "{step},{price},{},{},{},{},{}",
            action.map(Action::as_str).unwrap_or_default(),
            ledger.pnl(),
            ledger.pnl_pct(),
            ledger.open_long().len(),
            ledger.open_short().len(),
        )
    }
}
