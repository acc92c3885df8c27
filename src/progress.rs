/// What the presentation layer should do after a progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTick {
    pub percent: u8,
    /// Whether a visualization refresh is due.
    pub refresh: bool,
}

/// Turns epoch counters into percentages and decides which reports deserve a
/// visualization refresh.
///
/// A refresh is due on the first report whose percentage reaches the next
/// unvisited multiple of ten, so every decile gets one even when the epoch
/// total does not divide evenly. The zeroth decile is left to the baseline
/// render done at session start.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    epochs_total: usize,
    percent: u8,
    next_milestone: u8,
}

impl ProgressReporter {
    const STEP: u8 = 10;

    pub fn new(epochs_total: usize) -> Self {
        Self {
            epochs_total,
            percent: 0,
            next_milestone: Self::STEP,
        }
    }

    pub fn epochs_total(&self) -> usize {
        self.epochs_total
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Reports that the 0-based epoch `epoch` has finished.
    ///
    /// The percentage never decreases and stays below 100 until
    /// [`ProgressReporter::on_complete`].
    pub fn on_progress(&mut self, epoch: usize) -> ProgressTick {
        let total = self.epochs_total.max(1) as u128;
        let raw = (100 * epoch as u128 / total).min(99) as u8;
        self.advance(raw)
    }

    /// Reports normal completion: always 100% and always a refresh.
    pub fn on_complete(&mut self) -> ProgressTick {
        self.percent = 100;
        self.next_milestone = u8::MAX;
        ProgressTick {
            percent: 100,
            refresh: true,
        }
    }

    fn advance(&mut self, raw: u8) -> ProgressTick {
        self.percent = self.percent.max(raw);

        let refresh = self.percent >= self.next_milestone;
        if refresh {
            self.next_milestone = (self.percent / Self::STEP + 1) * Self::STEP;
        }

        ProgressTick {
            percent: self.percent,
            refresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refreshes(total: usize, epochs: impl IntoIterator<Item = usize>) -> Vec<u8> {
        let mut reporter = ProgressReporter::new(total);
        epochs
            .into_iter()
            .map(|e| reporter.on_progress(e))
            .filter(|tick| tick.refresh)
            .map(|tick| tick.percent)
            .collect()
    }

    #[test]
    fn percent_is_floored() {
        let mut reporter = ProgressReporter::new(3);
        assert_eq!(reporter.on_progress(0).percent, 0);
        assert_eq!(reporter.on_progress(1).percent, 33);
        assert_eq!(reporter.on_progress(2).percent, 66);
    }

    #[test]
    fn worker_cadence_refreshes_every_decile() {
        let epochs = (0..10_000).filter(|e| e % 100 == 0 || *e == 9_999);
        assert_eq!(
            refreshes(10_000, epochs),
            vec![10, 20, 30, 40, 50, 60, 70, 80, 90]
        );
    }

    #[test]
    fn uneven_totals_still_visit_each_decile_once() {
        // 0, 14, 28, 42, 57, 71 and 85 percent.
        let epochs = (0..7).collect::<Vec<_>>();
        assert_eq!(refreshes(7, epochs), vec![14, 28, 42, 57, 71, 85]);

        // 333 epochs reported every 100: 0, 30, 60, 90 and 99 percent.
        assert_eq!(refreshes(333, [0, 100, 200, 300, 332]), vec![30, 60, 90]);
    }

    #[test]
    fn percent_never_decreases() {
        let mut reporter = ProgressReporter::new(100);
        assert_eq!(reporter.on_progress(50).percent, 50);
        assert_eq!(reporter.on_progress(20).percent, 50);
    }

    #[test]
    fn only_completion_reaches_one_hundred() {
        let mut reporter = ProgressReporter::new(1);
        assert_eq!(reporter.on_progress(0).percent, 0);
        assert_eq!(reporter.on_progress(5).percent, 99);
        assert_eq!(
            reporter.on_complete(),
            ProgressTick {
                percent: 100,
                refresh: true
            }
        );
    }
}
