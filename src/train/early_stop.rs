/*!
Patience-based early stopping
*/

/// What the controller decided after seeing an epoch's validation cost
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Verdict {
    /// The cost strictly improved on the best seen so far: snapshot the model
    Improved,
    /// No improvement, but patience is not yet exhausted
    Stalled,
    /// No improvement and patience is exhausted: stop training now
    Stopped,
}

/// Tracks the best validation cost seen and how long it has been since it improved
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EarlyStopping {
    /// How many consecutive non-improving epochs are tolerated
    pub patience: usize,
    /// The best cost seen so far; `+inf` before the first epoch
    pub best_cost: f64,
    /// The epoch at which `best_cost` was observed
    pub best_epoch: Option<usize>,
    /// Consecutive epochs without improvement
    pub stall_count: usize,
}

impl EarlyStopping {
    /// A fresh controller
    pub fn new(patience: usize) -> EarlyStopping {
        EarlyStopping {
            patience,
            best_cost: f64::INFINITY,
            best_epoch: None,
            stall_count: 0,
        }
    }
    /// Feed one epoch's validation cost to the controller
    pub fn observe(&mut self, epoch: usize, cost: f64) -> Verdict {
        if cost < self.best_cost {
            self.best_cost = cost;
            self.best_epoch = Some(epoch);
            self.stall_count = 0;
            Verdict::Improved
        } else {
            self.stall_count += 1;
            if self.stall_count > self.patience {
                Verdict::Stopped
            } else {
                Verdict::Stalled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run a cost sequence through a controller, returning the epoch at which it stopped, if it did
    fn run(patience: usize, costs: &[f64]) -> (EarlyStopping, Option<usize>) {
        let mut stop = EarlyStopping::new(patience);
        for (epoch, &cost) in costs.iter().enumerate() {
            if stop.observe(epoch, cost) == Verdict::Stopped {
                return (stop, Some(epoch));
            }
        }
        (stop, None)
    }

    #[test]
    fn stops_after_patience_plus_one_stalls() {
        let patience = 3;
        // improves through epoch 2, then strictly worsens
        let costs = [0.9, 0.5, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];
        let (stop, stopped) = run(patience, &costs);
        assert_eq!(stopped, Some(2 + patience + 1));
        assert_eq!(stop.best_epoch, Some(2));
        assert_eq!(stop.best_cost, 0.2);
    }

    #[test]
    fn ties_do_not_count_as_improvement() {
        let (stop, stopped) = run(1, &[0.5, 0.5, 0.5]);
        assert_eq!(stopped, Some(2));
        assert_eq!(stop.best_epoch, Some(0));
    }

    #[test]
    fn improvement_resets_the_stall_count() {
        let (stop, stopped) = run(2, &[1.0, 1.1, 1.2, 0.8, 0.9, 0.95]);
        assert_eq!(stopped, None);
        assert_eq!(stop.best_epoch, Some(3));
        assert_eq!(stop.stall_count, 2);
    }

    #[test]
    fn large_losses_still_improve() {
        // losses far above one are a legitimate starting point
        let (stop, _) = run(0, &[1250.0]);
        assert_eq!(stop.best_epoch, Some(0));
    }

    #[test]
    fn best_cost_is_monotone() {
        let mut stop = EarlyStopping::new(100);
        let mut last = stop.best_cost;
        for (epoch, cost) in [0.4, 0.7, 0.3, 0.35, 0.1, 0.9, 0.05].iter().enumerate() {
            stop.observe(epoch, *cost);
            assert!(stop.best_cost <= last);
            last = stop.best_cost;
        }
        assert_eq!(last, 0.05);
    }
}
