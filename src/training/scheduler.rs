/// Exponentially decaying learning rate scheduler

/// Exponential decay scheduler configuration
#[derive(Debug, Clone)]
pub struct ExponentialDecayConfig {
    /// Learning rate at step 0
    pub max_lr: f64,
    /// Asymptotic learning rate
    pub min_lr: f64,
    /// Steps for the gap to shrink by a factor of e
    pub decay_speed: f64,
}

impl Default for ExponentialDecayConfig {
    fn default() -> Self {
        Self {
            max_lr: 0.005,
            min_lr: 0.0001,
            decay_speed: 100.0,
        }
    }
}

impl ExponentialDecayConfig {
    /// Derive the decay speed from the training set size
    ///
    /// `decay_speed = decay_coefficient * n_train / batch_size`
    pub fn from_dataset(
        max_lr: f64,
        min_lr: f64,
        decay_coefficient: f64,
        n_train: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            max_lr,
            min_lr,
            decay_speed: decay_coefficient * n_train as f64 / batch_size.max(1) as f64,
        }
    }
}

/// Exponential decay scheduler
///
/// `lr = min_lr + (max_lr - min_lr) * exp(-step / decay_speed)`
pub struct ExponentialDecayScheduler {
    config: ExponentialDecayConfig,
    current_step: usize,
}

impl ExponentialDecayScheduler {
    /// Create new scheduler
    pub fn new(config: ExponentialDecayConfig) -> Self {
        Self {
            config,
            current_step: 0,
        }
    }

    /// Get learning rate for current step
    pub fn get_lr(&self) -> f64 {
        self.get_lr_at_step(self.current_step)
    }

    /// Get learning rate for a specific step
    pub fn get_lr_at_step(&self, step: usize) -> f64 {
        let range = self.config.max_lr - self.config.min_lr;
        // A zero decay speed (empty training set) keeps the rate at its maximum
        if self.config.decay_speed <= 0.0 {
            return self.config.max_lr;
        }
        self.config.min_lr + range * (-(step as f64) / self.config.decay_speed).exp()
    }

    /// Step the scheduler (increment step counter)
    pub fn step(&mut self) {
        self.current_step += 1;
    }

    /// Get current step
    pub fn get_step(&self) -> usize {
        self.current_step
    }

    /// Reset scheduler to initial state
    pub fn reset(&mut self) {
        self.current_step = 0;
    }

    pub fn config(&self) -> &ExponentialDecayConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_values() {
        let scheduler = ExponentialDecayScheduler::new(ExponentialDecayConfig::default());

        assert!((scheduler.get_lr_at_step(0) - 0.005).abs() < 1e-12);
        // 0.0001 + 0.0049 / e
        assert!((scheduler.get_lr_at_step(100) - 0.0019026).abs() < 1e-6);
        assert!((scheduler.get_lr_at_step(1000) - 0.0001).abs() < 1e-6);
    }

    #[test]
    fn test_never_reaches_min() {
        let scheduler = ExponentialDecayScheduler::new(ExponentialDecayConfig::default());
        assert!(scheduler.get_lr_at_step(2000) > 0.0001);
    }

    #[test]
    fn test_from_dataset() {
        let config = ExponentialDecayConfig::from_dataset(0.005, 0.0001, 2.5, 1280, 64);
        assert!((config.decay_speed - 50.0).abs() < 1e-12);

        let empty = ExponentialDecayConfig::from_dataset(0.005, 0.0001, 2.5, 0, 64);
        let scheduler = ExponentialDecayScheduler::new(empty);
        assert_eq!(scheduler.get_lr_at_step(10), 0.005);
    }

    #[test]
    fn test_scheduler_stepping() {
        let mut scheduler = ExponentialDecayScheduler::new(ExponentialDecayConfig::default());

        assert_eq!(scheduler.get_step(), 0);
        let lr0 = scheduler.get_lr();

        scheduler.step();
        scheduler.step();
        assert_eq!(scheduler.get_step(), 2);
        assert!(scheduler.get_lr() < lr0);

        scheduler.reset();
        assert_eq!(scheduler.get_step(), 0);
        assert_eq!(scheduler.get_lr(), lr0);
    }

    proptest! {
        #[test]
        fn prop_strictly_decreasing(step in 0usize..500, decay_speed in 50.0f64..1000.0) {
            let scheduler = ExponentialDecayScheduler::new(ExponentialDecayConfig {
                max_lr: 0.005,
                min_lr: 0.0001,
                decay_speed,
            });
            let current = scheduler.get_lr_at_step(step);
            let next = scheduler.get_lr_at_step(step + 1);
            prop_assert!(next < current);
            prop_assert!(next > 0.0001);
            prop_assert!(current <= 0.005);
        }
    }
}
