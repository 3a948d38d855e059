// VitalGuard - Cycle Counter
//
// Sequence id stamped on every data point. Runs 1..=max and wraps back to 1;
// the collector uses it to order and de-duplicate batches.

#[derive(Debug, Clone)]
pub struct CycleCounter {
    current: u32,
    max_value: u32,
}

impl CycleCounter {
    pub fn new(max_value: u32) -> Self {
        Self { current: 0, max_value: max_value.max(1) }
    }

    /// Next cycle id. The first call returns 1.
    pub fn advance(&mut self) -> u32 {
        self.current = if self.current >= self.max_value { 1 } else { self.current + 1 };
        self.current
    }

    /// Last id handed out, 0 before the first cycle.
    pub fn current(&self) -> u32 {
        self.current
    }
}
