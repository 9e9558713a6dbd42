pub struct FixedTimestep {
    tick_rate: u32,
    dt: f32,
    accumulator: f32,
    ticks: u64,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            dt: 1.0 / tick_rate as f32,
            accumulator: 0.0,
            ticks: 0,
        }
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated clock: ticks consumed so far, in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.ticks * 1000 / u64::from(self.tick_rate)
    }

    pub fn accumulate(&mut self, delta: f32) {
        self.accumulator += delta.min(0.25);
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            self.ticks += 1;
            true
        } else {
            false
        }
    }
}
