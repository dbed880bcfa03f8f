//! Fixed-size sample rings for battery and bus current.

/// Circular buffer of the last `N` samples.
#[derive(Clone, Debug)]
pub struct SampleRing<const N: usize> {
    slots: [i32; N],
    cursor: usize,
    count: u32,
}

impl<const N: usize> SampleRing<N> {
    pub const fn new() -> Self {
        Self { slots: [0; N], cursor: 0, count: 0 }
    }

    /// Overwrite the slot under the cursor and advance it.
    /// Returns true when the cursor wrapped back to slot 0.
    pub fn push(&mut self, ma: i32) -> bool {
        self.slots[self.cursor] = ma;
        self.cursor = (self.cursor + 1) % N;
        self.count = self.count.wrapping_add(1);
        self.cursor == 0
    }

    /// Unweighted mean over all `N` slots, stale ones included.
    pub fn average(&self) -> i32 {
        let sum: i64 = self.slots.iter().map(|&v| v as i64).sum();
        (sum / N as i64) as i32
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Rewind cursor and count. Stored samples are kept.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.count = 0;
    }
}

impl<const N: usize> Default for SampleRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Battery and bus rings with the cycle-complete flag driven by the battery side.
#[derive(Clone, Debug, Default)]
pub struct SampleWindow<const N: usize> {
    battery: SampleRing<N>,
    bus: SampleRing<N>,
    cycle_complete: bool,
}

impl<const N: usize> SampleWindow<N> {
    pub const fn new() -> Self {
        Self {
            battery: SampleRing::new(),
            bus: SampleRing::new(),
            cycle_complete: false,
        }
    }

    pub fn push_battery_sample(&mut self, ma: i32) {
        self.cycle_complete = self.battery.push(ma);
    }

    pub fn push_bus_sample(&mut self, ma: i32) {
        self.bus.push(ma);
    }

    pub fn average_battery(&self) -> i32 {
        self.battery.average()
    }

    pub fn average_bus(&self) -> i32 {
        self.bus.average()
    }

    /// True only right after the battery push that completed a full cycle.
    pub fn cycle_complete(&self) -> bool {
        self.cycle_complete
    }

    pub fn battery_ticks(&self) -> u32 {
        self.battery.count()
    }

    pub fn bus_ticks(&self) -> u32 {
        self.bus.count()
    }

    /// Session reset: cursors and counts go back to zero, averages are left alone.
    pub fn reset_cursors(&mut self) {
        self.battery.rewind();
        self.bus.rewind();
        self.cycle_complete = false;
    }
}
