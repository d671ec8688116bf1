/// The per-sample channels that carry a "frozen" state across the
/// bitstream: each one can stop emitting delta bits after two
/// consecutive zero-deltas, relying on an explicit full-value marker to
/// resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleField {
    Hr,
    Lon,
    Lat,
    Distance,
    Speed,
    Satellites,
}

const FIELD_COUNT: usize = 6;

/// Tracks each channel's consecutive-zero-delta run.
///
/// A channel is frozen once its counter reaches 2; reaching a full value
/// resets the counter to 0, a non-zero delta resets it to 0, and a zero
/// delta increments it. This is the only state `TrainingSession` keeps
/// across samples besides the sample history itself.
#[derive(Debug, Default)]
pub struct ChannelState {
    zero_delta_counter: [u32; FIELD_COUNT],
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(field: SampleField) -> usize {
        match field {
            SampleField::Hr => 0,
            SampleField::Lon => 1,
            SampleField::Lat => 2,
            SampleField::Distance => 3,
            SampleField::Speed => 4,
            SampleField::Satellites => 5,
        }
    }

    pub fn is_frozen(&self, field: SampleField) -> bool {
        self.zero_delta_counter[Self::index(field)] >= 2
    }

    pub fn reset(&mut self, field: SampleField) {
        self.zero_delta_counter[Self::index(field)] = 0;
    }

    /// Counts zero deltas if they occur one by one; any non-zero delta
    /// breaks the run.
    pub fn handle_delta(&mut self, field: SampleField, delta: i64) {
        let idx = Self::index(field);
        if delta == 0 {
            self.zero_delta_counter[idx] += 1;
        } else {
            self.zero_delta_counter[idx] = 0;
        }
    }
}
