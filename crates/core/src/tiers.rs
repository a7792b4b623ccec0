/// Maps a tier (level) to the minimum value (experience) needed to reach it.
pub trait TierTable: Send + Sync {
    fn threshold(&self, tier: u32) -> i64;
    fn max_tier(&self) -> u32;
}

const LAST_LEVEL: u32 = 126;
const MAX_REAL_LEVEL: u32 = 99;

/// The standard experience curve, levels 1 through 126.
#[derive(Debug, Clone)]
pub struct ExperienceTable {
    thresholds: Vec<i64>,
}

impl ExperienceTable {
    pub fn new() -> Self {
        let mut thresholds = Vec::with_capacity(LAST_LEVEL as usize);
        thresholds.push(0);
        let mut points = 0.0_f64;
        for level in 1..LAST_LEVEL {
            let l = f64::from(level);
            points += (l + 300.0 * 2f64.powf(l / 7.0)).floor();
            thresholds.push((points / 4.0).floor() as i64);
        }
        Self { thresholds }
    }
}

impl Default for ExperienceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TierTable for ExperienceTable {
    /// Levels outside 1..=126 clamp to the nearest end of the table.
    fn threshold(&self, tier: u32) -> i64 {
        let index = tier.clamp(1, LAST_LEVEL) as usize - 1;
        self.thresholds[index]
    }

    fn max_tier(&self) -> u32 {
        MAX_REAL_LEVEL
    }
}
