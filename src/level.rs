use std::fmt;
use serde::{Serialize, Deserialize};

/// brightness percentage, always inside `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub struct BrightnessLevel(u8);

impl BrightnessLevel {
    /// out of range values are pulled back to the nearest bound
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn tier(self) -> IconTier {
        IconTier::for_level(self)
    }

    /// text of the numeric label next to the slider
    pub fn label(self) -> String {
        format!("{}%", self.0)
    }

    pub fn tooltip(self) -> String {
        format!("Brightness: {}%", self.0)
    }
}

impl Default for BrightnessLevel {
    fn default() -> Self {
        Self(50)
    }
}

impl From<u8> for BrightnessLevel {
    fn from(value: u8) -> Self {
        Self::clamped(value as i64)
    }
}

impl From<u32> for BrightnessLevel {
    fn from(value: u32) -> Self {
        Self::clamped(value as i64)
    }
}

impl From<BrightnessLevel> for u8 {
    fn from(level: BrightnessLevel) -> Self {
        level.0
    }
}

impl fmt::Display for BrightnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconTier {
    Low,
    Mid,
    High,
}

impl IconTier {
    /// `<= 25` low, `26..=75` mid, `> 75` high
    pub fn for_level(level: BrightnessLevel) -> Self {
        match level.value() {
            0..=25 => IconTier::Low,
            26..=75 => IconTier::Mid,
            _ => IconTier::High,
        }
    }

    /// glyph shown on the panel
    pub fn glyph(self) -> &'static str {
        match self {
            IconTier::Low => "🔅",
            IconTier::Mid => "☀️",
            IconTier::High => "🔆",
        }
    }
}

/// everything the panel & tray need to draw themselves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSnapshot {
    pub level: BrightnessLevel,
    pub label: String,
    pub tooltip: String,
    pub tier: IconTier,
    pub glyph: String,
}

impl From<BrightnessLevel> for PanelSnapshot {
    fn from(level: BrightnessLevel) -> Self {
        let tier = level.tier();
        Self {
            level,
            label: level.label(),
            tooltip: level.tooltip(),
            tier,
            glyph: tier.glyph().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        assert_eq!(BrightnessLevel::clamped(-12).value(), 0);
        assert_eq!(BrightnessLevel::clamped(180).value(), 100);
        assert_eq!(BrightnessLevel::from(250u8).value(), 100);
        assert_eq!(BrightnessLevel::from(73u32).value(), 73);
    }

    #[test]
    fn tier_boundaries() {
        let tier = |v: u8| BrightnessLevel::from(v).tier();
        assert_eq!(tier(0), IconTier::Low);
        assert_eq!(tier(25), IconTier::Low);
        assert_eq!(tier(26), IconTier::Mid);
        assert_eq!(tier(75), IconTier::Mid);
        assert_eq!(tier(76), IconTier::High);
        assert_eq!(tier(100), IconTier::High);
    }

    #[test]
    fn label_and_tooltip_text() {
        for v in 0..=100u8 {
            let level = BrightnessLevel::from(v);
            assert_eq!(level.label(), format!("{v}%"));
            assert_eq!(level.tooltip(), format!("Brightness: {v}%"));
        }
    }

    #[test]
    fn snapshot_wire_shape() {
        let snapshot = PanelSnapshot::from(BrightnessLevel::from(80u8));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["level"], 80);
        assert_eq!(json["label"], "80%");
        assert_eq!(json["tier"], "high");
        assert_eq!(json["glyph"], "🔆");
    }
}
