use crate::detection::domain::detections::FeatureSlot;

/// RGB triple.
pub type Color = [u8; 3];

pub const FACE: Color = [0, 255, 0];
pub const EYES: Color = [255, 100, 0];
pub const NOSE: Color = [255, 255, 0];
pub const MOUTH: Color = [255, 0, 255];
pub const EARS: Color = [255, 165, 0];
pub const OBJECT: Color = [255, 0, 0];

pub const WHITE: Color = [255, 255, 255];
pub const GREY: Color = [100, 100, 100];
pub const PANEL: Color = [20, 20, 20];

pub fn slot_color(slot: FeatureSlot) -> Color {
    match slot {
        FeatureSlot::Face => FACE,
        FeatureSlot::EyeLeft | FeatureSlot::EyeRight => EYES,
        FeatureSlot::Nose => NOSE,
        FeatureSlot::Mouth => MOUTH,
        FeatureSlot::EarLeft | FeatureSlot::EarRight => EARS,
    }
}

/// Legend rows in drawing order.
pub const LEGEND_ENTRIES: [(Color, &str); 5] = [
    (FACE, "Face"),
    (EYES, "Eyes"),
    (NOSE, "Nose"),
    (MOUTH, "Mouth"),
    (EARS, "Ears"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_slots_share_a_color() {
        assert_eq!(slot_color(FeatureSlot::EyeLeft), slot_color(FeatureSlot::EyeRight));
        assert_eq!(slot_color(FeatureSlot::EarLeft), slot_color(FeatureSlot::EarRight));
    }

    #[test]
    fn test_legend_matches_slot_colors() {
        let slots = [
            FeatureSlot::Face,
            FeatureSlot::EyeLeft,
            FeatureSlot::Nose,
            FeatureSlot::Mouth,
            FeatureSlot::EarLeft,
        ];
        for ((color, _), slot) in LEGEND_ENTRIES.iter().zip(slots) {
            assert_eq!(*color, slot_color(slot));
        }
    }
}
