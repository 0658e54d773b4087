//! Configuration surface threaded through the DEF pipeline: the four
//! recognised predicates and the frame-duration lookup table.
//!
//! Nothing here reads a config file; predicates are supplied by the
//! caller as plain closures, bundled into a [`DefContext`] at
//! construction time. A default context answers every predicate `false`,
//! which is enough to decode any DEF without HotA-specific remapping.

use super::Group;

/// Predicate hooks and HotA context consumed by the DEF pipeline.
///
/// None of these predicates are evaluated by this crate except
/// `is_adv_map_creature`, which [`frame_durations_for_group`] consults for
/// type-"3" DEFs. The others are exposed for callers building a full
/// rendering pipeline on top of this crate (palette remapping, shadow
/// variant selection) and are otherwise inert here.
pub struct DefContext {
    /// Whether `name` (a DEF stem) denotes an adventure-map creature.
    pub is_adv_map_creature: Box<dyn Fn(&str) -> bool>,
    /// Whether `name`, given HotA context, uses the HotA palette indices
    /// 2/3 as shadow variants rather than their default roles.
    pub uses_hota_shadow_p2p3: Box<dyn Fn(&str, bool) -> bool>,
    /// Whether `name`, given HotA context, needs the palette-255 fix.
    pub needs_palette_255_fix: Box<dyn Fn(&str, bool) -> bool>,
    /// Whether `name` keeps its selection palette entries on extraction.
    pub keeps_selection_palette: Box<dyn Fn(&str) -> bool>,
    /// Whether the archive this DEF came from follows HotA conventions.
    pub hota: bool,
}

impl Default for DefContext {
    fn default() -> Self {
        DefContext {
            is_adv_map_creature: Box::new(|_| false),
            uses_hota_shadow_p2p3: Box::new(|_, _| false),
            needs_palette_255_fix: Box::new(|_, _| false),
            keeps_selection_palette: Box::new(|_| false),
            hota: false,
        }
    }
}

fn type_code_string(type_code: u32) -> Option<&'static str> {
    match type_code {
        0x42 => Some("2"),
        0x43 => Some("3"),
        0x44 => Some("4"),
        0x49 => Some("9"),
        _ => None,
    }
}

/// Index of the earliest frame whose name equals the group's
/// maximum-multiplicity frame name. Ties broken by first-occurrence order:
/// a name only displaces the current winner on a strict count increase.
fn most_repeated_frame_index(group: &Group) -> Option<usize> {
    let mut seen: Vec<(&str, usize)> = Vec::new();
    for slot in &group.frames {
        let name = slot.name.as_str();
        match seen.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => *count += 1,
            None => seen.push((name, 1)),
        }
    }
    let winner_name = seen
        .into_iter()
        .fold(None::<(&str, usize)>, |best, (name, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((name, count)),
        })
        .map(|(name, _)| name)?;
    group.frames.iter().position(|s| s.name == winner_name)
}

/// Frame-duration hints in milliseconds, one entry per frame in `group`,
/// per the table in this crate's specification.
#[must_use]
pub fn frame_durations_for_group(
    type_code: u32,
    group: &Group,
    ctx: &DefContext,
    def_stem: &str,
) -> Vec<u32> {
    let n = group.frames.len();
    match type_code_string(type_code) {
        Some("9") => (0..n)
            .map(|i| {
                if group.group_num == 4 && i == 5 {
                    1000
                } else if group.group_num == 1 {
                    125
                } else {
                    100
                }
            })
            .collect(),
        Some("2") => (0..n)
            .map(|i| if group.group_num == 2 && i == 7 { 3000 } else { 100 })
            .collect(),
        Some("3") => {
            let winner = most_repeated_frame_index(group);
            (0..n)
                .map(|i| {
                    if Some(i) == winner && (ctx.is_adv_map_creature)(def_stem) {
                        1000
                    } else {
                        167
                    }
                })
                .collect()
        }
        _ => vec![100; n],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::FrameSlot;

    fn group_with_names(group_num: u32, names: &[&str]) -> Group {
        Group {
            group_num,
            unk2: 0,
            unk3: 0,
            frames: names
                .iter()
                .map(|n| FrameSlot {
                    name: (*n).to_string(),
                    offset: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn type_9_group_4_frame_5() {
        let group = group_with_names(4, &["a", "b", "c", "d", "e", "f"]);
        let ctx = DefContext::default();
        let durations = frame_durations_for_group(0x49, &group, &ctx, "stem");
        assert_eq!(durations[5], 1000);
        assert_eq!(durations[0], 100);
    }

    #[test]
    fn type_9_group_1_all_frames() {
        let group = group_with_names(1, &["a", "b", "c"]);
        let ctx = DefContext::default();
        let durations = frame_durations_for_group(0x49, &group, &ctx, "stem");
        assert_eq!(durations, vec![125, 125, 125]);
    }

    #[test]
    fn type_2_group_2_frame_7() {
        let names: Vec<&str> = (0..8).map(|_| "f").collect();
        let group = group_with_names(2, &names);
        let ctx = DefContext::default();
        let durations = frame_durations_for_group(0x42, &group, &ctx, "stem");
        assert_eq!(durations[7], 3000);
        assert_eq!(durations[0], 100);
    }

    #[test]
    fn type_3_most_repeated_frame_with_predicate() {
        let group = group_with_names(0, &["x", "x", "y"]);
        let mut ctx = DefContext::default();
        ctx.is_adv_map_creature = Box::new(|name| name == "stem");
        let durations = frame_durations_for_group(0x43, &group, &ctx, "stem");
        // "x" (index 0) is the most-repeated name, earliest index 0.
        assert_eq!(durations[0], 1000);
        assert_eq!(durations[1], 167);
        assert_eq!(durations[2], 167);
    }

    #[test]
    fn type_3_tie_breaks_to_earliest_name() {
        let group = group_with_names(0, &["y", "x", "y", "x"]);
        let mut ctx = DefContext::default();
        ctx.is_adv_map_creature = Box::new(|name| name == "stem");
        let durations = frame_durations_for_group(0x43, &group, &ctx, "stem");
        // "y" and "x" are tied at 2 occurrences each; "y" appears first.
        assert_eq!(durations, vec![1000, 167, 167, 167]);
    }

    #[test]
    fn type_3_without_predicate_is_uniform() {
        let group = group_with_names(0, &["x", "x", "y"]);
        let ctx = DefContext::default();
        let durations = frame_durations_for_group(0x43, &group, &ctx, "stem");
        assert_eq!(durations, vec![167, 167, 167]);
    }

    #[test]
    fn unrecognised_type_defaults_to_100() {
        let group = group_with_names(4, &["a", "b"]);
        let ctx = DefContext::default();
        let durations = frame_durations_for_group(0x99, &group, &ctx, "stem");
        assert_eq!(durations, vec![100, 100]);
    }
}
