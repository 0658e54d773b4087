//! DefTool-style `.ini` export: the per-group frame filename lists and
//! colour-box palette snapshots that round-trip through DefTool-compatible
//! editors, plus the RGBA frames a caller would write alongside it.

use crate::def::{DefFile, codec};

/// One frame exported alongside the `.ini`: enough to write an image file
/// next to it under `relative_path`.
#[derive(Debug, Clone)]
pub struct ExportedFrame {
    /// Filename this frame's pixels should be written under, referenced by
    /// name from the `.ini`'s group lines.
    pub relative_path: String,
    /// Canvas width.
    pub width: u32,
    /// Canvas height.
    pub height: u32,
    /// RGBA pixels, row-major, `width * height` entries.
    pub pixels: Vec<[u8; 4]>,
    /// Whether this frame should be written as 24-bit RGB rather than an
    /// indexed/paletted bitmap (alpha is dropped either way on write).
    pub in_24_bits: bool,
}

/// The result of exporting a DEF to DefTool's tool-list format: the `.ini`
/// text plus the frame images it references.
#[derive(Debug, Clone)]
pub struct ToolListExport {
    /// Complete `.ini` file contents.
    pub ini: String,
    /// One entry per distinct frame name actually written (duplicate names
    /// within a group are exported once).
    pub frames: Vec<ExportedFrame>,
}

fn hex_color((r, g, b): (u8, u8, u8)) -> String {
    format!("${r:02X}{g:02X}{b:02X}")
}

/// DEF type codes whose frames never carry a separate shadow channel the
/// original tooling considered worth splitting out (selection overlays and
/// similar special-purpose types).
const NO_SHADOW_SPLIT_TYPES: [u32; 4] = [0x40, 0x45, 0x46, 0x47];

/// Export `def` as a DefTool-compatible `.ini` plus its frame images.
///
/// `stem` names the DEF without extension; exported frame files are named
/// `{stem}_{group_num}_{frame_name}.bmp` (or `..._shadow.bmp` when
/// `external_shadow` is set and a frame carries shadow data). `in_24_bits`
/// marks every exported frame for RGB rather than indexed output.
///
/// `external_shadow` has no effect for [`NO_SHADOW_SPLIT_TYPES`] DEFs: no
/// `Shadow{group}=` lines or shadow images are produced for those types
/// even when requested.
#[must_use]
pub fn export(def: &DefFile, stem: &str, external_shadow: bool, in_24_bits: bool) -> ToolListExport {
    let emit_shadow = external_shadow && !NO_SHADOW_SPLIT_TYPES.contains(&def.type_code);

    let mut ini = String::new();
    ini.push_str("[Data]\r\n");
    ini.push_str(&format!("Type={}\r\n", def.type_code.wrapping_sub(0x40)));
    ini.push_str(&format!("Shadow Type={}\r\n", if emit_shadow { 2 } else { 0 }));
    ini.push_str(&format!("Groups Number={}\r\n", def.groups.len()));
    ini.push_str("Generate Selection=false\r\n");

    let mut frames = Vec::new();
    let mut exported_names = std::collections::HashSet::new();

    for group in &def.groups {
        let mut names = Vec::new();
        let mut shadow_names = Vec::new();
        for (fi, slot) in group.frames.iter().enumerate() {
            let file_name = format!("{stem}_{}_{}.bmp", group.group_num, slot.name);
            names.push(file_name.clone());
            let shadow_file_name = format!("{stem}_{}_{}_shadow.bmp", group.group_num, slot.name);
            if emit_shadow {
                shadow_names.push(shadow_file_name.clone());
            }
            let dedup_key = (group.group_num, slot.name.clone());
            if exported_names.insert(dedup_key) {
                let group_index = def.groups.iter().position(|g| g.group_num == group.group_num).unwrap_or(0);
                if let Ok(decoded) = def.decode_frame(group_index, fi) {
                    let pixels = codec::merge_to_rgba(&decoded, &def.palette);
                    frames.push(ExportedFrame {
                        relative_path: file_name,
                        width: decoded.header.full_w,
                        height: decoded.header.full_h,
                        pixels,
                        in_24_bits,
                    });
                    if emit_shadow {
                        let shadow_pixels = codec::shadow_channel_to_rgba(&decoded, &def.palette);
                        frames.push(ExportedFrame {
                            relative_path: shadow_file_name,
                            width: decoded.header.full_w,
                            height: decoded.header.full_h,
                            pixels: shadow_pixels,
                            in_24_bits,
                        });
                    }
                }
            }
        }
        ini.push_str(&format!("Group{}={}\r\n", group.group_num, names.join("|")));
        if emit_shadow {
            ini.push_str(&format!(
                "Shadow{}={}\r\n",
                group.group_num,
                shadow_names.join("|")
            ));
        }
    }

    ini.push_str("[ColorsBox]\r\n");
    let colors: Vec<String> = def.palette[0..8].iter().map(|&c| hex_color(c)).collect();
    ini.push_str(&format!("Colors={}\r\n", colors.join(",")));
    ini.push_str("ColorChecks=1,1,1,1,1,1,1,1,1\r\n");
    if def.type_code == 0x47 {
        let player_colors: Vec<String> =
            def.palette[224..232].iter().map(|&c| hex_color(c)).collect();
        ini.push_str(&format!("PlayerColors={}\r\n", player_colors.join(",")));
    }

    ini.push_str("[ShadowColorsBox]\r\n");
    ini.push_str(&format!("Colors={}\r\n", colors.join(",")));
    ini.push_str("ColorChecks=1,1,1,1,1,1,1,1\r\n");

    ToolListExport { ini, frames }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::{DefMaker, PackedFrame};

    fn sample_palette() -> crate::Palette {
        let mut p: crate::Palette = [(0, 0, 0); 256];
        for (i, entry) in p.iter_mut().enumerate() {
            *entry = (i as u8, i as u8, i as u8);
        }
        p
    }

    fn build_def() -> DefFile {
        let maker = DefMaker {
            type_code: 0x42,
            canvas_width: 2,
            canvas_height: 2,
            palette: sample_palette(),
            groups: vec![(
                0,
                vec![PackedFrame {
                    name: "f0".to_string(),
                    object: vec![1, 1, 1, 1],
                    shadow: vec![0xFF; 4],
                    compression: 0,
                }],
            )],
        };
        let bytes = maker.make().unwrap();
        DefFile::parse(&bytes).unwrap()
    }

    #[test]
    fn export_lists_frame_file_names() {
        let def = build_def();
        let export = export(&def, "stem", false, false);
        assert!(export.ini.contains("Group0=stem_0_f0.bmp"));
        assert_eq!(export.frames.len(), 1);
        assert_eq!(export.frames[0].relative_path, "stem_0_f0.bmp");
    }

    #[test]
    fn export_includes_shadow_group_line_when_requested() {
        let def = build_def();
        let export = export(&def, "stem", true, false);
        assert!(export.ini.contains("Shadow0=stem_0_f0_shadow.bmp"));
    }

    #[test]
    fn every_shadow_ini_filename_has_a_matching_exported_frame() {
        let def = build_def();
        let export = export(&def, "stem", true, false);
        assert_eq!(export.frames.len(), 2);
        assert!(export.frames.iter().any(|f| f.relative_path == "stem_0_f0.bmp"));
        assert!(
            export
                .frames
                .iter()
                .any(|f| f.relative_path == "stem_0_f0_shadow.bmp")
        );
    }

    #[test]
    fn in_24_bits_flag_is_threaded_onto_every_exported_frame() {
        let def = build_def();
        let export = export(&def, "stem", true, true);
        assert!(export.frames.iter().all(|f| f.in_24_bits));
    }

    #[test]
    fn no_shadow_split_types_ignore_external_shadow_request() {
        let maker = DefMaker {
            type_code: 0x40,
            canvas_width: 2,
            canvas_height: 2,
            palette: sample_palette(),
            groups: vec![(
                0,
                vec![PackedFrame {
                    name: "f0".to_string(),
                    object: vec![1, 1, 1, 1],
                    shadow: vec![0xFF; 4],
                    compression: 0,
                }],
            )],
        };
        let bytes = maker.make().unwrap();
        let def = DefFile::parse(&bytes).unwrap();

        let export = export(&def, "stem", true, false);
        assert!(export.ini.contains("Shadow Type=0"));
        assert!(!export.ini.contains("Shadow0="));
        assert_eq!(export.frames.len(), 1);
    }

    #[test]
    fn type_code_in_ini_is_offset_from_0x40() {
        let def = build_def();
        let export = export(&def, "stem", false, false);
        assert!(export.ini.contains("Type=2"));
    }
}
