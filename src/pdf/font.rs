use crate::error::{ReportError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;
use ttf_parser::Face;

pub const DEFAULT_FONT_PATH: &str = "DejaVuSans.ttf";
pub const DEFAULT_FONT_URL: &str =
    "https://github.com/dejavu-fonts/dejavu-fonts/raw/master/ttf/DejaVuSans.ttf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
}

/// Width of rendered text, used to center cell contents.
pub trait TextMetrics {
    /// Width in points of `text` at `size_pt`.
    fn text_width(&self, text: &str, size_pt: f32) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphInfo {
    pub id: u16,
    pub advance: u16,
}

/// A TrueType face embedded into the PDF as a CID font.
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    name: String,
    data: Vec<u8>,
    units_per_em: u16,
    ascent: i16,
    descent: i16,
    cap_height: i16,
    bbox: [i16; 4],
    missing_advance: u16,
    glyphs: HashMap<char, GlyphInfo>,
}

impl EmbeddedFont {
    pub fn from_bytes(name: &str, data: Vec<u8>) -> Result<Self> {
        let (units_per_em, ascent, descent, cap_height, bbox, missing_advance, glyphs) = {
            let face =
                Face::parse(&data, 0).map_err(|e| ReportError::Font(format!("{}: {}", name, e)))?;
            let mut glyphs = HashMap::new();
            if let Some(cmap) = face.tables().cmap {
                for subtable in cmap.subtables {
                    if !subtable.is_unicode() {
                        continue;
                    }
                    subtable.codepoints(|cp| {
                        let (Some(ch), Some(gid)) = (char::from_u32(cp), subtable.glyph_index(cp))
                        else {
                            return;
                        };
                        let advance = face.glyph_hor_advance(gid).unwrap_or(0);
                        glyphs.entry(ch).or_insert(GlyphInfo {
                            id: gid.0,
                            advance,
                        });
                    });
                }
            }
            let rect = face.global_bounding_box();
            (
                face.units_per_em(),
                face.ascender(),
                face.descender(),
                face.capital_height().unwrap_or(face.ascender()),
                [rect.x_min, rect.y_min, rect.x_max, rect.y_max],
                face.glyph_hor_advance(ttf_parser::GlyphId(0)).unwrap_or(0),
                glyphs,
            )
        };
        if glyphs.is_empty() {
            return Err(ReportError::Font(format!("{}: no unicode cmap", name)));
        }
        Ok(EmbeddedFont {
            name: pdf_name(name),
            data,
            units_per_em: units_per_em.max(1),
            ascent,
            descent,
            cap_height,
            bbox,
            missing_advance,
            glyphs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn glyph(&self, ch: char) -> GlyphInfo {
        self.glyphs.get(&ch).copied().unwrap_or(GlyphInfo {
            id: 0,
            advance: self.missing_advance,
        })
    }

    /// Scale font units to the PDF glyph space of 1000 units per em.
    pub fn to_pdf_units(&self, value: i32) -> i64 {
        value as i64 * 1000 / self.units_per_em as i64
    }

    pub fn ascent(&self) -> i16 {
        self.ascent
    }

    pub fn descent(&self) -> i16 {
        self.descent
    }

    pub fn cap_height(&self) -> i16 {
        self.cap_height
    }

    pub fn bbox(&self) -> [i16; 4] {
        self.bbox
    }
}

/// The font a report is drawn with.
#[derive(Debug, Clone)]
pub enum ReportFont {
    /// Built-in Helvetica family; Latin-1 only, needs no font file.
    Standard,
    /// A Unicode TrueType face; bold and italic are synthesized.
    Embedded(EmbeddedFont),
}

impl ReportFont {
    pub fn standard() -> Self {
        ReportFont::Standard
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| ReportError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("EmbeddedFont");
        Ok(ReportFont::Embedded(EmbeddedFont::from_bytes(name, data)?))
    }

    /// Width of one character in 1/1000 em.
    pub fn char_width(&self, ch: char) -> f32 {
        match self {
            ReportFont::Standard => helvetica_width(ch) as f32,
            ReportFont::Embedded(font) => {
                font.to_pdf_units(font.glyph(ch).advance as i32) as f32
            }
        }
    }

    /// Bytes for a PDF string operand: WinAnsi codes for the standard
    /// font, big-endian glyph ids for an embedded one.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            ReportFont::Standard => text.chars().map(win_ansi_byte).collect(),
            ReportFont::Embedded(font) => text
                .chars()
                .flat_map(|ch| font.glyph(ch).id.to_be_bytes())
                .collect(),
        }
    }
}

impl TextMetrics for ReportFont {
    fn text_width(&self, text: &str, size_pt: f32) -> f32 {
        text.chars().map(|ch| self.char_width(ch)).sum::<f32>() * size_pt / 1000.0
    }
}

/// Make sure the font file exists locally, downloading it once when missing.
pub fn ensure_font(path: &Path, url: &str) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    info!(path = %path.display(), url, "font not found locally, downloading");
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ReportError::Font(format!("download from {} failed: {}", url, e)))?;
    let bytes = response
        .bytes()
        .map_err(|e| ReportError::Font(format!("download from {} failed: {}", url, e)))?;
    Face::parse(&bytes, 0)
        .map_err(|e| ReportError::Font(format!("downloaded file is not a font: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let partial = path.with_extension("part");
    std::fs::write(&partial, &bytes)?;
    std::fs::rename(&partial, path)?;
    info!(path = %path.display(), bytes = bytes.len(), "font downloaded");
    Ok(path.to_path_buf())
}

fn pdf_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}

fn win_ansi_byte(ch: char) -> u8 {
    match ch as u32 {
        cp @ (0x20..=0x7e | 0xa0..=0xff) => cp as u8,
        _ => b'?',
    }
}

// Helvetica advance widths for ASCII 0x20..=0x7e, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

fn helvetica_width(ch: char) -> u16 {
    match ch as u32 {
        cp @ 0x20..=0x7e => HELVETICA_WIDTHS[(cp - 0x20) as usize],
        _ => 556,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_font_measures_ascii() {
        let font = ReportFont::standard();
        // "Hi" = 722 + 222
        let w = font.text_width("Hi", 10.0);
        assert!((w - 9.44).abs() < 1e-4);
    }

    #[test]
    fn standard_encoding_replaces_non_latin1() {
        let font = ReportFont::standard();
        assert_eq!(font.encode("Rs ₹5"), b"Rs ?5".to_vec());
        assert_eq!(font.encode("é"), vec![0xe9]);
    }

    #[test]
    fn garbage_bytes_are_not_a_font() {
        let err = EmbeddedFont::from_bytes("Broken", b"not a font".to_vec()).unwrap_err();
        assert!(matches!(err, ReportError::Font(_)));
    }

    #[test]
    fn existing_font_file_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DejaVuSans.ttf");
        std::fs::write(&path, b"cached").unwrap();
        // An unroutable URL proves no request is made.
        let resolved = ensure_font(&path, "http://127.0.0.1:9/DejaVuSans.ttf").unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn failed_download_is_a_font_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.ttf");
        let err = ensure_font(&path, "http://127.0.0.1:9/missing.ttf").unwrap_err();
        assert!(matches!(err, ReportError::Font(_)));
        assert!(!path.exists());
    }
}
