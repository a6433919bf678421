use crate::error::{ReportError, Result};
use crate::pdf::font::{EmbeddedFont, FontStyle, ReportFont};
use crate::pdf::layout::{Element, PageLayout, ReportLayout, TextStyle, PAGE_HEIGHT, PAGE_WIDTH, PT_PER_MM};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use subsetter::GlyphRemapper;
use tracing::{debug, warn};

/// Border line width, mm.
const BORDER_WIDTH: f32 = 0.2;
/// Horizontal shear of synthesized italics (tan 12 degrees).
const ITALIC_SKEW: f32 = 0.2126;
/// Stroke width of synthesized bold, as a fraction of the font size.
const BOLD_STROKE: f32 = 0.03;

/// Font resource names for each style, and whether the style is synthesized.
struct FontResources {
    names: [(FontStyle, &'static str); 3],
    synthetic: bool,
}

impl FontResources {
    fn name(&self, style: FontStyle) -> &'static str {
        self.names
            .iter()
            .find(|(s, _)| *s == style)
            .map(|(_, n)| *n)
            .unwrap_or("F1")
    }
}

/// Serialize a laid-out report into PDF bytes.
pub fn write_pdf(layout: &ReportLayout, font: &ReportFont, title: &str) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font_dict = Dictionary::new();
    let resources = match font {
        ReportFont::Standard => {
            for (name, base) in [("F1", "Helvetica"), ("F2", "Helvetica-Bold"), ("F3", "Helvetica-Oblique")] {
                let id = doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => base,
                    "Encoding" => "WinAnsiEncoding",
                });
                font_dict.set(name, id);
            }
            FontResources {
                names: [(FontStyle::Regular, "F1"), (FontStyle::Bold, "F2"), (FontStyle::Italic, "F3")],
                synthetic: false,
            }
        }
        ReportFont::Embedded(embedded) => {
            let id = add_embedded_font(&mut doc, embedded, layout);
            font_dict.set("F1", id);
            FontResources {
                names: [(FontStyle::Regular, "F1"), (FontStyle::Bold, "F1"), (FontStyle::Italic, "F1")],
                synthetic: true,
            }
        }
    };
    let resources_id = doc.add_object(dictionary! {
        "Font" => font_dict,
    });

    let mut kids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for page in &layout.pages {
        let content = page_content(page, font, &resources);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(PAGE_WIDTH * PT_PER_MM),
                Object::Real(PAGE_HEIGHT * PT_PER_MM),
            ],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Producer" => Object::string_literal("ot_report"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    Ok(buffer)
}

fn page_content(page: &PageLayout, font: &ReportFont, resources: &FontResources) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:.3} w 0 G", BORDER_WIDTH * PT_PER_MM);
    for element in &page.elements {
        match element {
            Element::Border { x, y, w, h } => {
                let _ = writeln!(
                    out,
                    "{:.2} {:.2} {:.2} {:.2} re S",
                    x * PT_PER_MM,
                    (PAGE_HEIGHT - y - h) * PT_PER_MM,
                    w * PT_PER_MM,
                    h * PT_PER_MM
                );
            }
            Element::Text { x, baseline, text, style } => {
                write_text(&mut out, *x, *baseline, text, style, font, resources);
            }
        }
    }
    out
}

fn write_text(
    out: &mut String,
    x: f32,
    baseline: f32,
    text: &str,
    style: &TextStyle,
    font: &ReportFont,
    resources: &FontResources,
) {
    let (r, g, b) = (
        style.color.0 as f32 / 255.0,
        style.color.1 as f32 / 255.0,
        style.color.2 as f32 / 255.0,
    );
    let skew = if resources.synthetic && style.face == FontStyle::Italic {
        ITALIC_SKEW
    } else {
        0.0
    };
    let _ = writeln!(out, "q BT /{} {:.1} Tf", resources.name(style.face), style.size);
    let _ = writeln!(out, "{:.3} {:.3} {:.3} rg", r, g, b);
    if resources.synthetic && style.face == FontStyle::Bold {
        let _ = writeln!(
            out,
            "2 Tr {:.3} {:.3} {:.3} RG {:.3} w",
            r,
            g,
            b,
            style.size * BOLD_STROKE
        );
    }
    let _ = writeln!(
        out,
        "1 0 {:.4} 1 {:.2} {:.2} Tm",
        skew,
        x * PT_PER_MM,
        (PAGE_HEIGHT - baseline) * PT_PER_MM
    );
    let _ = writeln!(out, "<{}> Tj ET Q", hex(&font.encode(text)));
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02X}", b);
        s
    })
}

/// Embed the face as Type0/CIDFontType2 with Identity-H encoding, so glyph
/// ids are used directly as character codes.
fn add_embedded_font(doc: &mut Document, font: &EmbeddedFont, layout: &ReportLayout) -> ObjectId {
    let mut used: BTreeMap<u16, (u16, char)> = BTreeMap::new();
    for page in &layout.pages {
        for (text, _) in page.texts() {
            for ch in text.chars() {
                let glyph = font.glyph(ch);
                used.entry(glyph.id).or_insert((glyph.advance, ch));
            }
        }
    }

    let (data, cid_to_gid) = subset_face(doc, font, &used);
    let length = data.len() as i64;
    let file_id = doc.add_object(Stream::new(dictionary! { "Length1" => length }, data));
    let [x_min, y_min, x_max, y_max] = font.bbox();
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(font.name().as_bytes().to_vec()),
        "Flags" => 32,
        "FontBBox" => vec![
            Object::Integer(font.to_pdf_units(x_min as i32)),
            Object::Integer(font.to_pdf_units(y_min as i32)),
            Object::Integer(font.to_pdf_units(x_max as i32)),
            Object::Integer(font.to_pdf_units(y_max as i32)),
        ],
        "ItalicAngle" => 0,
        "Ascent" => Object::Integer(font.to_pdf_units(font.ascent() as i32)),
        "Descent" => Object::Integer(font.to_pdf_units(font.descent() as i32)),
        "CapHeight" => Object::Integer(font.to_pdf_units(font.cap_height() as i32)),
        "StemV" => 80,
        "FontFile2" => file_id,
    });

    let mut widths: Vec<Object> = Vec::with_capacity(used.len() * 2);
    for (gid, (advance, _)) in &used {
        widths.push(Object::Integer(*gid as i64));
        widths.push(Object::Array(vec![Object::Integer(
            font.to_pdf_units(*advance as i32),
        )]));
    }
    let cid_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => Object::Name(font.name().as_bytes().to_vec()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "W" => widths,
        "CIDToGIDMap" => cid_to_gid,
    });

    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, to_unicode_cmap(&used).into_bytes()));
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(font.name().as_bytes().to_vec()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![cid_id.into()],
        "ToUnicode" => to_unicode_id,
    })
}

/// Keep only the glyphs the report draws. Character codes stay the
/// original glyph ids; the returned `CIDToGIDMap` stream points each of
/// them at its slot in the subset. Falls back to the whole face when the
/// subsetter rejects it.
fn subset_face(
    doc: &mut Document,
    font: &EmbeddedFont,
    used: &BTreeMap<u16, (u16, char)>,
) -> (Vec<u8>, Object) {
    let mut remapper = GlyphRemapper::new();
    remapper.remap(0);
    for gid in used.keys() {
        remapper.remap(*gid);
    }
    match subsetter::subset(font.data(), 0, &remapper) {
        Ok(data) => {
            let max_cid = used.keys().next_back().copied().unwrap_or(0);
            let mut map = Vec::with_capacity((max_cid as usize + 1) * 2);
            for cid in 0..=max_cid {
                map.extend_from_slice(&remapper.get(cid).unwrap_or(0).to_be_bytes());
            }
            debug!(
                glyphs = used.len(),
                full = font.data().len(),
                subset = data.len(),
                "font subset"
            );
            let map_id = doc.add_object(Stream::new(dictionary! {}, map));
            (data, map_id.into())
        }
        Err(e) => {
            warn!(font = font.name(), error = ?e, "font subsetting failed, embedding whole face");
            (font.data().to_vec(), "Identity".into())
        }
    }
}

/// CMap mapping glyph ids back to Unicode so text stays extractable.
fn to_unicode_cmap(used: &BTreeMap<u16, (u16, char)>) -> String {
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<(&u16, &(u16, char))> = used.iter().filter(|(gid, _)| **gid != 0).collect();
    // bfchar blocks are limited to 100 entries each.
    for chunk in entries.chunks(100) {
        let _ = writeln!(out, "{} beginbfchar", chunk.len());
        for (gid, (_, ch)) in chunk {
            let mut units = [0u16; 2];
            let utf16: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            let _ = writeln!(out, "<{:04X}> <{}>", gid, utf16);
        }
        out.push_str("endbfchar\n");
    }
    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out
}
