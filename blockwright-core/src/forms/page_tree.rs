//! Page tree walk
//!
//! Flattens `/Root /Pages` into an ordered list of pages with the inheritable
//! attributes `/MediaBox`, `/CropBox` and `/Rotate` resolved, and records each
//! page's `/Annots` so widgets can be placed.

use crate::geometry::{Point, Rectangle, Rotation};
use crate::parser::{ObjectId, ParseResult, PdfDictionary, PdfDocument, PdfObject};
use std::collections::HashSet;

/// US Letter, used when no node in the chain declares a `/MediaBox`
pub const DEFAULT_MEDIA_BOX: Rectangle = Rectangle {
    lower_left: Point { x: 0.0, y: 0.0 },
    upper_right: Point { x: 612.0, y: 792.0 },
};

/// One leaf of the page tree
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    pub id: ObjectId,
    /// Zero-based position in document order
    pub index: usize,
    pub media_box: Rectangle,
    pub crop_box: Option<Rectangle>,
    pub rotation: Rotation,
    /// Indirect annotations, in `/Annots` order
    pub annots: Vec<ObjectId>,
}

impl PageInfo {
    /// The crop box clipped to the media box; the media box when the crop
    /// box is absent or does not overlap it
    pub fn visible_box(&self) -> Rectangle {
        self.crop_box
            .and_then(|crop| crop.intersect(&self.media_box))
            .unwrap_or(self.media_box)
    }
}

/// Attributes inherited from ancestor `/Pages` nodes
#[derive(Debug, Clone, Copy, Default)]
struct Inherited {
    media_box: Option<Rectangle>,
    crop_box: Option<Rectangle>,
    rotate: Option<i64>,
}

/// Walk the page tree depth-first in `/Kids` order
pub fn collect_pages(doc: &mut PdfDocument<'_>, catalog: &PdfDictionary) -> ParseResult<Vec<PageInfo>> {
    let Some(PdfObject::Reference(root)) = catalog.get("Pages") else {
        tracing::debug!("catalog has no indirect /Pages; document has no pages");
        return Ok(Vec::new());
    };

    let max_depth = doc.options().max_depth;
    let mut pages = Vec::new();
    let mut visited = HashSet::new();
    // Explicit stack; children are pushed in reverse to keep document order
    let mut stack = vec![(*root, Inherited::default(), 0usize)];

    while let Some((id, parent, depth)) = stack.pop() {
        if !visited.insert(id) {
            tracing::warn!("page tree node {id} visited twice; skipping");
            continue;
        }
        if depth > max_depth {
            tracing::warn!("page tree deeper than {max_depth} levels at {id}; skipping");
            continue;
        }
        let Some(node) = doc.resolve_dict(&PdfObject::Reference(id))? else {
            tracing::warn!("page tree node {id} is not a dictionary; skipping");
            continue;
        };

        let inherited = Inherited {
            media_box: rect_entry(doc, &node, "MediaBox")?.or(parent.media_box),
            crop_box: rect_entry(doc, &node, "CropBox")?.or(parent.crop_box),
            rotate: match node.get("Rotate") {
                Some(rotate) => doc.resolve(rotate)?.as_integer().or(parent.rotate),
                None => parent.rotate,
            },
        };

        let is_leaf = match node.get_type() {
            Some("Page") => true,
            Some("Pages") => false,
            _ => !node.contains_key("Kids"),
        };

        if is_leaf {
            let rotation = inherited.rotate.map_or(Some(Rotation::None), Rotation::from_degrees);
            let rotation = rotation.unwrap_or_else(|| {
                tracing::warn!("page {id} has invalid /Rotate {:?}; using 0", inherited.rotate);
                Rotation::None
            });
            let annots = match node.get("Annots") {
                Some(annots) => match doc.resolve(annots)? {
                    PdfObject::Array(array) => array.iter().filter_map(PdfObject::as_reference).collect(),
                    _ => Vec::new(),
                },
                None => Vec::new(),
            };
            pages.push(PageInfo {
                id,
                index: pages.len(),
                media_box: inherited.media_box.unwrap_or(DEFAULT_MEDIA_BOX),
                crop_box: inherited.crop_box,
                rotation,
                annots,
            });
            continue;
        }

        let kids = match node.get("Kids") {
            Some(kids) => doc.resolve(kids)?,
            None => PdfObject::Null,
        };
        if let PdfObject::Array(kids) = kids {
            for kid in kids.iter().rev() {
                match kid.as_reference() {
                    Some(kid) => stack.push((kid, inherited, depth + 1)),
                    None => tracing::warn!("direct page tree kid under {id} ignored"),
                }
            }
        }
    }

    Ok(pages)
}

fn rect_entry(doc: &mut PdfDocument<'_>, dict: &PdfDictionary, key: &str) -> ParseResult<Option<Rectangle>> {
    let Some(value) = dict.get(key) else {
        return Ok(None);
    };
    Ok(match doc.resolve(value)? {
        PdfObject::Array(array) => Rectangle::from_array(&array),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_helpers::build_pdf;
    use crate::parser::ParseOptions;

    fn pages_of(objects: &[(u32, &str)]) -> Vec<PageInfo> {
        let pdf = build_pdf(objects, "/Root 1 0 R");
        let mut doc = PdfDocument::parse(&pdf, &ParseOptions::default()).unwrap();
        let catalog = doc.catalog().unwrap();
        collect_pages(&mut doc, &catalog).unwrap()
    }

    #[test]
    fn test_inherited_attributes() {
        let pages = pages_of(&[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 /MediaBox [0 0 500 400] /Rotate 90 >>"),
            (3, "<< /Type /Page /Parent 2 0 R >>"),
            (4, "<< /Type /Page /Parent 2 0 R /Rotate -180 /CropBox [10 10 600 300] /Annots [7 0 R] >>"),
        ]);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].media_box.width(), 500.0);
        assert_eq!(pages[0].rotation, Rotation::Clockwise90);
        assert_eq!(pages[1].rotation, Rotation::Clockwise180);
        assert_eq!(pages[1].visible_box().width(), 490.0);
        assert_eq!(pages[1].visible_box().height(), 290.0);
        assert_eq!(pages[1].annots, vec![ObjectId::new(7, 0)]);
        assert_eq!(pages[1].index, 1);
    }

    #[test]
    fn test_default_media_box_and_nested_order() {
        let pages = pages_of(&[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R 5 0 R] >>"),
            (3, "<< /Type /Pages /Kids [4 0 R] >>"),
            (4, "<< /Type /Page >>"),
            (5, "<< /Type /Page >>"),
        ]);
        assert_eq!(
            pages.iter().map(|p| p.id.number).collect::<Vec<_>>(),
            vec![4, 5]
        );
        assert_eq!(pages[0].media_box, DEFAULT_MEDIA_BOX);
    }

    #[test]
    fn test_cycle_is_skipped() {
        let pages = pages_of(&[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R 2 0 R] >>"),
            (3, "<< /Type /Page >>"),
        ]);
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_no_pages() {
        let pages = pages_of(&[(1, "<< /Type /Catalog >>")]);
        assert!(pages.is_empty());
    }
}
