//! Block extraction
//!
//! Turns the widgets of a resolved form into [`Block`]s: a label plus a
//! bounding box in top-left-origin units of the page as it is displayed.

use crate::forms::{AcroForm, Field, PageInfo, Widget};
use crate::geometry::{Point, Rectangle};
use serde::{Deserialize, Serialize};

/// Tolerance used when blocks are matched by geometry
pub const GEOMETRY_TOLERANCE: f64 = 0.01;

/// A fillable region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Block {
    fn from_rect(label: String, rect: &Rectangle) -> Self {
        Block {
            label,
            x: rect.lower_left.x,
            y: rect.lower_left.y,
            width: rect.width(),
            height: rect.height(),
        }
    }

    fn rect(&self) -> Rectangle {
        Rectangle::new(
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y + self.height),
        )
    }

    /// Same box within [`GEOMETRY_TOLERANCE`] on every coordinate
    pub fn same_geometry(&self, other: &Block) -> bool {
        [
            (self.x, other.x),
            (self.y, other.y),
            (self.width, other.width),
            (self.height, other.height),
        ]
        .iter()
        .all(|(a, b)| (a - b).abs() <= GEOMETRY_TOLERANCE)
    }
}

/// A block together with the page it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedBlock {
    pub block: Block,
    /// Zero-based page index
    pub page_index: usize,
    /// Field the block was produced from, index into [`AcroForm::fields`]
    pub field: usize,
    /// Widget the block was produced from; the first one under `PerField`
    pub widget: usize,
}

/// How widgets of the same field are turned into blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// One block per widget; labels may repeat
    #[default]
    PerWidget,
    /// One block per field and page, covering all of its widgets there
    PerField,
}

/// Options for [`extract`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    pub merge: MergePolicy,
    /// Emit `field_{page}_{n}` blocks for widgets of unnamed fields
    pub fallback_labels: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            merge: MergePolicy::PerWidget,
            fallback_labels: true,
        }
    }
}

impl ExtractOptions {
    pub fn with_merge(mut self, merge: MergePolicy) -> Self {
        self.merge = merge;
        self
    }
}

/// Blocks in page order, then field-tree order within each page
pub fn extract(form: &AcroForm, options: &ExtractOptions) -> Vec<Block> {
    extract_located(form, options)
        .into_iter()
        .map(|located| located.block)
        .collect()
}

/// Like [`extract`], keeping the page and source widget of every block
pub fn extract_located(form: &AcroForm, options: &ExtractOptions) -> Vec<LocatedBlock> {
    let mut blocks: Vec<LocatedBlock> = Vec::new();

    for (field_index, field) in form.fields.iter().enumerate() {
        for &widget_index in &field.widgets {
            let Some(widget) = form.widgets.get(widget_index) else {
                continue;
            };
            let Some((page_index, rect)) = displayed_rect(form, widget) else {
                continue;
            };
            let Some(label) = label_for(field, widget, options) else {
                tracing::debug!("skipping widget {} of an unnamed field", widget.id);
                continue;
            };

            if options.merge == MergePolicy::PerField {
                let existing = blocks
                    .iter_mut()
                    .find(|b| b.field == field_index && b.page_index == page_index);
                if let Some(existing) = existing {
                    let merged = existing.block.rect().union(&rect);
                    existing.block = Block::from_rect(existing.block.label.clone(), &merged);
                    continue;
                }
            }

            blocks.push(LocatedBlock {
                block: Block::from_rect(label, &rect),
                page_index,
                field: field_index,
                widget: widget_index,
            });
        }
    }

    // Stable: field-tree order is kept within a page
    blocks.sort_by_key(|located| located.page_index);
    blocks
}

/// Widget rectangle in displayed-page coordinates, with its page index
fn displayed_rect(form: &AcroForm, widget: &Widget) -> Option<(usize, Rectangle)> {
    let placement = widget.placement?;
    let rect = widget.rect?;
    let page = form.pages.get(placement.page_index)?;
    Some((placement.page_index, to_displayed(page, &rect)))
}

/// Map a page-space rectangle onto the displayed page
pub fn to_displayed(page: &PageInfo, rect: &Rectangle) -> Rectangle {
    let visible = page.visible_box();
    let local = rect.offset_by(visible.lower_left.x, visible.lower_left.y);
    page.rotation
        .rect_to_top_left(&local, visible.width(), visible.height())
}

fn label_for(field: &Field, widget: &Widget, options: &ExtractOptions) -> Option<String> {
    if field.has_name() {
        return Some(field.full_name.clone());
    }
    if !options.fallback_labels {
        return None;
    }
    let placement = widget.placement?;
    Some(fallback_label(placement.page_index, placement.annot_position))
}

/// Label of a widget whose field has no name
pub fn fallback_label(page_index: usize, annot_position: usize) -> String {
    format!("field_{}_{}", page_index + 1, annot_position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::resolve;
    use crate::parser::test_helpers::{build_pdf, simple_form_pdf};
    use crate::parser::{ParseOptions, PdfDocument};
    use pretty_assertions::assert_eq;

    fn form_of(pdf: &[u8]) -> AcroForm {
        let mut doc = PdfDocument::parse(pdf, &ParseOptions::default()).unwrap();
        resolve(&mut doc).unwrap().unwrap()
    }

    fn rotated_form(rotate: i64) -> AcroForm {
        let page = format!("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Rotate {rotate} /Annots [5 0 R] >>");
        let pdf = build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [5 0 R] >> >>"),
                (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
                (3, page.as_str()),
                (5, "<< /Subtype /Widget /FT /Tx /T (full_name) /Rect [100 700 260 720] >>"),
            ],
            "/Root 1 0 R",
        );
        form_of(&pdf)
    }

    #[test]
    fn test_simple_text_field() {
        let form = form_of(&simple_form_pdf());
        let blocks = extract(&form, &ExtractOptions::default());
        assert_eq!(
            blocks,
            vec![Block {
                label: "full_name".to_string(),
                x: 100.0,
                y: 72.0,
                width: 160.0,
                height: 20.0,
            }]
        );
    }

    #[test]
    fn test_rotations() {
        let expected = [
            (0, (100.0, 72.0, 160.0, 20.0)),
            (90, (700.0, 100.0, 20.0, 160.0)),
            (-90, (72.0, 352.0, 20.0, 160.0)),
            (180, (352.0, 700.0, 160.0, 20.0)),
            (270, (72.0, 352.0, 20.0, 160.0)),
        ];
        for (rotate, (x, y, width, height)) in expected {
            let blocks = extract(&rotated_form(rotate), &ExtractOptions::default());
            let block = &blocks[0];
            assert_eq!((block.x, block.y, block.width, block.height), (x, y, width, height), "rotate {rotate}");
        }
    }

    #[test]
    fn test_crop_box_offset() {
        let pdf = build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [5 0 R] >> >>"),
                (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>"),
                (3, "<< /Type /Page /Parent 2 0 R /CropBox [50 100 562 692] /Annots [5 0 R] >>"),
                (5, "<< /Subtype /Widget /FT /Tx /T (a) /Rect [60 600 160 620] >>"),
            ],
            "/Root 1 0 R",
        );
        let blocks = extract(&form_of(&pdf), &ExtractOptions::default());
        // visible height 592; y = 592 - (620 - 100)
        assert_eq!((blocks[0].x, blocks[0].y), (10.0, 72.0));
    }

    fn two_page_form() -> AcroForm {
        let pdf = build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [6 0 R 7 0 R 10 0 R] >> >>"),
                (2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>"),
                (3, "<< /Type /Page /Parent 2 0 R /Annots [8 0 R 10 0 R] >>"),
                (4, "<< /Type /Page /Parent 2 0 R /Annots [9 0 R 7 0 R] >>"),
                (6, "<< /T (addr) /FT /Tx /Kids [8 0 R 9 0 R 11 0 R] >>"),
                (7, "<< /Subtype /Widget /FT /Tx /T (early) /Rect [0 0 5 5] >>"),
                (8, "<< /Subtype /Widget /Parent 6 0 R /Rect [10 10 20 20] >>"),
                (9, "<< /Subtype /Widget /Parent 6 0 R /Rect [10 10 20 20] >>"),
                (10, "<< /Subtype /Widget /FT /Tx /Rect [30 10 40 20] >>"),
                (11, "<< /Subtype /Widget /Parent 6 0 R /P 3 0 R /Rect [30 30 50 40] >>"),
            ],
            "/Root 1 0 R",
        );
        form_of(&pdf)
    }

    #[test]
    fn test_page_then_tree_order_and_fallback() {
        let located = extract_located(&two_page_form(), &ExtractOptions::default());
        let summary: Vec<(usize, &str)> = located
            .iter()
            .map(|b| (b.page_index, b.block.label.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, "addr"),
                (0, "addr"),
                (0, "field_1_2"),
                (1, "addr"),
                (1, "early"),
            ]
        );
    }

    #[test]
    fn test_per_field_merge() {
        let options = ExtractOptions::default().with_merge(MergePolicy::PerField);
        let located = extract_located(&two_page_form(), &options);
        assert_eq!(located.len(), 4);
        let first = &located[0].block;
        assert_eq!(first.label, "addr");
        // [10 10 20 20] and [30 30 50 40] on a 792 high page
        assert_eq!((first.x, first.y, first.width, first.height), (10.0, 752.0, 40.0, 30.0));
    }

    #[test]
    fn test_fallback_labels_can_be_disabled() {
        let options = ExtractOptions {
            fallback_labels: false,
            ..ExtractOptions::default()
        };
        let blocks = extract(&two_page_form(), &options);
        assert!(blocks.iter().all(|b| !b.label.starts_with("field_")));
    }

    #[test]
    fn test_zero_size_rect_kept() {
        let pdf = build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [5 0 R] >> >>"),
                (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
                (3, "<< /Type /Page /Parent 2 0 R /Annots [5 0 R] >>"),
                (5, "<< /Subtype /Widget /FT /Btn /T (sig) /Rect [0 0 0 0] >>"),
            ],
            "/Root 1 0 R",
        );
        let blocks = extract(&form_of(&pdf), &ExtractOptions::default());
        assert_eq!(blocks.len(), 1);
        assert_eq!((blocks[0].width, blocks[0].height), (0.0, 0.0));
    }

    #[test]
    fn test_block_serialization_keys() {
        let block = Block {
            label: "a".to_string(),
            x: 1.0,
            y: 2.5,
            width: 3.0,
            height: 4.0,
        };
        let json = serde_json::to_value(&block).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 5);
        assert_eq!(json["y"], 2.5);
    }

    #[test]
    fn test_same_geometry() {
        let a = Block {
            label: "a".to_string(),
            x: 1.0,
            y: 2.0,
            width: 3.0,
            height: 4.0,
        };
        let mut b = a.clone();
        b.x += 0.005;
        assert!(a.same_geometry(&b));
        b.y += 0.5;
        assert!(!a.same_geometry(&b));
    }
}
