//! Property-based tests for the tokenizer and the detect/fill pipeline

mod common;

use blockwright::parser::{Lexer, Token};
use blockwright::{detect_blocks, fill_blocks};
use common::{mixed_form_pdf, values, FormPdfBuilder};
use proptest::prelude::*;

/// Bytes that look like PDF syntax often enough to reach deep lexer paths
fn pdf_like_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            Just(b"<<".to_vec()),
            Just(b">>".to_vec()),
            Just(b"[".to_vec()),
            Just(b"]".to_vec()),
            Just(b"(".to_vec()),
            Just(b")".to_vec()),
            Just(b"\\".to_vec()),
            Just(b"/".to_vec()),
            Just(b"<".to_vec()),
            Just(b"#".to_vec()),
            Just(b"%".to_vec()),
            Just(b" ".to_vec()),
            Just(b"\n".to_vec()),
            Just(b"stream\n".to_vec()),
            Just(b"obj".to_vec()),
            "[0-9.+-]{1,6}".prop_map(|s| s.into_bytes()),
            "[A-Za-z]{1,6}".prop_map(|s| s.into_bytes()),
            any::<u8>().prop_map(|b| vec![b]),
        ],
        0..64,
    )
    .prop_map(|parts| parts.concat())
}

fn field_value() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,40}",
        "[()\\\\]{0,8}",
        "\\PC{0,20}",
    ]
}

proptest! {
    #[test]
    fn test_tokenizer_never_panics(data in pdf_like_bytes()) {
        let mut lexer = Lexer::new(&data);
        for _ in 0..=data.len() {
            match lexer.next_token() {
                Ok(Token::Eof) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }

    #[test]
    fn test_detect_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut pdf = b"%PDF-1.7\n".to_vec();
        pdf.extend_from_slice(&data);
        let _ = detect_blocks(&pdf);
    }

    #[test]
    fn test_geometry_invariant_under_fill(value in field_value(), agree in any::<bool>(), size in 0usize..3) {
        let pdf = mixed_form_pdf();
        let before = detect_blocks(&pdf).unwrap();
        let fields = values(&[
            ("name", value.as_str()),
            ("agree", if agree { "Yes" } else { "Off" }),
            ("size", ["S", "M", "L"][size]),
        ]);
        let out = fill_blocks(&pdf, &before, &fields).unwrap();
        let after = detect_blocks(&out).unwrap();

        prop_assert_eq!(after.len(), before.len());
        for (a, b) in after.iter().zip(&before) {
            prop_assert_eq!(&a.label, &b.label);
            prop_assert!(a.same_geometry(b));
        }
    }

    #[test]
    fn test_fill_idempotent(value in field_value()) {
        let pdf = mixed_form_pdf();
        let fields = values(&[("name", value.as_str())]);
        let once = fill_blocks(&pdf, &[], &fields).unwrap();
        let twice = fill_blocks(&once, &[], &fields).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_blocks_stay_on_rotated_page(
        x in 0.0f64..500.0,
        y in 0.0f64..700.0,
        width in 0.0f64..100.0,
        height in 0.0f64..80.0,
        quarter in -4i32..8,
    ) {
        let (x, y) = (x.round(), y.round());
        let (width, height) = (width.round(), height.round());
        let mut builder = FormPdfBuilder::new();
        let page = builder.add_page(612.0, 792.0);
        builder.rotate_page(page, quarter * 90);
        builder.text_field(page, "f", [x, y, x + width, y + height]);

        let blocks = detect_blocks(&builder.build()).unwrap();
        prop_assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        let (w, h) = if quarter.rem_euclid(2) == 1 { (792.0, 612.0) } else { (612.0, 792.0) };
        prop_assert!(block.width >= 0.0 && block.height >= 0.0);
        prop_assert!(block.x >= -0.01 && block.x + block.width <= w + 0.01);
        prop_assert!(block.y >= -0.01 && block.y + block.height <= h + 0.01);
        // Rotation swaps extents, never scales them
        let extents = if quarter.rem_euclid(2) == 1 { (height, width) } else { (width, height) };
        prop_assert!((block.width - extents.0).abs() < 0.01);
        prop_assert!((block.height - extents.1).abs() < 0.01);
    }
}
