//! Helper functions for creating valid test PDFs with correct offsets

use super::lexer::find_bytes;
use super::xref::find_startxref;

const HEADER: &[u8] = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n";

/// Build a PDF with a classic cross-reference table. `objects` are
/// `(number, body)` pairs; `trailer` is spliced into the trailer dictionary.
pub fn build_pdf(objects: &[(u32, &str)], trailer: &str) -> Vec<u8> {
    let mut out = HEADER.to_vec();
    let mut offsets = Vec::new();
    for (number, body) in objects {
        offsets.push((*number, out.len()));
        out.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    let size = objects.iter().map(|(n, _)| *n).max().unwrap_or(0) + 1;
    let xref_start = out.len();
    let mut xref = format!("xref\n0 {size}\n");
    for number in 0..size {
        match offsets.iter().find(|(n, _)| *n == number) {
            Some((_, offset)) => xref.push_str(&format!("{offset:010} 00000 n \n")),
            None if number == 0 => xref.push_str("0000000000 65535 f \n"),
            None => xref.push_str("0000000000 00001 f \n"),
        }
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {size} {trailer} >>\nstartxref\n{xref_start}\n%%EOF\n"
    ));
    out.extend_from_slice(xref.as_bytes());
    out
}

/// Append an incremental update with a classic table chained to `base`
pub fn append_update(base: &[u8], objects: &[(u32, &str)], trailer: &str) -> Vec<u8> {
    let prev = find_startxref(base).unwrap();
    let mut out = base.to_vec();
    let mut xref = String::from("xref\n");
    let mut entries = Vec::new();
    for (number, body) in objects {
        entries.push((*number, out.len()));
        out.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }
    for (number, offset) in &entries {
        xref.push_str(&format!("{number} 1\n{offset:010} 00000 n \n"));
    }
    let size = entries.iter().map(|(n, _)| *n).max().unwrap_or(0) + 1;
    let xref_start = out.len();
    xref.push_str(&format!(
        "trailer\n<< /Size {size} /Prev {prev} {trailer} >>\nstartxref\n{xref_start}\n%%EOF\n"
    ));
    out.extend_from_slice(xref.as_bytes());
    out
}

/// Build a PDF whose only cross-reference section is an uncompressed
/// `/W [1 4 2]` stream. `compressed` lists `(number, stream, index)` entries
/// for objects stored in object streams.
pub fn build_pdf_with_xref_stream(
    objects: &[(u32, &str)],
    compressed: &[(u32, u32, u32)],
    trailer: &str,
) -> Vec<u8> {
    let mut out = HEADER.to_vec();
    let mut offsets = Vec::new();
    for (number, body) in objects {
        offsets.push((*number, out.len()));
        out.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    let xref_number = objects
        .iter()
        .map(|(n, _)| *n)
        .chain(compressed.iter().map(|(n, _, _)| *n))
        .max()
        .unwrap_or(0)
        + 1;
    let xref_start = out.len();
    offsets.push((xref_number, xref_start));
    let size = xref_number + 1;

    let mut rows = Vec::new();
    for number in 0..size {
        if let Some((_, offset)) = offsets.iter().find(|(n, _)| *n == number) {
            rows.push(1u8);
            rows.extend_from_slice(&(*offset as u32).to_be_bytes());
            rows.extend_from_slice(&0u16.to_be_bytes());
        } else if let Some((_, stream, index)) = compressed.iter().find(|(n, _, _)| *n == number) {
            rows.push(2u8);
            rows.extend_from_slice(&stream.to_be_bytes());
            rows.extend_from_slice(&(*index as u16).to_be_bytes());
        } else {
            rows.push(0u8);
            rows.extend_from_slice(&0u32.to_be_bytes());
            rows.extend_from_slice(&(if number == 0 { 65535u16 } else { 1 }).to_be_bytes());
        }
    }

    out.extend_from_slice(
        format!(
            "{xref_number} 0 obj\n<< /Type /XRef /Size {size} /W [1 4 2] /Length {} {trailer} >>\nstream\n",
            rows.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&rows);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{xref_start}\n%%EOF\n").as_bytes());
    out
}

/// Body of an uncompressed object stream holding `objects`
pub fn object_stream_body(objects: &[(u32, &str)]) -> String {
    let mut header = String::new();
    let mut payload = String::new();
    for (number, body) in objects {
        header.push_str(&format!("{number} {} ", payload.len()));
        payload.push_str(body);
        payload.push(' ');
    }
    let first = header.len();
    let data = format!("{header}{payload}");
    format!(
        "<< /Type /ObjStm /N {} /First {first} /Length {} >>\nstream\n{data}\nendstream",
        objects.len(),
        data.len()
    )
}

/// A one-page document with a single text field `full_name` at
/// `[100 700 260 720]` on a 612x792 page
pub fn simple_form_pdf() -> Vec<u8> {
    build_pdf(
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R /AcroForm 4 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            (
                3,
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [5 0 R] >>",
            ),
            (4, "<< /Fields [5 0 R] /DA (/Helv 0 Tf 0 g) >>"),
            (
                5,
                "<< /Type /Annot /Subtype /Widget /FT /Tx /T (full_name) /Rect [100 700 260 720] /P 3 0 R >>",
            ),
        ],
        "/Root 1 0 R",
    )
}

/// Byte offset of `needle`, for tests that corrupt fixtures
pub fn offset_of(data: &[u8], needle: &[u8]) -> usize {
    find_bytes(data, needle).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_pdf_structure() {
        let pdf = build_pdf(&[(1, "<< /Type /Catalog >>")], "/Root 1 0 R");
        assert!(pdf.starts_with(b"%PDF-1.7\n"));
        assert!(pdf.ends_with(b"%%EOF\n"));
        let xref = find_startxref(&pdf).unwrap();
        assert!(pdf[xref..].starts_with(b"xref"));
    }

    #[test]
    fn test_object_stream_body() {
        let body = object_stream_body(&[(7, "(a)"), (8, "42")]);
        assert!(body.contains("/N 2"));
        assert!(body.contains("7 0 8 4 "));
    }
}
