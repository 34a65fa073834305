//! In-memory form fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;

/// A page of a [`FormPdfBuilder`] document
#[derive(Debug, Clone)]
struct PageSpec {
    media_box: [f64; 4],
    crop_box: Option<[f64; 4]>,
    rotate: i32,
    annots: Vec<u32>,
}

/// Builds small AcroForm documents with a classic cross-reference table.
///
/// Objects are numbered in insertion order: the catalog is 1, the page tree
/// 2, the AcroForm 3, and pages and fields follow.
#[derive(Debug, Clone)]
pub struct FormPdfBuilder {
    version: String,
    pages: Vec<PageSpec>,
    fields: Vec<(u32, String)>,
    roots: Vec<u32>,
    next: u32,
    acroform_extra: String,
}

impl Default for FormPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormPdfBuilder {
    pub fn new() -> Self {
        FormPdfBuilder {
            version: "1.7".to_string(),
            pages: Vec::new(),
            fields: Vec::new(),
            roots: Vec::new(),
            next: 4,
            acroform_extra: "/DA (/Helv 0 Tf 0 g)".to_string(),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Add a page and return its index
    pub fn add_page(&mut self, width: f64, height: f64) -> usize {
        self.pages.push(PageSpec {
            media_box: [0.0, 0.0, width, height],
            crop_box: None,
            rotate: 0,
            annots: Vec::new(),
        });
        self.pages.len() - 1
    }

    pub fn rotate_page(&mut self, page: usize, degrees: i32) -> &mut Self {
        self.pages[page].rotate = degrees;
        self
    }

    pub fn crop_page(&mut self, page: usize, crop: [f64; 4]) -> &mut Self {
        self.pages[page].crop_box = Some(crop);
        self
    }

    fn reserve(&mut self) -> u32 {
        let number = self.next;
        self.next += 1;
        number
    }

    /// Page object numbers are assigned lazily so fields can be added first
    fn page_number(&self, page: usize) -> u32 {
        1000 + page as u32
    }

    /// A merged text field/widget
    pub fn text_field(&mut self, page: usize, name: &str, rect: [f64; 4]) -> u32 {
        self.widget_field(page, &format!("/FT /Tx /T ({name})"), rect)
    }

    /// A merged field/widget with arbitrary field entries
    pub fn widget_field(&mut self, page: usize, entries: &str, rect: [f64; 4]) -> u32 {
        let number = self.reserve();
        let body = format!(
            "<< /Type /Annot /Subtype /Widget {entries} /Rect [{} {} {} {}] /P {} 0 R >>",
            rect[0],
            rect[1],
            rect[2],
            rect[3],
            self.page_number(page)
        );
        self.fields.push((number, body));
        self.roots.push(number);
        self.pages[page].annots.push(number);
        number
    }

    /// A radio group whose kids declare `states` in order, laid out
    /// left to right from `origin`
    pub fn radio_group(&mut self, page: usize, name: &str, states: &[&str], origin: (f64, f64)) -> u32 {
        let parent = self.reserve();
        let mut kids = Vec::new();
        for (index, state) in states.iter().enumerate() {
            let kid = self.reserve();
            let x = origin.0 + index as f64 * 30.0;
            let body = format!(
                "<< /Type /Annot /Subtype /Widget /Parent {parent} 0 R /Rect [{x} {} {} {}] /P {} 0 R /AS /Off /AP << /N << /{state} << >> /Off << >> >> >> >>",
                origin.1,
                x + 20.0,
                origin.1 + 20.0,
                self.page_number(page)
            );
            self.fields.push((kid, body));
            self.pages[page].annots.push(kid);
            kids.push(format!("{kid} 0 R"));
        }
        self.fields.push((
            parent,
            format!("<< /FT /Btn /Ff 49152 /T ({name}) /V /Off /Kids [{}] >>", kids.join(" ")),
        ));
        self.roots.push(parent);
        parent
    }

    /// A checkbox whose on-state is `on_state`
    pub fn checkbox(&mut self, page: usize, name: &str, on_state: &str, rect: [f64; 4]) -> u32 {
        self.widget_field(
            page,
            &format!("/FT /Btn /T ({name}) /V /Off /AS /Off /AP << /N << /{on_state} << >> /Off << >> >> >>"),
            rect,
        )
    }

    /// A combo box offering `options`
    pub fn combo(&mut self, page: usize, name: &str, options: &[&str], rect: [f64; 4]) -> u32 {
        let opts: Vec<String> = options.iter().map(|o| format!("({o})")).collect();
        self.widget_field(
            page,
            &format!("/FT /Ch /Ff 131072 /T ({name}) /Opt [{}]", opts.join(" ")),
            rect,
        )
    }

    /// Add entries to the AcroForm dictionary
    pub fn acroform_entries(&mut self, entries: &str) -> &mut Self {
        self.acroform_extra.push(' ');
        self.acroform_extra.push_str(entries);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let page_numbers: HashMap<u32, u32> = (0..self.pages.len())
            .map(|index| (self.page_number(index), self.next + index as u32))
            .collect();
        let renumber = |body: &str| {
            let mut body = body.to_string();
            for (placeholder, actual) in &page_numbers {
                body = body.replace(&format!("/P {placeholder} 0 R"), &format!("/P {actual} 0 R"));
            }
            body
        };

        let mut objects: Vec<(u32, String)> = Vec::new();
        objects.push((1, "<< /Type /Catalog /Pages 2 0 R /AcroForm 3 0 R >>".to_string()));
        let kids: Vec<String> = (0..self.pages.len())
            .map(|index| format!("{} 0 R", self.next + index as u32))
            .collect();
        objects.push((
            2,
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), self.pages.len()),
        ));
        let roots: Vec<String> = self.roots.iter().map(|n| format!("{n} 0 R")).collect();
        objects.push((3, format!("<< /Fields [{}] {} >>", roots.join(" "), self.acroform_extra)));
        for (number, body) in &self.fields {
            objects.push((*number, renumber(body)));
        }
        for (index, page) in self.pages.iter().enumerate() {
            let mut body = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [{} {} {} {}]",
                page.media_box[0], page.media_box[1], page.media_box[2], page.media_box[3]
            );
            if let Some(crop) = page.crop_box {
                body.push_str(&format!(" /CropBox [{} {} {} {}]", crop[0], crop[1], crop[2], crop[3]));
            }
            if page.rotate != 0 {
                body.push_str(&format!(" /Rotate {}", page.rotate));
            }
            let annots: Vec<String> = page.annots.iter().map(|n| format!("{n} 0 R")).collect();
            body.push_str(&format!(" /Annots [{}] >>", annots.join(" ")));
            objects.push((self.next + index as u32, body));
        }
        build_pdf(&self.version, &objects, "/Root 1 0 R")
    }
}

/// Serialize `objects` with a classic cross-reference table
pub fn build_pdf(version: &str, objects: &[(u32, String)], trailer: &str) -> Vec<u8> {
    let mut out = format!("%PDF-{version}\n%\u{e2}\u{e3}\n").into_bytes();
    let mut offsets = HashMap::new();
    for (number, body) in objects {
        offsets.insert(*number, out.len());
        out.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    let size = objects.iter().map(|(n, _)| *n).max().unwrap_or(0) + 1;
    let xref_start = out.len();
    let mut xref = format!("xref\n0 {size}\n");
    for number in 0..size {
        match offsets.get(&number) {
            Some(offset) => xref.push_str(&format!("{offset:010} 00000 n \n")),
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

/// A document with a catalog and one empty page
pub fn formless_pdf() -> Vec<u8> {
    build_pdf(
        "1.4",
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string()),
            (3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string()),
        ],
        "/Root 1 0 R",
    )
}

/// The single-field document: `full_name` at `[100 700 260 720]` on a
/// 612x792 page
pub fn full_name_pdf() -> Vec<u8> {
    let mut builder = FormPdfBuilder::new();
    let page = builder.add_page(612.0, 792.0);
    builder.text_field(page, "full_name", [100.0, 700.0, 260.0, 720.0]);
    builder.build()
}

/// A one-page form with a text field, a checkbox, a combo box and a
/// three-way radio group
pub fn mixed_form_pdf() -> Vec<u8> {
    let mut builder = FormPdfBuilder::new();
    let page = builder.add_page(612.0, 792.0);
    builder.text_field(page, "name", [72.0, 700.0, 300.0, 720.0]);
    builder.checkbox(page, "agree", "Yes", [72.0, 660.0, 92.0, 680.0]);
    builder.combo(page, "color", &["Red", "Green", "Blue"], [72.0, 620.0, 200.0, 640.0]);
    builder.radio_group(page, "size", &["S", "M", "L"], (72.0, 580.0));
    builder.build()
}

pub fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
