//! AcroForm resolution
//!
//! Builds the interactive form model: the `/Fields` tree is expanded
//! depth-first in `/Kids` order, inheritable attributes are pushed down to the
//! terminal fields and every widget is linked to the page that displays it.

use super::field::{ChoiceOption, Field, FieldFlags, FieldType, Placement, Widget};
use super::page_tree::{collect_pages, PageInfo};
use crate::encoding::{decode_text, normalize_label};
use crate::geometry::Rectangle;
use crate::parser::{ObjectId, ParseResult, PdfDictionary, PdfDocument, PdfObject};
use std::collections::{HashMap, HashSet};

/// The document's interactive form
#[derive(Debug, Clone, PartialEq)]
pub struct AcroForm {
    /// `None` when the form dictionary is direct in the catalog
    pub id: Option<ObjectId>,
    pub dict: PdfDictionary,
    pub need_appearances: bool,
    pub default_appearance: Option<String>,
    /// Terminal fields in traversal order, orphans last
    pub fields: Vec<Field>,
    pub widgets: Vec<Widget>,
    pub pages: Vec<PageInfo>,
}

impl AcroForm {
    /// Field whose fully-qualified name equals `label` after NFC normalisation
    pub fn find_field(&self, label: &str) -> Option<usize> {
        let wanted = normalize_label(label);
        self.fields
            .iter()
            .position(|f| f.has_name() && normalize_label(&f.full_name) == wanted)
    }

    pub fn widgets_of(&self, field: usize) -> impl Iterator<Item = &Widget> {
        self.fields
            .get(field)
            .into_iter()
            .flat_map(|f| f.widgets.iter())
            .filter_map(|w| self.widgets.get(*w))
    }
}

/// Attributes that flow from parent fields to their kids
#[derive(Debug, Clone, Default)]
struct Inherited {
    partial_name: Option<String>,
    full_name: String,
    field_type: Option<String>,
    flags: Option<u32>,
    value: Option<PdfObject>,
    options: Option<PdfObject>,
    max_len: Option<i64>,
    default_appearance: Option<String>,
}

/// Resolve the form. `None` means the document has no form, which is not an error.
pub fn resolve(doc: &mut PdfDocument<'_>) -> ParseResult<Option<AcroForm>> {
    let catalog = doc.catalog()?;
    let Some(form_entry) = catalog.get("AcroForm") else {
        tracing::debug!("catalog has no /AcroForm");
        return Ok(None);
    };
    let id = form_entry.as_reference();
    let Some(dict) = doc.resolve_dict(form_entry)? else {
        tracing::debug!("/AcroForm is not a dictionary");
        return Ok(None);
    };

    let roots: Vec<ObjectId> = match dict.get("Fields") {
        Some(fields) => match doc.resolve(fields)? {
            PdfObject::Array(array) => array.iter().filter_map(PdfObject::as_reference).collect(),
            _ => Vec::new(),
        },
        None => Vec::new(),
    };
    if roots.is_empty() {
        tracing::debug!("/AcroForm has no /Fields");
        return Ok(None);
    }

    let pages = collect_pages(doc, &catalog)?;
    let default_appearance = dict
        .get("DA")
        .and_then(PdfObject::as_string)
        .map(|s| decode_text(s.as_bytes()));
    let need_appearances = dict
        .get("NeedAppearances")
        .and_then(PdfObject::as_bool)
        .unwrap_or(false);

    let root = Inherited {
        default_appearance: default_appearance.clone(),
        ..Inherited::default()
    };
    let mut builder = Builder::new(doc, &pages);
    for field in roots {
        builder.visit(field, &root, 0)?;
    }
    builder.adopt_orphans(&root)?;

    let Builder { fields, widgets, .. } = builder;
    tracing::debug!("resolved {} fields with {} widgets", fields.len(), widgets.len());

    Ok(Some(AcroForm {
        id,
        dict,
        need_appearances,
        default_appearance,
        fields,
        widgets,
        pages,
    }))
}

struct Builder<'d, 'a, 'p> {
    doc: &'d mut PdfDocument<'a>,
    pages: &'p [PageInfo],
    /// Annotation id to (page index, 1-based position)
    annot_positions: HashMap<ObjectId, (usize, usize)>,
    page_by_id: HashMap<ObjectId, usize>,
    /// Widgets placed through `/P` only, per page
    extra_on_page: HashMap<usize, usize>,
    visited: HashSet<ObjectId>,
    claimed: HashSet<ObjectId>,
    fields: Vec<Field>,
    widgets: Vec<Widget>,
}

impl<'d, 'a, 'p> Builder<'d, 'a, 'p> {
    fn new(doc: &'d mut PdfDocument<'a>, pages: &'p [PageInfo]) -> Self {
        let mut annot_positions = HashMap::new();
        let mut page_by_id = HashMap::new();
        for page in pages {
            page_by_id.insert(page.id, page.index);
            for (position, annot) in page.annots.iter().enumerate() {
                annot_positions.entry(*annot).or_insert((page.index, position + 1));
            }
        }
        Builder {
            doc,
            pages,
            annot_positions,
            page_by_id,
            extra_on_page: HashMap::new(),
            visited: HashSet::new(),
            claimed: HashSet::new(),
            fields: Vec::new(),
            widgets: Vec::new(),
        }
    }

    fn visit(&mut self, id: ObjectId, parent: &Inherited, depth: usize) -> ParseResult<()> {
        if depth > self.doc.options().max_depth {
            tracing::warn!("field tree deeper than the nesting limit at {id}; skipping");
            return Ok(());
        }
        if !self.visited.insert(id) {
            tracing::warn!("field tree cycle at {id}; skipping");
            return Ok(());
        }
        let Some(dict) = self.doc.resolve_dict(&PdfObject::Reference(id))? else {
            tracing::warn!("field {id} is not a dictionary; skipping");
            return Ok(());
        };
        let here = self.descend(parent, &dict)?;

        let mut field_kids = Vec::new();
        let mut widget_kids = Vec::new();
        if let Some(kids) = dict.get("Kids") {
            if let PdfObject::Array(kids) = self.doc.resolve(kids)? {
                for kid in kids.iter().filter_map(PdfObject::as_reference) {
                    let Some(kid_dict) = self.doc.resolve_dict(&PdfObject::Reference(kid))? else {
                        tracing::debug!("kid {kid} of {id} is not a dictionary");
                        continue;
                    };
                    if !kid_dict.contains_key("T") && is_widget(&kid_dict) {
                        widget_kids.push((kid, kid_dict));
                    } else {
                        field_kids.push(kid);
                    }
                }
            }
        }

        let own_widget = is_widget(&dict);
        if field_kids.is_empty() || !widget_kids.is_empty() || own_widget {
            let field = self.push_field(id, &here)?;
            if own_widget {
                self.push_widget(id, &dict, field)?;
            }
            for (kid, kid_dict) in widget_kids {
                if self.visited.insert(kid) {
                    self.push_widget(kid, &kid_dict, field)?;
                } else {
                    tracing::warn!("widget {kid} reached twice; skipping");
                }
            }
        }

        for kid in field_kids {
            self.visit(kid, &here, depth + 1)?;
        }
        Ok(())
    }

    /// Apply one field dictionary on top of what its ancestors define
    fn descend(&mut self, parent: &Inherited, dict: &PdfDictionary) -> ParseResult<Inherited> {
        let partial_name = match dict.get("T") {
            Some(t) => self.doc.resolve(t)?.as_string().map(|s| decode_text(s.as_bytes())),
            None => None,
        };
        let full_name = match (&partial_name, parent.full_name.is_empty()) {
            (Some(name), true) => name.clone(),
            (Some(name), false) => format!("{}.{}", parent.full_name, name),
            (None, _) => parent.full_name.clone(),
        };

        let mut here = Inherited {
            partial_name,
            full_name,
            ..parent.clone()
        };
        if let Some(ft) = dict.get("FT").and_then(PdfObject::as_name) {
            here.field_type = Some(ft.to_string());
        }
        if let Some(ff) = self.resolved(dict, "Ff")?.and_then(|f| f.as_integer()) {
            here.flags = Some(ff as u32);
        }
        if let Some(value) = self.resolved(dict, "V")? {
            here.value = Some(value);
        }
        if let Some(options) = self.resolved(dict, "Opt")? {
            here.options = Some(options);
        }
        if let Some(max_len) = self.resolved(dict, "MaxLen")?.and_then(|m| m.as_integer()) {
            here.max_len = Some(max_len);
        }
        if let Some(da) = dict.get("DA").and_then(PdfObject::as_string) {
            here.default_appearance = Some(decode_text(da.as_bytes()));
        }
        Ok(here)
    }

    fn resolved(&mut self, dict: &PdfDictionary, key: &str) -> ParseResult<Option<PdfObject>> {
        match dict.get(key) {
            Some(value) => Ok(Some(self.doc.resolve(value)?).filter(|v| !v.is_null())),
            None => Ok(None),
        }
    }

    fn push_field(&mut self, id: ObjectId, inherited: &Inherited) -> ParseResult<usize> {
        let flags = FieldFlags::from_bits_truncate(inherited.flags.unwrap_or(0));
        let mut options = Vec::new();
        if let Some(PdfObject::Array(entries)) = &inherited.options {
            for entry in entries.iter() {
                let entry = self.doc.resolve(entry)?;
                match ChoiceOption::from_pdf(&entry) {
                    Some(option) => options.push(option),
                    None => tracing::debug!("ignoring malformed /Opt entry in {id}"),
                }
            }
        }

        self.fields.push(Field {
            id,
            partial_name: inherited.partial_name.clone(),
            full_name: inherited.full_name.clone(),
            field_type: FieldType::from_pdf(inherited.field_type.as_deref(), flags),
            flags,
            value: inherited.value.clone(),
            options,
            max_len: inherited.max_len.and_then(|m| usize::try_from(m).ok()),
            default_appearance: inherited.default_appearance.clone(),
            widgets: Vec::new(),
        });
        Ok(self.fields.len() - 1)
    }

    fn push_widget(&mut self, id: ObjectId, dict: &PdfDictionary, field: usize) -> ParseResult<()> {
        let rect = match self.resolved(dict, "Rect")? {
            Some(PdfObject::Array(array)) => Rectangle::from_array(&array),
            _ => None,
        };
        if rect.is_none() {
            tracing::debug!("widget {id} has no usable /Rect");
        }

        let placement = match self.annot_positions.get(&id) {
            Some(&(page_index, annot_position)) => Some(Placement {
                page_index,
                page_id: self.pages[page_index].id,
                annot_position,
            }),
            None => match dict
                .get("P")
                .and_then(PdfObject::as_reference)
                .and_then(|p| self.page_by_id.get(&p).copied())
            {
                Some(page_index) => {
                    let extra = self.extra_on_page.entry(page_index).or_insert(0);
                    *extra += 1;
                    Some(Placement {
                        page_index,
                        page_id: self.pages[page_index].id,
                        annot_position: self.pages[page_index].annots.len() + *extra,
                    })
                }
                None => {
                    tracing::debug!("widget {id} is on no page; it yields no block");
                    None
                }
            },
        };

        let mut on_states = Vec::new();
        if let Some(PdfObject::Dictionary(ap)) = self.resolved(dict, "AP")? {
            if let Some(PdfObject::Dictionary(normal)) = self.resolved(&ap, "N")? {
                on_states = normal
                    .iter()
                    .map(|(state, _)| state.as_str().to_string())
                    .filter(|state| state != "Off")
                    .collect();
            }
        }
        let appearance_state = dict
            .get("AS")
            .and_then(PdfObject::as_name)
            .map(str::to_string);

        self.claimed.insert(id);
        self.widgets.push(Widget {
            id,
            field,
            rect,
            placement,
            on_states,
            appearance_state,
        });
        let index = self.widgets.len() - 1;
        self.fields[field].widgets.push(index);
        Ok(())
    }

    /// Widget annotations on pages that `/Fields` does not reach but that
    /// carry a `/Parent` chain or a `/T`
    fn adopt_orphans(&mut self, root: &Inherited) -> ParseResult<()> {
        let mut orphan_fields: HashMap<ObjectId, usize> = HashMap::new();
        let pages = self.pages;

        for page in pages {
            for &annot in &page.annots {
                if self.claimed.contains(&annot) {
                    continue;
                }
                let Some(dict) = self.doc.resolve_dict(&PdfObject::Reference(annot))? else {
                    continue;
                };
                if dict.get("Subtype").and_then(PdfObject::as_name) != Some("Widget") {
                    continue;
                }
                let field_id = if dict.contains_key("T") {
                    annot
                } else {
                    match dict.get("Parent").and_then(PdfObject::as_reference) {
                        Some(parent) => parent,
                        None => continue,
                    }
                };

                let field = match orphan_fields.get(&field_id) {
                    Some(&field) => field,
                    None => {
                        let field = match self.fields.iter().position(|f| f.id == field_id) {
                            Some(existing) => existing,
                            None => {
                                let inherited = self.inherit_chain(field_id, root)?;
                                self.push_field(field_id, &inherited)?
                            }
                        };
                        orphan_fields.insert(field_id, field);
                        field
                    }
                };
                tracing::debug!("adopting orphan widget {annot} into field {field_id}");
                self.push_widget(annot, &dict, field)?;
            }
        }
        Ok(())
    }

    /// Inherited attributes of `id`, computed by walking `/Parent` to the root
    fn inherit_chain(&mut self, id: ObjectId, root: &Inherited) -> ParseResult<Inherited> {
        let max_depth = self.doc.options().max_depth;
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id);
        while let Some(current) = next {
            if !seen.insert(current) || chain.len() > max_depth {
                tracing::warn!("/Parent chain of {id} loops; truncating");
                break;
            }
            let Some(dict) = self.doc.resolve_dict(&PdfObject::Reference(current))? else {
                break;
            };
            next = dict.get("Parent").and_then(PdfObject::as_reference);
            chain.push(dict);
        }

        let mut inherited = root.clone();
        for dict in chain.iter().rev() {
            inherited = self.descend(&inherited, dict)?;
        }
        Ok(inherited)
    }
}

/// A dictionary that is (also) a widget annotation
fn is_widget(dict: &PdfDictionary) -> bool {
    dict.get("Subtype").and_then(PdfObject::as_name) == Some("Widget") || dict.contains_key("Rect")
}
