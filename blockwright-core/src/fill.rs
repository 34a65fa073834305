//! Form value writeback
//!
//! [`FieldWriter`] applies `label -> value` pairs to the fields of a resolved
//! form, editing the document's object overlay. Every edit is
//! change-detecting, so values the document already holds modify nothing.

use crate::blocks::{extract_located, Block, ExtractOptions, LocatedBlock};
use crate::encoding::encode_text;
use crate::error::{EngineError, ErrorCode};
use crate::forms::{AcroForm, ButtonKind, ChoiceKind, Field, FieldFlags, FieldType};
use crate::parser::{ObjectId, ParseError, PdfArray, PdfDictionary, PdfDocument, PdfObject, PdfString};
use crate::writer::WriteMode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-field failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FillError {
    #[error("No field matches label '{0}'")]
    FieldNotFound(String),

    #[error("'{value}' is not an option of field '{field}'")]
    InvalidChoice { field: String, value: String },

    #[error("'{state}' is not an appearance state of field '{field}'")]
    InvalidButtonState { field: String, state: String },

    #[error("Value of {length} characters exceeds /MaxLen {max_len} of field '{field}'")]
    ValueTooLong {
        field: String,
        length: usize,
        max_len: usize,
    },

    #[error("Field '{0}' is read-only")]
    FieldReadOnly(String),

    #[error("Field '{field}' of type {kind} cannot hold a value")]
    UnsupportedField { field: String, kind: &'static str },
}

impl FillError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FillError::FieldNotFound(_) => ErrorCode::FieldNotFound,
            FillError::InvalidChoice { .. } => ErrorCode::InvalidChoice,
            FillError::InvalidButtonState { .. } => ErrorCode::InvalidButtonState,
            FillError::ValueTooLong { .. } => ErrorCode::ValueTooLong,
            FillError::FieldReadOnly(_) => ErrorCode::FieldReadOnly,
            FillError::UnsupportedField { .. } => ErrorCode::UnsupportedField,
        }
    }

    /// Label of the field the failure is about
    pub fn field(&self) -> &str {
        match self {
            FillError::FieldNotFound(field) | FillError::FieldReadOnly(field) => field,
            FillError::InvalidChoice { field, .. }
            | FillError::InvalidButtonState { field, .. }
            | FillError::ValueTooLong { field, .. }
            | FillError::UnsupportedField { field, .. } => field,
        }
    }
}

/// What happens when a single field cannot be filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillPolicy {
    /// Record a warning and continue with the remaining fields
    #[default]
    BestEffort,
    /// Abort the whole call with the first failure
    FailFast,
}

/// Options for filling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FillOptions {
    pub policy: FillPolicy,
    pub write_mode: WriteMode,
}

impl FillOptions {
    pub fn fail_fast() -> Self {
        Self {
            policy: FillPolicy::FailFast,
            ..Self::default()
        }
    }
}

/// Outcome of a fill pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillReport {
    /// Labels whose value was applied, in label order
    pub filled: Vec<String>,
    /// Per-field failures collected under [`FillPolicy::BestEffort`]
    pub warnings: Vec<EngineError>,
}

enum Failure {
    Field(FillError),
    Document(ParseError),
}

impl From<FillError> for Failure {
    fn from(error: FillError) -> Self {
        Failure::Field(error)
    }
}

impl From<ParseError> for Failure {
    fn from(error: ParseError) -> Self {
        Failure::Document(error)
    }
}

/// Writes values into the fields of one form
pub struct FieldWriter<'f> {
    form: &'f AcroForm,
    options: FillOptions,
    computed: Vec<LocatedBlock>,
}

impl<'f> FieldWriter<'f> {
    pub fn new(form: &'f AcroForm, options: FillOptions, extract: &ExtractOptions) -> Self {
        FieldWriter {
            form,
            options,
            computed: extract_located(form, extract),
        }
    }

    /// Apply `values` (label to value). `blocks` are the blocks the caller
    /// received from detection; they let unnamed widgets be found by geometry.
    pub fn write(
        &self,
        doc: &mut PdfDocument<'_>,
        blocks: &[Block],
        values: &HashMap<String, String>,
    ) -> Result<FillReport, EngineError> {
        let mut report = FillReport::default();
        let ordered: BTreeMap<&String, &String> = values.iter().collect();

        for (label, value) in ordered {
            let outcome = match self.target(label, blocks) {
                Some(field) => self.apply(doc, field, label, value),
                None if blocks.iter().any(|b| &b.label == label) => {
                    Err(FillError::FieldNotFound(label.clone()).into())
                }
                None => {
                    tracing::debug!("ignoring unknown label '{label}'");
                    continue;
                }
            };

            match outcome {
                Ok(changed) => {
                    tracing::debug!("filled '{label}' (changed: {changed})");
                    report.filled.push(label.clone());
                }
                Err(Failure::Document(error)) => return Err(error.into()),
                Err(Failure::Field(error)) => match self.options.policy {
                    FillPolicy::FailFast => return Err(error.into()),
                    FillPolicy::BestEffort => {
                        tracing::warn!("{error}");
                        report.warnings.push(error.into());
                    }
                },
            }
        }

        Ok(report)
    }

    /// Field a label refers to: by fully-qualified name, then by the
    /// geometry of a supplied block, then by a computed fallback label
    fn target(&self, label: &str, blocks: &[Block]) -> Option<usize> {
        if let Some(field) = self.form.find_field(label) {
            return Some(field);
        }
        let by_geometry = blocks
            .iter()
            .filter(|b| b.label == label)
            .find_map(|supplied| {
                self.computed
                    .iter()
                    .find(|c| c.block.same_geometry(supplied))
                    .map(|c| c.field)
            });
        by_geometry.or_else(|| {
            self.computed
                .iter()
                .find(|c| c.block.label == label)
                .map(|c| c.field)
        })
    }

    fn apply(&self, doc: &mut PdfDocument<'_>, index: usize, label: &str, value: &str) -> Result<bool, Failure> {
        let field = &self.form.fields[index];
        if field.is_read_only() {
            return Err(FillError::FieldReadOnly(label.to_string()).into());
        }
        match field.field_type {
            FieldType::Text => self.fill_text(doc, field, label, value),
            FieldType::Choice(kind) => self.fill_choice(doc, field, kind, label, value),
            FieldType::Button(ButtonKind::Checkbox) => self.fill_checkbox(doc, index, label, value),
            FieldType::Button(ButtonKind::Radio) => self.fill_radio(doc, index, label, value),
            other => Err(FillError::UnsupportedField {
                field: label.to_string(),
                kind: other.name(),
            }
            .into()),
        }
    }

    fn fill_text(&self, doc: &mut PdfDocument<'_>, field: &Field, label: &str, value: &str) -> Result<bool, Failure> {
        if let Some(max_len) = field.max_len {
            let length = value.chars().count();
            if length > max_len {
                return Err(FillError::ValueTooLong {
                    field: label.to_string(),
                    length,
                    max_len,
                }
                .into());
            }
        }

        let text = PdfObject::String(PdfString::new(encode_text(value)));
        let changed = edit(doc, field.id, |dict| dict.insert("V", text))?;
        if changed {
            self.invalidate_appearances(doc, field)?;
        }
        Ok(changed)
    }

    fn fill_choice(
        &self,
        doc: &mut PdfDocument<'_>,
        field: &Field,
        kind: ChoiceKind,
        label: &str,
        value: &str,
    ) -> Result<bool, Failure> {
        let selected = field.options.iter().position(|option| option.matches(value));
        let editable = kind == ChoiceKind::Combo && field.flags.contains(FieldFlags::EDIT);

        let changed = match selected {
            Some(index) => {
                let export = PdfObject::String(PdfString::new(encode_text(&field.options[index].export)));
                edit(doc, field.id, |dict| {
                    dict.insert("V", export);
                    dict.insert("I", PdfObject::Array(PdfArray(vec![PdfObject::Integer(index as i64)])));
                })?
            }
            None if editable => {
                let text = PdfObject::String(PdfString::new(encode_text(value)));
                edit(doc, field.id, |dict| {
                    dict.insert("V", text);
                    dict.remove("I");
                })?
            }
            None => {
                return Err(FillError::InvalidChoice {
                    field: label.to_string(),
                    value: value.to_string(),
                }
                .into())
            }
        };
        if changed {
            self.invalidate_appearances(doc, field)?;
        }
        Ok(changed)
    }

    fn fill_checkbox(&self, doc: &mut PdfDocument<'_>, index: usize, label: &str, value: &str) -> Result<bool, Failure> {
        let field = &self.form.fields[index];
        let declared = self.declared_states(index);
        let state = if value == OFF || declared.iter().any(|s| s == value) {
            value.to_string()
        } else if is_truthy(value) && declared.len() == 1 {
            declared[0].clone()
        } else if is_truthy(value) && declared.iter().any(|s| s == YES) {
            YES.to_string()
        } else if is_falsy(value) {
            OFF.to_string()
        } else {
            return Err(FillError::InvalidButtonState {
                field: label.to_string(),
                state: value.to_string(),
            }
            .into());
        };

        let mut changed = edit(doc, field.id, |dict| dict.insert("V", PdfObject::name(&state)))?;
        for widget in self.form.widgets_of(index) {
            let on = state != OFF && (widget.declares(&state) || (widget.on_states.is_empty() && state == YES));
            let appearance = if on { state.as_str() } else { OFF };
            changed |= edit(doc, widget.id, |dict| dict.insert("AS", PdfObject::name(appearance)))?;
        }
        Ok(changed)
    }

    fn fill_radio(&self, doc: &mut PdfDocument<'_>, index: usize, label: &str, value: &str) -> Result<bool, Failure> {
        let field = &self.form.fields[index];
        let widgets: Vec<_> = self.form.widgets_of(index).collect();
        let declared = self.declared_states(index);

        // The widget chosen through /Opt, when the value is an export value
        let mut chosen = None;
        let state = if value == OFF || declared.iter().any(|s| s == value) {
            value.to_string()
        } else if let Some(widget) = field
            .options
            .iter()
            .position(|option| option.matches(value))
            .and_then(|position| widgets.get(position))
            .filter(|widget| !widget.on_states.is_empty())
        {
            chosen = Some(widget.id);
            widget.on_states[0].clone()
        } else {
            return Err(FillError::InvalidButtonState {
                field: label.to_string(),
                state: value.to_string(),
            }
            .into());
        };

        let unison = field.flags.contains(FieldFlags::RADIOS_IN_UNISON);
        let mut turned_on = false;
        let mut appearances = Vec::with_capacity(widgets.len());
        for widget in &widgets {
            let candidate = match chosen {
                Some(id) => widget.id == id,
                None => widget.declares(&state) || (widget.on_states.is_empty() && state == YES),
            };
            let on = state != OFF && candidate && (unison || !turned_on);
            turned_on |= on;
            appearances.push((widget.id, if on { state.as_str() } else { OFF }));
        }
        // A group must never end up with /V naming a state no widget shows
        if state != OFF && !turned_on {
            return Err(FillError::InvalidButtonState {
                field: label.to_string(),
                state: value.to_string(),
            }
            .into());
        }

        let mut changed = edit(doc, field.id, |dict| dict.insert("V", PdfObject::name(&state)))?;
        for (id, appearance) in appearances {
            changed |= edit(doc, id, |dict| dict.insert("AS", PdfObject::name(appearance)))?;
        }
        Ok(changed)
    }

    /// On states declared across a field's widgets, in widget order; `Yes`
    /// when none declares any
    fn declared_states(&self, index: usize) -> Vec<String> {
        let mut states: Vec<String> = Vec::new();
        for widget in self.form.widgets_of(index) {
            for state in &widget.on_states {
                if !states.contains(state) {
                    states.push(state.clone());
                }
            }
        }
        if states.is_empty() {
            states.push(YES.to_string());
        }
        states
    }

    /// Drop stale appearance streams and ask viewers to regenerate them
    fn invalidate_appearances(&self, doc: &mut PdfDocument<'_>, field: &Field) -> Result<(), Failure> {
        for widget in field.widgets.iter().filter_map(|w| self.form.widgets.get(*w)) {
            edit(doc, widget.id, |dict| {
                dict.remove("AP");
            })?;
        }
        match self.form.id {
            Some(id) => {
                edit(doc, id, |dict| dict.insert("NeedAppearances", PdfObject::Boolean(true)))?;
            }
            None => {
                let root = doc.trailer().root()?;
                edit(doc, root, |catalog| {
                    if let Some(form) = catalog.get_mut("AcroForm").and_then(PdfObject::as_dict_mut) {
                        form.insert("NeedAppearances", PdfObject::Boolean(true));
                    }
                })?;
            }
        }
        Ok(())
    }
}

const OFF: &str = "Off";
const YES: &str = "Yes";

fn is_truthy(value: &str) -> bool {
    ["true", "yes", "on", "1", "x", "checked"]
        .iter()
        .any(|alias| value.eq_ignore_ascii_case(alias))
}

fn is_falsy(value: &str) -> bool {
    value.is_empty()
        || ["false", "no", "off", "0"]
            .iter()
            .any(|alias| value.eq_ignore_ascii_case(alias))
}

/// Edit the dictionary of object `id` in place; `true` when it changed
fn edit(doc: &mut PdfDocument<'_>, id: ObjectId, change: impl FnOnce(&mut PdfDictionary)) -> Result<bool, ParseError> {
    let mut object = doc.get(id)?;
    let Some(dict) = object.as_dict_mut() else {
        tracing::debug!("{id} is not a dictionary; not edited");
        return Ok(false);
    };
    change(dict);
    doc.update(id, object)
}
