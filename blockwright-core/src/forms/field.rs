//! Form field and widget definitions

use crate::encoding::decode_text;
use crate::geometry::Rectangle;
use crate::parser::{ObjectId, PdfObject};
use bitflags::bitflags;

bitflags! {
    /// Field flags according to ISO 32000-1 Tables 221, 226, 228 and 230
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FieldFlags: u32 {
        /// Field is read-only
        const READ_ONLY = 1 << 0;
        /// Field is required
        const REQUIRED = 1 << 1;
        /// Field should not be exported
        const NO_EXPORT = 1 << 2;
        /// Text: multiple lines
        const MULTILINE = 1 << 12;
        /// Text: password entry
        const PASSWORD = 1 << 13;
        /// Radio: one button must always be on
        const NO_TOGGLE_TO_OFF = 1 << 14;
        /// Button: radio button group
        const RADIO = 1 << 15;
        /// Button: push button
        const PUSHBUTTON = 1 << 16;
        /// Choice: combo box rather than list box
        const COMBO = 1 << 17;
        /// Choice: combo box accepts free text
        const EDIT = 1 << 18;
        /// Choice: options are sorted
        const SORT = 1 << 19;
        /// Text: file selection
        const FILE_SELECT = 1 << 20;
        /// Choice: several options may be selected
        const MULTI_SELECT = 1 << 21;
        /// Text: divided into `/MaxLen` combs
        const COMB = 1 << 24;
        /// Radio: buttons with the same on state turn on together
        const RADIOS_IN_UNISON = 1 << 25;
    }
}

/// Kind of button field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Checkbox,
    Radio,
    PushButton,
}

/// Kind of choice field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceKind {
    Combo,
    List,
}

/// Field type, from the inherited `/FT` and `/Ff`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Button(ButtonKind),
    Choice(ChoiceKind),
    Signature,
    /// No `/FT` anywhere in the ancestry
    Unknown,
}

impl FieldType {
    pub fn from_pdf(ft: Option<&str>, flags: FieldFlags) -> Self {
        match ft {
            Some("Tx") => FieldType::Text,
            Some("Btn") if flags.contains(FieldFlags::PUSHBUTTON) => {
                FieldType::Button(ButtonKind::PushButton)
            }
            Some("Btn") if flags.contains(FieldFlags::RADIO) => FieldType::Button(ButtonKind::Radio),
            Some("Btn") => FieldType::Button(ButtonKind::Checkbox),
            Some("Ch") if flags.contains(FieldFlags::COMBO) => FieldType::Choice(ChoiceKind::Combo),
            Some("Ch") => FieldType::Choice(ChoiceKind::List),
            Some("Sig") => FieldType::Signature,
            _ => FieldType::Unknown,
        }
    }

    /// Short name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Button(ButtonKind::Checkbox) => "checkbox",
            FieldType::Button(ButtonKind::Radio) => "radio",
            FieldType::Button(ButtonKind::PushButton) => "pushbutton",
            FieldType::Choice(ChoiceKind::Combo) => "combo",
            FieldType::Choice(ChoiceKind::List) => "list",
            FieldType::Signature => "signature",
            FieldType::Unknown => "unknown",
        }
    }
}

/// One `/Opt` entry: a plain string or an `[export display]` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub export: String,
    pub display: String,
}

impl ChoiceOption {
    /// Read one element of an `/Opt` array
    pub fn from_pdf(object: &PdfObject) -> Option<Self> {
        match object {
            PdfObject::String(s) => {
                let text = decode_text(s.as_bytes());
                Some(ChoiceOption {
                    export: text.clone(),
                    display: text,
                })
            }
            PdfObject::Array(pair) => {
                let text = |i: usize| {
                    pair.get(i)
                        .and_then(PdfObject::as_string)
                        .map(|s| decode_text(s.as_bytes()))
                };
                let export = text(0)?;
                let display = text(1).unwrap_or_else(|| export.clone());
                Some(ChoiceOption { export, display })
            }
            _ => None,
        }
    }

    /// Whether `value` names this option by export or display text
    pub fn matches(&self, value: &str) -> bool {
        self.export == value || self.display == value
    }
}

/// A terminal form field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// The field dictionary
    pub id: ObjectId,
    /// `/T`, decoded
    pub partial_name: Option<String>,
    /// Ancestor names joined with `.`; empty when no node in the chain is named
    pub full_name: String,
    pub field_type: FieldType,
    pub flags: FieldFlags,
    /// Inherited `/V`
    pub value: Option<PdfObject>,
    pub options: Vec<ChoiceOption>,
    pub max_len: Option<usize>,
    pub default_appearance: Option<String>,
    /// Indexes into [`super::AcroForm::widgets`]
    pub widgets: Vec<usize>,
}

impl Field {
    pub fn is_read_only(&self) -> bool {
        self.flags.contains(FieldFlags::READ_ONLY)
    }

    pub fn has_name(&self) -> bool {
        !self.full_name.is_empty()
    }

    /// Current value rendered for diagnostics
    pub fn value_text(&self) -> Option<String> {
        match self.value.as_ref()? {
            PdfObject::String(s) => Some(decode_text(s.as_bytes())),
            PdfObject::Name(n) => Some(n.as_str().to_string()),
            PdfObject::Array(values) => Some(
                values
                    .iter()
                    .filter_map(|v| v.as_string().map(|s| decode_text(s.as_bytes())))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            PdfObject::Integer(i) => Some(i.to_string()),
            PdfObject::Real(r) => Some(r.to_string()),
            _ => None,
        }
    }
}

/// Where a widget sits in the page tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Zero-based page index
    pub page_index: usize,
    pub page_id: ObjectId,
    /// 1-based position of the widget among the page's annotations
    pub annot_position: usize,
}

/// A widget annotation belonging to a field
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: ObjectId,
    /// Index into [`super::AcroForm::fields`]
    pub field: usize,
    /// `/Rect`, normalised; `None` when missing or malformed
    pub rect: Option<Rectangle>,
    /// `None` when the widget is on no page
    pub placement: Option<Placement>,
    /// Appearance states declared in `/AP /N`, except `Off`
    pub on_states: Vec<String>,
    /// Current `/AS`
    pub appearance_state: Option<String>,
}

impl Widget {
    pub fn declares(&self, state: &str) -> bool {
        self.on_states.iter().any(|s| s == state)
    }
}
