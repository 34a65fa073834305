//! Interactive form (AcroForm) model
//!
//! [`resolve`] reads the form from a parsed document: terminal fields with
//! their inherited attributes, the widgets that display them and the pages
//! those widgets sit on.

mod field;
mod page_tree;
mod resolver;

pub use field::{ButtonKind, ChoiceKind, ChoiceOption, Field, FieldFlags, FieldType, Placement, Widget};
pub use page_tree::{collect_pages, PageInfo, DEFAULT_MEDIA_BOX};
pub use resolver::{resolve, AcroForm};
