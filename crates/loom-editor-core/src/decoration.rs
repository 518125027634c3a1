//! Decoration values handed to views.

use smol_str::SmolStr;

use crate::range::Range;

/// Handle returned by [`EditorView::delta_decorations`](crate::EditorView::delta_decorations).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecorationId(pub u64);

/// How a decorated range is drawn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecorationOptions {
    /// Class applied to the decorated text itself.
    pub class_name: Option<SmolStr>,
    /// Class of a zero-width element rendered before the range start.
    pub before_content_class_name: Option<SmolStr>,
    /// Class of a zero-width element rendered after the range end.
    pub after_content_class_name: Option<SmolStr>,
    /// Packed `0xRRGGBBAA` colour, if the decoration has one of its own.
    pub color: Option<u32>,
    pub hover_message: Option<SmolStr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelDecoration {
    pub range: Range,
    pub options: DecorationOptions,
}

impl ModelDecoration {
    pub fn new(range: Range, options: DecorationOptions) -> Self {
        Self { range, options }
    }
}
