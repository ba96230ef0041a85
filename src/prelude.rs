//! A single import for everything you need to declare layouts.
//!
//! ```rust
//! use trellis::prelude::*;
//! ```

// Core types
pub use crate::Declaration;
pub use crate::engine::{
    ElementDeclaration, PointerData, PointerDataInteractionState, ScrollContainerData,
    TrellisContext,
};
pub use crate::errors::LayoutError;
pub use crate::id::ElementId;
pub use crate::math::{BoundingBox, Dimensions, Vector2};
pub use crate::render_commands::{RenderCommand, RenderCommandConfig};
pub use crate::text::TextConfig;

// Macros
pub use crate::{grow, fit, fixed, percent};

// Alignment and direction variants are used constantly, so they come in
// unqualified.
pub use crate::align::AlignX::{self, *};
pub use crate::align::AlignY::{self, *};
pub use crate::layout::LayoutDirection::{self, *};

// WrapMode stays namespaced; glob-importing it would shadow Option's None.
pub use crate::text::WrapMode;

pub use crate::color::Color;
