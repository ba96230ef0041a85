//! Trellis is an immediate-mode UI layout engine. Every frame you declare a
//! tree of elements, the engine solves their sizes and positions, and hands
//! back a flat list of render commands in paint order. There is no rendering
//! and no font handling here; you bring both and drive them from the
//! commands.
//!
//! ```rust
//! use trellis::{fixed, grow, Color, Declaration, Dimensions, TrellisContext};
//!
//! fn main() -> Result<(), trellis::LayoutError> {
//!     let mut ctx: TrellisContext = TrellisContext::new(Dimensions::new(800.0, 600.0));
//!     ctx.begin_layout()?;
//!     ctx.with_element(
//!         &Declaration::new()
//!             .layout(|l| {
//!                 l.width(grow!()).height(fixed!(48.0)).padding(8);
//!             })
//!             .background_color(Color::rgb(24.0, 24.0, 24.0)),
//!         |_| Ok(()),
//!     )?;
//!     for command in ctx.end_layout()? {
//!         // Hand each command to your renderer here.
//!         let _ = command;
//!     }
//!     Ok(())
//! }
//! ```

pub mod align;
pub mod color;
pub mod elements;
pub mod engine;
pub mod errors;
pub mod id;
pub mod layout;
pub mod math;
pub mod prelude;
pub mod render_commands;
pub mod text;

use std::fmt::Debug;

use crate::elements::{BorderBuilder, CornerRadiusBuilder, FloatingBuilder};
use crate::engine::ImageConfig;
use crate::layout::LayoutBuilder;

pub use crate::color::Color;
pub use crate::engine::{
    ElementDeclaration, PointerData, PointerDataInteractionState, ScrollContainerData,
    TrellisContext,
};
pub use crate::errors::LayoutError;
pub use crate::id::ElementId;
pub use crate::math::{BoundingBox, Dimensions, Vector2};
pub use crate::render_commands::{RenderCommand, RenderCommandConfig};

/// Builds an [`ElementDeclaration`] fluently. Sub-configs are edited through
/// short-lived builders handed to closures:
///
/// ```rust
/// use trellis::{fixed, grow, Color, Declaration};
///
/// let mut declaration: Declaration = Declaration::new();
/// declaration
///     .layout(|l| {
///         l.width(grow!()).height(fixed!(40.0)).padding(8);
///     })
///     .background_color(Color::rgb(30.0, 30.0, 30.0))
///     .corner_radius(|c| {
///         c.all(4.0);
///     });
/// ```
#[derive(Debug, Clone, Default)]
pub struct Declaration<CustomElementData: Clone + Default + Debug = ()> {
    inner: ElementDeclaration<CustomElementData>,
}

impl<CustomElementData: Clone + Default + Debug> Declaration<CustomElementData> {
    pub fn new() -> Self {
        Self {
            inner: ElementDeclaration::default(),
        }
    }

    /// Gives the element an explicit id instead of a derived anonymous one.
    #[inline]
    pub fn id(&mut self, id: ElementId) -> &mut Self {
        self.inner.id = Some(id);
        self
    }

    /// Configures sizing, padding, gaps, direction and child alignment.
    #[inline]
    pub fn layout(&mut self, configure: impl FnOnce(&mut LayoutBuilder)) -> &mut Self {
        let mut builder = LayoutBuilder {
            config: self.inner.layout,
        };
        configure(&mut builder);
        self.inner.layout = builder.config;
        self
    }

    #[inline]
    pub fn background_color(&mut self, color: impl Into<Color>) -> &mut Self {
        self.inner.background_color = color.into();
        self
    }

    /// Rounds the element's corners on its background, image and border
    /// commands.
    #[inline]
    pub fn corner_radius(
        &mut self,
        configure: impl FnOnce(&mut CornerRadiusBuilder),
    ) -> &mut Self {
        let mut builder = CornerRadiusBuilder {
            config: self.inner.corner_radius,
        };
        configure(&mut builder);
        self.inner.corner_radius = builder.config;
        self
    }

    /// Detaches the element from normal flow and positions it relative to an
    /// attach target. See [`FloatingBuilder`].
    #[inline]
    pub fn floating(&mut self, configure: impl FnOnce(&mut FloatingBuilder)) -> &mut Self {
        let mut builder = FloatingBuilder {
            config: self.inner.floating,
        };
        configure(&mut builder);
        self.inner.floating = builder.config;
        self
    }

    /// Draws a border inside the element's bounds. See [`BorderBuilder`].
    #[inline]
    pub fn border(&mut self, configure: impl FnOnce(&mut BorderBuilder)) -> &mut Self {
        let mut builder = BorderBuilder {
            config: self.inner.border,
        };
        configure(&mut builder);
        self.inner.border = builder.config;
        self
    }

    /// Clips children to the element's bounds and lets them scroll on the
    /// enabled axes.
    #[inline]
    pub fn scroll(&mut self, horizontal: bool, vertical: bool) -> &mut Self {
        self.inner.scroll.horizontal = horizontal;
        self.inner.scroll.vertical = vertical;
        self
    }

    /// Marks the element as an image. `data` is echoed back untouched on the
    /// render command; `source_dimensions` drive aspect-ratio sizing.
    #[inline]
    pub fn image(&mut self, data: usize, source_dimensions: Dimensions) -> &mut Self {
        self.inner.image = Some(ImageConfig {
            data,
            source_dimensions,
        });
        self
    }

    /// Attaches a host-defined payload, emitted as a custom render command in
    /// place of a background rectangle.
    #[inline]
    pub fn custom(&mut self, data: CustomElementData) -> &mut Self {
        self.inner.custom = Some(data);
        self
    }

    /// Opaque user data echoed back on this element's render commands.
    #[inline]
    pub fn user_data(&mut self, user_data: usize) -> &mut Self {
        self.inner.user_data = user_data;
        self
    }

    fn build(&self) -> ElementDeclaration<CustomElementData> {
        self.inner.clone()
    }
}

impl<CustomElementData: Clone + Default + Debug> TrellisContext<CustomElementData> {
    /// Opens an element, applies `declaration`, runs `children` to declare
    /// its contents, then closes it again.
    pub fn with_element<F>(
        &mut self,
        declaration: &Declaration<CustomElementData>,
        children: F,
    ) -> Result<(), LayoutError>
    where
        F: FnOnce(&mut Self) -> Result<(), LayoutError>,
    {
        self.open_element()?;
        self.configure_open_element(declaration.build())?;
        children(self)?;
        self.close_element()
    }

    /// Declares a childless element in one call.
    pub fn element(
        &mut self,
        declaration: &Declaration<CustomElementData>,
    ) -> Result<(), LayoutError> {
        self.with_element(declaration, |_| Ok(()))
    }
}
