use crate::{color::Color, engine, math::BoundingBox, math::Dimensions};

/// Represents a rectangle with a specified color and corner radii.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectangle {
    /// The fill color of the rectangle.
    pub color: Color,
    /// The corner radii for rounded edges.
    pub corner_radii: CornerRadii,
}

/// One wrapped line of a text element, with its styling attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    /// The text content of this line.
    pub text: String,
    /// The color of the text.
    pub color: Color,
    /// The ID of the font used.
    pub font_id: u16,
    /// The font size.
    pub font_size: u16,
    /// The spacing between letters.
    pub letter_spacing: u16,
    /// The line height.
    pub line_height: u16,
}

/// Defines individual corner radii for an element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CornerRadii {
    /// The radius for the top-left corner.
    pub top_left: f32,
    /// The radius for the top-right corner.
    pub top_right: f32,
    /// The radius for the bottom-left corner.
    pub bottom_left: f32,
    /// The radius for the bottom-right corner.
    pub bottom_right: f32,
}

/// Defines the border width for each side of an element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BorderWidth {
    /// Border width on the left side.
    pub left: u16,
    /// Border width on the right side.
    pub right: u16,
    /// Border width on the top side.
    pub top: u16,
    /// Border width on the bottom side.
    pub bottom: u16,
    /// Border width between child elements.
    pub between_children: u16,
}

/// Represents a border with a specified color, width, and corner radii.
#[derive(Debug, Clone, PartialEq)]
pub struct Border {
    /// The border color.
    pub color: Color,
    /// The corner radii for rounded border edges.
    pub corner_radii: CornerRadii,
    /// The width of the border on each side.
    pub width: BorderWidth,
}

/// Represents an image with its source dimensions and an opaque handle.
///
/// Trellis never touches pixel data. `data` is whatever handle the host
/// renderer registered for this image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Background color drawn behind the image.
    pub background_color: Color,
    /// The corner radii for rounded edges.
    pub corner_radii: CornerRadii,
    /// Opaque handle to the host renderer's image resource.
    pub data: usize,
    /// The image's intrinsic dimensions, used for aspect-ratio sizing.
    pub source_dimensions: Dimensions,
}

/// Represents a custom element with a background color, corner radii, and associated data.
#[derive(Debug, Clone, PartialEq)]
pub struct Custom<CustomElementData> {
    /// The background color of the custom element.
    pub background_color: Color,
    /// The corner radii for rounded edges.
    pub corner_radii: CornerRadii,
    /// The custom element data.
    pub data: CustomElementData,
}

/// Axis enablement for a clip region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clip {
    /// Whether content is clipped and scrollable horizontally.
    pub horizontal: bool,
    /// Whether content is clipped and scrollable vertically.
    pub vertical: bool,
}

impl From<engine::CornerRadius> for CornerRadii {
    fn from(value: engine::CornerRadius) -> Self {
        Self {
            top_left: value.top_left,
            top_right: value.top_right,
            bottom_left: value.bottom_left,
            bottom_right: value.bottom_right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommandConfig<CustomElementData> {
    None(),
    Rectangle(Rectangle),
    Border(Border),
    Text(Text),
    Image(Image),
    /// Pushes a scissor region. Everything until the matching
    /// [`ScissorEnd`](Self::ScissorEnd) is clipped to this command's
    /// bounding box.
    ScissorStart(Clip),
    /// Pops the most recent scissor region.
    ScissorEnd(),
    Custom(Custom<CustomElementData>),
}

/// Represents a render command for drawing an element on the screen.
///
/// Commands come out of [`end_layout`](crate::TrellisContext::end_layout) in
/// paint order: back to front, with scissor pairs properly nested.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCommand<CustomElementData> {
    /// The bounding box defining the area occupied by the element.
    pub bounding_box: BoundingBox,
    /// The specific configuration for rendering this command.
    pub config: RenderCommandConfig<CustomElementData>,
    /// Opaque user data attached to the source element.
    pub user_data: usize,
    /// A unique identifier for the render command.
    pub id: u32,
    /// The z-index determines the stacking order of elements.
    /// Higher values are drawn above lower values.
    pub z_index: i16,
}
