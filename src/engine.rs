//! Core layout engine: element tree construction, two-pass sizing, text
//! wrapping and render command generation.
//!
//! A [`TrellisContext`] owns every buffer the engine touches. Per-frame
//! buffers are cleared (never freed) by `begin_layout`, so a steady-state
//! frame's only allocations are the owned strings behind text elements and
//! their emitted lines. Persistent state (the element registry, text
//! measurement cache and scroll containers) survives across frames keyed
//! by element id.

use std::fmt::Debug;

use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::align::{AlignX, AlignY};
use crate::color::Color;
use crate::elements::{FloatingAttachToElement, FloatingClipToElement, PointerCaptureMode};
use crate::errors::LayoutError;
use crate::id::{
    hash_number, hash_string, hash_string_with_offset, hash_text_with_config, ElementId,
};
use crate::layout::{LayoutDirection, SizingType};
use crate::math::{BoundingBox, Dimensions, Vector2};
use crate::render_commands::{
    Border, BorderWidth, Clip, CornerRadii, Custom, Image, Rectangle, RenderCommand,
    RenderCommandConfig, Text,
};
use crate::text::{TextConfig, WrapMode};

/// Default capacity for layout elements and render commands per frame.
pub const DEFAULT_MAX_ELEMENT_COUNT: usize = 8192;
/// Default capacity of the measured-word cache shared by all text elements.
pub const DEFAULT_MAX_MEASURE_TEXT_WORD_CACHE_COUNT: usize = 16384;

/// Persistent scroll containers are capped independently of element count.
const MAX_SCROLL_CONTAINER_COUNT: usize = 10;

const EPSILON: f32 = 0.01;

const ROOT_CONTAINER_NAME: &str = "Trellis__RootContainer";
const FLOATING_CONTAINER_NAME: &str = "Trellis__FloatingContainer";

fn float_equal(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn clamp(min: f32, max: f32, value: f32) -> f32 {
    max.min(min.max(value))
}

// ============================================================================
// Element configuration
// ============================================================================

/// Minimum and maximum bounds for one sizing axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SizingMinMax {
    pub min: f32,
    pub max: f32,
}

/// Sizing behavior along a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SizingAxis {
    pub type_: SizingType,
    pub min_max: SizingMinMax,
    pub percent: f32,
}

/// Sizing behavior for both axes of an element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SizingConfig {
    pub width: SizingAxis,
    pub height: SizingAxis,
}

impl SizingConfig {
    pub(crate) fn axis(&self, x_axis: bool) -> SizingAxis {
        if x_axis {
            self.width
        } else {
            self.height
        }
    }

    pub(crate) fn clamp_width(&self, width: f32) -> f32 {
        clamp(self.width.min_max.min, self.width.min_max.max, width)
    }

    pub(crate) fn clamp_height(&self, height: f32) -> f32 {
        clamp(self.height.min_max.min, self.height.min_max.max, height)
    }
}

/// Inner spacing between an element's bounds and its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaddingConfig {
    pub left: u16,
    pub right: u16,
    pub top: u16,
    pub bottom: u16,
}

impl PaddingConfig {
    pub(crate) fn horizontal(&self) -> u16 {
        self.left + self.right
    }

    pub(crate) fn vertical(&self) -> u16 {
        self.top + self.bottom
    }

    pub(crate) fn size_axis(&self, x_axis: bool) -> f32 {
        if x_axis {
            self.horizontal() as f32
        } else {
            self.vertical() as f32
        }
    }
}

/// How children are aligned inside leftover space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChildAlignmentConfig {
    pub x: AlignX,
    pub y: AlignY,
}

/// Layout behavior of a single element: sizing, padding, gaps, direction
/// and child alignment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutConfig {
    pub sizing: SizingConfig,
    pub padding: PaddingConfig,
    pub child_gap: u16,
    pub child_alignment: ChildAlignmentConfig,
    pub layout_direction: LayoutDirection,
}

/// Corner rounding radii, passed through to render commands.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CornerRadius {
    pub top_left: f32,
    pub top_right: f32,
    pub bottom_left: f32,
    pub bottom_right: f32,
}

impl CornerRadius {
    pub(crate) fn is_zero(&self) -> bool {
        *self == CornerRadius::default()
    }
}

/// Per-axis anchor points for a floating element and the element it
/// attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FloatingAttachPoints {
    pub element_x: AlignX,
    pub element_y: AlignY,
    pub parent_x: AlignX,
    pub parent_y: AlignY,
}

/// Detaches an element from normal flow and positions it relative to an
/// attach target. Floating elements form their own layout tree roots.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FloatingConfig {
    pub offset: Vector2,
    pub expand: Dimensions,
    pub parent_id: u32,
    pub z_index: i16,
    pub attach_points: FloatingAttachPoints,
    pub attach_to: FloatingAttachToElement,
    pub pointer_capture_mode: PointerCaptureMode,
    pub clip_to: FloatingClipToElement,
}

/// Enables clipping and scrolling per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollConfig {
    pub horizontal: bool,
    pub vertical: bool,
}

/// Border line widths per side, plus dividers between children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BorderWidthConfig {
    pub left: u16,
    pub right: u16,
    pub top: u16,
    pub bottom: u16,
    pub between_children: u16,
}

impl BorderWidthConfig {
    pub(crate) fn is_zero(&self) -> bool {
        *self == BorderWidthConfig::default()
    }
}

/// Border drawn inside an element's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BorderConfig {
    pub color: Color,
    pub width: BorderWidthConfig,
}

/// An image element. The engine only consumes `source_dimensions` for
/// aspect-ratio sizing; `data` is handed back untouched on the render
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImageConfig {
    pub data: usize,
    pub source_dimensions: Dimensions,
}

/// Visual properties shared by several render command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct SharedElementConfig {
    pub background_color: Color,
    pub corner_radius: CornerRadius,
    pub user_data: usize,
}

/// Everything an element can declare, in one bundle. Defaults mean
/// "absent": zero-alpha background, no image, no floating, no scroll, no
/// border.
#[derive(Debug, Clone, Default)]
pub struct ElementDeclaration<CustomElementData: Clone + Default + Debug = ()> {
    /// Explicit identity. `None` derives a stable anonymous id from the
    /// parent and declaration position.
    pub id: Option<ElementId>,
    pub layout: LayoutConfig,
    pub background_color: Color,
    pub corner_radius: CornerRadius,
    pub image: Option<ImageConfig>,
    pub floating: FloatingConfig,
    pub custom: Option<CustomElementData>,
    pub scroll: ScrollConfig,
    pub border: BorderConfig,
    pub user_data: usize,
}

// ============================================================================
// Internal element storage
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementConfigType {
    Shared,
    Image,
    Floating,
    Custom,
    Scroll,
    Border,
    Text,
}

/// Reference to a config stored in one of the per-kind arrays.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ElementConfig {
    pub config_type: ElementConfigType,
    pub config_index: usize,
}

/// Contiguous run of an element's configs inside the shared config list.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ElementConfigSlice {
    pub start: usize,
    pub length: usize,
}

/// What an element contains: laid-out children, or a text payload.
#[derive(Debug, Clone, Copy)]
pub(crate) enum LayoutElementPayload {
    Children { start: usize, length: u16 },
    Text { index: usize },
}

impl Default for LayoutElementPayload {
    fn default() -> Self {
        LayoutElementPayload::Children { start: 0, length: 0 }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LayoutElement {
    pub payload: LayoutElementPayload,
    pub dimensions: Dimensions,
    pub min_dimensions: Dimensions,
    pub layout_config_index: usize,
    pub configs: ElementConfigSlice,
    pub id: u32,
    pub floating_children_count: u16,
}

impl LayoutElement {
    fn is_text(&self) -> bool {
        matches!(self.payload, LayoutElementPayload::Text { .. })
    }

    fn text_data_index(&self) -> Option<usize> {
        match self.payload {
            LayoutElementPayload::Text { index } => Some(index),
            LayoutElementPayload::Children { .. } => None,
        }
    }

    fn children_count(&self) -> usize {
        match self.payload {
            LayoutElementPayload::Children { length, .. } => length as usize,
            LayoutElementPayload::Text { .. } => 0,
        }
    }

    fn size_axis(&self, x_axis: bool) -> f32 {
        if x_axis {
            self.dimensions.width
        } else {
            self.dimensions.height
        }
    }

    fn min_size_axis(&self, x_axis: bool) -> f32 {
        if x_axis {
            self.min_dimensions.width
        } else {
            self.min_dimensions.height
        }
    }

    fn set_size_axis(&mut self, x_axis: bool, value: f32) {
        if x_axis {
            self.dimensions.width = value;
        } else {
            self.dimensions.height = value;
        }
    }
}

// ============================================================================
// Text measurement cache
// ============================================================================

/// One whitespace-delimited run of text with its measured width. Words for
/// a cache entry form a singly linked list through `next`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MeasuredWord {
    pub start_offset: usize,
    pub length: usize,
    pub width: f32,
    pub next: i32,
}

impl Default for MeasuredWord {
    fn default() -> Self {
        MeasuredWord {
            start_offset: 0,
            length: 0,
            width: 0.0,
            next: -1,
        }
    }
}

/// Cached measurement for one (text, style) pairing. Entries hang off hash
/// buckets in a chain through `next_index`; index 0 is a reserved sentinel
/// meaning "end of chain".
#[derive(Debug, Clone, Copy)]
pub(crate) struct MeasureTextCacheItem {
    pub unwrapped_dimensions: Dimensions,
    pub measured_words_start_index: i32,
    pub min_width: f32,
    pub contains_newlines: bool,
    pub id: u32,
    pub next_index: i32,
    pub generation: u32,
}

impl Default for MeasureTextCacheItem {
    fn default() -> Self {
        MeasureTextCacheItem {
            unwrapped_dimensions: Dimensions::default(),
            measured_words_start_index: -1,
            min_width: 0.0,
            contains_newlines: false,
            id: 0,
            next_index: 0,
            generation: 0,
        }
    }
}

/// One display line produced by the wrapping pass, as a byte range into the
/// owning text element's content.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WrappedTextLine {
    pub dimensions: Dimensions,
    pub start: usize,
    pub length: usize,
}

/// Per-frame state for a text element.
#[derive(Debug, Clone, Default)]
pub(crate) struct TextElementData {
    pub text: String,
    pub preferred_dimensions: Dimensions,
    pub element_index: i32,
    pub wrapped_lines_start: usize,
    pub wrapped_lines_length: usize,
}

// ============================================================================
// Registry, tree roots, scroll and pointer state
// ============================================================================

/// Persistent registry entry for an element id: last known geometry plus
/// the hover callback, surviving across frames.
pub(crate) struct LayoutElementHashMapItem {
    pub bounding_box: BoundingBox,
    pub element_id: ElementId,
    pub layout_element_index: i32,
    pub on_hover_fn: Option<Box<dyn FnMut(ElementId, PointerData)>>,
    pub id_alias: u32,
    pub generation: u32,
}

/// An independently laid-out subtree: the main tree plus one per floating
/// element.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LayoutElementTreeRoot {
    pub layout_element_index: i32,
    pub parent_id: u32,
    pub clip_element_id: u32,
    pub z_index: i16,
    pub pointer_offset: Vector2,
}

/// One frame of the emission walk: an element plus the running pen
/// position its next child will be placed at.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LayoutElementTreeNode {
    pub layout_element_index: i32,
    pub position: Vector2,
    pub next_child_offset: Vector2,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ScrollContainerDataInternal {
    pub layout_element_index: i32,
    pub bounding_box: BoundingBox,
    pub content_size: Dimensions,
    pub scroll_origin: Vector2,
    pub pointer_origin: Vector2,
    pub scroll_position: Vector2,
    pub element_id: u32,
    pub horizontal: bool,
    pub vertical: bool,
    pub open_this_frame: bool,
    pub pointer_scroll_active: bool,
}

/// Snapshot of a scroll container returned by
/// [`get_scroll_container_data`](TrellisContext::get_scroll_container_data).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollContainerData {
    /// Current scroll offset. Values are zero or negative: content moves up
    /// and left as the user scrolls down and right.
    pub scroll_position: Vector2,
    /// Outer dimensions of the scroll container itself.
    pub scroll_container_dimensions: Dimensions,
    /// Total dimensions of the laid-out content inside it.
    pub content_dimensions: Dimensions,
    /// Which axes the container scrolls on.
    pub config: ScrollConfig,
}

/// Lifecycle of the pointer's primary button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerDataInteractionState {
    PressedThisFrame,
    Pressed,
    ReleasedThisFrame,
    #[default]
    Released,
}

/// Pointer position and button state as of the last
/// [`set_pointer_state`](TrellisContext::set_pointer_state) call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerData {
    pub position: Vector2,
    pub state: PointerDataInteractionState,
}

// ============================================================================
// Context
// ============================================================================

/// Owns all layout state. One context per window or layout surface.
///
/// The generic parameter carries host-defined payloads for custom elements
/// through to [`RenderCommand`]s untouched.
pub struct TrellisContext<CustomElementData: Clone + Default + Debug = ()> {
    // Settings and per-frame status.
    layout_dimensions: Dimensions,
    max_element_count: usize,
    max_measure_text_word_cache_count: usize,
    culling_disabled: bool,
    external_scroll_handling_enabled: bool,
    generation: u32,
    frame_error: Option<LayoutError>,
    pointer_info: PointerData,
    measure_text_fn: Option<Box<dyn Fn(&str, &TextConfig) -> Dimensions>>,
    query_scroll_offset_fn: Option<Box<dyn Fn(u32) -> Vector2>>,

    // Persistent across frames.
    layout_element_map: FxHashMap<u32, LayoutElementHashMapItem>,
    measure_text_buckets: Vec<i32>,
    measure_text_entries: Vec<MeasureTextCacheItem>,
    measure_text_entries_free_list: Vec<i32>,
    measured_words: Vec<MeasuredWord>,
    measured_words_free_list: Vec<i32>,
    scroll_container_datas: Vec<ScrollContainerDataInternal>,
    pointer_over_ids: Vec<ElementId>,

    // Rebuilt every frame. Cleared, never shrunk.
    layout_elements: Vec<LayoutElement>,
    layout_configs: Vec<LayoutConfig>,
    element_configs: Vec<ElementConfig>,
    text_element_configs: Vec<TextConfig>,
    image_element_configs: Vec<ImageConfig>,
    floating_element_configs: Vec<FloatingConfig>,
    scroll_element_configs: Vec<ScrollConfig>,
    custom_element_configs: Vec<CustomElementData>,
    border_element_configs: Vec<BorderConfig>,
    shared_element_configs: Vec<SharedElementConfig>,
    text_element_data: Vec<TextElementData>,
    image_element_indexes: Vec<i32>,
    wrapped_text_lines: Vec<WrappedTextLine>,
    layout_element_tree_roots: Vec<LayoutElementTreeRoot>,
    layout_element_children: Vec<i32>,
    layout_element_children_buffer: Vec<i32>,
    open_layout_element_stack: Vec<i32>,
    open_clip_element_stack: Vec<u32>,
    layout_element_clip_element_ids: Vec<u32>,
    render_commands: Vec<RenderCommand<CustomElementData>>,

    // Traversal scratch, reused between passes.
    tree_node_stack: Vec<(i32, bool)>,
    bfs_buffer: Vec<i32>,
    resizable_container_buffer: Vec<i32>,
    emit_node_buffer: Vec<LayoutElementTreeNode>,
    emit_visited_buffer: Vec<bool>,
    pointer_dfs_buffer: Vec<i32>,
}

impl<CustomElementData: Clone + Default + Debug> TrellisContext<CustomElementData> {
    /// Creates a context with default capacities sized for `dimensions`.
    pub fn new(dimensions: Dimensions) -> Self {
        Self::with_limits(
            dimensions,
            DEFAULT_MAX_ELEMENT_COUNT,
            DEFAULT_MAX_MEASURE_TEXT_WORD_CACHE_COUNT,
        )
    }

    /// Creates a context with explicit capacity limits. `max_element_count`
    /// bounds layout elements and render commands per frame;
    /// `max_measure_text_word_cache_count` bounds the measured-word cache.
    pub fn with_limits(
        dimensions: Dimensions,
        max_element_count: usize,
        max_measure_text_word_cache_count: usize,
    ) -> Self {
        let bucket_count = (max_measure_text_word_cache_count / 32).max(1);
        // Entry index 0 is the "end of chain" sentinel.
        let mut measure_text_entries = Vec::with_capacity(max_element_count.max(1));
        measure_text_entries.push(MeasureTextCacheItem::default());

        TrellisContext {
            layout_dimensions: dimensions,
            max_element_count,
            max_measure_text_word_cache_count,
            culling_disabled: false,
            external_scroll_handling_enabled: false,
            generation: 0,
            frame_error: None,
            pointer_info: PointerData::default(),
            measure_text_fn: None,
            query_scroll_offset_fn: None,

            layout_element_map: FxHashMap::default(),
            measure_text_buckets: vec![0; bucket_count],
            measure_text_entries,
            measure_text_entries_free_list: Vec::new(),
            measured_words: Vec::with_capacity(max_measure_text_word_cache_count),
            measured_words_free_list: Vec::with_capacity(max_measure_text_word_cache_count),
            scroll_container_datas: Vec::with_capacity(MAX_SCROLL_CONTAINER_COUNT),
            pointer_over_ids: Vec::with_capacity(max_element_count),

            layout_elements: Vec::with_capacity(max_element_count),
            layout_configs: Vec::with_capacity(max_element_count),
            element_configs: Vec::with_capacity(max_element_count),
            text_element_configs: Vec::with_capacity(max_element_count),
            image_element_configs: Vec::with_capacity(max_element_count),
            floating_element_configs: Vec::with_capacity(max_element_count),
            scroll_element_configs: Vec::with_capacity(max_element_count),
            custom_element_configs: Vec::with_capacity(max_element_count),
            border_element_configs: Vec::with_capacity(max_element_count),
            shared_element_configs: Vec::with_capacity(max_element_count),
            text_element_data: Vec::with_capacity(max_element_count),
            image_element_indexes: Vec::with_capacity(max_element_count),
            wrapped_text_lines: Vec::with_capacity(max_element_count),
            layout_element_tree_roots: Vec::with_capacity(max_element_count),
            layout_element_children: Vec::with_capacity(max_element_count),
            layout_element_children_buffer: Vec::with_capacity(max_element_count),
            open_layout_element_stack: Vec::with_capacity(max_element_count),
            open_clip_element_stack: Vec::with_capacity(max_element_count),
            layout_element_clip_element_ids: Vec::with_capacity(max_element_count),
            render_commands: Vec::with_capacity(max_element_count),

            tree_node_stack: Vec::with_capacity(max_element_count),
            bfs_buffer: Vec::with_capacity(max_element_count),
            resizable_container_buffer: Vec::with_capacity(max_element_count),
            emit_node_buffer: Vec::with_capacity(max_element_count),
            emit_visited_buffer: Vec::with_capacity(max_element_count),
            pointer_dfs_buffer: Vec::with_capacity(max_element_count),
        }
    }

    /// Resets the context to its freshly-constructed state: clears the
    /// element registry, the text measurement cache and all scroll
    /// containers, and adopts new layout dimensions. Capacities are kept.
    pub fn reinitialize(&mut self, dimensions: Dimensions) {
        self.layout_dimensions = dimensions;
        self.generation = 0;
        self.frame_error = None;
        self.pointer_info = PointerData::default();
        self.layout_element_map.clear();
        self.measure_text_buckets.iter_mut().for_each(|b| *b = 0);
        self.measure_text_entries.truncate(1);
        self.measure_text_entries_free_list.clear();
        self.measured_words.clear();
        self.measured_words_free_list.clear();
        self.scroll_container_datas.clear();
        self.pointer_over_ids.clear();
        self.initialize_ephemeral_memory();
    }

    /// Updates the viewport dimensions the root container sizes itself to.
    pub fn set_layout_dimensions(&mut self, dimensions: Dimensions) {
        self.layout_dimensions = dimensions;
    }

    /// The current viewport dimensions.
    pub fn layout_dimensions(&self) -> Dimensions {
        self.layout_dimensions
    }

    /// Installs the host's text measurement function. Must report the
    /// dimensions of a single unbroken run of text in the given style.
    /// Text elements fail with an error until this is set.
    pub fn set_measure_text_function(
        &mut self,
        measure: impl Fn(&str, &TextConfig) -> Dimensions + 'static,
    ) {
        self.measure_text_fn = Some(Box::new(measure));
    }

    /// Installs a callback the engine uses to read scroll offsets when
    /// external scroll handling is enabled. Receives the scroll container's
    /// element id.
    pub fn set_query_scroll_offset_function(
        &mut self,
        query: impl Fn(u32) -> Vector2 + 'static,
    ) {
        self.query_scroll_offset_fn = Some(Box::new(query));
    }

    /// When enabled, the engine stops applying scroll offsets itself and
    /// reads them from the host through the query callback instead.
    pub fn set_external_scroll_handling_enabled(&mut self, enabled: bool) {
        self.external_scroll_handling_enabled = enabled;
    }

    /// Enables or disables off-screen culling of render commands. Enabled
    /// by default.
    pub fn set_culling_enabled(&mut self, enabled: bool) {
        self.culling_disabled = !enabled;
    }

    /// Hashes `label` seeded by the currently open element's id, so the
    /// same label yields distinct ids under different parents.
    pub fn local_id(&self, label: &'static str) -> ElementId {
        self.local_id_index(label, 0)
    }

    /// Like [`local_id`](Self::local_id) with an index mixed in for loops.
    pub fn local_id_index(&self, label: &'static str, index: u32) -> ElementId {
        let seed = self
            .open_layout_element_stack
            .last()
            .map(|&idx| self.layout_elements[idx as usize].id)
            .unwrap_or(0);
        hash_string_with_offset(label, index, seed)
    }

    fn frame_guard(&self) -> Result<(), LayoutError> {
        match self.frame_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Any declaration error poisons the rest of the frame: later calls
    /// and `end_layout` keep returning it until `begin_layout` resets.
    fn fail(&mut self, error: LayoutError) -> LayoutError {
        self.frame_error = Some(error);
        error
    }

    fn open_index(&self) -> usize {
        self.open_layout_element_stack[self.open_layout_element_stack.len() - 1] as usize
    }

    fn open_parent_index(&self) -> usize {
        self.open_layout_element_stack[self.open_layout_element_stack.len() - 2] as usize
    }

    // ========================================================================
    // Element registry
    // ========================================================================

    fn add_hash_map_item(&mut self, element_id: &ElementId, layout_element_index: i32) {
        let generation = self.generation;
        match self.layout_element_map.entry(element_id.id) {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                let item = occupied.get_mut();
                if item.generation == generation {
                    warn!(
                        id = element_id.id,
                        label = element_id.string_id,
                        "duplicate element id declared this frame"
                    );
                }
                item.element_id = *element_id;
                item.layout_element_index = layout_element_index;
                item.generation = generation;
                item.id_alias = 0;
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(LayoutElementHashMapItem {
                    bounding_box: BoundingBox::default(),
                    element_id: *element_id,
                    layout_element_index,
                    on_hover_fn: None,
                    id_alias: 0,
                    generation,
                });
            }
        }
    }

    /// Drops registry entries that haven't been re-declared for a few
    /// frames, along with their hover callbacks.
    fn prune_stale_hash_map_items(&mut self) {
        let generation = self.generation;
        self.layout_element_map
            .retain(|_, item| generation.wrapping_sub(item.generation) <= 2);
    }

    // ========================================================================
    // Config storage
    // ========================================================================

    fn store_layout_config(&mut self, config: LayoutConfig) -> usize {
        self.layout_configs.push(config);
        self.layout_configs.len() - 1
    }

    fn store_text_element_config(&mut self, config: TextConfig) -> usize {
        self.text_element_configs.push(config);
        self.text_element_configs.len() - 1
    }

    fn find_element_config_index(
        &self,
        element_index: usize,
        config_type: ElementConfigType,
    ) -> Option<usize> {
        let slice = self.layout_elements[element_index].configs;
        self.element_configs[slice.start..slice.start + slice.length]
            .iter()
            .find(|config| config.config_type == config_type)
            .map(|config| config.config_index)
    }

    fn element_has_config(&self, element_index: usize, config_type: ElementConfigType) -> bool {
        self.find_element_config_index(element_index, config_type)
            .is_some()
    }

    fn attach_element_config(
        &mut self,
        config_type: ElementConfigType,
        config_index: usize,
    ) -> Result<(), LayoutError> {
        let open_idx = self.open_index();
        if self.element_has_config(open_idx, config_type) {
            return Err(self.fail(LayoutError::InvalidConfiguration {
                reason: "duplicate config kind on element",
            }));
        }
        if self.layout_elements[open_idx].configs.length == 0 {
            self.layout_elements[open_idx].configs.start = self.element_configs.len();
        }
        self.element_configs.push(ElementConfig {
            config_type,
            config_index,
        });
        self.layout_elements[open_idx].configs.length += 1;
        Ok(())
    }

    // ========================================================================
    // Element open / close / configure
    // ========================================================================

    fn open_element_inner(&mut self) -> Result<(), LayoutError> {
        if self.layout_elements.len() >= self.max_element_count {
            let capacity = self.max_element_count;
            return Err(self.fail(LayoutError::CapacityExceeded {
                buffer: "layout elements",
                capacity,
            }));
        }
        let index = self.layout_elements.len() as i32;
        self.layout_elements.push(LayoutElement::default());
        self.open_layout_element_stack.push(index);
        let clip_id = self.open_clip_element_stack.last().copied().unwrap_or(0);
        self.layout_element_clip_element_ids.push(clip_id);
        Ok(())
    }

    fn open_element_with_id_inner(&mut self, element_id: &ElementId) -> Result<(), LayoutError> {
        self.open_element_inner()?;
        let open_idx = self.open_index();
        self.layout_elements[open_idx].id = element_id.id;
        self.add_hash_map_item(element_id, open_idx as i32);
        Ok(())
    }

    /// Opens a new element as a child of the currently open one. The
    /// element stays anonymous until configured.
    pub fn open_element(&mut self) -> Result<(), LayoutError> {
        self.frame_guard()?;
        if self.open_layout_element_stack.is_empty() {
            return Err(self.fail(LayoutError::InvalidConfiguration {
                reason: "open_element called before begin_layout",
            }));
        }
        self.open_element_inner()
    }

    /// Opens a new element with an explicit id.
    pub fn open_element_with_id(&mut self, element_id: &ElementId) -> Result<(), LayoutError> {
        self.frame_guard()?;
        if self.open_layout_element_stack.is_empty() {
            return Err(self.fail(LayoutError::InvalidConfiguration {
                reason: "open_element called before begin_layout",
            }));
        }
        self.open_element_with_id_inner(element_id)
    }

    fn generate_id_for_anonymous_element(&mut self, element_index: usize) {
        let parent = &self.layout_elements[self.open_parent_index()];
        let offset = parent.children_count() as u32 + parent.floating_children_count as u32;
        let parent_id = parent.id;
        let element_id = hash_number(offset, parent_id);
        self.layout_elements[element_index].id = element_id.id;
        self.add_hash_map_item(&element_id, element_index as i32);
    }

    fn attach_explicit_id(&mut self, element_id: &ElementId) {
        let open_idx = self.open_index();
        let previous_id = self.layout_elements[open_idx].id;
        self.layout_elements[open_idx].id = element_id.id;
        self.add_hash_map_item(element_id, open_idx as i32);
        if previous_id != 0 && previous_id != element_id.id {
            if let Some(item) = self.layout_element_map.get_mut(&element_id.id) {
                item.id_alias = previous_id;
            }
        }
    }

    /// Applies a declaration to the currently open element. Resolves the
    /// element's identity, so scroll state and hover callbacks keyed by id
    /// attach from here on.
    pub fn configure_open_element(
        &mut self,
        declaration: ElementDeclaration<CustomElementData>,
    ) -> Result<(), LayoutError> {
        self.frame_guard()?;
        if self.open_layout_element_stack.is_empty() {
            return Err(self.fail(LayoutError::InvalidConfiguration {
                reason: "configure_open_element called with no open element",
            }));
        }
        let open_idx = self.open_index();

        let sizing = &declaration.layout.sizing;
        if (sizing.width.type_ == SizingType::Percent
            && !(0.0..=1.0).contains(&sizing.width.percent))
            || (sizing.height.type_ == SizingType::Percent
                && !(0.0..=1.0).contains(&sizing.height.percent))
        {
            return Err(self.fail(LayoutError::InvalidConfiguration {
                reason: "percent sizing must be between 0.0 and 1.0",
            }));
        }

        self.layout_elements[open_idx].layout_config_index =
            self.store_layout_config(declaration.layout);

        if declaration.background_color.a > 0.0
            || !declaration.corner_radius.is_zero()
            || declaration.user_data != 0
        {
            self.shared_element_configs.push(SharedElementConfig {
                background_color: declaration.background_color,
                corner_radius: declaration.corner_radius,
                user_data: declaration.user_data,
            });
            let config_index = self.shared_element_configs.len() - 1;
            self.attach_element_config(ElementConfigType::Shared, config_index)?;
        }

        if let Some(image) = declaration.image {
            self.image_element_configs.push(image);
            let config_index = self.image_element_configs.len() - 1;
            self.attach_element_config(ElementConfigType::Image, config_index)?;
            self.image_element_indexes.push(open_idx as i32);
        }

        if let Some(element_id) = declaration.id {
            self.attach_explicit_id(&element_id);
        }

        if declaration.floating.attach_to != FloatingAttachToElement::None
            && self.open_layout_element_stack.len() > 2
        {
            let mut floating = declaration.floating;
            let mut clip_element_id: u32 = 0;
            match floating.attach_to {
                FloatingAttachToElement::Parent => {
                    floating.parent_id = self.layout_elements[self.open_parent_index()].id;
                    if floating.clip_to == FloatingClipToElement::AttachedParent {
                        clip_element_id =
                            self.open_clip_element_stack.last().copied().unwrap_or(0);
                    }
                }
                FloatingAttachToElement::ElementWithId => {
                    match self.layout_element_map.get(&floating.parent_id) {
                        Some(item) => {
                            if floating.clip_to == FloatingClipToElement::AttachedParent
                                && item.generation == self.generation
                            {
                                clip_element_id = self
                                    .layout_element_clip_element_ids
                                    .get(item.layout_element_index as usize)
                                    .copied()
                                    .unwrap_or(0);
                            }
                        }
                        None => {
                            warn!(
                                parent_id = floating.parent_id,
                                "floating attach target not declared, element will not move \
                                 with it this frame"
                            );
                        }
                    }
                }
                FloatingAttachToElement::Root => {
                    floating.parent_id = hash_string(ROOT_CONTAINER_NAME, 0).id;
                }
                FloatingAttachToElement::None => {}
            }

            if self.layout_elements[open_idx].id == 0 {
                let fallback = hash_string_with_offset(
                    FLOATING_CONTAINER_NAME,
                    self.layout_element_tree_roots.len() as u32,
                    0,
                );
                self.attach_explicit_id(&fallback);
            }
            self.layout_element_clip_element_ids[open_idx] = clip_element_id;
            self.open_clip_element_stack.push(clip_element_id);
            self.layout_element_tree_roots.push(LayoutElementTreeRoot {
                layout_element_index: open_idx as i32,
                parent_id: floating.parent_id,
                clip_element_id,
                z_index: floating.z_index,
                pointer_offset: Vector2::default(),
            });
            self.floating_element_configs.push(floating);
            let config_index = self.floating_element_configs.len() - 1;
            self.attach_element_config(ElementConfigType::Floating, config_index)?;
        }

        if let Some(custom) = declaration.custom {
            self.custom_element_configs.push(custom);
            let config_index = self.custom_element_configs.len() - 1;
            self.attach_element_config(ElementConfigType::Custom, config_index)?;
        }

        if self.layout_elements[open_idx].id == 0 {
            self.generate_id_for_anonymous_element(open_idx);
        }

        if declaration.scroll.horizontal || declaration.scroll.vertical {
            self.scroll_element_configs.push(declaration.scroll);
            let config_index = self.scroll_element_configs.len() - 1;
            self.attach_element_config(ElementConfigType::Scroll, config_index)?;
            let element_id = self.layout_elements[open_idx].id;
            self.open_clip_element_stack.push(element_id);

            let mut found = false;
            for data in self.scroll_container_datas.iter_mut() {
                if data.element_id == element_id {
                    found = true;
                    data.layout_element_index = open_idx as i32;
                    data.open_this_frame = true;
                    data.horizontal = declaration.scroll.horizontal;
                    data.vertical = declaration.scroll.vertical;
                }
            }
            if !found {
                if self.scroll_container_datas.len() >= MAX_SCROLL_CONTAINER_COUNT {
                    return Err(self.fail(LayoutError::CapacityExceeded {
                        buffer: "scroll containers",
                        capacity: MAX_SCROLL_CONTAINER_COUNT,
                    }));
                }
                self.scroll_container_datas.push(ScrollContainerDataInternal {
                    layout_element_index: open_idx as i32,
                    element_id,
                    horizontal: declaration.scroll.horizontal,
                    vertical: declaration.scroll.vertical,
                    open_this_frame: true,
                    scroll_origin: Vector2::new(-1.0, -1.0),
                    ..Default::default()
                });
            }
            if self.external_scroll_handling_enabled {
                if let Some(query) = self.query_scroll_offset_fn.as_ref() {
                    let offset = query(element_id);
                    for data in self.scroll_container_datas.iter_mut() {
                        if data.element_id == element_id {
                            data.scroll_position = offset;
                        }
                    }
                }
            }
        }

        if !declaration.border.width.is_zero() {
            self.border_element_configs.push(declaration.border);
            let config_index = self.border_element_configs.len() - 1;
            self.attach_element_config(ElementConfigType::Border, config_index)?;
        }

        Ok(())
    }

    /// Closes the currently open element, fitting it around its children.
    pub fn close_element(&mut self) -> Result<(), LayoutError> {
        self.frame_guard()?;
        if self.open_layout_element_stack.len() <= 2 {
            return Err(self.fail(LayoutError::InvalidConfiguration {
                reason: "close_element without a matching open_element",
            }));
        }
        self.close_element_inner();
        Ok(())
    }

    fn close_element_inner(&mut self) {
        let open_idx = self.open_index();
        let layout_config_index = self.layout_elements[open_idx].layout_config_index;

        let mut element_has_scroll_horizontal = false;
        let mut element_has_scroll_vertical = false;
        let mut element_is_floating = false;
        let slice = self.layout_elements[open_idx].configs;
        for config in &self.element_configs[slice.start..slice.start + slice.length] {
            match config.config_type {
                ElementConfigType::Scroll => {
                    let scroll = self.scroll_element_configs[config.config_index];
                    element_has_scroll_horizontal = scroll.horizontal;
                    element_has_scroll_vertical = scroll.vertical;
                    self.open_clip_element_stack.pop();
                    break;
                }
                ElementConfigType::Floating => {
                    element_is_floating = true;
                    self.open_clip_element_stack.pop();
                }
                _ => {}
            }
        }

        // Fit the element around its children, now all closed and sitting at
        // the tail of the children buffer.
        let layout_config = self.layout_configs[layout_config_index];
        let child_count = self.layout_elements[open_idx].children_count();
        let buffer_start = self.layout_element_children_buffer.len() - child_count;
        let children_start = self.layout_element_children.len();
        let padding_h = layout_config.padding.horizontal() as f32;
        let padding_v = layout_config.padding.vertical() as f32;
        let child_gap = (child_count.saturating_sub(1)) as f32 * layout_config.child_gap as f32;

        let mut dimensions = Dimensions::default();
        let mut min_dimensions = Dimensions::default();
        if layout_config.layout_direction == LayoutDirection::LeftToRight {
            dimensions.width = padding_h;
            min_dimensions.width = padding_h;
            for i in 0..child_count {
                let child_index = self.layout_element_children_buffer[buffer_start + i];
                let child = &self.layout_elements[child_index as usize];
                dimensions.width += child.dimensions.width;
                dimensions.height =
                    dimensions.height.max(child.dimensions.height + padding_v);
                if !element_has_scroll_horizontal {
                    min_dimensions.width += child.min_dimensions.width;
                }
                if !element_has_scroll_vertical {
                    min_dimensions.height =
                        min_dimensions.height.max(child.min_dimensions.height + padding_v);
                }
                self.layout_element_children.push(child_index);
            }
            dimensions.width += child_gap;
            if !element_has_scroll_horizontal {
                min_dimensions.width += child_gap;
            }
        } else {
            dimensions.height = padding_v;
            min_dimensions.height = padding_v;
            for i in 0..child_count {
                let child_index = self.layout_element_children_buffer[buffer_start + i];
                let child = &self.layout_elements[child_index as usize];
                dimensions.height += child.dimensions.height;
                dimensions.width = dimensions.width.max(child.dimensions.width + padding_h);
                if !element_has_scroll_vertical {
                    min_dimensions.height += child.min_dimensions.height;
                }
                if !element_has_scroll_horizontal {
                    min_dimensions.width =
                        min_dimensions.width.max(child.min_dimensions.width + padding_h);
                }
                self.layout_element_children.push(child_index);
            }
            dimensions.height += child_gap;
            if !element_has_scroll_vertical {
                min_dimensions.height += child_gap;
            }
        }
        dimensions.height = dimensions.height.max(padding_v);
        min_dimensions.height = min_dimensions.height.max(padding_v);
        dimensions.width = dimensions.width.max(padding_h);
        min_dimensions.width = min_dimensions.width.max(padding_h);

        // An unset max reads as zero. Patch it to unbounded in the stored
        // config so later passes can clamp against it directly.
        {
            let config = &mut self.layout_configs[layout_config_index];
            if config.sizing.width.type_ != SizingType::Percent
                && config.sizing.width.min_max.max <= 0.0
            {
                config.sizing.width.min_max.max = f32::MAX;
            }
            if config.sizing.height.type_ != SizingType::Percent
                && config.sizing.height.min_max.max <= 0.0
            {
                config.sizing.height.min_max.max = f32::MAX;
            }
        }
        let sizing = self.layout_configs[layout_config_index].sizing;
        if sizing.width.type_ != SizingType::Percent {
            dimensions.width = sizing.clamp_width(dimensions.width);
            min_dimensions.width = sizing.clamp_width(min_dimensions.width);
        } else {
            dimensions.width = 0.0;
        }
        if sizing.height.type_ != SizingType::Percent {
            dimensions.height = sizing.clamp_height(dimensions.height);
            min_dimensions.height = sizing.clamp_height(min_dimensions.height);
        } else {
            dimensions.height = 0.0;
        }

        {
            let element = &mut self.layout_elements[open_idx];
            element.dimensions = dimensions;
            element.min_dimensions = min_dimensions;
            element.payload = LayoutElementPayload::Children {
                start: children_start,
                length: child_count as u16,
            };
        }
        self.update_aspect_ratio_box(open_idx);

        self.layout_element_children_buffer.truncate(buffer_start);
        self.open_layout_element_stack.pop();

        if !element_is_floating && self.open_layout_element_stack.len() > 1 {
            let parent_idx = self.open_index();
            if let LayoutElementPayload::Children { length, .. } =
                &mut self.layout_elements[parent_idx].payload
            {
                *length += 1;
            }
            self.layout_element_children_buffer.push(open_idx as i32);
        } else if element_is_floating && !self.open_layout_element_stack.is_empty() {
            let parent_idx = self.open_index();
            self.layout_elements[parent_idx].floating_children_count += 1;
        }
    }

    /// Sizes an image element along whichever axis the declaration left
    /// open, preserving the source aspect ratio.
    fn update_aspect_ratio_box(&mut self, element_index: usize) {
        let Some(config_index) =
            self.find_element_config_index(element_index, ElementConfigType::Image)
        else {
            return;
        };
        let source = self.image_element_configs[config_index].source_dimensions;
        if source.width <= 0.0 || source.height <= 0.0 {
            return;
        }
        let aspect = source.width / source.height;
        let element = &mut self.layout_elements[element_index];
        if element.dimensions.width == 0.0 && element.dimensions.height != 0.0 {
            element.dimensions.width = element.dimensions.height * aspect;
        } else if element.dimensions.width != 0.0 && element.dimensions.height == 0.0 {
            element.dimensions.height = element.dimensions.width / aspect;
        }
    }

    /// Declares a text element as a child of the currently open element.
    /// Text never opens: it measures, wraps and closes in one call.
    pub fn text(
        &mut self,
        text: &str,
        configure: impl FnOnce(&mut TextConfig),
    ) -> Result<(), LayoutError> {
        self.frame_guard()?;
        if self.open_layout_element_stack.is_empty() {
            return Err(self.fail(LayoutError::InvalidConfiguration {
                reason: "text called before begin_layout",
            }));
        }
        let mut config = TextConfig::new();
        configure(&mut config);
        self.open_text_element(text, config)
    }

    fn open_text_element(&mut self, text: &str, config: TextConfig) -> Result<(), LayoutError> {
        let parent_idx = self.open_index();
        let parent_id = self.layout_elements[parent_idx].id;
        let sibling_offset = self.layout_elements[parent_idx].children_count() as u32
            + self.layout_elements[parent_idx].floating_children_count as u32;

        // Measure before creating the element so a failure leaves no
        // half-built node behind.
        let entry_index = self.measure_text_cached(text, &config)?;
        let unwrapped = self.measure_text_entries[entry_index].unwrapped_dimensions;
        let min_width = self.measure_text_entries[entry_index].min_width;

        if self.layout_elements.len() >= self.max_element_count {
            let capacity = self.max_element_count;
            return Err(self.fail(LayoutError::CapacityExceeded {
                buffer: "layout elements",
                capacity,
            }));
        }

        let element_index = self.layout_elements.len();
        self.layout_elements.push(LayoutElement::default());
        let clip_id = self.open_clip_element_stack.last().copied().unwrap_or(0);
        self.layout_element_clip_element_ids.push(clip_id);

        let element_id = hash_number(sibling_offset, parent_id);
        self.layout_elements[element_index].id = element_id.id;
        self.add_hash_map_item(&element_id, element_index as i32);

        let height = if config.line_height > 0 {
            config.line_height as f32
        } else {
            unwrapped.height
        };
        self.text_element_data.push(TextElementData {
            text: text.to_string(),
            preferred_dimensions: unwrapped,
            element_index: element_index as i32,
            wrapped_lines_start: 0,
            wrapped_lines_length: 0,
        });
        let text_data_index = self.text_element_data.len() - 1;
        let config_index = self.store_text_element_config(config);
        let configs_start = self.element_configs.len();
        self.element_configs.push(ElementConfig {
            config_type: ElementConfigType::Text,
            config_index,
        });
        let layout_config_index = self.store_layout_config(LayoutConfig::default());

        {
            let element = &mut self.layout_elements[element_index];
            element.dimensions = Dimensions::new(unwrapped.width, height);
            element.min_dimensions = Dimensions::new(min_width, height);
            element.payload = LayoutElementPayload::Text {
                index: text_data_index,
            };
            element.configs = ElementConfigSlice {
                start: configs_start,
                length: 1,
            };
            element.layout_config_index = layout_config_index;
        }

        if let LayoutElementPayload::Children { length, .. } =
            &mut self.layout_elements[parent_idx].payload
        {
            *length += 1;
        }
        self.layout_element_children_buffer.push(element_index as i32);
        Ok(())
    }

    // ========================================================================
    // Frame lifecycle
    // ========================================================================

    /// Starts a new layout frame: resets per-frame state, ages the element
    /// registry and opens the root container sized to the viewport.
    pub fn begin_layout(&mut self) -> Result<(), LayoutError> {
        self.initialize_ephemeral_memory();
        self.generation = self.generation.wrapping_add(1);
        self.prune_stale_hash_map_items();
        self.frame_error = None;

        // Slot 0 backs every element that never receives a configuration.
        self.layout_configs.push(LayoutConfig::default());

        let root_id = hash_string(ROOT_CONTAINER_NAME, 0);
        self.open_element_with_id_inner(&root_id)?;
        let viewport = self.layout_dimensions;
        let root_layout = LayoutConfig {
            sizing: SizingConfig {
                width: SizingAxis {
                    type_: SizingType::Fixed,
                    min_max: SizingMinMax {
                        min: viewport.width,
                        max: viewport.width,
                    },
                    percent: 0.0,
                },
                height: SizingAxis {
                    type_: SizingType::Fixed,
                    min_max: SizingMinMax {
                        min: viewport.height,
                        max: viewport.height,
                    },
                    percent: 0.0,
                },
            },
            ..LayoutConfig::default()
        };
        self.layout_elements[0].layout_config_index = self.store_layout_config(root_layout);
        // Second stack entry lets top-level elements find the root as their
        // parent through the same offset the nested case uses.
        self.open_layout_element_stack.push(0);
        self.layout_element_tree_roots.push(LayoutElementTreeRoot {
            layout_element_index: 0,
            parent_id: 0,
            clip_element_id: 0,
            z_index: 0,
            pointer_offset: Vector2::default(),
        });
        Ok(())
    }

    /// Ends the frame: closes the root, runs sizing, wrapping and
    /// positioning, and returns the render commands in paint order.
    pub fn end_layout(&mut self) -> Result<&[RenderCommand<CustomElementData>], LayoutError> {
        if let Some(error) = self.frame_error {
            self.render_commands.clear();
            return Err(error);
        }
        if self.open_layout_element_stack.len() != 2 {
            self.render_commands.clear();
            return Err(LayoutError::InvalidConfiguration {
                reason: "unbalanced open_element and close_element calls",
            });
        }
        self.close_element_inner();
        if let Err(error) = self.calculate_final_layout() {
            self.render_commands.clear();
            return Err(error);
        }
        // Leaves declaration calls outside a frame with no open element to
        // land on, same as before the first begin_layout.
        self.open_layout_element_stack.clear();
        trace!(
            elements = self.layout_elements.len(),
            roots = self.layout_element_tree_roots.len(),
            commands = self.render_commands.len(),
            "layout frame complete"
        );
        Ok(&self.render_commands)
    }

    fn initialize_ephemeral_memory(&mut self) {
        self.layout_elements.clear();
        self.layout_configs.clear();
        self.element_configs.clear();
        self.text_element_configs.clear();
        self.image_element_configs.clear();
        self.floating_element_configs.clear();
        self.scroll_element_configs.clear();
        self.custom_element_configs.clear();
        self.border_element_configs.clear();
        self.shared_element_configs.clear();
        self.text_element_data.clear();
        self.image_element_indexes.clear();
        self.wrapped_text_lines.clear();
        self.layout_element_tree_roots.clear();
        self.layout_element_children.clear();
        self.layout_element_children_buffer.clear();
        self.open_layout_element_stack.clear();
        self.open_clip_element_stack.clear();
        self.layout_element_clip_element_ids.clear();
        self.tree_node_stack.clear();
        self.bfs_buffer.clear();
        self.resizable_container_buffer.clear();
    }

    // ========================================================================
    // Text measurement cache
    // ========================================================================

    fn measure_text_cached(
        &mut self,
        text: &str,
        config: &TextConfig,
    ) -> Result<usize, LayoutError> {
        let Some(measure) = self.measure_text_fn.take() else {
            return Err(self.fail(LayoutError::InvalidConfiguration {
                reason: "no text measurement function set",
            }));
        };
        let result = self.measure_text_cached_inner(text, config, measure.as_ref());
        self.measure_text_fn = Some(measure);
        result
    }

    /// Returns the cache entry index for `(text, config)`, measuring on a
    /// miss. Walking the bucket chain also evicts entries that haven't been
    /// looked up for more than two frames, handing their word chains back
    /// to the free list.
    fn measure_text_cached_inner(
        &mut self,
        text: &str,
        config: &TextConfig,
        measure: &dyn Fn(&str, &TextConfig) -> Dimensions,
    ) -> Result<usize, LayoutError> {
        let id = hash_text_with_config(text, config);
        let bucket = (id as usize) % self.measure_text_buckets.len();
        let mut previous_index: i32 = 0;
        let mut element_index = self.measure_text_buckets[bucket];
        while element_index != 0 {
            if self.measure_text_entries[element_index as usize].id == id {
                self.measure_text_entries[element_index as usize].generation = self.generation;
                return Ok(element_index as usize);
            }
            let age = self
                .generation
                .wrapping_sub(self.measure_text_entries[element_index as usize].generation);
            if age > 2 {
                let next = self.measure_text_entries[element_index as usize].next_index;
                let mut word_index =
                    self.measure_text_entries[element_index as usize].measured_words_start_index;
                while word_index != -1 {
                    let next_word = self.measured_words[word_index as usize].next;
                    self.measured_words[word_index as usize] = MeasuredWord::default();
                    self.measured_words_free_list.push(word_index);
                    word_index = next_word;
                }
                self.measure_text_entries[element_index as usize] =
                    MeasureTextCacheItem::default();
                self.measure_text_entries_free_list.push(element_index);
                if previous_index == 0 {
                    self.measure_text_buckets[bucket] = next;
                } else {
                    self.measure_text_entries[previous_index as usize].next_index = next;
                }
                element_index = next;
            } else {
                previous_index = element_index;
                element_index = self.measure_text_entries[element_index as usize].next_index;
            }
        }

        let mut measured = MeasureTextCacheItem {
            id,
            generation: self.generation,
            ..MeasureTextCacheItem::default()
        };

        // Split on spaces and newlines, measuring each word once.
        let bytes = text.as_bytes();
        let mut start = 0usize;
        let mut end = 0usize;
        let mut line_width = 0.0f32;
        let mut measured_width = 0.0f32;
        let mut measured_height = 0.0f32;
        let mut min_width = 0.0f32;
        let space_width = measure(" ", config).width;
        let mut first_word_index: i32 = -1;
        let mut previous_word_index: i32 = -1;

        while end < bytes.len() {
            let current = bytes[end];
            if current == b' ' || current == b'\n' {
                let length = end - start;
                let dimensions = measure(&text[start..end], config);
                measured_height = measured_height.max(dimensions.height);
                min_width = min_width.max(dimensions.width);
                if current == b' ' {
                    let word_index = self.add_measured_word(
                        MeasuredWord {
                            start_offset: start,
                            length: length + 1,
                            width: dimensions.width + space_width,
                            next: -1,
                        },
                        previous_word_index,
                    )?;
                    if first_word_index == -1 {
                        first_word_index = word_index;
                    }
                    previous_word_index = word_index;
                    line_width += dimensions.width + space_width;
                } else {
                    if length > 0 {
                        let word_index = self.add_measured_word(
                            MeasuredWord {
                                start_offset: start,
                                length,
                                width: dimensions.width,
                                next: -1,
                            },
                            previous_word_index,
                        )?;
                        if first_word_index == -1 {
                            first_word_index = word_index;
                        }
                        previous_word_index = word_index;
                    }
                    // Zero-length marker forces a line break during wrapping.
                    let word_index = self.add_measured_word(
                        MeasuredWord {
                            start_offset: end + 1,
                            length: 0,
                            width: 0.0,
                            next: -1,
                        },
                        previous_word_index,
                    )?;
                    if first_word_index == -1 {
                        first_word_index = word_index;
                    }
                    previous_word_index = word_index;
                    line_width += dimensions.width;
                    measured_width = measured_width.max(line_width);
                    measured.contains_newlines = true;
                    line_width = 0.0;
                }
                start = end + 1;
            }
            end += 1;
        }
        if end > start {
            let dimensions = measure(&text[start..end], config);
            let word_index = self.add_measured_word(
                MeasuredWord {
                    start_offset: start,
                    length: end - start,
                    width: dimensions.width,
                    next: -1,
                },
                previous_word_index,
            )?;
            if first_word_index == -1 {
                first_word_index = word_index;
            }
            line_width += dimensions.width;
            measured_height = measured_height.max(dimensions.height);
            min_width = min_width.max(dimensions.width);
        }
        measured_width = measured_width.max(line_width);

        measured.measured_words_start_index = first_word_index;
        measured.unwrapped_dimensions = Dimensions::new(measured_width, measured_height);
        measured.min_width = min_width;

        let new_item_index: i32 = match self.measure_text_entries_free_list.pop() {
            Some(free_index) => {
                self.measure_text_entries[free_index as usize] = measured;
                free_index
            }
            None => {
                if self.measure_text_entries.len() >= self.max_element_count {
                    let capacity = self.max_element_count;
                    return Err(self.fail(LayoutError::CapacityExceeded {
                        buffer: "text measurement cache entries",
                        capacity,
                    }));
                }
                self.measure_text_entries.push(measured);
                (self.measure_text_entries.len() - 1) as i32
            }
        };
        if previous_index == 0 {
            self.measure_text_buckets[bucket] = new_item_index;
        } else {
            self.measure_text_entries[previous_index as usize].next_index = new_item_index;
        }
        Ok(new_item_index as usize)
    }

    fn add_measured_word(
        &mut self,
        word: MeasuredWord,
        previous_word_index: i32,
    ) -> Result<i32, LayoutError> {
        let new_index = match self.measured_words_free_list.pop() {
            Some(free_index) => {
                self.measured_words[free_index as usize] = word;
                free_index
            }
            None => {
                if self.measured_words.len() >= self.max_measure_text_word_cache_count {
                    let capacity = self.max_measure_text_word_cache_count;
                    return Err(self.fail(LayoutError::CapacityExceeded {
                        buffer: "measured words",
                        capacity,
                    }));
                }
                self.measured_words.push(word);
                (self.measured_words.len() - 1) as i32
            }
        };
        if previous_word_index >= 0 {
            self.measured_words[previous_word_index as usize].next = new_index;
        }
        Ok(new_index)
    }

    fn find_measure_cache_entry(&self, id: u32) -> Option<usize> {
        let bucket = (id as usize) % self.measure_text_buckets.len();
        let mut element_index = self.measure_text_buckets[bucket];
        while element_index != 0 {
            let entry = &self.measure_text_entries[element_index as usize];
            if entry.id == id {
                return Some(element_index as usize);
            }
            element_index = entry.next_index;
        }
        None
    }

    // ========================================================================
    // Text wrapping
    // ========================================================================

    fn wrap_text_elements(&mut self) -> Result<(), LayoutError> {
        if self.text_element_data.is_empty() {
            return Ok(());
        }
        let Some(measure) = self.measure_text_fn.take() else {
            return Err(LayoutError::InvalidConfiguration {
                reason: "no text measurement function set",
            });
        };
        let result = self.wrap_text_elements_inner(measure.as_ref());
        self.measure_text_fn = Some(measure);
        result
    }

    /// Breaks every text element into lines against its now-settled
    /// container width and sets the container height from the line count.
    fn wrap_text_elements_inner(
        &mut self,
        measure: &dyn Fn(&str, &TextConfig) -> Dimensions,
    ) -> Result<(), LayoutError> {
        for text_data_index in 0..self.text_element_data.len() {
            let wrapped_lines_start = self.wrapped_text_lines.len();
            self.text_element_data[text_data_index].wrapped_lines_start = wrapped_lines_start;
            let element_index = self.text_element_data[text_data_index].element_index as usize;
            let container_dimensions = self.layout_elements[element_index].dimensions;
            let Some(config_index) =
                self.find_element_config_index(element_index, ElementConfigType::Text)
            else {
                continue;
            };
            let text_config = self.text_element_configs[config_index];
            let text_id =
                hash_text_with_config(&self.text_element_data[text_data_index].text, &text_config);
            let Some(entry_index) = self.find_measure_cache_entry(text_id) else {
                continue;
            };
            let contains_newlines = self.measure_text_entries[entry_index].contains_newlines;
            let words_start = self.measure_text_entries[entry_index].measured_words_start_index;
            let preferred = self.text_element_data[text_data_index].preferred_dimensions;

            if !contains_newlines && preferred.width <= container_dimensions.width {
                self.wrapped_text_lines.push(WrappedTextLine {
                    dimensions: container_dimensions,
                    start: 0,
                    length: self.text_element_data[text_data_index].text.len(),
                });
                self.text_element_data[text_data_index].wrapped_lines_length = 1;
                continue;
            }

            let line_height = if text_config.line_height > 0 {
                text_config.line_height as f32
            } else {
                preferred.height
            };
            let space_width = measure(" ", &text_config).width;
            let mut line_width = 0.0f32;
            let mut line_length = 0usize;
            let mut line_start_offset = 0usize;
            let mut line_count = 0usize;
            let mut word_index = words_start;

            while word_index != -1 {
                if self.wrapped_text_lines.len() >= self.max_element_count {
                    let capacity = self.max_element_count;
                    return Err(self.fail(LayoutError::CapacityExceeded {
                        buffer: "wrapped text lines",
                        capacity,
                    }));
                }
                let word = self.measured_words[word_index as usize];
                // A lone word wider than the container still gets its own line.
                if line_length == 0 && line_width + word.width > container_dimensions.width {
                    self.wrapped_text_lines.push(WrappedTextLine {
                        dimensions: Dimensions::new(word.width, line_height),
                        start: word.start_offset,
                        length: word.length,
                    });
                    line_count += 1;
                    word_index = word.next;
                    line_start_offset = word.start_offset + word.length;
                } else if word.length == 0
                    || line_width + word.width > container_dimensions.width
                {
                    // Zero length marks an explicit newline.
                    let text_bytes = self.text_element_data[text_data_index].text.as_bytes();
                    let final_char_is_space = line_length > 0
                        && text_bytes[line_start_offset + line_length - 1] == b' ';
                    self.wrapped_text_lines.push(WrappedTextLine {
                        dimensions: Dimensions::new(
                            if final_char_is_space {
                                line_width - space_width
                            } else {
                                line_width
                            },
                            line_height,
                        ),
                        start: line_start_offset,
                        length: line_length - usize::from(final_char_is_space),
                    });
                    line_count += 1;
                    if line_length == 0 || word.length == 0 {
                        word_index = word.next;
                    }
                    line_width = 0.0;
                    line_length = 0;
                    line_start_offset = word.start_offset;
                } else {
                    line_width += word.width;
                    line_length += word.length;
                    word_index = word.next;
                }
            }
            if line_length > 0 {
                self.wrapped_text_lines.push(WrappedTextLine {
                    dimensions: Dimensions::new(line_width, line_height),
                    start: line_start_offset,
                    length: line_length,
                });
                line_count += 1;
            }
            self.text_element_data[text_data_index].wrapped_lines_length = line_count;
            self.layout_elements[element_index].dimensions.height =
                line_height * line_count as f32;
        }
        Ok(())
    }

    // ========================================================================
    // Sizing solver
    // ========================================================================

    /// Distributes space along one axis, breadth-first from every tree
    /// root. Runs once for widths, then again for heights after text wrap.
    ///
    /// Along the layout axis, leftover space goes to Grow children and
    /// overflow compresses the currently-largest resizable children down
    /// toward their minimums, a level at a time. Across the layout axis,
    /// children simply clamp to the parent's inner size.
    fn size_containers_along_axis(&mut self, x_axis: bool) {
        let mut bfs = std::mem::take(&mut self.bfs_buffer);
        let mut resizable = std::mem::take(&mut self.resizable_container_buffer);

        for root_index in 0..self.layout_element_tree_roots.len() {
            bfs.clear();
            let root = self.layout_element_tree_roots[root_index];
            let root_element_index = root.layout_element_index as usize;
            bfs.push(root.layout_element_index);

            if self.element_has_config(root_element_index, ElementConfigType::Floating) {
                if let Some(parent_item) = self.layout_element_map.get(&root.parent_id) {
                    let parent_index = parent_item.layout_element_index as usize;
                    if parent_item.generation == self.generation
                        && parent_index < self.layout_elements.len()
                    {
                        let parent_dimensions = self.layout_elements[parent_index].dimensions;
                        let sizing = self.layout_configs
                            [self.layout_elements[root_element_index].layout_config_index]
                            .sizing;
                        let element = &mut self.layout_elements[root_element_index];
                        match sizing.width.type_ {
                            SizingType::Grow => {
                                element.dimensions.width = parent_dimensions.width;
                            }
                            SizingType::Percent => {
                                element.dimensions.width =
                                    parent_dimensions.width * sizing.width.percent;
                            }
                            _ => {}
                        }
                        match sizing.height.type_ {
                            SizingType::Grow => {
                                element.dimensions.height = parent_dimensions.height;
                            }
                            SizingType::Percent => {
                                element.dimensions.height =
                                    parent_dimensions.height * sizing.height.percent;
                            }
                            _ => {}
                        }
                    }
                }
            }
            {
                let sizing = self.layout_configs
                    [self.layout_elements[root_element_index].layout_config_index]
                    .sizing;
                let element = &mut self.layout_elements[root_element_index];
                element.dimensions.width = sizing.clamp_width(element.dimensions.width);
                element.dimensions.height = sizing.clamp_height(element.dimensions.height);
            }

            let mut bfs_index = 0;
            while bfs_index < bfs.len() {
                let parent_index = bfs[bfs_index] as usize;
                bfs_index += 1;
                let parent_layout_config =
                    self.layout_configs[self.layout_elements[parent_index].layout_config_index];
                let parent_size = self.layout_elements[parent_index].size_axis(x_axis);
                let parent_padding = parent_layout_config.padding.size_axis(x_axis);
                let parent_child_gap = parent_layout_config.child_gap as f32;
                let sizing_along_axis = (x_axis
                    && parent_layout_config.layout_direction == LayoutDirection::LeftToRight)
                    || (!x_axis
                        && parent_layout_config.layout_direction == LayoutDirection::TopToBottom);
                let mut inner_content_size = 0.0f32;
                let mut total_padding_and_child_gaps = parent_padding;
                let mut grow_container_count = 0usize;
                resizable.clear();

                let (children_start, children_length) =
                    match self.layout_elements[parent_index].payload {
                        LayoutElementPayload::Children { start, length } => {
                            (start, length as usize)
                        }
                        LayoutElementPayload::Text { .. } => (0, 0),
                    };

                for child_offset in 0..children_length {
                    let child_element_index =
                        self.layout_element_children[children_start + child_offset];
                    let child = &self.layout_elements[child_element_index as usize];
                    let child_sizing =
                        self.layout_configs[child.layout_config_index].sizing.axis(x_axis);
                    let child_size = child.size_axis(x_axis);
                    let child_is_text = child.is_text();

                    if !child_is_text && child.children_count() > 0 {
                        bfs.push(child_element_index);
                    }

                    let text_can_compress = !child_is_text
                        || self
                            .find_element_config_index(
                                child_element_index as usize,
                                ElementConfigType::Text,
                            )
                            .map(|ci| self.text_element_configs[ci].wrap_mode == WrapMode::Words)
                            .unwrap_or(true);
                    let image_can_resize = x_axis
                        || !self.element_has_config(
                            child_element_index as usize,
                            ElementConfigType::Image,
                        );
                    if child_sizing.type_ != SizingType::Percent
                        && child_sizing.type_ != SizingType::Fixed
                        && text_can_compress
                        && image_can_resize
                    {
                        resizable.push(child_element_index);
                    }

                    if sizing_along_axis {
                        if child_sizing.type_ != SizingType::Percent {
                            inner_content_size += child_size;
                        }
                        if child_sizing.type_ == SizingType::Grow {
                            grow_container_count += 1;
                        }
                        if child_offset > 0 {
                            inner_content_size += parent_child_gap;
                            total_padding_and_child_gaps += parent_child_gap;
                        }
                    } else {
                        inner_content_size = inner_content_size.max(child_size);
                    }
                }

                // Percent children resolve against the settled parent size.
                for child_offset in 0..children_length {
                    let child_element_index =
                        self.layout_element_children[children_start + child_offset] as usize;
                    let child_sizing = self.layout_configs
                        [self.layout_elements[child_element_index].layout_config_index]
                        .sizing
                        .axis(x_axis);
                    if child_sizing.type_ == SizingType::Percent {
                        let new_size =
                            (parent_size - total_padding_and_child_gaps) * child_sizing.percent;
                        self.layout_elements[child_element_index].set_size_axis(x_axis, new_size);
                        if sizing_along_axis {
                            inner_content_size += new_size;
                        }
                        self.update_aspect_ratio_box(child_element_index);
                    }
                }

                if sizing_along_axis {
                    let mut size_to_distribute = parent_size - parent_padding - inner_content_size;
                    if size_to_distribute < 0.0 {
                        // A parent that scrolls on this axis keeps its
                        // overflow instead of compressing children.
                        if let Some(ci) =
                            self.find_element_config_index(parent_index, ElementConfigType::Scroll)
                        {
                            let scroll = self.scroll_element_configs[ci];
                            if (x_axis && scroll.horizontal) || (!x_axis && scroll.vertical) {
                                continue;
                            }
                        }
                        while size_to_distribute < -EPSILON && !resizable.is_empty() {
                            let mut largest = 0.0f32;
                            let mut second_largest = 0.0f32;
                            let mut width_to_add = size_to_distribute;
                            for &child_index in resizable.iter() {
                                let child_size =
                                    self.layout_elements[child_index as usize].size_axis(x_axis);
                                if float_equal(child_size, largest) {
                                    continue;
                                }
                                if child_size > largest {
                                    second_largest = largest;
                                    largest = child_size;
                                }
                                if child_size < largest {
                                    second_largest = second_largest.max(child_size);
                                    width_to_add = second_largest - largest;
                                }
                            }
                            width_to_add =
                                width_to_add.max(size_to_distribute / resizable.len() as f32);
                            let mut position = 0;
                            while position < resizable.len() {
                                let child_index = resizable[position] as usize;
                                let previous_size =
                                    self.layout_elements[child_index].size_axis(x_axis);
                                if float_equal(previous_size, largest) {
                                    let min_size =
                                        self.layout_elements[child_index].min_size_axis(x_axis);
                                    let mut new_size = previous_size + width_to_add;
                                    if new_size <= min_size {
                                        new_size = min_size;
                                        resizable.swap_remove(position);
                                    } else {
                                        position += 1;
                                    }
                                    self.layout_elements[child_index]
                                        .set_size_axis(x_axis, new_size);
                                    size_to_distribute -= new_size - previous_size;
                                } else {
                                    position += 1;
                                }
                            }
                        }
                    } else if size_to_distribute > 0.0 && grow_container_count > 0 {
                        resizable.retain(|&child_index| {
                            self.layout_configs
                                [self.layout_elements[child_index as usize].layout_config_index]
                                .sizing
                                .axis(x_axis)
                                .type_
                                == SizingType::Grow
                        });
                        while size_to_distribute > EPSILON && !resizable.is_empty() {
                            let mut smallest = f32::MAX;
                            let mut second_smallest = f32::MAX;
                            let mut width_to_add = size_to_distribute;
                            for &child_index in resizable.iter() {
                                let child_size =
                                    self.layout_elements[child_index as usize].size_axis(x_axis);
                                if float_equal(child_size, smallest) {
                                    continue;
                                }
                                if child_size < smallest {
                                    second_smallest = smallest;
                                    smallest = child_size;
                                }
                                if child_size > smallest {
                                    second_smallest = second_smallest.min(child_size);
                                    width_to_add = second_smallest - smallest;
                                }
                            }
                            width_to_add =
                                width_to_add.min(size_to_distribute / resizable.len() as f32);
                            let mut position = 0;
                            while position < resizable.len() {
                                let child_index = resizable[position] as usize;
                                let previous_size =
                                    self.layout_elements[child_index].size_axis(x_axis);
                                if float_equal(previous_size, smallest) {
                                    let max_size = self.layout_configs
                                        [self.layout_elements[child_index].layout_config_index]
                                        .sizing
                                        .axis(x_axis)
                                        .min_max
                                        .max;
                                    let mut new_size = previous_size + width_to_add;
                                    if new_size >= max_size {
                                        new_size = max_size;
                                        resizable.swap_remove(position);
                                    } else {
                                        position += 1;
                                    }
                                    self.layout_elements[child_index]
                                        .set_size_axis(x_axis, new_size);
                                    size_to_distribute -= new_size - previous_size;
                                } else {
                                    position += 1;
                                }
                            }
                        }
                    }
                } else {
                    for &child_index in resizable.iter() {
                        let child_index = child_index as usize;
                        let child_sizing = self.layout_configs
                            [self.layout_elements[child_index].layout_config_index]
                            .sizing
                            .axis(x_axis);
                        let child_size = self.layout_elements[child_index].size_axis(x_axis);
                        // Children of a scroll parent grow to the inner
                        // content size, not the clipped outer size.
                        let mut max_size = parent_size - parent_padding;
                        if let Some(ci) =
                            self.find_element_config_index(parent_index, ElementConfigType::Scroll)
                        {
                            let scroll = self.scroll_element_configs[ci];
                            if (x_axis && scroll.horizontal) || (!x_axis && scroll.vertical) {
                                max_size = max_size.max(inner_content_size);
                            }
                        }
                        match child_sizing.type_ {
                            SizingType::Fit => {
                                self.layout_elements[child_index].set_size_axis(
                                    x_axis,
                                    child_sizing.min_max.min.max(child_size.min(max_size)),
                                );
                            }
                            SizingType::Grow => {
                                self.layout_elements[child_index]
                                    .set_size_axis(x_axis, max_size.min(child_sizing.min_max.max));
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        self.bfs_buffer = bfs;
        self.resizable_container_buffer = resizable;
    }

    /// Pushes height changes from text wrapping and image scaling back up
    /// through ancestors, depth-first so children settle before parents.
    fn propagate_size_changes_up_tree(&mut self) {
        let mut dfs = std::mem::take(&mut self.tree_node_stack);
        dfs.clear();
        for root_index in 0..self.layout_element_tree_roots.len() {
            dfs.push((
                self.layout_element_tree_roots[root_index].layout_element_index,
                false,
            ));
        }
        while let Some(top) = dfs.last_mut() {
            let (element_index, visited) = *top;
            let element_index = element_index as usize;
            if !visited {
                top.1 = true;
                if self.layout_elements[element_index].is_text()
                    || self.layout_elements[element_index].children_count() == 0
                {
                    dfs.pop();
                    continue;
                }
                if let LayoutElementPayload::Children { start, length } =
                    self.layout_elements[element_index].payload
                {
                    for offset in 0..length as usize {
                        dfs.push((self.layout_element_children[start + offset], false));
                    }
                }
                continue;
            }
            dfs.pop();

            let layout_config =
                self.layout_configs[self.layout_elements[element_index].layout_config_index];
            let padding_v = layout_config.padding.vertical() as f32;
            let (start, length) = match self.layout_elements[element_index].payload {
                LayoutElementPayload::Children { start, length } => (start, length as usize),
                LayoutElementPayload::Text { .. } => (0, 0),
            };
            match layout_config.layout_direction {
                LayoutDirection::LeftToRight => {
                    for offset in 0..length {
                        let child_index = self.layout_element_children[start + offset] as usize;
                        let child_height_with_padding = (self.layout_elements[child_index]
                            .dimensions
                            .height
                            + padding_v)
                            .max(self.layout_elements[element_index].dimensions.height);
                        self.layout_elements[element_index].dimensions.height =
                            layout_config.sizing.clamp_height(child_height_with_padding);
                    }
                }
                LayoutDirection::TopToBottom => {
                    let mut content_height = padding_v;
                    for offset in 0..length {
                        let child_index = self.layout_element_children[start + offset] as usize;
                        content_height += self.layout_elements[child_index].dimensions.height;
                    }
                    content_height +=
                        length.saturating_sub(1) as f32 * layout_config.child_gap as f32;
                    self.layout_elements[element_index].dimensions.height =
                        layout_config.sizing.clamp_height(content_height);
                }
            }
        }
        self.tree_node_stack = dfs;
    }

    /// Rescales every image element's height to its source aspect ratio
    /// once widths are final.
    fn scale_image_heights(&mut self) {
        for i in 0..self.image_element_indexes.len() {
            let element_index = self.image_element_indexes[i] as usize;
            let Some(config_index) =
                self.find_element_config_index(element_index, ElementConfigType::Image)
            else {
                continue;
            };
            let source = self.image_element_configs[config_index].source_dimensions;
            let element = &mut self.layout_elements[element_index];
            element.dimensions.height =
                source.height / source.width.max(1.0) * element.dimensions.width;
        }
    }

    fn calculate_final_layout(&mut self) -> Result<(), LayoutError> {
        self.size_containers_along_axis(true);
        self.wrap_text_elements()?;
        self.scale_image_heights();
        self.propagate_size_changes_up_tree();
        self.size_containers_along_axis(false);
        self.layout_element_tree_roots.sort_by_key(|root| root.z_index);
        self.generate_render_commands()
    }

    fn is_offscreen(&self, bounding_box: &BoundingBox) -> bool {
        if self.culling_disabled {
            return false;
        }
        bounding_box.x > self.layout_dimensions.width
            || bounding_box.y > self.layout_dimensions.height
            || bounding_box.x + bounding_box.width < 0.0
            || bounding_box.y + bounding_box.height < 0.0
    }

    // ------------------------------------------------------------------
    // Render command emission
    // ------------------------------------------------------------------

    fn add_render_command(
        &mut self,
        command: RenderCommand<CustomElementData>,
    ) -> Result<(), LayoutError> {
        if self.render_commands.len() >= self.max_element_count {
            return Err(self.fail(LayoutError::CapacityExceeded {
                buffer: "render commands",
                capacity: self.max_element_count,
            }));
        }
        self.render_commands.push(command);
        Ok(())
    }

    /// Walks every tree root in z order and turns the finished layout into
    /// render commands. Each element passes through the stack twice: once on
    /// the way down to paint itself and position its children, once on the
    /// way back up to paint borders and close scissors.
    fn generate_render_commands(&mut self) -> Result<(), LayoutError> {
        let mut dfs_buffer = std::mem::take(&mut self.emit_node_buffer);
        let mut visited = std::mem::take(&mut self.emit_visited_buffer);
        let result = self.generate_render_commands_inner(&mut dfs_buffer, &mut visited);
        self.emit_node_buffer = dfs_buffer;
        self.emit_visited_buffer = visited;
        result
    }

    fn generate_render_commands_inner(
        &mut self,
        dfs_buffer: &mut Vec<LayoutElementTreeNode>,
        visited: &mut Vec<bool>,
    ) -> Result<(), LayoutError> {
        self.render_commands.clear();
        for root_index in 0..self.layout_element_tree_roots.len() {
            dfs_buffer.clear();
            visited.clear();
            let root = self.layout_element_tree_roots[root_index];
            let root_element_index = root.layout_element_index as usize;
            let mut root_position = Vector2::default();

            // Floating roots resolve their position against the attach
            // target's bounding box from this frame. A target that was never
            // declared leaves the root at the origin.
            if let Some(config_index) =
                self.find_element_config_index(root_element_index, ElementConfigType::Floating)
            {
                let config = self.floating_element_configs[config_index];
                if let Some(parent_item) = self.layout_element_map.get(&root.parent_id) {
                    let parent_box = parent_item.bounding_box;
                    let root_dimensions = self.layout_elements[root_element_index].dimensions;
                    let mut target = Vector2::default();
                    target.x = match config.attach_points.parent_x {
                        AlignX::Left => parent_box.x,
                        AlignX::CenterX => parent_box.x + parent_box.width / 2.0,
                        AlignX::Right => parent_box.x + parent_box.width,
                    };
                    match config.attach_points.element_x {
                        AlignX::Left => {}
                        AlignX::CenterX => target.x -= root_dimensions.width / 2.0,
                        AlignX::Right => target.x -= root_dimensions.width,
                    }
                    target.y = match config.attach_points.parent_y {
                        AlignY::Top => parent_box.y,
                        AlignY::CenterY => parent_box.y + parent_box.height / 2.0,
                        AlignY::Bottom => parent_box.y + parent_box.height,
                    };
                    match config.attach_points.element_y {
                        AlignY::Top => {}
                        AlignY::CenterY => target.y -= root_dimensions.height / 2.0,
                        AlignY::Bottom => target.y -= root_dimensions.height,
                    }
                    target.x += config.offset.x;
                    target.y += config.offset.y;
                    root_position = target;
                }
            }

            // A root clipped by a scroll ancestor re-opens that ancestor's
            // scissor around its whole subtree.
            if root.clip_element_id != 0 {
                let clip_box = self
                    .layout_element_map
                    .get(&root.clip_element_id)
                    .map(|item| item.bounding_box);
                if let Some(clip_bounding_box) = clip_box {
                    let mut clip_axes = Clip {
                        horizontal: true,
                        vertical: true,
                    };
                    for i in 0..self.scroll_container_datas.len() {
                        let data = self.scroll_container_datas[i];
                        if data.element_id != root.clip_element_id {
                            continue;
                        }
                        clip_axes = Clip {
                            horizontal: data.horizontal,
                            vertical: data.vertical,
                        };
                        // When the host owns scrolling the clip ancestor's
                        // offset never reached this root through layout, so
                        // apply it here and remember it for hit testing.
                        if self.external_scroll_handling_enabled {
                            self.layout_element_tree_roots[root_index].pointer_offset =
                                data.scroll_position;
                            if data.horizontal {
                                root_position.x += data.scroll_position.x;
                            }
                            if data.vertical {
                                root_position.y += data.scroll_position.y;
                            }
                        }
                        break;
                    }
                    let root_id = self.layout_elements[root_element_index].id;
                    let root_children = self.layout_elements[root_element_index].children_count();
                    self.add_render_command(RenderCommand {
                        bounding_box: clip_bounding_box,
                        config: RenderCommandConfig::ScissorStart(clip_axes),
                        user_data: 0,
                        id: hash_number(root_id, root_children as u32 + 10).id,
                        z_index: root.z_index,
                    })?;
                }
            }

            let root_layout_config =
                self.layout_configs[self.layout_elements[root_element_index].layout_config_index];
            dfs_buffer.push(LayoutElementTreeNode {
                layout_element_index: root.layout_element_index,
                position: root_position,
                next_child_offset: Vector2::new(
                    root_layout_config.padding.left as f32,
                    root_layout_config.padding.top as f32,
                ),
            });
            visited.push(false);

            while !dfs_buffer.is_empty() {
                let buffer_index = dfs_buffer.len() - 1;
                let current_node = dfs_buffer[buffer_index];
                let element_index = current_node.layout_element_index as usize;
                let layout_config =
                    self.layout_configs[self.layout_elements[element_index].layout_config_index];
                let scroll_config_index =
                    self.find_element_config_index(element_index, ElementConfigType::Scroll);
                let mut scroll_offset = Vector2::default();

                if !visited[buffer_index] {
                    visited[buffer_index] = true;

                    let mut bounding_box = BoundingBox::new(
                        current_node.position.x,
                        current_node.position.y,
                        self.layout_elements[element_index].dimensions.width,
                        self.layout_elements[element_index].dimensions.height,
                    );

                    if let Some(config_index) =
                        self.find_element_config_index(element_index, ElementConfigType::Floating)
                    {
                        let expand = self.floating_element_configs[config_index].expand;
                        bounding_box.x -= expand.width;
                        bounding_box.width += expand.width * 2.0;
                        bounding_box.y -= expand.height;
                        bounding_box.height += expand.height * 2.0;
                    }

                    if let Some(config_index) = scroll_config_index {
                        let scroll_config = self.scroll_element_configs[config_index];
                        for data in self.scroll_container_datas.iter_mut() {
                            if data.layout_element_index != element_index as i32 {
                                continue;
                            }
                            data.bounding_box = bounding_box;
                            if scroll_config.horizontal {
                                scroll_offset.x = data.scroll_position.x;
                            }
                            if scroll_config.vertical {
                                scroll_offset.y = data.scroll_position.y;
                            }
                            break;
                        }
                        if self.external_scroll_handling_enabled {
                            scroll_offset = Vector2::default();
                        }
                    }

                    // The registry keeps this frame's final on-screen box for
                    // hit testing and floating attachment. An id that was
                    // re-pointed mid-frame keeps its alias box in sync too.
                    let element_id = self.layout_elements[element_index].id;
                    let mut alias_id = 0;
                    if let Some(item) = self.layout_element_map.get_mut(&element_id) {
                        item.bounding_box = bounding_box;
                        alias_id = item.id_alias;
                    }
                    if alias_id != 0 {
                        if let Some(item) = self.layout_element_map.get_mut(&alias_id) {
                            item.bounding_box = bounding_box;
                        }
                    }

                    let shared = self
                        .find_element_config_index(element_index, ElementConfigType::Shared)
                        .map(|config_index| self.shared_element_configs[config_index])
                        .unwrap_or_default();
                    let offscreen = self.is_offscreen(&bounding_box);

                    // Image and custom commands carry the background color
                    // themselves, so a separate rectangle would double-fill.
                    let emit_rectangle = shared.background_color.a > 0.0
                        && !self.element_has_config(element_index, ElementConfigType::Image)
                        && !self.element_has_config(element_index, ElementConfigType::Custom);
                    if emit_rectangle && !offscreen {
                        self.add_render_command(RenderCommand {
                            bounding_box,
                            config: RenderCommandConfig::Rectangle(Rectangle {
                                color: shared.background_color,
                                corner_radii: shared.corner_radius.into(),
                            }),
                            user_data: shared.user_data,
                            id: element_id,
                            z_index: root.z_index,
                        })?;
                    }

                    if let Some(config_index) =
                        self.find_element_config_index(element_index, ElementConfigType::Image)
                    {
                        if !offscreen {
                            let image = self.image_element_configs[config_index];
                            self.add_render_command(RenderCommand {
                                bounding_box,
                                config: RenderCommandConfig::Image(Image {
                                    background_color: shared.background_color,
                                    corner_radii: shared.corner_radius.into(),
                                    data: image.data,
                                    source_dimensions: image.source_dimensions,
                                }),
                                user_data: shared.user_data,
                                id: element_id,
                                z_index: root.z_index,
                            })?;
                        }
                    }

                    if let Some(config_index) =
                        self.find_element_config_index(element_index, ElementConfigType::Custom)
                    {
                        if !offscreen {
                            let data = self.custom_element_configs[config_index].clone();
                            self.add_render_command(RenderCommand {
                                bounding_box,
                                config: RenderCommandConfig::Custom(Custom {
                                    background_color: shared.background_color,
                                    corner_radii: shared.corner_radius.into(),
                                    data,
                                }),
                                user_data: shared.user_data,
                                id: element_id,
                                z_index: root.z_index,
                            })?;
                        }
                    }

                    // Scissors are emitted even for off-screen elements. A
                    // skipped start would orphan the matching end.
                    if let Some(config_index) = scroll_config_index {
                        let scroll_config = self.scroll_element_configs[config_index];
                        self.add_render_command(RenderCommand {
                            bounding_box,
                            config: RenderCommandConfig::ScissorStart(Clip {
                                horizontal: scroll_config.horizontal,
                                vertical: scroll_config.vertical,
                            }),
                            user_data: 0,
                            id: element_id,
                            z_index: root.z_index,
                        })?;
                    }

                    if let Some(text_data_index) =
                        self.layout_elements[element_index].text_data_index()
                    {
                        if !offscreen {
                            if let Some(config_index) = self
                                .find_element_config_index(element_index, ElementConfigType::Text)
                            {
                                let text_config = self.text_element_configs[config_index];
                                let natural_line_height = self.text_element_data[text_data_index]
                                    .preferred_dimensions
                                    .height;
                                let final_line_height = if text_config.line_height > 0 {
                                    text_config.line_height as f32
                                } else {
                                    natural_line_height
                                };
                                // Spread any extra configured line height
                                // evenly above and below the glyphs.
                                let mut y_position =
                                    (final_line_height - natural_line_height) / 2.0;
                                let lines_start =
                                    self.text_element_data[text_data_index].wrapped_lines_start;
                                let lines_length =
                                    self.text_element_data[text_data_index].wrapped_lines_length;
                                for line_index in 0..lines_length {
                                    let line = self.wrapped_text_lines[lines_start + line_index];
                                    if line.length == 0 {
                                        y_position += final_line_height;
                                        continue;
                                    }
                                    let line_text = self.text_element_data[text_data_index].text
                                        [line.start..line.start + line.length]
                                        .to_string();
                                    let mut x_offset = bounding_box.width - line.dimensions.width;
                                    match text_config.alignment {
                                        AlignX::Left => x_offset = 0.0,
                                        AlignX::CenterX => x_offset /= 2.0,
                                        AlignX::Right => {}
                                    }
                                    self.add_render_command(RenderCommand {
                                        bounding_box: BoundingBox::new(
                                            bounding_box.x + x_offset,
                                            bounding_box.y + y_position,
                                            line.dimensions.width,
                                            line.dimensions.height,
                                        ),
                                        config: RenderCommandConfig::Text(Text {
                                            text: line_text,
                                            color: text_config.color,
                                            font_id: text_config.font_id,
                                            font_size: text_config.font_size,
                                            letter_spacing: text_config.letter_spacing,
                                            line_height: text_config.line_height,
                                        }),
                                        user_data: text_config.user_data,
                                        id: hash_number(line_index as u32, element_id).id,
                                        z_index: root.z_index,
                                    })?;
                                    y_position += final_line_height;
                                    if !self.culling_disabled
                                        && bounding_box.y + y_position
                                            > self.layout_dimensions.height
                                    {
                                        break;
                                    }
                                }
                            }
                        }
                    }

                    if !self.layout_elements[element_index].is_text() {
                        let (children_start, children_length) =
                            match self.layout_elements[element_index].payload {
                                LayoutElementPayload::Children { start, length } => {
                                    (start, length as usize)
                                }
                                LayoutElementPayload::Text { .. } => (0, 0),
                            };
                        let mut content_size = Dimensions::default();
                        if layout_config.layout_direction == LayoutDirection::LeftToRight {
                            for offset in 0..children_length {
                                let child_index =
                                    self.layout_element_children[children_start + offset] as usize;
                                content_size.width +=
                                    self.layout_elements[child_index].dimensions.width;
                                content_size.height = content_size
                                    .height
                                    .max(self.layout_elements[child_index].dimensions.height);
                            }
                            content_size.width += children_length.saturating_sub(1) as f32
                                * layout_config.child_gap as f32;
                            let extra_space = self.layout_elements[element_index].dimensions.width
                                - layout_config.padding.horizontal() as f32
                                - content_size.width;
                            dfs_buffer[buffer_index].next_child_offset.x +=
                                match layout_config.child_alignment.x {
                                    AlignX::Left => 0.0,
                                    AlignX::CenterX => extra_space / 2.0,
                                    AlignX::Right => extra_space,
                                };
                        } else {
                            for offset in 0..children_length {
                                let child_index =
                                    self.layout_element_children[children_start + offset] as usize;
                                content_size.width = content_size
                                    .width
                                    .max(self.layout_elements[child_index].dimensions.width);
                                content_size.height +=
                                    self.layout_elements[child_index].dimensions.height;
                            }
                            content_size.height += children_length.saturating_sub(1) as f32
                                * layout_config.child_gap as f32;
                            let extra_space = self.layout_elements[element_index].dimensions.height
                                - layout_config.padding.vertical() as f32
                                - content_size.height;
                            dfs_buffer[buffer_index].next_child_offset.y +=
                                match layout_config.child_alignment.y {
                                    AlignY::Top => 0.0,
                                    AlignY::CenterY => extra_space / 2.0,
                                    AlignY::Bottom => extra_space,
                                };
                        }
                        if scroll_config_index.is_some() {
                            for data in self.scroll_container_datas.iter_mut() {
                                if data.layout_element_index == element_index as i32 {
                                    data.content_size = Dimensions::new(
                                        content_size.width
                                            + layout_config.padding.horizontal() as f32,
                                        content_size.height
                                            + layout_config.padding.vertical() as f32,
                                    );
                                    break;
                                }
                            }
                        }
                    }
                } else {
                    // On the way back up. Borders paint above everything the
                    // element contains, and a scroll scissor must close after
                    // them so dividers scroll with the content they separate.
                    if let Some(config_index) = scroll_config_index {
                        let scroll_config = self.scroll_element_configs[config_index];
                        for data in self.scroll_container_datas.iter() {
                            if data.layout_element_index != element_index as i32 {
                                continue;
                            }
                            if scroll_config.horizontal {
                                scroll_offset.x = data.scroll_position.x;
                            }
                            if scroll_config.vertical {
                                scroll_offset.y = data.scroll_position.y;
                            }
                            break;
                        }
                        if self.external_scroll_handling_enabled {
                            scroll_offset = Vector2::default();
                        }
                    }

                    if let Some(border_index) =
                        self.find_element_config_index(element_index, ElementConfigType::Border)
                    {
                        let border_config = self.border_element_configs[border_index];
                        let element_id = self.layout_elements[element_index].id;
                        let registered_box = self
                            .layout_element_map
                            .get(&element_id)
                            .map(|item| item.bounding_box);
                        if let Some(bounding_box) = registered_box {
                            if !self.is_offscreen(&bounding_box) {
                                let shared = self
                                    .find_element_config_index(
                                        element_index,
                                        ElementConfigType::Shared,
                                    )
                                    .map(|config_index| self.shared_element_configs[config_index])
                                    .unwrap_or_default();
                                let (children_start, children_length) =
                                    match self.layout_elements[element_index].payload {
                                        LayoutElementPayload::Children { start, length } => {
                                            (start, length as usize)
                                        }
                                        LayoutElementPayload::Text { .. } => (0, 0),
                                    };
                                self.add_render_command(RenderCommand {
                                    bounding_box,
                                    config: RenderCommandConfig::Border(Border {
                                        color: border_config.color,
                                        corner_radii: shared.corner_radius.into(),
                                        width: BorderWidth {
                                            left: border_config.width.left,
                                            right: border_config.width.right,
                                            top: border_config.width.top,
                                            bottom: border_config.width.bottom,
                                            between_children: border_config.width.between_children,
                                        },
                                    }),
                                    user_data: shared.user_data,
                                    id: hash_number(element_id, children_length as u32).id,
                                    z_index: root.z_index,
                                })?;

                                if border_config.width.between_children > 0
                                    && border_config.color.a > 0.0
                                {
                                    let half_gap = layout_config.child_gap as f32 / 2.0;
                                    if layout_config.layout_direction == LayoutDirection::LeftToRight
                                    {
                                        let mut border_offset =
                                            layout_config.padding.left as f32 - half_gap;
                                        for offset in 0..children_length {
                                            let child_index = self.layout_element_children
                                                [children_start + offset]
                                                as usize;
                                            if offset > 0 {
                                                self.add_render_command(RenderCommand {
                                                    bounding_box: BoundingBox::new(
                                                        bounding_box.x
                                                            + border_offset
                                                            + scroll_offset.x,
                                                        bounding_box.y + scroll_offset.y,
                                                        border_config.width.between_children
                                                            as f32,
                                                        self.layout_elements[element_index]
                                                            .dimensions
                                                            .height,
                                                    ),
                                                    config: RenderCommandConfig::Rectangle(
                                                        Rectangle {
                                                            color: border_config.color,
                                                            corner_radii: CornerRadii::default(),
                                                        },
                                                    ),
                                                    user_data: shared.user_data,
                                                    id: hash_number(
                                                        element_id,
                                                        children_length as u32 + 1 + offset as u32,
                                                    )
                                                    .id,
                                                    z_index: root.z_index,
                                                })?;
                                            }
                                            border_offset += self.layout_elements[child_index]
                                                .dimensions
                                                .width
                                                + layout_config.child_gap as f32;
                                        }
                                    } else {
                                        let mut border_offset =
                                            layout_config.padding.top as f32 - half_gap;
                                        for offset in 0..children_length {
                                            let child_index = self.layout_element_children
                                                [children_start + offset]
                                                as usize;
                                            if offset > 0 {
                                                self.add_render_command(RenderCommand {
                                                    bounding_box: BoundingBox::new(
                                                        bounding_box.x + scroll_offset.x,
                                                        bounding_box.y
                                                            + border_offset
                                                            + scroll_offset.y,
                                                        self.layout_elements[element_index]
                                                            .dimensions
                                                            .width,
                                                        border_config.width.between_children
                                                            as f32,
                                                    ),
                                                    config: RenderCommandConfig::Rectangle(
                                                        Rectangle {
                                                            color: border_config.color,
                                                            corner_radii: CornerRadii::default(),
                                                        },
                                                    ),
                                                    user_data: shared.user_data,
                                                    id: hash_number(
                                                        element_id,
                                                        children_length as u32 + 1 + offset as u32,
                                                    )
                                                    .id,
                                                    z_index: root.z_index,
                                                })?;
                                            }
                                            border_offset += self.layout_elements[child_index]
                                                .dimensions
                                                .height
                                                + layout_config.child_gap as f32;
                                        }
                                    }
                                }
                            }
                        }
                    }

                    if scroll_config_index.is_some() {
                        let children = self.layout_elements[element_index].children_count();
                        let end_id =
                            hash_number(self.layout_elements[element_index].id, children as u32 + 11)
                                .id;
                        self.add_render_command(RenderCommand {
                            bounding_box: BoundingBox::default(),
                            config: RenderCommandConfig::ScissorEnd(),
                            user_data: 0,
                            id: end_id,
                            z_index: root.z_index,
                        })?;
                    }

                    dfs_buffer.pop();
                    visited.pop();
                    continue;
                }

                if self.layout_elements[element_index].is_text() {
                    continue;
                }

                // Queue children in reverse so the first child is processed
                // first. Cross-axis alignment is resolved per child here,
                // while the primary axis advances through next_child_offset.
                let (children_start, children_length) =
                    match self.layout_elements[element_index].payload {
                        LayoutElementPayload::Children { start, length } => {
                            (start, length as usize)
                        }
                        LayoutElementPayload::Text { .. } => (0, 0),
                    };
                let new_length = dfs_buffer.len() + children_length;
                dfs_buffer.resize(new_length, LayoutElementTreeNode::default());
                visited.resize(new_length, false);
                for offset in 0..children_length {
                    let child_index =
                        self.layout_element_children[children_start + offset] as usize;
                    let child_dimensions = self.layout_elements[child_index].dimensions;
                    let child_layout_config_index =
                        self.layout_elements[child_index].layout_config_index;

                    let mut child_offset = dfs_buffer[buffer_index].next_child_offset;
                    if layout_config.layout_direction == LayoutDirection::LeftToRight {
                        child_offset.y = layout_config.padding.top as f32;
                        let white_space = self.layout_elements[element_index].dimensions.height
                            - layout_config.padding.vertical() as f32
                            - child_dimensions.height;
                        match layout_config.child_alignment.y {
                            AlignY::Top => {}
                            AlignY::CenterY => child_offset.y += white_space / 2.0,
                            AlignY::Bottom => child_offset.y += white_space,
                        }
                    } else {
                        child_offset.x = layout_config.padding.left as f32;
                        let white_space = self.layout_elements[element_index].dimensions.width
                            - layout_config.padding.horizontal() as f32
                            - child_dimensions.width;
                        match layout_config.child_alignment.x {
                            AlignX::Left => {}
                            AlignX::CenterX => child_offset.x += white_space / 2.0,
                            AlignX::Right => child_offset.x += white_space,
                        }
                    }

                    dfs_buffer[new_length - 1 - offset] = LayoutElementTreeNode {
                        layout_element_index: child_index as i32,
                        position: Vector2::new(
                            dfs_buffer[buffer_index].position.x
                                + child_offset.x
                                + scroll_offset.x,
                            dfs_buffer[buffer_index].position.y
                                + child_offset.y
                                + scroll_offset.y,
                        ),
                        next_child_offset: Vector2::new(
                            self.layout_configs[child_layout_config_index].padding.left as f32,
                            self.layout_configs[child_layout_config_index].padding.top as f32,
                        ),
                    };

                    if layout_config.layout_direction == LayoutDirection::LeftToRight {
                        dfs_buffer[buffer_index].next_child_offset.x +=
                            child_dimensions.width + layout_config.child_gap as f32;
                    } else {
                        dfs_buffer[buffer_index].next_child_offset.y +=
                            child_dimensions.height + layout_config.child_gap as f32;
                    }
                }
            }

            if root.clip_element_id != 0 {
                let root_children = self.layout_elements[root_element_index].children_count();
                let root_id = self.layout_elements[root_element_index].id;
                self.add_render_command(RenderCommand {
                    bounding_box: BoundingBox::default(),
                    config: RenderCommandConfig::ScissorEnd(),
                    user_data: 0,
                    id: hash_number(root_id, root_children as u32 + 11).id,
                    z_index: root.z_index,
                })?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pointer and scroll runtime
    // ------------------------------------------------------------------

    /// Feeds the current pointer position and primary button state into the
    /// engine. Hit testing runs against the previous frame's bounding boxes,
    /// topmost tree root first, and fires any hover callbacks registered on
    /// the elements under the pointer.
    pub fn set_pointer_state(&mut self, position: Vector2, is_down: bool) {
        self.pointer_info.position = position;
        self.pointer_over_ids.clear();
        let mut dfs = std::mem::take(&mut self.pointer_dfs_buffer);

        for root_index in (0..self.layout_element_tree_roots.len()).rev() {
            let root = self.layout_element_tree_roots[root_index];
            dfs.clear();
            dfs.push(root.layout_element_index);
            let mut found = false;

            while let Some(element_index) = dfs.pop() {
                let element_index = element_index as usize;
                let element_id = self.layout_elements[element_index].id;
                let Some((registered_box, registered_id, has_hover)) =
                    self.layout_element_map.get(&element_id).map(|item| {
                        (
                            item.bounding_box,
                            item.element_id,
                            item.on_hover_fn.is_some(),
                        )
                    })
                else {
                    continue;
                };

                // Roots whose scrolling the host applies store the offset
                // they were shifted by, so hit testing undoes it here.
                let mut element_box = registered_box;
                element_box.x -= root.pointer_offset.x;
                element_box.y -= root.pointer_offset.y;

                let clip_id = self.layout_element_clip_element_ids[element_index];
                let clipped_out = clip_id != 0
                    && !self
                        .layout_element_map
                        .get(&clip_id)
                        .map(|item| item.bounding_box.contains_point(position))
                        .unwrap_or(false);

                if element_box.contains_point(position) && !clipped_out {
                    if has_hover {
                        let pointer_data = self.pointer_info;
                        if let Some(item) = self.layout_element_map.get_mut(&element_id) {
                            if let Some(callback) = item.on_hover_fn.as_mut() {
                                callback(registered_id, pointer_data);
                            }
                        }
                    }
                    self.pointer_over_ids.push(registered_id);
                    found = true;
                }

                if self.layout_elements[element_index].is_text() {
                    continue;
                }
                if let LayoutElementPayload::Children { start, length } =
                    self.layout_elements[element_index].payload
                {
                    for offset in (0..length as usize).rev() {
                        dfs.push(self.layout_element_children[start + offset]);
                    }
                }
            }

            if found {
                if let Some(config_index) = self.find_element_config_index(
                    root.layout_element_index as usize,
                    ElementConfigType::Floating,
                ) {
                    if self.floating_element_configs[config_index].pointer_capture_mode
                        == PointerCaptureMode::Capture
                    {
                        break;
                    }
                }
            }
        }
        self.pointer_dfs_buffer = dfs;

        if is_down {
            match self.pointer_info.state {
                PointerDataInteractionState::PressedThisFrame => {
                    self.pointer_info.state = PointerDataInteractionState::Pressed;
                }
                state if state != PointerDataInteractionState::Pressed => {
                    self.pointer_info.state = PointerDataInteractionState::PressedThisFrame;
                }
                _ => {}
            }
        } else {
            match self.pointer_info.state {
                PointerDataInteractionState::ReleasedThisFrame => {
                    self.pointer_info.state = PointerDataInteractionState::Released;
                }
                state if state != PointerDataInteractionState::Released => {
                    self.pointer_info.state = PointerDataInteractionState::ReleasedThisFrame;
                }
                _ => {}
            }
        }
    }

    /// Advances scroll state between frames: culls containers that were not
    /// declared last frame, applies drag scrolling and wheel deltas, and
    /// clamps every offset to its content bounds. Call after
    /// [`set_pointer_state`](Self::set_pointer_state) and before
    /// [`begin_layout`](Self::begin_layout).
    pub fn update_scroll_containers(&mut self, enable_drag_scrolling: bool, scroll_delta: Vector2) {
        self.scroll_container_datas.retain_mut(|data| {
            if !data.open_this_frame {
                return false;
            }
            data.open_this_frame = false;
            true
        });

        if self.external_scroll_handling_enabled {
            return;
        }

        let pointer = self.pointer_info.position;
        let pointer_down = matches!(
            self.pointer_info.state,
            PointerDataInteractionState::PressedThisFrame | PointerDataInteractionState::Pressed
        );
        let pressed_this_frame =
            self.pointer_info.state == PointerDataInteractionState::PressedThisFrame;

        if enable_drag_scrolling {
            for data in self.scroll_container_datas.iter_mut() {
                if data.pointer_scroll_active {
                    if pointer_down {
                        if data.horizontal {
                            data.scroll_position.x =
                                data.scroll_origin.x + (pointer.x - data.pointer_origin.x);
                        }
                        if data.vertical {
                            data.scroll_position.y =
                                data.scroll_origin.y + (pointer.y - data.pointer_origin.y);
                        }
                    } else {
                        data.pointer_scroll_active = false;
                    }
                }
                if pressed_this_frame && data.bounding_box.contains_point(pointer) {
                    data.scroll_origin = data.scroll_position;
                    data.pointer_origin = pointer;
                    data.pointer_scroll_active = true;
                }
            }
        }

        if scroll_delta.x != 0.0 || scroll_delta.y != 0.0 {
            // The deepest container under the pointer wins the wheel. Datas
            // are stored in declaration order, so the last match is the
            // innermost.
            let mut target: Option<usize> = None;
            for i in 0..self.scroll_container_datas.len() {
                if self.scroll_container_datas[i]
                    .bounding_box
                    .contains_point(pointer)
                {
                    target = Some(i);
                }
            }
            if let Some(i) = target {
                let data = &mut self.scroll_container_datas[i];
                if data.horizontal {
                    data.scroll_position.x += scroll_delta.x;
                }
                if data.vertical {
                    data.scroll_position.y += scroll_delta.y;
                }
            }
        }

        for data in self.scroll_container_datas.iter_mut() {
            let max_scroll_x = -(data.content_size.width - data.bounding_box.width).max(0.0);
            let max_scroll_y = -(data.content_size.height - data.bounding_box.height).max(0.0);
            data.scroll_position.x = data.scroll_position.x.clamp(max_scroll_x, 0.0);
            data.scroll_position.y = data.scroll_position.y.clamp(max_scroll_y, 0.0);
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// True when the pointer was over the currently open element as of the
    /// last [`set_pointer_state`](Self::set_pointer_state) call.
    pub fn hovered(&self) -> bool {
        if self.open_layout_element_stack.is_empty() {
            return false;
        }
        let element_id = self.layout_elements[self.open_index()].id;
        self.pointer_over_ids.iter().any(|id| id.id == element_id)
    }

    /// Registers a hover callback on the currently open element. The
    /// callback fires from inside `set_pointer_state` whenever the pointer
    /// is over the element.
    pub fn on_hover(&mut self, callback: impl FnMut(ElementId, PointerData) + 'static) {
        if self.open_layout_element_stack.is_empty() {
            return;
        }
        let element_id = self.layout_elements[self.open_index()].id;
        if let Some(item) = self.layout_element_map.get_mut(&element_id) {
            item.on_hover_fn = Some(Box::new(callback));
        }
    }

    /// True when the pointer was over the element with `element_id` as of
    /// the last `set_pointer_state` call.
    pub fn pointer_over(&self, element_id: ElementId) -> bool {
        self.pointer_over_ids.iter().any(|id| id.id == element_id.id)
    }

    /// Every element under the pointer, outermost first.
    pub fn get_pointer_over_ids(&self) -> &[ElementId] {
        &self.pointer_over_ids
    }

    /// Pointer position and button state as last fed in.
    pub fn pointer_data(&self) -> PointerData {
        self.pointer_info
    }

    /// The bounding box the element with `id` occupied last frame, if it
    /// was declared recently enough to still be registered.
    pub fn get_element_data(&self, id: ElementId) -> Option<BoundingBox> {
        self.layout_element_map
            .get(&id.id)
            .map(|item| item.bounding_box)
    }

    /// Scroll state for the scroll container with `id`.
    pub fn get_scroll_container_data(&self, id: ElementId) -> Option<ScrollContainerData> {
        self.scroll_container_datas
            .iter()
            .find(|data| data.element_id == id.id)
            .map(|data| ScrollContainerData {
                scroll_position: data.scroll_position,
                scroll_container_dimensions: Dimensions::new(
                    data.bounding_box.width,
                    data.bounding_box.height,
                ),
                content_dimensions: data.content_size,
                config: ScrollConfig {
                    horizontal: data.horizontal,
                    vertical: data.vertical,
                },
            })
    }

    /// Scroll offset of the currently open element, or zero when it is not
    /// a scroll container.
    pub fn get_scroll_offset(&self) -> Vector2 {
        if self.open_layout_element_stack.is_empty() {
            return Vector2::default();
        }
        let element_id = self.layout_elements[self.open_index()].id;
        self.scroll_container_datas
            .iter()
            .find(|data| data.element_id == element_id)
            .map(|data| data.scroll_position)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::layout::Sizing;

    fn test_context() -> TrellisContext {
        TrellisContext::new(Dimensions::new(800.0, 600.0))
    }

    // 10 units per character, 20 units tall. Keeps wrap arithmetic exact.
    fn measured(text: &str, _config: &TextConfig) -> Dimensions {
        Dimensions::new(text.chars().count() as f32 * 10.0, 20.0)
    }

    fn sized(width: Sizing, height: Sizing) -> ElementDeclaration<()> {
        ElementDeclaration {
            layout: LayoutConfig {
                sizing: SizingConfig {
                    width: width.into(),
                    height: height.into(),
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn colored(width: Sizing, height: Sizing, color: Color) -> ElementDeclaration<()> {
        ElementDeclaration {
            background_color: color,
            ..sized(width, height)
        }
    }

    const RED: Color = Color::rgba(255.0, 0.0, 0.0, 255.0);
    const BLUE: Color = Color::rgba(0.0, 0.0, 255.0, 255.0);

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 0.01,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_frame_emits_no_commands() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        let commands = ctx.end_layout().unwrap();
        assert!(commands.is_empty());
    }

    #[test]
    fn fixed_leaf_positions_inside_padding() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(ElementDeclaration {
            layout: LayoutConfig {
                padding: PaddingConfig {
                    left: 10,
                    right: 10,
                    top: 10,
                    bottom: 10,
                },
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        {
            ctx.open_element().unwrap();
            ctx.configure_open_element(colored(
                Sizing::Fixed(50.0),
                Sizing::Fixed(40.0),
                RED,
            ))
            .unwrap();
            ctx.close_element().unwrap();
        }
        ctx.close_element().unwrap();
        let commands = ctx.end_layout().unwrap();

        assert_eq!(commands.len(), 1);
        let command = &commands[0];
        assert!(matches!(command.config, RenderCommandConfig::Rectangle(_)));
        assert_close(command.bounding_box.x, 10.0);
        assert_close(command.bounding_box.y, 10.0);
        assert_close(command.bounding_box.width, 50.0);
        assert_close(command.bounding_box.height, 40.0);
    }

    #[test]
    fn grow_children_split_free_space() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(ElementDeclaration {
            layout: LayoutConfig {
                sizing: SizingConfig {
                    width: Sizing::Fixed(300.0).into(),
                    height: Sizing::Fixed(100.0).into(),
                },
                child_gap: 10,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        for color in [RED, BLUE] {
            ctx.open_element().unwrap();
            ctx.configure_open_element(colored(
                Sizing::Grow(0.0, f32::MAX),
                Sizing::Grow(0.0, f32::MAX),
                color,
            ))
            .unwrap();
            ctx.close_element().unwrap();
        }
        ctx.close_element().unwrap();
        let commands = ctx.end_layout().unwrap();

        assert_eq!(commands.len(), 2);
        assert_close(commands[0].bounding_box.x, 0.0);
        assert_close(commands[0].bounding_box.width, 145.0);
        assert_close(commands[0].bounding_box.height, 100.0);
        assert_close(commands[1].bounding_box.x, 155.0);
        assert_close(commands[1].bounding_box.width, 145.0);
    }

    #[test]
    fn grow_caps_at_max_and_redistributes() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(sized(Sizing::Fixed(300.0), Sizing::Fixed(100.0)))
            .unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(colored(
            Sizing::Grow(0.0, 50.0),
            Sizing::Fixed(100.0),
            RED,
        ))
        .unwrap();
        ctx.close_element().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(colored(
            Sizing::Grow(0.0, f32::MAX),
            Sizing::Fixed(100.0),
            BLUE,
        ))
        .unwrap();
        ctx.close_element().unwrap();
        ctx.close_element().unwrap();
        let commands = ctx.end_layout().unwrap();

        assert_eq!(commands.len(), 2);
        assert_close(commands[0].bounding_box.width, 50.0);
        assert_close(commands[1].bounding_box.x, 50.0);
        assert_close(commands[1].bounding_box.width, 250.0);
    }

    #[test]
    fn percent_children_divide_parent() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(sized(Sizing::Fixed(200.0), Sizing::Fixed(100.0)))
            .unwrap();
        for (percent, color) in [(0.25, RED), (0.75, BLUE)] {
            ctx.open_element().unwrap();
            ctx.configure_open_element(colored(
                Sizing::Percent(percent),
                Sizing::Fixed(80.0),
                color,
            ))
            .unwrap();
            ctx.close_element().unwrap();
        }
        ctx.close_element().unwrap();
        let commands = ctx.end_layout().unwrap();

        assert_eq!(commands.len(), 2);
        assert_close(commands[0].bounding_box.width, 50.0);
        assert_close(commands[1].bounding_box.x, 50.0);
        assert_close(commands[1].bounding_box.width, 150.0);
    }

    #[test]
    fn percent_outside_unit_range_poisons_the_frame() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        let result = ctx.configure_open_element(sized(
            Sizing::Percent(1.5),
            Sizing::Fixed(10.0),
        ));
        assert!(matches!(
            result,
            Err(LayoutError::InvalidConfiguration { .. })
        ));

        // Every later call reports the same error until the next frame.
        assert_eq!(ctx.open_element(), result);
        assert!(matches!(
            ctx.end_layout(),
            Err(LayoutError::InvalidConfiguration { .. })
        ));
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(sized(Sizing::Fixed(10.0), Sizing::Fixed(10.0)))
            .unwrap();
        ctx.close_element().unwrap();
        assert!(ctx.end_layout().is_ok());
    }

    #[test]
    fn text_children_compress_and_wrap() {
        let mut ctx = test_context();
        ctx.set_measure_text_function(measured);
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(sized(Sizing::Fixed(250.0), Sizing::Fixed(100.0)))
            .unwrap();
        for _ in 0..3 {
            ctx.text("aaaa bbbb", |_| {}).unwrap();
        }
        ctx.close_element().unwrap();
        let commands = ctx.end_layout().unwrap();

        // Three texts of preferred width 90 compress to 250 / 3 each, which
        // forces every one onto two lines.
        assert_eq!(commands.len(), 6);
        for command in commands {
            assert!(matches!(command.config, RenderCommandConfig::Text(_)));
        }
        let RenderCommandConfig::Text(first_line) = &commands[0].config else {
            unreachable!();
        };
        assert_eq!(first_line.text, "aaaa");
        assert_close(commands[0].bounding_box.width, 40.0);
        assert_close(commands[0].bounding_box.y, 0.0);
        assert_close(commands[1].bounding_box.y, 20.0);
        let RenderCommandConfig::Text(second_element_line) = &commands[2].config else {
            unreachable!();
        };
        assert_eq!(second_element_line.text, "aaaa");
        assert_close(commands[2].bounding_box.x, 250.0 / 3.0);
    }

    #[test]
    fn anonymous_siblings_get_distinct_ids() {
        let mut ctx = test_context();
        let declare = |ctx: &mut TrellisContext| {
            ctx.begin_layout().unwrap();
            ctx.open_element().unwrap();
            ctx.configure_open_element(ElementDeclaration::default())
                .unwrap();
            for color in [RED, BLUE] {
                ctx.open_element().unwrap();
                ctx.configure_open_element(colored(
                    Sizing::Fixed(10.0),
                    Sizing::Fixed(10.0),
                    color,
                ))
                .unwrap();
                ctx.close_element().unwrap();
            }
            ctx.close_element().unwrap();
        };

        declare(&mut ctx);
        let commands = ctx.end_layout().unwrap();
        assert_eq!(commands.len(), 2);
        assert_ne!(commands[0].id, 0);
        assert_ne!(commands[1].id, 0);
        assert_ne!(commands[0].id, commands[1].id);
        let first_frame_ids = [commands[0].id, commands[1].id];

        // The derived ids depend only on position, so a second identical
        // frame reproduces them.
        declare(&mut ctx);
        let commands = ctx.end_layout().unwrap();
        assert_eq!([commands[0].id, commands[1].id], first_frame_ids);
    }

    #[test]
    fn floating_element_centers_on_attach_parent() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(ElementDeclaration {
            id: Some(ElementId::new("Anchor")),
            ..sized(Sizing::Fixed(200.0), Sizing::Fixed(200.0))
        })
        .unwrap();
        {
            ctx.open_element().unwrap();
            ctx.configure_open_element(ElementDeclaration {
                floating: FloatingConfig {
                    attach_to: FloatingAttachToElement::Parent,
                    attach_points: FloatingAttachPoints {
                        element_x: AlignX::CenterX,
                        element_y: AlignY::CenterY,
                        parent_x: AlignX::CenterX,
                        parent_y: AlignY::CenterY,
                    },
                    ..Default::default()
                },
                ..colored(Sizing::Fixed(50.0), Sizing::Fixed(50.0), RED)
            })
            .unwrap();
            ctx.close_element().unwrap();
        }
        ctx.close_element().unwrap();
        let commands = ctx.end_layout().unwrap();

        assert_eq!(commands.len(), 1);
        let last = &commands[commands.len() - 1];
        assert_close(last.bounding_box.x, 75.0);
        assert_close(last.bounding_box.y, 75.0);
        assert_close(last.bounding_box.width, 50.0);
        assert_close(last.bounding_box.height, 50.0);
    }

    #[test]
    fn roots_emit_in_ascending_z_order() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(colored(Sizing::Fixed(100.0), Sizing::Fixed(100.0), RED))
            .unwrap();
        for z_index in [5i16, -5] {
            ctx.open_element().unwrap();
            ctx.configure_open_element(ElementDeclaration {
                floating: FloatingConfig {
                    attach_to: FloatingAttachToElement::Parent,
                    z_index,
                    ..Default::default()
                },
                ..colored(Sizing::Fixed(10.0), Sizing::Fixed(10.0), BLUE)
            })
            .unwrap();
            ctx.close_element().unwrap();
        }
        ctx.close_element().unwrap();
        let commands = ctx.end_layout().unwrap();

        let z_sequence: Vec<i16> = commands.iter().map(|command| command.z_index).collect();
        assert_eq!(z_sequence, vec![-5, 0, 5]);
    }

    #[test]
    fn border_between_children_emits_dividers() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(ElementDeclaration {
            border: BorderConfig {
                color: RED,
                width: BorderWidthConfig {
                    between_children: 2,
                    ..Default::default()
                },
            },
            ..sized(Sizing::Fixed(200.0), Sizing::Fixed(100.0))
        })
        .unwrap();
        for color in [RED, BLUE] {
            ctx.open_element().unwrap();
            ctx.configure_open_element(colored(
                Sizing::Fixed(50.0),
                Sizing::Fixed(100.0),
                color,
            ))
            .unwrap();
            ctx.close_element().unwrap();
        }
        ctx.close_element().unwrap();
        let commands = ctx.end_layout().unwrap();

        // Two child rectangles, then the border and one divider between the
        // children, emitted on the way back up.
        assert_eq!(commands.len(), 4);
        assert!(matches!(commands[2].config, RenderCommandConfig::Border(_)));
        let divider = &commands[3];
        assert!(matches!(divider.config, RenderCommandConfig::Rectangle(_)));
        assert_close(divider.bounding_box.x, 50.0);
        assert_close(divider.bounding_box.width, 2.0);
        assert_close(divider.bounding_box.height, 100.0);
    }

    #[test]
    fn image_height_follows_source_aspect_ratio() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(ElementDeclaration {
            image: Some(ImageConfig {
                data: 7,
                source_dimensions: Dimensions::new(100.0, 50.0),
            }),
            ..sized(Sizing::Fixed(200.0), Sizing::Fit(0.0, f32::MAX))
        })
        .unwrap();
        ctx.close_element().unwrap();
        let commands = ctx.end_layout().unwrap();

        assert_eq!(commands.len(), 1);
        let RenderCommandConfig::Image(image) = &commands[0].config else {
            panic!("expected an image command");
        };
        assert_eq!(image.data, 7);
        assert_close(commands[0].bounding_box.width, 200.0);
        assert_close(commands[0].bounding_box.height, 100.0);
    }

    #[test]
    fn scroll_offset_clamps_and_shifts_children() {
        let list_id = ElementId::new("List");
        let mut ctx = test_context();

        let declare = |ctx: &mut TrellisContext| {
            ctx.begin_layout().unwrap();
            ctx.open_element().unwrap();
            ctx.configure_open_element(ElementDeclaration {
                id: Some(list_id),
                scroll: ScrollConfig {
                    horizontal: false,
                    vertical: true,
                },
                ..sized(Sizing::Fixed(100.0), Sizing::Fixed(100.0))
            })
            .unwrap();
            ctx.open_element().unwrap();
            ctx.configure_open_element(colored(
                Sizing::Fixed(50.0),
                Sizing::Fixed(300.0),
                RED,
            ))
            .unwrap();
            ctx.close_element().unwrap();
            ctx.close_element().unwrap();
        };

        declare(&mut ctx);
        ctx.end_layout().unwrap();

        ctx.set_pointer_state(Vector2::new(50.0, 50.0), false);
        ctx.update_scroll_containers(false, Vector2::new(0.0, -1000.0));

        let data = ctx.get_scroll_container_data(list_id).unwrap();
        assert_close(data.scroll_position.y, -200.0);
        assert_close(data.content_dimensions.height, 300.0);

        declare(&mut ctx);
        let commands = ctx.end_layout().unwrap();
        assert_eq!(commands.len(), 3);
        assert!(matches!(
            commands[0].config,
            RenderCommandConfig::ScissorStart(_)
        ));
        assert!(matches!(
            commands[1].config,
            RenderCommandConfig::Rectangle(_)
        ));
        assert!(matches!(
            commands[2].config,
            RenderCommandConfig::ScissorEnd()
        ));
        assert_close(commands[1].bounding_box.y, -200.0);
    }

    #[test]
    fn external_scroll_mode_reads_host_offsets() {
        let list_id = ElementId::new("List");
        let host_offset = Rc::new(Cell::new(Vector2::new(0.0, -40.0)));
        let mut ctx = test_context();
        ctx.set_external_scroll_handling_enabled(true);
        let query_offset = Rc::clone(&host_offset);
        ctx.set_query_scroll_offset_function(move |_| query_offset.get());

        let declare = |ctx: &mut TrellisContext| {
            ctx.begin_layout().unwrap();
            ctx.open_element().unwrap();
            ctx.configure_open_element(ElementDeclaration {
                id: Some(list_id),
                scroll: ScrollConfig {
                    horizontal: false,
                    vertical: true,
                },
                ..sized(Sizing::Fixed(100.0), Sizing::Fixed(100.0))
            })
            .unwrap();
            ctx.open_element().unwrap();
            ctx.configure_open_element(colored(
                Sizing::Fixed(50.0),
                Sizing::Fixed(300.0),
                RED,
            ))
            .unwrap();
            ctx.close_element().unwrap();
            ctx.close_element().unwrap();
        };

        declare(&mut ctx);
        let commands = ctx.end_layout().unwrap();
        assert_eq!(commands.len(), 3);
        // The host applies the offset at draw time, so the child stays put.
        assert_close(commands[1].bounding_box.y, 0.0);
        let data = ctx.get_scroll_container_data(list_id).unwrap();
        assert_close(data.scroll_position.y, -40.0);

        // Wheel input is the host's to apply in this mode.
        ctx.update_scroll_containers(false, Vector2::new(0.0, -10.0));
        let data = ctx.get_scroll_container_data(list_id).unwrap();
        assert_close(data.scroll_position.y, -40.0);

        host_offset.set(Vector2::new(0.0, -70.0));
        declare(&mut ctx);
        ctx.end_layout().unwrap();
        let data = ctx.get_scroll_container_data(list_id).unwrap();
        assert_close(data.scroll_position.y, -70.0);
    }

    #[test]
    fn pointer_hit_fires_hover_and_tracks_ids() {
        let button_id = ElementId::new("Button");
        let hover_count = Rc::new(Cell::new(0u32));
        let mut ctx = test_context();

        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(ElementDeclaration {
            id: Some(button_id),
            ..colored(Sizing::Fixed(100.0), Sizing::Fixed(100.0), RED)
        })
        .unwrap();
        let count = Rc::clone(&hover_count);
        ctx.on_hover(move |_, _| count.set(count.get() + 1));
        ctx.close_element().unwrap();
        ctx.end_layout().unwrap();

        ctx.set_pointer_state(Vector2::new(50.0, 50.0), false);
        assert!(ctx.pointer_over(button_id));
        assert_eq!(hover_count.get(), 1);

        ctx.set_pointer_state(Vector2::new(500.0, 500.0), false);
        assert!(!ctx.pointer_over(button_id));
        assert_eq!(hover_count.get(), 1);
    }

    #[test]
    fn pointer_state_machine_progression() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.end_layout().unwrap();

        let position = Vector2::new(1.0, 1.0);
        ctx.set_pointer_state(position, true);
        assert_eq!(
            ctx.pointer_data().state,
            PointerDataInteractionState::PressedThisFrame
        );
        ctx.set_pointer_state(position, true);
        assert_eq!(ctx.pointer_data().state, PointerDataInteractionState::Pressed);
        ctx.set_pointer_state(position, false);
        assert_eq!(
            ctx.pointer_data().state,
            PointerDataInteractionState::ReleasedThisFrame
        );
        ctx.set_pointer_state(position, false);
        assert_eq!(
            ctx.pointer_data().state,
            PointerDataInteractionState::Released
        );
    }

    #[test]
    fn floating_capture_blocks_elements_beneath() {
        let button_id = ElementId::new("Button");
        let panel_id = ElementId::new("Panel");
        let mut ctx = test_context();

        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(ElementDeclaration {
            id: Some(button_id),
            ..colored(Sizing::Fixed(100.0), Sizing::Fixed(100.0), RED)
        })
        .unwrap();
        ctx.close_element().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(ElementDeclaration {
            id: Some(panel_id),
            floating: FloatingConfig {
                attach_to: FloatingAttachToElement::Root,
                ..Default::default()
            },
            ..colored(Sizing::Fixed(100.0), Sizing::Fixed(100.0), BLUE)
        })
        .unwrap();
        ctx.close_element().unwrap();
        ctx.end_layout().unwrap();

        ctx.set_pointer_state(Vector2::new(50.0, 50.0), false);
        assert!(ctx.pointer_over(panel_id));
        assert!(!ctx.pointer_over(button_id));
    }

    #[test]
    fn capacity_error_poisons_frame() {
        let mut ctx = TrellisContext::<()>::with_limits(Dimensions::new(800.0, 600.0), 4, 64);
        ctx.begin_layout().unwrap();
        for _ in 0..3 {
            ctx.open_element().unwrap();
            ctx.configure_open_element(ElementDeclaration::default())
                .unwrap();
            ctx.close_element().unwrap();
        }
        let overflow = ctx.open_element();
        assert!(matches!(
            overflow,
            Err(LayoutError::CapacityExceeded { .. })
        ));
        assert!(matches!(
            ctx.end_layout(),
            Err(LayoutError::CapacityExceeded { .. })
        ));

        // The next frame starts clean.
        ctx.begin_layout().unwrap();
        assert!(ctx.end_layout().is_ok());
    }

    #[test]
    fn unbalanced_frame_is_rejected_and_recovers() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(ElementDeclaration::default())
            .unwrap();
        assert!(matches!(
            ctx.end_layout(),
            Err(LayoutError::InvalidConfiguration { .. })
        ));

        ctx.begin_layout().unwrap();
        assert!(ctx.end_layout().is_ok());
    }

    #[test]
    fn duplicate_config_kind_is_rejected() {
        let mut ctx = test_context();
        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        let image = ElementDeclaration {
            image: Some(ImageConfig {
                data: 1,
                source_dimensions: Dimensions::new(10.0, 10.0),
            }),
            ..Default::default()
        };
        ctx.configure_open_element(image.clone()).unwrap();
        assert!(matches!(
            ctx.configure_open_element(image),
            Err(LayoutError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn registry_prunes_ids_after_two_absent_frames() {
        let id = ElementId::new("Transient");
        let mut ctx = test_context();

        ctx.begin_layout().unwrap();
        ctx.open_element().unwrap();
        ctx.configure_open_element(ElementDeclaration {
            id: Some(id),
            ..sized(Sizing::Fixed(10.0), Sizing::Fixed(10.0))
        })
        .unwrap();
        ctx.close_element().unwrap();
        ctx.end_layout().unwrap();
        assert!(ctx.get_element_data(id).is_some());

        for _ in 0..2 {
            ctx.begin_layout().unwrap();
            ctx.end_layout().unwrap();
            assert!(ctx.get_element_data(id).is_some());
        }

        ctx.begin_layout().unwrap();
        ctx.end_layout().unwrap();
        assert!(ctx.get_element_data(id).is_none());
    }

    #[test]
    fn measure_cache_reuses_and_evicts_stale_entries() {
        let calls = Rc::new(Cell::new(0u32));
        // Small enough word cache for a single hash bucket, so every entry
        // shares one chain and stale ones are seen by later lookups.
        let mut ctx = TrellisContext::<()>::with_limits(Dimensions::new(800.0, 600.0), 256, 32);
        let counter = Rc::clone(&calls);
        ctx.set_measure_text_function(move |text, config| {
            counter.set(counter.get() + 1);
            measured(text, config)
        });

        let declare_text = |ctx: &mut TrellisContext, content: &str| {
            ctx.begin_layout().unwrap();
            ctx.open_element().unwrap();
            ctx.configure_open_element(ElementDeclaration::default())
                .unwrap();
            ctx.text(content, |_| {}).unwrap();
            ctx.close_element().unwrap();
            ctx.end_layout().unwrap();
        };

        // A miss measures the space width plus the one word.
        declare_text(&mut ctx, "alpha");
        assert_eq!(calls.get(), 2);
        declare_text(&mut ctx, "alpha");
        assert_eq!(calls.get(), 2);

        // Three frames of other content age the first entry out of its
        // chain, so redeclaring it measures from scratch.
        for _ in 0..3 {
            declare_text(&mut ctx, "beta");
        }
        assert_eq!(calls.get(), 4);
        declare_text(&mut ctx, "alpha");
        assert_eq!(calls.get(), 6);
    }
}
