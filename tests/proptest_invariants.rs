//! Property tests for identity hashing, the sizing solver and text wrapping:
//!
//! 1. Ids are deterministic; indexed variants share a base id.
//! 2. Grow rows hand out exactly the available width, never negative.
//! 3. Fixed cells keep their declared size even when the row overflows.
//! 4. Fit containers wrap their children plus gaps and padding.
//! 5. Percent cells take their fraction of the content width.
//! 6. Wrapping preserves every word in order and respects the container
//!    width, except for single words too wide to fit.
//! 7. Arbitrary frames produce finite boxes, balanced scissors and
//!    non-decreasing z order.

use proptest::prelude::*;
use trellis::layout::Sizing;
use trellis::prelude::*;

const LABELS: &[&str] = &["Row", "Panel", "ListItem", "SideBar", "Toolbar", "Badge"];

fn label_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(LABELS)
}

proptest! {
    #[test]
    fn ids_are_deterministic_and_keep_their_base(
        label in label_strategy(),
        index in any::<u32>(),
        other_index in any::<u32>(),
        seed in any::<u32>(),
    ) {
        let id = ElementId::new_index(label, index);
        prop_assert_eq!(id, ElementId::new_index(label, index));
        prop_assert_eq!(id.offset, index);
        prop_assert_eq!(id.base_id, ElementId::new_index(label, other_index).base_id);
        prop_assert_eq!(ElementId::new(label), ElementId::from(label));
        prop_assert_eq!(ElementId::new(label).id, ElementId::new_index(label, 0).id);

        let seeded = ElementId::new_index_seeded(label, index, seed);
        prop_assert_eq!(seeded, ElementId::new_index_seeded(label, index, seed));
        prop_assert_eq!(seeded.offset, index);
    }
}

proptest! {
    #[test]
    fn grow_rows_fill_exactly_the_available_width(
        container_width in 50.0f32..1500.0,
        count in 1u32..10,
        gap in 0u16..8,
        pad in 0u16..20,
    ) {
        let mut ctx: TrellisContext = TrellisContext::new(Dimensions::new(2000.0, 1000.0));
        ctx.begin_layout().unwrap();
        ctx.with_element(
            &Declaration::new().id(ElementId::new("GrowRow")).layout(|l| {
                l.width(fixed!(container_width))
                    .height(fixed!(100.0))
                    .gap(gap)
                    .padding(pad);
            }),
            |ctx| {
                for i in 0..count {
                    ctx.element(&Declaration::new().id(ElementId::new_index("GrowCell", i)).layout(
                        |l| {
                            l.width(grow!()).height(grow!());
                        },
                    ))?;
                }
                Ok(())
            },
        )
        .unwrap();
        ctx.end_layout().unwrap();

        let available = (container_width
            - 2.0 * pad as f32
            - (count as f32 - 1.0) * gap as f32)
            .max(0.0);
        let mut total = 0.0f32;
        let mut expected_x = pad as f32;
        for i in 0..count {
            let cell = ctx
                .get_element_data(ElementId::new_index("GrowCell", i))
                .unwrap();
            prop_assert!(cell.width >= -0.01, "cell {} has negative width {}", i, cell.width);
            prop_assert!(
                (cell.x - expected_x).abs() < 0.1,
                "cell {} at {} but previous ended at {}",
                i, cell.x, expected_x
            );
            total += cell.width;
            expected_x = cell.x + cell.width + gap as f32;
        }
        prop_assert!(
            (total - available).abs() < 0.1,
            "children take {} of {} available",
            total, available
        );
    }
}

proptest! {
    #[test]
    fn fixed_cells_keep_their_declared_width_under_overflow(
        widths in prop::collection::vec(1.0f32..400.0, 1..8),
    ) {
        let mut ctx: TrellisContext = TrellisContext::new(Dimensions::new(800.0, 600.0));
        ctx.begin_layout().unwrap();
        ctx.with_element(
            &Declaration::new().layout(|l| {
                l.width(fixed!(100.0)).height(fixed!(100.0));
            }),
            |ctx| {
                for (i, width) in widths.iter().enumerate() {
                    ctx.element(
                        &Declaration::new()
                            .id(ElementId::new_index("FixedCell", i as u32))
                            .layout(|l| {
                                l.width(fixed!(*width)).height(fixed!(20.0));
                            }),
                    )?;
                }
                Ok(())
            },
        )
        .unwrap();
        ctx.end_layout().unwrap();

        for (i, width) in widths.iter().enumerate() {
            let cell = ctx
                .get_element_data(ElementId::new_index("FixedCell", i as u32))
                .unwrap();
            prop_assert!(
                (cell.width - width).abs() < 0.001,
                "cell {} resized from {} to {}",
                i, width, cell.width
            );
            prop_assert!((cell.height - 20.0).abs() < 0.001);
        }
    }
}

proptest! {
    #[test]
    fn fit_containers_wrap_their_children(
        widths in prop::collection::vec(1.0f32..400.0, 1..7),
        gap in 0u16..8,
        pad in 0u16..20,
    ) {
        let mut ctx: TrellisContext = TrellisContext::new(Dimensions::new(4000.0, 4000.0));
        ctx.begin_layout().unwrap();
        ctx.with_element(
            &Declaration::new().id(ElementId::new("FitRow")).layout(|l| {
                l.gap(gap).padding(pad);
            }),
            |ctx| {
                for width in &widths {
                    ctx.element(&Declaration::new().layout(|l| {
                        l.width(fixed!(*width)).height(fixed!(10.0));
                    }))?;
                }
                Ok(())
            },
        )
        .unwrap();
        ctx.end_layout().unwrap();

        let expected: f32 = widths.iter().sum::<f32>()
            + (widths.len() as f32 - 1.0) * gap as f32
            + 2.0 * pad as f32;
        let row = ctx.get_element_data(ElementId::new("FitRow")).unwrap();
        prop_assert!(
            (row.width - expected).abs() < 0.05,
            "fit row is {} wide, children need {}",
            row.width, expected
        );
    }
}

proptest! {
    #[test]
    fn percent_cells_take_their_fraction_of_content_width(
        container_width in 100.0f32..1000.0,
        gap in 0u16..6,
        pad in 0u16..10,
        fractions in prop::collection::vec(0.0f32..1.0, 1..5),
    ) {
        let mut ctx: TrellisContext = TrellisContext::new(Dimensions::new(2000.0, 1000.0));
        ctx.begin_layout().unwrap();
        ctx.with_element(
            &Declaration::new().layout(|l| {
                l.width(fixed!(container_width))
                    .height(fixed!(100.0))
                    .gap(gap)
                    .padding(pad);
            }),
            |ctx| {
                for (i, fraction) in fractions.iter().enumerate() {
                    ctx.element(
                        &Declaration::new()
                            .id(ElementId::new_index("PercentCell", i as u32))
                            .layout(|l| {
                                l.width(Sizing::Percent(*fraction)).height(grow!());
                            }),
                    )?;
                }
                Ok(())
            },
        )
        .unwrap();
        ctx.end_layout().unwrap();

        let base = container_width
            - 2.0 * pad as f32
            - (fractions.len() as f32 - 1.0) * gap as f32;
        for (i, fraction) in fractions.iter().enumerate() {
            let cell = ctx
                .get_element_data(ElementId::new_index("PercentCell", i as u32))
                .unwrap();
            prop_assert!(
                (cell.width - base * fraction).abs() < 0.1,
                "cell {} is {} wide, wanted {} of {}",
                i, cell.width, fraction, base
            );
        }
    }
}

proptest! {
    #[test]
    fn wrapping_preserves_words_and_never_overflows(
        word_lengths in prop::collection::vec(1usize..12, 1..15),
        container_width in 40.0f32..400.0,
    ) {
        let paragraph = word_lengths
            .iter()
            .map(|len| "a".repeat(*len))
            .collect::<Vec<_>>()
            .join(" ");
        let longest = word_lengths.iter().copied().max().unwrap() as f32 * 10.0;

        let mut ctx: TrellisContext = TrellisContext::new(Dimensions::new(2000.0, 2000.0));
        ctx.set_measure_text_function(|text, _| Dimensions::new(text.len() as f32 * 10.0, 20.0));
        ctx.begin_layout().unwrap();
        ctx.with_element(
            &Declaration::new().layout(|l| {
                l.width(fixed!(container_width)).height(fixed!(600.0));
            }),
            |ctx| ctx.text(&paragraph, |_| {}),
        )
        .unwrap();

        let commands = ctx.end_layout().unwrap();
        let mut lines = Vec::new();
        for command in commands {
            if let RenderCommandConfig::Text(text) = &command.config {
                prop_assert!(
                    command.bounding_box.width <= container_width.max(longest) + 0.01,
                    "line {:?} is {} wide in a {} container",
                    text.text, command.bounding_box.width, container_width
                );
                lines.push(text.text.clone());
            }
        }
        prop_assert_eq!(lines.join(" "), paragraph);
    }
}

#[derive(Debug, Clone)]
struct CellPlan {
    width_kind: u8,
    height_kind: u8,
    span: f32,
    fraction: f32,
    scroll: (bool, bool),
    nested: Vec<(u8, f32)>,
}

fn cell_plan() -> impl Strategy<Value = CellPlan> {
    (
        0u8..4,
        0u8..4,
        1.0f32..300.0,
        0.0f32..1.0,
        any::<bool>(),
        any::<bool>(),
        prop::collection::vec((0u8..4, 1.0f32..120.0), 0..4),
    )
        .prop_map(
            |(width_kind, height_kind, span, fraction, scroll_x, scroll_y, nested)| CellPlan {
                width_kind,
                height_kind,
                span,
                fraction,
                scroll: (scroll_x, scroll_y),
                nested,
            },
        )
}

fn sizing_for(kind: u8, span: f32, fraction: f32) -> Sizing {
    match kind % 4 {
        0 => fit!(),
        1 => grow!(),
        2 => fixed!(span),
        _ => Sizing::Percent(fraction),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn arbitrary_frames_emit_finite_balanced_commands(
        vertical in any::<bool>(),
        gap in 0u16..10,
        pad in 0u16..16,
        cells in prop::collection::vec(cell_plan(), 0..6),
        float_z in -5i16..5,
    ) {
        let mut ctx: TrellisContext = TrellisContext::new(Dimensions::new(640.0, 480.0));
        ctx.set_measure_text_function(|text, _| Dimensions::new(text.len() as f32 * 8.0, 16.0));
        ctx.begin_layout().unwrap();
        ctx.with_element(
            &Declaration::new().layout(|l| {
                l.width(grow!())
                    .height(grow!())
                    .direction(if vertical { TopToBottom } else { LeftToRight })
                    .gap(gap)
                    .padding(pad);
            }),
            |ctx| {
                for cell in &cells {
                    ctx.with_element(
                        &Declaration::new()
                            .layout(|l| {
                                l.width(sizing_for(cell.width_kind, cell.span, cell.fraction))
                                    .height(sizing_for(cell.height_kind, cell.span, cell.fraction))
                                    .gap(2);
                            })
                            .background_color(Color::rgb(100.0, 100.0, 100.0))
                            .scroll(cell.scroll.0, cell.scroll.1),
                        |ctx| {
                            for (kind, span) in &cell.nested {
                                ctx.element(
                                    &Declaration::new()
                                        .layout(|l| {
                                            l.width(sizing_for(*kind, *span, 0.5))
                                                .height(fixed!(*span));
                                        })
                                        .background_color(Color::rgb(160.0, 160.0, 160.0)),
                                )?;
                            }
                            ctx.text("filler words for measure", |t| {
                                t.font_size(14);
                            })
                        },
                    )?;
                }
                ctx.element(
                    &Declaration::new()
                        .layout(|l| {
                            l.width(fixed!(60.0)).height(fixed!(24.0));
                        })
                        .background_color(Color::rgb(250.0, 230.0, 20.0))
                        .floating(|f| {
                            f.attach_parent().z_index(float_z).offset(11.0, 7.0);
                        }),
                )
            },
        )
        .unwrap();

        let commands = ctx.end_layout().unwrap();
        let mut scissor_depth = 0i32;
        let mut last_z = i16::MIN;
        for command in commands {
            let b = command.bounding_box;
            prop_assert!(
                b.x.is_finite() && b.y.is_finite() && b.width.is_finite() && b.height.is_finite(),
                "non-finite bounding box {:?}", b
            );
            prop_assert!(
                command.z_index >= last_z,
                "z order went backwards: {} after {}",
                command.z_index, last_z
            );
            last_z = command.z_index;
            match command.config {
                RenderCommandConfig::ScissorStart(_) => scissor_depth += 1,
                RenderCommandConfig::ScissorEnd() => {
                    scissor_depth -= 1;
                    prop_assert!(scissor_depth >= 0, "scissor end without start");
                }
                _ => {}
            }
        }
        prop_assert_eq!(scissor_depth, 0, "unbalanced scissors at end of frame");
    }
}
