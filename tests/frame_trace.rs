//! Drives whole frames of the demo sequences through the recording backend.

use glassworks::compositor::{
    Compositor, Destination, Extent, FrameInputs, MaterialKind, PassSequence, PassStep,
    Placeholder, RecordingBackend, TargetDesc, TargetPool, TextureSlot, TextureSource, TraceEvent,
};
use glassworks::{Camera, Demo, DemoSetup, Error, SubjectPose, UniformSet, UniformValue, param};

struct Harness {
    compositor: Compositor<RecordingBackend>,
    uniforms: UniformSet,
    camera: Camera,
    pose: SubjectPose,
    setup_size: glam::Vec3,
}

impl Harness {
    fn new(demo: Demo) -> Self {
        Self::with_backend(demo, RecordingBackend::new())
    }

    fn with_backend(demo: Demo, backend: RecordingBackend) -> Self {
        let DemoSetup {
            pool,
            sequence,
            uniforms,
            subject_size,
            ..
        } = demo.setup(1).unwrap();
        Self {
            compositor: Compositor::new(backend, pool, sequence),
            uniforms,
            camera: Camera::default(),
            pose: SubjectPose::new(),
            setup_size: subject_size,
        }
    }

    fn frame(&mut self, time: f32) -> glassworks::Result<()> {
        let inputs = FrameInputs::new(time, &self.camera, &self.uniforms)
            .subject(self.pose.transform(), self.setup_size);
        self.compositor.run_frame(&inputs)
    }

    fn events(&self) -> &[TraceEvent] {
        self.compositor.backend().events()
    }

    /// `(label, destination)` of every pass begun, in submission order.
    fn passes(&self) -> Vec<(String, Destination)> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                TraceEvent::BeginPass {
                    label, destination, ..
                } => Some((label.clone(), *destination)),
                _ => None,
            })
            .collect()
    }

    /// Bindings made inside the pass labelled `label`.
    fn binds_in(&self, label: &str) -> Vec<(TextureSlot, TextureSource)> {
        let mut inside = false;
        let mut binds = Vec::new();
        for event in self.events() {
            match event {
                TraceEvent::BeginPass { label: l, .. } => inside = l == label,
                TraceEvent::Bind { slot, source } if inside => binds.push((*slot, *source)),
                _ => {}
            }
        }
        binds
    }
}

#[test]
fn ice_prism_frame_at_800x600() {
    let mut harness = Harness::new(Demo::IcePrism);
    harness.compositor.resize(800, 600).unwrap();
    harness.frame(0.0).unwrap();

    let passes = harness.passes();
    let labels: Vec<_> = passes.iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(
        labels,
        ["background", "world-position", "back-refraction", "front-refraction"]
    );
    assert!(passes[..3]
        .iter()
        .all(|(_, d)| matches!(d, Destination::Target(_))));
    assert_eq!(passes[3].1, Destination::Screen);

    let scene = harness.compositor.pool().ids().next().unwrap();
    assert_eq!(passes[0].1, Destination::Target(scene));
    assert!(
        harness
            .binds_in("back-refraction")
            .contains(&(TextureSlot::Scene, TextureSource::Target(scene)))
    );

    for id in harness.compositor.pool().ids() {
        assert_eq!(
            harness.compositor.backend().target_extent(id),
            Some(Extent::new(800, 600))
        );
    }
    assert!(matches!(
        harness.events().last(),
        Some(TraceEvent::Submit { frame: 0, passes: 4 })
    ));
}

#[test]
fn every_sampled_target_is_drawn_earlier_in_the_frame() {
    for demo in [Demo::IcePrism, Demo::IceCube] {
        let mut harness = Harness::new(demo);
        harness.compositor.resize(320, 200).unwrap();
        harness.frame(0.0).unwrap();

        let mut drawn = Vec::new();
        let mut current = None;
        for event in harness.events() {
            match event {
                TraceEvent::BeginPass { destination, .. } => current = Some(*destination),
                TraceEvent::Bind {
                    source: TextureSource::Target(id),
                    ..
                } => assert!(drawn.contains(id), "{demo:?} samples #{} early", id.index()),
                TraceEvent::EndPass => {
                    if let Some(Destination::Target(id)) = current.take() {
                        drawn.push(id);
                    }
                }
                _ => {}
            }
        }
    }
}

#[test]
fn unchanged_inputs_submit_identical_frames() {
    let mut harness = Harness::new(Demo::IceCube);
    harness.compositor.resize(640, 480).unwrap();
    harness.frame(2.5).unwrap();
    harness.frame(2.5).unwrap();

    let plans = harness.compositor.backend().plans();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0], plans[1]);
}

#[test]
fn first_frame_after_construction_reads_no_unwritten_target() {
    let mut harness = Harness::new(Demo::IcePrism);
    harness.compositor.resize(100, 100).unwrap();
    harness.frame(0.0).unwrap();

    assert_eq!(
        harness.binds_in("back-refraction")[1],
        (
            TextureSlot::BackPositions,
            TextureSource::Placeholder(Placeholder::FarPositions)
        )
    );
    assert_eq!(harness.compositor.frame_count(), 1);
}

#[test]
fn frame_before_resize_is_rejected() {
    let mut harness = Harness::new(Demo::IcePrism);
    assert!(matches!(harness.frame(0.0), Err(Error::NotSized)));
    assert_eq!(harness.compositor.frame_count(), 0);
}

#[test]
fn uniform_changes_reach_the_next_frame_verbatim() {
    let mut harness = Harness::new(Demo::IcePrism);
    harness.compositor.resize(200, 100).unwrap();

    harness
        .uniforms
        .set(param::SHININESS, UniformValue::Float(123.25))
        .unwrap();
    assert_eq!(harness.uniforms.float(param::SHININESS).unwrap(), 123.25);
    harness.frame(0.0).unwrap();

    let plan = harness.compositor.backend().plans().last().unwrap().clone();
    for pass in &plan.passes {
        for layer in &pass.layers {
            assert_eq!(layer.uniforms.shininess, 123.25);
        }
    }
    // Per-pass `dir` overrides leave the shared value alone.
    assert_eq!(harness.uniforms.float(param::DIR).unwrap(), 1.0);
}

#[test]
fn backend_failure_stops_the_frame() {
    let mut harness = Harness::with_backend(
        Demo::IcePrism,
        RecordingBackend::new().fail_on_pass("back-refraction"),
    );
    harness.compositor.resize(800, 600).unwrap();

    let err = harness.frame(0.0).unwrap_err();
    assert!(matches!(err, Error::Device(msg) if msg.contains("back-refraction")));
    assert_eq!(harness.compositor.frame_count(), 0);
    assert!(
        !harness
            .events()
            .iter()
            .any(|e| matches!(e, TraceEvent::BeginPass { label, .. } if label == "front-refraction"))
    );
}

#[test]
fn resize_applies_the_pixel_ratio() {
    let mut harness = Harness::new(Demo::IceCube);
    harness.compositor.set_pixel_ratio(2.0).unwrap();
    assert_eq!(
        harness.compositor.resize(800, 600).unwrap(),
        Some(Extent::new(1600, 1200))
    );
    for id in harness.compositor.pool().ids() {
        assert_eq!(
            harness.compositor.pool().size(id),
            Some(Extent::new(1600, 1200))
        );
    }

    assert_eq!(
        harness.compositor.set_pixel_ratio(1.5).unwrap(),
        Some(Extent::new(1200, 900))
    );
    assert_eq!(
        harness.compositor.backend().surface_extent(),
        Some(Extent::new(1200, 900))
    );
    harness.frame(0.0).unwrap();
}

#[test]
fn minimized_viewport_keeps_previous_targets() {
    let mut harness = Harness::new(Demo::IceCube);
    harness.compositor.resize(800, 600).unwrap();
    assert_eq!(harness.compositor.resize(0, 600).unwrap(), None);
    assert_eq!(harness.compositor.pool().extent(), Some(Extent::new(800, 600)));
    harness.frame(0.0).unwrap();
}

#[test]
fn custom_sequences_are_validated_before_they_run() {
    let mut pool = TargetPool::new(1.0);
    let scene = pool.add(TargetDesc::color("scene"));
    let refraction = pool.add(TargetDesc::color("refraction"));

    let err = PassSequence::builder()
        .step(
            PassStep::to_target("refract", refraction).layer(
                glassworks::compositor::Layer::new(
                    MaterialKind::Glass,
                    glassworks::compositor::Face::Back,
                )
                .sample(TextureSlot::Scene, TextureSource::Target(scene)),
            ),
        )
        .step(PassStep::to_target("background", scene).with_background())
        .step(PassStep::to_screen("final").with_background())
        .build(&pool)
        .unwrap_err();
    assert!(matches!(err, Error::PassOrder { pass, target } if pass == "refract" && target == "scene"));
}

#[test]
fn allocation_failure_is_reported_and_blocks_frames() {
    let mut harness = Harness::with_backend(
        Demo::IcePrism,
        RecordingBackend::new().fail_on_allocate("positions"),
    );

    let err = harness.compositor.resize(800, 600).unwrap_err();
    assert!(matches!(
        err,
        Error::TargetAllocation { label, width: 800, height: 600, .. } if label == "positions"
    ));
    assert_eq!(harness.compositor.pool().extent(), None);

    assert!(matches!(harness.frame(0.0), Err(Error::NotSized)));
    assert!(
        !harness
            .events()
            .iter()
            .any(|e| matches!(e, TraceEvent::BeginPass { .. } | TraceEvent::Submit { .. }))
    );
}

#[test]
fn failed_resize_does_not_draw_with_mixed_target_sizes() {
    let mut harness = Harness::new(Demo::IcePrism);
    harness.compositor.resize(800, 600).unwrap();
    harness.frame(0.0).unwrap();

    harness
        .compositor
        .backend_mut()
        .set_fail_on_allocate(Some("positions".to_string()));
    assert!(matches!(
        harness.compositor.resize(1024, 768),
        Err(Error::TargetAllocation { .. })
    ));

    // The scene target was already reallocated at the new size when the
    // positions target failed.
    let scene = harness.compositor.pool().ids().next().unwrap();
    assert_eq!(
        harness.compositor.backend().target_extent(scene),
        Some(Extent::new(1024, 768))
    );
    harness.compositor.backend_mut().clear_events();
    assert!(matches!(harness.frame(0.0), Err(Error::NotSized)));
    assert!(harness.events().is_empty());
    assert_eq!(harness.compositor.frame_count(), 1);

    harness.compositor.backend_mut().set_fail_on_allocate(None);
    harness.compositor.resize(1024, 768).unwrap();
    harness.frame(0.0).unwrap();
    assert_eq!(harness.compositor.frame_count(), 2);
}

#[test]
fn physical_resize_matches_the_window_exactly() {
    let mut harness = Harness::new(Demo::IceCube);
    assert_eq!(
        harness.compositor.resize_physical(1001, 751, 1.25).unwrap(),
        Some(Extent::new(1001, 751))
    );
    assert_eq!(
        harness.compositor.backend().surface_extent(),
        Some(Extent::new(1001, 751))
    );
    harness.frame(0.0).unwrap();
    let plan = harness.compositor.backend().plans().last().unwrap();
    assert!(plan.passes.iter().all(|p| p.extent == Extent::new(1001, 751)));
}
