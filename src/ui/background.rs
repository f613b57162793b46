//! Lifecycle of the animated background
//!
//! [`SceneLifecycleManager::setup`] builds a scene, attaches its surface to
//! a mount target and starts a self-rescheduling frame loop. The returned
//! [`SceneHandle`] is the only way to resize or tear the scene down; frame
//! callbacks hold nothing but a weak reference to the scene state, so a
//! torn-down or dropped scene can never be ticked again.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::domain::core::Viewport;
use crate::domain::motion::{BodySpec, LightSpec, default_bodies, default_lights};
use crate::platform::mount::{MountError, MountTarget, SharedMount, SurfaceId, SurfaceSpec};
use crate::ui::frames::{FrameRequestId, FrameScheduler};
use crate::ui::renderer::{RendererError, SceneRenderer};
use crate::ui::resources::{ResourceKind, ResourceLedger};
use crate::ui::scene::{PerspectiveCamera, Scene};

/// Scene lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("Failed to attach background surface: {0}")]
    Mount(#[from] MountError),

    #[error("Renderer failure: {0}")]
    Renderer(#[from] RendererError),

    #[error("Body {name} can reach the camera's near plane")]
    BodyTooClose { name: &'static str },

    #[error("Scene is in the middle of a frame")]
    Busy,

    #[error("Scene has already been torn down")]
    Disposed,
}

/// Result of [`SceneHandle::teardown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// Resources were released by this call
    Released { resources: usize },
    /// Called from inside a frame; the scene is released when that frame ends
    Deferred,
    AlreadyDisposed,
}

/// Counters and flags readable while a frame is running
#[derive(Debug, Default)]
struct SceneStatus {
    teardown_requested: Cell<bool>,
    ticks: Cell<u64>,
    elapsed: Cell<Duration>,
}

struct SceneRuntime<M: MountTarget> {
    scene: Scene,
    renderer: SceneRenderer,
    ledger: ResourceLedger,
    mount: SharedMount<M>,
    surface: Option<SurfaceId>,
    scheduler: FrameScheduler,
    pending_frame: Option<FrameRequestId>,
    started_at: Duration,
    status: Rc<SceneStatus>,
    disposed: bool,
}

impl<M: MountTarget> SceneRuntime<M> {
    /// One animation frame; false once the scene is disposed
    fn tick(&mut self, timestamp: Duration) -> bool {
        self.pending_frame = None;
        if self.disposed {
            return false;
        }

        let elapsed = timestamp.saturating_sub(self.started_at);
        let ticks = self.status.ticks.get() + 1;
        self.status.elapsed.set(elapsed);
        self.status.ticks.set(ticks);
        self.scene.advance(elapsed.as_secs_f32());

        match self.renderer.render(&self.scene) {
            Ok(frame) => {
                if let Some(surface) = self.surface {
                    match self.mount.try_borrow_mut() {
                        Ok(mut mount) => {
                            if let Err(e) = mount.present(surface, frame) {
                                log::warn!("Failed to present background frame: {}", e);
                            }
                        }
                        Err(_) => log::warn!("Mount target busy, frame {} skipped", ticks),
                    }
                }
            }
            Err(e) => log::warn!("Failed to render background frame: {}", e),
        }

        // The mount may have asked for teardown while presenting.
        if self.status.teardown_requested.get() {
            self.dispose();
            return false;
        }
        true
    }

    fn dispose(&mut self) -> TeardownOutcome {
        if self.disposed {
            return TeardownOutcome::AlreadyDisposed;
        }
        self.disposed = true;
        self.status.teardown_requested.set(false);

        if let Some(request) = self.pending_frame.take() {
            self.scheduler.cancel_frame(request);
        }

        if let Some(surface) = self.surface.take() {
            match self.mount.try_borrow_mut() {
                Ok(mut mount) => {
                    if let Err(e) = mount.detach(surface) {
                        log::warn!("Failed to detach background surface: {}", e);
                    }
                }
                Err(_) => log::warn!("Mount target busy, surface {:?} left attached", surface),
            }
        }

        let mut resources = self.scene.dispose();
        if self.renderer.dispose() {
            resources += 1;
        }

        let leaked = self.ledger.live_count();
        if leaked > 0 {
            log::warn!(
                "{} resources leaked ({} geometries, {} materials, {} targets)",
                leaked,
                self.ledger.live_of(ResourceKind::Geometry),
                self.ledger.live_of(ResourceKind::Material),
                self.ledger.live_of(ResourceKind::RenderTarget)
            );
        }
        log::debug!(
            "Background torn down after {} ticks, {} of {} resources released",
            self.status.ticks.get(),
            self.ledger.released_count(),
            self.ledger.allocated_count()
        );
        TeardownOutcome::Released { resources }
    }
}

/// Requests the next frame for `runtime`
fn schedule_next<M: MountTarget + 'static>(runtime: &Rc<RefCell<SceneRuntime<M>>>) {
    let weak: Weak<RefCell<SceneRuntime<M>>> = Rc::downgrade(runtime);
    let scheduler = runtime.borrow().scheduler.clone();

    let request = scheduler.request_frame(move |timestamp| {
        let Some(runtime) = weak.upgrade() else {
            return;
        };
        let keep_running = runtime.borrow_mut().tick(timestamp);
        if keep_running {
            schedule_next(&runtime);
        }
    });
    runtime.borrow_mut().pending_frame = Some(request);
}

/// Builds and mounts background scenes
pub struct SceneLifecycleManager {
    scheduler: FrameScheduler,
    bodies: Vec<BodySpec>,
    lights: Vec<LightSpec>,
    antialias: bool,
}

impl SceneLifecycleManager {
    /// Manager for the default eight bodies and four lights
    pub fn new(scheduler: FrameScheduler) -> Self {
        Self::with_tables(scheduler, default_bodies(), default_lights())
    }

    /// Manager for custom tables; bodies are checked against the camera at setup
    pub fn with_tables(
        scheduler: FrameScheduler,
        bodies: Vec<BodySpec>,
        lights: Vec<LightSpec>,
    ) -> Self {
        Self {
            scheduler,
            bodies,
            lights,
            antialias: true,
        }
    }

    pub fn antialias(mut self, enabled: bool) -> Self {
        self.antialias = enabled;
        self
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Builds a scene on `mount` and starts its animation loop
    ///
    /// # Arguments
    /// * `mount` - Target that will host the background surface
    /// * `viewport` - Initial drawing size
    ///
    /// # Returns
    /// Handle owning the running scene. On error nothing stays allocated
    /// or attached.
    pub fn setup<M: MountTarget + 'static>(
        &self,
        mount: SharedMount<M>,
        viewport: Viewport,
    ) -> Result<SceneHandle<M>, SceneError> {
        if let Some(body) = self
            .bodies
            .iter()
            .find(|body| body.nearest_reach() >= PerspectiveCamera::NEAR_PLANE_Z)
        {
            return Err(SceneError::BodyTooClose { name: body.name });
        }

        let ledger = ResourceLedger::new();
        let mut scene = Scene::build(viewport, &self.bodies, &self.lights, &ledger);
        let renderer = match SceneRenderer::new(viewport, self.antialias, &ledger) {
            Ok(renderer) => renderer,
            Err(e) => {
                scene.dispose();
                return Err(e.into());
            }
        };

        let status = Rc::new(SceneStatus::default());
        let mut runtime = SceneRuntime {
            scene,
            renderer,
            ledger,
            mount: Rc::clone(&mount),
            surface: None,
            scheduler: self.scheduler.clone(),
            pending_frame: None,
            started_at: self.scheduler.now(),
            status: Rc::clone(&status),
            disposed: false,
        };

        let attached = match mount.try_borrow_mut() {
            Ok(mut target) => target.attach(SurfaceSpec::background(viewport)),
            Err(_) => Err(MountError::Busy),
        };
        match attached {
            Ok(surface) => runtime.surface = Some(surface),
            Err(e) => {
                runtime.dispose();
                return Err(e.into());
            }
        }

        let runtime = Rc::new(RefCell::new(runtime));
        schedule_next(&runtime);
        log::info!(
            "Background mounted at {}x{} with {} bodies",
            viewport.width,
            viewport.height,
            self.bodies.len()
        );

        Ok(SceneHandle { runtime, status })
    }

    /// Replaces the scene in `slot`, tearing the previous one down first
    pub fn remount<'a, M: MountTarget + 'static>(
        &self,
        slot: &'a mut Option<SceneHandle<M>>,
        mount: SharedMount<M>,
        viewport: Viewport,
    ) -> Result<&'a SceneHandle<M>, SceneError> {
        if let Some(previous) = slot.take() {
            previous.teardown();
        }
        Ok(slot.insert(self.setup(mount, viewport)?))
    }
}

/// Owner of one mounted scene
pub struct SceneHandle<M: MountTarget + 'static> {
    runtime: Rc<RefCell<SceneRuntime<M>>>,
    status: Rc<SceneStatus>,
}

impl<M: MountTarget + 'static> SceneHandle<M> {
    /// Adapts camera, renderer and surface to a new viewport
    ///
    /// A mount target that is busy or refuses the new size leaves the
    /// scene unchanged.
    pub fn resize(&self, viewport: Viewport) -> Result<(), SceneError> {
        let mut runtime = self.runtime.try_borrow_mut().map_err(|_| SceneError::Busy)?;
        if runtime.disposed {
            return Err(SceneError::Disposed);
        }

        if let Some(surface) = runtime.surface {
            runtime
                .mount
                .try_borrow_mut()
                .map_err(|_| MountError::Busy)?
                .resize(surface, viewport)?;
        }
        runtime.scene.resize(viewport);
        runtime.renderer.set_size(viewport)?;
        log::debug!("Background resized to {}x{}", viewport.width, viewport.height);
        Ok(())
    }

    /// Stops the loop, detaches the surface and releases every resource
    pub fn teardown(&self) -> TeardownOutcome {
        match self.runtime.try_borrow_mut() {
            Ok(mut runtime) => runtime.dispose(),
            Err(_) => {
                self.status.teardown_requested.set(true);
                log::debug!("Teardown requested during a frame, deferred to its end");
                TeardownOutcome::Deferred
            }
        }
    }

    /// Animation time at the last tick
    pub fn elapsed(&self) -> Duration {
        self.status.elapsed.get()
    }

    pub fn ticks(&self) -> u64 {
        self.status.ticks.get()
    }

    /// Writes the most recent frame to a PNG file
    pub fn save_frame(&self, path: &std::path::Path) -> Result<(), SceneError> {
        let runtime = self.runtime.try_borrow().map_err(|_| SceneError::Busy)?;
        if runtime.disposed {
            return Err(SceneError::Disposed);
        }
        runtime.renderer.save_png(path)?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq)]
struct BodySnapshot {
    name: &'static str,
    position: glam::Vec3,
    rotation: glam::Vec3,
}

#[cfg(test)]
impl<M: MountTarget + 'static> SceneHandle<M> {
    fn is_disposed(&self) -> bool {
        self.runtime.borrow().disposed
    }

    fn viewport(&self) -> Viewport {
        self.runtime.borrow().renderer.viewport()
    }

    fn camera_aspect(&self) -> f32 {
        self.runtime.borrow().scene.camera().aspect
    }

    fn surface(&self) -> Option<SurfaceId> {
        self.runtime.borrow().surface
    }

    fn has_pending_frame(&self) -> bool {
        self.runtime.borrow().pending_frame.is_some()
    }

    fn bodies(&self) -> Vec<BodySnapshot> {
        self.runtime
            .borrow()
            .scene
            .bodies()
            .iter()
            .map(|body| BodySnapshot {
                name: body.spec.name,
                position: body.position,
                rotation: body.rotation,
            })
            .collect()
    }

    fn ledger(&self) -> ResourceLedger {
        self.runtime.borrow().ledger.clone()
    }
}

impl<M: MountTarget + 'static> Drop for SceneHandle<M> {
    fn drop(&mut self) {
        if let TeardownOutcome::Released { resources } = self.teardown() {
            log::debug!("Scene handle dropped while mounted, released {} resources", resources);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mount::MemoryMount;
    use crate::ui::frames::ManualClock;
    use glam::Vec3;
    use tiny_skia::Pixmap;

    const FRAME: Duration = Duration::from_millis(16);

    fn fixture() -> (ManualClock, SceneLifecycleManager, SharedMount<MemoryMount>) {
        let clock = ManualClock::new();
        let manager = SceneLifecycleManager::new(FrameScheduler::new(clock.clone()));
        (clock, manager, MemoryMount::shared())
    }

    fn step(clock: &ManualClock, manager: &SceneLifecycleManager, frames: u32) {
        for _ in 0..frames {
            clock.advance(FRAME);
            manager.scheduler().run_frame();
        }
    }

    #[test]
    fn setup_attaches_click_through_surface_and_schedules_one_frame() {
        let (_, manager, mount) = fixture();
        let handle = manager.setup(mount.clone(), Viewport::new(320, 180)).unwrap();

        let mount_ref = mount.borrow();
        let surface = mount_ref.surface().unwrap();
        assert_eq!(Some(surface.id), handle.surface());
        assert_eq!(surface.spec, SurfaceSpec::background(Viewport::new(320, 180)));
        assert_eq!(manager.scheduler().pending_count(), 1);
        assert!(handle.has_pending_frame());
        assert!((handle.camera_aspect() - 320.0 / 180.0).abs() < 1e-6);
        // 8 geometries, 8 materials, 1 render target
        assert_eq!(handle.ledger().live_count(), 17);
    }

    #[test]
    fn each_frame_presents_once_and_requests_the_next() {
        let (clock, manager, mount) = fixture();
        let handle = manager.setup(mount.clone(), Viewport::new(64, 36)).unwrap();

        step(&clock, &manager, 3);

        assert_eq!(handle.ticks(), 3);
        assert_eq!(mount.borrow().surface().unwrap().frames_presented, 3);
        assert_eq!(manager.scheduler().pending_count(), 1);
        assert_eq!(handle.elapsed(), FRAME * 3);
    }

    #[test]
    fn bodies_move_within_their_amplitude_after_one_second() {
        let (clock, manager, mount) = fixture();
        let handle = manager.setup(mount, Viewport::new(64, 36)).unwrap();
        let specs = default_bodies();
        let initial = handle.bodies();

        clock.advance(Duration::from_secs(1));
        manager.scheduler().run_frame();

        let moved = handle.bodies();
        assert_eq!(handle.elapsed(), Duration::from_secs(1));
        assert!(
            initial
                .iter()
                .zip(&moved)
                .any(|(before, after)| (before.position - after.position).length() > 1e-3)
        );
        for (body, spec) in moved.iter().zip(&specs) {
            let offset = (body.position - spec.base_position).abs();
            let bound = spec.motion.amplitude() + Vec3::splat(1e-4);
            assert!(offset.cmple(bound).all(), "{} left its path", body.name);
        }
    }

    #[test]
    fn teardown_twice_releases_each_resource_once() {
        let (clock, manager, mount) = fixture();
        let handle = manager.setup(mount.clone(), Viewport::new(64, 36)).unwrap();
        step(&clock, &manager, 2);

        assert_eq!(handle.teardown(), TeardownOutcome::Released { resources: 17 });
        assert_eq!(handle.teardown(), TeardownOutcome::AlreadyDisposed);

        let ledger = handle.ledger();
        assert_eq!(ledger.live_count(), 0);
        assert_eq!(ledger.released_count(), ledger.allocated_count());
        assert!(mount.borrow().is_empty());
        assert_eq!(manager.scheduler().pending_count(), 0);
    }

    #[test]
    fn no_ticks_after_teardown() {
        let (clock, manager, mount) = fixture();
        let handle = manager.setup(mount, Viewport::new(64, 36)).unwrap();
        step(&clock, &manager, 2);
        let frozen = handle.bodies();
        let ticks = handle.ticks();

        handle.teardown();
        step(&clock, &manager, 5);

        assert_eq!(handle.bodies(), frozen);
        assert_eq!(handle.ticks(), ticks);
        assert_eq!(manager.scheduler().pending_count(), 0);
    }

    #[test]
    fn dropping_handle_tears_down() {
        let (clock, manager, mount) = fixture();
        let handle = manager.setup(mount.clone(), Viewport::new(64, 36)).unwrap();
        let ledger = handle.ledger();
        step(&clock, &manager, 1);

        drop(handle);

        assert_eq!(ledger.live_count(), 0);
        assert!(mount.borrow().is_empty());
        assert_eq!(manager.scheduler().run_frame(), 0);
    }

    #[test]
    fn resize_keeps_animation_state() {
        let (clock, manager, mount) = fixture();
        let handle = manager.setup(mount.clone(), Viewport::new(640, 360)).unwrap();
        step(&clock, &manager, 10);
        let bodies = handle.bodies();
        let elapsed = handle.elapsed();

        handle.resize(Viewport::new(300, 600)).unwrap();

        assert_eq!(handle.bodies(), bodies);
        assert_eq!(handle.elapsed(), elapsed);
        assert!((handle.camera_aspect() - 0.5).abs() < 1e-6);
        assert_eq!(handle.viewport(), Viewport::new(300, 600));
        assert_eq!(
            mount.borrow().surface().unwrap().spec.viewport,
            Viewport::new(300, 600)
        );

        step(&clock, &manager, 1);
        let presented = mount.borrow();
        let frame = presented.surface().unwrap().last_frame.as_ref().unwrap();
        assert_eq!((frame.width(), frame.height()), (300, 600));
    }

    #[test]
    fn resize_after_teardown_is_rejected() {
        let (_, manager, mount) = fixture();
        let handle = manager.setup(mount, Viewport::new(64, 36)).unwrap();
        handle.teardown();

        assert!(matches!(
            handle.resize(Viewport::new(10, 10)),
            Err(SceneError::Disposed)
        ));
    }

    #[test]
    fn occupied_mount_fails_setup_without_leaks() {
        let (_, manager, mount) = fixture();
        let first = manager.setup(mount.clone(), Viewport::new(64, 36)).unwrap();

        let second = manager.setup(mount.clone(), Viewport::new(64, 36));

        assert!(matches!(second, Err(SceneError::Mount(MountError::Occupied(_)))));
        // Only the first scene's frame is queued.
        assert_eq!(manager.scheduler().pending_count(), 1);
        assert_eq!(first.ledger().live_count(), 17);
    }

    #[test]
    fn setup_while_host_borrows_mount_fails_without_leaks() {
        let (_, manager, mount) = fixture();
        let held = mount.borrow();

        let result = manager.setup(mount.clone(), Viewport::new(64, 36));

        assert!(matches!(result, Err(SceneError::Mount(MountError::Busy))));
        assert!(held.is_empty());
        drop(held);
        drop(result);
        assert_eq!(manager.scheduler().pending_count(), 0);
        assert_eq!(Rc::strong_count(&mount), 1);
    }

    #[test]
    fn resize_while_host_borrows_mount_leaves_scene_unchanged() {
        let (clock, manager, mount) = fixture();
        let handle = manager.setup(mount.clone(), Viewport::new(64, 36)).unwrap();

        {
            let _held = mount.borrow();
            assert!(matches!(
                handle.resize(Viewport::new(32, 32)),
                Err(SceneError::Mount(MountError::Busy))
            ));
        }

        assert_eq!(handle.viewport(), Viewport::new(64, 36));
        assert!((handle.camera_aspect() - 64.0 / 36.0).abs() < 1e-6);
        step(&clock, &manager, 1);
        assert_eq!(mount.borrow().surface().unwrap().frames_presented, 1);
    }

    #[test]
    fn frame_is_skipped_while_host_borrows_mount() {
        let (clock, manager, mount) = fixture();
        let handle = manager.setup(mount.clone(), Viewport::new(64, 36)).unwrap();

        {
            let _held = mount.borrow();
            step(&clock, &manager, 1);
        }
        step(&clock, &manager, 1);

        assert_eq!(handle.ticks(), 2);
        assert_eq!(mount.borrow().surface().unwrap().frames_presented, 1);
        assert_eq!(manager.scheduler().pending_count(), 1);
    }

    type HandleSlot = Rc<RefCell<Option<SceneHandle<TearingMount>>>>;

    /// Mount whose host tears the scene down from inside `present`
    struct TearingMount {
        inner: MemoryMount,
        slot: HandleSlot,
        outcome: Rc<Cell<Option<TeardownOutcome>>>,
    }

    impl MountTarget for TearingMount {
        fn attach(&mut self, spec: SurfaceSpec) -> Result<SurfaceId, MountError> {
            self.inner.attach(spec)
        }

        fn resize(&mut self, surface: SurfaceId, viewport: Viewport) -> Result<(), MountError> {
            self.inner.resize(surface, viewport)
        }

        fn present(&mut self, surface: SurfaceId, frame: &Pixmap) -> Result<(), MountError> {
            self.inner.present(surface, frame)?;
            if let Some(handle) = self.slot.borrow().as_ref() {
                self.outcome.set(Some(handle.teardown()));
            }
            Ok(())
        }

        fn detach(&mut self, surface: SurfaceId) -> Result<(), MountError> {
            self.inner.detach(surface)
        }
    }

    #[test]
    fn teardown_during_a_frame_completes_when_the_frame_ends() {
        let (clock, manager, _) = fixture();
        let slot: HandleSlot = Rc::default();
        let outcome = Rc::new(Cell::new(None));
        let mount = Rc::new(RefCell::new(TearingMount {
            inner: MemoryMount::new(),
            slot: Rc::clone(&slot),
            outcome: Rc::clone(&outcome),
        }));

        let handle = manager.setup(mount.clone(), Viewport::new(32, 18)).unwrap();
        let ledger = handle.ledger();
        *slot.borrow_mut() = Some(handle);

        step(&clock, &manager, 1);

        assert_eq!(outcome.get(), Some(TeardownOutcome::Deferred));
        assert_eq!(ledger.live_count(), 0);
        assert!(mount.borrow().inner.is_empty());
        assert_eq!(manager.scheduler().pending_count(), 0);

        let handle = slot.borrow_mut().take().unwrap();
        assert!(handle.is_disposed());
        assert_eq!(handle.ticks(), 1);
        assert_eq!(handle.teardown(), TeardownOutcome::AlreadyDisposed);
    }

    #[test]
    fn body_reaching_the_near_plane_is_rejected() {
        let mut bodies = default_bodies();
        bodies[0].base_position.z = 14.0;
        let manager = SceneLifecycleManager::with_tables(
            FrameScheduler::new(ManualClock::new()),
            bodies,
            default_lights(),
        );
        let mount = MemoryMount::shared();

        let result = manager.setup(mount.clone(), Viewport::new(64, 36));

        assert!(matches!(
            result,
            Err(SceneError::BodyTooClose { name: "torus-knot" })
        ));
        assert!(mount.borrow().is_empty());
        assert_eq!(manager.scheduler().pending_count(), 0);
    }

    #[test]
    fn remount_replaces_previous_scene() {
        let (clock, manager, mount) = fixture();
        let mut slot = None;

        manager
            .remount(&mut slot, mount.clone(), Viewport::new(64, 36))
            .unwrap();
        let first = slot.as_ref().unwrap();
        let first_surface = first.surface();
        let first_ledger = first.ledger();
        step(&clock, &manager, 1);

        manager
            .remount(&mut slot, mount.clone(), Viewport::new(64, 36))
            .unwrap();

        let current = slot.as_ref().unwrap();
        assert_ne!(current.surface(), first_surface);
        assert_eq!(
            mount.borrow().surface().map(|surface| surface.id),
            current.surface()
        );
        assert_eq!(first_ledger.live_count(), 0);
        assert_eq!(manager.scheduler().pending_count(), 1);
        assert_eq!(current.ticks(), 0);
    }
}
