//! Mount targets for the background surface
//!
//! A mount target hosts at most one drawing surface. The surface sits
//! behind the page content and never receives pointer input. Frames are
//! pushed to it as finished tiny-skia pixmaps.

use std::cell::RefCell;
use std::rc::Rc;

use tiny_skia::Pixmap;

use crate::domain::core::Viewport;

/// Requested properties of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub viewport: Viewport,
    /// Stacking order; content above this layer is drawn over the surface
    pub layer: i32,
    /// Pointer input passes through to whatever lies underneath
    pub click_through: bool,
}

impl SurfaceSpec {
    pub const BACKGROUND_LAYER: i32 = 1;

    /// Full-viewport, click-through background surface
    pub fn background(viewport: Viewport) -> Self {
        Self {
            viewport,
            layer: Self::BACKGROUND_LAYER,
            click_through: true,
        }
    }
}

/// Identifier of an attached surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Mount target errors
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("Mount target already hosts surface {0:?}")]
    Occupied(SurfaceId),

    #[error("Surface {0:?} is not attached to this mount target")]
    UnknownSurface(SurfaceId),

    #[error("Frame of {frame_width}x{frame_height} does not fit surface of {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("Mount target is in use by its host")]
    Busy,

    #[cfg(windows)]
    #[error("Platform surface error: {0}")]
    Platform(String),
}

/// A place the background can be attached to
pub trait MountTarget {
    /// Creates the single surface of this target
    fn attach(&mut self, spec: SurfaceSpec) -> Result<SurfaceId, MountError>;

    fn resize(&mut self, surface: SurfaceId, viewport: Viewport) -> Result<(), MountError>;

    /// Shows `frame` on the surface
    fn present(&mut self, surface: SurfaceId, frame: &Pixmap) -> Result<(), MountError>;

    /// Removes the surface; the target can be attached to again afterwards
    fn detach(&mut self, surface: SurfaceId) -> Result<(), MountError>;
}

/// Mount target shared between the host and a running scene
pub type SharedMount<M> = Rc<RefCell<M>>;

/// Surface currently held by a [`MemoryMount`]
#[derive(Debug)]
pub struct AttachedSurface {
    pub id: SurfaceId,
    pub spec: SurfaceSpec,
    pub last_frame: Option<Pixmap>,
    pub frames_presented: u64,
}

/// Headless mount target keeping the last presented frame in memory
#[derive(Debug, Default)]
pub struct MemoryMount {
    next_id: u64,
    surface: Option<AttachedSurface>,
}

impl MemoryMount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedMount<Self> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn surface(&self) -> Option<&AttachedSurface> {
        self.surface.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.surface.is_none()
    }

    fn attached_mut(&mut self, id: SurfaceId) -> Result<&mut AttachedSurface, MountError> {
        self.surface
            .as_mut()
            .filter(|surface| surface.id == id)
            .ok_or(MountError::UnknownSurface(id))
    }
}

impl MountTarget for MemoryMount {
    fn attach(&mut self, spec: SurfaceSpec) -> Result<SurfaceId, MountError> {
        if let Some(existing) = &self.surface {
            return Err(MountError::Occupied(existing.id));
        }
        self.next_id += 1;
        let id = SurfaceId(self.next_id);
        log::debug!(
            "Surface {:?} attached at layer {} (click-through: {})",
            id,
            spec.layer,
            spec.click_through
        );
        self.surface = Some(AttachedSurface {
            id,
            spec,
            last_frame: None,
            frames_presented: 0,
        });
        Ok(id)
    }

    fn resize(&mut self, surface: SurfaceId, viewport: Viewport) -> Result<(), MountError> {
        self.attached_mut(surface)?.spec.viewport = viewport;
        Ok(())
    }

    fn present(&mut self, surface: SurfaceId, frame: &Pixmap) -> Result<(), MountError> {
        let attached = self.attached_mut(surface)?;
        let viewport = attached.spec.viewport;
        if (frame.width(), frame.height()) != (viewport.width, viewport.height) {
            return Err(MountError::SizeMismatch {
                width: viewport.width,
                height: viewport.height,
                frame_width: frame.width(),
                frame_height: frame.height(),
            });
        }
        attached.last_frame = Some(frame.clone());
        attached.frames_presented += 1;
        Ok(())
    }

    fn detach(&mut self, surface: SurfaceId) -> Result<(), MountError> {
        self.attached_mut(surface)?;
        self.surface = None;
        Ok(())
    }
}
