//! The observer / instance / light matrix scope stack.
//!
//! A [`Matrices`] root hands out scope handles through closures:
//!
//! - [`Matrices::with_observer`] opens a camera scope. Only one may be open
//!   per root.
//! - Inside it, [`MatricesObserver::with_transform`],
//!   [`MatricesObserver::with_projective_light`] and
//!   [`MatricesObserver::with_volume_light`] open child scopes. At most one
//!   child scope is open at a time; they may be opened one after another.
//!
//! Each scope is released when its closure returns, whether it returns
//! `Ok`, `Err`, or unwinds. Handles are only lent to the closure, so they
//! cannot be used after their scope has closed:
//!
//! ```compile_fail
//! use glam::Mat4;
//! use r2_core::{Matrices, ProjectionFov, R2Error};
//!
//! let matrices = Matrices::new();
//! let projection = ProjectionFov::new(1.0, 1.0, 0.1, 10.0);
//! let mut leaked = None;
//! matrices
//!     .with_observer(Mat4::IDENTITY, &projection, (), |observer, ()| {
//!         leaked = Some(observer);
//!         Ok::<(), R2Error>(())
//!     })
//!     .unwrap();
//! let _ = leaked.unwrap().matrix_view();
//! ```

use std::cell::{Cell, OnceCell, Ref, RefCell};

use glam::{Mat3, Mat4};

use crate::{
    Projection, ProjectiveLight, R2Error, Transform, TransformContext, ViewRays, VolumeLight,
};

/// The kind of child scope currently open under an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ChildScope {
    #[default]
    None,
    Instance,
    Projective,
    Volume,
}

impl ChildScope {
    fn already_active(self) -> Option<R2Error> {
        match self {
            Self::None => None,
            Self::Instance => Some(R2Error::InstanceAlreadyActive),
            Self::Projective => Some(R2Error::ProjectiveAlreadyActive),
            Self::Volume => Some(R2Error::VolumeLightAlreadyActive),
        }
    }
}

/// Sets a cell on entry and restores it on drop, including during unwinding.
struct ScopeGuard<'a, T: Copy> {
    cell: &'a Cell<T>,
    restore: T,
}

impl<'a, T: Copy> ScopeGuard<'a, T> {
    fn enter(cell: &'a Cell<T>, value: T, restore: T) -> Self {
        cell.set(value);
        Self { cell, restore }
    }
}

impl<T: Copy> Drop for ScopeGuard<'_, T> {
    fn drop(&mut self) {
        self.cell.set(self.restore);
    }
}

#[derive(Debug, Default)]
struct ObserverMatrices {
    view: Mat4,
    view_inverse: Mat4,
    projection: Mat4,
    projection_inverse: Mat4,
    view_rays: OnceCell<ViewRays>,
}

#[derive(Debug, Default)]
struct InstanceMatrices {
    model: Mat4,
    model_view: Mat4,
    normal: Mat3,
    uv: Mat3,
}

#[derive(Debug, Default)]
struct ProjectiveMatrices {
    light_id: u64,
    model: Mat4,
    model_view: Mat4,
    projective_view: Mat4,
    projective_projection: Mat4,
    eye_to_light_eye: Mat4,
}

#[derive(Debug, Default)]
struct VolumeMatrices {
    light_id: u64,
    model: Mat4,
    model_view: Mat4,
}

/// The root of a matrix scope stack.
///
/// Independent roots share nothing, so a renderer that needs two cameras
/// at once uses two roots.
#[derive(Debug, Default)]
pub struct Matrices {
    observer_active: Cell<bool>,
    child: Cell<ChildScope>,
    observer: RefCell<ObserverMatrices>,
    instance: RefCell<InstanceMatrices>,
    projective: RefCell<ProjectiveMatrices>,
    volume: RefCell<VolumeMatrices>,
    context: RefCell<TransformContext>,
}

impl Matrices {
    /// Creates a new, idle root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while an observer scope is open on this root.
    #[must_use]
    pub fn is_observer_active(&self) -> bool {
        self.observer_active.get()
    }

    /// Opens an observer scope for the given view matrix and projection and
    /// runs `body` inside it.
    ///
    /// Fails with [`R2Error::ObserverAlreadyActive`] if this root already
    /// has an open observer scope.
    ///
    /// ```
    /// use glam::{Mat4, Vec3};
    /// use r2_core::{Matrices, Projection, ProjectionFov, R2Error};
    ///
    /// let matrices = Matrices::new();
    /// let projection = ProjectionFov::new(1.5, 1.0, 0.1, 100.0);
    /// let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
    ///
    /// let near = matrices.with_observer(view, &projection, (), |observer, ()| {
    ///     Ok::<_, R2Error>(observer.projection().z_near())
    /// })?;
    /// assert_eq!(near, 0.1);
    /// # Ok::<(), R2Error>(())
    /// ```
    pub fn with_observer<A, B, E, F>(
        &self,
        view: Mat4,
        projection: &dyn Projection,
        context: A,
        body: F,
    ) -> Result<B, E>
    where
        F: FnOnce(&MatricesObserver<'_>, A) -> Result<B, E>,
        E: From<R2Error>,
    {
        if self.observer_active.get() {
            return Err(R2Error::ObserverAlreadyActive.into());
        }

        let _active = ScopeGuard::enter(&self.observer_active, true, false);
        {
            let mut state = self.observer.borrow_mut();
            state.view = view;
            state.view_inverse = view.inverse();
            state.projection = projection.make_matrix();
            state.projection_inverse = state.projection.inverse();
            state.view_rays = OnceCell::new();
        }

        let observer = MatricesObserver {
            root: self,
            state: self.observer.borrow(),
            projection,
        };
        body(&observer, context)
    }

    fn enter_child(&self, scope: ChildScope) -> Result<ScopeGuard<'_, ChildScope>, R2Error> {
        if let Some(error) = self.child.get().already_active() {
            return Err(error);
        }
        Ok(ScopeGuard::enter(&self.child, scope, ChildScope::None))
    }
}

/// An open observer (camera) scope.
#[derive(Debug)]
pub struct MatricesObserver<'a> {
    root: &'a Matrices,
    state: Ref<'a, ObserverMatrices>,
    projection: &'a dyn Projection,
}

impl MatricesObserver<'_> {
    /// The world-to-eye matrix.
    #[must_use]
    pub fn matrix_view(&self) -> Mat4 {
        self.state.view
    }

    /// The eye-to-world matrix.
    #[must_use]
    pub fn matrix_view_inverse(&self) -> Mat4 {
        self.state.view_inverse
    }

    /// The eye-to-clip matrix.
    #[must_use]
    pub fn matrix_projection(&self) -> Mat4 {
        self.state.projection
    }

    /// The clip-to-eye matrix.
    #[must_use]
    pub fn matrix_projection_inverse(&self) -> Mat4 {
        self.state.projection_inverse
    }

    /// The projection this observer was opened with.
    #[must_use]
    pub fn projection(&self) -> &dyn Projection {
        self.projection
    }

    /// The observer's view rays, computed on first use.
    #[must_use]
    pub fn view_rays(&self) -> &ViewRays {
        self.state
            .view_rays
            .get_or_init(|| ViewRays::from_projection_inverse(&self.state.projection_inverse))
    }

    /// Opens an instance scope for `transform` and runs `body` inside it.
    ///
    /// Fails if any other child scope is open on this observer.
    pub fn with_transform<A, B, E, F>(
        &self,
        transform: &dyn Transform,
        uv: Mat3,
        context: A,
        body: F,
    ) -> Result<B, E>
    where
        F: FnOnce(&MatricesInstance<'_>, A) -> Result<B, E>,
        E: From<R2Error>,
    {
        let root = self.root;
        let _child = root.enter_child(ChildScope::Instance)?;
        {
            let mut ctx = root.context.borrow_mut();
            let mut guard = root.instance.borrow_mut();
            let instance = &mut *guard;
            transform.make_matrix(&mut ctx, &mut instance.model);
            ctx.multiply(&self.state.view, &instance.model, &mut instance.model_view);
            ctx.make_normal_matrix(&instance.model_view, &mut instance.normal);
            instance.uv = uv;
        }

        let instance = MatricesInstance {
            observer: self,
            state: root.instance.borrow(),
        };
        body(&instance, context)
    }

    /// Opens a projective light scope for `light` and runs `body` inside it.
    ///
    /// Fails if any other child scope is open on this observer.
    pub fn with_projective_light<A, B, E, F>(
        &self,
        light: &dyn ProjectiveLight,
        context: A,
        body: F,
    ) -> Result<B, E>
    where
        F: FnOnce(&MatricesProjectiveLight<'_>, A) -> Result<B, E>,
        E: From<R2Error>,
    {
        let root = self.root;
        let _child = root.enter_child(ChildScope::Projective)?;
        {
            let mut ctx = root.context.borrow_mut();
            let mut guard = root.projective.borrow_mut();
            let projective = &mut *guard;
            let transform = light.transform();

            projective.light_id = light.light_id();
            transform.make_matrix(&mut ctx, &mut projective.model);
            ctx.multiply(&self.state.view, &projective.model, &mut projective.model_view);

            transform.make_view_matrix(&mut ctx, &mut projective.projective_view);
            projective.projective_projection = light.projection().make_matrix();

            ctx.multiply(
                &projective.projective_view,
                &self.state.view_inverse,
                &mut projective.eye_to_light_eye,
            );
        }

        let projective = MatricesProjectiveLight {
            observer: self,
            state: root.projective.borrow(),
        };
        body(&projective, context)
    }

    /// Opens a volume light scope for `light` and runs `body` inside it.
    ///
    /// Fails if any other child scope is open on this observer.
    pub fn with_volume_light<A, B, E, F>(
        &self,
        light: &dyn VolumeLight,
        context: A,
        body: F,
    ) -> Result<B, E>
    where
        F: FnOnce(&MatricesVolumeLight<'_>, A) -> Result<B, E>,
        E: From<R2Error>,
    {
        let root = self.root;
        let _child = root.enter_child(ChildScope::Volume)?;
        {
            let mut ctx = root.context.borrow_mut();
            let mut guard = root.volume.borrow_mut();
            let volume = &mut *guard;
            volume.light_id = light.light_id();
            light.transform().make_matrix(&mut ctx, &mut volume.model);
            ctx.multiply(&self.state.view, &volume.model, &mut volume.model_view);
        }

        let volume = MatricesVolumeLight {
            observer: self,
            state: root.volume.borrow(),
        };
        body(&volume, context)
    }
}

/// An open instance scope.
#[derive(Debug)]
pub struct MatricesInstance<'a> {
    observer: &'a MatricesObserver<'a>,
    state: Ref<'a, InstanceMatrices>,
}

impl<'a> MatricesInstance<'a> {
    /// The enclosing observer.
    #[must_use]
    pub fn observer(&self) -> &MatricesObserver<'a> {
        self.observer
    }

    /// The object-to-world matrix.
    #[must_use]
    pub fn matrix_model(&self) -> Mat4 {
        self.state.model
    }

    /// The object-to-eye matrix.
    #[must_use]
    pub fn matrix_model_view(&self) -> Mat4 {
        self.state.model_view
    }

    /// The matrix taking object-space normals to eye space.
    #[must_use]
    pub fn matrix_normal(&self) -> Mat3 {
        self.state.normal
    }

    /// The texture coordinate matrix.
    #[must_use]
    pub fn matrix_uv(&self) -> Mat3 {
        self.state.uv
    }
}

/// An open projective light scope.
#[derive(Debug)]
pub struct MatricesProjectiveLight<'a> {
    observer: &'a MatricesObserver<'a>,
    state: Ref<'a, ProjectiveMatrices>,
}

impl<'a> MatricesProjectiveLight<'a> {
    /// The enclosing observer.
    #[must_use]
    pub fn observer(&self) -> &MatricesObserver<'a> {
        self.observer
    }

    /// The identifier of the light this scope was opened for.
    #[must_use]
    pub fn light_id(&self) -> u64 {
        self.state.light_id
    }

    /// The light's object-to-world matrix.
    #[must_use]
    pub fn matrix_light_model(&self) -> Mat4 {
        self.state.model
    }

    /// The light's object-to-eye matrix.
    #[must_use]
    pub fn matrix_light_model_view(&self) -> Mat4 {
        self.state.model_view
    }

    /// The world-to-light-eye matrix.
    #[must_use]
    pub fn matrix_projective_view(&self) -> Mat4 {
        self.state.projective_view
    }

    /// The light's eye-to-clip matrix.
    #[must_use]
    pub fn matrix_projective_projection(&self) -> Mat4 {
        self.state.projective_projection
    }

    /// Takes observer eye-space positions to light eye space.
    #[must_use]
    pub fn matrix_projective_eye_to_light_eye(&self) -> Mat4 {
        self.state.eye_to_light_eye
    }
}

/// An open volume light scope.
#[derive(Debug)]
pub struct MatricesVolumeLight<'a> {
    observer: &'a MatricesObserver<'a>,
    state: Ref<'a, VolumeMatrices>,
}

impl<'a> MatricesVolumeLight<'a> {
    /// The enclosing observer.
    #[must_use]
    pub fn observer(&self) -> &MatricesObserver<'a> {
        self.observer
    }

    #[must_use]
    pub fn light_id(&self) -> u64 {
        self.state.light_id
    }

    #[must_use]
    pub fn matrix_light_model(&self) -> Mat4 {
        self.state.model
    }

    #[must_use]
    pub fn matrix_light_model_view(&self) -> Mat4 {
        self.state.model_view
    }
}
