//! Binding between a renderer's surface and the host container.

use std::rc::Rc;

use crate::error::{Result, ViewerError};
use crate::render::{SurfaceId, SurfaceSize};

/// Resizable container the viewer's surface is mounted into.
///
/// Methods take `&self`; hosts are shared with the surrounding UI and use
/// interior mutability.
pub trait HostContainer {
    /// Current pixel size, `None` once the container has been detached
    fn client_size(&self) -> Option<SurfaceSize>;

    fn append_surface(&self, surface: SurfaceId);

    /// Returns `false` if the surface was not (or no longer) a child
    fn remove_surface(&self, surface: SurfaceId) -> bool;

    fn surface_count(&self) -> usize;
}

/// Mounted surface plus size observation
pub struct ViewportBinder {
    host: Rc<dyn HostContainer>,
    surface: SurfaceId,
    size: SurfaceSize,
    observing: bool,
    attached: bool,
}

impl ViewportBinder {
    /// Mount `surface` into `host` and start observing its size
    pub fn bind(surface: SurfaceId, host: Rc<dyn HostContainer>) -> Result<Self> {
        let size = host
            .client_size()
            .filter(|s| !s.is_empty())
            .ok_or(ViewerError::HostDetached)?;
        host.append_surface(surface);
        Ok(Self {
            host,
            surface,
            size,
            observing: true,
            attached: true,
        })
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Last observed host size
    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// New host size since the last poll. Detached or zero-sized hosts
    /// report nothing.
    pub fn poll_resize(&mut self) -> Option<SurfaceSize> {
        if !self.observing {
            return None;
        }
        match self.host.client_size() {
            Some(size) if !size.is_empty() && size != self.size => {
                tracing::debug!(
                    "Host resized {}x{} -> {}x{}",
                    self.size.width,
                    self.size.height,
                    size.width,
                    size.height
                );
                self.size = size;
                Some(size)
            }
            _ => None,
        }
    }

    pub fn unobserve(&mut self) {
        self.observing = false;
    }

    /// Remove the surface from the host; tolerates a host that already
    /// dropped it
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        if !self.host.remove_surface(self.surface) {
            tracing::debug!("Surface {:?} was already gone from its host", self.surface);
        }
    }

    pub fn unbind(&mut self) {
        self.unobserve();
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::TestHost;

    #[test]
    fn test_bind_appends_surface() {
        let host = TestHost::new(800, 600);
        let binder = ViewportBinder::bind(SurfaceId(1), host.clone()).unwrap();
        assert_eq!(host.surfaces(), vec![SurfaceId(1)]);
        assert_eq!(binder.size(), SurfaceSize::new(800, 600));
        assert!(binder.is_observing());
        assert!(binder.is_attached());
    }

    #[test]
    fn test_bind_detached_host_fails() {
        let host = TestHost::new(800, 600);
        host.detach();
        assert!(matches!(
            ViewportBinder::bind(SurfaceId(1), host.clone()),
            Err(ViewerError::HostDetached)
        ));
        assert_eq!(host.surface_count(), 0);
    }

    #[test]
    fn test_poll_resize_reports_changes_once() {
        let host = TestHost::new(800, 600);
        let mut binder = ViewportBinder::bind(SurfaceId(1), host.clone()).unwrap();
        assert_eq!(binder.poll_resize(), None);

        host.resize(1024, 512);
        assert_eq!(binder.poll_resize(), Some(SurfaceSize::new(1024, 512)));
        assert_eq!(binder.poll_resize(), None);
    }

    #[test]
    fn test_zero_size_ignored() {
        let host = TestHost::new(800, 600);
        let mut binder = ViewportBinder::bind(SurfaceId(1), host.clone()).unwrap();
        host.resize(0, 600);
        assert_eq!(binder.poll_resize(), None);
        assert_eq!(binder.size(), SurfaceSize::new(800, 600));
    }

    #[test]
    fn test_unobserve_stops_resizes() {
        let host = TestHost::new(800, 600);
        let mut binder = ViewportBinder::bind(SurfaceId(1), host.clone()).unwrap();
        binder.unobserve();
        assert!(!binder.is_observing());
        host.resize(100, 100);
        assert_eq!(binder.poll_resize(), None);
    }

    #[test]
    fn test_unbind_tolerates_detached_host() {
        let host = TestHost::new(800, 600);
        let mut binder = ViewportBinder::bind(SurfaceId(3), host.clone()).unwrap();
        host.detach();
        assert_eq!(binder.poll_resize(), None);
        binder.unbind();
        binder.unbind();
        assert!(!binder.is_attached());
        assert_eq!(host.surface_count(), 0);
    }

    #[test]
    fn test_detach_when_host_already_cleared() {
        let host = TestHost::new(800, 600);
        let mut binder = ViewportBinder::bind(SurfaceId(3), host.clone()).unwrap();
        host.clear_surfaces();
        binder.detach();
        assert_eq!(host.surface_count(), 0);
    }
}
