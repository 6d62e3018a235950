use std::sync::Arc;

/// Error creating a [`GraphicsContext`].
#[derive(Debug, Clone)]
pub enum ContextError {
    /// No adapter matched the descriptor.
    AdapterNotFound { reason: String },
    /// The adapter refused the device request (features or limits).
    DeviceRequest { reason: String },
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdapterNotFound { reason } => {
                write!(f, "no suitable GPU adapter found: {reason}")
            }
            Self::DeviceRequest { reason } => {
                write!(f, "device request failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ContextError {}

pub type ContextResult<T> = Result<T, ContextError>;

/// Options for [`GraphicsContext`] creation.
///
/// Plain fields, wgpu style; override what you need and take the rest
/// from `Default`.
pub struct GraphicsContextDescriptor {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
    /// Extra device features to require beyond the baseline.
    pub features: wgpu::Features,
    pub limits: wgpu::Limits,
    pub label: Option<&'static str>,
}

impl Default for GraphicsContextDescriptor {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            features: wgpu::Features::empty(),
            limits: wgpu::Limits::default(),
            label: None,
        }
    }
}

/// A globally shared graphics context.
///
/// Owns the wgpu instance, adapter, device and queue. Created once and
/// shared via `Arc`; everything else in this crate borrows it or holds a
/// clone.
///
/// ```rust,no_run
/// use kestrel_render::GraphicsContext;
///
/// let ctx = GraphicsContext::new_owned_sync().expect("no GPU");
/// let ctx2 = ctx.clone(); // Cheap clone (Arc)
/// ```
pub struct GraphicsContext {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GraphicsContext {
    /// Creates a context with default settings.
    ///
    /// Returns `Arc<Self>` which can be cheaply cloned and shared.
    pub async fn new_owned() -> ContextResult<Arc<Self>> {
        Self::new_owned_with_descriptor(GraphicsContextDescriptor::default()).await
    }

    /// Creates a context synchronously, blocking the current thread.
    pub fn new_owned_sync() -> ContextResult<Arc<Self>> {
        pollster::block_on(Self::new_owned())
    }

    /// Creates a context with a custom descriptor.
    pub async fn new_owned_with_descriptor(
        descriptor: GraphicsContextDescriptor,
    ) -> ContextResult<Arc<Self>> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: descriptor.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: descriptor.power_preference,
                compatible_surface: None,
                force_fallback_adapter: descriptor.force_fallback_adapter,
            })
            .await
            .map_err(|e| ContextError::AdapterNotFound {
                reason: e.to_string(),
            })?;

        // Log which adapter we got before the device request, so a
        // limits failure still names the GPU it was tried on.
        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "requesting device");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: descriptor.label,
                required_features: descriptor.features,
                required_limits: descriptor.limits.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| ContextError::DeviceRequest {
                reason: e.to_string(),
            })?;

        Ok(Arc::new(Self {
            instance,
            adapter,
            device,
            queue,
        }))
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Maximum width and height for 2D textures.
    ///
    /// The texture atlas grows up to this dimension before reporting
    /// that it is full.
    #[inline]
    pub fn max_texture_dimension_2d(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

/// Creates a context for tests, or `None` when no adapter is available
/// (headless CI without a GPU or software rasterizer).
#[cfg(test)]
pub(crate) fn test_context() -> Option<Arc<GraphicsContext>> {
    match GraphicsContext::new_owned_sync() {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let desc = GraphicsContextDescriptor::default();
        assert_eq!(desc.backends, wgpu::Backends::all());
        assert!(!desc.force_fallback_adapter);
        assert!(desc.label.is_none());
    }

    #[test]
    fn test_descriptor_override() {
        let desc = GraphicsContextDescriptor {
            power_preference: wgpu::PowerPreference::LowPower,
            label: Some("test"),
            ..Default::default()
        };
        assert_eq!(desc.power_preference, wgpu::PowerPreference::LowPower);
        assert_eq!(desc.label, Some("test"));
        assert_eq!(desc.features, wgpu::Features::empty());
    }

    #[test]
    fn test_error_display() {
        let err = ContextError::AdapterNotFound {
            reason: "no backend".into(),
        };
        assert!(err.to_string().contains("no suitable GPU adapter"));
    }

    #[test]
    fn test_create_context() {
        let Some(ctx) = test_context() else { return };
        assert!(ctx.max_texture_dimension_2d() >= 2048);
        assert!(!ctx.adapter().get_info().name.is_empty());
    }
}
