//! Sampler cache for GPU sampler reuse.
//!
//! Sprite lists pick their atlas filtering per list, so several lists can
//! ask for the same sampler every frame. The cache hands out shared
//! `Arc<wgpu::Sampler>`s keyed by the fields this crate actually varies.

use ahash::HashMap;
use kestrel_core::profiling::profile_function;
use std::sync::{Arc, Mutex};

/// A hashable key describing a sampler.
///
/// Mag and min filters always match in this crate, and the mipmap filter
/// is fixed to nearest since every texture here has a single mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerKey {
    pub filter: wgpu::FilterMode,
    pub address_mode: wgpu::AddressMode,
}

impl SamplerKey {
    /// Key for sampling an atlas with the given filter. Atlas UV regions
    /// must never wrap, so the address mode clamps.
    pub fn for_filter(filter: wgpu::FilterMode) -> Self {
        Self {
            filter,
            address_mode: wgpu::AddressMode::ClampToEdge,
        }
    }

    fn to_descriptor(self) -> wgpu::SamplerDescriptor<'static> {
        wgpu::SamplerDescriptor {
            label: Some("cached sampler"),
            address_mode_u: self.address_mode,
            address_mode_v: self.address_mode,
            address_mode_w: self.address_mode,
            mag_filter: self.filter,
            min_filter: self.filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }
    }
}

/// A thread-safe cache of GPU samplers.
///
/// Identical keys share the same GPU sampler object. The cache holds a
/// handful of entries at most, so a plain mutex around the map is enough.
pub struct SamplerCache {
    samplers: Mutex<HashMap<SamplerKey, Arc<wgpu::Sampler>>>,
}

impl Default for SamplerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplerCache {
    pub fn new() -> Self {
        Self {
            samplers: Mutex::new(HashMap::default()),
        }
    }

    /// Get the sampler for `key`, creating it on first use.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn get_or_create(&self, device: &wgpu::Device, key: SamplerKey) -> Arc<wgpu::Sampler> {
        profile_function!();
        let mut samplers = self.samplers.lock().expect("sampler cache poisoned");
        let sampler = samplers
            .entry(key)
            .or_insert_with(|| Arc::new(device.create_sampler(&key.to_descriptor())));
        Arc::clone(sampler)
    }

    /// Number of distinct samplers created so far.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.samplers.lock().expect("sampler cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached samplers. Samplers still referenced elsewhere stay
    /// alive through their `Arc`s.
    pub fn clear(&self) {
        self.samplers
            .lock()
            .expect("sampler cache poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality() {
        let linear = SamplerKey::for_filter(wgpu::FilterMode::Linear);
        assert_eq!(linear, SamplerKey::for_filter(wgpu::FilterMode::Linear));
        assert_ne!(linear, SamplerKey::for_filter(wgpu::FilterMode::Nearest));
        assert_eq!(linear.address_mode, wgpu::AddressMode::ClampToEdge);
    }

    #[test]
    fn test_cache_reuses_samplers() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let cache = SamplerCache::new();
        let linear = SamplerKey::for_filter(wgpu::FilterMode::Linear);
        let a = cache.get_or_create(ctx.device(), linear);
        let b = cache.get_or_create(ctx.device(), linear);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let nearest = SamplerKey::for_filter(wgpu::FilterMode::Nearest);
        let _ = cache.get_or_create(ctx.device(), nearest);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
