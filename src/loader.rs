//! Texture loading is delegated to the host engine through [`ContentLoader`].

use std::collections::HashMap;

use crate::error::Result;

/// Opaque handle to a texture owned by the host engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// A texture reference held by tilesets and image layers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Texture {
    /// Asset path the texture was requested with.
    pub asset_name: String,
    pub handle: TextureHandle,
}

/// Resolves texture asset names while a compiled map is decoded.
///
/// Implementations may cache by asset name across map loads; the decoder calls
/// `load_texture` once per tileset image and image layer, in stream order.
pub trait ContentLoader {
    fn load_texture(&mut self, asset_name: &str) -> Result<TextureHandle>;
}

/// A [`ContentLoader`] that hands out one handle per distinct asset name.
///
/// Useful for tools and headless servers that only need to know which
/// textures a map touches.
#[derive(Debug, Default)]
pub struct AssetCache {
    handles: HashMap<String, TextureHandle>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handle(&self, asset_name: &str) -> Option<TextureHandle> {
        self.handles.get(asset_name).copied()
    }
}

impl ContentLoader for AssetCache {
    fn load_texture(&mut self, asset_name: &str) -> Result<TextureHandle> {
        let next = TextureHandle(self.handles.len() as u32);
        let handle = *self
            .handles
            .entry(asset_name.to_string())
            .or_insert(next);
        log::debug!("Texture '{asset_name}' -> {handle:?}");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_reuses_handles_by_name() {
        let mut cache = AssetCache::new();
        let a = cache.load_texture("tiles/a.png").unwrap();
        let b = cache.load_texture("tiles/b.png").unwrap();
        assert_ne!(a, b);
        assert_eq!(cache.load_texture("tiles/a.png").unwrap(), a);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.handle("tiles/b.png"), Some(b));
    }
}
