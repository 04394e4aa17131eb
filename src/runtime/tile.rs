use super::tileset::AnimationFrame;

/// One placed tile: a cell in a tile layer or the image of a tile object.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    /// Global tile id with flip bits already stripped; never 0.
    pub gid: u32,
    pub flipped_horizontally: bool,
    pub flipped_vertically: bool,
    pub flipped_diagonally: bool,
    /// Index of the owning tileset in [`super::Map::tilesets`].
    pub tileset: usize,
    /// Present when the tileset entry for `gid` has animation frames.
    pub animation: Option<TileAnimation>,
}

impl Tile {
    pub fn new(gid: u32, tileset: usize) -> Self {
        Tile {
            gid,
            flipped_horizontally: false,
            flipped_vertically: false,
            flipped_diagonally: false,
            tileset,
            animation: None,
        }
    }

    pub fn with_flips(mut self, horizontal: bool, vertical: bool, diagonal: bool) -> Self {
        self.flipped_horizontally = horizontal;
        self.flipped_vertically = vertical;
        self.flipped_diagonally = diagonal;
        self
    }

    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }
}

/// Playback state of an animated tile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileAnimation {
    /// Local id of the tileset tile whose frames drive this animation.
    pub local_id: u32,
    pub current_frame: usize,
    /// Seconds spent on the current frame.
    pub elapsed: f32,
}

impl TileAnimation {
    pub fn new(local_id: u32) -> Self {
        TileAnimation {
            local_id,
            ..Self::default()
        }
    }

    /// Advance by `delta` seconds through `frames`, wrapping at the end.
    ///
    /// Ticks that are not finite are ignored.
    pub fn advance(&mut self, frames: &[AnimationFrame], delta: f32) {
        if frames.is_empty() || !delta.is_finite() {
            return;
        }
        self.current_frame %= frames.len();

        let cycle: f32 = frames.iter().map(|f| f.duration.max(0.0)).sum();
        if cycle <= 0.0 {
            // All frames are zero-length: step once per tick.
            self.current_frame = (self.current_frame + 1) % frames.len();
            self.elapsed = 0.0;
            return;
        }

        self.elapsed = (self.elapsed + delta.max(0.0)) % cycle;
        if !self.elapsed.is_finite() {
            // Overflow past an infinite frame; restart the current frame.
            self.elapsed = 0.0;
        }
        loop {
            let duration = frames[self.current_frame].duration.max(0.0);
            if self.elapsed < duration {
                break;
            }
            self.elapsed -= duration;
            self.current_frame = (self.current_frame + 1) % frames.len();
        }
    }

    /// Local tile id shown for the current frame.
    pub fn current_tile_id(&self, frames: &[AnimationFrame]) -> Option<u32> {
        frames.get(self.current_frame).map(|f| f.tile_id)
    }
}
