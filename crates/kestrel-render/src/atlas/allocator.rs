//! Shelf-based rectangle packing.
//!
//! Rectangles are packed left to right into horizontal shelves. Each
//! shelf is as tall as the first rectangle placed on it; later
//! rectangles go onto the open shelf that wastes the least height, and a
//! new shelf opens below the last one when none fits. Allocation order
//! fully determines placement, which keeps packing deterministic across
//! runs.

use kestrel_core::geometry::{Pos, Size};

#[derive(Debug, Clone, Copy)]
struct Shelf {
    y: u32,
    height: u32,
    used_width: u32,
}

/// Packs rectangles into a square of side `size`.
///
/// The allocator only ever hands out space; freed regions are reclaimed
/// by repacking into a fresh allocator (see `TextureAtlas::rebuild`).
#[derive(Debug, Clone)]
pub struct AtlasAllocator {
    size: u32,
    shelves: Vec<Shelf>,
    /// Top of the unopened area below the last shelf.
    next_y: u32,
}

impl AtlasAllocator {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            shelves: Vec::new(),
            next_y: 0,
        }
    }

    /// Side length of the packing area.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Height consumed by opened shelves.
    #[inline]
    pub fn used_height(&self) -> u32 {
        self.next_y
    }

    /// Reserve space for a rectangle, returning its top-left corner, or
    /// `None` when it cannot fit.
    pub fn allocate(&mut self, size: Size<u32>) -> Option<Pos<u32>> {
        if size.width == 0 || size.height == 0 || size.width > self.size {
            return None;
        }

        // Pick the open shelf that wastes the least height.
        let mut best: Option<(usize, u32)> = None;
        for (index, shelf) in self.shelves.iter().enumerate() {
            if shelf.height < size.height || self.size - shelf.used_width < size.width {
                continue;
            }
            let waste = shelf.height - size.height;
            if best.is_none_or(|(_, best_waste)| waste < best_waste) {
                best = Some((index, waste));
            }
        }

        if let Some((index, _)) = best {
            let shelf = &mut self.shelves[index];
            let pos = Pos::new(shelf.used_width, shelf.y);
            shelf.used_width += size.width;
            return Some(pos);
        }

        // No shelf fits: open a new one below the last.
        if size.height > self.size - self.next_y {
            return None;
        }
        let pos = Pos::new(0, self.next_y);
        self.shelves.push(Shelf {
            y: self.next_y,
            height: size.height,
            used_width: size.width,
        });
        self.next_y += size.height;
        Some(pos)
    }

    /// Forget all allocations.
    pub fn reset(&mut self) {
        self.shelves.clear();
        self.next_y = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::geometry::Rect;

    #[test]
    fn test_uniform_grid_fills_exactly() {
        let mut alloc = AtlasAllocator::new(64);
        let mut positions = Vec::new();
        for _ in 0..16 {
            positions.push(alloc.allocate(Size::new(16, 16)).unwrap());
        }
        // Four per shelf, four shelves.
        assert_eq!(positions[0], Pos::new(0, 0));
        assert_eq!(positions[3], Pos::new(48, 0));
        assert_eq!(positions[4], Pos::new(0, 16));
        assert_eq!(positions[15], Pos::new(48, 48));
        // The square is now full.
        assert!(alloc.allocate(Size::new(16, 16)).is_none());
    }

    #[test]
    fn test_no_overlap_and_in_bounds() {
        let sizes = [
            (30u32, 12u32),
            (17, 25),
            (40, 8),
            (8, 40),
            (25, 25),
            (60, 10),
            (10, 10),
            (10, 10),
            (33, 15),
            (5, 50),
        ];
        let mut alloc = AtlasAllocator::new(128);
        let mut rects: Vec<Rect<u32>> = Vec::new();
        for (w, h) in sizes {
            let pos = alloc.allocate(Size::new(w, h)).unwrap();
            rects.push(Rect::new(pos.x, pos.y, w, h));
        }
        for rect in &rects {
            assert!(rect.right() <= 128 && rect.bottom() <= 128, "{rect:?}");
        }
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let sizes = [(13u32, 7u32), (22, 22), (9, 30), (40, 4), (6, 6)];
        let run = || {
            let mut alloc = AtlasAllocator::new(64);
            sizes
                .iter()
                .map(|&(w, h)| alloc.allocate(Size::new(w, h)))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_prefers_tightest_shelf() {
        let mut alloc = AtlasAllocator::new(100);
        alloc.allocate(Size::new(10, 30)).unwrap(); // shelf at y=0, height 30
        alloc.allocate(Size::new(10, 10)).unwrap(); // shelf at y=30, height 10
        // Height 9 fits both shelves; the 10-high one wastes less.
        let pos = alloc.allocate(Size::new(10, 9)).unwrap();
        assert_eq!(pos, Pos::new(10, 30));
    }

    #[test]
    fn test_rejects_oversized() {
        let mut alloc = AtlasAllocator::new(32);
        assert!(alloc.allocate(Size::new(33, 4)).is_none());
        assert!(alloc.allocate(Size::new(4, 33)).is_none());
        assert!(alloc.allocate(Size::new(0, 4)).is_none());
        // Exact fit still works.
        assert!(alloc.allocate(Size::new(32, 32)).is_some());
    }

    #[test]
    fn test_reset_forgets_allocations() {
        let mut alloc = AtlasAllocator::new(32);
        alloc.allocate(Size::new(32, 32)).unwrap();
        assert!(alloc.allocate(Size::new(8, 8)).is_none());
        alloc.reset();
        assert_eq!(alloc.used_height(), 0);
        assert_eq!(alloc.allocate(Size::new(8, 8)), Some(Pos::new(0, 0)));
    }
}
