use std::ops::{Add, Mul};

/// An axis-aligned rectangle with its origin at the top-left corner.
///
/// The atlas and tileset code use `Rect<u32>` in pixel space (y grows
/// downward, matching texture space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect<T> {
    pub x: T,
    pub y: T,
    pub width: T,
    pub height: T,
}

impl<T> Rect<T> {
    pub const fn new(x: T, y: T, width: T, height: T) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }
}

impl<T: Copy> Rect<T> {
    pub fn pos(&self) -> Pos<T> {
        Pos {
            x: self.x,
            y: self.y,
        }
    }

    pub fn size(&self) -> Size<T> {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

impl<T: Copy + Add<Output = T>> Rect<T> {
    /// One past the right-most column covered by the rect.
    pub fn right(&self) -> T {
        self.x + self.width
    }

    /// One past the bottom-most row covered by the rect.
    pub fn bottom(&self) -> T {
        self.y + self.height
    }
}

impl<T: Copy + Mul<Output = T>> Rect<T> {
    pub fn area(&self) -> T {
        self.width * self.height
    }
}

impl<T: Copy + Add<Output = T> + PartialOrd> Rect<T> {
    pub fn contains(&self, pos: Pos<T>) -> bool {
        pos.x >= self.x && pos.y >= self.y && pos.x < self.right() && pos.y < self.bottom()
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains_rect(&self, other: &Rect<T>) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// True if the two rects share any area. Touching edges do not count.
    pub fn intersects(&self, other: &Rect<T>) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size<T> {
    pub width: T,
    pub height: T,
}

impl<T> Size<T> {
    pub const fn new(width: T, height: T) -> Self {
        Size { width, height }
    }

    pub fn cast<U: From<T>>(self) -> Size<U> {
        Size {
            width: U::from(self.width),
            height: U::from(self.height),
        }
    }
}

impl<T: Copy + Mul<Output = T>> Size<T> {
    pub fn area(&self) -> T {
        self.width * self.height
    }
}

impl<T: Mul + Copy> Mul<T> for Size<T> {
    type Output = Size<<T as Mul>::Output>;

    fn mul(self, rhs: T) -> Self::Output {
        Size {
            width: self.width * rhs,
            height: self.height * rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pos<T> {
    pub x: T,
    pub y: T,
}

impl<T> Pos<T> {
    pub const fn new(x: T, y: T) -> Self {
        Pos { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges() {
        let r = Rect::new(2u32, 3, 10, 20);
        assert_eq!(r.right(), 12);
        assert_eq!(r.bottom(), 23);
        assert_eq!(r.area(), 200);
        assert_eq!(r.size(), Size::new(10, 20));
    }

    #[test]
    fn test_rect_contains_is_half_open() {
        let r = Rect::new(0u32, 0, 4, 4);
        assert!(r.contains(Pos::new(0, 0)));
        assert!(r.contains(Pos::new(3, 3)));
        assert!(!r.contains(Pos::new(4, 0)));
        assert!(!r.contains(Pos::new(0, 4)));
    }

    #[test]
    fn test_rect_intersects() {
        let a = Rect::new(0u32, 0, 10, 10);
        let b = Rect::new(5u32, 5, 10, 10);
        let c = Rect::new(10u32, 0, 5, 5);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        // Sharing an edge is not an overlap.
        assert!(!a.intersects(&c));
        assert!(!c.intersects(&a));
    }

    #[test]
    fn test_rect_contains_rect() {
        let outer = Rect::new(0u32, 0, 16, 16);
        assert!(outer.contains_rect(&Rect::new(0, 0, 16, 16)));
        assert!(outer.contains_rect(&Rect::new(4, 4, 8, 8)));
        assert!(!outer.contains_rect(&Rect::new(8, 8, 16, 16)));
    }

    #[test]
    fn test_size_cast_and_scale() {
        let s = Size::new(3u8, 4u8);
        let wide: Size<u32> = s.cast();
        assert_eq!(wide, Size::new(3u32, 4u32));
        assert_eq!(wide * 2, Size::new(6u32, 8u32));
    }
}
