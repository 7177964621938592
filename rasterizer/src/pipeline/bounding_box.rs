/// Axis aligned box in screen pixels, covering `[x, x + w) x [y, y + h)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BoundingBox {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn x(&self) -> u32 {
        self.x
    }
    pub fn y(&self) -> u32 {
        self.y
    }
    pub fn width(&self) -> u32 {
        self.w
    }
    pub fn height(&self) -> u32 {
        self.h
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn overlap(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let left = self.x.max(other.x);
        let right = self.right().min(other.right());
        let top = self.y.max(other.y);
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return None;
        }
        Some(BoundingBox::new(left, top, right - left, bottom - top))
    }
}
