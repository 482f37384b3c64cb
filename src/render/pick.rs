//! ID-buffer picking.
//!
//! Every pickable proxy is drawn into an offscreen RGBA8 buffer with a flat
//! color encoding a `PickKey`. A click reads back one pixel and decodes the
//! key. The buffer is stored bottom-up like a GL framebuffer, so reads flip
//! the screen-space row.

/// Classification of pickable element.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickKind {
    None = 0,
    SceneMesh = 1,
    Handle = 2,
}

impl PickKind {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::SceneMesh,
            2 => Self::Handle,
            _ => Self::None,
        }
    }
}

/// 32-bit packed pick key:
///   R = (kind << 4) | (object_id >> 16) & 0xF
///   G = (object_id >> 8) & 0xFF
///   B = object_id & 0xFF
///   A = sub_id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PickKey {
    pub kind: PickKind,
    pub object_id: u32, // 20-bit range
    pub sub_id: u8,
}

impl PickKey {
    pub const NONE: Self = Self {
        kind: PickKind::None,
        object_id: 0,
        sub_id: 0,
    };

    pub const MAX_OBJECT_ID: u32 = 0xFFFFF;

    pub fn new(kind: PickKind, object_id: u32, sub_id: u8) -> Self {
        Self {
            kind,
            object_id: object_id & Self::MAX_OBJECT_ID,
            sub_id,
        }
    }

    pub fn scene_mesh(object_id: u32) -> Self {
        Self::new(PickKind::SceneMesh, object_id, 0)
    }

    pub fn to_rgba(&self) -> [u8; 4] {
        let kind_nibble = (self.kind as u8) & 0x0F;
        let obj_hi = ((self.object_id >> 16) & 0x0F) as u8;
        let r = (kind_nibble << 4) | obj_hi;
        let g = ((self.object_id >> 8) & 0xFF) as u8;
        let b = (self.object_id & 0xFF) as u8;
        [r, g, b, self.sub_id]
    }

    pub fn from_rgba(rgba: [u8; 4]) -> Self {
        let kind_nibble = (rgba[0] >> 4) & 0x0F;
        let obj_hi = (rgba[0] & 0x0F) as u32;
        let object_id = (obj_hi << 16) | ((rgba[1] as u32) << 8) | rgba[2] as u32;
        Self {
            kind: PickKind::from_u8(kind_nibble),
            object_id,
            sub_id: rgba[3],
        }
    }

    pub fn is_none(&self) -> bool {
        self.kind == PickKind::None && self.object_id == 0
    }
}

/// CPU-side pick target.
#[derive(Debug, Clone)]
pub struct PickBuffer {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl PickBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![PickKey::NONE.to_rgba(); (width * height) as usize],
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.pixels.fill(PickKey::NONE.to_rgba());
    }

    /// Erase every pixel carrying `key`.
    pub fn erase(&mut self, key: PickKey) {
        let rgba = key.to_rgba();
        for pixel in self.pixels.iter_mut().filter(|pixel| **pixel == rgba) {
            *pixel = PickKey::NONE.to_rgba();
        }
    }

    /// Paint a screen-space rectangle (top-left origin, `max` exclusive).
    pub fn fill_rect(&mut self, min: (u32, u32), max: (u32, u32), key: PickKey) {
        let rgba = key.to_rgba();
        let x1 = max.0.min(self.width);
        let y1 = max.1.min(self.height);
        for sy in min.1..y1 {
            let row = self.height - 1 - sy;
            for sx in min.0..x1 {
                self.pixels[(row * self.width + sx) as usize] = rgba;
            }
        }
    }

    /// Screen coordinates are top-left origin, the buffer is bottom-left.
    pub fn read(&self, screen_x: f32, screen_y: f32) -> PickKey {
        if !(screen_x >= 0.0 && screen_y >= 0.0) {
            return PickKey::NONE;
        }
        let px = screen_x as u32;
        let py = screen_y as u32;
        if px >= self.width || py >= self.height {
            return PickKey::NONE;
        }
        let row = self.height - 1 - py;
        PickKey::from_rgba(self.pixels[(row * self.width + px) as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_key_roundtrip() {
        let key = PickKey::new(PickKind::SceneMesh, 0x12345, 42);
        assert_eq!(PickKey::from_rgba(key.to_rgba()), key);
    }

    #[test]
    fn pick_key_none_roundtrip() {
        assert!(PickKey::from_rgba(PickKey::NONE.to_rgba()).is_none());
    }

    #[test]
    fn pick_key_max_values() {
        let key = PickKey::new(PickKind::Handle, PickKey::MAX_OBJECT_ID, 255);
        let decoded = PickKey::from_rgba(key.to_rgba());
        assert_eq!(decoded.kind, PickKind::Handle);
        assert_eq!(decoded.object_id, 0xFFFFF);
        assert_eq!(decoded.sub_id, 255);
    }

    #[test]
    fn buffer_reads_back_painted_rect() {
        let mut buffer = PickBuffer::new(64, 32);
        let key = PickKey::scene_mesh(7);
        buffer.fill_rect((10, 5), (20, 8), key);
        assert_eq!(buffer.read(10.0, 5.0), key);
        assert_eq!(buffer.read(19.9, 7.5), key);
        assert!(buffer.read(20.0, 5.0).is_none());
        assert!(buffer.read(10.0, 8.0).is_none());
        assert!(buffer.read(-1.0, 0.0).is_none());
        assert!(buffer.read(1000.0, 0.0).is_none());
    }

    #[test]
    fn erase_removes_only_that_key() {
        let mut buffer = PickBuffer::new(8, 8);
        buffer.fill_rect((0, 0), (4, 4), PickKey::scene_mesh(1));
        buffer.fill_rect((4, 4), (8, 8), PickKey::scene_mesh(2));
        buffer.erase(PickKey::scene_mesh(1));
        assert!(buffer.read(1.0, 1.0).is_none());
        assert_eq!(buffer.read(5.0, 5.0), PickKey::scene_mesh(2));
    }
}
