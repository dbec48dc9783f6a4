use serde_derive::{Deserialize, Serialize};

/// Pixel bounding box stored as left, top, right, bottom (LTRB).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl BBox {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Creates a box from the top, left, bottom, right order used by the label files.
    pub fn from_tlbr(tlbr: [i64; 4]) -> Self {
        Self::new(tlbr[1], tlbr[0], tlbr[3], tlbr[2])
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    /// A zero height box marks a view without a detection.
    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    /// Scales the box around its center.
    ///
    /// Integer arithmetic with floor division, so a scale of 1.0 may shrink odd
    /// sized boxes by one pixel.
    pub fn scale(&self, scale: f64) -> Self {
        let x_center = (self.right + self.left).div_euclid(2);
        let y_center = (self.bottom + self.top).div_euclid(2);
        let new_width = (scale * self.width() as f64).trunc() as i64;
        let new_height = (scale * self.height() as f64).trunc() as i64;

        Self {
            left: x_center - new_width.div_euclid(2),
            top: y_center - new_height.div_euclid(2),
            right: x_center + new_width.div_euclid(2),
            bottom: y_center + new_height.div_euclid(2),
        }
    }

    /// Grows the shorter side so the box becomes a square with the same center.
    pub fn square(&self) -> Self {
        let (width, height) = (self.width(), self.height());
        let mut result = *self;
        if width > height {
            let y_center = (self.top + self.bottom).div_euclid(2);
            result.top = y_center - width.div_euclid(2);
            result.bottom = result.top + width;
        } else {
            let x_center = (self.left + self.right).div_euclid(2);
            result.left = x_center - height.div_euclid(2);
            result.right = result.left + height;
        }
        result
    }

    /// Rescales the box coordinates by independent x and y ratios, truncating.
    pub fn rescale(&self, x_ratio: f64, y_ratio: f64) -> Self {
        Self {
            left: (self.left as f64 * x_ratio) as i64,
            top: (self.top as f64 * y_ratio) as i64,
            right: (self.right as f64 * x_ratio) as i64,
            bottom: (self.bottom as f64 * y_ratio) as i64,
        }
    }

    pub fn to_array(&self) -> [i64; 4] {
        [self.left, self.top, self.right, self.bottom]
    }
}
