/// Braille dot bit for each (x % 2, y % 4) position inside a cell:
/// ```text
/// (0,0) (1,0)   bits: 0x01 0x08
/// (0,1) (1,1)   bits: 0x02 0x10
/// (0,2) (1,2)   bits: 0x04 0x20
/// (0,3) (1,3)   bits: 0x40 0x80
/// ```
const DOTS: [[u8; 4]; 2] = [[0x01, 0x02, 0x04, 0x40], [0x08, 0x10, 0x20, 0x80]];

const BLANK: u32 = 0x2800;

/// Terminal canvas of Braille cells; each cell is a 2x4 dot grid.
pub struct BrailleCanvas {
    width: usize,
    height: usize,
    cells: Vec<u8>,
}

impl BrailleCanvas {
    /// Canvas of `width` x `height` character cells, i.e. `width*2` x `height*4` dots
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Dot resolution
    pub fn pixel_size(&self) -> (usize, usize) {
        (self.width * 2, self.height * 4)
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Set a dot; anything off-canvas is ignored
    pub fn set_pixel(&mut self, x: i32, y: i32) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        let (cx, cy) = (x / 2, y / 4);
        if cx >= self.width || cy >= self.height {
            return;
        }
        self.cells[cy * self.width + cx] |= DOTS[x % 2][y % 4];
    }

    pub fn is_set(&self, x: usize, y: usize) -> bool {
        let (cx, cy) = (x / 2, y / 4);
        cx < self.width && cy < self.height && self.cells[cy * self.width + cx] & DOTS[x % 2][y % 4] != 0
    }

    /// Glyph at a character cell
    pub fn glyph(&self, col: usize, row: usize) -> char {
        let bits = if col < self.width && row < self.height {
            self.cells[row * self.width + col]
        } else {
            0
        };
        char::from_u32(BLANK + bits as u32).unwrap_or(' ')
    }

    /// Non-empty cells as `(col, row, glyph)`
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, char)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &bits)| bits != 0)
            .map(|(i, &bits)| {
                let glyph = char::from_u32(BLANK + bits as u32).unwrap_or(' ');
                (i % self.width, i / self.width, glyph)
            })
    }

    #[cfg(test)]
    pub fn to_string(&self) -> String {
        (0..self.height)
            .map(|row| (0..self.width).map(|col| self.glyph(col, row)).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
