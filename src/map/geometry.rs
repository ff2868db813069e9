use crate::braille::BrailleCanvas;

/// Bresenham line between two dot positions
pub fn draw_line(canvas: &mut BrailleCanvas, from: (i32, i32), to: (i32, i32)) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = (to.0 - x).signum();
    let sy = (to.1 - y).signum();
    let mut err = dx + dy;

    loop {
        canvas.set_pixel(x, y);
        if (x, y) == to {
            return;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Disc of `radius` dots; a ring when `filled` is false
pub fn draw_disc(canvas: &mut BrailleCanvas, center: (i32, i32), radius: i32, filled: bool) {
    let outer = radius * radius;
    let inner = (radius - 1).max(0).pow(2);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d = dx * dx + dy * dy;
            if d <= outer && (filled || d > inner) {
                canvas.set_pixel(center.0 + dx, center.1 + dy);
            }
        }
    }
}
