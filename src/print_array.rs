use ndarray::Array2;

/// Renders a matrix as colored terminal blocks. Observed magnitudes fade
/// from black to blue against `max_value`; missing cells (zeros) show dim
/// yellow.
pub fn print_array(array: &Array2<f64>, max_value: f64) {
    for row in array.outer_iter() {
        for &value in row.iter() {
            let (r, g, b) = if value == 0.0 {
                (96, 96, 0)
            } else {
                let level = (255.0 * (value / max_value).clamp(0.0, 1.0)).round() as u8;
                (0, 0, level)
            };

            print!("\x1b[48;2;{};{};{}m  \x1b[0m", r, g, b);
        }
        println!();
    }
}
