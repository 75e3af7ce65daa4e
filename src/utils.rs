use std::error::Error;
use std::f64::consts::PI;

use num_complex::Complex;

pub type DynError = Box<dyn Error + Send + Sync>;

/// Channel count above which the per-channel solves switch to the Rayon
/// data-parallel path. Results are identical to the scalar path.
pub const PARALLEL_CHANNEL_THRESHOLD: usize = 2048;

/// 位相を [0, 2π) に折り返す。
pub fn wrap_phase(phase_rad: f64) -> f64 {
    let wrapped = phase_rad.rem_euclid(2.0 * PI);
    if wrapped >= 2.0 * PI {
        0.0
    } else {
        wrapped
    }
}

pub fn unwrap_phase(phase: &[f64]) -> Vec<f64> {
    let mut unwrapped = Vec::with_capacity(phase.len());
    if let Some(&first) = phase.first() {
        unwrapped.push(first);
        let mut offset = 0.0;
        for i in 1..phase.len() {
            let diff = phase[i] - phase[i - 1];
            if diff > PI {
                offset -= 2.0 * PI;
            } else if diff < -PI {
                offset += 2.0 * PI;
            }
            unwrapped.push(phase[i] + offset);
        }
    }
    unwrapped
}

pub fn safe_arg(z: &Complex<f64>) -> f64 {
    if z.re == 0.0 && z.im == 0.0 {
        0.0
    } else {
        z.arg()
    }
}

/// Normalized Gram determinant of a two-column complex design matrix:
/// det(AᴴA) / (‖a₁‖²·‖a₂‖²), in [0, 1]. 1 means orthogonal columns,
/// 0 means collinear (or an empty column). `norm1`/`norm2` are the squared
/// column norms, `off` is the off-diagonal Gram entry (AᴴA)₁₂.
pub fn gram_conditioning(norm1: f64, norm2: f64, off: Complex<f64>) -> f64 {
    if norm1 <= 0.0 || norm2 <= 0.0 {
        return 0.0;
    }
    let det = norm1 * norm2 - off.norm_sqr();
    (det / (norm1 * norm2)).max(0.0)
}

/// Solve the 2×2 Hermitian system [[n1, m], [conj(m), n2]]·x = (r1, r2).
/// The caller must check `gram_conditioning` first; a singular system here
/// produces non-finite output, never a panic.
pub fn solve_hermitian2(
    n1: f64,
    n2: f64,
    m: Complex<f64>,
    r1: Complex<f64>,
    r2: Complex<f64>,
) -> (Complex<f64>, Complex<f64>) {
    let det = n1 * n2 - m.norm_sqr();
    let x1 = (r1 * n2 - m * r2) / det;
    let x2 = (r2 * n1 - m.conj() * r1) / det;
    (x1, x2)
}

/// Least-squares line fit y = slope·x + intercept.
/// Returns None when the abscissa carries no spread.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = ys.iter().sum();
    let sum_xy: f64 = xs.iter().zip(ys).map(|(&x, &y)| x * y).sum();
    let sum_x2: f64 = xs.iter().map(|&x| x * x).sum();
    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator.abs() <= 1e-9 {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    Some((slope, intercept))
}
