//! Pure numeric kernels consumed by the built-in function definitions: complex numbers,
//! vectors, and matrices.

use crate::utils::display_float;

use core::fmt;
use core::ops;
use num_traits::{One, Zero};

/// Tolerance used when comparing numbers for value equality.
pub const EQ_TOLERANCE: f64 = 1e-12;

/// A complex number in rectangular form.
///
/// Real numbers are represented with a zero imaginary part; most kernels take the fast real
/// path when both operands are real.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Number {
    pub re: f64,
    pub im: f64,
}

impl Number {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    pub fn real(re: f64) -> Self {
        Self { re, im: 0. }
    }

    /// The imaginary unit.
    pub fn i() -> Self {
        Self { re: 0., im: 1. }
    }

    pub fn is_real(&self) -> bool {
        self.im == 0.
    }

    /// True when the number is real and has no fractional part.
    pub fn is_int(&self) -> bool {
        self.is_real() && self.re.fract() == 0. && self.re.is_finite()
    }

    /// Modulus `|z|`.
    pub fn abs(&self) -> f64 {
        self.re.hypot(self.im)
    }

    /// Argument of `z` in radians.
    pub fn arg(&self) -> f64 {
        self.im.atan2(self.re)
    }

    pub fn conj(&self) -> Self {
        Self {
            re: self.re,
            im: -self.im,
        }
    }

    pub fn exp(&self) -> Self {
        // e^(a + bi) = e^a * (cos b + i sin b)
        let r = self.re.exp();
        Self {
            re: r * self.im.cos(),
            im: r * self.im.sin(),
        }
    }

    pub fn ln(&self) -> Self {
        Self {
            re: self.abs().ln(),
            im: self.arg(),
        }
    }

    pub fn sqrt(&self) -> Self {
        if self.is_real() {
            // Negative reals go exactly imaginary; the polar path would leave a rounding
            // residue in the real part.
            return if self.re >= 0. {
                Self::real(self.re.sqrt())
            } else {
                Self::new(0., (-self.re).sqrt())
            };
        }
        self.pow(Self::real(0.5))
    }

    pub fn pow(&self, exp: Self) -> Self {
        if self.is_real() && exp.is_real() {
            // Negative real bases are fine for integer exponents; otherwise the result leaves
            // the reals and we fall through to the complex path.
            if self.re >= 0. || exp.re.fract() == 0. {
                return Self::real(self.re.powf(exp.re));
            }
        }
        if self.is_zero() {
            return if exp.is_zero() { Self::one() } else { Self::zero() };
        }
        // z^w = e^(w ln z)
        (exp * self.ln()).exp()
    }

    pub fn sin(&self) -> Self {
        Self {
            re: self.re.sin() * self.im.cosh(),
            im: self.re.cos() * self.im.sinh(),
        }
    }

    pub fn cos(&self) -> Self {
        Self {
            re: self.re.cos() * self.im.cosh(),
            im: -self.re.sin() * self.im.sinh(),
        }
    }

    pub fn tan(&self) -> Self {
        self.sin() / self.cos()
    }

    /// Compares two numbers for value equality within [EQ_TOLERANCE].
    pub fn approx_eq(&self, other: &Self) -> bool {
        fn close(a: f64, b: f64) -> bool {
            a == b || (a - b).abs() < EQ_TOLERANCE
        }
        close(self.re, other.re) && close(self.im, other.im)
    }
}

impl From<f64> for Number {
    fn from(re: f64) -> Self {
        Self::real(re)
    }
}

impl ops::Add for Number {
    type Output = Number;
    fn add(self, rhs: Number) -> Number {
        Number {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl ops::Sub for Number {
    type Output = Number;
    fn sub(self, rhs: Number) -> Number {
        Number {
            re: self.re - rhs.re,
            im: self.im - rhs.im,
        }
    }
}

impl ops::Mul for Number {
    type Output = Number;
    fn mul(self, rhs: Number) -> Number {
        Number {
            re: self.re * rhs.re - self.im * rhs.im,
            im: self.re * rhs.im + self.im * rhs.re,
        }
    }
}

impl ops::Div for Number {
    type Output = Number;
    fn div(self, rhs: Number) -> Number {
        if rhs.is_real() {
            return Number {
                re: self.re / rhs.re,
                im: self.im / rhs.re,
            };
        }
        let denom = rhs.re * rhs.re + rhs.im * rhs.im;
        Number {
            re: (self.re * rhs.re + self.im * rhs.im) / denom,
            im: (self.im * rhs.re - self.re * rhs.im) / denom,
        }
    }
}

impl ops::Neg for Number {
    type Output = Number;
    fn neg(self) -> Number {
        Number {
            re: -self.re,
            im: -self.im,
        }
    }
}

impl Zero for Number {
    fn zero() -> Self {
        Self::real(0.)
    }
    fn is_zero(&self) -> bool {
        self.re == 0. && self.im == 0.
    }
}

impl One for Number {
    fn one() -> Self {
        Self::real(1.)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.re.is_infinite() && self.is_real() {
            return write!(f, "{}infinity", if self.re < 0. { "-" } else { "" });
        }
        if self.is_real() {
            return write!(f, "{}", display_float(self.re));
        }
        let im = match self.im {
            i if i == 1. => "i".to_string(),
            i if i == -1. => "-i".to_string(),
            i => format!("{}i", display_float(i)),
        };
        if self.re == 0. {
            write!(f, "{}", im)
        } else if self.im < 0. {
            write!(f, "{} - {}", display_float(self.re), &im[1..])
        } else {
            write!(f, "{} + {}", display_float(self.re), im)
        }
    }
}

/// Factorial of a non-negative integer; `None` outside that domain.
pub fn factorial(n: Number) -> Option<Number> {
    if !n.is_int() || n.re < 0. {
        return None;
    }
    let mut acc = 1f64;
    let mut k = 2f64;
    while k <= n.re {
        acc *= k;
        k += 1.;
    }
    Some(Number::real(acc))
}

/// Real modulo with the sign of the divisor, so `mod(-1, 3) == 2`.
pub fn modulo(a: f64, b: f64) -> f64 {
    ((a % b) + b) % b
}

pub fn gcd(a: f64, b: f64) -> f64 {
    let (mut a, mut b) = (a.abs().trunc(), b.abs().trunc());
    while b != 0. {
        let t = b;
        b = modulo(a, b);
        a = t;
    }
    a
}

/// Rounds `n` to `places` decimal places.
pub fn precround(n: f64, places: f64) -> f64 {
    let shift = 10f64.powf(places.trunc());
    (n * shift).round() / shift
}

// Vector kernels. A vector is a plain `Vec<Number>`; dimension checks are the caller's
// responsibility and `None` is returned when they fail.

pub fn vec_add(a: &[Number], b: &[Number]) -> Option<Vec<Number>> {
    if a.len() != b.len() {
        return None;
    }
    Some(a.iter().zip(b).map(|(&x, &y)| x + y).collect())
}

pub fn vec_sub(a: &[Number], b: &[Number]) -> Option<Vec<Number>> {
    if a.len() != b.len() {
        return None;
    }
    Some(a.iter().zip(b).map(|(&x, &y)| x - y).collect())
}

pub fn vec_scale(k: Number, v: &[Number]) -> Vec<Number> {
    v.iter().map(|&x| k * x).collect()
}

pub fn vec_dot(a: &[Number], b: &[Number]) -> Option<Number> {
    if a.len() != b.len() {
        return None;
    }
    Some(
        a.iter()
            .zip(b)
            .fold(Number::zero(), |acc, (&x, &y)| acc + x * y),
    )
}

/// A row-major numeric matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    data: Vec<Number>,
}

impl Matrix {
    /// Builds a matrix from rows; `None` if the rows are ragged or empty.
    pub fn from_rows(rows: Vec<Vec<Number>>) -> Option<Self> {
        let cols = rows.first()?.len();
        if cols == 0 || rows.iter().any(|r| r.len() != cols) {
            return None;
        }
        Some(Self {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn identity(n: usize) -> Self {
        let mut data = vec![Number::zero(); n * n];
        for k in 0..n {
            data[k * n + k] = Number::one();
        }
        Self {
            rows: n,
            cols: n,
            data,
        }
    }

    pub fn at(&self, r: usize, c: usize) -> Number {
        self.data[r * self.cols + c]
    }

    pub fn row(&self, r: usize) -> &[Number] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn add(&self, other: &Self) -> Option<Self> {
        if self.rows != other.rows || self.cols != other.cols {
            return None;
        }
        Some(Self {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| a + b)
                .collect(),
        })
    }

    pub fn sub(&self, other: &Self) -> Option<Self> {
        if self.rows != other.rows || self.cols != other.cols {
            return None;
        }
        Some(Self {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| a - b)
                .collect(),
        })
    }

    pub fn scale(&self, k: Number) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| k * x).collect(),
        }
    }

    pub fn mul(&self, other: &Self) -> Option<Self> {
        if self.cols != other.rows {
            return None;
        }
        let mut data = vec![Number::zero(); self.rows * other.cols];
        for r in 0..self.rows {
            for c in 0..other.cols {
                let mut acc = Number::zero();
                for k in 0..self.cols {
                    acc = acc + self.at(r, k) * other.at(k, c);
                }
                data[r * other.cols + c] = acc;
            }
        }
        Some(Self {
            rows: self.rows,
            cols: other.cols,
            data,
        })
    }

    pub fn mul_vec(&self, v: &[Number]) -> Option<Vec<Number>> {
        if self.cols != v.len() {
            return None;
        }
        Some(
            (0..self.rows)
                .map(|r| vec_dot(self.row(r), v).unwrap_or_else(Number::zero))
                .collect(),
        )
    }

    pub fn transpose(&self) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for c in 0..self.cols {
            for r in 0..self.rows {
                data.push(self.at(r, c));
            }
        }
        Self {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }

    /// Determinant by Gaussian elimination with partial pivoting; `None` for non-square
    /// matrices.
    pub fn det(&self) -> Option<Number> {
        if self.rows != self.cols {
            return None;
        }
        let n = self.rows;
        let mut m = self.data.clone();
        let mut det = Number::one();
        for col in 0..n {
            let pivot = (col..n).max_by(|&a, &b| {
                m[a * n + col]
                    .abs()
                    .partial_cmp(&m[b * n + col].abs())
                    .unwrap_or(core::cmp::Ordering::Equal)
            })?;
            if m[pivot * n + col].is_zero() {
                return Some(Number::zero());
            }
            if pivot != col {
                for k in 0..n {
                    m.swap(col * n + k, pivot * n + k);
                }
                det = -det;
            }
            let lead = m[col * n + col];
            det = det * lead;
            for r in col + 1..n {
                let factor = m[r * n + col] / lead;
                for k in col..n {
                    let sub = factor * m[col * n + k];
                    m[r * n + k] = m[r * n + k] - sub;
                }
            }
        }
        Some(det)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! number_display_tests {
        ($($name:ident: $num:expr, $repr:expr)*) => {$(
            #[test]
            fn $name() {
                assert_eq!($num.to_string(), $repr);
            }
        )*};
    }

    number_display_tests! {
        real_int:       Number::real(3.), "3"
        real_frac:      Number::real(2.5), "2.5"
        unit_imaginary: Number::i(), "i"
        pure_imaginary: Number::new(0., 2.), "2i"
        complex:        Number::new(1., 2.), "1 + 2i"
        complex_neg_im: Number::new(1., -2.), "1 - 2i"
        infinite:       Number::real(f64::INFINITY), "infinity"
    }

    #[test]
    fn complex_arithmetic() {
        let a = Number::new(1., 2.);
        let b = Number::new(3., -1.);
        assert_eq!(a * b, Number::new(5., 5.));
        assert!((a / b * b).approx_eq(&a));
    }

    #[test]
    fn pow_negative_real_goes_complex() {
        let r = Number::real(-4.).sqrt();
        assert!(r.approx_eq(&Number::new(0., 2.)));
    }

    #[test]
    fn factorial_domain() {
        assert_eq!(factorial(Number::real(5.)), Some(Number::real(120.)));
        assert_eq!(factorial(Number::real(-1.)), None);
        assert_eq!(factorial(Number::real(2.5)), None);
    }

    #[test]
    fn gcd_and_modulo() {
        assert_eq!(gcd(12., 18.), 6.);
        assert_eq!(modulo(-1., 3.), 2.);
    }

    #[test]
    fn matrix_det() {
        let m = Matrix::from_rows(vec![
            vec![Number::real(1.), Number::real(2.)],
            vec![Number::real(3.), Number::real(4.)],
        ])
        .unwrap();
        assert!(m.det().unwrap().approx_eq(&Number::real(-2.)));
    }

    #[test]
    fn matrix_mul_dimensions() {
        let a = Matrix::from_rows(vec![vec![Number::real(1.), Number::real(2.)]]).unwrap();
        let b = Matrix::from_rows(vec![vec![Number::real(3.)], vec![Number::real(4.)]]).unwrap();
        let ab = a.mul(&b).unwrap();
        assert_eq!((ab.rows, ab.cols), (1, 1));
        assert!(ab.at(0, 0).approx_eq(&Number::real(11.)));
        assert!(b.mul(&b).is_none());
    }
}
