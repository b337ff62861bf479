use std::fmt;

use rand::Rng;
use serde::Serialize;

use crate::error::{CalcError, CalcResult};

const SINGULAR_EPSILON: f64 = 1e-12;

/// Square matrix, row-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix {
    n: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    /// Integers in `[-10, 10]`.
    pub fn random<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self {
        Self {
            n,
            data: (0..n * n).map(|_| rng.gen_range(-10..=10) as f64).collect(),
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> CalcResult<Self> {
        let n = rows.len();
        if n == 0 || rows.iter().any(|r| r.len() != n) {
            return Err(CalcError::invalid("Matrix must be square."));
        }
        Ok(Self {
            n,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Rows separated by `;` or newlines, cells by commas or whitespace.
    pub fn parse(text: &str) -> CalcResult<Self> {
        let mut rows = Vec::new();
        for row in text.split([';', '\n']).map(str::trim).filter(|r| !r.is_empty()) {
            let cells = row
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<f64>()
                        .map_err(|_| CalcError::InvalidNumber(s.to_string()))
                })
                .collect::<CalcResult<Vec<f64>>>()?;
            rows.push(cells);
        }
        Self::from_rows(rows)
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.n + col] = value;
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.data.chunks(self.n.max(1)).map(|r| r.to_vec()).collect()
    }

    fn same_size(&self, other: &Self) -> CalcResult<()> {
        if self.n != other.n {
            return Err(CalcError::invalid("Matrices must have the same size."));
        }
        Ok(())
    }

    pub fn add(&self, other: &Self) -> CalcResult<Self> {
        self.same_size(other)?;
        Ok(Self {
            n: self.n,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a + b).collect(),
        })
    }

    pub fn sub(&self, other: &Self) -> CalcResult<Self> {
        self.same_size(other)?;
        Ok(Self {
            n: self.n,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a - b).collect(),
        })
    }

    pub fn mul(&self, other: &Self) -> CalcResult<Self> {
        self.same_size(other)?;
        let n = self.n;
        let mut out = Self::zeros(n);
        for i in 0..n {
            for j in 0..n {
                let v = (0..n).map(|k| self.get(i, k) * other.get(k, j)).sum();
                out.set(i, j, v);
            }
        }
        Ok(out)
    }

    pub fn transpose(&self) -> Self {
        let mut out = Self::zeros(self.n);
        for i in 0..self.n {
            for j in 0..self.n {
                out.set(j, i, self.get(i, j));
            }
        }
        out
    }

    /// Gaussian elimination with partial pivoting.
    pub fn determinant(&self) -> f64 {
        let n = self.n;
        let mut a = self.clone();
        let mut det = 1.0;
        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&x, &y| a.get(x, col).abs().total_cmp(&a.get(y, col).abs()))
                .unwrap_or(col);
            if a.get(pivot, col).abs() < SINGULAR_EPSILON {
                return 0.0;
            }
            if pivot != col {
                a.swap_rows(pivot, col);
                det = -det;
            }
            let p = a.get(col, col);
            det *= p;
            for row in col + 1..n {
                let factor = a.get(row, col) / p;
                for k in col..n {
                    let v = a.get(row, k) - factor * a.get(col, k);
                    a.set(row, k, v);
                }
            }
        }
        det
    }

    /// Gauss-Jordan inverse.
    pub fn inverse(&self) -> CalcResult<Self> {
        let n = self.n;
        let mut a = self.clone();
        let mut inv = Self::identity(n);
        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&x, &y| a.get(x, col).abs().total_cmp(&a.get(y, col).abs()))
                .unwrap_or(col);
            if a.get(pivot, col).abs() < SINGULAR_EPSILON {
                return Err(CalcError::invalid(
                    "Matrix is singular (determinant is 0) and cannot be inverted.",
                ));
            }
            a.swap_rows(pivot, col);
            inv.swap_rows(pivot, col);
            let p = a.get(col, col);
            for k in 0..n {
                a.set(col, k, a.get(col, k) / p);
                inv.set(col, k, inv.get(col, k) / p);
            }
            for row in 0..n {
                if row == col {
                    continue;
                }
                let factor = a.get(row, col);
                if factor == 0.0 {
                    continue;
                }
                for k in 0..n {
                    a.set(row, k, a.get(row, k) - factor * a.get(col, k));
                    inv.set(row, k, inv.get(row, k) - factor * inv.get(col, k));
                }
            }
        }
        Ok(inv)
    }

    fn swap_rows(&mut self, r1: usize, r2: usize) {
        if r1 == r2 {
            return;
        }
        for k in 0..self.n {
            self.data.swap(r1 * self.n + k, r2 * self.n + k);
        }
    }
}

/// Four decimals, trailing zeros dropped.
pub fn format_cell(v: f64) -> String {
    let s = format!("{v:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".into()
    } else {
        s.to_string()
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self.data.iter().map(|v| format_cell(*v)).collect();
        let width = cells.iter().map(|c| c.chars().count()).max().unwrap_or(1);
        for (i, row) in cells.chunks(self.n.max(1)).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let line: Vec<String> = row.iter().map(|c| format!("{c:>width$}")).collect();
            write!(f, "[ {} ]", line.join("  "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixOp {
    Add,
    Subtract,
    Multiply,
    Determinant,
    Inverse,
    Transpose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatrixResult {
    Matrix(Matrix),
    Scalar(f64),
}

impl fmt::Display for MatrixResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matrix(m) => write!(f, "{m}"),
            Self::Scalar(v) => write!(f, "{}", format_cell(*v)),
        }
    }
}

/// Binary operations need `b`; unary ones act on `a`.
pub fn apply(op: MatrixOp, a: &Matrix, b: Option<&Matrix>) -> CalcResult<MatrixResult> {
    let need_b = || b.ok_or_else(|| CalcError::invalid("This operation needs two matrices."));
    Ok(match op {
        MatrixOp::Add => MatrixResult::Matrix(a.add(need_b()?)?),
        MatrixOp::Subtract => MatrixResult::Matrix(a.sub(need_b()?)?),
        MatrixOp::Multiply => MatrixResult::Matrix(a.mul(need_b()?)?),
        MatrixOp::Determinant => MatrixResult::Scalar(a.determinant()),
        MatrixOp::Inverse => MatrixResult::Matrix(a.inverse()?),
        MatrixOp::Transpose => MatrixResult::Matrix(a.transpose()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn m(rows: &[&[f64]]) -> Matrix {
        Matrix::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    fn close(a: &Matrix, b: &Matrix) -> bool {
        a.size() == b.size()
            && a.rows()
                .iter()
                .flatten()
                .zip(b.rows().iter().flatten())
                .all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn test_parse() {
        let a = Matrix::parse("1 2; 3 4").unwrap();
        assert_eq!(a, m(&[&[1.0, 2.0], &[3.0, 4.0]]));
        assert!(Matrix::parse("1 2; 3").is_err());
        assert!(Matrix::parse("1 a; 3 4").is_err());
    }

    #[test]
    fn test_add_sub_mul() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = m(&[&[5.0, 6.0], &[7.0, 8.0]]);
        assert_eq!(a.add(&b).unwrap(), m(&[&[6.0, 8.0], &[10.0, 12.0]]));
        assert_eq!(b.sub(&a).unwrap(), m(&[&[4.0, 4.0], &[4.0, 4.0]]));
        assert_eq!(a.mul(&b).unwrap(), m(&[&[19.0, 22.0], &[43.0, 50.0]]));
        assert!(a.add(&Matrix::identity(3)).is_err());
    }

    #[test]
    fn test_determinant() {
        assert!((m(&[&[1.0, 2.0], &[3.0, 4.0]]).determinant() + 2.0).abs() < 1e-9);
        let c = m(&[&[2.0, 0.0, 1.0], &[1.0, 3.0, 2.0], &[1.0, 1.0, 2.0]]);
        assert!((c.determinant() - 6.0).abs() < 1e-9);
        assert_eq!(m(&[&[1.0, 2.0], &[2.0, 4.0]]).determinant(), 0.0);
    }

    #[test]
    fn test_inverse() {
        let a = m(&[&[4.0, 7.0], &[2.0, 6.0]]);
        let inv = a.inverse().unwrap();
        assert!(close(&a.mul(&inv).unwrap(), &Matrix::identity(2)));
        assert!(m(&[&[1.0, 2.0], &[2.0, 4.0]]).inverse().is_err());
    }

    #[test]
    fn test_transpose() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        assert_eq!(a.transpose(), m(&[&[1.0, 3.0], &[2.0, 4.0]]));
    }

    #[test]
    fn test_apply_needs_second_matrix() {
        let a = Matrix::identity(2);
        assert!(apply(MatrixOp::Add, &a, None).is_err());
        assert_eq!(
            apply(MatrixOp::Determinant, &a, None).unwrap(),
            MatrixResult::Scalar(1.0)
        );
    }

    #[test]
    fn test_format() {
        assert_eq!(format_cell(0.5), "0.5");
        assert_eq!(format_cell(1.0 / 3.0), "0.3333");
        assert_eq!(format_cell(-0.00001), "0");
        let a = m(&[&[1.0, 10.0], &[0.5, 2.0]]);
        assert_eq!(a.to_string(), "[   1   10 ]\n[ 0.5    2 ]");
    }

    #[test]
    fn test_random_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let r = Matrix::random(3, &mut rng);
        assert!(r.rows().iter().flatten().all(|v| (-10.0..=10.0).contains(v)));
    }
}
