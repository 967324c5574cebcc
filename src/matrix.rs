//! Fixed-size matrix helpers
//!
//! Row-major `[[f32; C]; R]` arrays with const-generic shapes, so a shape
//! mismatch is a compile error. No allocation, no external linear algebra.

use micromath::F32Ext;

/// `R` rows by `C` columns
pub type Matrix<const R: usize, const C: usize> = [[f32; C]; R];

/// Zero matrix
#[inline]
pub fn zero<const R: usize, const C: usize>() -> Matrix<R, C> {
    [[0.0; C]; R]
}

/// Identity matrix
#[inline]
pub fn identity<const N: usize>() -> Matrix<N, N> {
    scaled_identity(1.0)
}

/// `s · I`
#[inline]
pub fn scaled_identity<const N: usize>(s: f32) -> Matrix<N, N> {
    let mut m = zero::<N, N>();
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = s;
    }
    m
}

/// C = A * B
pub fn mul<const R: usize, const K: usize, const C: usize>(
    a: &Matrix<R, K>,
    b: &Matrix<K, C>,
) -> Matrix<R, C> {
    let mut c = zero::<R, C>();
    for i in 0..R {
        for j in 0..C {
            let mut s = 0.0f32;
            for k in 0..K {
                s += a[i][k] * b[k][j];
            }
            c[i][j] = s;
        }
    }
    c
}

/// C = A * Bᵀ
pub fn mul_transpose<const R: usize, const K: usize, const C: usize>(
    a: &Matrix<R, K>,
    b: &Matrix<C, K>,
) -> Matrix<R, C> {
    let mut c = zero::<R, C>();
    for i in 0..R {
        for j in 0..C {
            let mut s = 0.0f32;
            for k in 0..K {
                s += a[i][k] * b[j][k];
            }
            c[i][j] = s;
        }
    }
    c
}

/// C = A + B
pub fn add<const R: usize, const C: usize>(a: &Matrix<R, C>, b: &Matrix<R, C>) -> Matrix<R, C> {
    let mut c = *a;
    for (row_c, row_b) in c.iter_mut().zip(b.iter()) {
        for (x, y) in row_c.iter_mut().zip(row_b.iter()) {
            *x += *y;
        }
    }
    c
}

/// C = A - B
pub fn sub<const R: usize, const C: usize>(a: &Matrix<R, C>, b: &Matrix<R, C>) -> Matrix<R, C> {
    let mut c = *a;
    for (row_c, row_b) in c.iter_mut().zip(b.iter()) {
        for (x, y) in row_c.iter_mut().zip(row_b.iter()) {
            *x -= *y;
        }
    }
    c
}

/// s * A
pub fn scale<const R: usize, const C: usize>(a: &Matrix<R, C>, s: f32) -> Matrix<R, C> {
    let mut c = *a;
    for row in c.iter_mut() {
        for x in row.iter_mut() {
            *x *= s;
        }
    }
    c
}

/// Transpose
pub fn transpose<const R: usize, const C: usize>(a: &Matrix<R, C>) -> Matrix<C, R> {
    let mut t = zero::<C, R>();
    for i in 0..R {
        for j in 0..C {
            t[j][i] = a[i][j];
        }
    }
    t
}

/// y = A * x
pub fn mul_vec<const R: usize, const C: usize>(a: &Matrix<R, C>, x: &[f32; C]) -> [f32; R] {
    let mut y = [0.0f32; R];
    for (yi, row) in y.iter_mut().zip(a.iter()) {
        *yi = row.iter().zip(x.iter()).map(|(m, v)| m * v).sum();
    }
    y
}

/// Replace `A` by `(A + Aᵀ) / 2`
pub fn symmetrize<const N: usize>(a: &mut Matrix<N, N>) {
    for i in 0..N {
        for j in (i + 1)..N {
            let avg = 0.5 * (a[i][j] + a[j][i]);
            a[i][j] = avg;
            a[j][i] = avg;
        }
    }
}

/// All entries finite
pub fn is_finite<const R: usize, const C: usize>(a: &Matrix<R, C>) -> bool {
    a.iter().all(|row| row.iter().all(|x| x.is_finite()))
}

/// Gauss-Jordan inverse with partial pivoting.
///
/// Returns `None` when a pivot falls below `f32::EPSILON` relative to the
/// largest entry of `a`.
pub fn invert<const N: usize>(a: &Matrix<N, N>) -> Option<Matrix<N, N>> {
    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f32, |acc, x| acc.max(x.abs()));
    if !(scale > 0.0) || !scale.is_finite() {
        return None;
    }
    let threshold = scale * f32::EPSILON;

    let mut m = *a;
    let mut inv = identity::<N>();

    for col in 0..N {
        let mut pivot_row = col;
        for row in (col + 1)..N {
            if m[row][col].abs() > m[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        if m[pivot_row][col].abs() <= threshold {
            return None;
        }
        m.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let recip = m[col][col].recip();
        for j in 0..N {
            m[col][j] *= recip;
            inv[col][j] *= recip;
        }

        for row in 0..N {
            if row == col {
                continue;
            }
            let factor = m[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..N {
                m[row][j] -= factor * m[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }

    Some(inv)
}
