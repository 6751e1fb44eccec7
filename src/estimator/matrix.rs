//! Fixed-size 2x2 / 2x1 arithmetic for the two-state filter.

pub type Vec2 = [f64; 2];
pub type Mat2 = [[f64; 2]; 2];

pub const IDENTITY: Mat2 = [[1.0, 0.0], [0.0, 1.0]];

pub fn diag(value: f64) -> Mat2 {
    [[value, 0.0], [0.0, value]]
}

pub fn transpose(a: &Mat2) -> Mat2 {
    [[a[0][0], a[1][0]], [a[0][1], a[1][1]]]
}

pub fn add(a: &Mat2, b: &Mat2) -> Mat2 {
    let mut out = [[0.0; 2]; 2];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = a[i][j] + b[i][j];
        }
    }
    out
}

pub fn sub(a: &Mat2, b: &Mat2) -> Mat2 {
    let mut out = [[0.0; 2]; 2];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = a[i][j] - b[i][j];
        }
    }
    out
}

pub fn mul(a: &Mat2, b: &Mat2) -> Mat2 {
    let mut out = [[0.0; 2]; 2];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = a[i][0] * b[0][j] + a[i][1] * b[1][j];
        }
    }
    out
}

pub fn mul_vec(a: &Mat2, x: &Vec2) -> Vec2 {
    [
        a[0][0] * x[0] + a[0][1] * x[1],
        a[1][0] * x[0] + a[1][1] * x[1],
    ]
}

pub fn dot(a: &Vec2, b: &Vec2) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

/// Column vector times row vector.
pub fn outer(col: &Vec2, row: &Vec2) -> Mat2 {
    [
        [col[0] * row[0], col[0] * row[1]],
        [col[1] * row[0], col[1] * row[1]],
    ]
}

/// Average with the transpose so rounding never leaves the matrix asymmetric.
pub fn symmetrize(a: &Mat2) -> Mat2 {
    let off = 0.5 * (a[0][1] + a[1][0]);
    [[a[0][0], off], [off, a[1][1]]]
}

/// Symmetric 2x2 PSD check: non-negative diagonal and determinant, within `tol`.
pub fn is_symmetric_psd(a: &Mat2, tol: f64) -> bool {
    let scale = a[0][0].abs().max(a[1][1].abs()).max(1.0);
    let symmetric = (a[0][1] - a[1][0]).abs() <= tol * scale;
    let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
    symmetric && a[0][0] >= -tol * scale && a[1][1] >= -tol * scale && det >= -tol * scale * scale
}
