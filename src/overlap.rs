//! Pairwise overlaps between cell populations.
//!
//! phi_reg_reg  = (palphax ⊙ vx) · palphaxᵀ   (Treg × Treg, symmetric PSD)
//! phi_cell_reg = (pix ⊙ vx) · palphaxᵀ       (T-cell × Treg)
//! rvals        = pix · vx                    (T-cell raw growth rates)
//!
//! `⊙ vx` scales every site column by its weight.

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, SimError};

/// Overlap quantities shared by the equilibrium solver and the reduced model
#[derive(Debug, Clone, PartialEq)]
pub struct Overlaps {
    pub phi_reg_reg: DMatrix<f64>,
    pub phi_cell_reg: DMatrix<f64>,
    pub rvals: DVector<f64>,
}

impl Overlaps {
    pub fn num_tcell(&self) -> usize {
        self.phi_cell_reg.nrows()
    }

    pub fn num_treg(&self) -> usize {
        self.phi_reg_reg.nrows()
    }

    /// Shape consistency between the three quantities.
    pub fn check_dimensions(&self) -> Result<()> {
        let n_treg = self.phi_reg_reg.nrows();
        if self.phi_reg_reg.ncols() != n_treg {
            return Err(SimError::dimension(
                "phi_reg_reg columns",
                n_treg,
                self.phi_reg_reg.ncols(),
            ));
        }
        if self.phi_cell_reg.ncols() != n_treg {
            return Err(SimError::dimension(
                "phi_cell_reg columns",
                n_treg,
                self.phi_cell_reg.ncols(),
            ));
        }
        if self.rvals.len() != self.phi_cell_reg.nrows() {
            return Err(SimError::dimension(
                "rvals length",
                self.phi_cell_reg.nrows(),
                self.rvals.len(),
            ));
        }
        Ok(())
    }
}

/// Scale every column `j` of `m` by `vx[j]`.
pub(crate) fn scale_columns(m: &DMatrix<f64>, vx: &DVector<f64>) -> DMatrix<f64> {
    let mut scaled = m.clone();
    for (j, &w) in vx.iter().enumerate() {
        scaled.column_mut(j).scale_mut(w);
    }
    scaled
}

/// Check that a cell affinity matrix has one column per site weight.
pub(crate) fn check_site_dimension(
    context: &str,
    matrix: &DMatrix<f64>,
    vx: &DVector<f64>,
) -> Result<()> {
    if matrix.ncols() != vx.len() {
        return Err(SimError::dimension(
            format!("{} sites", context),
            vx.len(),
            matrix.ncols(),
        ));
    }
    Ok(())
}

/// Compute overlaps from affinities and site weights.
pub fn compute_overlaps(
    pix: &DMatrix<f64>,
    palphax: &DMatrix<f64>,
    vx: &DVector<f64>,
) -> Result<Overlaps> {
    check_site_dimension("pix", pix, vx)?;
    check_site_dimension("palphax", palphax, vx)?;

    let palphax_t = palphax.transpose();

    let mut phi_reg_reg = scale_columns(palphax, vx) * &palphax_t;
    // Mirror the upper triangle so the matrix is exactly symmetric.
    phi_reg_reg.fill_lower_triangle_with_upper_triangle();

    let phi_cell_reg = scale_columns(pix, vx) * &palphax_t;
    let rvals = pix * vx;

    log::debug!(
        "Overlaps: {} T-cells, {} Tregs, {} sites",
        pix.nrows(),
        palphax.nrows(),
        vx.len()
    );

    Ok(Overlaps {
        phi_reg_reg,
        phi_cell_reg,
        rvals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_site_scenario() {
        let pix = DMatrix::from_element(1, 1, 1.0);
        let palphax = DMatrix::from_element(1, 1, 1.0);
        let vx = DVector::from_element(1, 1.0);
        let o = compute_overlaps(&pix, &palphax, &vx).unwrap();
        assert_eq!(o.phi_reg_reg[(0, 0)], 1.0);
        assert_eq!(o.phi_cell_reg[(0, 0)], 1.0);
        assert_eq!(o.rvals[0], 1.0);
    }

    #[test]
    fn test_weighted_values() {
        // Two sites weighted 2 and 3.
        let pix = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]);
        let palphax = DMatrix::from_row_slice(1, 2, &[0.5, 2.0]);
        let vx = DVector::from_vec(vec![2.0, 3.0]);
        let o = compute_overlaps(&pix, &palphax, &vx).unwrap();

        // 0.5·2·0.5 + 2·3·2 = 0.5 + 12
        assert!((o.phi_reg_reg[(0, 0)] - 12.5).abs() < 1e-12);
        assert!((o.phi_cell_reg[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((o.phi_cell_reg[(1, 0)] - 13.0).abs() < 1e-12);
        assert!((o.rvals[0] - 2.0).abs() < 1e-12);
        assert!((o.rvals[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_site_mismatch() {
        let pix = DMatrix::zeros(2, 3);
        let palphax = DMatrix::zeros(2, 4);
        let vx = DVector::zeros(3);
        let err = compute_overlaps(&pix, &palphax, &vx).unwrap_err();
        assert!(matches!(err, SimError::DimensionMismatch { .. }));
    }
}
