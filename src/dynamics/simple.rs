//! Reduced (overlap-driven) population model.
//!
//! dTcell/dt = Tcell ⊙ (rvals − phi_cell_reg · Treg)
//! dTreg/dt  = Treg  ⊙ (phi_cell_regᵀ · Tcell − phi_reg_reg · Treg)
//!
//! Time-autonomous replicator dynamics: every clone grows at a rate equal
//! to its size times its net fitness.

use nalgebra::DVector;

use super::{check_state, PopulationModel};
use crate::error::Result;
use crate::overlap::Overlaps;

/// Replicator dynamics on precomputed overlaps
#[derive(Debug, Clone, Copy)]
pub struct ReducedModel<'a> {
    overlaps: &'a Overlaps,
}

impl<'a> ReducedModel<'a> {
    pub fn new(overlaps: &'a Overlaps) -> Result<Self> {
        overlaps.check_dimensions()?;
        Ok(Self { overlaps })
    }
}

impl PopulationModel for ReducedModel<'_> {
    fn num_tcell(&self) -> usize {
        self.overlaps.num_tcell()
    }

    fn num_treg(&self) -> usize {
        self.overlaps.num_treg()
    }

    fn derivatives(&self, _t: f64, y: &[f64], dydt: &mut [f64]) -> Result<()> {
        check_state(self.dimension(), y, dydt)?;
        let nt = self.num_tcell();
        let o = self.overlaps;

        let tcell = DVector::from_column_slice(&y[..nt]);
        let treg = DVector::from_column_slice(&y[nt..]);

        let suppression = &o.phi_cell_reg * &treg;
        let activation = o.phi_cell_reg.tr_mul(&tcell);
        let self_suppression = &o.phi_reg_reg * &treg;

        let (d_tcell, d_treg) = dydt.split_at_mut(nt);
        for (i, d) in d_tcell.iter_mut().enumerate() {
            *d = tcell[i] * (o.rvals[i] - suppression[i]);
        }
        for (a, d) in d_treg.iter_mut().enumerate() {
            *d = treg[a] * (activation[a] - self_suppression[a]);
        }
        Ok(())
    }
}

/// dy/dt of the reduced model at `(t, y)`.
pub fn ddt_simple(t: f64, y: &[f64], overlaps: &Overlaps) -> Result<Vec<f64>> {
    ReducedModel::new(overlaps)?.evaluate(t, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use nalgebra::DMatrix;

    fn overlaps() -> Overlaps {
        Overlaps {
            phi_reg_reg: DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]),
            phi_cell_reg: DMatrix::from_row_slice(1, 2, &[1.0, 3.0]),
            rvals: DVector::from_element(1, 4.0),
        }
    }

    #[test]
    fn test_known_derivative() {
        let o = overlaps();
        let dydt = ddt_simple(0.0, &[2.0, 1.0, 0.5], &o).unwrap();
        // Tcell: 2 · (4 − (1·1 + 3·0.5)) = 3
        assert!((dydt[0] - 3.0).abs() < 1e-12);
        // Treg0: 1 · (1·2 − (2·1 + 0.5·0.5)) = −0.25
        assert!((dydt[1] + 0.25).abs() < 1e-12);
        // Treg1: 0.5 · (3·2 − (0.5·1 + 1·0.5)) = 2.5
        assert!((dydt[2] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_populations_are_fixed_points() {
        let o = overlaps();
        let dydt = ddt_simple(0.0, &[0.0, 0.0, 0.0], &o).unwrap();
        assert!(dydt.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_time_autonomous() {
        let o = overlaps();
        let y = [0.3, 0.7, 1.1];
        assert_eq!(ddt_simple(0.0, &y, &o).unwrap(), ddt_simple(42.0, &y, &o).unwrap());
    }

    #[test]
    fn test_wrong_state_length() {
        let o = overlaps();
        assert!(matches!(
            ddt_simple(0.0, &[1.0, 1.0], &o),
            Err(SimError::DimensionMismatch { .. })
        ));
    }
}
