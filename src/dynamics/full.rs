//! Full (site-resolved) population model.
//!
//! Qx  = palphaxᵀ · Treg                  Treg occupancy of every site
//! ILx = (pixᵀ · Tcell) / Qx              IL-2 signal per unit occupancy
//! dTcell/dt = Tcell ⊙ (pix     · (vx ⊙ (1 − Qx)))
//! dTreg/dt  = Treg  ⊙ (palphax · (vx ⊙ (ILx − 1)))

use nalgebra::{DMatrix, DVector};

use super::{check_state, PopulationModel};
use crate::error::{Result, SimError};
use crate::overlap::check_site_dimension;

/// Site-resolved dynamics on raw affinities
#[derive(Debug, Clone, Copy)]
pub struct FullModel<'a> {
    pix: &'a DMatrix<f64>,
    palphax: &'a DMatrix<f64>,
    vx: &'a DVector<f64>,
}

impl<'a> FullModel<'a> {
    /// Fails when the site dimensions disagree or a T-cell has no
    /// positive weighted affinity (`pix · vx`).
    pub fn new(
        pix: &'a DMatrix<f64>,
        palphax: &'a DMatrix<f64>,
        vx: &'a DVector<f64>,
    ) -> Result<Self> {
        check_site_dimension("pix", pix, vx)?;
        check_site_dimension("palphax", palphax, vx)?;

        let rvals = pix * vx;
        for (i, &r) in rvals.iter().enumerate() {
            if !(r.is_finite() && r > 0.0) {
                return Err(SimError::degenerate("rvals", i, r));
            }
        }
        Ok(Self { pix, palphax, vx })
    }
}

impl PopulationModel for FullModel<'_> {
    fn num_tcell(&self) -> usize {
        self.pix.nrows()
    }

    fn num_treg(&self) -> usize {
        self.palphax.nrows()
    }

    fn derivatives(&self, _t: f64, y: &[f64], dydt: &mut [f64]) -> Result<()> {
        check_state(self.dimension(), y, dydt)?;
        let nt = self.num_tcell();

        let tcell = DVector::from_column_slice(&y[..nt]);
        let treg = DVector::from_column_slice(&y[nt..]);

        let occupancy = self.palphax.tr_mul(&treg);
        let mut signal = self.pix.tr_mul(&tcell);
        for (x, (s, &q)) in signal.iter_mut().zip(occupancy.iter()).enumerate() {
            if q == 0.0 || !q.is_finite() {
                return Err(SimError::degenerate("treg occupancy", x, q));
            }
            *s /= q;
            if !s.is_finite() {
                return Err(SimError::degenerate("il2 signal", x, *s));
            }
        }

        let tcell_drive = self.vx.component_mul(&occupancy.map(|q| 1.0 - q));
        let treg_drive = self.vx.component_mul(&signal.map(|s| s - 1.0));
        let tcell_rate = self.pix * tcell_drive;
        let treg_rate = self.palphax * treg_drive;

        let (d_tcell, d_treg) = dydt.split_at_mut(nt);
        for (i, d) in d_tcell.iter_mut().enumerate() {
            *d = tcell[i] * tcell_rate[i];
        }
        for (a, d) in d_treg.iter_mut().enumerate() {
            *d = treg[a] * treg_rate[a];
        }
        Ok(())
    }
}

/// dy/dt of the full model at `(t, y)`.
pub fn ddt_full(
    t: f64,
    y: &[f64],
    pix: &DMatrix<f64>,
    palphax: &DMatrix<f64>,
    vx: &DVector<f64>,
) -> Result<Vec<f64>> {
    FullModel::new(pix, palphax, vx)?.evaluate(t, y)
}
