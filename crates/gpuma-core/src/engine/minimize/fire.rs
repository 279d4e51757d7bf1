use nalgebra::{Point3, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireParams {
    pub dt: f64,
    pub max_step: f64,
    pub dt_max: f64,
    /// Steps of uphill-free motion required before the timestep may grow.
    pub n_min: usize,
    pub f_inc: f64,
    pub f_dec: f64,
    pub a_start: f64,
    pub f_a: f64,
}

impl Default for FireParams {
    fn default() -> Self {
        Self {
            dt: 0.1,
            max_step: 0.2,
            dt_max: 1.0,
            n_min: 5,
            f_inc: 1.1,
            f_dec: 0.5,
            a_start: 0.1,
            f_a: 0.99,
        }
    }
}

/// Per-system state of the Fast Inertial Relaxation Engine (Bitzek et al.,
/// PRL 97, 170201): velocities, the adaptive timestep and mixing factor.
///
/// A batched driver advances many systems with one state each.
#[derive(Debug, Clone)]
pub struct FireState {
    params: FireParams,
    velocities: Option<Vec<Vector3<f64>>>,
    dt: f64,
    a: f64,
    n_downhill: usize,
}

impl FireState {
    pub fn new(params: FireParams) -> Self {
        Self {
            params,
            velocities: None,
            dt: params.dt,
            a: params.a_start,
            n_downhill: 0,
        }
    }

    pub fn timestep(&self) -> f64 {
        self.dt
    }

    /// Advances `positions` one FIRE step under `forces`.
    pub fn step(&mut self, positions: &mut [Point3<f64>], forces: &[Vector3<f64>]) {
        let p = self.params;
        let mut velocities = match self.velocities.take() {
            None => vec![Vector3::zeros(); positions.len()],
            Some(mut v) => {
                let power: f64 = v.iter().zip(forces).map(|(v, f)| v.dot(f)).sum();
                if power > 0.0 {
                    let v_norm = norm(&v);
                    let f_norm = norm(forces);
                    if f_norm > 0.0 {
                        for (vi, fi) in v.iter_mut().zip(forces) {
                            *vi = (1.0 - self.a) * *vi + self.a * fi / f_norm * v_norm;
                        }
                    }
                    if self.n_downhill > p.n_min {
                        self.dt = (self.dt * p.f_inc).min(p.dt_max);
                        self.a *= p.f_a;
                    }
                    self.n_downhill += 1;
                } else {
                    v.iter_mut().for_each(|vi| *vi = Vector3::zeros());
                    self.a = p.a_start;
                    self.dt *= p.f_dec;
                    self.n_downhill = 0;
                }
                v
            }
        };

        for (vi, fi) in velocities.iter_mut().zip(forces) {
            *vi += self.dt * fi;
        }

        let mut dr: Vec<Vector3<f64>> = velocities.iter().map(|v| self.dt * v).collect();
        let dr_norm = norm(&dr);
        if dr_norm > p.max_step {
            let scale = p.max_step / dr_norm;
            dr.iter_mut().for_each(|d| *d *= scale);
        }
        for (r, d) in positions.iter_mut().zip(&dr) {
            *r += *d;
        }
        self.velocities = Some(velocities);
    }
}

fn norm(vectors: &[Vector3<f64>]) -> f64 {
    vectors.iter().map(Vector3::norm_squared).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::atoms::AtomicSystem;
    use crate::engine::config::Convergence;
    use crate::engine::minimize::test_support::Harmonic;
    use crate::engine::minimize::{MinimizationReport, drive};
    use std::sync::Arc;

    fn relax(atoms: &mut AtomicSystem, convergence: &Convergence) -> MinimizationReport {
        let mut state = FireState::new(FireParams::default());
        drive(atoms, convergence, |atoms, forces| {
            let mut positions = atoms.get_positions().to_vec();
            state.step(&mut positions, forces);
            atoms.set_positions(positions);
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn first_step_moves_along_the_force() {
        let mut state = FireState::new(FireParams::default());
        let mut positions = vec![Point3::origin()];
        state.step(&mut positions, &[Vector3::new(1.0, 0.0, 0.0)]);

        // v = dt * f, dr = dt * v
        assert!((positions[0].x - 0.01).abs() < 1e-12);
        assert_eq!(positions[0].y, 0.0);
    }

    #[test]
    fn uphill_motion_resets_velocity_and_shrinks_timestep() {
        let mut state = FireState::new(FireParams::default());
        let mut positions = vec![Point3::origin()];
        state.step(&mut positions, &[Vector3::new(1.0, 0.0, 0.0)]);
        state.step(&mut positions, &[Vector3::new(-1.0, 0.0, 0.0)]);

        assert!((state.timestep() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn displacement_is_capped_at_max_step() {
        let mut state = FireState::new(FireParams::default());
        let mut positions = vec![Point3::origin()];
        state.step(&mut positions, &[Vector3::new(1000.0, 0.0, 0.0)]);
        assert!((positions[0].x - 0.2).abs() < 1e-12);
    }

    #[test]
    fn relaxes_a_harmonic_well() {
        let minimum = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.74, 0.0, 0.0)];
        let calc = Arc::new(Harmonic {
            minimum: minimum.clone(),
            k: 5.0,
            e0: -2.0,
        });
        let mut atoms = AtomicSystem::new(
            vec!["H".into(), "H".into()],
            vec![Point3::new(0.2, 0.1, 0.0), Point3::new(0.9, -0.1, 0.05)],
            0,
            1,
        )
        .with_calculator(calc);
        let convergence = Convergence {
            fmax: 1e-3,
            max_steps: 1000,
        };

        let report = relax(&mut atoms, &convergence);

        assert!(report.converged);
        assert!(report.steps > 0);
        for (r, r0) in atoms.get_positions().iter().zip(&minimum) {
            assert!((r - r0).norm() < 1e-3);
        }
    }

    #[test]
    fn stops_at_max_steps_without_converging() {
        let calc = Arc::new(Harmonic {
            minimum: vec![Point3::new(5.0, 0.0, 0.0)],
            k: 1.0,
            e0: 0.0,
        });
        let mut atoms =
            AtomicSystem::new(vec!["H".into()], vec![Point3::origin()], 0, 2).with_calculator(calc);
        let convergence = Convergence {
            fmax: 1e-6,
            max_steps: 3,
        };

        let report = relax(&mut atoms, &convergence);
        assert_eq!(report.steps, 3);
        assert!(!report.converged);
    }
}
