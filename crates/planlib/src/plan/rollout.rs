//! Latent rollout scoring.
//!
//! Both entry points return `None` as soon as any model prediction goes
//! non-finite. Callers map `None` to a worst-possible score so a single bad
//! sample never aborts a whole planning call.

use ndarray::{Array1, Array2};

use crate::model::{Latent, WorldModel};

/// Discounted return of one action sequence from `latent0`, bootstrapped
/// with the ensemble value at the final state. Rows of `actions` are
/// per-timestep action vectors.
///
/// A continuation head, when present, scales the running discount so that
/// predicted termination cuts everything after it.
pub fn rollout_return<M: WorldModel + ?Sized>(
    model: &M,
    latent0: &Latent,
    actions: &Array2<f32>,
    discount: f32,
) -> Option<f32> {
    let mut z = latent0.clone();
    let mut disc = 1.0f32;
    let mut score = 0.0f32;

    for row in actions.rows() {
        let action = row.to_owned();
        let r = model.reward(&z, &action);
        if !r.is_finite() {
            return None;
        }
        score += disc * r;

        z = model.dynamics(&z, &action);
        if z.iter().any(|v| !v.is_finite()) {
            return None;
        }

        match model.continue_prob(&z) {
            Some(c) if c.is_finite() => disc *= discount * c,
            Some(_) => return None,
            None => disc *= discount,
        }
    }

    let v = model.value(&z);
    if !v.is_finite() {
        return None;
    }
    score += disc * v;
    score.is_finite().then_some(score)
}

/// Discounted return of rolling the policy prior mean for `steps` steps.
/// Used by reanalysis, where the fresh target must reflect the current
/// policy rather than whatever actions were logged at collection time.
pub fn policy_rollout_return<M: WorldModel + ?Sized>(
    model: &M,
    latent0: &Latent,
    steps: usize,
    discount: f32,
) -> Option<f32> {
    let mut z = latent0.clone();
    let mut disc = 1.0f32;
    let mut score = 0.0f32;

    for _ in 0..steps {
        let (mean, _) = model.policy_moments(&z);
        if mean.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let action: Array1<f32> = mean.mapv(|v| v.clamp(-1.0, 1.0));

        let r = model.reward(&z, &action);
        if !r.is_finite() {
            return None;
        }
        score += disc * r;

        z = model.dynamics(&z, &action);
        if z.iter().any(|v| !v.is_finite()) {
            return None;
        }

        match model.continue_prob(&z) {
            Some(c) if c.is_finite() => disc *= discount * c,
            Some(_) => return None,
            None => disc *= discount,
        }
    }

    let v = model.value(&z);
    if !v.is_finite() {
        return None;
    }
    score += disc * v;
    score.is_finite().then_some(score)
}
