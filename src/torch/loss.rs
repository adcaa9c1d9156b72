//! Bradley-Terry preference loss
use tch::{Reduction, Tensor};

/// Logit magnitude beyond which preference probabilities are saturated.
const MAX_LOGIT: f64 = 50.0;

/// Probability that segment 1 is preferred: `sigmoid(return1 - return0)`.
///
/// The return difference is clamped to `±MAX_LOGIT` so the result is always finite.
pub fn preference_probability(returns0: &Tensor, returns1: &Tensor) -> Tensor {
    (returns1 - returns0)
        .clamp_min(-MAX_LOGIT)
        .clamp_max(MAX_LOGIT)
        .sigmoid()
}

/// Bradley-Terry loss of segment returns against preference labels.
///
/// The binary cross entropy between `sigmoid(return1 - return0)` and `mu`, averaged over the
/// batch. Evaluated on the logits so that large return differences cannot overflow.
///
/// # Args
/// * `returns0` - Returns of segment 0. `[B]`
/// * `returns1` - Returns of segment 1. `[B]`
/// * `mu`       - Strength of the preference for segment 1. `[B]`
pub fn bradley_terry_loss(returns0: &Tensor, returns1: &Tensor, mu: &Tensor) -> Tensor {
    (returns1 - returns0).binary_cross_entropy_with_logits::<&Tensor>(
        mu,
        None,
        None,
        Reduction::Mean,
    )
}
