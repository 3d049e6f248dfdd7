//! Log-space target transform

/// Map a price into the space the model is trained in: `ln(1 + price)`
pub fn transform_target(price: f64) -> f64 {
    price.ln_1p()
}

/// Map a model output back into a price: `exp(log_price) - 1`
pub fn inverse_target(log_price: f64) -> f64 {
    log_price.exp_m1()
}
