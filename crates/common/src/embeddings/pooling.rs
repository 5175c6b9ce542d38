//! Mean-pooling and L2 normalization over Candle tensors, grounded on
//! `examples/Classacre-ferrumyx/crates/ferrumyx-embed/src/pooling.rs`.

use candle_core::Tensor;

/// Mean pooling over non-padding tokens, weighted by the attention mask.
pub fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask_expanded = attention_mask.unsqueeze(2)?.expand(embeddings.shape())?;
    let sum_embeddings = (embeddings * &mask_expanded)?.sum(1)?;
    let sum_mask = attention_mask
        .unsqueeze(2)?
        .sum(1)?
        .clamp(1e-9f32, f32::MAX)?;
    sum_embeddings.broadcast_div(&sum_mask)
}

/// L2-normalizes each row of a `(batch, hidden_dim)` tensor (invariant #5,
/// spec.md §3).
pub fn l2_normalize(embeddings: &Tensor) -> candle_core::Result<Tensor> {
    let norms = embeddings.sqr()?.sum_keepdim(1)?.sqrt()?;
    let norms_clamped = norms.clamp(1e-9f32, f32::MAX)?;
    embeddings.broadcast_div(&norms_clamped)
}

/// L2-normalizes a plain `Vec<f32>` in place — used by `MockEncoder`, which
/// has no tensor to normalize.
pub fn l2_normalize_vec(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn mean_pool_respects_mask() {
        let device = Device::Cpu;
        let embeddings = Tensor::from_vec(
            vec![1.0f32, 2.0, 2.0, 3.0, 3.0, 4.0, 1.0, 1.0, 2.0, 2.0, 0.0, 0.0],
            (2, 3, 2),
            &device,
        )
        .unwrap();
        let mask = Tensor::from_vec(vec![1.0f32, 1.0, 1.0, 1.0, 1.0, 0.0], (2, 3), &device).unwrap();

        let pooled = mean_pool(&embeddings, &mask).unwrap();
        let result = pooled.to_vec2::<f32>().unwrap();
        assert!((result[0][0] - 2.0).abs() < 1e-5);
        assert!((result[1][0] - 1.5).abs() < 1e-5);
    }

    #[test]
    fn l2_normalize_unit_norm() {
        let device = Device::Cpu;
        let embeddings = Tensor::from_vec(vec![3.0f32, 4.0], (1, 2), &device).unwrap();
        let normalized = l2_normalize(&embeddings).unwrap();
        let result = normalized.to_vec2::<f32>().unwrap();
        assert!((result[0][0] - 0.6).abs() < 1e-5);
        assert!((result[0][1] - 0.8).abs() < 1e-5);
    }

    #[test]
    fn l2_normalize_vec_in_place() {
        let mut v = vec![3.0f32, 4.0];
        l2_normalize_vec(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-5);
        assert!((v[1] - 0.8).abs() < 1e-5);
    }
}
