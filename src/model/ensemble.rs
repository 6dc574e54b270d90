use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis, Zip, stack};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::input::Targets;
use crate::metrics::PredictionBatch;
use crate::model::init::{AdapterInit, linear_bound, random_sign};
use crate::model::{Backbone, EnsembleModel, ModelError, ModelOutput, OutputMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub backbone: Backbone,
    /// Input width, hidden widths, output width.
    pub dims: Vec<usize>,
    pub n_heads: usize,
    pub adapter_init: AdapterInit,
    pub seed: u64,
}

#[derive(Debug, Clone)]
struct Layer {
    // (1 when shared, else K, out, in)
    weight: Array3<f32>,
    bias: Array2<f32>,
    r: Option<Array2<f32>>,
    s: Option<Array2<f32>>,
}

impl Layer {
    fn weight_for(&self, head: usize) -> ArrayView2<'_, f32> {
        let idx = if self.weight.dim().0 == 1 { 0 } else { head };
        self.weight.index_axis(Axis(0), idx)
    }

    fn zeros_like(&self) -> Layer {
        Layer {
            weight: Array3::zeros(self.weight.dim()),
            bias: Array2::zeros(self.bias.dim()),
            r: self.r.as_ref().map(|r| Array2::zeros(r.dim())),
            s: self.s.as_ref().map(|s| Array2::zeros(s.dim())),
        }
    }
}

/// Cached activations of one head for the backward pass.
#[derive(Debug, Default)]
struct HeadPass {
    // layer inputs h_l, adapted inputs u_l, mixed v_l, pre-activations z_l
    inputs: Vec<Array2<f32>>,
    adapted: Vec<Array2<f32>>,
    mixed: Vec<Array2<f32>>,
    pre: Vec<Array2<f32>>,
    output: Array2<f32>,
}

/// Multi-head MLP. Each layer computes `((h ∘ r_k) W_kᵀ) ∘ s_k + b_k`; the
/// backbone decides which of `W`, `r`, `s` exist and whether `W` is shared.
#[derive(Debug, Clone)]
pub struct EnsembleMlp {
    name: String,
    backbone: Backbone,
    n_heads: usize,
    layers: Vec<Layer>,
}

impl EnsembleMlp {
    pub fn new(spec: &ModelSpec) -> Result<Self, ModelError> {
        if spec.dims.len() < 2 {
            return Err(ModelError::Shape(format!(
                "need at least input and output widths, got {:?}",
                spec.dims
            )));
        }
        if spec.dims.contains(&0) || spec.n_heads == 0 {
            return Err(ModelError::Shape(format!(
                "widths and head count must be positive: dims={:?} heads={}",
                spec.dims, spec.n_heads
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
        let k = spec.n_heads;
        let n_layers = spec.dims.len() - 1;
        let mut layers = Vec::with_capacity(n_layers);

        for (li, pair) in spec.dims.windows(2).enumerate() {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let bound = linear_bound(fan_in);
            let dist = Uniform::new_inclusive(-bound, bound);
            let n_weights = if spec.backbone.shares_weights() { 1 } else { k };
            let weight = Array3::from_shape_simple_fn((n_weights, fan_out, fan_in), || {
                dist.sample(&mut rng)
            });
            let bias = match spec.backbone {
                Backbone::Mlpk => Array2::from_shape_simple_fn((k, fan_out), || dist.sample(&mut rng)),
                _ => {
                    // shared bias copied into every head
                    let row: Vec<f32> = (0..fan_out).map(|_| dist.sample(&mut rng)).collect();
                    Array2::from_shape_fn((k, fan_out), |(_, j)| row[j])
                }
            };

            let (r, s) = match spec.backbone {
                Backbone::Mlpk => (None, None),
                Backbone::TabmMini => {
                    let r = (li == 0).then(|| {
                        Array2::from_shape_simple_fn((k, fan_in), || random_sign(&mut rng))
                    });
                    (r, None)
                }
                Backbone::TabmNaive => (
                    Some(Array2::from_shape_simple_fn((k, fan_in), || random_sign(&mut rng))),
                    Some(Array2::from_shape_simple_fn((k, fan_out), || random_sign(&mut rng))),
                ),
                Backbone::Tabm => {
                    let init = spec.adapter_init;
                    (
                        Some(Array2::from_shape_simple_fn((k, fan_in), || init.sample(&mut rng))),
                        Some(Array2::from_shape_simple_fn((k, fan_out), || init.sample(&mut rng))),
                    )
                }
            };

            layers.push(Layer { weight, bias, r, s });
        }

        Ok(Self {
            name: spec.name.clone(),
            backbone: spec.backbone,
            n_heads: k,
            layers,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(|l| l.weight.dim().2).unwrap_or(0)
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(|l| l.weight.dim().1).unwrap_or(0)
    }

    pub fn hidden_widths(&self) -> Vec<usize> {
        let n = self.layers.len();
        self.layers[..n.saturating_sub(1)]
            .iter()
            .map(|l| l.weight.dim().1)
            .collect()
    }

    fn check_input(&self, x: &ArrayView2<'_, f32>) -> Result<(), ModelError> {
        if x.ncols() != self.input_dim() {
            return Err(ModelError::Shape(format!(
                "model {} expects {} input features, got {}",
                self.name,
                self.input_dim(),
                x.ncols()
            )));
        }
        if x.nrows() == 0 {
            return Err(ModelError::Shape("empty input batch".to_string()));
        }
        Ok(())
    }

    fn run_head(&self, x: ArrayView2<'_, f32>, head: usize) -> HeadPass {
        let mut pass = HeadPass::default();
        let mut h = x.to_owned();
        let last = self.layers.len() - 1;
        for (li, layer) in self.layers.iter().enumerate() {
            let u = match &layer.r {
                Some(r) => &h * &r.row(head),
                None => h.clone(),
            };
            let v = u.dot(&layer.weight_for(head).t());
            let mut z = match &layer.s {
                Some(s) => &v * &s.row(head),
                None => v.clone(),
            };
            z += &layer.bias.row(head);
            let a = if li == last {
                z.clone()
            } else {
                z.mapv(|t| t.max(0.0))
            };
            pass.inputs.push(h);
            pass.adapted.push(u);
            pass.mixed.push(v);
            pass.pre.push(z);
            h = a;
        }
        pass.output = h;
        pass
    }

    /// Loss averaged over heads and the gradient of every parameter.
    fn gradients(
        &self,
        x: ArrayView2<'_, f32>,
        targets: &Targets,
    ) -> Result<(f32, Vec<Layer>), ModelError> {
        self.check_input(&x)?;
        check_targets(targets, x.nrows(), self.output_dim())?;

        let k = self.n_heads;
        let mut grads: Vec<Layer> = self.layers.iter().map(Layer::zeros_like).collect();
        let mut total_loss = 0f32;

        for head in 0..k {
            let pass = self.run_head(x, head);
            let (loss, mut dz) = loss_and_grad(&pass.output, targets);
            total_loss += loss;
            dz /= k as f32;

            for li in (0..self.layers.len()).rev() {
                let layer = &self.layers[li];
                let grad = &mut grads[li];
                if li + 1 != self.layers.len() {
                    Zip::from(&mut dz)
                        .and(&pass.pre[li])
                        .for_each(|d, &z| {
                            if z <= 0.0 {
                                *d = 0.0;
                            }
                        });
                }

                let mut bias_row = grad.bias.row_mut(head);
                bias_row += &dz.sum_axis(Axis(0));

                let dv = match (&layer.s, grad.s.as_mut()) {
                    (Some(s), Some(gs)) => {
                        let mut gs_row = gs.row_mut(head);
                        gs_row += &(&dz * &pass.mixed[li]).sum_axis(Axis(0));
                        &dz * &s.row(head)
                    }
                    _ => dz.clone(),
                };

                let widx = if layer.weight.dim().0 == 1 { 0 } else { head };
                let mut gw = grad.weight.index_axis_mut(Axis(0), widx);
                gw += &dv.t().dot(&pass.adapted[li]);

                let du = dv.dot(&layer.weight_for(head));
                let dh = match (&layer.r, grad.r.as_mut()) {
                    (Some(r), Some(gr)) => {
                        let mut gr_row = gr.row_mut(head);
                        gr_row += &(&du * &pass.inputs[li]).sum_axis(Axis(0));
                        &du * &r.row(head)
                    }
                    _ => du,
                };
                dz = dh;
            }
        }

        Ok((total_loss / k as f32, grads))
    }

    fn apply(&mut self, grads: &[Layer], lr: f32) {
        for (layer, grad) in self.layers.iter_mut().zip(grads) {
            layer.weight.scaled_add(-lr, &grad.weight);
            layer.bias.scaled_add(-lr, &grad.bias);
            if let (Some(r), Some(gr)) = (layer.r.as_mut(), grad.r.as_ref()) {
                r.scaled_add(-lr, gr);
            }
            if let (Some(s), Some(gs)) = (layer.s.as_mut(), grad.s.as_ref()) {
                s.scaled_add(-lr, gs);
            }
        }
    }
}

impl EnsembleModel for EnsembleMlp {
    fn name(&self) -> &str {
        &self.name
    }

    fn backbone(&self) -> Backbone {
        self.backbone
    }

    fn n_heads(&self) -> usize {
        self.n_heads
    }

    fn forward(&self, x: ArrayView2<'_, f32>, mode: OutputMode) -> Result<ModelOutput, ModelError> {
        self.check_input(&x)?;
        let passes: Vec<HeadPass> = (0..self.n_heads).map(|h| self.run_head(x, h)).collect();

        let outputs: Vec<ArrayView2<'_, f32>> = passes.iter().map(|p| p.output.view()).collect();
        let stacked = stack(Axis(1), &outputs).map_err(|e| ModelError::Shape(e.to_string()))?;
        let per_head = PredictionBatch::new(stacked)?;

        match mode {
            OutputMode::Aggregated => Ok(ModelOutput::Aggregated(per_head.aggregate())),
            OutputMode::PerHead => Ok(ModelOutput::PerHead(per_head)),
            OutputMode::PerHeadWithIntermediates => {
                let mut hidden = Vec::with_capacity(self.layers.len() - 1);
                // inputs[l] for l >= 1 is the activation leaving hidden layer l-1
                for li in 1..self.layers.len() {
                    let layer_views: Vec<ArrayView2<'_, f32>> =
                        passes.iter().map(|p| p.inputs[li].view()).collect();
                    let stacked = stack(Axis(1), &layer_views)
                        .map_err(|e| ModelError::Shape(e.to_string()))?;
                    hidden.push(PredictionBatch::new(stacked)?);
                }
                Ok(ModelOutput::PerHeadWithIntermediates {
                    output: per_head,
                    hidden,
                })
            }
        }
    }

    fn train_step(
        &mut self,
        x: ArrayView2<'_, f32>,
        targets: &Targets,
        lr: f32,
    ) -> Result<f32, ModelError> {
        let (loss, grads) = self.gradients(x, targets)?;
        self.apply(&grads, lr);
        Ok(loss)
    }

    fn loss(&self, x: ArrayView2<'_, f32>, targets: &Targets) -> Result<f32, ModelError> {
        self.check_input(&x)?;
        check_targets(targets, x.nrows(), self.output_dim())?;
        let mut total = 0f32;
        for head in 0..self.n_heads {
            let pass = self.run_head(x, head);
            total += loss_and_grad(&pass.output, targets).0;
        }
        Ok(total / self.n_heads as f32)
    }
}

fn check_targets(targets: &Targets, n_rows: usize, out_dim: usize) -> Result<(), ModelError> {
    match targets {
        Targets::Classes(labels) => {
            if labels.len() != n_rows {
                return Err(ModelError::Shape(format!(
                    "{} labels for {} rows",
                    labels.len(),
                    n_rows
                )));
            }
            if let Some(&bad) = labels.iter().find(|&&l| l >= out_dim) {
                return Err(ModelError::Shape(format!(
                    "label {bad} out of range for {out_dim} output channels"
                )));
            }
        }
        Targets::Values(values) => {
            if values.dim() != (n_rows, out_dim) {
                return Err(ModelError::Shape(format!(
                    "regression targets {:?} do not match output ({n_rows}, {out_dim})",
                    values.dim()
                )));
            }
        }
    }
    Ok(())
}

/// Cross-entropy on logits for class labels, mean squared error for values.
fn loss_and_grad(output: &Array2<f32>, targets: &Targets) -> (f32, Array2<f32>) {
    let n = output.nrows() as f32;
    match targets {
        Targets::Classes(labels) => {
            let mut grad = Array2::<f32>::zeros(output.dim());
            let mut loss = 0f32;
            for (row_idx, row) in output.rows().into_iter().enumerate() {
                let probs = softmax_row(row);
                let label = labels[row_idx];
                loss -= probs[label].max(f32::MIN_POSITIVE).ln();
                for (j, &p) in probs.iter().enumerate() {
                    let y = if j == label { 1.0 } else { 0.0 };
                    grad[[row_idx, j]] = (p - y) / n;
                }
            }
            (loss / n, grad)
        }
        Targets::Values(values) => {
            let diff = output - values;
            let count = diff.len() as f32;
            let loss = diff.mapv(|d| d * d).sum() / count;
            (loss, diff * (2.0 / count))
        }
    }
}

fn softmax_row(row: ArrayView1<'_, f32>) -> Vec<f32> {
    let max = row.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    let exps: Vec<f32> = row.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/ensemble.rs"]
mod tests;
